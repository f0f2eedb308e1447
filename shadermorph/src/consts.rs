//! Names of marker calls and synthesized declarations.
//!
//! Marker calls are emitted as ordinary function calls in the tree and are
//! resolved to identity macros by the printing pipeline. Downstream tooling
//! (the reducer in particular) keys on these names, so they are part of the
//! engine's output contract.

/// `_MORPH_DEAD(e)`: tags the condition of a guard that can never hold.
pub const DEAD: &str = "_MORPH_DEAD";
/// `_MORPH_TRUE(true, e)`: tags an opaque expression known to be true.
pub const TRUE: &str = "_MORPH_TRUE";
/// `_MORPH_FALSE(false, e)`: tags an opaque expression known to be false.
pub const FALSE: &str = "_MORPH_FALSE";
/// `_MORPH_ZERO(0, e)`: tags an opaque expression known to be zero.
pub const ZERO: &str = "_MORPH_ZERO";
/// `_MORPH_ONE(1, e)`: tags an opaque expression known to be one.
pub const ONE: &str = "_MORPH_ONE";
/// `_MORPH_IDENTITY(e, e')`: `e'` computes the same value as `e`.
pub const IDENTITY: &str = "_MORPH_IDENTITY";
/// `_MORPH_FUZZED(e)`: tags an expression with no semantic contract at all.
pub const FUZZED: &str = "_MORPH_FUZZED";
/// Wrappers around the conditions of injected control flow.
pub const WRAPPED_IF_TRUE: &str = "_MORPH_WRAPPED_IF_TRUE";
pub const WRAPPED_IF_FALSE: &str = "_MORPH_WRAPPED_IF_FALSE";
pub const WRAPPED_LOOP: &str = "_MORPH_WRAPPED_LOOP";
/// `_MORPH_SWITCH(e)`: tags the subject of an injected switch.
pub const SWITCH: &str = "_MORPH_SWITCH";

/// Two-component uniform holding `(0.0, 1.0)` at runtime; the opaque
/// generator leans on it when the generation parameters say it is bound.
pub const SWITCH_UNIFORM: &str = "morphSwitch";

pub const OUTLINED_FUNCTION_PREFIX: &str = "_morph_outlined_";
pub const STRUCT_PREFIX: &str = "_morph_struct_";
pub const STRUCT_REPLACEMENT_PREFIX: &str = "_morph_struct_replacement_";
pub const STRUCT_FIELD_PREFIX: &str = "_f";
pub const MERGED_PREFIX: &str = "_morph_merged";
pub const SPLIT_LOOP_COUNTER_PREFIX: &str = "_morph_split_";
pub const INJECTED_LOOP_COUNTER: &str = "_morph_injected_loop_counter";
pub const OUT_BACKUP_PREFIX: &str = "_morph_backup_";
