use serde::{Deserialize, Serialize};

use shadermorph::version::ShaderKind;

/// Tunables for code synthesis during a mutation run. Serializable so that
/// a harness can ship one configuration to many workers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationParams {
    pub shader_kind: ShaderKind,
    /// Whether the two-component switch uniform is bound by the harness; if
    /// not, the opaque generator falls back to strategies that do not need
    /// runtime values.
    pub injection_switch_available: bool,
    /// Hard cap on generated expression nesting; the chance of going deeper
    /// also shrinks exponentially below the cap.
    pub max_expr_depth: u32,
    pub max_struct_fields: u32,
    pub max_struct_nesting_depth: u32,
    /// Upper bound (exclusive) on decoy switch cases injected before, among
    /// and after the original statements.
    pub max_decoy_cases: u32,
    /// Retry budget before the fuzzer reports it was cornered.
    pub max_fuzz_attempts: u32,
}

impl GenerationParams {
    #[must_use]
    pub fn normal(shader_kind: ShaderKind) -> GenerationParams {
        GenerationParams {
            shader_kind,
            injection_switch_available: true,
            max_expr_depth: 5,
            max_struct_fields: 8,
            max_struct_nesting_depth: 2,
            max_decoy_cases: 3,
            max_fuzz_attempts: 50,
        }
    }

    /// Smaller limits, handy for tests and for size-constrained targets.
    #[must_use]
    pub fn small(shader_kind: ShaderKind) -> GenerationParams {
        GenerationParams {
            max_expr_depth: 3,
            max_struct_fields: 4,
            max_struct_nesting_depth: 1,
            ..GenerationParams::normal(shader_kind)
        }
    }
}
