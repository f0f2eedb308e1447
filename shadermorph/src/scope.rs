use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::ast::{NodeId, StructDefinition};
use crate::types::{Type, TypeQualifier};

/// What a name resolves to at some program point.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScopeEntry {
    pub ty: Type,
    /// Declaration-group node the name was introduced by, when it came from a
    /// local or global variable declaration (as opposed to a parameter or a
    /// builtin).
    pub decl_group: Option<NodeId>,
    pub is_parameter: bool,
}

impl ScopeEntry {
    #[must_use]
    pub fn variable(ty: Type, decl_group: NodeId) -> ScopeEntry {
        ScopeEntry {
            ty,
            decl_group: Some(decl_group),
            is_parameter: false,
        }
    }

    #[must_use]
    pub fn parameter(ty: Type) -> ScopeEntry {
        ScopeEntry {
            ty,
            decl_group: None,
            is_parameter: true,
        }
    }

    #[must_use]
    pub fn builtin(ty: Type) -> ScopeEntry {
        ScopeEntry {
            ty,
            decl_group: None,
            is_parameter: false,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Frame {
    variables: HashMap<String, ScopeEntry>,
    structs: HashMap<String, StructDefinition>,
}

/// A chain of lexical frames. Names are registered in source order, so a
/// lookup performed mid-traversal never sees declarations that appear later
/// in the source. Scopes are rebuilt fresh for every analysis pass; a
/// [`Scope::flatten`] snapshot is what outlives the traversal that built it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scope {
    frames: Vec<Frame>,
}

impl Default for Scope {
    fn default() -> Self {
        Scope::new()
    }
}

impl Scope {
    #[must_use]
    pub fn new() -> Scope {
        Scope {
            frames: vec![Frame::default()],
        }
    }

    pub fn push_frame(&mut self) {
        self.frames.push(Frame::default());
    }

    pub fn pop_frame(&mut self) {
        assert!(self.frames.len() > 1, "attempt to pop the global frame");
        self.frames.pop();
    }

    #[must_use]
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Registers a name in the innermost frame. Shadowing an outer frame is
    /// fine; a duplicate within one frame indicates malformed input and the
    /// newer entry wins.
    pub fn add(&mut self, name: impl Into<String>, entry: ScopeEntry) {
        let name = name.into();
        let frame = self.frames.last_mut().expect("scope has at least one frame");
        if frame.variables.insert(name.clone(), entry).is_some() {
            log::debug!("redeclaration of {name} within one scope frame");
        }
    }

    pub fn add_struct(&mut self, definition: StructDefinition) {
        let frame = self.frames.last_mut().expect("scope has at least one frame");
        frame.structs.insert(definition.name.clone(), definition);
    }

    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<&ScopeEntry> {
        self.frames
            .iter()
            .rev()
            .find_map(|frame| frame.variables.get(name))
    }

    #[must_use]
    pub fn lookup_type(&self, name: &str) -> Option<&Type> {
        self.lookup(name).map(|entry| &entry.ty)
    }

    #[must_use]
    pub fn lookup_struct(&self, name: &str) -> Option<&StructDefinition> {
        self.frames
            .iter()
            .rev()
            .find_map(|frame| frame.structs.get(name))
    }

    /// Names visible at this point, innermost shadowing outermost, in
    /// deterministic (sorted) order.
    #[must_use]
    pub fn names_in_scope(&self) -> Vec<String> {
        let mut seen: Vec<String> = Vec::new();
        for frame in self.frames.iter().rev() {
            for name in frame.variables.keys() {
                if !seen.contains(name) {
                    seen.push(name.clone());
                }
            }
        }
        seen.sort();
        seen
    }

    /// Names declared in the innermost frame only, in sorted order.
    #[must_use]
    pub fn names_in_current_frame(&self) -> Vec<String> {
        let frame = self.frames.last().expect("scope has at least one frame");
        let mut names: Vec<String> = frame.variables.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn remove_from_current_frame(&mut self, name: &str) {
        let frame = self.frames.last_mut().expect("scope has at least one frame");
        frame.variables.remove(name);
    }

    /// Collapses the chain into a single-frame snapshot with shadowing
    /// resolved. The result is self-contained and safe to store in an
    /// injection point.
    #[must_use]
    pub fn flatten(&self) -> Scope {
        let mut flat = Frame::default();
        for frame in &self.frames {
            for (name, entry) in &frame.variables {
                flat.variables.insert(name.clone(), entry.clone());
            }
            for (name, def) in &frame.structs {
                flat.structs.insert(name.clone(), def.clone());
            }
        }
        Scope { frames: vec![flat] }
    }

    /// Names of non-parameter variables carrying the given qualifier.
    #[must_use]
    pub fn names_with_qualifier(&self, qualifier: TypeQualifier) -> Vec<String> {
        let mut names: Vec<String> = self
            .names_in_scope()
            .into_iter()
            .filter(|name| {
                self.lookup_type(name)
                    .is_some_and(|ty| ty.has_qualifier(qualifier))
            })
            .collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BasicType;

    fn float_entry() -> ScopeEntry {
        ScopeEntry::builtin(Type::Basic(BasicType::Float))
    }

    fn int_entry() -> ScopeEntry {
        ScopeEntry::builtin(Type::Basic(BasicType::Int))
    }

    #[test]
    fn inner_frames_shadow_outer_frames() {
        let mut scope = Scope::new();
        scope.add("x", float_entry());
        scope.push_frame();
        scope.add("x", int_entry());
        assert_eq!(
            scope.lookup_type("x"),
            Some(&Type::Basic(BasicType::Int))
        );
        scope.pop_frame();
        assert_eq!(
            scope.lookup_type("x"),
            Some(&Type::Basic(BasicType::Float))
        );
    }

    #[test]
    fn flatten_resolves_shadowing() {
        let mut scope = Scope::new();
        scope.add("x", float_entry());
        scope.add("y", float_entry());
        scope.push_frame();
        scope.add("x", int_entry());
        let flat = scope.flatten();
        assert_eq!(flat.depth(), 1);
        assert_eq!(flat.lookup_type("x"), Some(&Type::Basic(BasicType::Int)));
        assert_eq!(flat.lookup_type("y"), Some(&Type::Basic(BasicType::Float)));
    }

    #[test]
    fn names_are_sorted_and_deduplicated() {
        let mut scope = Scope::new();
        scope.add("b", float_entry());
        scope.add("a", float_entry());
        scope.push_frame();
        scope.add("a", int_entry());
        assert_eq!(scope.names_in_scope(), vec!["a", "b"]);
    }
}
