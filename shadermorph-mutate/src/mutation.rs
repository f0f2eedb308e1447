use shadermorph::ast::TranslationUnit;

/// A single discovered edit, holding durable references into the tree plus a
/// private PRNG sub-stream drawn at discovery time. Applying performs exactly
/// one tree edit; applying the same mutation twice is not supported.
///
/// A mutation's site was checked for legality by its finder. `apply` asserts
/// the same condition again: an earlier mutation from another family could in
/// principle have invalidated the site, and discovery and application
/// disagreeing is a bug in the engine, not a recoverable condition.
pub trait Mutation {
    fn apply(&mut self, tu: &mut TranslationUnit);

    fn name(&self) -> &'static str;
}

#[derive(Debug, PartialEq, Eq)]
pub enum MutationError {
    /// No finder produced an applicable mutation for this tree.
    NoMutationsAvailable,
}

pub type MutationResult = Result<(), MutationError>;
