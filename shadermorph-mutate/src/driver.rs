//! Two-phase mutation driving: a pure discovery pass per family produces
//! mutation objects with pre-drawn randomness; application then edits the
//! tree strictly sequentially, in an order the caller controls.

use shadermorph::ast::TranslationUnit;
use shadermorph::rng::MutationRng;

use crate::families::{
    find_dead_barrier_mutations, find_dead_jump_mutations, find_dead_output_write_mutations,
    find_identity_mutations, find_live_output_write_mutations, find_outline_mutations,
    find_split_loop_mutations, find_structification_mutations, find_switch_injection_mutations,
    find_vectorization_mutations, find_wrapping_mutations,
};
use crate::mutation::{Mutation, MutationError, MutationResult};
use crate::params::GenerationParams;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationFamily {
    DeadJump,
    DeadBarrier,
    DeadOutputWrite,
    LiveOutputWrite,
    WrappingConditional,
    SwitchInjection,
    Structification,
    Vectorization,
    SplitLoop,
    Outline,
    Identity,
}

impl MutationFamily {
    pub const ALL: [MutationFamily; 11] = [
        MutationFamily::DeadJump,
        MutationFamily::DeadBarrier,
        MutationFamily::DeadOutputWrite,
        MutationFamily::LiveOutputWrite,
        MutationFamily::WrappingConditional,
        MutationFamily::SwitchInjection,
        MutationFamily::Structification,
        MutationFamily::Vectorization,
        MutationFamily::SplitLoop,
        MutationFamily::Outline,
        MutationFamily::Identity,
    ];

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            MutationFamily::DeadJump => "dead_jump",
            MutationFamily::DeadBarrier => "dead_barrier",
            MutationFamily::DeadOutputWrite => "dead_output_write",
            MutationFamily::LiveOutputWrite => "live_output_write",
            MutationFamily::WrappingConditional => "wrapping_conditional",
            MutationFamily::SwitchInjection => "switch_injection",
            MutationFamily::Structification => "structification",
            MutationFamily::Vectorization => "vectorization",
            MutationFamily::SplitLoop => "split_loop",
            MutationFamily::Outline => "outline",
            MutationFamily::Identity => "identity",
        }
    }

    #[must_use]
    pub fn parse(name: &str) -> Option<MutationFamily> {
        MutationFamily::ALL.into_iter().find(|f| f.name() == name)
    }
}

/// Pure discovery pass for one family. Each returned mutation already holds
/// its own child PRNG stream, so the caller may apply them in any order
/// without changing any individual mutation's random choices.
#[must_use]
pub fn find_mutations(
    family: MutationFamily,
    tu: &TranslationUnit,
    rng: &mut MutationRng,
    params: &GenerationParams,
) -> Vec<Box<dyn Mutation>> {
    fn boxed<M: Mutation + 'static>(mutations: Vec<M>) -> Vec<Box<dyn Mutation>> {
        mutations
            .into_iter()
            .map(|m| Box::new(m) as Box<dyn Mutation>)
            .collect()
    }

    let mutations = match family {
        MutationFamily::DeadJump => boxed(find_dead_jump_mutations(tu, rng, params)),
        MutationFamily::DeadBarrier => boxed(find_dead_barrier_mutations(tu, rng, params)),
        MutationFamily::DeadOutputWrite => {
            boxed(find_dead_output_write_mutations(tu, rng, params))
        }
        MutationFamily::LiveOutputWrite => {
            boxed(find_live_output_write_mutations(tu, rng, params))
        }
        MutationFamily::WrappingConditional => boxed(find_wrapping_mutations(tu, rng, params)),
        MutationFamily::SwitchInjection => {
            boxed(find_switch_injection_mutations(tu, rng, params))
        }
        MutationFamily::Structification => {
            boxed(find_structification_mutations(tu, rng, params))
        }
        MutationFamily::Vectorization => boxed(find_vectorization_mutations(tu, rng, params)),
        MutationFamily::SplitLoop => boxed(find_split_loop_mutations(tu, rng, params)),
        MutationFamily::Outline => boxed(find_outline_mutations(tu, rng, params)),
        MutationFamily::Identity => boxed(find_identity_mutations(tu, rng, params)),
    };
    log::debug!(
        "{}: discovered {} mutation site(s)",
        family.name(),
        mutations.len()
    );
    mutations
}

/// Discovers and applies one randomly chosen mutation of the given family.
pub fn mutate_family(
    tu: &mut TranslationUnit,
    family: MutationFamily,
    rng: &mut MutationRng,
    params: &GenerationParams,
) -> MutationResult {
    let mut mutations = find_mutations(family, tu, rng, params);
    if mutations.is_empty() {
        return Err(MutationError::NoMutationsAvailable);
    }
    let index = rng.choose_index(mutations.len());
    let mutation = &mut mutations[index];
    log::info!("applying {}", mutation.name());
    mutation.apply(tu);
    Ok(())
}

const MAX_FINDER_TRIES: u32 = 10;

/// Whole-run entry point: keep drawing random families until one offers an
/// opportunity (bounded retries), then apply a single randomly chosen
/// mutation. The tree is left unchanged when nothing applies anywhere.
pub fn mutate(
    tu: &mut TranslationUnit,
    rng: &mut MutationRng,
    params: &GenerationParams,
) -> MutationResult {
    let mut mutations = Vec::new();
    for _ in 0..MAX_FINDER_TRIES {
        let family = MutationFamily::ALL[rng.choose_index(MutationFamily::ALL.len())];
        mutations = find_mutations(family, tu, rng, params);
        if !mutations.is_empty() {
            break;
        }
    }
    if mutations.is_empty() {
        log::warn!("did not manage to apply a mutation");
        return Err(MutationError::NoMutationsAvailable);
    }
    let index = rng.choose_index(mutations.len());
    let mutation = &mut mutations[index];
    log::info!("applying {}", mutation.name());
    mutation.apply(tu);
    Ok(())
}
