use std::path::PathBuf;

use clap::Args;

use shadermorph::printer;
use shadermorph::rng::MutationRng;
use shadermorph_mutate::{
    mutate, mutate_family, GenerationParams, MutationFamily,
};

use super::{read_tree, write_tree};

#[derive(Args)]
pub struct MutateCommand {
    /// Serialized input shader (.json or postcard binary).
    input: PathBuf,
    /// Path for the mutated serialized shader.
    output: PathBuf,
    /// Seed for the random number generator.
    #[arg(long, default_value_t = 0)]
    seed: u64,
    /// Apply one mutation from each named family, in order, instead of a
    /// single randomly chosen mutation.
    #[arg(long, value_delimiter = ',')]
    families: Vec<String>,
    /// Also write the pretty-printed source next to the output.
    #[arg(long)]
    source: Option<PathBuf>,
    /// Assume the switch uniform is not bound by the harness.
    #[arg(long)]
    no_injection_switch: bool,
}

impl MutateCommand {
    pub fn run(self) -> Result<(), String> {
        let mut tu = read_tree(&self.input)?;
        let mut rng = MutationRng::from_seed(self.seed);
        let mut params = GenerationParams::normal(tu.kind);
        params.injection_switch_available = !self.no_injection_switch;

        log::info!(
            "mutating {} -> {} with {}",
            self.input.display(),
            self.output.display(),
            rng.describe()
        );

        if self.families.is_empty() {
            if mutate(&mut tu, &mut rng, &params).is_err() {
                log::warn!("no mutation opportunity found; output equals input");
            }
        } else {
            for name in &self.families {
                let family = MutationFamily::parse(name)
                    .ok_or_else(|| format!("unknown mutation family: {name}"))?;
                if mutate_family(&mut tu, family, &mut rng, &params).is_err() {
                    log::warn!("{name}: no opportunity in this shader");
                }
            }
        }

        write_tree(&self.output, &tu)?;
        if let Some(source) = &self.source {
            std::fs::write(source, printer::print(&tu))
                .map_err(|e| format!("failed to write {}: {e}", source.display()))?;
        }
        Ok(())
    }
}
