pub mod mutate;
pub mod print;
pub mod sample;

pub use mutate::MutateCommand;
pub use print::PrintCommand;
pub use sample::SampleCommand;

use std::path::Path;

use shadermorph::ast::TranslationUnit;

/// Shaders travel as serialized trees: JSON for `.json` paths, postcard
/// otherwise.
pub fn read_tree(path: &Path) -> Result<TranslationUnit, String> {
    let bytes = std::fs::read(path).map_err(|e| format!("failed to read {}: {e}", path.display()))?;
    if path.extension().is_some_and(|ext| ext == "json") {
        serde_json::from_slice(&bytes)
            .map_err(|e| format!("failed to parse {}: {e}", path.display()))
    } else {
        postcard::from_bytes(&bytes)
            .map_err(|e| format!("failed to parse {}: {e}", path.display()))
    }
}

pub fn write_tree(path: &Path, tu: &TranslationUnit) -> Result<(), String> {
    let bytes = if path.extension().is_some_and(|ext| ext == "json") {
        serde_json::to_vec_pretty(tu).map_err(|e| format!("serialization failed: {e}"))?
    } else {
        postcard::to_allocvec(tu).map_err(|e| format!("serialization failed: {e}"))?
    };
    std::fs::write(path, bytes).map_err(|e| format!("failed to write {}: {e}", path.display()))
}
