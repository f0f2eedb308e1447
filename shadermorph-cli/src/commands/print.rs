use std::path::PathBuf;

use clap::Args;

use shadermorph::printer;

use super::read_tree;

#[derive(Args)]
pub struct PrintCommand {
    /// Serialized shader (.json or postcard binary).
    input: PathBuf,
}

impl PrintCommand {
    pub fn run(self) -> Result<(), String> {
        let tu = read_tree(&self.input)?;
        print!("{}", printer::print(&tu));
        Ok(())
    }
}
