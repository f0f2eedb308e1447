mod commands;

use clap::{Parser, Subcommand};

use commands::{MutateCommand, PrintCommand, SampleCommand};

#[derive(Parser)]
#[command(name = "shadermorph", about = "Semantics-preserving shader mutation")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply seeded semantics-preserving mutations to a serialized shader.
    Mutate(MutateCommand),
    /// Pretty-print a serialized shader.
    Print(PrintCommand),
    /// Write a small example shader to get started.
    Sample(SampleCommand),
}

fn main() {
    env_logger::init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Mutate(cmd) => cmd.run(),
        Commands::Print(cmd) => cmd.run(),
        Commands::Sample(cmd) => cmd.run(),
    };

    if let Err(error) = result {
        log::error!("{error}");
        std::process::exit(1);
    }
}
