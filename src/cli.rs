use clap::{Parser, Subcommand};

/// Biosignal Gateway - bedside sensor ingestion and relay
#[derive(Parser)]
#[command(name = "biosignal-gateway")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the gateway (default)
    Serve,

    /// Print the resolved sensor profile table
    Sensors,
}
