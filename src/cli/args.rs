use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "nerdvm",
    version,
    about = "Run nerdctl commands inside a managed VM",
    subcommand_value_name = "COMMAND"
)]
pub struct Cli {
    /// Print debug logs
    #[arg(long, global = true)]
    pub debug: bool,

    /// VM instance to relay commands into
    #[arg(long, global = true)]
    pub instance: Option<String>,

    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Any nerdctl command, relayed with its arguments untouched by clap
    #[command(external_subcommand)]
    Runtime(Vec<String>),
}
