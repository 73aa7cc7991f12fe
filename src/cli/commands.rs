use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "payloadscope", version = env!("PAYLOADSCOPE_LONG_VERSION"), about = "Black-box fuzz attack orchestration and vulnerability detection")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Run configuration file
    #[arg(short, long, default_value = "config.yaml", global = true)]
    pub config: String,

    /// Increase log verbosity (repeat for more)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Compute paths, register scanners and enqueue attack scenarios
    Plan,
    /// Run the attack worker pool
    Attack(AttackArgs),
    /// Scan iteration results as they arrive
    Monitor(DrainArgs),
    /// Scan the process list and watched files at a fixed interval
    Periodic,
    /// Attack and monitor in one process until interrupted
    Fuzz,
    /// Write unique findings to a JSON file
    Report(ReportArgs),
    /// Validate a configuration file
    Validate(ValidateArgs),
}

#[derive(Args, Clone)]
pub struct AttackArgs {
    /// Worker count (overrides concurrent_queues)
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Stop once the scenario queue is empty
    #[arg(long)]
    pub exit_when_drained: bool,
}

#[derive(Args, Clone)]
pub struct DrainArgs {
    /// Stop once the queue is empty
    #[arg(long)]
    pub exit_when_drained: bool,
}

#[derive(Args, Clone)]
pub struct ReportArgs {
    /// Output file
    #[arg(short, long, default_value = "results.json")]
    pub output: String,
}

#[derive(Args, Clone)]
pub struct ValidateArgs {
    /// Config file to validate
    pub config: String,
}
