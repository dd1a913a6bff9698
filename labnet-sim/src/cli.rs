use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::config::SimConfig;

#[derive(Parser)]
#[command(name = "labnet-sim")]
#[command(about = "Runs key/value workloads over the simulated network")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a workload, creating the config file with defaults if missing
    Run(RunArgs),
    /// Write a default config file
    Init {
        #[arg(value_name = "OUT", default_value = "labnet.json")]
        out: PathBuf,
    },
}

#[derive(Args)]
pub struct RunArgs {
    #[arg(short, long, value_name = "FILE", default_value = "labnet.json")]
    pub config: PathBuf,

    /// Overrides the fault seed from the config
    #[arg(long)]
    pub seed: Option<u64>,

    #[arg(long)]
    pub clients: Option<usize>,

    #[arg(long)]
    pub ops: Option<usize>,

    /// Drop and delay messages
    #[arg(long)]
    pub unreliable: bool,

    #[arg(long)]
    pub long_reordering: bool,

    /// Wait up to the long delay before failing calls to unreachable servers
    #[arg(long)]
    pub long_delays: bool,

    /// Also write logs to this file
    #[arg(long, value_name = "FILE")]
    pub log_file: Option<PathBuf>,
}

impl RunArgs {
    /// Layers the command-line overrides on top of a loaded config. Mode
    /// flags can only switch a mode on.
    pub fn apply(&self, cfg: &mut SimConfig) {
        if let Some(seed) = self.seed {
            cfg.fault.seed = Some(seed);
        }
        if let Some(clients) = self.clients {
            cfg.clients = clients;
        }
        if let Some(ops) = self.ops {
            cfg.ops_per_client = ops;
        }
        cfg.unreliable |= self.unreliable;
        cfg.long_reordering |= self.long_reordering;
        cfg.long_delays |= self.long_delays;
    }
}
