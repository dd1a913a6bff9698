pub mod cli;
pub mod config;
pub mod error;
pub mod workload;

pub use config::SimConfig;
pub use error::SimError;
pub use workload::{run, Report};
