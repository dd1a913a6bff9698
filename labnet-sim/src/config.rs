use std::{fs, io, path::Path};

use labnet_rpc::FaultConfig;
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub fault: FaultConfig,
    pub clients: usize,
    pub ops_per_client: usize,
    pub unreliable: bool,
    pub long_reordering: bool,
    pub long_delays: bool,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            fault: FaultConfig::default(),
            clients: 5,
            ops_per_client: 50,
            unreliable: false,
            long_reordering: false,
            long_delays: false,
        }
    }
}

impl SimConfig {
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let json = serde_json::to_string_pretty(self).map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        fs::write(path, json)
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let json = fs::read_to_string(path)?;
        serde_json::from_str(&json).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }

    /// Loads `path`, writing a default config there first if it is missing.
    pub fn load_or_create<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            info!("config not found, writing defaults to {}", path.display());
            Self::default().save_to_file(path)?;
        }
        Self::load_from_file(path)
    }
}
