use std::time::Duration;
use serde::{Serialize, Deserialize};

use crate::rotor::{DEFAULT_ROTCTLD_PORT, DEFAULT_SIMULATOR_STEP, LinkTimeouts};

#[derive(Serialize, Deserialize, Debug, Default, Copy, Clone, PartialEq)]
pub enum RotorBackend {
    #[default]
    Rotctld,
    Simulator,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct RotorOptions {
    pub backend:            RotorBackend,
    pub host:               String,
    pub port:               u16,
    pub connect_timeout_ms: Option<u64>,
    pub read_timeout_ms:    Option<u64>,
    pub write_timeout_ms:   Option<u64>,
}

impl Default for RotorOptions {
    fn default() -> Self {
        Self {
            backend:            RotorBackend::Rotctld,
            host:               "localhost".to_string(),
            port:               DEFAULT_ROTCTLD_PORT,
            connect_timeout_ms: Some(5000),
            read_timeout_ms:    Some(5000),
            write_timeout_ms:   Some(5000),
        }
    }
}

impl RotorOptions {
    pub fn check(&self) -> anyhow::Result<()> {
        if self.backend == RotorBackend::Rotctld {
            if self.host.trim().is_empty() {
                anyhow::bail!("Rotctld host is empty");
            }
            if self.port == 0 {
                anyhow::bail!("Rotctld port can't be 0");
            }
        }
        for timeout in [self.connect_timeout_ms, self.read_timeout_ms, self.write_timeout_ms] {
            if timeout == Some(0) {
                anyhow::bail!("Rotctld timeout can't be 0 ms");
            }
        }
        Ok(())
    }

    pub fn link_timeouts(&self) -> LinkTimeouts {
        LinkTimeouts {
            connect: self.connect_timeout_ms.map(Duration::from_millis),
            read:    self.read_timeout_ms.map(Duration::from_millis),
            write:   self.write_timeout_ms.map(Duration::from_millis),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct SimulatorOptions {
    pub step_deg: f64, // max move per position query
}

impl Default for SimulatorOptions {
    fn default() -> Self {
        Self {
            step_deg: DEFAULT_SIMULATOR_STEP,
        }
    }
}
