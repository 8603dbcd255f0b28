use std::time::Duration;
use serde::{Serialize, Deserialize};

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct TrackingOptions {
    pub poll_period_ms: u64,
}

impl Default for TrackingOptions {
    fn default() -> Self {
        Self {
            poll_period_ms: 1000,
        }
    }
}

impl TrackingOptions {
    pub fn check(&self) -> anyhow::Result<()> {
        if self.poll_period_ms == 0 {
            anyhow::bail!("Poll period can't be 0 ms");
        }
        Ok(())
    }

    pub fn poll_period(&self) -> Duration {
        Duration::from_millis(self.poll_period_ms)
    }
}
