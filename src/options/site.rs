use serde::{Serialize, Deserialize};

use crate::observer::ObserverPosition;

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct SiteOptions {
    pub latitude:  f64, // in degrees
    pub longitude: f64, // in degrees, east is positive
}

impl SiteOptions {
    pub fn check(&self) -> anyhow::Result<()> {
        if !self.observer_position().is_in_range() {
            anyhow::bail!(
                "Site latitude {} or longitude {} is out of range",
                self.latitude, self.longitude
            );
        }
        Ok(())
    }

    pub fn observer_position(&self) -> ObserverPosition {
        ObserverPosition::new(self.latitude, self.longitude)
    }
}
