pub mod rotor;
pub use rotor::*;

pub mod site;
pub use site::*;

pub mod tracking;
pub use tracking::*;

use serde::{Serialize, Deserialize};

#[derive(Serialize, Deserialize, Debug, Default, Clone)]
#[serde(default)]
pub struct Options {
    pub rotor:     RotorOptions,
    pub simulator: SimulatorOptions,
    pub site:      SiteOptions,
    pub tracking:  TrackingOptions,
}

impl Options {
    pub fn check(&self) -> anyhow::Result<()> {
        self.rotor.check()?;
        self.site.check()?;
        self.tracking.check()?;
        if self.simulator.step_deg <= 0.0 {
            anyhow::bail!("Simulator step must be positive");
        }
        Ok(())
    }
}

#[test]
fn test_options_defaults_and_check() {
    let options = Options::default();
    assert_eq!(options.rotor.port, 4533);
    assert_eq!(options.rotor.backend, RotorBackend::Rotctld);
    assert!(options.check().is_ok());

    let mut bad = options.clone();
    bad.site.latitude = 91.0;
    assert!(bad.check().is_err());

    let mut bad = options.clone();
    bad.rotor.port = 0;
    assert!(bad.check().is_err());

    let mut bad = options.clone();
    bad.tracking.poll_period_ms = 0;
    assert!(bad.check().is_err());

    let mut sim = options;
    sim.rotor.backend = RotorBackend::Simulator;
    sim.rotor.port = 0;
    assert!(sim.check().is_ok());
}

#[test]
fn test_options_partial_json() {
    let json = r#"{ "rotor": { "host": "10.0.0.5", "read_timeout_ms": null }, "site": { "latitude": 48.1 } }"#;
    let options: Options = serde_json::from_str(json).unwrap();
    assert_eq!(options.rotor.host, "10.0.0.5");
    assert_eq!(options.rotor.port, 4533);
    assert_eq!(options.rotor.read_timeout_ms, None);
    assert_eq!(options.site.latitude, 48.1);
    assert_eq!(options.site.longitude, 0.0);
    assert_eq!(options.tracking.poll_period_ms, 1000);

    let timeouts = options.rotor.link_timeouts();
    assert_eq!(timeouts.read, None);
    assert_eq!(timeouts.write, Some(std::time::Duration::from_millis(5000)));
}
