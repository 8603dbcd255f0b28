use crate::transform::HorizCoord;
use super::{error::*, rotor::Rotor};

pub const DEFAULT_SIMULATOR_STEP: f64 = 2.0;

/// In-process rotor for dry runs. Every position query moves it by at most
/// `step` degrees on each axis toward the commanded position
pub struct SimulatedRotor {
    position:  HorizCoord,
    target:    Option<HorizCoord>,
    step:      f64,
    connected: bool,
}

impl SimulatedRotor {
    pub fn new(initial: HorizCoord, step: f64) -> Self {
        log::info!("Simulated rotor created at {:?}, step = {}°", initial, step);
        Self {
            position:  initial,
            target:    None,
            step:      step.abs(),
            connected: true,
        }
    }

    pub fn position(&self) -> HorizCoord {
        self.position
    }

    pub fn target(&self) -> Option<HorizCoord> {
        self.target
    }

    pub fn is_moving(&self) -> bool {
        self.target.is_some()
    }

    fn check_connected(&self) -> Result<()> {
        if !self.connected {
            return Err(RotorError::NotConnected);
        }
        Ok(())
    }

    fn move_axis(value: f64, target: f64, step: f64) -> f64 {
        let diff = target - value;
        if diff.abs() <= step {
            target
        } else {
            value + step * diff.signum()
        }
    }

    fn advance(&mut self) {
        let Some(target) = self.target else {
            return;
        };
        self.position.az = Self::move_axis(self.position.az, target.az, self.step);
        self.position.el = Self::move_axis(self.position.el, target.el, self.step);
        if self.position == target {
            log::debug!("Simulated rotor reached {:?}", target);
            self.target = None;
        }
    }
}

impl Default for SimulatedRotor {
    fn default() -> Self {
        Self::new(HorizCoord::default(), DEFAULT_SIMULATOR_STEP)
    }
}

impl Rotor for SimulatedRotor {
    fn set_position(&mut self, az: f64, el: f64) -> Result<()> {
        self.check_connected()?;
        // Same precision as rotctld command line
        let round2 = |v: f64| (v * 100.0).round() / 100.0;
        self.target = Some(HorizCoord::new(round2(az), round2(el)));
        Ok(())
    }

    fn get_position(&mut self) -> Result<HorizCoord> {
        self.check_connected()?;
        self.advance();
        Ok(self.position)
    }

    fn stop(&mut self) -> Result<()> {
        self.check_connected()?;
        self.target = None;
        Ok(())
    }

    fn disconnect(&mut self) {
        self.connected = false;
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}

#[test]
fn test_simulated_rotor_moves_to_target() {
    let mut rotor = SimulatedRotor::new(HorizCoord::new(10.0, 0.0), 5.0);
    assert_eq!(rotor.get_position().unwrap(), HorizCoord::new(10.0, 0.0));

    rotor.set_position(22.004, -3.0).unwrap();
    assert!(rotor.is_moving());
    assert_eq!(rotor.get_position().unwrap(), HorizCoord::new(15.0, -3.0));
    assert_eq!(rotor.get_position().unwrap(), HorizCoord::new(20.0, -3.0));
    assert_eq!(rotor.get_position().unwrap(), HorizCoord::new(22.0, -3.0));
    assert!(!rotor.is_moving());
    assert_eq!(rotor.get_position().unwrap(), HorizCoord::new(22.0, -3.0));
}

#[test]
fn test_simulated_rotor_stop_and_disconnect() {
    let mut rotor = SimulatedRotor::new(HorizCoord::new(0.0, 0.0), 1.0);
    rotor.set_position(10.0, 10.0).unwrap();
    rotor.get_position().unwrap();
    rotor.stop().unwrap();
    assert_eq!(rotor.get_position().unwrap(), HorizCoord::new(1.0, 1.0));
    assert_eq!(rotor.get_position().unwrap(), HorizCoord::new(1.0, 1.0));

    rotor.disconnect();
    rotor.disconnect();
    assert!(!rotor.is_connected());
    assert!(matches!(rotor.get_position(), Err(RotorError::NotConnected)));
    assert!(matches!(rotor.set_position(1.0, 1.0), Err(RotorError::NotConnected)));
}
