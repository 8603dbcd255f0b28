use crate::transform::HorizCoord;
use super::error::*;

/// Rotor control contract. Implemented by the rotctld network client and by
/// the in-process simulator so the tracking logic doesn't depend on the
/// transport
pub trait Rotor {
    /// Commands motion to az/el (rotctld convention). Doesn't wait for the
    /// rotor to reach position
    fn set_position(&mut self, az: f64, el: f64) -> Result<()>;

    /// Returns current az/el reported by the rotor
    fn get_position(&mut self) -> Result<HorizCoord>;

    /// Stops any motion
    fn stop(&mut self) -> Result<()>;

    /// Releases the link. Calling it again does nothing
    fn disconnect(&mut self);

    fn is_connected(&self) -> bool;
}

impl<R: Rotor + ?Sized> Rotor for Box<R> {
    fn set_position(&mut self, az: f64, el: f64) -> Result<()> {
        (**self).set_position(az, el)
    }

    fn get_position(&mut self) -> Result<HorizCoord> {
        (**self).get_position()
    }

    fn stop(&mut self) -> Result<()> {
        (**self).stop()
    }

    fn disconnect(&mut self) {
        (**self).disconnect()
    }

    fn is_connected(&self) -> bool {
        (**self).is_connected()
    }
}
