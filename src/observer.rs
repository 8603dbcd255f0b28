use serde::{Serialize, Deserialize};

/// Geographic position of observer. Longitude is positive to the east
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq)]
pub struct ObserverPosition {
    pub latitude:  f64, // in degrees
    pub longitude: f64, // in degrees
}

impl ObserverPosition {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    pub fn is_in_range(&self) -> bool {
        (-90.0..=90.0).contains(&self.latitude) &&
        (-180.0..=180.0).contains(&self.longitude)
    }
}

/// Holds observer position used for every coordinate conversion.
/// Only the host writes it (through `set_location`)
#[derive(Debug, Default)]
pub struct ObserverContext {
    position: ObserverPosition,
}

impl ObserverContext {
    pub fn new(position: ObserverPosition) -> Self {
        Self { position }
    }

    /// Out of range values are accepted; conversions with them give
    /// meaningless (but finite or NaN, never panicking) results
    pub fn set_location(&mut self, latitude: f64, longitude: f64) {
        let position = ObserverPosition::new(latitude, longitude);
        if !position.is_in_range() {
            log::warn!(
                "Observer location lat={}, lon={} is out of range",
                latitude, longitude
            );
        }
        log::info!("Observer location set to lat={:.6}, lon={:.6}", latitude, longitude);
        self.position = position;
    }

    pub fn position(&self) -> &ObserverPosition {
        &self.position
    }
}

#[test]
fn test_observer_set_location() {
    let mut observer = ObserverContext::default();
    assert_eq!(*observer.position(), ObserverPosition::new(0.0, 0.0));

    observer.set_location(55.75, 37.62);
    assert_eq!(observer.position().latitude, 55.75);
    assert_eq!(observer.position().longitude, 37.62);
    assert!(observer.position().is_in_range());

    observer.set_location(120.0, -200.0);
    assert_eq!(*observer.position(), ObserverPosition::new(120.0, -200.0));
    assert!(!observer.position().is_in_range());
}
