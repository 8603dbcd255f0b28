//! Lets software which expects a telescope (RA/DEC goto and position
//! reports) drive an antenna or camera rotator controlled by rotctld.
//!
//! [`tracking::TrackingController`] is the entry point: `goto`, `abort`,
//! `poll` and `set_observer_location`.

#![allow(
    clippy::too_many_arguments,
    clippy::upper_case_acronyms,
    clippy::uninlined_format_args,
    clippy::module_inception
)]

pub mod utils;
pub mod observer;
pub mod transform;
pub mod rotor;
pub mod tracking;
pub mod options;

pub use observer::{ObserverContext, ObserverPosition};
pub use transform::{EqCoord, HorizCoord, to_equatorial, to_horizontal};
pub use rotor::{Rotor, RotorError, ProtocolError, RotctldLink, SimulatedRotor};
pub use tracking::{PollError, TrackingController, TrackingState};
