use crate::rotor::RotorError;

/// Failure during `TrackingController::poll`
#[derive(thiserror::Error, Debug)]
pub enum PollError {
    /// Position is not read. State and reported RA/DEC are not changed
    #[error("Can't read rotor position: {0}")]
    Position(RotorError),

    /// Position is read and reported but new motion is not started
    #[error("Can't restart rotor motion: {0}")]
    Reslew(RotorError),
}

impl PollError {
    pub fn rotor_error(&self) -> &RotorError {
        match self {
            Self::Position(err) | Self::Reslew(err) => err,
        }
    }
}
