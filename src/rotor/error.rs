#[derive(thiserror::Error, Debug)]
pub enum ProtocolError {
    #[error("Malformed rotctld response `{0}`")]
    Malformed(String),

    #[error("Rotctld response truncated: {0} of 2 lines received")]
    Truncated(usize),
}

#[derive(thiserror::Error, Debug)]
pub enum RotorError {
    #[error("Can't resolve rotctld address `{0}`: {1}")]
    ResolutionFailed(String, std::io::Error),

    #[error("Address `{0}` resolved to nothing")]
    NotResolved(String),

    #[error("Can't connect to rotctld at `{0}`: {1}")]
    ConnectFailed(String, std::io::Error),

    #[error("Rotctld link error: `{0}`")]
    Link(#[from] std::io::Error),

    #[error("Rotor is not connected")]
    NotConnected,

    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

pub type Result<T> = std::result::Result<T, RotorError>;
