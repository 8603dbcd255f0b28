mod error;
mod rotor;
mod rotctld;
mod simulator;

pub use error::*;
pub use rotor::*;
pub use rotctld::*;
pub use simulator::*;
