//! Errors raised by the grid, the engine and the configuration surface.

use thiserror::Error;

use crate::Pos;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// rejected at the configuration boundary, never stored in the engine.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
    /// the caller is expected to clip coordinates to the active area.
    #[error("cell {pos} out of range of the {width}x{height} active area")]
    OutOfRange { pos: Pos, width: usize, height: usize },
}

pub type Result<T> = std::result::Result<T, Error>;
