//! Error module for the Brunel network simulator.
use std::error::Error;
use std::fmt;

/// Error types for the library.
#[derive(Debug, PartialEq)]
pub enum SNNError {
    /// Error for invalid parameters, e.g., a non-positive time step or an in-degree quota larger than its pool.
    InvalidParameters(String),
    /// Error for out of bounds access, e.g., neuron not found.
    OutOfBounds(String),
    /// Error for I/O operations, e.g., an output sink that cannot be opened or written.
    IOError(String),
}

impl fmt::Display for SNNError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SNNError::InvalidParameters(e) => write!(f, "Invalid parameters: {}", e),
            SNNError::OutOfBounds(e) => {
                write!(f, "Index out of bounds: {}", e)
            }
            SNNError::IOError(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl Error for SNNError {}

impl From<std::io::Error> for SNNError {
    fn from(e: std::io::Error) -> Self {
        SNNError::IOError(e.to_string())
    }
}
