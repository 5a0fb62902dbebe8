use thiserror::Error;

/// Returned when a status string read from storage or the wire is not one
/// of the known values.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown status: {0:?}")]
pub struct ParseStatusError(pub String);
