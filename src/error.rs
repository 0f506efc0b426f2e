//! Error taxonomy of the session API.

use thiserror::Error;

use crate::domain::models::ConnectionId;
use crate::infrastructure::hal::{GattStatus, HalStatus};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// The adapter or connection is in the wrong state for the operation.
    #[error("not ready: {0}")]
    NotReady(&'static str),

    /// An equivalent operation is already in progress.
    #[error("busy: {0}")]
    Busy(&'static str),

    /// The hardware stack refused the request; the status is passed
    /// through untouched.
    #[error("hardware request failed: {0}")]
    Hal(HalStatus),

    /// The remote operation completed with a GATT-level failure; the
    /// status is passed through untouched.
    #[error("remote operation failed with status {0}")]
    Gatt(GattStatus),

    /// The completion event never arrived within the configured deadline.
    #[error("timed out waiting for {0}")]
    Timeout(&'static str),

    /// No live connection with the given id.
    #[error("no connection with id {0}")]
    ConnectionNotFound(ConnectionId),

    /// A service/characteristic/descriptor index is outside the cached
    /// range.
    #[error("{kind} index {index} out of range, {count} cached")]
    InvalidIndex {
        kind: &'static str,
        index: usize,
        count: usize,
    },

    /// Malformed textual input.
    #[error("malformed {what}: {input:?}")]
    Parse { what: &'static str, input: String },

    /// A completion event of an impossible shape was delivered.
    #[error("internal error: {0}")]
    Internal(&'static str),
}

pub type Result<T> = std::result::Result<T, Error>;
