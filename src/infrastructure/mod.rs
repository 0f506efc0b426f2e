//! Infrastructure Layer
//!
//! Everything that touches the hardware stack or the process
//! environment: the HAL contract, the async-to-sync wake gate, the
//! callback dispatcher and log output.
//!
//! ## Modules
//!
//! - [`hal`] - the consumed hardware interface and its callback table
//! - `wake` - rendezvous between the blocking caller and the callbacks
//! - `dispatcher` - the callback table implementation
//! - [`logging`] - tracing subscriber setup

pub(crate) mod dispatcher;
pub mod hal;
pub mod logging;
pub(crate) mod wake;
