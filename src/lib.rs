//! Blocking control layer over an asynchronous BLE GATT client HAL.
//!
//! The hardware stack underneath is callback-only: every request returns
//! immediately and its result arrives later on the stack's own thread.
//! This crate gives callers sequential semantics on top of that:
//! "connect, then proceed only once connected".
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                      BtController                         │
//! │      (blocking session API - connect, discover, write)    │
//! └───────────────┬──────────────────────────▲───────────────┘
//!                 │ request        wake/read │
//!                 ▼                          │
//! ┌───────────────────────┐        ┌──────────────────┐
//! │   HardwareInterface   │        │     WakeGate      │
//! │  (async, consumed)    │        │  + shared state   │
//! └───────────┬───────────┘        └────────▲─────────┘
//!             │ callbacks                    │ mutate + signal
//!             ▼                              │
//! ┌──────────────────────────────────────────┴───────────────┐
//! │                     EventDispatcher                       │
//! │   (runs on the stack's thread, fills the discovery       │
//! │    cache and the connection registry)                     │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! A session supports one blocking call at a time; discovery results are
//! cached per connection and addressed by small indices that stay valid
//! until the next service discovery on that connection.

pub mod domain;
pub mod infrastructure;

mod error;
mod observer;
mod session;

pub use error::{Error, Result};
pub use observer::{ClientObserver, NullObserver};
pub use session::{BtController, DisableOutcome};

pub use domain::cache::{CHAR_CHUNK, MAX_DESCRIPTORS, MAX_SERVICES};
pub use domain::models::{
    AdapterState, AuthRequirement, BdAddr, BondState, CharacteristicIdentity,
    CharacteristicProperties, ClientIf, ConnectionId, DeviceProperties, DeviceType, DiscoveryState,
    NotificationData, ReadDetails, ServiceIdentity, SspVariant, Uuid, WriteDetails, WriteType,
};
pub use domain::registry::ConnectionInfo;
pub use domain::settings::{LogSettings, SessionSettings, Settings, SettingsStore};
pub use infrastructure::hal::{
    DeviceProperty, GattStatus, HalCallbacks, HalStatus, HardwareInterface,
};
pub use infrastructure::logging;
