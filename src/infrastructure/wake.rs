//! Async-to-sync rendezvous
//!
//! A blocking session call installs a single-use completion channel here
//! before issuing its HAL request, then suspends on it. The dispatcher,
//! running on the stack's callback context, signals the matching
//! completion event. The channel buffers one event, so a signal that
//! arrives before the caller starts waiting is still observed. Only one
//! wait may be outstanding at a time; a second one is refused rather than
//! racing the first.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, SyncSender};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tracing::trace;

use crate::domain::models::{AdapterState, ConnectionId};
use crate::error::Error;
use crate::infrastructure::hal::{GattStatus, HalStatus};

/// The kind of completion a blocked caller is waiting for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WaitClass {
    AdapterState,
    DiscoveryStopped,
    ConnectionOpened,
    SearchComplete,
    CharacteristicsComplete,
    DescriptorsComplete,
    CharacteristicWritten,
    DescriptorWritten,
    NotificationState,
}

impl WaitClass {
    pub(crate) fn describe(self) -> &'static str {
        match self {
            WaitClass::AdapterState => "adapter state change",
            WaitClass::DiscoveryStopped => "discovery stop",
            WaitClass::ConnectionOpened => "connection open",
            WaitClass::SearchComplete => "service search",
            WaitClass::CharacteristicsComplete => "characteristic enumeration",
            WaitClass::DescriptorsComplete => "descriptor enumeration",
            WaitClass::CharacteristicWritten => "characteristic write",
            WaitClass::DescriptorWritten => "descriptor write",
            WaitClass::NotificationState => "notification registration",
        }
    }
}

/// Completion payload delivered to a woken caller.
#[derive(Debug, Clone)]
pub(crate) enum WakeEvent {
    AdapterState(AdapterState),
    DiscoveryStopped,
    ConnectionOpened {
        conn_id: ConnectionId,
        status: GattStatus,
    },
    SearchComplete {
        status: GattStatus,
    },
    CharacteristicsComplete {
        status: GattStatus,
        /// Set when re-issuing the next enumeration request failed; the
        /// enumeration ended early because of it.
        request_failed: Option<HalStatus>,
    },
    DescriptorsComplete {
        status: GattStatus,
        request_failed: Option<HalStatus>,
    },
    CharacteristicWritten {
        status: GattStatus,
    },
    DescriptorWritten {
        status: GattStatus,
    },
    NotificationState {
        registered: bool,
        status: GattStatus,
    },
}

impl WakeEvent {
    pub(crate) fn class(&self) -> WaitClass {
        match self {
            WakeEvent::AdapterState(_) => WaitClass::AdapterState,
            WakeEvent::DiscoveryStopped => WaitClass::DiscoveryStopped,
            WakeEvent::ConnectionOpened { .. } => WaitClass::ConnectionOpened,
            WakeEvent::SearchComplete { .. } => WaitClass::SearchComplete,
            WakeEvent::CharacteristicsComplete { .. } => WaitClass::CharacteristicsComplete,
            WakeEvent::DescriptorsComplete { .. } => WaitClass::DescriptorsComplete,
            WakeEvent::CharacteristicWritten { .. } => WaitClass::CharacteristicWritten,
            WakeEvent::DescriptorWritten { .. } => WaitClass::DescriptorWritten,
            WakeEvent::NotificationState { .. } => WaitClass::NotificationState,
        }
    }
}

struct Pending {
    id: u64,
    class: WaitClass,
    tx: SyncSender<WakeEvent>,
}

/// Rendezvous between the single blocking caller and the dispatcher.
pub(crate) struct WakeGate {
    slot: Mutex<Option<Pending>>,
    next_id: AtomicU64,
}

/// Live wait installed by [`WakeGate::begin`]. Dropping it uninstalls the
/// slot, so an error return between `begin` and `wait` cannot leave a
/// stale waiter behind.
pub(crate) struct WaitHandle<'a> {
    gate: &'a WakeGate,
    id: u64,
    class: WaitClass,
    rx: Receiver<WakeEvent>,
}

impl std::fmt::Debug for WaitHandle<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WaitHandle")
            .field("id", &self.id)
            .field("class", &self.class)
            .finish()
    }
}

impl WakeGate {
    pub(crate) fn new() -> Self {
        Self {
            slot: Mutex::new(None),
            next_id: AtomicU64::new(1),
        }
    }

    fn lock_slot(&self) -> std::sync::MutexGuard<'_, Option<Pending>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Install a wait for one completion class. Must be called before the
    /// matching HAL request is issued, so a completion that races the
    /// caller's suspension is buffered instead of lost.
    pub(crate) fn begin(&self, class: WaitClass) -> Result<WaitHandle<'_>, Error> {
        let mut slot = self.lock_slot();
        if slot.is_some() {
            return Err(Error::Busy("another blocking call is already waiting"));
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::sync_channel(1);
        *slot = Some(Pending { id, class, tx });
        Ok(WaitHandle {
            gate: self,
            id,
            class,
            rx,
        })
    }

    /// Deliver a completion event. Consumes the installed wait when the
    /// class matches; events nobody waits for are dropped. Never blocks.
    pub(crate) fn signal(&self, event: WakeEvent) {
        let pending = {
            let mut slot = self.lock_slot();
            match slot.as_ref() {
                Some(pending) if pending.class == event.class() => slot.take(),
                _ => None,
            }
        };

        match pending {
            // send only fails if the waiter already gave up (deadline)
            Some(pending) => {
                let _ = pending.tx.send(event);
            }
            None => trace!(class = event.class().describe(), "no waiter for completion event"),
        }
    }

    fn clear(&self, id: u64) {
        let mut slot = self.lock_slot();
        if slot.as_ref().map(|pending| pending.id) == Some(id) {
            *slot = None;
        }
    }
}

impl WaitHandle<'_> {
    /// Suspend until the completion event arrives, or the deadline
    /// passes. `None` waits forever.
    pub(crate) fn wait(self, deadline: Option<Duration>) -> Result<WakeEvent, Error> {
        match deadline {
            Some(deadline) => self
                .rx
                .recv_timeout(deadline)
                .map_err(|_| Error::Timeout(self.class.describe())),
            None => self
                .rx
                .recv()
                .map_err(|_| Error::Timeout(self.class.describe())),
        }
    }
}

impl Drop for WaitHandle<'_> {
    fn drop(&mut self) {
        self.gate.clear(self.id);
    }
}
