// src/acquisition/mailbox.rs
//! Single-slot latest-value handoff between the processing loop and its
//! consumers

use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MailboxError {
    #[error("mailbox closed")]
    Closed,
    #[error("timed out waiting for a new item")]
    Timeout,
}

struct Slot<T> {
    item: Option<Arc<T>>,
    version: u64,
    closed: bool,
}

struct Shared<T> {
    slot: Mutex<Slot<T>>,
    updated: Condvar,
}

/// Producer side. Publishing overwrites the previous item and wakes every
/// waiting receiver; items are never queued.
pub struct Mailbox<T> {
    shared: Arc<Shared<T>>,
}

/// Consumer side. Each receiver tracks the last version it has seen.
pub struct MailboxReceiver<T> {
    shared: Arc<Shared<T>>,
    seen: u64,
}

impl<T> Mailbox<T> {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                slot: Mutex::new(Slot {
                    item: None,
                    version: 0,
                    closed: false,
                }),
                updated: Condvar::new(),
            }),
        }
    }

    /// Replace the current item. Returns `false` once the mailbox is closed.
    pub fn publish(&self, item: T) -> bool {
        let mut slot = self.shared.slot.lock();
        if slot.closed {
            return false;
        }
        slot.item = Some(Arc::new(item));
        slot.version += 1;
        self.shared.updated.notify_all();
        true
    }

    /// Close the mailbox and wake every blocked receiver
    pub fn close(&self) {
        let mut slot = self.shared.slot.lock();
        slot.closed = true;
        self.shared.updated.notify_all();
    }

    /// Accept items again after [`close`](Self::close). The item published
    /// before the close is dropped; existing receivers stay attached and see
    /// the next published item.
    pub fn reopen(&self) {
        let mut slot = self.shared.slot.lock();
        slot.item = None;
        slot.closed = false;
    }

    pub fn is_closed(&self) -> bool {
        self.shared.slot.lock().closed
    }

    /// Most recent item without waiting
    pub fn latest(&self) -> Option<Arc<T>> {
        self.shared.slot.lock().item.clone()
    }

    /// New receiver that will only see items published after this call
    pub fn subscribe(&self) -> MailboxReceiver<T> {
        MailboxReceiver {
            seen: self.shared.slot.lock().version,
            shared: self.shared.clone(),
        }
    }
}

impl<T> Default for Mailbox<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for Mailbox<T> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<T> MailboxReceiver<T> {
    /// Block until an item newer than the last one received is published, or
    /// the mailbox is closed.
    pub fn recv(&mut self) -> Result<Arc<T>, MailboxError> {
        let mut slot = self.shared.slot.lock();
        loop {
            if slot.closed {
                return Err(MailboxError::Closed);
            }
            if slot.version > self.seen {
                if let Some(item) = slot.item.clone() {
                    self.seen = slot.version;
                    return Ok(item);
                }
            }
            self.shared.updated.wait(&mut slot);
        }
    }

    /// Like [`recv`](Self::recv) but gives up after `timeout`
    pub fn recv_timeout(&mut self, timeout: Duration) -> Result<Arc<T>, MailboxError> {
        let deadline = Instant::now() + timeout;
        let mut slot = self.shared.slot.lock();
        loop {
            if slot.closed {
                return Err(MailboxError::Closed);
            }
            if slot.version > self.seen {
                if let Some(item) = slot.item.clone() {
                    self.seen = slot.version;
                    return Ok(item);
                }
            }
            if self.shared.updated.wait_until(&mut slot, deadline).timed_out() {
                return Err(MailboxError::Timeout);
            }
        }
    }

    /// New item if one arrived since the last receive
    pub fn try_recv(&mut self) -> Result<Option<Arc<T>>, MailboxError> {
        let slot = self.shared.slot.lock();
        if slot.closed {
            return Err(MailboxError::Closed);
        }
        if slot.version > self.seen {
            self.seen = slot.version;
            return Ok(slot.item.clone());
        }
        Ok(None)
    }
}
