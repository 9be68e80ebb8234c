//! In-flight request coalescing.
//!
//! While one submit is working on a task, identical submits (same
//! [`Fingerprint`] and key material as the response cache) wait for its
//! outcome instead of calling a provider themselves.
//!
//! The first submit for a key leads and holds a [`Flight`]. Later ones
//! follow through a `watch` slot. The leader publishes its outcome, success
//! or failure, before releasing the key. A leader that is cancelled or
//! dropped releases the key without publishing; its followers then start
//! over and one of them leads.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;

use super::response::{CacheKey, Fingerprint};
use crate::Result;
use crate::types::{Response, Task};

type Outcome = Option<Result<Response>>;

struct Slot {
    key: CacheKey,
    sender: watch::Sender<Outcome>,
}

/// Tasks currently being worked on, by fingerprint.
#[derive(Default)]
pub(crate) struct InFlight {
    slots: Mutex<HashMap<Fingerprint, Slot>>,
}

/// Role of one submit for its task.
pub(crate) enum Join<'a> {
    Leader(Flight<'a>),
    Follower(Follower),
}

impl InFlight {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn join(&self, task: &Task) -> Join<'_> {
        let fingerprint = Fingerprint::of(task);
        let mut slots = self.lock();
        match slots.entry(fingerprint) {
            Entry::Occupied(slot) if slot.get().key.matches(task) => Join::Follower(Follower {
                receiver: slot.get().sender.subscribe(),
            }),
            // A different task with the same fingerprint runs on its own.
            Entry::Occupied(_) => Join::Leader(Flight {
                table: self,
                fingerprint: None,
            }),
            Entry::Vacant(vacant) => {
                let (sender, _) = watch::channel(None);
                vacant.insert(Slot {
                    key: CacheKey::of(task),
                    sender,
                });
                Join::Leader(Flight {
                    table: self,
                    fingerprint: Some(fingerprint),
                })
            }
        }
    }

    /// Number of distinct tasks in flight.
    #[cfg(test)]
    fn len(&self) -> usize {
        self.lock().len()
    }

    #[cfg(test)]
    fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<Fingerprint, Slot>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Leadership of one task key. Releases the key when dropped.
pub(crate) struct Flight<'a> {
    table: &'a InFlight,
    fingerprint: Option<Fingerprint>,
}

impl Flight<'_> {
    /// Hand the outcome to every follower and release the key.
    pub(crate) fn publish(mut self, outcome: &Result<Response>) {
        let Some(fingerprint) = self.fingerprint.take() else {
            return;
        };
        let slot = self.table.lock().remove(&fingerprint);
        if let Some(slot) = slot {
            slot.sender.send_replace(Some(outcome.clone()));
        }
    }
}

impl Drop for Flight<'_> {
    fn drop(&mut self) {
        if let Some(fingerprint) = self.fingerprint.take() {
            self.table.lock().remove(&fingerprint);
        }
    }
}

/// A submit waiting on an identical one.
pub(crate) struct Follower {
    receiver: watch::Receiver<Outcome>,
}

impl Follower {
    /// The leader's outcome, or `None` if it gave up without one.
    pub(crate) async fn outcome(mut self) -> Outcome {
        match self.receiver.wait_for(Option::is_some).await {
            Ok(outcome) => outcome.clone(),
            Err(_) => None,
        }
    }
}
