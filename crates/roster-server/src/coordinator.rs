//! Session coordinator.
//!
//! The single authority over "who is connected". Every membership change
//! (arrival, departure) funnels through [`Coordinator::process_event`],
//! invoked one-at-a-time by the runtime's coordinator task, so the session
//! table needs no locking — mutual exclusion is structural. Outbound
//! delivery goes through bounded per-session mailboxes and never blocks:
//! a session that cannot keep up is handled by an explicit
//! [`OverflowPolicy`] instead of stalling the broadcast to everyone else.
//!
//! # Invariants
//!
//! - Every key in the session table belongs to exactly one session that
//!   has been told its id and has not yet been reported (or forced) as
//!   terminated.
//! - The broadcast count always equals the table size; it is never
//!   negative and never skips or duplicates a membership change.
//! - A newly admitted session receives its id assignment before any count
//!   update: the assignment is the first message placed into its fresh
//!   mailbox.

use std::{
    collections::{HashMap, HashSet},
    fmt,
};

use thiserror::Error;

use crate::mailbox::{DeliveryError, Mailbox};

/// Identifier for a connected session, unique among live sessions.
///
/// Assigned by the coordinator on admission, never chosen by the client.
/// Freed ids become eligible for reassignment once their departure has
/// been processed.
pub type SessionId = u32;

/// Default bound on the session id space.
///
/// Ids are scanned upward from zero, so this is also the maximum number
/// of concurrently tracked sessions. Exceeding it means the deployment
/// has vastly outgrown this design; the failure is deliberately fatal.
pub const DEFAULT_ID_SPACE: u32 = 10_000_000;

/// Errors from coordinator event processing.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoordinatorError {
    /// Every id in the bounded id space is taken.
    ///
    /// Fatal: the process should halt loudly rather than keep running
    /// with corrupt admission behavior.
    #[error("session id space exhausted: all {limit} ids in use")]
    IdSpaceExhausted {
        /// Size of the id space that was scanned.
        limit: u32,
    },
}

/// Lifecycle events — the only coordinator inputs.
///
/// Produced by transport adapter tasks and consumed by the coordinator
/// task through the shared bounded event queue.
#[derive(Debug)]
pub enum LifecycleEvent<M> {
    /// A new session wants to join. Carries the mailbox through which the
    /// session will receive events; it has no id yet.
    Arrival {
        /// Outbound queue for this session, created by its adapter.
        mailbox: M,
    },

    /// The session previously assigned `session_id` has disconnected.
    ///
    /// Adapters send this exactly once per admitted connection, on every
    /// exit path — remote close, wire error, or force-disconnect.
    Departure {
        /// Id the coordinator assigned to the departing session.
        session_id: SessionId,
    },
}

/// Outbound notifications — the only coordinator outputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notification {
    /// Delivered exactly once, only to the newly admitted session, before
    /// any `CountChanged` reaches that session.
    IdAssigned {
        /// The id this session will carry for its lifetime.
        session_id: SessionId,
    },

    /// Delivered to every live session whenever the count changes,
    /// including the session whose arrival caused the change.
    CountChanged {
        /// Number of currently-connected sessions.
        count: usize,
    },
}

/// Policy applied when a live session's mailbox is full.
///
/// Closed mailboxes are always evicted regardless of policy; a closed
/// mailbox means the session's adapter is already gone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverflowPolicy {
    /// Force-disconnect the unresponsive session.
    ///
    /// Its mailbox is dropped (which its adapter observes as channel
    /// closure) and its id is parked until the adapter's departure
    /// arrives. The default: a session too slow to drain ten pending
    /// count updates is not worth keeping.
    #[default]
    Disconnect,

    /// Drop the notification for that session and keep it connected.
    ///
    /// The session's view of the count goes stale until it drains its
    /// mailbox and a later change is delivered.
    DropNotification,
}

/// Coordinator configuration.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Ids are allocated by scanning `0..id_space` for the lowest free
    /// id. No free id within the bound is fatal.
    pub id_space: u32,

    /// What to do when a live session's mailbox refuses a delivery.
    pub overflow: OverflowPolicy,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self { id_space: DEFAULT_ID_SPACE, overflow: OverflowPolicy::Disconnect }
    }
}

/// The single authority over session membership.
///
/// Owns the session table and the aggregate count; nothing else reads or
/// writes them. Generic over the mailbox type so the core is exercisable
/// without a runtime or a network.
pub struct Coordinator<M> {
    /// Live sessions: id → mailbox.
    sessions: HashMap<SessionId, M>,

    /// Ids force-disconnected by the coordinator whose adapter-side
    /// departure has not yet arrived. Not eligible for reassignment;
    /// the matching departure consumes the entry silently. Without this,
    /// a reassigned id could be torn down by the stale departure of its
    /// previous owner.
    pending_departures: HashSet<SessionId>,

    config: CoordinatorConfig,
}

impl<M: Mailbox> Coordinator<M> {
    /// Create a coordinator with the given configuration.
    pub fn new(config: CoordinatorConfig) -> Self {
        Self { sessions: HashMap::new(), pending_departures: HashSet::new(), config }
    }

    /// Process one lifecycle event.
    ///
    /// The caller must invoke this strictly one-at-a-time; the runtime
    /// guarantees that by running a single coordinator task.
    ///
    /// # Errors
    ///
    /// [`CoordinatorError::IdSpaceExhausted`] is fatal and must terminate
    /// the process. Everything else (unknown departures, refused
    /// deliveries) is handled locally.
    pub fn process_event(&mut self, event: LifecycleEvent<M>) -> Result<(), CoordinatorError> {
        match event {
            LifecycleEvent::Arrival { mailbox } => self.handle_arrival(mailbox),
            LifecycleEvent::Departure { session_id } => {
                self.handle_departure(session_id);
                Ok(())
            },
        }
    }

    /// Number of currently-connected sessions.
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Force-disconnected ids awaiting their departure confirmation.
    #[cfg(test)]
    pub(crate) fn pending_departure_count(&self) -> usize {
        self.pending_departures.len()
    }

    fn handle_arrival(&mut self, mailbox: M) -> Result<(), CoordinatorError> {
        let session_id = self.allocate_id()?;

        // The mailbox is freshly created and empty, so the only way this
        // delivery fails is the adapter dying between enqueueing the
        // arrival and the coordinator processing it. No id was ever
        // observed by anyone; admission is simply abandoned.
        if let Err(e) = mailbox.try_deliver(Notification::IdAssigned { session_id }) {
            tracing::warn!(session_id, error = %e, "session vanished before admission");
            return Ok(());
        }

        self.sessions.insert(session_id, mailbox);
        tracing::info!(session_id, count = self.sessions.len(), "session admitted");

        self.broadcast_count();
        Ok(())
    }

    fn handle_departure(&mut self, session_id: SessionId) {
        if self.sessions.remove(&session_id).is_some() {
            tracing::info!(session_id, count = self.sessions.len(), "session departed");
            self.broadcast_count();
        } else if self.pending_departures.remove(&session_id) {
            tracing::debug!(session_id, "departure confirmed for force-disconnected session");
        } else {
            // Duplicate or never-assigned id: a protocol inconsistency on
            // the adapter side. No table mutation, no broadcast.
            tracing::warn!(session_id, "departure for unknown session id");
        }
    }

    /// Lowest id in `0..id_space` neither held by a live session nor
    /// parked awaiting a departure confirmation.
    fn allocate_id(&self) -> Result<SessionId, CoordinatorError> {
        (0..self.config.id_space)
            .find(|id| !self.sessions.contains_key(id) && !self.pending_departures.contains(id))
            .ok_or(CoordinatorError::IdSpaceExhausted { limit: self.config.id_space })
    }

    /// Broadcast the current count to every live session.
    ///
    /// Deliveries are non-blocking. Evicting a refused session changes
    /// the count again, so the broadcast repeats until a round completes
    /// with no evictions; survivors then hold the corrected count.
    fn broadcast_count(&mut self) {
        loop {
            let count = self.sessions.len();
            let mut evicted = Vec::new();

            for (&session_id, mailbox) in &self.sessions {
                match mailbox.try_deliver(Notification::CountChanged { count }) {
                    Ok(()) => {},
                    Err(DeliveryError::Closed) => evicted.push(session_id),
                    Err(DeliveryError::Full) => match self.config.overflow {
                        OverflowPolicy::Disconnect => evicted.push(session_id),
                        OverflowPolicy::DropNotification => {
                            tracing::warn!(session_id, count, "mailbox full, count update dropped");
                        },
                    },
                }
            }

            if evicted.is_empty() {
                break;
            }

            for session_id in evicted {
                self.sessions.remove(&session_id);
                self.pending_departures.insert(session_id);
                tracing::warn!(session_id, "force-disconnecting unresponsive session");
            }
        }
    }
}

impl<M> fmt::Debug for Coordinator<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Coordinator")
            .field("session_count", &self.sessions.len())
            .field("pending_departures", &self.pending_departures.len())
            .finish()
    }
}
