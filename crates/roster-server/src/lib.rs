//! Roster presence server.
//!
//! Clients connect over QUIC, are assigned a unique session id, and
//! receive a live count of connected sessions whenever that count
//! changes.
//!
//! # Architecture
//!
//! All membership state lives in the [`Coordinator`], driven by a single
//! task — one serialization point, no locks. Each accepted connection
//! gets its own adapter task that owns the wire: it submits an `Arrival`
//! carrying a bounded mailbox, translates coordinator notifications into
//! JSON lines, and turns every kind of connection death into exactly one
//! `Departure`. The two sides meet only at bounded channels, so a slow or
//! dead client can never stall the coordinator or its broadcast.
//!
//! # Components
//!
//! - [`Coordinator`]: session table, id assignment, count broadcast
//! - [`QuicTransport`]: Quinn endpoint accepting client connections
//! - adapter tasks: per-connection wire glue (spawned by [`Server::run`])

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod coordinator;
mod error;
mod mailbox;
mod transport;

use bytes::BytesMut;
use quinn::SendStream;

pub use coordinator::{
    Coordinator, CoordinatorConfig, CoordinatorError, DEFAULT_ID_SPACE, LifecycleEvent,
    Notification, OverflowPolicy, SessionId,
};
pub use error::ServerError;
pub use mailbox::{DeliveryError, Mailbox};
use roster_proto::ServerMessage;
use tokio::sync::mpsc;
pub use transport::{QuicConnection, QuicTransport};

/// Sending half of a session's mailbox in the production runtime.
pub type SessionMailbox = mpsc::Sender<Notification>;

/// Lifecycle event as carried by the production event queue.
pub type RuntimeEvent = LifecycleEvent<SessionMailbox>;

/// Server configuration for the production runtime.
#[derive(Debug, Clone)]
pub struct ServerRuntimeConfig {
    /// Address to bind to (e.g. "0.0.0.0:12345")
    pub bind_address: String,
    /// Path to TLS certificate (PEM format); self-signed if absent
    pub cert_path: Option<String>,
    /// Path to TLS private key (PEM format)
    pub key_path: Option<String>,
    /// Capacity of the shared lifecycle event queue. Adapter tasks wait
    /// when it is full — backpressure on connect/disconnect storms.
    pub event_queue_capacity: usize,
    /// Capacity of each per-session mailbox. Must be at least 1; small
    /// on purpose, a session that lags this far behind is already stale.
    pub mailbox_capacity: usize,
    /// Coordinator configuration (id space, overflow policy)
    pub coordinator: CoordinatorConfig,
}

impl Default for ServerRuntimeConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:12345".to_string(),
            cert_path: None,
            key_path: None,
            event_queue_capacity: 100,
            mailbox_capacity: 10,
            coordinator: CoordinatorConfig::default(),
        }
    }
}

/// Production presence server.
///
/// Wraps the [`Coordinator`] with Quinn QUIC transport and tokio glue.
pub struct Server {
    /// QUIC endpoint
    transport: QuicTransport,
    /// Runtime configuration
    config: ServerRuntimeConfig,
}

impl Server {
    /// Create and bind a new server.
    pub fn bind(config: ServerRuntimeConfig) -> Result<Self, ServerError> {
        let transport = QuicTransport::bind(
            &config.bind_address,
            config.cert_path.as_deref(),
            config.key_path.as_deref(),
        )?;

        Ok(Self { transport, config })
    }

    /// Local address the server is bound to.
    pub fn local_addr(&self) -> Result<std::net::SocketAddr, ServerError> {
        self.transport.local_addr()
    }

    /// Run the server, accepting connections and processing lifecycle
    /// events.
    ///
    /// Returns only on a fatal coordinator failure (id-space
    /// exhaustion); per-connection errors stay contained in their
    /// adapter tasks.
    pub async fn run(self) -> Result<(), ServerError> {
        let (events_tx, events_rx) = mpsc::channel(self.config.event_queue_capacity);
        let coordinator = Coordinator::new(self.config.coordinator.clone());

        let mut coordinator_task = tokio::spawn(run_coordinator(events_rx, coordinator));

        loop {
            tokio::select! {
                finished = &mut coordinator_task => {
                    return match finished {
                        Ok(Ok(())) => Ok(()),
                        Ok(Err(e)) => {
                            tracing::error!(error = %e, "fatal coordinator failure");
                            Err(e)
                        },
                        Err(e) => {
                            Err(ServerError::Internal(format!("coordinator task failed: {e}")))
                        },
                    };
                },
                accepted = self.transport.accept() => match accepted {
                    Ok(conn) => {
                        tracing::debug!(remote = %conn.remote_addr(), "new connection");

                        let events = events_tx.clone();
                        let mailbox_capacity = self.config.mailbox_capacity;
                        tokio::spawn(handle_connection(conn, events, mailbox_capacity));
                    },
                    Err(e) => {
                        tracing::error!(error = %e, "accept error");
                    },
                },
            }
        }
    }
}

/// Drive the coordinator event loop until the queue closes or a fatal
/// error occurs.
///
/// Public so tests can run the production loop over real bounded
/// channels without a network endpoint.
pub async fn run_coordinator(
    mut events: mpsc::Receiver<RuntimeEvent>,
    mut coordinator: Coordinator<SessionMailbox>,
) -> Result<(), ServerError> {
    while let Some(event) = events.recv().await {
        coordinator.process_event(event)?;
    }

    tracing::debug!("event queue closed, coordinator stopping");
    Ok(())
}

/// Adapter task for one client connection.
///
/// Bridges the wire and the coordinator: submits the `Arrival` carrying
/// this session's mailbox, writes notifications to the wire as JSON
/// lines, and turns any termination — peer close, write failure,
/// force-disconnect — into exactly one `Departure` for the assigned id.
/// The coordinator is never blocked on wire I/O.
async fn handle_connection(
    conn: QuicConnection,
    events: mpsc::Sender<RuntimeEvent>,
    mailbox_capacity: usize,
) {
    let remote = conn.remote_addr();

    let mut wire = match conn.open_uni().await {
        Ok(stream) => stream,
        Err(e) => {
            tracing::debug!(%remote, error = %e, "failed to open outbound stream");
            return;
        },
    };

    let (mailbox_tx, mut mailbox_rx) = mpsc::channel(mailbox_capacity);

    // Awaiting send: blocks when the event queue is full, pushing back on
    // connect storms instead of growing without bound.
    if events.send(LifecycleEvent::Arrival { mailbox: mailbox_tx }).await.is_err() {
        tracing::debug!(%remote, "coordinator gone, dropping connection");
        conn.close(1u32.into(), b"shutting down");
        return;
    }

    let mut session_id = None;
    let mut buf = BytesMut::with_capacity(64);

    loop {
        tokio::select! {
            delivered = mailbox_rx.recv() => match delivered {
                Some(notification) => {
                    if let Notification::IdAssigned { session_id: id } = notification {
                        session_id = Some(id);
                    }

                    if let Err(e) = forward_notification(&mut wire, notification, &mut buf).await {
                        tracing::debug!(%remote, error = %e, "dropping session");
                        break;
                    }
                },
                // Mailbox dropped by the coordinator: force-disconnect.
                None => {
                    tracing::debug!(%remote, "force-disconnected by coordinator");
                    break;
                },
            },
            reason = conn.closed() => {
                tracing::debug!(%remote, %reason, "connection closed");
                break;
            },
        }
    }

    conn.close(0u32.into(), b"session over");

    // The assignment may still be sitting unread in the mailbox if the
    // connection died before anything was written to the wire. Drain it
    // so the departure below reports the right id. If it is absent, the
    // coordinator either never processed the arrival or will abandon the
    // admission when it finds the mailbox closed.
    while let Ok(notification) = mailbox_rx.try_recv() {
        if let Notification::IdAssigned { session_id: id } = notification {
            session_id = Some(id);
        }
    }

    // Exactly one departure per admitted connection, on every exit path.
    // If no id ever arrived, the coordinator never admitted this session
    // and there is nothing to report.
    if let Some(session_id) = session_id {
        if events.send(LifecycleEvent::Departure { session_id }).await.is_err() {
            tracing::debug!(session_id, "coordinator gone before departure");
        }
    }
}

/// Encode one notification as a JSON line and write it to the wire.
async fn forward_notification(
    wire: &mut SendStream,
    notification: Notification,
    buf: &mut BytesMut,
) -> Result<(), ServerError> {
    buf.clear();
    roster_proto::encode_line(&wire_message(notification), buf)?;

    wire.write_all(buf)
        .await
        .map_err(|e| ServerError::Transport(format!("wire write failed: {e}")))
}

/// Translate a coordinator notification to its wire message.
fn wire_message(notification: Notification) -> ServerMessage {
    match notification {
        Notification::IdAssigned { session_id } => ServerMessage::IdAssigned { id: session_id },
        Notification::CountChanged { count } => {
            ServerMessage::CountChanged { count: count as u64 }
        },
    }
}
