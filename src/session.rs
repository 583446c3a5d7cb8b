//! # Gateway Session
//!
//! Connection lifecycle and request serialization for one gateway.
//!
//! A session owns exactly one connection to one gateway and guarantees the
//! two properties the protocol demands:
//!
//! 1. **One connection attempt at a time.** Construction starts a single
//!    connect task; every operation issued before it resolves awaits the same
//!    outcome instead of racing its own attempt. A failed attempt is recorded
//!    so later operations observe the failure rather than hanging.
//! 2. **One exchange at a time.** All operations funnel through a fair async
//!    mutex; lock holders are admitted in arrival order and the lock is
//!    released on every exit path, including cancellation of the waiting or
//!    holding task.
//!
//! Transport-level failures during an exchange are translated to the fixed
//! gateway-connectivity [`Timeout`](crate::error::ModbusError::Timeout)
//! before they reach callers; connect failures surface as
//! [`Connection`](crate::error::ModbusError::Connection) errors naming the
//! gateway address.

use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::config::GatewayConfig;
use crate::error::{ModbusError, ModbusResult};
use crate::protocol::{ModbusRequest, ModbusResponse};
use crate::transport::{ModbusTransport, TcpTransport, TransportStats};

/// Connection lifecycle states
///
/// Transitions: `Connecting -> Ready | Failed`, `Failed -> Connecting` (via
/// [`GatewaySession::open`]), any state `-> Closed` (terminal).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    /// A connect attempt is in flight
    Connecting,
    /// The transport is installed and exchanges may proceed
    Ready,
    /// The last connect attempt failed; the message names the gateway
    Failed(String),
    /// The session was closed; no further attempts are made
    Closed,
}

struct SessionShared {
    config: GatewayConfig,
    state_tx: watch::Sender<ConnectionState>,
    /// Serialization lock and connection handle in one: holding the guard is
    /// holding the exclusive right to the exchange
    transport: Mutex<Option<Box<dyn ModbusTransport>>>,
}

/// One session per gateway: owns the connection, its state machine, and the
/// exchange serialization lock
pub struct GatewaySession {
    shared: Arc<SessionShared>,
    connect_task: std::sync::Mutex<Option<JoinHandle<()>>>,
}

impl GatewaySession {
    /// Create a session and start connecting immediately
    ///
    /// Returns without waiting: the connect attempt runs in the background
    /// and the first operation that needs the connection awaits it.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn connect(config: GatewayConfig) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Connecting);
        let shared = Arc::new(SessionShared {
            config,
            state_tx,
            transport: Mutex::new(None),
        });

        let session = Self {
            shared,
            connect_task: std::sync::Mutex::new(None),
        };
        session.spawn_connect();
        session
    }

    /// Create a session over an already-established transport
    ///
    /// The session starts in `Ready` with no connect task. Used by tests to
    /// inject a mock transport and by callers that manage their own sockets.
    pub fn from_transport(config: GatewayConfig, transport: Box<dyn ModbusTransport>) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Ready);
        let shared = Arc::new(SessionShared {
            config,
            state_tx,
            transport: Mutex::new(Some(transport)),
        });

        Self {
            shared,
            connect_task: std::sync::Mutex::new(None),
        }
    }

    /// The configuration this session was built from
    pub fn config(&self) -> &GatewayConfig {
        &self.shared.config
    }

    /// Current connection state
    pub fn state(&self) -> ConnectionState {
        self.shared.state_tx.borrow().clone()
    }

    /// Restart the shared connect attempt after a failure
    ///
    /// No-op while an attempt is in flight or the session is `Ready`. The
    /// session stays closed once closed.
    pub fn open(&self) -> ModbusResult<()> {
        if *self.shared.state_tx.borrow() == ConnectionState::Closed {
            return Err(ModbusError::connection("session closed"));
        }

        let restarted = self.shared.state_tx.send_if_modified(|state| {
            if matches!(state, ConnectionState::Failed(_)) {
                *state = ConnectionState::Connecting;
                true
            } else {
                false
            }
        });

        if restarted {
            self.spawn_connect();
        }
        Ok(())
    }

    fn spawn_connect(&self) {
        let shared = Arc::clone(&self.shared);
        let handle = tokio::spawn(async move {
            Self::establish(shared).await;
        });
        *self.connect_task.lock().expect("connect task lock poisoned") = Some(handle);
    }

    /// The single shared connect attempt
    ///
    /// Exactly one runs per `Connecting` state; its outcome is published
    /// through the watch channel for every waiter.
    async fn establish(shared: Arc<SessionShared>) {
        let result = async {
            let addr = shared.config.resolve().await?;
            TcpTransport::connect(addr, shared.config.unit_id, shared.config.timeout()).await
        }.await;

        match result {
            Ok(mut transport) => {
                transport.set_packet_logging(shared.config.packet_logging);
                let mut slot = shared.transport.lock().await;
                let became_ready = shared.state_tx.send_if_modified(|state| {
                    if *state == ConnectionState::Connecting {
                        *state = ConnectionState::Ready;
                        true
                    } else {
                        false
                    }
                });
                if became_ready {
                    debug!(address = %shared.config.socket_addr(), "gateway connection ready");
                    *slot = Some(Box::new(transport));
                } else {
                    // Closed while we were connecting; tear the socket down
                    let _ = transport.close().await;
                }
            },
            Err(e) => {
                let message = e.to_string();
                let recorded = shared.state_tx.send_if_modified(|state| {
                    if *state == ConnectionState::Connecting {
                        *state = ConnectionState::Failed(message.clone());
                        true
                    } else {
                        false
                    }
                });
                if recorded {
                    warn!(address = %shared.config.socket_addr(), error = %message,
                          "gateway connection failed");
                }
            },
        }
    }

    /// Wait until the connect attempt resolves
    ///
    /// Cancellation-safe: waiting consumes nothing.
    async fn wait_ready(&self) -> ModbusResult<()> {
        let mut rx = self.shared.state_tx.subscribe();
        loop {
            match &*rx.borrow_and_update() {
                ConnectionState::Ready => return Ok(()),
                ConnectionState::Failed(message) => {
                    return Err(ModbusError::connection(message.clone()));
                },
                ConnectionState::Closed => {
                    return Err(ModbusError::connection("session closed"));
                },
                ConnectionState::Connecting => {},
            }

            if rx.changed().await.is_err() {
                return Err(ModbusError::connection("session dropped"));
            }
        }
    }

    /// Perform exactly one serialized exchange
    ///
    /// Awaits connection readiness, takes the exchange lock (FIFO), runs the
    /// request through the transport and translates transport-level failures
    /// into the stable caller vocabulary. The lock is released on every exit
    /// path; an exchange failure never leaves it held.
    pub async fn execute(&self, request: &ModbusRequest) -> ModbusResult<ModbusResponse> {
        self.wait_ready().await?;

        let mut slot = self.shared.transport.lock().await;
        let transport = match slot.as_mut() {
            Some(transport) => transport,
            // close() emptied the slot after we passed wait_ready
            None => return Err(ModbusError::connection("session closed")),
        };

        match transport.request(request).await {
            Ok(response) => Ok(response),
            // Re-establishment failures keep their address-bearing message
            Err(e @ ModbusError::Connection { .. }) => Err(e),
            Err(e) if e.is_transport_error() => {
                debug!(error = %e, "exchange failed, translating");
                Err(ModbusError::timeout("not connected to gateway"))
            },
            Err(e) => Err(e),
        }
    }

    /// Transport statistics, if the connection was ever established
    pub async fn stats(&self) -> Option<TransportStats> {
        self.shared.transport.lock().await.as_ref().map(|t| t.get_stats())
    }

    /// Whether the transport currently believes it is connected
    pub async fn is_connected(&self) -> bool {
        self.shared.transport.lock().await
            .as_ref()
            .map(|t| t.is_connected())
            .unwrap_or(false)
    }

    /// Close the session
    ///
    /// Idempotent and safe to call while not connected: any pending connect
    /// attempt is aborted, the socket is shut down, and every waiter observes
    /// `Closed`.
    pub async fn close(&self) -> ModbusResult<()> {
        if let Some(handle) = self.connect_task.lock().expect("connect task lock poisoned").take() {
            handle.abort();
        }

        self.shared.state_tx.send_if_modified(|state| {
            if *state == ConnectionState::Closed {
                false
            } else {
                *state = ConnectionState::Closed;
                true
            }
        });

        let mut slot = self.shared.transport.lock().await;
        if let Some(mut transport) = slot.take() {
            transport.close().await?;
        }
        Ok(())
    }
}

impl Drop for GatewaySession {
    /// Deterministic teardown without an executor: abort the connect task and
    /// mark the session closed. The socket itself closes when the transport
    /// drops with the shared state.
    fn drop(&mut self) {
        if let Ok(mut task) = self.connect_task.lock() {
            if let Some(handle) = task.take() {
                handle.abort();
            }
        }
        self.shared.state_tx.send_if_modified(|state| {
            if *state == ConnectionState::Closed {
                false
            } else {
                *state = ConnectionState::Closed;
                true
            }
        });
    }
}
