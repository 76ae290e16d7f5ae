use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::{header, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Router;
use log::{debug, info, warn};
use serde_json::Value;
use tokio::net::{TcpListener, TcpSocket};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::error::CollectError;
use crate::metrics::{RuntimeMetrics, METRICS};
use crate::schema::Payload;

/// How long a finished server may take to close its connection
/// before the task is aborted.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// Problem payloads with many large samples exceed axum's 2 MiB default.
const MAX_BODY_BYTES: usize = 64 * 1024 * 1024;

/// PayloadSource is the seam between the collector and wherever
/// payloads come from.
///
/// CONTRACT:
/// - `timeout = None` waits until a payload arrives
/// - `timeout = Some(t)` returns `Ok(None)` if nothing arrived within `t`
/// - exactly one payload is consumed per `Ok(Some(_))`
///
/// The HTTP [`Listener`] is the production source; tests drive the
/// collector with scripted sources.
#[async_trait]
pub trait PayloadSource: Send {
    async fn receive(&mut self, timeout: Option<Duration>) -> Result<Option<Payload>, CollectError>;
}

// ------------------------------------------------------------
// Listener
// ------------------------------------------------------------
//
// Single-request HTTP endpoint for the companion extension.
//
// Each `receive` call:
// - binds the loopback socket
// - serves requests until one POST body has been read
// - shuts the server down and releases the socket
//
// The socket is only bound while a `receive` is in flight, so a
// push that arrives between two calls is refused by the OS rather
// than queued.
//
pub struct Listener {
    addr: SocketAddr,

    /// Ceiling for waits requested without a timeout
    max_wait: Option<Duration>,
}

impl Listener {
    pub fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            max_wait: None,
        }
    }

    pub fn with_max_wait(mut self, max_wait: Option<Duration>) -> Self {
        self.max_wait = max_wait;
        self
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    fn bind(&self) -> Result<TcpListener, CollectError> {
        let bind_err = |source: std::io::Error| CollectError::Bind {
            addr: self.addr,
            source,
        };

        let socket = if self.addr.is_ipv4() {
            TcpSocket::new_v4()
        } else {
            TcpSocket::new_v6()
        }
        .map_err(bind_err)?;

        socket.set_reuseaddr(true).map_err(bind_err)?;
        socket.bind(self.addr).map_err(bind_err)?;
        socket.listen(16).map_err(bind_err)
    }

    /// Waits for one payload.
    ///
    /// A body that is not JSON is answered with `400` and then
    /// reported as [`CollectError::MalformedPayload`].
    pub async fn receive_once(&self, timeout: Option<Duration>) -> Result<Option<Payload>, CollectError> {
        let listener = self.bind()?;
        debug!("listening on {}", self.addr);

        let (tx, mut rx) = oneshot::channel();
        let mut server = OneShotServer::spawn(listener, tx);

        // An unbounded wait is still capped by `max_wait`, if configured.
        let (limit, capped) = match (timeout, self.max_wait) {
            (Some(t), _) => (Some(t), false),
            (None, Some(max)) => (Some(max), true),
            (None, None) => (None, false),
        };

        let received = match limit {
            Some(limit) => tokio::time::timeout(limit, &mut rx).await.ok(),
            None => Some((&mut rx).await),
        };

        server.shutdown().await;

        // A push can land right as the timeout fires; keep it.
        let received = match received {
            Some(result) => Some(result),
            None => rx.try_recv().ok().map(Ok),
        };

        match received {
            Some(Ok(Ok(value))) => {
                RuntimeMetrics::incr(&METRICS.payloads_received);
                let payload = Payload::new(value);
                info!("Got data {}", payload);
                Ok(Some(payload))
            }
            Some(Ok(Err(e))) => {
                RuntimeMetrics::incr(&METRICS.malformed_payloads);
                warn!("Got malformed data: {}", e);
                Err(CollectError::MalformedPayload(e))
            }
            Some(Err(_)) => Err(CollectError::Serve(format!(
                "server on {} stopped before a payload arrived",
                self.addr
            ))),
            None if capped => Err(CollectError::WaitLimitExceeded(self.max_wait.unwrap_or_default())),
            None => {
                RuntimeMetrics::incr(&METRICS.idle_waits);
                info!("Got no data");
                Ok(None)
            }
        }
    }
}

#[async_trait]
impl PayloadSource for Listener {
    async fn receive(&mut self, timeout: Option<Duration>) -> Result<Option<Payload>, CollectError> {
        self.receive_once(timeout).await
    }
}

// ------------------------------------------------------------
// One-shot server
// ------------------------------------------------------------

type Delivery = Result<Value, serde_json::Error>;

/// Hands the first POST body over to the waiting `receive`.
///
/// Later requests find the slot empty and get `503`, which only
/// happens in the short window between hand-over and shutdown.
#[derive(Clone)]
struct IngestState {
    slot: Arc<Mutex<Option<oneshot::Sender<Delivery>>>>,
}

impl IngestState {
    fn take(&self) -> Option<oneshot::Sender<Delivery>> {
        self.slot.lock().ok().and_then(|mut slot| slot.take())
    }
}

/// Running axum server plus its shutdown trigger.
///
/// Dropping it aborts the task, so the socket is released even if
/// the `receive` future itself is cancelled.
struct OneShotServer {
    stop: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<std::io::Result<()>>>,
}

impl OneShotServer {
    fn spawn(listener: TcpListener, tx: oneshot::Sender<Delivery>) -> Self {
        let state = IngestState {
            slot: Arc::new(Mutex::new(Some(tx))),
        };

        // Any path is accepted.
        let app = Router::new()
            .fallback(ingest)
            .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
            .with_state(state);

        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = stop_rx.await;
                })
                .await
        });

        Self {
            stop: Some(stop_tx),
            task: Some(task),
        }
    }

    async fn shutdown(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        let Some(mut task) = self.task.take() else {
            return;
        };

        match tokio::time::timeout(SHUTDOWN_GRACE, &mut task).await {
            Ok(Ok(Ok(()))) => {}
            Ok(Ok(Err(e))) => warn!("listener server error: {}", e),
            Ok(Err(e)) => warn!("listener task failed: {}", e),
            Err(_) => {
                debug!("listener did not drain within {:?}, aborting", SHUTDOWN_GRACE);
                task.abort();
                let _ = task.await;
            }
        }
    }
}

impl Drop for OneShotServer {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

async fn ingest(State(state): State<IngestState>, method: Method, body: Bytes) -> Response {
    if method != Method::POST {
        debug!("ignoring {} request", method);
        return reply(StatusCode::METHOD_NOT_ALLOWED);
    }

    let Some(tx) = state.take() else {
        return reply(StatusCode::SERVICE_UNAVAILABLE);
    };

    let parsed: Delivery = serde_json::from_slice(&body);
    let status = if parsed.is_ok() {
        StatusCode::OK
    } else {
        StatusCode::BAD_REQUEST
    };
    let _ = tx.send(parsed);
    reply(status)
}

/// The server goes away after one request; never offer keep-alive.
fn reply(status: StatusCode) -> Response {
    (status, [(header::CONNECTION, "close")]).into_response()
}
