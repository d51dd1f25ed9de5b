//! Remote "open by path" endpoint.
//!
//! A single route, `POST /open_file` with a form body `path=<file>`, runs
//! [`Session::open_by_path`](crate::session::Session::open_by_path) on the
//! shared session. The call goes through the session lock like any console
//! command, and the store round-trip is bounded by a timeout so a stuck
//! store cannot hang the listener.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Form, Router};
use serde::Deserialize;

use crate::document::Document;
use crate::error::{EditorError, Result};
use crate::session::{Deadline, SessionHandle};

/// Default bound on a remote open.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone)]
struct ServerState {
    session: SessionHandle,
    timeout: Duration,
}

/// Form body of `POST /open_file`.
#[derive(Debug, Deserialize)]
pub struct OpenFileForm {
    pub path: String,
}

/// Build the router; useful on its own for tests and embedding.
pub fn router(session: SessionHandle, timeout: Duration) -> Router {
    Router::new()
        .route("/open_file", post(open_file))
        .fallback(|| async { (StatusCode::NOT_FOUND, "Not Found") })
        .with_state(ServerState { session, timeout })
}

async fn open_file(
    State(state): State<ServerState>,
    Form(form): Form<OpenFileForm>,
) -> (StatusCode, String) {
    let path = PathBuf::from(form.path.trim());
    match open_with_timeout(state.session, path.clone(), state.timeout).await {
        Ok(doc) => {
            tracing::info!(path = %path.display(), name = %doc.name, "remote open succeeded");
            (StatusCode::OK, "File opened successfully".to_string())
        }
        Err(err) => {
            tracing::warn!(path = %path.display(), error = %err, "remote open failed");
            let status = match err {
                EditorError::FileAccess { .. } => StatusCode::NOT_FOUND,
                EditorError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            };
            (status, format!("Error: {err}"))
        }
    }
}

/// Open `path` on a blocking worker, giving up after `timeout`.
///
/// On expiry the caller gets a store-category [`EditorError::Timeout`]. The
/// worker carries the same deadline and drops the open once it passes, so a
/// reported timeout never turns into a late document switch.
pub async fn open_with_timeout(
    session: SessionHandle,
    path: PathBuf,
    timeout: Duration,
) -> Result<Document> {
    let deadline = Deadline::after(timeout);
    let task = tokio::task::spawn_blocking(move || session.open_by_path_within(&path, deadline));
    match tokio::time::timeout(timeout, task).await {
        Ok(Ok(result)) => result,
        Ok(Err(join_err)) => Err(EditorError::Store(format!("open task failed: {join_err}"))),
        Err(_) => Err(EditorError::Timeout(deadline.budget())),
    }
}

/// Serve the endpoint on `addr` until the process exits.
///
/// # Errors
/// Returns an error if the address cannot be bound or the server fails.
pub async fn serve(
    session: SessionHandle,
    addr: SocketAddr,
    timeout: Duration,
) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "remote listener started");
    axum::serve(listener, router(session, timeout)).await?;
    Ok(())
}

/// Run the endpoint on its own thread with its own runtime, next to the
/// blocking console loop.
///
/// # Errors
/// Returns an error if the thread cannot be spawned.
pub fn spawn(
    session: SessionHandle,
    addr: SocketAddr,
    timeout: Duration,
) -> std::io::Result<thread::JoinHandle<()>> {
    thread::Builder::new()
        .name("tabula-remote".to_string())
        .spawn(move || {
            let runtime = match tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()
            {
                Ok(runtime) => runtime,
                Err(err) => {
                    tracing::error!(error = %err, "failed to start remote runtime");
                    return;
                }
            };
            if let Err(err) = runtime.block_on(serve(session, addr, timeout)) {
                tracing::error!(error = %err, "remote listener stopped");
            }
        })
}
