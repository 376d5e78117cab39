//! A local stand-in for the back-office API: JWT access tokens, single-use
//! refresh tokens and a few in-memory collections, served with warp.

mod error;
mod handler;
mod router;
mod state;

pub use error::*;
pub use router::routes;
pub use state::*;

use crate::logger::*;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use warp::Filter;

/// All sandbox routes, mounted under `/api`.
pub fn api(
    state: Arc<SandboxState>,
) -> impl Filter<Extract = (impl warp::Reply,), Error = std::convert::Infallible> + Clone {
    warp::path("api").and(routes(state)).recover(recover_error)
}

/// Bind `address` and serve until `cancel` fires. Returns the bound address,
/// which differs from `address` when port 0 was requested.
pub fn spawn(
    state: Arc<SandboxState>,
    address: SocketAddr,
    cancel: CancellationToken,
) -> anyhow::Result<(SocketAddr, JoinHandle<()>)> {
    let (bound, server) = warp::serve(api(state))
        .try_bind_with_graceful_shutdown(address, async move { cancel.cancelled().await })?;
    info!(%bound, "sandbox listening");

    let handle = tokio::spawn(async move {
        server.await;
        info!("sandbox stopped");
    });
    Ok((bound, handle))
}
