//! tarpc transport for geopin server

use futures::prelude::*;
use geopin::GeoContext;

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use tarpc::server::{self, Channel};
use tarpc::tokio_serde::formats::Json;
use tokio::net::TcpStream;
use tokio::task::JoinSet;
use tracing::{debug, error, info};

use crate::handler::Handler;
use crate::protocol::{ConnectionStats, GeoService};

use tokio_util::codec::{Framed, LengthDelimitedCodec};

/// Counts client connections for the `stats` call.
#[derive(Debug, Default)]
pub struct ConnectionTracker {
    open: AtomicUsize,
    accepted: AtomicU64,
}

impl ConnectionTracker {
    fn opened(self: &Arc<Self>) -> ConnectionGuard {
        self.open.fetch_add(1, Ordering::Relaxed);
        self.accepted.fetch_add(1, Ordering::Relaxed);
        ConnectionGuard(self.clone())
    }

    pub fn snapshot(&self) -> ConnectionStats {
        ConnectionStats {
            open: self.open.load(Ordering::Relaxed),
            accepted: self.accepted.load(Ordering::Relaxed),
        }
    }
}

/// Marks a connection closed when dropped, including on abort.
struct ConnectionGuard(Arc<ConnectionTracker>);

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.0.open.fetch_sub(1, Ordering::Relaxed);
    }
}

async fn serve_connection(
    socket: TcpStream,
    peer: SocketAddr,
    handler: Handler,
    guard: ConnectionGuard,
) {
    let framed = Framed::new(socket, LengthDelimitedCodec::new());
    let transport = tarpc::serde_transport::new(framed, Json::default());

    server::BaseChannel::with_defaults(transport)
        .execute(handler.serve())
        .for_each(|response| async move {
            tokio::spawn(response);
        })
        .await;

    drop(guard);
    debug!("Connection from {} closed", peer);
}

/// Serve `ctx` on `listener` until `shutdown` resolves.
///
/// Each connection gets its own tarpc channel; requests on a channel run
/// as independent tasks. Open connections are closed on shutdown. The
/// context itself is left running so callers can still drain webhook
/// deliveries afterwards.
pub async fn run_server(
    listener: tokio::net::TcpListener,
    ctx: Arc<GeoContext>,
    mut shutdown: impl Future<Output = ()> + Unpin + Send + 'static,
) -> anyhow::Result<()> {
    let connections = Arc::new(ConnectionTracker::default());
    let handler = Handler::new(ctx, connections.clone());
    let mut tasks = JoinSet::new();

    info!("geopin RPC server listening on {}", listener.local_addr()?);

    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((socket, peer)) => {
                    let guard = connections.opened();
                    debug!("Accepted connection from {} ({} open)", peer, connections.snapshot().open);
                    tasks.spawn(serve_connection(socket, peer, handler.clone(), guard));
                }
                Err(e) => error!("Accept error: {}", e),
            },
            Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                if let Err(e) = joined {
                    error!("Connection task failed: {}", e);
                }
            }
            _ = &mut shutdown => {
                info!("Shutdown signal received, stopping server...");
                break;
            }
        }
    }

    let stats = connections.snapshot();
    info!(
        "Closing {} open connections ({} served in total)",
        stats.open, stats.accepted
    );
    tasks.shutdown().await;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guard_tracks_open_connections() {
        let tracker = Arc::new(ConnectionTracker::default());
        let first = tracker.opened();
        let second = tracker.opened();
        assert_eq!(tracker.snapshot(), ConnectionStats { open: 2, accepted: 2 });

        drop(first);
        assert_eq!(tracker.snapshot(), ConnectionStats { open: 1, accepted: 2 });
        drop(second);
        assert_eq!(tracker.snapshot().open, 0);
        assert_eq!(tracker.snapshot().accepted, 2);
    }
}
