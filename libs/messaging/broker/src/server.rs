//! # Broker Server
//!
//! TCP accept loop. Each accepted socket is assigned a connection id and
//! served on its own task. Accept errors are logged and the loop keeps going;
//! when the shutdown future completes the loop stops and every topic is
//! closed, which in turn closes every subscribed connection.

use crate::connection::handle_connection;
use crate::context::BrokerContext;
use crate::error::BrokerResult;
use broker_config::BrokerConfig;
use broker_core::TopicRegistry;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

pub struct BrokerServer {
    context: Arc<BrokerContext>,
    connection_counter: AtomicU64,
}

impl BrokerServer {
    /// Create the server state. Requires a tokio runtime.
    pub fn new(config: &BrokerConfig) -> Self {
        Self::with_context(BrokerContext::from_config(config))
    }

    pub fn with_context(context: BrokerContext) -> Self {
        Self {
            context: Arc::new(context),
            connection_counter: AtomicU64::new(0),
        }
    }

    pub fn context(&self) -> &Arc<BrokerContext> {
        &self.context
    }

    pub fn registry(&self) -> &Arc<TopicRegistry> {
        &self.context.registry
    }

    /// Serve any byte stream as a client connection on a new task
    pub fn spawn_connection<S>(&self, stream: S) -> JoinHandle<BrokerResult<()>>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let connection_id = self.connection_counter.fetch_add(1, Ordering::Relaxed) + 1;
        let context = Arc::clone(&self.context);
        tokio::spawn(async move { handle_connection(stream, connection_id, context).await })
    }

    /// Accept connections until `shutdown` completes, then close all topics
    pub async fn serve<F>(&self, listener: TcpListener, shutdown: F) -> BrokerResult<()>
    where
        F: Future<Output = ()>,
    {
        let local_addr = listener.local_addr()?;
        info!("🚀 Broker listening on {}", local_addr);

        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        if let Err(e) = stream.set_nodelay(true) {
                            debug!(%peer, error = %e, "Could not set TCP_NODELAY");
                        }
                        debug!(%peer, "Accepted connection");
                        self.spawn_connection(stream);
                    }
                    Err(e) => {
                        error!(error = %e, "Accept failed");
                    }
                },
                _ = &mut shutdown => {
                    info!("Shutdown requested, closing topics");
                    break;
                }
            }
        }

        self.context.registry.close_all().await;
        info!("Broker stopped");
        Ok(())
    }
}
