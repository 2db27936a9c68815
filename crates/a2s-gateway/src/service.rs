//! Gateway service - wires the bridge together and runs the listeners.

use crate::adapters::{CorrelationTable, HttpDispatcher, InMemoryTargetRegistry};
use crate::bridge::CallbackBridge;
use crate::domain::config::GatewayConfig;
use crate::domain::error::GatewayError;
use crate::middleware::BridgeMetrics;
use crate::ports::{OutboundDispatcher, TargetRegistry};
use crate::receiver::CallbackReceiver;
use crate::router::{admin_router, public_router, AppState};
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{error, info};

/// Callback bridge service state
pub struct GatewayService {
    config: GatewayConfig,
    state: AppState,
    shutdown_tx: Option<oneshot::Sender<()>>,
    shutdown_rx: Option<oneshot::Receiver<()>>,
}

impl GatewayService {
    /// Create a service that dispatches over HTTP
    pub fn new(config: GatewayConfig) -> Result<Self, GatewayError> {
        let dispatcher = HttpDispatcher::new(config.bridge.dispatch_timeout)?;
        Self::with_dispatcher(config, Arc::new(dispatcher))
    }

    /// Create a service with a custom outbound dispatcher
    pub fn with_dispatcher(
        config: GatewayConfig,
        dispatcher: Arc<dyn OutboundDispatcher>,
    ) -> Result<Self, GatewayError> {
        // Validate configuration
        config
            .validate()
            .map_err(|e| GatewayError::Config(e.to_string()))?;

        let registry: Arc<dyn TargetRegistry> = Arc::new(InMemoryTargetRegistry::new());
        let table = Arc::new(CorrelationTable::new());
        let metrics = Arc::new(BridgeMetrics::new());

        let bridge = Arc::new(CallbackBridge::new(
            Arc::clone(&registry),
            Arc::clone(&table),
            dispatcher,
            config.bridge.clone(),
            Arc::clone(&metrics),
        ));
        let receiver = Arc::new(CallbackReceiver::new(Arc::clone(&table), Arc::clone(&metrics)));

        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        Ok(Self {
            config,
            state: AppState {
                bridge,
                receiver,
                registry,
                table,
                metrics,
            },
            shutdown_tx: Some(shutdown_tx),
            shutdown_rx: Some(shutdown_rx),
        })
    }

    /// Public router, for embedding or in-process tests
    pub fn router(&self) -> Router {
        public_router(self.state.clone(), &self.config)
    }

    /// Admin router (health, metrics, pending waits)
    pub fn admin_router(&self) -> Router {
        admin_router(self.state.clone())
    }

    /// Start the listeners and serve until the [`GatewayService::shutdown_handle`]
    /// sender fires or the public listener fails.
    ///
    /// Both listeners are bound before either server is spawned, so a failed
    /// start leaves nothing running and can be retried.
    pub async fn start(&mut self) -> Result<(), GatewayError> {
        info!("Starting A2S gateway...");

        let http_addr = self.config.http_addr();
        let http_listener = bind(http_addr).await?;
        let admin_listener = if self.config.admin.enabled {
            Some(bind(self.config.admin_addr()).await?)
        } else {
            None
        };

        let mut shutdown_rx = self
            .shutdown_rx
            .take()
            .ok_or_else(|| GatewayError::Serve("service already started".into()))?;

        info!(addr = %http_addr, public_url = %self.config.bridge.public_url, "Starting HTTP server");
        let http_router = self.router();
        let mut http_handle = tokio::spawn(async move {
            axum::serve(
                http_listener,
                http_router.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .await
        });

        let admin_handle = admin_listener.map(|listener| {
            info!(addr = %self.config.admin_addr(), "Starting Admin server");
            let router = self.admin_router();
            tokio::spawn(async move { axum::serve(listener, router).await })
        });

        info!("A2S gateway started successfully");

        // Wait for shutdown signal or server error
        let result = tokio::select! {
            _ = &mut shutdown_rx => {
                info!("Received shutdown signal");
                Ok(())
            }
            joined = &mut http_handle => match joined {
                Ok(Ok(())) => Ok(()),
                Ok(Err(e)) => {
                    error!(error = %e, "HTTP server error");
                    Err(GatewayError::Serve(e.to_string()))
                }
                Err(e) => {
                    error!(error = %e, "HTTP server task failed");
                    Err(GatewayError::Serve(e.to_string()))
                }
            },
        };

        http_handle.abort();
        if let Some(handle) = admin_handle {
            handle.abort();
        }

        info!(
            pending = self.state.table.len(),
            "A2S gateway stopped"
        );
        result
    }

    /// Shutdown trigger usable from another task while `start` is running.
    /// Take it before calling `start`.
    pub fn shutdown_handle(&mut self) -> Option<oneshot::Sender<()>> {
        self.shutdown_tx.take()
    }

    /// Get metrics
    pub fn metrics(&self) -> Arc<BridgeMetrics> {
        Arc::clone(&self.state.metrics)
    }

    /// Get the correlation table
    pub fn table(&self) -> Arc<CorrelationTable> {
        Arc::clone(&self.state.table)
    }

    /// Get the target registry
    pub fn registry(&self) -> Arc<dyn TargetRegistry> {
        Arc::clone(&self.state.registry)
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }
}

async fn bind(addr: SocketAddr) -> Result<tokio::net::TcpListener, GatewayError> {
    tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| GatewayError::Bind(format!("{addr}: {e}")))
}
