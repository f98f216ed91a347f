mod handlers;
mod router;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::oneshot;
use tracing::info;

use crate::core::lifecycle::LifecycleComponent;
use crate::core::manager::SharedJobRegistry;

pub use router::build_api_router;

pub struct ApiServer {
    registry: SharedJobRegistry,
    api_host: String,
    api_port: u16,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) registry: SharedJobRegistry,
}

impl ApiServer {
    pub fn new(registry: SharedJobRegistry, api_host: String, api_port: u16) -> Self {
        Self {
            registry,
            api_host,
            api_port,
            shutdown_tx: None,
        }
    }
}

#[async_trait]
impl LifecycleComponent for ApiServer {
    async fn on_init(&mut self) -> Result<()> {
        info!("API Server Interface initializing...");
        Ok(())
    }

    async fn on_start(&mut self) -> Result<()> {
        let addr = format!("{}:{}", self.api_host, self.api_port);
        // Bind here so a taken port fails startup instead of a background task.
        let listener = tokio::net::TcpListener::bind(&addr).await?;
        let app = build_api_router(AppState {
            registry: self.registry.clone(),
        });
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        self.shutdown_tx = Some(shutdown_tx);

        tokio::spawn(async move {
            info!("API Server running at http://{addr}");
            if let Err(e) = axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
            {
                tracing::error!("API Server crashed: {}", e);
            }
        });
        Ok(())
    }

    async fn on_shutdown(&mut self) -> Result<()> {
        info!("API Server Interface shutting down...");
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        Ok(())
    }
}
