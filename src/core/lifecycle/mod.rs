use anyhow::Result;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_cron_scheduler::JobScheduler;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Init,
    Starting,
    Ready,
    Shutdown,
}

#[async_trait::async_trait]
pub trait LifecycleComponent {
    async fn on_init(&mut self) -> Result<()> {
        Ok(())
    }
    async fn on_start(&mut self) -> Result<()> {
        Ok(())
    }
    async fn on_shutdown(&mut self) -> Result<()> {
        Ok(())
    }
}

pub struct LifecycleManager {
    state: LifecycleState,
    components: Vec<Arc<Mutex<dyn LifecycleComponent + Send + Sync>>>,
    pub scheduler: JobScheduler,
}

impl LifecycleManager {
    pub async fn new() -> Result<Self> {
        let scheduler = JobScheduler::new().await?;
        Ok(Self {
            state: LifecycleState::Init,
            components: Vec::new(),
            scheduler,
        })
    }

    pub fn attach(&mut self, component: Arc<Mutex<dyn LifecycleComponent + Send + Sync>>) {
        self.components.push(component);
    }

    fn enter(&mut self, state: LifecycleState) {
        info!("Lifecycle phase: {:?}", state);
        self.state = state;
    }

    /// Runs `on_init` then `on_start` on every component in attach order and
    /// starts the scheduler. If a component fails to start, the ones already
    /// started are stopped again before the error is returned.
    pub async fn start(&mut self) -> Result<()> {
        self.enter(LifecycleState::Init);
        for comp in &self.components {
            comp.lock().await.on_init().await?;
        }

        self.enter(LifecycleState::Starting);
        for (started, comp) in self.components.iter().enumerate() {
            if let Err(e) = comp.lock().await.on_start().await {
                warn!("Component failed to start, stopping {} started before it", started);
                stop_all(&self.components[..started]).await;
                return Err(e);
            }
        }

        self.scheduler.start().await?;
        self.enter(LifecycleState::Ready);
        Ok(())
    }

    /// Stops the scheduler first so no new pass begins, then every component
    /// in reverse attach order. Component errors are logged, not returned.
    pub async fn shutdown(&mut self) -> Result<()> {
        self.enter(LifecycleState::Shutdown);
        if let Err(e) = self.scheduler.shutdown().await {
            warn!("Scheduler shutdown error: {}", e);
        }
        stop_all(&self.components).await;
        Ok(())
    }
}

async fn stop_all(components: &[Arc<Mutex<dyn LifecycleComponent + Send + Sync>>]) {
    for comp in components.iter().rev() {
        if let Err(e) = comp.lock().await.on_shutdown().await {
            warn!("Component shutdown error: {}", e);
        }
    }
}
