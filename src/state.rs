use anyhow::Result;
use std::sync::Arc;

use crate::config::Config;
use crate::doe::{DoeCalculator, DoeService};
use crate::topology::{self, TopologyProvider};

#[derive(Clone)]
pub struct AppState {
    pub cfg: Arc<Config>,
    pub doe: Arc<DoeService>,
}

impl AppState {
    /// Load the configured topology and wire the envelope service.
    pub fn new(cfg: Config) -> Result<Self> {
        let provider = topology::load_provider(&cfg.topology)?;
        Ok(Self::with_provider(cfg, provider))
    }

    pub fn with_provider(cfg: Config, provider: Arc<dyn TopologyProvider>) -> Self {
        let doe = DoeService::new(provider, DoeCalculator::new(cfg.doe.thresholds()))
            .with_parallel_threshold(cfg.doe.parallel_batch_threshold);

        Self {
            cfg: Arc::new(cfg),
            doe: Arc::new(doe),
        }
    }
}
