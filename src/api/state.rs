use std::sync::Arc;

use crate::batch::{BatchService, BatchValidator};
use crate::config::Config;
use crate::health::HealthAggregator;
use crate::humanize::ParseError;
use crate::observability::Metrics;
use crate::storage::{CredentialProvider, CredentialResolver, S3UrlSigner};

/// Built once at startup; read-only afterwards apart from metric counters
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub batch: Arc<dyn BatchService>,
    pub validator: Arc<BatchValidator>,
    pub credentials: CredentialResolver,
    pub signer: Arc<S3UrlSigner>,
    pub health: Arc<HealthAggregator>,
    pub metrics: Arc<Metrics>,
}

impl AppState {
    pub fn new(
        config: Config,
        batch: Arc<dyn BatchService>,
        default_credentials: Arc<dyn CredentialProvider>,
    ) -> Result<Self, ParseError> {
        let validator = BatchValidator::new(&config.batch)?;
        let credentials = CredentialResolver::new(default_credentials);
        let signer = S3UrlSigner::new(&config.storage, &config.presign);
        let health = HealthAggregator::new(
            batch.clone(),
            credentials.clone(),
            &config.storage,
            &config.health,
        );

        Ok(Self {
            config: Arc::new(config),
            batch,
            validator: Arc::new(validator),
            credentials,
            signer: Arc::new(signer),
            health: Arc::new(health),
            metrics: Arc::new(Metrics::new()),
        })
    }
}
