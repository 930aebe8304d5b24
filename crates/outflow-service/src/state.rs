//! Application state.

use std::sync::Arc;

use outflow_engine::{
    CampaignScheduler, DeadLetterRecorder, LedgerEngine, MailProvider, SendDispatcher,
    StoreSuppressionFilter, TemplateStore,
};
use outflow_store::Store;

use crate::config::ServiceConfig;
use crate::providers::{InMemoryTemplates, TracingAuditLog};

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// The storage backend.
    pub store: Arc<dyn Store>,

    /// Service configuration.
    pub config: ServiceConfig,

    /// The credit ledger.
    pub ledger: Arc<LedgerEngine>,

    /// The campaign scheduler.
    pub scheduler: Arc<CampaignScheduler>,

    /// The send dispatcher.
    pub dispatcher: Arc<SendDispatcher>,

    /// Dead-letter capture for background jobs.
    pub dead_letters: Arc<DeadLetterRecorder>,

    /// The template catalog the scheduler resolves against.
    pub templates: Arc<InMemoryTemplates>,
}

impl AppState {
    /// Create application state over a store and a mail provider.
    #[must_use]
    pub fn new(store: Arc<dyn Store>, config: ServiceConfig, mail: Arc<dyn MailProvider>) -> Self {
        let ledger = Arc::new(LedgerEngine::new(Arc::clone(&store)));
        let templates = Arc::new(InMemoryTemplates::default());
        let suppression = Arc::new(StoreSuppressionFilter::new(Arc::clone(&store)));

        let scheduler = Arc::new(CampaignScheduler::new(
            Arc::clone(&store),
            Arc::clone(&ledger),
            Arc::clone(&mail),
            Arc::clone(&templates) as Arc<dyn TemplateStore>,
            suppression,
            Arc::new(TracingAuditLog),
            config.pricing.clone(),
            config.dispatch.clone(),
        ));
        let dispatcher = Arc::new(SendDispatcher::new(
            Arc::clone(&store),
            mail,
            &config.dispatch,
        ));
        let dead_letters = Arc::new(DeadLetterRecorder::new(Arc::clone(&store)));

        Self {
            store,
            config,
            ledger,
            scheduler,
            dispatcher,
            dead_letters,
            templates,
        }
    }
}
