//! Application state and the ticket workflow

use crate::store::{TicketRecord, TicketStats, TicketStore};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use tracing::{error, info};
use triage_classifiers::ClassifierDispatcher;
use triage_core::{Category, Result, TicketDraft};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub store: TicketStore,
    pub dispatcher: Arc<ClassifierDispatcher>,
    /// Prometheus render handle; absent in tests
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    pub fn new(
        store: TicketStore,
        dispatcher: Arc<ClassifierDispatcher>,
        metrics: Option<PrometheusHandle>,
    ) -> Self {
        Self {
            store,
            dispatcher,
            metrics,
        }
    }

    /// Create a ticket and classify it synchronously.
    ///
    /// The ticket row is inserted first; classification failure (only
    /// possible if the local fallback itself fails) propagates and leaves
    /// the ticket unclassified rather than fabricating a result.
    pub async fn create_ticket(&self, draft: TicketDraft) -> Result<TicketRecord> {
        let ticket = self.store.insert_ticket(&draft).await?;

        let classification = self
            .dispatcher
            .classify(&ticket.full_text())
            .await
            .map_err(|e| {
                error!(ticket_id = ticket.id, error = %e, "classification failed");
                e
            })?;

        self.store
            .attach_classification(ticket.id, &classification)
            .await?;

        info!(
            ticket_id = ticket.id,
            category = %classification.category,
            confidence = classification.confidence_score,
            model = %classification.model_name,
            "ticket classified"
        );

        Ok(TicketRecord {
            ticket,
            classification: Some(classification),
        })
    }

    /// Fetch one ticket
    pub async fn get_ticket(&self, ticket_id: i64) -> Result<Option<TicketRecord>> {
        self.store.get_ticket(ticket_id).await
    }

    /// List tickets with optional filtering and pagination
    pub async fn list_tickets(
        &self,
        category: Option<Category>,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<TicketRecord>, i64)> {
        self.store.list_tickets(category, limit, offset).await
    }

    /// Aggregate statistics over the trailing window
    pub async fn stats(&self, days: i64) -> Result<TicketStats> {
        self.store.stats(days).await
    }
}
