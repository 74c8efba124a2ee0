//! SQLite persistence for tickets and their classifications

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use std::collections::BTreeMap;
use tracing::info;
use triage_core::{Category, Classification, Error, Result, Ticket, TicketDraft};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS tickets (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    subject TEXT,
    body TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS classifications (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    ticket_id INTEGER NOT NULL UNIQUE REFERENCES tickets(id) ON DELETE CASCADE,
    category TEXT NOT NULL,
    confidence_score REAL NOT NULL,
    summary TEXT,
    model_name TEXT NOT NULL,
    processing_time_ms INTEGER NOT NULL,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_classifications_category ON classifications(category);
CREATE INDEX IF NOT EXISTS idx_tickets_created_at ON tickets(created_at);
"#;

/// A ticket together with its classification, if one exists
#[derive(Debug, Clone, Serialize)]
pub struct TicketRecord {
    pub ticket: Ticket,
    pub classification: Option<Classification>,
}

/// Per-category slice of the stats window
#[derive(Debug, Clone, Serialize)]
pub struct CategoryCount {
    pub category: Category,
    pub count: i64,
    pub percentage: f64,
}

/// Aggregate statistics over a trailing window
#[derive(Debug, Clone, Serialize)]
pub struct TicketStats {
    pub total_tickets: i64,
    pub period_days: i64,
    pub categories: Vec<CategoryCount>,
    pub daily_counts: BTreeMap<String, i64>,
    pub average_confidence: f64,
}

/// Ticket store over a SQLite connection pool
#[derive(Clone)]
pub struct TicketStore {
    pool: SqlitePool,
}

impl TicketStore {
    /// Connect to the database and ensure the schema exists
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            // SQLite is single-writer, but can have multiple readers
            .max_connections(10)
            .min_connections(1)
            .connect(database_url)
            .await
            .map_err(|e| Error::storage(format!("failed to connect to database: {e}")))?;

        let store = Self::with_pool(pool);
        store.init_schema().await?;
        info!(database_url, "ticket store ready");
        Ok(store)
    }

    /// Wrap an existing pool (used by tests with in-memory databases)
    pub fn with_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create tables and indexes if they are missing
    pub async fn init_schema(&self) -> Result<()> {
        sqlx::raw_sql(SCHEMA)
            .execute(&self.pool)
            .await
            .map_err(|e| Error::storage(format!("failed to initialize schema: {e}")))?;
        Ok(())
    }

    /// Insert a new ticket and return it with its assigned id
    pub async fn insert_ticket(&self, draft: &TicketDraft) -> Result<Ticket> {
        let created_at = Utc::now();

        let result = sqlx::query(
            "INSERT INTO tickets (subject, body, created_at) VALUES ($1, $2, $3)",
        )
        .bind(&draft.subject)
        .bind(&draft.body)
        .bind(created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| Error::storage(format!("failed to insert ticket: {e}")))?;

        Ok(Ticket {
            id: result.last_insert_rowid(),
            subject: draft.subject.clone(),
            body: draft.body.clone(),
            created_at,
        })
    }

    /// Attach a classification to a ticket.
    ///
    /// Insert-only: the UNIQUE constraint on `ticket_id` rejects a second
    /// classification for the same ticket.
    pub async fn attach_classification(
        &self,
        ticket_id: i64,
        classification: &Classification,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO classifications \
             (ticket_id, category, confidence_score, summary, model_name, processing_time_ms, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(ticket_id)
        .bind(classification.category.as_str())
        .bind(classification.confidence_score)
        .bind(&classification.summary)
        .bind(&classification.model_name)
        .bind(classification.processing_time_ms as i64)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| Error::storage(format!("failed to attach classification: {e}")))?;

        Ok(())
    }

    /// Fetch a single ticket with its classification
    pub async fn get_ticket(&self, ticket_id: i64) -> Result<Option<TicketRecord>> {
        let row: Option<TicketRow> = sqlx::query_as(
            "SELECT t.id, t.subject, t.body, t.created_at, \
                    c.category, c.confidence_score, c.summary, c.model_name, c.processing_time_ms \
             FROM tickets t \
             LEFT JOIN classifications c ON c.ticket_id = t.id \
             WHERE t.id = $1",
        )
        .bind(ticket_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| Error::storage(format!("failed to fetch ticket: {e}")))?;

        row.map(TicketRecord::try_from).transpose()
    }

    /// List tickets, newest first, with optional category filtering.
    /// Returns the page plus the total count of matching tickets.
    pub async fn list_tickets(
        &self,
        category: Option<Category>,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<TicketRecord>, i64)> {
        let (rows, total): (Vec<TicketRow>, i64) = match category {
            Some(category) => {
                let rows = sqlx::query_as(
                    "SELECT t.id, t.subject, t.body, t.created_at, \
                            c.category, c.confidence_score, c.summary, c.model_name, c.processing_time_ms \
                     FROM tickets t \
                     JOIN classifications c ON c.ticket_id = t.id \
                     WHERE c.category = $1 \
                     ORDER BY t.created_at DESC, t.id DESC \
                     LIMIT $2 OFFSET $3",
                )
                .bind(category.as_str())
                .bind(limit)
                .bind(offset)
                .fetch_all(&self.pool)
                .await
                .map_err(|e| Error::storage(format!("failed to list tickets: {e}")))?;

                let (total,): (i64,) = sqlx::query_as(
                    "SELECT COUNT(*) FROM tickets t \
                     JOIN classifications c ON c.ticket_id = t.id \
                     WHERE c.category = $1",
                )
                .bind(category.as_str())
                .fetch_one(&self.pool)
                .await
                .map_err(|e| Error::storage(format!("failed to count tickets: {e}")))?;

                (rows, total)
            }
            None => {
                let rows = sqlx::query_as(
                    "SELECT t.id, t.subject, t.body, t.created_at, \
                            c.category, c.confidence_score, c.summary, c.model_name, c.processing_time_ms \
                     FROM tickets t \
                     LEFT JOIN classifications c ON c.ticket_id = t.id \
                     ORDER BY t.created_at DESC, t.id DESC \
                     LIMIT $1 OFFSET $2",
                )
                .bind(limit)
                .bind(offset)
                .fetch_all(&self.pool)
                .await
                .map_err(|e| Error::storage(format!("failed to list tickets: {e}")))?;

                let (total,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM tickets")
                    .fetch_one(&self.pool)
                    .await
                    .map_err(|e| Error::storage(format!("failed to count tickets: {e}")))?;

                (rows, total)
            }
        };

        let records = rows
            .into_iter()
            .map(TicketRecord::try_from)
            .collect::<Result<Vec<_>>>()?;

        Ok((records, total))
    }

    /// Aggregate statistics for the trailing `days` window
    pub async fn stats(&self, days: i64) -> Result<TicketStats> {
        let cutoff = (Utc::now() - Duration::days(days)).to_rfc3339();

        let (total_tickets,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM tickets WHERE created_at >= $1")
                .bind(&cutoff)
                .fetch_one(&self.pool)
                .await
                .map_err(|e| Error::storage(format!("failed to count tickets: {e}")))?;

        let category_rows: Vec<(String, i64)> = sqlx::query_as(
            "SELECT c.category, COUNT(*) FROM classifications c \
             JOIN tickets t ON t.id = c.ticket_id \
             WHERE t.created_at >= $1 \
             GROUP BY c.category",
        )
        .bind(&cutoff)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| Error::storage(format!("failed to aggregate categories: {e}")))?;

        let daily_rows: Vec<(String, i64)> = sqlx::query_as(
            "SELECT substr(created_at, 1, 10) AS day, COUNT(*) FROM tickets \
             WHERE created_at >= $1 \
             GROUP BY day ORDER BY day",
        )
        .bind(&cutoff)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| Error::storage(format!("failed to aggregate daily counts: {e}")))?;

        let (average_confidence,): (Option<f64>,) = sqlx::query_as(
            "SELECT AVG(c.confidence_score) FROM classifications c \
             JOIN tickets t ON t.id = c.ticket_id \
             WHERE t.created_at >= $1",
        )
        .bind(&cutoff)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| Error::storage(format!("failed to average confidence: {e}")))?;

        let mut categories: Vec<CategoryCount> = Category::ALL
            .into_iter()
            .map(|category| {
                let count = category_rows
                    .iter()
                    .find(|(label, _)| label == category.as_str())
                    .map(|(_, count)| *count)
                    .unwrap_or(0);
                let percentage = if total_tickets > 0 {
                    round2(count as f64 / total_tickets as f64 * 100.0)
                } else {
                    0.0
                };
                CategoryCount {
                    category,
                    count,
                    percentage,
                }
            })
            .collect();
        categories.sort_by(|a, b| b.count.cmp(&a.count));

        Ok(TicketStats {
            total_tickets,
            period_days: days,
            categories,
            daily_counts: daily_rows.into_iter().collect(),
            average_confidence: round3(average_confidence.unwrap_or(0.0)),
        })
    }
}

/// Flat row shape shared by the ticket queries
type TicketRow = (
    i64,
    Option<String>,
    String,
    String,
    Option<String>,
    Option<f64>,
    Option<String>,
    Option<String>,
    Option<i64>,
);

impl TryFrom<TicketRow> for TicketRecord {
    type Error = Error;

    fn try_from(row: TicketRow) -> Result<Self> {
        let (id, subject, body, created_at, category, confidence, summary, model_name, time_ms) =
            row;

        let created_at = parse_timestamp(&created_at)?;

        let classification = match (category, confidence, model_name) {
            (Some(category), Some(confidence), Some(model_name)) => Some(Classification {
                category: Category::normalize(&category),
                confidence_score: confidence,
                summary,
                model_name,
                processing_time_ms: time_ms.unwrap_or(0).max(0) as u64,
            }),
            _ => None,
        };

        Ok(TicketRecord {
            ticket: Ticket {
                id,
                subject,
                body,
                created_at,
            },
            classification,
        })
    }
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::storage(format!("invalid timestamp {raw:?}: {e}")))
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn store() -> TicketStore {
        let pool = SqlitePoolOptions::new()
            // A pool of one keeps every query on the same in-memory database
            .max_connections(1)
            .connect(":memory:")
            .await
            .unwrap();
        let store = TicketStore::with_pool(pool);
        store.init_schema().await.unwrap();
        store
    }

    fn classification(category: Category, confidence: f64) -> Classification {
        Classification::new(category, confidence, None, "keyword-fallback-v1")
    }

    #[tokio::test]
    async fn insert_and_fetch_round_trip() {
        let store = store().await;

        let draft = TicketDraft::new(Some("Login broken".to_string()), "Cannot sign in anywhere");
        let ticket = store.insert_ticket(&draft).await.unwrap();
        assert!(ticket.id > 0);

        store
            .attach_classification(ticket.id, &classification(Category::Technical, 0.8))
            .await
            .unwrap();

        let record = store.get_ticket(ticket.id).await.unwrap().unwrap();
        assert_eq!(record.ticket.subject.as_deref(), Some("Login broken"));
        assert_eq!(record.ticket.body, "Cannot sign in anywhere");

        let classification = record.classification.unwrap();
        assert_eq!(classification.category, Category::Technical);
        assert_eq!(classification.confidence_score, 0.8);
    }

    #[tokio::test]
    async fn missing_ticket_is_none() {
        let store = store().await;
        assert!(store.get_ticket(42).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn second_classification_is_rejected() {
        let store = store().await;

        let ticket = store
            .insert_ticket(&TicketDraft::new(None, "Server down again today"))
            .await
            .unwrap();

        store
            .attach_classification(ticket.id, &classification(Category::Technical, 0.7))
            .await
            .unwrap();
        let err = store
            .attach_classification(ticket.id, &classification(Category::General, 0.3))
            .await;
        assert!(err.is_err());
    }

    #[tokio::test]
    async fn list_filters_by_category() {
        let store = store().await;

        for (body, category) in [
            ("Server is on fire right now", Category::Technical),
            ("Invoice charged twice this month", Category::Billing),
            ("Just wanted to say thanks!", Category::General),
        ] {
            let ticket = store
                .insert_ticket(&TicketDraft::new(None, body))
                .await
                .unwrap();
            store
                .attach_classification(ticket.id, &classification(category, 0.6))
                .await
                .unwrap();
        }

        let (all, total) = store.list_tickets(None, 100, 0).await.unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(total, 3);

        let (billing, billing_total) = store
            .list_tickets(Some(Category::Billing), 100, 0)
            .await
            .unwrap();
        assert_eq!(billing.len(), 1);
        assert_eq!(billing_total, 1);
        assert_eq!(billing[0].ticket.body, "Invoice charged twice this month");

        let (page, total) = store.list_tickets(None, 2, 0).await.unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(total, 3);
    }

    #[tokio::test]
    async fn unclassified_tickets_appear_in_unfiltered_list() {
        let store = store().await;

        store
            .insert_ticket(&TicketDraft::new(None, "No classification attached"))
            .await
            .unwrap();

        let (all, _) = store.list_tickets(None, 100, 0).await.unwrap();
        assert_eq!(all.len(), 1);
        assert!(all[0].classification.is_none());
    }

    #[tokio::test]
    async fn stats_aggregate_the_window() {
        let store = store().await;

        for (body, category, confidence) in [
            ("Server is on fire right now", Category::Technical, 0.8),
            ("Another server problem today", Category::Technical, 0.6),
            ("Invoice charged twice this month", Category::Billing, 0.7),
        ] {
            let ticket = store
                .insert_ticket(&TicketDraft::new(None, body))
                .await
                .unwrap();
            store
                .attach_classification(ticket.id, &classification(category, confidence))
                .await
                .unwrap();
        }

        let stats = store.stats(7).await.unwrap();
        assert_eq!(stats.total_tickets, 3);
        assert_eq!(stats.period_days, 7);
        assert_eq!(stats.average_confidence, 0.7);
        assert_eq!(stats.daily_counts.values().sum::<i64>(), 3);

        // Sorted by count descending; technical leads with two tickets.
        assert_eq!(stats.categories[0].category, Category::Technical);
        assert_eq!(stats.categories[0].count, 2);
        assert_eq!(stats.categories[0].percentage, 66.67);
    }
}
