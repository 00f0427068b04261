//! Best-effort audit logging
//!
//! Settlements hand their audit entry to an [`AuditQueue`] after commit. The
//! queue never blocks or fails a settlement: a full or closed queue drops the
//! entry with a warning. A background [`AuditWorker`] delivers entries to an
//! [`AuditSink`], retrying transient failures with exponential backoff.

use std::sync::Arc;

use async_trait::async_trait;
use shared::AuditEntry;
use sqlx::PgPool;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

use super::retry::{with_retry, RetryConfig};
use crate::config::AuditConfig;
use crate::error::{AppError, AppResult};

/// Append-only destination for audit entries
#[async_trait]
pub trait AuditSink: Send + Sync + 'static {
    async fn append(&self, entry: &AuditEntry) -> AppResult<()>;
}

/// Writes entries to the `audit_log` table
#[derive(Clone)]
pub struct PgAuditSink {
    db: PgPool,
}

impl PgAuditSink {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl AuditSink for PgAuditSink {
    async fn append(&self, entry: &AuditEntry) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO audit_log (id, tenant_id, action, entity_kind, entity_id, detail, user_id, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(entry.id)
        .bind(entry.tenant_id)
        .bind(entry.action.as_str())
        .bind(entry.entity_kind.as_str())
        .bind(entry.entity_id)
        .bind(&entry.detail)
        .bind(entry.user_id)
        .bind(entry.created_at)
        .execute(&self.db)
        .await?;

        Ok(())
    }
}

/// Keeps entries in memory
#[derive(Clone, Default)]
pub struct MemoryAuditSink {
    entries: Arc<Mutex<Vec<AuditEntry>>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn entries(&self) -> Vec<AuditEntry> {
        self.entries.lock().await.clone()
    }
}

#[async_trait]
impl AuditSink for MemoryAuditSink {
    async fn append(&self, entry: &AuditEntry) -> AppResult<()> {
        self.entries.lock().await.push(entry.clone());
        Ok(())
    }
}

/// Sending half of the audit pipeline
#[derive(Clone)]
pub struct AuditQueue {
    sender: mpsc::Sender<AuditEntry>,
}

/// Background task delivering queued entries
pub struct AuditWorker {
    handle: JoinHandle<()>,
}

impl AuditQueue {
    /// Start a worker draining into `sink`
    pub fn spawn(sink: Arc<dyn AuditSink>, config: &AuditConfig) -> (AuditQueue, AuditWorker) {
        let (sender, mut receiver) = mpsc::channel::<AuditEntry>(config.queue_capacity.max(1));
        let retry = RetryConfig::from(config);

        let handle = tokio::spawn(async move {
            while let Some(entry) = receiver.recv().await {
                let queued = &entry;
                let delivered = with_retry(&retry, AppError::is_transient, || {
                    let sink = sink.clone();
                    async move { sink.append(queued).await }
                })
                .await;

                if let Err(e) = delivered {
                    tracing::error!(
                        audit_id = %entry.id,
                        action = entry.action.as_str(),
                        entity_id = %entry.entity_id,
                        "Dropping audit entry: {}",
                        e
                    );
                }
            }
            tracing::debug!("Audit queue closed");
        });

        (AuditQueue { sender }, AuditWorker { handle })
    }

    /// Enqueue without waiting; never fails the caller
    pub fn record(&self, entry: AuditEntry) {
        match self.sender.try_send(entry) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(entry)) => {
                tracing::warn!(
                    audit_id = %entry.id,
                    action = entry.action.as_str(),
                    "Audit queue full, dropping entry"
                );
            }
            Err(mpsc::error::TrySendError::Closed(entry)) => {
                tracing::warn!(
                    audit_id = %entry.id,
                    action = entry.action.as_str(),
                    "Audit queue closed, dropping entry"
                );
            }
        }
    }
}

impl AuditWorker {
    /// Wait until every queued entry is delivered. Completes once all
    /// [`AuditQueue`] handles have been dropped.
    pub async fn finished(self) {
        if let Err(e) = self.handle.await {
            tracing::error!("Audit worker terminated abnormally: {}", e);
        }
    }
}
