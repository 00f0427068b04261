//! Audit log models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Append-only record of one settlement outcome
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuditEntry {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub action: AuditAction,
    pub entity_kind: EntityKind,
    pub entity_id: Uuid,
    pub detail: serde_json::Value,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
}

impl AuditEntry {
    pub fn new(
        tenant_id: Uuid,
        user_id: Uuid,
        action: AuditAction,
        entity_kind: EntityKind,
        entity_id: Uuid,
        detail: serde_json::Value,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            tenant_id,
            action,
            entity_kind,
            entity_id,
            detail,
            user_id,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditAction {
    #[serde(rename = "stock.received")]
    StockReceived,
    #[serde(rename = "sale.checkout")]
    SaleCheckout,
    #[serde(rename = "transfer.created")]
    TransferCreated,
    #[serde(rename = "transfer.approved")]
    TransferApproved,
    #[serde(rename = "transfer.cancelled")]
    TransferCancelled,
    #[serde(rename = "stock.reconciled")]
    StockReconciled,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::StockReceived => "stock.received",
            AuditAction::SaleCheckout => "sale.checkout",
            AuditAction::TransferCreated => "transfer.created",
            AuditAction::TransferApproved => "transfer.approved",
            AuditAction::TransferCancelled => "transfer.cancelled",
            AuditAction::StockReconciled => "stock.reconciled",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Batch,
    SaleSettlement,
    Transfer,
    Product,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Batch => "batch",
            EntityKind::SaleSettlement => "sale_settlement",
            EntityKind::Transfer => "transfer",
            EntityKind::Product => "product",
        }
    }
}
