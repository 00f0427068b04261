//! Shared fixtures for ledger integration tests

#![allow(dead_code)]

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use retail_ledger::config::AuditConfig;
use retail_ledger::scope::ScopeContext;
use retail_ledger::services::{
    AuditQueue, AuditSink, AuditWorker, InventoryService, MemoryAuditSink, ReceiveStockInput,
    RetryConfig, SettlementEngine,
};
use retail_ledger::store::MemoryLedgerStore;
use shared::{AuditEntry, Batch, Branch, Product, ProductUnit};

pub fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

/// Midnight UTC on the given day of January 2024
pub fn day(n: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, n, 0, 0, 0).unwrap()
}

pub fn fast_retry() -> RetryConfig {
    RetryConfig {
        max_attempts: 3,
        initial_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(5),
        backoff_factor: 2.0,
    }
}

pub fn fast_audit() -> AuditConfig {
    AuditConfig {
        queue_capacity: 64,
        max_attempts: 3,
        initial_backoff_ms: 1,
        max_backoff_ms: 5,
    }
}

/// A tenant with two branches and one product sold in "Pcs" and "Box" (12 Pcs)
pub struct Ledger {
    pub store: MemoryLedgerStore,
    pub engine: SettlementEngine<MemoryLedgerStore>,
    pub inventory: InventoryService<MemoryLedgerStore>,
    pub worker: AuditWorker,
    pub sink: MemoryAuditSink,
    pub tenant_id: Uuid,
    pub user_id: Uuid,
    pub branch_a: Uuid,
    pub branch_b: Uuid,
    pub product_id: Uuid,
}

impl Ledger {
    pub async fn new() -> Self {
        let sink = MemoryAuditSink::new();
        Self::with_sink(Arc::new(sink.clone()), sink).await
    }

    /// Deliver audit entries to `sink`; `entries` is what [`Ledger::audit_entries`] reads
    pub async fn with_sink(sink: Arc<dyn AuditSink>, entries: MemoryAuditSink) -> Self {
        let store = MemoryLedgerStore::new();
        let tenant_id = Uuid::new_v4();
        let branch_a = Uuid::new_v4();
        let branch_b = Uuid::new_v4();

        for (id, code) in [(branch_a, "A"), (branch_b, "B")] {
            store
                .add_branch(Branch {
                    id,
                    tenant_id,
                    code: code.to_string(),
                    name: format!("Branch {}", code),
                })
                .await;
        }

        let product_id = add_product(&store, tenant_id, "SKU-001", &[("Pcs", 1), ("Box", 12)]).await;

        let (audit, worker) = AuditQueue::spawn(sink, &fast_audit());
        let engine = SettlementEngine::new(store.clone(), audit.clone(), fast_retry());
        let inventory = InventoryService::new(store.clone(), audit);

        Self {
            store,
            engine,
            inventory,
            worker,
            sink: entries,
            tenant_id,
            user_id: Uuid::new_v4(),
            branch_a,
            branch_b,
            product_id,
        }
    }

    pub fn head_office(&self) -> ScopeContext {
        ScopeContext::head_office(self.tenant_id, self.user_id)
    }

    pub fn at_branch(&self, branch_id: Uuid) -> ScopeContext {
        ScopeContext::for_branch(self.tenant_id, branch_id, self.user_id)
    }

    /// Receive `quantity` Pcs at `cost` per Pcs
    pub async fn receive(
        &self,
        branch_id: Uuid,
        product_id: Uuid,
        quantity: &str,
        cost: &str,
        received_at: DateTime<Utc>,
    ) -> Batch {
        self.inventory
            .receive_stock(
                &self.head_office(),
                ReceiveStockInput {
                    branch_id,
                    product_id,
                    unit_name: "Pcs".to_string(),
                    quantity: dec(quantity),
                    cost_per_unit: dec(cost),
                    batch_number: None,
                    supplier_id: None,
                    received_at: Some(received_at),
                },
            )
            .await
            .unwrap()
    }

    /// Committed batches of a product at a branch, oldest first
    pub async fn batches(&self, branch_id: Uuid, product_id: Uuid) -> Vec<Batch> {
        self.inventory
            .batches(&self.head_office(), branch_id, product_id)
            .await
            .unwrap()
    }

    pub async fn on_hand(&self, branch_id: Uuid, product_id: Uuid) -> Decimal {
        self.batches(branch_id, product_id)
            .await
            .iter()
            .map(|b| b.quantity_current)
            .sum()
    }

    /// Shut the audit queue down and return everything delivered
    pub async fn audit_entries(self) -> Vec<AuditEntry> {
        let Ledger {
            engine,
            inventory,
            worker,
            sink,
            ..
        } = self;
        drop(engine);
        drop(inventory);
        worker.finished().await;
        sink.entries().await
    }
}

/// Register a product with the given units; returns its id
pub async fn add_product(
    store: &MemoryLedgerStore,
    tenant_id: Uuid,
    sku: &str,
    units: &[(&str, i64)],
) -> Uuid {
    let product_id = Uuid::new_v4();
    let product = Product {
        id: product_id,
        tenant_id,
        sku: sku.to_string(),
        name: format!("Product {}", sku),
        category: None,
        min_stock: Decimal::from(5),
        base_unit: units[0].0.to_string(),
        created_at: Utc::now(),
    };
    let units = units
        .iter()
        .map(|(name, factor)| ProductUnit {
            id: Uuid::new_v4(),
            product_id,
            name: name.to_string(),
            conversion_factor: Decimal::from(*factor),
            price: Decimal::ZERO,
            barcode: None,
        })
        .collect();
    store.add_product(product, units).await.unwrap();
    product_id
}
