//! Scoping context threaded through every ledger call
//!
//! The context is built once per request from the authenticated identity and
//! passed explicitly; nothing in the ledger reads tenant or user identity from
//! ambient state.

use uuid::Uuid;

use crate::error::{AppError, AppResult};

/// Tenant, branch and acting user for one unit of work
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScopeContext {
    pub tenant_id: Uuid,
    /// `None` for head-office users who may act on any branch
    pub branch_id: Option<Uuid>,
    pub user_id: Uuid,
}

impl ScopeContext {
    pub fn new(tenant_id: Uuid, branch_id: Option<Uuid>, user_id: Uuid) -> Self {
        Self {
            tenant_id,
            branch_id,
            user_id,
        }
    }

    /// Context for a user bound to a single branch
    pub fn for_branch(tenant_id: Uuid, branch_id: Uuid, user_id: Uuid) -> Self {
        Self::new(tenant_id, Some(branch_id), user_id)
    }

    /// Context for a head-office user
    pub fn head_office(tenant_id: Uuid, user_id: Uuid) -> Self {
        Self::new(tenant_id, None, user_id)
    }

    pub fn can_access_branch(&self, branch_id: Uuid) -> bool {
        self.branch_id.map_or(true, |own| own == branch_id)
    }

    pub fn ensure_branch(&self, branch_id: Uuid) -> AppResult<()> {
        if self.can_access_branch(branch_id) {
            Ok(())
        } else {
            Err(AppError::BranchScope { branch_id })
        }
    }
}
