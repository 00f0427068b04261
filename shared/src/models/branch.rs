//! Branch model

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A physical store or warehouse. Stock never pools across branches.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Branch {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub code: String,
    pub name: String,
}
