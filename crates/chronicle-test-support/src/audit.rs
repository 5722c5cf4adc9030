//! Test audit store: an `AuditStore` that refuses every write.

use async_trait::async_trait;
use chronicle_core::audit::{AuditRecord, AuditStore};
use chronicle_core::error::DomainError;
use chronicle_core::id::EntityId;

/// An audit store that always returns an infrastructure error.
#[derive(Debug)]
pub struct FailingAuditStore;

#[async_trait]
impl AuditStore for FailingAuditStore {
    async fn insert(&self, _record: AuditRecord) -> Result<bool, DomainError> {
        Err(DomainError::Infrastructure("audit store unavailable".into()))
    }

    async fn records_for_entity(
        &self,
        _entity_id: &EntityId,
    ) -> Result<Vec<AuditRecord>, DomainError> {
        Err(DomainError::Infrastructure("audit store unavailable".into()))
    }
}
