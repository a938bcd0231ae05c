use async_trait::async_trait;
use outpost_core::RelationshipNote;
use outpost_ledger::Ledger;

use crate::error::ClientError;
use crate::traits::RelationshipLog;

/// Relationship notes land in the ledger's RELATIONSHIPS view.
#[async_trait]
impl RelationshipLog for Ledger {
    async fn note(&self, note: &RelationshipNote) -> Result<(), ClientError> {
        self.append_relationship(note).await?;
        Ok(())
    }
}
