//! The single path back to `idle`.

use std::sync::Arc;

use stockhold_core::{ItemId, LockTicket};
use stockhold_inventory::{LockError, ReleaseEffect};

use super::error::EngineError;
use super::ledger::InventoryLedger;

pub struct ReleaseCoordinator {
    ledger: Arc<InventoryLedger>,
}

impl ReleaseCoordinator {
    pub fn new(ledger: Arc<InventoryLedger>) -> Self {
        Self { ledger }
    }

    /// Release `item`.
    ///
    /// Without a ticket the release is unconditional (administrative). With a
    /// ticket it applies only while that ticket still holds the item; otherwise
    /// `StaleLockTicket` is returned and nothing changes.
    pub async fn release(&self, item: &ItemId, ticket: Option<LockTicket>) -> Result<ReleaseEffect, EngineError> {
        let effect = self.try_release(item, ticket).await??;
        if let ReleaseEffect::Released { previous } = effect {
            tracing::info!(
                item = %item,
                ticket = ?previous,
                conditional = ticket.is_some(),
                "inventory released"
            );
        }
        Ok(effect)
    }

    /// Release on behalf of a finished reservation.
    ///
    /// A stale ticket means the item was already released and re-locked by a
    /// newer reservation: that is the expected loser of a release race and is
    /// not an error. Returns whether this call freed the item.
    pub async fn reclaim(
        &self,
        item: &ItemId,
        ticket: Option<LockTicket>,
        context: &str,
    ) -> Result<bool, EngineError> {
        match self.try_release(item, ticket).await {
            Ok(Ok(ReleaseEffect::Released { .. })) => {
                tracing::info!(item = %item, context, "inventory reclaimed");
                Ok(true)
            }
            Ok(Ok(ReleaseEffect::AlreadyIdle)) => Ok(false),
            Ok(Err(LockError::StaleTicket { current, .. })) => {
                tracing::debug!(item = %item, context, current = ?current, "stale ticket; release skipped");
                Ok(false)
            }
            Ok(Err(other)) => {
                tracing::debug!(item = %item, context, reason = %other, "release not applicable");
                Ok(false)
            }
            Err(EngineError::UnknownInventory(_)) => {
                tracing::warn!(item = %item, context, "release of item no longer in catalog");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    async fn try_release(
        &self,
        item: &ItemId,
        ticket: Option<LockTicket>,
    ) -> Result<Result<ReleaseEffect, LockError>, EngineError> {
        self.ledger
            .mutate(|items| {
                let entry = items
                    .get_mut(item)
                    .ok_or_else(|| EngineError::UnknownInventory(item.clone()))?;
                Ok(entry.release(ticket))
            })
            .await
    }
}
