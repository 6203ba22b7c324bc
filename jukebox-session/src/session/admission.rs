//! Admission control
//!
//! Deduct-then-enqueue with refund on rejection: a request is admitted
//! only when the balance covers the cost AND the engine accepts the
//! track. Because the whole sequence runs inside the controller loop,
//! no interleaving can observe a deducted balance without a matching
//! queue entry or refund.

use super::controller::SessionController;
use jukebox_common::events::QueueChangeTrigger;
use jukebox_common::model::QueueEntry;
use jukebox_common::{Error, Result, Track};
use tracing::{info, warn};

impl SessionController {
    /// Admit a patron request: charge, hand the track to the engine,
    /// and append it to the pending queue
    pub(super) async fn admit(&mut self, track: Track) -> Result<QueueEntry> {
        let cost = track.cost_or(self.settings.default_credit_cost);

        // Zero-cost tracks bypass the ledger entirely
        if cost > 0 {
            self.ledger.deduct(cost)?;
        }

        if let Err(e) = self.engine.enqueue(&track).await {
            warn!(
                "Engine rejected {}, refunding {} credits: {}",
                track.display(),
                cost,
                e
            );
            if cost > 0 {
                // Refund of a nonzero deduction cannot fail
                let _ = self.ledger.add(cost);
            }
            return Err(Error::EngineRejected(e.to_string()));
        }

        let entry = QueueEntry::new(track);
        info!(
            "Admitted {} for {} credits (balance {})",
            entry.track.display(),
            cost,
            self.ledger.balance()
        );
        self.queue.append(entry.clone());
        if cost > 0 {
            self.publish_balance().await;
        }
        self.publish_queue(QueueChangeTrigger::Admission).await;
        Ok(entry)
    }
}
