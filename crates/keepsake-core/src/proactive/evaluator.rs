//! Background evaluation loop for proactive triggers.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use keepsake_types::page::PageContext;

use crate::memory::repository::{EntityLinkRepository, MemoryRepository, SummaryRepository};
use crate::session::MemorySession;

/// Spawn the periodic evaluator for a session. The tick period is the
/// configured cooldown, so the loop can never outpace the trigger gate.
///
/// `page_source` is polled on every tick so the context-match trigger sees
/// whatever the user currently has open; hosts without page tracking pass
/// `|| None`. Fired triggers are published on the session's event bus.
pub fn spawn_evaluator<M, E, S, P>(
    session: Arc<Mutex<MemorySession<M, E, S>>>,
    page_source: P,
    shutdown: CancellationToken,
) -> JoinHandle<()>
where
    M: MemoryRepository + 'static,
    E: EntityLinkRepository + 'static,
    S: SummaryRepository + 'static,
    P: Fn() -> Option<PageContext> + Send + 'static,
{
    tokio::spawn(async move {
        let period = {
            let session = session.lock().await;
            Duration::from_secs(session.proactive_settings().cooldown_minutes.max(1) * 60)
        };
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // the first tick resolves immediately; skip it so evaluation
        // starts one full period into the session
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    debug!("proactive evaluator stopped");
                    break;
                }
                _ = ticker.tick() => {
                    let page = page_source();
                    let mut session = session.lock().await;
                    session.evaluate_proactive(page.as_ref(), Utc::now());
                }
            }
        }
    })
}
