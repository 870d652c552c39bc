/// Change detector for the provider's attack listing
///
/// Diffs each freshly fetched snapshot against the previous one (the baseline)
/// and turns the difference into `Started` / `Ended` transitions.
use crate::error::FetchError;
use crate::message::{AttackDetail, Snapshot, Transition, WatchEvent};
use crate::provider::AttackSource;
use std::collections::HashSet;
use std::sync::Arc;

pub struct ChangeDetector {
    source: Arc<dyn AttackSource>,
    baseline: Option<Snapshot>,
}

impl ChangeDetector {
    pub fn new(source: Arc<dyn AttackSource>) -> Self {
        Self {
            source,
            baseline: None,
        }
    }

    #[cfg(test)]
    fn baseline(&self) -> Option<&Snapshot> {
        self.baseline.as_ref()
    }

    /// Fetches a snapshot and returns everything it implies.
    ///
    /// The first event is always `Refreshed`. On a snapshot fetch error nothing
    /// is returned and the baseline is left as it was. Without a baseline the
    /// snapshot only becomes the baseline: attacks already running when the
    /// watcher starts are not reported as started.
    ///
    /// An attack counts as ended when it leaves the active set, whether it
    /// disappeared from the listing or is now flagged as ended.
    pub async fn tick(&mut self) -> Result<Vec<WatchEvent>, FetchError> {
        let snapshot = self.source.fetch_snapshot().await?;

        let current = snapshot.active_ids();
        let previous = match &self.baseline {
            Some(baseline) => baseline.active_ids(),
            None => current.clone(),
        };
        let current_set: HashSet<u64> = current.iter().copied().collect();
        let previous_set: HashSet<u64> = previous.iter().copied().collect();

        let mut events = vec![WatchEvent::Refreshed(snapshot.clone())];

        for id in current.iter().filter(|id| !previous_set.contains(id)) {
            if let Some(detail) = self.fetch_detail(*id).await {
                events.push(WatchEvent::Transition(Transition::Started(detail)));
            }
        }

        for id in previous.iter().filter(|id| !current_set.contains(id)) {
            if let Some(detail) = self.fetch_detail(*id).await {
                events.push(WatchEvent::Transition(Transition::Ended(detail)));
            }
        }

        self.baseline = Some(snapshot);
        Ok(events)
    }

    // A transition whose detail can't be fetched is skipped, never sent half-filled.
    async fn fetch_detail(&self, id: u64) -> Option<AttackDetail> {
        match self.source.fetch_detail(id).await {
            Ok(detail) => Some(detail),
            Err(e) => {
                tracing::warn!("Failed to fetch details of attack {}: {}", id, e);
                None
            }
        }
    }
}
