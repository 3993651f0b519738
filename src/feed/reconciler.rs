//! Feed reconciler: single source of truth for the ordered, deduplicated
//! event feed.
//!
//! Two producers exist (the startup snapshot and the live stream) and both
//! funnel through [`QuakeFeed::merge`]. The snapshot is applied as a series
//! of merges, so a live record that arrives before the snapshot resolves is
//! neither dropped nor overwritten: first writer wins on `id`, whichever
//! path delivered it.
//!
//! Invariants after every mutation:
//! - at most one record per `id`
//! - sorted by `earthquake.time` descending, newest first; records with an
//!   unparseable origin time sort last
//! - equal origin times keep their relative order across reads until the
//!   next mutation (stable sort)
//!
//! Retention is unbounded for the life of the process.

use std::collections::HashSet;

use parking_lot::RwLock;
use tokio::sync::broadcast;
use tracing::debug;

use crate::models::QuakeEvent;

pub struct QuakeFeed {
    inner: RwLock<FeedState>,
    /// Push notification per accepted record. Lagging or absent receivers
    /// never block a merge.
    update_tx: broadcast::Sender<QuakeEvent>,
}

struct FeedState {
    events: Vec<QuakeEvent>,
    seen_ids: HashSet<String>,
}

impl Default for QuakeFeed {
    fn default() -> Self {
        Self::new()
    }
}

impl QuakeFeed {
    pub fn new() -> Self {
        let (update_tx, _) = broadcast::channel(256);
        Self {
            inner: RwLock::new(FeedState {
                events: Vec::new(),
                seen_ids: HashSet::new(),
            }),
            update_tx,
        }
    }

    /// Apply the startup snapshot. Implemented as a series of merges so that
    /// records delivered by the live stream before the snapshot resolved
    /// keep precedence over their snapshot duplicates.
    pub fn seed(&self, records: Vec<QuakeEvent>) -> usize {
        let mut accepted = 0;
        for record in records {
            if self.merge(record) {
                accepted += 1;
            }
        }
        debug!(accepted, total = self.len(), "seeded feed from snapshot");
        accepted
    }

    /// Insert one record. Returns false when a record with the same `id` is
    /// already held (first writer wins; live redelivery of an event already
    /// present in history is expected, not an error).
    pub fn merge(&self, record: QuakeEvent) -> bool {
        {
            let mut state = self.inner.write();
            if !state.seen_ids.insert(record.id.clone()) {
                return false;
            }
            state.events.push(record.clone());
            // Stable sort: equal origin times keep insertion order, None
            // (unparseable) sorts after every Some.
            state
                .events
                .sort_by(|a, b| b.occurred_at().cmp(&a.occurred_at()));
        }

        // Outside the lock; drop the result, there may be no subscribers.
        let _ = self.update_tx.send(record);
        true
    }

    /// Synchronous snapshot of the current ordered collection.
    pub fn events(&self) -> Vec<QuakeEvent> {
        self.inner.read().events.clone()
    }

    /// Newest record, if any.
    pub fn latest(&self) -> Option<QuakeEvent> {
        self.inner.read().events.first().cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.read().events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().events.is_empty()
    }

    /// Subscribe to accepted records (snapshot seeding included).
    pub fn subscribe(&self) -> broadcast::Receiver<QuakeEvent> {
        self.update_tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DomesticTsunami, Earthquake, Hypocenter, QuakeIssue};

    fn event(id: &str, time: &str) -> QuakeEvent {
        QuakeEvent {
            id: id.to_string(),
            code: 551,
            time: time.to_string(),
            issue: QuakeIssue::default(),
            earthquake: Earthquake {
                time: time.to_string(),
                hypocenter: Hypocenter {
                    name: String::new(),
                    latitude: 0.0,
                    longitude: 0.0,
                    depth: -1.0,
                    magnitude: -1.0,
                },
                max_scale: 10,
                domestic_tsunami: DomesticTsunami::None,
            },
            points: Vec::new(),
        }
    }

    fn ids(feed: &QuakeFeed) -> Vec<String> {
        feed.events().into_iter().map(|e| e.id).collect()
    }

    #[test]
    fn snapshot_plus_live_scenario() {
        // Snapshot [A@10:00, B@09:00]; live C@10:05 then duplicate A.
        let feed = QuakeFeed::new();
        feed.seed(vec![
            event("A", "2024/05/20 10:00:00"),
            event("B", "2024/05/20 09:00:00"),
        ]);
        assert!(feed.merge(event("C", "2024/05/20 10:05:00")));
        assert!(!feed.merge(event("A", "2024/05/20 10:00:00")));

        assert_eq!(feed.len(), 3);
        assert_eq!(ids(&feed), vec!["C", "A", "B"]);
    }

    #[test]
    fn duplicate_keeps_first_writer() {
        let feed = QuakeFeed::new();
        let mut first = event("A", "2024/05/20 10:00:00");
        first.earthquake.max_scale = 40;
        assert!(feed.merge(first));

        let mut dup = event("A", "2024/05/20 10:00:00");
        dup.earthquake.max_scale = 70;
        assert!(!feed.merge(dup));

        assert_eq!(feed.len(), 1);
        assert_eq!(feed.latest().unwrap().earthquake.max_scale, 40);
    }

    #[test]
    fn ordering_is_descending_after_any_sequence() {
        let feed = QuakeFeed::new();
        feed.merge(event("m1", "2024/05/20 08:00:00"));
        feed.merge(event("m2", "2024/05/20 12:00:00"));
        feed.seed(vec![
            event("s1", "2024/05/20 10:00:00"),
            event("s2", "2024/05/20 11:00:00"),
        ]);
        feed.merge(event("m3", "2024/05/20 09:30:00"));

        let times: Vec<_> = feed
            .events()
            .iter()
            .map(|e| e.occurred_at().unwrap())
            .collect();
        assert!(times.windows(2).all(|w| w[0] >= w[1]));
    }

    #[test]
    fn equal_times_are_stable_across_reads() {
        let feed = QuakeFeed::new();
        feed.merge(event("x", "2024/05/20 10:00:00"));
        feed.merge(event("y", "2024/05/20 10:00:00"));

        let first = ids(&feed);
        assert_eq!(first, ids(&feed));

        // An unrelated mutation must not reshuffle the tie.
        feed.merge(event("z", "2024/05/20 11:00:00"));
        assert_eq!(ids(&feed), vec!["z", "x", "y"]);
    }

    #[test]
    fn unparseable_time_sorts_last() {
        let feed = QuakeFeed::new();
        feed.merge(event("bad", "???"));
        feed.merge(event("ok", "2024/05/20 10:00:00"));
        assert_eq!(ids(&feed), vec!["ok", "bad"]);
    }

    #[test]
    fn merge_before_seed_keeps_live_precedence() {
        let feed = QuakeFeed::new();
        let mut live = event("A", "2024/05/20 10:00:00");
        live.earthquake.max_scale = 55;
        assert!(feed.merge(live));

        // Snapshot arrives late, carrying a duplicate of A.
        let seeded = feed.seed(vec![
            event("A", "2024/05/20 10:00:00"),
            event("B", "2024/05/20 09:00:00"),
        ]);
        assert_eq!(seeded, 1);
        assert_eq!(feed.len(), 2);
        assert_eq!(feed.latest().unwrap().earthquake.max_scale, 55);
    }

    #[tokio::test]
    async fn accepted_merges_are_pushed_to_subscribers() {
        let feed = QuakeFeed::new();
        let mut rx = feed.subscribe();

        feed.merge(event("A", "2024/05/20 10:00:00"));
        feed.merge(event("A", "2024/05/20 10:00:00")); // duplicate, no push

        let got = rx.recv().await.unwrap();
        assert_eq!(got.id, "A");
        assert!(rx.try_recv().is_err());
    }
}
