//! Live snapshot fan-out.
//!
//! One `watch` channel per chart key. A channel only ever holds the latest full value, so a
//! subscriber that falls behind sees the newest snapshot and never a partial delta.

use std::collections::HashMap;
use std::sync::Mutex;

use tokio::sync::watch;
use tracing::trace;

use crate::models::Odontogram;

use super::StoreResult;

/// Latest known value of a chart. `None` means the chart does not exist (or was deleted).
pub type Snapshot = Option<Odontogram>;

/// Compound key of a chart.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChartKey {
    pub patient_id: String,
    pub odontogram_id: String,
}

impl ChartKey {
    pub fn new(patient_id: &str, odontogram_id: &str) -> Self {
        Self {
            patient_id: patient_id.to_string(),
            odontogram_id: odontogram_id.to_string(),
        }
    }
}

/// Receiving end of a chart subscription.
#[derive(Debug)]
pub struct Subscription {
    key: ChartKey,
    rx: watch::Receiver<Snapshot>,
}

impl Subscription {
    pub fn key(&self) -> &ChartKey {
        &self.key
    }

    /// Current snapshot, whether or not it was already seen.
    pub fn current(&mut self) -> Snapshot {
        self.rx.borrow_and_update().clone()
    }

    /// The newest snapshot if one arrived since the last call, otherwise `None`.
    ///
    /// Intermediate values are skipped; each snapshot replaces the previous one.
    pub fn next_change(&mut self) -> Option<Snapshot> {
        match self.rx.has_changed() {
            Ok(true) => Some(self.rx.borrow_and_update().clone()),
            // Closed channels have nothing new to report
            Ok(false) | Err(_) => None,
        }
    }
}

/// Registry of live channels, keyed by chart.
#[derive(Debug, Default)]
pub struct SnapshotHub {
    channels: Mutex<HashMap<ChartKey, watch::Sender<Snapshot>>>,
}

impl SnapshotHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to a chart. `initial` seeds the channel when nobody is listening yet.
    ///
    /// Callers must hold whatever lock orders `initial` against concurrent publishes.
    pub fn subscribe(
        &self,
        key: ChartKey,
        initial: impl FnOnce() -> StoreResult<Snapshot>,
    ) -> StoreResult<Subscription> {
        let mut channels = self.channels.lock()?;
        channels.retain(|_, tx| tx.receiver_count() > 0);
        let rx = match channels.get(&key) {
            Some(tx) if tx.receiver_count() > 0 => tx.subscribe(),
            _ => {
                let (tx, rx) = watch::channel(initial()?);
                channels.insert(key.clone(), tx);
                rx
            }
        };
        trace!(patient_id = %key.patient_id, odontogram_id = %key.odontogram_id, "subscribed");
        Ok(Subscription { key, rx })
    }

    /// Push a new snapshot to every subscriber of `key`.
    pub fn publish(&self, key: &ChartKey, snapshot: Snapshot) -> StoreResult<()> {
        let mut channels = self.channels.lock()?;
        if let Some(tx) = channels.get(key) {
            if tx.receiver_count() == 0 {
                channels.remove(key);
            } else {
                tx.send_replace(snapshot);
            }
        }
        Ok(())
    }

    /// Number of charts with at least one live subscriber.
    pub fn active_channels(&self) -> StoreResult<usize> {
        let channels = self.channels.lock()?;
        Ok(channels.values().filter(|tx| tx.receiver_count() > 0).count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Dentition;

    fn chart(notes: &str) -> Odontogram {
        let mut chart = Odontogram::new("p1".into(), Dentition::Adult);
        chart.set_notes(notes);
        chart
    }

    #[test]
    fn test_subscriber_sees_initial_value() {
        let hub = SnapshotHub::new();
        let key = ChartKey::new("p1", "o1");

        let mut sub = hub.subscribe(key, || Ok(Some(chart("a")))).unwrap();
        assert_eq!(sub.current().unwrap().notes(), "a");
        assert!(sub.next_change().is_none());
    }

    #[test]
    fn test_publish_replaces_snapshot() {
        let hub = SnapshotHub::new();
        let key = ChartKey::new("p1", "o1");
        let mut sub = hub.subscribe(key.clone(), || Ok(Some(chart("a")))).unwrap();

        hub.publish(&key, Some(chart("b"))).unwrap();
        hub.publish(&key, Some(chart("c"))).unwrap();

        // Only the newest value is delivered
        let snapshot = sub.next_change().unwrap().unwrap();
        assert_eq!(snapshot.notes(), "c");
        assert!(sub.next_change().is_none());

        hub.publish(&key, None).unwrap();
        assert_eq!(sub.next_change(), Some(None));
    }

    #[test]
    fn test_second_subscriber_shares_channel() {
        let hub = SnapshotHub::new();
        let key = ChartKey::new("p1", "o1");
        let _first = hub.subscribe(key.clone(), || Ok(Some(chart("a")))).unwrap();

        let mut second = hub
            .subscribe(key, || panic!("channel already seeded"))
            .unwrap();
        assert_eq!(second.current().unwrap().notes(), "a");
        assert_eq!(hub.active_channels().unwrap(), 1);
    }

    #[test]
    fn test_abandoned_channels_are_pruned() {
        let hub = SnapshotHub::new();
        let key = ChartKey::new("p1", "o1");
        let sub = hub.subscribe(key.clone(), || Ok(None)).unwrap();
        drop(sub);

        hub.publish(&key, Some(chart("x"))).unwrap();
        assert_eq!(hub.active_channels().unwrap(), 0);

        // A later subscriber is seeded fresh
        let mut sub = hub.subscribe(key, || Ok(Some(chart("fresh")))).unwrap();
        assert_eq!(sub.current().unwrap().notes(), "fresh");
    }

    #[test]
    fn test_subscribe_drops_channels_of_other_closed_charts() {
        let hub = SnapshotHub::new();
        for id in ["o1", "o2", "o3"] {
            let sub = hub
                .subscribe(ChartKey::new("p1", id), || Ok(Some(chart(id))))
                .unwrap();
            drop(sub);
        }

        let _live = hub
            .subscribe(ChartKey::new("p1", "o4"), || Ok(None))
            .unwrap();
        let channels = hub.channels.lock().unwrap();
        assert_eq!(channels.len(), 1);
        assert!(channels.contains_key(&ChartKey::new("p1", "o4")));
    }
}
