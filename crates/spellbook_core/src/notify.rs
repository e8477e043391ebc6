//! Last-updated marker persistence and observer fan-out.
//!
//! # Responsibility
//! - Persist the `lastUpdated` marker outside the three collections.
//! - Publish each new marker to registered observers.
//!
//! # Invariants
//! - The marker never decreases: a new value is at least the previous one.
//! - Observers only see the most recent value; there is no replay.

use crate::db::DbResult;
use log::debug;
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

const LAST_UPDATED_KEY: &str = "last_updated";

/// Source of wall-clock time in epoch milliseconds.
pub trait Clock: Send {
    fn now_ms(&self) -> i64;
}

/// Clock backed by `SystemTime`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |elapsed| {
                i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX)
            })
    }
}

/// Manually driven clock, shareable between a caller and the store.
#[derive(Debug, Clone, Default)]
pub struct ManualClock(Arc<AtomicI64>);

impl ManualClock {
    pub fn at(now_ms: i64) -> Self {
        Self(Arc::new(AtomicI64::new(now_ms)))
    }

    pub fn set(&self, now_ms: i64) {
        self.0.store(now_ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> i64 {
        self.0.load(Ordering::SeqCst)
    }
}

/// Handle returned by [`ChangeNotifier::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

type Observer = Box<dyn Fn(i64) + Send>;

/// Change notifier bound to one store connection.
pub struct ChangeNotifier {
    clock: Box<dyn Clock>,
    observers: Vec<(ObserverId, Observer)>,
    next_observer_id: u64,
}

impl ChangeNotifier {
    pub fn new(clock: Box<dyn Clock>) -> Self {
        Self {
            clock,
            observers: Vec::new(),
            next_observer_id: 0,
        }
    }

    pub fn now_ms(&self) -> i64 {
        self.clock.now_ms()
    }

    /// Registers an observer invoked with every new marker value.
    pub fn subscribe(&mut self, observer: impl Fn(i64) + Send + 'static) -> ObserverId {
        let id = ObserverId(self.next_observer_id);
        self.next_observer_id += 1;
        self.observers.push((id, Box::new(observer)));
        id
    }

    /// Removes an observer. Returns `false` for unknown ids.
    pub fn unsubscribe(&mut self, id: ObserverId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(current, _)| *current != id);
        self.observers.len() != before
    }

    /// Writes the next marker through `conn` and returns it.
    ///
    /// Pass the open transaction of the mutation being reported so the
    /// marker commits or rolls back together with it.
    pub fn stamp(&self, conn: &Connection) -> DbResult<i64> {
        let previous = current_marker(conn)?.unwrap_or(0);
        let marker = self.clock.now_ms().max(previous);
        conn.execute(
            "INSERT INTO store_meta (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value;",
            params![LAST_UPDATED_KEY, marker],
        )?;
        Ok(marker)
    }

    /// Hands a committed marker to every observer.
    pub fn publish(&self, marker: i64) {
        debug!(
            "event=store_touch module=notify status=ok marker={} observers={}",
            marker,
            self.observers.len()
        );
        for (_, observer) in &self.observers {
            observer(marker);
        }
    }
}

/// Returns the persisted marker, or `None` before the first mutation.
pub fn current_marker(conn: &Connection) -> DbResult<Option<i64>> {
    let marker = conn
        .query_row(
            "SELECT value FROM store_meta WHERE key = ?1;",
            [LAST_UPDATED_KEY],
            |row| row.get::<_, i64>(0),
        )
        .optional()?;
    Ok(marker)
}

#[cfg(test)]
mod tests {
    use super::{current_marker, ChangeNotifier, ManualClock};
    use crate::db::open_db_in_memory;
    use std::sync::{Arc, Mutex};

    #[test]
    fn marker_is_absent_before_first_touch() {
        let conn = open_db_in_memory().unwrap();
        assert_eq!(current_marker(&conn).unwrap(), None);
    }

    #[test]
    fn stamp_persists_and_publish_notifies() {
        let conn = open_db_in_memory().unwrap();
        let clock = ManualClock::at(1_000);
        let mut notifier = ChangeNotifier::new(Box::new(clock.clone()));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        notifier.subscribe(move |marker| sink.lock().unwrap().push(marker));

        for now in [1_000, 2_500] {
            clock.set(now);
            let marker = notifier.stamp(&conn).unwrap();
            assert_eq!(marker, now);
            notifier.publish(marker);
        }

        assert_eq!(current_marker(&conn).unwrap(), Some(2_500));
        assert_eq!(*seen.lock().unwrap(), vec![1_000, 2_500]);
    }

    #[test]
    fn marker_never_moves_backwards() {
        let conn = open_db_in_memory().unwrap();
        let clock = ManualClock::at(5_000);
        let notifier = ChangeNotifier::new(Box::new(clock.clone()));

        notifier.stamp(&conn).unwrap();
        clock.set(10);
        assert_eq!(notifier.stamp(&conn).unwrap(), 5_000);
    }

    #[test]
    fn stamp_rolls_back_with_its_transaction() {
        let mut conn = open_db_in_memory().unwrap();
        let notifier = ChangeNotifier::new(Box::new(ManualClock::at(3_000)));

        let tx = conn.transaction().unwrap();
        notifier.stamp(&tx).unwrap();
        drop(tx);

        assert_eq!(current_marker(&conn).unwrap(), None);
    }

    #[test]
    fn unsubscribed_observer_is_not_called() {
        let conn = open_db_in_memory().unwrap();
        let mut notifier = ChangeNotifier::new(Box::new(ManualClock::at(7)));
        let seen = Arc::new(Mutex::new(0));
        let sink = Arc::clone(&seen);
        let id = notifier.subscribe(move |_| *sink.lock().unwrap() += 1);

        assert!(notifier.unsubscribe(id));
        assert!(!notifier.unsubscribe(id));
        notifier.publish(notifier.stamp(&conn).unwrap());
        assert_eq!(*seen.lock().unwrap(), 0);
    }
}
