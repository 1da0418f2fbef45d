use std::collections::VecDeque;
use std::time::Duration;

/// Newest-first log with a fixed capacity. Inserting past the cap evicts
/// from the tail (the oldest entries).
#[derive(Debug, Clone)]
pub struct BoundedLog<T> {
    entries: VecDeque<T>,
    capacity: usize,
}

impl<T: Clone> BoundedLog<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            capacity,
        }
    }

    /// Rebuild from a persisted newest-first sequence, trimming to the cap.
    pub fn from_entries(entries: Vec<T>, capacity: usize) -> Self {
        let mut entries = VecDeque::from(entries);
        entries.truncate(capacity);
        Self { entries, capacity }
    }

    pub fn push(&mut self, entry: T) {
        self.entries.push_front(entry);
        self.entries.truncate(self.capacity);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn newest(&self) -> Option<&T> {
        self.entries.front()
    }

    pub fn oldest(&self) -> Option<&T> {
        self.entries.back()
    }

    /// Copy of the entries, newest first.
    pub fn snapshot(&self) -> Vec<T> {
        self.entries.iter().cloned().collect()
    }
}

/// Admits a periodic sample at most once per `interval`.
#[derive(Debug, Clone, Copy)]
pub struct PeriodicGate {
    interval_ms: u64,
    last_accepted: Option<i64>,
}

impl PeriodicGate {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval_ms: u64::try_from(interval.as_millis()).unwrap_or(u64::MAX),
            last_accepted: None,
        }
    }

    /// Accept `now_ms` if at least one interval has passed since the last
    /// accepted timestamp. After a clock step backwards nothing is admitted
    /// until the clock is an interval past that timestamp again.
    pub fn try_accept(&mut self, now_ms: i64) -> bool {
        let open = self.last_accepted.is_none_or(|last| {
            now_ms
                .checked_sub(last)
                .and_then(|elapsed| u64::try_from(elapsed).ok())
                .is_some_and(|elapsed| elapsed >= self.interval_ms)
        });
        if open {
            self.last_accepted = Some(now_ms);
        }
        open
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_stays_capped_and_keeps_newest() {
        let mut log = BoundedLog::new(500);
        for n in 0..1_200 {
            log.push(n);
            assert!(log.len() <= 500);
        }
        let snap = log.snapshot();
        assert_eq!(snap.len(), 500);
        assert_eq!(snap.first(), Some(&1_199));
        assert_eq!(snap.last(), Some(&700));
    }

    #[test]
    fn from_entries_trims_tail() {
        let log = BoundedLog::from_entries(vec![5, 4, 3, 2, 1], 3);
        assert_eq!(log.snapshot(), vec![5, 4, 3]);
        assert_eq!(log.newest(), Some(&5));
        assert_eq!(log.oldest(), Some(&3));
    }

    #[test]
    fn gate_spacing() {
        let mut gate = PeriodicGate::new(Duration::from_secs(60));
        assert!(gate.try_accept(0));
        assert!(!gate.try_accept(30_000));
        assert!(gate.try_accept(61_000));
        assert!(!gate.try_accept(120_999));
        assert!(gate.try_accept(121_000));
    }

    #[test]
    fn gate_waits_out_a_backwards_clock_step() {
        let mut gate = PeriodicGate::new(Duration::from_secs(60));
        assert!(gate.try_accept(100_000));
        assert!(!gate.try_accept(70_000));
        assert!(!gate.try_accept(40_000));
        assert!(!gate.try_accept(159_999));
        assert!(gate.try_accept(160_000));
    }
}
