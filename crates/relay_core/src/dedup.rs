use std::{
    collections::HashMap,
    time::{Duration, Instant},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicMessageRecord {
    pub last_payload: String,
    pub last_seen: Instant,
}

/// Per-topic debounce of repeated identical payloads.
#[derive(Debug)]
pub struct DuplicateFilter {
    window: Duration,
    records: HashMap<String, TopicMessageRecord>,
}

impl DuplicateFilter {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            records: HashMap::new(),
        }
    }

    /// Returns `true` when the message repeats the stored payload for `topic`
    /// inside the window. Anything else is recorded and passes.
    pub fn is_duplicate(&mut self, topic: &str, payload: &str, now: Instant) -> bool {
        match self.records.get_mut(topic) {
            Some(record) => {
                if record.last_payload == payload
                    && now.saturating_duration_since(record.last_seen) < self.window
                {
                    return true;
                }
                record.last_payload.clear();
                record.last_payload.push_str(payload);
                record.last_seen = now;
                false
            }
            None => {
                self.records.insert(
                    topic.to_owned(),
                    TopicMessageRecord {
                        last_payload: payload.to_owned(),
                        last_seen: now,
                    },
                );
                false
            }
        }
    }

    pub fn record(&self, topic: &str) -> Option<&TopicMessageRecord> {
        self.records.get(topic)
    }

    pub fn window(&self) -> Duration {
        self.window
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: Duration = Duration::from_millis(2_000);

    #[test]
    fn first_message_on_topic_is_never_duplicate() {
        let mut filter = DuplicateFilter::new(WINDOW);
        let now = Instant::now();
        assert!(!filter.is_duplicate("a", "Authorized", now));
        assert_eq!(
            filter.record("a").map(|r| r.last_payload.as_str()),
            Some("Authorized")
        );
    }

    #[test]
    fn identical_payload_inside_window_is_suppressed() {
        let mut filter = DuplicateFilter::new(WINDOW);
        let t0 = Instant::now();
        assert!(!filter.is_duplicate("a", "BLOCKED", t0));
        assert!(filter.is_duplicate("a", "BLOCKED", t0 + Duration::from_millis(1_999)));
    }

    #[test]
    fn identical_payload_at_window_edge_passes() {
        let mut filter = DuplicateFilter::new(WINDOW);
        let t0 = Instant::now();
        assert!(!filter.is_duplicate("a", "BLOCKED", t0));
        assert!(!filter.is_duplicate("a", "BLOCKED", t0 + WINDOW));
    }

    #[test]
    fn suppressed_duplicates_do_not_extend_the_window() {
        let mut filter = DuplicateFilter::new(WINDOW);
        let t0 = Instant::now();
        assert!(!filter.is_duplicate("a", "STOP", t0));
        assert!(filter.is_duplicate("a", "STOP", t0 + Duration::from_millis(1_500)));
        assert!(!filter.is_duplicate("a", "STOP", t0 + Duration::from_millis(2_100)));
    }

    #[test]
    fn different_payload_passes_and_replaces_record() {
        let mut filter = DuplicateFilter::new(WINDOW);
        let t0 = Instant::now();
        assert!(!filter.is_duplicate("a", "Authorized", t0));
        let t1 = t0 + Duration::from_millis(100);
        assert!(!filter.is_duplicate("a", "DENIED", t1));
        assert!(!filter.is_duplicate("a", "Authorized", t1 + Duration::from_millis(100)));

        let record = filter.record("a").expect("record");
        assert_eq!(record.last_payload, "Authorized");
        assert_eq!(record.last_seen, t1 + Duration::from_millis(100));
    }

    #[test]
    fn topics_do_not_suppress_each_other() {
        let mut filter = DuplicateFilter::new(WINDOW);
        let t0 = Instant::now();
        assert!(!filter.is_duplicate("a", "BLOCKED", t0));
        assert!(!filter.is_duplicate("b", "BLOCKED", t0));
        assert!(filter.is_duplicate("a", "BLOCKED", t0));
    }
}
