use std::time::{Duration, Instant};

pub const COMMAND_STABILITY_DWELL_MS: u64 = 200;
pub const COMMAND_STABILITY_DWELL: Duration = Duration::from_millis(COMMAND_STABILITY_DWELL_MS);

/// Debounces a polled value: a candidate is accepted only after it has been
/// observed unchanged for the dwell time and nothing contradicting it is
/// running. Each accepted value is reported once.
#[derive(Debug, Clone)]
pub struct StabilityWindow<T> {
    dwell: Duration,
    candidate: Option<(T, Instant)>,
    accepted: Option<T>,
}

impl<T: Copy + PartialEq> StabilityWindow<T> {
    pub fn new(dwell: Duration) -> Self {
        Self {
            dwell,
            candidate: None,
            accepted: None,
        }
    }

    pub fn accepted(&self) -> Option<T> {
        self.accepted
    }

    pub fn candidate(&self) -> Option<T> {
        self.candidate.map(|(value, _)| value)
    }

    /// Records `value` and returns it if it is newly accepted. A value that
    /// differs from the current candidate restarts the dwell.
    pub fn observe(&mut self, value: T, now: Instant, contradicted: bool) -> Option<T> {
        match self.candidate {
            Some((current, _)) if current == value => {}
            _ => self.candidate = Some((value, now)),
        }
        self.poll(now, contradicted)
    }

    /// Re-evaluates the current candidate without a new observation.
    pub fn poll(&mut self, now: Instant, contradicted: bool) -> Option<T> {
        let (value, since) = self.candidate?;
        if self.accepted == Some(value) || contradicted {
            return None;
        }
        if now.saturating_duration_since(since) < self.dwell {
            return None;
        }
        self.accepted = Some(value);
        Some(value)
    }

    /// When the pending candidate will have dwelt long enough.
    pub fn deadline(&self) -> Option<Instant> {
        let (value, since) = self.candidate?;
        if self.accepted == Some(value) {
            return None;
        }
        Some(since + self.dwell)
    }
}

impl<T: Copy + PartialEq> Default for StabilityWindow<T> {
    fn default() -> Self {
        Self::new(COMMAND_STABILITY_DWELL)
    }
}
