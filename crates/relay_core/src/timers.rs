use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKind {
    DoorProcessing,
    RobotProcessing,
    CommandTimeout,
}

impl TimerKind {
    pub const ALL: [TimerKind; 3] = [
        TimerKind::DoorProcessing,
        TimerKind::RobotProcessing,
        TimerKind::CommandTimeout,
    ];

    fn slot(self) -> usize {
        match self {
            TimerKind::DoorProcessing => 0,
            TimerKind::RobotProcessing => 1,
            TimerKind::CommandTimeout => 2,
        }
    }
}

/// One deadline slot per timer kind. Arming replaces whatever was pending in
/// that slot, so at most one live timer per kind exists.
#[derive(Debug, Default, Clone)]
pub struct TimerTable {
    deadlines: [Option<Instant>; 3],
}

impl TimerTable {
    /// Arms `kind`, returning the deadline it replaced.
    pub fn arm(&mut self, kind: TimerKind, deadline: Instant) -> Option<Instant> {
        self.deadlines[kind.slot()].replace(deadline)
    }

    /// Returns whether a pending timer was cancelled.
    pub fn cancel(&mut self, kind: TimerKind) -> bool {
        self.deadlines[kind.slot()].take().is_some()
    }

    pub fn cancel_all(&mut self) {
        self.deadlines = [None; 3];
    }

    pub fn is_armed(&self, kind: TimerKind) -> bool {
        self.deadlines[kind.slot()].is_some()
    }

    pub fn deadline(&self, kind: TimerKind) -> Option<Instant> {
        self.deadlines[kind.slot()]
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.deadlines.iter().flatten().min().copied()
    }

    /// Disarms and returns the earliest timer whose deadline is at or before
    /// `now`.
    pub fn take_due(&mut self, now: Instant) -> Option<TimerKind> {
        let kind = TimerKind::ALL
            .into_iter()
            .filter_map(|kind| self.deadline(kind).map(|deadline| (deadline, kind)))
            .filter(|(deadline, _)| *deadline <= now)
            .min_by_key(|(deadline, _)| *deadline)
            .map(|(_, kind)| kind)?;
        self.cancel(kind);
        Some(kind)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn rearming_replaces_pending_deadline() {
        let mut table = TimerTable::default();
        let t0 = Instant::now();
        assert_eq!(table.arm(TimerKind::DoorProcessing, t0), None);
        let later = t0 + Duration::from_secs(5);
        assert_eq!(table.arm(TimerKind::DoorProcessing, later), Some(t0));
        assert_eq!(table.deadline(TimerKind::DoorProcessing), Some(later));
        assert_eq!(table.take_due(t0), None);
    }

    #[test]
    fn take_due_fires_in_deadline_order() {
        let mut table = TimerTable::default();
        let t0 = Instant::now();
        table.arm(TimerKind::RobotProcessing, t0 + Duration::from_secs(15));
        table.arm(TimerKind::DoorProcessing, t0 + Duration::from_secs(10));
        assert_eq!(table.next_deadline(), Some(t0 + Duration::from_secs(10)));

        let end = t0 + Duration::from_secs(20);
        assert_eq!(table.take_due(end), Some(TimerKind::DoorProcessing));
        assert_eq!(table.take_due(end), Some(TimerKind::RobotProcessing));
        assert_eq!(table.take_due(end), None);
        assert_eq!(table.next_deadline(), None);
    }

    #[test]
    fn cancelled_timer_never_fires() {
        let mut table = TimerTable::default();
        let t0 = Instant::now();
        table.arm(TimerKind::CommandTimeout, t0);
        assert!(table.cancel(TimerKind::CommandTimeout));
        assert!(!table.cancel(TimerKind::CommandTimeout));
        assert_eq!(table.take_due(t0 + Duration::from_secs(60)), None);
    }
}
