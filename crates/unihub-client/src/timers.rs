//! Timer slots owned by the room controller.
//!
//! Each slot holds at most one armed deadline tagged with a token. Firing
//! empties the slot and hands the token back so the controller can check it
//! still refers to the request or offer that armed it.

use std::time::Duration;

use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerKind {
    JoinTimeout,
    PromotionSettle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Armed {
    token: u64,
    deadline: Instant,
}

#[derive(Debug, Default)]
pub struct TimerSlots {
    join: Option<Armed>,
    promotion: Option<Armed>,
}

impl TimerSlots {
    fn slot(&mut self, kind: TimerKind) -> &mut Option<Armed> {
        match kind {
            TimerKind::JoinTimeout => &mut self.join,
            TimerKind::PromotionSettle => &mut self.promotion,
        }
    }

    /// Arm `kind`, replacing whatever it held.
    pub fn arm(&mut self, kind: TimerKind, token: u64, after: Duration, now: Instant) {
        *self.slot(kind) = Some(Armed {
            token,
            deadline: now + after,
        });
    }

    /// Returns whether something was armed.
    pub fn cancel(&mut self, kind: TimerKind) -> bool {
        self.slot(kind).take().is_some()
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        [self.join, self.promotion]
            .into_iter()
            .flatten()
            .map(|armed| armed.deadline)
            .min()
    }

    /// Disarm and return every slot whose deadline is at or before `now`.
    pub fn take_due(&mut self, now: Instant) -> Vec<(TimerKind, u64)> {
        let mut due = Vec::new();
        for kind in [TimerKind::JoinTimeout, TimerKind::PromotionSettle] {
            let slot = self.slot(kind);
            if matches!(slot, Some(armed) if armed.deadline <= now) {
                if let Some(armed) = slot.take() {
                    due.push((kind, armed.token));
                }
            }
        }
        due
    }
}
