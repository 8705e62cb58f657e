//! Downgrade/upgrade control for the backend fallback chain.
//!
//! When the active backend returns zero subjects for N consecutive
//! frames, the stage downgrades one level along the selection chain. It
//! only climbs back after M consecutive successful detections, so a
//! borderline scene cannot thrash between backends.

use tracing::info;

/// Decision returned by [`FallbackController::record`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackAction {
    Stay,
    /// Move one level down the chain for the next frame.
    Downgrade,
    /// Move one level back up after sustained success.
    Upgrade,
}

/// Tracks detection outcomes and decides when to switch levels.
#[derive(Debug)]
pub struct FallbackController {
    empties_before_downgrade: u32,
    successes_before_upgrade: u32,
    chain_len: usize,
    level: usize,
    consecutive_empty: u32,
    consecutive_success: u32,
}

impl FallbackController {
    pub fn new(empties_before_downgrade: u32, successes_before_upgrade: u32, chain_len: usize) -> Self {
        Self {
            empties_before_downgrade: empties_before_downgrade.max(1),
            successes_before_upgrade: successes_before_upgrade.max(1),
            chain_len: chain_len.max(1),
            level: 0,
            consecutive_empty: 0,
            consecutive_success: 0,
        }
    }

    /// Index into the selection chain of the currently active backend.
    pub fn level(&self) -> usize {
        self.level
    }

    /// Record one frame's subject count and decide what to do next.
    pub fn record(&mut self, subjects: usize) -> FallbackAction {
        if subjects == 0 {
            self.consecutive_success = 0;
            self.consecutive_empty += 1;
            if self.consecutive_empty >= self.empties_before_downgrade
                && self.level + 1 < self.chain_len
            {
                self.level += 1;
                self.consecutive_empty = 0;
                info!(level = self.level, "downgrading detector backend");
                return FallbackAction::Downgrade;
            }
            return FallbackAction::Stay;
        }

        self.consecutive_empty = 0;
        self.consecutive_success += 1;
        if self.level > 0 && self.consecutive_success >= self.successes_before_upgrade {
            self.level -= 1;
            self.consecutive_success = 0;
            info!(level = self.level, "re-upgrading detector backend");
            return FallbackAction::Upgrade;
        }
        FallbackAction::Stay
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_downgrade_after_n_empty() {
        let mut fc = FallbackController::new(3, 30, 3);
        assert_eq!(fc.record(0), FallbackAction::Stay);
        assert_eq!(fc.record(0), FallbackAction::Stay);
        assert_eq!(fc.record(0), FallbackAction::Downgrade);
        assert_eq!(fc.level(), 1);
    }

    #[test]
    fn test_one_downgrade_per_streak() {
        let mut fc = FallbackController::new(2, 30, 3);
        assert_eq!(fc.record(0), FallbackAction::Stay);
        assert_eq!(fc.record(0), FallbackAction::Downgrade);
        // The streak counter resets; one more empty is not enough.
        assert_eq!(fc.record(0), FallbackAction::Stay);
        assert_eq!(fc.record(0), FallbackAction::Downgrade);
        // Bottom of the chain: no further downgrade.
        assert_eq!(fc.record(0), FallbackAction::Stay);
        assert_eq!(fc.record(0), FallbackAction::Stay);
        assert_eq!(fc.level(), 2);
    }

    #[test]
    fn test_upgrade_requires_sustained_success() {
        let mut fc = FallbackController::new(1, 3, 2);
        assert_eq!(fc.record(0), FallbackAction::Downgrade);
        assert_eq!(fc.record(1), FallbackAction::Stay);
        assert_eq!(fc.record(1), FallbackAction::Stay);
        // An empty frame interrupts the success streak.
        assert_eq!(fc.record(0), FallbackAction::Stay);
        assert_eq!(fc.record(1), FallbackAction::Stay);
        assert_eq!(fc.record(1), FallbackAction::Stay);
        assert_eq!(fc.record(1), FallbackAction::Upgrade);
        assert_eq!(fc.level(), 0);
    }

    #[test]
    fn test_no_upgrade_at_top() {
        let mut fc = FallbackController::new(3, 1, 2);
        assert_eq!(fc.record(5), FallbackAction::Stay);
        assert_eq!(fc.level(), 0);
    }
}
