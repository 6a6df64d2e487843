//! Verdict debouncing
//!
//! Per-frame classification jitters when a pose sits near a threshold. The
//! debouncer holds the verdict currently shown and only lets it change once
//! the minimum interval since the previous visible change has passed.

use crate::config::DebounceConfig;
use crate::types::{DisplayState, Millis, Verdict};

/// Holds the visible verdict and the time it last changed
#[derive(Debug, Clone)]
pub struct VerdictDebouncer {
    state: DisplayState,
    min_change_interval_ms: Millis,
}

impl Default for VerdictDebouncer {
    fn default() -> Self {
        Self::new(&DebounceConfig::default())
    }
}

impl VerdictDebouncer {
    pub fn new(config: &DebounceConfig) -> Self {
        Self {
            state: DisplayState::default(),
            min_change_interval_ms: config.min_change_interval_ms,
        }
    }

    /// Offer a freshly classified verdict.
    ///
    /// Returns the verdict to display and whether it changed. Before the
    /// first visible change there is no interval to wait for.
    pub fn update(&mut self, verdict: Verdict, now: Millis) -> (Verdict, bool) {
        if verdict == self.state.current_verdict {
            return (self.state.current_verdict, false);
        }

        let interval_elapsed = match self.state.last_changed_at {
            None => true,
            Some(last) => now - last > self.min_change_interval_ms,
        };

        if !interval_elapsed {
            log::debug!(
                "suppressed verdict change {} -> {} at {}ms",
                self.state.current_verdict,
                verdict,
                now
            );
            return (self.state.current_verdict, false);
        }

        log::info!(
            "visible verdict changed {} -> {}",
            self.state.current_verdict,
            verdict
        );

        self.state = DisplayState {
            current_verdict: verdict,
            last_changed_at: Some(now),
        };

        (verdict, true)
    }

    pub fn current(&self) -> Verdict {
        self.state.current_verdict
    }

    pub fn state(&self) -> &DisplayState {
        &self.state
    }

    /// Return to the startup state
    pub fn reset(&mut self) {
        self.state = DisplayState::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state() {
        let debouncer = VerdictDebouncer::default();
        assert_eq!(debouncer.current(), Verdict::AwaitingDetection);
        assert_eq!(debouncer.state().last_changed_at, None);
    }

    #[test]
    fn test_debounce_scenario() {
        let mut debouncer = VerdictDebouncer::default();

        assert_eq!(debouncer.update(Verdict::Good, 1000), (Verdict::Good, true));
        assert_eq!(debouncer.update(Verdict::Poor, 2000), (Verdict::Good, false));
        assert_eq!(debouncer.update(Verdict::Poor, 6001), (Verdict::Poor, true));
        assert_eq!(debouncer.state().last_changed_at, Some(6001));
    }

    #[test]
    fn test_interval_boundary_is_exclusive() {
        let mut debouncer = VerdictDebouncer::default();
        debouncer.update(Verdict::Good, 1000);

        assert_eq!(debouncer.update(Verdict::Regular, 6000), (Verdict::Good, false));
        assert_eq!(debouncer.update(Verdict::Regular, 6001), (Verdict::Regular, true));
    }

    #[test]
    fn test_same_verdict_never_changes() {
        let mut debouncer = VerdictDebouncer::default();
        debouncer.update(Verdict::Good, 1000);

        assert_eq!(debouncer.update(Verdict::Good, 60_000), (Verdict::Good, false));
        // Repeating the current verdict does not refresh the change time
        assert_eq!(debouncer.state().last_changed_at, Some(1000));
    }

    #[test]
    fn test_flicker_is_suppressed() {
        let mut debouncer = VerdictDebouncer::default();
        debouncer.update(Verdict::Good, 0);

        let mut changes = 0;
        for frame in 1..300 {
            let verdict = if frame % 2 == 0 { Verdict::Good } else { Verdict::Regular };
            let (_, changed) = debouncer.update(verdict, frame * 16);
            if changed {
                changes += 1;
            }
        }

        // ~4.8s of frames at 60fps never crosses the 5s interval
        assert_eq!(changes, 0);
    }

    #[test]
    fn test_clock_going_backwards_blocks_change() {
        let mut debouncer = VerdictDebouncer::default();
        debouncer.update(Verdict::Good, 10_000);
        assert_eq!(debouncer.update(Verdict::Poor, 1_000), (Verdict::Good, false));
    }

    #[test]
    fn test_custom_interval_and_reset() {
        let mut debouncer = VerdictDebouncer::new(&DebounceConfig {
            min_change_interval_ms: 100,
        });
        debouncer.update(Verdict::Good, 0);
        assert_eq!(debouncer.update(Verdict::Poor, 101), (Verdict::Poor, true));

        debouncer.reset();
        assert_eq!(*debouncer.state(), DisplayState::default());
    }
}
