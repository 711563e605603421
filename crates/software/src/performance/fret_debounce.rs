use crate::calibration::Fret;

/// Hysteresis on the fret reported by the fingerboard.
///
/// Softpot readings are noisy near fret boundaries, and switching frets on every reading makes the note jitter.
/// A new fret is only accepted once the same raw fret has been read `threshold` times in a row; until then the
/// previously accepted fret holds.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FretDebounce {
    candidate: Fret,
    stable_count: u8,
    current: Fret,
}

impl FretDebounce {
    /// The accepted fret.
    pub fn current(&self) -> Fret {
        self.current
    }

    /// Feeds one raw reading and returns the accepted fret.
    pub fn update(&mut self, raw: Fret, threshold: u8) -> Fret {
        if raw == self.candidate {
            self.stable_count = self.stable_count.saturating_add(1);
        } else {
            self.candidate = raw;
            self.stable_count = 1;
        }
        if self.stable_count >= threshold {
            self.current = self.candidate;
        }
        self.current
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const THRESHOLD: u8 = 3;

    #[test]
    fn starts_on_open_string() {
        assert_eq!(0, FretDebounce::default().current(), "Expected left but got right");
    }

    #[test]
    fn commits_after_three_identical_readings() {
        let mut debounce = FretDebounce::default();
        assert_eq!(0, debounce.update(4, THRESHOLD), "First reading only nominates");
        assert_eq!(0, debounce.update(4, THRESHOLD), "Second reading is not yet stable");
        assert_eq!(4, debounce.update(4, THRESHOLD), "Third reading commits");
        assert_eq!(4, debounce.current(), "Expected left but got right");
    }

    #[test]
    fn oscillation_never_commits() {
        let mut debounce = FretDebounce::default();
        for _ in 0..3 {
            debounce.update(0, THRESHOLD);
        }
        for raw in [5, 5, 6, 5, 5, 6, 6, 5, 6, 5, 5, 6] {
            assert_eq!(0, debounce.update(raw, THRESHOLD), "Fret changed on raw {raw}");
        }
    }

    #[test]
    fn interrupted_run_restarts_count() {
        let mut debounce = FretDebounce::default();
        debounce.update(2, THRESHOLD);
        debounce.update(2, THRESHOLD);
        debounce.update(3, THRESHOLD);
        assert_eq!(0, debounce.update(2, THRESHOLD), "Expected left but got right");
        assert_eq!(0, debounce.update(2, THRESHOLD), "Expected left but got right");
        assert_eq!(2, debounce.update(2, THRESHOLD), "Expected left but got right");
    }

    #[test]
    fn threshold_of_one_commits_immediately() {
        let mut debounce = FretDebounce::default();
        assert_eq!(4, debounce.update(4, 1), "Expected left but got right");
        assert_eq!(5, debounce.update(5, 1), "Expected left but got right");
        assert_eq!(0, debounce.update(0, 1), "Expected left but got right");
    }

    #[test]
    fn threshold_of_zero_behaves_like_one() {
        let mut debounce = FretDebounce::default();
        assert_eq!(9, debounce.update(9, 0), "Expected left but got right");
        assert_eq!(2, debounce.update(2, 0), "Expected left but got right");
    }

    #[test]
    fn long_holds_do_not_overflow() {
        let mut debounce = FretDebounce::default();
        for _ in 0..1000 {
            debounce.update(7, THRESHOLD);
        }
        assert_eq!(7, debounce.current(), "Expected left but got right");
        assert_eq!(7, debounce.update(7, THRESHOLD), "Expected left but got right");
    }
}
