//! Behavior selection for the Sonar Rover.
//!
//! The selector is a pure function from one `DistanceSample` to one `Maneuver`.
//! It is expressed as an ordered list of `(DistanceBand, Maneuver)` rules where the
//! first matching rule wins, backed by a fallback maneuver so that every sample,
//! including a missing echo, selects exactly one maneuver.
//!
//! # Example
//! ```rust
//! use sr_core::utils::math::behavior::{BehaviorSelector, DistanceSample, Maneuver};
//! let selector = BehaviorSelector::threshold(20, Maneuver::MoveForward);
//! assert_eq!(selector.select(DistanceSample::Cm(15)), Maneuver::AvoidObstacle);
//! assert_eq!(selector.select(DistanceSample::Cm(45)), Maneuver::MoveForward);
//! ```

use serde::{Deserialize, Serialize};

/// One ranging result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistanceSample {
    /// Measured distance in whole centimeters. `Cm(0)` is a real, very close reading.
    Cm(u16),
    /// No echo arrived within the timeout.
    NoEcho,
}

impl DistanceSample {
    /// Convert an echo high-time into a distance.
    ///
    /// Sound travels roughly 0.034 cm/µs and the pulse covers the round trip, so
    /// `cm = floor(us * 0.034 / 2) = us * 17 / 1000`.
    pub fn from_echo_us(echo_us: u64) -> Self {
        let cm = echo_us.saturating_mul(17) / 1000;
        DistanceSample::Cm(u16::try_from(cm).unwrap_or(u16::MAX))
    }

    pub fn cm(self) -> Option<u16> {
        match self {
            DistanceSample::Cm(cm) => Some(cm),
            DistanceSample::NoEcho => None,
        }
    }
}

/// The action committed to for one control cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Maneuver {
    MoveForward,
    AvoidObstacle,
}

/// Predicate over a sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistanceBand {
    /// Matches only `DistanceSample::NoEcho`.
    NoReading,
    /// `cm < limit`
    Below(u16),
    /// `cm >= limit`
    AtLeast(u16),
    /// `lo <= cm < hi`
    Within(u16, u16),
}

impl DistanceBand {
    pub fn contains(
        self,
        sample: DistanceSample,
    ) -> bool {
        match (self, sample) {
            (DistanceBand::NoReading, DistanceSample::NoEcho) => true,
            (DistanceBand::Below(limit), DistanceSample::Cm(cm)) => cm < limit,
            (DistanceBand::AtLeast(limit), DistanceSample::Cm(cm)) => cm >= limit,
            (DistanceBand::Within(lo, hi), DistanceSample::Cm(cm)) => lo <= cm && cm < hi,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rule {
    pub when: DistanceBand,
    pub then: Maneuver,
}

impl Rule {
    pub const fn new(
        when: DistanceBand,
        then: Maneuver,
    ) -> Self {
        Self { when, then }
    }
}

/// Priority list of rules with a fallback.
///
/// Holds no state between calls; `select` depends only on its argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BehaviorSelector<const N: usize = 2> {
    rules: [Rule; N],
    fallback: Maneuver,
}

impl BehaviorSelector<2> {
    /// Single-threshold policy: avoid below `threshold_cm`, otherwise move forward.
    ///
    /// A missing echo is routed to `no_echo` before the threshold is consulted.
    pub const fn threshold(
        threshold_cm: u16,
        no_echo: Maneuver,
    ) -> Self {
        Self {
            rules: [
                Rule::new(DistanceBand::NoReading, no_echo),
                Rule::new(DistanceBand::Below(threshold_cm), Maneuver::AvoidObstacle),
            ],
            fallback: Maneuver::MoveForward,
        }
    }
}

impl<const N: usize> BehaviorSelector<N> {
    pub const fn new(
        rules: [Rule; N],
        fallback: Maneuver,
    ) -> Self {
        Self { rules, fallback }
    }

    /// Pick the maneuver of the first rule whose band contains `sample`.
    pub fn select(
        &self,
        sample: DistanceSample,
    ) -> Maneuver {
        self.rules
            .iter()
            .find(|rule| rule.when.contains(sample))
            .map_or(self.fallback, |rule| rule.then)
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn fallback(&self) -> Maneuver {
        self.fallback
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SELECTOR: BehaviorSelector = BehaviorSelector::threshold(20, Maneuver::MoveForward);

    #[test]
    fn test_threshold_boundary() {
        assert_eq!(SELECTOR.select(DistanceSample::Cm(19)), Maneuver::AvoidObstacle);
        assert_eq!(SELECTOR.select(DistanceSample::Cm(20)), Maneuver::MoveForward);
    }

    #[test]
    fn test_every_distance_maps_to_one_side() {
        for cm in 0..=u16::MAX {
            let expected = if cm < 20 {
                Maneuver::AvoidObstacle
            } else {
                Maneuver::MoveForward
            };
            assert_eq!(SELECTOR.select(DistanceSample::Cm(cm)), expected, "cm = {}", cm);
        }
    }

    #[test]
    fn test_zero_is_a_reading_not_a_timeout() {
        assert_eq!(SELECTOR.select(DistanceSample::Cm(0)), Maneuver::AvoidObstacle);
        assert_eq!(SELECTOR.select(DistanceSample::NoEcho), Maneuver::MoveForward);
    }

    #[test]
    fn test_no_echo_convention_is_configurable() {
        let cautious = BehaviorSelector::threshold(20, Maneuver::AvoidObstacle);
        assert_eq!(cautious.select(DistanceSample::NoEcho), Maneuver::AvoidObstacle);
        assert_eq!(cautious.select(DistanceSample::Cm(300)), Maneuver::MoveForward);
    }

    #[test]
    fn test_select_is_history_independent() {
        let samples = [
            DistanceSample::Cm(5),
            DistanceSample::NoEcho,
            DistanceSample::Cm(45),
            DistanceSample::Cm(19),
            DistanceSample::Cm(20),
        ];
        let first: [Maneuver; 5] = samples.map(|s| SELECTOR.select(s));
        let mut reversed = samples;
        reversed.reverse();
        for s in reversed {
            let idx = samples.iter().position(|x| *x == s).unwrap();
            assert_eq!(SELECTOR.select(s), first[idx]);
        }
    }

    #[test]
    fn test_first_matching_rule_wins() {
        // Three bands: anything closer than 10 cm or beyond range triggers avoidance,
        // 10..20 cm also avoids, the rest is handled by the fallback.
        let bands = BehaviorSelector::new(
            [
                Rule::new(DistanceBand::NoReading, Maneuver::AvoidObstacle),
                Rule::new(DistanceBand::Below(10), Maneuver::AvoidObstacle),
                Rule::new(DistanceBand::Within(10, 20), Maneuver::AvoidObstacle),
            ],
            Maneuver::MoveForward,
        );
        assert_eq!(bands.select(DistanceSample::NoEcho), Maneuver::AvoidObstacle);
        assert_eq!(bands.select(DistanceSample::Cm(3)), Maneuver::AvoidObstacle);
        assert_eq!(bands.select(DistanceSample::Cm(12)), Maneuver::AvoidObstacle);
        assert_eq!(bands.select(DistanceSample::Cm(20)), Maneuver::MoveForward);

        let shadowed = BehaviorSelector::new(
            [
                Rule::new(DistanceBand::AtLeast(0), Maneuver::MoveForward),
                Rule::new(DistanceBand::Below(20), Maneuver::AvoidObstacle),
            ],
            Maneuver::AvoidObstacle,
        );
        assert_eq!(shadowed.select(DistanceSample::Cm(5)), Maneuver::MoveForward);
        assert_eq!(shadowed.select(DistanceSample::NoEcho), Maneuver::AvoidObstacle);
    }

    #[test]
    fn test_from_echo_us() {
        assert_eq!(DistanceSample::from_echo_us(0), DistanceSample::Cm(0));
        assert_eq!(DistanceSample::from_echo_us(58), DistanceSample::Cm(0));
        assert_eq!(DistanceSample::from_echo_us(59), DistanceSample::Cm(1));
        assert_eq!(DistanceSample::from_echo_us(1_176), DistanceSample::Cm(19));
        assert_eq!(DistanceSample::from_echo_us(1_177), DistanceSample::Cm(20));
        assert_eq!(DistanceSample::from_echo_us(u64::MAX), DistanceSample::Cm(u16::MAX));
    }
}
