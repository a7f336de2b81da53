//! Cortisol -> stress -> advice transforms
//!
//! - Negative cortisol predictions are floored at 0
//! - Stress is a logistic curve over cortisol, centred at 15 with slope 0.5, scaled to 10
//! - Stress maps to one of ten ordered advisory buckets, closed-open except the top

use serde::{Deserialize, Serialize};
use std::fmt;

/// Cortisol at which stress is exactly half the scale
pub const STRESS_MIDPOINT_CORTISOL: f64 = 15.0;

/// Logistic slope
pub const STRESS_SLOPE: f64 = 0.5;

/// Upper asymptote of the stress score
pub const STRESS_SCALE: f64 = 10.0;

/// Floor a raw model output at zero.
///
/// NaN and negative zero both report as `0.0`.
pub fn clamp_cortisol(raw: f64) -> f64 {
    if raw > 0.0 {
        raw
    } else {
        0.0
    }
}

/// Logistic stress transform, soft-bounded in (0, 10) and never hard-clamped
pub fn cortisol_to_stress(cortisol: f64) -> f64 {
    STRESS_SCALE / (1.0 + (-STRESS_SLOPE * (cortisol - STRESS_MIDPOINT_CORTISOL)).exp())
}

/// Advisory bucket for a stress score, lowest first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StressLevel {
    VeryCalm,
    VeryLow,
    Stable,
    Everyday,
    Tense,
    Building,
    Elevated,
    High,
    Heavy,
    Severe,
}

impl StressLevel {
    pub const ALL: [StressLevel; 10] = [
        StressLevel::VeryCalm,
        StressLevel::VeryLow,
        StressLevel::Stable,
        StressLevel::Everyday,
        StressLevel::Tense,
        StressLevel::Building,
        StressLevel::Elevated,
        StressLevel::High,
        StressLevel::Heavy,
        StressLevel::Severe,
    ];

    /// Bucket lookup: `[k, k+1)` for k in 0..9, everything from 9 up is `Severe`.
    ///
    /// Scores below 0 land in the first bucket; NaN falls through to the top.
    pub fn from_stress(stress: f64) -> Self {
        Self::ALL[..9]
            .iter()
            .zip(1u8..)
            .find(|(_, upper)| stress < f64::from(*upper))
            .map_or(StressLevel::Severe, |(level, _)| *level)
    }

    /// Bucket index, 0 (calmest) to 9
    pub fn index(self) -> usize {
        self as usize
    }

    /// Short bucket label, e.g. `"<3"` or `">=9"`
    pub fn label(self) -> &'static str {
        match self {
            StressLevel::VeryCalm => "<1",
            StressLevel::VeryLow => "<2",
            StressLevel::Stable => "<3",
            StressLevel::Everyday => "<4",
            StressLevel::Tense => "<5",
            StressLevel::Building => "<6",
            StressLevel::Elevated => "<7",
            StressLevel::High => "<8",
            StressLevel::Heavy => "<9",
            StressLevel::Severe => ">=9",
        }
    }

    pub fn advice(self) -> &'static str {
        match self {
            StressLevel::VeryCalm => "You are in a very stable state. Keep up your current routine.",
            StressLevel::VeryLow => "Stress is very low. You can carry on with activities without strain.",
            StressLevel::Stable => "You are in a stable state, well suited to light exercise or focused work.",
            StressLevel::Everyday => "This is an everyday level of stress. No special action is needed.",
            StressLevel::Tense => "You are somewhat tense. A short break or a walk may help.",
            StressLevel::Building => "Stress is starting to build up. Deep breathing or light relaxation is recommended.",
            StressLevel::Elevated => "This stress level needs attention. Consider resting for about 30 minutes.",
            StressLevel::High => "You are under high stress. You need plenty of rest in a quiet environment.",
            StressLevel::Heavy => "You are carrying a heavy psychological load. Active relaxation such as meditation or sleep is needed.",
            StressLevel::Severe => "Stress is very high. Set aside at least 1-2 hours to calm down and recover.",
        }
    }
}

impl fmt::Display for StressLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashSet;

    #[test]
    fn test_midpoint_is_exactly_five() {
        assert_eq!(cortisol_to_stress(15.0), 5.0);
    }

    #[test]
    fn test_soft_bounds() {
        assert!(cortisol_to_stress(0.0) > 0.0);
        assert!(cortisol_to_stress(0.0) < 0.01);
        assert!(cortisol_to_stress(40.0) < 10.0);
        assert!(cortisol_to_stress(40.0) > 9.99);
    }

    #[test]
    fn test_clamp() {
        assert_eq!(clamp_cortisol(-3.2), 0.0);
        assert_eq!(clamp_cortisol(12.5), 12.5);
        assert_eq!(clamp_cortisol(f64::NAN), 0.0);
        assert!(clamp_cortisol(-0.0).is_sign_positive());
    }

    #[test]
    fn test_bucket_boundaries() {
        assert_eq!(StressLevel::from_stress(0.999), StressLevel::VeryCalm);
        assert_eq!(StressLevel::from_stress(1.0), StressLevel::VeryLow);
        assert_eq!(StressLevel::from_stress(8.999), StressLevel::Heavy);
        assert_eq!(StressLevel::from_stress(9.0), StressLevel::Severe);
        assert_eq!(StressLevel::from_stress(12.0), StressLevel::Severe);
        assert_eq!(StressLevel::from_stress(-1.0), StressLevel::VeryCalm);
    }

    #[test]
    fn test_every_integer_starts_its_bucket() {
        for (k, level) in StressLevel::ALL.iter().enumerate() {
            assert_eq!(StressLevel::from_stress(k as f64), *level);
            assert_eq!(level.index(), k);
        }
    }

    #[test]
    fn test_advice_texts_are_distinct() {
        let texts: HashSet<&str> = StressLevel::ALL.iter().map(|l| l.advice()).collect();
        assert_eq!(texts.len(), 10);
        assert_eq!(StressLevel::Severe.label(), ">=9");
    }

    proptest! {
        #[test]
        fn prop_stress_monotonic(a in 0.0f64..60.0, b in 0.0f64..60.0) {
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(cortisol_to_stress(lo) <= cortisol_to_stress(hi));
        }

        #[test]
        fn prop_clamp_never_negative(raw in -1000.0f64..1000.0) {
            let c = clamp_cortisol(raw);
            prop_assert!(c >= 0.0);
            if raw >= 0.0 {
                prop_assert_eq!(c, raw);
            }
        }

        #[test]
        fn prop_levels_monotonic(a in -2.0f64..12.0, b in -2.0f64..12.0) {
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(StressLevel::from_stress(lo) <= StressLevel::from_stress(hi));
        }
    }
}
