//! Depletion ledger: remaining mineable capacity of a node.

use serde::{Deserialize, Serialize};

/// Remainders below this many health units count as zero.
const EXHAUSTED_EPSILON: f64 = 1e-6;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepletionLedger {
    /// Health units lost so far, never above `max_health`.
    damage_taken: f64,
    /// `None` is the infinite-capacity mode: damage is ignored.
    max_health: Option<u32>,
    damage_multiplier: f32,
}

impl DepletionLedger {
    /// A full ledger.
    pub fn new(max_health: Option<u32>, damage_multiplier: f32) -> Self {
        Self::restore(1.0, max_health, damage_multiplier)
    }

    /// Rebuild a ledger from a persisted capacity fraction.
    pub fn restore(capacity_fraction: f32, max_health: Option<u32>, damage_multiplier: f32) -> Self {
        let max_health = max_health.filter(|h| *h > 0);
        let fraction = if capacity_fraction.is_finite() {
            f64::from(capacity_fraction.clamp(0.0, 1.0))
        } else {
            0.0
        };
        Self {
            damage_taken: max_health.map_or(0.0, |max| (1.0 - fraction) * f64::from(max)),
            max_health,
            damage_multiplier: damage_multiplier.max(0.0),
        }
    }

    /// Reduce capacity by `amount * multiplier / max_health`, clamped at zero.
    /// Negative amounts are ignored so capacity never grows.
    pub fn apply_damage(&mut self, amount: f32) {
        let Some(max_health) = self.max_health else {
            return;
        };
        let max = f64::from(max_health);
        let loss = f64::from(amount.max(0.0)) * f64::from(self.damage_multiplier);
        if !loss.is_finite() {
            return;
        }
        self.damage_taken = (self.damage_taken + loss).min(max);
        if max - self.damage_taken < EXHAUSTED_EPSILON {
            self.damage_taken = max;
        }
    }

    pub fn capacity_fraction(&self) -> f32 {
        let Some(max_health) = self.max_health else {
            return 1.0;
        };
        #[allow(clippy::cast_possible_truncation)]
        let fraction = (1.0 - self.damage_taken / f64::from(max_health)).clamp(0.0, 1.0) as f32;
        fraction
    }

    pub fn is_infinite(&self) -> bool {
        self.max_health.is_none()
    }

    /// Percentage shown to players; always 100 in infinite mode.
    pub fn remaining_percent(&self) -> f32 {
        if self.is_infinite() {
            100.0
        } else {
            self.capacity_fraction() * 100.0
        }
    }

    pub fn is_exhausted(&self) -> bool {
        self.max_health
            .is_some_and(|max| self.damage_taken >= f64::from(max))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn damage_scales_by_max_health_and_multiplier() {
        let mut ledger = DepletionLedger::new(Some(200), 2.0);
        ledger.apply_damage(1.0);
        assert!((ledger.capacity_fraction() - 0.99).abs() < 1e-6);
        assert!((ledger.remaining_percent() - 99.0).abs() < 1e-4);
    }

    #[test]
    fn capacity_is_monotonic_and_clamped() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let mut ledger = DepletionLedger::new(Some(50), 1.0);
        let mut previous = ledger.capacity_fraction();
        for _ in 0..500 {
            ledger.apply_damage(rng.gen_range(-2.0..4.0));
            let current = ledger.capacity_fraction();
            assert!(current <= previous, "capacity grew from {previous} to {current}");
            assert!((0.0..=1.0).contains(&current));
            previous = current;
        }
        assert!(ledger.is_exhausted());
        ledger.apply_damage(1.0);
        assert!(ledger.capacity_fraction().abs() < f32::EPSILON, "exhausted stays at zero");
    }

    #[test]
    fn infinite_mode_always_reports_full() {
        let mut ledger = DepletionLedger::new(None, 1.0);
        for _ in 0..10_000 {
            ledger.apply_damage(3.0);
        }
        assert!((ledger.remaining_percent() - 100.0).abs() < f32::EPSILON);
        assert!(!ledger.is_exhausted());
    }

    #[test]
    fn zero_max_health_is_treated_as_infinite() {
        let ledger = DepletionLedger::new(Some(0), 1.0);
        assert!(ledger.is_infinite());
    }

    #[test]
    fn exhausts_after_exactly_max_health_units() {
        for max in [1, 7, 30, 100, 1000, 2000] {
            let mut ledger = DepletionLedger::new(Some(max), 1.0);
            let mut hits = 0;
            while !ledger.is_exhausted() {
                ledger.apply_damage(1.0);
                hits += 1;
                assert!(hits <= max, "max_health {max} still standing after {hits} hits");
            }
            assert_eq!(hits, max, "max_health {max}");
            assert!(ledger.remaining_percent().abs() < f32::EPSILON);
        }
    }

    #[test]
    fn fractional_multiplier_exhausts_on_schedule() {
        // 0.1 per hit does not sum exactly in binary floating point.
        let mut ledger = DepletionLedger::new(Some(100), 0.1);
        let mut hits = 0;
        while !ledger.is_exhausted() {
            ledger.apply_damage(1.0);
            hits += 1;
        }
        assert_eq!(hits, 1000);
    }

    #[test]
    fn restore_clamps_out_of_range_fraction() {
        let ledger = DepletionLedger::restore(1.7, Some(100), 1.0);
        assert!((ledger.capacity_fraction() - 1.0).abs() < f32::EPSILON);
    }
}
