//! Sinkhole hazard: a periodic roll on completed extractions.

use rand::Rng;

use crate::Constants;

/// True when extraction number `index` is a hazard candidate.
pub fn hazard_due(index: u64, frequency: u64) -> bool {
    frequency > 0 && index > 0 && index % frequency == 0
}

/// Clamp to a valid `gen_bool` probability; NaN and infinities count as 0.
pub(crate) fn probability(value: f32) -> f64 {
    if value.is_finite() {
        f64::from(value).clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// Probability that a due hazard fires, from the difficulty factor.
pub fn hazard_chance(difficulty: f32, constants: &Constants) -> f64 {
    if constants.hazard_difficulty_divisor <= 0.0 {
        return 0.0;
    }
    probability(difficulty / constants.hazard_difficulty_divisor)
}

/// Roll the hazard for extraction `index`. Returns the extra depletion damage
/// when it fires. Consumes randomness only on due indices.
pub fn roll_hazard(
    index: u64,
    frequency: u64,
    difficulty: f32,
    constants: &Constants,
    rng: &mut impl Rng,
) -> Option<f32> {
    if !hazard_due(index, frequency) || !rng.gen_bool(hazard_chance(difficulty, constants)) {
        return None;
    }
    let low = constants.hazard_damage_min;
    let high = constants.hazard_damage_max.max(low);
    Some(rng.gen_range(low..=high) as f32)
}
