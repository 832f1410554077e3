//! Quantity, quality, and durability rules for a resolved material.

use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;
use tracing::warn;

use crate::{Constants, MaterialDef, MaterialKind, QualityTier};

/// Inclusive bonus range for a multi-spawn material. Narrows as value rises.
pub fn multi_spawn_range(base_market_value: f32, constants: &Constants) -> (u32, u32) {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let discount = ((base_market_value / 2.0).max(0.0) as u32).min(constants.max_value_discount);
    let low = constants.multi_spawn_min.saturating_sub(discount);
    let high = constants
        .multi_spawn_max
        .saturating_sub(discount * 2)
        .max(low);
    (low, high)
}

/// Stack size for a freshly extracted material.
///
/// Single spawns are always 1. Components get a small flat bonus. Everything
/// else rolls the value-discounted range, capped by the stack limit, then is
/// scaled by the global multiplier and the agent's mining yield.
pub fn roll_quantity(
    def: &MaterialDef,
    multi_spawn: bool,
    mining_yield: f32,
    constants: &Constants,
    rng: &mut impl Rng,
) -> u32 {
    if def.kind.is_component() {
        let limit = if def.kind == MaterialKind::ComponentIndustrial {
            constants.component_industrial_bonus
        } else {
            constants.component_spacer_bonus
        };
        let bonus = if limit > 0 { rng.gen_range(0..limit) } else { 0 };
        return 1 + bonus;
    }
    if !multi_spawn {
        return 1;
    }

    let (low, high) = multi_spawn_range(def.base_market_value, constants);
    let extra = rng
        .gen_range(low..=high)
        .min(def.stack_limit.saturating_sub(1));
    let scaled = (1 + extra) as f32 * constants.yield_multiplier * mining_yield;
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let quantity = scaled.max(0.0).floor() as u32;
    quantity.max(1)
}

/// Draw a trader-grade quality tier.
pub fn roll_trader_quality(constants: &Constants, rng: &mut impl Rng) -> QualityTier {
    let weights = constants.trader_quality_weights.iter().map(|(_, w)| *w);
    match WeightedIndex::new(weights) {
        Ok(dist) => constants.trader_quality_weights[dist.sample(rng)].0,
        Err(err) => {
            warn!(%err, "invalid trader quality weights, defaulting to Normal");
            QualityTier::Normal
        }
    }
}

/// Lowest starting condition for a material, raised by its quality tier.
pub fn durability_floor(quality: Option<QualityTier>, constants: &Constants) -> f32 {
    match quality {
        Some(tier) => (f32::from(tier.index()) / 10.0).clamp(
            constants.quality_durability_floor_min,
            constants.quality_durability_floor_max,
        ),
        None => constants.default_durability_floor,
    }
}

/// Starting condition as a fraction of max hit points.
///
/// Stone chunks and common components are always pristine, as is anything
/// that does not track wear.
pub fn roll_condition(
    def: &MaterialDef,
    quality: Option<QualityTier>,
    constants: &Constants,
    rng: &mut impl Rng,
) -> f32 {
    let Some(max_hit_points) = def.max_hit_points.filter(|hp| *hp > 0) else {
        return 1.0;
    };
    if matches!(
        def.kind,
        MaterialKind::StoneChunk | MaterialKind::ComponentIndustrial
    ) {
        return 1.0;
    }
    let floor = durability_floor(quality, constants).clamp(0.0, 1.0);
    let max = max_hit_points as f32;
    let hit_points = (rng.gen_range(floor..=1.0) * max).round().max(1.0);
    (hit_points / max).min(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::{base_content, make_rng};
    use crate::MaterialId;

    fn material(kind: MaterialKind, value: f32, hp: Option<u32>) -> MaterialDef {
        MaterialDef {
            id: MaterialId("test".to_string()),
            name: "Test".to_string(),
            kind,
            base_market_value: value,
            stack_limit: 75,
            max_hit_points: hp,
            uses_quality: false,
        }
    }

    #[test]
    fn range_narrows_as_value_rises() {
        let constants = &base_content().constants;
        let mut previous = multi_spawn_range(0.0, constants);
        assert_eq!(previous, (15, 40));
        for step in 1..=30 {
            let range = multi_spawn_range(step as f32, constants);
            assert!(range.1 - range.0 <= previous.1 - previous.0);
            assert!(range.0 <= previous.0 && range.1 <= previous.1);
            previous = range;
        }
        assert_eq!(multi_spawn_range(1000.0, constants), (5, 20));
    }

    #[test]
    fn multi_spawn_quantity_is_at_least_one() {
        let constants = &base_content().constants;
        let mut rng = make_rng();
        let def = material(MaterialKind::Resource, 3.0, None);
        for yield_stat in [0.0, 0.01, 0.5, 1.0, 1.5] {
            for _ in 0..100 {
                assert!(roll_quantity(&def, true, yield_stat, constants, &mut rng) >= 1);
            }
        }
    }

    #[test]
    fn quantity_respects_stack_limit() {
        let constants = &base_content().constants;
        let mut rng = make_rng();
        let mut def = material(MaterialKind::Resource, 0.0, None);
        def.stack_limit = 10;
        for _ in 0..100 {
            assert!(roll_quantity(&def, true, 1.0, constants, &mut rng) <= 10);
        }
    }

    #[test]
    fn components_ignore_yield_scaling() {
        let constants = &base_content().constants;
        let mut rng = make_rng();
        let industrial = material(MaterialKind::ComponentIndustrial, 32.0, Some(70));
        let spacer = material(MaterialKind::ComponentSpacer, 200.0, Some(70));
        for _ in 0..200 {
            let q = roll_quantity(&industrial, true, 3.0, constants, &mut rng);
            assert!((1..=5).contains(&q));
            assert_eq!(roll_quantity(&spacer, true, 3.0, constants, &mut rng), 1);
        }
    }

    #[test]
    fn quality_raises_durability_floor() {
        let constants = &base_content().constants;
        assert!((durability_floor(None, constants) - 0.25).abs() < 1e-6);
        assert!((durability_floor(Some(QualityTier::Awful), constants) - 0.1).abs() < 1e-6);
        assert!((durability_floor(Some(QualityTier::Good), constants) - 0.3).abs() < 1e-6);
        assert!((durability_floor(Some(QualityTier::Legendary), constants) - 0.6).abs() < 1e-6);
    }

    #[test]
    fn chunks_and_common_components_stay_pristine() {
        let constants = &base_content().constants;
        let mut rng = make_rng();
        let chunk = material(MaterialKind::StoneChunk, 0.0, Some(300));
        let component = material(MaterialKind::ComponentIndustrial, 32.0, Some(70));
        for _ in 0..50 {
            assert!((roll_condition(&chunk, None, constants, &mut rng) - 1.0).abs() < f32::EPSILON);
            assert!(
                (roll_condition(&component, None, constants, &mut rng) - 1.0).abs() < f32::EPSILON
            );
        }
    }

    #[test]
    fn worn_condition_stays_within_floor_and_one() {
        let constants = &base_content().constants;
        let mut rng = make_rng();
        let steel = material(MaterialKind::Resource, 1.9, Some(100));
        for _ in 0..500 {
            let condition = roll_condition(&steel, None, constants, &mut rng);
            assert!(condition > 0.0 && condition <= 1.0);
            assert!(condition >= 0.25 - 0.005);
        }
    }
}
