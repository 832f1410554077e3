//! Reward resolution for one collection event.
//!
//! All random decisions that must agree with each other are drawn up front
//! into [`CollectionRolls`] and passed explicitly through resolution, so the
//! material choice and the hazard outcome always come from the same draws.

use rand::Rng;
use tracing::warn;

use crate::hazard::roll_hazard;
use crate::pool::RefinedPool;
use crate::yields::{roll_condition, roll_quantity, roll_trader_quality};
use crate::{Constants, GameContent, MaterialCatalog, MaterialId, ResourceRequest, RewardDescriptor};

/// Draws captured once per collection event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CollectionRolls {
    /// Extra depletion damage when the hazard fired.
    pub hazard_damage: Option<f32>,
    /// The extraction broke into unusable material.
    pub junk: bool,
    /// When junk in resource mode: a chunk instead of rubble.
    pub junk_is_chunk: bool,
}

impl CollectionRolls {
    /// Draw in a fixed order: hazard, junk, junk-vs-failure. The last roll is
    /// always drawn so the stream advances the same way on every branch.
    pub fn draw(
        extraction_index: u64,
        hazard_frequency: u64,
        difficulty: f32,
        constants: &Constants,
        rng: &mut impl Rng,
    ) -> Self {
        let hazard_damage = roll_hazard(
            extraction_index,
            hazard_frequency,
            difficulty,
            constants,
            rng,
        );
        let junk = rng.gen_bool(percent(constants.junk_chance_pct));
        let junk_is_chunk = rng.gen_bool(percent(constants.chunk_chance_pct));
        Self {
            hazard_damage,
            junk,
            junk_is_chunk,
        }
    }

    pub fn hazard_fired(&self) -> bool {
        self.hazard_damage.is_some()
    }
}

fn percent(pct: f32) -> f64 {
    crate::hazard::probability(pct / 100.0)
}

/// The material picked by the layered rules, before quantities are rolled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaterialChoice {
    /// `None` when the catalog or pool had nothing to give.
    pub material: Option<MaterialId>,
    pub multi_spawn: bool,
    pub failure: bool,
}

impl MaterialChoice {
    fn single(material: Option<MaterialId>) -> Self {
        Self {
            material,
            multi_spawn: false,
            failure: false,
        }
    }

    fn multi(material: Option<MaterialId>) -> Self {
        Self {
            material,
            multi_spawn: true,
            failure: false,
        }
    }

    fn rubble(catalog: &MaterialCatalog) -> Self {
        Self {
            material: Some(catalog.junk_type.clone()),
            multi_spawn: false,
            failure: true,
        }
    }
}

/// Apply the category rules. First matching rule wins.
pub fn resolve_material(
    request: ResourceRequest,
    catalog: &MaterialCatalog,
    rolls: &CollectionRolls,
    pool: &mut RefinedPool,
    rng: &mut impl Rng,
) -> MaterialChoice {
    match request {
        ResourceRequest::Chunks if !rolls.junk => {
            MaterialChoice::single(catalog.random_chunk(rng).cloned())
        }
        // Blocks are checked before any chunk fallback; chunks would only be cut into blocks.
        ResourceRequest::Blocks if !rolls.junk => {
            MaterialChoice::multi(catalog.random_block(rng).cloned())
        }
        ResourceRequest::Chunks | ResourceRequest::Blocks => MaterialChoice::rubble(catalog),
        ResourceRequest::RefinedResources | ResourceRequest::None if rolls.junk => {
            if rolls.junk_is_chunk {
                MaterialChoice::single(catalog.random_chunk(rng).cloned())
            } else {
                MaterialChoice::rubble(catalog)
            }
        }
        ResourceRequest::RefinedResources | ResourceRequest::None => {
            MaterialChoice::multi(pool.take_one(rng))
        }
    }
}

/// Turn a material choice into a concrete reward.
///
/// A missing or unknown material is a content inconsistency: the fixed
/// fallback material is substituted as a single spawn and a warning logged.
pub fn finalize_reward(
    choice: MaterialChoice,
    mining_yield: f32,
    content: &GameContent,
    rng: &mut impl Rng,
) -> RewardDescriptor {
    let constants = &content.constants;
    let known = choice
        .material
        .as_ref()
        .and_then(|id| content.material(id));

    let (def, multi_spawn, failure) = match known {
        Some(def) => (def, choice.multi_spawn, choice.failure),
        None => {
            warn!(
                material = ?choice.material,
                fallback = %constants.fallback_material,
                "resolved material missing from content, substituting fallback reward"
            );
            match content.material(&constants.fallback_material) {
                Some(def) => (def, false, false),
                None => {
                    warn!("fallback material missing from content, rewarding nothing usable");
                    return RewardDescriptor {
                        material: constants.fallback_material.clone(),
                        quantity: 1,
                        condition: 1.0,
                        quality: None,
                        is_failure: false,
                        is_large_yield: false,
                    };
                }
            }
        }
    };

    let quantity = roll_quantity(def, multi_spawn, mining_yield, constants, rng);
    // Quality first: the durability floor depends on it.
    let quality = def
        .uses_quality
        .then(|| roll_trader_quality(constants, rng));
    let condition = roll_condition(def, quality, constants, rng);

    RewardDescriptor {
        material: def.id.clone(),
        quantity,
        condition,
        quality,
        is_failure: failure,
        is_large_yield: quantity >= constants.large_yield_threshold,
    }
}

/// Resolve a full reward from a request and pre-drawn rolls.
pub fn resolve_reward(
    request: ResourceRequest,
    catalog: &MaterialCatalog,
    rolls: &CollectionRolls,
    pool: &mut RefinedPool,
    mining_yield: f32,
    content: &GameContent,
    rng: &mut impl Rng,
) -> RewardDescriptor {
    let choice = resolve_material(request, catalog, rolls, pool, rng);
    finalize_reward(choice, mining_yield, content, rng)
}
