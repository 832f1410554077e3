//! Extraction node behaviour: creation, mode changes, and per-extraction
//! bookkeeping that ties the ledger, hazard roll, and resolver together.

use rand::Rng;

use crate::catalog::rock_types_under;
use crate::ledger::DepletionLedger;
use crate::pool::RefinedPool;
use crate::resolver::{resolve_reward, CollectionRolls};
use crate::{
    AgentId, Cell, ExtractionNode, FactionId, GameContent, MaterialCatalog, MiningMode, NodeId,
    NodeProfile, NodeSnapshot, RemovalReport, ResourceRequest, RewardDescriptor,
};

/// Result of one collection event at a node.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeExtraction {
    pub reward: RewardDescriptor,
    /// Extra damage from a sinkhole, if one opened.
    pub hazard_damage: Option<f32>,
    /// The node crossed into exhaustion during this extraction.
    pub became_exhausted: bool,
}

impl ExtractionNode {
    /// Establish a node over `terrain_cells`. The catalog is derived here,
    /// once, and never recomputed.
    pub fn new(
        id: NodeId,
        position: Cell,
        faction: FactionId,
        profile: NodeProfile,
        terrain_cells: &[String],
        world_rock_types: &[String],
        content: &GameContent,
    ) -> Self {
        let rock_types = rock_types_under(terrain_cells, world_rock_types, content);
        let catalog = MaterialCatalog::from_rock_types(&rock_types, content);
        let ledger = DepletionLedger::new(content.constants.max_health, profile.damage_multiplier);
        #[allow(clippy::cast_possible_truncation)]
        let footprint_cells = terrain_cells.len() as u32;
        Self {
            id,
            position,
            footprint_cells,
            faction,
            profile,
            ledger,
            completed_extractions: 0,
            mode: MiningMode::RefinedResources,
            catalog,
            rock_types,
            auto_haul: true,
            forbidden: false,
            owners: Vec::new(),
            linked_facilities: Vec::new(),
        }
    }

    /// Rebuild a node from persisted fields.
    pub fn restore(
        id: NodeId,
        position: Cell,
        faction: FactionId,
        profile: NodeProfile,
        footprint_cells: u32,
        snapshot: &NodeSnapshot,
        content: &GameContent,
    ) -> Self {
        let catalog = MaterialCatalog::from_rock_types(&snapshot.rock_types, content);
        let ledger = DepletionLedger::restore(
            snapshot.capacity_fraction,
            content.constants.max_health,
            profile.damage_multiplier,
        );
        Self {
            id,
            position,
            footprint_cells,
            faction,
            profile,
            ledger,
            completed_extractions: snapshot.completed_extractions,
            mode: snapshot.mode,
            catalog,
            rock_types: snapshot.rock_types.clone(),
            auto_haul: snapshot.auto_haul,
            forbidden: false,
            owners: Vec::new(),
            linked_facilities: Vec::new(),
        }
    }

    pub fn mode(&self) -> MiningMode {
        self.mode
    }

    /// The single write path for the shared mode. Every in-flight task sees
    /// the new value at its next collection event.
    pub fn set_mode(&mut self, mode: MiningMode) -> bool {
        let changed = self.mode != mode;
        self.mode = mode;
        changed
    }

    pub fn is_exhausted(&self) -> bool {
        self.ledger.is_exhausted()
    }

    pub fn remaining_percent(&self) -> f32 {
        self.ledger.remaining_percent()
    }

    pub fn is_owner(&self, agent: &AgentId) -> bool {
        self.owners.contains(agent)
    }

    /// Add an owner, keeping the list sorted. Returns false if already present.
    pub fn add_owner(&mut self, agent: AgentId) -> bool {
        match self.owners.binary_search(&agent) {
            Ok(_) => false,
            Err(pos) => {
                self.owners.insert(pos, agent);
                true
            }
        }
    }

    pub fn remove_owner(&mut self, agent: &AgentId) -> bool {
        let before = self.owners.len();
        self.owners.retain(|a| a != agent);
        self.owners.len() != before
    }

    /// Run one collection event: count it, roll the hazard, deplete, resolve.
    ///
    /// Hazard damage is applied before the regular per-extraction damage and
    /// is committed regardless of what happens to the task afterwards.
    pub fn extract(
        &mut self,
        request: ResourceRequest,
        mining_yield: f32,
        difficulty: f32,
        pool: &mut RefinedPool,
        content: &GameContent,
        rng: &mut impl Rng,
    ) -> NodeExtraction {
        let was_exhausted = self.is_exhausted();
        self.completed_extractions += 1;

        let rolls = CollectionRolls::draw(
            self.completed_extractions,
            self.profile.hazard_frequency,
            difficulty,
            &content.constants,
            rng,
        );
        if let Some(damage) = rolls.hazard_damage {
            self.ledger.apply_damage(damage);
        }
        self.ledger.apply_damage(1.0);

        let reward = resolve_reward(request, &self.catalog, &rolls, pool, mining_yield, content, rng);
        NodeExtraction {
            reward,
            hazard_damage: rolls.hazard_damage,
            became_exhausted: !was_exhausted && self.is_exhausted(),
        }
    }

    pub fn snapshot(&self) -> NodeSnapshot {
        NodeSnapshot {
            capacity_fraction: self.ledger.capacity_fraction(),
            completed_extractions: self.completed_extractions,
            mode: self.mode,
            rock_types: self.rock_types.clone(),
            auto_haul: self.auto_haul,
        }
    }

    /// Outstanding capacity when the node is removed. Cells beyond the
    /// remaining share lose their quarriability.
    pub fn removal_report(&self) -> RemovalReport {
        let remaining_percent = self.remaining_percent();
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let retained_cells =
            (self.footprint_cells as f32 * remaining_percent / 100.0).floor() as u32;
        RemovalReport {
            remaining_percent,
            retained_cells,
        }
    }
}
