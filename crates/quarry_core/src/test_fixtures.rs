//! Shared test fixtures for quarry_core and downstream crates.
//!
//! `base_content()` carries three rock types (Granite, Marble, Slate), a small
//! refined pool, and compressed travel/haul times. `base_state()` places one
//! node with two owning colonists and a single stockpile.

use crate::{
    AgentId, AgentRecords, AgentState, Cell, Constants, Counters, ExtractionNode, FactionId,
    GameContent, GameState, MaterialCatalog, MaterialDef, MaterialId, MaterialKind, MetaState,
    NodeId, PoolEntry, QualityTier, RefinedPool, ReservationTable, RockTypeDef, StoragePriority,
    StorageZone, ZoneId,
};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::collections::HashMap;

pub const COLONY: &str = "faction_colony";

fn material(
    id: &str,
    kind: MaterialKind,
    value: f32,
    stack_limit: u32,
    max_hit_points: Option<u32>,
) -> MaterialDef {
    MaterialDef {
        id: MaterialId(id.to_string()),
        name: id.to_string(),
        kind,
        base_market_value: value,
        stack_limit,
        max_hit_points,
        uses_quality: false,
    }
}

fn rock(id: &str) -> RockTypeDef {
    RockTypeDef {
        id: id.to_string(),
        chunk: Some(MaterialId(format!("Chunk{id}"))),
        blocks: Some(MaterialId(format!("Blocks{id}"))),
    }
}

fn pool_entry(id: &str, commonality: f32) -> PoolEntry {
    PoolEntry {
        material: MaterialId(id.to_string()),
        commonality,
        remaining: None,
    }
}

pub fn base_constants() -> Constants {
    Constants {
        max_health: Some(2000),
        junk_chance_pct: 60.0,
        chunk_chance_pct: 50.0,
        yield_multiplier: 1.0,
        strike_ticks_average: 40,
        strike_ticks_variance: 10,
        strike_ticks_floor: 30,
        base_ticks_between_strikes: 12.0,
        non_player_min_mining_speed: 0.5,
        mining_xp_per_tick: 0.11,
        default_damage_multiplier: 1.0,
        default_hazard_frequency: 100,
        default_max_workers: 4,
        hazard_difficulty_divisor: 50.0,
        hazard_damage_min: 1,
        hazard_damage_max: 3,
        hazard_injury_amount: 9.0,
        large_yield_threshold: 30,
        multi_spawn_min: 15,
        multi_spawn_max: 40,
        max_value_discount: 10,
        default_durability_floor: 0.25,
        quality_durability_floor_min: 0.1,
        quality_durability_floor_max: 0.7,
        component_industrial_bonus: 5,
        component_spacer_bonus: 1,
        trader_quality_weights: vec![
            (QualityTier::Awful, 1),
            (QualityTier::Poor, 2),
            (QualityTier::Normal, 5),
            (QualityTier::Good, 3),
            (QualityTier::Excellent, 2),
            (QualityTier::Masterwork, 1),
            (QualityTier::Legendary, 1),
        ],
        rubble_material: MaterialId("RockRubble".to_string()),
        fallback_material: MaterialId("ChunkSlagSteel".to_string()),
        travel_ticks: 2,
        haul_ticks: 2,
    }
}

/// Full content for tests: three rocks, metals, components, rubble and slag.
pub fn base_content() -> GameContent {
    GameContent {
        content_version: "test".to_string(),
        materials: vec![
            material("ChunkGranite", MaterialKind::StoneChunk, 0.0, 1, Some(300)),
            material("ChunkMarble", MaterialKind::StoneChunk, 0.0, 1, Some(300)),
            material("ChunkSlate", MaterialKind::StoneChunk, 0.0, 1, Some(300)),
            material("BlocksGranite", MaterialKind::Blocks, 1.0, 75, Some(100)),
            material("BlocksMarble", MaterialKind::Blocks, 1.0, 75, Some(100)),
            material("BlocksSlate", MaterialKind::Blocks, 1.0, 75, Some(100)),
            material("Steel", MaterialKind::Resource, 1.9, 75, Some(100)),
            material("Silver", MaterialKind::Resource, 1.0, 500, None),
            material("Gold", MaterialKind::Resource, 10.0, 500, None),
            material("Uranium", MaterialKind::Resource, 6.0, 75, Some(250)),
            material("ComponentIndustrial", MaterialKind::ComponentIndustrial, 32.0, 25, Some(70)),
            material("ComponentSpacer", MaterialKind::ComponentSpacer, 200.0, 25, Some(70)),
            material("RockRubble", MaterialKind::Rubble, 0.0, 1, None),
            material("ChunkSlagSteel", MaterialKind::Slag, 0.5, 1, Some(40)),
        ],
        rock_types: vec![rock("Granite"), rock("Marble"), rock("Slate")],
        refined_pool: vec![
            pool_entry("Steel", 1.0),
            pool_entry("Silver", 0.5),
            pool_entry("Gold", 0.1),
            pool_entry("Uranium", 0.2),
            pool_entry("ComponentIndustrial", 0.3),
            pool_entry("ComponentSpacer", 0.05),
        ],
        constants: base_constants(),
    }
}

pub fn colony() -> FactionId {
    FactionId(COLONY.to_string())
}

pub fn agent(id: &str, name: &str, position: Cell) -> AgentState {
    AgentState {
        id: AgentId(id.to_string()),
        name: name.to_string(),
        faction: colony(),
        is_player_controlled: true,
        position,
        mining_speed: 1.0,
        mining_yield: 1.0,
        mining_xp: 0.0,
        injuries: vec![],
        records: AgentRecords::default(),
        blocked: false,
    }
}

/// Node `node_test` over six granite and three marble cells.
pub fn test_node(content: &GameContent) -> ExtractionNode {
    let mut terrain: Vec<String> = vec!["Granite_Rough".to_string(); 6];
    terrain.extend(vec!["Marble_Rough".to_string(); 3]);
    ExtractionNode::new(
        NodeId("node_test".to_string()),
        Cell::new(0, 0),
        colony(),
        content.constants.default_profile(),
        &terrain,
        &[],
        content,
    )
}

pub fn test_catalog(chunks: &[&str], blocks: &[&str], content: &GameContent) -> MaterialCatalog {
    MaterialCatalog {
        chunk_types: chunks.iter().map(|c| MaterialId((*c).to_string())).collect(),
        block_types: blocks.iter().map(|b| MaterialId((*b).to_string())).collect(),
        junk_type: content.constants.rubble_material.clone(),
    }
}

/// One node owned by `agent_0001` and `agent_0002`, a three-cell stockpile.
pub fn base_state(content: &GameContent) -> GameState {
    let mut node = test_node(content);
    node.add_owner(AgentId("agent_0001".to_string()));
    node.add_owner(AgentId("agent_0002".to_string()));

    let agents = [
        agent("agent_0001", "Ada", Cell::new(5, 5)),
        agent("agent_0002", "Bram", Cell::new(6, 5)),
    ];

    GameState {
        meta: MetaState {
            tick: 0,
            seed: 42,
            schema_version: 1,
            content_version: content.content_version.clone(),
            world_id: crate::generate_world_id(&mut make_rng()),
        },
        nodes: HashMap::from([(node.id.clone(), node)]),
        agents: agents.into_iter().map(|a| (a.id.clone(), a)).collect(),
        items: HashMap::new(),
        facilities: HashMap::new(),
        zones: vec![StorageZone {
            id: ZoneId("zone_stockpile".to_string()),
            faction: colony(),
            priority: StoragePriority::Normal,
            cells: vec![Cell::new(10, 0), Cell::new(11, 0), Cell::new(12, 0)],
            accepts: vec![
                MaterialKind::StoneChunk,
                MaterialKind::Blocks,
                MaterialKind::Resource,
                MaterialKind::ComponentIndustrial,
                MaterialKind::ComponentSpacer,
                MaterialKind::Slag,
                MaterialKind::Manufactured,
            ],
            accessible: true,
        }],
        tasks: HashMap::new(),
        reservations: ReservationTable::default(),
        pool: RefinedPool::new(content.refined_pool.clone()),
        difficulty: 1.0,
        counters: Counters::default(),
    }
}

pub fn make_rng() -> ChaCha8Rng {
    ChaCha8Rng::seed_from_u64(42)
}
