//! Content loading and world generation shared by quarry_cli and the control tests.

use anyhow::{Context, Result};
use quarry_core::{
    AgentId, AgentRecords, AgentState, Cell, Constants, Counters, ExtractionNode, FacilityId,
    FacilityState, FactionId, GameContent, GameState, MaterialDef, MaterialKind, MetaState, NodeId,
    PoolEntry, RefinedPool, ReservationTable, RockTypeDef, StoragePriority, StorageZone, ZoneId,
};
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use tracing::info;

pub const PLAYER_FACTION: &str = "faction_colony";
const COLONIST_NAMES: [&str; 3] = ["Ada", "Bram", "Cass"];
const QUARRY_SIZE: i32 = 5;
const DEFAULT_DIFFICULTY: f32 = 1.0;

#[derive(Deserialize)]
struct MaterialsFile {
    content_version: String,
    materials: Vec<MaterialDef>,
}

#[derive(Deserialize)]
struct RockTypesFile {
    rock_types: Vec<RockTypeDef>,
}

#[derive(Deserialize)]
struct RefinedPoolFile {
    entries: Vec<PoolEntry>,
}

/// Validates cross-references in loaded content, panicking on any authoring error.
///
/// Catches mistakes like: a rock type whose chunk is not a known material, a
/// pool entry naming a missing resource, or a rubble id that is not rubble.
pub fn validate_content(content: &GameContent) {
    let kinds: HashMap<&str, MaterialKind> = content
        .materials
        .iter()
        .map(|m| (m.id.0.as_str(), m.kind))
        .collect();
    assert_eq!(
        kinds.len(),
        content.materials.len(),
        "material ids must be unique"
    );

    for material in &content.materials {
        assert!(
            material.stack_limit > 0,
            "material '{}' has a zero stack limit",
            material.id
        );
    }

    let c = &content.constants;
    assert_eq!(
        kinds.get(c.rubble_material.0.as_str()),
        Some(&MaterialKind::Rubble),
        "rubble material '{}' is not a known Rubble material",
        c.rubble_material,
    );
    assert!(
        kinds.contains_key(c.fallback_material.0.as_str()),
        "fallback material '{}' is not a known material",
        c.fallback_material,
    );

    let mut rock_ids = HashSet::new();
    for rock in &content.rock_types {
        assert!(
            rock_ids.insert(rock.id.as_str()),
            "rock type '{}' is defined twice",
            rock.id
        );
        if let Some(chunk) = &rock.chunk {
            assert_eq!(
                kinds.get(chunk.0.as_str()),
                Some(&MaterialKind::StoneChunk),
                "rock type '{}' chunk '{}' is not a known StoneChunk material",
                rock.id,
                chunk,
            );
        }
        if let Some(blocks) = &rock.blocks {
            assert_eq!(
                kinds.get(blocks.0.as_str()),
                Some(&MaterialKind::Blocks),
                "rock type '{}' blocks '{}' is not a known Blocks material",
                rock.id,
                blocks,
            );
        }
    }

    for entry in &content.refined_pool {
        assert!(
            kinds.contains_key(entry.material.0.as_str()),
            "refined pool entry '{}' is not a known material",
            entry.material,
        );
        assert!(
            entry.commonality >= 0.0,
            "refined pool entry '{}' has negative commonality",
            entry.material,
        );
    }

    assert!(
        c.hazard_damage_min <= c.hazard_damage_max,
        "hazard damage range is inverted"
    );
    assert!(
        c.multi_spawn_min <= c.multi_spawn_max,
        "multi-spawn range is inverted"
    );
    assert!(
        c.trader_quality_weights.iter().any(|(_, w)| *w > 0),
        "trader quality weights must have a positive entry"
    );
}

pub fn load_content(content_dir: &str) -> Result<GameContent> {
    let dir = Path::new(content_dir);
    let constants: Constants = serde_json::from_str(
        &std::fs::read_to_string(dir.join("constants.json")).context("reading constants.json")?,
    )
    .context("parsing constants.json")?;
    let materials_file: MaterialsFile = serde_json::from_str(
        &std::fs::read_to_string(dir.join("materials.json")).context("reading materials.json")?,
    )
    .context("parsing materials.json")?;
    let rock_types_file: RockTypesFile = serde_json::from_str(
        &std::fs::read_to_string(dir.join("rock_types.json")).context("reading rock_types.json")?,
    )
    .context("parsing rock_types.json")?;
    let pool_file: RefinedPoolFile = serde_json::from_str(
        &std::fs::read_to_string(dir.join("refined_pool.json"))
            .context("reading refined_pool.json")?,
    )
    .context("parsing refined_pool.json")?;
    let content = GameContent {
        content_version: materials_file.content_version,
        materials: materials_file.materials,
        rock_types: rock_types_file.rock_types,
        refined_pool: pool_file.entries,
        constants,
    };
    validate_content(&content);
    Ok(content)
}

/// Read a previously saved state.
pub fn load_state(path: &str) -> Result<GameState> {
    let json = std::fs::read_to_string(path).with_context(|| format!("reading state file {path}"))?;
    serde_json::from_str(&json).with_context(|| format!("parsing state file {path}"))
}

pub fn save_state(state: &GameState, path: &str) -> Result<()> {
    let json = serde_json::to_string_pretty(state).context("serializing state")?;
    std::fs::write(path, json).with_context(|| format!("writing state file {path}"))
}

pub fn world_rng(seed: u64) -> ChaCha8Rng {
    ChaCha8Rng::seed_from_u64(seed)
}

fn every_storable_kind() -> Vec<MaterialKind> {
    vec![
        MaterialKind::StoneChunk,
        MaterialKind::Blocks,
        MaterialKind::Resource,
        MaterialKind::ComponentIndustrial,
        MaterialKind::ComponentSpacer,
        MaterialKind::Slag,
        MaterialKind::Manufactured,
    ]
}

fn colonist(index: usize, name: &str, faction: &FactionId, player: bool, speed: f32) -> AgentState {
    #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
    let row = index as i32;
    AgentState {
        id: AgentId(format!("agent_{:04}", index + 1)),
        name: name.to_string(),
        faction: faction.clone(),
        is_player_controlled: player,
        position: Cell::new(8, row),
        mining_speed: speed,
        mining_yield: 1.0,
        mining_xp: 0.0,
        injuries: vec![],
        records: AgentRecords::default(),
        blocked: false,
    }
}

/// A small colony: one quarry over randomly chosen natural rock, a linked
/// drop-off platform, a general stockpile, three colonists and one
/// non-player worker. Nobody owns the quarry yet.
pub fn build_initial_state(content: &GameContent, seed: u64, rng: &mut impl Rng) -> GameState {
    let faction = FactionId(PLAYER_FACTION.to_string());

    let all_rocks: Vec<String> = content.rock_types.iter().map(|r| r.id.clone()).collect();
    let world_rocks: Vec<String> = all_rocks
        .choose_multiple(rng, 2.min(all_rocks.len()))
        .cloned()
        .collect();
    #[allow(clippy::cast_sign_loss)]
    let cell_count = (QUARRY_SIZE * QUARRY_SIZE) as usize;
    let terrain: Vec<String> = (0..cell_count)
        .map(|_| match world_rocks.choose(rng) {
            Some(rock) => format!("{rock}_Rough"),
            None => "Soil".to_string(),
        })
        .collect();

    let platform_id = FacilityId("platform_0001".to_string());
    let mut node = ExtractionNode::new(
        NodeId("node_quarry".to_string()),
        Cell::new(0, 0),
        faction.clone(),
        content.constants.default_profile(),
        &terrain,
        &world_rocks,
        content,
    );
    node.linked_facilities.push(platform_id.clone());
    info!(rocks = ?node.rock_types, "quarry established");

    let platform = FacilityState {
        id: platform_id.clone(),
        faction: faction.clone(),
        cells: vec![Cell::new(3, -1), Cell::new(3, 0), Cell::new(3, 1)],
        accepts: vec![
            MaterialKind::Blocks,
            MaterialKind::Resource,
            MaterialKind::ComponentIndustrial,
            MaterialKind::ComponentSpacer,
            MaterialKind::Slag,
        ],
        accessible: true,
    };
    let stockpile = StorageZone {
        id: ZoneId("zone_0001".to_string()),
        faction: faction.clone(),
        priority: StoragePriority::Normal,
        cells: (10..15)
            .flat_map(|x| (0..4).map(move |z| Cell::new(x, z)))
            .collect(),
        accepts: every_storable_kind(),
        accessible: true,
    };

    let mut agents: Vec<AgentState> = COLONIST_NAMES
        .iter()
        .enumerate()
        .map(|(i, name)| colonist(i, name, &faction, true, 1.0))
        .collect();
    agents.push(colonist(COLONIST_NAMES.len(), "Dov", &faction, false, 0.3));

    let world_id = quarry_core::generate_world_id(rng);

    GameState {
        meta: MetaState {
            tick: 0,
            seed,
            schema_version: 1,
            content_version: content.content_version.clone(),
            world_id,
        },
        nodes: HashMap::from([(node.id.clone(), node)]),
        agents: agents.into_iter().map(|a| (a.id.clone(), a)).collect(),
        items: HashMap::new(),
        facilities: HashMap::from([(platform_id, platform)]),
        zones: vec![stockpile],
        tasks: HashMap::new(),
        reservations: ReservationTable::default(),
        pool: RefinedPool::new(content.refined_pool.clone()),
        difficulty: DEFAULT_DIFFICULTY,
        counters: Counters::default(),
    }
}
