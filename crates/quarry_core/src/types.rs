//! Type definitions for `quarry_core`.
//!
//! All public types, structs, enums, and ID newtypes used by the simulation.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use uuid::Uuid;

use crate::ledger::DepletionLedger;
use crate::pool::{PoolEntry, RefinedPool};
use crate::reservation::ReservationTable;

// ---------------------------------------------------------------------------
// ID newtypes
// ---------------------------------------------------------------------------

macro_rules! string_id {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub String);

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

string_id!(AgentId);
string_id!(NodeId);
string_id!(MaterialId);
string_id!(ItemId);
string_id!(FacilityId);
string_id!(ZoneId);
string_id!(TaskId);
string_id!(FactionId);
string_id!(CommandId);
string_id!(EventId);

/// A map cell. `x`/`z` follow the host grid's horizontal axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Cell {
    pub x: i32,
    pub z: i32,
}

impl Cell {
    pub const fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }
}

impl std::fmt::Display for Cell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.x, self.z)
    }
}

// ---------------------------------------------------------------------------
// Core enums
// ---------------------------------------------------------------------------

/// Operator-selected extraction mode, shared by every agent working a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MiningMode {
    RefinedResources,
    Blocks,
    Chunks,
}

/// What a collection event asks the resolver for. `None` means the node's
/// mode changed under the agent and any filler output is acceptable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceRequest {
    None,
    RefinedResources,
    Blocks,
    Chunks,
}

impl From<MiningMode> for ResourceRequest {
    fn from(mode: MiningMode) -> Self {
        match mode {
            MiningMode::RefinedResources => ResourceRequest::RefinedResources,
            MiningMode::Blocks => ResourceRequest::Blocks,
            MiningMode::Chunks => ResourceRequest::Chunks,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MaterialKind {
    StoneChunk,
    Blocks,
    Resource,
    ComponentIndustrial,
    ComponentSpacer,
    Slag,
    Rubble,
    Manufactured,
}

impl MaterialKind {
    pub fn is_component(self) -> bool {
        matches!(
            self,
            MaterialKind::ComponentIndustrial | MaterialKind::ComponentSpacer
        )
    }
}

/// Trader-grade quality ladder, lowest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum QualityTier {
    Awful,
    Poor,
    Normal,
    Good,
    Excellent,
    Masterwork,
    Legendary,
}

impl QualityTier {
    pub fn index(self) -> u8 {
        self as u8
    }
}

/// Transient feedback for the message/mote layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PresentationHint {
    LargeYield,
    Failure,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum StoragePriority {
    Unstored,
    Low,
    Normal,
    Preferred,
    Important,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventLevel {
    Normal,
    Debug,
}

/// States of one agent's work cycle at a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExtractionState {
    Traveling,
    Striking,
    Collecting,
    ReservingItem,
    ReservingDestination,
    Delivering,
    Done,
    Failed,
}

impl ExtractionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, ExtractionState::Done | ExtractionState::Failed)
    }
}

/// Why a task reached a terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EndReason {
    Delivered,
    Rubble,
    AutoHaulDisabled,
    NoDestination,
    Hazard,
    NodeExhausted,
    NodeMissing,
    NodeForbidden,
    AgentMissing,
    Cancelled,
}

impl EndReason {
    /// Terminal state a task lands in for this reason.
    pub fn terminal_state(self) -> ExtractionState {
        match self {
            EndReason::Delivered
            | EndReason::Rubble
            | EndReason::AutoHaulDisabled
            | EndReason::NoDestination => ExtractionState::Done,
            EndReason::Hazard
            | EndReason::NodeExhausted
            | EndReason::NodeMissing
            | EndReason::NodeForbidden
            | EndReason::AgentMissing
            | EndReason::Cancelled => ExtractionState::Failed,
        }
    }
}

// ---------------------------------------------------------------------------
// State types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameState {
    pub meta: MetaState,
    pub nodes: HashMap<NodeId, ExtractionNode>,
    pub agents: HashMap<AgentId, AgentState>,
    pub items: HashMap<ItemId, ItemState>,
    pub facilities: HashMap<FacilityId, FacilityState>,
    pub zones: Vec<StorageZone>,
    /// Active extraction tasks, at most one per agent.
    pub tasks: HashMap<AgentId, ExtractionTask>,
    pub reservations: ReservationTable,
    pub pool: RefinedPool,
    /// Storyteller difficulty factor; hazard chance is `difficulty / 50`.
    pub difficulty: f32,
    pub counters: Counters,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaState {
    pub tick: u64,
    pub seed: u64,
    pub schema_version: u32,
    pub content_version: String,
    pub world_id: Uuid,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Counters {
    pub next_event_id: u64,
    pub next_command_id: u64,
    pub next_item_id: u64,
    pub next_task_id: u64,
}

/// Per-node tuning. Larger or smaller quarries override the defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeProfile {
    pub damage_multiplier: f32,
    pub hazard_frequency: u64,
    pub max_workers: u32,
}

/// Materials available under a node, derived once from its terrain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialCatalog {
    pub chunk_types: SmallVec<[MaterialId; 4]>,
    pub block_types: SmallVec<[MaterialId; 4]>,
    pub junk_type: MaterialId,
}

/// The depletable extraction site.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionNode {
    pub id: NodeId,
    /// Cell agents stand on while striking.
    pub position: Cell,
    pub footprint_cells: u32,
    pub faction: FactionId,
    pub profile: NodeProfile,
    pub ledger: DepletionLedger,
    pub completed_extractions: u64,
    pub(crate) mode: MiningMode,
    pub catalog: MaterialCatalog,
    pub rock_types: Vec<String>,
    pub auto_haul: bool,
    pub forbidden: bool,
    /// Agents allowed to work this node, sorted by id.
    pub owners: Vec<AgentId>,
    pub linked_facilities: Vec<FacilityId>,
}

/// Persisted node fields, handed to the host's save layer as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSnapshot {
    pub capacity_fraction: f32,
    pub completed_extractions: u64,
    pub mode: MiningMode,
    pub rock_types: Vec<String>,
    pub auto_haul: bool,
}

/// Bookkeeping produced when a node is removed from the map.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RemovalReport {
    pub remaining_percent: f32,
    /// Footprint cells that stay quarriable after removal.
    pub retained_cells: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentRecords {
    pub cells_mined: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Injury {
    pub amount: f32,
    pub tick: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentState {
    pub id: AgentId,
    pub name: String,
    pub faction: FactionId,
    /// Colonists of the player faction; others get a mining-speed floor.
    pub is_player_controlled: bool,
    pub position: Cell,
    pub mining_speed: f32,
    pub mining_yield: f32,
    pub mining_xp: f32,
    pub injuries: Vec<Injury>,
    pub records: AgentRecords,
    /// Set by the host when the agent cannot reach anything; travel stalls.
    pub blocked: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemState {
    pub id: ItemId,
    pub material: MaterialId,
    pub quantity: u32,
    pub condition: f32,
    pub quality: Option<QualityTier>,
    pub position: Cell,
    pub haulable: bool,
    pub storage: StoragePriority,
}

/// A drop-off platform linked to a node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FacilityState {
    pub id: FacilityId,
    pub faction: FactionId,
    pub cells: Vec<Cell>,
    pub accepts: Vec<MaterialKind>,
    pub accessible: bool,
}

/// General stockpile outside the node's own facilities.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageZone {
    pub id: ZoneId,
    pub faction: FactionId,
    pub priority: StoragePriority,
    pub cells: Vec<Cell>,
    pub accepts: Vec<MaterialKind>,
    pub accessible: bool,
}

/// One agent's in-progress work cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionTask {
    pub id: TaskId,
    pub agent: AgentId,
    pub node: NodeId,
    pub state: ExtractionState,
    pub started_tick: u64,
    pub travel_ticks_remaining: u64,
    pub strike_ticks_remaining: u64,
    /// Countdown to the next cosmetic strike; re-seeded from mining speed.
    pub ticks_until_next_strike: i64,
    pub produced_item: Option<ItemId>,
    pub destination: Option<Cell>,
    pub haul_ticks_remaining: u64,
}

/// Output of the reward resolver for one collection event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RewardDescriptor {
    pub material: MaterialId,
    pub quantity: u32,
    pub condition: f32,
    pub quality: Option<QualityTier>,
    pub is_failure: bool,
    pub is_large_yield: bool,
}

impl RewardDescriptor {
    pub fn hint(&self) -> Option<PresentationHint> {
        if self.is_large_yield {
            Some(PresentationHint::LargeYield)
        } else if self.is_failure {
            Some(PresentationHint::Failure)
        } else {
            None
        }
    }
}

// ---------------------------------------------------------------------------
// Command types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandEnvelope {
    pub id: CommandId,
    pub issued_by: FactionId,
    pub issued_tick: u64,
    pub execute_at_tick: u64,
    pub command: Command,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Command {
    StartExtraction { agent: AgentId, node: NodeId },
    CancelExtraction { agent: AgentId },
    SetMiningMode { node: NodeId, mode: MiningMode },
    SetAutoHaul { node: NodeId, enabled: bool },
    SetForbidden { node: NodeId, forbidden: bool },
    AssignOwner { node: NodeId, agent: AgentId },
    UnassignOwner { node: NodeId, agent: AgentId },
    RemoveNode { node: NodeId },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RejectReason {
    UnknownAgent,
    UnknownNode,
    NotOwner,
    WrongFaction,
    NodeExhausted,
    NodeForbidden,
    AgentBusy,
    NoActiveTask,
    OwnerLimitReached,
    AlreadyOwner,
}

// ---------------------------------------------------------------------------
// Event types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub id: EventId,
    pub tick: u64,
    pub event: Event,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    TaskStarted {
        agent: AgentId,
        node: NodeId,
        task: TaskId,
    },
    AgentArrived {
        agent: AgentId,
        node: NodeId,
    },
    /// Only emitted at `EventLevel::Debug`.
    StrikeLanded {
        agent: AgentId,
        node: NodeId,
    },
    ResourcesExtracted {
        agent: AgentId,
        node: NodeId,
        item: ItemId,
        reward: RewardDescriptor,
        remaining_percent: f32,
    },
    PresentationHint {
        item: ItemId,
        hint: PresentationHint,
    },
    HazardTriggered {
        node: NodeId,
        agent: AgentId,
        agent_name: String,
        damage: f32,
    },
    AgentInjured {
        agent: AgentId,
        amount: f32,
    },
    NodeDepleted {
        node: NodeId,
    },
    NoDestination {
        agent: AgentId,
        item: ItemId,
    },
    HaulRequested {
        agent: AgentId,
        item: ItemId,
        destination: Cell,
    },
    ItemDelivered {
        agent: AgentId,
        item: ItemId,
        destination: Cell,
    },
    /// Only emitted at `EventLevel::Debug`.
    ReservationContended {
        agent: AgentId,
        reason: String,
    },
    TaskEnded {
        agent: AgentId,
        node: NodeId,
        state: ExtractionState,
        reason: EndReason,
    },
    MiningModeChanged {
        node: NodeId,
        mode: MiningMode,
    },
    NodeRemoved {
        node: NodeId,
        report: RemovalReport,
    },
    CommandRejected {
        command: CommandId,
        reason: RejectReason,
    },
}

// ---------------------------------------------------------------------------
// Content types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameContent {
    pub content_version: String,
    pub materials: Vec<MaterialDef>,
    pub rock_types: Vec<RockTypeDef>,
    pub refined_pool: Vec<PoolEntry>,
    pub constants: Constants,
}

impl GameContent {
    pub fn material(&self, id: &MaterialId) -> Option<&MaterialDef> {
        self.materials.iter().find(|m| &m.id == id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaterialDef {
    pub id: MaterialId,
    pub name: String,
    pub kind: MaterialKind,
    pub base_market_value: f32,
    pub stack_limit: u32,
    /// `Some` for materials that track wear.
    pub max_hit_points: Option<u32>,
    pub uses_quality: bool,
}

impl MaterialDef {
    pub fn haulable(&self) -> bool {
        self.kind != MaterialKind::Rubble
    }
}

/// Maps a rock type (e.g. `Granite`) to its chunk and block materials.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RockTypeDef {
    pub id: String,
    pub chunk: Option<MaterialId>,
    pub blocks: Option<MaterialId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Constants {
    /// `None` disables depletion entirely.
    pub max_health: Option<u32>,
    pub junk_chance_pct: f32,
    pub chunk_chance_pct: f32,
    pub yield_multiplier: f32,
    pub strike_ticks_average: u64,
    pub strike_ticks_variance: u64,
    pub strike_ticks_floor: u64,
    pub base_ticks_between_strikes: f32,
    pub non_player_min_mining_speed: f32,
    pub mining_xp_per_tick: f32,
    pub default_damage_multiplier: f32,
    pub default_hazard_frequency: u64,
    pub default_max_workers: u32,
    pub hazard_difficulty_divisor: f32,
    pub hazard_damage_min: u32,
    pub hazard_damage_max: u32,
    pub hazard_injury_amount: f32,
    pub large_yield_threshold: u32,
    pub multi_spawn_min: u32,
    pub multi_spawn_max: u32,
    pub max_value_discount: u32,
    pub default_durability_floor: f32,
    pub quality_durability_floor_min: f32,
    pub quality_durability_floor_max: f32,
    pub component_industrial_bonus: u32,
    pub component_spacer_bonus: u32,
    pub trader_quality_weights: Vec<(QualityTier, u32)>,
    pub rubble_material: MaterialId,
    pub fallback_material: MaterialId,
    /// Ticks an agent needs to reach a node from elsewhere on the map.
    pub travel_ticks: u64,
    /// Ticks to carry a produced item to its destination.
    pub haul_ticks: u64,
}

impl Constants {
    pub fn default_profile(&self) -> NodeProfile {
        NodeProfile {
            damage_multiplier: self.default_damage_multiplier,
            hazard_frequency: self.default_hazard_frequency,
            max_workers: self.default_max_workers,
        }
    }
}
