use anyhow::Result;
use clap::{Parser, Subcommand};
use quarry_control::{AutopilotController, CommandSource};
use quarry_core::{EndReason, Event, EventLevel, FactionId, GameState};
use quarry_world::{build_initial_state, load_content, load_state, save_state, PLAYER_FACTION};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// ---------------------------------------------------------------------------
// CLI definition
// ---------------------------------------------------------------------------

#[derive(Parser)]
#[command(name = "quarry_cli", about = "Quarry extraction simulation CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the simulation for a fixed number of ticks.
    Run {
        #[arg(long)]
        ticks: u64,
        /// Generate the world with this seed. Mutually exclusive with --state.
        #[arg(long, conflicts_with = "state_file")]
        seed: Option<u64>,
        /// Load the initial GameState from a JSON file. Mutually exclusive with --seed.
        #[arg(long = "state", conflicts_with = "seed")]
        state_file: Option<String>,
        #[arg(long, default_value = "./content")]
        content_dir: String,
        #[arg(long, default_value_t = 100)]
        print_every: u64,
        #[arg(long, default_value = "normal", value_parser = ["normal", "debug"])]
        event_level: String,
        /// Write the final GameState as JSON.
        #[arg(long)]
        save: Option<String>,
    },
}

struct RunOptions {
    ticks: u64,
    seed: Option<u64>,
    state_file: Option<String>,
    content_dir: String,
    print_every: u64,
    event_level: EventLevel,
    save: Option<String>,
}

// ---------------------------------------------------------------------------
// Run loop
// ---------------------------------------------------------------------------

fn run(options: RunOptions) -> Result<()> {
    let content = load_content(&options.content_dir)?;

    let (mut state, mut rng) = if let Some(path) = &options.state_file {
        let loaded = load_state(path)?;
        let rng_seed = loaded.meta.seed;
        (loaded, ChaCha8Rng::seed_from_u64(rng_seed))
    } else {
        let resolved_seed = options.seed.unwrap_or_else(rand::random);
        let mut new_rng = ChaCha8Rng::seed_from_u64(resolved_seed);
        let new_state = build_initial_state(&content, resolved_seed, &mut new_rng);
        (new_state, new_rng)
    };

    let mut autopilot = AutopilotController::new(FactionId(PLAYER_FACTION.to_string()));
    let mut next_command_id = 0u64;
    let print_every = options.print_every.max(1);

    info!(
        ticks = options.ticks,
        seed = state.meta.seed,
        world = %state.meta.world_id,
        content_version = %content.content_version,
        "starting simulation"
    );
    println!("{}", "-".repeat(80));

    for _ in 0..options.ticks {
        let commands = autopilot.generate_commands(&state, &content, &mut next_command_id);
        let events = quarry_core::tick(&mut state, &commands, &content, &mut rng, options.event_level);

        // Notable events print regardless of print_every.
        for event in &events {
            match &event.event {
                Event::HazardTriggered {
                    agent_name, damage, ..
                } => println!(
                    "*** SINKHOLE under {agent_name} at tick={:04} (extra damage {damage}) ***",
                    event.tick
                ),
                Event::NodeDepleted { node } => {
                    println!("*** QUARRY {node} EXHAUSTED at tick={:04} ***", event.tick);
                }
                Event::TaskEnded {
                    agent,
                    reason: EndReason::NoDestination,
                    ..
                } => info!(%agent, "no storage for extracted item, left at quarry"),
                _ => {}
            }
        }

        if state.meta.tick % print_every == 0 {
            print_status(&state);
        }
    }

    println!("{}", "-".repeat(80));
    println!("Done. Final state at tick {}:", state.meta.tick);
    print_status(&state);

    if let Some(path) = &options.save {
        save_state(&state, path)?;
        info!(%path, "final state saved");
    }
    Ok(())
}

fn print_status(state: &GameState) {
    let tick = state.meta.tick;
    let mut nodes: Vec<_> = state.nodes.values().collect();
    nodes.sort_by(|a, b| a.id.cmp(&b.id));
    let quarries: Vec<String> = nodes
        .iter()
        .map(|n| format!("{}={:.1}%", n.id, n.remaining_percent()))
        .collect();
    let stored = state
        .items
        .values()
        .filter(|i| i.storage != quarry_core::StoragePriority::Unstored)
        .count();
    let injuries: usize = state.agents.values().map(|a| a.injuries.len()).sum();

    println!(
        "[tick={tick:05}]  quarries=[{}]  working={:2}  items={:3}  stored={:3}  injuries={}",
        quarries.join(", "),
        state.tasks.len(),
        state.items.len(),
        stored,
        injuries,
    );
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Run {
            ticks,
            seed,
            state_file,
            content_dir,
            print_every,
            event_level,
            save,
        } => {
            let event_level = match event_level.as_str() {
                "debug" => EventLevel::Debug,
                _ => EventLevel::Normal,
            };
            run(RunOptions {
                ticks,
                seed,
                state_file,
                content_dir,
                print_every,
                event_level,
                save,
            })?;
        }
    }
    Ok(())
}
