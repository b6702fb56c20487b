//! Headless симуляция орды
//!
//! Арена со стенами, цель в центре, стая агентов по кругу. Крутит N тиков и печатает
//! сводку каждые 100 тиков. Конфиг: путь к TOML первым аргументом (иначе defaults).

use std::collections::BTreeMap;

use bevy::prelude::*;
use horde_simulation::{
    add_wall, create_headless_app_with_config, rebuild_navigation, run_tick, spawn_agent, spawn_target, AIState,
    AIStateKind, ArenaConfig, CombatArbiter, Dead, Health, SimClock, Tactics,
};

const TICKS: u64 = 1200;
const AGENTS: usize = 8;

fn main() {
    let config = match std::env::args().nth(1) {
        Some(path) => match std::fs::read_to_string(&path)
            .map_err(|err| err.to_string())
            .and_then(|text| ArenaConfig::from_toml_str(&text).map_err(|err| err.to_string()))
        {
            Ok(config) => config,
            Err(err) => {
                eprintln!("Failed to load config {}: {}", path, err);
                std::process::exit(1);
            }
        },
        None => ArenaConfig::default(),
    };

    println!("Starting horde headless simulation (seed: {})", config.seed);

    let mut app = create_headless_app_with_config(&config);
    setup_arena(app.world_mut());

    for _ in 0..TICKS {
        run_tick(&mut app);

        let tick = app.world().resource::<SimClock>().tick;
        if tick % 100 == 0 {
            print_summary(app.world_mut());
        }
    }

    println!("Simulation complete!");
}

fn setup_arena(world: &mut World) {
    // Периметр + колонна у цели (LOS/обход)
    add_wall(world, Vec2::new(-20.0, -20.0), Vec2::new(20.0, -19.0));
    add_wall(world, Vec2::new(-20.0, 19.0), Vec2::new(20.0, 20.0));
    add_wall(world, Vec2::new(-20.0, -20.0), Vec2::new(-19.0, 20.0));
    add_wall(world, Vec2::new(19.0, -20.0), Vec2::new(20.0, 20.0));
    add_wall(world, Vec2::new(3.0, -1.0), Vec2::new(4.0, 1.0));

    if let Err(err) = rebuild_navigation(world) {
        horde_simulation::log_error(&format!("Arena: navigation grid build failed: {}", err));
    }

    spawn_target(world, Vec2::ZERO);

    for index in 0..AGENTS {
        let angle = index as f32 / AGENTS as f32 * std::f32::consts::TAU;
        let position = Vec2::from_angle(angle) * 9.0;
        let tactics = if index % 4 == 3 {
            Tactics::ranged()
        } else {
            Tactics::melee()
        };
        spawn_agent(world, position, tactics);
    }
}

fn print_summary(world: &mut World) {
    let clock = *world.resource::<SimClock>();

    let mut states: BTreeMap<AIStateKind, usize> = BTreeMap::new();
    let mut query = world.query_filtered::<&AIState, Without<Dead>>();
    for state in query.iter(world) {
        *states.entry(state.kind()).or_default() += 1;
    }

    let mut targets = world.query_filtered::<&Health, With<horde_simulation::Target>>();
    let target_health = targets.iter(world).next().map_or(0, |health| health.current);

    let arbiter = world.resource::<CombatArbiter>();
    println!(
        "Tick {} ({:.1}s): target hp {}, tokens {}, engaged {}, states {:?}",
        clock.tick,
        clock.now,
        target_health,
        arbiter.token_holder_count(),
        arbiter.aware_count(),
        states
    );
}
