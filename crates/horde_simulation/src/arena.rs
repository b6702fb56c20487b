//! Arena setup helpers: конфиг → ресурсы, спавн агентов/цели, стены, grid
//!
//! Используются headless-бинарником и интеграционными тестами. Хост с собственным
//! спавном может собирать те же компоненты сам.

use bevy::prelude::*;
use rand::Rng;

use crate::ai::{patrol_state, AIState, AgentMemory, Perception, StuckDetector};
use crate::combat::{CombatArbiter, CombatBookkeeping, TacticalModel, Tactics};
use crate::components::{Actor, BodyCollider, Facing, Health, Position, Stamina, Target, Velocity};
use crate::config::ArenaConfig;
use crate::error::NavResult;
use crate::navigation::{CollisionLayers, NavigationGrid, NavigationSettings, ObstacleWorld};
use crate::shared::SimClock;
use crate::steering::{FormationRegistry, MovementController, SteeringAgent, SteeringBehaviors};
use crate::DeterministicRng;

/// Фракция орды (separation работает внутри фракции)
pub const HORDE_FACTION: u64 = 1;
/// Фракция цели
pub const TARGET_FACTION: u64 = 0;

/// Вставить ресурсы сессии из конфига (до SimulationPlugin: плагины не перезаписывают готовые ресурсы)
pub fn apply_config(app: &mut App, config: &ArenaConfig) {
    app.insert_resource(config.clone())
        .insert_resource(SimClock::from_hz(config.tick_hz))
        .insert_resource(Time::<Fixed>::from_hz(config.tick_hz as f64))
        .insert_resource(DeterministicRng::new(config.seed))
        .insert_resource(NavigationSettings {
            grid: config.grid.clone(),
            planner: config.planner.clone(),
        })
        .insert_resource(CombatArbiter::new(config.arbiter.clone()))
        .insert_resource(FormationRegistry::new(
            config.steering.formation_layout,
            config.steering.formation_capacity,
        ))
        .insert_resource(config.steering.clone())
        .insert_resource(config.tactical.clone());
}

/// Спавн агента орды со всеми runtime-компонентами
///
/// Личность (aggression offset, decision delay), slip_bias и seed wander'а берутся из DeterministicRng.
pub fn spawn_agent(world: &mut World, position: Vec2, tactics: Tactics) -> Entity {
    let config = world.get_resource::<ArenaConfig>().cloned().unwrap_or_default();
    let now = world.get_resource::<SimClock>().map_or(0.0, |clock| clock.now);
    let instance_priority = world.query_filtered::<(), With<AIState>>().iter(world).count() as u32;

    let (tactical, slip_bias, wander_seed, state) = {
        let mut rng = world.get_resource_or_insert_with(|| DeterministicRng::new(config.seed));
        let tactical = TacticalModel::with_personality(&config.tactical, &mut rng.rng);
        let slip_bias = if rng.rng.gen_bool(0.5) { 1.0 } else { -1.0 };
        let wander_seed = rng.fork_seed();
        let state = patrol_state(position, &config.ai, now, &mut rng.rng);
        (tactical, slip_bias, wander_seed, state)
    };

    let stamina = Stamina::new(config.tactical.stamina_max).with_regen(config.tactical.stamina_regen);

    world
        .spawn((
            (
                Actor {
                    faction_id: HORDE_FACTION,
                },
                Position(position),
                Velocity::default(),
                Facing::default(),
                Health::default(),
                stamina,
            ),
            (
                state,
                config.ai.clone(),
                AgentMemory::new(position),
                tactical,
                CombatBookkeeping::default(),
                Perception::default(),
                StuckDetector::new(position, now),
                tactics,
            ),
            (
                MovementController::from_settings(&config.steering),
                SteeringBehaviors::from_settings(&config.steering, wander_seed, slip_bias),
                SteeringAgent::from_settings(&config.steering, instance_priority, slip_bias),
            ),
        ))
        .id()
}

/// Спавн цели (игрока): тело попадает в ObstacleWorld на следующем тике
pub fn spawn_target(world: &mut World, position: Vec2) -> Entity {
    world
        .spawn((
            Target,
            Actor {
                faction_id: TARGET_FACTION,
            },
            Position(position),
            BodyCollider::default(),
            Health::default(),
        ))
        .id()
}

/// Стена (AABB, слой WALLS)
pub fn add_wall(world: &mut World, min: Vec2, max: Vec2) -> u32 {
    world
        .get_resource_or_insert_with(ObstacleWorld::default)
        .add_box(min, max, CollisionLayers::WALLS)
}

/// Синхронная перестройка grid по текущим NavigationSettings и ObstacleWorld
pub fn rebuild_navigation(world: &mut World) -> NavResult<()> {
    let settings = world.get_resource::<NavigationSettings>().cloned().unwrap_or_default();
    let obstacles = world.get_resource::<ObstacleWorld>().cloned().unwrap_or_default();
    let mut grid = world.get_resource_or_insert_with(NavigationGrid::default);
    grid.build(&settings.grid, &obstacles)
}
