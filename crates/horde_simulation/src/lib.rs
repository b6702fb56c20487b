//! Horde Simulation Core
//!
//! ECS-симуляция орды на Bevy 0.16 (headless, детерминированная)
//!
//! Слои:
//! - navigation: NavigationGrid + A* PathPlanner + ObstacleWorld (raycast/overlap)
//! - steering: поведения, blender, MovementController, формации
//! - combat: CombatArbiter (tokens, слоты, квоты, отступления), тактическая модель, урон
//! - ai: FSM агента (perception → brain → movement intent)
//!
//! Всё крутится в FixedUpdate, порядок задаёт цепочка SimulationSet.
//! Время — только SimClock, случайность — только DeterministicRng.

use bevy::prelude::*;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

// Публичные модули
pub mod ai;
pub mod arena;
pub mod combat;
pub mod components;
pub mod config;
pub mod error;
pub mod logger;
pub mod navigation;
pub mod shared;
pub mod steering;

// Re-export базовых типов для удобства
pub use ai::{AIConfig, AIPlugin, AIState, AIStateKind, AgentEvent, AgentLifecycle, AnimationCommand};
pub use arena::{add_wall, apply_config, rebuild_navigation, spawn_agent, spawn_target};
pub use combat::{
    CombatArbiter, CombatAwarenessChanged, CombatPlugin, DamageDealt, Dead, EntityDied, Exhausted, Tactics,
};
pub use components::*;
pub use config::ArenaConfig;
pub use error::{ConfigError, NavigationError};
pub use logger::{init_logger, log, log_error, log_info, log_warning};
pub use navigation::{NavigationGrid, NavigationPlugin, ObstacleWorld};
pub use shared::SimClock;
pub use steering::{FormationRegistry, SteeringPlugin};

/// Порядок одного тика (наборы выполняются цепочкой)
#[derive(SystemSet, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SimulationSet {
    /// Часы, lifecycle пула, rebuild grid, синхронизация тела цели
    Clock,
    /// Perception, измеренная скорость, центр кольца слотов
    Sense,
    /// FSM
    Think,
    /// Режим движения → пути → steering
    Move,
    /// Урон, stamina, интеграция позиций
    Integrate,
    /// Уведомления, чистка мёртвых ссылок, деспавн трупов
    Cleanup,
}

/// Главный plugin симуляции (объединяет все подсистемы)
///
/// Ресурсы, вставленные хостом заранее (`apply_config`), не перезаписываются.
pub struct SimulationPlugin;

impl Plugin for SimulationPlugin {
    fn build(&self, app: &mut App) {
        let config = app.world().get_resource::<ArenaConfig>().cloned().unwrap_or_default();

        if !app.world().contains_resource::<SimClock>() {
            app.insert_resource(SimClock::from_hz(config.tick_hz))
                .insert_resource(Time::<Fixed>::from_hz(config.tick_hz as f64));
        }
        if !app.world().contains_resource::<DeterministicRng>() {
            app.insert_resource(DeterministicRng::new(config.seed));
        }

        app.configure_sets(
            FixedUpdate,
            (
                SimulationSet::Clock,
                SimulationSet::Sense,
                SimulationSet::Think,
                SimulationSet::Move,
                SimulationSet::Integrate,
                SimulationSet::Cleanup,
            )
                .chain(), // Последовательное выполнение для детерминизма
        );

        app.add_systems(
            FixedUpdate,
            shared::advance_clock
                .in_set(SimulationSet::Clock)
                .before(navigation::rebuild_navigation_grid)
                .before(ai::systems::handle_agent_lifecycle),
        );

        app.add_plugins((NavigationPlugin, SteeringPlugin, CombatPlugin, AIPlugin));
    }
}

/// Детерминистичный RNG resource (seeded)
#[derive(Resource)]
pub struct DeterministicRng {
    pub rng: ChaCha8Rng,
    pub seed: u64,
}

impl DeterministicRng {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            seed,
        }
    }

    /// Дочерний seed (персональные генераторы: wander и т.п.)
    pub fn fork_seed(&mut self) -> u64 {
        self.rng.gen()
    }
}

/// Создаёт minimal Bevy App для headless симуляции
pub fn create_headless_app(seed: u64) -> App {
    let config = ArenaConfig {
        seed,
        ..Default::default()
    };
    create_headless_app_with_config(&config)
}

/// Headless App с полным конфигом арены
pub fn create_headless_app_with_config(config: &ArenaConfig) -> App {
    let mut app = App::new();
    init_logger();
    app.add_plugins(MinimalPlugins);
    apply_config(&mut app, config);
    app.add_plugins(SimulationPlugin);
    app
}

/// Один тик симуляции (FixedUpdate вручную, без привязки к реальному времени)
pub fn run_tick(app: &mut App) {
    app.world_mut().run_schedule(FixedUpdate);
}

/// Snapshot мира для сравнения детерминизма
pub fn world_snapshot<T: Component>(world: &mut World) -> Vec<u8>
where
    T: std::fmt::Debug,
{
    // Собираем все компоненты в детерминированный формат
    let mut snapshot = Vec::new();

    let mut query = world.query::<(Entity, &T)>();
    let mut entities: Vec<_> = query.iter(world).collect();

    // Сортируем по Entity ID для детерминизма
    entities.sort_by_key(|(entity, _)| entity.index());

    // Сериализуем в байты через Debug (простейший способ)
    for (entity, component) in entities {
        snapshot.extend_from_slice(&entity.index().to_le_bytes());
        snapshot.extend_from_slice(format!("{:?}", component).as_bytes());
    }

    snapshot
}
