//! Navigation module
//!
//! ECS ответственность:
//! - ObstacleWorld: статика + тело цели (spatial query service)
//! - NavigationGrid: растр проходимости (rebuild по событию, синхронно)
//! - find_path: A* с локальной bookkeeping (безопасно вызывать из многих агентов за тик)
//! - RepathThrottle: частота перепланирования per-agent
//!
//! Порядок в FixedUpdate (SimulationSet::Clock):
//! 1. rebuild_navigation_grid — RebuildNavigationGrid → build (ошибка = старый grid)
//! 2. sync_target_bodies — тело цели в ObstacleWorld (LOS/avoidance raycast'ы)

use bevy::prelude::*;
use std::collections::BTreeSet;

pub mod grid;
pub mod layers;
pub mod obstacles;
pub mod planner;
pub mod throttle;


pub use grid::{walkable_at, GridNode, GridSettings, LayerRadiusOverride, NavigationGrid};
pub use layers::{layer_name, CollisionLayers};
pub use obstacles::{ColliderId, ObstacleWorld, RayHit, Shape, SpatialQuery};
pub use planner::{find_path, nearest_walkable, Path, PlannerSettings, DIAGONAL_COST, STRAIGHT_COST};
pub use throttle::RepathThrottle;

use crate::components::{BodyCollider, Position, Target};
use crate::SimulationSet;

/// Настройки навигации сессии (grid + planner)
#[derive(Resource, Debug, Clone, Default)]
pub struct NavigationSettings {
    pub grid: GridSettings,
    pub planner: PlannerSettings,
}

/// Событие: перестроить grid (геометрия изменилась или новые настройки)
#[derive(Event, Debug, Clone, Default)]
pub struct RebuildNavigationGrid {
    /// Новые GridSettings (None — текущие)
    pub settings: Option<GridSettings>,
}

/// Navigation Plugin
///
/// Ресурсы NavigationGrid/ObstacleWorld создаются пустыми, если хост не вставил свои.
pub struct NavigationPlugin;

impl Plugin for NavigationPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<NavigationSettings>()
            .init_resource::<NavigationGrid>()
            .init_resource::<ObstacleWorld>()
            .add_event::<RebuildNavigationGrid>();

        app.add_systems(
            FixedUpdate,
            (rebuild_navigation_grid, sync_target_bodies)
                .chain()
                .in_set(SimulationSet::Clock),
        );
    }
}

/// Система: синхронный rebuild grid по событию
///
/// Несколько событий за тик схлопываются в один build (последние settings побеждают).
pub fn rebuild_navigation_grid(
    mut events: EventReader<RebuildNavigationGrid>,
    mut settings: ResMut<NavigationSettings>,
    mut grid: ResMut<NavigationGrid>,
    obstacles: Res<ObstacleWorld>,
) {
    let mut requested = false;
    for event in events.read() {
        requested = true;
        if let Some(new_settings) = &event.settings {
            settings.grid = new_settings.clone();
        }
    }
    if !requested {
        return;
    }

    if let Err(err) = grid.build(&settings.grid, &obstacles) {
        crate::logger::log_error(&format!(
            "NavigationGrid rebuild failed ({}), keeping generation {}",
            err,
            grid.generation()
        ));
    }
}

/// Система: тело цели → ObstacleWorld (слой TARGET)
pub fn sync_target_bodies(
    targets: Query<(Entity, &Position, &BodyCollider), With<Target>>,
    mut obstacles: ResMut<ObstacleWorld>,
) {
    let mut alive = BTreeSet::new();
    for (entity, position, collider) in targets.iter() {
        obstacles.upsert_body(entity, position.0, collider.radius, CollisionLayers::TARGET);
        alive.insert(entity);
    }

    let stale: Vec<Entity> = obstacles
        .bodies()
        .iter()
        .map(|b| b.entity)
        .filter(|e| !alive.contains(e))
        .collect();
    for entity in stale {
        obstacles.remove_body(entity);
    }
}
