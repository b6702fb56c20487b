//! Steering systems (path following, force blending, integration).

use bevy::prelude::*;

use crate::combat::Dead;
use crate::components::{Actor, Dormant, Facing, Position, Target, Velocity};
use crate::navigation::{find_path, CollisionLayers, NavigationGrid, NavigationSettings, ObstacleWorld, SpatialQuery};
use crate::shared::SimClock;

use super::behaviors::{AgentKinematics, NeighborInfo, SteeringAgent, SteeringBehaviors, SteeringContext};
use super::blender::SteeringBlender;
use super::controller::{MovementController, MovementModeKind};
use super::formation::FormationRegistry;
use super::SteeringSettings;

/// Система: перепланирование путей (throttled) + курсор waypoint'ов
///
/// Новый generation grid'а (rebuild) форсирует перепланирование у всех.
pub fn plan_paths(
    mut agents: Query<(&Position, &mut MovementController), Without<Dormant>>,
    grid: Res<NavigationGrid>,
    settings: Res<NavigationSettings>,
    clock: Res<SimClock>,
    mut last_generation: Local<u32>,
) {
    let grid_changed = grid.generation() != *last_generation;
    *last_generation = grid.generation();

    for (position, mut controller) in agents.iter_mut() {
        let Some(goal) = controller.mode().path_goal() else {
            continue;
        };

        if grid_changed {
            controller.throttle.force();
        }

        if controller.throttle.should_replan(clock.now, goal) {
            let path = find_path(&grid, &settings.planner, position.0, goal);
            if path.is_empty() {
                crate::logger::log(&format!(
                    "PathPlanner: no path from {:?} to {:?} (holding until next interval)",
                    position.0, goal
                ));
            }
            controller.replace_path(path, clock.now, goal);
        }

        controller.advance_waypoint(position.0);
    }
}

/// Система: mode → behaviors → сила → скорость
pub fn compute_steering(
    mut agents: Query<
        (
            Entity,
            &Position,
            &mut Velocity,
            &mut Facing,
            &Actor,
            &SteeringAgent,
            &mut SteeringBehaviors,
            &MovementController,
        ),
        (Without<Dormant>, Without<Dead>),
    >,
    targets: Query<Entity, With<Target>>,
    obstacles: Res<ObstacleWorld>,
    grid: Res<NavigationGrid>,
    formations: Res<FormationRegistry>,
    settings: Res<SteeringSettings>,
    clock: Res<SimClock>,
) {
    let neighbors: Vec<NeighborInfo> = agents
        .iter()
        .map(|(entity, position, velocity, _, actor, agent, _, controller)| NeighborInfo {
            entity,
            position: position.0,
            velocity: velocity.0,
            radius: agent.radius,
            faction_id: actor.faction_id,
            instance_priority: agent.instance_priority,
            is_static: matches!(
                controller.mode().kind(),
                MovementModeKind::Hold | MovementModeKind::Idle
            ),
        })
        .collect();

    let target_body = targets.iter().next();
    let blender = SteeringBlender::new(settings.blend_mode);

    for (entity, position, mut velocity, mut facing, actor, agent, mut behaviors, controller) in
        agents.iter_mut()
    {
        controller.configure(&mut behaviors, position.0);

        if controller.mode().kind() == MovementModeKind::Hold {
            velocity.0 = Vec2::ZERO;
            continue;
        }

        let mut params = agent.clone();
        params.speed_multiplier *= controller.speed_scale;

        let ctx = SteeringContext {
            agent: AgentKinematics {
                entity,
                position: position.0,
                velocity: velocity.0,
                facing: facing.0,
                faction_id: actor.faction_id,
            },
            params: &params,
            spatial: &*obstacles,
            grid: &grid,
            neighbors: &neighbors,
            target_body,
            formations: &formations,
            dt: clock.step,
        };

        let force = blender.compute_force(&mut behaviors, &ctx);
        velocity.0 = SteeringBlender::integrate(velocity.0, force, clock.step, ctx.speed_limit(), params.drag);

        if !controller.facing_locked && velocity.0.length() > 0.05 {
            facing.look_along(velocity.0);
        }
    }
}

/// Система: Position += Velocity·dt (headless замена внешнего физического шага)
///
/// Агенты не входят в статику: при пересечении пробуем движение по одной оси, иначе стоим.
pub fn integrate_positions(
    mut bodies: Query<(&mut Position, &Velocity, Option<&SteeringAgent>), Without<Dormant>>,
    obstacles: Res<ObstacleWorld>,
    clock: Res<SimClock>,
) {
    let blocking = CollisionLayers::WALLS | CollisionLayers::PROPS;

    for (mut position, velocity, agent) in bodies.iter_mut() {
        let delta = velocity.0 * clock.step;
        if delta == Vec2::ZERO {
            continue;
        }

        let Some(agent) = agent else {
            position.0 += delta;
            continue;
        };

        // Уже внутри статики (спавн/телепорт) — выпускаем без проверок
        if obstacles.overlap_circle(position.0, agent.radius, blocking) {
            position.0 += delta;
            continue;
        }

        let candidates = [
            position.0 + delta,
            position.0 + Vec2::new(delta.x, 0.0),
            position.0 + Vec2::new(0.0, delta.y),
        ];
        if let Some(next) = candidates
            .into_iter()
            .find(|p| !obstacles.overlap_circle(*p, agent.radius, blocking))
        {
            position.0 = next;
        }
    }
}
