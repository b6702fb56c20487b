//! Perception systems (target locator, LOS, vision cone, stuck/cornered sampling).

use bevy::prelude::*;

use crate::ai::{AIConfig, AIState, Cornered, Perception, StuckDetector};
use crate::combat::Dead;
use crate::components::{BodyCollider, Dormant, Facing, Position, Target, Velocity};
use crate::navigation::{ColliderId, CollisionLayers, ObstacleWorld, SpatialQuery};
use crate::shared::SimClock;
use crate::steering::SteeringAgent;

use super::super::components::within_vision_cone;

/// LOS: первое попадание луча (стены + цель) — тело цели или ничего
pub fn line_of_sight<S: SpatialQuery + ?Sized>(spatial: &S, from: Vec2, to: Vec2, target: Entity) -> bool {
    let offset = to - from;
    let distance = offset.length();
    if distance < 1e-4 {
        return true;
    }
    match spatial.raycast(from, offset, distance, CollisionLayers::LOS_MASK) {
        None => true,
        Some(hit) => hit.collider == ColliderId::Body(target),
    }
}

/// Система: пересчёт Perception всех активных агентов
///
/// Цель одна (Target). Мёртвая или отсутствующая цель → Perception очищается,
/// FSM сама уведёт агента в безопасное состояние.
pub fn update_perception(
    mut agents: Query<
        (&Position, &Facing, &SteeringAgent, &AIConfig, &mut Perception),
        (With<AIState>, Without<Dormant>, Without<Dead>),
    >,
    targets: Query<
        (Entity, &Position, Option<&Velocity>, Option<&Facing>, &BodyCollider),
        (With<Target>, Without<Dead>),
    >,
    obstacles: Res<ObstacleWorld>,
) {
    let Some((target, target_position, target_velocity, target_facing, body)) = targets.iter().next() else {
        for (_, _, _, _, mut perception) in agents.iter_mut() {
            if perception.has_target() {
                perception.clear();
            }
        }
        return;
    };

    let target_position = target_position.0;
    let target_velocity = target_velocity.map_or(Vec2::ZERO, |v| v.0);
    let target_facing = target_facing.map_or(Vec2::X, |f| f.0);

    for (position, facing, agent, config, mut perception) in agents.iter_mut() {
        let to_target = target_position - position.0;
        let distance = to_target.length();

        let to_body = obstacles
            .surface_distance(position.0, ColliderId::Body(target))
            .unwrap_or_else(|| (distance - body.radius).max(0.0));
        let surface_distance = (to_body - agent.radius).max(0.0);

        let visible = line_of_sight(&*obstacles, position.0, target_position, target);
        let in_vision_cone =
            !config.use_vision_cone || within_vision_cone(facing.0, to_target, config.vision_cone_degrees);

        *perception = Perception {
            target: Some(target),
            target_position,
            target_velocity,
            target_facing,
            target_radius: body.radius,
            distance,
            surface_distance,
            line_of_sight: visible,
            in_vision_cone,
            detected: visible && in_vision_cone && distance <= config.detection_range,
            tracking: visible && distance <= config.lose_sight_range,
        };
    }
}

/// Система: измеренная скорость + маркер Cornered (Retreat/Pacing без реального движения)
pub fn update_stuck_detectors(
    mut commands: Commands,
    mut agents: Query<
        (Entity, &Position, &AIState, &AIConfig, &mut StuckDetector, Has<Cornered>),
        (Without<Dormant>, Without<Dead>),
    >,
    clock: Res<SimClock>,
) {
    for (entity, position, state, config, mut detector, was_cornered) in agents.iter_mut() {
        detector.sample(position.0, clock.now, clock.step, config.cornered_speed);

        let evading = matches!(state, AIState::Retreat { .. } | AIState::Pacing { .. });
        let cornered = evading && detector.slow_for(clock.now) >= config.cornered_duration;

        if cornered && !was_cornered {
            commands.entity(entity).insert(Cornered);
            crate::logger::log(&format!(
                "Cornered: {:?} stalled in {:?} ({:.2} m/s)",
                entity,
                state.kind(),
                detector.measured_speed
            ));
        } else if !cornered && was_cornered {
            commands.entity(entity).remove::<Cornered>();
        }
    }
}
