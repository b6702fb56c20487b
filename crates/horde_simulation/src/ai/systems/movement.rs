//! AI movement systems (AIState → MovementMode, stuck recovery).

use bevy::prelude::*;

use crate::ai::{AIConfig, AIState, AgentEvent, AgentMemory, FeintPhase, Perception, StuckDetector};
use crate::combat::{CombatArbiter, CombatBookkeeping, Dead, Tactics};
use crate::components::{Dormant, Facing, Position, Velocity};
use crate::shared::SimClock;
use crate::steering::{MovementController, MovementMode, MovementModeKind, SteeringAgent, SteeringBehaviors};

/// Режим движения для состояния + множитель скорости режима
///
/// Pacing не сближается с целью: медленный strafe на текущем радиусе.
pub fn movement_for_state(
    state: &AIState,
    position: Vec2,
    perception: &Perception,
    memory: &AgentMemory,
    config: &AIConfig,
    chase_standoff: f32,
) -> (MovementMode, f32) {
    let target = perception.target_position;

    match *state {
        AIState::Patrol { point, .. } => (MovementMode::PatrolTo { point }, config.patrol_speed_scale),
        AIState::PatrolIdle { .. } | AIState::Hesitate { .. } | AIState::Attack { .. } => (MovementMode::Hold, 1.0),
        AIState::Chase { .. } => {
            if perception.tracking {
                if chase_standoff > 0.0 && perception.surface_distance <= chase_standoff {
                    return (MovementMode::Hold, 1.0);
                }
                return (MovementMode::Chase { target }, 1.0);
            }
            // Память: идём к экстраполированной last known точке, у точки стоим
            match memory.extrapolated(config.memory_extrapolation) {
                Some(goal) if goal.distance(position) > config.memory_arrival_radius => {
                    (MovementMode::Chase { target: goal }, 1.0)
                }
                _ => (MovementMode::Hold, 1.0),
            }
        }
        AIState::Surround => (
            MovementMode::Formation {
                anchor: target,
                facing: perception.target_facing,
            },
            1.0,
        ),
        AIState::Retreat { direction, .. } => (
            MovementMode::Flee {
                threat: position - direction,
            },
            1.0,
        ),
        AIState::Flee => (MovementMode::Flee { threat: target }, 1.0),
        AIState::Stun { .. } => (MovementMode::Idle, 1.0),
        AIState::Search { point, wandering, .. } => {
            if wandering {
                (MovementMode::Wander, config.patrol_speed_scale)
            } else {
                (MovementMode::PatrolTo { point }, 1.0)
            }
        }
        AIState::Pacing { .. } => (
            MovementMode::Orbit {
                center: target,
                radius: perception.distance,
            },
            config.pacing_speed_scale,
        ),
        AIState::BlindSpotSeek { .. } => (
            MovementMode::Orbit {
                center: target,
                radius: config.blind_spot_orbit_radius,
            },
            1.0,
        ),
        AIState::Feint { phase, .. } => match phase {
            FeintPhase::Approach => (MovementMode::Chase { target }, 1.0),
            FeintPhase::Withdraw => (MovementMode::Flee { threat: target }, 1.0),
        },
    }
}

/// Система: AIState → MovementController
///
/// Направление орбиты задаётся только при смене состояния: реверс из stuck recovery
/// живёт до следующего перехода.
pub fn ai_movement_from_state(
    mut agents: Query<
        (
            Ref<AIState>,
            &AIConfig,
            &Perception,
            &AgentMemory,
            &Tactics,
            &CombatBookkeeping,
            &Position,
            &mut Facing,
            &mut MovementController,
            &mut SteeringBehaviors,
        ),
        (Without<Dormant>, Without<Dead>),
    >,
    arbiter: Res<CombatArbiter>,
) {
    for (state, config, perception, memory, tactics, book, position, mut facing, mut controller, mut behaviors) in
        agents.iter_mut()
    {
        let (mode, speed_scale) = movement_for_state(
            &state,
            position.0,
            perception,
            memory,
            config,
            tactics.module().chase_standoff(),
        );
        controller.set_mode(mode);
        controller.speed_scale = speed_scale;
        controller.facing_locked = matches!(*state, AIState::Attack { .. });

        match *state {
            AIState::Attack { facing: locked, .. } => facing.0 = locked,
            AIState::Hesitate { .. } | AIState::Stun { .. } if perception.has_target() => {
                facing.look_along(perception.target_position - position.0);
            }
            _ => {}
        }

        if state.is_changed() {
            match *state {
                AIState::BlindSpotSeek { direction, .. } => behaviors.orbit.direction = direction,
                AIState::Pacing { .. } => {
                    behaviors.orbit.direction = book
                        .assigned_slot
                        .and_then(|index| arbiter.slot_profile(index))
                        .map_or(1.0, |profile| profile.strafe_direction);
                }
                _ => {}
            }
        }
    }
}

/// Система: stuck recovery
///
/// Смещение меньше stuck_distance за stuck_window при активном намерении двигаться →
/// реверс орбиты, пропуск waypoint'а, форс перепланирования, боковой импульс.
pub fn stuck_recovery(
    mut agents: Query<
        (
            Entity,
            &Position,
            &AIConfig,
            &SteeringAgent,
            &mut StuckDetector,
            &mut MovementController,
            &mut SteeringBehaviors,
            &mut Velocity,
        ),
        (Without<Dormant>, Without<Dead>),
    >,
    clock: Res<SimClock>,
    mut events: EventWriter<AgentEvent>,
) {
    for (entity, position, config, agent, mut detector, mut controller, mut behaviors, mut velocity) in
        agents.iter_mut()
    {
        if !controller.mode().has_intent() {
            detector.restart(position.0, clock.now);
            continue;
        }
        if !detector.check_window(position.0, clock.now, config.stuck_window, config.stuck_distance) {
            continue;
        }

        if controller.mode().kind() == MovementModeKind::Orbit {
            behaviors.orbit.reverse();
        }

        let heading = controller
            .current_waypoint()
            .and_then(|waypoint| (waypoint - position.0).try_normalize())
            .or_else(|| velocity.0.try_normalize())
            .unwrap_or(Vec2::X);

        controller.skip_waypoint();
        controller.throttle.force();
        velocity.0 += heading.perp() * agent.slip_bias * config.stuck_impulse;

        crate::logger::log_warning(&format!(
            "Stuck: {:?} moved < {:.2}m in {:.1}s ({:?}), recovering",
            entity,
            config.stuck_distance,
            config.stuck_window,
            controller.mode().kind()
        ));
        events.write(AgentEvent::Unstuck { entity });
    }
}
