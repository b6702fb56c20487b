//! AI reaction systems (pool lifecycle, death).

use bevy::prelude::*;

use crate::ai::brain::patrol_state;
use crate::ai::{AIConfig, AIState, AgentLifecycle, AgentMemory, Cornered, Perception, StuckDetector};
use crate::combat::{
    CombatArbiter, CombatBookkeeping, Dead, DespawnAfter, EntityDied, Exhausted, Staggered, TacticalModel,
};
use crate::components::{Dormant, Health, Position, Stamina, Velocity};
use crate::shared::SimClock;
use crate::steering::{FormationRegistry, MovementController};
use crate::DeterministicRng;

/// System: lifecycle от пула (reset вместо деспавна)
///
/// Activate: явный reset всех runtime-полей + свежий Patrol.
/// Deactivate: вернуть все резервации арбитра/формации, агент засыпает (Dormant).
#[allow(clippy::too_many_arguments)]
pub fn handle_agent_lifecycle(
    mut commands: Commands,
    mut lifecycle: EventReader<AgentLifecycle>,
    mut agents: Query<(
        &mut AIState,
        &AIConfig,
        &mut Position,
        &mut Velocity,
        &mut Health,
        &mut Stamina,
        &mut AgentMemory,
        &mut TacticalModel,
        &mut CombatBookkeeping,
        &mut Perception,
        &mut MovementController,
        &mut StuckDetector,
    )>,
    mut arbiter: ResMut<CombatArbiter>,
    mut formations: ResMut<FormationRegistry>,
    mut rng: ResMut<DeterministicRng>,
    clock: Res<SimClock>,
) {
    for event in lifecycle.read() {
        match *event {
            AgentLifecycle::Activate { entity, params } => {
                let Ok((
                    mut state,
                    config,
                    mut position,
                    mut velocity,
                    mut health,
                    mut stamina,
                    mut memory,
                    mut tactical,
                    mut book,
                    mut perception,
                    mut controller,
                    mut detector,
                )) = agents.get_mut(entity)
                else {
                    crate::logger::log_warning(&format!("Lifecycle: activate {:?} ignored (not an agent)", entity));
                    continue;
                };

                book.release_from(entity, &mut arbiter);
                formations.release(entity);

                position.0 = params.position;
                velocity.0 = Vec2::ZERO;
                health.reset(params.max_health);
                stamina.current = stamina.max;
                memory.reset(params.position);
                tactical.reset();
                book.reset();
                perception.clear();
                controller.reset();
                *detector = StuckDetector::new(params.position, clock.now);
                *state = patrol_state(params.position, config, clock.now, &mut rng.rng);

                commands
                    .entity(entity)
                    .remove::<(Dormant, Dead, DespawnAfter, Staggered, Cornered, Exhausted)>();

                crate::logger::log_info(&format!(
                    "Lifecycle: {:?} activated at {:?} ({} hp)",
                    entity, params.position, params.max_health
                ));
            }
            AgentLifecycle::Deactivate { entity } => {
                let Ok((_, _, _, mut velocity, _, _, _, _, mut book, mut perception, mut controller, _)) =
                    agents.get_mut(entity)
                else {
                    continue;
                };

                book.release_from(entity, &mut arbiter);
                formations.release(entity);
                controller.reset();
                perception.clear();
                velocity.0 = Vec2::ZERO;
                commands.entity(entity).insert(Dormant);

                crate::logger::log_info(&format!("Lifecycle: {:?} deactivated", entity));
            }
        }
    }
}

/// System: смерть агента → вернуть резервации, труп полежит corpse_linger и исчезнет
///
/// Смерть цели сюда не попадает (у цели нет CombatBookkeeping): агенты сами
/// уходят в Patrol, когда Perception теряет цель.
pub fn handle_agent_death(
    mut commands: Commands,
    mut deaths: EventReader<EntityDied>,
    mut agents: Query<(&AIConfig, &mut CombatBookkeeping, &mut MovementController, &mut Velocity)>,
    mut arbiter: ResMut<CombatArbiter>,
    mut formations: ResMut<FormationRegistry>,
    clock: Res<SimClock>,
) {
    for event in deaths.read() {
        let Ok((config, mut book, mut controller, mut velocity)) = agents.get_mut(event.entity) else {
            continue;
        };

        book.release_from(event.entity, &mut arbiter);
        formations.release(event.entity);
        controller.reset();
        velocity.0 = Vec2::ZERO;

        commands.entity(event.entity).insert(DespawnAfter {
            at: clock.after(config.corpse_linger),
        });
    }
}
