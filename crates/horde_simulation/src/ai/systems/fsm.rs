//! FSM AI system (Brain → AIState + hooks).

use bevy::prelude::*;

use crate::ai::brain::{Brain, BrainAction};
use crate::ai::{AIConfig, AIState, AgentEvent, AgentMemory, AnimationCommand, Cornered, Perception};
use crate::combat::{
    CombatArbiter, CombatBookkeeping, DamageDealt, Dead, Staggered, TacticalModel, TacticalSettings, Tactics,
};
use crate::components::{Dormant, Health, Position, Stamina};
use crate::shared::SimClock;
use crate::steering::{FormationRegistry, MovementController};
use crate::DeterministicRng;

/// Система: AI FSM transitions
///
/// Агенты обрабатываются в порядке Entity (общий арбитр + общий RNG → детерминизм).
/// Brain решает, система применяет:
/// - новое состояние через `set_if_neq` (change detection только на реальные изменения)
/// - BrainAction → DamageDealt / AnimationCommand / AgentEvent
/// - Staggered потребляется здесь (один stun на одно попадание)
#[allow(clippy::too_many_arguments)]
pub fn ai_fsm_transitions(
    mut commands: Commands,
    mut agents: Query<
        (
            &mut AIState,
            &AIConfig,
            &Perception,
            &mut AgentMemory,
            &mut TacticalModel,
            &mut Stamina,
            &mut CombatBookkeeping,
            &Tactics,
            &Position,
            &Health,
            &MovementController,
            Has<Staggered>,
            Has<Cornered>,
        ),
        (Without<Dormant>, Without<Dead>),
    >,
    positions: Query<(Entity, &Position), (With<AIState>, Without<Dormant>, Without<Dead>)>,
    mut arbiter: ResMut<CombatArbiter>,
    mut formations: ResMut<FormationRegistry>,
    mut rng: ResMut<DeterministicRng>,
    tactical_settings: Res<TacticalSettings>,
    clock: Res<SimClock>,
    mut damage_events: EventWriter<DamageDealt>,
    mut animation_events: EventWriter<AnimationCommand>,
    mut agent_events: EventWriter<AgentEvent>,
) {
    let mut others: Vec<(Entity, Vec2)> = positions.iter().map(|(entity, position)| (entity, position.0)).collect();
    others.sort_by_key(|(entity, _)| *entity);

    for &(entity, _) in &others {
        let Ok((
            mut state,
            config,
            perception,
            mut memory,
            mut tactical,
            mut stamina,
            mut book,
            tactics,
            position,
            health,
            controller,
            staggered,
            cornered,
        )) = agents.get_mut(entity)
        else {
            continue;
        };

        let mut brain = Brain {
            entity,
            now: clock.now,
            position: position.0,
            health_percent: health.percent(),
            staggered,
            cornered,
            arrived: controller.arrived(position.0, config.arrival_tolerance),
            perception,
            config,
            tactics: tactics.module(),
            tactical_settings: &tactical_settings,
            others: &others,
            memory: &mut memory,
            tactical: &mut tactical,
            stamina: &mut stamina,
            book: &mut book,
            arbiter: &mut arbiter,
            formations: &mut formations,
            rng: &mut rng.rng,
            actions: Vec::new(),
        };

        let next = brain.update(&state);
        let actions = std::mem::take(&mut brain.actions);

        if let Some(next) = next {
            let from = state.kind();
            let to = next.kind();
            if state.set_if_neq(next) && from != to {
                crate::logger::log(&format!("AI: {:?} {:?} → {:?}", entity, from, to));
                agent_events.write(AgentEvent::StateChanged { entity, from, to });
            }
        }

        for action in actions {
            match action {
                BrainAction::Strike {
                    target,
                    amount,
                    knockback,
                } => {
                    damage_events.write(DamageDealt {
                        attacker: entity,
                        target,
                        amount,
                        knockback,
                    });
                }
                BrainAction::Animation(kind) => {
                    animation_events.write(AnimationCommand { entity, kind });
                }
                BrainAction::TokenDenied(redirected) => {
                    agent_events.write(AgentEvent::TokenDenied { entity, redirected });
                }
            }
        }

        if staggered {
            commands.entity(entity).remove::<Staggered>();
        }
    }
}
