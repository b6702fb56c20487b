//! AI decision-making module
//!
//! FSM агента орды: Patrol → Hesitate → Chase → (Surround | Attack | BlindSpotSeek | Feint)
//! → Retreat → Pacing, плюс Flee/Stun/Search.
//!
//! Разделение:
//! - `brain` — чистая логика переходов (тестируется без ECS)
//! - `systems` — сбор Brain из компонентов, применение результата, lifecycle
//! - `events` — fire-and-forget хуки наружу (анимации, телеметрия)

use bevy::prelude::*;

pub mod brain;
pub mod components;
pub mod events;
pub mod systems;


// Re-export основных типов
pub use brain::{patrol_state, Brain, BrainAction};
pub use components::*;
pub use events::{ActivationParams, AgentEvent, AgentLifecycle, AnimationCommand, AnimationKind};

use crate::SimulationSet;

/// AI Plugin
///
/// Порядок внутри FixedUpdate (наборы SimulationSet выполняются цепочкой):
/// 1. Clock — handle_agent_lifecycle (активация/деактивация до любых решений)
/// 2. Sense — update_perception, update_stuck_detectors
/// 3. Think — ai_fsm_transitions
/// 4. Move — ai_movement_from_state, stuck_recovery (до plan_paths)
/// 5. Cleanup — handle_agent_death (до sweep/despawn)
pub struct AIPlugin;

impl Plugin for AIPlugin {
    fn build(&self, app: &mut App) {
        app.add_event::<AnimationCommand>()
            .add_event::<AgentEvent>()
            .add_event::<AgentLifecycle>();

        app.add_systems(
            FixedUpdate,
            (
                systems::handle_agent_lifecycle.in_set(SimulationSet::Clock),
                (systems::update_perception, systems::update_stuck_detectors)
                    .chain()
                    .in_set(SimulationSet::Sense)
                    .after(crate::combat::track_arbiter_target),
                systems::ai_fsm_transitions.in_set(SimulationSet::Think),
                (systems::ai_movement_from_state, systems::stuck_recovery)
                    .chain()
                    .in_set(SimulationSet::Move)
                    .before(crate::steering::plan_paths),
                systems::handle_agent_death
                    .in_set(SimulationSet::Cleanup)
                    .before(crate::combat::sweep_dead_references),
            ),
        );
    }
}
