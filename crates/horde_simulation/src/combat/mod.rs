//! Combat module (арбитр боя + Health/Stamina правила)
//!
//! ECS ответственность:
//! - CombatArbiter: attack tokens, state quotas, combat slots, awareness, retreat sectors
//! - TacticalModel: агрессия/личность/каденс решений (выбор Chase vs манёвр)
//! - Tactics: pluggable модуль оружия (дальности, тайминги, урон)
//! - Health/Stamina правила: DamageDealt → урон/knockback/stagger, fatigue
//! - Events: DamageDealt, EntityDied, CombatAwarenessChanged
//!
//! Порядок в FixedUpdate:
//! 1. track_arbiter_target (Sense) — кольцо слотов следует за целью
//! 2. apply_damage → regenerate_stamina → detect_exhaustion (Integrate, до integrate_positions)
//! 3. emit_awareness_events, sweep_dead_references, despawn_after_timeout (Cleanup)

use bevy::prelude::*;
use std::collections::BTreeSet;

pub mod arbiter;
pub mod bookkeeping;
pub mod damage;
pub mod stamina;
pub mod tactical;
pub mod tactics;


// Re-export основных типов
pub use arbiter::{
    ArbiterSettings, AwarenessNotification, CombatArbiter, CombatSlot, SlotProfile, StateFallback, StateQuota,
};
pub use bookkeeping::CombatBookkeeping;
pub use damage::{DamageDealt, Dead, DespawnAfter, EntityDied, Staggered};
pub use stamina::{is_fatigued, Exhausted};
pub use tactical::{TacticalChoice, TacticalModel, TacticalSettings};
pub use tactics::{MeleeTactics, RangedTactics, Tactics, TacticsModule};

use crate::components::{Dormant, Position, Target};
use crate::shared::SimClock;
use crate::steering::FormationRegistry;
use crate::SimulationSet;

/// Событие: агент вступил в бой / вышел из боя (target-side системы: regen gating и т.п.)
#[derive(Event, Debug, Clone, Copy, PartialEq, Eq)]
pub struct CombatAwarenessChanged {
    pub agent: Entity,
    pub engaged: bool,
    /// Агентов в бою после изменения
    pub aware_count: usize,
}

/// Combat Plugin
///
/// CombatArbiter создаётся из ArbiterSettings по умолчанию, если хост не вставил свой.
pub struct CombatPlugin;

impl Plugin for CombatPlugin {
    fn build(&self, app: &mut App) {
        if !app.world().contains_resource::<CombatArbiter>() {
            app.insert_resource(CombatArbiter::new(ArbiterSettings::default()));
        }

        app.init_resource::<TacticalSettings>()
            .add_event::<DamageDealt>()
            .add_event::<EntityDied>()
            .add_event::<CombatAwarenessChanged>();

        app.add_systems(
            FixedUpdate,
            (
                track_arbiter_target.in_set(SimulationSet::Sense),
                (
                    damage::apply_damage,
                    stamina::regenerate_stamina,
                    stamina::detect_exhaustion,
                )
                    .chain()
                    .in_set(SimulationSet::Integrate)
                    .before(crate::steering::integrate_positions),
                (
                    emit_awareness_events,
                    sweep_dead_references,
                    damage::despawn_after_timeout,
                )
                    .chain()
                    .in_set(SimulationSet::Cleanup),
            ),
        );
    }
}

/// Система: центр кольца слотов = текущая позиция живой цели
pub fn track_arbiter_target(
    targets: Query<&Position, (With<Target>, Without<Dead>)>,
    mut arbiter: ResMut<CombatArbiter>,
) {
    if let Some(position) = targets.iter().next() {
        arbiter.track_target(position.0);
    }
}

/// Система: очередь уведомлений арбитра → CombatAwarenessChanged
pub fn emit_awareness_events(
    mut arbiter: ResMut<CombatArbiter>,
    mut events: EventWriter<CombatAwarenessChanged>,
) {
    for note in arbiter.drain_notifications() {
        crate::logger::log(&format!(
            "Awareness: {:?} {} combat ({} engaged)",
            note.agent,
            if note.engaged { "entered" } else { "left" },
            note.aware_count
        ));
        events.write(CombatAwarenessChanged {
            agent: note.agent,
            engaged: note.engaged,
            aware_count: note.aware_count,
        });
    }
}

/// Система: периодическая чистка мёртвых ссылок (арбитр + формации)
///
/// Живые = агенты с CombatBookkeeping, не Dormant и не Dead.
pub fn sweep_dead_references(
    agents: Query<Entity, (With<CombatBookkeeping>, Without<Dormant>, Without<Dead>)>,
    mut arbiter: ResMut<CombatArbiter>,
    mut formations: ResMut<FormationRegistry>,
    clock: Res<SimClock>,
    mut next_sweep: Local<f32>,
) {
    if !clock.reached(*next_sweep) {
        return;
    }
    *next_sweep = clock.after(arbiter.settings().cleanup_interval);

    let alive: BTreeSet<Entity> = agents.iter().collect();
    let removed = arbiter.sweep(&alive) + formations.sweep(&alive);
    if removed > 0 {
        crate::logger::log(&format!("Cleanup: swept {} dead references", removed));
    }
}
