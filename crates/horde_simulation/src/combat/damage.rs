//! Damage система (Health collaborator)
//!
//! DamageDealt — запрос урона (attacker → target):
//! 1. Health::take_damage(amount)
//! 2. knockback импульс в Velocity
//! 3. живой агент получает Staggered → AI уходит в Stun на ближайшем тике
//! 4. health == 0 → EntityDied (ровно один раз) + маркер Dead

use bevy::prelude::*;

use crate::ai::AIState;
use crate::components::{Health, Velocity};
use crate::shared::SimClock;

/// Событие: запрос на урон
///
/// Генерируется AI (Attack после windup) или хостом (урон по агентам).
#[derive(Event, Debug, Clone, Copy, PartialEq)]
pub struct DamageDealt {
    pub attacker: Entity,
    pub target: Entity,
    pub amount: u32,
    /// Импульс (направление × сила), добавляется к Velocity цели
    pub knockback: Vec2,
}

/// Событие: entity умер (health == 0)
#[derive(Event, Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntityDied {
    pub entity: Entity,
    pub killer: Option<Entity>,
}

/// Компонент-маркер: entity мертв
///
/// Повторный урон по мёртвым игнорируется.
#[derive(Component, Debug, Clone, Copy, Default)]
pub struct Dead;

/// Pending stun: урон получен в момент `at`, AI ещё не отреагировал
#[derive(Component, Debug, Clone, Copy, PartialEq)]
pub struct Staggered {
    pub at: f32,
}

/// Деспавн по deadline'у (трупы агентов)
#[derive(Component, Debug, Clone, Copy, PartialEq)]
pub struct DespawnAfter {
    pub at: f32,
}

/// Система: apply damage от DamageDealt событий
pub fn apply_damage(
    mut commands: Commands,
    mut damage_events: EventReader<DamageDealt>,
    mut died_events: EventWriter<EntityDied>,
    mut targets: Query<(&mut Health, Option<&mut Velocity>, Has<AIState>), Without<Dead>>,
    clock: Res<SimClock>,
) {
    for event in damage_events.read() {
        let Ok((mut health, velocity, is_agent)) = targets.get_mut(event.target) else {
            continue;
        };

        let was_alive = health.is_alive();
        health.take_damage(event.amount);

        // Knockback цели применяет хост (её физика внешняя)
        if let Some(mut velocity) = velocity.filter(|_| is_agent) {
            velocity.0 += event.knockback;
        }

        if was_alive && !health.is_alive() {
            commands.entity(event.target).insert(Dead).remove::<Staggered>();
            died_events.write(EntityDied {
                entity: event.target,
                killer: Some(event.attacker),
            });
            crate::logger::log_info(&format!(
                "Entity {:?} killed by {:?}",
                event.target, event.attacker
            ));
        } else if health.is_alive() && is_agent {
            commands.entity(event.target).insert(Staggered { at: clock.now });
        }
    }
}

/// Система: деспавн entities с истёкшим DespawnAfter
pub fn despawn_after_timeout(
    mut commands: Commands,
    query: Query<(Entity, &DespawnAfter)>,
    clock: Res<SimClock>,
) {
    for (entity, despawn) in query.iter() {
        if clock.reached(despawn.at) {
            commands.entity(entity).despawn();
        }
    }
}
