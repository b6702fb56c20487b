//! CombatBookkeeping — что агент сейчас держит в CombatArbiter
//!
//! Зеркало реестров арбитра на стороне агента (телеметрия + быстрые проверки в AI).
//! Источник истины — CombatArbiter; release_from() возвращает всё разом.

use bevy::prelude::*;

use super::arbiter::CombatArbiter;

#[derive(Component, Debug, Clone, Default, Reflect)]
#[reflect(Component)]
pub struct CombatBookkeeping {
    pub assigned_slot: Option<usize>,
    pub holds_token: bool,
    /// Зарегистрирован как aware (в бою с целью)
    pub aware: bool,
    pub retreat_reserved: bool,
    /// Время последнего нанесённого удара (cooldown)
    pub last_attack_at: Option<f32>,
}

impl CombatBookkeeping {
    /// Cooldown атаки истёк?
    pub fn attack_ready(&self, now: f32, cooldown: f32) -> bool {
        self.last_attack_at.map_or(true, |at| now >= at + cooldown)
    }

    /// Вернуть все резервации агента (смерть, деактивация)
    pub fn release_from(&mut self, agent: Entity, arbiter: &mut CombatArbiter) {
        arbiter.release_all(agent);
        self.assigned_slot = None;
        self.holds_token = false;
        self.aware = false;
        self.retreat_reserved = false;
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::combat::ArbiterSettings;

    #[test]
    fn test_release_from_clears_arbiter_and_mirror() {
        let mut arbiter = CombatArbiter::new(ArbiterSettings::default());
        let agent = Entity::from_raw(7);
        let mut book = CombatBookkeeping::default();

        book.holds_token = arbiter.request_token(agent);
        book.assigned_slot = arbiter.assign_slot(agent, Vec2::new(3.0, 0.0));
        book.aware = arbiter.register_aware(agent);

        book.release_from(agent, &mut arbiter);

        assert!(!book.holds_token && !book.aware);
        assert_eq!(book.assigned_slot, None);
        assert_eq!(arbiter.token_holder_count(), 0);
        assert_eq!(arbiter.slot_of(agent), None);
        assert_eq!(arbiter.aware_count(), 0);
    }

    #[test]
    fn test_attack_cooldown() {
        let mut book = CombatBookkeeping::default();
        assert!(book.attack_ready(0.0, 1.0));

        book.last_attack_at = Some(2.0);
        assert!(!book.attack_ready(2.5, 1.0));
        assert!(book.attack_ready(3.0, 1.0));
    }
}
