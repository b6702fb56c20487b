//! AgentMemory — последний подтверждённый контакт с целью + эпизодические флаги.

use bevy::prelude::*;

#[derive(Component, Debug, Clone, Default, Reflect)]
#[reflect(Component)]
pub struct AgentMemory {
    /// Точка спавна/активации (центр патруля)
    pub home: Vec2,
    pub last_known_position: Option<Vec2>,
    pub last_known_velocity: Vec2,
    /// После этого момента память считается истёкшей
    pub memory_expiry: f32,
    /// Начало непрерывного уклонения (Retreat/Pacing/Flee)
    pub evasion_started_at: Option<f32>,
    /// Flee уже был в этом бою (повторно не бежим)
    pub has_fled: bool,
}

impl AgentMemory {
    pub fn new(home: Vec2) -> Self {
        Self {
            home,
            ..Default::default()
        }
    }

    /// Подтверждённый контакт: обновить позицию/скорость, продлить окно
    pub fn remember(&mut self, position: Vec2, velocity: Vec2, now: f32, duration: f32) {
        self.last_known_position = Some(position);
        self.last_known_velocity = velocity;
        self.memory_expiry = now + duration;
    }

    /// Строго после expiry (на самом deadline'е память ещё жива)
    pub fn expired(&self, now: f32) -> bool {
        now > self.memory_expiry
    }

    /// Last known позиция, экстраполированная вдоль скорости (против срезания углов)
    pub fn extrapolated(&self, seconds: f32) -> Option<Vec2> {
        self.last_known_position
            .map(|p| p + self.last_known_velocity * seconds)
    }

    pub fn forget(&mut self) {
        self.last_known_position = None;
        self.last_known_velocity = Vec2::ZERO;
        self.memory_expiry = 0.0;
    }

    /// Сброс при активации из пула
    pub fn reset(&mut self, home: Vec2) {
        *self = Self::new(home);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_expires_strictly_after_deadline() {
        let mut memory = AgentMemory::new(Vec2::ZERO);
        memory.remember(Vec2::new(4.0, 0.0), Vec2::new(2.0, 0.0), 1.0, 3.0);

        assert!(!memory.expired(4.0));
        assert!(memory.expired(4.01));
        assert_eq!(memory.extrapolated(0.5), Some(Vec2::new(5.0, 0.0)));

        memory.forget();
        assert_eq!(memory.extrapolated(0.5), None);
    }
}
