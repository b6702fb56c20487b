//! SimClock — монотонные часы симуляции
//!
//! Архитектура:
//! - Никаких корутин/sleep: любое "ожидание" (windup, cooldown, memory window) —
//!   это сравнение `clock.now >= deadline` внутри обычного тика.
//! - Шаг фиксированный: advance_clock прибавляет ровно `step` за каждый прогон FixedUpdate.
//!   Time<Fixed> не используем напрямую — тесты гоняют FixedUpdate вручную.

use bevy::prelude::*;

/// Часы симуляции (секунды с начала сессии)
#[derive(Resource, Debug, Clone, Copy, PartialEq)]
pub struct SimClock {
    /// Текущее время (секунды)
    pub now: f32,
    /// Фиксированный шаг (секунды)
    pub step: f32,
    /// Номер тика
    pub tick: u64,
}

impl Default for SimClock {
    fn default() -> Self {
        Self::from_hz(60.0)
    }
}

impl SimClock {
    pub fn from_hz(hz: f32) -> Self {
        Self {
            now: 0.0,
            step: 1.0 / hz.max(1.0),
            tick: 0,
        }
    }

    pub fn advance(&mut self) {
        self.tick += 1;
        self.now = self.tick as f32 * self.step;
    }

    /// Deadline через `seconds` от текущего момента
    pub fn after(&self, seconds: f32) -> f32 {
        self.now + seconds.max(0.0)
    }

    pub fn reached(&self, deadline: f32) -> bool {
        self.now >= deadline
    }
}

/// Система: продвинуть часы на один шаг (первая в FixedUpdate)
pub fn advance_clock(mut clock: ResMut<SimClock>) {
    clock.advance();
}
