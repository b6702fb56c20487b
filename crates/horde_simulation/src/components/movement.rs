//! Кинематика в плоскости арены: Position, Velocity, Facing
//!
//! Архитектура:
//! - Steering blender пишет Velocity напрямую (без физических сил)
//! - integrate_positions (или внешний физический шаг) двигает Position
//! - Facing — единичный вектор взгляда (vision cone, blind spot, attack lock)

use bevy::prelude::*;

/// Позиция в мире (метры)
#[derive(Component, Debug, Clone, Copy, Default, PartialEq, Reflect)]
#[reflect(Component)]
pub struct Position(pub Vec2);

/// Скорость (м/с)
#[derive(Component, Debug, Clone, Copy, Default, PartialEq, Reflect)]
#[reflect(Component)]
pub struct Velocity(pub Vec2);

/// Направление взгляда (нормализованное)
#[derive(Component, Debug, Clone, Copy, PartialEq, Reflect)]
#[reflect(Component)]
pub struct Facing(pub Vec2);

impl Default for Facing {
    fn default() -> Self {
        Self(Vec2::X)
    }
}

impl Facing {
    /// Обновить по направлению движения (нулевой вектор игнорируется)
    pub fn look_along(&mut self, direction: Vec2) {
        if let Some(dir) = direction.try_normalize() {
            self.0 = dir;
        }
    }
}
