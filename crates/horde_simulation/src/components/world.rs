//! Мир: цель (Target), коллайдер тела, пул агентов

use bevy::prelude::*;

/// Маркер: единственная primary-цель орды (игрок)
///
/// Target locator читает Position/Velocity/Facing/BodyCollider этой entity.
#[derive(Component, Debug, Clone, Copy, Default, Reflect)]
#[reflect(Component)]
#[require(crate::components::Actor, BodyCollider)]
pub struct Target;

/// Коллайдер тела (круг) — для surface-to-surface дистанций и raycast'ов
#[derive(Component, Debug, Clone, Copy, Reflect)]
#[reflect(Component)]
pub struct BodyCollider {
    pub radius: f32,
}

impl Default for BodyCollider {
    fn default() -> Self {
        Self { radius: 0.5 }
    }
}

/// Маркер: агент деактивирован пулом (AI/steering пропускают его)
#[derive(Component, Debug, Clone, Copy, Default)]
pub struct Dormant;
