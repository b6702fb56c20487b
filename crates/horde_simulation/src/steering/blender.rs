//! SteeringBlender — сведение сил в одну и интегрирование в скорость
//!
//! Blender пишет скорость напрямую (без физического солвера): сила → ускорение
//! (clamp max_acceleration) → скорость (clamp speed limit) → drag.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use super::behaviors::{SteeringBehaviors, SteeringContext};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Reflect)]
pub enum BlendMode {
    /// Σ force × weight
    #[default]
    WeightedSum,
    /// Первое (по приоритету) поведение с ненулевой силой
    Priority,
}

/// Порог "ненулевой" силы для Priority режима
const PRIORITY_EPSILON: f32 = 1e-3;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SteeringBlender {
    pub mode: BlendMode,
}

impl SteeringBlender {
    pub fn new(mode: BlendMode) -> Self {
        Self { mode }
    }

    /// Итоговая steering-сила, clamp к max_acceleration
    pub fn compute_force(&self, behaviors: &mut SteeringBehaviors, ctx: &SteeringContext) -> Vec2 {
        let mut total = Vec2::ZERO;

        for behavior in behaviors.iter_mut() {
            if !behavior.is_enabled() || behavior.weight() <= 0.0 {
                continue;
            }
            let force = behavior.compute(ctx) * behavior.weight();
            match self.mode {
                BlendMode::WeightedSum => total += force,
                BlendMode::Priority => {
                    if force.length() > PRIORITY_EPSILON {
                        total = force;
                        break;
                    }
                }
            }
        }

        total.clamp_length_max(ctx.params.max_acceleration)
    }

    /// v' = clamp(v + f·dt, speed_limit) · (1 - drag·dt)
    pub fn integrate(velocity: Vec2, force: Vec2, dt: f32, speed_limit: f32, drag: f32) -> Vec2 {
        let accelerated = velocity + force * dt;
        let clamped = accelerated.clamp_length_max(speed_limit.max(0.0));
        clamped * (1.0 - drag * dt).max(0.0)
    }
}
