//! FormationRegistry — аренда позиций в формации вокруг якоря
//!
//! Раскладки: Ring, Arc, Line, Wedge. Агент арендует индекс (lease), позиция
//! вычисляется каждый тик от текущего якоря/направления (формация движется вместе с якорем).
//! Освобождение — release (смерть, деактивация, выход из Surround) или sweep.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::f32::consts::TAU;

use crate::shared::rotate;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FormationLayout {
    /// Равномерное кольцо
    Ring { radius: f32 },
    /// Дуга, центрированная по facing
    Arc { radius: f32, span_degrees: f32 },
    /// Линия поперёк facing
    Line { spacing: f32 },
    /// Клин: остриё на якоре, ряды уходят назад
    Wedge { spacing: f32 },
}

impl Default for FormationLayout {
    fn default() -> Self {
        Self::Ring { radius: 3.0 }
    }
}

impl FormationLayout {
    /// Смещение слота `index` из `capacity` относительно якоря (facing нормализован)
    pub fn offset(&self, index: usize, capacity: usize, facing: Vec2) -> Vec2 {
        let capacity = capacity.max(1);
        let side = facing.perp();
        match *self {
            FormationLayout::Ring { radius } => {
                let angle = TAU * index as f32 / capacity as f32;
                rotate(facing, angle) * radius
            }
            FormationLayout::Arc { radius, span_degrees } => {
                let span = span_degrees.to_radians();
                let t = if capacity == 1 {
                    0.5
                } else {
                    index as f32 / (capacity - 1) as f32
                };
                rotate(facing, -span * 0.5 + span * t) * radius
            }
            FormationLayout::Line { spacing } => {
                let centered = index as f32 - (capacity - 1) as f32 * 0.5;
                side * centered * spacing
            }
            FormationLayout::Wedge { spacing } => {
                if index == 0 {
                    return Vec2::ZERO;
                }
                let row = index.div_ceil(2) as f32;
                let lateral = if index % 2 == 1 { 1.0 } else { -1.0 };
                -facing * row * spacing + side * lateral * row * spacing
            }
        }
    }
}

/// Реестр формации (Resource, shared singleton)
#[derive(Resource, Debug, Clone, Default)]
pub struct FormationRegistry {
    pub layout: FormationLayout,
    /// Максимум участников (0 = формация не настроена)
    pub capacity: usize,
    leases: BTreeMap<Entity, usize>,
}

impl FormationRegistry {
    pub fn new(layout: FormationLayout, capacity: usize) -> Self {
        Self {
            layout,
            capacity,
            leases: BTreeMap::new(),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.capacity > 0
    }

    /// Арендовать наименьший свободный индекс (повторный lease возвращает тот же)
    pub fn lease(&mut self, agent: Entity) -> Option<usize> {
        if let Some(&index) = self.leases.get(&agent) {
            return Some(index);
        }
        let taken: BTreeSet<usize> = self.leases.values().copied().collect();
        let index = (0..self.capacity).find(|i| !taken.contains(i))?;
        self.leases.insert(agent, index);
        Some(index)
    }

    pub fn release(&mut self, agent: Entity) -> bool {
        self.leases.remove(&agent).is_some()
    }

    pub fn lease_of(&self, agent: Entity) -> Option<usize> {
        self.leases.get(&agent).copied()
    }

    pub fn leased_count(&self) -> usize {
        self.leases.len()
    }

    pub fn slot_position(&self, agent: Entity, anchor: Vec2, facing: Vec2) -> Option<Vec2> {
        let index = self.lease_of(agent)?;
        let facing = facing.try_normalize().unwrap_or(Vec2::X);
        Some(anchor + self.layout.offset(index, self.capacity, facing))
    }

    /// Удалить аренды мёртвых/деактивированных агентов
    pub fn sweep(&mut self, alive: &BTreeSet<Entity>) -> usize {
        let before = self.leases.len();
        self.leases.retain(|entity, _| alive.contains(entity));
        before - self.leases.len()
    }
}
