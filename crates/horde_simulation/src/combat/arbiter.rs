//! CombatArbiter — общие реестры боя вокруг цели
//!
//! Архитектура:
//! - Attack tokens: bounded pool, |holders| ≤ capacity всегда
//! - State quotas: сколько агентов одновременно в спорных состояниях (BlindSpotSeek, Feint, ...)
//! - Combat slots: кольцо логических позиций вокруг цели (центр следует за целью каждый тик)
//! - Awareness: сколько агентов сейчас в бою с целью (+ уведомления enter/exit combat)
//! - Retreat sectors: два отступающих агента не уходят в одном направлении
//!
//! Мутируется только из одного логического потока (FixedUpdate systems), поэтому
//! хватает обычных упорядоченных коллекций (BTreeMap/BTreeSet → детерминированный порядок).
//! Любой выход из состояния обязан вернуть то, что держал; мёртвые ссылки убирает sweep().

use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::ai::AIStateKind;
use crate::shared::direction_from_degrees;

/// Квота спорного состояния
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateQuota {
    pub state: AIStateKind,
    pub max: usize,
}

/// Куда перенаправить агента, если квота состояния исчерпана
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateFallback {
    pub state: AIStateKind,
    pub fallback: AIStateKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArbiterSettings {
    /// Сколько агентов одновременно могут держать attack token
    pub token_capacity: usize,
    /// Количество слотов в кольце
    pub slot_count: usize,
    /// Базовый радиус кольца слотов
    pub slot_ring_radius: f32,
    /// Разброс радиуса между слотами (уникальный offset на индекс)
    pub slot_radius_step: f32,
    /// Количество секторов отступления
    pub retreat_sectors: usize,
    pub state_quotas: Vec<StateQuota>,
    pub state_fallbacks: Vec<StateFallback>,
    /// Период sweep мёртвых ссылок (секунды)
    pub cleanup_interval: f32,
}

impl Default for ArbiterSettings {
    fn default() -> Self {
        Self {
            token_capacity: 1,
            slot_count: 8,
            slot_ring_radius: 1.8,
            slot_radius_step: 0.6,
            retreat_sectors: 8,
            state_quotas: vec![
                StateQuota { state: AIStateKind::BlindSpotSeek, max: 1 },
                StateQuota { state: AIStateKind::Feint, max: 2 },
                StateQuota { state: AIStateKind::Surround, max: 6 },
            ],
            state_fallbacks: vec![
                StateFallback { state: AIStateKind::BlindSpotSeek, fallback: AIStateKind::Feint },
                StateFallback { state: AIStateKind::Feint, fallback: AIStateKind::Pacing },
                StateFallback { state: AIStateKind::Surround, fallback: AIStateKind::Chase },
            ],
            cleanup_interval: 2.0,
        }
    }
}

/// Слот кольца
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CombatSlot {
    pub index: usize,
    pub angle_degrees: f32,
    pub occupant: Option<Entity>,
}

/// Детерминированный профиль слота (всё выводится из индекса)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SlotProfile {
    pub index: usize,
    pub angle_degrees: f32,
    /// +1 против часовой, -1 по часовой
    pub strafe_direction: f32,
    /// Добавка к радиусу кольца
    pub radius_offset: f32,
    /// Направление отступления (от цели, с персональным отклонением)
    pub retreat_direction: Vec2,
}

/// Уведомление об изменении awareness (дренируется в CombatAwarenessChanged)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AwarenessNotification {
    pub agent: Entity,
    /// true — агент вступил в бой, false — вышел
    pub engaged: bool,
    /// Агентов в бою после изменения
    pub aware_count: usize,
}

/// Process-wide реестр боя (Resource)
#[derive(Resource, Debug, Clone, Default)]
pub struct CombatArbiter {
    settings: ArbiterSettings,
    target_center: Vec2,
    token_holders: BTreeSet<Entity>,
    slots: Vec<CombatSlot>,
    slot_of: BTreeMap<Entity, usize>,
    occupancy: BTreeMap<AIStateKind, BTreeSet<Entity>>,
    aware: BTreeSet<Entity>,
    notifications: Vec<AwarenessNotification>,
    retreat_sector_of: BTreeMap<Entity, usize>,
}

impl CombatArbiter {
    pub fn new(settings: ArbiterSettings) -> Self {
        Self {
            settings,
            ..Default::default()
        }
    }

    pub fn settings(&self) -> &ArbiterSettings {
        &self.settings
    }

    /// Центр кольца слотов = текущая позиция цели
    pub fn track_target(&mut self, center: Vec2) {
        self.target_center = center;
    }

    pub fn target_center(&self) -> Vec2 {
        self.target_center
    }

    // ------------------------------------------------------------------------
    // Attack tokens
    // ------------------------------------------------------------------------

    /// Выдать токен: уже держит → true; есть свободный → true; иначе false
    pub fn request_token(&mut self, agent: Entity) -> bool {
        if self.token_holders.contains(&agent) {
            return true;
        }
        if self.token_holders.len() < self.settings.token_capacity {
            self.token_holders.insert(agent);
            return true;
        }
        crate::logger::log(&format!(
            "⚔️ Arbiter: token denied for {:?} ({}/{} held)",
            agent,
            self.token_holders.len(),
            self.settings.token_capacity
        ));
        false
    }

    pub fn release_token(&mut self, agent: Entity) -> bool {
        self.token_holders.remove(&agent)
    }

    pub fn holds_token(&self, agent: Entity) -> bool {
        self.token_holders.contains(&agent)
    }

    pub fn token_holder_count(&self) -> usize {
        self.token_holders.len()
    }

    // ------------------------------------------------------------------------
    // State quotas
    // ------------------------------------------------------------------------

    pub fn quota(&self, state: AIStateKind) -> Option<usize> {
        self.settings
            .state_quotas
            .iter()
            .find(|q| q.state == state)
            .map(|q| q.max)
    }

    pub fn can_enter_state(&self, agent: Entity, state: AIStateKind) -> bool {
        let occupants = self.occupancy.get(&state);
        if occupants.is_some_and(|set| set.contains(&agent)) {
            return true;
        }
        match self.quota(state) {
            Some(max) => occupants.map_or(0, |set| set.len()) < max,
            None => true,
        }
    }

    /// Зарегистрировать агента в состоянии (агент занимает не больше одного состояния)
    pub fn enter_state(&mut self, agent: Entity, state: AIStateKind) -> bool {
        if !self.can_enter_state(agent, state) {
            return false;
        }
        for (kind, occupants) in self.occupancy.iter_mut() {
            if *kind != state {
                occupants.remove(&agent);
            }
        }
        self.occupancy.entry(state).or_default().insert(agent);
        true
    }

    pub fn exit_state(&mut self, agent: Entity, state: AIStateKind) {
        if let Some(occupants) = self.occupancy.get_mut(&state) {
            occupants.remove(&agent);
        }
    }

    pub fn occupants(&self, state: AIStateKind) -> usize {
        self.occupancy.get(&state).map_or(0, |set| set.len())
    }

    /// Fallback для занятого состояния (по умолчанию Pacing)
    pub fn get_alternative_state(&self, state: AIStateKind) -> AIStateKind {
        self.settings
            .state_fallbacks
            .iter()
            .find(|f| f.state == state)
            .map(|f| f.fallback)
            .unwrap_or(AIStateKind::Pacing)
    }

    // ------------------------------------------------------------------------
    // Combat slots
    // ------------------------------------------------------------------------

    fn ensure_slots(&mut self) {
        let count = self.settings.slot_count;
        if self.slots.len() == count {
            return;
        }
        self.slots = (0..count)
            .map(|index| CombatSlot {
                index,
                angle_degrees: index as f32 * 360.0 / count as f32,
                occupant: None,
            })
            .collect();
        for (agent, index) in &self.slot_of {
            if let Some(slot) = self.slots.get_mut(*index) {
                slot.occupant = Some(*agent);
            }
        }
    }

    pub fn slots(&self) -> &[CombatSlot] {
        &self.slots
    }

    pub fn slot_profile(&self, index: usize) -> Option<SlotProfile> {
        let count = self.settings.slot_count;
        if index >= count {
            return None;
        }
        let angle_degrees = index as f32 * 360.0 / count as f32;
        // Отклонение отступления: детерминированная "случайность" от индекса, ±15°
        let retreat_jitter = ((index * 37) % 31) as f32 - 15.0;
        Some(SlotProfile {
            index,
            angle_degrees,
            strafe_direction: if index % 2 == 0 { 1.0 } else { -1.0 },
            radius_offset: self.settings.slot_radius_step * index as f32 / count as f32,
            retreat_direction: direction_from_degrees(angle_degrees + retreat_jitter),
        })
    }

    /// Мировая позиция слота (кольцо следует за целью)
    pub fn slot_world_position(&self, index: usize) -> Option<Vec2> {
        let profile = self.slot_profile(index)?;
        let radius = self.settings.slot_ring_radius + profile.radius_offset;
        Some(self.target_center + direction_from_degrees(profile.angle_degrees) * radius)
    }

    pub fn slot_of(&self, agent: Entity) -> Option<usize> {
        self.slot_of.get(&agent).copied()
    }

    fn is_free(&self, index: usize) -> bool {
        self.slots.get(index).is_some_and(|slot| slot.occupant.is_none())
    }

    /// Ближайший свободный слот (по дистанции агента до мировой позиции слота)
    pub fn assign_slot(&mut self, agent: Entity, agent_position: Vec2) -> Option<usize> {
        if let Some(index) = self.slot_of(agent) {
            return Some(index);
        }
        self.ensure_slots();

        let mut best: Option<(usize, f32)> = None;
        for slot in self.slots.iter().filter(|s| s.occupant.is_none()) {
            let Some(position) = self.slot_world_position(slot.index) else {
                continue;
            };
            let distance = position.distance(agent_position);
            if best.map_or(true, |(_, best_distance)| distance < best_distance) {
                best = Some((slot.index, distance));
            }
        }

        let (index, _) = best?;
        self.occupy(agent, index);
        Some(index)
    }

    fn occupy(&mut self, agent: Entity, index: usize) {
        if let Some(slot) = self.slots.get_mut(index) {
            slot.occupant = Some(agent);
        }
        self.slot_of.insert(agent, index);
    }

    pub fn release_slot(&mut self, agent: Entity) -> Option<usize> {
        let index = self.slot_of.remove(&agent)?;
        if let Some(slot) = self.slots.get_mut(index) {
            if slot.occupant == Some(agent) {
                slot.occupant = None;
            }
        }
        Some(index)
    }

    /// Свободный слот, ближайший к противоположному (для смены угла после атаки)
    pub fn find_opposite_slot(&self, agent: Entity) -> Option<usize> {
        let current = self.slot_of(agent)?;
        let count = self.settings.slot_count;
        let opposite = (current + count / 2) % count;

        (0..=count / 2).find_map(|step| {
            [(opposite + step) % count, (opposite + count - step % count) % count]
                .into_iter()
                .find(|index| *index != current && self.is_free(*index))
        })
    }

    /// Переехать в свободный слот
    pub fn move_to_slot(&mut self, agent: Entity, index: usize) -> bool {
        self.ensure_slots();
        if self.slot_of(agent) == Some(index) {
            return true;
        }
        if !self.is_free(index) {
            return false;
        }
        self.release_slot(agent);
        self.occupy(agent, index);
        true
    }

    /// Обменяться слотами (оба агента должны держать слоты)
    pub fn swap_slots(&mut self, a: Entity, b: Entity) -> bool {
        let (Some(slot_a), Some(slot_b)) = (self.slot_of(a), self.slot_of(b)) else {
            return false;
        };
        self.occupy(a, slot_b);
        self.occupy(b, slot_a);
        true
    }

    // ------------------------------------------------------------------------
    // Awareness
    // ------------------------------------------------------------------------

    pub fn register_aware(&mut self, agent: Entity) -> bool {
        if !self.aware.insert(agent) {
            return false;
        }
        self.notifications.push(AwarenessNotification {
            agent,
            engaged: true,
            aware_count: self.aware.len(),
        });
        true
    }

    pub fn unregister_aware(&mut self, agent: Entity) -> bool {
        if !self.aware.remove(&agent) {
            return false;
        }
        self.notifications.push(AwarenessNotification {
            agent,
            engaged: false,
            aware_count: self.aware.len(),
        });
        true
    }

    pub fn is_aware(&self, agent: Entity) -> bool {
        self.aware.contains(&agent)
    }

    pub fn aware_count(&self) -> usize {
        self.aware.len()
    }

    pub fn drain_notifications(&mut self) -> Vec<AwarenessNotification> {
        std::mem::take(&mut self.notifications)
    }

    // ------------------------------------------------------------------------
    // Retreat sectors
    // ------------------------------------------------------------------------

    fn sector_direction(&self, sector: usize) -> Vec2 {
        let count = self.settings.retreat_sectors.max(1);
        direction_from_degrees(sector as f32 * 360.0 / count as f32)
    }

    /// Зарезервировать сектор отступления, ближайший к preferred. Все заняты → preferred без резерва.
    pub fn reserve_retreat_direction(&mut self, agent: Entity, preferred: Vec2) -> Vec2 {
        let preferred = preferred.try_normalize().unwrap_or(Vec2::X);
        if let Some(&sector) = self.retreat_sector_of.get(&agent) {
            return self.sector_direction(sector);
        }

        let count = self.settings.retreat_sectors;
        if count == 0 {
            return preferred;
        }
        let taken: BTreeSet<usize> = self.retreat_sector_of.values().copied().collect();

        let angle = preferred.y.atan2(preferred.x).to_degrees().rem_euclid(360.0);
        let ideal = (angle / (360.0 / count as f32)).round() as usize % count;

        let free = (0..=count / 2).find_map(|step| {
            [(ideal + step) % count, (ideal + count - step % count) % count]
                .into_iter()
                .find(|sector| !taken.contains(sector))
        });

        match free {
            Some(sector) => {
                self.retreat_sector_of.insert(agent, sector);
                self.sector_direction(sector)
            }
            None => preferred,
        }
    }

    pub fn release_retreat_direction(&mut self, agent: Entity) -> bool {
        self.retreat_sector_of.remove(&agent).is_some()
    }

    pub fn retreat_sector_of(&self, agent: Entity) -> Option<usize> {
        self.retreat_sector_of.get(&agent).copied()
    }

    // ------------------------------------------------------------------------
    // Cleanup
    // ------------------------------------------------------------------------

    /// Вернуть всё, что держит агент (смерть, деактивация пулом)
    pub fn release_all(&mut self, agent: Entity) {
        self.release_token(agent);
        self.release_slot(agent);
        for occupants in self.occupancy.values_mut() {
            occupants.remove(&agent);
        }
        self.unregister_aware(agent);
        self.release_retreat_direction(agent);
    }

    /// Удалить ссылки на агентов, которых нет в `alive`. Возвращает число удалённых агентов.
    pub fn sweep(&mut self, alive: &BTreeSet<Entity>) -> usize {
        let mut known: BTreeSet<Entity> = BTreeSet::new();
        known.extend(self.token_holders.iter().copied());
        known.extend(self.slot_of.keys().copied());
        known.extend(self.occupancy.values().flatten().copied());
        known.extend(self.aware.iter().copied());
        known.extend(self.retreat_sector_of.keys().copied());

        let dead: Vec<Entity> = known.into_iter().filter(|e| !alive.contains(e)).collect();
        for agent in &dead {
            self.release_all(*agent);
        }
        dead.len()
    }
}
