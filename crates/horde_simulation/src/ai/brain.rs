//! Brain — чистая логика переходов FSM (без ECS-запросов)
//!
//! Система `ai_fsm_transitions` собирает Brain из компонентов агента и общих ресурсов,
//! вызывает `update` и применяет результат (новое состояние + действия).
//!
//! Любая смена вида состояния проходит через `change`: сначала exit-хуки старого
//! (вернуть token/слот/квоту/сектор отступления), потом enter-хуки нового.
//! Отказ арбитра на входе — не ошибка: агент уходит в fallback-состояние.

use bevy::prelude::*;
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use std::f32::consts::TAU;

use crate::combat::{CombatArbiter, CombatBookkeeping, TacticalChoice, TacticalModel, TacticalSettings, TacticsModule};
use crate::components::Stamina;
use crate::shared::dominant_axis;
use crate::steering::FormationRegistry;

use super::components::{AIConfig, AIState, AIStateKind, AgentMemory, AttackPhase, FeintPhase, Perception};
use super::events::AnimationKind;

/// Сколько раз подряд можно уйти в fallback при отказах на входе
const MAX_FALLBACK_DEPTH: usize = 4;

/// Действие, которое ECS-слой выполняет после решения
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BrainAction {
    /// Удар после windup'а (→ DamageDealt)
    Strike {
        target: Entity,
        amount: u32,
        knockback: Vec2,
    },
    Animation(AnimationKind),
    /// Token не выдан, агент перенаправлен
    TokenDenied(AIStateKind),
}

/// Свежий патруль: равномерная точка в круге patrol_radius вокруг home
pub fn patrol_state(home: Vec2, config: &AIConfig, now: f32, rng: &mut impl Rng) -> AIState {
    let angle = rng.gen_range(0.0..TAU);
    let distance = config.patrol_radius * rng.gen::<f32>().sqrt();
    AIState::Patrol {
        point: home + Vec2::from_angle(angle) * distance,
        give_up_at: now + config.patrol_timeout,
    }
}

pub struct Brain<'a> {
    pub entity: Entity,
    pub now: f32,
    pub position: Vec2,
    pub health_percent: f32,
    /// Получен урон (pending stun)
    pub staggered: bool,
    pub cornered: bool,
    /// Путь текущего режима пройден (Patrol/Search)
    pub arrived: bool,
    pub perception: &'a Perception,
    pub config: &'a AIConfig,
    pub tactics: &'a dyn TacticsModule,
    pub tactical_settings: &'a TacticalSettings,
    /// Остальные агенты (rear arc occupancy)
    pub others: &'a [(Entity, Vec2)],
    pub memory: &'a mut AgentMemory,
    pub tactical: &'a mut TacticalModel,
    pub stamina: &'a mut Stamina,
    pub book: &'a mut CombatBookkeeping,
    pub arbiter: &'a mut CombatArbiter,
    pub formations: &'a mut FormationRegistry,
    pub rng: &'a mut ChaCha8Rng,
    pub actions: Vec<BrainAction>,
}

impl<'a> Brain<'a> {
    /// Начальное состояние (спавн/активация)
    pub fn initial_state(&mut self) -> AIState {
        self.fresh_patrol()
    }

    /// Один тик FSM. Some(state) — состояние изменилось (в т.ч. внутри того же вида).
    pub fn update(&mut self, state: &AIState) -> Option<AIState> {
        let kind = state.kind();
        let p = self.perception;

        if p.tracking {
            self.memory
                .remember(p.target_position, p.target_velocity, self.now, self.config.memory_duration);
        }

        // Цели нет (мертва/удалена) → безопасное состояние
        if !p.has_target() {
            if kind.is_engaged() || matches!(kind, AIStateKind::Hesitate | AIStateKind::Stun) {
                return Some(self.change(state, AIStateKind::Patrol));
            }
            return self.update_idle_states(state);
        }

        if self.staggered && kind != AIStateKind::Stun {
            return Some(self.change(state, AIStateKind::Stun));
        }

        if kind.is_engaged()
            && !matches!(kind, AIStateKind::Flee | AIStateKind::Attack)
            && !self.memory.has_fled
            && self.health_percent < self.config.flee_health_threshold
        {
            return Some(self.change(state, AIStateKind::Flee));
        }

        if kind.is_evasive() {
            if let Some(started) = self.memory.evasion_started_at {
                if self.now - started > self.config.flee_exhaustion_duration {
                    return Some(self.resolve_exhaustion(state));
                }
            }
        }

        match *state {
            AIState::Patrol { .. } | AIState::PatrolIdle { .. } => {
                if p.detected {
                    return Some(self.change(state, AIStateKind::Hesitate));
                }
                self.update_idle_states(state)
            }
            AIState::Hesitate { until } => {
                (self.now >= until).then(|| self.change_to(state, AIState::Chase { rush: false }))
            }
            AIState::Chase { rush } => self.update_chase(state, rush),
            AIState::Surround => self.update_surround(state),
            AIState::Attack { phase, phase_ends, facing } => self.update_attack(state, phase, phase_ends, facing),
            AIState::Retreat { min_until, max_until, .. } => {
                if self.cornered {
                    return Some(self.change_to(state, AIState::Chase { rush: false }));
                }
                let separated = p.surface_distance >= self.config.retreat_min_distance;
                let done = (separated && self.now >= min_until) || self.now >= max_until;
                done.then(|| self.change(state, AIStateKind::Pacing))
            }
            AIState::Flee => {
                (p.distance >= self.config.flee_safe_distance).then(|| self.change(state, AIStateKind::Pacing))
            }
            AIState::Pacing { until } => {
                let counter = p.surface_distance <= self.config.forced_counter_distance;
                (counter || self.cornered || self.now >= until)
                    .then(|| self.change_to(state, AIState::Chase { rush: false }))
            }
            AIState::Stun { until } => {
                if self.now < until {
                    return None;
                }
                if p.distance <= self.config.detection_range {
                    Some(self.change_to(state, AIState::Chase { rush: false }))
                } else {
                    Some(self.change(state, AIStateKind::Patrol))
                }
            }
            AIState::Search { .. } => {
                if p.detected {
                    return Some(self.change_to(state, AIState::Chase { rush: false }));
                }
                self.update_idle_states(state)
            }
            AIState::BlindSpotSeek { attempt, window_ends, direction } => {
                self.update_blind_spot(state, attempt, window_ends, direction)
            }
            AIState::Feint { phase, deadline, grace_until } => self.update_feint(state, phase, deadline, grace_until),
        }
    }

    /// Patrol/PatrolIdle/Search: таймеры без участия цели
    fn update_idle_states(&mut self, state: &AIState) -> Option<AIState> {
        match *state {
            AIState::Patrol { give_up_at, .. } => {
                (self.arrived || self.now >= give_up_at).then(|| self.change(state, AIStateKind::PatrolIdle))
            }
            AIState::PatrolIdle { until } => (self.now >= until).then(|| self.change(state, AIStateKind::Patrol)),
            AIState::Search { point, until, wandering } => {
                if self.now >= until {
                    return Some(self.change(state, AIStateKind::Patrol));
                }
                (!wandering && self.arrived).then_some(AIState::Search {
                    point,
                    until,
                    wandering: true,
                })
            }
            _ => None,
        }
    }

    fn update_chase(&mut self, state: &AIState, rush: bool) -> Option<AIState> {
        let p = self.perception;

        if !p.tracking {
            // Память: идём/стоим у last known точки, Search только строго после expiry
            return self
                .memory
                .expired(self.now)
                .then(|| self.change(state, AIStateKind::Search));
        }

        let surface = p.surface_distance;
        if surface <= self.tactics.strike_range() {
            if !self.book.attack_ready(self.now, self.tactics.cooldown()) {
                return None;
            }
            return Some(self.try_attack(state, rush));
        }

        if rush || surface > self.tactics.engagement_range() || !self.tactical.decision_ready(self.now) {
            return None;
        }

        // Точка решения: агрессия vs манёвр
        self.tactical.schedule_next_decision(self.now);
        let mut choice = self.tactical.roll(&mut *self.rng);
        if choice == TacticalChoice::Tactical && !self.stamina.can_afford(self.tactical_settings.tactical_stamina_cost) {
            choice = TacticalChoice::Aggressive;
        }
        self.tactical.record_choice(choice);

        match choice {
            TacticalChoice::Tactical => {
                let maneuver = self.pick_maneuver();
                Some(self.change(state, maneuver))
            }
            TacticalChoice::Aggressive => {
                let surround = self.formations.is_configured()
                    && self.arbiter.can_enter_state(self.entity, AIStateKind::Surround);
                surround.then(|| self.change(state, AIStateKind::Surround))
            }
        }
    }

    /// Запрос attack token'а. Отказ → тактический fallback (rush — давит дальше).
    fn try_attack(&mut self, state: &AIState, rush: bool) -> AIState {
        if self.arbiter.request_token(self.entity) {
            self.book.holds_token = true;
            return self.change(state, AIStateKind::Attack);
        }

        // Rush: не уходим в манёвр, повторим запрос на следующем тике
        if rush {
            return state.clone();
        }

        let maneuver = self.pick_maneuver();
        let next = self.change(state, maneuver);
        self.actions.push(BrainAction::TokenDenied(next.kind()));
        crate::logger::log(&format!(
            "Arbiter: attack token denied for {:?} → {:?}",
            self.entity,
            next.kind()
        ));
        next
    }

    fn update_surround(&mut self, state: &AIState) -> Option<AIState> {
        let p = self.perception;
        if !p.tracking {
            return Some(self.change_to(state, AIState::Chase { rush: false }));
        }

        let Some(slot) = self.formations.slot_position(self.entity, p.target_position, p.target_facing) else {
            return Some(self.change_to(state, AIState::Chase { rush: false }));
        };
        if self.position.distance(slot) > self.config.formation_tolerance {
            return None;
        }

        if p.surface_distance <= self.tactics.strike_range() {
            if self.book.attack_ready(self.now, self.tactics.cooldown())
                && self.arbiter.request_token(self.entity)
            {
                self.book.holds_token = true;
                return Some(self.change(state, AIStateKind::Attack));
            }
            return None;
        }

        // В позиции, но цель вне досягаемости → рывок
        Some(self.change_to(state, AIState::Chase { rush: true }))
    }

    fn update_attack(&mut self, state: &AIState, phase: AttackPhase, phase_ends: f32, facing: Vec2) -> Option<AIState> {
        if self.now < phase_ends {
            return None;
        }

        match phase {
            AttackPhase::Windup => {
                let p = self.perception;
                // Цель успела уйти за время windup'а — удар мимо
                if let Some(target) = p.target.filter(|_| p.surface_distance <= self.tactics.strike_range()) {
                    self.actions.push(BrainAction::Strike {
                        target,
                        amount: self.tactics.damage(),
                        knockback: p.direction_to_target(self.position) * self.tactics.knockback(),
                    });
                    self.tactical.on_successful_attack();
                }
                self.book.last_attack_at = Some(self.now);
                Some(AIState::Attack {
                    phase: AttackPhase::Recovery,
                    phase_ends: self.now + self.tactics.recovery(),
                    facing,
                })
            }
            AttackPhase::Recovery => {
                if self.rng.gen::<f32>() < self.config.post_attack_reposition_chance {
                    self.reposition_slot();
                }
                if self.rng.gen::<f32>() < self.config.post_attack_retreat_chance {
                    Some(self.change(state, AIStateKind::Retreat))
                } else {
                    Some(self.change_to(state, AIState::Chase { rush: false }))
                }
            }
        }
    }

    fn update_blind_spot(&mut self, state: &AIState, attempt: u32, window_ends: f32, direction: f32) -> Option<AIState> {
        let p = self.perception;
        if !p.tracking {
            return Some(self.change_to(state, AIState::Chase { rush: false }));
        }

        if self.in_rear_arc(self.position) && !self.rear_arc_occupied() {
            crate::logger::log(&format!("BlindSpotSeek: {:?} found blind spot, rushing", self.entity));
            return Some(self.change_to(state, AIState::Chase { rush: true }));
        }

        if self.now < window_ends {
            return None;
        }

        let next_attempt = attempt + 1;
        if next_attempt >= self.config.blind_spot_max_attempts {
            return Some(self.change_to(state, AIState::Chase { rush: false }));
        }
        Some(AIState::BlindSpotSeek {
            attempt: next_attempt,
            window_ends: self.now + self.config.blind_spot_attempt_duration,
            direction: -direction,
        })
    }

    fn update_feint(&mut self, state: &AIState, phase: FeintPhase, deadline: f32, grace_until: f32) -> Option<AIState> {
        let p = self.perception;
        if !p.tracking {
            return Some(self.change_to(state, AIState::Chase { rush: false }));
        }

        match phase {
            FeintPhase::Approach => {
                if p.surface_distance <= self.config.feint_close_distance {
                    return Some(AIState::Feint {
                        phase: FeintPhase::Withdraw,
                        deadline: self.now + self.config.feint_withdraw_duration,
                        grace_until: self.now + self.config.feint_grace,
                    });
                }
                // Safety timeout: так и не подошли
                (self.now >= deadline).then(|| self.change_to(state, AIState::Chase { rush: false }))
            }
            FeintPhase::Withdraw => {
                if self.now < grace_until {
                    return None;
                }
                let counter = p.surface_distance <= self.config.forced_counter_distance;
                (counter || self.now >= deadline).then(|| self.change_to(state, AIState::Chase { rush: false }))
            }
        }
    }

    /// Flee exhaustion: принудительное решение (атака / манёвр / встать на месте)
    fn resolve_exhaustion(&mut self, state: &AIState) -> AIState {
        let c = self.config;
        let total = c.exhaustion_attack_weight + c.exhaustion_tactical_weight + c.exhaustion_stand_weight;
        let roll = self.rng.gen::<f32>() * total;

        crate::logger::log(&format!(
            "Flee exhaustion: {:?} evaded for {:.1}s, forcing resolution",
            self.entity,
            self.now - self.memory.evasion_started_at.unwrap_or(self.now)
        ));

        if total <= 0.0 || roll < c.exhaustion_attack_weight {
            self.change_to(state, AIState::Chase { rush: true })
        } else if roll < c.exhaustion_attack_weight + c.exhaustion_tactical_weight {
            let maneuver = self.pick_maneuver();
            self.change(state, maneuver)
        } else {
            // Stand ground: короткая пауза лицом к цели, потом Chase
            self.change(state, AIStateKind::Hesitate)
        }
    }

    // ------------------------------------------------------------------------
    // Переходы
    // ------------------------------------------------------------------------

    /// Сменить состояние на свежее состояние вида `kind`
    pub fn change(&mut self, from: &AIState, kind: AIStateKind) -> AIState {
        self.exit(from.kind(), kind);
        self.enter_with_fallback(kind)
    }

    /// Сменить состояние на заданное (Chase { rush } и т.п.)
    pub fn change_to(&mut self, from: &AIState, to: AIState) -> AIState {
        if from.kind() == to.kind() {
            return to;
        }
        self.exit(from.kind(), to.kind());
        match self.enter(to.kind()) {
            Some(_) => to,
            None => self.enter_with_fallback(self.arbiter.get_alternative_state(to.kind())),
        }
    }

    fn enter_with_fallback(&mut self, kind: AIStateKind) -> AIState {
        let mut candidate = kind;
        for _ in 0..MAX_FALLBACK_DEPTH {
            if let Some(state) = self.enter(candidate) {
                return state;
            }
            let fallback = self.arbiter.get_alternative_state(candidate);
            crate::logger::log(&format!(
                "Arbiter: {:?} denied {:?}, fallback {:?}",
                self.entity, candidate, fallback
            ));
            candidate = fallback;
        }
        // Chase не под квотой — вход всегда успешен
        self.enter(AIStateKind::Chase).unwrap_or(AIState::Chase { rush: false })
    }

    /// Exit-хуки: вернуть всё, что держало старое состояние
    fn exit(&mut self, from: AIStateKind, to: AIStateKind) {
        match from {
            AIStateKind::Attack => {
                self.arbiter.release_token(self.entity);
                self.book.holds_token = false;
            }
            AIStateKind::Retreat => {
                self.arbiter.release_retreat_direction(self.entity);
                self.book.retreat_reserved = false;
            }
            AIStateKind::Surround => {
                self.arbiter.exit_state(self.entity, from);
                self.formations.release(self.entity);
            }
            AIStateKind::BlindSpotSeek | AIStateKind::Feint => {
                self.arbiter.exit_state(self.entity, from);
            }
            _ => {}
        }

        if to.is_disengaged() {
            if self.book.aware {
                self.arbiter.unregister_aware(self.entity);
                self.book.aware = false;
            }
            self.arbiter.release_slot(self.entity);
            self.book.assigned_slot = None;
        }
        if to == AIStateKind::Patrol {
            self.memory.forget();
            self.memory.has_fled = false;
        }
        if !to.is_evasive() {
            self.memory.evasion_started_at = None;
        }
    }

    /// Enter-хуки. None — вход запрещён (квота, stamina, нет формации, нет token'а).
    fn enter(&mut self, kind: AIStateKind) -> Option<AIState> {
        let now = self.now;
        let c = self.config;

        match kind {
            AIStateKind::BlindSpotSeek | AIStateKind::Feint => {
                let cost = self.tactical_settings.tactical_stamina_cost;
                if !self.arbiter.can_enter_state(self.entity, kind) || !self.stamina.consume(cost) {
                    return None;
                }
                self.arbiter.enter_state(self.entity, kind);
            }
            AIStateKind::Surround => {
                if !self.formations.is_configured() || !self.arbiter.can_enter_state(self.entity, kind) {
                    return None;
                }
                self.formations.lease(self.entity)?;
                self.arbiter.enter_state(self.entity, kind);
            }
            AIStateKind::Attack => {
                if !self.arbiter.request_token(self.entity) {
                    return None;
                }
                self.book.holds_token = true;
            }
            _ => {}
        }

        if kind.is_engaged() {
            if !self.book.aware {
                self.book.aware = self.arbiter.register_aware(self.entity) || self.arbiter.is_aware(self.entity);
            }
            if self.book.assigned_slot.is_none() {
                self.book.assigned_slot = self.arbiter.assign_slot(self.entity, self.position);
            }
        }
        if kind.is_evasive() {
            self.memory.evasion_started_at.get_or_insert(now);
        }

        let state = match kind {
            AIStateKind::Patrol => self.fresh_patrol(),
            AIStateKind::PatrolIdle => AIState::PatrolIdle {
                until: now + c.patrol_idle_duration,
            },
            AIStateKind::Hesitate => AIState::Hesitate {
                until: now + c.reaction_delay,
            },
            AIStateKind::Chase => AIState::Chase { rush: false },
            AIStateKind::Surround => AIState::Surround,
            AIStateKind::Attack => {
                let to_target = self.perception.target_position - self.position;
                let facing = dominant_axis(to_target, Vec2::X);
                self.actions.push(BrainAction::Animation(AnimationKind::PlayAttack));
                self.actions.push(BrainAction::Animation(AnimationKind::SetFacing(facing)));
                AIState::Attack {
                    phase: AttackPhase::Windup,
                    phase_ends: now + self.tactics.windup(),
                    facing,
                }
            }
            AIStateKind::Retreat => {
                let away = (self.position - self.perception.target_position).normalize_or(Vec2::X);
                let preferred = self
                    .book
                    .assigned_slot
                    .and_then(|index| self.arbiter.slot_profile(index))
                    .map(|profile| profile.retreat_direction)
                    .filter(|dir| dir.dot(away) > 0.0)
                    .unwrap_or(away);
                let direction = self.arbiter.reserve_retreat_direction(self.entity, preferred);
                self.book.retreat_reserved = self.arbiter.retreat_sector_of(self.entity).is_some();
                AIState::Retreat {
                    direction,
                    min_until: now + c.retreat_min_duration,
                    max_until: now + c.retreat_max_duration,
                }
            }
            AIStateKind::Flee => {
                self.memory.has_fled = true;
                AIState::Flee
            }
            AIStateKind::Stun => {
                self.actions.push(BrainAction::Animation(AnimationKind::PlayStun));
                AIState::Stun {
                    until: now + c.stun_duration,
                }
            }
            AIStateKind::Search => AIState::Search {
                point: self
                    .memory
                    .extrapolated(c.memory_extrapolation)
                    .unwrap_or(self.position),
                until: now + c.search_duration,
                wandering: false,
            },
            AIStateKind::Pacing => AIState::Pacing {
                until: now + c.pacing_duration,
            },
            AIStateKind::BlindSpotSeek => AIState::BlindSpotSeek {
                attempt: 0,
                window_ends: now + c.blind_spot_attempt_duration,
                direction: self.slot_strafe_direction(),
            },
            AIStateKind::Feint => AIState::Feint {
                phase: FeintPhase::Approach,
                deadline: now + c.feint_timeout,
                grace_until: now,
            },
        };
        Some(state)
    }

    // ------------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------------

    fn fresh_patrol(&mut self) -> AIState {
        patrol_state(self.memory.home, self.config, self.now, &mut *self.rng)
    }

    /// BlindSpotSeek или Feint (50/50); квоты проверит enter
    fn pick_maneuver(&mut self) -> AIStateKind {
        if self.rng.gen_bool(0.5) {
            AIStateKind::BlindSpotSeek
        } else {
            AIStateKind::Feint
        }
    }

    fn slot_strafe_direction(&self) -> f32 {
        self.book
            .assigned_slot
            .and_then(|index| self.arbiter.slot_profile(index))
            .map_or(1.0, |profile| profile.strafe_direction)
    }

    /// dot(facing цели, цель→точка) ниже порога
    fn in_rear_arc(&self, point: Vec2) -> bool {
        let p = self.perception;
        let Some(to_point) = (point - p.target_position).try_normalize() else {
            return false;
        };
        p.target_facing.dot(to_point) < self.config.blind_spot_rear_dot
    }

    fn rear_arc_occupied(&self) -> bool {
        self.others.iter().any(|&(other, position)| {
            other != self.entity
                && position.distance(self.position) <= self.config.blind_spot_occupied_radius
                && self.in_rear_arc(position)
        })
    }

    /// Смена слота на противоположный (визуальное разнообразие после атаки)
    fn reposition_slot(&mut self) {
        let Some(opposite) = self.arbiter.find_opposite_slot(self.entity) else {
            return;
        };
        if self.arbiter.move_to_slot(self.entity, opposite) {
            self.book.assigned_slot = Some(opposite);
        }
    }
}
