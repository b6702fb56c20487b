//! FSM AI components (state machine, config).
//!
//! Все таймеры состояний — абсолютные deadline'ы (SimClock::now), не счётчики.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

/// Фаза атаки: windup → (проверка дистанции + удар) → recovery
#[derive(Debug, Clone, Copy, PartialEq, Eq, Reflect)]
pub enum AttackPhase {
    Windup,
    Recovery,
}

/// Фаза финта: сближение → разворот в отход
#[derive(Debug, Clone, Copy, PartialEq, Eq, Reflect)]
pub enum FeintPhase {
    Approach,
    Withdraw,
}

/// AI FSM состояния
#[derive(Component, Debug, Clone, PartialEq, Reflect)]
#[reflect(Component)]
pub enum AIState {
    /// Патруль к случайной точке вокруг home
    Patrol {
        point: Vec2,
        /// Сдаёмся и отдыхаем, даже если точка недостижима
        give_up_at: f32,
    },

    /// Пауза между точками патруля
    PatrolIdle { until: f32 },

    /// Реакция на обнаружение (startle)
    Hesitate { until: f32 },

    /// Преследование (по памяти, если цель не видна)
    Chase {
        /// true — прорыв после найденного blind spot / решения exhaustion (без тактической оценки)
        rush: bool,
    },

    /// Окружение через FormationSeek
    Surround,

    /// Атака (token уже выдан)
    Attack {
        phase: AttackPhase,
        phase_ends: f32,
        /// Взгляд заблокирован по доминирующей оси
        facing: Vec2,
    },

    /// Отход после атаки в зарезервированном секторе
    Retreat {
        direction: Vec2,
        min_until: f32,
        max_until: f32,
    },

    /// Бегство на низком здоровье
    Flee,

    /// Оглушение после урона
    Stun { until: f32 },

    /// Осмотр места последнего контакта
    Search {
        point: Vec2,
        until: f32,
        /// Точка достигнута → случайное блуждание
        wandering: bool,
    },

    /// "Окно уязвимости": медленный strafe, без реакции на сближение
    Pacing { until: f32 },

    /// Орбита вокруг цели в поисках слепой зоны
    BlindSpotSeek {
        attempt: u32,
        window_ends: f32,
        /// Направление орбиты (±1), меняется между попытками
        direction: f32,
    },

    /// Ложный выпад
    Feint {
        phase: FeintPhase,
        deadline: f32,
        grace_until: f32,
    },
}

impl Default for AIState {
    fn default() -> Self {
        Self::Patrol {
            point: Vec2::ZERO,
            give_up_at: 0.0,
        }
    }
}

/// Вид состояния без данных (квоты арбитра, логи, телеметрия)
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Reflect,
)]
pub enum AIStateKind {
    Patrol,
    PatrolIdle,
    Hesitate,
    Chase,
    Surround,
    Attack,
    Retreat,
    Flee,
    Stun,
    Search,
    Pacing,
    BlindSpotSeek,
    Feint,
}

impl AIState {
    pub fn kind(&self) -> AIStateKind {
        match self {
            AIState::Patrol { .. } => AIStateKind::Patrol,
            AIState::PatrolIdle { .. } => AIStateKind::PatrolIdle,
            AIState::Hesitate { .. } => AIStateKind::Hesitate,
            AIState::Chase { .. } => AIStateKind::Chase,
            AIState::Surround => AIStateKind::Surround,
            AIState::Attack { .. } => AIStateKind::Attack,
            AIState::Retreat { .. } => AIStateKind::Retreat,
            AIState::Flee => AIStateKind::Flee,
            AIState::Stun { .. } => AIStateKind::Stun,
            AIState::Search { .. } => AIStateKind::Search,
            AIState::Pacing { .. } => AIStateKind::Pacing,
            AIState::BlindSpotSeek { .. } => AIStateKind::BlindSpotSeek,
            AIState::Feint { .. } => AIStateKind::Feint,
        }
    }
}

impl AIStateKind {
    /// Агент в бою с целью (регистрируется как aware)
    pub fn is_engaged(self) -> bool {
        matches!(
            self,
            AIStateKind::Chase
                | AIStateKind::Surround
                | AIStateKind::Attack
                | AIStateKind::Retreat
                | AIStateKind::Flee
                | AIStateKind::Pacing
                | AIStateKind::BlindSpotSeek
                | AIStateKind::Feint
        )
    }

    /// Тактический манёвр (стоит stamina, под квотой)
    pub fn is_tactical(self) -> bool {
        matches!(self, AIStateKind::BlindSpotSeek | AIStateKind::Feint)
    }

    /// Уклонение (общий flee-exhaustion таймер)
    pub fn is_evasive(self) -> bool {
        matches!(self, AIStateKind::Retreat | AIStateKind::Pacing | AIStateKind::Flee)
    }

    /// Цель потеряна → выход из боя
    pub fn is_disengaged(self) -> bool {
        matches!(self, AIStateKind::Patrol | AIStateKind::PatrolIdle | AIStateKind::Search)
    }
}

/// Параметры AI (все — тюнинг, приходят из ArenaConfig)
#[derive(Component, Debug, Clone, PartialEq, Reflect, Serialize, Deserialize)]
#[reflect(Component)]
#[serde(default)]
pub struct AIConfig {
    // --- Perception ---
    pub detection_range: f32,
    /// Видимая цель дальше этого теряется даже при LOS
    pub lose_sight_range: f32,
    pub use_vision_cone: bool,
    /// Полный угол конуса зрения (градусы)
    pub vision_cone_degrees: f32,
    /// Startle: Hesitate → Chase
    pub reaction_delay: f32,

    // --- Memory / Search ---
    pub memory_duration: f32,
    /// Экстраполяция last known позиции вдоль скорости (секунды)
    pub memory_extrapolation: f32,
    /// Ближе этого к last known точке агент стоит и ждёт
    pub memory_arrival_radius: f32,
    pub search_duration: f32,

    // --- Patrol ---
    pub patrol_radius: f32,
    pub patrol_timeout: f32,
    pub patrol_idle_duration: f32,
    pub patrol_speed_scale: f32,
    pub arrival_tolerance: f32,

    // --- BlindSpotSeek ---
    pub blind_spot_orbit_radius: f32,
    /// dot(facing цели, цель→агент) ниже порога = rear arc
    pub blind_spot_rear_dot: f32,
    /// Rear arc занят, если другой агент ближе этого к агенту
    pub blind_spot_occupied_radius: f32,
    pub blind_spot_attempt_duration: f32,
    pub blind_spot_max_attempts: u32,

    // --- Feint ---
    pub feint_close_distance: f32,
    pub feint_withdraw_duration: f32,
    pub feint_grace: f32,
    pub feint_timeout: f32,

    // --- Retreat / Pacing ---
    /// Дистанция до цели (surface), после которой отход можно завершать
    pub retreat_min_distance: f32,
    pub retreat_min_duration: f32,
    pub retreat_max_duration: f32,
    pub post_attack_retreat_chance: f32,
    /// Шанс сменить слот на противоположный после атаки
    pub post_attack_reposition_chance: f32,
    pub pacing_duration: f32,
    pub pacing_speed_scale: f32,
    pub forced_counter_distance: f32,
    /// Cornered: измеренная скорость ниже порога дольше cornered_duration
    pub cornered_speed: f32,
    pub cornered_duration: f32,

    // --- Flee / exhaustion ---
    pub flee_health_threshold: f32,
    pub flee_safe_distance: f32,
    /// Максимум непрерывного уклонения (Retreat/Pacing/Flee)
    pub flee_exhaustion_duration: f32,
    pub exhaustion_attack_weight: f32,
    pub exhaustion_tactical_weight: f32,
    pub exhaustion_stand_weight: f32,

    // --- Stun / Surround ---
    pub stun_duration: f32,
    pub formation_tolerance: f32,

    // --- Stuck ---
    pub stuck_distance: f32,
    pub stuck_window: f32,
    pub stuck_impulse: f32,

    /// Сколько труп лежит до деспавна
    pub corpse_linger: f32,
}

impl Default for AIConfig {
    fn default() -> Self {
        Self {
            detection_range: 10.0,
            lose_sight_range: 16.0,
            use_vision_cone: false,
            vision_cone_degrees: 140.0,
            reaction_delay: 0.4,

            memory_duration: 3.0,
            memory_extrapolation: 0.5,
            memory_arrival_radius: 1.0,
            search_duration: 4.0,

            patrol_radius: 6.0,
            patrol_timeout: 8.0,
            patrol_idle_duration: 1.5,
            patrol_speed_scale: 0.5,
            arrival_tolerance: 0.5,

            blind_spot_orbit_radius: 2.0,
            blind_spot_rear_dot: -0.5,
            blind_spot_occupied_radius: 1.0,
            blind_spot_attempt_duration: 1.5,
            blind_spot_max_attempts: 3,

            feint_close_distance: 1.5,
            feint_withdraw_duration: 0.8,
            feint_grace: 0.25,
            feint_timeout: 3.0,

            retreat_min_distance: 3.0,
            retreat_min_duration: 0.8,
            retreat_max_duration: 3.0,
            post_attack_retreat_chance: 0.3,
            post_attack_reposition_chance: 0.3,
            pacing_duration: 2.0,
            pacing_speed_scale: 0.35,
            forced_counter_distance: 1.5,
            cornered_speed: 0.2,
            cornered_duration: 0.6,

            flee_health_threshold: 0.25,
            flee_safe_distance: 12.0,
            flee_exhaustion_duration: 5.0,
            exhaustion_attack_weight: 0.5,
            exhaustion_tactical_weight: 0.3,
            exhaustion_stand_weight: 0.2,

            stun_duration: 0.5,
            formation_tolerance: 0.6,

            stuck_distance: 0.15,
            stuck_window: 1.0,
            stuck_impulse: 2.0,

            corpse_linger: 1.0,
        }
    }
}
