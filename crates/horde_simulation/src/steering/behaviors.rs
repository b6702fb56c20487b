//! Steering behaviors — независимые генераторы силы
//!
//! Каждое поведение: `compute(&mut self, ctx) -> Vec2` (желаемая steering-сила).
//! Вычисление чистое относительно мира (только чтение ctx); &mut self нужен
//! лишь для внутреннего состояния (угол wander).
//!
//! Вес и enabled флаг меняет MovementController, не само поведение.

use bevy::prelude::*;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::f32::consts::TAU;

use crate::navigation::{ColliderId, CollisionLayers, NavigationGrid, SpatialQuery};
use crate::shared::rotate;

use super::formation::FormationRegistry;
use super::SteeringSettings;

/// Кинематический профиль агента (лимиты движения + персональные параметры)
#[derive(Component, Debug, Clone, Reflect)]
#[reflect(Component)]
pub struct SteeringAgent {
    pub max_speed: f32,
    pub max_acceleration: f32,
    /// Радиус тела
    pub radius: f32,
    /// Доля скорости, теряемая за секунду
    pub drag: f32,
    /// Чем больше, тем раньше агент уступает дорогу
    pub instance_priority: u32,
    /// ±1: в какую сторону "соскальзывать" при лобовом расхождении (фиксирован на спавне)
    pub slip_bias: f32,
    /// Множитель скорости от усталости (1.0 = без штрафа)
    pub speed_multiplier: f32,
}

impl Default for SteeringAgent {
    fn default() -> Self {
        Self {
            max_speed: 4.0,
            max_acceleration: 20.0,
            radius: 0.4,
            drag: 0.5,
            instance_priority: 0,
            slip_bias: 1.0,
            speed_multiplier: 1.0,
        }
    }
}

impl SteeringAgent {
    pub fn from_settings(settings: &SteeringSettings, instance_priority: u32, slip_bias: f32) -> Self {
        Self {
            max_speed: settings.max_speed,
            max_acceleration: settings.max_acceleration,
            radius: settings.agent_radius,
            drag: settings.drag,
            instance_priority,
            slip_bias: if slip_bias < 0.0 { -1.0 } else { 1.0 },
            speed_multiplier: 1.0,
        }
    }
}

/// Snapshot соседа для separation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NeighborInfo {
    pub entity: Entity,
    pub position: Vec2,
    pub velocity: Vec2,
    pub radius: f32,
    pub faction_id: u64,
    pub instance_priority: u32,
    /// Сосед в режиме удержания позиции (Hold/Idle)
    pub is_static: bool,
}

/// Состояние агента на момент вычисления сил
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AgentKinematics {
    pub entity: Entity,
    pub position: Vec2,
    pub velocity: Vec2,
    pub facing: Vec2,
    pub faction_id: u64,
}

/// Всё, что поведение может читать из мира
pub struct SteeringContext<'a> {
    pub agent: AgentKinematics,
    pub params: &'a SteeringAgent,
    pub spatial: &'a dyn SpatialQuery,
    pub grid: &'a NavigationGrid,
    pub neighbors: &'a [NeighborInfo],
    /// Тело цели (попадания в него не считаются опасностью)
    pub target_body: Option<Entity>,
    pub formations: &'a FormationRegistry,
    pub dt: f32,
}

impl SteeringContext<'_> {
    /// Максимальная скорость с учётом усталости
    pub fn speed_limit(&self) -> f32 {
        self.params.max_speed * self.params.speed_multiplier
    }
}

pub trait SteeringBehavior {
    fn name(&self) -> &'static str;
    fn weight(&self) -> f32;
    fn is_enabled(&self) -> bool;
    fn compute(&mut self, ctx: &SteeringContext) -> Vec2;
}

/// Классический seek: desired - velocity, с затуханием внутри arrival_radius
pub fn seek_force(ctx: &SteeringContext, target: Vec2, arrival_radius: f32) -> Vec2 {
    let to_target = target - ctx.agent.position;
    let distance = to_target.length();
    if distance < 1e-3 {
        return -ctx.agent.velocity;
    }

    let mut speed = ctx.speed_limit();
    if arrival_radius > 0.0 && distance < arrival_radius {
        speed *= distance / arrival_radius;
    }
    to_target / distance * speed - ctx.agent.velocity
}

// ============================================================================
// Seek
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct Seek {
    pub weight: f32,
    pub enabled: bool,
    pub target: Option<Vec2>,
    /// 0 = без arrival damping
    pub arrival_radius: f32,
}

impl SteeringBehavior for Seek {
    fn name(&self) -> &'static str {
        "seek"
    }

    fn weight(&self) -> f32 {
        self.weight
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn compute(&mut self, ctx: &SteeringContext) -> Vec2 {
        match self.target {
            Some(target) => seek_force(ctx, target, self.arrival_radius),
            None => Vec2::ZERO,
        }
    }
}

// ============================================================================
// Flee
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct Flee {
    pub weight: f32,
    pub enabled: bool,
    pub threat: Option<Vec2>,
    /// Активно только ближе этой дистанции
    pub panic_distance: f32,
    /// Персональное направление ухода (разводит убегающих агентов)
    pub bias: Vec2,
    /// 0..1: доля bias в итоговом направлении
    pub bias_weight: f32,
}

impl SteeringBehavior for Flee {
    fn name(&self) -> &'static str {
        "flee"
    }

    fn weight(&self) -> f32 {
        self.weight
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn compute(&mut self, ctx: &SteeringContext) -> Vec2 {
        let Some(threat) = self.threat else {
            return Vec2::ZERO;
        };
        let away = ctx.agent.position - threat;
        if away.length() > self.panic_distance {
            return Vec2::ZERO;
        }

        let pure = away.try_normalize().unwrap_or(ctx.agent.facing * -1.0);
        let blend = self.bias_weight.clamp(0.0, 1.0);
        let direction = (pure * (1.0 - blend) + self.bias.normalize_or_zero() * blend)
            .try_normalize()
            .unwrap_or(pure);

        direction * ctx.speed_limit() - ctx.agent.velocity
    }
}

// ============================================================================
// Wander
// ============================================================================

#[derive(Debug, Clone)]
pub struct Wander {
    pub weight: f32,
    pub enabled: bool,
    /// Дистанция проекции круга перед агентом
    pub distance: f32,
    pub radius: f32,
    /// Максимальное изменение угла (радиан/сек)
    pub jitter: f32,
    pub angle: f32,
    rng: ChaCha8Rng,
}

impl Wander {
    pub fn new(distance: f32, radius: f32, jitter: f32, seed: u64) -> Self {
        Self {
            weight: 1.0,
            enabled: false,
            distance,
            radius,
            jitter,
            angle: 0.0,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }
}

impl SteeringBehavior for Wander {
    fn name(&self) -> &'static str {
        "wander"
    }

    fn weight(&self) -> f32 {
        self.weight
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn compute(&mut self, ctx: &SteeringContext) -> Vec2 {
        self.angle += self.rng.gen_range(-1.0_f32..=1.0) * self.jitter * ctx.dt;

        let heading = ctx
            .agent
            .velocity
            .try_normalize()
            .unwrap_or(ctx.agent.facing);
        let circle_center = ctx.agent.position + heading * self.distance;
        let point = circle_center + rotate(heading, self.angle) * self.radius;

        seek_force(ctx, point, 0.0)
    }
}

// ============================================================================
// ObstacleAvoidance (context steering)
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct ObstacleAvoidance {
    pub weight: f32,
    pub enabled: bool,
    pub ray_count: usize,
    pub detection_distance: f32,
    pub interest_weight: f32,
    pub danger_weight: f32,
    pub mask: CollisionLayers,
    /// Куда агент хочет идти (None — по текущей скорости)
    pub desired_direction: Option<Vec2>,
}

/// Результат оценки лучей (для тестов и отладки)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContextChoice {
    pub direction: Vec2,
    pub max_danger: f32,
}

impl ObstacleAvoidance {
    /// Направление i-го луча (равномерно по кругу, луч 0 = +X)
    pub fn ray_direction(&self, index: usize) -> Vec2 {
        let step = TAU / self.ray_count.max(1) as f32;
        rotate(Vec2::X, step * index as f32)
    }

    /// Опасность луча: 1 - d/D для первого значимого попадания, иначе 0
    fn ray_danger(&self, ctx: &SteeringContext, direction: Vec2) -> f32 {
        let Some(hit) = ctx.spatial.raycast(
            ctx.agent.position,
            direction,
            self.detection_distance,
            self.mask,
        ) else {
            return 0.0;
        };

        if let (ColliderId::Body(entity), Some(target)) = (hit.collider, ctx.target_body) {
            if entity == target {
                return 0.0;
            }
        }

        // Попадание в клетку, которую grid считает проходимой (мелкий проп) — не препятствие
        let probe = hit.point + direction * 0.05;
        if ctx.grid.is_walkable_world(probe) {
            return 0.0;
        }

        (1.0 - hit.distance / self.detection_distance).clamp(0.0, 1.0)
    }

    pub fn evaluate(&self, ctx: &SteeringContext) -> Option<ContextChoice> {
        let desired = self
            .desired_direction
            .and_then(|d| d.try_normalize())
            .or_else(|| ctx.agent.velocity.try_normalize())?;

        let mut best: Option<(f32, Vec2)> = None;
        let mut max_danger = 0.0_f32;

        for index in 0..self.ray_count {
            let direction = self.ray_direction(index);
            let interest = direction.dot(desired);
            let danger = self.ray_danger(ctx, direction);
            max_danger = max_danger.max(danger);

            let score = interest * self.interest_weight - danger * self.danger_weight;
            if best.map_or(true, |(best_score, _)| score > best_score) {
                best = Some((score, direction));
            }
        }

        best.map(|(_, direction)| ContextChoice {
            direction,
            max_danger,
        })
    }
}

impl SteeringBehavior for ObstacleAvoidance {
    fn name(&self) -> &'static str {
        "obstacle_avoidance"
    }

    fn weight(&self) -> f32 {
        self.weight
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn compute(&mut self, ctx: &SteeringContext) -> Vec2 {
        match self.evaluate(ctx) {
            Some(choice) if choice.max_danger > 0.0 => {
                choice.direction * ctx.params.max_acceleration * choice.max_danger
            }
            _ => Vec2::ZERO,
        }
    }
}

// ============================================================================
// Separation
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct Separation {
    pub weight: f32,
    pub enabled: bool,
    /// Желаемая дистанция между центрами
    pub radius: f32,
    /// Ближе этого — emergency multiplier
    pub hard_minimum: f32,
    pub emergency_multiplier: f32,
    /// Горизонт предсказания (сек)
    pub prediction_horizon: f32,
    /// Множитель радиуса для стоящих соседей
    pub static_radius_multiplier: f32,
    /// Скорость ниже — сосед считается стоящим
    pub static_speed_threshold: f32,
    /// |cos| между отталкиванием и скоростью выше порога → боковое соскальзывание
    pub parallel_threshold: f32,
    pub crowd_threshold: usize,
    pub crowd_multiplier: f32,
    /// Множитель силы для агента с правом проезда (соседу уступают)
    pub right_of_way_factor: f32,
}

impl Separation {
    fn is_moving(velocity: Vec2, threshold: f32) -> bool {
        velocity.length() >= threshold
    }
}

impl SteeringBehavior for Separation {
    fn name(&self) -> &'static str {
        "separation"
    }

    fn weight(&self) -> f32 {
        self.weight
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn compute(&mut self, ctx: &SteeringContext) -> Vec2 {
        let me = ctx.agent;
        let self_moving = Self::is_moving(me.velocity, self.static_speed_threshold);

        let mut total = Vec2::ZERO;
        let mut count = 0usize;

        for neighbor in ctx.neighbors {
            if neighbor.entity == me.entity || neighbor.faction_id != me.faction_id {
                continue;
            }

            let neighbor_moving = Self::is_moving(neighbor.velocity, self.static_speed_threshold);
            let effective_radius = if neighbor.is_static || !neighbor_moving {
                self.radius * self.static_radius_multiplier
            } else {
                self.radius
            };

            let current = me.position - neighbor.position;
            let predicted = current + (me.velocity - neighbor.velocity) * self.prediction_horizon;
            let offset = if predicted.length() < current.length() {
                predicted
            } else {
                current
            };

            let distance = offset.length();
            if distance >= effective_radius {
                continue;
            }

            // Совпадающие центры: расходимся по детерминированной перпендикулярной оси
            let away = offset
                .try_normalize()
                .unwrap_or_else(|| me.facing.perp() * ctx.params.slip_bias);
            let mut strength = (effective_radius - distance) / effective_radius;

            if current.length() < self.hard_minimum {
                strength *= self.emergency_multiplier;
            }

            // Оба движутся: уступает агент с большим instance_priority
            if self_moving
                && neighbor_moving
                && ctx.params.instance_priority < neighbor.instance_priority
            {
                strength *= self.right_of_way_factor;
            }

            total += away * strength;
            count += 1;
        }

        if count == 0 {
            return Vec2::ZERO;
        }

        if count >= self.crowd_threshold {
            total *= self.crowd_multiplier;
        }

        // Отталкивание почти вдоль собственной скорости → боковое соскальзывание
        if let (Some(push), Some(heading)) = (total.try_normalize(), me.velocity.try_normalize()) {
            if push.dot(heading).abs() > self.parallel_threshold {
                total += heading.perp() * ctx.params.slip_bias * total.length() * 0.5;
            }
        }

        total * ctx.params.max_acceleration
    }
}

// ============================================================================
// OrbitStrafe
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct OrbitStrafe {
    pub weight: f32,
    pub enabled: bool,
    pub center: Option<Vec2>,
    pub radius: f32,
    /// Dead-zone: в пределах ±tolerance радиальной коррекции нет
    pub tolerance: f32,
    /// Слабая радиальная составляющая
    pub radial_gain: f32,
    /// Сильная касательная составляющая
    pub tangential_gain: f32,
    /// +1 против часовой, -1 по часовой
    pub direction: f32,
}

impl OrbitStrafe {
    pub fn reverse(&mut self) {
        self.direction = -self.direction;
    }

    /// Желаемое направление (до масштабирования скоростью)
    pub fn desired_direction(&self, position: Vec2) -> Option<Vec2> {
        let center = self.center?;
        let offset = position - center;
        let distance = offset.length();
        let radial = offset.try_normalize().unwrap_or(Vec2::X);

        let error = distance - self.radius;
        let radial_term = if error.abs() > self.tolerance {
            let magnitude = (error.abs() / self.radius.max(0.1)).min(1.0);
            -radial * error.signum() * self.radial_gain * magnitude
        } else {
            Vec2::ZERO
        };
        let tangent = radial.perp() * self.direction.signum() * self.tangential_gain;

        Some(tangent + radial_term)
    }
}

impl SteeringBehavior for OrbitStrafe {
    fn name(&self) -> &'static str {
        "orbit_strafe"
    }

    fn weight(&self) -> f32 {
        self.weight
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn compute(&mut self, ctx: &SteeringContext) -> Vec2 {
        match self.desired_direction(ctx.agent.position) {
            Some(direction) => {
                direction.clamp_length_max(1.0) * ctx.speed_limit() - ctx.agent.velocity
            }
            None => Vec2::ZERO,
        }
    }
}

// ============================================================================
// FormationSeek
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct FormationSeek {
    pub weight: f32,
    pub enabled: bool,
    /// (anchor, facing) формации
    pub anchor: Option<(Vec2, Vec2)>,
    pub arrival_radius: f32,
}

impl SteeringBehavior for FormationSeek {
    fn name(&self) -> &'static str {
        "formation_seek"
    }

    fn weight(&self) -> f32 {
        self.weight
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn compute(&mut self, ctx: &SteeringContext) -> Vec2 {
        let Some((anchor, facing)) = self.anchor else {
            return Vec2::ZERO;
        };
        match ctx.formations.slot_position(ctx.agent.entity, anchor, facing) {
            Some(slot) => seek_force(ctx, slot, self.arrival_radius),
            None => Vec2::ZERO,
        }
    }
}

// ============================================================================
// SteeringBehaviors — набор поведений агента (каждый агент владеет своим)
// ============================================================================

#[derive(Component, Debug, Clone)]
pub struct SteeringBehaviors {
    pub avoidance: ObstacleAvoidance,
    pub separation: Separation,
    pub flee: Flee,
    pub formation: FormationSeek,
    pub orbit: OrbitStrafe,
    pub seek: Seek,
    pub wander: Wander,
}

impl SteeringBehaviors {
    /// seed: персональный (wander jitter), orbit_direction: ±1 (по слоту/личности)
    pub fn from_settings(settings: &SteeringSettings, seed: u64, orbit_direction: f32) -> Self {
        let mut wander = Wander::new(
            settings.wander_distance,
            settings.wander_radius,
            settings.wander_jitter,
            seed,
        );
        wander.weight = settings.wander_weight;

        Self {
            avoidance: ObstacleAvoidance {
                weight: settings.avoidance_weight,
                enabled: false,
                ray_count: settings.avoidance_rays,
                detection_distance: settings.avoidance_distance,
                interest_weight: settings.avoidance_interest_weight,
                danger_weight: settings.avoidance_danger_weight,
                mask: CollisionLayers::AVOIDANCE_MASK,
                desired_direction: None,
            },
            separation: Separation {
                weight: settings.separation_weight,
                enabled: false,
                radius: settings.separation_radius,
                hard_minimum: settings.separation_hard_minimum,
                emergency_multiplier: settings.separation_emergency_multiplier,
                prediction_horizon: settings.separation_prediction_horizon,
                static_radius_multiplier: settings.separation_static_multiplier,
                static_speed_threshold: 0.2,
                parallel_threshold: 0.9,
                crowd_threshold: 3,
                crowd_multiplier: settings.separation_crowd_multiplier,
                right_of_way_factor: 0.25,
            },
            flee: Flee {
                weight: settings.flee_weight,
                enabled: false,
                threat: None,
                panic_distance: settings.flee_panic_distance,
                bias: Vec2::ZERO,
                bias_weight: settings.flee_bias_weight,
            },
            formation: FormationSeek {
                weight: settings.seek_weight,
                enabled: false,
                anchor: None,
                arrival_radius: settings.arrival_radius,
            },
            orbit: OrbitStrafe {
                weight: settings.orbit_weight,
                enabled: false,
                center: None,
                radius: 2.0,
                tolerance: settings.orbit_tolerance,
                radial_gain: settings.orbit_radial_gain,
                tangential_gain: 1.0,
                direction: if orbit_direction < 0.0 { -1.0 } else { 1.0 },
            },
            seek: Seek {
                weight: settings.seek_weight,
                enabled: false,
                target: None,
                arrival_radius: settings.arrival_radius,
            },
            wander,
        }
    }

    /// Все поведения в порядке приоритета (для BlendMode::Priority)
    pub fn iter_mut(&mut self) -> [&mut dyn SteeringBehavior; 7] {
        [
            &mut self.avoidance,
            &mut self.separation,
            &mut self.flee,
            &mut self.formation,
            &mut self.orbit,
            &mut self.seek,
            &mut self.wander,
        ]
    }

    pub fn disable_all(&mut self) {
        self.avoidance.enabled = false;
        self.separation.enabled = false;
        self.flee.enabled = false;
        self.formation.enabled = false;
        self.orbit.enabled = false;
        self.seek.enabled = false;
        self.wander.enabled = false;
    }
}
