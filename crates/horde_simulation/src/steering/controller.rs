//! MovementController — high-level intent → набор включённых поведений
//!
//! AI пишет только режим (`set_mode`); контроллер решает:
//! - какие поведения включены и куда они смотрят
//! - нужен ли PathPlanner (Chase/PatrolTo) и какой waypoint сейчас кормит Seek
//!
//! Смена вида режима (Chase → PatrolTo и т.п.) сбрасывает путь и один раз
//! обходит RepathThrottle.

use bevy::prelude::*;

use crate::navigation::{Path, RepathThrottle};

use super::behaviors::SteeringBehaviors;
use super::SteeringSettings;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MovementMode {
    /// Без цели, только separation
    Idle,
    /// Заморозка (windup атаки, stun)
    Hold,
    /// Преследование точки через PathPlanner
    Chase { target: Vec2 },
    /// Бегство от угрозы
    Flee { threat: Vec2 },
    /// Статическая точка через PathPlanner (патруль, поиск, память)
    PatrolTo { point: Vec2 },
    /// Circle-strafe вокруг центра
    Orbit { center: Vec2, radius: f32 },
    /// Позиция из FormationRegistry
    Formation { anchor: Vec2, facing: Vec2 },
    /// Свободное блуждание
    Wander,
}

/// Вид режима без данных (сравнение "сменился ли режим")
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MovementModeKind {
    Idle,
    Hold,
    Chase,
    Flee,
    PatrolTo,
    Orbit,
    Formation,
    Wander,
}

impl MovementMode {
    pub fn kind(&self) -> MovementModeKind {
        match self {
            MovementMode::Idle => MovementModeKind::Idle,
            MovementMode::Hold => MovementModeKind::Hold,
            MovementMode::Chase { .. } => MovementModeKind::Chase,
            MovementMode::Flee { .. } => MovementModeKind::Flee,
            MovementMode::PatrolTo { .. } => MovementModeKind::PatrolTo,
            MovementMode::Orbit { .. } => MovementModeKind::Orbit,
            MovementMode::Formation { .. } => MovementModeKind::Formation,
            MovementMode::Wander => MovementModeKind::Wander,
        }
    }

    /// Цель для PathPlanner (только режимы с навигацией)
    pub fn path_goal(&self) -> Option<Vec2> {
        match *self {
            MovementMode::Chase { target } => Some(target),
            MovementMode::PatrolTo { point } => Some(point),
            _ => None,
        }
    }

    /// Есть ли активное намерение двигаться (для stuck detector)
    pub fn has_intent(&self) -> bool {
        !matches!(self, MovementMode::Idle | MovementMode::Hold)
    }
}

#[derive(Component, Debug, Clone)]
pub struct MovementController {
    mode: MovementMode,
    path: Path,
    waypoint_index: usize,
    pub throttle: RepathThrottle,
    /// Множитель скорости режима (Pacing ходит медленно)
    pub speed_scale: f32,
    /// Facing не следует за скоростью (Attack lock)
    pub facing_locked: bool,
    /// Дистанция, на которой waypoint считается достигнутым
    pub waypoint_reach: f32,
    pub arrival_radius: f32,
}

impl Default for MovementController {
    fn default() -> Self {
        Self::from_settings(&SteeringSettings::default())
    }
}

impl MovementController {
    pub fn from_settings(settings: &SteeringSettings) -> Self {
        Self {
            mode: MovementMode::Idle,
            path: Path::default(),
            waypoint_index: 0,
            throttle: RepathThrottle::new(settings.repath_interval, settings.repath_goal_delta),
            speed_scale: 1.0,
            facing_locked: false,
            waypoint_reach: settings.waypoint_reach,
            arrival_radius: settings.arrival_radius,
        }
    }

    pub fn mode(&self) -> MovementMode {
        self.mode
    }

    /// Установить режим. Смена вида режима → сброс пути + одноразовый bypass throttle.
    pub fn set_mode(&mut self, mode: MovementMode) {
        if mode.kind() != self.mode.kind() {
            self.path = Path::default();
            self.waypoint_index = 0;
            self.throttle.force();
            self.speed_scale = 1.0;
        }
        self.mode = mode;
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn waypoint_index(&self) -> usize {
        self.waypoint_index
    }

    /// Заменить путь целиком (пути не мутируются)
    pub fn replace_path(&mut self, path: Path, now: f32, goal: Vec2) {
        let found = !path.is_empty();
        self.path = path;
        self.waypoint_index = 0;
        self.throttle.mark_planned(now, goal, found);
    }

    pub fn current_waypoint(&self) -> Option<Vec2> {
        self.path.waypoints.get(self.waypoint_index).copied()
    }

    pub fn is_final_waypoint(&self) -> bool {
        self.waypoint_index + 1 >= self.path.waypoints.len()
    }

    /// Продвинуть курсор, если текущий waypoint достигнут (последний не пропускаем)
    pub fn advance_waypoint(&mut self, position: Vec2) {
        while !self.is_final_waypoint() {
            match self.current_waypoint() {
                Some(waypoint) if waypoint.distance(position) <= self.waypoint_reach => {
                    self.waypoint_index += 1;
                }
                _ => break,
            }
        }
    }

    /// Stuck recovery: перескочить текущий waypoint
    pub fn skip_waypoint(&mut self) {
        if !self.is_final_waypoint() {
            self.waypoint_index += 1;
        }
    }

    /// Достигнута ли конечная точка пути
    pub fn arrived(&self, position: Vec2, tolerance: f32) -> bool {
        match (self.mode.path_goal(), self.path.last_waypoint()) {
            (Some(_), Some(last)) => self.is_final_waypoint() && last.distance(position) <= tolerance,
            _ => false,
        }
    }

    /// Сброс при возврате в пул
    pub fn reset(&mut self) {
        self.mode = MovementMode::Idle;
        self.path = Path::default();
        self.waypoint_index = 0;
        self.throttle.reset();
        self.speed_scale = 1.0;
        self.facing_locked = false;
    }

    /// Включить поведения под текущий режим
    pub fn configure(&self, behaviors: &mut SteeringBehaviors, position: Vec2) {
        behaviors.disable_all();

        match self.mode {
            MovementMode::Idle => {
                behaviors.separation.enabled = true;
            }
            MovementMode::Hold => {}
            MovementMode::Chase { .. } | MovementMode::PatrolTo { .. } => {
                behaviors.separation.enabled = true;
                // Пустой путь: стоим и ждём следующего интервала перепланирования
                if let Some(waypoint) = self.current_waypoint() {
                    let arrival = matches!(self.mode, MovementMode::PatrolTo { .. }) && self.is_final_waypoint();
                    behaviors.seek.enabled = true;
                    behaviors.seek.target = Some(waypoint);
                    behaviors.seek.arrival_radius = if arrival { self.arrival_radius } else { 0.0 };
                    enable_avoidance(behaviors, waypoint - position);
                }
            }
            MovementMode::Flee { threat } => {
                behaviors.separation.enabled = true;
                behaviors.flee.enabled = true;
                behaviors.flee.threat = Some(threat);
                enable_avoidance(behaviors, position - threat);
            }
            MovementMode::Orbit { center, radius } => {
                behaviors.separation.enabled = true;
                behaviors.orbit.enabled = true;
                behaviors.orbit.center = Some(center);
                behaviors.orbit.radius = radius;
                let desired = behaviors.orbit.desired_direction(position).unwrap_or(Vec2::ZERO);
                enable_avoidance(behaviors, desired);
            }
            MovementMode::Formation { anchor, facing } => {
                behaviors.separation.enabled = true;
                behaviors.formation.enabled = true;
                behaviors.formation.anchor = Some((anchor, facing));
                enable_avoidance(behaviors, anchor - position);
            }
            MovementMode::Wander => {
                behaviors.separation.enabled = true;
                behaviors.wander.enabled = true;
                enable_avoidance(behaviors, Vec2::ZERO);
            }
        }
    }
}

fn enable_avoidance(behaviors: &mut SteeringBehaviors, desired: Vec2) {
    behaviors.avoidance.enabled = true;
    behaviors.avoidance.desired_direction = desired.try_normalize();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_switch_forces_replan_once() {
        let mut controller = MovementController::default();
        controller.set_mode(MovementMode::Chase { target: Vec2::ZERO });
        assert!(controller.throttle.is_forced());

        controller.replace_path(Path::default(), 1.0, Vec2::ZERO);
        assert!(!controller.throttle.is_forced());

        // Тот же вид режима (цель сдвинулась) — без bypass
        controller.set_mode(MovementMode::Chase { target: Vec2::new(0.1, 0.0) });
        assert!(!controller.throttle.is_forced());

        // Chase → PatrolTo: bypass
        controller.set_mode(MovementMode::PatrolTo { point: Vec2::new(5.0, 5.0) });
        assert!(controller.throttle.is_forced());
    }

    #[test]
    fn test_waypoints_advance_but_keep_final() {
        let mut controller = MovementController::default();
        controller.set_mode(MovementMode::PatrolTo { point: Vec2::new(3.0, 0.0) });
        let path = Path {
            waypoints: vec![Vec2::new(1.0, 0.0), Vec2::new(2.0, 0.0), Vec2::new(3.0, 0.0)],
            ..Default::default()
        };
        controller.replace_path(path, 0.0, Vec2::new(3.0, 0.0));

        controller.advance_waypoint(Vec2::new(1.1, 0.0));
        assert_eq!(controller.current_waypoint(), Some(Vec2::new(2.0, 0.0)));

        controller.advance_waypoint(Vec2::new(2.05, 0.0));
        assert_eq!(controller.current_waypoint(), Some(Vec2::new(3.0, 0.0)));
        assert!(!controller.arrived(Vec2::new(2.05, 0.0), 0.2));

        controller.advance_waypoint(Vec2::new(3.0, 0.0));
        assert_eq!(controller.current_waypoint(), Some(Vec2::new(3.0, 0.0)));
        assert!(controller.arrived(Vec2::new(3.0, 0.0), 0.2));
    }
}
