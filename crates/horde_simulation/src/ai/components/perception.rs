//! Perception — что агент знает о цели в этом тике (пересчитывается в Sense).

use bevy::prelude::*;

#[derive(Component, Debug, Clone, Default, Reflect)]
#[reflect(Component)]
pub struct Perception {
    /// Живая цель (None — цели нет или она мертва)
    pub target: Option<Entity>,
    pub target_position: Vec2,
    pub target_velocity: Vec2,
    pub target_facing: Vec2,
    pub target_radius: f32,
    /// Центр-центр
    pub distance: f32,
    /// Поверхность агента → поверхность тела цели
    pub surface_distance: f32,
    pub line_of_sight: bool,
    pub in_vision_cone: bool,
    /// Обнаружение: detection_range + LOS (+ конус)
    pub detected: bool,
    /// Удержание контакта в бою: LOS в пределах lose_sight_range
    pub tracking: bool,
}

impl Perception {
    pub fn has_target(&self) -> bool {
        self.target.is_some()
    }

    /// Направление агент → цель
    pub fn direction_to_target(&self, from: Vec2) -> Vec2 {
        (self.target_position - from).normalize_or_zero()
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

/// Проверка конуса зрения: угол между facing и направлением на цель
pub fn within_vision_cone(facing: Vec2, to_target: Vec2, cone_degrees: f32) -> bool {
    let (Some(facing), Some(to_target)) = (facing.try_normalize(), to_target.try_normalize()) else {
        return true;
    };
    let half = (cone_degrees * 0.5).to_radians();
    facing.dot(to_target) >= half.cos()
}

/// Маркер: агент зажат (Pacing/Retreat со стоящей скоростью) — телеметрия + форс Chase
#[derive(Component, Debug, Clone, Copy, Default)]
pub struct Cornered;

/// Детектор застревания (измеренное смещение, не Velocity)
#[derive(Component, Debug, Clone, Default, Reflect)]
#[reflect(Component)]
pub struct StuckDetector {
    pub window_start_position: Vec2,
    pub window_start_time: f32,
    pub last_position: Vec2,
    /// Измеренная скорость за последний тик
    pub measured_speed: f32,
    /// С какого момента измеренная скорость ниже cornered_speed
    pub slow_since: Option<f32>,
}

impl StuckDetector {
    pub fn new(position: Vec2, now: f32) -> Self {
        Self {
            window_start_position: position,
            window_start_time: now,
            last_position: position,
            measured_speed: 0.0,
            slow_since: None,
        }
    }

    /// Обновить измеренную скорость и "медленный" интервал
    pub fn sample(&mut self, position: Vec2, now: f32, dt: f32, slow_threshold: f32) {
        self.measured_speed = if dt > 0.0 {
            position.distance(self.last_position) / dt
        } else {
            0.0
        };
        self.last_position = position;

        if self.measured_speed < slow_threshold {
            self.slow_since.get_or_insert(now);
        } else {
            self.slow_since = None;
        }
    }

    pub fn slow_for(&self, now: f32) -> f32 {
        self.slow_since.map_or(0.0, |since| now - since)
    }

    /// Окно истекло и смещение меньше порога → застрял. Окно перезапускается.
    pub fn check_window(&mut self, position: Vec2, now: f32, window: f32, min_distance: f32) -> bool {
        if now - self.window_start_time < window {
            return false;
        }
        let stuck = position.distance(self.window_start_position) < min_distance;
        self.restart(position, now);
        stuck
    }

    pub fn restart(&mut self, position: Vec2, now: f32) {
        self.window_start_position = position;
        self.window_start_time = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vision_cone() {
        assert!(within_vision_cone(Vec2::X, Vec2::new(1.0, 0.5), 90.0));
        assert!(!within_vision_cone(Vec2::X, Vec2::new(-1.0, 0.0), 140.0));
        assert!(!within_vision_cone(Vec2::X, Vec2::Y, 90.0));
    }

    #[test]
    fn test_stuck_window() {
        let mut detector = StuckDetector::new(Vec2::ZERO, 0.0);

        assert!(!detector.check_window(Vec2::new(0.05, 0.0), 0.5, 1.0, 0.15));
        assert!(detector.check_window(Vec2::new(0.05, 0.0), 1.0, 1.0, 0.15));
        // Окно перезапущено в 1.0
        assert!(!detector.check_window(Vec2::new(2.0, 0.0), 1.5, 1.0, 0.15));
        assert!(!detector.check_window(Vec2::new(2.0, 0.0), 2.0, 1.0, 0.15));
    }

    #[test]
    fn test_slow_interval() {
        let mut detector = StuckDetector::new(Vec2::ZERO, 0.0);
        detector.sample(Vec2::new(0.001, 0.0), 0.1, 0.1, 0.2);
        detector.sample(Vec2::new(0.002, 0.0), 0.2, 0.1, 0.2);
        assert!((detector.slow_for(0.7) - 0.6).abs() < 1e-5);

        detector.sample(Vec2::new(1.0, 0.0), 0.8, 0.1, 0.2);
        assert_eq!(detector.slow_for(0.8), 0.0);
    }
}
