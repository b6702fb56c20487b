//! RepathThrottle — ограничение частоты перепланирования
//!
//! Новый путь запрашивается только если прошло min_interval И цель сместилась
//! больше чем на min_goal_delta (или пути ещё не было). После пустого пути
//! смещение цели не требуется: повтор на следующем интервале.
//! force() пропускает оба ограничения ровно один раз (смена режима движения, stuck recovery).

use bevy::prelude::*;

#[derive(Debug, Clone, PartialEq)]
pub struct RepathThrottle {
    /// Минимальный интервал между запросами (секунды)
    pub min_interval: f32,
    /// Минимальное смещение цели для нового запроса (метры)
    pub min_goal_delta: f32,
    last_time: Option<f32>,
    last_goal: Option<Vec2>,
    /// Последний запрос не нашёл путь
    last_empty: bool,
    forced: bool,
}

impl Default for RepathThrottle {
    fn default() -> Self {
        Self::new(0.5, 1.0)
    }
}

impl RepathThrottle {
    pub fn new(min_interval: f32, min_goal_delta: f32) -> Self {
        Self {
            min_interval,
            min_goal_delta,
            last_time: None,
            last_goal: None,
            last_empty: false,
            forced: false,
        }
    }

    pub fn should_replan(&self, now: f32, goal: Vec2) -> bool {
        if self.forced {
            return true;
        }
        let (Some(last_time), Some(last_goal)) = (self.last_time, self.last_goal) else {
            return true;
        };
        now - last_time >= self.min_interval
            && (self.last_empty || last_goal.distance(goal) >= self.min_goal_delta)
    }

    pub fn mark_planned(&mut self, now: f32, goal: Vec2, found: bool) {
        self.last_time = Some(now);
        self.last_goal = Some(goal);
        self.last_empty = !found;
        self.forced = false;
    }

    /// Одноразовый bypass
    pub fn force(&mut self) {
        self.forced = true;
    }

    pub fn is_forced(&self) -> bool {
        self.forced
    }

    /// Сброс (агент возвращён в пул)
    pub fn reset(&mut self) {
        self.last_time = None;
        self.last_goal = None;
        self.last_empty = false;
        self.forced = false;
    }
}
