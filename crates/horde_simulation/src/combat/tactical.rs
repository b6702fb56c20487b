//! TacticalDecisionModel — агрессия, личность, каденс решений
//!
//! - aggression_chance: стартует с base, +step за каждый тактический (не агрессивный) выбор
//!   подряд (до cap), сброс в base после успешной атаки → агент не может уклоняться бесконечно
//! - personality_offset: фиксированный per-agent сдвиг шанса (смелые/осторожные)
//! - decision_delay: фиксированная per-agent добавка к каденсу решений

use bevy::prelude::*;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Параметры модели (тюнинг)
#[derive(Resource, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TacticalSettings {
    pub aggression_base: f32,
    pub aggression_step: f32,
    pub aggression_cap: f32,
    /// Максимальный |personality_offset|
    pub personality_jitter: f32,
    /// Базовый интервал между решениями (секунды)
    pub decision_interval: f32,
    /// Максимальная per-agent добавка к интервалу (секунды)
    pub decision_delay_jitter: f32,
    /// Стоимость входа в тактическое состояние (stamina)
    pub tactical_stamina_cost: f32,
    /// Доля max stamina, ниже которой агент уставший
    pub fatigue_threshold: f32,
    /// Множитель скорости уставшего агента
    pub fatigue_speed_multiplier: f32,
    pub stamina_max: f32,
    /// Регенерация stamina (units/sec)
    pub stamina_regen: f32,
}

impl Default for TacticalSettings {
    fn default() -> Self {
        Self {
            aggression_base: 0.4,
            aggression_step: 0.15,
            aggression_cap: 0.9,
            personality_jitter: 0.1,
            decision_interval: 0.5,
            decision_delay_jitter: 0.4,
            tactical_stamina_cost: 25.0,
            fatigue_threshold: 0.3,
            fatigue_speed_multiplier: 0.6,
            stamina_max: 100.0,
            stamina_regen: 8.0,
        }
    }
}

/// Итог решения в точке выбора
#[derive(Debug, Clone, Copy, PartialEq, Eq, Reflect)]
pub enum TacticalChoice {
    /// Прямой Chase
    Aggressive,
    /// BlindSpotSeek / Feint
    Tactical,
}

/// Per-agent состояние модели
#[derive(Component, Debug, Clone, Reflect)]
#[reflect(Component)]
pub struct TacticalModel {
    pub aggression_base: f32,
    pub aggression_step: f32,
    pub aggression_cap: f32,
    pub aggression_chance: f32,
    pub consecutive_tactical: u32,
    /// Фиксирован на спавне
    pub personality_offset: f32,
    /// Фиксирована на спавне
    pub decision_delay: f32,
    pub decision_interval: f32,
    /// Следующее решение не раньше (абсолютное время)
    pub next_decision_at: f32,
}

impl Default for TacticalModel {
    fn default() -> Self {
        Self::new(&TacticalSettings::default(), 0.0, 0.0)
    }
}

impl TacticalModel {
    pub fn new(settings: &TacticalSettings, personality_offset: f32, decision_delay: f32) -> Self {
        Self {
            aggression_base: settings.aggression_base,
            aggression_step: settings.aggression_step,
            aggression_cap: settings.aggression_cap,
            aggression_chance: settings.aggression_base,
            consecutive_tactical: 0,
            personality_offset,
            decision_delay,
            decision_interval: settings.decision_interval,
            next_decision_at: 0.0,
        }
    }

    /// Личность берётся из детерминированного RNG при спавне/активации
    pub fn with_personality(settings: &TacticalSettings, rng: &mut impl Rng) -> Self {
        let jitter = settings.personality_jitter.abs();
        let offset = if jitter > 0.0 {
            rng.gen_range(-jitter..=jitter)
        } else {
            0.0
        };
        let delay = if settings.decision_delay_jitter > 0.0 {
            rng.gen_range(0.0..=settings.decision_delay_jitter)
        } else {
            0.0
        };
        Self::new(settings, offset, delay)
    }

    /// Шанс агрессивного выбора с учётом личности
    pub fn effective_chance(&self) -> f32 {
        (self.aggression_chance + self.personality_offset).clamp(0.0, 1.0)
    }

    pub fn decision_ready(&self, now: f32) -> bool {
        now >= self.next_decision_at
    }

    /// Следующая точка решения: interval + персональная задержка
    pub fn schedule_next_decision(&mut self, now: f32) {
        self.next_decision_at = now + self.decision_interval + self.decision_delay;
    }

    /// Выбор по броску `roll` ∈ [0, 1)
    pub fn choose(&self, roll: f32) -> TacticalChoice {
        if roll < self.effective_chance() {
            TacticalChoice::Aggressive
        } else {
            TacticalChoice::Tactical
        }
    }

    pub fn roll(&self, rng: &mut impl Rng) -> TacticalChoice {
        self.choose(rng.gen::<f32>())
    }

    /// Учесть сделанный выбор (сдвиг агрессии)
    pub fn record_choice(&mut self, choice: TacticalChoice) {
        match choice {
            TacticalChoice::Tactical => {
                self.consecutive_tactical += 1;
                self.aggression_chance =
                    (self.aggression_chance + self.aggression_step).min(self.aggression_cap);
            }
            TacticalChoice::Aggressive => {
                self.consecutive_tactical = 0;
            }
        }
    }

    /// Успешная атака → сброс к base
    pub fn on_successful_attack(&mut self) {
        self.aggression_chance = self.aggression_base;
        self.consecutive_tactical = 0;
    }

    /// Сброс runtime-полей (пул); личность сохраняется
    pub fn reset(&mut self) {
        self.aggression_chance = self.aggression_base;
        self.consecutive_tactical = 0;
        self.next_decision_at = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_aggression_shift_capped_and_reset() {
        let settings = TacticalSettings::default();
        let mut model = TacticalModel::new(&settings, 0.0, 0.0);

        for _ in 0..10 {
            model.record_choice(TacticalChoice::Tactical);
        }
        assert_eq!(model.consecutive_tactical, 10);
        assert!((model.aggression_chance - settings.aggression_cap).abs() < 1e-6);

        model.on_successful_attack();
        assert!((model.aggression_chance - settings.aggression_base).abs() < 1e-6);
        assert_eq!(model.consecutive_tactical, 0);
    }

    #[test]
    fn test_choice_uses_personality_offset() {
        let settings = TacticalSettings::default();
        let bold = TacticalModel::new(&settings, 0.1, 0.0);
        let timid = TacticalModel::new(&settings, -0.1, 0.0);

        // base 0.4: bold → 0.5, timid → 0.3
        assert_eq!(bold.choose(0.45), TacticalChoice::Aggressive);
        assert_eq!(timid.choose(0.45), TacticalChoice::Tactical);
    }

    #[test]
    fn test_decision_cadence_includes_personal_delay() {
        let settings = TacticalSettings::default();
        let mut model = TacticalModel::new(&settings, 0.0, 0.3);

        model.schedule_next_decision(1.0);
        assert!(!model.decision_ready(1.75));
        assert!(model.decision_ready(1.85));
    }

    #[test]
    fn test_personality_is_seeded() {
        let settings = TacticalSettings::default();
        let a = TacticalModel::with_personality(&settings, &mut ChaCha8Rng::seed_from_u64(9));
        let b = TacticalModel::with_personality(&settings, &mut ChaCha8Rng::seed_from_u64(9));

        assert_eq!(a.personality_offset, b.personality_offset);
        assert_eq!(a.decision_delay, b.decision_delay);
        assert!(a.personality_offset.abs() <= settings.personality_jitter);
    }
}
