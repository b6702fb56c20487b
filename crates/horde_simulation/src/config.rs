//! ArenaConfig — весь тюнинг сессии в одном TOML
//!
//! Любая секция может отсутствовать (serde default), значения проверяются в `validate`.
//!
//! ```toml
//! tick_hz = 60.0
//! seed = 7
//!
//! [grid]
//! world_min = [-20.0, -20.0]
//! world_max = [20.0, 20.0]
//!
//! [arbiter]
//! token_capacity = 2
//!
//! [ai]
//! detection_range = 12.0
//! ```

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::ai::AIConfig;
use crate::combat::{ArbiterSettings, TacticalSettings};
use crate::error::ConfigError;
use crate::navigation::{GridSettings, PlannerSettings};
use crate::steering::SteeringSettings;

#[derive(Resource, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArenaConfig {
    /// Частота FixedUpdate (SimClock step = 1 / tick_hz)
    pub tick_hz: f32,
    /// Seed DeterministicRng
    pub seed: u64,
    pub grid: GridSettings,
    pub planner: PlannerSettings,
    pub arbiter: ArbiterSettings,
    pub steering: SteeringSettings,
    pub tactical: TacticalSettings,
    pub ai: AIConfig,
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            tick_hz: 60.0,
            seed: 42,
            grid: GridSettings::default(),
            planner: PlannerSettings::default(),
            arbiter: ArbiterSettings::default(),
            steering: SteeringSettings::default(),
            tactical: TacticalSettings::default(),
            ai: AIConfig::default(),
        }
    }
}

impl ArenaConfig {
    /// Разобрать TOML и проверить значения
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string(self).map_err(|err| ConfigError::Invalid {
            field: "config",
            reason: err.to_string(),
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        positive("tick_hz", self.tick_hz)?;

        self.grid.validate().map_err(|err| ConfigError::Invalid {
            field: "grid",
            reason: err.to_string(),
        })?;

        if self.arbiter.token_capacity == 0 {
            return Err(invalid("arbiter.token_capacity", "at least one attack token is required"));
        }
        if self.arbiter.slot_count == 0 {
            return Err(invalid("arbiter.slot_count", "combat ring needs at least one slot"));
        }
        non_negative("arbiter.slot_ring_radius", self.arbiter.slot_ring_radius)?;
        non_negative("arbiter.cleanup_interval", self.arbiter.cleanup_interval)?;

        positive("steering.max_speed", self.steering.max_speed)?;
        positive("steering.max_acceleration", self.steering.max_acceleration)?;
        positive("steering.agent_radius", self.steering.agent_radius)?;
        non_negative("steering.repath_interval", self.steering.repath_interval)?;

        non_negative("tactical.decision_interval", self.tactical.decision_interval)?;
        non_negative("tactical.tactical_stamina_cost", self.tactical.tactical_stamina_cost)?;
        unit_interval("tactical.aggression_base", self.tactical.aggression_base)?;
        unit_interval("tactical.aggression_cap", self.tactical.aggression_cap)?;
        unit_interval("tactical.fatigue_threshold", self.tactical.fatigue_threshold)?;

        let ai = &self.ai;
        positive("ai.detection_range", ai.detection_range)?;
        if ai.lose_sight_range < ai.detection_range {
            return Err(invalid(
                "ai.lose_sight_range",
                format!(
                    "must be >= detection_range ({} < {})",
                    ai.lose_sight_range, ai.detection_range
                ),
            ));
        }
        non_negative("ai.reaction_delay", ai.reaction_delay)?;
        non_negative("ai.memory_duration", ai.memory_duration)?;
        non_negative("ai.search_duration", ai.search_duration)?;
        non_negative("ai.patrol_radius", ai.patrol_radius)?;
        if ai.retreat_max_duration < ai.retreat_min_duration {
            return Err(invalid("ai.retreat_max_duration", "must be >= retreat_min_duration"));
        }
        unit_interval("ai.flee_health_threshold", ai.flee_health_threshold)?;
        unit_interval("ai.post_attack_retreat_chance", ai.post_attack_retreat_chance)?;
        unit_interval("ai.post_attack_reposition_chance", ai.post_attack_reposition_chance)?;
        non_negative("ai.exhaustion_attack_weight", ai.exhaustion_attack_weight)?;
        non_negative("ai.exhaustion_tactical_weight", ai.exhaustion_tactical_weight)?;
        non_negative("ai.exhaustion_stand_weight", ai.exhaustion_stand_weight)?;
        if ai.blind_spot_max_attempts == 0 {
            return Err(invalid("ai.blind_spot_max_attempts", "must be at least 1"));
        }

        Ok(())
    }
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.into(),
    }
}

fn positive(field: &'static str, value: f32) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(invalid(field, format!("must be positive, got {}", value)))
    }
}

fn non_negative(field: &'static str, value: f32) -> Result<(), ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(invalid(field, format!("must be non-negative, got {}", value)))
    }
}

fn unit_interval(field: &'static str, value: f32) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(invalid(field, format!("must be within [0, 1], got {}", value)))
    }
}
