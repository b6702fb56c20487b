//! Pluggable tactics modules (оружие-специфичные параметры агента)
//!
//! Один тип агента + стратегия вместо иерархии контроллеров: state machine
//! общая, TacticsModule поставляет дальности, тайминги и урон.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

pub trait TacticsModule: Send + Sync + 'static {
    fn name(&self) -> &'static str;
    /// Дистанция удара (surface-to-surface)
    fn strike_range(&self) -> f32;
    /// Ближе этого начинается выбор Chase vs тактический манёвр
    fn engagement_range(&self) -> f32;
    fn windup(&self) -> f32;
    fn recovery(&self) -> f32;
    /// Минимальная пауза между атаками
    fn cooldown(&self) -> f32;
    fn damage(&self) -> u32;
    fn knockback(&self) -> f32;
    /// Chase останавливается на этой дистанции (0 = вплотную)
    fn chase_standoff(&self) -> f32;
}

/// Ближний бой
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeleeTactics {
    pub strike_range: f32,
    pub engagement_range: f32,
    pub windup: f32,
    pub recovery: f32,
    pub cooldown: f32,
    pub damage: u32,
    pub knockback: f32,
}

impl Default for MeleeTactics {
    fn default() -> Self {
        Self {
            strike_range: 1.0,
            engagement_range: 5.0,
            windup: 0.4,
            recovery: 0.5,
            cooldown: 1.0,
            damage: 10,
            knockback: 2.5,
        }
    }
}

impl TacticsModule for MeleeTactics {
    fn name(&self) -> &'static str {
        "melee"
    }

    fn strike_range(&self) -> f32 {
        self.strike_range
    }

    fn engagement_range(&self) -> f32 {
        self.engagement_range
    }

    fn windup(&self) -> f32 {
        self.windup
    }

    fn recovery(&self) -> f32 {
        self.recovery
    }

    fn cooldown(&self) -> f32 {
        self.cooldown
    }

    fn damage(&self) -> u32 {
        self.damage
    }

    fn knockback(&self) -> f32 {
        self.knockback
    }

    fn chase_standoff(&self) -> f32 {
        0.0
    }
}

/// Дальний бой: держит дистанцию, бьёт издалека
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RangedTactics {
    pub strike_range: f32,
    pub engagement_range: f32,
    pub windup: f32,
    pub recovery: f32,
    pub cooldown: f32,
    pub damage: u32,
    pub standoff: f32,
}

impl Default for RangedTactics {
    fn default() -> Self {
        Self {
            strike_range: 6.0,
            engagement_range: 9.0,
            windup: 0.6,
            recovery: 0.4,
            cooldown: 1.8,
            damage: 6,
            standoff: 4.5,
        }
    }
}

impl TacticsModule for RangedTactics {
    fn name(&self) -> &'static str {
        "ranged"
    }

    fn strike_range(&self) -> f32 {
        self.strike_range
    }

    fn engagement_range(&self) -> f32 {
        self.engagement_range
    }

    fn windup(&self) -> f32 {
        self.windup
    }

    fn recovery(&self) -> f32 {
        self.recovery
    }

    fn cooldown(&self) -> f32 {
        self.cooldown
    }

    fn damage(&self) -> u32 {
        self.damage
    }

    fn knockback(&self) -> f32 {
        0.5
    }

    fn chase_standoff(&self) -> f32 {
        self.standoff
    }
}

/// Component: тактика агента
#[derive(Component)]
pub struct Tactics(pub Box<dyn TacticsModule>);

impl Tactics {
    pub fn melee() -> Self {
        Self(Box::new(MeleeTactics::default()))
    }

    pub fn ranged() -> Self {
        Self(Box::new(RangedTactics::default()))
    }

    pub fn module(&self) -> &dyn TacticsModule {
        self.0.as_ref()
    }
}

impl Default for Tactics {
    fn default() -> Self {
        Self::melee()
    }
}

impl std::fmt::Debug for Tactics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Tactics").field(&self.0.name()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ranged_keeps_distance() {
        let tactics = Tactics::ranged();
        let module = tactics.module();
        assert!(module.chase_standoff() > 0.0);
        assert!(module.chase_standoff() < module.strike_range());
        assert!(module.strike_range() < module.engagement_range());
    }

    #[test]
    fn test_melee_closes_in() {
        let tactics = Tactics::default();
        assert_eq!(tactics.module().name(), "melee");
        assert_eq!(tactics.module().chase_standoff(), 0.0);
    }
}
