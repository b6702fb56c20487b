//! Collision Layers
//!
//! ## Архитектура:
//! - **Layer:** на каком слое находится коллайдер (один бит)
//! - **Mask:** какие слои видит raycast/overlap запрос
//!
//! ## Слои:
//! - WALLS: стены, непроходимая геометрия (всегда в grid mask)
//! - PROPS: декор/ящики (могут быть проходимы для grid → avoidance их игнорирует)
//! - ACTORS: тела агентов
//! - TARGET: тело цели (LOS raycast'ы считают попадание в цель "чистой линией")

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct CollisionLayers: u32 {
        const WALLS = 0b0001;
        const PROPS = 0b0010;
        const ACTORS = 0b0100;
        const TARGET = 0b1000;
    }
}

impl CollisionLayers {
    /// Mask: raycast для LOS (стены + цель)
    pub const LOS_MASK: Self = Self::WALLS.union(Self::TARGET);

    /// Mask: context steering (вся статика + цель, чтобы отфильтровать попадания в цель)
    pub const AVOIDANCE_MASK: Self = Self::WALLS.union(Self::PROPS).union(Self::TARGET);
}

impl Default for CollisionLayers {
    fn default() -> Self {
        Self::WALLS
    }
}

/// Название слоя для debug логов
pub fn layer_name(layer: CollisionLayers) -> &'static str {
    if layer == CollisionLayers::WALLS {
        "Walls"
    } else if layer == CollisionLayers::PROPS {
        "Props"
    } else if layer == CollisionLayers::ACTORS {
        "Actors"
    } else if layer == CollisionLayers::TARGET {
        "Target"
    } else {
        "Mixed"
    }
}
