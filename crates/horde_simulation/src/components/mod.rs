//! ECS Components для агентов и цели
//!
//! Организация по доменам:
//! - actor: базовые характеристики (faction, health, stamina)
//! - movement: кинематика в плоскости арены (Position, Velocity, Facing)
//! - world: цель (Target), коллайдер тела, пул (Dormant)
//!
//! AI/steering/combat компоненты живут в своих модулях (crate::ai, crate::steering, crate::combat).

pub mod actor;
pub mod movement;
pub mod world;

// Re-exports для удобного импорта
pub use actor::*;
pub use movement::*;
pub use world::*;
