//! Shared — cross-cutting утилиты
//!
//! - clock: SimClock (монотонные часы симуляции, все таймеры — абсолютные deadline'ы)
//! - geometry: 2D helpers (rotate, dominant axis, angle ↔ direction)

pub mod clock;
pub mod geometry;

pub use clock::*;
pub use geometry::*;
