//! 2D геометрия (арена в плоскости XY)

use bevy::prelude::*;

/// Направление по углу (градусы, 0° = +X, против часовой)
pub fn direction_from_degrees(degrees: f32) -> Vec2 {
    let radians = degrees.to_radians();
    Vec2::new(radians.cos(), radians.sin())
}

/// Повернуть вектор на угол (радианы)
pub fn rotate(v: Vec2, radians: f32) -> Vec2 {
    let (sin, cos) = radians.sin_cos();
    Vec2::new(v.x * cos - v.y * sin, v.x * sin + v.y * cos)
}

/// Доминирующая ось: только горизонталь или только вертикаль, никогда диагональ.
///
/// Используется при входе в Attack (facing lock). Нулевой вектор → fallback.
pub fn dominant_axis(v: Vec2, fallback: Vec2) -> Vec2 {
    if v.length_squared() < 1e-8 {
        return fallback;
    }
    if v.x.abs() >= v.y.abs() {
        Vec2::new(v.x.signum(), 0.0)
    } else {
        Vec2::new(0.0, v.y.signum())
    }
}
