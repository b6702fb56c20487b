//! ObstacleWorld — spatial query service
//!
//! Внешний физический движок в headless режиме заменён простым набором коллайдеров:
//! - статика (круги и AABB) — стены, пропсы; из неё растеризуется NavigationGrid
//! - динамические тела (тело цели) — пересинхронизируются каждый тик
//!
//! AI потребляет только результаты запросов (SpatialQuery), никогда не резолвит коллизии сам.

use bevy::prelude::*;

use super::layers::CollisionLayers;

/// Геометрия статического коллайдера
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Shape {
    Circle { center: Vec2, radius: f32 },
    Aabb { min: Vec2, max: Vec2 },
}

impl Shape {
    /// Расстояние от точки до поверхности (0 если точка внутри)
    pub fn distance_to_point(&self, point: Vec2) -> f32 {
        match *self {
            Shape::Circle { center, radius } => ((point - center).length() - radius).max(0.0),
            Shape::Aabb { min, max } => {
                let closest = point.clamp(min, max);
                (point - closest).length()
            }
        }
    }

    /// Пересечение луча (dir нормализован) с фигурой: дистанция до первого попадания
    fn ray_distance(&self, origin: Vec2, dir: Vec2, max_distance: f32) -> Option<f32> {
        match *self {
            Shape::Circle { center, radius } => ray_circle(origin, dir, max_distance, center, radius),
            Shape::Aabb { min, max } => ray_aabb(origin, dir, max_distance, min, max),
        }
    }
}

/// Статический коллайдер
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Obstacle {
    pub id: u32,
    pub shape: Shape,
    pub layer: CollisionLayers,
}

/// Динамическое тело (круг), например тело цели
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DynamicBody {
    pub entity: Entity,
    pub center: Vec2,
    pub radius: f32,
    pub layer: CollisionLayers,
}

/// Кого задел запрос
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColliderId {
    Obstacle(u32),
    Body(Entity),
}

/// Результат raycast
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayHit {
    pub distance: f32,
    pub point: Vec2,
    pub collider: ColliderId,
}

/// Spatial query service (raycast + overlap)
pub trait SpatialQuery {
    /// Ближайшее попадание луча в коллайдер из mask (dir нормализуется внутри)
    fn raycast(&self, origin: Vec2, dir: Vec2, max_distance: f32, mask: CollisionLayers) -> Option<RayHit>;

    /// Есть ли коллайдер из mask, пересекающий круг
    fn overlap_circle(&self, center: Vec2, radius: f32, mask: CollisionLayers) -> bool;

    /// Surface-to-surface: расстояние от точки до поверхности коллайдера (None если его нет)
    fn surface_distance(&self, point: Vec2, collider: ColliderId) -> Option<f32>;
}

/// Набор коллайдеров арены (Resource, shared на всю сессию)
#[derive(Resource, Debug, Clone, Default)]
pub struct ObstacleWorld {
    obstacles: Vec<Obstacle>,
    bodies: Vec<DynamicBody>,
    next_id: u32,
}

impl ObstacleWorld {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_circle(&mut self, center: Vec2, radius: f32, layer: CollisionLayers) -> u32 {
        self.push(Shape::Circle { center, radius }, layer)
    }

    pub fn add_box(&mut self, min: Vec2, max: Vec2, layer: CollisionLayers) -> u32 {
        self.push(Shape::Aabb { min: min.min(max), max: min.max(max) }, layer)
    }

    fn push(&mut self, shape: Shape, layer: CollisionLayers) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        self.obstacles.push(Obstacle { id, shape, layer });
        id
    }

    pub fn remove(&mut self, id: u32) -> bool {
        let before = self.obstacles.len();
        self.obstacles.retain(|o| o.id != id);
        before != self.obstacles.len()
    }

    pub fn obstacles(&self) -> &[Obstacle] {
        &self.obstacles
    }

    /// Обновить (или добавить) динамическое тело
    pub fn upsert_body(&mut self, entity: Entity, center: Vec2, radius: f32, layer: CollisionLayers) {
        if let Some(body) = self.bodies.iter_mut().find(|b| b.entity == entity) {
            body.center = center;
            body.radius = radius;
            body.layer = layer;
        } else {
            self.bodies.push(DynamicBody { entity, center, radius, layer });
        }
    }

    pub fn remove_body(&mut self, entity: Entity) {
        self.bodies.retain(|b| b.entity != entity);
    }

    pub fn bodies(&self) -> &[DynamicBody] {
        &self.bodies
    }
}

impl SpatialQuery for ObstacleWorld {
    fn raycast(&self, origin: Vec2, dir: Vec2, max_distance: f32, mask: CollisionLayers) -> Option<RayHit> {
        let dir = dir.try_normalize()?;
        let mut best: Option<RayHit> = None;

        let mut consider = |distance: f32, collider: ColliderId| {
            if best.map_or(true, |hit| distance < hit.distance) {
                best = Some(RayHit {
                    distance,
                    point: origin + dir * distance,
                    collider,
                });
            }
        };

        for obstacle in self.obstacles.iter().filter(|o| mask.intersects(o.layer)) {
            if let Some(distance) = obstacle.shape.ray_distance(origin, dir, max_distance) {
                consider(distance, ColliderId::Obstacle(obstacle.id));
            }
        }

        for body in self.bodies.iter().filter(|b| mask.intersects(b.layer)) {
            if let Some(distance) = ray_circle(origin, dir, max_distance, body.center, body.radius) {
                consider(distance, ColliderId::Body(body.entity));
            }
        }

        best
    }

    fn overlap_circle(&self, center: Vec2, radius: f32, mask: CollisionLayers) -> bool {
        let statics = self
            .obstacles
            .iter()
            .filter(|o| mask.intersects(o.layer))
            .any(|o| o.shape.distance_to_point(center) < radius);

        statics
            || self
                .bodies
                .iter()
                .filter(|b| mask.intersects(b.layer))
                .any(|b| (b.center - center).length() < b.radius + radius)
    }

    fn surface_distance(&self, point: Vec2, collider: ColliderId) -> Option<f32> {
        match collider {
            ColliderId::Obstacle(id) => self
                .obstacles
                .iter()
                .find(|o| o.id == id)
                .map(|o| o.shape.distance_to_point(point)),
            ColliderId::Body(entity) => self
                .bodies
                .iter()
                .find(|b| b.entity == entity)
                .map(|b| ((point - b.center).length() - b.radius).max(0.0)),
        }
    }
}

fn ray_circle(origin: Vec2, dir: Vec2, max_distance: f32, center: Vec2, radius: f32) -> Option<f32> {
    let m = origin - center;
    let b = m.dot(dir);
    let c = m.length_squared() - radius * radius;

    // Луч снаружи и смотрит от круга
    if c > 0.0 && b > 0.0 {
        return None;
    }

    let discriminant = b * b - c;
    if discriminant < 0.0 {
        return None;
    }

    let t = (-b - discriminant.sqrt()).max(0.0);
    (t <= max_distance).then_some(t)
}

fn ray_aabb(origin: Vec2, dir: Vec2, max_distance: f32, min: Vec2, max: Vec2) -> Option<f32> {
    let mut t_min = 0.0_f32;
    let mut t_max = max_distance;

    for axis in 0..2 {
        let (o, d, lo, hi) = (origin[axis], dir[axis], min[axis], max[axis]);
        if d.abs() < 1e-8 {
            if o < lo || o > hi {
                return None;
            }
            continue;
        }

        let inv = 1.0 / d;
        let mut t1 = (lo - o) * inv;
        let mut t2 = (hi - o) * inv;
        if t1 > t2 {
            std::mem::swap(&mut t1, &mut t2);
        }
        t_min = t_min.max(t1);
        t_max = t_max.min(t2);
        if t_min > t_max {
            return None;
        }
    }

    Some(t_min)
}
