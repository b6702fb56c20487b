//! NavigationGrid — растр проходимости арены
//!
//! Архитектура:
//! - Фиксированное разрешение (cell_radius) на build; размеры не меняются до следующего build
//! - Проходимость = нет пересечения круга (центр клетки, radius + padding) со статикой из obstacle_mask
//! - Per-layer override радиуса: разные классы препятствий дают разный clearance
//! - Rebuild целиком (никаких точечных мутаций узлов); ошибка build НЕ трогает старый grid
//! - Во время обычной работы grid read-only: планировщик берёт &NavigationGrid

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use super::layers::CollisionLayers;
use super::obstacles::ObstacleWorld;
use crate::error::{NavResult, NavigationError};

/// Узел сетки (immutable после build)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridNode {
    pub walkable: bool,
    pub world_position: Vec2,
    pub grid_x: i32,
    pub grid_y: i32,
}

/// Override радиуса теста для конкретного слоя
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LayerRadiusOverride {
    pub layer: CollisionLayers,
    pub radius: f32,
}

/// Параметры build (worldBounds, cellRadius, obstacleMask, padding, overrides, cap)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridSettings {
    /// Нижний левый угол арены (x, y)
    pub world_min: [f32; 2],
    /// Верхний правый угол арены (x, y)
    pub world_max: [f32; 2],
    /// Половина размера клетки
    pub cell_radius: f32,
    /// Добавка к радиусу теста (агенты не "обнимают" стены)
    pub padding: f32,
    /// Какие слои блокируют клетки
    pub obstacle_mask: CollisionLayers,
    /// Per-layer радиус теста вместо cell_radius
    pub layer_radius_overrides: Vec<LayerRadiusOverride>,
    /// Лимит клеток (bound на память)
    pub max_cells: usize,
}

impl Default for GridSettings {
    fn default() -> Self {
        Self {
            world_min: [-25.0, -25.0],
            world_max: [25.0, 25.0],
            cell_radius: 0.5,
            padding: 0.2,
            obstacle_mask: CollisionLayers::WALLS,
            layer_radius_overrides: Vec::new(),
            max_cells: 250_000,
        }
    }
}

impl GridSettings {
    pub fn min(&self) -> Vec2 {
        Vec2::from(self.world_min)
    }

    pub fn max(&self) -> Vec2 {
        Vec2::from(self.world_max)
    }

    /// Радиус overlap-теста для слоя (override или cell_radius) + padding
    pub fn test_radius(&self, layer: CollisionLayers) -> f32 {
        let base = self
            .layer_radius_overrides
            .iter()
            .find(|o| o.layer.intersects(layer))
            .map(|o| o.radius)
            .unwrap_or(self.cell_radius);
        base + self.padding
    }

    /// Проверка параметров build → (width, height) в клетках
    pub fn validate(&self) -> NavResult<(i32, i32)> {
        if !self.cell_radius.is_finite() || self.cell_radius <= 0.0 {
            return Err(NavigationError::DegenerateParameters(format!(
                "cell_radius must be positive, got {}",
                self.cell_radius
            )));
        }
        if !self.padding.is_finite() || self.padding < 0.0 {
            return Err(NavigationError::DegenerateParameters(format!(
                "padding must be non-negative, got {}",
                self.padding
            )));
        }

        let size = self.max() - self.min();
        if !(size.x > 0.0 && size.y > 0.0) {
            return Err(NavigationError::DegenerateParameters(format!(
                "world bounds are empty: {:?}..{:?}",
                self.world_min, self.world_max
            )));
        }

        let diameter = self.cell_radius * 2.0;
        let width = (size.x / diameter).ceil();
        let height = (size.y / diameter).ceil();
        let requested = width as f64 * height as f64;
        if requested > self.max_cells as f64 {
            return Err(NavigationError::TooManyCells {
                requested: requested.min(usize::MAX as f64) as usize,
                cap: self.max_cells,
            });
        }

        Ok((width as i32, height as i32))
    }
}

/// Независимый overlap-тест проходимости точки (тот же критерий, что и в build)
pub fn walkable_at(settings: &GridSettings, obstacles: &ObstacleWorld, point: Vec2) -> bool {
    !obstacles
        .obstacles()
        .iter()
        .filter(|o| settings.obstacle_mask.intersects(o.layer))
        .any(|o| o.shape.distance_to_point(point) < settings.test_radius(o.layer))
}

/// Растр проходимости (Resource, shared singleton сессии)
///
/// Инвариант: nodes.len() == width * height, индексация row-major (y * width + x).
#[derive(Resource, Debug, Clone, Default)]
pub struct NavigationGrid {
    nodes: Vec<GridNode>,
    width: i32,
    height: i32,
    cell_radius: f32,
    origin: Vec2,
    built: bool,
    /// Счётчик успешных build'ов (агенты сбрасывают пути при смене)
    generation: u32,
}

/// 8 соседей: (dx, dy)
pub const NEIGHBOR_OFFSETS: [IVec2; 8] = [
    IVec2::new(1, 0),
    IVec2::new(-1, 0),
    IVec2::new(0, 1),
    IVec2::new(0, -1),
    IVec2::new(1, 1),
    IVec2::new(-1, 1),
    IVec2::new(1, -1),
    IVec2::new(-1, -1),
];

impl NavigationGrid {
    /// Построить grid; при ошибке self не меняется
    pub fn build(&mut self, settings: &GridSettings, obstacles: &ObstacleWorld) -> NavResult<()> {
        let (width, height) = settings.validate()?;
        let origin = settings.min();
        let diameter = settings.cell_radius * 2.0;

        let mut nodes = Vec::with_capacity((width * height) as usize);
        for grid_y in 0..height {
            for grid_x in 0..width {
                let world_position = origin
                    + Vec2::new(
                        (grid_x as f32 + 0.5) * diameter,
                        (grid_y as f32 + 0.5) * diameter,
                    );
                nodes.push(GridNode {
                    walkable: walkable_at(settings, obstacles, world_position),
                    world_position,
                    grid_x,
                    grid_y,
                });
            }
        }

        let blocked = nodes.iter().filter(|n| !n.walkable).count();

        self.nodes = nodes;
        self.width = width;
        self.height = height;
        self.cell_radius = settings.cell_radius;
        self.origin = origin;
        self.built = true;
        self.generation = self.generation.wrapping_add(1);

        crate::logger::log_info(&format!(
            "🧭 NavigationGrid built: {}x{} cells, {} blocked (generation {})",
            width, height, blocked, self.generation
        ));

        Ok(())
    }

    /// Построить новый grid (удобно для тестов)
    pub fn from_settings(settings: &GridSettings, obstacles: &ObstacleWorld) -> NavResult<Self> {
        let mut grid = Self::default();
        grid.build(settings, obstacles)?;
        Ok(grid)
    }

    pub fn is_built(&self) -> bool {
        self.built
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }

    pub fn cell_size(&self) -> f32 {
        self.cell_radius * 2.0
    }

    pub fn nodes(&self) -> &[GridNode] {
        &self.nodes
    }

    pub fn in_bounds(&self, cell: IVec2) -> bool {
        cell.x >= 0 && cell.y >= 0 && cell.x < self.width && cell.y < self.height
    }

    pub fn node(&self, cell: IVec2) -> Option<&GridNode> {
        if !self.built || !self.in_bounds(cell) {
            return None;
        }
        self.nodes.get((cell.y * self.width + cell.x) as usize)
    }

    /// Непостроенный grid / клетка вне сетки — непроходимы
    pub fn is_walkable(&self, cell: IVec2) -> bool {
        self.node(cell).is_some_and(|n| n.walkable)
    }

    /// World → клетка с clamp к ближайшему краю. None только если grid не построен.
    pub fn world_to_cell(&self, point: Vec2) -> Option<IVec2> {
        if !self.built {
            return None;
        }
        let local = (point - self.origin) / self.cell_size();
        let x = (local.x.floor() as i32).clamp(0, self.width - 1);
        let y = (local.y.floor() as i32).clamp(0, self.height - 1);
        Some(IVec2::new(x, y))
    }

    pub fn cell_center(&self, cell: IVec2) -> Vec2 {
        self.origin + (cell.as_vec2() + Vec2::splat(0.5)) * self.cell_size()
    }

    pub fn is_walkable_world(&self, point: Vec2) -> bool {
        self.world_to_cell(point).is_some_and(|cell| self.is_walkable(cell))
    }

    /// Сколько из 8 соседей непроходимы (край сетки считается стеной)
    pub fn unwalkable_neighbor_count(&self, cell: IVec2) -> u8 {
        NEIGHBOR_OFFSETS
            .iter()
            .filter(|offset| !self.is_walkable(cell + **offset))
            .count() as u8
    }
}
