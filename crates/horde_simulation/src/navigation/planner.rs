//! PathPlanner — A* по NavigationGrid
//!
//! Архитектура:
//! - Целочисленные стоимости: прямой шаг 10, диагональ 14, octile-эвристика в тех же единицах
//! - Strict corner-cutting: диагональ запрещена, если хотя бы одна из двух ортогональных клеток стена
//! - Wall-clearance penalty по числу непроходимых соседей (start/goal освобождены)
//! - Недостижимая цель → partial path к ближайшей (евклидово) посещённой клетке
//! - Непроходимые start/goal → BFS к ближайшей проходимой клетке (с лимитом посещений)
//!
//! Всё состояние поиска (g, parent, open/closed) локально для вызова: много агентов
//! могут планировать в одном тике по одному &NavigationGrid без перекрёстного влияния.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet, VecDeque};

use super::grid::{NavigationGrid, NEIGHBOR_OFFSETS};

/// Стоимость ортогонального шага
pub const STRAIGHT_COST: u32 = 10;
/// Стоимость диагонального шага (≈ 10·√2)
pub const DIAGONAL_COST: u32 = 14;

/// Параметры планировщика
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerSettings {
    /// ≥1 непроходимый сосед
    pub wall_penalty_low: u32,
    /// ≥2 непроходимых соседа
    pub wall_penalty_medium: u32,
    /// ≥3 непроходимых соседа
    pub wall_penalty_high: u32,
    /// Лимит посещённых клеток при BFS-ремонте start/goal
    pub repair_visit_cap: usize,
}

impl Default for PlannerSettings {
    fn default() -> Self {
        Self {
            wall_penalty_low: 4,
            wall_penalty_medium: 12,
            wall_penalty_high: 30,
            repair_visit_cap: 400,
        }
    }
}

/// Результат запроса (принадлежит агенту, заменяется целиком при перепланировании)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Path {
    /// Waypoints в мире (без клетки старта)
    pub waypoints: Vec<Vec2>,
    /// Клетки пути, включая стартовую
    pub cells: Vec<IVec2>,
    /// Суммарная A*-стоимость (g последней клетки)
    pub cost: u32,
    /// true — цель недостижима, путь ведёт к ближайшей достижимой клетке
    pub partial: bool,
}

impl Path {
    pub fn is_empty(&self) -> bool {
        self.waypoints.is_empty()
    }

    pub fn len(&self) -> usize {
        self.waypoints.len()
    }

    pub fn last_waypoint(&self) -> Option<Vec2> {
        self.waypoints.last().copied()
    }
}

/// Octile-эвристика в целых единицах (допустима при STRAIGHT/DIAGONAL = 10/14)
pub fn octile_heuristic(a: IVec2, b: IVec2) -> u32 {
    let d = (a - b).abs();
    let (low, high) = (d.x.min(d.y) as u32, d.x.max(d.y) as u32);
    DIAGONAL_COST * low + STRAIGHT_COST * (high - low)
}

/// Можно ли шагнуть из `from` на `offset` (проходимость + strict corner rule)
pub fn step_allowed(grid: &NavigationGrid, from: IVec2, offset: IVec2) -> bool {
    let to = from + offset;
    if !grid.is_walkable(to) {
        return false;
    }
    if offset.x != 0 && offset.y != 0 {
        let side_a = from + IVec2::new(offset.x, 0);
        let side_b = from + IVec2::new(0, offset.y);
        return grid.is_walkable(side_a) && grid.is_walkable(side_b);
    }
    true
}

/// BFS от клетки к ближайшей проходимой (порядок соседей фиксирован → детерминизм)
pub fn nearest_walkable(grid: &NavigationGrid, cell: IVec2, visit_cap: usize) -> Option<IVec2> {
    if grid.is_walkable(cell) {
        return Some(cell);
    }

    let mut queue = VecDeque::from([cell]);
    let mut visited = HashSet::from([cell]);

    while let Some(current) = queue.pop_front() {
        if grid.is_walkable(current) {
            return Some(current);
        }
        if visited.len() >= visit_cap {
            break;
        }
        for offset in NEIGHBOR_OFFSETS {
            let next = current + offset;
            if grid.in_bounds(next) && visited.insert(next) {
                queue.push_back(next);
            }
        }
    }

    None
}

/// Один A*-запрос: вся bookkeeping живёт здесь и умирает вместе с вызовом
struct Search<'a> {
    grid: &'a NavigationGrid,
    settings: &'a PlannerSettings,
    start: IVec2,
    goal: IVec2,
}

impl Search<'_> {
    fn wall_penalty(&self, cell: IVec2) -> u32 {
        if cell == self.start || cell == self.goal {
            return 0;
        }
        match self.grid.unwalkable_neighbor_count(cell) {
            0 => 0,
            1 => self.settings.wall_penalty_low,
            2 => self.settings.wall_penalty_medium,
            _ => self.settings.wall_penalty_high,
        }
    }

    fn step_cost(&self, to: IVec2, offset: IVec2) -> u32 {
        let base = if offset.x != 0 && offset.y != 0 {
            DIAGONAL_COST
        } else {
            STRAIGHT_COST
        };
        base + self.wall_penalty(to)
    }

    /// Возвращает (cells, cost, reached_goal)
    fn run(&self) -> Option<(Vec<IVec2>, u32, bool)> {
        // Heap key: (f, h, y, x) — полный порядок, без float ties
        let mut open: BinaryHeap<Reverse<(u32, u32, i32, i32)>> = BinaryHeap::new();
        let mut g_score: HashMap<IVec2, u32> = HashMap::new();
        let mut came_from: HashMap<IVec2, IVec2> = HashMap::new();
        let mut closed: HashSet<IVec2> = HashSet::new();

        let start_h = octile_heuristic(self.start, self.goal);
        open.push(Reverse((start_h, start_h, self.start.y, self.start.x)));
        g_score.insert(self.start, 0);

        let goal_world = self.grid.cell_center(self.goal);
        let mut closest = (self.start, (self.grid.cell_center(self.start) - goal_world).length());

        while let Some(Reverse((_, _, y, x))) = open.pop() {
            let current = IVec2::new(x, y);
            if !closed.insert(current) {
                continue;
            }

            if current == self.goal {
                let cost = g_score.get(&current).copied().unwrap_or(0);
                return Some((reconstruct(&came_from, current), cost, true));
            }

            let distance = (self.grid.cell_center(current) - goal_world).length();
            if distance < closest.1 {
                closest = (current, distance);
            }

            let current_g = g_score.get(&current).copied().unwrap_or(u32::MAX);
            for offset in NEIGHBOR_OFFSETS {
                if !step_allowed(self.grid, current, offset) {
                    continue;
                }
                let next = current + offset;
                if closed.contains(&next) {
                    continue;
                }

                let tentative = current_g.saturating_add(self.step_cost(next, offset));
                if tentative < g_score.get(&next).copied().unwrap_or(u32::MAX) {
                    g_score.insert(next, tentative);
                    came_from.insert(next, current);
                    let h = octile_heuristic(next, self.goal);
                    open.push(Reverse((tentative.saturating_add(h), h, next.y, next.x)));
                }
            }
        }

        // Цель не раскрыта: partial path к ближайшей посещённой клетке
        let (best, _) = closest;
        if best == self.start {
            return None;
        }
        let cost = g_score.get(&best).copied().unwrap_or(0);
        Some((reconstruct(&came_from, best), cost, false))
    }
}

fn reconstruct(came_from: &HashMap<IVec2, IVec2>, end: IVec2) -> Vec<IVec2> {
    let mut cells = vec![end];
    let mut current = end;
    while let Some(&previous) = came_from.get(&current) {
        cells.push(previous);
        current = previous;
    }
    cells.reverse();
    cells
}

/// Найти путь из `start` в `goal` (мировые координаты)
///
/// - Непостроенный grid → пустой путь (все клетки непроходимы)
/// - Та же клетка → `[goal]`
/// - Последний waypoint полного пути — точный `goal` (если клетка цели не ремонтировалась)
/// - Пустой результат = движение стоит на месте и ждёт следующего интервала перепланирования
pub fn find_path(grid: &NavigationGrid, settings: &PlannerSettings, start: Vec2, goal: Vec2) -> Path {
    let (Some(raw_start), Some(raw_goal)) = (grid.world_to_cell(start), grid.world_to_cell(goal)) else {
        return Path::default();
    };

    let Some(start_cell) = nearest_walkable(grid, raw_start, settings.repair_visit_cap) else {
        return Path::default();
    };
    let Some(goal_cell) = nearest_walkable(grid, raw_goal, settings.repair_visit_cap) else {
        return Path::default();
    };
    let goal_repaired = goal_cell != raw_goal;
    let final_point = if goal_repaired {
        grid.cell_center(goal_cell)
    } else {
        goal
    };

    if start_cell == goal_cell {
        return Path {
            waypoints: vec![final_point],
            cells: vec![goal_cell],
            cost: 0,
            partial: false,
        };
    }

    let search = Search {
        grid,
        settings,
        start: start_cell,
        goal: goal_cell,
    };

    let Some((cells, cost, reached)) = search.run() else {
        return Path {
            partial: true,
            ..Path::default()
        };
    };

    let mut waypoints: Vec<Vec2> = cells.iter().skip(1).map(|c| grid.cell_center(*c)).collect();
    if reached {
        if let Some(last) = waypoints.last_mut() {
            *last = final_point;
        }
    }

    Path {
        waypoints,
        cells,
        cost,
        partial: !reached,
    }
}

/// Стоимость перехода между соседними клетками пути (для проверок и отладки)
pub fn transition_cost(
    grid: &NavigationGrid,
    settings: &PlannerSettings,
    path: &Path,
    index: usize,
) -> Option<u32> {
    let from = *path.cells.get(index)?;
    let to = *path.cells.get(index + 1)?;
    let offset = to - from;
    if offset.x.abs() > 1 || offset.y.abs() > 1 || offset == IVec2::ZERO {
        return None;
    }
    let search = Search {
        grid,
        settings,
        start: *path.cells.first()?,
        goal: *path.cells.last()?,
    };
    Some(search.step_cost(to, offset))
}
