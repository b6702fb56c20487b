//! Property-based тесты (proptest)
//!
//! - grid совпадает с независимым overlap-тестом
//! - путь никогда не режет угол стены и не проходит через стену
//! - планировщик детерминирован
//! - реестры арбитра согласованы при любой последовательности запросов

use bevy::prelude::*;
use horde_simulation::ai::AIStateKind;
use horde_simulation::combat::{ArbiterSettings, CombatArbiter};
use horde_simulation::navigation::planner::step_allowed;
use horde_simulation::navigation::{
    find_path, walkable_at, CollisionLayers, GridSettings, NavigationGrid, ObstacleWorld, PlannerSettings,
};
use proptest::prelude::*;

fn settings() -> GridSettings {
    GridSettings {
        world_min: [0.0, 0.0],
        world_max: [16.0, 16.0],
        cell_radius: 0.5,
        padding: 0.1,
        ..Default::default()
    }
}

/// Случайный набор стен внутри арены 16×16
fn walls() -> impl Strategy<Value = Vec<(f32, f32, f32, f32)>> {
    prop::collection::vec((0.0f32..15.0, 0.0f32..15.0, 0.3f32..4.0, 0.3f32..4.0), 0..8)
}

fn obstacles_from(boxes: &[(f32, f32, f32, f32)]) -> ObstacleWorld {
    let mut obstacles = ObstacleWorld::new();
    for &(x, y, w, h) in boxes {
        obstacles.add_box(Vec2::new(x, y), Vec2::new(x + w, y + h), CollisionLayers::WALLS);
    }
    obstacles
}

fn point() -> impl Strategy<Value = Vec2> {
    (0.1f32..15.9, 0.1f32..15.9).prop_map(|(x, y)| Vec2::new(x, y))
}

#[derive(Debug, Clone)]
enum ArbiterOp {
    Token(u32),
    ReleaseToken(u32),
    Enter(u32, AIStateKind),
    Exit(u32, AIStateKind),
    Slot(u32, f32),
    ReleaseSlot(u32),
    Opposite(u32),
    Swap(u32, u32),
    Aware(u32),
    Retreat(u32, f32),
    ReleaseAll(u32),
}

fn kind() -> impl Strategy<Value = AIStateKind> {
    prop_oneof![
        Just(AIStateKind::BlindSpotSeek),
        Just(AIStateKind::Feint),
        Just(AIStateKind::Surround),
        Just(AIStateKind::Chase),
    ]
}

fn op() -> impl Strategy<Value = ArbiterOp> {
    let agent = 0u32..10;
    prop_oneof![
        agent.clone().prop_map(ArbiterOp::Token),
        agent.clone().prop_map(ArbiterOp::ReleaseToken),
        (agent.clone(), kind()).prop_map(|(a, k)| ArbiterOp::Enter(a, k)),
        (agent.clone(), kind()).prop_map(|(a, k)| ArbiterOp::Exit(a, k)),
        (agent.clone(), 0.0f32..360.0).prop_map(|(a, angle)| ArbiterOp::Slot(a, angle)),
        agent.clone().prop_map(ArbiterOp::ReleaseSlot),
        agent.clone().prop_map(ArbiterOp::Opposite),
        (agent.clone(), agent.clone()).prop_map(|(a, b)| ArbiterOp::Swap(a, b)),
        agent.clone().prop_map(ArbiterOp::Aware),
        (agent.clone(), 0.0f32..360.0).prop_map(|(a, angle)| ArbiterOp::Retreat(a, angle)),
        agent.prop_map(ArbiterOp::ReleaseAll),
    ]
}

fn direction(degrees: f32) -> Vec2 {
    Vec2::from_angle(degrees.to_radians())
}

proptest! {
    #[test]
    fn grid_matches_overlap_test(boxes in walls()) {
        let settings = settings();
        let obstacles = obstacles_from(&boxes);
        let grid = NavigationGrid::from_settings(&settings, &obstacles).unwrap();

        prop_assert_eq!(grid.nodes().len() as i32, grid.width() * grid.height());
        for node in grid.nodes() {
            prop_assert_eq!(node.walkable, walkable_at(&settings, &obstacles, node.world_position));
        }
    }

    #[test]
    fn path_never_cuts_corners(boxes in walls(), start in point(), goal in point()) {
        let obstacles = obstacles_from(&boxes);
        let grid = NavigationGrid::from_settings(&settings(), &obstacles).unwrap();

        let path = find_path(&grid, &PlannerSettings::default(), start, goal);

        for pair in path.cells.windows(2) {
            let offset = pair[1] - pair[0];
            prop_assert!(offset.x.abs() <= 1 && offset.y.abs() <= 1, "jump {:?} -> {:?}", pair[0], pair[1]);
            prop_assert!(step_allowed(&grid, pair[0], offset), "illegal step {:?} -> {:?}", pair[0], pair[1]);
        }
        // Кроме стартовой клетки (агент мог оказаться в стене), все клетки пути проходимы
        for cell in path.cells.iter().skip(1) {
            prop_assert!(grid.is_walkable(*cell));
        }
    }

    #[test]
    fn path_is_deterministic(boxes in walls(), start in point(), goal in point()) {
        let obstacles = obstacles_from(&boxes);
        let grid = NavigationGrid::from_settings(&settings(), &obstacles).unwrap();
        let planner = PlannerSettings::default();

        let first = find_path(&grid, &planner, start, goal);
        let second = find_path(&grid, &planner, start, goal);

        prop_assert_eq!(first.cells, second.cells);
        prop_assert_eq!(first.waypoints, second.waypoints);
        prop_assert_eq!(first.cost, second.cost);
        prop_assert_eq!(first.partial, second.partial);
    }

    #[test]
    fn arbiter_registries_stay_consistent(ops in prop::collection::vec(op(), 1..120)) {
        let settings = ArbiterSettings::default();
        let capacity = settings.token_capacity;
        let mut arbiter = CombatArbiter::new(settings);
        arbiter.track_target(Vec2::ZERO);
        let entity = |id: u32| Entity::from_raw(id + 1);

        for op in ops {
            match op {
                ArbiterOp::Token(a) => { arbiter.request_token(entity(a)); }
                ArbiterOp::ReleaseToken(a) => { arbiter.release_token(entity(a)); }
                ArbiterOp::Enter(a, k) => { arbiter.enter_state(entity(a), k); }
                ArbiterOp::Exit(a, k) => arbiter.exit_state(entity(a), k),
                ArbiterOp::Slot(a, angle) => { arbiter.assign_slot(entity(a), direction(angle) * 3.0); }
                ArbiterOp::ReleaseSlot(a) => { arbiter.release_slot(entity(a)); }
                ArbiterOp::Opposite(a) => {
                    if let Some(index) = arbiter.find_opposite_slot(entity(a)) {
                        arbiter.move_to_slot(entity(a), index);
                    }
                }
                ArbiterOp::Swap(a, b) => { arbiter.swap_slots(entity(a), entity(b)); }
                ArbiterOp::Aware(a) => { arbiter.register_aware(entity(a)); }
                ArbiterOp::Retreat(a, angle) => { arbiter.reserve_retreat_direction(entity(a), direction(angle)); }
                ArbiterOp::ReleaseAll(a) => arbiter.release_all(entity(a)),
            }

            prop_assert!(arbiter.token_holder_count() <= capacity);
            for k in [AIStateKind::BlindSpotSeek, AIStateKind::Feint, AIStateKind::Surround] {
                if let Some(max) = arbiter.quota(k) {
                    prop_assert!(arbiter.occupants(k) <= max);
                }
            }

            // Слоты ↔ slot_of согласованы
            let mut seen = std::collections::BTreeSet::new();
            for slot in arbiter.slots() {
                if let Some(occupant) = slot.occupant {
                    prop_assert!(seen.insert(occupant), "{:?} holds two slots", occupant);
                    prop_assert_eq!(arbiter.slot_of(occupant), Some(slot.index));
                }
            }
            for id in 0..10 {
                if let Some(index) = arbiter.slot_of(entity(id)) {
                    prop_assert_eq!(arbiter.slots()[index].occupant, Some(entity(id)));
                }
            }

            // Секторы отступления уникальны
            let sectors: Vec<usize> = (0..10).filter_map(|id| arbiter.retreat_sector_of(entity(id))).collect();
            let unique: std::collections::BTreeSet<usize> = sectors.iter().copied().collect();
            prop_assert_eq!(unique.len(), sectors.len());
        }

        // release_all всех → реестры пусты
        for id in 0..10 {
            arbiter.release_all(entity(id));
        }
        prop_assert_eq!(arbiter.token_holder_count(), 0);
        prop_assert_eq!(arbiter.aware_count(), 0);
        prop_assert!(arbiter.slots().iter().all(|slot| slot.occupant.is_none()));
    }
}
