//! Tests for steering behaviors and blender.

#[cfg(test)]
mod tests {
    use bevy::prelude::*;
    use std::collections::BTreeSet;

    use super::super::behaviors::*;
    use super::super::blender::{BlendMode, SteeringBlender};
    use super::super::formation::{FormationLayout, FormationRegistry};
    use super::super::SteeringSettings;
    use crate::navigation::{CollisionLayers, GridSettings, NavigationGrid, ObstacleWorld};

    const ME: Entity = Entity::PLACEHOLDER;

    fn kinematics(position: Vec2, velocity: Vec2) -> AgentKinematics {
        AgentKinematics {
            entity: ME,
            position,
            velocity,
            facing: Vec2::X,
            faction_id: 1,
        }
    }

    fn context<'a>(
        agent: AgentKinematics,
        params: &'a SteeringAgent,
        world: &'a ObstacleWorld,
        grid: &'a NavigationGrid,
        neighbors: &'a [NeighborInfo],
        formations: &'a FormationRegistry,
        target_body: Option<Entity>,
    ) -> SteeringContext<'a> {
        SteeringContext {
            agent,
            params,
            spatial: world,
            grid,
            neighbors,
            target_body,
            formations,
            dt: 1.0 / 60.0,
        }
    }

    fn neighbor(index: u32, position: Vec2, velocity: Vec2) -> NeighborInfo {
        NeighborInfo {
            entity: Entity::from_raw(100 + index),
            position,
            velocity,
            radius: 0.4,
            faction_id: 1,
            instance_priority: 0,
            is_static: false,
        }
    }

    fn separation() -> Separation {
        Separation {
            weight: 1.0,
            enabled: true,
            radius: 1.2,
            hard_minimum: 0.6,
            emergency_multiplier: 3.0,
            prediction_horizon: 0.3,
            static_radius_multiplier: 1.5,
            static_speed_threshold: 0.2,
            parallel_threshold: 0.9,
            crowd_threshold: 3,
            crowd_multiplier: 1.5,
            right_of_way_factor: 0.25,
        }
    }

    fn avoidance() -> ObstacleAvoidance {
        ObstacleAvoidance {
            weight: 1.0,
            enabled: true,
            ray_count: 16,
            detection_distance: 2.0,
            interest_weight: 1.0,
            danger_weight: 2.0,
            mask: CollisionLayers::AVOIDANCE_MASK,
            desired_direction: Some(Vec2::X),
        }
    }

    fn arena_grid(world: &ObstacleWorld) -> NavigationGrid {
        let settings = GridSettings {
            world_min: [-10.0, -10.0],
            world_max: [10.0, 10.0],
            cell_radius: 0.5,
            padding: 0.2,
            obstacle_mask: CollisionLayers::WALLS,
            ..Default::default()
        };
        NavigationGrid::from_settings(&settings, world).unwrap()
    }

    #[test]
    fn test_seek_arrival_damping() {
        let params = SteeringAgent::default();
        let (world, grid, formations) = (ObstacleWorld::new(), NavigationGrid::default(), FormationRegistry::default());
        let ctx = context(kinematics(Vec2::ZERO, Vec2::ZERO), &params, &world, &grid, &[], &formations, None);

        let mut seek = Seek {
            weight: 1.0,
            enabled: true,
            target: Some(Vec2::new(0.5, 0.0)),
            arrival_radius: 1.0,
        };
        let damped = seek.compute(&ctx);
        assert!((damped - Vec2::new(params.max_speed * 0.5, 0.0)).length() < 1e-5);

        seek.arrival_radius = 0.0;
        let full = seek.compute(&ctx);
        assert!((full - Vec2::new(params.max_speed, 0.0)).length() < 1e-5);
    }

    #[test]
    fn test_flee_only_inside_panic_distance() {
        let params = SteeringAgent::default();
        let (world, grid, formations) = (ObstacleWorld::new(), NavigationGrid::default(), FormationRegistry::default());
        let ctx = context(kinematics(Vec2::ZERO, Vec2::ZERO), &params, &world, &grid, &[], &formations, None);

        let mut flee = Flee {
            weight: 1.0,
            enabled: true,
            threat: Some(Vec2::new(5.0, 0.0)),
            panic_distance: 3.0,
            bias: Vec2::ZERO,
            bias_weight: 0.0,
        };
        assert_eq!(flee.compute(&ctx), Vec2::ZERO);

        flee.threat = Some(Vec2::new(2.0, 0.0));
        let pure = flee.compute(&ctx);
        assert!(pure.x < 0.0 && pure.y.abs() < 1e-5);

        // Персональный bias разводит убегающих
        flee.bias = Vec2::Y;
        flee.bias_weight = 0.5;
        let biased = flee.compute(&ctx);
        assert!(biased.x < 0.0 && biased.y > 0.0);
        assert!((biased.length() - params.max_speed).abs() < 1e-4);
    }

    #[test]
    fn test_wander_is_deterministic_per_seed() {
        let params = SteeringAgent::default();
        let (world, grid, formations) = (ObstacleWorld::new(), NavigationGrid::default(), FormationRegistry::default());
        let ctx = context(kinematics(Vec2::ZERO, Vec2::X), &params, &world, &grid, &[], &formations, None);

        let mut a = Wander::new(2.0, 1.0, 3.0, 7);
        let mut b = Wander::new(2.0, 1.0, 3.0, 7);
        for _ in 0..20 {
            assert_eq!(a.compute(&ctx), b.compute(&ctx));
        }
    }

    #[test]
    fn test_avoidance_steers_around_wall() {
        let mut world = ObstacleWorld::new();
        world.add_box(Vec2::new(1.0, -5.0), Vec2::new(2.0, 5.0), CollisionLayers::WALLS);
        let grid = arena_grid(&world);
        let formations = FormationRegistry::default();
        let params = SteeringAgent::default();
        let ctx = context(kinematics(Vec2::ZERO, Vec2::ZERO), &params, &world, &grid, &[], &formations, None);

        let behavior = avoidance();
        let choice = behavior.evaluate(&ctx).unwrap();

        // Прямо: стена на 1 м из 2 → danger 0.5
        assert!((choice.max_danger - 0.5).abs() < 1e-4);
        // Лучший луч уходит от стены вбок, но сохраняет продвижение вперёд
        assert!(choice.direction.x > 0.0 && choice.direction.x < 0.5);

        let force = avoidance().compute(&ctx);
        assert!((force.length() - params.max_acceleration * 0.5).abs() < 1e-3);
    }

    #[test]
    fn test_avoidance_ignores_target_and_walkable_props() {
        let target = Entity::from_raw(42);
        let mut world = ObstacleWorld::new();
        world.upsert_body(target, Vec2::new(1.0, 0.0), 0.5, CollisionLayers::TARGET);
        // Проп не в obstacle_mask grid'а → клетка проходима
        world.add_circle(Vec2::new(0.0, 1.2), 0.3, CollisionLayers::PROPS);
        let grid = arena_grid(&world);
        let formations = FormationRegistry::default();
        let params = SteeringAgent::default();
        let ctx = context(kinematics(Vec2::ZERO, Vec2::ZERO), &params, &world, &grid, &[], &formations, Some(target));

        assert_eq!(avoidance().compute(&ctx), Vec2::ZERO);
    }

    #[test]
    fn test_separation_pushes_apart_same_faction_only() {
        let params = SteeringAgent::default();
        let (world, grid, formations) = (ObstacleWorld::new(), NavigationGrid::default(), FormationRegistry::default());

        let neighbors = [neighbor(0, Vec2::new(0.5, 0.0), Vec2::ZERO)];
        let ctx = context(kinematics(Vec2::ZERO, Vec2::ZERO), &params, &world, &grid, &neighbors, &formations, None);
        let force = separation().compute(&ctx);
        assert!(force.x < 0.0 && force.y.abs() < 1e-5);

        let mut enemy = neighbors[0];
        enemy.faction_id = 2;
        let enemies = [enemy];
        let ctx = context(kinematics(Vec2::ZERO, Vec2::ZERO), &params, &world, &grid, &enemies, &formations, None);
        assert_eq!(separation().compute(&ctx), Vec2::ZERO);
    }

    #[test]
    fn test_separation_emergency_inside_hard_minimum() {
        let params = SteeringAgent::default();
        let (world, grid, formations) = (ObstacleWorld::new(), NavigationGrid::default(), FormationRegistry::default());

        let moving = Vec2::new(0.0, 1.0);
        let near = [neighbor(0, Vec2::new(0.5, 0.0), moving)];
        let far = [neighbor(0, Vec2::new(0.7, 0.0), moving)];
        let me = kinematics(Vec2::ZERO, moving);

        let near_force = separation().compute(&context(me, &params, &world, &grid, &near, &formations, None));
        let far_force = separation().compute(&context(me, &params, &world, &grid, &far, &formations, None));

        // Линейное ослабление дало бы near/far = 0.7/0.5; emergency multiplier усиливает ×3
        let ratio = near_force.length() / far_force.length();
        assert!((ratio - 3.0 * 0.7 / 0.5).abs() < 1e-3, "ratio {}", ratio);
    }

    #[test]
    fn test_separation_crowd_multiplier() {
        let params = SteeringAgent::default();
        let (world, grid, formations) = (ObstacleWorld::new(), NavigationGrid::default(), FormationRegistry::default());
        let me = kinematics(Vec2::ZERO, Vec2::ZERO);

        let pair: Vec<NeighborInfo> = (0..2).map(|i| neighbor(i, Vec2::new(1.0, 0.0), Vec2::ZERO)).collect();
        let crowd: Vec<NeighborInfo> = (0..3).map(|i| neighbor(i, Vec2::new(1.0, 0.0), Vec2::ZERO)).collect();

        let pair_force = separation().compute(&context(me, &params, &world, &grid, &pair, &formations, None));
        let crowd_force = separation().compute(&context(me, &params, &world, &grid, &crowd, &formations, None));

        assert!((crowd_force.length() / pair_force.length() - 2.25).abs() < 1e-3);
    }

    #[test]
    fn test_separation_slip_bias_fans_out() {
        let (world, grid, formations) = (ObstacleWorld::new(), NavigationGrid::default(), FormationRegistry::default());
        // Сосед стоит прямо по курсу: отталкивание параллельно скорости
        let blocker = [neighbor(0, Vec2::new(0.8, 0.0), Vec2::ZERO)];
        let me = kinematics(Vec2::ZERO, Vec2::new(2.0, 0.0));

        let left = SteeringAgent { slip_bias: 1.0, ..Default::default() };
        let right = SteeringAgent { slip_bias: -1.0, ..Default::default() };

        let left_force = separation().compute(&context(me, &left, &world, &grid, &blocker, &formations, None));
        let right_force = separation().compute(&context(me, &right, &world, &grid, &blocker, &formations, None));

        assert!(left_force.y > 0.0);
        assert!(right_force.y < 0.0);
        assert!(left_force.x < 0.0 && right_force.x < 0.0);
    }

    #[test]
    fn test_separation_higher_priority_yields() {
        let (world, grid, formations) = (ObstacleWorld::new(), NavigationGrid::default(), FormationRegistry::default());
        let mut other = neighbor(0, Vec2::new(0.0, 0.8), Vec2::X);
        other.instance_priority = 2;
        let others = [other];
        let me = kinematics(Vec2::ZERO, Vec2::X);

        let keeps_way = SteeringAgent { instance_priority: 0, ..Default::default() };
        let yields = SteeringAgent { instance_priority: 5, ..Default::default() };

        let weak = separation().compute(&context(me, &keeps_way, &world, &grid, &others, &formations, None));
        let strong = separation().compute(&context(me, &yields, &world, &grid, &others, &formations, None));

        assert!((weak.length() / strong.length() - 0.25).abs() < 1e-4);
        assert!(strong.y < 0.0);
    }

    #[test]
    fn test_orbit_radial_weak_tangential_strong() {
        let mut orbit = OrbitStrafe {
            weight: 1.0,
            enabled: true,
            center: Some(Vec2::ZERO),
            radius: 2.0,
            tolerance: 0.3,
            radial_gain: 0.35,
            tangential_gain: 1.0,
            direction: 1.0,
        };

        // На радиусе — чистая касательная
        let on_ring = orbit.desired_direction(Vec2::new(2.0, 0.0)).unwrap();
        assert!((on_ring - Vec2::Y).length() < 1e-5);

        // Внутри dead-zone — тоже без радиальной составляющей
        let inside_tolerance = orbit.desired_direction(Vec2::new(2.2, 0.0)).unwrap();
        assert!(inside_tolerance.x.abs() < 1e-5);

        // Далеко снаружи — слабое притяжение к центру
        let outside = orbit.desired_direction(Vec2::new(4.0, 0.0)).unwrap();
        assert!((outside - Vec2::new(-0.35, 1.0)).length() < 1e-5);

        orbit.reverse();
        let reversed = orbit.desired_direction(Vec2::new(2.0, 0.0)).unwrap();
        assert!((reversed - Vec2::NEG_Y).length() < 1e-5);
    }

    #[test]
    fn test_formation_seek_targets_leased_slot() {
        let params = SteeringAgent::default();
        let (world, grid) = (ObstacleWorld::new(), NavigationGrid::default());
        let mut formations = FormationRegistry::new(FormationLayout::Ring { radius: 2.0 }, 4);
        formations.lease(ME);

        let ctx = context(kinematics(Vec2::new(-3.0, 0.0), Vec2::ZERO), &params, &world, &grid, &[], &formations, None);
        let mut behavior = FormationSeek {
            weight: 1.0,
            enabled: true,
            anchor: Some((Vec2::ZERO, Vec2::X)),
            arrival_radius: 1.0,
        };

        let force = behavior.compute(&ctx);
        assert!((force - Vec2::new(params.max_speed, 0.0)).length() < 1e-4);

        formations.sweep(&BTreeSet::new());
        let ctx = context(kinematics(Vec2::new(-3.0, 0.0), Vec2::ZERO), &params, &world, &grid, &[], &formations, None);
        assert_eq!(behavior.compute(&ctx), Vec2::ZERO);
    }

    #[test]
    fn test_blend_modes() {
        let params = SteeringAgent::default();
        let (world, grid, formations) = (ObstacleWorld::new(), NavigationGrid::default(), FormationRegistry::default());
        let ctx = context(kinematics(Vec2::ZERO, Vec2::ZERO), &params, &world, &grid, &[], &formations, None);

        let mut behaviors = SteeringBehaviors::from_settings(&SteeringSettings::default(), 1, 1.0);
        behaviors.flee.enabled = true;
        behaviors.flee.threat = Some(Vec2::new(-1.0, 0.0));
        behaviors.seek.enabled = true;
        behaviors.seek.target = Some(Vec2::new(0.0, 10.0));
        behaviors.seek.arrival_radius = 0.0;

        let sum = SteeringBlender::new(BlendMode::WeightedSum).compute_force(&mut behaviors, &ctx);
        assert!((sum - Vec2::new(4.0, 4.0)).length() < 1e-4);

        // Priority: flee стоит раньше seek
        let first = SteeringBlender::new(BlendMode::Priority).compute_force(&mut behaviors, &ctx);
        assert!((first - Vec2::new(4.0, 0.0)).length() < 1e-4);
    }

    #[test]
    fn test_integrate_clamps_speed_then_applies_drag() {
        let velocity = SteeringBlender::integrate(Vec2::ZERO, Vec2::new(100.0, 0.0), 0.1, 4.0, 0.5);
        assert!((velocity - Vec2::new(3.8, 0.0)).length() < 1e-5);

        let braking = SteeringBlender::integrate(Vec2::new(2.0, 0.0), Vec2::ZERO, 0.1, 4.0, 0.5);
        assert!(braking.x < 2.0);
    }
}
