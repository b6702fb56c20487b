//! Tests for AIState → MovementMode mapping.

#[cfg(test)]
mod tests {
    use bevy::prelude::*;

    use super::super::movement::*;
    use crate::ai::{AIConfig, AIState, AgentEvent, AgentMemory, FeintPhase, Perception, StuckDetector};
    use crate::components::{Position, Velocity};
    use crate::navigation::Path;
    use crate::shared::SimClock;
    use crate::steering::{MovementController, MovementMode, SteeringAgent, SteeringBehaviors, SteeringSettings};

    fn seen_at(target: Vec2, distance: f32) -> Perception {
        Perception {
            target: Some(Entity::from_raw(99)),
            target_position: target,
            target_facing: Vec2::X,
            distance,
            surface_distance: distance - 0.9,
            line_of_sight: true,
            in_vision_cone: true,
            detected: true,
            tracking: true,
            ..Default::default()
        }
    }

    #[test]
    fn test_chase_follows_visible_target() {
        let config = AIConfig::default();
        let perception = seen_at(Vec2::new(5.0, 0.0), 5.0);

        let (mode, scale) = movement_for_state(
            &AIState::Chase { rush: false },
            Vec2::ZERO,
            &perception,
            &AgentMemory::new(Vec2::ZERO),
            &config,
            0.0,
        );

        assert_eq!(mode, MovementMode::Chase { target: Vec2::new(5.0, 0.0) });
        assert_eq!(scale, 1.0);
    }

    #[test]
    fn test_ranged_chase_holds_at_standoff() {
        let config = AIConfig::default();
        let perception = seen_at(Vec2::new(5.0, 0.0), 5.0);

        let (mode, _) = movement_for_state(
            &AIState::Chase { rush: false },
            Vec2::ZERO,
            &perception,
            &AgentMemory::new(Vec2::ZERO),
            &config,
            6.0,
        );

        assert_eq!(mode, MovementMode::Hold);
    }

    #[test]
    fn test_chase_by_memory_goes_to_extrapolated_point() {
        let config = AIConfig::default();
        let mut memory = AgentMemory::new(Vec2::ZERO);
        memory.remember(Vec2::new(6.0, 0.0), Vec2::new(0.0, 2.0), 0.0, config.memory_duration);

        let (mode, _) = movement_for_state(
            &AIState::Chase { rush: false },
            Vec2::ZERO,
            &Perception::default(),
            &memory,
            &config,
            0.0,
        );

        let expected = Vec2::new(6.0, 2.0 * config.memory_extrapolation);
        assert_eq!(mode, MovementMode::Chase { target: expected });

        // У точки памяти стоим
        let (mode, _) = movement_for_state(
            &AIState::Chase { rush: false },
            expected,
            &Perception::default(),
            &memory,
            &config,
            0.0,
        );
        assert_eq!(mode, MovementMode::Hold);
    }

    #[test]
    fn test_pacing_orbits_at_current_distance_slowly() {
        let config = AIConfig::default();
        let perception = seen_at(Vec2::ZERO, 3.5);

        let (mode, scale) = movement_for_state(
            &AIState::Pacing { until: 2.0 },
            Vec2::new(3.5, 0.0),
            &perception,
            &AgentMemory::new(Vec2::ZERO),
            &config,
            0.0,
        );

        assert_eq!(
            mode,
            MovementMode::Orbit {
                center: Vec2::ZERO,
                radius: 3.5
            }
        );
        assert_eq!(scale, config.pacing_speed_scale);
    }

    #[test]
    fn test_retreat_flees_along_reserved_direction() {
        let config = AIConfig::default();
        let perception = seen_at(Vec2::ZERO, 2.0);
        let position = Vec2::new(2.0, 0.0);

        let (mode, _) = movement_for_state(
            &AIState::Retreat {
                direction: Vec2::Y,
                min_until: 1.0,
                max_until: 3.0,
            },
            position,
            &perception,
            &AgentMemory::new(Vec2::ZERO),
            &config,
            0.0,
        );

        assert_eq!(mode, MovementMode::Flee { threat: position - Vec2::Y });
    }

    #[test]
    fn test_feint_phases() {
        let config = AIConfig::default();
        let target = Vec2::new(3.0, 0.0);
        let perception = seen_at(target, 3.0);
        let memory = AgentMemory::new(Vec2::ZERO);

        let feint = |phase| AIState::Feint {
            phase,
            deadline: 3.0,
            grace_until: 0.0,
        };

        let (approach, _) =
            movement_for_state(&feint(FeintPhase::Approach), Vec2::ZERO, &perception, &memory, &config, 0.0);
        let (withdraw, _) =
            movement_for_state(&feint(FeintPhase::Withdraw), Vec2::ZERO, &perception, &memory, &config, 0.0);

        assert_eq!(approach, MovementMode::Chase { target });
        assert_eq!(withdraw, MovementMode::Flee { threat: target });
    }

    #[test]
    fn test_frozen_states() {
        let config = AIConfig::default();
        let perception = seen_at(Vec2::ZERO, 2.0);
        let memory = AgentMemory::new(Vec2::ZERO);

        for state in [AIState::Hesitate { until: 1.0 }, AIState::PatrolIdle { until: 1.0 }] {
            let (mode, _) = movement_for_state(&state, Vec2::X, &perception, &memory, &config, 0.0);
            assert_eq!(mode, MovementMode::Hold);
        }
        let (mode, _) = movement_for_state(&AIState::Stun { until: 1.0 }, Vec2::X, &perception, &memory, &config, 0.0);
        assert_eq!(mode, MovementMode::Idle);
    }

    /// Агент без движения: Position не меняется ни на одном тике
    fn spawn_frozen(app: &mut App, position: Vec2, controller: MovementController) -> Entity {
        let mut behaviors = SteeringBehaviors::from_settings(&SteeringSettings::default(), 7, 1.0);
        behaviors.orbit.direction = 1.0;
        app.world_mut()
            .spawn((
                Position(position),
                Velocity::default(),
                AIConfig::default(),
                SteeringAgent::default(),
                StuckDetector::new(position, 0.0),
                controller,
                behaviors,
            ))
            .id()
    }

    #[test]
    fn test_stuck_recovery_sequence() {
        let mut app = App::new();
        app.insert_resource(SimClock::from_hz(10.0))
            .init_resource::<Events<AgentEvent>>()
            .add_systems(Update, stuck_recovery);

        let mut orbiting = MovementController::default();
        orbiting.set_mode(MovementMode::Orbit {
            center: Vec2::new(3.0, 0.0),
            radius: 3.0,
        });
        let orbiter = spawn_frozen(&mut app, Vec2::ZERO, orbiting);

        let mut walking = MovementController::default();
        let goal = Vec2::new(3.0, 5.0);
        walking.set_mode(MovementMode::PatrolTo { point: goal });
        walking.replace_path(
            Path {
                waypoints: vec![Vec2::new(1.0, 5.0), Vec2::new(2.0, 5.0), goal],
                ..Default::default()
            },
            0.0,
            goal,
        );
        let walker = spawn_frozen(&mut app, Vec2::new(0.0, 5.0), walking);
        assert!(!app.world().get::<MovementController>(walker).unwrap().throttle.is_forced());

        // stuck_window = 1 с, 10 Гц → окно закрывается ровно один раз
        for _ in 0..12 {
            app.world_mut().resource_mut::<SimClock>().advance();
            app.update();
        }

        let behaviors = app.world().get::<SteeringBehaviors>(orbiter).unwrap();
        assert_eq!(behaviors.orbit.direction, -1.0, "orbit direction was not reversed");

        let controller = app.world().get::<MovementController>(walker).unwrap();
        assert_eq!(controller.waypoint_index(), 1);
        assert_eq!(controller.current_waypoint(), Some(Vec2::new(2.0, 5.0)));
        assert!(controller.throttle.is_forced());

        // Шли вдоль +X → боковой импульс вдоль Y (slip_bias = +1)
        let impulse = app.world().get::<Velocity>(walker).unwrap().0;
        let config = AIConfig::default();
        assert!(impulse.x.abs() < 1e-5);
        assert!((impulse.y - config.stuck_impulse).abs() < 1e-5, "impulse {:?}", impulse);

        let unstuck: Vec<Entity> = app
            .world()
            .resource::<Events<AgentEvent>>()
            .iter_current_update_events()
            .filter_map(|event| match *event {
                AgentEvent::Unstuck { entity } => Some(entity),
                _ => None,
            })
            .collect();
        assert_eq!(unstuck.len(), 2);
        assert!(unstuck.contains(&orbiter) && unstuck.contains(&walker));
    }

    #[test]
    fn test_holding_agent_is_never_stuck() {
        let mut app = App::new();
        app.insert_resource(SimClock::from_hz(10.0))
            .init_resource::<Events<AgentEvent>>()
            .add_systems(Update, stuck_recovery);

        let mut holding = MovementController::default();
        holding.set_mode(MovementMode::Hold);
        let agent = spawn_frozen(&mut app, Vec2::ZERO, holding);

        for _ in 0..30 {
            app.world_mut().resource_mut::<SimClock>().advance();
            app.update();
        }

        assert_eq!(app.world().get::<Velocity>(agent).unwrap().0, Vec2::ZERO);
        assert!(app.world().resource::<Events<AgentEvent>>().is_empty());
    }
}
