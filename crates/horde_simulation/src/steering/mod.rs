//! Steering module (local movement)
//!
//! ECS ответственность:
//! - SteeringBehaviors: per-agent набор поведений (seek, flee, wander, avoidance, separation, orbit, formation)
//! - SteeringBlender: weighted sum / priority → сила → скорость (без физического солвера)
//! - MovementController: intent от AI → включённые поведения + PathPlanner
//! - integrate_positions: headless замена внешнего физического шага
//!
//! Порядок в FixedUpdate:
//! 1. plan_paths (Move) — throttle → find_path → waypoint cursor
//! 2. compute_steering (Move) — configure → blend → Velocity/Facing
//! 3. integrate_positions (Integrate) — Position += Velocity·dt

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

pub mod behaviors;
pub mod blender;
pub mod controller;
pub mod formation;
pub mod systems;

// Tests (separate files with _tests suffix)
#[cfg(test)]
mod behaviors_tests;

pub use behaviors::{
    seek_force, AgentKinematics, ContextChoice, Flee, FormationSeek, NeighborInfo, ObstacleAvoidance,
    OrbitStrafe, Seek, Separation, SteeringAgent, SteeringBehavior, SteeringBehaviors, SteeringContext,
    Wander,
};
pub use blender::{BlendMode, SteeringBlender};
pub use controller::{MovementController, MovementMode, MovementModeKind};
pub use formation::{FormationLayout, FormationRegistry};
pub use systems::{compute_steering, integrate_positions, plan_paths};

use crate::SimulationSet;

/// Параметры движения (все — тюнинг, ничего не захардкожено в поведениях)
#[derive(Resource, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SteeringSettings {
    pub max_speed: f32,
    pub max_acceleration: f32,
    pub agent_radius: f32,
    pub drag: f32,
    pub blend_mode: BlendMode,

    pub arrival_radius: f32,
    pub waypoint_reach: f32,
    pub repath_interval: f32,
    pub repath_goal_delta: f32,

    pub seek_weight: f32,
    pub flee_weight: f32,
    pub flee_panic_distance: f32,
    pub flee_bias_weight: f32,

    pub wander_weight: f32,
    pub wander_distance: f32,
    pub wander_radius: f32,
    pub wander_jitter: f32,

    pub avoidance_weight: f32,
    pub avoidance_rays: usize,
    pub avoidance_distance: f32,
    pub avoidance_interest_weight: f32,
    pub avoidance_danger_weight: f32,

    pub separation_weight: f32,
    pub separation_radius: f32,
    pub separation_hard_minimum: f32,
    pub separation_emergency_multiplier: f32,
    pub separation_prediction_horizon: f32,
    pub separation_static_multiplier: f32,
    pub separation_crowd_multiplier: f32,

    pub orbit_weight: f32,
    pub orbit_tolerance: f32,
    pub orbit_radial_gain: f32,

    /// Формация для Surround (capacity 0 = Surround без формации)
    pub formation_layout: FormationLayout,
    pub formation_capacity: usize,
}

impl Default for SteeringSettings {
    fn default() -> Self {
        Self {
            max_speed: 4.0,
            max_acceleration: 20.0,
            agent_radius: 0.4,
            drag: 0.5,
            blend_mode: BlendMode::WeightedSum,

            arrival_radius: 1.0,
            waypoint_reach: 0.35,
            repath_interval: 0.5,
            repath_goal_delta: 0.75,

            seek_weight: 1.0,
            flee_weight: 1.0,
            flee_panic_distance: 12.0,
            flee_bias_weight: 0.3,

            wander_weight: 0.6,
            wander_distance: 2.0,
            wander_radius: 1.0,
            wander_jitter: 3.0,

            avoidance_weight: 1.5,
            avoidance_rays: 16,
            avoidance_distance: 2.0,
            avoidance_interest_weight: 1.0,
            avoidance_danger_weight: 2.0,

            separation_weight: 1.2,
            separation_radius: 1.2,
            separation_hard_minimum: 0.6,
            separation_emergency_multiplier: 3.0,
            separation_prediction_horizon: 0.3,
            separation_static_multiplier: 1.5,
            separation_crowd_multiplier: 1.5,

            orbit_weight: 1.0,
            orbit_tolerance: 0.3,
            orbit_radial_gain: 0.35,

            formation_layout: FormationLayout::default(),
            formation_capacity: 0,
        }
    }
}

/// Steering Plugin
pub struct SteeringPlugin;

impl Plugin for SteeringPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<SteeringSettings>();

        if !app.world().contains_resource::<FormationRegistry>() {
            let settings = app.world().resource::<SteeringSettings>().clone();
            app.insert_resource(FormationRegistry::new(
                settings.formation_layout,
                settings.formation_capacity,
            ));
        }

        app.add_systems(
            FixedUpdate,
            (
                (systems::plan_paths, systems::compute_steering)
                    .chain()
                    .in_set(SimulationSet::Move),
                systems::integrate_positions.in_set(SimulationSet::Integrate),
            ),
        );
    }
}
