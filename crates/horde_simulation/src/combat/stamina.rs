//! Stamina management система
//!
//! - Регенерация stamina (Stamina::regen_rate, шаг SimClock)
//! - Тактические входы платят TacticalSettings::tactical_stamina_cost (списание в AI)
//! - Fatigue: ниже fatigue_threshold → Exhausted + множитель скорости,
//!   выше порога → маркер снимается

use bevy::prelude::*;

use crate::components::Stamina;
use crate::shared::SimClock;
use crate::steering::SteeringAgent;

use super::tactical::TacticalSettings;

/// Система: regenerate stamina для всех entities
///
/// Работает в FixedUpdate, delta = SimClock::step (детерминизм).
pub fn regenerate_stamina(mut query: Query<&mut Stamina>, clock: Res<SimClock>) {
    for mut stamina in query.iter_mut() {
        stamina.regenerate(clock.step);
    }
}

/// Fatigue (усталость)
///
/// Пока висит — скорость агента умножена на movement_penalty.
#[derive(Component, Debug, Clone, Copy, Reflect)]
#[reflect(Component)]
pub struct Exhausted {
    /// Movement speed multiplier (0.6 = 40% slower)
    pub movement_penalty: f32,
}

impl Default for Exhausted {
    fn default() -> Self {
        Self {
            movement_penalty: TacticalSettings::default().fatigue_speed_multiplier,
        }
    }
}

/// Один порог в обе стороны: fraction < threshold → уставший
pub fn is_fatigued(stamina: &Stamina, threshold: f32) -> bool {
    stamina.fraction() < threshold
}

/// Система: detect exhaustion
///
/// Добавляет Exhausted когда stamina ниже порога, убирает когда восстановилась.
/// SteeringAgent::speed_multiplier синхронизируется с маркером.
pub fn detect_exhaustion(
    mut commands: Commands,
    mut query: Query<(Entity, &Stamina, Option<&Exhausted>, Option<&mut SteeringAgent>)>,
    settings: Res<TacticalSettings>,
) {
    for (entity, stamina, exhausted, agent) in query.iter_mut() {
        let fatigued = is_fatigued(stamina, settings.fatigue_threshold);

        match (exhausted, fatigued) {
            (None, true) => {
                let marker = Exhausted {
                    movement_penalty: settings.fatigue_speed_multiplier,
                };
                if let Some(mut agent) = agent {
                    agent.speed_multiplier = marker.movement_penalty;
                }
                commands.entity(entity).insert(marker);
                crate::logger::log(&format!(
                    "Entity {:?} is now exhausted (stamina: {:.0}%)",
                    entity,
                    stamina.fraction() * 100.0
                ));
            }
            (Some(_), false) => {
                if let Some(mut agent) = agent {
                    agent.speed_multiplier = 1.0;
                }
                commands.entity(entity).remove::<Exhausted>();
                crate::logger::log(&format!("Entity {:?} recovered from exhaustion", entity));
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn app() -> App {
        let mut app = App::new();
        app.insert_resource(SimClock::from_hz(10.0));
        app.insert_resource(TacticalSettings::default());
        app.add_systems(Update, (regenerate_stamina, detect_exhaustion).chain());
        app
    }

    #[test]
    fn test_regeneration_uses_clock_step() {
        let mut app = app();
        let mut stamina = Stamina::new(100.0).with_regen(10.0);
        stamina.consume(50.0);
        let entity = app.world_mut().spawn(stamina).id();

        app.update();

        // 50 + 10 × 0.1
        let stamina = app.world().get::<Stamina>(entity).unwrap();
        assert!((stamina.current - 51.0).abs() < 1e-4);
    }

    #[test]
    fn test_exhaustion_toggles_at_single_threshold() {
        let mut app = app();
        let mut stamina = Stamina::new(100.0).with_regen(0.0);
        stamina.consume(80.0); // 20% < 30%
        let entity = app
            .world_mut()
            .spawn((stamina, SteeringAgent::default()))
            .id();

        app.update();
        assert!(app.world().get::<Exhausted>(entity).is_some());
        assert!((app.world().get::<SteeringAgent>(entity).unwrap().speed_multiplier - 0.6).abs() < 1e-6);

        // Ровно на пороге — уже не уставший
        app.world_mut().get_mut::<Stamina>(entity).unwrap().current = 30.0;
        app.update();
        assert!(app.world().get::<Exhausted>(entity).is_none());
        assert_eq!(app.world().get::<SteeringAgent>(entity).unwrap().speed_multiplier, 1.0);
    }

    #[test]
    fn test_fatigue_check() {
        let low = Stamina { current: 15.0, max: 100.0, regen_rate: 10.0 };
        let high = Stamina { current: 50.0, max: 100.0, regen_rate: 10.0 };

        assert!(is_fatigued(&low, 0.3));
        assert!(!is_fatigued(&high, 0.3));
    }
}
