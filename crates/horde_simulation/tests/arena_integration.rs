//! Arena integration tests
//!
//! Полный App (SimulationPlugin), тики через run_tick:
//! - обнаружение цели: Patrol → Hesitate → Chase
//! - инварианты арбитра под нагрузкой (tokens, квоты, слоты)
//! - смерть цели: все агенты выходят из боя, реестры пусты
//! - пул: Deactivate/Activate без деспавна

use bevy::prelude::*;
use horde_simulation::ai::ActivationParams;
use horde_simulation::combat::CombatBookkeeping;
use horde_simulation::components::Dormant;
use horde_simulation::*;

const ALL_KINDS: [AIStateKind; 13] = [
    AIStateKind::Patrol,
    AIStateKind::PatrolIdle,
    AIStateKind::Hesitate,
    AIStateKind::Chase,
    AIStateKind::Surround,
    AIStateKind::Attack,
    AIStateKind::Retreat,
    AIStateKind::Flee,
    AIStateKind::Stun,
    AIStateKind::Search,
    AIStateKind::Pacing,
    AIStateKind::BlindSpotSeek,
    AIStateKind::Feint,
];

fn arena_app(config: ArenaConfig) -> App {
    let mut app = create_headless_app_with_config(&config);
    rebuild_navigation(app.world_mut()).unwrap();
    app
}

fn state_of(app: &App, entity: Entity) -> AIStateKind {
    app.world().get::<AIState>(entity).unwrap().kind()
}

fn state_changes(app: &App) -> Vec<(Entity, AIStateKind, AIStateKind)> {
    app.world()
        .resource::<Events<AgentEvent>>()
        .iter_current_update_events()
        .filter_map(|event| match *event {
            AgentEvent::StateChanged { entity, from, to } => Some((entity, from, to)),
            _ => None,
        })
        .collect()
}

fn spawn_ring(app: &mut App, count: usize, radius: f32) -> Vec<Entity> {
    (0..count)
        .map(|index| {
            let angle = index as f32 / count as f32 * std::f32::consts::TAU;
            spawn_agent(app.world_mut(), Vec2::from_angle(angle) * radius, Tactics::melee())
        })
        .collect()
}

/// Инварианты арбитра, которые обязаны держаться на каждом тике
fn assert_arbiter_invariants(app: &mut App, agents: &[Entity]) {
    let arbiter = app.world().resource::<CombatArbiter>().clone();
    let capacity = arbiter.settings().token_capacity;

    assert!(
        arbiter.token_holder_count() <= capacity,
        "tokens {} > capacity {}",
        arbiter.token_holder_count(),
        capacity
    );

    for kind in ALL_KINDS {
        if let Some(max) = arbiter.quota(kind) {
            assert!(arbiter.occupants(kind) <= max, "{:?} over quota", kind);
        }
    }

    // Слот занят максимум одним агентом, и обратная карта согласована
    for agent in agents {
        if let Some(index) = arbiter.slot_of(*agent) {
            assert_eq!(arbiter.slots()[index].occupant, Some(*agent));
        }
    }
    let occupied: Vec<Entity> = arbiter.slots().iter().filter_map(|slot| slot.occupant).collect();
    let mut unique = occupied.clone();
    unique.sort();
    unique.dedup();
    assert_eq!(unique.len(), occupied.len(), "agent holds several slots");

    // Attack только с token'ом
    let attacking = agents
        .iter()
        .filter(|agent| state_of(app, **agent) == AIStateKind::Attack)
        .count();
    assert!(attacking <= capacity, "{} agents attacking with capacity {}", attacking, capacity);
    for agent in agents {
        if state_of(app, *agent) == AIStateKind::Attack {
            assert!(arbiter.holds_token(*agent), "{:?} attacks without token", agent);
        }
    }
}

#[test]
fn test_detection_hesitate_then_chase() {
    let mut config = ArenaConfig::default();
    config.ai.patrol_radius = 0.5;
    let mut app = arena_app(config);

    let target = spawn_target(app.world_mut(), Vec2::ZERO);
    let agent = spawn_agent(app.world_mut(), Vec2::new(12.0, 0.0), Tactics::melee());

    // Цель дальше detection_range → агент только патрулирует
    for _ in 0..60 {
        run_tick(&mut app);
        assert!(
            state_of(&app, agent).is_disengaged(),
            "agent engaged out of range: {:?}",
            state_of(&app, agent)
        );
    }

    app.world_mut().get_mut::<Position>(target).unwrap().0 = Vec2::new(4.0, 0.0);
    run_tick(&mut app);
    assert_eq!(state_of(&app, agent), AIStateKind::Hesitate);

    let mut chased = false;
    for _ in 0..120 {
        run_tick(&mut app);
        if state_changes(&app)
            .iter()
            .any(|change| *change == (agent, AIStateKind::Hesitate, AIStateKind::Chase))
        {
            chased = true;
            break;
        }
    }
    assert!(chased, "Hesitate never resolved into Chase");
    assert!(app.world().resource::<CombatArbiter>().is_aware(agent));
}

#[test]
fn test_arbiter_invariants_under_pressure() {
    let mut app = arena_app(ArenaConfig::default());

    let target = spawn_target(app.world_mut(), Vec2::ZERO);
    let agents = spawn_ring(&mut app, 4, 3.0);

    for _ in 0..1200 {
        run_tick(&mut app);
        assert_arbiter_invariants(&mut app, &agents);
    }

    let health = app.world().get::<Health>(target).unwrap();
    assert!(health.current < health.max, "horde never landed a hit");
}

#[test]
fn test_target_death_disengages_everyone() {
    let mut app = arena_app(ArenaConfig::default());

    let target = spawn_target(app.world_mut(), Vec2::ZERO);
    app.world_mut().get_mut::<Health>(target).unwrap().current = 1;
    let agents = spawn_ring(&mut app, 4, 3.0);

    let mut ticks = 0;
    while app.world().get::<Dead>(target).is_none() {
        run_tick(&mut app);
        ticks += 1;
        assert!(ticks < 3600, "target survived {} ticks", ticks);
    }

    for _ in 0..5 {
        run_tick(&mut app);
    }

    for agent in &agents {
        assert!(
            state_of(&app, *agent).is_disengaged(),
            "{:?} still engaged: {:?}",
            agent,
            state_of(&app, *agent)
        );
        let book = app.world().get::<CombatBookkeeping>(*agent).unwrap();
        assert!(!book.holds_token && !book.aware);
        assert_eq!(book.assigned_slot, None);
    }

    let arbiter = app.world().resource::<CombatArbiter>();
    assert_eq!(arbiter.token_holder_count(), 0);
    assert_eq!(arbiter.aware_count(), 0);
    for kind in ALL_KINDS {
        assert_eq!(arbiter.occupants(kind), 0, "{:?} still occupied", kind);
    }
    assert!(arbiter.slots().iter().all(|slot| slot.occupant.is_none()));
}

#[test]
fn test_pool_deactivate_and_activate() {
    let mut app = arena_app(ArenaConfig::default());

    spawn_target(app.world_mut(), Vec2::ZERO);
    let agents = spawn_ring(&mut app, 3, 3.0);
    let agent = agents[0];

    for _ in 0..120 {
        run_tick(&mut app);
    }
    assert!(
        !state_of(&app, agent).is_disengaged(),
        "agent next to target should be engaged"
    );

    app.world_mut().send_event(AgentLifecycle::Deactivate { entity: agent });
    run_tick(&mut app);

    assert!(app.world().get::<Dormant>(agent).is_some());
    {
        let arbiter = app.world().resource::<CombatArbiter>();
        assert!(!arbiter.holds_token(agent));
        assert!(!arbiter.is_aware(agent));
        assert_eq!(arbiter.slot_of(agent), None);
    }

    // Спящий агент не возвращается в бой сам
    for _ in 0..30 {
        run_tick(&mut app);
    }
    assert!(!app.world().resource::<CombatArbiter>().is_aware(agent));

    let spawn_point = Vec2::new(-15.0, 15.0);
    app.world_mut().send_event(AgentLifecycle::Activate {
        entity: agent,
        params: ActivationParams {
            position: spawn_point,
            max_health: 50,
        },
    });
    run_tick(&mut app);

    assert!(app.world().get::<Dormant>(agent).is_none());
    let health = app.world().get::<Health>(agent).unwrap();
    assert_eq!((health.current, health.max), (50, 50));
    let position = app.world().get::<Position>(agent).unwrap().0;
    assert!(
        position.distance(spawn_point) < 0.5,
        "activated agent at {:?}, expected near {:?}",
        position,
        spawn_point
    );
    assert!(state_of(&app, agent).is_disengaged());
}

#[test]
fn test_dead_agent_releases_and_despawns() {
    let mut app = arena_app(ArenaConfig::default());

    spawn_target(app.world_mut(), Vec2::ZERO);
    let agents = spawn_ring(&mut app, 2, 3.0);
    let victim = agents[0];

    for _ in 0..60 {
        run_tick(&mut app);
    }

    app.world_mut().send_event(DamageDealt {
        attacker: agents[1],
        target: victim,
        amount: 1000,
        knockback: Vec2::ZERO,
    });
    run_tick(&mut app);

    assert!(app.world().get::<Dead>(victim).is_some());
    {
        let arbiter = app.world().resource::<CombatArbiter>();
        assert!(!arbiter.holds_token(victim));
        assert!(!arbiter.is_aware(victim));
        assert_eq!(arbiter.slot_of(victim), None);
    }

    // corpse_linger = 1s
    for _ in 0..90 {
        run_tick(&mut app);
    }
    assert!(app.world().get_entity(victim).is_err(), "corpse was not despawned");
}
