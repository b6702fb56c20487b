//! AI Events — fire-and-forget хуки наружу + lifecycle от пула
//!
//! Ядро только пишет AnimationCommand/AgentEvent и никогда не читает их обратно.
//! AgentLifecycle приходит от владельца пула (активация/деактивация без деспавна).

use bevy::prelude::*;

use super::AIStateKind;

/// Команда анимации/звука (хост сам решает, что проиграть)
#[derive(Event, Debug, Clone, Copy, PartialEq)]
pub struct AnimationCommand {
    pub entity: Entity,
    pub kind: AnimationKind,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AnimationKind {
    /// Начало windup'а
    PlayAttack,
    /// Взгляд заблокирован (ось, не диагональ)
    SetFacing(Vec2),
    PlayStun,
}

/// Доменные события агента (телеметрия, debug, animation-driver mapping)
#[derive(Event, Debug, Clone, Copy, PartialEq)]
pub enum AgentEvent {
    StateChanged {
        entity: Entity,
        from: AIStateKind,
        to: AIStateKind,
    },
    /// Stuck recovery отработал
    Unstuck { entity: Entity },
    /// Attack token не выдан → перенаправлен в fallback
    TokenDenied { entity: Entity, redirected: AIStateKind },
}

/// Параметры активации агента из пула
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActivationParams {
    pub position: Vec2,
    pub max_health: u32,
}

impl Default for ActivationParams {
    fn default() -> Self {
        Self {
            position: Vec2::ZERO,
            max_health: 100,
        }
    }
}

/// Lifecycle от пула: reset вместо деспавна
#[derive(Event, Debug, Clone, Copy, PartialEq)]
pub enum AgentLifecycle {
    Activate {
        entity: Entity,
        params: ActivationParams,
    },
    Deactivate { entity: Entity },
}
