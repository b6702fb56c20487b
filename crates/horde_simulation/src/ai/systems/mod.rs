//! AI systems (perception → FSM → movement intent, reactions)

pub mod fsm;
pub mod movement;
pub mod perception;
pub mod reactions;

#[cfg(test)]
mod movement_tests;

// Re-export all systems
pub use fsm::*;
pub use movement::*;
pub use perception::*;
pub use reactions::*;
