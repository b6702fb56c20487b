//! Ошибки симуляции
//!
//! Только для реально fallible операций (grid build, config).
//! Gameplay-отказы (нет токена, занят слот, квота) — НЕ ошибки, у них всегда есть fallback.

use thiserror::Error;

/// Ошибка постройки NavigationGrid
///
/// При ошибке grid остаётся в предыдущем состоянии (возможно пустом).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum NavigationError {
    #[error("degenerate grid parameters: {0}")]
    DegenerateParameters(String),

    #[error("grid too large: {requested} cells requested, cap is {cap}")]
    TooManyCells { requested: usize, cap: usize },
}

/// Ошибка загрузки ArenaConfig
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("config parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config value `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

pub type NavResult<T> = std::result::Result<T, NavigationError>;
