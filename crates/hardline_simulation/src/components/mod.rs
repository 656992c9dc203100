//! ECS Components для игровых entity
//!
//! Организация по доменам:
//! - actor: базовые характеристики (faction, health, facing, weapon class)
//! - остальные компоненты живут в своих доменных модулях
//!   (perception, ai, hazard, movement, coordination)

pub mod actor;

// Re-exports для удобного импорта
pub use actor::*;
