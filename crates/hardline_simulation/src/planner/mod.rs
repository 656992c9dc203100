//! GOAP planner (goal-oriented action planning)
//!
//! Планировщик НЕ двигает агента: он выбирает намерение (ActionKind),
//! а FSM-гарды остаются авторитетными (fail closed). Выполняется только
//! первое действие плана, после чего план инвалидируется — replanning
//! каждый тик по свежему WorldState.

use bevy::prelude::*;

pub mod actions;
pub mod search;
pub mod state;
pub mod systems;

pub use actions::{action_library, ActionDef, ActionKind};
pub use search::plan;
pub use state::{WorldKey, WorldState};
pub use systems::{goap_replan, PlannedIntent};

use crate::SimSet;

pub struct PlannerPlugin;

impl Plugin for PlannerPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(FixedUpdate, goap_replan.in_set(SimSet::Planning));
    }
}
