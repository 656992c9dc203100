//! Уровень решений агента: FSM поверх GOAP-намерений
//!
//! Планировщик выдаёт намерение (PlannedIntent), FSM владеет
//! легитимностью перехода: guard'ы (видимость, достижимость,
//! валидность укрытия/фланга) живут здесь. Состояния производят
//! только MoveIntent — интеграция движения в movement.

use bevy::prelude::*;

pub mod components;
pub mod systems;

pub use components::*;

use crate::SimSet;

pub struct AIPlugin;

impl Plugin for AIPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(
            FixedUpdate,
            (
                systems::reactions::react_to_damage,
                systems::reactions::witness_ally_death,
                systems::fsm::handle_stuck,
                systems::fsm::grenade_preempt,
                systems::fsm::ai_fsm_transitions,
            )
                .chain()
                .in_set(SimSet::Decide),
        )
        .add_systems(
            FixedUpdate,
            (systems::searching::run_search, systems::movement::compute_move_intents)
                .chain()
                .in_set(SimSet::Behavior),
        );
    }
}
