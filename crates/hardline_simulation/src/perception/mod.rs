//! Perception: зрение, слух, память агентов
//!
//! Порядок внутри тика: vision → hearing → memory decay → intel broadcast.
//! Все наблюдения пишут в PlayerBelief, decay никогда не срабатывает
//! в тот же тик что и свежее наблюдение.

use bevy::prelude::*;

pub mod hearing;
pub mod memory;
pub mod vision;

pub use hearing::{hearing_threshold, pressure_intensity, SoundEmitted};
pub use memory::{BeliefData, PlayerBelief, BROADCAST_CONFIDENCE_FACTOR};
pub use vision::{silhouette_visible, within_fov, VisibleTarget, VisionConfig};

use crate::SimSet;

pub struct PerceptionPlugin;

impl Plugin for PerceptionPlugin {
    fn build(&self, app: &mut App) {
        app.add_event::<SoundEmitted>()
            .insert_resource(memory::IntelBroadcastTimer::default())
            .add_systems(
                FixedUpdate,
                (
                    vision::update_vision,
                    hearing::hear_sounds,
                    memory::decay_beliefs,
                    memory::broadcast_intel,
                )
                    .chain()
                    .in_set(SimSet::Perception),
            );
    }
}
