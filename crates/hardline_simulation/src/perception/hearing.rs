//! Слух: pressure-law распространение звука
//!
//! Закон затухания — принципиальный выбор: давление `ref/dist`
//! (clamp до 1.0 вблизи) даёт рабочую дальность обнаружения;
//! inverse-square убивает слышимость дальше пары сотен пикселей.
//! Порог уведомления зависит от состояния: occupied-в-бою агент
//! фильтрует всё кроме очень громкого/близкого, иначе дёргается
//! на каждый шорох.

use bevy::prelude::*;
use rand::Rng;

use crate::ai::AIStateKind;
use crate::components::{pos2, Agent, BehaviorMode, Player};
use crate::perception::memory::PlayerBelief;
use crate::DeterministicRng;

/// Порог для агентов вне боя (idle, поиск, патруль)
pub const IDLE_THRESHOLD: f32 = 0.01;

/// Порог для агентов в активном бою
pub const ENGAGED_THRESHOLD: f32 = 0.15;

/// Guard не покидает пост ради далёких звуков: дальше этого радиуса
/// звук игнорируется целиком (Patrol реагирует с любой дистанции)
pub const GUARD_HEARING_RANGE: f32 = 500.0;

/// Максимальный разброс believed-позиции от тихого звука (пиксели)
const MAX_SCATTER: f32 = 48.0;

/// Звуковое событие (выстрел, взрыв, шаги)
#[derive(Event, Debug, Clone)]
pub struct SoundEmitted {
    pub position: Vec2,
    /// Reference distance для pressure-law (громкость источника)
    pub reference_distance: f32,
    /// Источник (сам себя не слышим)
    pub source: Option<Entity>,
}

/// Pressure-law интенсивность: `ref/dist`, ограничено 1.0 вблизи
pub fn pressure_intensity(reference_distance: f32, distance: f32) -> f32 {
    if distance <= reference_distance {
        1.0
    } else {
        reference_distance / distance
    }
}

/// Порог уведомления по текущему состоянию
pub fn hearing_threshold(state: AIStateKind) -> f32 {
    if state.is_engaged() {
        ENGAGED_THRESHOLD
    } else {
        IDLE_THRESHOLD
    }
}

/// Система: обработка звуковых событий
///
/// Звук даёт belief средней confidence с позиционным разбросом —
/// тихий далёкий звук локализуется хуже громкого.
pub fn hear_sounds(
    mut sounds: EventReader<SoundEmitted>,
    mut agents: Query<
        (
            Entity,
            &Transform,
            &crate::ai::AIState,
            &BehaviorMode,
            &mut PlayerBelief,
        ),
        (With<Agent>, Without<Player>),
    >,
    mut rng: ResMut<DeterministicRng>,
    time: Res<Time<Fixed>>,
) {
    let now = time.elapsed_secs();

    for sound in sounds.read() {
        for (listener, transform, state, behavior, mut belief) in agents.iter_mut() {
            if sound.source == Some(listener) {
                continue;
            }

            let listener_pos = pos2(transform);
            let distance = listener_pos.distance(sound.position);

            if *behavior == BehaviorMode::Guard && distance > GUARD_HEARING_RANGE {
                continue;
            }

            let intensity = pressure_intensity(sound.reference_distance, distance);

            if intensity < hearing_threshold(state.kind()) {
                continue;
            }

            // Локализация хуже для тихих звуков
            let scatter_radius = MAX_SCATTER * (1.0 - intensity.min(1.0));
            let angle = rng.rng.gen_range(0.0..std::f32::consts::TAU);
            let offset = Vec2::new(angle.cos(), angle.sin()) * rng.rng.gen_range(0.0..=1.0) * scatter_radius;

            let confidence = 0.3 + 0.4 * intensity.min(1.0);
            belief.observe(sound.position + offset, confidence, now);

            crate::log(&format!(
                "🔊 {:?} heard sound at distance {:.0} (intensity {:.3})",
                listener, distance, intensity
            ));
        }
    }
}
