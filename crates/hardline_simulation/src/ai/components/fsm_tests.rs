//! Unit-тесты FSM-компонентов

use super::fsm::*;
use bevy::prelude::*;

#[test]
fn test_state_kind_mapping() {
    assert_eq!(AIState::Idle.kind(), AIStateKind::Idle);
    assert_eq!(
        AIState::Combat {
            target: Entity::PLACEHOLDER
        }
        .kind(),
        AIStateKind::Combat
    );
    assert_eq!(
        AIState::EvadingGrenade {
            hazard: Entity::PLACEHOLDER,
            landing: Vec2::ZERO
        }
        .kind(),
        AIStateKind::EvadingGrenade
    );
}

#[test]
fn test_engaged_states() {
    assert!(AIStateKind::Combat.is_engaged());
    assert!(AIStateKind::InCover.is_engaged());
    assert!(AIStateKind::Suppressed.is_engaged());
    // Поиск и погоня — не активный бой: порог слуха остаётся низким
    assert!(!AIStateKind::Idle.is_engaged());
    assert!(!AIStateKind::Searching.is_engaged());
    assert!(!AIStateKind::Pursuing.is_engaged());
    assert!(!AIStateKind::Retreating.is_engaged());
}

#[test]
fn test_movement_heavy_states() {
    assert!(AIStateKind::Pursuing.is_movement_heavy());
    assert!(AIStateKind::Flanking.is_movement_heavy());
    assert!(AIStateKind::Searching.is_movement_heavy());
    // Статические состояния stuck-детекции не подлежат
    assert!(!AIStateKind::Idle.is_movement_heavy());
    assert!(!AIStateKind::InCover.is_movement_heavy());
    assert!(!AIStateKind::Suppressed.is_movement_heavy());
    assert!(!AIStateKind::Combat.is_movement_heavy());
}

#[test]
fn test_detection_episode_begin_preserves_failure_flag() {
    let mut episode = DetectionEpisode::default();
    episode.begin();
    episode.cover_search_failed = true;

    // Повторный begin внутри активного эпизода НЕ сбрасывает флаг —
    // иначе цикл SeekingCover возвращается
    episode.begin();
    assert!(episode.cover_search_failed);

    episode.end();
    episode.begin();
    assert!(!episode.cover_search_failed);
}

#[test]
fn test_state_history_transition() {
    let mut history = StateHistory::default();
    history.note_transition(AIStateKind::Combat, 3.5);
    assert_eq!(history.previous, AIStateKind::Combat);
    assert!((history.entered_at - 3.5).abs() < f32::EPSILON);
}
