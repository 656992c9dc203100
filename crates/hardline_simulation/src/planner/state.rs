//! WorldState: плоская карта key → bool
//!
//! Пересобирается каждый planning-цикл из perception-слоя;
//! планировщик читает её read-only и работает на гипотетических копиях.
//! BTreeMap ради детерминированной итерации.

use std::collections::BTreeMap;

/// Ключи мира (факты о ситуации агента)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum WorldKey {
    /// Прямой визуальный контакт прямо сейчас
    PlayerVisible,
    /// Есть belief о позиции игрока (любой confidence выше пола)
    HasBelief,
    /// Belief достаточно свежий для агрессивных действий
    BeliefFresh,
    /// Агент стоит у believed-позиции
    AtBeliefPosition,
    /// Подавление выше порога "по нам стреляют"
    UnderFire,
    /// Predicted landing гранаты в опасном радиусе
    InDangerZone,
    /// Здоровье ниже порога отступления
    LowHealth,
    /// Агент в укрытии
    InCover,
    /// Поиск укрытия в этом эпизоде ещё не проваливался
    CoverAvailable,
    /// Контакт по косвенным данным: в памяти есть направленные
    /// гипотезы (смерть союзника в FOV, попадание по себе)
    WitnessedAllyDeath,
    /// Цель устранена (goal-ключ, в реальном мире не бывает true)
    ThreatEliminated,
    /// Не ранен, не под огнём, не в опасной зоне
    Safe,
}

pub type WorldState = BTreeMap<WorldKey, bool>;

/// Значение ключа: отсутствие в карте читается как false
pub fn key_value(state: &WorldState, key: WorldKey) -> bool {
    *state.get(&key).unwrap_or(&false)
}

/// Все пары goal/preconditions совпадают с состоянием
pub fn satisfies(state: &WorldState, required: &[(WorldKey, bool)]) -> bool {
    required
        .iter()
        .all(|&(key, value)| key_value(state, key) == value)
}

/// Удобный конструктор из пар
pub fn world_state(pairs: &[(WorldKey, bool)]) -> WorldState {
    pairs.iter().copied().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_key_reads_false() {
        let state = WorldState::new();
        assert!(!key_value(&state, WorldKey::PlayerVisible));
    }

    #[test]
    fn test_satisfies_partial_map() {
        let state = world_state(&[(WorldKey::PlayerVisible, true), (WorldKey::UnderFire, false)]);
        assert!(satisfies(&state, &[(WorldKey::PlayerVisible, true)]));
        assert!(satisfies(
            &state,
            &[(WorldKey::UnderFire, false), (WorldKey::LowHealth, false)]
        ));
        assert!(!satisfies(&state, &[(WorldKey::LowHealth, true)]));
    }
}
