//! Библиотека GOAP-действий и целей
//!
//! Действия — stateless-шаблоны, общие для всех агентов; порядок
//! объявления = tie-break при равной стоимости (детерминизм).

use once_cell::sync::Lazy;

use super::state::{WorldKey, WorldState};

/// Исполняемое намерение, которое потребляет FSM
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    /// Вести огонь по видимой цели
    EngageTarget,
    /// Огонь из занятого укрытия
    FireFromCover,
    /// Переместиться в укрытие
    TakeCover,
    /// Обойти цель с фланга
    Flank,
    /// Агрессивный выход на believed-позицию до контакта
    AssaultPosition,
    /// Дойти до believed-позиции (преследование)
    InvestigateBelief,
    /// Прочесать район вокруг believed-позиции
    SearchArea,
    /// Отойти для восстановления
    FallBack,
    /// Уйти из зоны поражения гранаты
    EvadeHazard,
}

/// Неизменяемое определение действия
#[derive(Debug, Clone)]
pub struct ActionDef {
    pub name: &'static str,
    /// Стоимость (меньше — лучше); ties по порядку объявления
    pub cost: f32,
    pub preconditions: Vec<(WorldKey, bool)>,
    pub effects: Vec<(WorldKey, bool)>,
    pub kind: ActionKind,
}

/// Общая для всех агентов библиотека действий
pub fn action_library() -> &'static [ActionDef] {
    static LIBRARY: Lazy<Vec<ActionDef>> = Lazy::new(|| {
        vec![
            ActionDef {
                name: "evade_hazard",
                cost: 0.5,
                preconditions: vec![(WorldKey::InDangerZone, true)],
                effects: vec![(WorldKey::InDangerZone, false)],
                kind: ActionKind::EvadeHazard,
            },
            ActionDef {
                name: "fall_back",
                cost: 1.0,
                preconditions: vec![(WorldKey::LowHealth, true)],
                effects: vec![(WorldKey::Safe, true)],
                kind: ActionKind::FallBack,
            },
            ActionDef {
                name: "engage_target",
                cost: 1.0,
                // из укрытия огонь идёт через fire_from_cover
                preconditions: vec![
                    (WorldKey::PlayerVisible, true),
                    (WorldKey::UnderFire, false),
                    (WorldKey::InCover, false),
                ],
                effects: vec![(WorldKey::ThreatEliminated, true)],
                kind: ActionKind::EngageTarget,
            },
            ActionDef {
                name: "fire_from_cover",
                cost: 1.2,
                preconditions: vec![(WorldKey::PlayerVisible, true), (WorldKey::InCover, true)],
                effects: vec![(WorldKey::ThreatEliminated, true)],
                kind: ActionKind::FireFromCover,
            },
            ActionDef {
                name: "take_cover",
                cost: 1.5,
                preconditions: vec![
                    (WorldKey::UnderFire, true),
                    (WorldKey::CoverAvailable, true),
                    (WorldKey::InCover, false),
                ],
                effects: vec![(WorldKey::InCover, true), (WorldKey::UnderFire, false)],
                kind: ActionKind::TakeCover,
            },
            ActionDef {
                name: "flank_target",
                cost: 2.8,
                preconditions: vec![(WorldKey::PlayerVisible, true), (WorldKey::UnderFire, true)],
                effects: vec![
                    (WorldKey::UnderFire, false),
                    (WorldKey::ThreatEliminated, true),
                ],
                kind: ActionKind::Flank,
            },
            ActionDef {
                name: "assault_position",
                cost: 2.2,
                preconditions: vec![(WorldKey::BeliefFresh, true), (WorldKey::PlayerVisible, false)],
                effects: vec![(WorldKey::PlayerVisible, true)],
                kind: ActionKind::AssaultPosition,
            },
            ActionDef {
                name: "investigate_belief",
                cost: 1.5,
                preconditions: vec![(WorldKey::HasBelief, true), (WorldKey::PlayerVisible, false)],
                effects: vec![(WorldKey::AtBeliefPosition, true)],
                kind: ActionKind::InvestigateBelief,
            },
            ActionDef {
                // Контакт по косвенным данным (гибель своего, попадание):
                // позиция — догадка, прочёсывать сразу, без beeline-преследования
                name: "search_suspected_area",
                cost: 1.8,
                preconditions: vec![
                    (WorldKey::WitnessedAllyDeath, true),
                    (WorldKey::PlayerVisible, false),
                ],
                effects: vec![(WorldKey::HasBelief, false)],
                kind: ActionKind::SearchArea,
            },
            ActionDef {
                name: "search_area",
                cost: 2.0,
                preconditions: vec![
                    (WorldKey::AtBeliefPosition, true),
                    (WorldKey::PlayerVisible, false),
                ],
                effects: vec![(WorldKey::HasBelief, false)],
                kind: ActionKind::SearchArea,
            },
        ]
    });
    &LIBRARY
}

/// Цель: желаемое подмножество WorldState + релевантность
pub struct Goal {
    pub name: &'static str,
    /// Цель рассматривается только когда релевантна текущей ситуации
    pub relevant: fn(&WorldState) -> bool,
    pub desired: Vec<(WorldKey, bool)>,
}

/// Цели в порядке убывания приоритета
pub fn goal_list() -> &'static [Goal] {
    use super::state::key_value;

    static GOALS: Lazy<Vec<Goal>> = Lazy::new(|| {
        vec![
            Goal {
                name: "evade_danger",
                relevant: |ws| key_value(ws, WorldKey::InDangerZone),
                desired: vec![(WorldKey::InDangerZone, false)],
            },
            Goal {
                name: "preserve_self",
                relevant: |ws| key_value(ws, WorldKey::LowHealth),
                desired: vec![(WorldKey::Safe, true)],
            },
            Goal {
                name: "eliminate_threat",
                relevant: |ws| {
                    key_value(ws, WorldKey::PlayerVisible) || key_value(ws, WorldKey::BeliefFresh)
                },
                desired: vec![(WorldKey::ThreatEliminated, true)],
            },
            Goal {
                name: "resolve_contact",
                relevant: |ws| {
                    key_value(ws, WorldKey::HasBelief) && !key_value(ws, WorldKey::PlayerVisible)
                },
                desired: vec![(WorldKey::HasBelief, false)],
            },
        ]
    });
    &GOALS
}
