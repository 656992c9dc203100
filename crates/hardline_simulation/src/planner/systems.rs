//! Planning-цикл: WorldState из perception + выбор намерения

use bevy::prelude::*;

use crate::ai::{AIConfig, AIState, AIStateKind, DetectionEpisode};
use crate::components::{pos2, Agent, Health, Player};
use crate::hazard::{Grenade, Suppression, UNDER_FIRE_LEVEL};
use crate::perception::{PlayerBelief, VisibleTarget};

use super::actions::{action_library, goal_list, ActionKind};
use super::search::plan;
use super::state::{WorldKey, WorldState};

/// Выбранное планировщиком намерение (первое действие плана)
///
/// None — плана нет, состояние играет свой дефолт.
#[derive(Component, Debug, Clone, Default)]
pub struct PlannedIntent {
    pub kind: Option<ActionKind>,
    pub goal: Option<&'static str>,
}

/// Собрать WorldState агента из perception-слоя (read-only снимок)
#[allow(clippy::too_many_arguments)]
pub fn build_world_state(
    config: &AIConfig,
    state: &AIState,
    health: &Health,
    visible: &VisibleTarget,
    belief: &PlayerBelief,
    suppression: &Suppression,
    episode: &DetectionEpisode,
    agent_pos: Vec2,
    in_danger_zone: bool,
) -> WorldState {
    let confidence = belief.confidence();
    let at_belief = belief
        .position()
        .map(|p| agent_pos.distance(p) <= config.arrive_radius)
        .unwrap_or(false);
    let witnessed = belief
        .memory
        .as_ref()
        .map(|m| !m.hypotheses.is_empty())
        .unwrap_or(false);
    let under_fire = suppression.level >= UNDER_FIRE_LEVEL;
    let low_health = health.fraction() < config.retreat_health_threshold;

    let mut ws = WorldState::new();
    ws.insert(WorldKey::PlayerVisible, visible.target.is_some());
    ws.insert(WorldKey::HasBelief, confidence >= config.pursue_confidence_threshold * 0.5);
    ws.insert(WorldKey::BeliefFresh, confidence >= config.assault_confidence_threshold);
    ws.insert(WorldKey::AtBeliefPosition, at_belief);
    ws.insert(WorldKey::UnderFire, under_fire);
    ws.insert(WorldKey::InDangerZone, in_danger_zone);
    ws.insert(WorldKey::LowHealth, low_health);
    ws.insert(WorldKey::InCover, state.kind() == AIStateKind::InCover);
    ws.insert(WorldKey::CoverAvailable, !episode.cover_search_failed);
    ws.insert(WorldKey::WitnessedAllyDeath, witnessed);
    ws.insert(WorldKey::Safe, !low_health && !under_fire && !in_danger_zone);
    ws
}

/// Выбор цели и плана: первая релевантная цель (по приоритету),
/// для которой нашёлся план
pub fn choose_intent(ws: &WorldState) -> PlannedIntent {
    for goal in goal_list() {
        if !(goal.relevant)(ws) {
            continue;
        }
        if let Some(indices) = plan(ws, &goal.desired, action_library()) {
            let kind = indices.first().map(|&i| action_library()[i].kind);
            return PlannedIntent {
                kind,
                goal: Some(goal.name),
            };
        }
    }
    PlannedIntent::default()
}

/// Система: replan каждого агента каждый тик
///
/// План короткий и дешёвый; только первое действие вообще исполняется,
/// так что дешевле пересчитать, чем валидировать старый план.
pub fn goap_replan(
    mut agents: Query<
        (
            &AIConfig,
            &AIState,
            &Health,
            &Transform,
            &VisibleTarget,
            &PlayerBelief,
            &Suppression,
            &DetectionEpisode,
            &mut PlannedIntent,
        ),
        (With<Agent>, Without<Player>),
    >,
    grenades: Query<(&Transform, &Grenade)>,
) {
    // Predicted landing каждой живой гранаты (общий для всех агентов)
    let landings: Vec<Vec2> = grenades
        .iter()
        .map(|(transform, grenade)| grenade.predicted_landing(pos2(transform)))
        .collect();

    for (config, state, health, transform, visible, belief, suppression, episode, mut intent) in
        agents.iter_mut()
    {
        let agent_pos = pos2(transform);
        let in_danger = landings
            .iter()
            .any(|landing| agent_pos.distance(*landing) <= crate::hazard::DANGER_RADIUS);

        let ws = build_world_state(
            config, state, health, visible, belief, suppression, episode, agent_pos, in_danger,
        );
        *intent = choose_intent(&ws);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::state::world_state;

    #[test]
    fn test_intent_engage_when_visible() {
        let ws = world_state(&[(WorldKey::PlayerVisible, true), (WorldKey::Safe, true)]);
        let intent = choose_intent(&ws);
        assert_eq!(intent.kind, Some(ActionKind::EngageTarget));
        assert_eq!(intent.goal, Some("eliminate_threat"));
    }

    #[test]
    fn test_intent_evade_overrides_combat() {
        let ws = world_state(&[
            (WorldKey::PlayerVisible, true),
            (WorldKey::InDangerZone, true),
        ]);
        let intent = choose_intent(&ws);
        assert_eq!(intent.kind, Some(ActionKind::EvadeHazard));
        assert_eq!(intent.goal, Some("evade_danger"));
    }

    #[test]
    fn test_intent_none_when_nothing_to_do() {
        let ws = world_state(&[(WorldKey::Safe, true)]);
        let intent = choose_intent(&ws);
        assert_eq!(intent.kind, None);
        assert_eq!(intent.goal, None);
    }

    #[test]
    fn test_intent_investigate_on_stale_belief() {
        // Belief есть, но не fresh: eliminate нерелевантна, идём проверять
        let ws = world_state(&[(WorldKey::HasBelief, true)]);
        let intent = choose_intent(&ws);
        assert_eq!(intent.kind, Some(ActionKind::InvestigateBelief));
        assert_eq!(intent.goal, Some("resolve_contact"));
    }

    #[test]
    fn test_intent_searches_suspected_area_after_witnessing() {
        // Косвенный контакт (гипотезы направления): сразу прочёсывание,
        // без beeline-преследования догадки
        let ws = world_state(&[
            (WorldKey::HasBelief, true),
            (WorldKey::WitnessedAllyDeath, true),
        ]);
        let intent = choose_intent(&ws);
        assert_eq!(intent.kind, Some(ActionKind::SearchArea));
        assert_eq!(intent.goal, Some("resolve_contact"));
    }

    #[test]
    fn test_intent_fall_back_when_wounded() {
        let ws = world_state(&[(WorldKey::LowHealth, true), (WorldKey::PlayerVisible, true)]);
        let intent = choose_intent(&ws);
        assert_eq!(intent.kind, Some(ActionKind::FallBack));
        assert_eq!(intent.goal, Some("preserve_self"));
    }
}
