//! Переходы FSM
//!
//! Порядок в тике: grenade_preempt (вытесняющий) → ai_fsm_transitions
//! (намерения планировщика + дефолты состояний) → run_search.
//! За тик не больше одного перехода на агента — всё пересчитывается
//! каждый кадр, спешить некуда.
//!
//! Все «несбыточные условия» (нет укрытия, нет фланга, нет плана)
//! деградируют в консервативный дефолт, наружу ошибки не уходят.

use bevy::prelude::*;

use crate::ai::{AIConfig, AIState, AIStateKind, DetectionEpisode, StateHistory};
use crate::components::{pos2, Agent, CoverPoint, Health, Player};
use crate::coordination::SearchCoordination;
use crate::hazard::{Grenade, Suppression, DANGER_RADIUS, SAFE_RADIUS};
use crate::movement::StuckDetected;
use crate::nav::{NavService, RayService, SpawnWarmup};
use crate::perception::{PlayerBelief, VisibleTarget};
use crate::planner::{ActionKind, PlannedIntent};
use crate::DeterministicRng;

use super::cover::find_cover;
use super::flanking::choose_flank;
use super::searching::enter_searching;

/// Минимальная выдержка в Suppressed (секунды)
const SUPPRESS_HOLD: f32 = 1.2;
/// Дистанция точки отхода при Retreating (пиксели)
const RETREAT_DISTANCE: f32 = 320.0;

/// Смена состояния: снятие координаторной регистрации на выходе
/// из Searching + запись истории. Единственная точка перехода.
pub(super) fn switch(
    entity: Entity,
    state: &mut AIState,
    history: &mut StateHistory,
    coordination: &mut SearchCoordination,
    next: AIState,
    now: f32,
) {
    let from = state.kind();
    if from == AIStateKind::Searching && next.kind() != AIStateKind::Searching {
        coordination.unregister(entity);
    }
    history.note_transition(from, now);
    *state = next;
}

/// Система: вытесняющий вход в EvadingGrenade
///
/// Landing-точка лочится здесь один раз; пока агент в EvadingGrenade,
/// повторный выбор не делается (гранатa катится — точка стоит).
pub fn grenade_preempt(
    mut agents: Query<
        (Entity, &mut AIState, &mut StateHistory, &Transform),
        (With<Agent>, Without<Player>),
    >,
    grenades: Query<(Entity, &Transform, &Grenade)>,
    mut coordination: ResMut<SearchCoordination>,
    time: Res<Time<Fixed>>,
) {
    let now = time.elapsed_secs();

    for (entity, mut state, mut history, transform) in agents.iter_mut() {
        if state.kind() == AIStateKind::EvadingGrenade {
            continue;
        }
        let agent_pos = pos2(transform);

        let mut nearest: Option<(f32, Entity, Vec2)> = None;
        for (hazard, hazard_transform, grenade) in grenades.iter() {
            let landing = grenade.predicted_landing(pos2(hazard_transform));
            let dist = agent_pos.distance(landing);
            if dist <= DANGER_RADIUS && nearest.map(|(d, _, _)| dist < d).unwrap_or(true) {
                nearest = Some((dist, hazard, landing));
            }
        }

        if let Some((_, hazard, landing)) = nearest {
            crate::log(&format!(
                "💣 agent {:?} evading grenade, locked landing {:?}",
                entity, landing
            ));
            switch(
                entity,
                &mut state,
                &mut history,
                &mut coordination,
                AIState::EvadingGrenade { hazard, landing },
                now,
            );
        }
    }
}

/// Система: основной переходный цикл
#[allow(clippy::too_many_arguments, clippy::type_complexity)]
pub fn ai_fsm_transitions(
    mut agents: Query<
        (
            Entity,
            &mut AIState,
            &mut StateHistory,
            &mut DetectionEpisode,
            &AIConfig,
            &Transform,
            &Health,
            &VisibleTarget,
            &PlayerBelief,
            &Suppression,
            &PlannedIntent,
            Option<&SpawnWarmup>,
        ),
        (With<Agent>, Without<Player>),
    >,
    players: Query<&Transform, With<Player>>,
    cover_points: Query<&Transform, With<CoverPoint>>,
    grenades: Query<&Grenade>,
    rays: Res<RayService>,
    nav: Res<NavService>,
    mut coordination: ResMut<SearchCoordination>,
    mut rng: ResMut<DeterministicRng>,
    time: Res<Time<Fixed>>,
) {
    let now = time.elapsed_secs();
    let covers: Vec<Vec2> = cover_points.iter().map(pos2).collect();

    for (
        entity,
        mut state,
        mut history,
        mut episode,
        config,
        transform,
        health,
        visible,
        belief,
        suppression,
        intent,
        warmup,
    ) in agents.iter_mut()
    {
        // Spatial index хоста ещё не готов — nav-запросы отложены
        if warmup.is_some() {
            continue;
        }

        let agent_pos = pos2(transform);

        // Цель могла despawn'уться между кадрами: протухшую ссылку
        // трактуем как «цель потеряна»
        let valid_target = visible.target.filter(|t| players.get(*t).is_ok());
        let visible_pos = valid_target.and_then(|t| players.get(t).ok()).map(pos2);
        let threat_pos = visible_pos.or_else(|| belief.position());

        // --- Выход из EvadingGrenade (лок до безопасности/взрыва) ---
        if let AIState::EvadingGrenade { hazard, landing } = *state {
            let hazard_gone = grenades.get(hazard).is_err();
            let reached_safety = agent_pos.distance(landing) >= SAFE_RADIUS;
            if hazard_gone || reached_safety {
                let next = match valid_target {
                    Some(target) => AIState::Combat { target },
                    None if belief.confidence() >= config.pursue_confidence_threshold => {
                        AIState::Pursuing {
                            destination: threat_pos.unwrap_or(agent_pos),
                        }
                    }
                    None => AIState::Idle,
                };
                if next.kind() == AIStateKind::Idle {
                    episode.end();
                }
                switch(entity, &mut state, &mut history, &mut coordination, next, now);
            }
            continue;
        }

        // --- Подавление: вход принудительный, выход по таймеру ---
        if suppression.is_pinned() && state.kind() != AIStateKind::Suppressed {
            switch(
                entity,
                &mut state,
                &mut history,
                &mut coordination,
                AIState::Suppressed {
                    until: now + SUPPRESS_HOLD,
                },
                now,
            );
            episode.begin();
            continue;
        }
        if let AIState::Suppressed { until } = *state {
            if now < until || suppression.is_pinned() {
                continue;
            }
            // Выдержали паузу — дальше обычная переоценка
        }

        let kind = state.kind();

        // --- Намерение планировщика ---
        match intent.kind {
            // Вытеснение гранатой обрабатывает grenade_preempt
            Some(ActionKind::EvadeHazard) => continue,

            Some(ActionKind::FallBack) if kind != AIStateKind::Retreating => {
                if let Some(threat) = threat_pos {
                    let away = (agent_pos - threat).normalize_or_zero();
                    if away != Vec2::ZERO {
                        switch(
                            entity,
                            &mut state,
                            &mut history,
                            &mut coordination,
                            AIState::Retreating {
                                destination: agent_pos + away * RETREAT_DISTANCE,
                            },
                            now,
                        );
                        continue;
                    }
                }
            }

            Some(ActionKind::TakeCover)
                if kind != AIStateKind::SeekingCover && kind != AIStateKind::InCover =>
            {
                if let Some(threat) = threat_pos {
                    match find_cover(agent_pos, threat, &covers, &nav, &rays) {
                        Some(spot) => {
                            switch(
                                entity,
                                &mut state,
                                &mut history,
                                &mut coordination,
                                AIState::SeekingCover { spot },
                                now,
                            );
                            episode.begin();
                            continue;
                        }
                        None => {
                            // Укрытия нет: помечаем эпизод и дерёмся
                            // без него, а не крутим цикл поиска
                            episode.begin();
                            episode.cover_search_failed = true;
                            if let Some(target) = valid_target {
                                switch(
                                    entity,
                                    &mut state,
                                    &mut history,
                                    &mut coordination,
                                    AIState::Combat { target },
                                    now,
                                );
                                continue;
                            }
                        }
                    }
                }
            }

            Some(ActionKind::EngageTarget) if kind != AIStateKind::Combat => {
                // Из InCover обратно в Combat — только по прямой
                // текущей видимости
                if let Some(target) = valid_target {
                    switch(
                        entity,
                        &mut state,
                        &mut history,
                        &mut coordination,
                        AIState::Combat { target },
                        now,
                    );
                    episode.begin();
                    continue;
                }
            }

            Some(ActionKind::Flank) if kind != AIStateKind::Flanking => {
                if let (Some(target), Some(target_pos)) = (valid_target, visible_pos) {
                    match choose_flank(agent_pos, target_pos, config.flank_offset, &nav, &rays) {
                        Some(waypoint) => {
                            switch(
                                entity,
                                &mut state,
                                &mut history,
                                &mut coordination,
                                AIState::Flanking { waypoint, target },
                                now,
                            );
                            continue;
                        }
                        // Оба кандидата отпали — fail closed, остаёмся
                        // в огневом контакте вместо марша в стену
                        None => {
                            if kind != AIStateKind::Combat {
                                switch(
                                    entity,
                                    &mut state,
                                    &mut history,
                                    &mut coordination,
                                    AIState::Combat { target },
                                    now,
                                );
                                continue;
                            }
                        }
                    }
                }
            }

            Some(ActionKind::AssaultPosition) if kind != AIStateKind::Assault => {
                if let Some(destination) = belief.position() {
                    switch(
                        entity,
                        &mut state,
                        &mut history,
                        &mut coordination,
                        AIState::Assault { destination },
                        now,
                    );
                    episode.begin();
                    continue;
                }
            }

            Some(ActionKind::InvestigateBelief) if kind != AIStateKind::Pursuing => {
                if let Some(destination) = belief.position() {
                    switch(
                        entity,
                        &mut state,
                        &mut history,
                        &mut coordination,
                        AIState::Pursuing { destination },
                        now,
                    );
                    episode.begin();
                    continue;
                }
            }

            Some(ActionKind::SearchArea) if kind != AIStateKind::Searching => {
                let center = belief.position().unwrap_or(agent_pos);
                let hint = belief.first_hypothesis();
                let next = enter_searching(entity, center, hint, now, &mut coordination, &mut rng);
                episode.begin();
                switch(entity, &mut state, &mut history, &mut coordination, next, now);
                continue;
            }

            _ => {}
        }

        // --- Дефолтная прогрессия состояний ---
        match *state {
            AIState::SeekingCover { spot } => {
                if agent_pos.distance(spot) <= config.arrive_radius {
                    switch(
                        entity,
                        &mut state,
                        &mut history,
                        &mut coordination,
                        AIState::InCover { spot },
                        now,
                    );
                }
            }

            AIState::Combat { .. } => {
                if valid_target.is_none() {
                    // Контакт потерян после огневого боя
                    let next = if belief.confidence() >= config.pursue_confidence_threshold {
                        AIState::Pursuing {
                            destination: belief.position().unwrap_or(agent_pos),
                        }
                    } else {
                        let center = belief.position().unwrap_or(agent_pos);
                        let hint = belief.first_hypothesis();
                        enter_searching(entity, center, hint, now, &mut coordination, &mut rng)
                    };
                    switch(entity, &mut state, &mut history, &mut coordination, next, now);
                }
            }

            AIState::Flanking { target, .. } => {
                if valid_target.is_none() || players.get(target).is_err() {
                    let center = belief.position().unwrap_or(agent_pos);
                    let hint = belief.first_hypothesis();
                    let next =
                        enter_searching(entity, center, hint, now, &mut coordination, &mut rng);
                    switch(entity, &mut state, &mut history, &mut coordination, next, now);
                }
            }

            AIState::Pursuing { destination } | AIState::Assault { destination } => {
                if valid_target.is_none()
                    && agent_pos.distance(destination) <= config.arrive_radius
                {
                    // Пришли, никого нет — секторный поиск вокруг точки
                    let hint = belief.first_hypothesis();
                    let next =
                        enter_searching(entity, destination, hint, now, &mut coordination, &mut rng);
                    switch(entity, &mut state, &mut history, &mut coordination, next, now);
                }
            }

            AIState::Retreating { destination } => {
                if agent_pos.distance(destination) <= config.arrive_radius {
                    // Точка отхода достигнута — полная переоценка
                    // (планировщик при нужде назначит следующий отход)
                    if valid_target.is_none() && belief.confidence() < config.pursue_confidence_threshold {
                        episode.end();
                    }
                    switch(
                        entity,
                        &mut state,
                        &mut history,
                        &mut coordination,
                        AIState::Idle,
                        now,
                    );
                }
            }

            AIState::Suppressed { until } => {
                if now >= until && !suppression.is_pinned() {
                    let next = match valid_target {
                        Some(target) => AIState::Combat { target },
                        None if belief.confidence() >= config.pursue_confidence_threshold => {
                            AIState::Pursuing {
                                destination: belief.position().unwrap_or(agent_pos),
                            }
                        }
                        None => {
                            let center = belief.position().unwrap_or(agent_pos);
                            let hint = belief.first_hypothesis();
                            enter_searching(entity, center, hint, now, &mut coordination, &mut rng)
                        }
                    };
                    switch(entity, &mut state, &mut history, &mut coordination, next, now);
                }
            }

            AIState::Idle => {
                if health.is_alive() && valid_target.is_some() {
                    episode.begin();
                }
            }

            // InCover/Searching ведут свои циклы (peek-fire и спираль)
            _ => {}
        }
    }
}

/// Система: застрявший агент принудительно переоценивается
///
/// Страховочный клапан: правильный fix — guard'ы переходов, которые
/// отбрасывают недостижимые цели заранее.
pub fn handle_stuck(
    mut events: EventReader<StuckDetected>,
    mut agents: Query<
        (
            &mut AIState,
            &mut StateHistory,
            &mut DetectionEpisode,
            &mut PlayerBelief,
            &VisibleTarget,
        ),
        (With<Agent>, Without<Player>),
    >,
    mut coordination: ResMut<SearchCoordination>,
    time: Res<Time<Fixed>>,
) {
    let now = time.elapsed_secs();

    for event in events.read() {
        let Ok((mut state, mut history, mut episode, mut belief, visible)) =
            agents.get_mut(event.agent)
        else {
            continue;
        };
        if !state.kind().is_movement_heavy() {
            continue;
        }

        crate::log(&format!(
            "🧱 agent {:?} stuck in {:?}, forcing re-evaluation",
            event.agent,
            state.kind()
        ));

        // Path к укрытию был, дойти не вышло — та же недостижимость,
        // что и «укрытия нет»: не выбирать его снова в этом эпизоде
        if state.kind() == AIStateKind::SeekingCover {
            episode.cover_search_failed = true;
        }

        let next = match visible.target {
            Some(target) => AIState::Combat { target },
            None => {
                // Belief вёл в недостижимую точку — сбрасываем, иначе
                // планировщик тут же отправит агента туда же
                belief.clear();
                episode.end();
                AIState::Idle
            }
        };
        switch(
            event.agent,
            &mut state,
            &mut history,
            &mut coordination,
            next,
            now,
        );
    }
}
