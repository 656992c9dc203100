//! Реакции на события боя: попадание по себе, гибель союзника
//!
//! FOV-гейт применяется к КАЖДОМУ типу perception-события, включая
//! наблюдение смерти союзника — дистанции недостаточно. Гейт тот же
//! within_fov + multi-point LOS, что и у прямого зрения.

use bevy::prelude::*;

use crate::ai::{AIState, AIStateKind, DetectionEpisode, StateHistory};
use crate::combat::{AgentDied, DamageDealt};
use crate::components::{pos2, Agent, Facing, Player};
use crate::coordination::SearchCoordination;
use crate::perception::{silhouette_visible, within_fov, PlayerBelief, VisionConfig};
use crate::nav::RayService;
use crate::DeterministicRng;

use super::fsm::switch;
use super::searching::enter_searching;

/// Уверенность belief'а от попадания (направление — грубая догадка)
const HIT_REACTION_CONFIDENCE: f32 = 0.55;
/// Дистанция проекции догадки «стреляли оттуда»
const HIT_GUESS_DISTANCE: f32 = 250.0;
/// Уверенность belief'а от увиденной смерти союзника.
/// Ниже assault-порога: свидетель прочёсывает район гибели,
/// а не штурмует точку, где убийцы уже нет.
const WITNESS_CONFIDENCE: f32 = 0.65;

/// Система: попадание по агенту даёт направленную догадку об угрозе
pub fn react_to_damage(
    mut events: EventReader<DamageDealt>,
    mut agents: Query<
        (&Transform, &mut PlayerBelief, &mut DetectionEpisode),
        (With<Agent>, Without<Player>),
    >,
    time: Res<Time<Fixed>>,
) {
    let now = time.elapsed_secs();

    for event in events.read() {
        let Ok((transform, mut belief, mut episode)) = agents.get_mut(event.target) else {
            continue;
        };
        let guess = pos2(transform) + event.source_direction * HIT_GUESS_DISTANCE;
        // observe перезаписывает только если не слабее текущего:
        // визуальный контакт (1.0) догадка не затирает
        belief.observe(guess, HIT_REACTION_CONFIDENCE, now);
        belief.add_hypothesis(event.source_direction);
        episode.begin();
    }
}

/// Система: смерть союзника в поле зрения — обновление памяти плюс
/// переход в секторный поиск вокруг точки гибели
pub fn witness_ally_death(
    mut deaths: EventReader<AgentDied>,
    mut witnesses: Query<
        (
            Entity,
            &Agent,
            &Transform,
            &Facing,
            &VisionConfig,
            &mut PlayerBelief,
            &mut DetectionEpisode,
            &mut AIState,
            &mut StateHistory,
        ),
        Without<Player>,
    >,
    mut coordination: ResMut<SearchCoordination>,
    mut rng: ResMut<DeterministicRng>,
    rays: Res<RayService>,
    time: Res<Time<Fixed>>,
) {
    let now = time.elapsed_secs();

    for death in deaths.read() {
        for (entity, agent, transform, facing, vision, mut belief, mut episode, mut state, mut history) in
            witnesses.iter_mut()
        {
            if entity == death.agent || agent.faction_id != death.faction_id {
                continue;
            }
            let eye = pos2(transform);
            if eye.distance(death.position) > vision.range {
                continue;
            }
            if !within_fov(facing.forward(), eye, death.position, vision.fov_half_angle_deg) {
                continue;
            }
            if !silhouette_visible(&rays, eye, death.position, &[entity]) {
                continue;
            }

            let hint = (death.position - eye).normalize_or_zero();
            belief.observe(death.position, WITNESS_CONFIDENCE, now);
            belief.add_hypothesis(hint);
            episode.begin();
            crate::log(&format!(
                "👁️ agent {:?} witnessed ally death at {:?}",
                entity, death.position
            ));

            // Огневой бой, уклонение от гранаты и отход не прерываются
            let kind = state.kind();
            if kind.is_engaged()
                || kind == AIStateKind::EvadingGrenade
                || kind == AIStateKind::Retreating
            {
                continue;
            }
            let next = enter_searching(
                entity,
                death.position,
                Some(hint),
                now,
                &mut coordination,
                &mut rng,
            );
            switch(entity, &mut state, &mut history, &mut coordination, next, now);
        }
    }
}
