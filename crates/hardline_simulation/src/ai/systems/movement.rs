//! Желаемая скорость из состояния
//!
//! Состояния только ПРОИЗВОДЯТ MoveIntent; интеграцию (и коллизию)
//! делает ровно один проход movement::integrate_movement за тик.
//! Двойная интеграция (в state-handler'е и в общем post-update)
//! удваивает эффективную скорость — источник дрожания.

use bevy::prelude::*;

use crate::ai::{AIConfig, AIState};
use crate::components::{pos2, Agent, Player};
use crate::movement::MoveIntent;
use crate::nav::{NavService, SpawnWarmup};
use crate::perception::{PlayerBelief, VisibleTarget};

/// Дальше этого Combat подтягивается к цели (пиксели)
const COMBAT_MAX_RANGE: f32 = 420.0;
/// Ближе этого Combat пятится
const COMBAT_MIN_RANGE: f32 = 180.0;
/// Множитель скорости рывка Assault
const ASSAULT_SPEED_FACTOR: f32 = 1.3;
/// Множитель скорости ухода от гранаты
const EVADE_SPEED_FACTOR: f32 = 1.2;

/// Первый шаг пути к `to` или ZERO (нет пути / уже пришли)
fn steer_along_path(nav: &NavService, from: Vec2, to: Vec2, speed: f32, arrive: f32) -> Vec2 {
    if from.distance(to) <= arrive {
        return Vec2::ZERO;
    }
    let Some(path) = nav.find_path(from, to) else {
        return Vec2::ZERO;
    };
    let next = path
        .iter()
        .copied()
        .find(|point| from.distance(*point) > 8.0)
        .unwrap_or(to);
    (next - from).normalize_or_zero() * speed
}

/// Система: состояние → MoveIntent (скорость + желаемый взгляд)
pub fn compute_move_intents(
    mut agents: Query<
        (
            &AIState,
            &AIConfig,
            &Transform,
            &VisibleTarget,
            &PlayerBelief,
            &mut MoveIntent,
            Option<&SpawnWarmup>,
        ),
        (With<Agent>, Without<Player>),
    >,
    players: Query<&Transform, With<Player>>,
    nav: Res<NavService>,
) {
    for (state, config, transform, visible, belief, mut intent, warmup) in agents.iter_mut() {
        intent.velocity = Vec2::ZERO;
        intent.face = None;

        if warmup.is_some() {
            continue;
        }

        let agent_pos = pos2(transform);
        let visible_pos = visible
            .target
            .and_then(|t| players.get(t).ok())
            .map(pos2);
        let threat_pos = visible_pos.or_else(|| belief.position());

        match *state {
            AIState::Idle => {}

            AIState::Combat { target } => {
                let target_pos = players.get(target).ok().map(pos2).or(visible_pos);
                if let Some(target_pos) = target_pos {
                    intent.face = Some(target_pos - agent_pos);
                    let dist = agent_pos.distance(target_pos);
                    if dist > COMBAT_MAX_RANGE {
                        intent.velocity = steer_along_path(
                            &nav,
                            agent_pos,
                            target_pos,
                            config.move_speed,
                            COMBAT_MAX_RANGE,
                        );
                    } else if dist < COMBAT_MIN_RANGE {
                        intent.velocity =
                            (agent_pos - target_pos).normalize_or_zero() * config.move_speed * 0.6;
                    }
                }
            }

            AIState::SeekingCover { spot } => {
                intent.velocity =
                    steer_along_path(&nav, agent_pos, spot, config.move_speed, config.arrive_radius);
                intent.face = threat_pos.map(|t| t - agent_pos);
            }

            AIState::InCover { .. } | AIState::Suppressed { .. } => {
                intent.face = threat_pos.map(|t| t - agent_pos);
            }

            AIState::Flanking { waypoint, .. } => {
                intent.velocity = steer_along_path(
                    &nav,
                    agent_pos,
                    waypoint,
                    config.move_speed,
                    config.arrive_radius,
                );
                intent.face = visible_pos.map(|t| t - agent_pos);
            }

            AIState::Retreating { destination } => {
                intent.velocity = steer_along_path(
                    &nav,
                    agent_pos,
                    destination,
                    config.move_speed,
                    config.arrive_radius,
                );
                // Отходим лицом к угрозе
                intent.face = threat_pos.map(|t| t - agent_pos);
            }

            AIState::Pursuing { destination } => {
                intent.velocity = steer_along_path(
                    &nav,
                    agent_pos,
                    destination,
                    config.move_speed,
                    config.arrive_radius,
                );
            }

            AIState::Assault { destination } => {
                intent.velocity = steer_along_path(
                    &nav,
                    agent_pos,
                    destination,
                    config.move_speed * ASSAULT_SPEED_FACTOR,
                    config.arrive_radius,
                );
            }

            AIState::Searching {
                waypoint,
                scan_until,
                scan_angle,
                ..
            } => {
                let arrived = agent_pos.distance(waypoint) <= config.arrive_radius;
                if arrived && scan_until > 0.0 {
                    intent.face = Some(Vec2::from_angle(scan_angle));
                } else {
                    intent.velocity = steer_along_path(
                        &nav,
                        agent_pos,
                        waypoint,
                        config.move_speed * 0.8,
                        config.arrive_radius,
                    );
                }
            }

            AIState::EvadingGrenade { landing, .. } => {
                let mut away = (agent_pos - landing).normalize_or_zero();
                if away == Vec2::ZERO {
                    // Стоим ровно на точке падения
                    away = Vec2::X;
                }
                // Залоченная точка — даже если граната уже укатилась
                intent.velocity = away * config.move_speed * EVADE_SPEED_FACTOR;
            }
        }

        if intent.face.is_none() && intent.velocity != Vec2::ZERO {
            intent.face = Some(intent.velocity);
        }
    }
}
