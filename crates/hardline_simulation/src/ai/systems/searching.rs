//! Секторный поиск: спираль waypoint'ов внутри назначенного сектора
//!
//! Радиус растёт по ногам спирали, угол — случайный внутри сектора
//! (константный разворот выглядит механически). На каждом waypoint'е
//! bounded-скан со случайным углом взгляда. По таймауту — Idle.

use bevy::prelude::*;
use rand::Rng;

use crate::ai::{AIConfig, AIState, AIStateKind, DetectionEpisode, StateHistory};
use crate::components::{pos2, Agent, Player};
use crate::coordination::{Sector, SearchCoordination};
use crate::DeterministicRng;

/// Радиус первой ноги спирали (пиксели)
pub const SEARCH_BASE_RADIUS: f32 = 60.0;
/// Прирост радиуса на ногу
pub const SEARCH_LEG_STEP: f32 = 80.0;
/// Потолок радиуса спирали
pub const SEARCH_MAX_RADIUS: f32 = 400.0;

/// Вход в Searching: регистрация в координаторе + первый waypoint
///
/// `hint` — подозреваемое направление из памяти (гипотезы после
/// попадания или увиденной смерти). Если оно попадает в назначенный
/// сектор, первая нога идёт вдоль него вместо случайного угла.
pub fn enter_searching(
    entity: Entity,
    center: Vec2,
    hint: Option<Vec2>,
    now: f32,
    coordination: &mut SearchCoordination,
    rng: &mut DeterministicRng,
) -> AIState {
    let sector = coordination.register(entity, center);
    let (waypoint, scan_angle) = match hint_angle(hint, &sector) {
        Some(angle) => (center + Vec2::from_angle(angle) * SEARCH_BASE_RADIUS, angle),
        None => spiral_waypoint(center, &sector, 0, rng),
    };
    AIState::Searching {
        center,
        sector,
        waypoint,
        scan_until: 0.0,
        scan_angle,
        leg: 0,
        started_at: now,
    }
}

/// Угол подсказки, если она ненулевая и лежит в секторе агента
fn hint_angle(hint: Option<Vec2>, sector: &Sector) -> Option<f32> {
    let dir = hint?;
    if dir.length_squared() < 1e-6 {
        return None;
    }
    let angle_deg = dir.y.atan2(dir.x).to_degrees().rem_euclid(360.0);
    sector.contains(angle_deg).then(|| angle_deg.to_radians())
}

/// Waypoint ноги `leg`: случайный угол внутри сектора, радиус по ноге
fn spiral_waypoint(
    center: Vec2,
    sector: &Sector,
    leg: u32,
    rng: &mut DeterministicRng,
) -> (Vec2, f32) {
    let radius = (SEARCH_BASE_RADIUS + SEARCH_LEG_STEP * leg as f32).min(SEARCH_MAX_RADIUS);
    let angle_deg = sector.lerp_angle(rng.rng.gen::<f32>());
    let angle = angle_deg.to_radians();
    (center + Vec2::from_angle(angle) * radius, angle)
}

/// Система: прогресс поиска (сканы, следующая нога, таймаут)
pub fn run_search(
    mut agents: Query<
        (
            Entity,
            &mut AIState,
            &mut StateHistory,
            &mut DetectionEpisode,
            &AIConfig,
            &Transform,
        ),
        (With<Agent>, Without<Player>),
    >,
    mut coordination: ResMut<SearchCoordination>,
    mut rng: ResMut<DeterministicRng>,
    time: Res<Time<Fixed>>,
) {
    let now = time.elapsed_secs();

    for (entity, mut state, mut history, mut episode, config, transform) in agents.iter_mut() {
        let AIState::Searching {
            center,
            sector,
            waypoint,
            scan_until,
            scan_angle,
            leg,
            started_at,
        } = &mut *state
        else {
            continue;
        };

        if now - *started_at >= config.search_max_duration {
            coordination.unregister(entity);
            episode.end();
            history.note_transition(AIStateKind::Searching, now);
            crate::log(&format!("🔍 agent {:?} search timed out, back to idle", entity));
            *state = AIState::Idle;
            continue;
        }

        // Сектор пересчитывается жадно при join/leave соседей —
        // обновляем локальную копию каждый тик
        if let Some(current) = coordination.sector_of(entity) {
            *sector = current;
        }

        let arrived = pos2(transform).distance(*waypoint) <= config.arrive_radius;
        if !arrived {
            continue;
        }

        if *scan_until == 0.0 {
            *scan_until = now + config.scan_duration;
            *scan_angle = sector.lerp_angle(rng.rng.gen::<f32>()).to_radians();
        } else if now >= *scan_until {
            *leg += 1;
            let (next, angle) = spiral_waypoint(*center, sector, *leg, &mut *rng);
            *waypoint = next;
            *scan_angle = angle;
            *scan_until = 0.0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_rng() -> DeterministicRng {
        DeterministicRng::from_seed(7)
    }

    #[test]
    fn test_spiral_radius_grows_and_caps() {
        let sector = Sector {
            start_deg: 0.0,
            end_deg: 360.0,
        };
        let center = Vec2::new(100.0, 100.0);
        let mut rng = test_rng();

        let (w0, _) = spiral_waypoint(center, &sector, 0, &mut rng);
        let (w3, _) = spiral_waypoint(center, &sector, 3, &mut rng);
        let (w9, _) = spiral_waypoint(center, &sector, 9, &mut rng);

        assert!((center.distance(w0) - SEARCH_BASE_RADIUS).abs() < 0.5);
        assert!((center.distance(w3) - (SEARCH_BASE_RADIUS + 3.0 * SEARCH_LEG_STEP)).abs() < 0.5);
        assert!((center.distance(w9) - SEARCH_MAX_RADIUS).abs() < 0.5);
    }

    #[test]
    fn test_waypoints_stay_inside_sector() {
        let sector = Sector {
            start_deg: 120.0,
            end_deg: 240.0,
        };
        let center = Vec2::ZERO;
        let mut rng = test_rng();

        for leg in 0..20 {
            let (waypoint, _) = spiral_waypoint(center, &sector, leg, &mut rng);
            let angle = waypoint.y.atan2(waypoint.x).to_degrees().rem_euclid(360.0);
            assert!(
                sector.contains(angle) || (angle - sector.end_deg).abs() < 0.01,
                "angle {} outside sector [{}, {})",
                angle,
                sector.start_deg,
                sector.end_deg
            );
        }
    }

    #[test]
    fn test_enter_searching_registers() {
        let mut coordination = SearchCoordination::default();
        let mut rng = test_rng();
        let agent = Entity::from_bits((1u64 << 32) | 1);

        let state = enter_searching(
            agent,
            Vec2::new(50.0, 50.0),
            None,
            1.0,
            &mut coordination,
            &mut rng,
        );
        assert_eq!(state.kind(), AIStateKind::Searching);
        assert_eq!(coordination.participant_count(agent), 1);
        assert!(coordination.sector_of(agent).is_some());
    }

    #[test]
    fn test_hypothesis_hint_steers_first_leg() {
        let mut coordination = SearchCoordination::default();
        let mut rng = test_rng();
        let agent = Entity::from_bits((1u64 << 32) | 1);
        let center = Vec2::new(200.0, -80.0);

        // Одиночный агент получает полный сектор — подсказка всегда в нём
        let state = enter_searching(
            agent,
            center,
            Some(Vec2::new(0.0, 1.0)),
            0.0,
            &mut coordination,
            &mut rng,
        );
        let AIState::Searching { waypoint, scan_angle, .. } = state else {
            panic!("expected searching state");
        };
        assert!((waypoint - (center + Vec2::new(0.0, SEARCH_BASE_RADIUS))).length() < 0.5);
        assert!((scan_angle - std::f32::consts::FRAC_PI_2).abs() < 1e-4);
    }

    #[test]
    fn test_hint_outside_sector_is_ignored() {
        let sector = Sector {
            start_deg: 120.0,
            end_deg: 240.0,
        };
        // Подсказка вдоль +X (0°) вне сектора [120, 240)
        assert!(hint_angle(Some(Vec2::X), &sector).is_none());
        assert!(hint_angle(Some(Vec2::ZERO), &sector).is_none());
        let inside = hint_angle(Some(Vec2::new(-1.0, 0.0)), &sector);
        assert!((inside.unwrap().to_degrees() - 180.0).abs() < 1e-3);
    }
}
