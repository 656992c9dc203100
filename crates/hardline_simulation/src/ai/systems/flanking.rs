//! Выбор фланговой точки
//!
//! Кандидаты — слева и справа от линии агент→цель. Кандидат валиден,
//! если до него есть путь И из него есть LOS на цель. Оба невалидны —
//! None (fail closed): дефолт «ближняя сторона» заводит агента в стену.

use bevy::prelude::*;

use crate::nav::{NavService, RayService};

/// Левый и правый фланговые кандидаты
pub fn flank_candidates(agent_pos: Vec2, target_pos: Vec2, offset: f32) -> [Vec2; 2] {
    let to_target = (target_pos - agent_pos).normalize_or_zero();
    let side = to_target.perp() * offset;
    let midpoint = (agent_pos + target_pos) * 0.5;
    [midpoint + side, midpoint - side]
}

/// Валидный фланговый waypoint или None, если оба кандидата отпали
pub fn choose_flank(
    agent_pos: Vec2,
    target_pos: Vec2,
    offset: f32,
    nav: &NavService,
    rays: &RayService,
) -> Option<Vec2> {
    let mut best: Option<(f32, Vec2)> = None;

    for candidate in flank_candidates(agent_pos, target_pos, offset) {
        if !rays.line_clear(candidate, target_pos, &[]) {
            continue;
        }
        let Some(path) = nav.find_path(agent_pos, candidate) else {
            continue;
        };
        let length = path_length(agent_pos, &path);
        if best.map(|(l, _)| length < l).unwrap_or(true) {
            best = Some((length, candidate));
        }
    }

    best.map(|(_, candidate)| candidate)
}

fn path_length(from: Vec2, path: &[Vec2]) -> f32 {
    let mut total = 0.0;
    let mut prev = from;
    for &point in path {
        total += prev.distance(point);
        prev = point;
    }
    total
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nav::{NavService, OpenField, RayService, SegmentMap, WallSegment};

    #[test]
    fn test_candidates_are_mirrored() {
        let [left, right] = flank_candidates(Vec2::ZERO, Vec2::new(200.0, 0.0), 100.0);
        assert!((left - Vec2::new(100.0, 100.0)).length() < 1e-3);
        assert!((right - Vec2::new(100.0, -100.0)).length() < 1e-3);
    }

    #[test]
    fn test_open_field_picks_shorter() {
        let rays = RayService(Box::new(OpenField));
        let nav = NavService(Box::new(OpenField));
        let found = choose_flank(Vec2::ZERO, Vec2::new(200.0, 0.0), 100.0, &nav, &rays);
        // Оба симметричны; берётся первый из равных (левый)
        assert_eq!(found, Some(Vec2::new(100.0, 100.0)));
    }

    #[test]
    fn test_both_candidates_blocked_fails_closed() {
        // Коробка вокруг агента: ни к одному кандидату нет пути
        let box_walls = vec![
            WallSegment { a: Vec2::new(-40.0, -40.0), b: Vec2::new(40.0, -40.0) },
            WallSegment { a: Vec2::new(40.0, -40.0), b: Vec2::new(40.0, 40.0) },
            WallSegment { a: Vec2::new(40.0, 40.0), b: Vec2::new(-40.0, 40.0) },
            WallSegment { a: Vec2::new(-40.0, 40.0), b: Vec2::new(-40.0, -40.0) },
        ];
        let rays = RayService(Box::new(SegmentMap::new(box_walls.clone())));
        let nav = NavService(Box::new(SegmentMap::new(box_walls)));

        let found = choose_flank(Vec2::ZERO, Vec2::new(300.0, 0.0), 120.0, &nav, &rays);
        assert_eq!(found, None);
    }

    #[test]
    fn test_candidate_without_los_rejected() {
        // Стена закрывает левый кандидат от цели; правый валиден
        let walls = vec![WallSegment {
            a: Vec2::new(80.0, 60.0),
            b: Vec2::new(220.0, 60.0),
        }];
        let rays = RayService(Box::new(SegmentMap::new(walls.clone())));
        let nav = NavService(Box::new(OpenField));

        let found = choose_flank(Vec2::ZERO, Vec2::new(200.0, 0.0), 100.0, &nav, &rays);
        assert_eq!(found, Some(Vec2::new(100.0, -100.0)));
    }
}
