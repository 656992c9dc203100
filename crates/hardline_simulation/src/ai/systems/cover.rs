//! Выбор точки укрытия
//!
//! Укрытие валидно, если до него есть путь И стена режет линию
//! угроза→укрытие. Нет валидных точек — None, вызывающий НЕ входит
//! в SeekingCover и помечает эпизод (защита от цикла поиска укрытия).

use bevy::prelude::*;

use crate::nav::{NavService, RayService};

/// Максимальная дистанция до рассматриваемого укрытия (пиксели)
pub const COVER_SEARCH_RADIUS: f32 = 500.0;

/// Ближайшее валидное укрытие или None
pub fn find_cover(
    agent_pos: Vec2,
    threat_pos: Vec2,
    covers: &[Vec2],
    nav: &NavService,
    rays: &RayService,
) -> Option<Vec2> {
    let mut best: Option<(f32, Vec2)> = None;

    for &cover in covers {
        let dist = agent_pos.distance(cover);
        if dist > COVER_SEARCH_RADIUS {
            continue;
        }
        // Укрытие должно реально закрывать от угрозы
        if rays.line_clear(threat_pos, cover, &[]) {
            continue;
        }
        if nav.find_path(agent_pos, cover).is_none() {
            continue;
        }
        if best.map(|(d, _)| dist < d).unwrap_or(true) {
            best = Some((dist, cover));
        }
    }

    best.map(|(_, cover)| cover)
}
