//! Зрение: FOV конус + multi-point LOS по силуэту
//!
//! Одиночный луч в центр цели "видит" сквозь углы (центр торчит,
//! тело скрыто), поэтому авторитетная проверка — три точки силуэта,
//! видимость засчитывается от двух чистых лучей из трёх.
//! FOV-гейт применяется к КАЖДОМУ типу perception-события одинаково
//! (прямое зрение, наблюдение смерти союзника) — см. `within_fov`.

use bevy::prelude::*;

use crate::components::{pos2, Agent, Facing, Health, Player};
use crate::nav::RayService;
use crate::perception::memory::PlayerBelief;

/// Полуширина силуэта цели (пиксели), перпендикулярно лучу взгляда
pub const SILHOUETTE_HALF_WIDTH: f32 = 14.0;

/// Минимум чистых лучей из трёх для засчитанной видимости
pub const MIN_VISIBLE_SAMPLES: usize = 2;

/// Параметры зрения агента
#[derive(Component, Debug, Clone, Copy, Reflect)]
#[reflect(Component)]
pub struct VisionConfig {
    /// Дальность обнаружения (пиксели)
    pub range: f32,
    /// Половина угла конуса зрения (градусы)
    pub fov_half_angle_deg: f32,
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            range: 600.0,
            fov_half_angle_deg: 50.0,
        }
    }
}

/// Текущая видимая цель (None = игрока не видим)
#[derive(Component, Debug, Clone, Copy, Default, Reflect)]
#[reflect(Component)]
pub struct VisibleTarget {
    pub target: Option<Entity>,
}

/// FOV-гейт: угол до цели не превышает половину конуса от forward-вектора.
///
/// Единственная точка правды для всех типов perception-событий.
pub fn within_fov(forward: Vec2, from: Vec2, to: Vec2, half_angle_deg: f32) -> bool {
    let to_target = to - from;
    if to_target.length_squared() < 1e-6 {
        return true;
    }
    let cos_angle = forward.normalize_or_zero().dot(to_target.normalize());
    cos_angle >= half_angle_deg.to_radians().cos()
}

/// Multi-point LOS: три точки силуэта (левый край, центр, правый край),
/// перпендикуляр к лучу взгляда. Лучи идут только по wall-opacity маске
/// и исключают тела наблюдателя и цели.
pub fn silhouette_visible(
    rays: &RayService,
    eye: Vec2,
    target_pos: Vec2,
    exclude: &[Entity],
) -> bool {
    let dir = (target_pos - eye).normalize_or_zero();
    if dir == Vec2::ZERO {
        return true;
    }
    let side = dir.perp() * SILHOUETTE_HALF_WIDTH;
    let samples = [target_pos - side, target_pos, target_pos + side];

    let clear = samples
        .iter()
        .filter(|sample| rays.line_clear(eye, **sample, exclude))
        .count();
    clear >= MIN_VISIBLE_SAMPLES
}

/// Система: обновление VisibleTarget + belief от прямого зрения
///
/// Видимая цель даёт belief с confidence 1.0 (перезапись, не усреднение).
pub fn update_vision(
    mut agents: Query<
        (
            Entity,
            &Transform,
            &Facing,
            &VisionConfig,
            &mut VisibleTarget,
            &mut PlayerBelief,
        ),
        (With<Agent>, Without<Player>),
    >,
    players: Query<(Entity, &Transform, &Health), With<Player>>,
    rays: Res<RayService>,
    time: Res<Time<Fixed>>,
) {
    let now = time.elapsed_secs();

    for (agent, transform, facing, config, mut visible, mut belief) in agents.iter_mut() {
        let eye = pos2(transform);
        let mut seen: Option<(Entity, Vec2)> = None;

        for (player, player_transform, health) in players.iter() {
            if !health.is_alive() {
                continue;
            }
            let target_pos = pos2(player_transform);
            if eye.distance(target_pos) > config.range {
                continue;
            }
            if !within_fov(facing.forward(), eye, target_pos, config.fov_half_angle_deg) {
                continue;
            }
            if !silhouette_visible(&rays, eye, target_pos, &[agent, player]) {
                continue;
            }
            seen = Some((player, target_pos));
            break;
        }

        match seen {
            Some((player, target_pos)) => {
                if visible.target != Some(player) {
                    crate::log(&format!("👁️ {:?} acquired visual on {:?}", agent, player));
                }
                visible.target = Some(player);
                belief.observe(target_pos, 1.0, now);
            }
            None => {
                if visible.target.is_some() {
                    crate::log(&format!("👻 {:?} lost visual contact", agent));
                }
                visible.target = None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nav::{OpenField, RayService, SegmentMap, WallSegment};

    #[test]
    fn test_fov_scenario_bearings() {
        // Агент в (0,0), смотрит вдоль +X, половина конуса 50°
        let forward = Vec2::X;
        let from = Vec2::ZERO;

        // Цель на дистанции 500 по азимуту 90° — отклонить
        let at_90 = Vec2::new(0.0, 500.0);
        assert!(!within_fov(forward, from, at_90, 50.0));

        // Азимут 40° — принять
        let rad = 40.0f32.to_radians();
        let at_40 = Vec2::new(rad.cos(), rad.sin()) * 500.0;
        assert!(within_fov(forward, from, at_40, 50.0));
    }

    #[test]
    fn test_fov_accepts_dead_center() {
        assert!(within_fov(Vec2::X, Vec2::ZERO, Vec2::new(300.0, 0.0), 50.0));
    }

    #[test]
    fn test_silhouette_clear_field() {
        let rays = RayService(Box::new(OpenField));
        assert!(silhouette_visible(
            &rays,
            Vec2::ZERO,
            Vec2::new(200.0, 0.0),
            &[]
        ));
    }

    #[test]
    fn test_silhouette_center_exposed_body_hidden() {
        // Две короткие стены оставляют щель ровно по центру цели:
        // луч в центр чистый, лучи в края силуэта перекрыты.
        // Одиночный центр-луч сказал бы "видим" — multi-point отклоняет.
        let gap = 4.0;
        let rays = RayService(Box::new(SegmentMap::new(vec![
            WallSegment {
                a: Vec2::new(100.0, gap),
                b: Vec2::new(100.0, 80.0),
            },
            WallSegment {
                a: Vec2::new(100.0, -gap),
                b: Vec2::new(100.0, -80.0),
            },
        ])));

        let eye = Vec2::ZERO;
        let target = Vec2::new(200.0, 0.0);

        // Центр-луч чистый (прошёл в щель)
        assert!(rays.line_clear(eye, target, &[]));
        // Авторитетная multi-point проверка — цель НЕ видна
        assert!(!silhouette_visible(&rays, eye, target, &[]));
    }

    #[test]
    fn test_silhouette_partial_cover_still_visible() {
        // Закрыт только один край силуэта — 2 из 3 лучей чистые, видим
        let rays = RayService(Box::new(SegmentMap::new(vec![WallSegment {
            a: Vec2::new(100.0, 6.0),
            b: Vec2::new(100.0, 80.0),
        }])));
        assert!(silhouette_visible(
            &rays,
            Vec2::ZERO,
            Vec2::new(200.0, 0.0),
            &[]
        ));
    }
}
