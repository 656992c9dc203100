//! Threat и grenade avoidance
//!
//! Predicted landing гранаты считается из кинематики равномерного
//! торможения (`stopping_distance = v²/(2·friction)`), НЕ из текущей
//! позиции — погоня за мгновенной позицией заставляет агента вилять
//! за катящейся гранатой. Лок landing-точки живёт в состоянии
//! EvadingGrenade (см. ai::systems::fsm).

use bevy::prelude::*;

use crate::combat::{AudioCue, AudioCueKind, Bullet};
use crate::components::{pos2, Agent, Player};
use crate::perception::SoundEmitted;
use crate::SimSet;

/// Радиус опасной зоны вокруг predicted landing (пиксели)
pub const DANGER_RADIUS: f32 = 150.0;

/// Радиус выхода из evasion (гистерезис против дрожания на границе)
pub const SAFE_RADIUS: f32 = 190.0;

/// Трение качения гранаты по земле (пиксели/с²)
pub const GROUND_FRICTION: f32 = 300.0;

/// Suppression выше этого уровня — "по нам стреляют"
pub const UNDER_FIRE_LEVEL: f32 = 0.3;

/// Suppression выше этого уровня прижимает агента (Suppressed)
pub const SUPPRESSED_LEVEL: f32 = 1.0;

/// Радиус threat-сферы для пролетающих пуль (пиксели)
pub const BULLET_THREAT_RADIUS: f32 = 60.0;

const SUPPRESSION_GAIN_RATE: f32 = 2.5;
const SUPPRESSION_DECAY_RATE: f32 = 0.4;
const SUPPRESSION_MAX: f32 = 2.0;

/// Граната: катится с равномерным торможением, взрывается по fuse
#[derive(Component, Debug, Clone, Reflect)]
#[reflect(Component)]
pub struct Grenade {
    pub velocity: Vec2,
    pub friction: f32,
    /// Секунды до детонации
    pub fuse: f32,
}

impl Grenade {
    pub fn thrown(velocity: Vec2, fuse: f32) -> Self {
        Self {
            velocity,
            friction: GROUND_FRICTION,
            fuse,
        }
    }

    /// Точка остановки по текущей скорости: v²/(2·friction) вдоль
    /// направления движения
    pub fn predicted_landing(&self, position: Vec2) -> Vec2 {
        let speed = self.velocity.length();
        if speed < 1e-3 || self.friction <= 0.0 {
            return position;
        }
        let stopping_distance = speed * speed / (2.0 * self.friction);
        position + self.velocity / speed * stopping_distance
    }
}

/// Событие детонации (позиция для урона/эффектов хоста)
#[derive(Event, Debug, Clone)]
pub struct GrenadeDetonated {
    pub grenade: Entity,
    pub position: Vec2,
}

/// Накопленное подавление от пуль в threat-сфере
#[derive(Component, Debug, Clone, Copy, Default, Reflect)]
#[reflect(Component)]
pub struct Suppression {
    pub level: f32,
}

impl Suppression {
    pub fn is_pinned(&self) -> bool {
        self.level >= SUPPRESSED_LEVEL
    }
}

/// Система: качение гранат (дискретное трение, как у хоста) + fuse
pub fn integrate_grenades(
    mut commands: Commands,
    mut grenades: Query<(Entity, &mut Transform, &mut Grenade)>,
    mut detonations: EventWriter<GrenadeDetonated>,
    mut sounds: EventWriter<SoundEmitted>,
    mut cues: EventWriter<AudioCue>,
    time: Res<Time<Fixed>>,
) {
    let dt = time.delta_secs();

    for (entity, mut transform, mut grenade) in grenades.iter_mut() {
        let speed = grenade.velocity.length();
        if speed > 1e-3 {
            let friction_amount = grenade.friction * dt;
            if friction_amount >= speed {
                grenade.velocity = Vec2::ZERO;
            } else {
                let dir = grenade.velocity / speed;
                grenade.velocity -= dir * friction_amount;
            }
            let displacement = (grenade.velocity * dt).extend(0.0);
            transform.translation += displacement;
        }

        grenade.fuse -= dt;
        if grenade.fuse <= 0.0 {
            let position = pos2(&transform);
            detonations.write(GrenadeDetonated {
                grenade: entity,
                position,
            });
            sounds.write(SoundEmitted {
                position,
                reference_distance: 160.0,
                source: None,
            });
            cues.write(AudioCue {
                kind: AudioCueKind::Detonation,
                position,
            });
            crate::log(&format!("💥 grenade {:?} detonated at {:?}", entity, position));
            commands.entity(entity).despawn();
        }
    }
}

/// Система: подавление от пуль в threat-сфере
///
/// Пули своей фракции не подавляют. Decay постоянный, накопление
/// пропорционально числу пуль рядом.
pub fn track_bullet_threats(
    mut agents: Query<(&Agent, &Transform, &mut Suppression), Without<Player>>,
    bullets: Query<(&Transform, &Bullet)>,
    time: Res<Time<Fixed>>,
) {
    let dt = time.delta_secs();

    let bullet_data: Vec<(Vec2, u64)> = bullets
        .iter()
        .map(|(transform, bullet)| (pos2(transform), bullet.faction_id))
        .collect();

    for (agent, transform, mut suppression) in agents.iter_mut() {
        let agent_pos = pos2(transform);
        let threats = bullet_data
            .iter()
            .filter(|(pos, faction)| {
                *faction != agent.faction_id && agent_pos.distance(*pos) <= BULLET_THREAT_RADIUS
            })
            .count();

        if threats > 0 {
            suppression.level =
                (suppression.level + SUPPRESSION_GAIN_RATE * threats as f32 * dt).min(SUPPRESSION_MAX);
        } else {
            suppression.level = (suppression.level - SUPPRESSION_DECAY_RATE * dt).max(0.0);
        }
    }
}

pub struct HazardPlugin;

impl Plugin for HazardPlugin {
    fn build(&self, app: &mut App) {
        app.add_event::<GrenadeDetonated>().add_systems(
            FixedUpdate,
            (integrate_grenades, track_bullet_threats)
                .chain()
                .in_set(SimSet::Hazards),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_predicted_landing_uses_stopping_distance() {
        let grenade = Grenade::thrown(Vec2::new(600.0, 0.0), 2.0);
        let landing = grenade.predicted_landing(Vec2::ZERO);
        // 600² / (2·300) = 600 пикселей вдоль +X
        assert!((landing - Vec2::new(600.0, 0.0)).length() < 1e-3);
    }

    #[test]
    fn test_predicted_landing_stationary() {
        let grenade = Grenade {
            velocity: Vec2::ZERO,
            friction: GROUND_FRICTION,
            fuse: 1.0,
        };
        let pos = Vec2::new(42.0, -7.0);
        assert_eq!(grenade.predicted_landing(pos), pos);
    }

    #[test]
    fn test_landing_prediction_agrees_with_rollout() {
        // Дискретная симуляция качения (как integrate_grenades)
        // останавливается около аналитической точки
        let mut velocity = Vec2::new(500.0, 200.0);
        let mut position = Vec2::ZERO;
        let predicted = Grenade::thrown(velocity, 99.0).predicted_landing(position);

        let dt = 1.0 / 60.0;
        for _ in 0..600 {
            let speed = velocity.length();
            if speed < 1e-3 {
                break;
            }
            let friction_amount = GROUND_FRICTION * dt;
            if friction_amount >= speed {
                velocity = Vec2::ZERO;
            } else {
                velocity -= velocity / speed * friction_amount;
            }
            position += velocity * dt;
        }

        // Дискретизация даёт небольшую недолётную ошибку (~v·dt/2)
        assert!(
            position.distance(predicted) < 10.0,
            "rollout {:?} vs predicted {:?}",
            position,
            predicted
        );
    }

    #[test]
    fn test_suppression_thresholds_ordered() {
        assert!(UNDER_FIRE_LEVEL < SUPPRESSED_LEVEL);
        assert!(SAFE_RADIUS > DANGER_RADIUS);
    }
}
