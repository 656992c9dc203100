//! Combat: стрельба, пули, урон, смерть
//!
//! Логика намеренно тупая: решение «стрелять или нет» принимает FSM
//! (engaged-состояния), здесь только исполнение. Урон и смерть идут
//! через события, чтобы реакции (react_to_damage, witness_ally_death)
//! читали их в своей фазе.

use bevy::prelude::*;

use crate::ai::AIState;
use crate::components::{pos2, Agent, Facing, FireCooldown, Health, WeaponClass};
use crate::nav::{collision, RayService};
use crate::perception::{SoundEmitted, VisibleTarget};
use crate::{DeterministicRng, SimSet};
use rand::Rng;

const BULLET_SPEED: f32 = 900.0;
const BULLET_LIFETIME: f32 = 1.5;
const BULLET_HIT_RADIUS: f32 = 12.0;
const BULLET_DAMAGE: u32 = 12;
const AIM_SPREAD_RAD: f32 = 0.035;

/// Летящая пуля (прямолинейная, без гравитации)
#[derive(Component, Debug, Clone, Reflect)]
#[reflect(Component)]
pub struct Bullet {
    pub velocity: Vec2,
    pub faction_id: u64,
    pub shooter: Option<Entity>,
    pub lifetime: f32,
}

/// Событие попадания (до применения к Health)
#[derive(Event, Debug, Clone)]
pub struct DamageDealt {
    pub target: Entity,
    pub amount: u32,
    /// Направление ОТ цели К источнику урона (для reaction turn)
    pub source_direction: Vec2,
    pub attacker: Option<Entity>,
}

/// Событие смерти агента (witness-реакции + sink для хоста)
#[derive(Event, Debug, Clone)]
pub struct AgentDied {
    pub agent: Entity,
    pub position: Vec2,
    pub faction_id: u64,
}

/// Звуковой sink для хоста (рендер/аудио слой)
#[derive(Event, Debug, Clone)]
pub struct AudioCue {
    pub kind: AudioCueKind,
    pub position: Vec2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioCueKind {
    Gunshot,
    Detonation,
}

/// Система: engaged-агенты стреляют по видимой цели с кулдауном
pub fn combat_fire(
    mut commands: Commands,
    mut shooters: Query<(
        Entity,
        &Agent,
        &Transform,
        &Facing,
        &WeaponClass,
        &mut FireCooldown,
        &AIState,
        &VisibleTarget,
    )>,
    targets: Query<&Transform>,
    mut sounds: EventWriter<SoundEmitted>,
    mut cues: EventWriter<AudioCue>,
    mut rng: ResMut<DeterministicRng>,
    time: Res<Time<Fixed>>,
) {
    let dt = time.delta_secs();

    for (entity, agent, transform, _facing, weapon, mut cooldown, state, visible) in
        shooters.iter_mut()
    {
        cooldown.remaining = (cooldown.remaining - dt).max(0.0);

        if !state.kind().is_engaged() {
            continue;
        }
        let Some(target) = visible.target else {
            continue;
        };
        if cooldown.remaining > 0.0 {
            continue;
        }
        let Ok(target_transform) = targets.get(target) else {
            continue;
        };

        let origin = pos2(transform);
        let aim = pos2(target_transform) - origin;
        if aim.length_squared() < 1e-6 {
            continue;
        }

        let spread = rng.rng.gen_range(-AIM_SPREAD_RAD..AIM_SPREAD_RAD);
        let dir = Vec2::from_angle(spread).rotate(aim.normalize());

        commands.spawn((
            Bullet {
                velocity: dir * BULLET_SPEED,
                faction_id: agent.faction_id,
                shooter: Some(entity),
                lifetime: BULLET_LIFETIME,
            },
            Transform::from_translation(origin.extend(0.0)),
        ));

        cooldown.remaining = weapon.fire_cooldown();
        sounds.write(SoundEmitted {
            position: origin,
            reference_distance: weapon.sound_reference_distance(),
            source: Some(entity),
        });
        cues.write(AudioCue {
            kind: AudioCueKind::Gunshot,
            position: origin,
        });
    }
}

/// Система: полёт пуль, столкновение со стенами и телами
pub fn integrate_bullets(
    mut commands: Commands,
    mut bullets: Query<(Entity, &mut Transform, &mut Bullet)>,
    bodies: Query<(Entity, &Transform, Option<&Agent>), (With<Health>, Without<Bullet>)>,
    rays: Res<RayService>,
    mut damage: EventWriter<DamageDealt>,
    time: Res<Time<Fixed>>,
) {
    let dt = time.delta_secs();

    for (entity, mut transform, mut bullet) in bullets.iter_mut() {
        bullet.lifetime -= dt;
        if bullet.lifetime <= 0.0 {
            commands.entity(entity).despawn();
            continue;
        }

        let from = pos2(&transform);
        let to = from + bullet.velocity * dt;

        if rays.raycast(from, to, collision::WALLS, &[]).is_some() {
            commands.entity(entity).despawn();
            continue;
        }

        let mut hit_body = None;
        for (body, body_transform, body_agent) in bodies.iter() {
            // Игрок — фракция 0 (вне фракций агентов)
            let body_faction = body_agent.map(|a| a.faction_id).unwrap_or(0);
            if Some(body) == bullet.shooter || body_faction == bullet.faction_id {
                continue;
            }
            let body_pos = pos2(body_transform);
            if segment_point_distance(from, to, body_pos) <= BULLET_HIT_RADIUS {
                hit_body = Some((body, body_pos));
                break;
            }
        }

        if let Some((body, body_pos)) = hit_body {
            damage.write(DamageDealt {
                target: body,
                amount: BULLET_DAMAGE,
                source_direction: (from - body_pos).normalize_or_zero(),
                attacker: bullet.shooter,
            });
            commands.entity(entity).despawn();
            continue;
        }

        transform.translation = to.extend(0.0);
    }
}

/// Система: применение урона к Health
pub fn apply_damage(
    mut events: EventReader<DamageDealt>,
    mut healths: Query<&mut Health>,
) {
    for event in events.read() {
        if let Ok(mut health) = healths.get_mut(event.target) {
            health.take_damage(event.amount);
        }
    }
}

/// Система: despawn мёртвых + событие AgentDied
pub fn handle_agent_death(
    mut commands: Commands,
    agents: Query<(Entity, &Transform, &Agent, &Health)>,
    mut deaths: EventWriter<AgentDied>,
) {
    for (entity, transform, agent, health) in agents.iter() {
        if !health.is_alive() {
            let position = pos2(transform);
            deaths.write(AgentDied {
                agent: entity,
                position,
                faction_id: agent.faction_id,
            });
            crate::log(&format!("☠️ agent {:?} died at {:?}", entity, position));
            commands.entity(entity).despawn();
        }
    }
}

fn segment_point_distance(a: Vec2, b: Vec2, p: Vec2) -> f32 {
    let ab = b - a;
    let len_sq = ab.length_squared();
    if len_sq < 1e-9 {
        return a.distance(p);
    }
    let t = ((p - a).dot(ab) / len_sq).clamp(0.0, 1.0);
    p.distance(a + ab * t)
}

pub struct CombatPlugin;

impl Plugin for CombatPlugin {
    fn build(&self, app: &mut App) {
        app.add_event::<DamageDealt>()
            .add_event::<AgentDied>()
            .add_event::<AudioCue>()
            .add_systems(
                FixedUpdate,
                (combat_fire, integrate_bullets, apply_damage, handle_agent_death)
                    .chain()
                    .in_set(SimSet::Combat),
            );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segment_point_distance_midpoint() {
        let d = segment_point_distance(Vec2::ZERO, Vec2::new(100.0, 0.0), Vec2::new(50.0, 10.0));
        assert!((d - 10.0).abs() < 1e-4);
    }

    #[test]
    fn test_segment_point_distance_past_endpoint() {
        let d = segment_point_distance(Vec2::ZERO, Vec2::new(100.0, 0.0), Vec2::new(130.0, 0.0));
        assert!((d - 30.0).abs() < 1e-4);
    }

    #[test]
    fn test_degenerate_segment() {
        let d = segment_point_distance(Vec2::ZERO, Vec2::ZERO, Vec2::new(3.0, 4.0));
        assert!((d - 5.0).abs() < 1e-4);
    }
}
