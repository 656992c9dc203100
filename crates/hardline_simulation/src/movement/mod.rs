//! Интеграция движения: ровно один проезд Transform за тик
//!
//! Состояния пишут MoveIntent, сюда стекается всё остальное:
//! whisker-обход стен, сглаживание, поворот с ограниченной угловой
//! скоростью, кламп по стене. Никакой другой код агентский Transform
//! не трогает.

use bevy::prelude::*;

use crate::ai::{AIConfig, AIState};
use crate::components::{pos2, Agent, Facing, Player};
use crate::nav::{collision, RayService};
use crate::SimSet;

/// Длина «усов» обхода стен (пиксели)
pub const WHISKER_LENGTH: f32 = 48.0;
/// Угол боковых усов от направления движения (градусы)
pub const WHISKER_ANGLE_DEG: f32 = 35.0;
/// Порог позиционного прогресса для stuck-детекции (пиксели/проверку)
const PROGRESS_EPSILON: f32 = 2.0;
/// Сглаживание скорости (доля пути к desired за секунду)
const STEERING_RESPONSE: f32 = 10.0;
/// Отступ от стены при след clamp'е
const WALL_MARGIN: f32 = 4.0;

/// Желаемое движение, произведённое состоянием
#[derive(Component, Debug, Clone, Default)]
pub struct MoveIntent {
    pub velocity: Vec2,
    /// Куда смотреть (направление); None — по движению/без изменений
    pub face: Option<Vec2>,
}

/// Сглаженная скорость между тиками
#[derive(Component, Debug, Clone, Copy, Default)]
pub struct SteeringMemory {
    pub smoothed: Vec2,
}

/// Накопитель отсутствия прогресса
#[derive(Component, Debug, Clone, Copy, Default)]
pub struct StuckTracker {
    pub last_position: Vec2,
    pub timer: f32,
}

/// Агент не продвигается дольше stuck_timeout
#[derive(Event, Debug, Clone)]
pub struct StuckDetected {
    pub agent: Entity,
}

/// Отклонение желаемой скорости от стен по трём усам
pub fn blend_wall_avoidance(rays: &RayService, position: Vec2, desired: Vec2) -> Vec2 {
    let speed = desired.length();
    if speed < 1e-3 {
        return desired;
    }
    let forward = desired / speed;

    let mut push = Vec2::ZERO;
    for angle_deg in [0.0, WHISKER_ANGLE_DEG, -WHISKER_ANGLE_DEG] {
        let dir = Vec2::from_angle(angle_deg.to_radians()).rotate(forward);
        let tip = position + dir * WHISKER_LENGTH;
        if let Some(hit) = rays.raycast(position, tip, collision::WALLS, &[]) {
            let weight = 1.0 - (hit.distance / WHISKER_LENGTH).clamp(0.0, 1.0);
            push -= dir * weight;
        }
    }

    if push == Vec2::ZERO {
        return desired;
    }
    // Не перенормируем: лобовое сближение со стеной гасит скорость,
    // боковое — отклоняет курс
    (forward + push) * speed
}

/// Кратчайшая дуга a→b в радианах, в [-π, π]
fn shortest_arc(from: f32, to: f32) -> f32 {
    let diff = (to - from).rem_euclid(std::f32::consts::TAU);
    if diff > std::f32::consts::PI {
        diff - std::f32::consts::TAU
    } else {
        diff
    }
}

/// Система: единственная точка записи Transform/Facing агентов
pub fn integrate_movement(
    mut agents: Query<
        (
            &mut Transform,
            &mut Facing,
            &mut SteeringMemory,
            &MoveIntent,
            &AIConfig,
        ),
        (With<Agent>, Without<Player>),
    >,
    rays: Res<RayService>,
    time: Res<Time<Fixed>>,
) {
    let dt = time.delta_secs();
    let blend = (STEERING_RESPONSE * dt).min(1.0);

    for (mut transform, mut facing, mut memory, intent, config) in agents.iter_mut() {
        let position = pos2(&transform);

        let steered = blend_wall_avoidance(&rays, position, intent.velocity);
        memory.smoothed = memory.smoothed.lerp(steered, blend);

        let step = memory.smoothed * dt;
        if step.length_squared() > 1e-9 {
            let target = position + step;
            let next = match rays.raycast(position, target, collision::WALLS, &[]) {
                Some(hit) => {
                    memory.smoothed = Vec2::ZERO;
                    let dir = step.normalize_or_zero();
                    hit.position - dir * WALL_MARGIN
                }
                None => target,
            };
            transform.translation = next.extend(transform.translation.z);
        }

        if let Some(face) = intent.face {
            if face.length_squared() > 1e-6 {
                let desired_angle = face.y.atan2(face.x);
                let arc = shortest_arc(facing.angle, desired_angle);
                let max_step = config.turn_rate * dt;
                facing.angle += arc.clamp(-max_step, max_step);
            }
        }
    }
}

/// Система: stuck-детекция в движенчески-тяжёлых состояниях
pub fn detect_stuck(
    mut agents: Query<
        (
            Entity,
            &Transform,
            &AIState,
            &AIConfig,
            &mut StuckTracker,
        ),
        (With<Agent>, Without<Player>),
    >,
    mut events: EventWriter<StuckDetected>,
    time: Res<Time<Fixed>>,
) {
    let dt = time.delta_secs();

    for (entity, transform, state, config, mut tracker) in agents.iter_mut() {
        let position = pos2(transform);
        // Нулевая скорость в движенческом состоянии — тоже застревание
        // (nav вернул «пути нет», а состояние цели не отпустило)
        if !state.kind().is_movement_heavy() {
            tracker.timer = 0.0;
            tracker.last_position = position;
            continue;
        }

        if position.distance(tracker.last_position) < PROGRESS_EPSILON {
            tracker.timer += dt;
            if tracker.timer >= config.stuck_timeout {
                events.write(StuckDetected { agent: entity });
                tracker.timer = 0.0;
            }
        } else {
            tracker.timer = 0.0;
            tracker.last_position = position;
        }
    }
}

pub struct MovementPlugin;

impl Plugin for MovementPlugin {
    fn build(&self, app: &mut App) {
        app.add_event::<StuckDetected>().add_systems(
            FixedUpdate,
            (integrate_movement, detect_stuck)
                .chain()
                .in_set(SimSet::Movement),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nav::{OpenField, SegmentMap, WallSegment};

    #[test]
    fn test_open_field_keeps_desired_velocity() {
        let rays = RayService(Box::new(OpenField));
        let desired = Vec2::new(120.0, 0.0);
        assert_eq!(blend_wall_avoidance(&rays, Vec2::ZERO, desired), desired);
    }

    #[test]
    fn test_wall_ahead_brakes() {
        // Стена прямо по курсу в пределах усов: скорость гасится
        let rays = RayService(Box::new(SegmentMap::new(vec![WallSegment {
            a: Vec2::new(30.0, -100.0),
            b: Vec2::new(30.0, 100.0),
        }])));
        let desired = Vec2::new(150.0, 0.0);
        let steered = blend_wall_avoidance(&rays, Vec2::ZERO, desired);

        assert!(steered.x < desired.x * 0.5);
    }

    #[test]
    fn test_side_wall_deflects_course() {
        // Стена справа-спереди: задевает только правый ус
        let rays = RayService(Box::new(SegmentMap::new(vec![WallSegment {
            a: Vec2::new(20.0, -40.0),
            b: Vec2::new(60.0, -10.0),
        }])));
        let desired = Vec2::new(150.0, 0.0);
        let steered = blend_wall_avoidance(&rays, Vec2::ZERO, desired);

        // Уводит влево (от стены)
        assert!(steered.y > 0.0);
    }

    #[test]
    fn test_zero_intent_untouched() {
        let rays = RayService(Box::new(OpenField));
        assert_eq!(blend_wall_avoidance(&rays, Vec2::ZERO, Vec2::ZERO), Vec2::ZERO);
    }

    #[test]
    fn test_shortest_arc_wraps() {
        use std::f32::consts::PI;
        assert!((shortest_arc(0.1, -0.1) + 0.2).abs() < 1e-5);
        assert!((shortest_arc(-PI + 0.05, PI - 0.05) + 0.1).abs() < 1e-4);
        assert!((shortest_arc(0.0, PI / 2.0) - PI / 2.0).abs() < 1e-5);
    }
}
