//! Память: confidence-weighted belief о позиции игрока
//!
//! Правила:
//! - наблюдение ПЕРЕЗАПИСЫВАЕТ belief (никакого усреднения со старыми
//!   данными — smoothing маскирует инфляцию confidence)
//! - confidence строго убывает со временем без свежих наблюдений,
//!   скорость распада растёт с дистанцией до believed-точки
//! - intel broadcast передаёт союзникам КОПИЮ со сниженной confidence

use bevy::prelude::*;

use crate::components::{pos2, Agent, Player};

/// Базовая скорость распада confidence (ед/сек)
pub const BASE_DECAY_RATE: f32 = 0.04;

/// Дистанция (пиксели), удваивающая скорость распада
pub const DECAY_DISTANCE_SCALE: f32 = 800.0;

/// Ниже этого порога belief считается потерянным
pub const MIN_CONFIDENCE: f32 = 0.05;

/// Максимум гипотез "подозрительное направление"
pub const MAX_HYPOTHESES: usize = 3;

/// Множитель confidence при broadcast союзнику
pub const BROADCAST_CONFIDENCE_FACTOR: f32 = 0.8;

/// Радиус обмена интелом между союзниками (пиксели)
pub const INTEL_RADIUS: f32 = 700.0;

/// Минимальная confidence, с которой агент вообще делится интелом
pub const INTEL_SHARE_FLOOR: f32 = 0.5;

/// Период broadcast (секунды)
pub const INTEL_INTERVAL: f32 = 2.0;

/// Данные belief: где игрок, насколько уверены, когда обновляли
#[derive(Debug, Clone, PartialEq, Reflect)]
pub struct BeliefData {
    pub position: Vec2,
    /// [0, 1]; 1.0 = прямой визуальный контакт в этот тик
    pub confidence: f32,
    /// Sim-время последнего наблюдения (секунды)
    pub last_update: f32,
    /// Подозрительные направления (после смерти союзника)
    pub hypotheses: Vec<Vec2>,
}

/// Belief агента о позиции игрока (None = понятия не имеем)
#[derive(Component, Debug, Clone, Default, Reflect)]
#[reflect(Component)]
pub struct PlayerBelief {
    pub memory: Option<BeliefData>,
}

impl PlayerBelief {
    /// Свежее наблюдение: перезапись если не слабее текущего.
    /// Слабое наблюдение на фоне сильной памяти игнорируется целиком.
    pub fn observe(&mut self, position: Vec2, confidence: f32, now: f32) {
        let confidence = confidence.clamp(0.0, 1.0);
        let stronger = self
            .memory
            .as_ref()
            .map(|m| confidence >= m.confidence)
            .unwrap_or(true);
        if stronger {
            self.memory = Some(BeliefData {
                position,
                confidence,
                last_update: now,
                hypotheses: Vec::new(),
            });
        }
    }

    /// Добавить гипотезу направления (cap по MAX_HYPOTHESES)
    pub fn add_hypothesis(&mut self, direction: Vec2) {
        if let Some(memory) = self.memory.as_mut() {
            if memory.hypotheses.len() < MAX_HYPOTHESES {
                memory.hypotheses.push(direction.normalize_or_zero());
            }
        }
    }

    /// Распад за dt секунд. Не вызывать в тик свежего наблюдения.
    pub fn decay(&mut self, dt: f32, observer_pos: Vec2) {
        let Some(memory) = self.memory.as_mut() else {
            return;
        };
        let distance = observer_pos.distance(memory.position);
        let rate = BASE_DECAY_RATE * (1.0 + distance / DECAY_DISTANCE_SCALE);
        memory.confidence -= rate * dt;
        if memory.confidence < MIN_CONFIDENCE {
            self.memory = None;
        }
    }

    pub fn confidence(&self) -> f32 {
        self.memory.as_ref().map(|m| m.confidence).unwrap_or(0.0)
    }

    pub fn position(&self) -> Option<Vec2> {
        self.memory.as_ref().map(|m| m.position)
    }

    /// Первая подозреваемая direction-гипотеза — ею смещается
    /// стартовая нога секторного поиска
    pub fn first_hypothesis(&self) -> Option<Vec2> {
        self.memory
            .as_ref()
            .and_then(|m| m.hypotheses.first().copied())
    }

    pub fn clear(&mut self) {
        self.memory = None;
    }
}

/// Система: распад belief. Пропускает belief, обновлённый этим же тиком.
pub fn decay_beliefs(
    mut agents: Query<(&Transform, &mut PlayerBelief), With<Agent>>,
    time: Res<Time<Fixed>>,
) {
    let now = time.elapsed_secs();
    let dt = time.delta_secs();

    for (transform, mut belief) in agents.iter_mut() {
        let fresh = belief
            .memory
            .as_ref()
            .map(|m| m.last_update >= now)
            .unwrap_or(false);
        if !fresh {
            belief.decay(dt, pos2(transform));
        }
    }
}

/// Таймер периодического обмена интелом
#[derive(Resource, Debug)]
pub struct IntelBroadcastTimer {
    pub remaining: f32,
}

impl Default for IntelBroadcastTimer {
    fn default() -> Self {
        Self {
            remaining: INTEL_INTERVAL,
        }
    }
}

/// Система: broadcast интела союзникам поблизости
///
/// Копия со сниженной confidence, не ссылка: получатель дальше
/// распоряжается ей независимо. Получатель с более сильной памятью
/// копию игнорирует (правило observe).
pub fn broadcast_intel(
    mut timer: ResMut<IntelBroadcastTimer>,
    mut agents: Query<(Entity, &Agent, &Transform, &mut PlayerBelief), Without<Player>>,
    time: Res<Time<Fixed>>,
) {
    timer.remaining -= time.delta_secs();
    if timer.remaining > 0.0 {
        return;
    }
    timer.remaining = INTEL_INTERVAL;

    let now = time.elapsed_secs();

    // Снимок отправителей (one-frame-stale reads внутри тика допустимы)
    let senders: Vec<(Entity, u64, Vec2, Vec2, f32)> = agents
        .iter()
        .filter_map(|(entity, agent, transform, belief)| {
            let memory = belief.memory.as_ref()?;
            (memory.confidence >= INTEL_SHARE_FLOOR).then_some((
                entity,
                agent.faction_id,
                pos2(transform),
                memory.position,
                memory.confidence,
            ))
        })
        .collect();

    for (receiver, agent, transform, mut belief) in agents.iter_mut() {
        let receiver_pos = pos2(transform);
        for &(sender, faction, sender_pos, target_pos, confidence) in &senders {
            if sender == receiver || faction != agent.faction_id {
                continue;
            }
            if receiver_pos.distance(sender_pos) > INTEL_RADIUS {
                continue;
            }
            let shared = confidence * BROADCAST_CONFIDENCE_FACTOR;
            if shared > belief.confidence() {
                belief.observe(target_pos, shared, now);
                crate::log(&format!(
                    "📡 intel: {:?} → {:?} (confidence {:.2})",
                    sender, receiver, shared
                ));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confidence_strictly_decays() {
        let mut belief = PlayerBelief::default();
        belief.observe(Vec2::new(100.0, 0.0), 0.9, 0.0);

        let mut last = belief.confidence();
        // Любая положительная дельта строго уменьшает confidence
        for dt in [0.016, 0.1, 0.5, 1.0, 2.0] {
            belief.decay(dt, Vec2::ZERO);
            let now = belief.confidence();
            assert!(
                now < last,
                "confidence must strictly decrease: {} -> {}",
                last,
                now
            );
            last = now;
        }
    }

    #[test]
    fn test_decay_faster_at_distance() {
        let mut near = PlayerBelief::default();
        let mut far = PlayerBelief::default();
        near.observe(Vec2::new(50.0, 0.0), 0.9, 0.0);
        far.observe(Vec2::new(2000.0, 0.0), 0.9, 0.0);

        near.decay(1.0, Vec2::ZERO);
        far.decay(1.0, Vec2::ZERO);
        assert!(far.confidence() < near.confidence());
    }

    #[test]
    fn test_observe_overwrites_never_blends() {
        let mut belief = PlayerBelief::default();
        belief.observe(Vec2::new(10.0, 0.0), 0.5, 0.0);
        belief.observe(Vec2::new(90.0, 0.0), 0.8, 1.0);

        let memory = belief.memory.as_ref().unwrap();
        // Чистая перезапись, без усреднения позиций и confidence
        assert_eq!(memory.position, Vec2::new(90.0, 0.0));
        assert_eq!(memory.confidence, 0.8);
    }

    #[test]
    fn test_weak_observation_ignored() {
        let mut belief = PlayerBelief::default();
        belief.observe(Vec2::new(10.0, 0.0), 0.9, 0.0);
        belief.observe(Vec2::new(500.0, 0.0), 0.3, 1.0);

        let memory = belief.memory.as_ref().unwrap();
        assert_eq!(memory.position, Vec2::new(10.0, 0.0));
        assert_eq!(memory.confidence, 0.9);
    }

    #[test]
    fn test_belief_dropped_below_floor() {
        let mut belief = PlayerBelief::default();
        belief.observe(Vec2::ZERO, 0.06, 0.0);
        belief.decay(1.0, Vec2::ZERO);
        assert!(belief.memory.is_none());
    }

    #[test]
    fn test_hypotheses_capped() {
        let mut belief = PlayerBelief::default();
        belief.observe(Vec2::ZERO, 0.6, 0.0);
        for i in 0..5 {
            belief.add_hypothesis(Vec2::new(1.0, i as f32));
        }
        assert_eq!(belief.memory.as_ref().unwrap().hypotheses.len(), MAX_HYPOTHESES);
    }
}
