//! HARDLINE Simulation Core
//!
//! Enemy-AI ядро top-down тактического шутера: ECS-симуляция на
//! Bevy 0.16, полностью отвязанная от хост-движка. Хост поставляет
//! raycast/navigation через trait-объекты (nav::RayService,
//! nav::NavService) и забирает fire-and-forget события (AudioCue,
//! GrenadeDetonated, AgentDied).
//!
//! Тик: FixedUpdate 60Hz, один проход по фазам SimSet. Вся
//! случайность — из DeterministicRng (seeded), прогоны с одним seed
//! бит-в-бит воспроизводимы.

use bevy::prelude::*;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

pub mod ai;
pub mod combat;
pub mod components;
pub mod coordination;
pub mod hazard;
pub mod logger;
pub mod movement;
pub mod nav;
pub mod perception;
pub mod planner;

pub use ai::{AIConfig, AIState, AIStateKind, DetectionEpisode, StateHistory};
pub use combat::{AgentDied, AudioCue, AudioCueKind, Bullet, CombatPlugin, DamageDealt};
pub use components::*;
pub use coordination::{CoordinationPlugin, SearchCoordination, Sector};
pub use hazard::{Grenade, GrenadeDetonated, HazardPlugin, Suppression};
pub use logger::{
    init_logger, log, log_error, log_info, log_warning, set_log_level, set_logger,
    set_logger_if_needed, ConsoleLogger, LogLevel, LogPrinter,
};
pub use movement::{MoveIntent, MovementPlugin, SteeringMemory, StuckDetected, StuckTracker};
pub use perception::{PerceptionPlugin, PlayerBelief, SoundEmitted, VisibleTarget, VisionConfig};
pub use planner::{PlannedIntent, PlannerPlugin};

/// Фазы симуляционного тика (строгий порядок)
#[derive(SystemSet, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SimSet {
    /// Spawn warmup: отложенные nav-запросы
    Warmup,
    /// Гранаты и подавление
    Hazards,
    /// Зрение, слух, память, интел
    Perception,
    /// GOAP replan
    Planning,
    /// Реакции + переходы FSM
    Decide,
    /// Поведение состояний (поиск, MoveIntent)
    Behavior,
    /// Стрельба, пули, урон, смерть
    Combat,
    /// Единственная интеграция Transform
    Movement,
    /// Уборка: страховка координаторных регистраций
    Cleanup,
}

/// Главный plugin симуляции (объединяет все подсистемы)
///
/// RayService/NavService НЕ вставляет: их обязан предоставить хост
/// (или create_headless_app — встроенный OpenField).
pub struct SimulationPlugin;

impl Plugin for SimulationPlugin {
    fn build(&self, app: &mut App) {
        app.insert_resource(Time::<Fixed>::from_hz(60.0))
            .insert_resource(DeterministicRng::from_seed(42))
            .configure_sets(
                FixedUpdate,
                (
                    SimSet::Warmup,
                    SimSet::Hazards,
                    SimSet::Perception,
                    SimSet::Planning,
                    SimSet::Decide,
                    SimSet::Behavior,
                    SimSet::Combat,
                    SimSet::Movement,
                    SimSet::Cleanup,
                )
                    .chain(),
            )
            .add_systems(FixedUpdate, nav::tick_spawn_warmup.in_set(SimSet::Warmup))
            .add_plugins((
                HazardPlugin,
                PerceptionPlugin,
                PlannerPlugin,
                ai::AIPlugin,
                CombatPlugin,
                MovementPlugin,
                CoordinationPlugin,
            ));
    }
}

/// Детерминистичный RNG resource (seeded)
#[derive(Resource)]
pub struct DeterministicRng {
    pub rng: ChaCha8Rng,
    pub seed: u64,
}

impl DeterministicRng {
    pub fn from_seed(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            seed,
        }
    }
}

/// Полный набор компонентов AI-агента
///
/// Health и Facing приезжают через required components на Agent.
#[derive(Bundle, Default)]
pub struct AgentBundle {
    pub agent: Agent,
    pub behavior: BehaviorMode,
    pub weapon: WeaponClass,
    pub fire_cooldown: FireCooldown,
    pub vision: VisionConfig,
    pub visible: VisibleTarget,
    pub belief: PlayerBelief,
    pub suppression: Suppression,
    pub state: AIState,
    pub history: StateHistory,
    pub episode: DetectionEpisode,
    pub config: AIConfig,
    pub intent: PlannedIntent,
    pub move_intent: MoveIntent,
    pub steering: SteeringMemory,
    pub stuck: StuckTracker,
    pub warmup: nav::SpawnWarmup,
    pub transform: Transform,
}

impl AgentBundle {
    pub fn at(position: Vec2, faction_id: u64) -> Self {
        Self {
            agent: Agent { faction_id },
            transform: Transform::from_translation(position.extend(0.0)),
            ..Default::default()
        }
    }
}

/// Minimal headless App: OpenField-провайдеры, seeded RNG
pub fn create_headless_app(seed: u64) -> App {
    init_logger();
    let mut app = App::new();
    app.add_plugins(MinimalPlugins)
        .insert_resource(nav::RayService(Box::new(nav::OpenField)))
        .insert_resource(nav::NavService(Box::new(nav::OpenField)))
        .add_plugins(SimulationPlugin)
        .insert_resource(DeterministicRng::from_seed(seed));
    app
}

/// Прогнать ровно `ticks` фиксированных тиков (без реального времени)
pub fn step_fixed(app: &mut App, ticks: u32) {
    for _ in 0..ticks {
        let period = app.world().resource::<Time<Fixed>>().timestep();
        app.world_mut().resource_mut::<Time<Fixed>>().advance_by(period);
        app.world_mut().run_schedule(FixedUpdate);
    }
}

/// Snapshot позиций/здоровья/состояний для сравнения детерминизма
pub fn world_snapshot(world: &mut World) -> Vec<u8> {
    let mut snapshot = Vec::new();

    let mut query = world.query::<(Entity, &Transform, &Health, &AIState)>();
    let mut entities: Vec<_> = query.iter(world).collect();
    entities.sort_by_key(|(entity, _, _, _)| entity.index());

    for (entity, transform, health, state) in entities {
        snapshot.extend_from_slice(&entity.index().to_le_bytes());
        snapshot.extend_from_slice(
            format!(
                "{:?}|{}|{:?}",
                transform.translation, health.current, state
            )
            .as_bytes(),
        );
    }

    snapshot
}
