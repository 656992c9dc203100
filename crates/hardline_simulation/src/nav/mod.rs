//! Navigation и raycast сервисы (contracts хоста)
//!
//! Симуляция не владеет геометрией уровня: пути и лучи — это запросы
//! к хосту. В headless режиме те же трейты реализуются встроенными
//! провайдерами (OpenField, SegmentMap), что и используют тесты.

use bevy::prelude::*;

/// Collision mask категории (битовые флаги, как collision layers хоста)
pub mod collision {
    /// Непрозрачная геометрия (стены). LOS проверяется ТОЛЬКО по ней.
    pub const WALLS: u32 = 1 << 0;
    /// Тела акторов (hit-волюмы). В LOS не участвуют.
    pub const BODIES: u32 = 1 << 1;
}

/// Результат raycast
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayHit {
    pub position: Vec2,
    pub distance: f32,
    /// Entity тела, если луч попал в тело (стены — None)
    pub entity: Option<Entity>,
}

/// Физический raycast сервис
///
/// `exclude` — тела, которые луч игнорирует (своё hit-волюмо агента,
/// иначе self-intersection false positives).
pub trait RaycastProvider: Send + Sync {
    fn raycast(&self, origin: Vec2, target: Vec2, mask: u32, exclude: &[Entity]) -> Option<RayHit>;
}

/// Navigation сервис: путь или "пути нет"
pub trait NavigationProvider: Send + Sync {
    fn find_path(&self, from: Vec2, to: Vec2) -> Option<Vec<Vec2>>;
}

/// Resource-обёртки (Box<dyn>, подменяются хостом или тестом)
#[derive(Resource)]
pub struct RayService(pub Box<dyn RaycastProvider>);

#[derive(Resource)]
pub struct NavService(pub Box<dyn NavigationProvider>);

impl RayService {
    pub fn raycast(
        &self,
        origin: Vec2,
        target: Vec2,
        mask: u32,
        exclude: &[Entity],
    ) -> Option<RayHit> {
        self.0.raycast(origin, target, mask, exclude)
    }

    /// LOS: луч между точками не встречает стен
    pub fn line_clear(&self, from: Vec2, to: Vec2, exclude: &[Entity]) -> bool {
        self.0.raycast(from, to, collision::WALLS, exclude).is_none()
    }
}

impl NavService {
    pub fn find_path(&self, from: Vec2, to: Vec2) -> Option<Vec<Vec2>> {
        self.0.find_path(from, to)
    }
}

/// Отложенный запуск nav-запросов после спавна
///
/// После bulk-спавна spatial index хоста ещё не синхронизирован,
/// первые кадры путь не запрашиваем.
#[derive(Component, Debug, Clone, Copy, Reflect)]
#[reflect(Component)]
pub struct SpawnWarmup {
    pub frames: u32,
}

impl Default for SpawnWarmup {
    fn default() -> Self {
        Self { frames: 3 }
    }
}

/// Система: тик warmup-счётчика, снимаем компонент когда дошёл до нуля
pub fn tick_spawn_warmup(mut commands: Commands, mut query: Query<(Entity, &mut SpawnWarmup)>) {
    for (entity, mut warmup) in query.iter_mut() {
        if warmup.frames == 0 {
            commands.entity(entity).remove::<SpawnWarmup>();
        } else {
            warmup.frames -= 1;
        }
    }
}

// --- Встроенные провайдеры ---

/// Пустое поле: лучи ничего не встречают, путь — прямая
pub struct OpenField;

impl RaycastProvider for OpenField {
    fn raycast(&self, _origin: Vec2, _target: Vec2, _mask: u32, _exclude: &[Entity]) -> Option<RayHit> {
        None
    }
}

impl NavigationProvider for OpenField {
    fn find_path(&self, _from: Vec2, to: Vec2) -> Option<Vec<Vec2>> {
        Some(vec![to])
    }
}

/// Стена как отрезок (wall-opacity категория)
#[derive(Debug, Clone, Copy)]
pub struct WallSegment {
    pub a: Vec2,
    pub b: Vec2,
}

/// Уровень из отрезков-стен. Для headless тестов и демо.
///
/// Path-поиск упрощённый: прямая, либо обход через endpoint ближайшей
/// мешающей стены (двухзвенный путь), либо "пути нет".
pub struct SegmentMap {
    pub walls: Vec<WallSegment>,
    /// Отступ обхода от endpoint стены
    pub clearance: f32,
}

impl SegmentMap {
    pub fn new(walls: Vec<WallSegment>) -> Self {
        Self {
            walls,
            clearance: 24.0,
        }
    }

    fn nearest_intersection(&self, origin: Vec2, target: Vec2) -> Option<(f32, Vec2, WallSegment)> {
        let mut best: Option<(f32, Vec2, WallSegment)> = None;
        for wall in &self.walls {
            if let Some(point) = segment_intersection(origin, target, wall.a, wall.b) {
                let dist = origin.distance(point);
                if best.map(|(d, _, _)| dist < d).unwrap_or(true) {
                    best = Some((dist, point, *wall));
                }
            }
        }
        best
    }
}

impl RaycastProvider for SegmentMap {
    fn raycast(&self, origin: Vec2, target: Vec2, mask: u32, _exclude: &[Entity]) -> Option<RayHit> {
        if mask & collision::WALLS == 0 {
            return None;
        }
        self.nearest_intersection(origin, target)
            .map(|(distance, position, _)| RayHit {
                position,
                distance,
                entity: None,
            })
    }
}

impl NavigationProvider for SegmentMap {
    fn find_path(&self, from: Vec2, to: Vec2) -> Option<Vec<Vec2>> {
        let Some((_, _, wall)) = self.nearest_intersection(from, to) else {
            return Some(vec![to]);
        };

        // Обход через endpoints мешающей стены (с отступом наружу)
        for endpoint in [wall.a, wall.b] {
            let along = (endpoint - (wall.a + wall.b) * 0.5).normalize_or_zero();
            let corner = endpoint + along * self.clearance;
            let first_clear = self.nearest_intersection(from, corner).is_none();
            let second_clear = self.nearest_intersection(corner, to).is_none();
            if first_clear && second_clear {
                return Some(vec![corner, to]);
            }
        }

        None
    }
}

/// Пересечение отрезков p1-p2 и p3-p4 (None если параллельны/мимо)
fn segment_intersection(p1: Vec2, p2: Vec2, p3: Vec2, p4: Vec2) -> Option<Vec2> {
    let d1 = p2 - p1;
    let d2 = p4 - p3;
    let denom = d1.perp_dot(d2);
    if denom.abs() < 1e-6 {
        return None;
    }
    let t = (p3 - p1).perp_dot(d2) / denom;
    let u = (p3 - p1).perp_dot(d1) / denom;
    if (0.0..=1.0).contains(&t) && (0.0..=1.0).contains(&u) {
        Some(p1 + d1 * t)
    } else {
        None
    }
}
