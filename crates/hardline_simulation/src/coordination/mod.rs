//! Групповая координация поиска: деление 360° на сектора
//!
//! Координатор — не language-level static, а явный resource сессии
//! с явным reset() на teardown. Агент состоит максимум в одном
//! координаторе; смена центра поиска переносит его. Сектора
//! пересчитываются жадно на каждом join/leave — ленивый пересчёт
//! отдаёт свежему участнику протухший сектор.
//!
//! Каждый путь выхода из Searching ОБЯЗАН снять регистрацию: помимо
//! вызовов из FSM, sweep-система страхует смену состояния и despawn.

use bevy::prelude::*;

use crate::ai::{AIState, AIStateKind};
use crate::components::Agent;
use crate::SimSet;

/// Радиус слияния: регистрация ближе этого к центру существующего
/// координатора присоединяется к нему, а не создаёт новый (пиксели)
pub const MERGE_RADIUS: f32 = 150.0;

/// Угловой сектор `[start, end)` в градусах
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sector {
    pub start_deg: f32,
    pub end_deg: f32,
}

impl Sector {
    pub fn width(&self) -> f32 {
        self.end_deg - self.start_deg
    }

    pub fn contains(&self, angle_deg: f32) -> bool {
        let a = angle_deg.rem_euclid(360.0);
        self.start_deg <= a && a < self.end_deg
    }

    /// Угол внутри сектора по доле [0,1)
    pub fn lerp_angle(&self, t: f32) -> f32 {
        self.start_deg + self.width() * t.clamp(0.0, 1.0)
    }
}

#[derive(Debug)]
struct Coordinator {
    id: u64,
    center: Vec2,
    /// Порядок членства определяет раздачу секторов
    members: Vec<Entity>,
}

/// Registry всех живых координаторов (owned сессией симуляции)
#[derive(Resource, Debug, Default)]
pub struct SearchCoordination {
    coordinators: Vec<Coordinator>,
    next_id: u64,
}

impl SearchCoordination {
    /// Присоединиться к координатору около `center` (или создать).
    /// Возвращает назначенный сектор. Повторная регистрация того же
    /// агента с новым центром переносит его (инвариант: не более
    /// одного координатора на агента).
    pub fn register(&mut self, agent: Entity, center: Vec2) -> Sector {
        // Уже член нужного координатора — просто вернуть сектор
        if let Some(coord) = self.coordinator_near(center) {
            if coord.members.contains(&agent) {
                return self.sector_of(agent).expect("member has a sector");
            }
        }

        self.unregister(agent);

        let idx = match self
            .coordinators
            .iter()
            .position(|c| c.center.distance(center) <= MERGE_RADIUS)
        {
            Some(idx) => {
                self.coordinators[idx].members.push(agent);
                idx
            }
            None => {
                let id = self.next_id;
                self.next_id += 1;
                self.coordinators.push(Coordinator {
                    id,
                    center,
                    members: vec![agent],
                });
                crate::log(&format!(
                    "🧭 search coordinator #{} created at {:?}",
                    id, center
                ));
                self.coordinators.len() - 1
            }
        };

        let coord = &self.coordinators[idx];
        let member_idx = coord.members.len() - 1;
        Self::sector_for(member_idx, coord.members.len())
    }

    /// Снять регистрацию. Безопасно вызывать повторно и для агентов,
    /// которые не регистрировались. Пустые координаторы умирают.
    pub fn unregister(&mut self, agent: Entity) {
        for coord in self.coordinators.iter_mut() {
            coord.members.retain(|&m| m != agent);
        }
        self.coordinators.retain(|c| {
            if c.members.is_empty() {
                crate::log(&format!("🧭 search coordinator #{} dissolved", c.id));
            }
            !c.members.is_empty()
        });
    }

    /// Текущий сектор агента (пересчитывается от живого состава)
    pub fn sector_of(&self, agent: Entity) -> Option<Sector> {
        for coord in &self.coordinators {
            if let Some(idx) = coord.members.iter().position(|&m| m == agent) {
                return Some(Self::sector_for(idx, coord.members.len()));
            }
        }
        None
    }

    /// Центр поиска координатора агента
    pub fn center_of(&self, agent: Entity) -> Option<Vec2> {
        self.coordinators
            .iter()
            .find(|c| c.members.contains(&agent))
            .map(|c| c.center)
    }

    pub fn coordinator_count(&self) -> usize {
        self.coordinators.len()
    }

    pub fn participant_count(&self, agent: Entity) -> usize {
        self.coordinators
            .iter()
            .find(|c| c.members.contains(&agent))
            .map(|c| c.members.len())
            .unwrap_or(0)
    }

    /// Session teardown: снести все координаторы
    pub fn reset(&mut self) {
        self.coordinators.clear();
        self.next_id = 0;
    }

    fn coordinator_near(&self, center: Vec2) -> Option<&Coordinator> {
        self.coordinators
            .iter()
            .find(|c| c.center.distance(center) <= MERGE_RADIUS)
    }

    /// Раздел 360° на n равных секторов; последний замыкается ровно
    /// на 360.0, чтобы объединение было точным покрытием без щелей
    fn sector_for(member_idx: usize, member_count: usize) -> Sector {
        let width = 360.0 / member_count as f32;
        let start_deg = member_idx as f32 * width;
        let end_deg = if member_idx + 1 == member_count {
            360.0
        } else {
            (member_idx + 1) as f32 * width
        };
        Sector { start_deg, end_deg }
    }
}

/// Система: страховочная уборка регистраций
///
/// FSM снимает регистрацию на переходах сам, но смерть/despawn и
/// любой пропущенный путь выхода ловятся здесь — иначе протухшие
/// ссылки портят секторную арифметику оставшимся.
pub fn sweep_search_registrations(
    mut coordination: ResMut<SearchCoordination>,
    changed: Query<(Entity, &AIState), (With<Agent>, Changed<AIState>)>,
    mut removed: RemovedComponents<Agent>,
) {
    for (entity, state) in changed.iter() {
        if state.kind() != AIStateKind::Searching {
            coordination.unregister(entity);
        }
    }
    for entity in removed.read() {
        coordination.unregister(entity);
    }
}

pub struct CoordinationPlugin;

impl Plugin for CoordinationPlugin {
    fn build(&self, app: &mut App) {
        app.insert_resource(SearchCoordination::default())
            .add_systems(FixedUpdate, sweep_search_registrations.in_set(SimSet::Cleanup));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn agent(id: u64) -> Entity {
        Entity::from_bits((1u64 << 32) | id)
    }

    fn assert_partition(coordination: &SearchCoordination, agents: &[Entity]) {
        let mut sectors: Vec<Sector> = agents
            .iter()
            .map(|&a| coordination.sector_of(a).expect("registered agent has sector"))
            .collect();
        sectors.sort_by(|a, b| a.start_deg.partial_cmp(&b.start_deg).unwrap());

        // Покрытие ровно 360 без перекрытий: смежные границы совпадают
        assert_eq!(sectors.first().unwrap().start_deg, 0.0);
        assert_eq!(sectors.last().unwrap().end_deg, 360.0);
        for pair in sectors.windows(2) {
            assert_eq!(
                pair[0].end_deg, pair[1].start_deg,
                "sectors must tile without overlap or gap"
            );
        }
        let total: f32 = sectors.iter().map(|s| s.width()).sum();
        assert!((total - 360.0).abs() < 1e-3);
    }

    #[test]
    fn test_partition_for_various_counts() {
        for n in [1usize, 2, 3, 5, 8] {
            let mut coordination = SearchCoordination::default();
            let agents: Vec<Entity> = (0..n as u64).map(agent).collect();
            for &a in &agents {
                coordination.register(a, Vec2::ZERO);
            }
            assert_eq!(coordination.coordinator_count(), 1);
            assert_partition(&coordination, &agents);
        }
    }

    #[test]
    fn test_nearby_centers_merge_into_one() {
        let mut coordination = SearchCoordination::default();
        let a = agent(1);
        let b = agent(2);
        let c = agent(3);
        coordination.register(a, Vec2::new(0.0, 0.0));
        coordination.register(b, Vec2::new(40.0, 10.0));
        coordination.register(c, Vec2::new(-30.0, 50.0));

        assert_eq!(coordination.coordinator_count(), 1);
        for &x in &[a, b, c] {
            let sector = coordination.sector_of(x).unwrap();
            assert!((sector.width() - 120.0).abs() < 1e-3);
        }
        assert_partition(&coordination, &[a, b, c]);
    }

    #[test]
    fn test_distant_centers_stay_separate() {
        let mut coordination = SearchCoordination::default();
        coordination.register(agent(1), Vec2::ZERO);
        coordination.register(agent(2), Vec2::new(1000.0, 0.0));
        assert_eq!(coordination.coordinator_count(), 2);
    }

    #[test]
    fn test_agent_in_at_most_one_coordinator() {
        let mut coordination = SearchCoordination::default();
        let a = agent(1);
        coordination.register(a, Vec2::ZERO);
        // Перерегистрация с далёким центром переносит, не дублирует
        coordination.register(a, Vec2::new(2000.0, 0.0));

        assert_eq!(coordination.coordinator_count(), 1);
        assert_eq!(coordination.center_of(a), Some(Vec2::new(2000.0, 0.0)));
    }

    #[test]
    fn test_leave_repartitions_eagerly() {
        let mut coordination = SearchCoordination::default();
        let a = agent(1);
        let b = agent(2);
        let c = agent(3);
        for &x in &[a, b, c] {
            coordination.register(x, Vec2::ZERO);
        }
        coordination.unregister(b);

        // Оставшиеся немедленно делят 360 пополам
        assert_eq!(coordination.participant_count(a), 2);
        assert_partition(&coordination, &[a, c]);
    }

    #[test]
    fn test_last_leave_drops_coordinator() {
        let mut coordination = SearchCoordination::default();
        let a = agent(1);
        coordination.register(a, Vec2::ZERO);
        coordination.unregister(a);
        assert_eq!(coordination.coordinator_count(), 0);
    }

    #[test]
    fn test_unregister_unknown_agent_is_noop() {
        let mut coordination = SearchCoordination::default();
        coordination.register(agent(1), Vec2::ZERO);
        coordination.unregister(agent(99));
        assert_eq!(coordination.coordinator_count(), 1);
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut coordination = SearchCoordination::default();
        coordination.register(agent(1), Vec2::ZERO);
        coordination.register(agent(2), Vec2::new(900.0, 0.0));
        coordination.reset();
        assert_eq!(coordination.coordinator_count(), 0);
        assert_eq!(coordination.sector_of(agent(1)), None);
    }

    #[test]
    fn test_reregister_same_center_keeps_sector_count() {
        let mut coordination = SearchCoordination::default();
        let a = agent(1);
        let b = agent(2);
        coordination.register(a, Vec2::ZERO);
        coordination.register(b, Vec2::ZERO);
        // Повторный register того же агента — не раздувает состав
        coordination.register(a, Vec2::new(5.0, 5.0));
        assert_eq!(coordination.participant_count(a), 2);
    }
}
