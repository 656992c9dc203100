//! FSM-компоненты агента: состояние, конфиг, detection episode
//!
//! Состояния несут свои данные в payload'ах enum'а — никаких полей
//! «актуально только в состоянии X» на самом агенте. Kind-зеркало
//! без payload'ов нужно для дешёвых сравнений и Changed-фильтров.

use bevy::prelude::*;

use crate::coordination::Sector;

/// Состояние агента. Начальное — Idle; терминального нет,
/// смерть убирает агента из симуляции целиком.
#[derive(Component, Debug, Clone, PartialEq, Default)]
pub enum AIState {
    #[default]
    Idle,
    /// Прямой огневой контакт с видимой целью
    Combat { target: Entity },
    /// Движение к выбранной точке укрытия
    SeekingCover { spot: Vec2 },
    /// Сидим в укрытии, высовываемся по кулдауну
    InCover { spot: Vec2 },
    /// Обход цели через фланговую точку
    Flanking { waypoint: Vec2, target: Entity },
    /// Прижаты огнём, не двигаемся
    Suppressed { until: f32 },
    /// Отход от цели при низком HP
    Retreating { destination: Vec2 },
    /// Движение к belief-позиции (уверенность средняя)
    Pursuing { destination: Vec2 },
    /// Агрессивный рывок к belief-позиции (уверенность высокая)
    Assault { destination: Vec2 },
    /// Секторный поиск вокруг последней известной позиции
    Searching {
        center: Vec2,
        sector: Sector,
        waypoint: Vec2,
        /// Конец текущего сканирования на waypoint'е (elapsed secs);
        /// 0.0 — скан ещё не начат
        scan_until: f32,
        /// Случайный угол взгляда при сканировании (радианы)
        scan_angle: f32,
        /// Номер ноги спирали (задаёт радиус следующего waypoint'а)
        leg: u32,
        started_at: f32,
    },
    /// Уход от гранаты. `landing` лочится при входе и НЕ обновляется
    /// по мере качения гранаты (иначе агент виляет за ней).
    EvadingGrenade { hazard: Entity, landing: Vec2 },
}

/// Зеркало AIState без payload'ов
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AIStateKind {
    Idle,
    Combat,
    SeekingCover,
    InCover,
    Flanking,
    Suppressed,
    Retreating,
    Pursuing,
    Assault,
    Searching,
    EvadingGrenade,
}

impl AIState {
    pub fn kind(&self) -> AIStateKind {
        match self {
            AIState::Idle => AIStateKind::Idle,
            AIState::Combat { .. } => AIStateKind::Combat,
            AIState::SeekingCover { .. } => AIStateKind::SeekingCover,
            AIState::InCover { .. } => AIStateKind::InCover,
            AIState::Flanking { .. } => AIStateKind::Flanking,
            AIState::Suppressed { .. } => AIStateKind::Suppressed,
            AIState::Retreating { .. } => AIStateKind::Retreating,
            AIState::Pursuing { .. } => AIStateKind::Pursuing,
            AIState::Assault { .. } => AIStateKind::Assault,
            AIState::Searching { .. } => AIStateKind::Searching,
            AIState::EvadingGrenade { .. } => AIStateKind::EvadingGrenade,
        }
    }
}

impl AIStateKind {
    /// Активный бой: поднимает порог слуха (фильтр отвлечений)
    /// и разрешает стрельбу
    pub fn is_engaged(&self) -> bool {
        matches!(
            self,
            AIStateKind::Combat
                | AIStateKind::SeekingCover
                | AIStateKind::InCover
                | AIStateKind::Flanking
                | AIStateKind::Suppressed
                | AIStateKind::Assault
        )
    }

    /// Состояния с целевой точкой движения — только они подлежат
    /// stuck-детекции
    pub fn is_movement_heavy(&self) -> bool {
        matches!(
            self,
            AIStateKind::SeekingCover
                | AIStateKind::Flanking
                | AIStateKind::Retreating
                | AIStateKind::Pursuing
                | AIStateKind::Assault
                | AIStateKind::Searching
                | AIStateKind::EvadingGrenade
        )
    }
}

/// Предыдущее состояние + момент входа в текущее
#[derive(Component, Debug, Clone)]
pub struct StateHistory {
    pub previous: AIStateKind,
    pub entered_at: f32,
}

impl Default for StateHistory {
    fn default() -> Self {
        Self {
            previous: AIStateKind::Idle,
            entered_at: 0.0,
        }
    }
}

impl StateHistory {
    pub fn note_transition(&mut self, from: AIStateKind, now: f32) {
        self.previous = from;
        self.entered_at = now;
    }
}

/// Пороговые настройки поведения (per-agent, дефолты — баланс)
#[derive(Component, Debug, Clone)]
pub struct AIConfig {
    /// Уверенность belief'а для перехода в Pursuing
    pub pursue_confidence_threshold: f32,
    /// Уверенность belief'а для перехода в Assault
    pub assault_confidence_threshold: f32,
    /// Доля HP, ниже которой агент отходит
    pub retreat_health_threshold: f32,
    /// Радиус «пришёл» для waypoint'ов и belief-позиций (пиксели)
    pub arrive_radius: f32,
    /// Максимальная длительность Searching (секунды)
    pub search_max_duration: f32,
    /// Длительность сканирования на waypoint'е поиска (секунды)
    pub scan_duration: f32,
    /// Смещение фланговых кандидатов вбок от линии агент→цель
    pub flank_offset: f32,
    /// Сколько секунд без прогресса считается «застрял»
    pub stuck_timeout: f32,
    /// Скорость движения (пиксели/с)
    pub move_speed: f32,
    /// Скорость поворота (рад/с)
    pub turn_rate: f32,
}

impl Default for AIConfig {
    fn default() -> Self {
        Self {
            pursue_confidence_threshold: 0.6,
            assault_confidence_threshold: 0.7,
            retreat_health_threshold: 0.25,
            arrive_radius: 24.0,
            search_max_duration: 12.0,
            scan_duration: 1.2,
            flank_offset: 160.0,
            stuck_timeout: 1.5,
            move_speed: 180.0,
            turn_rate: 6.0,
        }
    }
}

/// Эпизод обнаружения: от первого контакта до возврата в Idle.
///
/// `cover_search_failed` — защита от цикла
/// Combat→SeekingCover→Combat: после одной неудачной попытки найти
/// укрытие повторный заход в SeekingCover запрещён до конца эпизода.
#[derive(Component, Debug, Clone, Copy, Default)]
pub struct DetectionEpisode {
    pub active: bool,
    pub cover_search_failed: bool,
}

impl DetectionEpisode {
    pub fn begin(&mut self) {
        if !self.active {
            self.active = true;
            self.cover_search_failed = false;
        }
    }

    pub fn end(&mut self) {
        self.active = false;
        self.cover_search_failed = false;
    }
}
