//! Базовые компоненты акторов: Agent, Player, Health, Facing, WeaponClass

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

/// AI-агент (враг). Позиция живёт в Transform (XY plane, top-down).
///
/// Автоматически добавляет Health и Facing через Required Components.
#[derive(Component, Debug, Clone, Default, Reflect)]
#[reflect(Component)]
#[require(Health, Facing)]
pub struct Agent {
    /// Stable ID фракции (союзники делятся интелом, враги — нет)
    pub faction_id: u64,
}

/// Маркер цели (игрок). У агентов ровно одна цель охоты.
#[derive(Component, Debug, Clone, Copy, Default, Reflect)]
#[reflect(Component)]
pub struct Player;

/// Режим поведения до первого контакта
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq, Default, Reflect, Serialize, Deserialize)]
#[reflect(Component)]
pub enum BehaviorMode {
    /// Ходит по точкам, реагирует на звуки издалека
    #[default]
    Patrol,
    /// Стоит на посту, реагирует только вблизи поста
    Guard,
}

/// Здоровье актора
///
/// Инвариант: 0 ≤ current ≤ max
#[derive(Component, Debug, Clone, Copy, Reflect)]
#[reflect(Component)]
pub struct Health {
    pub current: u32,
    pub max: u32,
}

impl Default for Health {
    fn default() -> Self {
        Self::new(100)
    }
}

impl Health {
    pub fn new(max: u32) -> Self {
        Self { current: max, max }
    }

    pub fn is_alive(&self) -> bool {
        self.current > 0
    }

    pub fn take_damage(&mut self, amount: u32) {
        self.current = self.current.saturating_sub(amount);
    }

    pub fn fraction(&self) -> f32 {
        if self.max == 0 {
            0.0
        } else {
            self.current as f32 / self.max as f32
        }
    }
}

/// Направление взгляда (радианы, 0 = +X, против часовой)
///
/// Отдельно от Transform: top-down спрайт крутится хостом,
/// симуляции нужен только угол для FOV и прицеливания.
#[derive(Component, Debug, Clone, Copy, Default, Reflect)]
#[reflect(Component)]
pub struct Facing {
    pub angle: f32,
}

impl Facing {
    pub fn new(angle: f32) -> Self {
        Self { angle }
    }

    pub fn forward(&self) -> Vec2 {
        Vec2::new(self.angle.cos(), self.angle.sin())
    }
}

/// Класс оружия — влияет на слышимость выстрела и cooldown
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq, Default, Reflect, Serialize, Deserialize)]
#[reflect(Component)]
pub enum WeaponClass {
    Pistol,
    #[default]
    Rifle,
    Shotgun,
    Sniper,
}

impl WeaponClass {
    /// Reference distance выстрела для pressure-law falloff (пиксели)
    pub fn sound_reference_distance(&self) -> f32 {
        match self {
            WeaponClass::Pistol => 40.0,
            WeaponClass::Rifle => 50.0,
            WeaponClass::Shotgun => 60.0,
            WeaponClass::Sniper => 80.0,
        }
    }

    pub fn fire_cooldown(&self) -> f32 {
        match self {
            WeaponClass::Pistol => 0.4,
            WeaponClass::Rifle => 0.15,
            WeaponClass::Shotgun => 0.9,
            WeaponClass::Sniper => 1.6,
        }
    }
}

/// Cooldown стрельбы (секунды до следующего выстрела)
#[derive(Component, Debug, Clone, Copy, Default, Reflect)]
#[reflect(Component)]
pub struct FireCooldown {
    pub remaining: f32,
}

/// Позиция укрытия, расставляется при загрузке уровня хостом
#[derive(Component, Debug, Clone, Copy, Reflect)]
#[reflect(Component)]
pub struct CoverPoint;

/// Helper: Transform → Vec2 (top-down, XY plane)
pub fn pos2(transform: &Transform) -> Vec2 {
    transform.translation.truncate()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_damage() {
        let mut health = Health::new(100);
        health.take_damage(30);
        assert_eq!(health.current, 70);
        assert!(health.is_alive());

        health.take_damage(100); // saturating
        assert_eq!(health.current, 0);
        assert!(!health.is_alive());
    }

    #[test]
    fn test_health_fraction() {
        let mut health = Health::new(200);
        health.take_damage(50);
        assert!((health.fraction() - 0.75).abs() < 1e-6);
    }

    #[test]
    fn test_facing_forward() {
        let facing = Facing::new(0.0);
        assert!((facing.forward() - Vec2::X).length() < 1e-6);

        let facing = Facing::new(std::f32::consts::FRAC_PI_2);
        assert!((facing.forward() - Vec2::Y).length() < 1e-6);
    }
}
