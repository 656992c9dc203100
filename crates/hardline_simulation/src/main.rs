//! Headless прогон симуляции HARDLINE
//!
//! Маленькая сцена: игрок, отделение агентов, пара укрытий, граната.
//! Для проверки глазами что ядро крутится без хоста.

use bevy::prelude::*;
use hardline_simulation::{
    create_headless_app, log, step_fixed, AgentBundle, CoverPoint, Grenade, Health, Player,
};

fn main() {
    let seed = 42;
    log(&format!("🚀 HARDLINE headless simulation (seed: {})", seed));

    let mut app = create_headless_app(seed);

    app.world_mut().spawn((
        Player,
        Health::new(200),
        Transform::from_xyz(400.0, 0.0, 0.0),
    ));

    for i in 0..3 {
        app.world_mut()
            .spawn(AgentBundle::at(Vec2::new(-100.0 * i as f32, 60.0 * i as f32), 1));
    }

    for x in [150.0, 250.0] {
        app.world_mut()
            .spawn((CoverPoint, Transform::from_xyz(x, 120.0, 0.0)));
    }

    // Граната прилетает в гущу агентов на 3-й секунде
    step_fixed(&mut app, 180);
    app.world_mut().spawn((
        Grenade::thrown(Vec2::new(-300.0, 50.0), 2.5),
        Transform::from_xyz(200.0, 0.0, 0.0),
    ));

    for chunk in 0..10 {
        step_fixed(&mut app, 60);
        let entities = app.world().entities().len();
        log(&format!("⏱️ t+{}s: {} entities", chunk + 4, entities));
    }

    log("🏁 simulation complete");
}
