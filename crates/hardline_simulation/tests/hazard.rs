//! Интеграционные тесты гранатной угрозы: лок landing-точки (и его
//! снятие по безопасной дистанции / детонации)

use bevy::prelude::*;
use hardline_simulation::{
    create_headless_app, hazard::SAFE_RADIUS, step_fixed, AgentBundle, AIState, AIStateKind,
    AudioCue, AudioCueKind, Grenade,
};

fn evading_landing(app: &App, agent: Entity) -> Option<Vec2> {
    match app.world().get::<AIState>(agent) {
        Some(AIState::EvadingGrenade { landing, .. }) => Some(*landing),
        _ => None,
    }
}

#[test]
fn test_landing_lock_is_stable_while_grenade_rolls() {
    let mut app = create_headless_app(9);
    let agent = app
        .world_mut()
        .spawn(AgentBundle::at(Vec2::new(550.0, 0.0), 1))
        .id();

    // Катится из (0,0) в +X: аналитическая точка остановки ~(600, 0)
    let grenade = app
        .world_mut()
        .spawn((
            Grenade::thrown(Vec2::new(600.0, 0.0), 3.0),
            Transform::from_xyz(0.0, 0.0, 0.0),
        ))
        .id();

    step_fixed(&mut app, 1);
    let locked = evading_landing(&app, agent).expect("агент вытеснен в EvadingGrenade");

    let grenade_pos_at_lock = app.world().get::<Transform>(grenade).unwrap().translation;

    // Граната продолжает катиться, лок не дрожит
    for _ in 0..10 {
        step_fixed(&mut app, 1);
        if let Some(landing) = evading_landing(&app, agent) {
            assert_eq!(landing, locked, "landing-точка менялась во время evasion");
        } else {
            break;
        }
    }

    let grenade_pos_later = app.world().get::<Transform>(grenade).unwrap().translation;
    assert!(
        grenade_pos_later.x > grenade_pos_at_lock.x,
        "граната должна была прокатиться дальше"
    );
}

#[test]
fn test_evasion_releases_at_safe_distance() {
    let mut app = create_headless_app(9);
    let agent = app
        .world_mut()
        .spawn(AgentBundle::at(Vec2::new(550.0, 0.0), 1))
        .id();
    app.world_mut().spawn((
        // Длинный fuse: выход должен случиться по дистанции, не по взрыву
        Grenade::thrown(Vec2::new(600.0, 0.0), 30.0),
        Transform::from_xyz(0.0, 0.0, 0.0),
    ));

    step_fixed(&mut app, 1);
    let locked = evading_landing(&app, agent).expect("лок взят");

    // Убегает со скоростью ~216 px/s; 140px запаса — меньше 2 секунд
    step_fixed(&mut app, 150);

    let state = app.world().get::<AIState>(agent).unwrap();
    assert_ne!(state.kind(), AIStateKind::EvadingGrenade);

    let position = app.world().get::<Transform>(agent).unwrap().translation;
    assert!(
        Vec2::new(position.x, position.y).distance(locked) >= SAFE_RADIUS,
        "лок снимается только на безопасной дистанции от точки падения"
    );
}

#[test]
fn test_detonation_releases_lock_and_despawns_grenade() {
    let mut app = create_headless_app(9);
    let agent = app
        .world_mut()
        .spawn(AgentBundle::at(Vec2::new(550.0, 0.0), 1))
        .id();
    let grenade = app
        .world_mut()
        .spawn((
            Grenade::thrown(Vec2::new(600.0, 0.0), 0.1),
            Transform::from_xyz(0.0, 0.0, 0.0),
        ))
        .id();

    step_fixed(&mut app, 1);
    assert!(evading_landing(&app, agent).is_some());

    // 0.1s fuse: через полсекунды гранаты нет и лок снят
    step_fixed(&mut app, 30);
    assert!(app.world().get::<Grenade>(grenade).is_none());
    let state = app.world().get::<AIState>(agent).unwrap();
    assert_ne!(state.kind(), AIStateKind::EvadingGrenade);
}

#[test]
fn test_detonation_emits_audio_cue() {
    let mut app = create_headless_app(9);
    let position = Vec2::new(80.0, -40.0);
    app.world_mut().spawn((
        Grenade::thrown(Vec2::ZERO, 0.1),
        Transform::from_xyz(position.x, position.y, 0.0),
    ));

    step_fixed(&mut app, 30);

    let events = app.world().resource::<Events<AudioCue>>();
    let mut cursor = events.get_cursor();
    let detonation = cursor
        .read(events)
        .find(|cue| cue.kind == AudioCueKind::Detonation)
        .expect("детонация должна отдавать аудио-cue хосту");
    assert!(detonation.position.distance(position) < 1.0);
}
