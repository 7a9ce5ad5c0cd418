//! Integration tests for the session host pipeline
//!
//! These drive a real session task over its channels: spawn characters,
//! stream pose updates, then submit lagged claims and observe the
//! broadcast outcomes.

use std::time::Duration;

use glam::Vec3;
use tokio::sync::broadcast;
use tokio::time::{sleep, timeout};
use uuid::Uuid;

use arena_combat_server::combat::{WeaponKind, WeaponSpec};
use arena_combat_server::config::Config;
use arena_combat_server::protocol::{
    ClaimPayload, HitscanClaim, HostMsg, ServerEvent, ShotgunClaim,
};
use arena_combat_server::session::{SessionHandle, SessionHost};

/// Head height of the humanoid rig used by every character
const HEAD_Z: f32 = 1.62;

async fn start_session() -> SessionHandle {
    let (host, handle) = SessionHost::new(Uuid::new_v4(), Config::default());
    tokio::spawn(host.run());
    handle
}

async fn spawn(handle: &SessionHandle, position: Vec3) -> Uuid {
    let id = Uuid::new_v4();
    handle
        .input_tx
        .send(HostMsg::Spawn {
            character: id,
            display_name: format!("char_{}", &id.to_string()[..8]),
            position,
            yaw: 0.0,
        })
        .await
        .expect("session alive");
    id
}

/// Wait for an event matching `predicate`, failing after two seconds
async fn expect_event(
    events: &mut broadcast::Receiver<ServerEvent>,
    predicate: impl Fn(&ServerEvent) -> bool,
) -> ServerEvent {
    timeout(Duration::from_secs(2), async {
        loop {
            match events.recv().await {
                Ok(event) if predicate(&event) => return event,
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => panic!("event stream closed"),
            }
        }
    })
    .await
    .expect("expected event within two seconds")
}

#[tokio::test]
async fn lagged_hitscan_claim_is_confirmed() {
    let handle = start_session().await;
    let mut events = handle.event_tx.subscribe();

    let shooter = spawn(&handle, Vec3::new(0.0, -6.0, 0.0)).await;
    let target = spawn(&handle, Vec3::new(0.0, 0.0, 0.0)).await;
    expect_event(&mut events, |e| {
        matches!(e, ServerEvent::CharacterSpawned { character } if *character == target)
    })
    .await;

    // Let the host record a few frames of the standing target.
    sleep(Duration::from_millis(120)).await;

    handle
        .input_tx
        .send(HostMsg::FireClaim {
            shooter,
            weapon: WeaponKind::Rifle,
            payload: ClaimPayload::Hitscan(HitscanClaim {
                target,
                trace_start: Vec3::new(0.0, -6.0, HEAD_Z),
                hit_location: Vec3::new(0.0, 0.0, HEAD_Z),
                // Far beyond any recorded frame: the newest frame is used.
                fire_time: 3600.0,
            }),
        })
        .await
        .expect("session alive");

    let event = expect_event(&mut events, |e| {
        matches!(e, ServerEvent::HitConfirmed { .. })
    })
    .await;

    match event {
        ServerEvent::HitConfirmed {
            shooter: s,
            target: t,
            weapon,
            critical,
            damage,
        } => {
            assert_eq!(s, shooter);
            assert_eq!(t, target);
            assert_eq!(weapon, WeaponKind::Rifle);
            assert!(critical, "claim aimed at the head must be critical");
            assert_eq!(damage, WeaponSpec::for_kind(WeaponKind::Rifle).critical_damage);
        }
        other => panic!("unexpected event {other:?}"),
    }
}

#[tokio::test]
async fn claim_against_vacated_position_confirms_via_history() {
    let handle = start_session().await;
    let mut events = handle.event_tx.subscribe();

    let shooter = spawn(&handle, Vec3::new(0.0, -6.0, 0.0)).await;
    let target = spawn(&handle, Vec3::new(0.0, 0.0, 0.0)).await;
    expect_event(&mut events, |e| {
        matches!(e, ServerEvent::CharacterSpawned { character } if *character == target)
    })
    .await;

    // Record the target standing at the origin, then teleport it away.
    sleep(Duration::from_millis(400)).await;
    handle
        .input_tx
        .send(HostMsg::RttSample {
            client: shooter,
            rtt: 0.200,
        })
        .await
        .expect("session alive");
    handle
        .input_tx
        .send(HostMsg::PoseUpdate {
            character: target,
            position: Vec3::new(30.0, 0.0, 0.0),
            yaw: 0.0,
        })
        .await
        .expect("session alive");
    sleep(Duration::from_millis(100)).await;

    // The lagged client still sees the target at the origin and fires at
    // it: after the 100 ms one-way adjustment the host rewinds to t=0.35,
    // squarely inside the window where the target stood there.
    handle
        .input_tx
        .send(HostMsg::FireClaim {
            shooter,
            weapon: WeaponKind::Pistol,
            payload: ClaimPayload::Hitscan(HitscanClaim {
                target,
                trace_start: Vec3::new(0.0, -6.0, HEAD_Z),
                hit_location: Vec3::new(0.0, 0.0, HEAD_Z),
                fire_time: 0.45,
            }),
        })
        .await
        .expect("session alive");

    let event = expect_event(&mut events, |e| {
        matches!(e, ServerEvent::HitConfirmed { .. })
    })
    .await;
    match event {
        ServerEvent::HitConfirmed { target: t, critical, .. } => {
            assert_eq!(t, target);
            assert!(critical);
        }
        other => panic!("unexpected event {other:?}"),
    }
}

#[tokio::test]
async fn shotgun_claim_reports_pellet_tallies() {
    let handle = start_session().await;
    let mut events = handle.event_tx.subscribe();

    let shooter = spawn(&handle, Vec3::new(0.0, -6.0, 0.0)).await;
    let target = spawn(&handle, Vec3::new(0.0, 0.0, 0.0)).await;
    expect_event(&mut events, |e| {
        matches!(e, ServerEvent::CharacterSpawned { character } if *character == target)
    })
    .await;
    sleep(Duration::from_millis(120)).await;

    handle
        .input_tx
        .send(HostMsg::FireClaim {
            shooter,
            weapon: WeaponKind::Shotgun,
            payload: ClaimPayload::Shotgun(ShotgunClaim {
                targets: vec![target],
                trace_start: Vec3::new(0.0, -6.0, 1.3),
                hit_locations: vec![
                    Vec3::new(0.0, 0.0, HEAD_Z),  // head
                    Vec3::new(0.0, 0.0, 0.95),    // pelvis
                    Vec3::new(0.05, 0.0, 0.95),   // pelvis
                    Vec3::new(8.0, 0.0, 0.95),    // wide miss
                ],
                fire_time: 3600.0,
            }),
        })
        .await
        .expect("session alive");

    let event = expect_event(&mut events, |e| {
        matches!(e, ServerEvent::PelletsConfirmed { .. })
    })
    .await;

    match event {
        ServerEvent::PelletsConfirmed {
            target: t,
            critical_hits,
            body_hits,
            damage,
            ..
        } => {
            let spec = WeaponSpec::for_kind(WeaponKind::Shotgun);
            assert_eq!(t, target);
            assert_eq!(critical_hits, 1);
            assert_eq!(body_hits, 2);
            assert!(
                (damage
                    - (critical_hits as f32 * spec.critical_damage
                        + body_hits as f32 * spec.damage))
                    .abs()
                    < 1e-4
            );
        }
        other => panic!("unexpected event {other:?}"),
    }
}

#[tokio::test]
async fn stale_claims_produce_no_events() {
    let handle = start_session().await;
    let mut events = handle.event_tx.subscribe();

    let shooter = spawn(&handle, Vec3::new(0.0, -6.0, 0.0)).await;
    let target = spawn(&handle, Vec3::new(0.0, 0.0, 0.0)).await;
    expect_event(&mut events, |e| {
        matches!(e, ServerEvent::CharacterSpawned { character } if *character == target)
    })
    .await;
    sleep(Duration::from_millis(120)).await;

    // An absurd one-way delay pushes the adjusted time far before any
    // retained frame; the claim must vanish without a reply.
    handle
        .input_tx
        .send(HostMsg::RttSample {
            client: shooter,
            rtt: 600.0,
        })
        .await
        .expect("session alive");
    handle
        .input_tx
        .send(HostMsg::FireClaim {
            shooter,
            weapon: WeaponKind::Rifle,
            payload: ClaimPayload::Hitscan(HitscanClaim {
                target,
                trace_start: Vec3::new(0.0, -6.0, HEAD_Z),
                hit_location: Vec3::new(0.0, 0.0, HEAD_Z),
                fire_time: 0.2,
            }),
        })
        .await
        .expect("session alive");

    sleep(Duration::from_millis(150)).await;
    let mut confirmations = 0;
    while let Ok(event) = events.try_recv() {
        if matches!(
            event,
            ServerEvent::HitConfirmed { .. } | ServerEvent::PelletsConfirmed { .. }
        ) {
            confirmations += 1;
        }
    }
    assert_eq!(confirmations, 0, "stale claim must be dropped silently");
}

#[tokio::test]
async fn session_stops_when_all_handles_drop() {
    let (host, handle) = SessionHost::new(Uuid::new_v4(), Config::default());
    let task = tokio::spawn(host.run());

    drop(handle);

    timeout(Duration::from_secs(2), task)
        .await
        .expect("host should stop once every handle is gone")
        .expect("host task should not panic");
}
