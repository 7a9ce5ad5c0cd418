//! Arena Combat Server - authoritative rewind host
//!
//! Headless entry point: boots a session host and drives it with scripted
//! characters and a synthetic lagged shooter, so the whole record → locate
//! → confirm → damage pipeline can be observed from the logs.

use std::sync::Arc;
use std::time::Duration;

use glam::Vec3;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tokio::sync::broadcast;
use tokio::time::interval;
use tracing::{debug, info};
use uuid::Uuid;

use arena_combat_server::character::BodyPart;
use arena_combat_server::combat::WeaponKind;
use arena_combat_server::config::Config;
use arena_combat_server::protocol::{ClaimPayload, HitscanClaim, HostMsg};
use arena_combat_server::session::clock::HostClock;
use arena_combat_server::session::{SessionHandle, SessionHost, SessionRegistry};
use arena_combat_server::util::time::TICK_DURATION_MICROS;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = Config::from_env()?;

    // Initialize tracing
    init_tracing(&config.log_level);

    info!("Starting Arena Combat Server");

    let registry = Arc::new(SessionRegistry::new());
    let session_id = Uuid::new_v4();
    let (host, handle) = SessionHost::new(session_id, config.clone());
    registry.insert(handle.clone());
    tokio::spawn(host.run());

    info!(session_id = %session_id, "Session ready");

    // Scripted world: one orbiting target, one shooter with synthetic lag.
    let driver = tokio::spawn(drive_scripted_world(handle.clone(), config.sim_seed));

    // Log confirmed outcomes until shutdown.
    let mut events = handle.event_tx.subscribe();
    loop {
        tokio::select! {
            _ = shutdown_signal() => break,
            event = events.recv() => match event {
                Ok(event) => match serde_json::to_string(&event) {
                    Ok(json) => info!(event = %json, "Server event"),
                    Err(error) => debug!(%error, "Failed to encode event"),
                },
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!(skipped, "Event stream lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
        }
    }

    driver.abort();
    registry.remove(&session_id);
    info!("Server shutdown complete");
    Ok(())
}

/// Feed the session a moving target and a shooter whose claims arrive with
/// simulated latency, aimed where the target was one trip ago.
async fn drive_scripted_world(handle: SessionHandle, seed: u64) {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let clock = HostClock::start();

    let shooter = Uuid::new_v4();
    let target = Uuid::new_v4();
    let rtt = 0.120f32;

    let shooter_pos = Vec3::new(0.0, -8.0, 0.0);
    let _ = handle
        .input_tx
        .send(HostMsg::Spawn {
            character: shooter,
            display_name: "scripted_shooter".to_string(),
            position: shooter_pos,
            yaw: 0.0,
        })
        .await;
    let _ = handle
        .input_tx
        .send(HostMsg::Spawn {
            character: target,
            display_name: "scripted_target".to_string(),
            position: target_position(0.0),
            yaw: 0.0,
        })
        .await;
    let _ = handle
        .input_tx
        .send(HostMsg::RttSample {
            client: shooter,
            rtt,
        })
        .await;

    let mut ticker = interval(Duration::from_micros(TICK_DURATION_MICROS));
    let mut next_shot_at = 1.0f32;
    loop {
        ticker.tick().await;
        let now = clock.now();

        let _ = handle
            .input_tx
            .send(HostMsg::PoseUpdate {
                character: target,
                position: target_position(now),
                yaw: 0.0,
            })
            .await;

        if now >= next_shot_at {
            next_shot_at = now + rng.gen_range(0.6..1.4);

            // A lagged client aims at the pose it saw: one trip in the past.
            let seen = target_position(now - rtt * 0.5);
            let head = seen + Vec3::new(0.0, 0.0, 1.62);
            let muzzle = shooter_pos + Vec3::new(0.0, 0.0, 1.62);
            let _ = handle
                .input_tx
                .send(HostMsg::FireClaim {
                    shooter,
                    weapon: WeaponKind::Rifle,
                    payload: ClaimPayload::Hitscan(HitscanClaim {
                        target,
                        trace_start: muzzle,
                        hit_location: head,
                        fire_time: now,
                    }),
                })
                .await;
            debug!(
                aimed_at = ?head,
                part = BodyPart::Head.name(),
                "Scripted shooter fired"
            );
        }
    }
}

/// The scripted target strafes on a slow circle in front of the shooter
fn target_position(t: f32) -> Vec3 {
    Vec3::new(3.0 * (0.6 * t).sin(), 3.0 * (0.6 * t).cos() * 0.2, 0.0)
}

/// Initialize tracing/logging
fn init_tracing(log_level: &str) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown");
        }
        _ = terminate => {
            info!("Received terminate signal, starting graceful shutdown");
        }
    }
}
