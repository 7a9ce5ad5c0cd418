//! Session host: the authoritative tick loop that records hit-volume
//! history and validates fire claims.
//!
//! Tick ordering is the core guarantee here: all pending input (pose
//! updates, latency samples, spawns) is applied first, the tick is
//! recorded into every character's history, and only then are the tick's
//! queued claims processed. Claims are drained from one queue on one task,
//! so claims against the same target are naturally serialized.

pub mod clock;

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use glam::Vec3;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::{broadcast, mpsc};
use tokio::time::interval;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::character::{Character, CharacterId, Roster};
use crate::combat::{self, DamageQueue, WeaponKind, WeaponSpec};
use crate::config::Config;
use crate::protocol::{ClaimPayload, HostMsg, ServerEvent};
use crate::rewind::history::record_roster;
use crate::rewind::score::{handle_claim, ClaimOutcome, ScoreContext};
use crate::util::rate_limit::ClaimRateLimiter;
use crate::util::time::{unix_millis, Timer, TICK_DURATION_MICROS};

use clock::{HostClock, RttTracker};

/// Handle to a running session
#[derive(Clone)]
pub struct SessionHandle {
    pub id: Uuid,
    pub input_tx: mpsc::Sender<HostMsg>,
    pub event_tx: broadcast::Sender<ServerEvent>,
    pub character_count: Arc<AtomicUsize>,
}

impl SessionHandle {
    pub fn character_count(&self) -> usize {
        self.character_count.load(Ordering::Relaxed)
    }
}

/// Registry of all active sessions
pub struct SessionRegistry {
    sessions: DashMap<Uuid, SessionHandle>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
        }
    }

    pub fn get(&self, id: &Uuid) -> Option<SessionHandle> {
        self.sessions.get(id).map(|s| s.value().clone())
    }

    pub fn insert(&self, handle: SessionHandle) {
        self.sessions.insert(handle.id, handle);
    }

    pub fn remove(&self, id: &Uuid) -> Option<SessionHandle> {
        self.sessions.remove(id).map(|(_, h)| h)
    }

    pub fn active_sessions(&self) -> usize {
        self.sessions.len()
    }

    pub fn total_characters(&self) -> usize {
        self.sessions
            .iter()
            .map(|s| s.value().character_count())
            .sum()
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// A fire claim parked until this tick's recording has run
struct PendingClaim {
    shooter: CharacterId,
    weapon: WeaponKind,
    payload: ClaimPayload,
}

/// The authoritative session host
pub struct SessionHost {
    id: Uuid,
    config: Config,
    roster: Roster,
    clock: HostClock,
    rtt: RttTracker,
    claim_limiters: HashMap<CharacterId, ClaimRateLimiter>,
    pending_claims: Vec<PendingClaim>,
    tick: u64,
    input_rx: mpsc::Receiver<HostMsg>,
    event_tx: broadcast::Sender<ServerEvent>,
    character_count: Arc<AtomicUsize>,
}

impl SessionHost {
    /// Create a new session host and its handle
    pub fn new(id: Uuid, config: Config) -> (Self, SessionHandle) {
        let (input_tx, input_rx) = mpsc::channel(256);
        let (event_tx, _) = broadcast::channel(64);
        let character_count = Arc::new(AtomicUsize::new(0));

        let handle = SessionHandle {
            id,
            input_tx,
            event_tx: event_tx.clone(),
            character_count: character_count.clone(),
        };

        let host = Self {
            id,
            config,
            roster: Roster::new(),
            clock: HostClock::start(),
            rtt: RttTracker::new(),
            claim_limiters: HashMap::new(),
            pending_claims: Vec::new(),
            tick: 0,
            input_rx,
            event_tx,
            character_count,
        };

        (host, handle)
    }

    /// Run the authoritative tick loop until every handle is dropped
    pub async fn run(mut self) {
        info!(session_id = %self.id, "Session host started");

        let tick_duration = Duration::from_micros(TICK_DURATION_MICROS);
        let mut tick_interval = interval(tick_duration);
        tick_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tick_interval.tick().await;
            if self.run_tick() {
                break;
            }
        }

        info!(session_id = %self.id, tick = self.tick, "Session host stopped");
    }

    /// One simulation tick: drain inputs, record history, then validate
    /// the tick's claims. Returns true once the input channel is closed.
    fn run_tick(&mut self) -> bool {
        let timer = Timer::new();
        self.tick += 1;

        let disconnected = self.process_inputs();

        let now = self.clock.now();
        record_roster(&mut self.roster, now, self.config.max_rewind_secs);

        self.process_claims();

        if timer.elapsed_micros() > TICK_DURATION_MICROS {
            warn!(
                session_id = %self.id,
                tick = self.tick,
                micros = timer.elapsed_micros(),
                "Tick overran its budget"
            );
        }

        disconnected
    }

    /// Drain all pending host messages; claims are queued for after this
    /// tick's recording
    fn process_inputs(&mut self) -> bool {
        loop {
            match self.input_rx.try_recv() {
                Ok(msg) => self.handle_msg(msg),
                Err(TryRecvError::Empty) => return false,
                Err(TryRecvError::Disconnected) => return true,
            }
        }
    }

    fn handle_msg(&mut self, msg: HostMsg) {
        match msg {
            HostMsg::Spawn {
                character,
                display_name,
                position,
                yaw,
            } => self.handle_spawn(character, display_name, position, yaw),
            HostMsg::Despawn { character } => self.handle_despawn(character),
            HostMsg::PoseUpdate {
                character,
                position,
                yaw,
            } => {
                if let Some(target) = self.roster.get_mut(character) {
                    target.set_pose(position, yaw);
                }
            }
            HostMsg::RttSample { client, rtt } => self.rtt.record_sample(client, rtt),
            HostMsg::FireClaim {
                shooter,
                weapon,
                payload,
            } => self.queue_claim(shooter, weapon, payload),
        }
    }

    fn handle_spawn(&mut self, id: CharacterId, display_name: String, position: Vec3, yaw: f32) {
        if self.roster.contains(id) {
            warn!(session_id = %self.id, character = %id, "Character already in session");
            return;
        }

        self.roster
            .insert(Character::spawn(id, display_name, position, yaw));
        self.character_count
            .store(self.roster.len(), Ordering::Relaxed);

        let _ = self
            .event_tx
            .send(ServerEvent::CharacterSpawned { character: id });

        info!(
            session_id = %self.id,
            character = %id,
            characters = self.roster.len(),
            "Character spawned"
        );
    }

    fn handle_despawn(&mut self, id: CharacterId) {
        if self.roster.remove(id).is_some() {
            self.character_count
                .store(self.roster.len(), Ordering::Relaxed);
            self.rtt.forget(id);
            self.claim_limiters.remove(&id);

            let _ = self
                .event_tx
                .send(ServerEvent::CharacterRemoved { character: id });

            info!(session_id = %self.id, character = %id, "Character removed");
        }
    }

    fn queue_claim(&mut self, shooter: CharacterId, weapon: WeaponKind, payload: ClaimPayload) {
        let limiter = self
            .claim_limiters
            .entry(shooter)
            .or_insert_with(|| ClaimRateLimiter::new(self.config.claim_rate_limit));
        if !limiter.check_claim() {
            warn!(session_id = %self.id, shooter = %shooter, "Rate limited fire claim");
            return;
        }

        if !self.roster.contains(shooter) {
            debug!(session_id = %self.id, shooter = %shooter, "Fire claim from unknown shooter ignored");
            return;
        }

        self.pending_claims.push(PendingClaim {
            shooter,
            weapon,
            payload,
        });
    }

    /// Validate every claim queued this tick, strictly after recording
    fn process_claims(&mut self) {
        if self.pending_claims.is_empty() {
            return;
        }

        let claims = std::mem::take(&mut self.pending_claims);
        for claim in claims {
            let ctx = ScoreContext {
                shooter: claim.shooter,
                weapon_kind: claim.weapon,
                weapon: WeaponSpec::for_kind(claim.weapon),
                one_way_delay: self.rtt.one_way_delay(claim.shooter),
                max_rewind_secs: self.config.max_rewind_secs,
            };

            let mut damage = DamageQueue::default();
            let outcomes = handle_claim(&mut self.roster, &ctx, &claim.payload, &mut damage);
            self.settle_damage(damage);

            for outcome in outcomes {
                let event = match outcome {
                    ClaimOutcome::Single {
                        target,
                        critical,
                        damage,
                    } => ServerEvent::HitConfirmed {
                        shooter: claim.shooter,
                        target,
                        weapon: claim.weapon,
                        critical,
                        damage,
                    },
                    ClaimOutcome::Pellets {
                        target,
                        critical_hits,
                        body_hits,
                        damage,
                    } => ServerEvent::PelletsConfirmed {
                        shooter: claim.shooter,
                        target,
                        weapon: claim.weapon,
                        critical_hits,
                        body_hits,
                        damage,
                    },
                };
                let _ = self.event_tx.send(event);
            }
        }
    }

    /// Settle queued damage commands against character health
    fn settle_damage(&mut self, damage: DamageQueue) {
        for cmd in damage.pending {
            let killed = {
                let Some(target) = self.roster.get_mut(cmd.target) else {
                    continue;
                };
                if !target.alive {
                    continue;
                }
                let (new_health, killed) = combat::apply_to_health(target.health, cmd.amount);
                target.health = new_health;
                target.damage_taken += cmd.amount;
                if killed {
                    target.alive = false;
                    target.death_time = Some(unix_millis());
                }
                killed
            };

            if let Some(shooter) = self.roster.get_mut(cmd.instigator) {
                shooter.damage_dealt += cmd.amount;
                if killed {
                    shooter.kills += 1;
                }
            }

            if killed {
                let _ = self.event_tx.send(ServerEvent::Killed {
                    victim: cmd.target,
                    killer: Some(cmd.instigator),
                    weapon: cmd.causer,
                });
                info!(
                    session_id = %self.id,
                    victim = %cmd.target,
                    killer = %cmd.instigator,
                    "Character killed"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::character::BodyPart;
    use crate::protocol::HitscanClaim;

    fn spawn_msg(id: CharacterId, position: Vec3) -> HostMsg {
        HostMsg::Spawn {
            character: id,
            display_name: "c".to_string(),
            position,
            yaw: 0.0,
        }
    }

    fn host_with_two_characters() -> (SessionHost, SessionHandle, CharacterId, CharacterId) {
        let (mut host, handle) = SessionHost::new(Uuid::new_v4(), Config::default());
        let shooter = Uuid::new_v4();
        let target = Uuid::new_v4();
        host.handle_msg(spawn_msg(shooter, Vec3::new(0.0, -5.0, 0.0)));
        host.handle_msg(spawn_msg(target, Vec3::new(0.0, 0.0, 0.0)));
        (host, handle, shooter, target)
    }

    #[test]
    fn recording_runs_before_claim_processing() {
        let (mut host, _handle, shooter, target) = host_with_two_characters();
        let head = host
            .roster
            .get(target)
            .unwrap()
            .volume(BodyPart::Head)
            .unwrap()
            .center;

        // The claim arrives on the very first tick, before any history
        // exists; recording within the same tick must make it valid. The
        // claimed time sits beyond the newest frame, so the newest frame is
        // used verbatim.
        host.handle_msg(HostMsg::FireClaim {
            shooter,
            weapon: WeaponKind::Rifle,
            payload: ClaimPayload::Hitscan(HitscanClaim {
                target,
                trace_start: head + Vec3::new(0.0, -4.0, 0.0),
                hit_location: head,
                fire_time: host.clock.now() + 1.0,
            }),
        });
        host.run_tick();

        let target_state = host.roster.get(target).unwrap();
        assert!(target_state.history.len() >= 1);
        assert!(target_state.health < crate::character::MAX_HEALTH);
    }

    #[test]
    fn kills_are_attributed_to_the_shooter() {
        let (mut host, handle, shooter, target) = host_with_two_characters();
        let mut events = handle.event_tx.subscribe();
        host.roster.get_mut(target).unwrap().health = 10.0;

        let head = host
            .roster
            .get(target)
            .unwrap()
            .volume(BodyPart::Head)
            .unwrap()
            .center;
        host.handle_msg(HostMsg::FireClaim {
            shooter,
            weapon: WeaponKind::Rifle,
            payload: ClaimPayload::Hitscan(HitscanClaim {
                target,
                trace_start: head + Vec3::new(0.0, -4.0, 0.0),
                hit_location: head,
                fire_time: host.clock.now() + 1.0,
            }),
        });
        host.run_tick();

        let victim = host.roster.get(target).unwrap();
        assert!(!victim.alive);
        assert_eq!(victim.health, 0.0);
        assert!(victim.death_time.is_some());
        assert_eq!(host.roster.get(shooter).unwrap().kills, 1);

        let mut saw_kill = false;
        while let Ok(event) = events.try_recv() {
            if matches!(event, ServerEvent::Killed { victim, .. } if victim == target) {
                saw_kill = true;
            }
        }
        assert!(saw_kill);
    }

    #[test]
    fn rate_limited_claims_never_reach_the_pipeline() {
        let (mut host, _handle, shooter, target) = host_with_two_characters();
        host.config.claim_rate_limit = 2;

        let head = host
            .roster
            .get(target)
            .unwrap()
            .volume(BodyPart::Head)
            .unwrap()
            .center;
        for _ in 0..10 {
            host.handle_msg(HostMsg::FireClaim {
                shooter,
                weapon: WeaponKind::Pistol,
                payload: ClaimPayload::Hitscan(HitscanClaim {
                    target,
                    trace_start: head + Vec3::new(0.0, -4.0, 0.0),
                    hit_location: head,
                    fire_time: host.clock.now(),
                }),
            });
        }

        assert!(
            host.pending_claims.len() <= 2,
            "burst beyond the limit must be dropped, kept {}",
            host.pending_claims.len()
        );
    }

    #[test]
    fn claims_from_unknown_shooters_are_ignored() {
        let (mut host, _handle, _, target) = host_with_two_characters();
        host.handle_msg(HostMsg::FireClaim {
            shooter: Uuid::new_v4(),
            weapon: WeaponKind::Rifle,
            payload: ClaimPayload::Hitscan(HitscanClaim {
                target,
                trace_start: Vec3::ZERO,
                hit_location: Vec3::X,
                fire_time: 0.0,
            }),
        });
        assert!(host.pending_claims.is_empty());
    }

    #[test]
    fn despawn_clears_client_state() {
        let (mut host, _handle, shooter, target) = host_with_two_characters();
        host.handle_msg(HostMsg::RttSample {
            client: shooter,
            rtt: 0.1,
        });
        host.handle_msg(HostMsg::Despawn { character: shooter });

        assert!(!host.roster.contains(shooter));
        assert_eq!(host.rtt.round_trip(shooter), 0.0);
        assert!(host.roster.contains(target));
        assert_eq!(host.character_count.load(Ordering::Relaxed), 1);
    }
}
