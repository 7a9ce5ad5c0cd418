//! Wire types for session input and broadcast events.
//! Claims carry only what the client is trusted to report: geometry and
//! time. Hit/miss outcomes and damage amounts are always re-derived on the
//! host.

use glam::Vec3;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::character::CharacterId;
use crate::combat::WeaponKind;

/// A hitscan hit claim: one ray, one claimed impact point
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HitscanClaim {
    pub target: CharacterId,
    /// Muzzle position the trace started from
    pub trace_start: Vec3,
    /// Claimed impact location
    pub hit_location: Vec3,
    /// Claimed fire time, host-clock seconds as estimated by the client
    pub fire_time: f32,
}

/// A projectile hit claim: launch state instead of an impact point
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectileClaim {
    pub target: CharacterId,
    pub launch_origin: Vec3,
    pub initial_velocity: Vec3,
    pub fire_time: f32,
}

/// A multi-pellet hit claim: every pellet shares one origin
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShotgunClaim {
    pub targets: Vec<CharacterId>,
    pub trace_start: Vec3,
    pub hit_locations: Vec<Vec3>,
    pub fire_time: f32,
}

/// Claim payload variants, tagged by validation strategy
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClaimPayload {
    Hitscan(HitscanClaim),
    Projectile(ProjectileClaim),
    Shotgun(ShotgunClaim),
}

/// Messages consumed by a session host. Delivery is reliable and one-way:
/// a claim that fails validation is dropped without a reply.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HostMsg {
    /// Spawn a character into the session
    Spawn {
        character: CharacterId,
        display_name: String,
        position: Vec3,
        yaw: f32,
    },

    /// Remove a character from the session
    Despawn { character: CharacterId },

    /// Pose update from the movement system for the current tick
    PoseUpdate {
        character: CharacterId,
        position: Vec3,
        yaw: f32,
    },

    /// Externally measured round-trip time sample for a client
    RttSample { client: Uuid, rtt: f32 },

    /// Fire claim from a client's weapon
    FireClaim {
        shooter: CharacterId,
        weapon: WeaponKind,
        payload: ClaimPayload,
    },
}

/// Events broadcast by the host
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum ServerEvent {
    CharacterSpawned {
        character: CharacterId,
    },

    CharacterRemoved {
        character: CharacterId,
    },

    /// A single-shot claim survived rewound validation
    HitConfirmed {
        shooter: CharacterId,
        target: CharacterId,
        weapon: WeaponKind,
        critical: bool,
        damage: f32,
    },

    /// A multi-pellet claim survived rewound validation
    PelletsConfirmed {
        shooter: CharacterId,
        target: CharacterId,
        weapon: WeaponKind,
        critical_hits: u32,
        body_hits: u32,
        damage: f32,
    },

    /// A character's health reached zero
    Killed {
        victim: CharacterId,
        killer: Option<CharacterId>,
        weapon: WeaponKind,
    },
}
