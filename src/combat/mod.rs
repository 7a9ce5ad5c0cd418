//! Combat data - weapon tables and the damage-application interface

use serde::{Deserialize, Serialize};

use crate::character::CharacterId;

/// How a weapon's hit claims are validated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FireKind {
    /// Instant ray from muzzle to impact
    Hitscan,
    /// Simulated ballistic trajectory
    Projectile,
    /// Several simultaneous pellet rays per shot
    MultiPellet,
}

/// Weapon archetypes available in the arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeaponKind {
    Rifle,
    Pistol,
    SniperRifle,
    Shotgun,
    GrenadeLauncher,
}

/// Weapon stats consumed by the damage pipeline
#[derive(Debug, Clone, Copy)]
pub struct WeaponSpec {
    /// Damage per confirmed body hit
    pub damage: f32,
    /// Damage per confirmed critical (head) hit
    pub critical_damage: f32,
    pub fire: FireKind,
    /// Pellets per shot (multi-pellet weapons, otherwise 1)
    pub pellet_count: u32,
    /// Launch speed for projectile weapons (world units per second)
    pub launch_speed: f32,
}

impl WeaponSpec {
    pub fn for_kind(kind: WeaponKind) -> Self {
        match kind {
            WeaponKind::Rifle => Self {
                damage: 18.0,
                critical_damage: 36.0,
                fire: FireKind::Hitscan,
                pellet_count: 1,
                launch_speed: 0.0,
            },
            WeaponKind::Pistol => Self {
                damage: 12.0,
                critical_damage: 24.0,
                fire: FireKind::Hitscan,
                pellet_count: 1,
                launch_speed: 0.0,
            },
            WeaponKind::SniperRifle => Self {
                damage: 45.0,
                critical_damage: 120.0,
                fire: FireKind::Hitscan,
                pellet_count: 1,
                launch_speed: 0.0,
            },
            WeaponKind::Shotgun => Self {
                damage: 8.0,
                critical_damage: 14.0,
                fire: FireKind::MultiPellet,
                pellet_count: 10,
                launch_speed: 0.0,
            },
            WeaponKind::GrenadeLauncher => Self {
                damage: 55.0,
                critical_damage: 70.0,
                fire: FireKind::Projectile,
                pellet_count: 1,
                launch_speed: 24.0,
            },
        }
    }
}

/// External damage-application interface. Called exactly once per confirmed
/// outcome; never called for an unconfirmed one, never retried.
pub trait DamageApply {
    fn apply_damage(
        &mut self,
        target: CharacterId,
        amount: f32,
        instigator: CharacterId,
        causer: WeaponKind,
    );
}

/// One pending damage application
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DamageCommand {
    pub target: CharacterId,
    pub amount: f32,
    pub instigator: CharacterId,
    pub causer: WeaponKind,
}

/// Queue implementation used by the session host: commands collected while
/// the rewind pipeline holds the roster are settled against character
/// health once the claim has been fully processed.
#[derive(Debug, Default)]
pub struct DamageQueue {
    pub pending: Vec<DamageCommand>,
}

impl DamageApply for DamageQueue {
    fn apply_damage(
        &mut self,
        target: CharacterId,
        amount: f32,
        instigator: CharacterId,
        causer: WeaponKind,
    ) {
        self.pending.push(DamageCommand {
            target,
            amount,
            instigator,
            causer,
        });
    }
}

/// Apply damage to health, returns (new_health, is_dead)
pub fn apply_to_health(current_health: f32, damage: f32) -> (f32, bool) {
    let new_health = (current_health - damage).max(0.0);
    (new_health, new_health <= 0.0)
}
