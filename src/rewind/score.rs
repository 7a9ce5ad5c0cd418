//! Score/damage request handling: the trust boundary where a client's hit
//! claim is re-derived on the host before any damage is applied.
//!
//! Only the claimed geometry and fire time are taken from the client.
//! Hit/miss outcomes and damage amounts are always computed here, and a
//! claim that cannot be validated is dropped without a reply.

use tracing::debug;

use crate::character::{CharacterId, Roster};
use crate::combat::{DamageApply, WeaponKind, WeaponSpec};
use crate::protocol::{ClaimPayload, HitscanClaim, ProjectileClaim, ShotgunClaim};

use super::confirm::{self, TrajectoryParams};
use super::locate::frame_at;

/// Host-side context for one score request. Everything here comes from the
/// host's own collaborators, never from the claiming client.
#[derive(Debug, Clone, Copy)]
pub struct ScoreContext {
    pub shooter: CharacterId,
    pub weapon_kind: WeaponKind,
    pub weapon: WeaponSpec,
    /// Estimated one-way network delay for the claiming client (half of
    /// the measured round-trip time)
    pub one_way_delay: f32,
    /// Maximum rewind window; also bounds projectile path simulation
    pub max_rewind_secs: f32,
}

/// A confirmed outcome, reported so the session can broadcast events
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClaimOutcome {
    Single {
        target: CharacterId,
        critical: bool,
        damage: f32,
    },
    Pellets {
        target: CharacterId,
        critical_hits: u32,
        body_hits: u32,
        damage: f32,
    },
}

/// Handle one claim end to end: adjust the claimed time for latency,
/// locate the matching snapshot, confirm against the rewound geometry and
/// apply damage for confirmed outcomes.
pub fn handle_claim(
    roster: &mut Roster,
    ctx: &ScoreContext,
    payload: &ClaimPayload,
    damage: &mut dyn DamageApply,
) -> Vec<ClaimOutcome> {
    match payload {
        ClaimPayload::Hitscan(claim) => handle_hitscan(roster, ctx, claim, damage),
        ClaimPayload::Projectile(claim) => handle_projectile(roster, ctx, claim, damage),
        ClaimPayload::Shotgun(claim) => handle_shotgun(roster, ctx, claim, damage),
    }
}

/// Host-clock instant the client actually fired at, approximated by
/// pulling the claimed time back by the one-way delay
fn adjusted_fire_time(ctx: &ScoreContext, fire_time: f32) -> f32 {
    fire_time - ctx.one_way_delay
}

fn handle_hitscan(
    roster: &mut Roster,
    ctx: &ScoreContext,
    claim: &HitscanClaim,
    damage: &mut dyn DamageApply,
) -> Vec<ClaimOutcome> {
    let rewind_time = adjusted_fire_time(ctx, claim.fire_time);

    let Some(target) = roster.get_mut(claim.target) else {
        debug!(target = %claim.target, "Hit claim for unknown target ignored");
        return Vec::new();
    };
    let frame = match frame_at(&target.history, rewind_time) {
        Ok(frame) => frame,
        Err(error) => {
            debug!(target = %claim.target, %error, rewind_time, "Hit claim dropped");
            return Vec::new();
        }
    };

    let result = confirm::confirm_hitscan(target, &frame, claim.trace_start, claim.hit_location);
    if !result.confirmed {
        return Vec::new();
    }

    let amount = if result.critical {
        ctx.weapon.critical_damage
    } else {
        ctx.weapon.damage
    };
    damage.apply_damage(claim.target, amount, ctx.shooter, ctx.weapon_kind);

    vec![ClaimOutcome::Single {
        target: claim.target,
        critical: result.critical,
        damage: amount,
    }]
}

fn handle_projectile(
    roster: &mut Roster,
    ctx: &ScoreContext,
    claim: &ProjectileClaim,
    damage: &mut dyn DamageApply,
) -> Vec<ClaimOutcome> {
    let rewind_time = adjusted_fire_time(ctx, claim.fire_time);

    let Some(target) = roster.get_mut(claim.target) else {
        debug!(target = %claim.target, "Projectile claim for unknown target ignored");
        return Vec::new();
    };
    let frame = match frame_at(&target.history, rewind_time) {
        Ok(frame) => frame,
        Err(error) => {
            debug!(target = %claim.target, %error, rewind_time, "Projectile claim dropped");
            return Vec::new();
        }
    };

    let params = TrajectoryParams {
        max_sim_time: ctx.max_rewind_secs,
        ..TrajectoryParams::default()
    };
    let result = confirm::confirm_projectile(
        target,
        &frame,
        claim.launch_origin,
        claim.initial_velocity,
        params,
    );
    if !result.confirmed {
        return Vec::new();
    }

    let amount = if result.critical {
        ctx.weapon.critical_damage
    } else {
        ctx.weapon.damage
    };
    damage.apply_damage(claim.target, amount, ctx.shooter, ctx.weapon_kind);

    vec![ClaimOutcome::Single {
        target: claim.target,
        critical: result.critical,
        damage: amount,
    }]
}

fn handle_shotgun(
    roster: &mut Roster,
    ctx: &ScoreContext,
    claim: &ShotgunClaim,
    damage: &mut dyn DamageApply,
) -> Vec<ClaimOutcome> {
    let rewind_time = adjusted_fire_time(ctx, claim.fire_time);

    // Locate per target; targets that cannot be reconstructed simply drop
    // out of the shot instead of failing the whole claim.
    let mut frames = Vec::with_capacity(claim.targets.len());
    for target_id in &claim.targets {
        let Some(target) = roster.get(*target_id) else {
            debug!(target = %target_id, "Pellet claim for unknown target ignored");
            continue;
        };
        match frame_at(&target.history, rewind_time) {
            Ok(frame) => frames.push((*target_id, frame)),
            Err(error) => {
                debug!(target = %target_id, %error, rewind_time, "Pellet claim target dropped");
            }
        }
    }
    if frames.is_empty() {
        return Vec::new();
    }

    let result =
        confirm::confirm_shotgun(roster, &frames, claim.trace_start, &claim.hit_locations);

    let mut outcomes = Vec::new();
    for (target, counts) in result.hits {
        let total = counts.body_hits as f32 * ctx.weapon.damage
            + counts.critical_hits as f32 * ctx.weapon.critical_damage;
        if total <= 0.0 {
            continue;
        }
        damage.apply_damage(target, total, ctx.shooter, ctx.weapon_kind);
        outcomes.push(ClaimOutcome::Pellets {
            target,
            critical_hits: counts.critical_hits,
            body_hits: counts.body_hits,
            damage: total,
        });
    }
    outcomes
}
