//! Rewound hit confirmation: temporarily relocate a target's hit volumes
//! onto a reconstructed snapshot, run a prioritized geometry test, and
//! restore the live state on every exit path.
//!
//! Each confirm routine is fully synchronous and non-suspending: it
//! mutates live collision state, queries it, and restores it within one
//! uninterrupted call. Nothing else observes the character in between.

use std::collections::{HashMap, HashSet};

use glam::Vec3;

use crate::character::{BodyPart, Character, CharacterId, Roster};

use super::history::{BoxPose, FrameSnapshot};
use super::{GRAVITY, PROJECTILE_RADIUS, PROJECTILE_SIM_HZ, TRACE_EXTENSION};

/// Outcome of a single-target rewind test
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RewindResult {
    pub confirmed: bool,
    pub critical: bool,
}

/// Per-target pellet tallies for multi-pellet weapons
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PelletCounts {
    pub critical_hits: u32,
    pub body_hits: u32,
}

/// Outcome of a multi-pellet rewind test
#[derive(Debug, Clone, Default)]
pub struct ShotgunRewindResult {
    pub hits: HashMap<CharacterId, PelletCounts>,
}

/// Parameters for simulating a claimed projectile trajectory
#[derive(Debug, Clone, Copy)]
pub struct TrajectoryParams {
    /// Upper bound on simulated flight time; the rewind window, since no
    /// confirmable shot can predate retained history
    pub max_sim_time: f32,
    /// Steps per second of simulated flight
    pub sim_hz: f32,
    /// Projectile collision radius
    pub radius: f32,
    /// Vertical acceleration
    pub gravity: f32,
}

impl Default for TrajectoryParams {
    fn default() -> Self {
        Self {
            max_sim_time: 4.0,
            sim_hz: PROJECTILE_SIM_HZ,
            radius: PROJECTILE_RADIUS,
            gravity: GRAVITY,
        }
    }
}

/// Saved live state of a character's hit volumes and collision gates.
/// Captured before a rewind mutates the character; restoring it is the
/// single exit step of every confirm routine, hit or miss.
#[derive(Debug, Clone)]
pub struct PoseCheckpoint {
    volumes: HashMap<BodyPart, (BoxPose, bool)>,
    body_collision: bool,
}

impl PoseCheckpoint {
    pub fn capture(character: &Character) -> Self {
        let mut volumes = HashMap::with_capacity(BodyPart::ALL.len());
        for volume in character.volumes() {
            volumes.insert(
                volume.part,
                (
                    BoxPose {
                        center: volume.center,
                        rotation: volume.rotation,
                        half_extents: volume.half_extents,
                    },
                    volume.enabled,
                ),
            );
        }
        Self {
            volumes,
            body_collision: character.body_collision,
        }
    }

    /// Put the character's transforms and collision enablement back exactly
    /// as they were captured.
    pub fn restore(self, character: &mut Character) {
        for (part, (pose, enabled)) in self.volumes {
            if let Some(volume) = character.volume_mut(part) {
                volume.center = pose.center;
                volume.rotation = pose.rotation;
                volume.half_extents = pose.half_extents;
                volume.enabled = enabled;
            }
        }
        character.body_collision = self.body_collision;
    }
}

/// Move the character's hit volumes onto the snapshot's transforms
fn apply_snapshot(character: &mut Character, frame: &FrameSnapshot) {
    for volume in character.volumes_mut() {
        if let Some(pose) = frame.volumes.get(&volume.part) {
            volume.center = pose.center;
            volume.rotation = pose.rotation;
            volume.half_extents = pose.half_extents;
        }
    }
}

/// Checkpoint the target, pose it into the snapshot, and gate collision so
/// that only explicitly enabled hit volumes can block a query.
fn begin_rewind(character: &mut Character, frame: &FrameSnapshot) -> PoseCheckpoint {
    let checkpoint = PoseCheckpoint::capture(character);
    apply_snapshot(character, frame);
    character.body_collision = false;
    character.set_all_volumes_enabled(false);
    checkpoint
}

/// Validate a hitscan claim against the reconstructed snapshot. The trace
/// runs from the claimed origin to 25% past the claimed impact point.
pub fn confirm_hitscan(
    target: &mut Character,
    frame: &FrameSnapshot,
    trace_start: Vec3,
    hit_location: Vec3,
) -> RewindResult {
    let checkpoint = begin_rewind(target, frame);
    let trace_end = trace_start + (hit_location - trace_start) * TRACE_EXTENSION;

    let result = prioritized_segment_test(target, trace_start, trace_end);

    checkpoint.restore(target);
    result
}

/// Validate a projectile claim by re-simulating the claimed launch against
/// the reconstructed snapshot.
pub fn confirm_projectile(
    target: &mut Character,
    frame: &FrameSnapshot,
    launch_origin: Vec3,
    initial_velocity: Vec3,
    params: TrajectoryParams,
) -> RewindResult {
    let checkpoint = begin_rewind(target, frame);

    let result = prioritized_trajectory_test(target, launch_origin, initial_velocity, &params);

    checkpoint.restore(target);
    result
}

/// Critical volume alone first, then the remaining volumes with the same
/// geometry. A ray crossing both the head and a torso volume therefore
/// always classifies as critical.
fn prioritized_segment_test(target: &mut Character, start: Vec3, end: Vec3) -> RewindResult {
    target.set_volume_enabled(BodyPart::Head, true);
    if target.cast_enabled(start, end).is_some() {
        return RewindResult {
            confirmed: true,
            critical: true,
        };
    }

    target.set_all_volumes_enabled(true);
    if target.cast_enabled(start, end).is_some() {
        return RewindResult {
            confirmed: true,
            critical: false,
        };
    }

    RewindResult::default()
}

fn prioritized_trajectory_test(
    target: &mut Character,
    origin: Vec3,
    velocity: Vec3,
    params: &TrajectoryParams,
) -> RewindResult {
    target.set_volume_enabled(BodyPart::Head, true);
    if trajectory_blocks(target, origin, velocity, params) {
        return RewindResult {
            confirmed: true,
            critical: true,
        };
    }

    target.set_all_volumes_enabled(true);
    if trajectory_blocks(target, origin, velocity, params) {
        return RewindResult {
            confirmed: true,
            critical: false,
        };
    }

    RewindResult::default()
}

/// Step the ballistic arc and sweep each step against the target's enabled
/// volumes.
fn trajectory_blocks(
    target: &Character,
    origin: Vec3,
    velocity: Vec3,
    params: &TrajectoryParams,
) -> bool {
    let dt = 1.0 / params.sim_hz;
    let gravity = Vec3::new(0.0, 0.0, params.gravity);

    let mut t = 0.0f32;
    let mut prev = origin;
    while t < params.max_sim_time {
        let step_t = (t + dt).min(params.max_sim_time);
        let next = origin + velocity * step_t + 0.5 * gravity * step_t * step_t;
        if target
            .cast_enabled_swept(prev, next, params.radius)
            .is_some()
        {
            return true;
        }
        prev = next;
        t = step_t;
    }
    false
}

/// Validate a multi-pellet claim over a set of rewound targets.
///
/// Two passes rather than one: hit volumes physically overlap (the head
/// box sits inside the upper-torso bounds), so a single pass keyed on
/// "first blocking hit" would make critical/body classification depend on
/// query order. Pass A tests every pellet against critical volumes only;
/// pass B disables the critical volumes and re-runs the same pellets
/// against the rest, skipping any pellet that already scored a critical on
/// that target. No pellet can count twice for one target.
pub fn confirm_shotgun(
    roster: &mut Roster,
    frames: &[(CharacterId, FrameSnapshot)],
    trace_start: Vec3,
    hit_locations: &[Vec3],
) -> ShotgunRewindResult {
    let mut result = ShotgunRewindResult::default();

    // Save, rewind and gate every target independently.
    let mut checkpoints: Vec<(CharacterId, PoseCheckpoint)> = Vec::with_capacity(frames.len());
    for (id, frame) in frames {
        let Some(target) = roster.get_mut(*id) else {
            continue;
        };
        checkpoints.push((*id, begin_rewind(target, frame)));
    }
    let rewound: HashSet<CharacterId> = checkpoints.iter().map(|(id, _)| *id).collect();

    // Pass A: critical volumes only. Remember which pellet scored on whom
    // so pass B cannot count the same pellet twice for one target.
    let mut critical_by_pellet: Vec<Option<CharacterId>> = vec![None; hit_locations.len()];
    for (id, _) in &checkpoints {
        if let Some(target) = roster.get_mut(*id) {
            target.set_volume_enabled(BodyPart::Head, true);
        }
    }
    for (pellet, hit_location) in hit_locations.iter().enumerate() {
        let trace_end = trace_start + (*hit_location - trace_start) * TRACE_EXTENSION;
        if let Some(hit) = roster.cast_enabled(trace_start, trace_end) {
            if rewound.contains(&hit.character) && hit.part.is_critical() {
                result.hits.entry(hit.character).or_default().critical_hits += 1;
                critical_by_pellet[pellet] = Some(hit.character);
            }
        }
    }

    // Pass B: general volumes only.
    for (id, _) in &checkpoints {
        if let Some(target) = roster.get_mut(*id) {
            target.set_all_volumes_enabled(true);
            target.set_volume_enabled(BodyPart::Head, false);
        }
    }
    for (pellet, hit_location) in hit_locations.iter().enumerate() {
        let trace_end = trace_start + (*hit_location - trace_start) * TRACE_EXTENSION;
        if let Some(hit) = roster.cast_enabled(trace_start, trace_end) {
            if critical_by_pellet[pellet] == Some(hit.character) {
                continue;
            }
            if rewound.contains(&hit.character) && !hit.part.is_critical() {
                result.hits.entry(hit.character).or_default().body_hits += 1;
            }
        }
    }

    // Restore every target's saved transforms and collision state.
    for (id, checkpoint) in checkpoints {
        if let Some(target) = roster.get_mut(id) {
            checkpoint.restore(target);
        }
    }

    result
}
