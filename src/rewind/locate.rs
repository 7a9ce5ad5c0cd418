//! Frame location: reconstructing hit volumes at a requested past instant

use std::collections::HashMap;

use thiserror::Error;

use super::history::{BoxPose, FrameHistory, FrameSnapshot};

/// Why a requested instant could not be reconstructed. Consumed internally
/// as an unconfirmed outcome; never surfaced to the claiming client.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum RewindError {
    /// No frames recorded yet (target just spawned)
    #[error("no recorded frames for target")]
    EmptyHistory,

    /// Requested instant predates the retained history
    #[error("requested time {requested} is too old to rewind")]
    TooOld { requested: f32 },
}

/// Best-available snapshot of `history` at time `t`.
///
/// - `t` below the oldest frame fails unless exactly equal.
/// - `t` at or beyond the newest frame returns the newest frame verbatim:
///   a shooter with no measurable latency is validated against the
///   current-most recorded state, never extrapolated.
/// - An exact timestamp match wins over interpolation.
/// - Otherwise the bracketing pair is blended.
pub fn frame_at(history: &FrameHistory, t: f32) -> Result<FrameSnapshot, RewindError> {
    let newest = history.newest().ok_or(RewindError::EmptyHistory)?;
    let oldest = history.oldest().ok_or(RewindError::EmptyHistory)?;

    if t < oldest.time {
        return Err(RewindError::TooOld { requested: t });
    }
    if t == oldest.time {
        return Ok(oldest.clone());
    }
    if t >= newest.time {
        return Ok(newest.clone());
    }

    // Scan newest to oldest for the bracketing pair.
    let mut younger = newest;
    for frame in history.iter() {
        if frame.time == t {
            return Ok(frame.clone());
        }
        if frame.time < t {
            return Ok(interpolate(frame, younger, t));
        }
        younger = frame;
    }

    // Unreachable given the boundary checks above.
    Ok(oldest.clone())
}

/// Linear blend between two recorded frames: centers lerp, orientations
/// slerp, half-extents come from the younger frame (extents do not change
/// within one tick).
fn interpolate(older: &FrameSnapshot, younger: &FrameSnapshot, t: f32) -> FrameSnapshot {
    let distance = younger.time - older.time;
    let fraction = ((t - older.time) / distance).clamp(0.0, 1.0);

    let mut volumes = HashMap::with_capacity(younger.volumes.len());
    for (part, younger_box) in &younger.volumes {
        // A name missing from one bracket would break the fixed-set
        // invariant; skip the volume rather than fail the reconstruction.
        let Some(older_box) = older.volumes.get(part) else {
            continue;
        };
        volumes.insert(
            *part,
            BoxPose {
                center: older_box.center.lerp(younger_box.center, fraction),
                rotation: older_box.rotation.slerp(younger_box.rotation, fraction),
                half_extents: younger_box.half_extents,
            },
        );
    }

    FrameSnapshot { time: t, volumes }
}
