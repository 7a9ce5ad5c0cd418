//! Per-tick recording of hit-volume transforms into bounded histories

use std::collections::HashMap;
use std::collections::VecDeque;

use glam::{Quat, Vec3};

use crate::character::{BodyPart, Character, Roster};

/// Recorded transform of one hit volume
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoxPose {
    pub center: Vec3,
    pub rotation: Quat,
    pub half_extents: Vec3,
}

/// Timestamped capture of one character's complete hit-volume set.
/// Immutable once recorded; the volume set equals the owner's fixed set.
#[derive(Debug, Clone)]
pub struct FrameSnapshot {
    /// Host-clock seconds
    pub time: f32,
    pub volumes: HashMap<BodyPart, BoxPose>,
}

impl FrameSnapshot {
    /// Capture the character's current hit-volume transforms
    pub fn capture(character: &Character, time: f32) -> Self {
        let mut volumes = HashMap::with_capacity(BodyPart::ALL.len());
        for volume in character.volumes() {
            volumes.insert(
                volume.part,
                BoxPose {
                    center: volume.center,
                    rotation: volume.rotation,
                    half_extents: volume.half_extents,
                },
            );
        }
        Self { time, volumes }
    }
}

/// Bounded, time-ordered frame history with the newest frame at the head.
/// Invariants: timestamps strictly decrease head to tail; the covered span
/// stays within the configured window, except that at least two frames are
/// always retained once recorded.
#[derive(Debug, Clone, Default)]
pub struct FrameHistory {
    frames: VecDeque<FrameSnapshot>,
}

impl FrameHistory {
    pub fn new() -> Self {
        Self {
            frames: VecDeque::new(),
        }
    }

    pub fn newest(&self) -> Option<&FrameSnapshot> {
        self.frames.front()
    }

    pub fn oldest(&self) -> Option<&FrameSnapshot> {
        self.frames.back()
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Seconds covered between the oldest and newest frame
    pub fn span(&self) -> f32 {
        match (self.frames.front(), self.frames.back()) {
            (Some(newest), Some(oldest)) => newest.time - oldest.time,
            _ => 0.0,
        }
    }

    /// Push a frame at the head, then prune the tail while the span exceeds
    /// `window`. Frames must arrive in increasing time order; an
    /// out-of-order frame is dropped.
    pub fn record(&mut self, frame: FrameSnapshot, window: f32) {
        if let Some(newest) = self.frames.front() {
            if frame.time <= newest.time {
                return;
            }
        }
        self.frames.push_front(frame);
        while self.span() > window && self.frames.len() > 2 {
            self.frames.pop_back();
        }
    }

    /// Iterate newest to oldest
    pub fn iter(&self) -> impl Iterator<Item = &FrameSnapshot> {
        self.frames.iter()
    }
}

/// Record the current tick for every character the host simulates. Runs
/// only on the authoritative host, after the tick's pose updates have been
/// applied and before any claim is processed.
pub fn record_roster(roster: &mut Roster, now: f32, window: f32) {
    for character in roster.iter_mut() {
        let frame = FrameSnapshot::capture(character, now);
        character.history.record(frame, window);
    }
}
