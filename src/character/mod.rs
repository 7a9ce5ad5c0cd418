//! Simulated characters and their hit-volume rigs

use std::collections::HashMap;

use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::geom::Obb;
use crate::rewind::history::FrameHistory;
use crate::util::time::unix_millis;

pub type CharacterId = Uuid;

/// Character maximum health
pub const MAX_HEALTH: f32 = 100.0;

/// Body parts backing a character's fixed hit-volume set. The set never
/// changes for the lifetime of the character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BodyPart {
    Head,
    Pelvis,
    SpineLower,
    SpineUpper,
    UpperArmL,
    UpperArmR,
    LowerArmL,
    LowerArmR,
    HandL,
    HandR,
    Backpack,
    ThighL,
    ThighR,
    CalfL,
    CalfR,
    FootL,
    FootR,
}

impl BodyPart {
    pub const ALL: [BodyPart; 17] = [
        BodyPart::Head,
        BodyPart::Pelvis,
        BodyPart::SpineLower,
        BodyPart::SpineUpper,
        BodyPart::UpperArmL,
        BodyPart::UpperArmR,
        BodyPart::LowerArmL,
        BodyPart::LowerArmR,
        BodyPart::HandL,
        BodyPart::HandR,
        BodyPart::Backpack,
        BodyPart::ThighL,
        BodyPart::ThighR,
        BodyPart::CalfL,
        BodyPart::CalfR,
        BodyPart::FootL,
        BodyPart::FootR,
    ];

    /// The critical volume is tested with priority and yields bonus damage
    pub fn is_critical(self) -> bool {
        matches!(self, BodyPart::Head)
    }

    pub fn name(self) -> &'static str {
        match self {
            BodyPart::Head => "head",
            BodyPart::Pelvis => "pelvis",
            BodyPart::SpineLower => "spine_lower",
            BodyPart::SpineUpper => "spine_upper",
            BodyPart::UpperArmL => "upperarm_l",
            BodyPart::UpperArmR => "upperarm_r",
            BodyPart::LowerArmL => "lowerarm_l",
            BodyPart::LowerArmR => "lowerarm_r",
            BodyPart::HandL => "hand_l",
            BodyPart::HandR => "hand_r",
            BodyPart::Backpack => "backpack",
            BodyPart::ThighL => "thigh_l",
            BodyPart::ThighR => "thigh_r",
            BodyPart::CalfL => "calf_l",
            BodyPart::CalfR => "calf_r",
            BodyPart::FootL => "foot_l",
            BodyPart::FootR => "foot_r",
        }
    }
}

/// One named oriented box approximating a body part's collision surface.
/// Volumes rest with queries disabled; they are only enabled inside a
/// rewound hit test.
#[derive(Debug, Clone)]
pub struct HitVolume {
    pub part: BodyPart,
    /// Rig-space offset from the character origin
    local_offset: Vec3,
    pub center: Vec3,
    pub rotation: Quat,
    pub half_extents: Vec3,
    /// Whether geometry queries may block against this volume
    pub enabled: bool,
}

impl HitVolume {
    pub fn obb(&self) -> Obb {
        Obb::new(self.center, self.rotation, self.half_extents)
    }
}

/// Humanoid rig: (part, offset from character origin, half-extents), in
/// world units, Z up. The head box deliberately overlaps the upper spine
/// box; classification of shots in the overlap is resolved by test order,
/// never by which volume happens to come first in a map walk.
const HUMANOID_RIG: [(BodyPart, [f32; 3], [f32; 3]); 17] = [
    (BodyPart::Head, [0.0, 0.0, 1.62], [0.10, 0.12, 0.14]),
    (BodyPart::Pelvis, [0.0, 0.0, 0.95], [0.17, 0.14, 0.12]),
    (BodyPart::SpineLower, [0.0, 0.0, 1.15], [0.16, 0.13, 0.12]),
    (BodyPart::SpineUpper, [0.0, 0.0, 1.42], [0.17, 0.14, 0.16]),
    (BodyPart::UpperArmL, [0.28, 0.0, 1.35], [0.06, 0.06, 0.14]),
    (BodyPart::UpperArmR, [-0.28, 0.0, 1.35], [0.06, 0.06, 0.14]),
    (BodyPart::LowerArmL, [0.30, 0.0, 1.05], [0.05, 0.05, 0.13]),
    (BodyPart::LowerArmR, [-0.30, 0.0, 1.05], [0.05, 0.05, 0.13]),
    (BodyPart::HandL, [0.30, 0.04, 0.86], [0.04, 0.09, 0.05]),
    (BodyPart::HandR, [-0.30, 0.04, 0.86], [0.04, 0.09, 0.05]),
    (BodyPart::Backpack, [0.0, -0.24, 1.30], [0.15, 0.09, 0.20]),
    (BodyPart::ThighL, [0.10, 0.0, 0.68], [0.08, 0.08, 0.18]),
    (BodyPart::ThighR, [-0.10, 0.0, 0.68], [0.08, 0.08, 0.18]),
    (BodyPart::CalfL, [0.10, 0.0, 0.32], [0.06, 0.06, 0.16]),
    (BodyPart::CalfR, [-0.10, 0.0, 0.32], [0.06, 0.06, 0.16]),
    (BodyPart::FootL, [0.10, 0.06, 0.06], [0.05, 0.12, 0.06]),
    (BodyPart::FootR, [-0.10, 0.06, 0.06], [0.05, 0.12, 0.06]),
];

/// A character simulated by the authoritative host
#[derive(Debug, Clone)]
pub struct Character {
    pub id: CharacterId,
    pub display_name: String,

    // World pose, fed by the external movement system
    pub position: Vec3,
    pub yaw: f32,

    // Combat
    pub health: f32,
    pub alive: bool,

    /// Fixed hit-volume set, world-space transforms
    volumes: HashMap<BodyPart, HitVolume>,
    /// Primary body (render/physics mesh) collision gate
    pub body_collision: bool,

    /// Recorded hit-volume history for rewound hit validation
    pub history: FrameHistory,

    // Stats
    pub kills: u32,
    pub damage_dealt: f32,
    pub damage_taken: f32,
    pub spawn_time: u64,
    pub death_time: Option<u64>,
}

impl Character {
    pub fn spawn(id: CharacterId, display_name: String, position: Vec3, yaw: f32) -> Self {
        let mut volumes = HashMap::with_capacity(HUMANOID_RIG.len());
        for (part, offset, half_extents) in HUMANOID_RIG {
            volumes.insert(
                part,
                HitVolume {
                    part,
                    local_offset: Vec3::from_array(offset),
                    center: Vec3::from_array(offset),
                    rotation: Quat::IDENTITY,
                    half_extents: Vec3::from_array(half_extents),
                    enabled: false,
                },
            );
        }

        let mut character = Self {
            id,
            display_name,
            position,
            yaw,
            health: MAX_HEALTH,
            alive: true,
            volumes,
            body_collision: true,
            history: FrameHistory::new(),
            kills: 0,
            damage_dealt: 0.0,
            damage_taken: 0.0,
            spawn_time: unix_millis(),
            death_time: None,
        };
        character.set_pose(position, yaw);
        character
    }

    /// Update the world pose and recompute every hit volume's transform
    /// from the rig. Half-extents are left untouched.
    pub fn set_pose(&mut self, position: Vec3, yaw: f32) {
        self.position = position;
        self.yaw = yaw;
        let rotation = Quat::from_rotation_z(yaw);
        for volume in self.volumes.values_mut() {
            volume.center = position + rotation * volume.local_offset;
            volume.rotation = rotation;
        }
    }

    pub fn volume(&self, part: BodyPart) -> Option<&HitVolume> {
        self.volumes.get(&part)
    }

    pub fn volume_mut(&mut self, part: BodyPart) -> Option<&mut HitVolume> {
        self.volumes.get_mut(&part)
    }

    pub fn volumes(&self) -> impl Iterator<Item = &HitVolume> {
        self.volumes.values()
    }

    pub fn volumes_mut(&mut self) -> impl Iterator<Item = &mut HitVolume> {
        self.volumes.values_mut()
    }

    pub fn set_volume_enabled(&mut self, part: BodyPart, enabled: bool) {
        if let Some(volume) = self.volumes.get_mut(&part) {
            volume.enabled = enabled;
        }
    }

    pub fn set_all_volumes_enabled(&mut self, enabled: bool) {
        for volume in self.volumes.values_mut() {
            volume.enabled = enabled;
        }
    }

    /// Nearest blocking hit among this character's enabled volumes
    pub fn cast_enabled(&self, start: Vec3, end: Vec3) -> Option<(BodyPart, f32)> {
        self.cast_enabled_swept(start, end, 0.0)
    }

    /// Same as [`cast_enabled`](Self::cast_enabled) with every volume grown
    /// by `radius` (swept-sphere approximation for projectiles)
    pub fn cast_enabled_swept(&self, start: Vec3, end: Vec3, radius: f32) -> Option<(BodyPart, f32)> {
        let mut nearest: Option<(BodyPart, f32)> = None;
        for volume in self.volumes.values() {
            if !volume.enabled {
                continue;
            }
            let obb = if radius > 0.0 {
                volume.obb().expanded(radius)
            } else {
                volume.obb()
            };
            if let Some(fraction) = obb.intersect_segment(start, end) {
                if nearest.map_or(true, |(_, best)| fraction < best) {
                    nearest = Some((volume.part, fraction));
                }
            }
        }
        nearest
    }
}

/// Nearest blocking hit across a roster-wide geometry query
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SceneHit {
    pub character: CharacterId,
    pub part: BodyPart,
    pub fraction: f32,
}

/// All characters simulated by one session host
#[derive(Debug, Default)]
pub struct Roster {
    characters: HashMap<CharacterId, Character>,
}

impl Roster {
    pub fn new() -> Self {
        Self {
            characters: HashMap::new(),
        }
    }

    pub fn insert(&mut self, character: Character) {
        self.characters.insert(character.id, character);
    }

    pub fn remove(&mut self, id: CharacterId) -> Option<Character> {
        self.characters.remove(&id)
    }

    pub fn get(&self, id: CharacterId) -> Option<&Character> {
        self.characters.get(&id)
    }

    pub fn get_mut(&mut self, id: CharacterId) -> Option<&mut Character> {
        self.characters.get_mut(&id)
    }

    pub fn contains(&self, id: CharacterId) -> bool {
        self.characters.contains_key(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Character> {
        self.characters.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Character> {
        self.characters.values_mut()
    }

    pub fn len(&self) -> usize {
        self.characters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.characters.is_empty()
    }

    /// Nearest blocking hit among the enabled volumes of every character
    pub fn cast_enabled(&self, start: Vec3, end: Vec3) -> Option<SceneHit> {
        let mut nearest: Option<SceneHit> = None;
        for character in self.characters.values() {
            if let Some((part, fraction)) = character.cast_enabled(start, end) {
                if nearest.map_or(true, |best| fraction < best.fraction) {
                    nearest = Some(SceneHit {
                        character: character.id,
                        part,
                        fraction,
                    });
                }
            }
        }
        nearest
    }
}
