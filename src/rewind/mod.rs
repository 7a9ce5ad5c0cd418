//! Server-side rewind: validates client hit claims against a
//! reconstruction of the target's past hit-volume geometry instead of its
//! current geometry, compensating for network round-trip latency.
//!
//! Every simulation tick the host records each character's hit-volume
//! transforms ([`history`]). When a claim arrives, the claimed fire time is
//! adjusted for one-way latency ([`score`]), the matching snapshot is
//! reconstructed ([`locate`]), and the target is temporarily posed into it
//! for a prioritized geometry test before being restored ([`confirm`]).

pub mod confirm;
pub mod history;
pub mod locate;
pub mod score;

pub use confirm::{PelletCounts, PoseCheckpoint, RewindResult, ShotgunRewindResult};
pub use history::{BoxPose, FrameHistory, FrameSnapshot};
pub use locate::{frame_at, RewindError};

/// Claimed impact traces are extended past the claimed point to absorb
/// reconstruction slop.
pub const TRACE_EXTENSION: f32 = 1.25;

/// Projectile path simulation frequency (steps per second)
pub const PROJECTILE_SIM_HZ: f32 = 15.0;

/// Projectile collision radius (world units)
pub const PROJECTILE_RADIUS: f32 = 0.05;

/// Vertical acceleration applied to simulated projectile paths
pub const GRAVITY: f32 = -9.8;
