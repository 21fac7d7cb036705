// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Tuning constants for the spring-physics alignment engine.

use std::time::Duration;

/// Spring stiffness for normal-scale interactions. Higher snaps faster but
/// overshoots more before settling.
pub const SPRING_K: f64 = 220.0;

/// Spring damping for normal-scale interactions. Tuned against `SPRING_K`
/// to stay just under critical damping, so motion still has a little give.
pub const SPRING_D: f64 = 26.0;

/// Relaxed stiffness used once the interaction's node count reaches
/// [`LARGE_SCALE_THRESHOLD`]. Softer springs settle in fewer visually
/// distinct steps, cutting the number of frames that must process every
/// node in the batch.
pub const SPRING_K_LARGE: f64 = 140.0;

/// Relaxed damping paired with [`SPRING_K_LARGE`].
pub const SPRING_D_LARGE: f64 = 22.0;

/// Default gap, in scene units, between consecutive nodes on a linear
/// alignment line or between grid cells.
pub const DEFAULT_MARGIN: f64 = 24.0;

/// Distance, in scene units, within which nodes are considered already
/// aligned on an axis — arming reorder mode instead of a fresh commit.
pub const TOLERANCE: f64 = 2.0;

/// Pointer-travel distance, in scene units, a drag must cross before the
/// engine commits to an axis (or reverses the master order in reorder
/// mode).
pub const ANIMATION_THRESHOLD: f64 = 12.0;

/// Node count at or above which an interaction switches to relaxed spring
/// constants and batched per-tick processing.
pub const LARGE_SCALE_THRESHOLD: usize = 64;

/// Maximum number of springs advanced in a single [`crate::AlignmentEngine::tick`]
/// call once an interaction is at large scale. Sized so a batch's physics
/// work comfortably fits [`FRAME_BUDGET_MS`] on reference hardware; the
/// engine does not measure wall-clock time mid-tick to re-derive this, it
/// simply honors the precomputed cap.
pub const MAX_ANIMATION_BATCH_SIZE: usize = 200;

/// Advisory per-frame time budget the batch size above was chosen against.
pub const FRAME_BUDGET_MS: u64 = 8;

/// Fixed physics timestep: 60 Hz.
pub const FIXED_DT: Duration = Duration::from_nanos(1_000_000_000 / 60);

/// Hard cap on substeps integrated from one `tick` call, so a stalled
/// caller (debugger pause, backgrounded tab) can't make the engine spin
/// through an unbounded catch-up on resume.
pub const MAX_SUBSTEPS: u32 = 4;

/// Multiplier applied to the incoming wall-clock delta before it's added to
/// the fixed-step accumulator; `1.0` is real-time.
pub const TIME_SCALE: f64 = 1.0;

/// Padding, in scene units, added around a group's children when deriving
/// the group's own animated target bounds.
pub const GROUP_PADDING: f64 = 12.0;

/// Extra vertical space reserved above a group's children for its title
/// bar when deriving the group's animated target bounds.
pub const GROUP_TITLE_BAR_HEIGHT: f64 = 28.0;

/// Settle threshold used once an interaction is at large scale, paired with
/// [`SPRING_K_LARGE`]/[`SPRING_D_LARGE`]. Looser than
/// [`crate::spring::DEFAULT_SETTLE_THRESHOLD`] so a softer spring still
/// reports "done" in a comparable number of frames.
pub const LARGE_SETTLE_THRESHOLD: f64 = ANIMATION_THRESHOLD / 4.0;
