// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! The `Command` contract and shared plumbing every command type implements.

use canvas_scene::{Node, NodeId, SceneError, SceneGraph};
use thiserror::Error;

/// Where a command originated, controlling optimistic-apply semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// Issued by the local user; optimistic apply rules decide whether
    /// `execute` runs before the server round-trip.
    Local,
    /// Arrived via server broadcast (another peer's change).
    Remote,
    /// Applied by an embedded/authoritative layer (tests, single-player).
    Server,
}

/// Precondition failure from [`Command::validate`]. Never mutates state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct ValidationError(pub String);

impl ValidationError {
    /// Construct from any displayable message.
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

/// Failure from [`Command::execute`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    /// Referenced node does not exist. Multi-node commands treat this as
    /// partial failure (continue with the rest); single-node commands fail
    /// outright.
    #[error("node not found: {0}")]
    NodeNotFound(NodeId),
    /// Node exists but is the wrong variant for this command.
    #[error("invalid node type for {command}: {id}")]
    InvalidType {
        /// Command type name.
        command: &'static str,
        /// Offending node id.
        id: NodeId,
    },
    /// Precondition failed at execute time (should have been caught by
    /// `validate`; kept distinct so pipeline error classification is exact).
    #[error("{0}")]
    Validation(String),
}

impl From<SceneError> for CommandError {
    fn from(e: SceneError) -> Self {
        match e {
            SceneError::NodeNotFound(id) => CommandError::NodeNotFound(id),
            SceneError::DuplicateId(id) => CommandError::InvalidType {
                command: "scene",
                id,
            },
        }
    }
}

/// Snapshot of node fields captured by `UndoManager::begin_interaction`,
/// consulted by the first intermediate command in an interaction instead of
/// a later, already-mutated value.
#[derive(Debug, Clone, Default)]
pub struct InteractionSnapshot {
    /// Pre-interaction positions, keyed by node id.
    pub positions: std::collections::BTreeMap<NodeId, [f64; 2]>,
    /// Pre-interaction sizes, keyed by node id.
    pub sizes: std::collections::BTreeMap<NodeId, [f64; 2]>,
    /// Pre-interaction rotations, keyed by node id.
    pub rotations: std::collections::BTreeMap<NodeId, f64>,
}

/// Mutable execution context handed to every command.
pub struct CommandContext<'a> {
    /// The scene graph being mutated.
    pub graph: &'a mut SceneGraph,
    /// Origin of the command currently executing.
    pub origin: Origin,
    /// `true` while an alignment animation is actively driving node
    /// positions; `node_align` skips writing targets in this state so it
    /// doesn't fight the animator.
    pub alignment_animating: bool,
}

impl<'a> CommandContext<'a> {
    /// Construct a context over `graph` for a command with the given origin.
    pub fn new(graph: &'a mut SceneGraph, origin: Origin) -> Self {
        Self {
            graph,
            origin,
            alignment_animating: false,
        }
    }

    /// Fetch a node or map to [`CommandError::NodeNotFound`].
    pub fn require(&self, id: &NodeId) -> Result<&Node, CommandError> {
        self.graph
            .get(id)
            .ok_or_else(|| CommandError::NodeNotFound(id.clone()))
    }

    /// Fetch a node mutably or map to [`CommandError::NodeNotFound`].
    pub fn require_mut(&mut self, id: &NodeId) -> Result<&mut Node, CommandError> {
        self.graph
            .get_mut(id)
            .ok_or_else(|| CommandError::NodeNotFound(id.clone()))
    }
}

/// A function that reports whether a content hash is available through the
/// server or the local media cache — used by undo-payload media
/// optimization without this crate depending on `canvas-media` directly.
pub type MediaResidencyCheck<'a> = &'a dyn Fn(&str) -> bool;

/// Threshold above which an oversized undo payload has its `data:` URL
/// dropped and is marked `_stripped`.
pub const LARGE_UNDO_PAYLOAD_BYTES: usize = 100 * 1024;

/// The command contract every mutating action implements.
///
/// `validate` is a pure precondition check, `prepare_undo` captures enough
/// state to invert the
/// operation (consulting an interaction's frozen `initial_state` when one is
/// active), `execute`/`undo` apply and invert the change, and
/// `can_merge_with`/`merge_with` let rapid repeated input coalesce into one
/// undo entry.
pub trait Command: std::fmt::Debug {
    /// Wire/catalog type name (e.g. `"node_move"`).
    fn command_type(&self) -> &'static str;

    /// Pure precondition check; must not mutate state.
    fn validate(&self, ctx: &CommandContext<'_>) -> Result<(), ValidationError>;

    /// Capture undo state. `initial_state`, when `Some`, is the snapshot
    /// taken at `UndoManager::begin_interaction` and takes precedence over
    /// reading current graph state.
    fn prepare_undo(
        &mut self,
        ctx: &CommandContext<'_>,
        initial_state: Option<&InteractionSnapshot>,
        media_resident: MediaResidencyCheck<'_>,
    );

    /// Apply the change. Best-effort on multi-node commands: a missing node
    /// is logged and skipped rather than aborting the whole batch.
    fn execute(&mut self, ctx: &mut CommandContext<'_>) -> Result<(), CommandError>;

    /// Invert the change from previously captured undo data. Idempotent
    /// against missing nodes — never panics, never propagates an error.
    fn undo(&mut self, ctx: &mut CommandContext<'_>);

    /// `true` if `other` (the next command dispatched) could be folded into
    /// this one instead of becoming a separate undo entry.
    fn can_merge_with(&self, _other: &dyn Command) -> bool {
        false
    }

    /// Fold `other` into `self`. Only called when `can_merge_with` just
    /// returned `true` for the same pair; implementations downcast via
    /// [`Command::as_any`].
    fn merge_with(&mut self, _other: Box<dyn Command>) {}

    /// Downcast support for `can_merge_with`/`merge_with` implementations.
    fn as_any(&self) -> &dyn std::any::Any;

    /// Mutable downcast support.
    fn as_any_mut(&mut self) -> &mut dyn std::any::Any;
}
