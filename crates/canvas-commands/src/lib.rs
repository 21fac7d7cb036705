// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Typed command catalog for the collaborative canvas edit engine.
//!
//! Every mutating action is a [`Command`] implementation dispatched by the
//! node's variant tag. This crate has no opinion on
//! networking or persistence; `canvas-pipeline` sequences `validate` →
//! `execute` → undo-stack push, `canvas-sync` decides when a `Command` with
//! `Origin::Remote` gets applied at all.
#![deny(missing_docs, rust_2018_idioms, unused_must_use)]
#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    clippy::cargo,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::dbg_macro,
    clippy::print_stdout,
    clippy::print_stderr
)]
#![allow(
    clippy::must_use_candidate,
    clippy::return_self_not_must_use,
    clippy::unreadable_literal,
    clippy::missing_const_for_fn,
    clippy::module_name_repetitions,
    clippy::use_self,
    clippy::similar_names,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

mod catalog;
mod group;
mod image;
mod node_align;
mod node_lifecycle;
mod node_properties;
mod node_transform;
mod video;

pub use catalog::{
    Command, CommandContext, CommandError, InteractionSnapshot, MediaResidencyCheck, Origin,
    ValidationError, LARGE_UNDO_PAYLOAD_BYTES,
};
pub use group::{
    GroupAddNode, GroupCreate, GroupMove, GroupRemoveNode, GroupResize, GroupToggleCollapsed,
    GroupUpdateStyle,
};
pub use image::ImageUploadComplete;
pub use node_align::{AlignAxis, AlignNode};
pub use node_lifecycle::{
    CreateNode, CreateNodeParams, DeleteNode, DuplicateNode, DuplicateSource, PasteNode,
    UndoPayload,
};
pub use node_properties::{
    BatchPropertyUpdate, LayerDirection, LayerOrder, PropertyTarget, PropertyUpdate,
    PropertyUpdateEntry,
};
pub use node_transform::{MoveNode, ResetNode, ResizeNode, RotateNode};
pub use video::VideoToggle;
