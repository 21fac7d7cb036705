// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Ordered node scene graph for the collaborative canvas edit engine.
//!
//! This crate owns the data model: polymorphic nodes keyed by id, z-order,
//! group membership by id (never by reference), and the
//! non-enumerable graph back-pointer. It has no opinion on commands,
//! networking, or undo — those live in sibling `canvas-*` crates.
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

mod graph;
mod ids;
mod node;

pub use graph::{SceneError, SceneEvent, SceneGraph, SceneObserver};
pub use ids::{GraphId, IdMinter, NodeId};
pub use node::{
    GroupFields, GroupStyle, ImageFields, LoadingState, Node, NodeBase, NodeVariant,
    PropertyValue, TextFields, VideoFields,
};
