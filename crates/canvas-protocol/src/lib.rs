// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Wire protocol for the collaborative canvas edit engine.
//!
//! This crate owns everything specific to the JSON-over-CBOR wire shape:
//! the mutation envelope, the typed params for every catalog command, the
//! control-message family, and CBOR framing. `canvas-pipeline`/`canvas-sync`
//! work with `Box<dyn canvas_commands::Command>` and never see `Value` or
//! CBOR bytes directly.
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

mod envelope;
mod message;
mod op;

/// Length-prefixed CBOR framing for [`Message`] values over a byte stream.
pub mod wire;

pub use envelope::{OpEnvelope, OpId, WireOrigin};
pub use message::Message;
pub use op::{decode_command, ProtocolError};
