// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Ambient application services shared by every `canvas-*` crate:
//! explicit-clock cooldowns, JSON config storage, the top-level error
//! taxonomy, and a notification queue for surfaced transport/upload
//! failures.
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

/// Explicit-clock cooldown windows for rate-limiting repeated actions.
pub mod clock;
/// JSON-backed tunable configuration storage and the canvas tunable set.
pub mod config;
/// Top-level error taxonomy shared across the workspace.
pub mod error;
/// Filesystem-backed [`config::ConfigStore`] for non-browser embedders.
pub mod fs_store;
/// TTL/dedupe notice queue for user-facing transport and upload failures.
pub mod notify;

pub use clock::Cooldown;
pub use config::{CanvasConfig, ConfigError, ConfigService, ConfigStore};
pub use error::CanvasError;
pub use fs_store::FsConfigStore;
pub use notify::{NoticeId, NoticeKind, NoticeView, NotificationService};
