// src/lib.rs

//! Stickerbox Pack Manager
//!
//! Sticker pack manager with hub discovery, checksum-diffed updates, and
//! crash-safe markers.
//!
//! # Architecture
//!
//! - Directory-first: every pack is a directory holding its manifest and a
//!   local config, rescanned rather than cached
//! - Merged config: manifest defaults overlaid field-by-field with the
//!   local config, local always winning
//! - Checksum diffs: updates transfer only files whose SHA-256 differs,
//!   staged and moved into place after all downloads succeed
//! - Crash markers: a `.updating` file quarantines half-written packs
//!   until an explicit recovery reload

mod error;
pub mod fetch;
pub mod hub;
pub mod manager;
pub mod model;
pub mod op;
pub mod pack;
pub mod update;

pub use error::{Error, Result};
