// src/model/mod.rs

//! Pack data model
//!
//! This module defines the schemas persisted on disk and fetched from remote
//! sources:
//! - File source descriptors (plain URL or GitHub ref)
//! - Pack manifests (remote-owned) and pack configs (local-owned)
//! - Sticker and grid render parameters in declared/resolved form
//! - The hub catalog and checksum map formats

pub mod config;
pub mod manifest;
pub mod params;
pub mod source;

pub use config::{merge_config, MergedConfig, PackConfig};
pub use manifest::{
    parse_checksum_map, parse_config, parse_hub_manifest, parse_manifest, ChecksumMap,
    ExternalFont, HubManifest, HubPackInfo, PackManifest, ResolvedSticker, SampleStickerRef,
    StickerInfo,
};
pub use params::{
    resolve_sticker_params, Background, FontStyle, GapSpec, PaddingSpec, PartialStickerGridParams,
    PartialStickerParams, RgbaColor, StickerGridParams, StickerGridSettings, StickerParams,
    TextAlign,
};
pub use source::{default_hub_source, FileSource, GitHubRef};

/// Pack manifest filename; also the hub catalog filename under the hub source
pub const MANIFEST_FILENAME: &str = "manifest.json";

/// Local pack config filename
pub const CONFIG_FILENAME: &str = "config.json";

/// Remote checksum map filename
pub const CHECKSUM_FILENAME: &str = "checksum.json";

/// Crash marker: its presence (not content) flags an update in progress
pub const UPDATING_MARKER_FILENAME: &str = ".updating";

/// serde `skip_serializing_if` helper: omit fields still at their default
pub(crate) fn is_default<T: Default + PartialEq>(value: &T) -> bool {
    *value == T::default()
}

/// serde `skip_serializing_if` helper for plain boolean flags
pub(crate) fn is_false(value: &bool) -> bool {
    !*value
}
