// src/model/manifest.rs

//! Pack manifests, the hub catalog, and checksum maps
//!
//! The manifest is remote-owned: it is re-fetched on every update and fully
//! validated on parse. Validation resolves every sticker's parameters against
//! the pack defaults, and one unresolvable sticker rejects the whole manifest.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::error::{Error, Result};

use super::config::PackConfig;
use super::is_default;
use super::params::{
    resolve_sticker_params, Background, PartialStickerParams, StickerGridSettings, StickerParams,
};
use super::source::FileSource;

/// A font file the pack ships but cannot register itself; the operator must
/// install it into the OS
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalFont {
    pub path: String,
}

/// One sticker as declared in the manifest (params partial, merged over the
/// pack defaults at resolve time)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StickerInfo {
    pub name: String,
    pub category: String,
    #[serde(default, skip_serializing_if = "is_default")]
    pub params: PartialStickerParams,
}

/// One sticker with fully resolved parameters
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedSticker {
    pub name: String,
    pub category: String,
    pub params: StickerParams,
}

/// Which sticker demonstrates the pack: inline parameters, a sticker name,
/// or an index into the sticker list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SampleStickerRef {
    Inline(StickerInfo),
    Name(String),
    Index(usize),
}

/// Remote-owned description of a pack's content and defaults
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackManifest {
    /// Monotonically increasing pack version
    pub version: u32,
    pub name: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "is_default")]
    pub default_config: PackConfig,
    #[serde(default, skip_serializing_if = "is_default")]
    pub default_sticker_params: PartialStickerParams,
    #[serde(default, skip_serializing_if = "is_default")]
    pub sticker_grid: StickerGridSettings,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sample_sticker: Option<SampleStickerRef>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub external_fonts: Vec<ExternalFont>,
    pub stickers: Vec<StickerInfo>,
}

impl PackManifest {
    /// Resolve per-sticker overrides against this pack's defaults
    pub fn resolve_sticker_params(
        &self,
        overrides: &PartialStickerParams,
    ) -> Result<StickerParams> {
        resolve_sticker_params(&self.default_sticker_params, overrides)
    }

    /// Every sticker with fully resolved parameters, in declaration order
    pub fn resolved_stickers(&self) -> Result<Vec<ResolvedSticker>> {
        self.stickers
            .iter()
            .enumerate()
            .map(|(idx, sticker)| {
                let params = self.resolve_sticker_params(&sticker.params).map_err(|e| {
                    Error::ValidationError(format!(
                        "sticker {} (`{}`): {}",
                        idx, sticker.name, e
                    ))
                })?;
                Ok(ResolvedSticker {
                    name: sticker.name.clone(),
                    category: sticker.category.clone(),
                    params,
                })
            })
            .collect()
    }

    /// Find a sticker by name, or by index when the query is all digits
    pub fn find_sticker(&self, query: &str) -> Result<ResolvedSticker> {
        let resolved = self.resolved_stickers()?;
        if !query.is_empty() && query.chars().all(|c| c.is_ascii_digit()) {
            let idx: usize = query
                .parse()
                .map_err(|_| Error::ValidationError(format!("invalid sticker index `{}`", query)))?;
            return resolved.into_iter().nth(idx).ok_or_else(|| {
                Error::NotFoundError(format!("sticker index {} out of range", idx))
            });
        }
        resolved
            .into_iter()
            .find(|s| s.name == query)
            .ok_or_else(|| {
                Error::NotFoundError(format!("sticker `{}` not found in sticker list", query))
            })
    }

    /// Resolve the pack's sample sticker parameters, falling back to the
    /// first sticker when no sample is declared
    pub fn resolve_sample(&self) -> Result<StickerParams> {
        match &self.sample_sticker {
            None => {
                let resolved = self.resolved_stickers()?;
                resolved.into_iter().next().map(|s| s.params).ok_or_else(|| {
                    Error::ValidationError(
                        "manifest declares no stickers to sample".to_string(),
                    )
                })
            }
            Some(SampleStickerRef::Inline(info)) => self
                .resolve_sticker_params(&info.params)
                .map_err(|e| Error::ValidationError(format!("sample sticker: {}", e))),
            Some(SampleStickerRef::Name(name)) => Ok(self.find_sticker(name)?.params),
            Some(SampleStickerRef::Index(idx)) => {
                let resolved = self.resolved_stickers()?;
                resolved.into_iter().nth(*idx).map(|s| s.params).ok_or_else(|| {
                    Error::NotFoundError(format!("sample sticker index {} out of range", idx))
                })
            }
        }
    }

    /// Every resource path this manifest references: external fonts, the
    /// default base image, grid background images, and per-sticker base
    /// images. These are the files an update synchronizes.
    pub fn resource_files(&self) -> BTreeSet<String> {
        let mut files = BTreeSet::new();
        for font in &self.external_fonts {
            files.insert(font.path.clone());
        }
        if let Some(path) = &self.default_sticker_params.base_image {
            files.insert(path.clone());
        }
        if let Some(path) = self.sticker_grid.default_params.background.image_path() {
            files.insert(path.to_string());
        }
        for partial in self.sticker_grid.override_params.values() {
            if let Some(Background::Image(path)) = &partial.background {
                files.insert(path.clone());
            }
        }
        for sticker in &self.stickers {
            if let Some(path) = &sticker.params.base_image {
                files.insert(path.clone());
            }
        }
        files
    }

    /// Validate cross-field invariants: non-empty names, a valid grid, and
    /// every sticker (and the sample) resolvable against the defaults
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::ValidationError(
                "manifest name must not be empty".to_string(),
            ));
        }
        for (idx, sticker) in self.stickers.iter().enumerate() {
            if sticker.name.trim().is_empty() || sticker.category.trim().is_empty() {
                return Err(Error::ValidationError(format!(
                    "sticker {} must have a non-empty name and category",
                    idx
                )));
            }
        }
        self.resolved_stickers()?;
        self.sticker_grid.validate()?;
        self.resolve_sample()?;
        Ok(())
    }
}

/// One installable pack as listed by the hub catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HubPackInfo {
    pub slug: String,
    pub source: FileSource,
}

/// The hub catalog: an ordered list of installable packs
pub type HubManifest = Vec<HubPackInfo>;

/// Relative path → lowercase sha256 hex digest, published alongside a
/// pack's manifest
pub type ChecksumMap = BTreeMap<String, String>;

/// Parse and validate a pack manifest
pub fn parse_manifest(bytes: &[u8]) -> Result<PackManifest> {
    let manifest: PackManifest = serde_json::from_slice(bytes)
        .map_err(|e| Error::ValidationError(format!("invalid manifest JSON: {}", e)))?;
    manifest.validate()?;
    Ok(manifest)
}

/// Parse a local pack config
pub fn parse_config(bytes: &[u8]) -> Result<PackConfig> {
    serde_json::from_slice(bytes)
        .map_err(|e| Error::ValidationError(format!("invalid config JSON: {}", e)))
}

/// Parse the hub catalog
pub fn parse_hub_manifest(bytes: &[u8]) -> Result<HubManifest> {
    let hub: HubManifest = serde_json::from_slice(bytes)
        .map_err(|e| Error::ValidationError(format!("invalid hub manifest JSON: {}", e)))?;
    for info in &hub {
        if info.slug.trim().is_empty() {
            return Err(Error::ValidationError(
                "hub manifest entry with empty slug".to_string(),
            ));
        }
    }
    Ok(hub)
}

/// Parse a remote checksum map
pub fn parse_checksum_map(bytes: &[u8]) -> Result<ChecksumMap> {
    serde_json::from_slice(bytes)
        .map_err(|e| Error::ValidationError(format!("invalid checksum JSON: {}", e)))
}
