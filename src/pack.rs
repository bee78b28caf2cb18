// src/pack.rs

//! The sticker pack entity
//!
//! A [`StickerPack`] binds a pack directory to its loaded manifest and local
//! config. It owns persistence (pretty JSON, defaulted fields omitted), the
//! derived merged config, and the pack's availability states. State changes
//! are announced synchronously to registered observers.
//!
//! Availability is recomputed on every access: `updating` is a live check of
//! the crash-marker file, which can appear and disappear out-of-band.

use serde::Serialize;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::fetch::SourceFetcher;
use crate::model::{
    merge_config, parse_config, parse_manifest, MergedConfig, PackConfig, PackManifest,
    CONFIG_FILENAME, MANIFEST_FILENAME, UPDATING_MARKER_FILENAME,
};
use crate::update::{self, UpdateOutcome};

/// Callback invoked synchronously after a pack's state changes; must not
/// panic and must not assume ordering across packs
pub type PackObserver = Arc<dyn Fn(&StickerPack) + Send + Sync>;

/// One loaded sticker pack
pub struct StickerPack {
    base_path: PathBuf,
    slug: String,
    manifest: PackManifest,
    config: PackConfig,
    merged: MergedConfig,
    ref_outdated: bool,
    observers: Vec<PackObserver>,
}

impl StickerPack {
    /// Load a pack from its directory; the manifest must exist, a missing
    /// config is created with defaults and persisted
    pub fn open(base_path: impl Into<PathBuf>) -> Result<Self> {
        Self::open_with(base_path, Vec::new())
    }

    /// Load a pack with observers already registered, so they see the
    /// initial notification
    pub fn open_with(base_path: impl Into<PathBuf>, observers: Vec<PackObserver>) -> Result<Self> {
        let base_path = base_path.into();
        let manifest = load_manifest(&base_path.join(MANIFEST_FILENAME))?;
        let config = load_or_init_config(&base_path.join(CONFIG_FILENAME))?;

        let pack = Self::assemble(base_path, manifest, config, observers);
        pack.notify();
        Ok(pack)
    }

    /// Bind a freshly fetched manifest to a directory, persisting it; an
    /// existing local config is kept, otherwise defaults are written
    pub fn create(base_path: impl Into<PathBuf>, manifest: PackManifest) -> Result<Self> {
        let base_path = base_path.into();
        fs::create_dir_all(&base_path)?;
        write_pretty_json(&base_path.join(MANIFEST_FILENAME), &manifest)?;
        let config = load_or_init_config(&base_path.join(CONFIG_FILENAME))?;

        let pack = Self::assemble(base_path, manifest, config, Vec::new());
        pack.notify();
        Ok(pack)
    }

    fn assemble(
        base_path: PathBuf,
        manifest: PackManifest,
        config: PackConfig,
        observers: Vec<PackObserver>,
    ) -> Self {
        let slug = base_path
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| base_path.to_string_lossy().into_owned());
        let merged = merge_config(&manifest.default_config, &config);
        Self {
            base_path,
            slug,
            manifest,
            config,
            merged,
            ref_outdated: false,
            observers,
        }
    }

    pub fn slug(&self) -> &str {
        &self.slug
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    pub fn manifest(&self) -> &PackManifest {
        &self.manifest
    }

    pub fn config(&self) -> &PackConfig {
        &self.config
    }

    /// Mutable access to the local config; call [`Self::save_config`]
    /// afterwards to persist and refresh the merged view
    pub fn config_mut(&mut self) -> &mut PackConfig {
        &mut self.config
    }

    /// The effective configuration (manifest defaults overlaid with the
    /// local config)
    pub fn merged_config(&self) -> &MergedConfig {
        &self.merged
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.base_path.join(MANIFEST_FILENAME)
    }

    pub fn config_path(&self) -> PathBuf {
        self.base_path.join(CONFIG_FILENAME)
    }

    pub fn marker_path(&self) -> PathBuf {
        self.base_path.join(UPDATING_MARKER_FILENAME)
    }

    /// Whether an update currently holds this pack (live marker-file check)
    pub fn updating(&self) -> bool {
        self.marker_path().exists()
    }

    /// Whether the pack's manifest file is gone from disk
    pub fn deleted(&self) -> bool {
        !self.manifest_path().exists()
    }

    /// Whether this in-memory reference has been superseded by a reload
    pub fn ref_outdated(&self) -> bool {
        self.ref_outdated
    }

    /// Mark this reference as superseded; notifies observers on the
    /// transition
    pub fn set_ref_outdated(&mut self) {
        if !self.ref_outdated {
            self.ref_outdated = true;
            self.notify();
        }
    }

    /// Whether the pack should be hidden from normal lookups
    pub fn unavailable(&self) -> bool {
        self.merged.disabled || self.updating() || self.ref_outdated || self.deleted()
    }

    /// Register a state-change observer
    pub fn add_observer(&mut self, observer: impl Fn(&StickerPack) + Send + Sync + 'static) {
        self.observers.push(Arc::new(observer));
    }

    fn notify(&self) {
        for observer in &self.observers {
            observer.as_ref()(self);
        }
    }

    /// Re-read manifest and config from disk, refreshing the merged view
    pub fn reload(&mut self) -> Result<()> {
        self.manifest = load_manifest(&self.manifest_path())?;
        self.config = load_or_init_config(&self.config_path())?;
        self.refresh_merged();
        self.notify();
        Ok(())
    }

    /// Persist the local config and refresh the merged view
    pub fn save_config(&mut self) -> Result<()> {
        write_pretty_json(&self.config_path(), &self.config)?;
        self.refresh_merged();
        self.notify();
        Ok(())
    }

    /// Persist the in-memory manifest
    pub fn save_manifest(&mut self) -> Result<()> {
        write_pretty_json(&self.manifest_path(), &self.manifest)?;
        self.refresh_merged();
        self.notify();
        Ok(())
    }

    fn refresh_merged(&mut self) {
        self.merged = merge_config(&self.manifest.default_config, &self.config);
    }

    /// Update this pack from its configured update source, then reload
    pub fn update(
        &mut self,
        fetcher: &SourceFetcher,
        manifest: Option<PackManifest>,
    ) -> Result<UpdateOutcome> {
        let source = self.merged.update_source.clone().ok_or_else(|| {
            Error::NotFoundError(format!(
                "no update source configured for pack `{}`",
                self.slug
            ))
        })?;
        let outcome = update::update_or_install(fetcher, &self.base_path, &source, manifest)?;
        self.reload()?;
        Ok(outcome)
    }

    /// Logically destroy the pack: the reference is marked superseded
    /// before anything touches disk, the manifest is unlinked first so
    /// observers see `deleted`, then the directory tree is removed
    /// best-effort, logging individual failures without raising
    pub fn delete(&mut self) {
        info!("Deleting pack `{}`", self.slug);
        self.ref_outdated = true;

        let manifest_path = self.manifest_path();
        if let Err(e) = fs::remove_file(&manifest_path) {
            warn!("Failed to remove {}: {}", manifest_path.display(), e);
        }
        self.notify();

        remove_tree_best_effort(&self.base_path);
        debug!("Removed pack directory {}", self.base_path.display());
    }

    /// Manifest-declared resource files currently missing on disk
    pub fn missing_files(&self) -> Vec<String> {
        self.manifest
            .resource_files()
            .into_iter()
            .filter(|path| !self.base_path.join(path).is_file())
            .collect()
    }
}

impl fmt::Debug for StickerPack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StickerPack")
            .field("base_path", &self.base_path)
            .field("slug", &self.slug)
            .field("manifest", &self.manifest)
            .field("config", &self.config)
            .field("merged", &self.merged)
            .field("ref_outdated", &self.ref_outdated)
            .finish_non_exhaustive()
    }
}

fn load_manifest(path: &Path) -> Result<PackManifest> {
    if !path.exists() {
        return Err(Error::NotFoundError(format!(
            "no manifest found at {}",
            path.display()
        )));
    }
    parse_manifest(&fs::read(path)?)
}

fn load_or_init_config(path: &Path) -> Result<PackConfig> {
    if path.exists() {
        parse_config(&fs::read(path)?)
    } else {
        let config = PackConfig::default();
        write_pretty_json(path, &config)?;
        Ok(config)
    }
}

fn write_pretty_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let mut text = serde_json::to_string_pretty(value)?;
    text.push('\n');
    fs::write(path, text)?;
    Ok(())
}

fn remove_tree_best_effort(path: &Path) {
    if let Ok(entries) = fs::read_dir(path) {
        for entry in entries.flatten() {
            let entry_path = entry.path();
            if entry_path.is_dir() {
                remove_tree_best_effort(&entry_path);
            } else if let Err(e) = fs::remove_file(&entry_path) {
                warn!("Failed to remove {}: {}", entry_path.display(), e);
            }
        }
    }
    if let Err(e) = fs::remove_dir(path) {
        warn!("Failed to remove {}: {}", path.display(), e);
    }
}
