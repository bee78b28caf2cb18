// src/manager.rs

//! The pack collection manager
//!
//! A [`PackManager`] owns the data directory, rescans it into a list of
//! [`StickerPack`]s, and drives the bulk operations (install, update,
//! delete, enable, disable). Bulk operations report per-item results in an
//! [`OpResult`] instead of failing the whole batch, and every mutation ends
//! with a rescan so in-memory state never drifts from disk.

use rayon::prelude::*;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::fetch::{FetchConfig, SourceFetcher};
use crate::hub;
use crate::model::{
    default_hub_source, FileSource, HubManifest, PackManifest, MANIFEST_FILENAME,
    UPDATING_MARKER_FILENAME,
};
use crate::op::OpResult;
use crate::pack::{PackObserver, StickerPack};
use crate::update::{self, UpdateOutcome};

/// Callback invoked after every rescan of the data directory
pub type ReloadObserver = Arc<dyn Fn(&PackManager) + Send + Sync>;

/// Tunables for a [`PackManager`]
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    pub fetch: FetchConfig,
    pub hub_source: FileSource,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            fetch: FetchConfig::default(),
            hub_source: default_hub_source(),
        }
    }
}

struct UpdateJob {
    slug: String,
    path: PathBuf,
    source: FileSource,
    current_version: u32,
}

/// Manages every pack under one data directory
pub struct PackManager {
    data_dir: PathBuf,
    hub_source: FileSource,
    fetcher: SourceFetcher,
    packs: Vec<StickerPack>,
    pack_observers: Vec<PackObserver>,
    reload_observers: Vec<ReloadObserver>,
}

impl PackManager {
    pub fn new(data_dir: impl Into<PathBuf>) -> Result<Self> {
        Self::with_config(data_dir, ManagerConfig::default())
    }

    pub fn with_config(data_dir: impl Into<PathBuf>, config: ManagerConfig) -> Result<Self> {
        let fetcher = SourceFetcher::with_config(&config.fetch)?;
        Ok(Self {
            data_dir: data_dir.into(),
            hub_source: config.hub_source,
            fetcher,
            packs: Vec::new(),
            pack_observers: Vec::new(),
            reload_observers: Vec::new(),
        })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn fetcher(&self) -> &SourceFetcher {
        &self.fetcher
    }

    pub fn hub_source(&self) -> &FileSource {
        &self.hub_source
    }

    /// The currently loaded packs, in slug order
    pub fn packs(&self) -> &[StickerPack] {
        &self.packs
    }

    /// The loaded packs that are not disabled, updating, superseded, or
    /// deleted
    pub fn available_packs(&self) -> impl Iterator<Item = &StickerPack> {
        self.packs.iter().filter(|pack| !pack.unavailable())
    }

    /// Register an observer attached to every pack loaded by subsequent
    /// rescans
    pub fn add_pack_observer(&mut self, observer: impl Fn(&StickerPack) + Send + Sync + 'static) {
        self.pack_observers.push(Arc::new(observer));
    }

    /// Register an observer invoked after every rescan
    pub fn add_reload_observer(&mut self, observer: impl Fn(&PackManager) + Send + Sync + 'static) {
        self.reload_observers.push(Arc::new(observer));
    }

    /// Rescan the data directory, replacing the loaded pack list
    ///
    /// Previously loaded references are marked superseded first, so holders
    /// see them as unavailable even if the rescan finds the same packs
    /// again. Directories without a manifest are ignored; directories with
    /// an updating marker are quarantined unless `clear_markers` is set.
    pub fn reload(&mut self, clear_markers: bool) -> Result<OpResult<String>> {
        for pack in &mut self.packs {
            pack.set_ref_outdated();
        }
        self.packs.clear();

        let mut op = OpResult::default();
        if !self.data_dir.is_dir() {
            info!(
                "Data directory {} does not exist, no packs loaded",
                self.data_dir.display()
            );
            self.notify_reload();
            return Ok(op);
        }

        let mut dirs: Vec<PathBuf> = fs::read_dir(&self.data_dir)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_dir())
            .collect();
        dirs.sort();

        for dir in dirs {
            if !dir.join(MANIFEST_FILENAME).exists() {
                debug!("Skipping {} (no manifest)", dir.display());
                continue;
            }
            let slug = dir
                .file_name()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();

            let marker = dir.join(UPDATING_MARKER_FILENAME);
            let mut recovered = false;
            if marker.exists() {
                if clear_markers {
                    fs::remove_file(&marker)?;
                    warn!("Cleared updating marker of pack `{}`", slug);
                    recovered = true;
                } else {
                    warn!(
                        "Pack `{}` has an updating marker, a previous update may have been interrupted; skipping",
                        slug
                    );
                    op.skipped.push((slug, "updating marker present".to_string()));
                    continue;
                }
            }

            match StickerPack::open_with(&dir, self.pack_observers.clone()) {
                Ok(pack) => {
                    if recovered {
                        let missing = pack.missing_files();
                        if !missing.is_empty() {
                            warn!(
                                "Pack `{}` was recovered with files missing, update it to repair: {}",
                                pack.slug(),
                                missing.join(", ")
                            );
                        }
                    }
                    op.succeeded.push(pack.slug().to_string());
                    self.packs.push(pack);
                }
                Err(e) => {
                    warn!("Failed to load pack `{}`: {}", slug, e);
                    op.failed.push((slug, e));
                }
            }
        }

        info!("Loaded {} packs", self.packs.len());
        self.notify_reload();
        Ok(op)
    }

    fn notify_reload(&self) {
        for observer in &self.reload_observers {
            observer.as_ref()(self);
        }
    }

    fn position(&self, query: &str, include_unavailable: bool) -> Option<usize> {
        self.packs.iter().position(|pack| {
            (include_unavailable || !pack.unavailable())
                && (pack.slug().eq_ignore_ascii_case(query)
                    || pack.manifest().name.eq_ignore_ascii_case(query))
        })
    }

    /// Find a pack by its exact slug
    pub fn find_by_slug(&self, slug: &str, include_unavailable: bool) -> Option<&StickerPack> {
        self.packs
            .iter()
            .find(|pack| (include_unavailable || !pack.unavailable()) && pack.slug() == slug)
    }

    /// Find the first pack whose slug or manifest name matches the query,
    /// case-insensitively
    pub fn find(&self, query: &str, include_unavailable: bool) -> Option<&StickerPack> {
        self.position(query, include_unavailable)
            .map(|idx| &self.packs[idx])
    }

    /// Install packs from the hub by slug
    ///
    /// The whole batch shares one hub fetch; per-slug problems (unknown
    /// slug, directory already present) land in the result instead of
    /// aborting the batch. Downloads across packs share the fetcher's
    /// worker pool.
    pub fn install(&mut self, slugs: &[String]) -> Result<OpResult<String>> {
        self.install_with(slugs, None, None)
    }

    /// Install packs, reusing an already fetched hub catalog and pack
    /// manifests (say from a catalog listing) instead of re-fetching them
    pub fn install_with(
        &mut self,
        slugs: &[String],
        hub: Option<HubManifest>,
        mut manifests: Option<HashMap<String, PackManifest>>,
    ) -> Result<OpResult<String>> {
        let mut op = OpResult::default();
        if slugs.is_empty() {
            return Ok(op);
        }

        let hub_manifest = match hub {
            Some(hub) => hub,
            None => {
                info!("Fetching hub manifest from {}", self.hub_source);
                hub::fetch_hub(&self.fetcher, &self.hub_source)?
            }
        };

        let mut jobs: Vec<(String, FileSource, Option<PackManifest>)> = Vec::new();
        for slug in slugs {
            let Some(info) = hub_manifest
                .iter()
                .find(|info| info.slug.eq_ignore_ascii_case(slug))
            else {
                op.failed.push((
                    slug.clone(),
                    Error::NotFoundError(format!("pack `{}` is not in the hub", slug)),
                ));
                continue;
            };
            if jobs.iter().any(|(s, _, _)| s == &info.slug) {
                op.skipped
                    .push((info.slug.clone(), "requested more than once".to_string()));
                continue;
            }
            let dir = self.data_dir.join(&info.slug);
            if dir.exists() {
                op.failed.push((
                    info.slug.clone(),
                    Error::AlreadyExistsError(format!(
                        "pack directory {} already exists",
                        dir.display()
                    )),
                ));
                continue;
            }
            let manifest = manifests.as_mut().and_then(|m| m.remove(&info.slug));
            jobs.push((info.slug.clone(), info.source.clone(), manifest));
        }

        fs::create_dir_all(&self.data_dir)?;
        let results: Vec<(String, Result<UpdateOutcome>)> = self.fetcher.pool().install(|| {
            jobs.into_par_iter()
                .map(|(slug, source, manifest)| {
                    let outcome = update::update_or_install(
                        &self.fetcher,
                        &self.data_dir.join(&slug),
                        &source,
                        manifest,
                    );
                    (slug, outcome)
                })
                .collect()
        });
        for (slug, result) in results {
            match result {
                Ok(_) => op.succeeded.push(slug),
                Err(e) => {
                    warn!("Failed to install pack `{}`: {}", slug, e);
                    op.failed.push((slug, e));
                }
            }
        }

        self.reload(false)?;
        Ok(op)
    }

    /// Update the named packs, or every loaded pack when `slugs` is `None`
    ///
    /// Remote manifests are prefetched concurrently; a pack whose remote
    /// version is not newer than the local one is skipped as already up to
    /// date unless `force` is set. Force still goes through the checksum
    /// diff, so an up-to-date pack transfers nothing.
    pub fn update(&mut self, slugs: Option<&[String]>, force: bool) -> Result<OpResult<String>> {
        let mut op = OpResult::default();

        let mut targets: Vec<usize> = Vec::new();
        match slugs {
            Some(slugs) => {
                for slug in slugs {
                    match self.position(slug, true) {
                        Some(idx) if !targets.contains(&idx) => targets.push(idx),
                        Some(_) => {}
                        None => op.failed.push((
                            slug.clone(),
                            Error::NotFoundError(format!("no loaded pack matching `{}`", slug)),
                        )),
                    }
                }
            }
            None => targets = (0..self.packs.len()).collect(),
        }

        let mut jobs = Vec::new();
        for idx in targets {
            let pack = &self.packs[idx];
            let slug = pack.slug().to_string();
            if pack.updating() {
                op.skipped
                    .push((slug, "an update is already in progress".to_string()));
                continue;
            }
            let Some(source) = pack.merged_config().update_source.clone() else {
                op.skipped
                    .push((slug, "no update source configured".to_string()));
                continue;
            };
            jobs.push(UpdateJob {
                slug,
                path: pack.base_path().to_path_buf(),
                source,
                current_version: pack.manifest().version,
            });
        }

        let prefetched: Vec<(UpdateJob, Option<PackManifest>)> =
            self.fetcher.pool().install(|| {
                jobs.into_par_iter()
                    .map(|job| {
                        let manifest = hub::fetch_optional_manifest(&self.fetcher, &job.source);
                        (job, manifest)
                    })
                    .collect()
            });

        let mut to_run = Vec::new();
        for (job, manifest) in prefetched {
            let Some(manifest) = manifest else {
                op.skipped
                    .push((job.slug, "failed to fetch remote manifest".to_string()));
                continue;
            };
            if !force && manifest.version <= job.current_version {
                debug!(
                    "Pack `{}` is already up to date (version {})",
                    job.slug, job.current_version
                );
                op.skipped.push((job.slug, "already up to date".to_string()));
                continue;
            }
            to_run.push((job, manifest));
        }

        let results: Vec<(String, Result<UpdateOutcome>)> = self.fetcher.pool().install(|| {
            to_run
                .into_par_iter()
                .map(|(job, manifest)| {
                    let outcome = update::update_or_install(
                        &self.fetcher,
                        &job.path,
                        &job.source,
                        Some(manifest),
                    );
                    (job.slug, outcome)
                })
                .collect()
        });
        for (slug, result) in results {
            match result {
                Ok(outcome) => {
                    debug!(
                        "Pack `{}`: downloaded {}, removed {}",
                        slug, outcome.downloaded, outcome.removed
                    );
                    op.succeeded.push(slug);
                }
                Err(e) => {
                    warn!("Failed to update pack `{}`: {}", slug, e);
                    op.failed.push((slug, e));
                }
            }
        }

        self.reload(false)?;
        Ok(op)
    }

    /// Delete a pack and its directory; refuses while an update holds the
    /// pack
    pub fn delete(&mut self, slug: &str) -> Result<()> {
        let idx = self.position(slug, true).ok_or_else(|| {
            Error::NotFoundError(format!("no loaded pack matching `{}`", slug))
        })?;
        if self.packs[idx].updating() {
            return Err(Error::AlreadyUpdatingError(
                self.packs[idx].slug().to_string(),
            ));
        }

        // detach from the list before destroying, so lookups never hand
        // out a reference to a half-removed pack
        let mut pack = self.packs.remove(idx);
        pack.delete();

        self.reload(false)?;
        Ok(())
    }

    pub fn enable(&mut self, slugs: &[String]) -> OpResult<String> {
        self.set_disabled(slugs, false)
    }

    pub fn disable(&mut self, slugs: &[String]) -> OpResult<String> {
        self.set_disabled(slugs, true)
    }

    fn set_disabled(&mut self, slugs: &[String], disabled: bool) -> OpResult<String> {
        let verb = if disabled { "disable" } else { "enable" };
        let mut op = OpResult::default();
        for slug in slugs {
            let Some(idx) = self.position(slug, true) else {
                op.failed.push((
                    slug.clone(),
                    Error::NotFoundError(format!("no loaded pack matching `{}`", slug)),
                ));
                continue;
            };
            let pack = &mut self.packs[idx];
            let slug = pack.slug().to_string();
            if pack.merged_config().disabled == disabled {
                op.skipped.push((slug, format!("already {}d", verb)));
                continue;
            }
            pack.config_mut().disabled = Some(disabled);
            match pack.save_config() {
                Ok(()) => op.succeeded.push(slug),
                Err(e) => {
                    warn!("Failed to {} pack `{}`: {}", verb, slug, e);
                    op.failed.push((slug, e));
                }
            }
        }
        op
    }
}
