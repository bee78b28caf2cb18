// src/update.rs

//! Checksum-diffed pack installation and update
//!
//! The engine compares the files on disk against the file set declared by a
//! freshly fetched manifest, downloads only what is missing or changed, and
//! removes what the new manifest no longer references. Downloads land in a
//! staging directory and are moved into place only after every transfer has
//! succeeded.
//!
//! A `.updating` marker file makes the process crash-safe: it is written
//! right before the first mutation and removed only after the last one, so
//! any failure in between leaves the marker behind and the next reload
//! quarantines the half-written pack.

use rayon::prelude::*;
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::fetch::SourceFetcher;
use crate::hub;
use crate::model::{
    ChecksumMap, FileSource, PackManifest, CHECKSUM_FILENAME, CONFIG_FILENAME, MANIFEST_FILENAME,
    UPDATING_MARKER_FILENAME,
};
use crate::pack::StickerPack;

/// Files to transfer and files to delete, as pack-relative posix paths
#[derive(Debug, Default, PartialEq, Eq)]
pub struct FileDiff {
    pub to_download: BTreeSet<String>,
    pub to_remove: BTreeSet<String>,
}

impl FileDiff {
    pub fn is_empty(&self) -> bool {
        self.to_download.is_empty() && self.to_remove.is_empty()
    }
}

/// What an update actually changed on disk
#[derive(Debug, Default)]
pub struct UpdateOutcome {
    pub downloaded: usize,
    pub removed: usize,
    /// External font files that were among the downloads; these need a
    /// system-level install before text rendering picks them up
    pub updated_fonts: Vec<String>,
}

/// Install or update the pack at `pack_path` from `source`
///
/// Passing `manifest` skips the manifest fetch when the caller already
/// holds it. The engine refuses to touch a directory whose marker file is
/// present; once its own marker is written, any failure intentionally
/// leaves the marker in place.
pub fn update_or_install(
    fetcher: &SourceFetcher,
    pack_path: &Path,
    source: &FileSource,
    manifest: Option<PackManifest>,
) -> Result<UpdateOutcome> {
    let slug = pack_path
        .file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| pack_path.to_string_lossy().into_owned());

    let marker_path = pack_path.join(UPDATING_MARKER_FILENAME);
    if marker_path.exists() {
        return Err(Error::AlreadyUpdatingError(slug));
    }

    let manifest = match manifest {
        Some(manifest) => manifest,
        None => {
            debug!("Fetching manifest of pack `{}`", slug);
            hub::fetch_manifest(fetcher, source)?
        }
    };
    let checksums = hub::fetch_optional_checksum(fetcher, source);

    let local_files = collect_local_files(pack_path)?;
    let remote_files = manifest.resource_files();
    let diff = compute_diff(pack_path, &local_files, &remote_files, checksums.as_ref())?;
    info!(
        "Pack `{}`: {} files to download, {} to remove",
        slug,
        diff.to_download.len(),
        diff.to_remove.len()
    );

    fs::create_dir_all(pack_path)?;
    fs::write(&marker_path, b"")?;

    apply(fetcher, pack_path, source, &manifest, &diff, &slug)?;

    fs::remove_file(&marker_path)?;

    let updated_fonts: Vec<String> = manifest
        .external_fonts
        .iter()
        .filter(|font| diff.to_download.contains(&font.path))
        .map(|font| font.path.clone())
        .collect();
    if !updated_fonts.is_empty() {
        let resolved: Vec<String> = updated_fonts
            .iter()
            .map(|path| {
                let local = pack_path.join(path);
                fs::canonicalize(&local)
                    .unwrap_or(local)
                    .display()
                    .to_string()
            })
            .collect();
        warn!(
            "Pack `{}` ships external fonts; install them into your system and restart for them to take effect: {}",
            slug,
            resolved.join(", ")
        );
    }

    info!("Successfully updated pack `{}`", slug);
    Ok(UpdateOutcome {
        downloaded: diff.to_download.len(),
        removed: diff.to_remove.len(),
        updated_fonts,
    })
}

/// Everything between marker creation and marker removal; a failure here
/// propagates with the marker still on disk
fn apply(
    fetcher: &SourceFetcher,
    pack_path: &Path,
    source: &FileSource,
    manifest: &PackManifest,
    diff: &FileDiff,
    slug: &str,
) -> Result<()> {
    if !diff.to_download.is_empty() {
        let staging_parent = pack_path.parent().unwrap_or(pack_path);
        let staging = tempfile::Builder::new()
            .prefix(".stickerbox-staging")
            .tempdir_in(staging_parent)?;

        let total = diff.to_download.len();
        let done = AtomicUsize::new(0);
        let results: Vec<Result<()>> = fetcher.pool().install(|| {
            diff.to_download
                .par_iter()
                .map(|path| {
                    let bytes = fetcher.fetch(source, &[path.as_str()])?;
                    let target = staging.path().join(path);
                    if let Some(dir) = target.parent() {
                        fs::create_dir_all(dir)?;
                    }
                    fs::write(&target, &bytes)?;

                    let finished = done.fetch_add(1, Ordering::SeqCst) + 1;
                    if finished == 1 || finished == total || finished % 10 == 0 {
                        info!(
                            "[{}/{}] Downloaded `{}` of pack `{}`",
                            finished, total, path, slug
                        );
                    } else {
                        debug!(
                            "[{}/{}] Downloaded `{}` of pack `{}`",
                            finished, total, path, slug
                        );
                    }
                    Ok(())
                })
                .collect()
        });
        for result in results {
            result?;
        }

        for path in &diff.to_download {
            move_file(&staging.path().join(path), &pack_path.join(path))?;
        }
    }

    for path in &diff.to_remove {
        fs::remove_file(pack_path.join(path))?;
    }
    prune_empty_dirs(pack_path)?;

    let mut pack = StickerPack::create(pack_path, manifest.clone())?;
    pack.config_mut().update_source = Some(source.clone());
    pack.save_config()?;
    Ok(())
}

/// Collect pack-relative file paths on disk, skipping the engine's own
/// bookkeeping files at the pack root
pub fn collect_local_files(pack_path: &Path) -> Result<BTreeSet<String>> {
    let mut files = BTreeSet::new();
    if !pack_path.is_dir() {
        return Ok(files);
    }
    walk_files(pack_path, pack_path, &mut files)?;
    files.remove(MANIFEST_FILENAME);
    files.remove(CONFIG_FILENAME);
    files.remove(UPDATING_MARKER_FILENAME);
    Ok(files)
}

fn walk_files(root: &Path, dir: &Path, out: &mut BTreeSet<String>) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            walk_files(root, &path, out)?;
        } else {
            out.insert(relative_posix(root, &path));
        }
    }
    Ok(())
}

fn relative_posix(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Decide which files to transfer and which to delete
///
/// A remote file is downloaded when it is missing locally, when no checksum
/// map is available at all, or when its local checksum does not match the
/// map entry. A path absent from the map counts as a mismatch.
pub fn compute_diff(
    pack_path: &Path,
    local_files: &BTreeSet<String>,
    remote_files: &BTreeSet<String>,
    checksums: Option<&ChecksumMap>,
) -> Result<FileDiff> {
    let mut diff = FileDiff::default();

    for path in local_files.difference(remote_files) {
        diff.to_remove.insert(path.clone());
    }

    for path in remote_files {
        if !local_files.contains(path) {
            diff.to_download.insert(path.clone());
            continue;
        }
        let Some(checksums) = checksums else {
            diff.to_download.insert(path.clone());
            continue;
        };
        let local_sum = checksum_file(&pack_path.join(path))?;
        if checksums.get(path) != Some(&local_sum) {
            diff.to_download.insert(path.clone());
        }
    }

    Ok(diff)
}

/// Hex SHA-256 of a file's contents
pub fn checksum_file(path: &Path) -> Result<String> {
    let mut file = fs::File::open(path)?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher)?;
    Ok(format!("{:x}", hasher.finalize()))
}

/// Checksum every resource file under a directory, keyed by relative posix
/// path, for publishing alongside a manifest
pub fn collect_checksums(dir: &Path) -> Result<ChecksumMap> {
    let mut files = collect_local_files(dir)?;
    files.remove(CHECKSUM_FILENAME);
    let mut map = ChecksumMap::new();
    for path in files {
        let sum = checksum_file(&dir.join(&path))?;
        map.insert(path, sum);
    }
    Ok(map)
}

fn move_file(from: &Path, to: &Path) -> Result<()> {
    if let Some(dir) = to.parent() {
        fs::create_dir_all(dir)?;
    }
    if fs::rename(from, to).is_err() {
        // staging may sit on another filesystem
        fs::copy(from, to)?;
        fs::remove_file(from)?;
    }
    Ok(())
}

/// Remove directories left empty after file removals, deepest first so a
/// chain of empty directories collapses in one pass; the pack root itself
/// is never removed
fn prune_empty_dirs(pack_path: &Path) -> Result<()> {
    let mut dirs = Vec::new();
    collect_dirs(pack_path, &mut dirs)?;
    dirs.sort_by_key(|dir| std::cmp::Reverse(dir.components().count()));
    for dir in dirs {
        if fs::read_dir(&dir)?.next().is_none() {
            fs::remove_dir(&dir)?;
            debug!("Pruned empty directory {}", dir.display());
        }
    }
    Ok(())
}

fn collect_dirs(dir: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            out.push(path.clone());
            collect_dirs(&path, out)?;
        }
    }
    Ok(())
}
