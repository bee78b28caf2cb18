// src/hub.rs

//! Hub catalog and per-pack metadata fetching
//!
//! The hub is a remote catalog listing installable packs and where each one
//! lives. Helpers come in a strict form (raises) and a tolerant form (warns
//! and returns `None`). The tolerant form is used when scanning the whole
//! catalog, where one broken pack must not abort the scan.

use rayon::prelude::*;
use std::collections::HashMap;
use tracing::warn;

use crate::error::Result;
use crate::fetch::SourceFetcher;
use crate::model::{
    parse_checksum_map, parse_hub_manifest, parse_manifest, ChecksumMap, FileSource, HubManifest,
    PackManifest, CHECKSUM_FILENAME, MANIFEST_FILENAME,
};

/// Fetch and validate the hub catalog; the source points directly at the
/// catalog file
pub fn fetch_hub(fetcher: &SourceFetcher, source: &FileSource) -> Result<HubManifest> {
    let bytes = fetcher.fetch(source, &[])?;
    parse_hub_manifest(&bytes)
}

/// Fetch and validate the manifest under a pack source
pub fn fetch_manifest(fetcher: &SourceFetcher, source: &FileSource) -> Result<PackManifest> {
    let bytes = fetcher.fetch(source, &[MANIFEST_FILENAME])?;
    parse_manifest(&bytes)
}

/// Tolerant [`fetch_manifest`]: logs a warning and returns `None` on failure
pub fn fetch_optional_manifest(
    fetcher: &SourceFetcher,
    source: &FileSource,
) -> Option<PackManifest> {
    match fetch_manifest(fetcher, source) {
        Ok(manifest) => Some(manifest),
        Err(e) => {
            warn!("Failed to fetch manifest from {}: {}", source, e);
            None
        }
    }
}

/// Fetch and validate the checksum map under a pack source
pub fn fetch_checksum(fetcher: &SourceFetcher, source: &FileSource) -> Result<ChecksumMap> {
    let bytes = fetcher.fetch(source, &[CHECKSUM_FILENAME])?;
    parse_checksum_map(&bytes)
}

/// Tolerant [`fetch_checksum`]: logs a warning and returns `None` on failure
pub fn fetch_optional_checksum(
    fetcher: &SourceFetcher,
    source: &FileSource,
) -> Option<ChecksumMap> {
    match fetch_checksum(fetcher, source) {
        Ok(checksum) => Some(checksum),
        Err(e) => {
            warn!("Failed to fetch checksum from {}: {}", source, e);
            None
        }
    }
}

/// Fetch the hub, then every listed pack's manifest concurrently on the
/// fetcher's pool; packs whose manifest fails to fetch or validate are
/// omitted from the returned map
pub fn fetch_hub_and_packs(
    fetcher: &SourceFetcher,
    hub_source: &FileSource,
) -> Result<(HubManifest, HashMap<String, PackManifest>)> {
    let hub = fetch_hub(fetcher, hub_source)?;

    let fetched: Vec<(String, Option<PackManifest>)> = fetcher.pool().install(|| {
        hub.par_iter()
            .map(|info| {
                (
                    info.slug.clone(),
                    fetch_optional_manifest(fetcher, &info.source),
                )
            })
            .collect()
    });

    let manifests = fetched
        .into_iter()
        .filter_map(|(slug, manifest)| manifest.map(|m| (slug, m)))
        .collect();
    Ok((hub, manifests))
}
