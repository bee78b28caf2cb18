// tests/integration_test.rs

//! Integration tests for stickerbox
//!
//! These tests drive the manager and the update engine against a mock HTTP
//! server, covering install, checksum-diffed updates, crash quarantine and
//! recovery, and hub scanning end to end.

use httpmock::prelude::*;
use serde_json::json;
use std::fs;
use std::path::Path;
use std::time::Duration;
use stickerbox::fetch::{FetchConfig, SourceFetcher};
use stickerbox::hub;
use stickerbox::manager::{ManagerConfig, PackManager};
use stickerbox::model::{
    FileSource, GitHubRef, CONFIG_FILENAME, MANIFEST_FILENAME, UPDATING_MARKER_FILENAME,
};
use stickerbox::update;
use stickerbox::Error;
use tempfile::tempdir;

fn sha_hex(data: &[u8]) -> String {
    use sha2::{Digest, Sha256};
    format!("{:x}", Sha256::digest(data))
}

fn quick_fetch_config() -> FetchConfig {
    FetchConfig {
        max_retries: 2,
        retry_delay: Duration::from_millis(5),
        ..FetchConfig::default()
    }
}

fn manager_for(server: &MockServer, data_dir: &Path) -> PackManager {
    let config = ManagerConfig {
        fetch: quick_fetch_config(),
        hub_source: FileSource::Url {
            url: format!("{}/hub.json", server.base_url()),
        },
    };
    PackManager::with_config(data_dir, config).unwrap()
}

/// A pack manifest whose resource files are `images/cat.png` (the default
/// base image) and `sprites/dog.png` (a per-sticker override)
fn manifest_json(version: u32) -> serde_json::Value {
    json!({
        "version": version,
        "name": "Foo Pack",
        "description": "integration fixture",
        "default_sticker_params": {
            "width": 240,
            "height": 240,
            "base_image": "images/cat.png",
            "text_x": 120.0,
            "text_y": 200.0,
            "text_align": "center",
            "text_rotate_degrees": 0.0,
            "text_color": [255, 255, 255, 255],
            "stroke_color": [0, 0, 0, 255],
            "stroke_width_factor": 0.05,
            "font_size": 48.0,
            "font_style": "normal",
            "font_families": ["sans"]
        },
        "stickers": [
            { "name": "cat", "category": "animals", "params": { "text": "meow" } },
            {
                "name": "dog",
                "category": "animals",
                "params": { "text": "woof", "base_image": "sprites/dog.png" }
            }
        ]
    })
}

fn serve_hub<'a>(server: &'a MockServer, entries: serde_json::Value) -> httpmock::Mock<'a> {
    server.mock(|when, then| {
        when.method(GET).path("/hub.json");
        then.status(200).json_body(entries);
    })
}

/// Mount a pack under `prefix`: its manifest, a matching checksum map, and
/// every listed file
fn serve_pack<'a>(
    server: &'a MockServer,
    prefix: &str,
    manifest: &serde_json::Value,
    files: &[(&str, &'static [u8])],
) -> (httpmock::Mock<'a>, httpmock::Mock<'a>, Vec<httpmock::Mock<'a>>) {
    let manifest_mock = server.mock(|when, then| {
        when.method(GET).path(format!("{}/manifest.json", prefix));
        then.status(200).json_body(manifest.clone());
    });

    let mut checksums = serde_json::Map::new();
    for (path, bytes) in files {
        checksums.insert(path.to_string(), json!(sha_hex(bytes)));
    }
    let checksum_mock = server.mock(|when, then| {
        when.method(GET).path(format!("{}/checksum.json", prefix));
        then.status(200)
            .json_body(serde_json::Value::Object(checksums));
    });

    let file_mocks = files
        .iter()
        .map(|(path, bytes)| {
            server.mock(|when, then| {
                when.method(GET).path(format!("{}/{}", prefix, path));
                then.status(200).body(*bytes);
            })
        })
        .collect();

    (manifest_mock, checksum_mock, file_mocks)
}

#[test]
fn test_install_from_hub() {
    let server = MockServer::start();
    let tmp = tempdir().unwrap();
    let data_dir = tmp.path().join("packs");

    let pack_base = format!("{}/packs/foo", server.base_url());
    let hub_mock = serve_hub(
        &server,
        json!([{ "slug": "foo", "source": { "type": "url", "url": pack_base } }]),
    );
    let (manifest_mock, checksum_mock, file_mocks) = serve_pack(
        &server,
        "/packs/foo",
        &manifest_json(1),
        &[("images/cat.png", b"cat v1"), ("sprites/dog.png", b"dog v1")],
    );

    let mut manager = manager_for(&server, &data_dir);
    manager.reload(false).unwrap();

    let op = manager.install(&["foo".to_string()]).unwrap();
    assert_eq!(op.succeeded, vec!["foo"]);
    assert!(op.failed.is_empty(), "install should not fail: {:?}", op.failed);

    let pack_dir = data_dir.join("foo");
    assert_eq!(fs::read(pack_dir.join("images/cat.png")).unwrap(), b"cat v1");
    assert_eq!(fs::read(pack_dir.join("sprites/dog.png")).unwrap(), b"dog v1");
    assert!(pack_dir.join(MANIFEST_FILENAME).exists());
    assert!(
        !pack_dir.join(UPDATING_MARKER_FILENAME).exists(),
        "marker must be gone after a successful install"
    );

    // the config records where the pack came from
    let config = fs::read_to_string(pack_dir.join(CONFIG_FILENAME)).unwrap();
    assert!(config.contains("/packs/foo"));

    // the manager rescanned and now serves the pack
    assert!(manager.find_by_slug("foo", false).is_some());

    hub_mock.assert_calls(1);
    manifest_mock.assert_calls(1);
    checksum_mock.assert_calls(1);
    for mock in &file_mocks {
        mock.assert_calls(1);
    }
}

#[test]
fn test_install_reports_unknown_slug() {
    let server = MockServer::start();
    let tmp = tempdir().unwrap();
    let data_dir = tmp.path().join("packs");

    let pack_base = format!("{}/packs/foo", server.base_url());
    serve_hub(
        &server,
        json!([{ "slug": "foo", "source": { "type": "url", "url": pack_base } }]),
    );
    serve_pack(
        &server,
        "/packs/foo",
        &manifest_json(1),
        &[("images/cat.png", b"cat v1"), ("sprites/dog.png", b"dog v1")],
    );

    let mut manager = manager_for(&server, &data_dir);
    manager.reload(false).unwrap();

    // the unknown slug fails, the known one still installs
    let op = manager
        .install(&["foo".to_string(), "ghost".to_string()])
        .unwrap();
    assert_eq!(op.succeeded, vec!["foo"]);
    assert_eq!(op.failed.len(), 1);
    assert_eq!(op.failed[0].0, "ghost");
    assert!(matches!(op.failed[0].1, Error::NotFoundError(_)));
    assert!(!data_dir.join("ghost").exists());
}

#[test]
fn test_install_with_prefetched_catalog_skips_refetch() {
    let server = MockServer::start();
    let tmp = tempdir().unwrap();
    let data_dir = tmp.path().join("packs");

    let pack_base = format!("{}/packs/foo", server.base_url());
    let hub_mock = serve_hub(
        &server,
        json!([{ "slug": "foo", "source": { "type": "url", "url": pack_base } }]),
    );
    let (manifest_mock, checksum_mock, file_mocks) = serve_pack(
        &server,
        "/packs/foo",
        &manifest_json(1),
        &[("images/cat.png", b"cat v1"), ("sprites/dog.png", b"dog v1")],
    );

    let mut manager = manager_for(&server, &data_dir);
    manager.reload(false).unwrap();

    // a catalog listing already fetched everything the install needs
    let (hub_manifest, manifests) =
        hub::fetch_hub_and_packs(manager.fetcher(), manager.hub_source()).unwrap();
    hub_mock.assert_calls(1);
    manifest_mock.assert_calls(1);

    let op = manager
        .install_with(&["foo".to_string()], Some(hub_manifest), Some(manifests))
        .unwrap();
    assert_eq!(op.succeeded, vec!["foo"]);

    // neither the catalog nor the manifest was fetched again
    hub_mock.assert_calls(1);
    manifest_mock.assert_calls(1);
    checksum_mock.assert_calls(1);
    for mock in &file_mocks {
        mock.assert_calls(1);
    }
    assert!(data_dir.join("foo").join(MANIFEST_FILENAME).exists());
}

#[test]
fn test_update_skips_when_already_up_to_date() {
    let server = MockServer::start();
    let tmp = tempdir().unwrap();
    let data_dir = tmp.path().join("packs");

    let pack_base = format!("{}/packs/foo", server.base_url());
    serve_hub(
        &server,
        json!([{ "slug": "foo", "source": { "type": "url", "url": pack_base } }]),
    );
    let (manifest_mock, checksum_mock, file_mocks) = serve_pack(
        &server,
        "/packs/foo",
        &manifest_json(1),
        &[("images/cat.png", b"cat v1"), ("sprites/dog.png", b"dog v1")],
    );

    let mut manager = manager_for(&server, &data_dir);
    manager.reload(false).unwrap();
    manager.install(&["foo".to_string()]).unwrap();

    // same remote version: the version gate stops the update cold
    let op = manager.update(None, false).unwrap();
    assert_eq!(
        op.skipped,
        vec![("foo".to_string(), "already up to date".to_string())]
    );
    for mock in &file_mocks {
        mock.assert_calls(1);
    }
    checksum_mock.assert_calls(1);
    manifest_mock.assert_calls(2);

    // force re-runs the engine, but the checksum diff transfers nothing
    let op = manager.update(None, true).unwrap();
    assert_eq!(op.succeeded, vec!["foo"]);
    for mock in &file_mocks {
        mock.assert_calls(1);
    }
    checksum_mock.assert_calls(2);
    assert!(!data_dir.join("foo").join(UPDATING_MARKER_FILENAME).exists());

    // installing over an existing directory is refused
    let op = manager.install(&["foo".to_string()]).unwrap();
    assert!(op.succeeded.is_empty());
    assert!(matches!(op.failed[0].1, Error::AlreadyExistsError(_)));
}

#[test]
fn test_forced_update_repairs_corrupted_file() {
    let server = MockServer::start();
    let tmp = tempdir().unwrap();
    let data_dir = tmp.path().join("packs");

    let pack_base = format!("{}/packs/foo", server.base_url());
    serve_hub(
        &server,
        json!([{ "slug": "foo", "source": { "type": "url", "url": pack_base } }]),
    );
    let (_, _, file_mocks) = serve_pack(
        &server,
        "/packs/foo",
        &manifest_json(1),
        &[("images/cat.png", b"cat v1"), ("sprites/dog.png", b"dog v1")],
    );

    let mut manager = manager_for(&server, &data_dir);
    manager.reload(false).unwrap();
    manager.install(&["foo".to_string()]).unwrap();

    let dog_path = data_dir.join("foo").join("sprites/dog.png");
    fs::write(&dog_path, b"bit rot").unwrap();

    let slugs = vec!["foo".to_string()];
    let op = manager.update(Some(slugs.as_slice()), true).unwrap();
    assert_eq!(op.succeeded, vec!["foo"]);

    // only the mismatching file was transferred again
    assert_eq!(fs::read(&dog_path).unwrap(), b"dog v1");
    file_mocks[0].assert_calls(1);
    file_mocks[1].assert_calls(2);
}

#[test]
fn test_update_follows_local_source_override() {
    let server = MockServer::start();
    let tmp = tempdir().unwrap();
    let data_dir = tmp.path().join("packs");

    let v1_base = format!("{}/v1", server.base_url());
    serve_hub(
        &server,
        json!([{ "slug": "foo", "source": { "type": "url", "url": v1_base } }]),
    );
    let (v1_manifest_mock, _, _) = serve_pack(
        &server,
        "/v1",
        &manifest_json(1),
        &[("images/cat.png", b"cat v1"), ("sprites/dog.png", b"dog v1")],
    );

    // version 2 drops the dog sticker, changes the cat image, adds a bird
    let mut v2 = manifest_json(2);
    let stickers = v2["stickers"].as_array_mut().unwrap();
    stickers.pop();
    stickers.push(json!({
        "name": "bird",
        "category": "birds",
        "params": { "text": "tweet", "base_image": "images/bird.png" }
    }));
    let (v2_manifest_mock, v2_checksum_mock, _) = serve_pack(
        &server,
        "/v2",
        &v2,
        &[("images/cat.png", b"cat v2"), ("images/bird.png", b"bird v2")],
    );

    let mut manager = manager_for(&server, &data_dir);
    manager.reload(false).unwrap();
    manager.install(&["foo".to_string()]).unwrap();

    // point the local config at the new location; local overrides win
    let pack_dir = data_dir.join("foo");
    fs::write(
        pack_dir.join(CONFIG_FILENAME),
        format!(
            r#"{{ "update_source": {{ "type": "url", "url": "{}/v2" }} }}"#,
            server.base_url()
        ),
    )
    .unwrap();
    manager.reload(false).unwrap();

    let op = manager.update(None, false).unwrap();
    assert_eq!(op.succeeded, vec!["foo"]);

    assert_eq!(fs::read(pack_dir.join("images/cat.png")).unwrap(), b"cat v2");
    assert_eq!(fs::read(pack_dir.join("images/bird.png")).unwrap(), b"bird v2");
    // the dropped file is removed and its now-empty directory pruned
    assert!(!pack_dir.join("sprites/dog.png").exists());
    assert!(!pack_dir.join("sprites").exists());

    let pack = manager.find_by_slug("foo", false).unwrap();
    assert_eq!(pack.manifest().version, 2);
    let config = fs::read_to_string(pack_dir.join(CONFIG_FILENAME)).unwrap();
    assert!(config.contains("/v2"));

    v1_manifest_mock.assert_calls(1);
    v2_manifest_mock.assert_calls(1);
    v2_checksum_mock.assert_calls(1);
}

#[test]
fn test_interrupted_update_quarantines_until_recovery() {
    let server = MockServer::start();
    let tmp = tempdir().unwrap();
    let data_dir = tmp.path().join("packs");

    let v1_base = format!("{}/v1", server.base_url());
    serve_hub(
        &server,
        json!([{ "slug": "foo", "source": { "type": "url", "url": v1_base } }]),
    );
    serve_pack(
        &server,
        "/v1",
        &manifest_json(1),
        &[("images/cat.png", b"cat v1"), ("sprites/dog.png", b"dog v1")],
    );

    // version 2 needs images/bird.png, whose download keeps failing
    let mut v2 = manifest_json(2);
    v2["stickers"].as_array_mut().unwrap().push(json!({
        "name": "bird",
        "category": "birds",
        "params": { "text": "tweet", "base_image": "images/bird.png" }
    }));
    serve_pack(
        &server,
        "/v2",
        &v2,
        &[("images/cat.png", b"cat v1"), ("sprites/dog.png", b"dog v1")],
    );
    let bird_mock = server.mock(|when, then| {
        when.method(GET).path("/v2/images/bird.png");
        then.status(500).body("boom");
    });

    let mut manager = manager_for(&server, &data_dir);
    manager.reload(false).unwrap();
    manager.install(&["foo".to_string()]).unwrap();

    let pack_dir = data_dir.join("foo");
    fs::write(
        pack_dir.join(CONFIG_FILENAME),
        format!(
            r#"{{ "update_source": {{ "type": "url", "url": "{}/v2" }} }}"#,
            server.base_url()
        ),
    )
    .unwrap();
    manager.reload(false).unwrap();

    let op = manager.update(None, false).unwrap();
    assert_eq!(op.failed.len(), 1);
    assert_eq!(op.failed[0].0, "foo");
    assert!(matches!(op.failed[0].1, Error::FetchError(_)));
    bird_mock.assert_calls(2);

    // the failed update left its marker, and the old manifest is intact
    assert!(pack_dir.join(UPDATING_MARKER_FILENAME).exists());

    // another update refuses to touch the marked directory
    let fetcher = SourceFetcher::with_config(&quick_fetch_config()).unwrap();
    let source = FileSource::Url {
        url: format!("{}/v2", server.base_url()),
    };
    let err = update::update_or_install(&fetcher, &pack_dir, &source, None).unwrap_err();
    assert!(matches!(err, Error::AlreadyUpdatingError(_)));

    // a plain rescan quarantines the pack
    let op = manager.reload(false).unwrap();
    assert_eq!(
        op.skipped,
        vec![("foo".to_string(), "updating marker present".to_string())]
    );
    assert!(manager.find_by_slug("foo", true).is_none());

    // an explicit recovery reload clears the marker and loads the pack
    let op = manager.reload(true).unwrap();
    assert_eq!(op.succeeded, vec!["foo"]);
    assert!(!pack_dir.join(UPDATING_MARKER_FILENAME).exists());
    let pack = manager.find_by_slug("foo", true).unwrap();
    assert_eq!(pack.manifest().version, 1);
    assert!(pack.missing_files().is_empty());
}

#[test]
fn test_recovered_pack_reports_missing_files() {
    let tmp = tempdir().unwrap();
    let data_dir = tmp.path().join("packs");
    let pack_dir = data_dir.join("foo");
    fs::create_dir_all(&pack_dir).unwrap();
    fs::write(
        pack_dir.join(MANIFEST_FILENAME),
        manifest_json(1).to_string(),
    )
    .unwrap();
    fs::write(pack_dir.join(UPDATING_MARKER_FILENAME), b"").unwrap();

    let mut manager = PackManager::new(&data_dir).unwrap();
    let op = manager.reload(true).unwrap();
    assert_eq!(op.succeeded, vec!["foo"]);

    let pack = manager.find_by_slug("foo", true).unwrap();
    let missing = pack.missing_files();
    assert!(missing.contains(&"images/cat.png".to_string()));
    assert!(missing.contains(&"sprites/dog.png".to_string()));
}

#[test]
fn test_install_without_checksums_then_force_redownloads() {
    let server = MockServer::start();
    let tmp = tempdir().unwrap();
    let data_dir = tmp.path().join("packs");

    let pack_base = format!("{}/packs/foo", server.base_url());
    serve_hub(
        &server,
        json!([{ "slug": "foo", "source": { "type": "url", "url": pack_base } }]),
    );
    // checksum.json is deliberately not served; its fetch 404s
    let manifest_mock = server.mock(|when, then| {
        when.method(GET).path("/packs/foo/manifest.json");
        then.status(200).json_body(manifest_json(1));
    });
    let cat_mock = server.mock(|when, then| {
        when.method(GET).path("/packs/foo/images/cat.png");
        then.status(200).body("cat v1");
    });
    let dog_mock = server.mock(|when, then| {
        when.method(GET).path("/packs/foo/sprites/dog.png");
        then.status(200).body("dog v1");
    });

    let mut manager = manager_for(&server, &data_dir);
    manager.reload(false).unwrap();
    let op = manager.install(&["foo".to_string()]).unwrap();
    assert_eq!(op.succeeded, vec!["foo"]);

    // without a checksum map, force re-downloads every shared file
    let op = manager.update(None, true).unwrap();
    assert_eq!(op.succeeded, vec!["foo"]);
    cat_mock.assert_calls(2);
    dog_mock.assert_calls(2);
    manifest_mock.assert_calls(2);
}

#[test]
fn test_update_reports_new_external_fonts() {
    let server = MockServer::start();
    let tmp = tempdir().unwrap();
    let pack_dir = tmp.path().join("foo");

    let mut manifest = manifest_json(1);
    manifest["external_fonts"] = json!([{ "path": "fonts/comic.ttf" }]);
    serve_pack(
        &server,
        "/packs/foo",
        &manifest,
        &[
            ("images/cat.png", b"cat v1"),
            ("sprites/dog.png", b"dog v1"),
            ("fonts/comic.ttf", b"font bytes"),
        ],
    );

    let fetcher = SourceFetcher::with_config(&quick_fetch_config()).unwrap();
    let source = FileSource::Url {
        url: format!("{}/packs/foo", server.base_url()),
    };

    let outcome = update::update_or_install(&fetcher, &pack_dir, &source, None).unwrap();
    assert_eq!(outcome.downloaded, 3);
    assert_eq!(outcome.updated_fonts, vec!["fonts/comic.ttf"]);

    // a second run transfers nothing, so the font is not reported again
    let outcome = update::update_or_install(&fetcher, &pack_dir, &source, None).unwrap();
    assert_eq!(outcome.downloaded, 0);
    assert!(outcome.updated_fonts.is_empty());
}

#[test]
fn test_fetch_retries_exhaust_attempts() {
    let server = MockServer::start();
    let flaky = server.mock(|when, then| {
        when.method(GET).path("/flaky.json");
        then.status(500).body("boom");
    });

    let config = FetchConfig {
        max_retries: 3,
        retry_delay: Duration::from_millis(1),
        ..FetchConfig::default()
    };
    let fetcher = SourceFetcher::with_config(&config).unwrap();
    let source = FileSource::Url {
        url: format!("{}/flaky.json", server.base_url()),
    };

    let err = fetcher.fetch(&source, &[]).unwrap_err();
    assert!(matches!(err, Error::FetchError(_)));
    assert!(err.to_string().contains("HTTP 500"));
    flaky.assert_calls(3);
}

#[test]
fn test_hub_scan_omits_broken_manifest() {
    let server = MockServer::start();
    serve_hub(
        &server,
        json!([
            { "slug": "good", "source": { "type": "url", "url": format!("{}/good", server.base_url()) } },
            { "slug": "broken", "source": { "type": "url", "url": format!("{}/broken", server.base_url()) } }
        ]),
    );
    server.mock(|when, then| {
        when.method(GET).path("/good/manifest.json");
        then.status(200).json_body(manifest_json(1));
    });
    // /broken/manifest.json is not mocked and 404s

    let fetcher = SourceFetcher::with_config(&quick_fetch_config()).unwrap();
    let hub_source = FileSource::Url {
        url: format!("{}/hub.json", server.base_url()),
    };

    let (hub_manifest, manifests) = hub::fetch_hub_and_packs(&fetcher, &hub_source).unwrap();
    assert_eq!(hub_manifest.len(), 2);
    assert_eq!(manifests.len(), 1);
    assert!(manifests.contains_key("good"));
    assert_eq!(manifests["good"].name, "Foo Pack");
}

#[test]
fn test_github_source_resolves_through_template() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(GET)
            .path("/gh/acme/packs/refs/heads/main/foo/manifest.json");
        then.status(200).json_body(manifest_json(1));
    });

    let config = FetchConfig {
        github_url_template: format!(
            "{}/gh/{{owner}}/{{repo}}/{{ref_path}}/{{path}}",
            server.base_url()
        ),
        ..quick_fetch_config()
    };
    let fetcher = SourceFetcher::with_config(&config).unwrap();
    let source = FileSource::GitHub {
        owner: "acme".to_string(),
        repo: "packs".to_string(),
        path: Some("foo".to_string()),
        git_ref: GitHubRef::Branch {
            branch: "main".to_string(),
        },
    };

    let manifest = hub::fetch_manifest(&fetcher, &source).unwrap();
    assert_eq!(manifest.name, "Foo Pack");
    mock.assert_calls(1);
}
