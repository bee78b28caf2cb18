// src/model/source.rs

//! File source descriptors
//!
//! A [`FileSource`] names a remote base location that relative paths are
//! fetched under: either a plain URL or a GitHub repository ref resolved
//! through a raw-content URL template. Sources are immutable value types and
//! appear verbatim in manifests, configs, and the hub catalog.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A git ref within a GitHub repository, either a branch or a tag
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GitHubRef {
    Branch { branch: String },
    Tag { tag: String },
}

impl GitHubRef {
    /// The plain ref name (branch or tag)
    pub fn name(&self) -> &str {
        match self {
            Self::Branch { branch } => branch,
            Self::Tag { tag } => tag,
        }
    }

    /// The fully qualified ref path used in raw-content URLs,
    /// e.g. `refs/heads/main` or `refs/tags/v1.2`
    pub fn ref_path(&self) -> String {
        match self {
            Self::Branch { branch } => format!("refs/heads/{}", branch),
            Self::Tag { tag } => format!("refs/tags/{}", tag),
        }
    }
}

/// Where a pack's (or the hub's) files live
///
/// Serialized with a `"type"` tag so manifests and configs read naturally:
///
/// ```json
/// { "type": "github", "owner": "lgc-NB2Dev", "repo": "meme-stickers-hub", "branch": "main" }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum FileSource {
    Url {
        url: String,
    },
    GitHub {
        owner: String,
        repo: String,
        /// Optional path prefix inside the repository
        #[serde(default, skip_serializing_if = "Option::is_none")]
        path: Option<String>,
        #[serde(flatten)]
        git_ref: GitHubRef,
    },
}

impl fmt::Display for FileSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Url { url } => write!(f, "{}", url),
            Self::GitHub {
                owner,
                repo,
                path,
                git_ref,
            } => {
                write!(f, "github:{}/{}@{}", owner, repo, git_ref.name())?;
                if let Some(path) = path {
                    write!(f, "/{}", path)?;
                }
                Ok(())
            }
        }
    }
}

/// The well-known hub catalog source
pub fn default_hub_source() -> FileSource {
    FileSource::GitHub {
        owner: "lgc-NB2Dev".to_string(),
        repo: "meme-stickers-hub".to_string(),
        path: Some("manifest.json".to_string()),
        git_ref: GitHubRef::Branch {
            branch: "main".to_string(),
        },
    }
}
