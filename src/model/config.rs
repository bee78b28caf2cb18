// src/model/config.rs

//! Local pack configuration and the manifest-default merge rule
//!
//! A pack's config is user-owned and persisted separately from the manifest,
//! so local edits survive manifest updates. Every field is optional: an unset
//! field defers to the manifest's `default_config`, a set field wins. The
//! merge is field-by-field; list fields replace wholesale, they are never
//! concatenated.

use serde::{Deserialize, Serialize};

use super::source::FileSource;

/// Local, user-editable pack configuration (all fields optional)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PackConfig {
    /// Where updates are fetched from; written by the update engine
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_source: Option<FileSource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disabled: Option<bool>,
    /// Command words bound to this pack, replacing the manifest's defaults
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commands: Option<Vec<String>>,
    /// Extra command words appended after `commands`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extend_commands: Option<Vec<String>>,
}

/// The effective configuration after merging manifest defaults with the
/// local config (local precedence)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergedConfig {
    pub update_source: Option<FileSource>,
    pub disabled: bool,
    pub commands: Vec<String>,
    pub extend_commands: Vec<String>,
}

impl MergedConfig {
    /// All command words in declaration order, deduplicated
    pub fn effective_commands(&self) -> Vec<String> {
        let mut seen = Vec::new();
        for command in self.commands.iter().chain(self.extend_commands.iter()) {
            if !seen.contains(command) {
                seen.push(command.clone());
            }
        }
        seen
    }
}

/// Merge manifest defaults with the local config, local values winning
/// field-by-field
pub fn merge_config(defaults: &PackConfig, local: &PackConfig) -> MergedConfig {
    MergedConfig {
        update_source: local
            .update_source
            .clone()
            .or_else(|| defaults.update_source.clone()),
        disabled: local.disabled.or(defaults.disabled).unwrap_or(false),
        commands: local
            .commands
            .clone()
            .or_else(|| defaults.commands.clone())
            .unwrap_or_default(),
        extend_commands: local
            .extend_commands
            .clone()
            .or_else(|| defaults.extend_commands.clone())
            .unwrap_or_default(),
    }
}
