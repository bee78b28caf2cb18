// src/main.rs

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::Path;
use stickerbox::hub;
use stickerbox::manager::{ManagerConfig, PackManager};
use stickerbox::model::{FileSource, CHECKSUM_FILENAME};
use stickerbox::op::OpResult;
use stickerbox::pack::StickerPack;
use tracing::info;

#[derive(Parser)]
#[command(name = "stickerbox")]
#[command(author, version, about = "Sticker pack manager with hub discovery and checksum-diffed updates", long_about = None)]
struct Cli {
    /// Directory holding the installed packs
    #[arg(long, global = true, default_value = "./data/sticker-packs")]
    data_dir: String,

    /// Override the hub catalog with a plain URL
    #[arg(long, global = true)]
    hub_url: Option<String>,

    /// HTTP(S) proxy for all fetches
    #[arg(long, global = true)]
    proxy: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// List installed packs, or the hub catalog with --online
    List {
        /// List the hub catalog instead of installed packs
        #[arg(long)]
        online: bool,
        /// Hide disabled, updating and deleted packs
        #[arg(long)]
        no_unavailable: bool,
    },
    /// Show one pack in detail
    Show {
        /// Pack slug or name
        query: String,
    },
    /// Install packs from the hub
    Install {
        /// Hub slugs to install
        #[arg(required = true)]
        slugs: Vec<String>,
    },
    /// Update installed packs from their update sources
    Update {
        /// Packs to update (omit with --all to update everything)
        slugs: Vec<String>,
        /// Update every installed pack
        #[arg(long)]
        all: bool,
        /// Re-run the update even when the remote version is not newer
        #[arg(long)]
        force: bool,
    },
    /// Delete installed packs and their files
    Delete {
        /// Packs to delete
        #[arg(required = true)]
        slugs: Vec<String>,
        /// Confirm the deletion
        #[arg(long)]
        yes: bool,
    },
    /// Enable packs
    Enable {
        /// Packs to enable
        #[arg(required = true)]
        slugs: Vec<String>,
    },
    /// Disable packs
    Disable {
        /// Packs to disable
        #[arg(required = true)]
        slugs: Vec<String>,
    },
    /// Rescan the data directory
    Reload {
        /// Clear leftover updating markers from interrupted updates
        #[arg(long)]
        clear_markers: bool,
    },
    /// Write a checksum.json for a pack directory, for publishing
    Checksum {
        /// Pack directory to checksum
        dir: String,
    },
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: Shell,
    },
}

fn open_manager(cli: &Cli, clear_markers: bool) -> Result<(PackManager, OpResult<String>)> {
    let mut config = ManagerConfig::default();
    if let Some(url) = &cli.hub_url {
        config.hub_source = FileSource::Url { url: url.clone() };
    }
    if let Some(proxy) = &cli.proxy {
        config.fetch.proxy = Some(proxy.clone());
    }

    let mut manager = PackManager::with_config(&cli.data_dir, config)?;
    let op = manager.reload(clear_markers)?;
    Ok((manager, op))
}

fn status_suffix(pack: &StickerPack) -> String {
    let mut flags = Vec::new();
    if pack.merged_config().disabled {
        flags.push("disabled");
    }
    if pack.updating() {
        flags.push("updating");
    }
    if pack.deleted() {
        flags.push("deleted");
    }
    if flags.is_empty() {
        String::new()
    } else {
        format!(" [{}]", flags.join(", "))
    }
}

/// Print a batch result and turn any per-item failures into a nonzero exit
fn finish(op: OpResult<String>) -> Result<()> {
    println!("{}", op.render());
    if op.has_failures() {
        return Err(anyhow::anyhow!("{} operation(s) failed", op.failed.len()));
    }
    Ok(())
}

fn main() -> Result<()> {
    // Initialize tracing subscriber for logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match &cli.command {
        Some(Commands::List {
            online,
            no_unavailable,
        }) => {
            let (manager, _) = open_manager(&cli, false)?;
            if *online {
                let (hub_manifest, manifests) =
                    hub::fetch_hub_and_packs(manager.fetcher(), manager.hub_source())?;
                if hub_manifest.is_empty() {
                    println!("The hub lists no packs.");
                    return Ok(());
                }
                println!("Hub packs:");
                for info in &hub_manifest {
                    let name = manifests
                        .get(&info.slug)
                        .map(|m| m.name.as_str())
                        .unwrap_or("manifest unavailable");
                    let installed = if manager.find_by_slug(&info.slug, true).is_some() {
                        " [installed]"
                    } else {
                        ""
                    };
                    println!("  {} ({}){}", info.slug, name, installed);
                }
                println!("\nTotal: {} pack(s)", hub_manifest.len());
            } else {
                let packs: Vec<&StickerPack> = if *no_unavailable {
                    manager.available_packs().collect()
                } else {
                    manager.packs().iter().collect()
                };
                if packs.is_empty() {
                    println!("No packs installed.");
                    return Ok(());
                }
                println!("Installed packs:");
                for pack in &packs {
                    println!(
                        "  {} v{} ({}){}",
                        pack.slug(),
                        pack.manifest().version,
                        pack.manifest().name,
                        status_suffix(pack)
                    );
                }
                println!("\nTotal: {} pack(s)", packs.len());
            }
            Ok(())
        }
        Some(Commands::Show { query }) => {
            let (manager, _) = open_manager(&cli, false)?;
            let pack = manager
                .find(query, true)
                .ok_or_else(|| anyhow::anyhow!("No pack matching '{}'", query))?;
            let manifest = pack.manifest();

            println!("Pack: {}", pack.slug());
            println!("  Name: {}", manifest.name);
            println!("  Description: {}", manifest.description);
            println!("  Version: {}", manifest.version);
            let categories: BTreeSet<&str> = manifest
                .stickers
                .iter()
                .map(|sticker| sticker.category.as_str())
                .collect();
            println!(
                "  Stickers: {} in {} categories",
                manifest.stickers.len(),
                categories.len()
            );
            let commands = pack.merged_config().effective_commands();
            if !commands.is_empty() {
                println!("  Commands: {}", commands.join(", "));
            }
            match &pack.merged_config().update_source {
                Some(source) => println!("  Update source: {}", source),
                None => println!("  Update source: (none)"),
            }
            match manifest.resolve_sample() {
                Ok(sample) => println!("  Sample text: {}", sample.text),
                Err(e) => println!("  Sample text: unavailable ({})", e),
            }
            let status = status_suffix(pack);
            if status.is_empty() {
                println!("  Status: available");
            } else {
                println!("  Status:{}", status);
            }
            let missing = pack.missing_files();
            if !missing.is_empty() {
                println!("  Missing files: {}", missing.join(", "));
            }
            if !manifest.external_fonts.is_empty() {
                let fonts: Vec<&str> = manifest
                    .external_fonts
                    .iter()
                    .map(|font| font.path.as_str())
                    .collect();
                println!("  External fonts: {}", fonts.join(", "));
            }
            Ok(())
        }
        Some(Commands::Install { slugs }) => {
            let (mut manager, _) = open_manager(&cli, false)?;
            info!("Installing {} pack(s)", slugs.len());
            let op = manager.install(slugs)?;
            finish(op)
        }
        Some(Commands::Update { slugs, all, force }) => {
            if *all && !slugs.is_empty() {
                return Err(anyhow::anyhow!("specify pack slugs or --all, not both"));
            }
            if !*all && slugs.is_empty() {
                return Err(anyhow::anyhow!("specify pack slugs, or --all to update everything"));
            }

            let (mut manager, _) = open_manager(&cli, false)?;
            let targets = if *all { None } else { Some(slugs.as_slice()) };
            let op = manager.update(targets, *force)?;
            finish(op)
        }
        Some(Commands::Delete { slugs, yes }) => {
            if !yes {
                return Err(anyhow::anyhow!(
                    "deleting removes pack files from disk, pass --yes to confirm"
                ));
            }

            let (mut manager, _) = open_manager(&cli, false)?;
            let mut op = OpResult::default();
            for slug in slugs {
                match manager.delete(slug) {
                    Ok(()) => op.succeeded.push(slug.clone()),
                    Err(e) => op.failed.push((slug.clone(), e)),
                }
            }
            finish(op)
        }
        Some(Commands::Enable { slugs }) => {
            let (mut manager, _) = open_manager(&cli, false)?;
            let op = manager.enable(slugs);
            finish(op)
        }
        Some(Commands::Disable { slugs }) => {
            let (mut manager, _) = open_manager(&cli, false)?;
            let op = manager.disable(slugs);
            finish(op)
        }
        Some(Commands::Reload { clear_markers }) => {
            let (_, op) = open_manager(&cli, *clear_markers)?;
            println!("{}", op.render());
            Ok(())
        }
        Some(Commands::Checksum { dir }) => {
            let dir = Path::new(dir);
            let map = stickerbox::update::collect_checksums(dir)?;
            let path = dir.join(CHECKSUM_FILENAME);
            let mut text = serde_json::to_string_pretty(&map)?;
            text.push('\n');
            fs::write(&path, text)?;
            println!("Wrote {} checksum(s) to {}", map.len(), path.display());
            Ok(())
        }
        Some(Commands::Completions { shell }) => {
            let mut cmd = Cli::command();
            clap_complete::generate(*shell, &mut cmd, "stickerbox", &mut io::stdout());
            Ok(())
        }
        None => {
            // No command provided, show help
            println!("Stickerbox v{}", env!("CARGO_PKG_VERSION"));
            println!("Run 'stickerbox --help' for usage information");
            Ok(())
        }
    }
}
