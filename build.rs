// build.rs

use clap::{Arg, Command};
use clap_mangen::Man;
use std::env;
use std::fs;
use std::path::PathBuf;

fn build_cli() -> Command {
    Command::new("stickerbox")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Sticker pack manager with hub discovery and checksum-diffed updates")
        .subcommand_required(false)
        .arg(
            Arg::new("data_dir")
                .long("data-dir")
                .value_name("DIR")
                .global(true)
                .default_value("./data/sticker-packs")
                .help("Directory holding the installed packs"),
        )
        .arg(
            Arg::new("hub_url")
                .long("hub-url")
                .value_name("URL")
                .global(true)
                .help("Override the hub catalog with a plain URL"),
        )
        .arg(
            Arg::new("proxy")
                .long("proxy")
                .value_name("URL")
                .global(true)
                .help("HTTP(S) proxy for all fetches"),
        )
        .subcommand(
            Command::new("list")
                .about("List installed packs, or the hub catalog with --online")
                .arg(
                    Arg::new("online")
                        .long("online")
                        .action(clap::ArgAction::SetTrue)
                        .help("List the hub catalog instead of installed packs"),
                )
                .arg(
                    Arg::new("no_unavailable")
                        .long("no-unavailable")
                        .action(clap::ArgAction::SetTrue)
                        .help("Hide disabled, updating and deleted packs"),
                ),
        )
        .subcommand(
            Command::new("show")
                .about("Show one pack in detail")
                .arg(Arg::new("query").required(true).help("Pack slug or name")),
        )
        .subcommand(
            Command::new("install")
                .about("Install packs from the hub")
                .arg(
                    Arg::new("slugs")
                        .required(true)
                        .num_args(1..)
                        .help("Hub slugs to install"),
                ),
        )
        .subcommand(
            Command::new("update")
                .about("Update installed packs from their update sources")
                .arg(Arg::new("slugs").num_args(0..).help("Packs to update"))
                .arg(
                    Arg::new("all")
                        .long("all")
                        .action(clap::ArgAction::SetTrue)
                        .help("Update every installed pack"),
                )
                .arg(
                    Arg::new("force")
                        .long("force")
                        .action(clap::ArgAction::SetTrue)
                        .help("Re-run the update even when the remote version is not newer"),
                ),
        )
        .subcommand(
            Command::new("delete")
                .about("Delete installed packs and their files")
                .arg(
                    Arg::new("slugs")
                        .required(true)
                        .num_args(1..)
                        .help("Packs to delete"),
                )
                .arg(
                    Arg::new("yes")
                        .long("yes")
                        .action(clap::ArgAction::SetTrue)
                        .help("Confirm the deletion"),
                ),
        )
        .subcommand(
            Command::new("enable")
                .about("Enable packs")
                .arg(
                    Arg::new("slugs")
                        .required(true)
                        .num_args(1..)
                        .help("Packs to enable"),
                ),
        )
        .subcommand(
            Command::new("disable")
                .about("Disable packs")
                .arg(
                    Arg::new("slugs")
                        .required(true)
                        .num_args(1..)
                        .help("Packs to disable"),
                ),
        )
        .subcommand(
            Command::new("reload")
                .about("Rescan the data directory")
                .arg(
                    Arg::new("clear_markers")
                        .long("clear-markers")
                        .action(clap::ArgAction::SetTrue)
                        .help("Clear leftover updating markers from interrupted updates"),
                ),
        )
        .subcommand(
            Command::new("checksum")
                .about("Write a checksum.json for a pack directory, for publishing")
                .arg(
                    Arg::new("dir")
                        .required(true)
                        .help("Pack directory to checksum"),
                ),
        )
        .subcommand(
            Command::new("completions")
                .about("Generate shell completions")
                .arg(
                    Arg::new("shell")
                        .required(true)
                        .value_parser(["bash", "elvish", "fish", "powershell", "zsh"])
                        .help("Shell to generate completions for"),
                ),
        )
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    // Create man directory
    let out_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR").unwrap());
    let man_dir = out_dir.join("man");
    fs::create_dir_all(&man_dir).expect("Failed to create man directory");

    // Generate main man page
    let cmd = build_cli();
    let man = Man::new(cmd);
    let mut buffer = Vec::new();
    man.render(&mut buffer).expect("Failed to render man page");

    let man_path = man_dir.join("stickerbox.1");
    fs::write(&man_path, buffer).expect("Failed to write man page");

    println!("cargo:warning=Man page generated at {}", man_path.display());
}
