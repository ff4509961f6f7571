//! treegraft CLI
//!
//! Entry point for the `treegraft` command-line tool.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process;

use treegraft::config::DEFAULT_CONFIG_FILE;
use treegraft::merge::{MergeReport, RootKind};
use treegraft::verify::verify_destination;
use treegraft::{GraftConfig, Pipeline, ProjectionMode};

#[derive(Parser)]
#[command(name = "treegraft")]
#[command(about = "Overlay tree materializer", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Materialize the merged tree into the destination root
    Materialize {
        /// Path to config file (default: treegraft.toml)
        #[arg(long, short = 'c')]
        config: Option<PathBuf>,

        /// Override the source root
        #[arg(long)]
        source: Option<PathBuf>,

        /// Override the overlay root
        #[arg(long)]
        overlay: Option<PathBuf>,

        /// Override the destination root
        #[arg(long)]
        dest: Option<PathBuf>,

        /// Override the projection mode (symlink or copy)
        #[arg(long)]
        mode: Option<ProjectionMode>,

        /// Resolve and report without touching the destination
        #[arg(long)]
        dry_run: bool,

        /// Print progress to stderr
        #[arg(long, short = 'v')]
        verbose: bool,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Print the projection plan without materializing anything
    Plan {
        /// Path to config file (default: treegraft.toml)
        #[arg(long, short = 'c')]
        config: Option<PathBuf>,

        /// Override the source root
        #[arg(long)]
        source: Option<PathBuf>,

        /// Override the overlay root
        #[arg(long)]
        overlay: Option<PathBuf>,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Check an existing destination against its manifest
    Verify {
        /// Path to config file (default: treegraft.toml)
        #[arg(long, short = 'c')]
        config: Option<PathBuf>,

        /// Destination root (default: dest_root from the config file)
        #[arg(long)]
        dest: Option<PathBuf>,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },
}

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Materialize {
            config,
            source,
            overlay,
            dest,
            mode,
            dry_run,
            verbose,
            json,
        } => {
            let mut cfg = load_config(config);
            apply_overrides(&mut cfg, source, overlay, dest, mode);
            run_materialize(cfg, dry_run, verbose, json);
        }
        Commands::Plan {
            config,
            source,
            overlay,
            json,
        } => {
            let mut cfg = load_config(config);
            apply_overrides(&mut cfg, source, overlay, None, None);
            run_plan(cfg, json);
        }
        Commands::Verify { config, dest, json } => {
            let dest_root = match dest {
                Some(path) => path,
                None => load_config(config).dest_root,
            };
            run_verify(&dest_root, json);
        }
    }
}

fn load_config(path: Option<PathBuf>) -> GraftConfig {
    let path = path.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
    match GraftConfig::from_file(&path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error loading config {}: {}", path.display(), e);
            process::exit(1);
        }
    }
}

fn apply_overrides(
    config: &mut GraftConfig,
    source: Option<PathBuf>,
    overlay: Option<PathBuf>,
    dest: Option<PathBuf>,
    mode: Option<ProjectionMode>,
) {
    if let Some(source) = source {
        config.source_root = source;
    }
    if let Some(overlay) = overlay {
        config.overlay_root = overlay;
    }
    if let Some(dest) = dest {
        config.dest_root = dest;
    }
    if let Some(mode) = mode {
        config.mode = mode;
    }
}

fn run_materialize(config: GraftConfig, dry_run: bool, verbose: bool, json: bool) {
    let pipeline = Pipeline::new(config).with_verbose(verbose);

    if dry_run {
        match pipeline.plan() {
            Ok(report) => print_plan(&report, json),
            Err(e) => {
                eprintln!("Error: {}", e);
                process::exit(e.exit_code());
            }
        }
        return;
    }

    match pipeline.materialize() {
        Ok(manifest) => {
            if json {
                match manifest.to_json() {
                    Ok(out) => println!("{}", out),
                    Err(e) => {
                        eprintln!("Error serializing manifest: {}", e);
                        process::exit(1);
                    }
                }
            } else {
                let (source, overlay) = manifest.root_counts();
                println!(
                    "Materialized '{}': {} entries ({} source, {} overlay), {} patch(es)",
                    manifest.root,
                    manifest.entries.len(),
                    source,
                    overlay,
                    manifest.patches.len()
                );
                if !manifest.pending.is_empty() {
                    println!("Unresolved paths: {}", manifest.pending.join(", "));
                }
            }
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(e.exit_code());
        }
    }
}

fn run_plan(config: GraftConfig, json: bool) {
    let pipeline = Pipeline::new(config);
    match pipeline.plan() {
        Ok(report) => print_plan(&report, json),
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(e.exit_code());
        }
    }
}

fn print_plan(report: &MergeReport, json: bool) {
    if json {
        let entries: Vec<serde_json::Value> = report
            .instructions
            .iter()
            .map(|i| {
                serde_json::json!({
                    "path": i.rel_path.to_string(),
                    "root": root_name(i.root),
                })
            })
            .collect();
        let out = serde_json::json!({
            "entries": entries,
            "steps": report.steps,
            "pending": report.pending.iter().map(|p| p.to_string()).collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string_pretty(&out).unwrap_or_default());
    } else {
        for instruction in &report.instructions {
            println!(
                "{:<7} {}",
                root_name(instruction.root).to_uppercase(),
                instruction.rel_path
            );
        }
        if !report.pending.is_empty() {
            eprintln!("Unresolved after {} steps:", report.steps);
            for pending in &report.pending {
                eprintln!("  {}", pending);
            }
        }
    }
}

fn root_name(root: RootKind) -> &'static str {
    match root {
        RootKind::Source => "source",
        RootKind::Overlay => "overlay",
    }
}

fn run_verify(dest_root: &std::path::Path, json: bool) {
    match verify_destination(dest_root) {
        Ok(report) => {
            if json {
                let out = serde_json::json!({
                    "checked": report.checked,
                    "missing": report.missing,
                    "wrong_target": report.wrong_target,
                    "extra": report.extra,
                    "passed": report.passed(),
                });
                println!("{}", serde_json::to_string_pretty(&out).unwrap_or_default());
            } else {
                println!("Checked {} entries", report.checked);
                for path in &report.missing {
                    println!("MISSING {}", path);
                }
                for path in &report.wrong_target {
                    println!("RETARGETED {}", path);
                }
                for path in &report.extra {
                    println!("EXTRA {}", path);
                }
                if report.passed() {
                    println!("OK");
                }
            }
            if !report.passed() {
                process::exit(40);
            }
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    }
}
