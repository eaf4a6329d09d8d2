use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use image_organizer_core::{
    cross_platform::CrossPlatformReconciler,
    deduplication::{load_candidates, ReviewDecision},
    discovery::{collect_local_records, discover_images, DiscoveryOptions},
    logging::init_logger,
    staging::{DeletionOperation, OperationStatus, SafeDeleter, StageReport, TransitionReport},
    days_to_duration, Config, FileRecord, ProtectionPolicy, RemoteFile,
};
use log::{info, LevelFilter};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "image-organizer")]
#[command(about = "Safely remove duplicate images with staged, reversible deletion")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbosity level
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List staging operations
    ListStaging {
        /// Also list undone operations, and deleted ones that still hold files.
        /// Fully deleted operations are only recorded in operations.log
        #[arg(long)]
        all: bool,
    },

    /// Move files selected for deletion into the staging area
    Stage {
        /// Review decision file with `keep` and `delete` lists
        #[arg(long, conflicts_with = "input", required_unless_present = "input")]
        decision: Option<PathBuf>,

        /// Duplicate candidates from a scan; references are kept
        #[arg(long)]
        input: Option<PathBuf>,

        /// Reason recorded with the operation
        #[arg(long, default_value = "Duplicate removal")]
        reason: String,

        /// Show what would be staged without moving anything
        #[arg(long)]
        dry_run: bool,
    },

    /// Restore the files of a staging operation
    Undo {
        /// Operation ID
        operation_id: String,
    },

    /// Delete the files of a staging operation
    ConfirmDelete {
        /// Operation ID
        operation_id: String,

        /// Unlink files instead of sending them to the trash
        #[arg(long)]
        permanent: bool,

        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },

    /// Add a protected folder
    Protect {
        #[arg(long)]
        folder: String,
    },

    /// Remove a protected folder
    Unprotect {
        #[arg(long)]
        folder: String,
    },

    /// List protected folders
    Protected,

    /// Purge staging operations older than the undo window
    Clean {
        /// Age in days; defaults to the configured undo window
        #[arg(long)]
        days: Option<u64>,
    },

    /// Find files present both locally and on the cloud drive
    CrossCheck {
        /// Local directories to scan
        #[arg(long = "local", required = true)]
        local: Vec<PathBuf>,

        /// JSON listing of remote files
        #[arg(long)]
        remote: PathBuf,

        /// Write duplicate groups to this file
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Generate default configuration file
    GenerateConfig {
        /// Path to save configuration file
        #[arg(default_value = "image-organizer.json")]
        path: PathBuf,
    },
}

fn main() -> Result<(), anyhow::Error> {
    // Parse command line arguments
    let cli = Cli::parse();

    if let Commands::GenerateConfig { path } = &cli.command {
        let config = Config::default();
        config.save_to_file(path)?;
        println!("Configuration file generated at: {}", path.display());
        return Ok(());
    }

    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::load_default()?,
    };
    config.validate()?;

    // Set log level based on verbosity
    let console_level = match cli.verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    init_logger(&config.log_dir(), console_level)
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    match cli.command {
        Commands::ListStaging { all } => list_staging(&config, all),
        Commands::Stage {
            decision,
            input,
            reason,
            dry_run,
        } => {
            let decision = match (decision, input) {
                (Some(path), _) => ReviewDecision::load(&path)
                    .with_context(|| format!("Could not read decision file {}", path.display()))?,
                (None, Some(path)) => ReviewDecision::from_candidates(
                    &load_candidates(&path).with_context(|| {
                        format!("Could not read candidates file {}", path.display())
                    })?,
                ),
                (None, None) => bail!("Either --decision or --input is required"),
            };
            stage(&config, &decision, &reason, dry_run)
        }
        Commands::Undo { operation_id } => undo(&config, &operation_id),
        Commands::ConfirmDelete {
            operation_id,
            permanent,
            yes,
        } => confirm_delete(&config, &operation_id, permanent, yes),
        Commands::Protect { folder } => {
            let mut policy = ProtectionPolicy::new(config);
            if policy.add(&folder)? {
                println!("Added protected folder: {}", folder.trim());
            } else {
                println!("Already protected: {}", folder.trim());
            }
            Ok(())
        }
        Commands::Unprotect { folder } => {
            let mut policy = ProtectionPolicy::new(config);
            if policy.remove(&folder)? {
                println!("Removed protected folder: {}", folder.trim());
            } else {
                println!("Not a protected folder: {}", folder.trim());
            }
            Ok(())
        }
        Commands::Protected => {
            let policy = ProtectionPolicy::new(config);
            if policy.tokens().is_empty() {
                println!("No protected folders");
            }
            for token in policy.tokens() {
                println!("  {}", token);
            }
            Ok(())
        }
        Commands::Clean { days } => {
            let max_age = match days {
                Some(days) => days_to_duration(days),
                None => config.max_undo_age(),
            };
            let deleter = SafeDeleter::from_config(&config)?;
            let purged = deleter.clean_old_operations(max_age)?;
            println!("Purged {} old staging operations", purged);
            Ok(())
        }
        Commands::CrossCheck {
            local,
            remote,
            output,
        } => cross_check(&local, &remote, output.as_deref()),
        Commands::GenerateConfig { .. } => Ok(()),
    }
}

fn list_staging(config: &Config, all: bool) -> anyhow::Result<()> {
    let deleter = SafeDeleter::from_config(config)?;
    let operations: Vec<_> = deleter
        .list_staged_operations()?
        .into_iter()
        .filter(|op| is_listed(op, all))
        .collect();

    if operations.is_empty() {
        println!("No staging operations");
        return Ok(());
    }

    println!(
        "{:<26} {:<20} {:>6} {:>12} {:<8} Reason",
        "Operation", "Created", "Files", "Size", "Status"
    );
    for op in &operations {
        println!(
            "{:<26} {:<20} {:>6} {:>12} {:<8} {}",
            op.operation_id,
            op.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            op.files_staged,
            format_size(op.total_size()),
            op.status,
            op.reason
        );
    }
    Ok(())
}

/// Operations still in the ledger; `--all` adds the finished ones
fn is_listed(operation: &DeletionOperation, all: bool) -> bool {
    all || operation.status == OperationStatus::Staged
}

fn stage(
    config: &Config,
    decision: &ReviewDecision,
    reason: &str,
    dry_run: bool,
) -> anyhow::Result<()> {
    if decision.delete.is_empty() {
        println!("No files selected for deletion");
        return Ok(());
    }

    let deleter = SafeDeleter::from_config(config)?;
    println!(
        "Files to keep: {}, files to delete: {}",
        decision.keep.len(),
        decision.delete.len()
    );

    if dry_run {
        let preview = deleter.preview(&decision.delete);
        for path in &preview.ready {
            println!("  would stage {}", path.display());
        }
        for skipped in &preview.skipped {
            println!("  would skip {} ({})", skipped.path.display(), skipped.reason);
        }
        for failure in &preview.failed {
            println!("  cannot stage {}: {}", failure.path.display(), failure.error);
        }
        println!(
            "Dry run: {} files ({}) would be staged",
            preview.ready.len(),
            format_size(preview.ready_bytes)
        );
        return Ok(());
    }

    let report = deleter.stage_decision(decision, reason)?;
    print_stage_report(&report);
    if !report.success() {
        bail!("No files were staged");
    }
    Ok(())
}

fn print_stage_report(report: &StageReport) {
    for skipped in &report.skipped {
        println!("  skipped {} ({})", skipped.path.display(), skipped.reason);
    }
    for failure in &report.failed {
        println!("  failed {}: {}", failure.path.display(), failure.error);
    }
    println!(
        "Staged {} files ({}) - operation {}",
        report.files_staged(),
        format_size(report.bytes_staged()),
        report.operation_id
    );
    if report.success() {
        println!("To undo:    image-organizer undo {}", report.operation_id);
        println!(
            "To confirm: image-organizer confirm-delete {}",
            report.operation_id
        );
    }
}

fn undo(config: &Config, operation_id: &str) -> anyhow::Result<()> {
    let deleter = SafeDeleter::from_config(config)?;
    let report = deleter.undo(operation_id)?;
    if let Some(refusal) = report.refused {
        bail!("Cannot undo {}: {}", operation_id, refusal);
    }

    print_transition_issues(&report);
    println!(
        "Restored {}/{} files",
        report.processed, report.total_entries
    );
    Ok(())
}

fn confirm_delete(
    config: &Config,
    operation_id: &str,
    permanent: bool,
    yes: bool,
) -> anyhow::Result<()> {
    let deleter = SafeDeleter::from_config(config)?;
    let operation = deleter.ledger().read_operation(operation_id)?;
    if operation.status != OperationStatus::Staged {
        bail!(
            "Operation {} is {}, only staged operations can be deleted",
            operation_id,
            operation.status
        );
    }

    let use_trash = !permanent && config.safety.use_recycle_bin;
    println!(
        "Operation {}: {} files ({}) - {}",
        operation.operation_id,
        operation.files_staged,
        format_size(operation.total_size()),
        operation.reason
    );
    if !use_trash {
        println!("Files will be deleted permanently and cannot be recovered.");
    }

    if !yes && !prompt_delete()? {
        println!("Deletion cancelled");
        return Ok(());
    }

    let report = deleter.confirm(operation_id, use_trash)?;
    if let Some(refusal) = report.refused {
        bail!("Cannot delete {}: {}", operation_id, refusal);
    }

    print_transition_issues(&report);
    println!(
        "Deleted {}/{} files{}",
        report.processed,
        report.total_entries,
        if use_trash { " (sent to trash)" } else { "" }
    );
    Ok(())
}

fn prompt_delete() -> io::Result<bool> {
    print!("Type DELETE to confirm: ");
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim() == "DELETE")
}

fn print_transition_issues(report: &TransitionReport) {
    for skipped in &report.skipped {
        println!("  skipped {} ({})", skipped.path.display(), skipped.reason);
    }
    for failure in &report.failed {
        println!("  failed {}: {}", failure.path.display(), failure.error);
    }
}

fn cross_check(local: &[PathBuf], remote: &Path, output: Option<&Path>) -> anyhow::Result<()> {
    let paths = discover_images(local, &DiscoveryOptions::default())?;
    info!("Discovered {} local images", paths.len());

    let listing = std::fs::read_to_string(remote)
        .with_context(|| format!("Could not read remote listing {}", remote.display()))?;
    let remote_files: Vec<RemoteFile> = serde_json::from_str(&listing)
        .with_context(|| format!("Invalid remote listing {}", remote.display()))?;

    let mut reconciler = CrossPlatformReconciler::new();
    for record in collect_local_records(&paths) {
        reconciler.add_local(record);
    }
    for file in remote_files {
        reconciler.add_remote(FileRecord::from(file));
    }

    let groups = reconciler.reconcile();
    let stats = reconciler.statistics();

    for group in &groups {
        println!(
            "{} ({} files, {})",
            group.display_name(),
            group.total_files(),
            format_size(group.total_size())
        );
        for member in &group.members {
            println!("  [{:?}] {}", member.platform, member.location);
        }
    }
    println!(
        "{} cross-platform groups, {} files; local {}, remote {}, potential savings {}",
        stats.duplicate_groups,
        stats.total_files,
        format_size(stats.local_space),
        format_size(stats.remote_space),
        format_size(stats.potential_savings)
    );

    if let Some(output) = output {
        std::fs::write(output, serde_json::to_string_pretty(&groups)?)
            .with_context(|| format!("Could not write {}", output.display()))?;
        println!("Results written to {}", output.display());
    }
    Ok(())
}

fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} B", bytes)
    } else {
        format!("{:.1} {}", size, UNITS[unit])
    }
}
