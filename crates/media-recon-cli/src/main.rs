mod commands;
mod logging;
mod progress;

use std::path::Path;
use std::process;

use anyhow::Context;
use chrono::Local;
use clap::{CommandFactory, Parser};
use colored::*;
use commands::{Cli, Commands, DeletedArgs, LevelsArgs, ModeArg, PlanArgs, RestoreArgs, VerifyArgs};
use dotenv::dotenv;
use media_recon_core::engine::{default_output_prefix, DeletionRunOptions};
use media_recon_core::history::ScanMode;
use media_recon_core::inventory::levels::{summarize_levels, LevelSummary};
use media_recon_core::inventory::{
    run_plan, BackupAllowlist, Category, DeletedSet, FileListScanner, InventoryClassifier,
    LocalFsProbe,
};
use media_recon_core::paths::FolderFilter;
use media_recon_core::restore::{BackupVerifier, RestoreExecutor};
use media_recon_core::{AppConfig, ArrClient, EntityKind, Error, ReconcileEngine, TimeWindow};
use progress::CliReporter;
use tracing::{error, info, warn};

fn main() {
    dotenv().ok();

    let code = {
        let _guard = logging::init_logger();
        match run(Cli::parse()) {
            Ok(()) => 0,
            Err(err) => {
                error!("{:#}", err);
                exit_code(&err)
            }
        }
    };
    process::exit(code);
}

/// 2 for bad operator input, 1 for everything else.
fn exit_code(err: &anyhow::Error) -> i32 {
    match err.downcast_ref::<Error>() {
        Some(e) if e.is_configuration() => 2,
        _ => 1,
    }
}

fn run(args: Cli) -> anyhow::Result<()> {
    let config = media_recon_core::config::load_configuration()
        .map_err(Error::from)
        .context("Error loading configuration")?;

    match args.command {
        Some(Commands::Deleted(args)) => run_deleted(&config, args),
        Some(Commands::Plan(args)) => run_plan_command(&config, args),
        Some(Commands::Restore(args)) => run_restore(&config, args),
        Some(Commands::VerifyBackup(args)) => run_verify(&config, args),
        Some(Commands::Levels(args)) => run_levels(&config, args),
        Some(Commands::PrintConfig) => {
            println!("Configuration: {:#?}", redacted(&config));
            Ok(())
        }
        None => {
            let _ = Cli::command().print_long_help();
            Ok(())
        }
    }
}

fn redacted(config: &AppConfig) -> AppConfig {
    let mut copy = config.clone();
    for service in [&mut copy.radarr, &mut copy.sonarr] {
        if service.api_key.is_some() {
            service.api_key = Some("********".to_string());
        }
    }
    copy
}

/// CLI flag, then the conventional environment variable, then config.
fn service_settings(config: &AppConfig, args: &DeletedArgs, kind: EntityKind) -> Result<(String, String), Error> {
    let (env_url, env_key, section) = match kind {
        EntityKind::Movie => (&args.radarr_url, &args.radarr_api_key, &config.radarr),
        EntityKind::Episode => (&args.sonarr_url, &args.sonarr_api_key, &config.sonarr),
    };
    let name = kind.service_name();
    let url = args
        .url
        .clone()
        .or_else(|| env_url.clone())
        .or_else(|| section.url.clone())
        .ok_or_else(|| {
            Error::invalid_input(format!(
                "no {} URL: pass --url, set {}_URL or {}.url",
                name,
                name.to_uppercase(),
                name
            ))
        })?;
    let key = args
        .api_key
        .clone()
        .or_else(|| env_key.clone())
        .or_else(|| section.api_key.clone())
        .ok_or_else(|| {
            Error::invalid_input(format!(
                "no {} API key: pass --api-key, set {}_API_KEY or {}.api_key",
                name,
                name.to_uppercase(),
                name
            ))
        })?;
    Ok((url, key))
}

fn run_deleted(config: &AppConfig, args: DeletedArgs) -> anyhow::Result<()> {
    let kind = EntityKind::from(args.kind);
    let date = args
        .date
        .clone()
        .unwrap_or_else(|| Local::now().format("%Y-%m-%d").to_string());
    let window = TimeWindow::for_local_date(&date, &args.tz_offset)?;

    let (url, key) = service_settings(config, &args, kind)?;
    let client = ArrClient::new(kind, &url, &key, &config.http)?;
    client.check_status().map_err(|e| {
        Error::invalid_input(format!("cannot reach {} at {}: {}", kind.service_name(), client.base_url(), e))
    })?;

    let mode = match args.mode {
        ModeArg::Since => ScanMode::Since,
        ModeArg::Paged => ScanMode::paged(&config.history),
    };
    let options = DeletionRunOptions {
        mode,
        output_prefix: args
            .out
            .clone()
            .unwrap_or_else(|| default_output_prefix(kind, &date).into()),
        redownload: args.redownload,
    };

    info!("Reconciling {} deletions for {} ({})", kind, date, window);
    let reporter = CliReporter::new();
    let result = ReconcileEngine::new(&client, &client, config).run(window, &options, &reporter)?;

    println!();
    info!(
        "History: {}, Probe: {}, Remediation: {}",
        format!("{:.2}s", result.history_duration.as_secs_f64()).green(),
        format!("{:.2}s", result.probe_duration.as_secs_f64()).green(),
        format!("{:.2}s", result.remediation_duration.as_secs_f64()).green(),
    );
    info!(
        "{} deleted {}(s): {} restored, {} still missing",
        format!("{}", result.reconciliation.total()).cyan(),
        kind,
        format!("{}", result.reconciliation.restored.len()).green(),
        format!("{}", result.reconciliation.still_missing.len()).red(),
    );
    let bad_timestamps = result.scan_stats.skipped_bad_timestamp + result.extract_stats.missing_timestamp;
    if bad_timestamps > 0 || result.extract_stats.missing_entity_id > 0 {
        warn!(
            "Skipped {} record(s) with bad timestamps and {} deletion(s) without an id",
            bad_timestamps, result.extract_stats.missing_entity_id
        );
    }
    if result.reconciliation.probe_failures() > 0 {
        warn!(
            "{} probe(s) failed and were counted as still missing",
            result.reconciliation.probe_failures()
        );
    }

    print_groups("Still missing", &result.groups.missing);
    print_groups("Restored", &result.groups.restored);
    println!(
        "\nMissing paths:  {}\nRestored paths: {}",
        result.missing_file.display(),
        result.restored_file.display()
    );

    if let Some(remediation) = &result.remediation {
        let monitored = remediation.monitored_counts();
        let searches = remediation.search_counts();
        info!(
            "Monitored: {} set, {} skipped, {} failed; searches: {} sent, {} failed ({} ids)",
            format!("{}", monitored.succeeded).green(),
            monitored.skipped,
            format!("{}", monitored.failed).red(),
            format!("{}", searches.succeeded).green(),
            format!("{}", searches.failed).red(),
            remediation.searched_ids(),
        );
    }
    Ok(())
}

fn print_groups(title: &str, groups: &std::collections::BTreeMap<String, usize>) {
    if groups.is_empty() {
        return;
    }
    println!("\n{}", title.bold());
    let mut items: Vec<(&String, &usize)> = groups.iter().collect();
    items.sort_by(|a, b| b.1.cmp(a.1).then(a.0.cmp(b.0)));
    for (group, count) in items {
        println!("  {:>6}  {}", count, group);
    }
}

fn scanner_for(config: &AppConfig, input: &Path, folder: Option<&str>) -> Result<FileListScanner, Error> {
    let filter = FolderFilter::new(folder)?;
    Ok(FileListScanner::new(input, filter).with_progress_every(config.scan.progress_every))
}

fn run_plan_command(config: &AppConfig, args: PlanArgs) -> anyhow::Result<()> {
    if !args.base_path.is_absolute() {
        return Err(Error::invalid_input(format!(
            "base path must be absolute: {}",
            args.base_path.display()
        ))
        .into());
    }
    if !args.base_path.is_dir() {
        return Err(Error::invalid_input(format!(
            "base path is not a directory: {}",
            args.base_path.display()
        ))
        .into());
    }

    let backup = BackupAllowlist::load(&args.backup_file)?;
    let deleted = DeletedSet::load_all(&args.deleted_lists)?;
    let restore = match (args.restore, &args.archive_root, &args.restore_root) {
        (true, Some(archive), Some(restore_root)) => Some(RestoreExecutor::new(archive, restore_root)?),
        (true, _, _) => {
            return Err(Error::invalid_input("--restore needs --archive-root and --restore-root").into())
        }
        _ => None,
    };

    let fs_probe = LocalFsProbe::new(&args.base_path, args.strict_files);
    let classifier = InventoryClassifier::new(&fs_probe, &backup, &deleted);
    let scanner = scanner_for(config, &args.list.input, args.list.folder.as_deref())?;
    let reporter = CliReporter::new();

    info!(
        "Classifying {} against {} ({} backup folders, {} deleted paths)",
        args.list.input.display(),
        args.base_path.display(),
        backup.len(),
        deleted.len()
    );
    let report = run_plan(&scanner, &classifier, &args.list.out_dir, &reporter)?;

    println!();
    info!(
        "{} lines: {} blank, {} filtered, {} considered",
        report.lines.lines_read, report.lines.blank, report.lines.filtered, report.lines.considered
    );
    for category in Category::ALL {
        let count = format!("{}", report.tally.count(category));
        let count = match category {
            Category::Found => count.green(),
            Category::Backup => count.cyan(),
            Category::Redownload => count.yellow(),
            Category::Missing => count.red(),
        };
        let path = report
            .output(category)
            .map(|p| p.display().to_string())
            .unwrap_or_default();
        println!("  {:<11} {:>10}  {}", category.to_string(), count, path);
    }
    print_breakdown("Missing by top-level folder", &report.tally.missing_by_top_level);
    print_breakdown("Missing by extension", &report.tally.missing_by_extension);

    if let Some(exec) = restore {
        let Some(backup_list) = report.output(Category::Backup) else {
            return Ok(());
        };
        let restore_scanner = scanner_for(config, backup_list, None)?;
        let restored = exec.run(&restore_scanner, &args.list.out_dir, &reporter)?;
        print_restore(&restored);
    }
    Ok(())
}

fn print_breakdown(title: &str, counts: &std::collections::BTreeMap<String, u64>) {
    if counts.is_empty() {
        return;
    }
    println!("\n{}", title.bold());
    let mut items: Vec<(&String, &u64)> = counts.iter().collect();
    items.sort_by(|a, b| b.1.cmp(a.1).then(a.0.cmp(b.0)));
    for (key, count) in items {
        println!("  {:>10}  {}", count, key);
    }
}

fn print_restore(report: &media_recon_core::restore::RestoreReport) {
    println!();
    info!(
        "Restore: {} ok, {} skipped, {} errors, {} bytes copied",
        format!("{}", report.counts.succeeded).green(),
        format!("{}", report.counts.skipped).yellow(),
        format!("{}", report.counts.failed).red(),
        report.bytes_copied,
    );
    println!(
        "  OK log:      {}\n  Skipped log: {}\n  Error log:   {}",
        report.ok_log.display(),
        report.skipped_log.display(),
        report.errors_log.display()
    );
}

fn run_restore(config: &AppConfig, args: RestoreArgs) -> anyhow::Result<()> {
    let exec = RestoreExecutor::new(&args.archive_root, &args.restore_root)?;
    let scanner = scanner_for(config, &args.list.input, args.list.folder.as_deref())?;
    let reporter = CliReporter::new();
    let report = exec.run(&scanner, &args.list.out_dir, &reporter)?;
    print_restore(&report);
    Ok(())
}

fn run_verify(config: &AppConfig, args: VerifyArgs) -> anyhow::Result<()> {
    let verifier = BackupVerifier::new(&args.archive_root, args.strict_files)?;
    let scanner = scanner_for(config, &args.list.input, args.list.folder.as_deref())?;
    let reporter = CliReporter::new();
    let report = verifier.run(&scanner, &args.list.out_dir, &reporter)?;

    println!();
    info!(
        "{} confirmed on the archive, {} missing",
        format!("{}", report.confirmed).green(),
        format!("{}", report.missing).red(),
    );
    println!(
        "  Confirmed: {}\n  Missing:   {}",
        report.confirmed_log.display(),
        report.missing_log.display()
    );
    Ok(())
}

fn run_levels(config: &AppConfig, args: LevelsArgs) -> anyhow::Result<()> {
    let backup = match &args.backup_file {
        Some(path) => BackupAllowlist::load(path)?,
        None => BackupAllowlist::default(),
    };
    let scanner = scanner_for(config, &args.input, args.folder.as_deref())?;
    let reporter = CliReporter::new();
    let summary = summarize_levels(&scanner, args.levels, &reporter)?;

    println!();
    info!("{} files considered", summary.lines.considered);
    for level in 1..=args.levels {
        println!("\n{}", format!("Level {}", level).bold());
        for (key, count) in summary.top(level, args.top) {
            let flag = if LevelSummary::is_backed_up(key, &backup) {
                "backup".cyan().to_string()
            } else {
                String::new()
            };
            println!("  {:>10}  {}  {}", count, key, flag);
        }
    }
    Ok(())
}
