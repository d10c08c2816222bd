use clap::{Args, Parser, Subcommand, ValueEnum};
use media_recon_core::window::DEFAULT_UTC_OFFSET;
use media_recon_core::EntityKind;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "media-recon")]
#[command(about = "Reconcile a media library against its managers, disks and backups", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Find files deleted on a given day and check whether they came back
    Deleted(DeletedArgs),
    /// Classify a file list as FOUND / BACKUP / REDOWNLOAD / MISSING
    Plan(PlanArgs),
    /// Copy paths from the archive mount into the restore root
    Restore(RestoreArgs),
    /// Check that BACKUP paths exist on the archive mount
    VerifyBackup(VerifyArgs),
    /// Roll file counts up by directory depth
    Levels(LevelsArgs),
    /// Print configuration values
    PrintConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum KindArg {
    Movie,
    Episode,
}

impl From<KindArg> for EntityKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Movie => EntityKind::Movie,
            KindArg::Episode => EntityKind::Episode,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModeArg {
    /// Single "since" request
    Since,
    /// Newest-first pages
    Paged,
}

#[derive(Debug, Args)]
pub struct DeletedArgs {
    /// Entity type to reconcile
    #[arg(long, value_enum)]
    pub kind: KindArg,

    /// Local calendar date, YYYY-MM-DD (default: today)
    #[arg(long)]
    pub date: Option<String>,

    /// Fixed UTC offset applied to the whole date
    #[arg(long, allow_hyphen_values = true, default_value = DEFAULT_UTC_OFFSET)]
    pub tz_offset: String,

    #[arg(long, value_enum, default_value_t = ModeArg::Since)]
    pub mode: ModeArg,

    /// Service base URL (falls back to RADARR_URL / SONARR_URL and config)
    #[arg(long)]
    pub url: Option<String>,

    /// Service API key (falls back to RADARR_API_KEY / SONARR_API_KEY and config)
    #[arg(long)]
    pub api_key: Option<String>,

    /// Output prefix; writes <PREFIX>_missing.txt and <PREFIX>_restored.txt
    #[arg(long)]
    pub out: Option<PathBuf>,

    /// Re-monitor still-missing entities and queue a search for them
    #[arg(long)]
    pub redownload: bool,

    #[arg(long, env = "RADARR_URL", hide_env_values = true, hide = true)]
    pub radarr_url: Option<String>,
    #[arg(long, env = "RADARR_API_KEY", hide_env_values = true, hide = true)]
    pub radarr_api_key: Option<String>,
    #[arg(long, env = "SONARR_URL", hide_env_values = true, hide = true)]
    pub sonarr_url: Option<String>,
    #[arg(long, env = "SONARR_API_KEY", hide_env_values = true, hide = true)]
    pub sonarr_api_key: Option<String>,
}

#[derive(Debug, Args)]
pub struct ListArgs {
    /// Newline-delimited relative paths
    pub input: PathBuf,

    /// Only consider paths equal to or under this folder
    #[arg(long)]
    pub folder: Option<String>,

    /// Directory for output files
    #[arg(long, default_value = ".")]
    pub out_dir: PathBuf,
}

#[derive(Debug, Args)]
pub struct PlanArgs {
    #[command(flatten)]
    pub list: ListArgs,

    /// Absolute library root the paths are relative to
    #[arg(long)]
    pub base_path: PathBuf,

    /// Top-level folders that are backed up
    #[arg(long, default_value = "backup_folders.txt")]
    pub backup_file: PathBuf,

    /// Known-deleted path lists (repeatable)
    #[arg(long = "deleted-list")]
    pub deleted_lists: Vec<PathBuf>,

    /// Count only regular files as present
    #[arg(long)]
    pub strict_files: bool,

    /// Restore BACKUP paths after classification
    #[arg(long, requires_all = ["archive_root", "restore_root"])]
    pub restore: bool,

    #[arg(long)]
    pub archive_root: Option<PathBuf>,

    #[arg(long)]
    pub restore_root: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct RestoreArgs {
    #[command(flatten)]
    pub list: ListArgs,

    /// Read-only archive mount to copy from
    #[arg(long)]
    pub archive_root: PathBuf,

    /// Destination root; existing files are never overwritten
    #[arg(long)]
    pub restore_root: PathBuf,
}

#[derive(Debug, Args)]
pub struct VerifyArgs {
    #[command(flatten)]
    pub list: ListArgs,

    #[arg(long)]
    pub archive_root: PathBuf,

    #[arg(long)]
    pub strict_files: bool,
}

#[derive(Debug, Args)]
pub struct LevelsArgs {
    pub input: PathBuf,

    /// Directory depth to roll up to
    #[arg(long, default_value_t = 4)]
    pub levels: usize,

    /// Buckets listed per level
    #[arg(long, default_value_t = 20)]
    pub top: usize,

    #[arg(long)]
    pub folder: Option<String>,

    /// Flag buckets whose top-level folder is backed up
    #[arg(long)]
    pub backup_file: Option<PathBuf>,
}
