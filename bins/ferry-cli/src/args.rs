//! Command-line surface.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use ferry_core::{
    CompareHash, DeleteDestination, DeleteSnapshotsOption, HardlinkHandling,
    HashValidationOption, LocalHashStorageMode, OutputLevel, OutputType, OverwriteOption,
    PermanentDeleteOption, TrailingDot,
};

/// Bulk data-transfer planning engine for local and cloud object stores.
#[derive(Parser, Debug)]
#[command(name = "ferry", version)]
#[command(about = "Plan and drive bulk object transfers between local and cloud storage")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Console output format.
    #[arg(long, global = true, default_value_t = OutputType::Text)]
    pub output_type: OutputType,

    /// Console verbosity.
    #[arg(long, global = true, default_value_t = OutputLevel::Default)]
    pub output_level: OutputLevel,

    /// Log verbosity: DEBUG, INFO, WARNING, ERROR or NONE.
    #[arg(long, global = true, default_value = "INFO")]
    pub log_level: String,

    /// Throughput cap handed to the execution layer, in megabits per second.
    #[arg(long, global = true)]
    pub cap_mbps: Option<f64>,

    /// Skip the new-version check on startup.
    #[arg(long, global = true)]
    pub skip_version_check: bool,

    /// Additional host suffixes trusted for token pass-through.
    #[arg(long, global = true)]
    pub trusted_microsoft_suffixes: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Copy objects from a source endpoint to a destination endpoint.
    #[command(visible_alias = "cp")]
    Copy(TransferArgs),

    /// Make the destination match the source, copying changed objects and
    /// optionally deleting destination-only extras.
    Sync(SyncArgs),

    /// Remove objects at an endpoint.
    #[command(visible_alias = "rm")]
    Remove(RemoveArgs),

    /// Resume a cancelled or failed job from its persisted plan.
    Resume(ResumeArgs),

    /// Cancel a job.
    Cancel {
        job_id: String,
    },

    /// Inspect known jobs.
    Jobs {
        #[command(subcommand)]
        command: JobsCommand,
    },

    /// Enumerate the objects at an endpoint.
    List(ListArgs),

    /// Run the planning pipeline against a synthetic enumeration.
    Bench(BenchArgs),

    /// Show the environment variables ferry reads.
    Env,
}

/// Filter flags shared by copy, sync and remove.
#[derive(Args, Debug, Default)]
pub struct FilterArgs {
    /// Semicolon-separated shell globs on the file name; keep matches.
    #[arg(long)]
    pub include_pattern: Option<String>,

    /// Semicolon-separated shell globs on the file name; drop matches.
    #[arg(long)]
    pub exclude_pattern: Option<String>,

    /// Semicolon-separated relative-path prefixes; keep matches.
    #[arg(long)]
    pub include_path: Option<String>,

    /// Semicolon-separated relative-path prefixes; drop matches.
    #[arg(long)]
    pub exclude_path: Option<String>,

    /// Semicolon-separated regexes over the relative path; keep matches.
    #[arg(long)]
    pub include_regex: Option<String>,

    /// Semicolon-separated regexes over the relative path; drop matches.
    #[arg(long)]
    pub exclude_regex: Option<String>,

    /// Keep objects last modified at or before this ISO 8601 timestamp.
    #[arg(long)]
    pub include_before: Option<String>,

    /// Keep objects last modified at or after this ISO 8601 timestamp.
    #[arg(long)]
    pub include_after: Option<String>,

    /// Attribute letters (e.g. RHS); keep files carrying any of them.
    #[arg(long)]
    pub include_attributes: Option<String>,

    /// Attribute letters; drop files carrying any of them.
    #[arg(long)]
    pub exclude_attributes: Option<String>,

    /// Semicolon-separated blob types to drop (BlockBlob, PageBlob, AppendBlob).
    #[arg(long)]
    pub exclude_blob_type: Option<String>,

    /// Semicolon-separated container names to drop at an account root.
    #[arg(long)]
    pub exclude_container: Option<String>,
}

#[derive(Args, Debug)]
pub struct TransferArgs {
    pub source: String,
    pub destination: String,

    /// Descend into subdirectories.
    #[arg(long)]
    pub recursive: bool,

    /// Explicit endpoint pair (e.g. LocalBlob), overriding inference.
    #[arg(long)]
    pub from_to: Option<String>,

    #[command(flatten)]
    pub filters: FilterArgs,

    /// Block size hint for the execution layer, in MiB.
    #[arg(long)]
    pub block_size_mb: Option<f64>,

    /// Compute and store an MD5 of each uploaded object.
    #[arg(long)]
    pub put_md5: bool,

    /// How strictly downloads validate a stored MD5.
    #[arg(long, default_value_t = HashValidationOption::FailIfDifferent)]
    pub check_md5: HashValidationOption,

    /// Carry system properties (times, attributes) with each object.
    #[arg(long)]
    pub preserve_info: bool,

    /// Carry permissions with each object.
    #[arg(long)]
    pub preserve_permissions: bool,

    /// Carry POSIX properties with each object.
    #[arg(long)]
    pub preserve_posix_properties: bool,

    /// Dereference symlinks instead of skipping them.
    #[arg(long, conflicts_with = "preserve_symlinks")]
    pub follow_symlinks: bool,

    /// Re-create symlinks at the destination instead of skipping them.
    #[arg(long)]
    pub preserve_symlinks: bool,

    /// Hardlink handling: follow or skip.
    #[arg(long, default_value_t = HardlinkHandling::Follow)]
    pub hardlinks: HardlinkHandling,

    /// Existing-destination policy.
    #[arg(long, default_value_t = OverwriteOption::True)]
    pub overwrite: OverwriteOption,

    /// Overwrite read-only destination objects.
    #[arg(long)]
    pub force_if_read_only: bool,

    /// Emit folder stub objects for backends that model folders as stubs.
    #[arg(long)]
    pub include_directory_stub: bool,

    /// File of newline-separated relative paths to transfer.
    #[arg(long)]
    pub list_of_files: Option<PathBuf>,

    /// Print the orders this invocation would schedule, without scheduling.
    #[arg(long)]
    pub dry_run: bool,

    /// Customer-provided encryption key, referenced by name.
    #[arg(long, conflicts_with = "cpk_by_value")]
    pub cpk_by_name: Option<String>,

    /// Customer-provided encryption key taken from the environment.
    #[arg(long)]
    pub cpk_by_value: bool,

    /// Trailing-dot handling on file-share endpoints.
    #[arg(long, default_value_t = TrailingDot::Enable)]
    pub trailing_dot: TrailingDot,
}

#[derive(Args, Debug)]
pub struct SyncArgs {
    pub source: String,
    pub destination: String,

    /// Descend into subdirectories (defaults to true for sync).
    #[arg(
        long,
        default_value_t = true,
        action = clap::ArgAction::Set,
        num_args = 0..=1,
        default_missing_value = "true"
    )]
    pub recursive: bool,

    /// Explicit endpoint pair, overriding inference.
    #[arg(long)]
    pub from_to: Option<String>,

    #[command(flatten)]
    pub filters: FilterArgs,

    /// What to do with destination objects absent from the source.
    #[arg(long, default_value_t = DeleteDestination::False)]
    pub delete_destination: DeleteDestination,

    /// Content comparison: None (time-based) or MD5.
    #[arg(long, default_value_t = CompareHash::None)]
    pub compare_hash: CompareHash,

    /// Where locally computed hashes would be cached.
    #[arg(long, default_value_t = LocalHashStorageMode::HiddenFiles)]
    pub local_hash_storage_mode: LocalHashStorageMode,

    /// Copy on any modification-time difference instead of newer-only.
    #[arg(long)]
    pub mirror_mode: bool,

    /// Compute and store an MD5 of each uploaded object.
    #[arg(long)]
    pub put_md5: bool,

    /// Carry system properties with each object.
    #[arg(long)]
    pub preserve_info: bool,

    /// Carry permissions with each object.
    #[arg(long)]
    pub preserve_permissions: bool,

    /// Carry POSIX properties with each object.
    #[arg(long)]
    pub preserve_posix_properties: bool,

    /// Dereference symlinks instead of skipping them.
    #[arg(long)]
    pub follow_symlinks: bool,

    /// Print the orders this invocation would schedule, without scheduling.
    #[arg(long)]
    pub dry_run: bool,

    /// Trailing-dot handling on file-share endpoints.
    #[arg(long, default_value_t = TrailingDot::Enable)]
    pub trailing_dot: TrailingDot,
}

#[derive(Args, Debug)]
pub struct RemoveArgs {
    pub target: String,

    /// Descend into subdirectories.
    #[arg(long)]
    pub recursive: bool,

    /// Explicit endpoint pair, overriding inference.
    #[arg(long)]
    pub from_to: Option<String>,

    #[command(flatten)]
    pub filters: FilterArgs,

    /// File of newline-separated relative paths to remove.
    #[arg(long)]
    pub list_of_files: Option<PathBuf>,

    /// File of version identifiers of the targeted object to remove.
    #[arg(long)]
    pub list_of_versions: Option<PathBuf>,

    /// Snapshot handling: none, include or only.
    #[arg(long, default_value_t = DeleteSnapshotsOption::None)]
    pub delete_snapshots: DeleteSnapshotsOption,

    /// Permanently delete soft-deleted snapshots/versions.
    #[arg(long, default_value_t = PermanentDeleteOption::None)]
    pub permanent_delete: PermanentDeleteOption,

    /// Remove read-only objects as well.
    #[arg(long)]
    pub force_if_read_only: bool,

    /// Print the orders this invocation would schedule, without scheduling.
    #[arg(long)]
    pub dry_run: bool,

    /// Trailing-dot handling on file-share endpoints.
    #[arg(long, default_value_t = TrailingDot::Enable)]
    pub trailing_dot: TrailingDot,
}

#[derive(Args, Debug)]
pub struct ResumeArgs {
    pub job_id: String,

    /// Fresh source SAS, since the planned one may have expired.
    #[arg(long)]
    pub source_sas: Option<String>,

    /// Fresh destination SAS.
    #[arg(long)]
    pub destination_sas: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum JobsCommand {
    /// List all known jobs, newest first.
    List {
        /// Only jobs with this status.
        #[arg(long)]
        with_status: Option<String>,
    },

    /// Show a job's progress summary, or its transfers by status.
    Show {
        job_id: String,
        /// List the transfers whose status equals this value.
        #[arg(long)]
        with_status: Option<String>,
    },
}

#[derive(Args, Debug)]
pub struct ListArgs {
    pub endpoint: String,

    /// Comma-separated extra columns: VersionId, BlobType, ContentType,
    /// LastModifiedTime, AccessTier.
    #[arg(long)]
    pub properties: Option<String>,

    /// Print a running object/byte tally while enumerating.
    #[arg(long)]
    pub running_tally: bool,

    /// Print sizes as raw byte counts.
    #[arg(long)]
    pub machine_readable: bool,

    /// Explicit endpoint kind override (e.g. BlobLocal's source side).
    #[arg(long)]
    pub from_to: Option<String>,
}

#[derive(Args, Debug)]
pub struct BenchArgs {
    /// Number of synthetic objects to push through the pipeline.
    #[arg(long, default_value_t = 100_000)]
    pub count: u64,

    /// Size attributed to each synthetic object, in bytes.
    #[arg(long, default_value_t = 1024)]
    pub size_per_object: u64,

    /// Orders per job part.
    #[arg(long, default_value_t = ferry_jobs::DEFAULT_TRANSFERS_PER_PART)]
    pub transfers_per_part: usize,
}
