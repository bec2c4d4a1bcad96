// crates/update-gate-cli/src/main.rs
// ============================================================================
// Module: Update Gate CLI Entry Point
// Description: Command dispatcher for manifest, store, launch, and audit tasks.
// Purpose: Drive the updates runtime offline from files on disk.
// Dependencies: clap, serde, serde_jcs, thiserror, update-gate-config, update-gate-core
// ============================================================================

//! ## Overview
//! The Update Gate CLI wires a runtime from the configuration file and exposes
//! its operations as subcommands: manifest admission, embedded installation,
//! asset resolution, launch selection and outcome recording, store inspection
//! and cleanup, and audit log maintenance. Results are written to stdout as
//! canonical JSON; failures are written to stderr with a failure exit code.
//! Security posture: every file argument is untrusted and read under a size
//! limit.

// ============================================================================
// SECTION: Modules
// ============================================================================


// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::ArgAction;
use clap::ArgGroup;
use clap::Args;
use clap::CommandFactory;
use clap::Parser;
use clap::Subcommand;
use clap::ValueEnum;
use serde::Serialize;
use thiserror::Error;
use update_gate_config::UpdateGateConfig;
use update_gate_config::UpdateStoreType;
use update_gate_core::AssetKey;
use update_gate_core::AssetLocation;
use update_gate_core::AssetResolution;
use update_gate_core::Clock;
use update_gate_core::LaunchOutcome;
use update_gate_core::ManifestEnvelope;
use update_gate_core::ManifestFilters;
use update_gate_core::ProjectInformation;
use update_gate_core::SystemClock;
use update_gate_core::Timestamp;
use update_gate_core::Update;
use update_gate_core::UpdateId;
use update_gate_core::UpdatesRuntime;
use update_gate_core::audit::AuditRecord;
use update_gate_core::core::manifest::MAX_MANIFEST_BYTES;

// ============================================================================
// SECTION: Limits
// ============================================================================

/// Maximum size of a certificate chain PEM input.
const MAX_CERTIFICATE_CHAIN_BYTES: usize = 256 * 1024;
/// Maximum size of a downloaded asset input.
const MAX_ASSET_BYTES: usize = 256 * 1024 * 1024;

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(name = "update-gate", disable_help_subcommand = true, disable_version_flag = true)]
struct Cli {
    /// Print version information and exit.
    #[arg(long = "version", action = ArgAction::SetTrue, global = true)]
    show_version: bool,
    /// Optional config file path (defaults to update-gate.toml or env override).
    #[arg(long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,
    /// Selected subcommand to execute.
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Supported CLI subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Configuration utilities.
    Config {
        /// Selected config subcommand.
        #[command(subcommand)]
        command: ConfigCommand,
    },
    /// Manifest verification and admission.
    Manifest {
        /// Selected manifest subcommand.
        #[command(subcommand)]
        command: ManifestCommand,
    },
    /// Embedded update installation.
    Embedded {
        /// Selected embedded subcommand.
        #[command(subcommand)]
        command: EmbeddedCommand,
    },
    /// Asset download outcomes.
    Asset {
        /// Selected asset subcommand.
        #[command(subcommand)]
        command: AssetCommand,
    },
    /// Launch selection and outcome recording.
    Launch {
        /// Selected launch subcommand.
        #[command(subcommand)]
        command: LaunchCommand,
    },
    /// Update store inspection and cleanup.
    Store {
        /// Selected store subcommand.
        #[command(subcommand)]
        command: StoreCommand,
    },
    /// Audit log maintenance.
    Audit {
        /// Selected audit subcommand.
        #[command(subcommand)]
        command: AuditCommand,
    },
}

/// Config subcommands.
#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Validate an Update Gate configuration file.
    Validate,
}

/// Manifest subcommands.
#[derive(Subcommand, Debug)]
enum ManifestCommand {
    /// Run a manifest through the trust gate without storing it.
    Verify(ManifestArgs),
    /// Admit a manifest and insert the resulting update.
    Admit(ManifestArgs),
}

/// Manifest body and the headers delivered with it.
#[derive(Args, Debug)]
struct ManifestArgs {
    /// Manifest body file.
    #[arg(long, value_name = "PATH")]
    body: PathBuf,
    /// Signature header value (`sig="...", keyid="..."`).
    #[arg(long, value_name = "HEADER")]
    signature: Option<String>,
    /// PEM certificate chain delivered with the manifest (leaf first).
    #[arg(long = "certificate-chain", value_name = "PATH")]
    certificate_chain: Option<PathBuf>,
    /// Signing algorithm hint.
    #[arg(long, value_name = "ALG")]
    algorithm: Option<String>,
    /// Manifest filters header value.
    #[arg(long, value_name = "HEADER")]
    filters: Option<String>,
}

/// Embedded update subcommands.
#[derive(Subcommand, Debug)]
enum EmbeddedCommand {
    /// Install a bundled manifest as the embedded update.
    Install(EmbeddedInstallCommand),
}

/// Arguments for `embedded install`.
#[derive(Args, Debug)]
struct EmbeddedInstallCommand {
    /// Embedded manifest file.
    #[arg(long, value_name = "PATH")]
    manifest: PathBuf,
}

/// Asset subcommands.
#[derive(Subcommand, Debug)]
enum AssetCommand {
    /// Record the download outcome of one asset.
    Resolve(AssetResolveCommand),
}

/// Arguments for `asset resolve`.
#[derive(Args, Debug)]
#[command(group(ArgGroup::new("outcome").required(true).args(["file", "failed", "cancelled"])))]
struct AssetResolveCommand {
    /// Update identifier.
    #[arg(long, value_name = "UUID")]
    update: String,
    /// Asset key.
    #[arg(long, value_name = "KEY")]
    key: String,
    /// Downloaded asset bytes, verified against the declared hash.
    #[arg(long, value_name = "PATH")]
    file: Option<PathBuf>,
    /// Record a failed download.
    #[arg(long, value_name = "REASON")]
    failed: Option<String>,
    /// Record a cancelled download.
    #[arg(long, action = ArgAction::SetTrue)]
    cancelled: bool,
}

/// Launch subcommands.
#[derive(Subcommand, Debug)]
enum LaunchCommand {
    /// Select the update for the next launch.
    Select,
    /// Record the outcome of a launch.
    Record(LaunchRecordCommand),
    /// Report whether a newer update should replace the launched one.
    Check(LaunchCheckCommand),
}

/// Arguments for `launch check`.
#[derive(Args, Debug)]
struct LaunchCheckCommand {
    /// Update the running process launched.
    #[arg(long, value_name = "UUID")]
    launched: Option<String>,
}

/// Arguments for `launch record`.
#[derive(Args, Debug)]
struct LaunchRecordCommand {
    /// Update identifier.
    #[arg(long, value_name = "UUID")]
    update: String,
    /// Launch outcome.
    #[arg(long, value_enum)]
    outcome: LaunchOutcomeArg,
}

/// Launch outcome argument.
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum LaunchOutcomeArg {
    /// Launch succeeded.
    Success,
    /// Launch failed.
    Failure,
}

impl From<LaunchOutcomeArg> for LaunchOutcome {
    fn from(value: LaunchOutcomeArg) -> Self {
        Self::from_success(value == LaunchOutcomeArg::Success)
    }
}

/// Store subcommands.
#[derive(Subcommand, Debug)]
enum StoreCommand {
    /// List stored updates.
    List,
    /// Delete updates superseded by the launched one.
    Reap(StoreReapCommand),
}

/// Arguments for `store reap`.
#[derive(Args, Debug)]
struct StoreReapCommand {
    /// Identifier of the update that was launched.
    #[arg(long, value_name = "UUID")]
    launched: String,
}

/// Audit subcommands.
#[derive(Subcommand, Debug)]
enum AuditCommand {
    /// Remove file audit records older than a timestamp.
    Purge(AuditPurgeCommand),
    /// Print file audit records at or after a timestamp.
    Show(AuditShowCommand),
}

/// Arguments for `audit purge`.
#[derive(Args, Debug)]
struct AuditPurgeCommand {
    /// Cutoff in milliseconds since the Unix epoch.
    #[arg(long = "before-ms", value_name = "MILLIS")]
    before_ms: i64,
}

/// Arguments for `audit show`.
#[derive(Args, Debug)]
struct AuditShowCommand {
    /// Lower bound in milliseconds since the Unix epoch.
    #[arg(long = "since-ms", value_name = "MILLIS", default_value_t = 0)]
    since_ms: i64,
}

// ============================================================================
// SECTION: Output Types
// ============================================================================

/// Output of `config validate`.
#[derive(Debug, Serialize)]
struct ConfigValidateOutput {
    /// Configured scope key.
    scope_key: String,
    /// Configured runtime version.
    runtime_version: String,
    /// Store backend label.
    store: &'static str,
    /// True when code signing is configured.
    code_signing: bool,
    /// `expo-expect-signature` header to send with manifest requests.
    expect_signature: Option<String>,
}

/// Output of `manifest verify`.
#[derive(Debug, Serialize)]
struct ManifestVerifyOutput {
    /// Admitted update identifier.
    update_id: UpdateId,
    /// True when the signature was verified.
    is_verified: bool,
    /// Project claim from the certificate chain.
    project_information: Option<ProjectInformation>,
    /// Filters delivered with the manifest.
    manifest_filters: Option<ManifestFilters>,
}

/// Output of `manifest admit` and `embedded install`.
#[derive(Debug, Serialize)]
struct InsertOutput {
    /// True when the update was new to the store.
    inserted: bool,
    /// Stored update.
    update: UpdateSummary,
}

/// Output of `asset resolve`.
#[derive(Debug, Serialize)]
struct AssetResolveOutput {
    /// Resolved asset key.
    asset_key: AssetKey,
    /// Asset status after recording.
    asset_status: &'static str,
    /// Owning update after recording.
    update: UpdateSummary,
}

/// Output of `launch select`.
#[derive(Debug, Serialize)]
struct LaunchSelectOutput {
    /// Selected update identifier.
    update_id: UpdateId,
    /// True when the embedded update was used as a fallback.
    is_embedded_fallback: bool,
    /// Bundle entry point location.
    launch_asset: AssetLocation,
    /// Location of every asset by key.
    assets: BTreeMap<String, AssetLocation>,
}

/// Output of `launch check`.
#[derive(Debug, Serialize)]
struct LaunchCheckOutput {
    /// True when a newer launchable update should be loaded.
    should_reload: bool,
}

/// Output of `store list`.
#[derive(Debug, Serialize)]
struct StoreListOutput {
    /// Stored updates.
    updates: Vec<UpdateSummary>,
}

/// Output of `audit purge`.
#[derive(Debug, Serialize)]
struct AuditPurgeOutput {
    /// Number of removed records.
    removed: usize,
}

/// Output of `audit show`.
#[derive(Debug, Serialize)]
struct AuditShowOutput {
    /// Matching records in log order.
    records: Vec<AuditRecord>,
}

/// Update fields shown by the CLI; the manifest body is omitted.
#[derive(Debug, Serialize)]
struct UpdateSummary {
    /// Update identifier.
    id: UpdateId,
    /// Application scope.
    scope_key: String,
    /// Targeted runtime version.
    runtime_version: String,
    /// Manifest creation time in milliseconds.
    created_at_ms: i64,
    /// Lifecycle status label.
    status: &'static str,
    /// True when the manifest passed code-signing verification.
    is_verified: bool,
    /// True when the update was removed from selection.
    ineligible: bool,
    /// Total successful launches.
    successful_launch_count: u32,
    /// Total failed launches.
    failed_launch_count: u32,
    /// Failed launches since the last success.
    consecutive_failed_launch_count: u32,
    /// Last selection time in milliseconds.
    last_accessed_ms: Option<i64>,
    /// Number of declared assets.
    asset_count: usize,
    /// Number of resolved assets.
    resolved_asset_count: usize,
}

impl From<&Update> for UpdateSummary {
    fn from(update: &Update) -> Self {
        Self {
            id: update.id,
            scope_key: update.scope_key.as_str().to_string(),
            runtime_version: update.runtime_version.as_str().to_string(),
            created_at_ms: update.created_at.as_unix_millis(),
            status: update.status.as_str(),
            is_verified: update.is_verified,
            ineligible: update.ineligible,
            successful_launch_count: update.successful_launch_count,
            failed_launch_count: update.failed_launch_count,
            consecutive_failed_launch_count: update.consecutive_failed_launch_count,
            last_accessed_ms: update.last_accessed.map(Timestamp::as_unix_millis),
            asset_count: update.assets.len(),
            resolved_asset_count: update.assets.iter().filter(|asset| asset.is_resolved()).count(),
        }
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// CLI error wrapper for user-facing messages.
#[derive(Debug, Error)]
#[error("{message}")]
struct CliError {
    /// Human-readable error message.
    message: String,
}

impl CliError {
    /// Constructs a new [`CliError`] from a message.
    const fn new(message: String) -> Self {
        Self {
            message,
        }
    }
}

/// CLI result alias for fallible operations.
type CliResult<T> = Result<T, CliError>;

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// CLI entry point returning an exit code.
fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(err) => emit_error(&err.to_string()),
    }
}

/// Executes the CLI command dispatcher.
fn run() -> CliResult<ExitCode> {
    let cli = Cli::parse();
    if cli.show_version {
        let version = env!("CARGO_PKG_VERSION");
        write_stdout_line(&format!("update-gate {version}"))
            .map_err(|err| CliError::new(output_error("stdout", &err)))?;
        return Ok(ExitCode::SUCCESS);
    }

    let Some(command) = cli.command else {
        show_help()?;
        return Ok(ExitCode::SUCCESS);
    };

    let config = load_config(cli.config.as_deref())?;
    match command {
        Commands::Config {
            command,
        } => command_config(&config, &command),
        Commands::Manifest {
            command,
        } => command_manifest(&config, &command),
        Commands::Embedded {
            command,
        } => command_embedded(&config, &command),
        Commands::Asset {
            command,
        } => command_asset(&config, &command),
        Commands::Launch {
            command,
        } => command_launch(&config, &command),
        Commands::Store {
            command,
        } => command_store(&config, &command),
        Commands::Audit {
            command,
        } => command_audit(&config, &command),
    }
}

/// Prints CLI help.
fn show_help() -> CliResult<()> {
    let mut command = Cli::command();
    command.print_help().map_err(|err| CliError::new(output_error("stdout", &err)))?;
    write_stdout_line("").map_err(|err| CliError::new(output_error("stdout", &err)))?;
    Ok(())
}

// ============================================================================
// SECTION: Config Commands
// ============================================================================

/// Executes config subcommands.
fn command_config(config: &UpdateGateConfig, command: &ConfigCommand) -> CliResult<ExitCode> {
    match command {
        ConfigCommand::Validate => {
            let store = match config.store.store_type {
                UpdateStoreType::Memory => "memory",
                UpdateStoreType::Sqlite => "sqlite",
            };
            let code_signing = config
                .build_code_signing()
                .map_err(|err| CliError::new(format!("config validate failed: {err}")))?;
            write_json(&ConfigValidateOutput {
                scope_key: config.updates.scope_key.clone(),
                runtime_version: config.updates.runtime_version.clone(),
                store,
                code_signing: code_signing.is_some(),
                expect_signature: code_signing
                    .as_ref()
                    .map(|config| config.accept_signature_header().to_string()),
            })?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

// ============================================================================
// SECTION: Manifest Commands
// ============================================================================

/// Executes manifest subcommands.
fn command_manifest(config: &UpdateGateConfig, command: &ManifestCommand) -> CliResult<ExitCode> {
    let runtime = assemble_runtime(config)?;
    let now = SystemClock.now();
    match command {
        ManifestCommand::Verify(args) => {
            let envelope = read_envelope(args)?;
            let admitted = runtime
                .gate()
                .admit(&envelope, now)
                .map_err(|err| CliError::new(format!("manifest rejected: {err}")))?;
            write_json(&ManifestVerifyOutput {
                update_id: admitted.update.id,
                is_verified: admitted.update.is_verified,
                project_information: admitted.project_information,
                manifest_filters: admitted.manifest_filters,
            })?;
        }
        ManifestCommand::Admit(args) => {
            let envelope = read_envelope(args)?;
            let outcome = runtime
                .gate()
                .admit_into(&envelope, now, runtime.store())
                .map_err(|err| CliError::new(format!("manifest rejected: {err}")))?;
            write_json(&InsertOutput {
                inserted: outcome.is_inserted(),
                update: UpdateSummary::from(outcome.update()),
            })?;
        }
    }
    Ok(ExitCode::SUCCESS)
}

/// Builds a manifest envelope from command arguments.
fn read_envelope(args: &ManifestArgs) -> CliResult<ManifestEnvelope> {
    let body = read_input(&args.body, "manifest body", MAX_MANIFEST_BYTES)?;
    let certificate_chain = args
        .certificate_chain
        .as_deref()
        .map(|path| read_text(path, "certificate chain", MAX_CERTIFICATE_CHAIN_BYTES))
        .transpose()?;
    Ok(ManifestEnvelope {
        body,
        signature: args.signature.clone(),
        certificate_chain,
        algorithm_hint: args.algorithm.clone(),
        manifest_filters: args.filters.clone(),
    })
}

// ============================================================================
// SECTION: Embedded Commands
// ============================================================================

/// Executes embedded subcommands.
fn command_embedded(config: &UpdateGateConfig, command: &EmbeddedCommand) -> CliResult<ExitCode> {
    match command {
        EmbeddedCommand::Install(command) => {
            let runtime = assemble_runtime(config)?;
            let body = read_input(&command.manifest, "embedded manifest", MAX_MANIFEST_BYTES)?;
            let outcome = runtime
                .install_embedded_update(&body)
                .map_err(|err| CliError::new(format!("embedded install failed: {err}")))?;
            write_json(&InsertOutput {
                inserted: outcome.is_inserted(),
                update: UpdateSummary::from(outcome.update()),
            })?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

// ============================================================================
// SECTION: Asset Commands
// ============================================================================

/// Executes asset subcommands.
fn command_asset(config: &UpdateGateConfig, command: &AssetCommand) -> CliResult<ExitCode> {
    match command {
        AssetCommand::Resolve(command) => command_asset_resolve(config, command),
    }
}

/// Executes `asset resolve`.
fn command_asset_resolve(
    config: &UpdateGateConfig,
    command: &AssetResolveCommand,
) -> CliResult<ExitCode> {
    let update_id = parse_update_id(&command.update)?;
    let asset_key = AssetKey::new(command.key.clone());
    let runtime = assemble_runtime(config)?;
    let result = if let Some(path) = &command.file {
        let bytes = read_input(path, "asset", MAX_ASSET_BYTES)?;
        runtime.resolve_asset_bytes(&update_id, &asset_key, &bytes)
    } else if let Some(reason) = &command.failed {
        let resolution = AssetResolution::Failed {
            reason: reason.clone(),
        };
        runtime.record_asset_resolution(&update_id, &asset_key, resolution)
    } else {
        runtime.record_asset_resolution(&update_id, &asset_key, AssetResolution::Cancelled)
    };
    let update =
        result.map_err(|err| CliError::new(format!("asset resolution failed: {err}")))?;
    let asset_status = update
        .asset(&asset_key)
        .map_or("unresolved", |asset| asset.status.as_str());
    write_json(&AssetResolveOutput {
        asset_key,
        asset_status,
        update: UpdateSummary::from(&update),
    })?;
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// SECTION: Launch Commands
// ============================================================================

/// Executes launch subcommands.
fn command_launch(config: &UpdateGateConfig, command: &LaunchCommand) -> CliResult<ExitCode> {
    let runtime = assemble_runtime(config)?;
    match command {
        LaunchCommand::Select => {
            let candidate = runtime
                .select_for_launch()
                .map_err(|err| CliError::new(format!("launch selection failed: {err}")))?;
            let assets = candidate
                .assets
                .into_iter()
                .map(|(key, location)| (key.as_str().to_string(), location))
                .collect();
            write_json(&LaunchSelectOutput {
                update_id: candidate.update.id,
                is_embedded_fallback: candidate.is_embedded_fallback,
                launch_asset: candidate.launch_asset,
                assets,
            })?;
        }
        LaunchCommand::Record(command) => {
            let update_id = parse_update_id(&command.update)?;
            let update = runtime
                .record_launch_outcome(&update_id, command.outcome.into())
                .map_err(|err| CliError::new(format!("launch record failed: {err}")))?;
            write_json(&UpdateSummary::from(&update))?;
        }
        LaunchCommand::Check(command) => {
            let launched = command.launched.as_deref().map(parse_update_id).transpose()?;
            let should_reload = runtime
                .should_reload(launched.as_ref())
                .map_err(|err| CliError::new(format!("launch check failed: {err}")))?;
            write_json(&LaunchCheckOutput {
                should_reload,
            })?;
        }
    }
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// SECTION: Store Commands
// ============================================================================

/// Executes store subcommands.
fn command_store(config: &UpdateGateConfig, command: &StoreCommand) -> CliResult<ExitCode> {
    let runtime = assemble_runtime(config)?;
    match command {
        StoreCommand::List => {
            let snapshot = runtime
                .store()
                .all()
                .map_err(|err| CliError::new(format!("store list failed: {err}")))?;
            write_json(&StoreListOutput {
                updates: snapshot.updates.iter().map(UpdateSummary::from).collect(),
            })?;
        }
        StoreCommand::Reap(command) => {
            let launched = parse_update_id(&command.launched)?;
            let report = runtime
                .reap(&launched)
                .map_err(|err| CliError::new(format!("store reap failed: {err}")))?;
            write_json(&report)?;
        }
    }
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// SECTION: Audit Commands
// ============================================================================

/// Executes audit subcommands.
fn command_audit(config: &UpdateGateConfig, command: &AuditCommand) -> CliResult<ExitCode> {
    let sink = config
        .open_audit_log()
        .map_err(|err| CliError::new(err.to_string()))?
        .ok_or_else(|| CliError::new("audit commands require the file audit sink".to_string()))?;
    match command {
        AuditCommand::Purge(command) => {
            let removed = sink
                .purge_before(Timestamp::from_unix_millis(command.before_ms))
                .map_err(|err| CliError::new(format!("audit purge failed: {err}")))?;
            write_json(&AuditPurgeOutput {
                removed,
            })?;
        }
        AuditCommand::Show(command) => {
            let records = sink
                .read_since(Timestamp::from_unix_millis(command.since_ms))
                .map_err(|err| CliError::new(format!("audit read failed: {err}")))?;
            write_json(&AuditShowOutput {
                records,
            })?;
        }
    }
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// SECTION: Runtime Helpers
// ============================================================================

/// Loads and validates the configuration.
fn load_config(path: Option<&Path>) -> CliResult<UpdateGateConfig> {
    UpdateGateConfig::load(path).map_err(|err| CliError::new(format!("config load failed: {err}")))
}

/// Wires the runtime from configuration using the wall clock.
fn assemble_runtime(config: &UpdateGateConfig) -> CliResult<UpdatesRuntime> {
    config
        .assemble(Arc::new(SystemClock))
        .map_err(|err| CliError::new(format!("runtime assembly failed: {err}")))
}

/// Parses an update identifier argument.
fn parse_update_id(value: &str) -> CliResult<UpdateId> {
    UpdateId::parse(value).map_err(|err| CliError::new(err.to_string()))
}

// ============================================================================
// SECTION: Input Helpers
// ============================================================================

/// Errors returned by bounded file reads.
#[derive(Debug)]
enum ReadLimitError {
    /// File I/O failure.
    Io(std::io::Error),
    /// File size exceeds the configured limit.
    TooLarge {
        /// Actual size in bytes.
        size: u64,
        /// Allowed limit in bytes.
        limit: usize,
    },
}

/// Reads a file from disk while enforcing a hard size limit.
fn read_bytes_with_limit(path: &Path, max_bytes: usize) -> Result<Vec<u8>, ReadLimitError> {
    let file = File::open(path).map_err(ReadLimitError::Io)?;
    let metadata = file.metadata().map_err(ReadLimitError::Io)?;
    let size = metadata.len();
    let limit = u64::try_from(max_bytes).map_err(|_| ReadLimitError::TooLarge {
        size,
        limit: max_bytes,
    })?;
    if size > limit {
        return Err(ReadLimitError::TooLarge {
            size,
            limit: max_bytes,
        });
    }

    let read_limit = limit.saturating_add(1);
    let mut limited = file.take(read_limit);
    let mut bytes = Vec::new();
    limited.read_to_end(&mut bytes).map_err(ReadLimitError::Io)?;
    if bytes.len() > max_bytes {
        let actual = u64::try_from(bytes.len()).unwrap_or(u64::MAX);
        return Err(ReadLimitError::TooLarge {
            size: actual,
            limit: max_bytes,
        });
    }
    Ok(bytes)
}

/// Reads a bounded input file, labelling failures with its role.
fn read_input(path: &Path, kind: &str, max_bytes: usize) -> CliResult<Vec<u8>> {
    read_bytes_with_limit(path, max_bytes).map_err(|err| match err {
        ReadLimitError::Io(err) => {
            CliError::new(format!("failed to read {kind} {}: {err}", path.display()))
        }
        ReadLimitError::TooLarge {
            size,
            limit,
        } => CliError::new(format!(
            "{kind} {} exceeds size limit ({size} > {limit} bytes)",
            path.display()
        )),
    })
}

/// Reads a bounded UTF-8 input file.
fn read_text(path: &Path, kind: &str, max_bytes: usize) -> CliResult<String> {
    let bytes = read_input(path, kind, max_bytes)?;
    String::from_utf8(bytes)
        .map_err(|_| CliError::new(format!("{kind} {} is not utf-8", path.display())))
}

// ============================================================================
// SECTION: Output Helpers
// ============================================================================

/// Writes a single line to stdout.
fn write_stdout_line(message: &str) -> std::io::Result<()> {
    let mut stdout = std::io::stdout();
    writeln!(&mut stdout, "{message}")
}

/// Writes canonical JSON to stdout with a trailing newline.
fn write_json<T: Serialize>(value: &T) -> CliResult<()> {
    let mut bytes = serde_jcs::to_vec(value)
        .map_err(|err| CliError::new(format!("failed to serialize output: {err}")))?;
    bytes.push(b'\n');
    let mut stdout = std::io::stdout();
    stdout.write_all(&bytes).map_err(|err| CliError::new(output_error("stdout", &err)))
}

/// Writes a single line to stderr.
fn write_stderr_line(message: &str) -> std::io::Result<()> {
    let mut stderr = std::io::stderr();
    writeln!(&mut stderr, "{message}")
}

/// Formats an output error message.
fn output_error(stream: &str, error: &std::io::Error) -> String {
    format!("failed to write {stream}: {error}")
}

/// Emits an error message to stderr and returns a failure exit code.
fn emit_error(message: &str) -> ExitCode {
    let _ = write_stderr_line(message);
    ExitCode::FAILURE
}
