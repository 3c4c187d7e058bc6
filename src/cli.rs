//! # Command surface
//!
//! Parsing happens in two steps. clap turns `argv` into a [`Command`] of raw strings,
//! then [`Command::into_request`] validates it into a typed [`Request`]. A request that
//! fails validation never reaches the network: [`run`] prints the message and exits
//! with status 2.
//!
//! Results print as pretty JSON on stdout. Bulk commands exit with status 1 when any
//! role failed or was skipped.

use crate::api::require_key;
use crate::config::Config;
use crate::flags::FlagRef;
use crate::roles::{CustomRole, PolicyStatement};
use crate::runtime::App;
use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use reconcile_framework::{
    create, update, upsert, BatchOptions, BatchResult, ClientError, Definition, DirectoryReport,
    FileReport, ResourceClient, ValidationError,
};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::info;

/// Exit status for arguments that failed validation.
pub const USAGE_EXIT: u8 = 2;

#[derive(Debug, Parser)]
#[command(
    name = "ldsync",
    version,
    about = "Reconcile LaunchDarkly custom roles and inspect feature flags"
)]
pub struct Cli {
    /// Log at debug level
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Files reconciled at the same time by folder upserts [default: LDSYNC_FILE_CONCURRENCY or 4]
    #[arg(long, global = true)]
    pub concurrency: Option<usize>,

    /// Stop reconciling a file at its first failed role
    #[arg(long, global = true)]
    pub fail_fast: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Args)]
pub struct RoleArgs {
    pub key: String,
    pub name: String,
    /// JSON array of policy statements
    pub policy: String,
    pub description: Option<String>,
}

#[derive(Debug, Args)]
pub struct FlagArgs {
    pub project: String,
    pub flag: String,
    pub env: String,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List every custom role
    GetCustomRoles,
    /// Fetch one custom role by key
    GetCustomRole { key: String },
    /// Fetch one custom role by its `_id`
    GetCustomRoleById { id: String },
    /// Create a custom role
    CreateCustomRole(RoleArgs),
    /// Patch an existing custom role to match the arguments
    UpdateCustomRole(RoleArgs),
    /// Create the custom role, or patch it if it already exists
    UpsertCustomRole(RoleArgs),
    /// Upsert every role of a JSON file, in file order
    BulkUpsertCustomRoles { file: PathBuf },
    /// Upsert every role of every JSON file in a folder
    BulkUpsertCustomRoleFolder { folder: PathBuf },
    /// List the feature flags of a project
    GetFeatureFlags { project: String },
    /// Fetch one feature flag, scoped to an environment
    GetFeatureFlag(FlagArgs),
    /// Print whether a flag is on in an environment
    GetFeatureFlagState(FlagArgs),
    /// Turn a flag on or off in an environment
    ToggleFeatureFlag {
        #[command(flatten)]
        flag: FlagArgs,
        /// `true` or `false`
        enabled: String,
    },
}

/// A validated command.
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    ListRoles,
    GetRole(String),
    GetRoleById(String),
    CreateRole(CustomRole),
    UpdateRole(CustomRole),
    UpsertRole(CustomRole),
    BulkFile(PathBuf),
    BulkFolder(PathBuf),
    ListFlags(String),
    GetFlag(FlagRef),
    GetFlagState(FlagRef),
    ToggleFlag(FlagRef, bool),
}

impl Command {
    pub fn into_request(self) -> Result<Request, ValidationError> {
        let request = match self {
            Self::GetCustomRoles => Request::ListRoles,
            Self::GetCustomRole { key } => {
                require_key(CustomRole::KIND, "key", &key)?;
                Request::GetRole(key)
            }
            Self::GetCustomRoleById { id } => {
                require_key(CustomRole::KIND, "id", &id)?;
                Request::GetRoleById(id)
            }
            Self::CreateCustomRole(args) => Request::CreateRole(args.into_role()?),
            Self::UpdateCustomRole(args) => Request::UpdateRole(args.into_role()?),
            Self::UpsertCustomRole(args) => Request::UpsertRole(args.into_role()?),
            Self::BulkUpsertCustomRoles { file } => {
                require_path("file", &file)?;
                Request::BulkFile(file)
            }
            Self::BulkUpsertCustomRoleFolder { folder } => {
                require_path("folder", &folder)?;
                Request::BulkFolder(folder)
            }
            Self::GetFeatureFlags { project } => {
                require_key("feature flag", "project", &project)?;
                Request::ListFlags(project)
            }
            Self::GetFeatureFlag(args) => Request::GetFlag(args.into_ref()?),
            Self::GetFeatureFlagState(args) => Request::GetFlagState(args.into_ref()?),
            Self::ToggleFeatureFlag { flag, enabled } => {
                let on = match enabled.as_str() {
                    "true" => true,
                    "false" => false,
                    _ => {
                        return Err(ValidationError::Invalid {
                            field: "enabled",
                            message: format!("expected 'true' or 'false', got '{enabled}'"),
                        })
                    }
                };
                Request::ToggleFlag(flag.into_ref()?, on)
            }
        };
        Ok(request)
    }
}

impl RoleArgs {
    fn into_role(self) -> Result<CustomRole, ValidationError> {
        let policy: Vec<PolicyStatement> =
            serde_json::from_str(&self.policy).map_err(|e| ValidationError::Invalid {
                field: "policy",
                message: e.to_string(),
            })?;
        let description = self.description.filter(|d| !d.trim().is_empty());
        let role = CustomRole::new(self.key, self.name, policy, description);
        role.validate()?;
        Ok(role)
    }
}

impl FlagArgs {
    fn into_ref(self) -> Result<FlagRef, ValidationError> {
        FlagRef::new(self.project, self.flag, self.env)
    }
}

fn require_path(field: &'static str, path: &std::path::Path) -> Result<(), ValidationError> {
    reconcile_framework::require(CustomRole::KIND, field, &path.to_string_lossy())
}

/// What a request printed, and whether it fully succeeded.
#[derive(Debug)]
pub struct Output {
    pub document: Value,
    pub success: bool,
}

impl Output {
    fn ok(document: Value) -> Self {
        Self {
            document,
            success: true,
        }
    }
}

/// Parses configuration, runs the command and prints its result.
pub async fn run(cli: Cli) -> Result<ExitCode> {
    let Cli {
        concurrency,
        fail_fast,
        command,
        ..
    } = cli;

    let request = match command.into_request() {
        Ok(request) => request,
        Err(e) => {
            eprintln!("{e}");
            return Ok(ExitCode::from(USAGE_EXIT));
        }
    };

    let config = Config::from_env()?;
    let options = BatchOptions {
        file_concurrency: concurrency.unwrap_or(config.file_concurrency),
        fail_fast,
    };
    let app = App::from_config(&config, options)?;

    let output = execute(&app, request).await?;
    println!("{}", serde_json::to_string_pretty(&output.document)?);
    Ok(if output.success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

/// Runs a validated request against `app`.
pub async fn execute(app: &App, request: Request) -> Result<Output> {
    let roles = app.roles.as_ref();
    let output = match request {
        Request::ListRoles => Output::ok(serde_json::to_value(roles.list().await?)?),
        Request::GetRole(key) => Output::ok(serde_json::to_value(roles.get(&key).await?)?),
        Request::GetRoleById(id) => Output::ok(serde_json::to_value(roles.get_by_id(&id).await?)?),
        Request::CreateRole(role) => Output::ok(serde_json::to_value(create(roles, &role).await?)?),
        Request::UpdateRole(role) => Output::ok(serde_json::to_value(update(roles, &role).await?)?),
        Request::UpsertRole(role) => Output::ok(serde_json::to_value(upsert(roles, &role).await?)?),
        Request::BulkFile(path) => {
            let report = app.runner.run_file::<CustomRole>(&path).await;
            let summary = report.summary();
            info!(path = %path.display(), ?summary, "Bulk upsert finished");
            Output {
                success: report.is_success(),
                document: file_json(&report),
            }
        }
        Request::BulkFolder(folder) => {
            let report = app.runner.run_dir::<CustomRole>(&folder).await?;
            let summary = report.summary();
            info!(folder = %folder.display(), ?summary, "Bulk folder upsert finished");
            Output {
                success: report.is_success(),
                document: directory_json(&report),
            }
        }
        Request::ListFlags(project) => Output::ok(app.flags.list(&project).await?),
        Request::GetFlag(flag) => Output::ok(app.flags.get(&flag).await?),
        Request::GetFlagState(flag) => Output::ok(json!({
            "project": flag.project,
            "flag": flag.flag,
            "env": flag.env,
            "on": app.flags.state(&flag).await?,
        })),
        Request::ToggleFlag(flag, on) => Output::ok(app.flags.toggle(&flag, on).await?),
    };
    Ok(output)
}

fn batch_json<D: Definition>(batch: &BatchResult<D>) -> Value {
    let results: Vec<Value> = batch
        .outcomes
        .iter()
        .enumerate()
        .map(|(index, outcome)| match outcome {
            Ok(applied) => json!({
                "index": index,
                "key": applied.resource.key(),
                "action": applied.action,
            }),
            Err(e) => json!({
                "index": index,
                "error": e.to_string(),
                "docs": e.client_error().map(ClientError::docs),
            }),
        })
        .collect();
    json!({ "summary": batch.summary(), "results": results })
}

fn file_json<D: Definition>(report: &FileReport<D>) -> Value {
    let path = report.path.display().to_string();
    match &report.result {
        Ok(batch) => {
            let mut document = batch_json(batch);
            document["path"] = json!(path);
            document
        }
        Err(e) => json!({ "path": path, "error": e.to_string() }),
    }
}

fn directory_json<D: Definition>(report: &DirectoryReport<D>) -> Value {
    json!({
        "directory": report.directory.display().to_string(),
        "summary": report.summary(),
        "files": report.files.iter().map(file_json).collect::<Vec<_>>(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roles::Effect;
    use pretty_assertions::assert_eq;
    use reconcile_framework::{Action, Applied, ReconcileError, RemoteResource};

    const POLICY: &str = r#"[{"effect":"allow","actions":["*"],"resources":["proj/*"]}]"#;

    fn parse(args: &[&str]) -> Result<Request, ValidationError> {
        let mut argv = vec!["ldsync"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap().command.into_request()
    }

    #[test]
    fn upsert_arguments_become_a_role() {
        let request = parse(&["upsert-custom-role", "reader", "Reader", POLICY, "Read only"]).unwrap();
        let Request::UpsertRole(role) = request else {
            panic!("expected an upsert");
        };
        assert_eq!(role.key, "reader");
        assert_eq!(role.description.as_deref(), Some("Read only"));
        assert_eq!(role.policy[0].effect, Effect::Allow);
    }

    #[test]
    fn blank_key_is_a_usage_error() {
        let err = parse(&["create-custom-role", " ", "Reader", POLICY]).unwrap_err();
        assert_eq!(
            err,
            ValidationError::MissingField {
                kind: "custom role",
                field: "key"
            }
        );
    }

    #[test]
    fn keys_with_url_characters_are_usage_errors() {
        let err = parse(&["get-custom-role", "a?b"]).unwrap_err();
        assert!(matches!(err, ValidationError::Invalid { field: "key", .. }));
        let err = parse(&["get-feature-flags", "../admin"]).unwrap_err();
        assert!(matches!(err, ValidationError::Invalid { field: "project", .. }));
    }

    #[test]
    fn unparsable_policy_is_a_usage_error() {
        let err = parse(&["update-custom-role", "reader", "Reader", "[{"]).unwrap_err();
        assert!(matches!(err, ValidationError::Invalid { field: "policy", .. }));
    }

    #[test]
    fn toggle_accepts_only_true_or_false() {
        assert_eq!(
            parse(&["toggle-feature-flag", "default", "checkout", "prod", "false"]).unwrap(),
            Request::ToggleFlag(FlagRef::new("default", "checkout", "prod").unwrap(), false)
        );
        let err = parse(&["toggle-feature-flag", "default", "checkout", "prod", "yes"]).unwrap_err();
        assert!(err.to_string().contains("'true' or 'false'"));
    }

    #[test]
    fn global_options_follow_the_subcommand() {
        let cli = Cli::try_parse_from([
            "ldsync",
            "bulk-upsert-custom-role-folder",
            "roles/",
            "--concurrency",
            "2",
            "--fail-fast",
        ])
        .unwrap();
        assert_eq!(cli.concurrency, Some(2));
        assert!(cli.fail_fast);
    }

    #[test]
    fn missing_arguments_are_rejected_by_the_parser() {
        assert!(Cli::try_parse_from(["ldsync", "get-feature-flag", "default"]).is_err());
    }

    #[test]
    fn batch_report_lists_every_outcome() {
        let role = CustomRole::new("reader", "Reader", vec![], None);
        let batch = BatchResult {
            outcomes: vec![
                Ok(Applied {
                    action: Action::Created,
                    resource: RemoteResource::new("1", role),
                }),
                Err(ReconcileError::Client(ClientError::Transport {
                    operation: "getCustomRole",
                    status: Some(500),
                    message: "boom".into(),
                    docs: "https://apidocs.launchdarkly.com/docs/get-custom-role",
                })),
            ],
        };

        let document = batch_json(&batch);
        assert_eq!(document["summary"]["created"], 1);
        assert_eq!(document["summary"]["failed"], 1);
        assert_eq!(
            document["results"][0],
            json!({ "index": 0, "key": "reader", "action": "created" })
        );
        assert!(document["results"][1]["error"]
            .as_str()
            .unwrap()
            .contains("with status 500"));
        assert_eq!(
            document["results"][1]["docs"],
            "https://apidocs.launchdarkly.com/docs/get-custom-role"
        );
        assert!(document["results"][0].get("docs").is_none());
    }
}
