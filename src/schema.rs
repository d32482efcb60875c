use anyhow::{Context, Result};
use mssqlkit::{
    BackupDescriptor, ConnectSettings, DatabaseSpec, Identifier, Literal, LoginSpec, ObjectKind,
    Password, RestoreTarget, RetryPolicy, TargetDirs, UserLoginSpec, UserSpec,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use crate::paths;

// ============================================================================
// Manifest
// ============================================================================

/// Desired state of one SQL Server instance
#[derive(Debug, Serialize, Deserialize, Default)]
pub struct Manifest {
    /// Connection settings
    #[serde(default)]
    pub server: ServerConfig,

    /// Retry budget for drop steps
    #[serde(default)]
    pub retry: RetryConfig,

    #[serde(default)]
    pub databases: Vec<DatabaseEntry>,

    #[serde(default)]
    pub logins: Vec<LoginEntry>,

    #[serde(default)]
    pub users: Vec<UserEntry>,

    /// Bindings of existing users to existing logins
    #[serde(default)]
    pub user_logins: Vec<UserLoginEntry>,
}

impl Manifest {
    /// Load a manifest from `path`
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Could not read manifest: {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Invalid manifest: {}", path.display()))
    }

    /// Parse manifest TOML
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Invalid TOML format in manifest")
    }

    /// Every problem found in the manifest, without touching the server.
    pub fn problems(&self) -> Vec<String> {
        let mut problems = Vec::new();

        if self.server.host.is_empty() {
            problems.push("server: host cannot be empty".to_string());
        }
        if self.retry.attempts == 0 {
            problems.push("retry: attempts must be at least 1".to_string());
        }

        let mut seen = HashSet::new();
        for db in &self.databases {
            let label = format!("database {}", db.name);
            if !seen.insert(db.name.as_str()) {
                problems.push(format!("{label}: declared more than once"));
            }
            collect(&mut problems, &label, db.to_spec().map(|_| ()));
        }

        let mut seen = HashSet::new();
        for login in &self.logins {
            let label = format!("login {}", login.name);
            if !seen.insert(login.name.as_str()) {
                problems.push(format!("{label}: declared more than once"));
            }
            collect(&mut problems, &label, login.check());
        }

        let mut seen = HashSet::new();
        for user in &self.users {
            let label = format!("user {}.{}", user.database, user.name);
            if !seen.insert((user.database.as_str(), user.name.as_str())) {
                problems.push(format!("{label}: declared more than once"));
            }
            collect(&mut problems, &label, user.check());
        }

        for binding in &self.user_logins {
            let label = format!("user_login {}", binding.id());
            collect(&mut problems, &label, binding.check());
        }

        problems
    }
}

fn collect(problems: &mut Vec<String>, label: &str, result: Result<()>) {
    if let Err(e) = result {
        problems.push(format!("{label}: {e:#}"));
    }
}

/// Expand `${VAR}` references in a secret
fn expand_secret(value: &str) -> Result<String> {
    shellexpand::env(value)
        .map(std::borrow::Cow::into_owned)
        .context("Could not expand environment variable")
}

// ============================================================================
// Server
// ============================================================================

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_username")]
    pub username: String,

    /// May reference environment variables (`${MSSQL_SA_PASSWORD}`)
    #[serde(default)]
    pub password: String,

    /// Accept the server certificate without validation
    #[serde(default)]
    pub trust_cert: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            username: default_username(),
            password: String::new(),
            trust_cert: false,
        }
    }
}

impl ServerConfig {
    /// Driver settings, with `SQLCONVERGE_PASSWORD` taking precedence over
    /// the manifest password.
    pub fn connect_settings(&self) -> Result<ConnectSettings> {
        let password = match std::env::var(paths::ENV_PASSWORD) {
            Ok(password) => password,
            Err(_) => expand_secret(&self.password).context("Invalid server password")?,
        };

        let mut settings = ConnectSettings::new(&self.host, &self.username, &password);
        settings.port = self.port;
        settings.trust_cert = self.trust_cert;
        Ok(settings)
    }

    /// `host:port`, for display
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    mssqlkit::backend::tds::DEFAULT_PORT
}

fn default_username() -> String {
    "sa".to_string()
}

// ============================================================================
// Retry
// ============================================================================

#[derive(Debug, Serialize, Deserialize, Clone, Copy)]
pub struct RetryConfig {
    #[serde(default = "default_attempts")]
    pub attempts: u32,

    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            attempts: default_attempts(),
            delay_ms: default_delay_ms(),
        }
    }
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.attempts, Duration::from_millis(self.delay_ms))
    }
}

fn default_attempts() -> u32 {
    3
}

fn default_delay_ms() -> u64 {
    1000
}

// ============================================================================
// Databases
// ============================================================================

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct DatabaseEntry {
    pub name: String,

    /// Drop the database on `destroy`
    #[serde(default)]
    pub drop_on_destroy: bool,

    /// Provision by restoring this backup instead of creating empty
    #[serde(default)]
    pub backup: Option<BackupEntry>,

    /// Where restored files go
    #[serde(default)]
    pub restore_target: Option<RestoreTargetEntry>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct BackupEntry {
    /// Path of the backup file, as seen by the server
    pub path: String,

    /// Logical name of the data file inside the backup
    pub data_file: String,

    /// Logical name of the log file inside the backup
    pub log_file: String,

    /// Backup set position within the file
    #[serde(default = "default_file_number")]
    pub file_number: u32,
}

fn default_file_number() -> u32 {
    mssqlkit::types::DEFAULT_BACKUP_FILE_NUMBER
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct RestoreTargetEntry {
    #[serde(default)]
    pub data_dir: Option<String>,

    #[serde(default)]
    pub log_dir: Option<String>,

    /// Ask the server for its default data and log directories
    #[serde(default)]
    pub server_default_paths: bool,
}

impl RestoreTargetEntry {
    fn target_dirs(&self) -> TargetDirs {
        if self.server_default_paths {
            return TargetDirs::ServerDefault;
        }
        let defaults = RestoreTarget::default();
        TargetDirs::Fixed(RestoreTarget::new(
            self.data_dir.as_deref().unwrap_or(&defaults.data_file_dir),
            self.log_dir.as_deref().unwrap_or(&defaults.log_file_dir),
        ))
    }
}

impl DatabaseEntry {
    /// Validated reconciler input
    pub fn to_spec(&self) -> Result<DatabaseSpec> {
        Identifier::new(ObjectKind::Database, &self.name)?;
        let spec = DatabaseSpec::new(&self.name);

        let Some(backup) = &self.backup else {
            if self.restore_target.is_some() {
                anyhow::bail!("restore_target is only used together with a backup");
            }
            return Ok(spec);
        };

        Literal::new(ObjectKind::BackupFile, &backup.path)?;
        Literal::new(ObjectKind::BackupFile, &backup.data_file)?;
        Literal::new(ObjectKind::BackupFile, &backup.log_file)?;

        let target = self
            .restore_target
            .as_ref()
            .map(RestoreTargetEntry::target_dirs)
            .unwrap_or_default();
        if let TargetDirs::Fixed(dirs) = &target {
            Literal::new(ObjectKind::BackupFile, &dirs.data_file_path(&self.name))?;
            Literal::new(ObjectKind::BackupFile, &dirs.log_file_path(&self.name))?;
        }

        let descriptor = BackupDescriptor::new(&backup.path, &backup.data_file, &backup.log_file)
            .with_file_number(backup.file_number);
        Ok(spec.with_backup(descriptor, target))
    }
}

// ============================================================================
// Logins
// ============================================================================

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LoginEntry {
    pub name: String,

    /// May reference environment variables (`${SVC_PASSWORD}`)
    pub password: String,

    #[serde(default = "default_database")]
    pub default_database: String,

    /// Drop the login on `destroy`
    #[serde(default)]
    pub drop_on_destroy: bool,

    /// Fixed server roles to join
    #[serde(default)]
    pub roles: Vec<String>,
}

fn default_database() -> String {
    "master".to_string()
}

impl LoginEntry {
    /// Validated reconciler input, with the password expanded
    pub fn to_spec(&self) -> Result<LoginSpec> {
        self.check()?;
        let password = expand_secret(&self.password).context("Invalid password")?;
        Ok(LoginSpec {
            name: self.name.clone(),
            password: Password::new(&password)?,
            default_database: self.default_database.clone(),
            server_roles: self.roles.clone(),
        })
    }

    fn check(&self) -> Result<()> {
        Identifier::new(ObjectKind::Login, &self.name)?;
        Identifier::new(ObjectKind::Database, &self.default_database)?;
        for role in &self.roles {
            Identifier::new(ObjectKind::Role, role)?;
        }
        let password = expand_secret(&self.password).context("Invalid password")?;
        Password::new(&password)?;
        Ok(())
    }
}

// ============================================================================
// Users
// ============================================================================

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct UserEntry {
    pub database: String,

    pub name: String,

    #[serde(default = "default_schema")]
    pub default_schema: String,

    /// Login to bind the user to
    #[serde(default)]
    pub login: Option<String>,

    /// Database roles to join
    #[serde(default)]
    pub roles: Vec<String>,
}

fn default_schema() -> String {
    "dbo".to_string()
}

impl UserEntry {
    pub fn id(&self) -> String {
        format!("{}.{}", self.database, self.name)
    }

    pub fn to_spec(&self) -> Result<UserSpec> {
        self.check()?;
        Ok(UserSpec {
            database: self.database.clone(),
            name: self.name.clone(),
            default_schema: self.default_schema.clone(),
            login: self.login.clone(),
            roles: self.roles.clone(),
        })
    }

    fn check(&self) -> Result<()> {
        Identifier::new(ObjectKind::Database, &self.database)?;
        Identifier::new(ObjectKind::User, &self.name)?;
        Identifier::new(ObjectKind::Schema, &self.default_schema)?;
        if let Some(login) = &self.login {
            Identifier::new(ObjectKind::Login, login)?;
        }
        for role in &self.roles {
            Identifier::new(ObjectKind::Role, role)?;
        }
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct UserLoginEntry {
    pub database: String,
    pub username: String,
    pub login: String,
}

impl UserLoginEntry {
    pub fn id(&self) -> String {
        format!("{}.{}", self.database, self.username)
    }

    pub fn to_spec(&self) -> Result<UserLoginSpec> {
        self.check()?;
        Ok(UserLoginSpec {
            database: self.database.clone(),
            username: self.username.clone(),
            login: self.login.clone(),
        })
    }

    fn check(&self) -> Result<()> {
        Identifier::new(ObjectKind::Database, &self.database)?;
        Identifier::new(ObjectKind::User, &self.username)?;
        Identifier::new(ObjectKind::Login, &self.login)?;
        Ok(())
    }
}
