use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "sqlconverge")]
#[command(author = "Alberto Cavalcante")]
#[command(version)]
#[command(about = "Converge SQL Server databases, logins and users to a declared state", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Manifest file (default: $SQLCONVERGE_CONFIG, ./sqlconverge.toml, ~/.config/sqlconverge/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Show current vs desired state of every resource
    Status(TargetArgs),

    /// Show only what apply would change
    Diff(TargetArgs),

    /// Create what the manifest declares and the server lacks
    Apply(ConvergeArgs),

    /// Drop what the manifest marks droppable
    Destroy(ConvergeArgs),

    /// Read one object from the server
    #[command(subcommand)]
    Show(ShowCommand),

    /// Show server connection details and default file paths
    Server,

    /// Check the manifest without connecting
    Validate,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

// ============================================================================
// Declarative Commands
// ============================================================================

#[derive(Args)]
pub struct TargetArgs {
    /// Limit to a resource type or one resource: database, login.svc_login, user.orders_db.svc_user
    pub target: Option<String>,
}

#[derive(Args)]
pub struct ConvergeArgs {
    /// Limit to a resource type or one resource: database, login.svc_login, user.orders_db.svc_user
    pub target: Option<String>,

    /// Dry run - show what would be done
    #[arg(short, long)]
    pub dry_run: bool,

    /// Don't ask for confirmation
    #[arg(short, long)]
    pub yes: bool,

    /// Keep applying the remaining resources after a failure
    #[arg(short, long)]
    pub keep_going: bool,
}

// ============================================================================
// Show Commands
// ============================================================================

#[derive(Subcommand)]
pub enum ShowCommand {
    /// Show a database
    Database {
        name: String,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Show a server login
    Login {
        name: String,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Show a database user
    User {
        database: String,

        name: String,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_apply_flags() {
        let cli = Cli::parse_from(["sqlconverge", "-vv", "apply", "login.svc_login", "--yes", "-k"]);
        assert_eq!(cli.verbose, 2);
        let Command::Apply(args) = cli.command else {
            panic!("expected apply");
        };
        assert_eq!(args.target.as_deref(), Some("login.svc_login"));
        assert!(args.yes);
        assert!(args.keep_going);
        assert!(!args.dry_run);
    }

    #[test]
    fn test_parse_show_user() {
        let cli = Cli::parse_from(["sqlconverge", "show", "user", "orders_db", "svc_user", "--json"]);
        assert!(matches!(
            cli.command,
            Command::Show(ShowCommand::User { ref database, ref name, json: true })
                if database == "orders_db" && name == "svc_user"
        ));
    }
}
