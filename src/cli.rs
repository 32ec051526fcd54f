//! Command-line interface

use std::path::PathBuf;

use access_core::AccessLevel;
use clap::{Parser, Subcommand};

/// Integration gateway - manifest-driven tools with permission-checked proxy execution
#[derive(Parser, Debug)]
#[command(name = "integration-gateway")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file (YAML)
    #[arg(short, long, env = "INTEGRATION_GATEWAY_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Port to listen on
    #[arg(short, long, env = "INTEGRATION_GATEWAY_PORT")]
    pub port: Option<u16>,

    /// Host to bind to
    #[arg(long, env = "INTEGRATION_GATEWAY_HOST")]
    pub host: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(
        long,
        default_value = "info",
        env = "INTEGRATION_GATEWAY_LOG_LEVEL",
        global = true
    )]
    pub log_level: String,

    /// Log format (text, json)
    #[arg(long, env = "INTEGRATION_GATEWAY_LOG_FORMAT", global = true)]
    pub log_format: Option<String>,

    /// Subcommand (optional - defaults to server mode)
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the gateway server (default)
    Serve,

    /// Manifest management commands
    #[command(subcommand)]
    Manifest(ManifestCommand),

    /// Show the tools a provider yields at an access level
    Tools {
        /// Provider id
        #[arg(required = true)]
        provider: String,

        /// Access level (none, disabled, read-only, read-write)
        #[arg(short, long, default_value = "read-write")]
        access: AccessLevel,
    },

    /// Resolve a user's access from the configured store
    Access {
        /// User id
        #[arg(short, long)]
        user: String,

        /// Organization id
        #[arg(short, long)]
        org: String,

        /// Treat the user as an org admin
        #[arg(long)]
        admin: bool,

        /// Also render the status of this feature
        #[arg(short, long)]
        feature: Option<String>,
    },
}

/// Manifest subcommands
#[derive(Subcommand, Debug)]
pub enum ManifestCommand {
    /// Validate a manifest file
    Validate {
        /// Path to manifest YAML file
        #[arg(required = true)]
        file: PathBuf,
    },

    /// List manifests in a directory, or the built-in set when omitted
    List {
        /// Directory containing manifests
        directory: Option<PathBuf>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tools_command_parses_access_level() {
        let cli = Cli::try_parse_from([
            "integration-gateway",
            "tools",
            "greenhouse",
            "--access",
            "read-only",
        ])
        .unwrap();
        match cli.command {
            Some(Command::Tools { provider, access }) => {
                assert_eq!(provider, "greenhouse");
                assert_eq!(access, AccessLevel::ReadOnly);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn no_subcommand_means_serve() {
        let cli = Cli::try_parse_from(["integration-gateway", "--port", "8080"]).unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.port, Some(8080));
    }

    #[test]
    fn manifest_list_directory_is_optional() {
        let cli = Cli::try_parse_from(["integration-gateway", "manifest", "list"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Command::Manifest(ManifestCommand::List { directory: None }))
        ));
    }
}
