//! Integration gateway - manifest-driven tools with permission-checked proxy execution

use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};

use integration_gateway::{
    access::{AccessLevel, UserContext},
    cli::{Cli, Command, ManifestCommand},
    config::Config,
    gateway::{Gateway, Server},
    manifest::{
        ManifestLoader, ManifestRegistry, ProviderManifest, builtin_manifests, parse_manifest_file,
        validator::{IssueSeverity, has_errors, validate_manifest},
    },
    setup_tracing,
    tools::{generate_tools, get_tool_summary},
};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Setup tracing
    if let Err(e) = setup_tracing(&cli.log_level, cli.log_format.as_deref()) {
        eprintln!("Failed to setup tracing: {e}");
        return ExitCode::FAILURE;
    }

    match cli.command {
        Some(Command::Manifest(cmd)) => run_manifest_command(cmd).await,
        Some(Command::Tools { ref provider, access }) => run_tools(&cli, provider, access).await,
        Some(Command::Access {
            ref user,
            ref org,
            admin,
            ref feature,
        }) => run_access(&cli, user, org, admin, feature.as_deref()).await,
        Some(Command::Serve) | None => run_server(cli).await,
    }
}

fn load_config(cli: &Cli) -> Option<Config> {
    match Config::load(cli.config.as_deref()) {
        Ok(mut config) => {
            if let Some(port) = cli.port {
                config.server.port = port;
            }
            if let Some(ref host) = cli.host {
                config.server.host = host.clone();
            }
            Some(config)
        }
        Err(e) => {
            error!("Failed to load configuration: {e}");
            None
        }
    }
}

/// Run manifest management commands
async fn run_manifest_command(cmd: ManifestCommand) -> ExitCode {
    match cmd {
        ManifestCommand::Validate { file } => {
            let manifest = match parse_manifest_file(&file).await {
                Ok(m) => m,
                Err(e) => {
                    eprintln!("❌ Failed to parse: {e}");
                    return ExitCode::FAILURE;
                }
            };

            let issues = validate_manifest(&manifest);
            for issue in &issues {
                match issue.severity {
                    IssueSeverity::Error => eprintln!("  {issue}"),
                    IssueSeverity::Warning => println!("  {issue}"),
                }
            }

            if has_errors(&issues) {
                eprintln!("❌ {} - invalid", manifest.provider);
                return ExitCode::FAILURE;
            }

            println!("✅ {} - valid", manifest.provider);
            println!("   {} ({})", manifest.label(), manifest.category.label());
            println!("   Base URL: {}", manifest.base_url);
            println!("   Operations: {}", manifest.operations.len());
            if !manifest.blocklist.is_empty() {
                println!("   Blocklist: {} pattern(s)", manifest.blocklist.len());
            }
            ExitCode::SUCCESS
        }

        ManifestCommand::List { directory } => {
            let (source, manifests) = match directory {
                Some(dir) => {
                    let path = dir.to_string_lossy().to_string();
                    match ManifestLoader::load_directory(&path).await {
                        Ok(m) => (path, m),
                        Err(e) => {
                            eprintln!("❌ Failed to load: {e}");
                            return ExitCode::FAILURE;
                        }
                    }
                }
                None => match builtin_manifests() {
                    Ok(m) => ("built-in manifests".to_string(), m),
                    Err(e) => {
                        eprintln!("❌ Failed to load built-in manifests: {e}");
                        return ExitCode::FAILURE;
                    }
                },
            };

            if manifests.is_empty() {
                println!("No manifests found in {source}");
            } else {
                println!("Found {} manifests in {}:\n", manifests.len(), source);
                for manifest in &manifests {
                    print_manifest_line(manifest);
                }
            }
            ExitCode::SUCCESS
        }
    }
}

fn print_manifest_line(manifest: &ProviderManifest) {
    let issues = validate_manifest(manifest);
    let marker = if has_errors(&issues) { " [invalid]" } else { "" };
    println!(
        "  {} - {} ({}, {} operations){}",
        manifest.provider,
        manifest.label(),
        manifest.category.label(),
        manifest.operations.len(),
        marker
    );
}

/// Show the tools a provider yields at a given level
async fn run_tools(cli: &Cli, provider: &str, level: AccessLevel) -> ExitCode {
    let Some(config) = load_config(cli) else {
        return ExitCode::FAILURE;
    };
    let registry =
        match ManifestRegistry::load(config.manifests.builtin, &config.manifests.directories).await
        {
            Ok(r) => r,
            Err(e) => {
                eprintln!("❌ Failed to load manifests: {e}");
                return ExitCode::FAILURE;
            }
        };

    let Some(manifest) = registry.get_manifest(provider) else {
        eprintln!("❌ Unknown provider: {provider}");
        eprintln!("   Known: {}", registry.list_providers().join(", "));
        return ExitCode::FAILURE;
    };

    let summary = get_tool_summary(manifest, level);
    println!(
        "{} at {level}: {} read, {} write, {} filtered (of {})\n",
        manifest.label(),
        summary.read,
        summary.write,
        summary.filtered,
        summary.total
    );
    for tool in generate_tools(manifest, level) {
        println!("  {} [{}] {} {}", tool.name, tool.access.as_str(), tool.method, tool.path);
        println!("     {}", tool.description);
    }
    ExitCode::SUCCESS
}

/// Resolve and print a user's access profile
async fn run_access(
    cli: &Cli,
    user_id: &str,
    org_id: &str,
    admin: bool,
    feature: Option<&str>,
) -> ExitCode {
    let Some(config) = load_config(cli) else {
        return ExitCode::FAILURE;
    };
    let gateway = match Gateway::from_config(&config).await {
        Ok(g) => g,
        Err(e) => {
            eprintln!("❌ Failed to create gateway: {e}");
            return ExitCode::FAILURE;
        }
    };

    let mut user = UserContext::new(user_id, org_id);
    if admin {
        user = user.admin();
    }

    let profile = gateway.access_profile(&user).await;
    println!("Access for {user_id} in {org_id}:\n");
    for (category, level) in profile.effective.iter() {
        println!("  {:<14} {level}", category.label());
    }
    println!();
    for (provider, access) in &profile.providers {
        println!("  {provider:<16} {}", access.level);
    }

    if let Some(feature_id) = feature {
        match gateway.feature_status(&user, feature_id).await {
            Ok(report) => {
                println!(
                    "\n{}",
                    serde_json::to_string_pretty(&report).unwrap_or_default()
                );
            }
            Err(e) => {
                eprintln!("❌ {e}");
                return ExitCode::FAILURE;
            }
        }
    }
    ExitCode::SUCCESS
}

/// Run the gateway server
async fn run_server(cli: Cli) -> ExitCode {
    let Some(config) = load_config(&cli) else {
        return ExitCode::FAILURE;
    };

    info!(
        version = env!("CARGO_PKG_VERSION"),
        port = config.server.port,
        builtin_manifests = config.manifests.builtin,
        manifest_dirs = config.manifests.directories.len(),
        features = config.features.len(),
        "Starting integration gateway"
    );

    let server = match Server::new(config).await {
        Ok(s) => s,
        Err(e) => {
            error!("Failed to create gateway: {e}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = server.run().await {
        error!("Gateway error: {e}");
        return ExitCode::FAILURE;
    }

    info!("Gateway shutdown complete");
    ExitCode::SUCCESS
}
