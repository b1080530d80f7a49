//! Edgefleet - edge device fleet manager
//!
//! Usage:
//!   edgefleet devices --principal 3          # Devices visible to a principal
//!   edgefleet eligible --principal 3 --app 2 # Install eligibility per device
//!   edgefleet provision --principal 3 --app 2 --device 4 --device 5
//!   edgefleet init-config                    # Write a default edgefleet.toml

use std::path::PathBuf;

use anyhow::Result;
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use edgefleet_core::access::{AccessScopeResolver, ScopeDecision};
use edgefleet_core::catalog::{AppStoreEntry, Catalog, DeviceMapEntry, DeviceWithApplications};
use edgefleet_core::context::AppContext;
use edgefleet_core::deploy::{DeploymentOrchestrator, ProvisionReport, report_instance_status};
use edgefleet_core::eligibility::{EligibilityEngine, EligibleDevice};
use edgefleet_core::platform::{ClusterPlatform, InMemoryCluster};
use edgefleet_core::store::{LogQuery, MemoryStore};
use edgefleet_core::types::{
    ApplicationId, DeviceId, InstanceId, InstanceStatus, LogEntry, Principal, PrincipalId,
};

#[derive(Parser)]
#[command(name = "edgefleet")]
#[command(about = "Edge device fleet manager", long_about = None)]
struct Cli {
    /// Path to edgefleet.toml (defaults to the user config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Inventory snapshot to use instead of the configured one
    #[arg(long, global = true)]
    inventory: Option<PathBuf>,

    /// Output format
    #[arg(short, long, global = true, default_value = "table")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show which devices a principal may see
    Scope {
        #[arg(long)]
        principal: PrincipalId,
    },

    /// List visible devices with their applications and tags
    Devices {
        #[arg(long)]
        principal: PrincipalId,
    },

    /// List visible devices with coordinates and municipality
    Map {
        #[arg(long)]
        principal: PrincipalId,
    },

    /// Check which visible devices can take an application
    Eligible {
        #[arg(long)]
        principal: PrincipalId,
        #[arg(long)]
        app: ApplicationId,
    },

    /// Deploy an application onto devices
    Provision {
        #[arg(long)]
        principal: PrincipalId,
        #[arg(long)]
        app: ApplicationId,
        /// Target device (repeatable)
        #[arg(long = "device", value_name = "ID", required = true)]
        devices: Vec<DeviceId>,
        /// Plan against an in-process cluster instead of the configured one
        #[arg(long)]
        dry_run: bool,
    },

    /// List applications and the sensors they need
    Apps,

    /// List principals, or show one
    Members {
        #[arg(long)]
        id: Option<PrincipalId>,
    },

    /// Show device or instance logs
    Logs {
        #[arg(long)]
        device: Option<DeviceId>,
        #[arg(long)]
        instance: Option<InstanceId>,
        /// RFC 3339 lower bound
        #[arg(long)]
        since: Option<DateTime<Utc>>,
        /// RFC 3339 upper bound
        #[arg(long)]
        until: Option<DateTime<Utc>>,
    },

    /// Record a health report for an application instance
    InstanceStatus {
        instance: InstanceId,
        /// pending, provisioning, online, error or offline
        status: String,
    },

    /// Write a default edgefleet.toml if none exists
    InitConfig {
        /// Overwrite an existing file
        #[arg(long, short)]
        force: bool,
    },
}

#[derive(Clone, Copy, ValueEnum, Default)]
enum OutputFormat {
    /// Human-readable table
    #[default]
    Table,
    /// Machine-readable JSON
    Json,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "edgefleet=debug,info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let ctx = AppContext::load(cli.config, cli.inventory)?;
    run(&ctx, cli.command, cli.format).await
}

async fn run(ctx: &AppContext, command: Commands, format: OutputFormat) -> Result<()> {
    let store = ctx.open_store()?;
    match command {
        Commands::Scope { principal } => {
            let decision = AccessScopeResolver::new(&store).resolve_scope(principal)?;
            print_scope(principal, &decision, format)?;
        }
        Commands::Devices { principal } => {
            let devices = Catalog::new(&store).devices_with_applications(principal)?;
            print_devices(&devices, format)?;
        }
        Commands::Map { principal } => {
            let entries = Catalog::new(&store).device_map(principal)?;
            print_map(&entries, format)?;
        }
        Commands::Eligible { principal, app } => {
            let results = EligibilityEngine::new(&store).eligible_devices_for(principal, app)?;
            print_eligibility(&results, format)?;
        }
        Commands::Provision {
            principal,
            app,
            devices,
            dry_run,
        } => {
            let report = if dry_run {
                // plan against a detached copy so the inventory file stays untouched
                let scratch = store.detached()?;
                let cluster = InMemoryCluster::new();
                provision(ctx, &scratch, &cluster, principal, app, &devices).await?
            } else {
                let cluster = ctx.kube_client()?;
                provision(ctx, &store, &cluster, principal, app, &devices).await?
            };
            print_provision(&report, dry_run, format)?;
        }
        Commands::Apps => {
            let apps = Catalog::new(&store).app_store()?;
            print_apps(&apps, format)?;
        }
        Commands::Members { id } => {
            let catalog = Catalog::new(&store);
            let principals = match id {
                Some(id) => match catalog.principal(id)? {
                    Some(principal) => vec![principal],
                    None => anyhow::bail!("Principal {} not found", id),
                },
                None => catalog.principals()?,
            };
            print_members(&principals, format)?;
        }
        Commands::Logs {
            device,
            instance,
            since,
            until,
        } => {
            let query = LogQuery {
                device_id: device,
                app_instance_id: instance,
                start: since,
                end: until,
            };
            let logs = Catalog::new(&store).logs(&query)?;
            print_logs(&logs, format)?;
        }
        Commands::InstanceStatus { instance, status } => {
            let status: InstanceStatus = status.parse()?;
            let updated = report_instance_status(&store, instance, status)?;
            match format {
                OutputFormat::Json => print_json(&updated)?,
                OutputFormat::Table => println!(
                    "Instance {} on device {} is now {}",
                    updated.id, updated.device_id, updated.status
                ),
            }
        }
        Commands::InitConfig { force } => run_init_config(ctx, force)?,
    }
    Ok(())
}

async fn provision<P: ClusterPlatform>(
    ctx: &AppContext,
    store: &MemoryStore,
    cluster: &P,
    principal: PrincipalId,
    app: ApplicationId,
    devices: &[DeviceId],
) -> Result<ProvisionReport> {
    let orchestrator = DeploymentOrchestrator::new(store, cluster, ctx.deploy_settings()?);
    let report = orchestrator.provision(principal, app, devices).await?;
    info!(
        app,
        deployed = report.deployments.len(),
        "provisioning finished"
    );
    Ok(report)
}

fn run_init_config(ctx: &AppContext, force: bool) -> Result<()> {
    let store = ctx.config_store();
    if store.config_path().exists() && !force {
        anyhow::bail!(
            "Config already exists at {} (use --force to overwrite)",
            store.config_path().display()
        );
    }
    store.save(ctx.config())?;
    println!("Wrote {}", store.config_path().display());
    Ok(())
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_scope(principal: PrincipalId, decision: &ScopeDecision, format: OutputFormat) -> Result<()> {
    if let OutputFormat::Json = format {
        return print_json(decision);
    }
    match decision {
        ScopeDecision::Unrestricted => println!("Principal {}: all devices", principal),
        ScopeDecision::RestrictedToNone => println!("Principal {}: no devices", principal),
        ScopeDecision::RestrictedToTags(tags) => {
            let tags: Vec<&str> = tags.iter().map(String::as_str).collect();
            println!(
                "Principal {}: devices tagged {}",
                principal,
                tags.join(", ")
            );
        }
    }
    Ok(())
}

fn print_devices(devices: &[DeviceWithApplications], format: OutputFormat) -> Result<()> {
    if let OutputFormat::Json = format {
        return print_json(devices);
    }
    if devices.is_empty() {
        println!("No devices visible.");
        return Ok(());
    }

    println!(
        "{:<6} {:<24} {:<10} {:<16} {:<20} Applications",
        "ID", "Name", "Status", "IP", "Tags"
    );
    println!("{}", "-".repeat(96));
    for device in devices {
        let tags: Vec<&str> = device.tags.iter().map(|t| t.name.as_str()).collect();
        let apps: Vec<String> = device
            .applications
            .iter()
            .map(|a| format!("{} ({})", a.name, a.status))
            .collect();
        println!(
            "{:<6} {:<24} {:<10} {:<16} {:<20} {}",
            device.device_id,
            truncate(&device.name, 24),
            device.status,
            device.ip_address,
            truncate(&tags.join(","), 20),
            if apps.is_empty() {
                "-".to_string()
            } else {
                apps.join(", ")
            }
        );
    }
    Ok(())
}

fn print_map(entries: &[DeviceMapEntry], format: OutputFormat) -> Result<()> {
    if let OutputFormat::Json = format {
        return print_json(entries);
    }
    println!(
        "{:<6} {:<24} {:<10} {:<16} {:>10} {:>10}",
        "ID", "Name", "Status", "Municipality", "Lat", "Lon"
    );
    println!("{}", "-".repeat(81));
    for entry in entries {
        println!(
            "{:<6} {:<24} {:<10} {:<16} {:>10.5} {:>10.5}",
            entry.id,
            truncate(&entry.name, 24),
            entry.status,
            if entry.municipality.is_empty() {
                "-"
            } else {
                &entry.municipality
            },
            entry.latitude,
            entry.longitude
        );
    }
    Ok(())
}

fn print_eligibility(results: &[EligibleDevice], format: OutputFormat) -> Result<()> {
    if let OutputFormat::Json = format {
        return print_json(results);
    }
    println!("{:<6} {:<24} {:<9} Reason", "ID", "Device", "Eligible");
    println!("{}", "-".repeat(70));
    for entry in results {
        println!(
            "{:<6} {:<24} {:<9} {}",
            entry.result.device_id,
            truncate(&entry.device, 24),
            if entry.result.eligible { "yes" } else { "no" },
            entry.result.reason
        );
    }
    Ok(())
}

fn print_provision(report: &ProvisionReport, dry_run: bool, format: OutputFormat) -> Result<()> {
    if let OutputFormat::Json = format {
        return print_json(report);
    }
    if dry_run {
        println!("Dry run: no cluster or inventory changes were made.");
    }
    println!(
        "Application {} on {} device(s):",
        report.application_id,
        report.deployments.len()
    );
    for deployment in &report.deployments {
        println!(
            "  device {:<6} {:<28} port {:<6} {}",
            deployment.device_id, deployment.workload, deployment.node_port, deployment.path
        );
    }
    Ok(())
}

fn print_apps(apps: &[AppStoreEntry], format: OutputFormat) -> Result<()> {
    if let OutputFormat::Json = format {
        return print_json(apps);
    }
    println!("{:<6} {:<24} {:<10} Sensors", "ID", "Name", "Version");
    println!("{}", "-".repeat(70));
    for app in apps {
        let sensors: Vec<&str> = app.sensors.iter().map(|s| s.name.as_str()).collect();
        println!(
            "{:<6} {:<24} {:<10} {}",
            app.id,
            truncate(&app.name, 24),
            app.version,
            if sensors.is_empty() {
                "-".to_string()
            } else {
                sensors.join(", ")
            }
        );
    }
    Ok(())
}

fn print_members(principals: &[Principal], format: OutputFormat) -> Result<()> {
    if let OutputFormat::Json = format {
        return print_json(principals);
    }
    println!("{:<6} {:<24} Roles", "ID", "Name");
    println!("{}", "-".repeat(60));
    for principal in principals {
        let roles: Vec<&str> = principal.roles.iter().map(|r| r.name.as_str()).collect();
        println!(
            "{:<6} {:<24} {}",
            principal.id,
            truncate(&principal.name, 24),
            roles.join(", ")
        );
    }
    Ok(())
}

fn print_logs(logs: &[LogEntry], format: OutputFormat) -> Result<()> {
    if let OutputFormat::Json = format {
        return print_json(logs);
    }
    if logs.is_empty() {
        println!("No log entries.");
        return Ok(());
    }
    for entry in logs {
        println!(
            "{} [{:?}] device {}: {}",
            entry.timestamp.to_rfc3339(),
            entry.warning_level,
            entry.device_id,
            entry.description
        );
    }
    Ok(())
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{}~", kept)
    }
}
