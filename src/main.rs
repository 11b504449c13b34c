use std::process;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use clap::{Parser, Subcommand};
use comfy_table::{modifiers, presets, ContentArrangement, Table};
use indicatif::{ProgressBar, ProgressStyle};
use terminal_size::{terminal_size, Width};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};
use yansi::Paint;

use dno::api::{self, DeployRequest, HttpGateway};
use dno::cache::{ExpansionController, TreeCache, UptimeRefresher};
use dno::config;
use dno::error::FetchError;
use dno::model::{ChildStatus, MirrorRequest, ResourceKey, ResourceNode};

#[derive(Parser)]
#[command(
    name = "dno",
    author,
    version,
    about = "Terminal dashboard for your cloud network topology",
    long_about = r#"dno — browse a cloud account's network topology, configure
traffic-mirror sessions and deploy monitoring nodes from the terminal.

The tool talks to the dno backend (API_BASE_URL); resources are loaded
on demand and cached for the lifetime of the command.

Examples:
  1) Region overview:
      dno topology
  2) Everything under one region:
      dno topology --region us-east-1
  3) Instance table, refreshed every minute:
      dno instances --region us-east-1 --watch
  4) Mirror a web server into a monitoring node:
      dno mirror create --region us-east-1 --source i-001 --target i-aviz-001
"#,
    after_help = "Use `dno <subcommand> --help` for subcommand specific options."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
    /// Disable colorized output
    #[arg(long, global = true)]
    no_color: bool,
    /// Disable request logging
    #[arg(long, global = true)]
    silent: bool,
    /// Path to .env file
    #[arg(long, global = true)]
    env_file: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Browse the region / VPC / subnet / instance tree
    #[command(about = "Browse the topology tree", long_about = "With no --region, print a region overview with VPC counts. With --region, expand the whole region down to hydrated instances, including uptime for running ones.")]
    Topology {
        /// Region to expand fully
        #[arg(long)]
        region: Option<String>,
    },
    /// Tabulate instances in a region
    #[command(about = "List instances as a table", long_about = "Walk the region's VPCs and subnets and print one row per instance. `--vpc` and `--subnet` narrow the walk; `--watch` keeps the table on screen and recomputes uptimes every refresh interval.")]
    Instances {
        #[arg(long)]
        region: String,
        /// Only this VPC id
        #[arg(long)]
        vpc: Option<String>,
        /// Only this subnet id
        #[arg(long)]
        subnet: Option<String>,
        /// Re-render periodically with recomputed uptimes
        #[arg(long)]
        watch: bool,
    },
    /// Manage traffic-mirror sessions
    Mirror {
        #[command(subcommand)]
        sub: MirrorCommands,
    },
    /// Deploy a monitoring node into a VPC
    #[command(about = "Deploy a monitoring node", long_about = "Launch a monitoring-node instance into the given VPC. Without --subnet the backend picks the VPC's first subnet.")]
    Deploy {
        #[arg(long)]
        region: String,
        #[arg(long)]
        vpc: String,
        #[arg(long)]
        ami: String,
        #[arg(long, default_value = "t3.medium")]
        instance_type: String,
        #[arg(long)]
        key_name: Option<String>,
        #[arg(long)]
        subnet: Option<String>,
    },
    /// Validate configuration and backend connectivity
    #[command(about = "Validate configuration and ensure backend connectivity.")]
    CheckConfig,
}

#[derive(Subcommand)]
enum MirrorCommands {
    /// List mirror filters, rules and sessions in a region
    List {
        #[arg(long)]
        region: String,
    },
    /// Create a mirror session between two instances
    Create {
        #[arg(long)]
        region: String,
        /// Source instance id (traffic producer)
        #[arg(long)]
        source: String,
        /// Target instance id (the monitoring node)
        #[arg(long)]
        target: String,
        /// IP protocol number for the filter rules
        #[arg(long, default_value_t = 1)]
        protocol: i64,
        /// Mirrored directions (repeatable)
        #[arg(long, default_values_t = vec![String::from("ingress"), String::from("egress")])]
        direction: Vec<String>,
    },
    /// Delete a mirror session (and its orphaned target/filter)
    Delete {
        session_id: String,
        #[arg(long)]
        region: String,
    },
}

fn new_table(headers: Vec<&str>) -> Table {
    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL);
    table.apply_modifier(modifiers::UTF8_ROUND_CORNERS);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    if let Some((Width(w), _)) = terminal_size() {
        table.set_width(w.saturating_sub(4));
    }
    table.set_header(headers);
    table
}

fn spinner(message: &str) -> ProgressBar {
    let bar = ProgressBar::new_spinner();
    bar.set_style(
        ProgressStyle::with_template("{spinner} {msg}").unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    bar.set_message(message.to_string());
    bar.enable_steady_tick(Duration::from_millis(120));
    bar
}

fn state_badge(state: &str) -> String {
    match state {
        "running" => Paint::new(state).fg(yansi::Color::Green).bold().to_string(),
        "stopped" => Paint::new(state).fg(yansi::Color::BrightBlack).to_string(),
        "stopping" | "pending" => Paint::new(state).fg(yansi::Color::Yellow).to_string(),
        other => other.to_string(),
    }
}

fn fail(context: &str, error: &FetchError) -> ! {
    eprintln!("{}: {}", Paint::new(context).red(), error);
    process::exit(1);
}

/// Walk one region down to hydrated instances, loading on demand.
async fn load_region_tree(
    controller: &mut ExpansionController<HttpGateway>,
    region: &ResourceKey,
) -> Result<(), FetchError> {
    let vpcs = controller.expand(region).await?;
    for vpc in vpcs {
        let subnets = controller.expand(&vpc).await?;
        for subnet in subnets {
            // Expanding a subnet also hydrates its instances.
            controller.expand(&subnet).await?;
        }
    }
    Ok(())
}

fn instance_row(node: &ResourceNode) -> Vec<String> {
    vec![
        node.display_name().to_string(),
        node.key.id().to_string(),
        node.attr_str("PrivateIpAddress").unwrap_or("-").to_string(),
        node.attr_str("PublicIpAddress").unwrap_or("-").to_string(),
        state_badge(node.attr_str("State").unwrap_or("-")),
        node.attr_str("Uptime").unwrap_or("N/A").to_string(),
    ]
}

async fn topology_overview(cache: &TreeCache<HttpGateway>) {
    let bar = spinner("Loading topology overview...");
    let regions = match cache.ensure_children_loaded(None).await {
        Ok(regions) => regions,
        Err(e) => {
            bar.finish_and_clear();
            fail("Failed to load regions", &e);
        }
    };
    let mut table = new_table(vec!["Region", "VPCs"]);
    for region in &regions {
        // A failed region listing shows inline; the others still load.
        let count = match cache.ensure_children_loaded(Some(region)).await {
            Ok(vpcs) => vpcs.len().to_string(),
            Err(e) => Paint::new(format!("error: {}", e)).red().to_string(),
        };
        table.add_row(vec![region.id().to_string(), count]);
    }
    bar.finish_and_clear();
    println!("\n{table}\n");
}

async fn topology_region(cache: Arc<TreeCache<HttpGateway>>, region_id: &str) {
    let region = ResourceKey::region(region_id);
    let mut controller = ExpansionController::new(cache.clone());
    let bar = spinner(&format!("Loading topology for {}...", region_id));
    let result = load_region_tree(&mut controller, &region).await;
    bar.finish_and_clear();
    if let Err(e) = result {
        fail("Failed to load topology", &e);
    }

    // One uptime pass so running instances print a fresh value.
    UptimeRefresher::new(cache.clone(), Duration::from_secs(config::get_uptime_refresh_secs()))
        .tick(Utc::now());

    let region_view = cache.view(Some(&region));
    println!("{} {}", Paint::new("Region").bold(), Paint::new(region_id).cyan());
    for vpc_key in &region_view.children {
        let Some(vpc) = cache.get(vpc_key) else { continue };
        println!(
            "  {} {} ({} subnets)",
            Paint::new(vpc.display_name()).bold(),
            Paint::new(vpc_key.id()).dim(),
            vpc.children.len()
        );
        for subnet_key in &vpc.children {
            let Some(subnet) = cache.get(subnet_key) else { continue };
            let cidr = subnet.attr_str("CidrBlock").unwrap_or("-");
            let free_ips = subnet
                .attributes
                .get("AvailableIpAddressCount")
                .and_then(|v| v.as_i64())
                .map(|n| n.to_string())
                .unwrap_or_else(|| "-".into());
            println!(
                "    {} {} {} ({} free IPs)",
                Paint::new(subnet.display_name()).bold(),
                Paint::new(subnet_key.id()).dim(),
                cidr,
                free_ips
            );
            if subnet.children.is_empty() {
                println!("      {}", Paint::new("No instances").dim());
            }
            for instance_key in &subnet.children {
                let Some(instance) = cache.get(instance_key) else { continue };
                match &instance.status {
                    ChildStatus::Failed(e) => println!(
                        "      {} {} {}",
                        instance_key.id(),
                        Paint::new("details unavailable:").red(),
                        e
                    ),
                    _ => println!(
                        "      {} {} {} / {}  {}  up {}",
                        Paint::new(instance.display_name()).bold(),
                        Paint::new(instance_key.id()).dim(),
                        instance.attr_str("PrivateIpAddress").unwrap_or("-"),
                        instance.attr_str("PublicIpAddress").unwrap_or("-"),
                        state_badge(instance.attr_str("State").unwrap_or("-")),
                        instance.attr_str("Uptime").unwrap_or("N/A")
                    ),
                }
            }
        }
    }
}

async fn instances_table(
    cache: Arc<TreeCache<HttpGateway>>,
    region_id: &str,
    vpc: Option<&str>,
    subnet: Option<&str>,
    watch: bool,
) {
    let region = ResourceKey::region(region_id);
    let mut controller = ExpansionController::new(cache.clone());
    let bar = spinner(&format!("Loading instances in {}...", region_id));
    let result = load_region_tree(&mut controller, &region).await;
    bar.finish_and_clear();
    if let Err(e) = result {
        fail("Failed to load instances", &e);
    }

    let interval = Duration::from_secs(config::get_uptime_refresh_secs());
    let refresher = UptimeRefresher::new(cache.clone(), interval);
    refresher.tick(Utc::now());
    print_instances(&cache, &region, vpc, subnet);

    if !watch {
        return;
    }
    // The refresher keeps uptimes current; this loop just re-renders.
    tokio::spawn(UptimeRefresher::new(cache.clone(), interval).run());
    loop {
        tokio::time::sleep(interval).await;
        println!("{}", Paint::new(format!("-- {} --", Utc::now().to_rfc3339())).dim());
        print_instances(&cache, &region, vpc, subnet);
    }
}

fn print_instances(
    cache: &TreeCache<HttpGateway>,
    region: &ResourceKey,
    vpc_filter: Option<&str>,
    subnet_filter: Option<&str>,
) {
    let mut table = new_table(vec![
        "Instance Name",
        "Instance ID",
        "Private IP",
        "Public IP",
        "Status",
        "Uptime",
    ]);
    let mut rows = 0;
    for vpc_key in cache.view(Some(region)).children {
        if vpc_filter.is_some_and(|f| f != vpc_key.id()) {
            continue;
        }
        for subnet_key in cache.view(Some(&vpc_key)).children {
            if subnet_filter.is_some_and(|f| f != subnet_key.id()) {
                continue;
            }
            for instance_key in cache.view(Some(&subnet_key)).children {
                if let Some(node) = cache.get(&instance_key) {
                    table.add_row(instance_row(&node));
                    rows += 1;
                }
            }
        }
    }
    if rows == 0 {
        println!("No instances found");
    } else {
        println!("\n{table}\n");
    }
}

async fn mirror_list(gateway: &HttpGateway, region: &str) {
    let filters = match api::list_mirror_filters(gateway, region).await {
        Ok(filters) => filters,
        Err(e) => fail("Failed to list mirror filters", &e),
    };
    if filters.is_empty() {
        println!("No mirror filters in {}", region);
        return;
    }
    let mut table = new_table(vec!["Filter", "Session", "Source", "Target", "Session #"]);
    for filter in &filters {
        if filter.sessions.is_empty() {
            table.add_row(vec![filter.filter_id.clone(), "-".into(), "-".into(), "-".into(), "-".into()]);
        }
        for session in &filter.sessions {
            table.add_row(vec![
                filter.filter_id.clone(),
                session.session_id.clone(),
                session.source_instance_id.clone(),
                session.target_id.clone(),
                session.session_number.to_string(),
            ]);
        }
    }
    println!("\n{table}\n");
    for filter in &filters {
        for rule in &filter.rules {
            println!(
                "{} {} {} {} -> {} ({})",
                Paint::new(&filter.filter_id).dim(),
                rule.rule_id,
                rule.direction,
                rule.source_cidr,
                rule.destination_cidr,
                rule.action
            );
        }
    }
}

async fn check_config(gateway: &HttpGateway) {
    println!("API base URL: {}", Paint::new(gateway.base_url()).cyan());
    match gateway.get("/regions", &[]).await {
        Ok(_) => println!("{}", Paint::new("Backend reachable").green()),
        Err(e) => {
            eprintln!("{}: {}", Paint::new("Backend unreachable").red(), e);
            process::exit(1);
        }
    }
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    if cli.no_color {
        yansi::whenever(yansi::Condition::NEVER);
    }
    if cli.silent {
        api::set_silent(true);
    }

    config::load_env_file(cli.env_file.as_deref());
    let gateway = HttpGateway::from_env();
    let cache = Arc::new(TreeCache::new(gateway.clone()));

    match cli.command {
        Commands::Topology { region } => match region {
            Some(region) => topology_region(cache, &region).await,
            None => topology_overview(&cache).await,
        },
        Commands::Instances { region, vpc, subnet, watch } => {
            instances_table(cache, &region, vpc.as_deref(), subnet.as_deref(), watch).await;
        }
        Commands::Mirror { sub } => match sub {
            MirrorCommands::List { region } => mirror_list(&gateway, &region).await,
            MirrorCommands::Create { region, source, target, protocol, direction } => {
                let mut request = MirrorRequest::new(region, source, target);
                request.protocol = protocol;
                request.directions = direction;
                match api::create_mirror_session(&gateway, &request).await {
                    Ok(created) => {
                        println!("{}", Paint::new("Mirror session created").green());
                        println!("  filter:   {}", created.filter_id);
                        println!("  target:   {} ({})", created.target_id, created.target_eni);
                        println!("  source:   {}", created.source_eni);
                        println!("  session#: {}", created.session_number);
                    }
                    Err(e) => fail("Failed to create mirror session", &e),
                }
            }
            MirrorCommands::Delete { session_id, region } => {
                match api::delete_mirror_session(&gateway, &region, &session_id).await {
                    Ok(message) => println!("{}", message),
                    Err(e) => fail("Failed to delete mirror session", &e),
                }
            }
        },
        Commands::Deploy { region, vpc, ami, instance_type, key_name, subnet } => {
            let request = DeployRequest {
                region,
                vpc_id: vpc,
                ami_id: ami,
                instance_type,
                key_name,
                subnet_id: subnet,
            };
            match api::deploy_node(&gateway, &request).await {
                Ok(instance_id) => {
                    println!("{} {}", Paint::new("Deployed monitoring node").green(), instance_id);
                }
                Err(e) => fail("Failed to deploy node", &e),
            }
        }
        Commands::CheckConfig => check_config(&gateway).await,
    }
}
