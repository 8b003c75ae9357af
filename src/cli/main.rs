use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use serde_json::{Map, Value as JsonValue};
use soar_engine::cases::{create_store, CaseFilter, CaseManager, NewCase, DEFAULT_LIST_LIMIT};
use soar_engine::config::Config;
use soar_engine::integrations::IntegrationManager;
use soar_engine::models::{ArtifactType, Case, CaseStatus, ExecutionReport, Severity};
use soar_engine::observability::init_tracing;
use soar_engine::playbooks::service::playbook_files;
use soar_engine::playbooks::template::display_value;
use soar_engine::playbooks::{PlaybookEngine, PlaybookLoader, PlaybookService};
use std::path::PathBuf;
use std::sync::Arc;
use uuid::Uuid;

const RULE_WIDTH: usize = 70;

#[derive(Parser)]
#[command(name = "soar")]
#[command(about = "Security orchestration playbook runner", long_about = None, version)]
struct Cli {
    /// Configuration file (TOML or YAML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a playbook
    Run(RunArgs),

    /// List available playbooks
    List {
        /// Playbooks directory (defaults to the configured one)
        #[arg(short, long)]
        directory: Option<PathBuf>,
    },

    /// List loaded integrations
    Integrations,

    /// Manage cases
    #[command(subcommand)]
    Case(CaseCommands),
}

#[derive(Args)]
struct RunArgs {
    /// Path to the playbook YAML file
    #[arg(short, long)]
    playbook: PathBuf,

    /// Input parameters (key=value), repeatable
    #[arg(short, long = "input", value_parser = parse_key_val)]
    inputs: Vec<(String, String)>,

    /// Print the execution log
    #[arg(short, long)]
    verbose: bool,

    /// Save the report to a JSON file
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Attach the report to this case
    #[arg(long = "case")]
    case_id: Option<Uuid>,
}

#[derive(Subcommand)]
enum CaseCommands {
    /// Open a new case
    Create {
        #[arg(short, long)]
        title: String,

        #[arg(short, long, default_value = "")]
        description: String,

        #[arg(short, long, default_value = "medium")]
        severity: Severity,

        #[arg(long = "tag")]
        tags: Vec<String>,
    },

    /// List cases, newest first
    List {
        #[arg(long)]
        status: Option<CaseStatus>,

        #[arg(long)]
        severity: Option<Severity>,

        #[arg(short, long, default_value_t = DEFAULT_LIST_LIMIT)]
        limit: usize,
    },

    /// Show case details and timeline
    Show {
        #[arg(value_name = "CASE_ID")]
        id: Uuid,
    },

    /// Change case status
    Status {
        #[arg(value_name = "CASE_ID")]
        id: Uuid,

        status: CaseStatus,

        #[arg(short, long, default_value = "analyst")]
        user: String,
    },

    /// Add a comment
    Comment {
        #[arg(value_name = "CASE_ID")]
        id: Uuid,

        text: String,

        #[arg(short, long, default_value = "analyst")]
        user: String,
    },

    /// Attach an artifact (IOC)
    Artifact {
        #[arg(value_name = "CASE_ID")]
        id: Uuid,

        #[arg(short = 't', long = "type")]
        artifact_type: ArtifactType,

        value: String,

        #[arg(short, long, default_value = "")]
        description: String,
    },

    /// Search titles and descriptions
    Search { query: String },

    /// Case statistics
    Stats,
}

fn parse_key_val(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("invalid input '{}': expected key=value", s))?;
    Ok((key.trim().to_string(), value.trim().to_string()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = Config::load(cli.config.as_deref()).context("Failed to load configuration")?;
    init_tracing(&config.observability);

    match cli.command {
        Commands::Run(args) => {
            if !run_playbook(&config, args).await? {
                std::process::exit(1);
            }
        }
        Commands::List { directory } => {
            list_playbooks(directory.unwrap_or_else(|| config.playbooks.directory.clone()))?
        }
        Commands::Integrations => list_integrations(&config)?,
        Commands::Case(command) => {
            let cases = CaseManager::new(create_store(&config.cases)?);
            handle_case(&cases, command).await?;
        }
    }

    Ok(())
}

async fn run_playbook(config: &Config, args: RunArgs) -> anyhow::Result<bool> {
    print_header("Playbook Execution");

    let inputs: Map<String, JsonValue> = args
        .inputs
        .into_iter()
        .map(|(key, value)| (key, JsonValue::String(value)))
        .collect();

    println!("Playbook: {}", args.playbook.display());
    if !inputs.is_empty() {
        println!("Inputs: {}", JsonValue::Object(inputs.clone()));
    }
    println!();

    let integrations = Arc::new(IntegrationManager::from_config(&config.integrations)?);
    let loaded = integrations.list();
    println!(
        "Integrations: {}",
        if loaded.is_empty() { "None".to_string() } else { loaded.join(", ") }
    );

    let playbook = PlaybookLoader::from_path(&args.playbook)
        .with_context(|| format!("Failed to load {}", args.playbook.display()))?;
    println!("Name: {}", playbook.name);
    println!("Description: {}", playbook.description);
    println!("Actions: {}", playbook.action_count());
    if playbook.uses_integrations() && loaded.is_empty() {
        println!("Warning: playbook calls integrations but none are loaded");
    }

    let service = PlaybookService::new(
        PlaybookEngine::from_config(&config.engine).with_gateway(integrations),
    );
    println!("Scripting: {}\n", service.engine().script_evaluator());

    let name = playbook.name.clone();
    service.register(playbook);

    let report = match args.case_id {
        Some(case_id) => {
            let cases = CaseManager::new(create_store(&config.cases)?);
            println!("{}", "=".repeat(RULE_WIDTH));
            let report = service.run_for_case(&name, inputs, &cases, case_id).await?;
            println!("{}\n", "=".repeat(RULE_WIDTH));
            display_report(&report, args.verbose);
            println!("Report attached to case {}", case_id);
            report
        }
        None => {
            println!("{}", "=".repeat(RULE_WIDTH));
            let report = service.run(&name, inputs).await?;
            println!("{}\n", "=".repeat(RULE_WIDTH));
            display_report(&report, args.verbose);
            report
        }
    };

    if let Some(path) = args.output {
        let json = serde_json::to_string_pretty(&report)?;
        std::fs::write(&path, json).with_context(|| format!("Failed to write {}", path.display()))?;
        println!("Results saved to: {}", path.display());
    }

    Ok(report.is_success())
}

fn display_report(report: &ExecutionReport, verbose: bool) {
    println!("Execution Status: {}", report.status);
    if let Some(error) = &report.error {
        println!("  Error: {}", error);
    }
    println!("Duration: {:.2}s\n", report.duration_seconds);

    let results: Vec<_> = report.context.iter().filter(|(key, _)| *key != "inputs").collect();
    if !results.is_empty() {
        println!("Results:");
        println!("{}", "-".repeat(RULE_WIDTH));
        for (key, value) in results {
            let shown = display_value(value);
            if value.is_object() && shown.len() > 100 {
                println!("  {}: [complex object]", key);
            } else {
                println!("  {}: {}", key, shown);
            }
        }
        println!();
    }

    if verbose {
        println!("Execution Log:");
        println!("{}", "-".repeat(RULE_WIDTH));
        for entry in &report.execution_log {
            println!(
                "[{}] [{}] {}",
                entry.timestamp.format("%H:%M:%S"),
                entry.level,
                entry.message
            );
        }
        println!();
    }
}

fn list_playbooks(directory: PathBuf) -> anyhow::Result<()> {
    print_header("Available Playbooks");

    if !directory.is_dir() {
        bail!("Directory not found: {}", directory.display());
    }

    let mut paths = playbook_files(&directory)?;
    paths.sort();
    if paths.is_empty() {
        println!("No playbooks found in {}", directory.display());
        return Ok(());
    }

    for path in paths {
        let file = path.file_name().map(|f| f.to_string_lossy().into_owned()).unwrap_or_default();
        match PlaybookLoader::from_path(&path) {
            Ok(playbook) => {
                println!("{}", file);
                println!("  Name: {}", playbook.name);
                println!("  Description: {}", playbook.description);
                println!(
                    "  Inputs: {}",
                    if playbook.inputs.is_empty() { "None".to_string() } else { playbook.inputs.join(", ") }
                );
                println!("  Actions: {}\n", playbook.action_count());
            }
            Err(e) => println!("{} - Error loading: {}\n", file, e),
        }
    }

    Ok(())
}

fn list_integrations(config: &Config) -> anyhow::Result<()> {
    print_header("Integrations Status");

    let manager = IntegrationManager::from_config(&config.integrations)?;
    let names = manager.list();

    let skipped: Vec<String> = config
        .enabled_integrations()
        .into_iter()
        .filter(|name| !names.contains(name))
        .collect();
    if !skipped.is_empty() {
        println!("Enabled but not available: {}\n", skipped.join(", "));
    }

    if names.is_empty() {
        println!("No integrations loaded");
        return Ok(());
    }

    println!("Loaded {} integration(s):\n", names.len());
    for name in names {
        let integration = manager.require(&name)?;
        println!("{}", name);
        println!("  Actions: {}", integration.available_actions().join(", "));
        println!(
            "  Status: {}\n",
            if integration.has_credentials() { "API Key Configured" } else { "Using Mock Data" }
        );
    }

    Ok(())
}

async fn handle_case(cases: &CaseManager, command: CaseCommands) -> anyhow::Result<()> {
    match command {
        CaseCommands::Create {
            title,
            description,
            severity,
            tags,
        } => {
            let case = cases
                .create_case(NewCase {
                    title,
                    description,
                    severity,
                    tags,
                })
                .await?;
            println!("Created case {}", case.id);
        }
        CaseCommands::List {
            status,
            severity,
            limit,
        } => {
            let filter = CaseFilter { status, severity };
            let found = cases.list_cases(&filter, limit).await?;
            print_case_rows(&found);
        }
        CaseCommands::Show { id } => print_case(&cases.get_case(id).await?),
        CaseCommands::Status { id, status, user } => {
            let case = cases.update_status(id, status, &user).await?;
            println!("Case {} is now {}", case.id, case.status);
        }
        CaseCommands::Comment { id, text, user } => {
            cases.add_comment(id, text, &user).await?;
            println!("Comment added to case {}", id);
        }
        CaseCommands::Artifact {
            id,
            artifact_type,
            value,
            description,
        } => {
            cases
                .add_artifact(id, artifact_type, value, description, Vec::new())
                .await?;
            println!("Artifact added to case {}", id);
        }
        CaseCommands::Search { query } => print_case_rows(&cases.search_cases(&query).await?),
        CaseCommands::Stats => {
            let stats = cases.statistics().await?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
    }

    Ok(())
}

fn print_case_rows(cases: &[Case]) {
    if cases.is_empty() {
        println!("No cases found");
        return;
    }
    for case in cases {
        println!(
            "{}  {:<13} {:<8} {}  {}",
            case.id,
            case.status,
            case.severity,
            case.created_at.format("%Y-%m-%d %H:%M"),
            case.title
        );
    }
}

fn print_case(case: &Case) {
    print_header(&case.title);
    println!("ID: {}", case.id);
    println!("Status: {}", case.status);
    println!("Severity: {}", case.severity);
    println!("Assigned to: {}", case.assigned_to.as_deref().unwrap_or("-"));
    if !case.tags.is_empty() {
        println!("Tags: {}", case.tags.join(", "));
    }
    if !case.description.is_empty() {
        println!("\n{}", case.description);
    }

    if !case.artifacts.is_empty() {
        println!("\nArtifacts:");
        for artifact in &case.artifacts {
            println!("  [{}] {}", artifact.artifact_type, artifact.value);
        }
    }

    println!("\nTimeline:");
    for event in &case.events {
        println!(
            "  {} {:<14} {} ({})",
            event.timestamp.format("%Y-%m-%d %H:%M:%S"),
            event.event_type,
            event.description,
            event.user
        );
    }
}

fn print_header(title: &str) {
    println!();
    println!("{}", "=".repeat(RULE_WIDTH));
    println!("  {}", title);
    println!("{}", "=".repeat(RULE_WIDTH));
    println!();
}
