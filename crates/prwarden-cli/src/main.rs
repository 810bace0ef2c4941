//! prwarden - policy-driven pull request automation
//!
//! ## Commands
//!
//! - `lint`: compile a rule document and report dropped rules
//! - `eval`: preview (or dry-run execute) a pull request against a rule document
//! - `event`: feed a repository event through the engine with a dry-run SCM
//! - `registry`: list variables, triggers and actions

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use prwarden_core::{
    build_registry, compile_rules, obs::EventSpan, telemetry::init_tracing, CompiledRules,
    ConditionResult, DryRunScmClient, EngineConfig, EvaluatedRule, EvaluationContext,
    EventHandler, PullRequest, RepositoryEvent, RuleEngine, METRICS,
};
use prwarden_state::{BranchStore, MemoryStore, RepositoryId, Store, SurrealStore};
use serde::Serialize;
use tracing::{info, Level};

#[derive(Parser)]
#[command(name = "prwarden")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Policy-driven pull request automation", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// Persist to SurrealDB (configured from SURREALDB_* variables) instead of memory
    #[arg(long, global = true)]
    db: bool,

    /// Repository the rules belong to
    #[arg(short, long, global = true, default_value = "local/repository")]
    repository: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, Default, ValueEnum, PartialEq, Eq)]
enum Format {
    #[default]
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a rule document and report rules that would be dropped
    Lint {
        /// Rule document (YAML)
        rules: PathBuf,

        /// Fail when any rule is dropped
        #[arg(long)]
        strict: bool,

        #[arg(long, value_enum, default_value = "text")]
        format: Format,
    },

    /// Evaluate a pull request snapshot against a rule document
    Eval {
        /// Rule document (YAML)
        #[arg(long)]
        rules: PathBuf,

        /// Pull request snapshot (JSON)
        #[arg(long)]
        pull_request: PathBuf,

        /// Run actions for this trigger through a dry-run SCM client
        #[arg(long)]
        execute: Option<String>,

        /// Current head of the base branch, used for `behind`
        #[arg(long)]
        base_head: Option<String>,

        #[arg(long, value_enum, default_value = "text")]
        format: Format,
    },

    /// Handle a repository event (JSON) with a dry-run SCM client
    Event {
        /// Rule document (YAML)
        #[arg(long)]
        rules: PathBuf,

        /// Event payload (JSON, tagged by `kind`)
        #[arg(long)]
        event: PathBuf,

        #[arg(long, value_enum, default_value = "text")]
        format: Format,
    },

    /// List registered variables, triggers and actions
    Registry {
        #[arg(long, value_enum, default_value = "text")]
        format: Format,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::WARN
    };
    init_tracing(cli.json, level);

    let repository = RepositoryId::new(cli.repository);
    let result = match cli.command {
        Commands::Lint {
            rules,
            strict,
            format,
        } => cmd_lint(&repository, &rules, strict, format),
        Commands::Eval {
            rules,
            pull_request,
            execute,
            base_head,
            format,
        } => {
            let store = open_store(cli.db).await?;
            cmd_eval(
                store,
                &repository,
                &rules,
                &pull_request,
                execute.as_deref(),
                base_head.as_deref(),
                format,
            )
            .await
        }
        Commands::Event {
            rules,
            event,
            format,
        } => {
            let store = open_store(cli.db).await?;
            cmd_event(store, &repository, &rules, &event, format).await
        }
        Commands::Registry { format } => cmd_registry(format),
    };

    METRICS.flush();
    result
}

async fn open_store(db: bool) -> Result<Arc<dyn Store>> {
    if db {
        let store = SurrealStore::from_env()
            .await
            .context("Failed to connect to the prwarden database")?;
        Ok(Arc::new(store))
    } else {
        Ok(Arc::new(MemoryStore::new()))
    }
}

fn read_file(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

fn read_json_file<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let content = read_file(path)?;
    serde_json::from_str(&content).with_context(|| format!("Invalid JSON in {}", path.display()))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[derive(Serialize)]
struct LintReport<'a> {
    rules: Vec<LintedRule<'a>>,
    warnings: &'a [prwarden_core::CompileWarning],
}

#[derive(Serialize)]
struct LintedRule<'a> {
    title: &'a str,
    check: &'a str,
    order: u32,
    triggers: Vec<&'a str>,
    conditions: Vec<&'a str>,
    actions: Vec<&'a str>,
}

fn lint_report(compiled: &CompiledRules) -> LintReport<'_> {
    LintReport {
        rules: compiled
            .rules
            .iter()
            .map(|r| LintedRule {
                title: &r.title,
                check: &r.check_key,
                order: r.order,
                triggers: r.triggers.iter().map(|t| t.key.as_str()).collect(),
                conditions: r.conditions.iter().map(|c| c.expression.as_str()).collect(),
                actions: r.actions.iter().map(|a| a.key.as_str()).collect(),
            })
            .collect(),
        warnings: &compiled.warnings,
    }
}

/// Compile a rule document and print what survived
fn cmd_lint(repository: &RepositoryId, rules: &Path, strict: bool, format: Format) -> Result<()> {
    let source = read_file(rules)?;
    let registry = build_registry();
    let compiled = compile_rules(&source, repository, &registry)
        .with_context(|| format!("Failed to compile {}", rules.display()))?;

    let report = lint_report(&compiled);
    match format {
        Format::Json => print_json(&report)?,
        Format::Text => {
            for rule in &report.rules {
                println!("[{}] {} ({})", rule.order, rule.title, rule.check);
                println!("  triggers:   {}", rule.triggers.join(", "));
                println!("  conditions: {}", rule.conditions.join(" AND "));
                println!("  actions:    {}", rule.actions.join(", "));
            }
            for warning in &compiled.warnings {
                println!("warning: {}", warning);
            }
            println!(
                "{} rule(s) compiled, {} dropped",
                compiled.rules.len(),
                compiled.warnings.len()
            );
        }
    }

    if strict && !compiled.warnings.is_empty() {
        bail!("{} rule(s) dropped", compiled.warnings.len());
    }
    Ok(())
}

fn dry_run_engine(store: Arc<dyn Store>, rules_path: &str, source: String) -> RuleEngine {
    let config = EngineConfig::default().with_rules_path(rules_path);
    let scm = DryRunScmClient::new().with_file(rules_path, source);
    RuleEngine::new(store, Arc::new(scm), Arc::new(build_registry()), config)
}

/// Preview, or dry-run execute, one pull request
async fn cmd_eval(
    store: Arc<dyn Store>,
    repository: &RepositoryId,
    rules: &Path,
    pull_request: &Path,
    execute: Option<&str>,
    base_head: Option<&str>,
    format: Format,
) -> Result<()> {
    let source = read_file(rules)?;
    let pull_request: PullRequest = read_json_file(pull_request)?;
    let engine = dry_run_engine(store.clone(), &EngineConfig::default().rules_path, source);

    let compiled = engine.refresh_rules(repository).await?;
    for warning in &compiled.warnings {
        eprintln!("warning: {}", warning);
    }

    prwarden_core::ancestry::ingest_commits(
        store.as_ref(),
        repository,
        Some(pull_request.number),
        pull_request.commits.clone(),
    )
    .await?;
    if let Some(head) = base_head {
        store
            .update_branch_head(repository, &pull_request.base_branch, head)
            .await?;
    }

    let ctx = EvaluationContext::new(repository.clone(), pull_request);
    let _span = EventSpan::enter(
        repository.as_str(),
        Some(ctx.pull_request.number),
        execute.unwrap_or("preview"),
    );
    let evaluated = match execute {
        Some(trigger) => {
            if engine.registry().trigger(trigger).is_none() {
                bail!("Unknown trigger '{}'", trigger);
            }
            engine.execute(trigger, &ctx).await?
        }
        None => engine.preview(&ctx).await?,
    };
    info!(rules = evaluated.len(), "evaluation finished");
    print_evaluated(&evaluated, format)
}

/// Feed one event through the event handler
async fn cmd_event(
    store: Arc<dyn Store>,
    repository: &RepositoryId,
    rules: &Path,
    event: &Path,
    format: Format,
) -> Result<()> {
    let source = read_file(rules)?;
    let event: RepositoryEvent = read_json_file(event)?;
    let engine = Arc::new(dry_run_engine(
        store,
        &EngineConfig::default().rules_path,
        source,
    ));
    engine.refresh_rules(repository).await?;

    let handler = EventHandler::new(engine);
    let evaluated = handler.handle(repository, event).await?;
    print_evaluated(&evaluated, format)
}

fn print_evaluated(evaluated: &[EvaluatedRule], format: Format) -> Result<()> {
    if format == Format::Json {
        return print_json(&evaluated);
    }
    if evaluated.is_empty() {
        println!("No rules evaluated.");
        return Ok(());
    }
    for rule in evaluated {
        println!("{} [{}]", rule.rule.title, rule.status);
        for condition in &rule.conditions {
            let marker = match &condition.result {
                ConditionResult::True => "✓",
                ConditionResult::False => "✗",
                ConditionResult::Error(_) => "!",
            };
            print!("  {} {}", marker, condition.expression);
            if let ConditionResult::Error(e) = &condition.result {
                print!(" ({})", e);
            }
            println!();
        }
        for action in &rule.actions {
            match &action.result {
                Some(result) => println!(
                    "  -> {} {}: {}",
                    action.key, result.status, result.message
                ),
                None => println!("  -> {} not run", action.key),
            }
        }
    }
    Ok(())
}

#[derive(Serialize)]
struct RegistryListing {
    variables: Vec<VariableListing>,
    triggers: Vec<(&'static str, &'static str)>,
    actions: Vec<ActionListing>,
}

#[derive(Serialize)]
struct VariableListing {
    key: String,
    label: String,
    value_type: &'static str,
    default_triggers: Vec<&'static str>,
}

#[derive(Serialize)]
struct ActionListing {
    key: &'static str,
    label: &'static str,
    parameters: Vec<&'static str>,
    preconditions: Vec<&'static str>,
}

/// List the built-in registry
fn cmd_registry(format: Format) -> Result<()> {
    let registry = build_registry();
    let listing = RegistryListing {
        variables: registry
            .variables()
            .map(|v| VariableListing {
                key: v.key.clone(),
                label: v.label.clone(),
                value_type: v.value_type.as_str(),
                default_triggers: v.default_triggers.clone(),
            })
            .collect(),
        triggers: registry.triggers().map(|t| (t.key, t.label)).collect(),
        actions: registry
            .actions()
            .map(|a| ActionListing {
                key: a.key,
                label: a.label,
                parameters: a.parameters.iter().map(|p| p.name).collect(),
                preconditions: a.preconditions.clone(),
            })
            .collect(),
    };

    if format == Format::Json {
        return print_json(&listing);
    }

    println!("Variables:");
    for v in &listing.variables {
        println!(
            "  {:<28} {:<9} {}",
            v.key,
            v.value_type,
            v.default_triggers.join(", ")
        );
    }
    println!("Triggers:");
    for (key, label) in &listing.triggers {
        println!("  {:<28} {}", key, label);
    }
    println!("Actions:");
    for a in &listing.actions {
        println!(
            "  {:<28} params: [{}] requires: [{}]",
            a.key,
            a.parameters.join(", "),
            a.preconditions.join(", ")
        );
    }
    Ok(())
}
