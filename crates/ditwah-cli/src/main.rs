//! Ditwah CLI - crisis message intelligence pipeline

use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow, bail};
use clap::{Parser, Subcommand};
use ditwah_core::Error;
use ditwah_core::commands::spam::{self, Screening, SpamFilterBatch};
use ditwah_core::commands::temperature::{self, ProbePlan};
use ditwah_core::commands::{allocate, classify, extract};
use ditwah_core::config::Config;
use ditwah_core::dispatch::Dispatcher;
use ditwah_core::llm::Provider;
use ditwah_core::routing::{ModelRouter, ParamOverrides, RouteDecision};
use ditwah_core::runlog::RunLogger;
use ditwah_core::storage;
use ditwah_core::tokens::{GuardPolicy, TokenGuard, Tokenizer};
use serde::Serialize;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "ditwah")]
#[command(author, version, about = "Crisis message intelligence pipeline", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text")]
    format: OutputFormat,

    /// Quiet mode (minimal output)
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Provider to use (openai, google, groq); overrides config and environment
    #[arg(short, long, global = true)]
    provider: Option<String>,
}

#[derive(Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify messages by district, intent and priority
    Classify {
        /// Messages file, one message per line
        #[arg(short, long)]
        input: Option<PathBuf>,
        /// A single message
        #[arg(short, long)]
        message: Option<String>,
        /// Override the sampling temperature
        #[arg(long)]
        temperature: Option<f32>,
        /// Skip writing CSV and Excel reports
        #[arg(long)]
        no_export: bool,
    },

    /// Compare answer consistency across temperatures
    Temperature {
        /// Scenarios file, scenarios separated by blank lines
        #[arg(short, long)]
        input: Option<PathBuf>,
        /// A single scenario
        #[arg(short, long)]
        scenario: Option<String>,
        /// Temperatures to probe (comma separated); default is 1.0 x3 and 0.0 x1
        #[arg(long, value_delimiter = ',')]
        temperatures: Vec<f32>,
        /// Runs per temperature when --temperatures is given
        #[arg(long, default_value_t = 3)]
        iterations: u32,
    },

    /// Score incidents and plan a rescue route
    Allocate {
        /// Incidents file, `location: description [| people=N | need=X | age=Y]` per line
        #[arg(short, long)]
        input: PathBuf,
        /// Where the rescue boat starts
        #[arg(long, default_value = "Ragama")]
        start: String,
        /// Travel times between locations, free text
        #[arg(long)]
        travel_times: Option<String>,
        /// Skip writing the priority scores report
        #[arg(long)]
        no_export: bool,
    },

    /// Screen messages against a token ceiling
    Tokens {
        /// Messages file, one message per line
        #[arg(short, long)]
        input: Option<PathBuf>,
        /// A single message
        #[arg(short, long)]
        message: Option<String>,
        /// Token ceiling (defaults to guard.max_tokens)
        #[arg(short, long)]
        ceiling: Option<usize>,
        /// block, truncate or summarize (defaults to guard.policy)
        #[arg(long)]
        policy: Option<String>,
    },

    /// Extract structured crisis events from news items
    Extract {
        /// News file, one item per line
        #[arg(short, long)]
        input: PathBuf,
        /// Skip writing CSV and Excel reports
        #[arg(long)]
        no_export: bool,
    },

    /// Show which model and parameters each technique uses
    Route {
        /// Technique name or alias (shows the full table when omitted)
        technique: Option<String>,
    },

    /// Summarize the run log per day and model
    Costs {
        /// Run log to read (defaults to the configured log)
        #[arg(long)]
        log: Option<PathBuf>,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Run health check
    Doctor,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Get a configuration value
    Get { key: String },
    /// Set a configuration value
    Set { key: String, value: String },
    /// List all configuration values
    List,
    /// Reset configuration to defaults
    Reset,
    /// Show config file path
    Path,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Logs go to stderr so that --format json output stays parseable
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("ditwah=info".parse()?),
        )
        .init();

    let cli = Cli::parse();
    let result = run(cli).await;

    if let Err(e) = &result {
        if let Some(hint) = e.downcast_ref::<Error>().and_then(Error::suggestion) {
            eprintln!("Hint: {}", hint);
        }
    }
    result
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let out = Output {
        format: cli.format,
        quiet: cli.quiet,
    };
    let provider = cli.provider.as_deref();

    match cli.command {
        Commands::Classify {
            input,
            message,
            temperature,
            no_export,
        } => {
            let messages = collect_items(input.as_deref(), message, |p| storage::read_lines(p))?;
            cmd_classify(provider, &messages, temperature, no_export, out).await
        }

        Commands::Temperature {
            input,
            scenario,
            temperatures,
            iterations,
        } => {
            let scenarios = collect_items(input.as_deref(), scenario, |p| storage::read_scenarios(p))?;
            let plan = if temperatures.is_empty() {
                ProbePlan::default()
            } else {
                ProbePlan::uniform(&temperatures, iterations)
            };
            cmd_temperature(provider, &scenarios, &plan, out).await
        }

        Commands::Allocate {
            input,
            start,
            travel_times,
            no_export,
        } => cmd_allocate(provider, &input, &start, travel_times.as_deref(), no_export, out).await,

        Commands::Tokens {
            input,
            message,
            ceiling,
            policy,
        } => {
            let messages = collect_items(input.as_deref(), message, |p| storage::read_lines(p))?;
            cmd_tokens(provider, &messages, ceiling, policy.as_deref(), out).await
        }

        Commands::Extract { input, no_export } => {
            cmd_extract(provider, &input, no_export, out).await
        }

        Commands::Route { technique } => cmd_route(provider, technique.as_deref(), out),

        Commands::Costs { log } => cmd_costs(log, out),

        Commands::Config { action } => cmd_config(action, out.quiet),

        Commands::Doctor => cmd_doctor(provider, out.quiet),
    }
}

// ============================================================================
// Helpers
// ============================================================================

#[derive(Clone, Copy)]
struct Output {
    format: OutputFormat,
    quiet: bool,
}

impl Output {
    fn json(&self) -> bool {
        self.format == OutputFormat::Json
    }

    /// Human-readable output, suppressed by --quiet and --format json
    fn text(&self) -> bool {
        !self.quiet && !self.json()
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Items from a single inline value or an input file
fn collect_items(
    input: Option<&Path>,
    inline: Option<String>,
    read: fn(&Path) -> ditwah_core::Result<Vec<String>>,
) -> anyhow::Result<Vec<String>> {
    let items = match (inline, input) {
        (Some(_), Some(_)) => bail!("Use either an inline value or --input, not both"),
        (Some(item), None) => vec![item],
        (None, Some(path)) => read(path)?,
        (None, None) => bail!("Nothing to process: pass an inline value or --input <file>"),
    };
    if items.is_empty() {
        bail!("Input is empty");
    }
    Ok(items)
}

fn resolve_provider(flag: Option<&str>, config: &Config) -> anyhow::Result<Provider> {
    match flag {
        Some(name) => Ok(name.parse::<Provider>()?),
        None => config.resolved_provider(),
    }
}

fn load_dispatcher(flag: Option<&str>) -> anyhow::Result<(Config, Dispatcher)> {
    let config = Config::load()?;
    let provider = resolve_provider(flag, &config)?;
    let dispatcher = Dispatcher::from_config(&config, provider)?;
    info!(provider = %provider, log = %config.output.log_path().display(), "Dispatcher ready");
    Ok((config, dispatcher))
}

fn print_summary(summary: &ditwah_core::commands::BatchSummary) {
    println!();
    println!(
        "Calls: {} ({} failed) | Tokens: {} in, {} out | Cost: ${:.6}",
        summary.calls,
        summary.failed_calls,
        summary.usage.prompt_tokens,
        summary.usage.completion_tokens,
        summary.cost_usd
    );
}

fn one_line(text: &str, max_chars: usize) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= max_chars {
        flat
    } else {
        let cut: String = flat.chars().take(max_chars).collect();
        format!("{}...", cut)
    }
}

// ============================================================================
// Command Implementations
// ============================================================================

async fn cmd_classify(
    provider: Option<&str>,
    messages: &[String],
    temperature: Option<f32>,
    no_export: bool,
    out: Output,
) -> anyhow::Result<()> {
    let (config, dispatcher) = load_dispatcher(provider)?;
    let overrides = ParamOverrides {
        temperature,
        ..Default::default()
    };

    let batch = classify::classify_batch(&dispatcher, messages, overrides).await?;

    if !no_export {
        let csv = storage::write_classified_csv(&config.output.dir, &batch.results)?;
        let xlsx = storage::write_classified_xlsx(&config.output.dir, &batch.results)?;
        if out.text() {
            println!("Saved {}", csv.path.display());
            println!("Saved {}", xlsx.path.display());
            println!();
        }
    }

    if out.json() {
        return print_json(&batch);
    }
    if !out.quiet {
        for result in &batch.results {
            println!(
                "[{:<4}] {:<6} {:<10} {}",
                result.priority.to_string(),
                result.intent.to_string(),
                result.district_label(),
                one_line(&result.message, 60)
            );
        }
        for failed in &batch.failed {
            println!("[FAIL] {}", one_line(failed, 60));
        }
        print_summary(&batch.summary);
    }
    Ok(())
}

async fn cmd_temperature(
    provider: Option<&str>,
    scenarios: &[String],
    plan: &ProbePlan,
    out: Output,
) -> anyhow::Result<()> {
    plan.validate()?;
    let (_, dispatcher) = load_dispatcher(provider)?;

    let reports = temperature::analyze_batch(&dispatcher, scenarios, plan).await?;
    if reports.is_empty() {
        bail!("Every scenario failed; see the run log for details");
    }
    let overall = temperature::overall_recommendation(&reports);

    if out.json() {
        return print_json(&serde_json::json!({
            "reports": reports,
            "overall_recommended_temperature": overall,
        }));
    }
    if out.quiet {
        return Ok(());
    }

    for (i, report) in reports.iter().enumerate() {
        println!("Scenario {}: {}", i + 1, one_line(&report.scenario, 70));
        for sample in &report.samples {
            println!(
                "  T={:.1} #{}: {}",
                sample.temperature,
                sample.iteration,
                one_line(&sample.response, 70)
            );
        }
        for stats in &report.stats {
            println!(
                "  T={:.1}: {:.0}% consistent over {} runs, {} distinct answers",
                stats.temperature,
                stats.consistency * 100.0,
                stats.runs,
                stats.distinct_answers
            );
        }
        println!("  {}", report.recommendation);
        println!();
    }
    if let Some(t) = overall {
        println!("Recommended temperature: {:.1}", t);
    }
    Ok(())
}

async fn cmd_allocate(
    provider: Option<&str>,
    input: &Path,
    start: &str,
    travel_times: Option<&str>,
    no_export: bool,
    out: Output,
) -> anyhow::Result<()> {
    let incidents = storage::read_incidents(input)?;
    if incidents.is_empty() {
        bail!("No incidents in {}", input.display());
    }
    let (config, dispatcher) = load_dispatcher(provider)?;

    let batch = allocate::score_batch(&dispatcher, &incidents).await?;
    if batch.scored.is_empty() {
        bail!("No incident could be scored; see the run log for details");
    }
    let plan = allocate::plan_route(&dispatcher, start, &batch.scored, travel_times).await?;

    let mut summary = batch.summary;
    summary.add(&plan);

    if !no_export {
        let report = storage::write_priority_scores_csv(&config.output.dir, &batch.scored)?;
        if out.text() {
            println!("Saved {}", report.path.display());
            println!();
        }
    }

    if out.json() {
        return print_json(&serde_json::json!({
            "scores": batch,
            "plan": plan.value,
            "summary": summary,
        }));
    }
    if out.quiet {
        return Ok(());
    }

    println!("Priority scores:");
    for scored in &batch.scored {
        println!(
            "  {:>2}/10  {:<12} {}",
            scored.score,
            scored.incident.location,
            one_line(&scored.incident.description, 50)
        );
    }
    for failed in &batch.failed {
        println!("  [FAIL] {}", failed.location);
    }
    println!();
    println!("Route: {}", plan.value.route.join(" -> "));
    println!("Strategy: {}", plan.value.strategy);
    println!("Total priority score: {}", plan.value.total_priority_score);
    print_summary(&summary);
    Ok(())
}

async fn cmd_tokens(
    provider: Option<&str>,
    messages: &[String],
    ceiling: Option<usize>,
    policy: Option<&str>,
    out: Output,
) -> anyhow::Result<()> {
    let config = Config::load()?;
    let provider = resolve_provider(provider, &config)?;
    let ceiling = ceiling.unwrap_or(config.guard.max_tokens);
    let policy = match policy {
        Some(p) => p.parse::<GuardPolicy>()?,
        None => config.guard.policy,
    };
    if ceiling == 0 {
        bail!("Token ceiling must be greater than zero");
    }

    let batch = if policy == GuardPolicy::Summarize {
        let dispatcher = Dispatcher::from_config(&config, provider)?;
        spam::check_batch(&dispatcher, messages, ceiling, policy).await?
    } else {
        // Block and truncate never call a model
        let guard = TokenGuard::new(provider, ceiling);
        let results = messages
            .iter()
            .map(|message| match spam::screen(&guard, message, policy)? {
                Screening::Done(result) => Ok(result),
                Screening::NeedsSummary { .. } => Err(anyhow!("Policy {} needs a model", policy)),
            })
            .collect::<anyhow::Result<Vec<_>>>()?;
        SpamFilterBatch {
            results,
            ..Default::default()
        }
    };

    if out.json() {
        return print_json(&batch);
    }
    if out.quiet {
        return Ok(());
    }

    println!(
        "Ceiling: {} tokens | Policy: {} | Tokenizer: {}",
        ceiling,
        policy,
        Tokenizer::for_provider(provider).name()
    );
    println!();
    for result in &batch.results {
        println!(
            "[{}] {} -> {} tokens ({}, saved {})",
            result.status,
            result.original_token_count,
            result.processed_token_count,
            result.action,
            result.tokens_saved
        );
        if !result.processed_message.is_empty() {
            println!("  {}", one_line(&result.processed_message, 100));
        }
    }
    for failed in &batch.failed {
        println!("[FAIL] {}", one_line(failed, 60));
    }
    if batch.summary.calls > 0 {
        print_summary(&batch.summary);
    }
    Ok(())
}

async fn cmd_extract(
    provider: Option<&str>,
    input: &Path,
    no_export: bool,
    out: Output,
) -> anyhow::Result<()> {
    let news = storage::read_lines(input)?;
    if news.is_empty() {
        bail!("No news items in {}", input.display());
    }
    let (config, dispatcher) = load_dispatcher(provider)?;

    let batch = extract::extract_batch(&dispatcher, &news).await?;

    if !no_export {
        let csv = storage::write_flood_report_csv(&config.output.dir, &batch.events)?;
        let xlsx = storage::write_flood_report_xlsx(&config.output.dir, &batch.events)?;
        if out.text() {
            println!("Saved {}", csv.path.display());
            println!("Saved {}", xlsx.path.display());
            println!();
        }
    }

    if out.json() {
        return print_json(&batch);
    }
    if out.quiet {
        return Ok(());
    }

    for event in &batch.events {
        let level = event
            .flood_level_meters
            .map(|l| format!("{:.1}m", l))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<10} {:<8} {:>6} {:>5} victims  {}",
            event.district.as_str(),
            event.status.to_string(),
            level,
            event.victim_count,
            one_line(&event.main_need, 40)
        );
    }
    println!();
    println!(
        "Extracted {}/{} events ({:.0}% success, {} dropped)",
        batch.successful,
        batch.total,
        batch.success_rate() * 100.0,
        batch.failed
    );
    print_summary(&batch.summary);
    Ok(())
}

fn cmd_route(provider: Option<&str>, technique: Option<&str>, out: Output) -> anyhow::Result<()> {
    let config = Config::load()?;
    let router = ModelRouter::new(resolve_provider(provider, &config)?);

    let decisions = match technique {
        Some(label) => vec![router.route_label(label)?],
        None => router.table(),
    };

    if out.json() {
        return print_json(&decisions);
    }

    if !out.quiet {
        println!("Provider: {}", router.provider());
        println!();
    }
    for decision in &decisions {
        println!("{}", route_line(decision));
    }
    Ok(())
}

fn route_line(decision: &RouteDecision) -> String {
    format!(
        "{:<18} {:<8} {:<26} temperature={:.1} max_tokens={}{}",
        decision.technique.to_string(),
        decision.tier.to_string(),
        decision.model,
        decision.params.temperature,
        decision.params.max_tokens,
        if decision.params.json_mode { " json" } else { "" }
    )
}

fn cmd_costs(log: Option<PathBuf>, out: Output) -> anyhow::Result<()> {
    let path = match log {
        Some(path) => path,
        None => Config::load()?.output.log_path(),
    };

    if !path.exists() {
        if out.json() {
            return print_json(&ditwah_core::cost::CostReport::default());
        }
        if !out.quiet {
            println!("No calls logged yet at {}", path.display());
        }
        return Ok(());
    }

    let report = RunLogger::summarize(&path)
        .with_context(|| format!("Failed to read run log: {}", path.display()))?;

    if out.json() {
        return print_json(&report);
    }
    if out.quiet {
        println!("${:.6}", report.total_cost_usd);
        return Ok(());
    }

    println!("Cost Summary: {}", path.display());
    println!();
    for (date, day) in &report.days {
        println!("  {}: ${:.6}", date, day.total_cost_usd);
        println!("    Calls: {}", day.call_count);
        println!(
            "    Tokens: {} input, {} output",
            day.total_input_tokens, day.total_output_tokens
        );
        if !day.by_model.is_empty() {
            println!("    By model:");
            for (model, summary) in &day.by_model {
                println!(
                    "      {}: ${:.6} ({} calls, {} failed)",
                    model, summary.total_cost_usd, summary.call_count, summary.failed_calls
                );
            }
        }
    }
    println!();
    println!(
        "  Total: ${:.6} over {} calls ({} failed, {} HTTP attempts)",
        report.total_cost_usd, report.total_calls, report.failed_calls, report.total_attempts
    );
    Ok(())
}

fn cmd_config(action: ConfigAction, quiet: bool) -> anyhow::Result<()> {
    match action {
        ConfigAction::Get { key } => {
            let config = Config::load()?;
            let value = config.get(&key)?;
            println!("{}", value);
        }
        ConfigAction::Set { key, value } => {
            let mut config = Config::load()?;
            config.set(&key, &value)?;
            config.save()?;
            if !quiet {
                println!("Set {} = {}", key, value);
            }
        }
        ConfigAction::List => {
            let config = Config::load()?;
            for (key, value) in config.list()? {
                println!("{} = {}", key, value);
            }
        }
        ConfigAction::Reset => {
            Config::reset()?;
            if !quiet {
                println!("Configuration reset to defaults.");
            }
        }
        ConfigAction::Path => {
            let path = Config::config_path()?;
            println!("{}", path.display());
        }
    }
    Ok(())
}

fn cmd_doctor(provider_flag: Option<&str>, quiet: bool) -> anyhow::Result<()> {
    if !quiet {
        println!("Ditwah Health Check");
        println!("===================");
        println!();
    }

    let mut all_ok = true;

    match Config::load() {
        Ok(config) => {
            if !quiet {
                println!("[OK] Configuration: Valid");
            }

            match resolve_provider(provider_flag, &config) {
                Ok(provider) => {
                    if !quiet {
                        println!("[OK] Provider: {}", provider);
                        println!(
                            "     Tokenizer: {}",
                            Tokenizer::for_provider(provider).name()
                        );
                    }
                    if provider.api_key().is_err() {
                        all_ok = false;
                        warn!(provider = %provider, "API key not configured");
                        if !quiet {
                            println!("[!!] API Key: Not configured");
                            println!(
                                "     Set {} to call {}",
                                provider.api_key_env(),
                                provider
                            );
                        }
                    }
                }
                Err(e) => {
                    all_ok = false;
                    if !quiet {
                        println!("[!!] Provider: Error - {}", e);
                    }
                }
            }

            if !quiet {
                let log = config.output.log_path();
                if log.exists() {
                    println!("[OK] Run log: {}", log.display());
                } else {
                    println!("[--] Run log: {} (not created yet)", log.display());
                }
            }
        }
        Err(e) => {
            all_ok = false;
            if !quiet {
                println!("[!!] Configuration: Error - {}", e);
            }
        }
    }

    if !quiet {
        for provider in Provider::ALL {
            if provider.api_key().is_ok() {
                println!("[OK] {} key: {} set", provider, provider.api_key_env());
            } else {
                println!("[--] {} key: {} not set", provider, provider.api_key_env());
            }
        }

        match Config::config_path() {
            Ok(path) => {
                if path.exists() {
                    println!("[OK] Config file: {}", path.display());
                } else {
                    println!("[--] Config file: {} (using defaults)", path.display());
                }
            }
            Err(e) => {
                println!("[!!] Config file: Error - {}", e);
            }
        }

        println!();
        if all_ok {
            println!("All checks passed!");
        } else {
            println!("Some checks failed. See above for details.");
        }
    }

    Ok(())
}
