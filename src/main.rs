//! Agent Eval CLI
//!
//! Provision the customer service agent, exercise it and run quality, safety
//! and red-team evaluations against it.

use agent_eval_harness::{
    agent::{
        AgentApi, AgentClient, AgentVariant, PollPolicy,
        definitions::{SMOKE_QUERY, SMOKE_TEST_QUERIES},
        send_and_wait,
    },
    config::Config,
    dataset::{self, DEFAULT_GENAI_FILE, DEFAULT_QUERY_FILE, QueryDataset},
    env_file::{DEFAULT_AGENT_INFO_FILE, DEFAULT_ENV_FILE, upsert_env_file, write_agent_info},
    error::HarnessError,
    evaluation::{
        EvaluationKind, EvaluationRequest, EvaluationResult, Evaluator, HttpEvaluator,
        JudgeModel, RawEvaluation, ThresholdPolicy,
        baseline::{self, DEFAULT_COMMIT_SHA},
        client::{
            content_safety_evaluator, genai_evaluators, quality_evaluators, safety_evaluators,
        },
        redteam::{RedTeamScan, load_objectives, select_objectives},
        report::{
            AttackStats, RedTeamSummaryFile, SafetySummaryFile, format_attack_summary,
            format_category_table, format_metric_table, print_safety_rows, title_case,
        },
        result::{
            QualityResult, RedTeamResult, SafetyResult, SavedEvaluation, archive_then_parse,
        },
    },
    persistence::{RESULTS_DIR, save_json, write_jsonl},
    runner::{QueryRunner, mean_metrics, preview, run_smoke_test},
    telemetry,
};
use anyhow::{Context, Result};
use chrono::{Local, Utc};
use clap::{Parser, Subcommand};
use serde_json::{Value, json};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tokio::io::{AsyncBufReadExt, BufReader};

/// Agent Eval - provision and evaluate a hosted conversational agent
#[derive(Parser)]
#[command(name = "agent-eval")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Write logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the customer service agent and record its id
    CreateAgent {
        /// Which built-in agent to create
        #[arg(long, value_enum, default_value_t = AgentVariant::Baseline)]
        variant: AgentVariant,

        /// Attach the declarative function tools
        #[arg(long)]
        with_tools: bool,

        /// `.env` file to record the agent id in
        #[arg(long, default_value = DEFAULT_ENV_FILE)]
        env_file: PathBuf,

        /// Where to write the agent information file
        #[arg(long, default_value = DEFAULT_AGENT_INFO_FILE)]
        info_file: PathBuf,

        /// Do not send a test query after creation
        #[arg(long)]
        skip_smoke: bool,
    },

    /// Send the predefined test queries on one thread
    Smoke,

    /// Chat with the agent interactively
    Chat,

    /// Run the test queries and score replies with the quality evaluators
    Quality {
        /// Path to the query file
        #[arg(short, long, default_value = DEFAULT_QUERY_FILE)]
        data: PathBuf,

        /// Only run the first N queries
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },

    /// Scan the agent with the content safety evaluators
    Safety {
        /// Path to the query file
        #[arg(short, long, default_value = DEFAULT_QUERY_FILE)]
        data: PathBuf,
    },

    /// Attack the agent with transformed objectives and evaluate the replies
    Redteam {
        /// JSON file mapping risk category to seed prompts
        #[arg(long)]
        objectives: PathBuf,
    },

    /// Score a static query/response dataset with judge models
    Genai {
        /// Path to the JSONL dataset
        #[arg(short, long, default_value = DEFAULT_GENAI_FILE)]
        data: PathBuf,
    },

    /// Snapshot a previous evaluation as the baseline
    Baseline {
        /// Evaluation results to snapshot
        #[arg(long, default_value_os_t = baseline::default_results_path())]
        results: PathBuf,

        /// Directory for the baseline files
        #[arg(long, default_value_os_t = baseline::default_baseline_dir())]
        output: PathBuf,

        /// Commit recorded with the baseline
        #[arg(long, default_value = DEFAULT_COMMIT_SHA)]
        commit_sha: String,
    },

    /// Re-classify a saved evaluator output file
    Summarize {
        /// Kind of evaluation that produced the file
        #[arg(long, value_enum)]
        kind: EvaluationKind,

        /// Saved evaluator output
        file: PathBuf,

        /// Number of queries or attacks behind the output (default: row count)
        #[arg(long)]
        total: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    telemetry::init_tracing(cli.log_json, telemetry::level_for(cli.verbose));

    let config = Config::load().context("Failed to load configuration")?;

    match cli.command {
        Commands::CreateAgent {
            variant,
            with_tools,
            env_file,
            info_file,
            skip_smoke,
        } => {
            cmd_create_agent(&config, variant, with_tools, &env_file, &info_file, skip_smoke).await
        }
        Commands::Smoke => cmd_smoke(&config).await,
        Commands::Chat => cmd_chat(&config).await,
        Commands::Quality { data, limit } => cmd_quality(&config, &data, limit).await,
        Commands::Safety { data } => cmd_safety(&config, &data).await,
        Commands::Redteam { objectives } => cmd_redteam(&config, &objectives).await,
        Commands::Genai { data } => cmd_genai(&config, &data).await,
        Commands::Baseline {
            results,
            output,
            commit_sha,
        } => cmd_baseline(&results, &output, &commit_sha),
        Commands::Summarize { kind, file, total } => cmd_summarize(kind, &file, total),
    }
}

fn output_dir(name: &str) -> PathBuf {
    Path::new(RESULTS_DIR).join(name)
}

fn timestamped(prefix: &str) -> String {
    format!("{}-{}", prefix, Local::now().format("%Y%m%d-%H%M%S"))
}

fn baseline_agent_id(config: &Config) -> Result<String> {
    config
        .agent
        .baseline_id
        .clone()
        .context("AGENT_ID_BASELINE is not set")
}

fn print_header(title: &str) {
    println!("{}", "═".repeat(70));
    println!("{}", title);
    println!("{}", "═".repeat(70));
}

async fn cmd_create_agent(
    config: &Config,
    variant: AgentVariant,
    with_tools: bool,
    env_file: &Path,
    info_file: &Path,
    skip_smoke: bool,
) -> Result<()> {
    config.require_project().context("Invalid configuration")?;

    let mut definition = variant.definition();
    if with_tools {
        definition = definition.with_tools();
    }
    let model = config.agent.deployment_or_default();

    print_header("Creating Customer Service Agent");
    println!("  Endpoint:    {}", config.project.endpoint);
    println!("  Model:       {}", model);
    println!("  Name:        {}", definition.name);
    println!("  Temperature: {}", definition.temperature);
    println!("  Top P:       {}", definition.top_p);
    println!("  Tools:       {}", definition.tools.len());
    println!();

    let client = AgentClient::new(config.project.clone());
    let agent = client
        .create_agent(&definition.to_request(model))
        .await
        .context("Failed to create agent")?;

    println!("Agent created:");
    println!("  ID:    {}", agent.id);
    println!("  Name:  {}", agent.name.as_deref().unwrap_or("-"));
    println!("  Model: {}", agent.model);

    upsert_env_file(env_file, variant.env_key(), &agent.id, variant.env_comment())
        .context("Failed to update env file")?;
    println!("\nAgent ID saved to {}:", env_file.display());
    println!("  {}={}", variant.env_key(), agent.id);

    write_agent_info(info_file, &agent, client.endpoint())
        .context("Failed to write agent info")?;
    println!("Agent info saved to: {}", info_file.display());

    if skip_smoke {
        return Ok(());
    }

    println!("\nTesting agent with: \"{}\"", SMOKE_QUERY);
    let thread = client.create_thread().await.context("Failed to create thread")?;
    let policy = PollPolicy::from(&config.polling);
    match send_and_wait(&client, &thread.id, &agent.id, SMOKE_QUERY, policy).await {
        Ok(exchange) if !exchange.response.is_empty() => {
            println!("  Response: {}", preview(&exchange.response, 200));
        }
        Ok(_) => println!("  Warning: agent produced no response"),
        Err(e) => println!("  Warning: test query failed: {}", e),
    }

    Ok(())
}

async fn cmd_smoke(config: &Config) -> Result<()> {
    config.require_agent().context("Invalid configuration")?;
    let agent_id = baseline_agent_id(config)?;

    print_header("Running Predefined Test Queries");
    println!("  Endpoint: {}", config.project.endpoint);
    println!("  Agent ID: {}\n", agent_id);

    let client = AgentClient::new(config.project.clone());
    let report = run_smoke_test(
        &client,
        &agent_id,
        SMOKE_TEST_QUERIES,
        PollPolicy::from(&config.polling),
    )
    .await
    .context("Smoke test failed")?;

    print_header("Test Results Summary");
    println!("  Total Tests:  {}", report.total());
    println!("  Passed:       {}", report.passed);
    println!("  Failed:       {}", report.failed);
    println!("  Success Rate: {:.1}%", report.success_rate());
    println!();
    println!("{}", report.verdict());

    Ok(())
}

async fn cmd_chat(config: &Config) -> Result<()> {
    config.require_agent().context("Invalid configuration")?;
    let agent_id = baseline_agent_id(config)?;

    let client = AgentClient::new(config.project.clone());
    let policy = PollPolicy::from(&config.polling);
    let thread = client.create_thread().await.context("Failed to create thread")?;

    print_header("Customer Service Agent - Interactive Test");
    println!("Conversation started (thread {})", thread.id);
    println!("Type 'quit' or 'exit' to end the conversation");
    println!("{}", "─".repeat(70));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("\nYou: ");
        std::io::stdout().flush().ok();

        let Some(line) = lines.next_line().await.context("Failed to read input")? else {
            break;
        };
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if matches!(input.to_lowercase().as_str(), "quit" | "exit" | "q") {
            break;
        }

        match send_and_wait(&client, &thread.id, &agent_id, input, policy).await {
            Ok(exchange) if !exchange.response.is_empty() => {
                println!("\nAgent: {}", exchange.response)
            }
            Ok(_) => println!("\nAgent: (no response)"),
            Err(e) => {
                tracing::warn!(error = %e, "chat message failed");
                println!("\nError: {}", e);
            }
        }
        println!("{}", "─".repeat(70));
    }

    println!("\nEnding conversation. Goodbye!");
    Ok(())
}

async fn cmd_quality(config: &Config, data: &Path, limit: Option<usize>) -> Result<()> {
    config.require_quality().context("Invalid configuration")?;

    let client = AgentClient::new(config.project.clone());
    let agent_id = match (&config.agent.baseline_id, &config.agent.name) {
        (Some(id), _) => id.clone(),
        (None, Some(name)) => {
            println!("Looking up agent by name: {}", name);
            client
                .find_agent_by_name(name)
                .await
                .context("Failed to resolve agent")?
                .id
        }
        (None, None) => anyhow::bail!("AGENT_ID_BASELINE or AZURE_AI_AGENT_NAME must be set"),
    };

    let agent = client
        .get_agent(&agent_id)
        .await
        .context("Failed to load agent")?;
    let deployment = config
        .agent
        .deployment
        .clone()
        .unwrap_or_else(|| agent.model.clone());

    print_header("Agent Quality Evaluation");
    println!("  Agent ID:   {}", agent.id);
    println!("  Agent Name: {}", agent.name.as_deref().unwrap_or("-"));
    println!("  Model:      {}", deployment);

    let mut dataset = QueryDataset::load(data).context("Failed to load test data")?;
    if let Some(n) = limit {
        dataset = dataset.take(n);
    }
    println!("\nRunning {} test queries...", dataset.len());

    let records = QueryRunner::new(&client, &agent.id, PollPolicy::from(&config.polling))
        .run(&dataset.data)
        .await;
    let failed = records.iter().filter(|r| !r.is_success()).count();

    let out_dir = output_dir("quality_eval_output");
    let input_path = out_dir.join("quality-eval-input.jsonl");
    let output_path = out_dir.join("quality-eval-output.json");

    let rows: Vec<_> = records.iter().map(|r| r.to_eval_row()).collect();
    write_jsonl(&rows, &input_path).context("Failed to write evaluation input")?;
    println!("\nTest queries completed ({} failed)", failed);
    println!("  Evaluation input saved to: {}", input_path.display());

    let data_rows = rows
        .iter()
        .map(serde_json::to_value)
        .collect::<std::result::Result<Vec<Value>, _>>()?;
    let judge = JudgeModel {
        azure_endpoint: config.model_endpoint()?,
        azure_deployment: deployment,
        api_version: config.evaluation.openai_api_version.clone(),
        api_key: config.evaluation.openai_api_key.clone(),
    };
    let request = EvaluationRequest::new(
        timestamped("quality-evaluation"),
        quality_evaluators(),
        data_rows,
    )
    .with_agent(&agent.id)
    .with_judge(judge);

    println!("\nRunning evaluators...");
    let evaluator = HttpEvaluator::from_config(config)?;
    let raw = evaluator
        .evaluate(&request)
        .await
        .context("Quality evaluation failed")?;
    let result = archive_then_parse(&raw, &output_path, QualityResult::parse)
        .context("Unexpected quality evaluator output")?;

    if raw.metrics.is_empty() {
        println!("\nNo metrics were calculated!");
    } else {
        println!("\n{}", format_metric_table("Quality Evaluation Results", &raw.metrics));
    }

    let missing: Vec<&str> = result
        .scores()
        .into_iter()
        .filter(|(_, v)| v.is_none())
        .map(|(name, _)| name)
        .collect();
    if !missing.is_empty() {
        println!("Not reported: {}", missing.join(", "));
    }

    println!("\nMean operational metrics (local):");
    for (name, value) in mean_metrics(&records) {
        println!("  {:<35} {:.2}", name, value);
    }

    println!("\nLocal files:");
    println!("  Evaluation input:  {}", input_path.display());
    println!("  Evaluation output: {}", output_path.display());
    print_studio_url(&raw);

    Ok(())
}

async fn cmd_safety(config: &Config, data: &Path) -> Result<()> {
    config.require_agent_run().context("Invalid configuration")?;
    let agent_id = baseline_agent_id(config)?;

    print_header("Agent Safety Evaluation");
    println!("  Endpoint:   {}", config.project.endpoint);
    println!("  Deployment: {}", config.agent.deployment_or_default());
    println!("  Agent ID:   {}", agent_id);

    let dataset = QueryDataset::load(data).context("Failed to load test data")?;
    println!("\nLoaded {} test queries", dataset.len());

    let evaluators = safety_evaluators();
    println!("\nSafety evaluators:");
    for spec in &evaluators {
        println!("  - {}", spec.name);
    }

    let rows = dataset
        .data
        .iter()
        .map(|item| json!({ "query": item.query }))
        .collect();
    let request = EvaluationRequest::new(timestamped("safety-evaluation"), evaluators, rows)
        .with_agent(&agent_id);

    println!("\nStarting safety evaluation...");
    let evaluator = HttpEvaluator::from_config(config)?;
    let raw = evaluator
        .evaluate(&request)
        .await
        .context("Safety evaluation failed")?;

    let out_dir = output_dir("safety_eval_output");
    let output_path = out_dir.join("safety-eval-output.json");
    let summary_path = out_dir.join("safety-summary.json");
    let result = archive_then_parse(&raw, &output_path, SafetyResult::parse)
        .context("Unexpected safety evaluator output")?;
    let summary = result.summarize(dataset.len());

    print_header("Safety Evaluation Results");
    println!("{}", format_category_table(&ThresholdPolicy::SAFETY, &summary));
    println!();
    if !result.rows.is_empty() {
        println!("Detailed results (per query):\n");
        print_safety_rows(&result.rows);
    }

    save_json(&SafetySummaryFile::new(&agent_id, &summary), &summary_path)
        .context("Failed to save summary")?;

    println!("Full results saved to: {}", output_path.display());
    println!("Summary saved to:      {}", summary_path.display());
    println!();

    if summary.non_passing().next().is_some() {
        println!("WARNING: Some safety issues detected! Review the results above.");
    } else {
        println!("All safety checks passed - no issues detected!");
    }

    Ok(())
}

async fn cmd_redteam(config: &Config, objectives_path: &Path) -> Result<()> {
    config.require_agent_run().context("Invalid configuration")?;
    let agent_id = baseline_agent_id(config)?;

    let objectives = load_objectives(objectives_path).context("Failed to load objectives")?;
    let selected = select_objectives(&objectives, config.red_team.objectives_per_category);

    let client = AgentClient::new(config.project.clone());
    let scan = RedTeamScan::new(
        &client,
        &agent_id,
        PollPolicy::from(&config.polling),
        &config.red_team,
    );

    print_header("Agent Red Team Evaluation");
    println!("  Agent ID:      {}", agent_id);
    println!("  Objectives:    {}", selected.len());
    println!(
        "  Strategies:    {}",
        scan.strategies()
            .iter()
            .map(|s| s.name())
            .collect::<Vec<_>>()
            .join(", ")
    );
    println!("  Max Turns:     {}", config.red_team.max_turns);
    println!();

    let start = Instant::now();
    let conversations = scan.run(&selected).await.context("Red team scan failed")?;
    let duration = start.elapsed().as_secs_f64();
    println!("Scan completed in {:.2} seconds", duration);

    let out_dir = output_dir("redteam_eval_output");
    let conversations_path = out_dir.join("redteam-conversations.jsonl");
    let output_path = out_dir.join("redteam-eval-output.json");
    let summary_path = out_dir.join("redteam-summary.json");
    write_jsonl(&conversations, &conversations_path)
        .context("Failed to write conversations")?;

    println!("\nEvaluating {} attack conversations...", conversations.len());
    let rows = conversations
        .iter()
        .map(serde_json::to_value)
        .collect::<std::result::Result<Vec<Value>, _>>()?;
    let request = EvaluationRequest::new(
        timestamped("redteam-evaluation"),
        vec![content_safety_evaluator()],
        rows,
    )
    .with_agent(&agent_id);

    let evaluator = HttpEvaluator::from_config(config)?;
    let raw = evaluator
        .evaluate(&request)
        .await
        .context("Content safety evaluation failed")?;
    let result = archive_then_parse(&raw, &output_path, RedTeamResult::parse)
        .context("Unexpected content safety output")?;
    let summary = result.summarize(conversations.len());
    let file = RedTeamSummaryFile::new(&result, &summary, duration);
    save_json(&file, &summary_path).context("Failed to save summary")?;

    print_red_team_report(&result, &summary, duration);

    println!("\nResults saved to:");
    println!("  Conversations: {}", conversations_path.display());
    println!("  Evaluation:    {}", output_path.display());
    println!("  Summary:       {}", summary_path.display());
    print_studio_url(&raw);

    Ok(())
}

fn print_red_team_report(
    result: &RedTeamResult,
    summary: &agent_eval_harness::ReportSummary,
    duration: f64,
) {
    let stats = AttackStats::from_summary(summary);

    print_header("Red Team Evaluation Results");
    println!("Attack summary:");
    println!("{}", format_attack_summary(&stats, duration));
    if let Some(score) = result.binary_aggregate {
        println!("   Overall Safety Score:     {:.2}", score);
    }
    println!();
    println!("Safety vulnerabilities by category:");
    println!("{}", format_category_table(&ThresholdPolicy::RED_TEAM, summary));
    println!();

    if stats.vulnerable_categories.is_empty() {
        println!("Agent is resilient against all adversarial attacks!");
    } else {
        println!(
            "WARNING: Agent is vulnerable to {} category(ies):",
            stats.vulnerable_categories.len()
        );
        for category in &stats.vulnerable_categories {
            println!("  - {}", title_case(category));
        }
    }
}

async fn cmd_genai(config: &Config, data: &Path) -> Result<()> {
    config.require_genai().context("Invalid configuration")?;

    print_header("GenAI Evaluation");
    println!("Validating test data: {}", data.display());
    let check = dataset::check_genai_dataset(data).context("Invalid test data")?;
    println!("  Found {} test cases", check.line_count);
    if check.missing_fields.is_empty() {
        println!("  Data format validated");
    } else {
        println!(
            "  Warning: missing fields in data: {}",
            check.missing_fields.join(", ")
        );
    }
    for field in ["query", "response"] {
        if let Some(text) = check.sample.get(field).and_then(Value::as_str) {
            println!("  Sample {}: {}", field, preview(text, 60));
        }
    }

    let rows = dataset::load_genai_rows(data).context("Failed to load test data")?;
    let judge = JudgeModel {
        azure_endpoint: config.evaluation.openai_endpoint.clone().unwrap_or_default(),
        azure_deployment: config.evaluation.openai_deployment.clone().unwrap_or_default(),
        api_version: config.evaluation.openai_api_version.clone(),
        api_key: config.evaluation.openai_api_key.clone(),
    };
    println!("\nJudge model:");
    println!("  Endpoint:   {}", judge.azure_endpoint);
    println!("  Deployment: {}", judge.azure_deployment);

    let evaluators = genai_evaluators();
    println!("\nEvaluators:");
    for spec in &evaluators {
        println!("  - {}", spec.name);
    }

    let request =
        EvaluationRequest::new(timestamped("genai-evaluation"), evaluators, rows).with_judge(judge);

    println!("\nRunning evaluation...");
    let evaluator = HttpEvaluator::from_config(config)?;
    let raw = evaluator
        .evaluate(&request)
        .await
        .context("GenAI evaluation failed")?;

    let output_path = output_dir("genai_eval_output").join("genai-eval-output.json");
    save_json(raw.raw(), &output_path).context("Failed to save evaluation output")?;

    println!("\nResults summary:");
    println!("{}", "─".repeat(60));
    for (name, value) in &raw.metrics {
        match value.as_f64() {
            Some(v) => println!("  {}: {:.4}", name, v),
            None => println!("  {}: {}", name, value),
        }
    }
    println!("\nDetailed results saved to: {}", output_path.display());
    print_studio_url(&raw);

    Ok(())
}

fn cmd_baseline(results: &Path, output: &Path, commit_sha: &str) -> Result<()> {
    print_header("Initialize Baseline Metrics");
    println!("Reading evaluation results from: {}", results.display());

    let out = match baseline::initialize_baseline(results, output, commit_sha, Utc::now()) {
        Ok(out) => out,
        Err(HarnessError::DataNotFound(path)) => anyhow::bail!(
            "No evaluation results found at '{}'. Run an evaluation first.",
            path.display()
        ),
        Err(e) => return Err(e).context("Failed to initialize baseline"),
    };

    println!("  Baseline metrics: {}", out.metrics_path.display());
    println!("  Full results:     {}", out.full_results_path.display());
    println!();
    println!("{}", out.metrics.format_table());
    println!();
    println!("Commit the baseline directory to start comparing future runs:");
    println!("  git add {}", output.display());

    Ok(())
}

fn cmd_summarize(kind: EvaluationKind, file: &Path, total: Option<usize>) -> Result<()> {
    let saved = SavedEvaluation::load(kind, file, total)
        .with_context(|| format!("Failed to summarize {}", file.display()))?;

    match (&saved.result, &saved.summary) {
        (EvaluationResult::Safety(_), Some(summary)) => {
            print_header("Safety Evaluation Results");
            println!("{}", format_category_table(&ThresholdPolicy::SAFETY, summary));
            println!("\nOverall status: {}", summary.overall_status);
        }
        (EvaluationResult::RedTeam(result), Some(summary)) => {
            print_red_team_report(result, summary, 0.0);
            println!("\nOverall status: {}", summary.overall_status);
        }
        _ => {
            let metrics = &saved.raw.metrics;
            println!("{}", format_metric_table("Quality Evaluation Results", metrics));
        }
    }

    Ok(())
}

fn print_studio_url(raw: &RawEvaluation) {
    match &raw.studio_url {
        Some(url) => {
            println!("\nView in portal:");
            println!("  {}", url);
        }
        None => println!("\nNo portal URL generated - results saved locally only"),
    }
}
