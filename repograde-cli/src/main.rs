#![deny(missing_docs)]
//! Repograde command-line interface.
//!
//! Audits GitHub repositories one at a time, in concurrent batches, or from an
//! interactive prompt.

use clap::{ArgGroup, Args, Parser, Subcommand, ValueEnum};
use log::{error, info, warn};
use repograde_core::{
    AuditConfig, AuditOutcome, Auditor, HackathonRules, RepoSlug, RuleConfig, render_json,
    render_markdown, render_text, report_file_name,
};
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};

pub(crate) type CliResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

#[derive(Parser)]
#[command(name = "repograde", version, about = "Repository audit and hackathon judging CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Clone)]
#[command(group(
    ArgGroup::new("target")
        .required(true)
        .args(&["slug", "owner"])
))]
struct TargetArgs {
    /// Repository as `owner/repo` or a GitHub URL.
    #[arg(long)]
    slug: Option<String>,
    /// Repository owner.
    #[arg(long, requires = "repo")]
    owner: Option<String>,
    /// Repository name.
    #[arg(long, requires = "owner")]
    repo: Option<String>,
}

#[derive(Args, Clone, Default)]
struct AuditArgs {
    /// Hackathon rules file (JSON).
    #[arg(long)]
    rules: Option<PathBuf>,
    /// Crawl and scoring overrides (JSON).
    #[arg(long)]
    config: Option<PathBuf>,
    /// Skip LLM judgments even when an API key is configured.
    #[arg(long)]
    no_llm: bool,
}

#[derive(Args, Clone)]
struct OutputArgs {
    /// Output format for report data.
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,
    /// Write the report to a file instead of stdout.
    #[arg(long = "report-output")]
    report_output: Option<PathBuf>,
    /// Also write one JSON report per repository into this directory.
    #[arg(long = "export-dir")]
    export_dir: Option<PathBuf>,
}

#[derive(ValueEnum, Copy, Clone, Debug, Eq, PartialEq)]
enum OutputFormat {
    Text,
    Json,
    Markdown,
}

#[derive(Subcommand)]
enum Commands {
    /// Audit a single repository.
    Audit {
        #[command(flatten)]
        target: TargetArgs,
        #[command(flatten)]
        audit: AuditArgs,
        #[command(flatten)]
        report: OutputArgs,
    },
    /// Audit every repository listed in a file (one `owner/repo` or URL per line).
    Batch {
        /// File containing repositories.
        #[arg(short, long)]
        file: PathBuf,
        /// Maximum number of concurrent audits.
        #[arg(short = 'j', long, default_value_t = 5)]
        concurrency: usize,
        #[command(flatten)]
        audit: AuditArgs,
        #[command(flatten)]
        report: OutputArgs,
    },
    /// Prompt for repositories until a blank line is entered.
    Interactive {
        #[command(flatten)]
        audit: AuditArgs,
        /// Output format for each report.
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
        /// Also write one JSON report per repository into this directory.
        #[arg(long = "export-dir")]
        export_dir: Option<PathBuf>,
    },
}

#[cfg(not(test))]
#[tokio::main]
async fn main() -> CliResult<()> {
    dotenvy::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Audit {
            target,
            audit,
            report,
        } => {
            let slug = resolve_target(&target)?;
            let auditor = build_auditor(AuditConfig::from_env(), &audit)?;
            let rules = load_rules(audit.rules.as_deref())?;
            run_audit(&auditor, &slug, rules.as_ref(), &report).await?
        }
        Commands::Batch {
            file,
            concurrency,
            audit,
            report,
        } => {
            let auditor = Arc::new(build_auditor(AuditConfig::from_env(), &audit)?);
            let rules = load_rules(audit.rules.as_deref())?.map(Arc::new);
            run_batch(auditor, &file, concurrency, rules, &report).await?
        }
        Commands::Interactive {
            audit,
            format,
            export_dir,
        } => {
            let auditor = build_auditor(AuditConfig::from_env(), &audit)?;
            let rules = load_rules(audit.rules.as_deref())?;
            let mut input = tokio::io::BufReader::new(tokio::io::stdin());
            let mut out = std::io::stdout();
            let audited = interactive_loop(
                &auditor,
                rules.as_ref(),
                format,
                export_dir.as_deref(),
                &mut input,
                &mut out,
            )
            .await?;
            info!("interactive session audited {audited} repositories");
        }
    }

    Ok(())
}

#[cfg(test)]
fn main() {}

fn resolve_target(target: &TargetArgs) -> CliResult<RepoSlug> {
    if let Some(slug) = &target.slug {
        return Ok(RepoSlug::parse(slug)?);
    }
    match (&target.owner, &target.repo) {
        (Some(owner), Some(repo)) => Ok(RepoSlug::new(owner, repo)?),
        _ => Err("either --slug or both --owner and --repo are required".into()),
    }
}

fn build_auditor(mut config: AuditConfig, args: &AuditArgs) -> CliResult<Auditor> {
    if let Some(path) = &args.config {
        config.rules = RuleConfig::load(path)?;
    }
    if args.no_llm {
        config.llm = None;
    }
    let auditor = Auditor::new(config)?;
    if !auditor.judgments_enabled() {
        info!("llm judgments disabled; scores are heuristic only");
    }
    Ok(auditor)
}

fn load_rules(path: Option<&Path>) -> CliResult<Option<HackathonRules>> {
    let Some(path) = path else {
        return Ok(None);
    };
    let rules = HackathonRules::load(path)?;
    if rules.is_empty() {
        warn!("{} configures no eligibility rules", path.display());
        return Ok(None);
    }
    Ok(Some(rules))
}

async fn run_audit(
    auditor: &Auditor,
    slug: &RepoSlug,
    rules: Option<&HackathonRules>,
    output: &OutputArgs,
) -> CliResult<()> {
    let outcome = audit_one(auditor, slug, rules).await;
    if let AuditOutcome::Failed { repository, error } = &outcome {
        return Err(format!("audit of {repository} failed: {error}").into());
    }
    let outcomes = vec![outcome];
    emit_reports(&outcomes, output).await
}

async fn run_batch(
    auditor: Arc<Auditor>,
    file: &Path,
    concurrency: usize,
    rules: Option<Arc<HackathonRules>>,
    output: &OutputArgs,
) -> CliResult<()> {
    let inputs = load_repo_list(file).await?;
    if inputs.is_empty() {
        println!("No repositories found to audit.");
        return Ok(());
    }

    let outcomes = audit_all(auditor, inputs, rules, concurrency).await?;
    let failed = outcomes.iter().filter(|outcome| outcome.is_failed()).count();
    if failed > 0 {
        warn!("{failed} of {} audits failed", outcomes.len());
    }
    emit_reports(&outcomes, output).await
}

async fn load_repo_list(path: &Path) -> CliResult<Vec<String>> {
    let contents = tokio::fs::read_to_string(path).await?;
    let entries = contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect();
    Ok(entries)
}

async fn audit_all(
    auditor: Arc<Auditor>,
    inputs: Vec<String>,
    rules: Option<Arc<HackathonRules>>,
    concurrency: usize,
) -> CliResult<Vec<AuditOutcome>> {
    let concurrency = if concurrency == 0 { 1 } else { concurrency };
    let semaphore = Arc::new(Semaphore::new(concurrency));
    let mut tasks = JoinSet::new();
    let mut pending = HashMap::new();

    for (index, input) in inputs.into_iter().enumerate() {
        let permit = semaphore.clone().acquire_owned().await?;
        let auditor = auditor.clone();
        let rules = rules.clone();
        let repository = input.clone();
        let handle = tasks.spawn(async move {
            let _permit = permit;
            let outcome = match RepoSlug::parse(&input) {
                Ok(slug) => audit_one(&auditor, &slug, rules.as_deref()).await,
                Err(err) => AuditOutcome::Failed {
                    repository: input,
                    error: err.to_string(),
                },
            };
            (index, outcome)
        });
        pending.insert(handle.id(), (index, repository));
    }

    let mut outcomes = Vec::new();
    while let Some(result) = tasks.join_next().await {
        match result {
            Ok(entry) => outcomes.push(entry),
            Err(err) => match pending.remove(&err.id()) {
                Some((index, repository)) => {
                    error!("audit task for {repository} failed: {err}");
                    outcomes.push((index, failed_task_outcome(repository, &err)));
                }
                None => error!("untracked audit task failed: {err}"),
            },
        }
    }
    outcomes.sort_by_key(|(index, _)| *index);
    Ok(outcomes.into_iter().map(|(_, outcome)| outcome).collect())
}

async fn audit_one(
    auditor: &Auditor,
    slug: &RepoSlug,
    rules: Option<&HackathonRules>,
) -> AuditOutcome {
    match auditor.run(slug, rules).await {
        Ok(report) => report.into(),
        Err(err) => {
            error!("audit of {slug} failed: {err}");
            AuditOutcome::Failed {
                repository: slug.to_string(),
                error: err.to_string(),
            }
        }
    }
}

fn failed_task_outcome(repository: String, error: &JoinError) -> AuditOutcome {
    AuditOutcome::Failed {
        repository,
        error: error.to_string(),
    }
}

async fn interactive_loop<R, W>(
    auditor: &Auditor,
    default_rules: Option<&HackathonRules>,
    format: OutputFormat,
    export_dir: Option<&Path>,
    input: &mut R,
    out: &mut W,
) -> CliResult<usize>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let mut audited = 0;
    loop {
        let message = "Repository (owner/repo or URL, blank to exit): ";
        let Some(line) = prompt(input, out, message).await? else {
            break;
        };
        if line.is_empty() {
            break;
        }
        let slug = match RepoSlug::parse(&line) {
            Ok(slug) => slug,
            Err(err) => {
                writeln!(out, "Error: {err}")?;
                continue;
            }
        };

        let rules_path = prompt(input, out, "Rules file (blank for default): ")
            .await?
            .unwrap_or_default();
        let loaded;
        let rules = if rules_path.is_empty() {
            default_rules
        } else {
            match load_rules(Some(Path::new(&rules_path))) {
                Ok(rules) => {
                    loaded = rules;
                    loaded.as_ref()
                }
                Err(err) => {
                    writeln!(out, "Error: {err}")?;
                    continue;
                }
            }
        };

        let outcome = audit_one(auditor, &slug, rules).await;
        if let AuditOutcome::Failed { error, .. } = &outcome {
            writeln!(out, "Audit of {slug} failed: {error}")?;
            continue;
        }
        let outcomes = vec![outcome];
        write!(out, "{}", render_outcomes(&outcomes, format)?)?;
        if let Some(dir) = export_dir {
            for path in export_reports(&outcomes, dir).await? {
                writeln!(out, "Exported {}", path.display())?;
            }
        }
        audited += 1;
    }
    Ok(audited)
}

async fn prompt<R, W>(input: &mut R, out: &mut W, message: &str) -> CliResult<Option<String>>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    write!(out, "{message}")?;
    out.flush()?;
    let mut line = String::new();
    if input.read_line(&mut line).await? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim().to_string()))
}

fn render_outcomes(outcomes: &[AuditOutcome], format: OutputFormat) -> CliResult<String> {
    Ok(match format {
        OutputFormat::Text => render_text(outcomes),
        OutputFormat::Markdown => render_markdown(outcomes),
        OutputFormat::Json => render_json(outcomes)?,
    })
}

async fn emit_reports(outcomes: &[AuditOutcome], output: &OutputArgs) -> CliResult<()> {
    let contents = render_outcomes(outcomes, output.format)?;
    emit_output(output, contents).await?;
    if let Some(dir) = &output.export_dir {
        let written = export_reports(outcomes, dir).await?;
        info!("exported {} reports to {}", written.len(), dir.display());
    }
    Ok(())
}

async fn emit_output(output: &OutputArgs, contents: String) -> CliResult<()> {
    if let Some(path) = &output.report_output {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, contents).await?;
    } else {
        print!("{contents}");
    }
    Ok(())
}

async fn export_reports(outcomes: &[AuditOutcome], dir: &Path) -> CliResult<Vec<PathBuf>> {
    tokio::fs::create_dir_all(dir).await?;
    let mut written = Vec::new();
    for outcome in outcomes {
        let AuditOutcome::Completed { report } = outcome else {
            continue;
        };
        let path = dir.join(report_file_name(
            &report.owner,
            &report.repo,
            report.generated_at,
        ));
        tokio::fs::write(&path, render_json(report)?).await?;
        written.push(path);
    }
    Ok(written)
}
