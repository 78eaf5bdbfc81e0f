use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::time::Duration;
use testlog_config::{TestlogConfig, load_config};
use testlog_engine::{TestResultManager, read_message};
use testlog_ids::{ArtifactId, JobId, ProjectId, StepId};
use testlog_ingest_json::JsonlResultReader;
use testlog_ledger_sqlite::SqliteLedger;
use testlog_ports::{ContentStore, ResultReader};
use testlog_schema::stat::StatName;
use testlog_schema::step::{SourceArtifact, StepRef};
use testlog_storage::FsContentStore;

#[derive(Parser, Debug)]
#[command(name = "testlog")]
#[command(about = "Ingest sharded test results into a deduplicated ledger.", long_about = None)]
struct Cli {
    /// Config file (YAML, or JSON with a .json extension).
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Ledger database. Overrides the config file.
    #[arg(long, global = true)]
    db: Option<PathBuf>,
    /// Content store directory. Overrides the config file.
    #[arg(long, global = true)]
    content_dir: Option<PathBuf>,
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Ingest a JSONL results file produced by one step.
    Ingest {
        #[arg(long)]
        job: String,
        #[arg(long)]
        step: String,
        /// Human label of the step, used in duplicate-name messages.
        #[arg(long)]
        label: Option<String>,
        #[arg(long, default_value = "default")]
        project: String,
        /// The results file. It is also kept as the step's source artifact.
        #[arg(long)]
        artifact: PathBuf,
    },
    /// List the test cases of a job.
    Cases {
        #[arg(long)]
        job: String,
        /// Print JSON instead of a table.
        #[arg(long)]
        json: bool,
    },
    /// Show the counters of a step.
    Stats {
        #[arg(long)]
        step: String,
    },
    /// Print the captured output windows of a test.
    Message {
        #[arg(long)]
        job: String,
        /// Fully-qualified test name.
        #[arg(long)]
        test: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => TestlogConfig::default(),
    };
    if let Some(db) = cli.db {
        config.database = db;
    }
    if let Some(dir) = cli.content_dir {
        config.content_dir = dir;
    }
    config.validate()?;
    testlog_logging::init(&config.logging);

    match cli.cmd {
        Command::Ingest {
            job,
            step,
            label,
            project,
            artifact,
        } => {
            let step = StepRef {
                label: label.unwrap_or_else(|| step.clone()),
                id: StepId::new(step),
                job_id: JobId::new(job),
                project_id: ProjectId::new(project),
            };
            ingest(&config, step, &artifact)?;
        }
        Command::Cases { job, json } => {
            let ledger = open_ledger(&config)?;
            let cases = ledger.test_cases_for_job(&JobId::new(job))?;
            if json {
                println!("{}", serde_json::to_string_pretty(&cases)?);
            } else {
                for case in cases {
                    println!(
                        "{}\t{}\t{}ms\treruns={}\trepeats={}",
                        case.outcome, case.name, case.duration_ms, case.reruns, case.repeat_count
                    );
                }
            }
        }
        Command::Stats { step } => {
            let ledger = open_ledger(&config)?;
            let stats = ledger.step_stats(&StepId::new(step))?;
            for stat in StatName::ALL {
                println!("{stat}\t{}", stats.get(stat));
            }
        }
        Command::Message { job, test } => {
            let ledger = open_ledger(&config)?;
            let content = FsContentStore::open(&config.content_dir)?;
            let Some(case) = ledger.test_case(&JobId::new(job.clone()), &test)? else {
                bail!("no test case {test} in job {job}");
            };
            for message in ledger.messages(&case.id)? {
                let source = ledger
                    .source_artifact(&message.artifact_id)?
                    .with_context(|| format!("source artifact {} not registered", message.artifact_id))?;
                let text = read_message(&content, &source, &message)?;
                println!("--- {} ({})", message.label, source.name);
                println!("{text}");
            }
        }
    }

    Ok(())
}

fn open_ledger(config: &TestlogConfig) -> Result<SqliteLedger> {
    SqliteLedger::open(&config.database)?
        .with_busy_timeout(Duration::from_millis(config.busy_timeout_ms))
}

fn ingest(config: &TestlogConfig, step: StepRef, artifact: &Path) -> Result<()> {
    tracing::info!(step = %step.id, job = %step.job_id, artifact = %artifact.display(), "ingesting");
    let raw = std::fs::read(artifact).with_context(|| format!("read {artifact:?}"))?;
    let batch = JsonlResultReader::new(artifact).read()?;

    let content = FsContentStore::open(&config.content_dir)?;
    let name = artifact
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| artifact.display().to_string());
    let source = SourceArtifact {
        id: ArtifactId::new(format!("{}/{}", step.id, name)),
        step_id: step.id.clone(),
        name,
        blob: Some(content.put(&raw)?),
    };

    let mut ledger = open_ledger(config)?;
    let report = TestResultManager::new(&mut ledger, &content, step, source)
        .with_reservation_attempts(config.reservation_attempts)
        .save(&batch)?;

    for diagnostic in &report.diagnostics {
        eprintln!("{:?}: {diagnostic}", diagnostic.severity());
    }
    println!(
        "ingested {} results: {} new, {} duplicate",
        batch.len(),
        report.fresh,
        report.repeats
    );
    Ok(())
}
