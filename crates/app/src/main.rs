mod config;

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use backend::{HttpBackend, HttpBackendConfig, InMemoryBackend, PracticeBackend, TopicReadiness};
use practice_core::model::{AccessStatus, Difficulty, Subject, SubjectId, Topic, TopicId};
use services::{
    CancellationToken, CatalogError, Clock, EngineEvent, Navigation, SessionDriver,
    SubmitOutcome, TestConfigBuilder, TestSelection, TopicCatalogService,
};
use tokio::sync::broadcast;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt as log_fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::AppConfig;

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidNumber { flag: &'static str, raw: String },
    InvalidDifficulty { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidNumber { flag, raw } => write!(f, "invalid {flag} value: {raw}"),
            ArgsError::InvalidDifficulty { raw } => {
                write!(f, "invalid --difficulty value: {raw} (easy, medium, hard)")
            }
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

fn parse_number<T: std::str::FromStr>(raw: String, flag: &'static str) -> Result<T, ArgsError> {
    raw.trim()
        .parse()
        .map_err(|_| ArgsError::InvalidNumber { flag, raw })
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p app -- run  [options]   # against PRACTICE_API_BASE_URL");
    eprintln!("  cargo run -p app -- demo [options]   # against an in-memory backend");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --subject <id>        subject to include (repeatable, default: first subject)");
    eprintln!("  --questions <n>       number of questions (default 20)");
    eprintln!("  --minutes <n>         duration in minutes (default 30)");
    eprintln!("  --difficulty <level>  easy | medium | hard (default medium)");
    eprintln!("  --random              let the server pick topics");
    eprintln!("  --paid                demo only: simulate a paid account");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  PRACTICE_API_BASE_URL, PRACTICE_API_TOKEN, PRACTICE_POLL_ATTEMPTS,");
    eprintln!("  PRACTICE_POLL_INTERVAL_MS, PRACTICE_TOPIC_PAGE_SIZE, PRACTICE_TICK_INTERVAL_MS,");
    eprintln!("  PRACTICE_EXPIRY_POLICY, RUST_LOG");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Run,
    Demo,
}

impl Command {
    fn from_arg(arg: &str) -> Option<Self> {
        match arg {
            "run" => Some(Self::Run),
            "demo" => Some(Self::Demo),
            _ => None,
        }
    }
}

struct Args {
    selection: TestSelection,
    paid: bool,
}

impl Args {
    fn parse(args: &mut impl Iterator<Item = String>) -> Result<Self, ArgsError> {
        let mut selection = TestSelection::new();
        let mut paid = false;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--subject" => {
                    let value = require_value(args, "--subject")?;
                    selection
                        .subjects
                        .insert(SubjectId::new(parse_number(value, "--subject")?));
                }
                "--questions" => {
                    let value = require_value(args, "--questions")?;
                    selection.total_questions = parse_number(value, "--questions")?;
                }
                "--minutes" => {
                    let value = require_value(args, "--minutes")?;
                    selection.duration_minutes = parse_number(value, "--minutes")?;
                }
                "--difficulty" => {
                    let value = require_value(args, "--difficulty")?;
                    selection.difficulty = match value.to_ascii_lowercase().as_str() {
                        "easy" => Difficulty::Easy,
                        "medium" => Difficulty::Medium,
                        "hard" => Difficulty::Hard,
                        _ => return Err(ArgsError::InvalidDifficulty { raw: value }),
                    };
                }
                "--random" => selection.random_topics = true,
                "--paid" => paid = true,
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(Self { selection, paid })
    }
}

fn demo_backend(paid: bool) -> InMemoryBackend {
    let subject = |id: u64, name: &str| Subject {
        id: SubjectId::new(id),
        name: name.to_string(),
        topic_count: 0,
        question_count: 0,
    };
    let topics = |subject: u64, names: &[&str]| -> Vec<Topic> {
        names
            .iter()
            .zip(1_u64..)
            .map(|(name, i)| Topic {
                id: TopicId::new(subject * 100 + i),
                subject_id: SubjectId::new(subject),
                name: (*name).to_string(),
            })
            .collect()
    };

    let backend = InMemoryBackend::new()
        .with_subject(
            subject(1, "Physics"),
            topics(1, &["Kinematics", "Optics", "Thermodynamics"]),
        )
        .with_pending_subject(
            subject(2, "Biology"),
            topics(2, &["Cells", "Genetics"]),
            TopicReadiness::AfterFetches(2),
        )
        .with_free_question_limit(5);
    if paid {
        backend.set_access_status(AccessStatus::paid(None, 5));
    }
    backend
}

fn init_tracing(filter: &str) {
    let env_filter = EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(log_fmt::layer().with_target(false))
        .init();
}

async fn log_events(mut events: broadcast::Receiver<EngineEvent>) {
    loop {
        match events.recv().await {
            Ok(EngineEvent::TimerTick { .. }) => {}
            Ok(EngineEvent::AccessDenied {
                requested_index,
                reason,
            }) => warn!(requested_index, ?reason, "upgrade required to continue"),
            Ok(event) => info!(?event, "engine event"),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "event log fell behind");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

async fn attempt(
    backend: Arc<dyn PracticeBackend>,
    config: &AppConfig,
    mut selection: TestSelection,
) -> Result<(), Box<dyn std::error::Error>> {
    let driver = SessionDriver::new(Arc::clone(&backend), config.engine.clone(), Clock::default());
    let events = driver.events().clone();
    tokio::spawn(log_events(events.subscribe()));

    let catalog = TopicCatalogService::new(backend, events, config.engine.clone());
    let subjects = catalog.refresh_subjects().await?;
    if selection.subjects.is_empty() {
        if let Some(first) = subjects.first() {
            selection.subjects.insert(first.id);
        }
    }

    let wanted: BTreeSet<SubjectId> = selection.subjects.clone();
    match catalog.ensure_topics(&wanted, &CancellationToken::new()).await {
        Ok(()) => {}
        Err(CatalogError::Poll(err)) => warn!(error = %err, "continuing without some topics"),
        Err(err) => return Err(err.into()),
    }

    let test_config = TestConfigBuilder::build(&selection)?;
    driver.start_test(test_config).await?;
    let clock = driver.spawn_clock();

    let question_count = driver
        .engine()
        .lock()
        .await
        .session()
        .map_or(0, |session| session.len());
    for index in 0..question_count {
        if driver.navigate(index).await? == Navigation::Denied {
            break;
        }
        driver.answer(index, index % 4).await?;
    }

    let outcome = driver.submit().await?;
    clock.stop().await;
    match outcome {
        SubmitOutcome::Completed(report) => {
            info!(
                score = report.result.score,
                correct = report.breakdown.correct,
                incorrect = report.breakdown.incorrect,
                skipped = report.breakdown.skipped,
                unscored = report.breakdown.unscored,
                "attempt scored"
            );
            match driver.download_pdf().await {
                Ok(pdf) => info!(bytes = pdf.len(), "PDF export available"),
                Err(err) => info!(error = %err, "PDF export unavailable"),
            }
        }
        other => warn!(?other, "attempt not scored"),
    }
    Ok(())
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::from_env()?;
    init_tracing(&config.rust_log);

    let mut argv: Vec<String> = std::env::args().skip(1).collect();
    let cmd = match argv.first().map(String::as_str) {
        None | Some("--help" | "-h") => {
            print_usage();
            return Ok(());
        }
        Some(first) => Command::from_arg(first).ok_or_else(|| {
            eprintln!("unknown subcommand: {first}");
            print_usage();
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "unknown subcommand")
        })?,
    };
    argv.remove(0);

    let parsed = Args::parse(&mut argv.into_iter()).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    let backend: Arc<dyn PracticeBackend> = match cmd {
        Command::Run => Arc::new(HttpBackend::new(HttpBackendConfig::from_env()?)?),
        Command::Demo => Arc::new(demo_backend(parsed.paid)),
    };
    attempt(backend, &config, parsed.selection).await
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
