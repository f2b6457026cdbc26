use std::fmt;
use std::io::{BufRead, Write as _};
use std::sync::Arc;

use certi_core::model::{Level, SessionType, UserId};
use services::{
    CertifiedLevelSource, Clock, ExamApiConfig, HttpExamApi, ProgressTracker, ProgressViewService,
    SessionWorkflow, TestConfigService,
};
use storage::repository::Storage;

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    MissingUser,
    InvalidUser { raw: String },
    InvalidLevel { raw: String },
    InvalidDbUrl { raw: String },
    MissingApiConfig,
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::MissingUser => write!(f, "--user is required"),
            ArgsError::InvalidUser { raw } => write!(f, "invalid --user value: {raw}"),
            ArgsError::InvalidLevel { raw } => write!(f, "invalid --level value: {raw}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::MissingApiConfig => {
                write!(f, "CERTI_API_BASE_URL must be set to run a session")
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

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p app -- progress       --user <uuid> --level <n> [--db <sqlite_url>]");
    eprintln!("  cargo run -p app -- session        --user <uuid> --level <n> [--remedial] [--db <sqlite_url>]");
    eprintln!("  cargo run -p app -- certifications --user <uuid> [--db <sqlite_url>]");
    eprintln!();
    eprintln!("Defaults:");
    eprintln!("  --db sqlite:certi.sqlite3");
    eprintln!("  --level 1");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  CERTI_DB_URL, CERTI_API_BASE_URL, CERTI_API_KEY");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Progress,
    Session,
    Certifications,
}

impl Command {
    fn from_arg(arg: &str) -> Option<Self> {
        match arg {
            "progress" => Some(Self::Progress),
            "session" => Some(Self::Session),
            "certifications" => Some(Self::Certifications),
            _ => None,
        }
    }
}

struct Args {
    db_url: String,
    user: UserId,
    level: Level,
    remedial: bool,
}

impl Args {
    fn parse(args: &mut impl Iterator<Item = String>) -> Result<Self, ArgsError> {
        let mut db_url = std::env::var("CERTI_DB_URL")
            .ok()
            .map_or_else(|| "sqlite://certi.sqlite3".into(), normalize_sqlite_url);
        let mut user = None;
        let mut level = Level::new(1);
        let mut remedial = false;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = normalize_sqlite_url(value);
                }
                "--user" => {
                    let value = require_value(args, "--user")?;
                    user = Some(
                        value
                            .parse::<UserId>()
                            .map_err(|_| ArgsError::InvalidUser { raw: value.clone() })?,
                    );
                }
                "--level" => {
                    let value = require_value(args, "--level")?;
                    level = value
                        .parse::<Level>()
                        .map_err(|_| ArgsError::InvalidLevel { raw: value.clone() })?;
                }
                "--remedial" => remedial = true,
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(Self {
            db_url,
            user: user.ok_or(ArgsError::MissingUser)?,
            level,
            remedial,
        })
    }
}

fn normalize_sqlite_url(raw: String) -> String {
    if raw == "sqlite::memory:" || raw.starts_with("sqlite://") {
        return raw;
    }

    let trimmed = raw.trim().to_string();
    let path_str = trimmed
        .strip_prefix("sqlite:")
        .unwrap_or(trimmed.as_str())
        .to_string();
    let path = std::path::Path::new(&path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| std::path::PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

fn prepare_sqlite_file(db_url: &str) -> Result<(), Box<dyn std::error::Error>> {
    if db_url == "sqlite::memory:" {
        return Ok(());
    }

    let path = db_url
        .strip_prefix("sqlite://")
        .ok_or_else(|| ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        })?;
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        return Err(ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        }
        .into());
    }

    let path = std::path::Path::new(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    if !path.exists() {
        std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)?;
    }

    Ok(())
}

struct AppServices {
    view: ProgressViewService,
    tracker: ProgressTracker,
    config: TestConfigService,
    storage: Storage,
    clock: Clock,
}

fn build_services(storage: Storage) -> AppServices {
    let clock = Clock::default_clock();
    let tracker = ProgressTracker::new(
        clock,
        Arc::clone(&storage.progress),
        Arc::clone(&storage.failed_questions),
        Arc::clone(&storage.certifications),
    );
    let config = TestConfigService::new(Arc::clone(&storage.config));
    let view = ProgressViewService::new(
        tracker.clone(),
        config.clone(),
        Arc::clone(&storage.failed_questions),
        Arc::clone(&storage.sessions),
        Arc::clone(&storage.certifications),
    );

    AppServices {
        view,
        tracker,
        config,
        storage,
        clock,
    }
}

async fn show_progress(services: &AppServices, args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let overview = services.view.level_overview(args.user, args.level).await?;

    println!("Level {}", overview.level);
    println!(
        "  sessions: {}/{} completed, next is session {}",
        overview.completed_sessions, overview.total_sessions, overview.current_session_number
    );
    println!("  level completed: {}", overview.is_level_completed);
    if overview.pending_remediation > 0 {
        println!(
            "  failed questions pending remediation: {}",
            overview.pending_remediation
        );
    }
    if overview.remedial_available {
        println!("  a remedial session is available");
    }

    let history = services.view.session_history(args.user, args.level).await?;
    if !history.is_empty() {
        println!("History:");
        for item in history {
            println!(
                "  #{:<3} {:?}  score {:>3}  validated: {}",
                item.session_number, item.session_type, item.score, item.is_validated
            );
        }
    }

    Ok(())
}

async fn show_certifications(
    services: &AppServices,
    args: &Args,
) -> Result<(), Box<dyn std::error::Error>> {
    let certifications = services.view.certifications(args.user).await?;
    if certifications.is_empty() {
        println!("No certifications yet.");
    }
    for certification in &certifications {
        println!(
            "Level {}  score {}  certified at {}",
            certification.level, certification.score, certification.certified_at
        );
    }

    // The backend also exposes the highest certified level as an RPC; show it
    // when the API is configured.
    if let Some(api_config) = ExamApiConfig::from_env() {
        let api = HttpExamApi::new(api_config)?;
        match api.max_certified_level(args.user).await {
            Ok(Some(level)) => println!("Highest certified level (remote): {level}"),
            Ok(None) => {}
            Err(err) => eprintln!("could not query max certified level: {err}"),
        }
    }

    Ok(())
}

fn read_line(prompt: &str) -> Result<String, std::io::Error> {
    print!("{prompt}");
    std::io::stdout().flush()?;
    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

async fn run_session(services: &AppServices, args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let api_config = ExamApiConfig::from_env().ok_or(ArgsError::MissingApiConfig)?;
    let api = Arc::new(HttpExamApi::new(api_config)?);

    let workflow = SessionWorkflow::new(
        services.clock,
        Arc::clone(&services.storage.sessions),
        Arc::clone(&services.storage.answers),
        Arc::clone(&services.storage.question_stats),
        Arc::clone(&services.storage.user_stats),
        services.tracker.clone(),
        services.config.clone(),
        api.clone(),
        api,
    );

    let session_type = if args.remedial {
        SessionType::Remedial
    } else {
        SessionType::Regular
    };

    let mut runner = workflow.start(args.user, args.level, session_type).await?;
    println!(
        "Session {} ({:?}): {} questions",
        runner.session_number(),
        runner.session_type(),
        runner.total_questions()
    );

    while !runner.is_complete() {
        let Some(question) = runner.current_question() else {
            break;
        };
        let question = question.clone();
        let progress = runner.progress();
        println!();
        println!(
            "[{}/{}] {}",
            progress.answered + 1,
            progress.total,
            question.content
        );
        for (i, choice) in question.choices.iter().enumerate() {
            println!("  {}. {choice}", i + 1);
        }

        let answer = read_line("> ")?;
        let result = workflow.answer_current(&mut runner, &answer).await?;
        if result.is_correct {
            println!("Correct.");
        } else {
            println!("Incorrect.");
            if let Some(rule) = &result.rule {
                println!("Rule: {rule}");
            }
            if let Some(explanation) = &result.explanation {
                println!("{explanation}");
            }
            read_line("Press enter to continue ")?;
            workflow.acknowledge_explanation(&mut runner)?;
        }
    }

    let completion = workflow.complete(&mut runner).await?;
    println!();
    println!(
        "Score: {}  ({})",
        completion.session.score(),
        if completion.session.is_validated() {
            "passed"
        } else {
            "failed"
        }
    );
    if completion.outcome.level_completed {
        println!("Level {} completed.", args.level);
    }
    if let Some(certification) = completion.outcome.certification {
        println!(
            "Certification issued for level {} with score {}.",
            certification.level, certification.score
        );
    }

    Ok(())
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
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

    let mut iter = argv.into_iter();
    let args = Args::parse(&mut iter).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    // Open + migrate SQLite at startup. Keep this in the binary glue so core/services stay pure.
    prepare_sqlite_file(&args.db_url)?;
    let storage = Storage::sqlite(&args.db_url).await?;
    let services = build_services(storage);

    match cmd {
        Command::Progress => show_progress(&services, &args).await,
        Command::Session => run_session(&services, &args).await,
        Command::Certifications => show_certifications(&services, &args).await,
    }
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        // At this layer (binary glue), printing once is fine.
        eprintln!("{err}");
        std::process::exit(2);
    }
}
