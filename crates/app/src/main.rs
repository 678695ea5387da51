use std::fmt;
use std::io::{self, BufRead, Write};
use std::sync::Arc;

use chrono::Duration;
use quiz_core::model::{ExerciseId, Question, QuestionKind, SubmissionResult, Verdict};
use quiz_core::progress::ExerciseCompletion;
use quiz_core::time::format_elapsed;
use services::{
    AuthService, ClientConfig, ErrorSeverity, Finalization, ProgressService, QuizApi, QuizKind,
    QuizSession, SessionError, StartConfig, TracingObserver,
};
use storage::repository::Storage;
use tracing_subscriber::EnvFilter;

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidNumber { flag: &'static str, raw: String },
    InvalidKind { raw: String },
    InvalidDbUrl { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidNumber { flag, raw } => write!(f, "invalid {flag} value: {raw}"),
            ArgsError::InvalidKind { raw } => {
                write!(f, "invalid --kind value: {raw} (expected choice or open)")
            }
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
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

fn require_number<T: std::str::FromStr>(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<T, ArgsError> {
    let raw = require_value(args, flag)?;
    raw.trim()
        .parse()
        .map_err(|_| ArgsError::InvalidNumber { flag, raw })
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  holbies quiz     [--kind choice|open] [--limit <n>] [--new] [--shuffle]");
    eprintln!("  holbies login    --user <name> [--password <pw>]");
    eprintln!("  holbies register --user <name> --email <email> [--password <pw>]");
    eprintln!("  holbies whoami");
    eprintln!("  holbies logout");
    eprintln!("  holbies progress [complete <id> [--points <n>] [--secs <n>] [--hints <n>] | reveal | reset]");
    eprintln!();
    eprintln!("Common options:");
    eprintln!("  --api <url>         default http://localhost:8000");
    eprintln!("  --db <sqlite_url>   default sqlite:holbies.sqlite3");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  HOLBIES_API_URL, HOLBIES_DB_URL, HOLBIES_QUIZ_KIND, HOLBIES_QUESTION_LIMIT,");
    eprintln!("  HOLBIES_TIMEOUT_SECS, RUST_LOG");
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum ProgressAction {
    Show,
    Complete {
        id: ExerciseId,
        points: u32,
        secs: i64,
        hints: u32,
    },
    Reveal,
    Reset,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Quiz {
        new: bool,
        shuffle: bool,
    },
    Login {
        user: Option<String>,
        password: Option<String>,
    },
    Register {
        user: Option<String>,
        email: Option<String>,
        password: Option<String>,
    },
    WhoAmI,
    Logout,
    Progress(ProgressAction),
}

struct Args {
    command: Command,
    api_url: Option<String>,
    db_url: String,
    kind: Option<QuizKind>,
    limit: Option<usize>,
}

impl Args {
    fn parse(mut args: impl Iterator<Item = String>) -> Result<Option<Self>, ArgsError> {
        let args = &mut args;
        let Some(first) = args.next() else {
            return Ok(None);
        };

        let mut parsed = Self {
            command: Command::Quiz {
                new: false,
                shuffle: false,
            },
            api_url: None,
            db_url: std::env::var("HOLBIES_DB_URL")
                .ok()
                .map_or_else(
                    || normalize_sqlite_url("sqlite:holbies.sqlite3".into()),
                    normalize_sqlite_url,
                ),
            kind: None,
            limit: None,
        };
        let (mut user, mut email, mut password) = (None, None, None);
        let (mut new, mut shuffle) = (false, false);
        let mut progress = ProgressAction::Show;

        let command = first.clone();
        match command.as_str() {
            "quiz" | "login" | "register" | "whoami" | "logout" => {}
            "progress" => {
                let mut rest = args.collect::<Vec<_>>().into_iter().peekable();
                let action = rest.peek().cloned();
                match action.as_deref() {
                    Some("complete") => {
                        rest.next();
                        let id: u32 = require_number(&mut rest, "complete")?;
                        progress = ProgressAction::Complete {
                            id: ExerciseId::new(id),
                            points: 10,
                            secs: 600,
                            hints: 0,
                        };
                    }
                    Some("reveal") => {
                        rest.next();
                        progress = ProgressAction::Reveal;
                    }
                    Some("reset") => {
                        rest.next();
                        progress = ProgressAction::Reset;
                    }
                    _ => {}
                }
                parsed.parse_flags(&mut rest, &mut |flag, rest| match (flag, &mut progress) {
                    ("--points", ProgressAction::Complete { points, .. }) => {
                        *points = require_number(rest, "--points")?;
                        Ok(true)
                    }
                    ("--secs", ProgressAction::Complete { secs, .. }) => {
                        *secs = require_number(rest, "--secs")?;
                        Ok(true)
                    }
                    ("--hints", ProgressAction::Complete { hints, .. }) => {
                        *hints = require_number(rest, "--hints")?;
                        Ok(true)
                    }
                    _ => Ok(false),
                })?;
                parsed.command = Command::Progress(progress);
                return Ok(Some(parsed));
            }
            _ => return Err(ArgsError::UnknownArg(first)),
        }

        parsed.parse_flags(args, &mut |flag, rest| {
            match flag {
                "--user" => user = Some(require_value(rest, "--user")?),
                "--email" => email = Some(require_value(rest, "--email")?),
                "--password" => password = Some(require_value(rest, "--password")?),
                "--new" => new = true,
                "--shuffle" => shuffle = true,
                _ => return Ok(false),
            }
            Ok(true)
        })?;

        parsed.command = match command.as_str() {
            "login" => Command::Login { user, password },
            "register" => Command::Register {
                user,
                email,
                password,
            },
            "whoami" => Command::WhoAmI,
            "logout" => Command::Logout,
            _ => Command::Quiz { new, shuffle },
        };
        Ok(Some(parsed))
    }

    /// Consume common flags; `extra` handles command-specific ones and
    /// returns `false` for flags it does not know.
    fn parse_flags<I: Iterator<Item = String>>(
        &mut self,
        args: &mut I,
        extra: &mut dyn FnMut(&str, &mut I) -> Result<bool, ArgsError>,
    ) -> Result<(), ArgsError> {
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--api" => self.api_url = Some(require_value(args, "--api")?),
                "--db" => {
                    let value = require_value(args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    self.db_url = normalize_sqlite_url(value);
                }
                "--kind" => {
                    let value = require_value(args, "--kind")?;
                    self.kind = Some(
                        value
                            .parse()
                            .map_err(|_| ArgsError::InvalidKind { raw: value.clone() })?,
                    );
                }
                "--limit" => {
                    let limit: usize = require_number(args, "--limit")?;
                    if limit == 0 {
                        return Err(ArgsError::InvalidNumber {
                            flag: "--limit",
                            raw: "0".into(),
                        });
                    }
                    self.limit = Some(limit);
                }
                other => {
                    if !extra(other, args)? {
                        return Err(ArgsError::UnknownArg(arg));
                    }
                }
            }
        }
        Ok(())
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

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    // Logs go to stderr so they never interleave with quiz prompts on stdout.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

// ─── Terminal helpers ──────────────────────────────────────────────────────

fn prompt(label: &str) -> io::Result<String> {
    print!("{label}");
    io::stdout().flush()?;
    let mut line = String::new();
    if io::stdin().lock().read_line(&mut line)? == 0 {
        return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "input closed"));
    }
    Ok(line.trim_end_matches(['\r', '\n']).to_owned())
}

fn value_or_prompt(value: Option<String>, label: &str) -> io::Result<String> {
    match value {
        Some(value) => Ok(value),
        None => prompt(label),
    }
}

fn print_question(question: &Question, position: usize, total: usize) {
    println!();
    println!("Question {position}/{total}");
    if let Some(category) = question.category() {
        println!("[{category}]");
    }
    println!("{}", question.prompt());
    if let QuestionKind::MultipleChoice { choices } = question.kind() {
        for choice in choices {
            println!("  {}) {}", choice.label, choice.text);
        }
    }
}

fn print_feedback(result: &SubmissionResult) {
    match result.verdict() {
        Verdict::Choice {
            is_correct: true, ..
        } => println!("Correct!"),
        Verdict::Choice { correct_answer, .. } => {
            println!("Incorrect. The answer was {correct_answer}.");
        }
        Verdict::Graded {
            percentage,
            feedback,
            technical_terms_found,
            ..
        } => {
            println!(
                "Score: {:.1}/{} ({percentage:.0}%)",
                result.score(),
                result.max_score()
            );
            if !feedback.is_empty() {
                println!("{feedback}");
            }
            if !technical_terms_found.is_empty() {
                println!("Terms used: {}", technical_terms_found.join(", "));
            }
        }
    }
    if let Some(explanation) = result.explanation().filter(|text| !text.is_empty()) {
        println!("{explanation}");
    }
}

// ─── Commands ──────────────────────────────────────────────────────────────

/// What the quiz loop does after a submission fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SubmitRecovery {
    /// Ask for the answer again.
    Retry,
    /// The server will not take an answer for this attempt; offer a fresh one.
    Restart,
    /// Credential is gone.
    Relogin,
    Abort,
}

fn recovery_for(severity: ErrorSeverity) -> SubmitRecovery {
    match severity {
        ErrorSeverity::Recoverable => SubmitRecovery::Retry,
        ErrorSeverity::Rejected => SubmitRecovery::Restart,
        ErrorSeverity::Fatal => SubmitRecovery::Relogin,
        ErrorSeverity::Contract => SubmitRecovery::Abort,
    }
}

/// Reply to "resume or start fresh?". Resuming is the default.
fn wants_fresh_start(reply: &str) -> bool {
    matches!(
        reply.trim().to_ascii_lowercase().as_str(),
        "n" | "new" | "f" | "fresh"
    )
}

fn confirms(reply: &str) -> bool {
    matches!(reply.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

async fn run_quiz(
    auth: &AuthService,
    mut start: StartConfig,
    shuffle: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let api = auth.quiz_client().await?;
    if !api.has_token() {
        eprintln!("not signed in; run `holbies login` first");
        return Ok(());
    }

    let active = if start.force_new {
        None
    } else {
        api.active_session().await?
    };
    if let Some(active) = active {
        let reply = prompt(&format!(
            "You have an unfinished session #{} from {}. Resume it or start fresh? [R/n] ",
            active.id(),
            active.created_at().format("%Y-%m-%d %H:%M")
        ))?;
        start.force_new = wants_fresh_start(&reply);
    }

    let mut session = QuizSession::new(Arc::new(api))
        .with_shuffle(shuffle)
        .with_observer(Arc::new(TracingObserver));
    session.start(&start).await?;

    'questions: loop {
        let progress = session.progress();
        if let Some(question) = session.current_question() {
            print_question(question, progress.position, progress.total);
        }

        let result = loop {
            let answer = prompt("> ")?;
            match session.submit_answer(&answer).await {
                Ok(result) => break result.clone(),
                Err(err) => match recovery_for(err.severity()) {
                    SubmitRecovery::Retry => eprintln!("{err}"),
                    SubmitRecovery::Restart => {
                        eprintln!("{err}");
                        session.abandon()?;
                        if !confirms(&prompt("Start a fresh session instead? [y/N] ")?) {
                            return Ok(());
                        }
                        session.start(&start.clone().with_force_new(true)).await?;
                        continue 'questions;
                    }
                    SubmitRecovery::Relogin => {
                        eprintln!("{err}; run `holbies login` again");
                        session.abandon()?;
                        return Ok(());
                    }
                    SubmitRecovery::Abort => return Err(err.into()),
                },
            }
        };
        print_feedback(&result);

        if session.has_next() {
            prompt("Press Enter for the next question...")?;
        }
        if !session.advance().await? {
            break;
        }
    }

    print_summary(&session);
    Ok(())
}

fn print_summary(session: &QuizSession) {
    let Some(summary) = session.summary() else {
        return;
    };
    println!();
    println!(
        "Score: {:.1}/{:.0} ({:.0}%)",
        summary.total_score, summary.max_score, summary.percentage
    );
    if summary.correct + summary.incorrect > 0 {
        println!("Correct: {}  Incorrect: {}", summary.correct, summary.incorrect);
    }
    println!("Time: {}", format_elapsed(summary.elapsed));
    println!("{}", summary.tier.message());
    if let Some(Finalization::Failed(reason)) = &summary.finalization {
        println!("(results could not be saved on the server: {reason})");
    }
}

async fn run_progress(
    storage: &Storage,
    action: ProgressAction,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut service = ProgressService::load(Arc::clone(&storage.progress)).await?;
    match action {
        ProgressAction::Show => {}
        ProgressAction::Complete {
            id,
            points,
            secs,
            hints,
        } => {
            let completion =
                ExerciseCompletion::new(id, points, Duration::seconds(secs.max(0)), hints)?;
            let outcome = service.complete_exercise(&completion).await?;
            if !outcome.awarded {
                println!("Exercise {id} was already completed.");
            }
            for achievement in outcome.unlocked {
                println!(
                    "Achievement unlocked: {} (+{})",
                    achievement.title(),
                    achievement.points()
                );
            }
        }
        ProgressAction::Reveal => {
            let points = service.reveal_solution().await?;
            println!("Solution revealed. Points now {points}.");
        }
        ProgressAction::Reset => {
            service.reset().await?;
            println!("Progress cleared.");
        }
    }

    let progress = service.progress();
    println!(
        "Completed: {}  Points: {}  Streak: {}  Level: {}",
        progress.completed_exercises.len(),
        progress.points,
        progress.streak,
        progress.level
    );
    for achievement in service.achievements() {
        println!("  * {}", achievement.title());
    }
    Ok(())
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let parsed = match Args::parse(std::env::args().skip(1)) {
        Ok(Some(parsed)) => parsed,
        Ok(None) => {
            print_usage();
            return Ok(());
        }
        Err(err) => {
            eprintln!("{err}");
            print_usage();
            return Err(err.into());
        }
    };

    let mut client_config = match parsed.api_url.as_deref() {
        Some(url) => ClientConfig::from_env()?.with_base_url(url)?,
        None => ClientConfig::from_env()?,
    };
    if let Some(kind) = parsed.kind {
        client_config = client_config.with_kind(kind);
    }
    let mut start = StartConfig::from_env();
    if let Some(limit) = parsed.limit {
        start.question_limit = limit;
    }

    prepare_sqlite_file(&parsed.db_url)?;
    let storage = Storage::sqlite(&parsed.db_url).await?;
    let auth = AuthService::new(client_config, Arc::clone(&storage.credentials))?;

    match parsed.command {
        Command::Quiz { new, shuffle } => {
            run_quiz(&auth, start.with_force_new(new), shuffle).await?;
        }
        Command::Login { user, password } => {
            let user = value_or_prompt(user, "Username: ")?;
            let password = value_or_prompt(password, "Password: ")?;
            match auth.login(&user, &password).await {
                Ok(_) => println!("Signed in as {user}."),
                Err(services::AuthError::InvalidCredentials) => {
                    eprintln!("Incorrect username or password.");
                }
                Err(err) => return Err(err.into()),
            }
        }
        Command::Register {
            user,
            email,
            password,
        } => {
            let user = value_or_prompt(user, "Username: ")?;
            let email = value_or_prompt(email, "Email: ")?;
            let password = value_or_prompt(password, "Password: ")?;
            let profile = auth.register(&user, &email, &password).await?;
            println!("Registered {}. Run `holbies login` to sign in.", profile.username);
        }
        Command::WhoAmI => match auth.me().await {
            Ok(profile) => println!("{} (id {})", profile.username, profile.id),
            Err(services::AuthError::Api(services::ApiError::Authentication)) => {
                println!("Not signed in.");
            }
            Err(err) => return Err(err.into()),
        },
        Command::Logout => {
            auth.logout().await?;
            println!("Signed out.");
        }
        Command::Progress(action) => run_progress(&storage, action).await?,
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    init_tracing();
    if let Err(err) = run().await {
        if let Some(session_err) = err.downcast_ref::<SessionError>() {
            tracing::error!(severity = ?session_err.severity(), "quiz aborted");
        }
        eprintln!("{err}");
        std::process::exit(2);
    }
}
