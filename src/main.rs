//! Application entry point: text-mode mock interview.
//!
//! # Startup sequence
//!
//! 1. Initialise logging.
//! 2. Parse the command line and load [`AppConfig`] (default on first run).
//! 3. Extract resume text, if a resume was given.
//! 4. Build the interviewer and session store from config.
//! 5. Create the session (falls back to a local id when the backend is down).
//! 6. Start the recorder (feature `microphone`).
//! 7. Spawn the dialogue controller, the stdin reader and the status printer.
//! 8. Wait for the report, print it and save it as JSON.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use mock_interview::{
    config::{AppConfig, AppPaths, LlmProvider},
    dialogue::{
        event_channel, Collaborators, DialogueController, EventSender, Session, SessionEvent,
        SessionPhase, SessionReport, SessionUpdate,
    },
    interview::{CompanyMode, Difficulty, ExperienceLevel, InterviewType, Role, SessionConfig, Speaker},
    llm::{ApiInterviewer, Interviewer, OfflineInterviewer},
    persist::{establish_session, store_from_config, SessionStore},
    resume::{load_resume_context, FileResumeExtractor},
    speech::ConsoleSynthesizer,
};

// ---------------------------------------------------------------------------
// Command line
// ---------------------------------------------------------------------------

#[derive(Parser)]
#[command(name = "mock-interview")]
#[command(about = "Spoken mock interviews with turn-taking and proctoring", long_about = None)]
struct Cli {
    /// Target role, e.g. backend-dev, frontend-dev, ml-engineer
    #[arg(long, default_value = "backend-dev")]
    role: Role,

    /// Experience bracket: fresher, 1-3, 3-5, 5+
    #[arg(long, default_value = "1-3")]
    experience: ExperienceLevel,

    /// Interview type: hr, technical, mixed, coding
    #[arg(long, default_value = "technical")]
    interview_type: InterviewType,

    /// Company style: google, amazon, tcs, generic
    #[arg(long, default_value = "generic")]
    company_mode: CompanyMode,

    /// Question difficulty: easy, medium, hard
    #[arg(long, default_value = "medium")]
    difficulty: Difficulty,

    /// Resume to ground questions in (.pdf or plain text)
    #[arg(long)]
    resume: Option<PathBuf>,

    /// Settings file to use instead of the platform default
    #[arg(long)]
    config: Option<PathBuf>,
}

const HELP: &str = "\
Type your answer and press Enter.
  /end     finish the interview
  /retry   retry a failed request
  /listen  reopen the answer window after an interruption";

// ---------------------------------------------------------------------------
// main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // 2. Command line + configuration
    let cli = Cli::parse();
    let paths = AppPaths::new();
    let config = match &cli.config {
        Some(path) => AppConfig::load_from(path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => AppConfig::load().unwrap_or_else(|e| {
            log::warn!("Failed to load config ({e}); using defaults");
            AppConfig::default()
        }),
    };

    // 3. Resume (blocking file + PDF work off the runtime)
    let resume_text = match cli.resume.clone() {
        Some(path) => {
            let extractor = FileResumeExtractor::from_config(&config.resume);
            tokio::task::spawn_blocking(move || load_resume_context(&extractor, &path))
                .await
                .unwrap_or_else(|e| {
                    log::warn!("resume extraction task failed: {e}");
                    None
                })
        }
        None => None,
    };

    let session_config = SessionConfig {
        difficulty: cli.difficulty,
        ..SessionConfig::new(cli.role, cli.experience, cli.interview_type, cli.company_mode)
    }
    .with_resume(resume_text);

    // 4. Collaborators
    let interviewer: Arc<dyn Interviewer> = match config.llm.provider {
        LlmProvider::Offline => Arc::new(OfflineInterviewer::new(config.dialogue.question_count)),
        _ => Arc::new(ApiInterviewer::from_config(
            &config.llm,
            config.dialogue.question_count,
        )),
    };
    let store: Arc<dyn SessionStore> =
        Arc::from(store_from_config(&config.persistence, paths.recordings_dir.clone()));

    // 5. Session
    let session_id = establish_session(store.as_ref(), &session_config).await;
    log::info!(
        "Mock interview {session_id}: {} / {} / {}",
        session_config.role.label(),
        session_config.experience_level.label(),
        session_config.interview_type.label()
    );

    // 6–7. Controller
    let (events_tx, events_rx) = event_channel();
    let (updates_tx, updates_rx) = mpsc::unbounded_channel();
    // No frame source in text mode; the closed channel disables proctoring.
    let (_, proctor_rx) = mpsc::channel(1);

    let controller = DialogueController::new(
        Session::new(session_id, session_config),
        Collaborators {
            interviewer,
            synthesizer: Arc::new(ConsoleSynthesizer::new(config.speech.words_per_minute)),
            recognizer: None,
            store,
        },
        &config.dialogue,
        events_tx.clone(),
    )
    .with_updates(updates_tx);
    let controller = attach_recorder(controller, &config);

    let run = tokio::spawn(controller.run(events_rx, proctor_rx));
    tokio::spawn(print_updates(updates_rx));
    tokio::spawn(read_commands(events_tx.clone()));

    println!("{HELP}");
    let _ = events_tx.send(SessionEvent::Start);

    // 8. Report
    let report = run.await.context("dialogue controller panicked")?;
    print_report(&report);
    save_report(&report, &paths.reports_dir)?;
    Ok(())
}

#[cfg(feature = "microphone")]
fn attach_recorder(controller: DialogueController, config: &AppConfig) -> DialogueController {
    use mock_interview::recorder::{MicrophoneSource, SessionRecorder};

    match MicrophoneSource::open() {
        Ok(source) => controller.with_recorder(SessionRecorder::start(
            Box::new(source),
            config.recorder.segment_bytes,
        )),
        Err(e) => {
            log::warn!("Recording disabled: {e}");
            controller
        }
    }
}

#[cfg(not(feature = "microphone"))]
fn attach_recorder(controller: DialogueController, _config: &AppConfig) -> DialogueController {
    log::debug!("built without the microphone feature; not recording");
    controller
}

// ---------------------------------------------------------------------------
// stdin → SessionEvent
// ---------------------------------------------------------------------------

async fn read_commands(events: EventSender) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => {
                let _ = events.send(SessionEvent::End);
                break;
            }
            Err(e) => {
                log::warn!("stdin: {e}");
                let _ = events.send(SessionEvent::End);
                break;
            }
        };

        let event = match line.trim() {
            "/end" | "/quit" => SessionEvent::End,
            "/retry" => SessionEvent::Retry,
            "/listen" => SessionEvent::ResumeListening,
            "/help" => {
                println!("{HELP}");
                continue;
            }
            _ => SessionEvent::Submit(line),
        };
        if events.send(event).is_err() {
            break;
        }
    }
}

// ---------------------------------------------------------------------------
// Status output
// ---------------------------------------------------------------------------

async fn print_updates(mut updates: mpsc::UnboundedReceiver<SessionUpdate>) {
    while let Some(update) = updates.recv().await {
        match update {
            SessionUpdate::Phase(SessionPhase::Listening) => {
                println!("[{}] answer below", SessionPhase::Listening.label());
            }
            SessionUpdate::Phase(phase @ (SessionPhase::Evaluating | SessionPhase::Interrupted)) => {
                println!("[{}]", phase.label());
            }
            SessionUpdate::Phase(_) => {}
            SessionUpdate::Countdown(secs) if secs == 30 || secs == 10 => {
                println!("[{secs}s left]");
            }
            SessionUpdate::Countdown(_) => {}
            SessionUpdate::Warning(w) => println!("[warning] {}", w.kind.message()),
            SessionUpdate::WarningCleared => println!("[warning cleared]"),
            SessionUpdate::Notice(n) => println!("[notice] {}", n.message),
        }
    }
}

fn print_report(report: &SessionReport) {
    println!("\n===== Session {} =====", report.session_id);
    println!(
        "Questions answered: {}/{}",
        report.questions_answered,
        report.questions.len()
    );
    for turn in &report.turns {
        let who = match turn.speaker {
            Speaker::Interviewer => "Interviewer",
            Speaker::Candidate => "You",
        };
        println!("{who}: {}", turn.text);
    }
    if !report.warnings.is_empty() {
        println!("\nIntegrity warnings:");
        for w in &report.warnings {
            println!("  {:>7.1}s  {}", w.at_ms as f64 / 1000.0, w.kind.message());
        }
    }
    for n in &report.notices {
        println!("Notice: {}", n.message);
    }
}

fn save_report(report: &SessionReport, dir: &std::path::Path) -> Result<()> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(format!("session-{}.json", report.session_id));
    std::fs::write(&path, serde_json::to_string_pretty(report)?)?;
    println!("\nReport saved to {}", path.display());
    Ok(())
}
