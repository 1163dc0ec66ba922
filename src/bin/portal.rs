//! Enrollment portal CLI.
//!
//! Drives a team through the enrollment flow against a running store service.
//!
//! Usage:
//!   enroll-portal status     - Window, countdown and counts
//!   enroll-portal watch      - Live countdown and counts
//!   enroll-portal topics     - Unclaimed topics of a section
//!   enroll-portal claim      - Claim a topic for a team of two
//!   enroll-portal progress   - Every team's selection

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use topic_enrollment::client::{
    ConfiguredIdentityOracle, Identity, IdentityOracle, Landing, LocalEnrollmentCache,
    MemberForm, Portal, Route, StatsPoller, SECTIONS,
};
use topic_enrollment::errors::AppError;
use topic_enrollment::models::{AbortReason, ClaimOutcome, Stats, WindowPhase, WindowStatus};
use topic_enrollment::store::{EnrollmentStore, RemoteStore};
use topic_enrollment::window::{EnrollmentWindow, WindowTicker};

#[derive(Parser, Debug)]
#[command(name = "enroll-portal", version, about = "Project topic enrollment portal")]
struct Cli {
    /// Base URL of the enrollment store
    #[arg(long, env = "ENROLL_API_URL", default_value = "http://127.0.0.1:8080")]
    api_url: String,

    /// Pre-shared API key
    #[arg(long, env = "ENROLL_API_PSK", hide_env_values = true)]
    api_key: Option<String>,

    /// Directory holding this machine's enrollment cache
    #[arg(long, env = "ENROLL_CLIENT_DIR", default_value = "./data/client")]
    data_dir: PathBuf,

    /// Display name to sign in with
    #[arg(long, env = "ENROLL_USER_NAME")]
    user_name: Option<String>,

    /// Account identifier to sign in with (defaults to the display name)
    #[arg(long, env = "ENROLL_USER_SUBJECT")]
    user_subject: Option<String>,

    /// Enable logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show the landing screen once
    Status,

    /// Keep the countdown and counts on screen
    Watch {
        /// Stop after this many seconds
        #[arg(long)]
        seconds: Option<u64>,
    },

    /// List unclaimed topics
    Topics {
        /// Section (A or B)
        #[arg(short, long)]
        section: Option<String>,

        /// Title search, word prefixes
        #[arg(short = 'q', long)]
        search: Option<String>,
    },

    /// Claim a topic
    Claim {
        /// Topic ID
        #[arg(short, long)]
        topic: String,

        #[arg(long)]
        student1_name: String,

        #[arg(long)]
        student1_usn: String,

        #[arg(long)]
        student2_name: String,

        #[arg(long)]
        student2_usn: String,
    },

    /// Show every team's selection
    Progress,
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    if cli.verbose {
        init_logging();
    }

    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e.message());
        std::process::exit(1);
    }
}

fn init_logging() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "topic_enrollment=debug,enroll_portal=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn run(cli: Cli) -> Result<(), AppError> {
    let store = Arc::new(RemoteStore::new(&cli.api_url, cli.api_key.clone())?);
    let status = store.window_status().await?;
    let window = EnrollmentWindow::new(status.start, status.end)?;
    let cache = LocalEnrollmentCache::open(&cli.data_dir).await?;

    let identity = cli.user_name.clone().map(|name| Identity {
        subject: cli.user_subject.clone().unwrap_or_else(|| name.clone()),
        display_name: name,
    });
    let oracle = ConfiguredIdentityOracle::new(identity);
    let subscription = oracle.subscribe();

    let mut portal = Portal::new(store.clone(), cache, window);

    match cli.command {
        Command::Status => {
            print_landing(&portal.landing(Utc::now()).await);
            match portal.stats().await {
                Some(stats) => print_stats(&stats),
                None => println!("Topic counts are unavailable right now"),
            }
        }

        Command::Watch { seconds } => watch(store, window, seconds).await,

        Command::Topics { section, search } => {
            sign_in(&oracle).await;
            portal.set_session(subscription.session());

            match portal.enter(Utc::now()).await? {
                Route::Section => {}
                other => return redirected(&portal, other).await,
            }

            let section = section.map(|s| s.to_uppercase());
            if let Some(s) = &section {
                if !SECTIONS.contains(&s.as_str()) {
                    return Err(AppError::Validation(format!(
                        "Unknown section {} (choose one of {})",
                        s,
                        SECTIONS.join(", ")
                    )));
                }
            }

            let topics = portal.topics(section.as_deref(), search.as_deref()).await?;
            if topics.is_empty() {
                println!("No topics found");
            }
            for topic in topics {
                println!("{:<38} {}", topic.id, topic.title);
            }
        }

        Command::Claim {
            topic,
            student1_name,
            student1_usn,
            student2_name,
            student2_usn,
        } => {
            sign_in(&oracle).await;
            portal.set_session(subscription.session());

            match portal.enter(Utc::now()).await? {
                Route::Section => {}
                other => return redirected(&portal, other).await,
            }

            let mut flow = portal.begin_claim(&topic).await?;
            println!("You selected: {}", flow.topic().title);

            let form = MemberForm {
                student1_name,
                student1_usn,
                student2_name,
                student2_usn,
            };
            match portal.submit(&mut flow, &form).await {
                Ok(ClaimOutcome::Committed(record)) => {
                    println!("Topic claimed: {}", record.topic_title);
                    println!(
                        "Team: {} ({}) and {} ({})",
                        record.student1_name,
                        record.student1_usn,
                        record.student2_name,
                        record.student2_usn
                    );
                }
                Ok(ClaimOutcome::Aborted(reason)) => return Err(AppError::ClaimAborted(reason)),
                Err(AppError::InvalidSubmission(fields)) => {
                    for field in &fields {
                        eprintln!("{}: {}", field.field, field.message);
                    }
                    return Err(AppError::InvalidSubmission(fields));
                }
                Err(e) => return Err(e),
            }
        }

        Command::Progress => print_progress(&portal).await?,
    }

    Ok(())
}

async fn sign_in(oracle: &ConfiguredIdentityOracle) {
    if let Err(e) = oracle.sign_in().await {
        tracing::debug!("Not signed in: {}", e);
    }
}

/// Explain why the flow could not be entered.
async fn redirected(portal: &Portal<RemoteStore>, route: Route) -> Result<(), AppError> {
    match route {
        Route::Progress => {
            if let Some(entry) = portal.cached().await {
                println!(
                    "This machine already enrolled a team for \"{}\" on {}",
                    entry.topic_title, entry.timestamp
                );
            }
            print_progress(portal).await
        }
        _ => {
            print_landing(&portal.landing(Utc::now()).await);
            Err(AppError::ClaimAborted(AbortReason::WindowClosed))
        }
    }
}

async fn watch(store: Arc<RemoteStore>, window: EnrollmentWindow, seconds: Option<u64>) {
    let mut ticker = WindowTicker::spawn(window);
    let poller = StatsPoller::spawn(store);
    let deadline = seconds.map(|s| tokio::time::Instant::now() + Duration::from_secs(s));

    loop {
        let status = tokio::select! {
            status = ticker.next() => match status {
                Some(status) => status,
                None => break,
            },
            _ = tokio::signal::ctrl_c() => break,
        };
        print_status_line(&status, &poller.latest());

        if deadline.is_some_and(|d| tokio::time::Instant::now() >= d) {
            break;
        }
    }
}

fn print_landing(landing: &Landing) {
    match landing {
        Landing::Closed(status) => {
            match status.phase {
                WindowPhase::NotYetOpen => println!("Enrollment opens in {}", status.countdown),
                _ => println!("Enrollment is closed"),
            }
            print_window(status);
        }
        Landing::AlreadyEnrolled(entry) => {
            println!("Already enrolled: {}", entry.topic_title);
            println!(
                "Team: {} ({}) and {} ({})",
                entry.student1_name, entry.student1_usn, entry.student2_name, entry.student2_usn
            );
        }
        Landing::Open(status) => {
            println!("Enrollment is open, closes in {}", status.countdown);
            print_window(status);
        }
    }
}

fn print_window(status: &WindowStatus) {
    println!(
        "Window: {} to {} ({:.0}% left)",
        status.start.to_rfc3339(),
        status.end.to_rfc3339(),
        status.time_left_percentage
    );
}

fn print_stats(stats: &Stats) {
    println!(
        "Topics: {} total, {} available. Teams registered: {}",
        stats.total_topics, stats.available_topics, stats.total_responses
    );
}

fn print_status_line(status: &WindowStatus, stats: &Stats) {
    println!(
        "[{:?}] {}  topics {}/{}  teams {}",
        status.phase,
        status.countdown,
        stats.available_topics,
        stats.total_topics,
        stats.total_responses
    );
}

async fn print_progress<S: EnrollmentStore + ?Sized>(portal: &Portal<S>) -> Result<(), AppError> {
    let records = portal.progress().await?;
    if records.is_empty() {
        println!("No teams have enrolled yet");
    }
    for record in records {
        println!(
            "{}  {}  {} & {}",
            record.timestamp, record.topic_title, record.student1_name, record.student2_name
        );
    }
    Ok(())
}
