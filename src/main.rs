use std::io::Write as _;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use satchel_gateway::api::{self, ApiState};
use satchel_gateway::assistant::{Assistant, Session};
use satchel_gateway::db::{self, User, UserRepo};
use satchel_gateway::llm::{OpenAiChat, SharedChatBackend};
use satchel_gateway::voice::{encode_wav, rms_level, trim_silence, AudioCapture, SpeechToText, SAMPLE_RATE};
use satchel_gateway::Config;

/// Satchel - Voice assistant gateway for student assignment tracking
#[derive(Parser)]
#[command(name = "satchel", version, about)]
struct Cli {
    /// Port to listen on (serve only)
    #[arg(long, env = "SATCHEL_PORT")]
    port: Option<u16>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Disable voice features (for headless servers without audio hardware)
    #[arg(long, env = "SATCHEL_DISABLE_VOICE")]
    disable_voice: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP gateway (the default)
    Serve,
    /// Send a text command through the assistant pipeline
    Ask {
        /// Command text; omit for an interactive session
        text: Option<String>,
        /// Acting username (created on first use)
        #[arg(short, long, default_value = "local")]
        user: String,
    },
    /// Push-to-talk: record, transcribe, and run commands
    Listen {
        /// Acting username (created on first use)
        #[arg(short, long, default_value = "local")]
        user: String,
    },
    /// Test microphone input
    TestMic {
        /// Duration in seconds
        #[arg(short, long, default_value = "5")]
        duration: u64,
    },
    /// Manage users
    User {
        #[command(subcommand)]
        command: UserCommand,
    },
}

#[derive(Subcommand)]
enum UserCommand {
    /// Create a user and print its API token
    Add { username: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = Config::load()?;

    match cli.command {
        None | Some(Command::Serve) => serve(cli.port, cli.disable_voice, &config).await,
        Some(Command::Ask { text, user }) => ask(&config, text, &user).await,
        Some(Command::Listen { user }) => listen(&config, &user).await,
        Some(Command::TestMic { duration }) => test_mic(duration).await,
        Some(Command::User { command }) => match command {
            UserCommand::Add { username } => add_user(&config, &username),
        },
    }
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "satchel_gateway=info,satchel=info",
        1 => "satchel_gateway=debug,satchel=debug",
        _ => "trace",
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Run the HTTP gateway
async fn serve(port: Option<u16>, disable_voice: bool, config: &Config) -> anyhow::Result<()> {
    std::fs::create_dir_all(&config.data_dir)?;
    let pool = db::init(config.db_path())?;

    let backend = chat_backend(config)?;
    let stt = if disable_voice || !config.voice.enabled {
        None
    } else {
        match SpeechToText::new(
            &config.llm.base_url,
            config.llm.api_key.clone(),
            &config.voice.stt_model,
        ) {
            Ok(stt) => Some(Arc::new(stt)),
            Err(e) => {
                tracing::warn!(error = %e, "voice disabled");
                None
            }
        }
    };

    let rate_limiter = config
        .server
        .rate_limit_per_minute
        .map(api::create_limiter);

    let state = Arc::new(ApiState::new(pool, backend, stt, rate_limiter));
    let port = port.unwrap_or(config.server.port);

    api::serve(state, port).await?;
    Ok(())
}

/// Text path: run commands through the pipeline from the terminal
async fn ask(config: &Config, text: Option<String>, username: &str) -> anyhow::Result<()> {
    let pool = open_db(config)?;
    let user = local_user(&UserRepo::new(pool.clone()), username)?;
    let assistant = Assistant::new(pool, chat_backend(config)?);
    let mut session = Session::new();

    if let Some(text) = text {
        let outcome = assistant
            .classify_and_execute(&text, &mut session, &user)
            .await?;
        println!("{}", outcome.message());
        return Ok(());
    }

    // Interactive: one session across commands, blank line or Ctrl-D ends
    println!("satchel assistant - type a command, empty line to quit");
    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let mut line = String::new();
        if std::io::stdin().read_line(&mut line)? == 0 {
            break;
        }
        let line = line.trim();
        if line.is_empty() {
            break;
        }

        match assistant.classify_and_execute(line, &mut session, &user).await {
            Ok(outcome) => println!("{}", outcome.message()),
            Err(e) => eprintln!("error: {e}"),
        }
    }

    Ok(())
}

/// Voice path: push-to-talk loop
async fn listen(config: &Config, username: &str) -> anyhow::Result<()> {
    let pool = open_db(config)?;
    let user = local_user(&UserRepo::new(pool.clone()), username)?;
    let assistant = Assistant::new(pool, chat_backend(config)?);
    let stt = SpeechToText::new(
        &config.llm.base_url,
        config.llm.api_key.clone(),
        &config.voice.stt_model,
    )?;

    let mut capture = AudioCapture::new()?;
    let mut session = Session::new();

    println!("push-to-talk: Enter starts and stops recording, 'q' quits");
    loop {
        let mut line = String::new();
        std::io::stdin().read_line(&mut line)?;
        if line.trim() == "q" {
            break;
        }

        capture.start()?;
        println!("recording... press Enter to stop");
        line.clear();
        std::io::stdin().read_line(&mut line)?;
        capture.stop();

        let samples = capture.take_utterance();
        let trimmed = trim_silence(&samples);
        if rms_level(trimmed) < 0.005 {
            println!("(heard nothing)");
            continue;
        }

        let wav = encode_wav(trimmed, SAMPLE_RATE)?;
        let transcript = stt.transcribe(wav).await?;
        println!("heard: {transcript}");

        match assistant
            .classify_and_execute(&transcript, &mut session, &user)
            .await
        {
            Ok(outcome) => println!("{}", outcome.message()),
            Err(e) => eprintln!("error: {e}"),
        }

        println!("press Enter to record again, 'q' to quit");
    }

    Ok(())
}

/// Record for a few seconds and report the captured level
async fn test_mic(duration: u64) -> anyhow::Result<()> {
    let mut capture = AudioCapture::new()?;

    println!("recording {duration}s...");
    capture.start()?;
    tokio::time::sleep(Duration::from_secs(duration)).await;
    capture.stop();

    let samples = capture.take_utterance();
    let level = rms_level(&samples);
    println!(
        "captured {} samples ({:.1}s), rms level {level:.4}",
        samples.len(),
        samples.len() as f64 / f64::from(SAMPLE_RATE),
    );

    if level < 0.001 {
        println!("level is very low - check the input device");
    }

    Ok(())
}

/// Create a user and print the bearer token clients should send
fn add_user(config: &Config, username: &str) -> anyhow::Result<()> {
    let pool = open_db(config)?;
    let user = UserRepo::new(pool).create(username)?;

    println!("user '{}' created", user.username);
    println!("api token: {}", user.api_token);
    Ok(())
}

fn open_db(config: &Config) -> anyhow::Result<db::DbPool> {
    std::fs::create_dir_all(&config.data_dir)?;
    Ok(db::init(config.db_path())?)
}

fn chat_backend(config: &Config) -> anyhow::Result<SharedChatBackend> {
    let chat = OpenAiChat::new(
        &config.llm.base_url,
        config.llm.api_key.clone(),
        &config.llm.model,
        config.llm.max_tokens,
    )?;
    Ok(Arc::new(chat))
}

/// Find or create the CLI's acting user
fn local_user(users: &UserRepo, username: &str) -> anyhow::Result<User> {
    match users.find_by_username(username) {
        Ok(user) => Ok(user),
        Err(_) => Ok(users.create(username)?),
    }
}
