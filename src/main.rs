use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::OnceLock;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use log::info;
use regex::Regex;
use serde::Deserialize;
use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup, Message, MessageId};
use tokio::sync::Mutex;

mod callback_handlers;
mod conversation;
mod helpers;
mod integrations;
mod message_handlers;

use callback_handlers::*;
use conversation::*;
use helpers::*;
use integrations::*;
use message_handlers::*;


const DEFAULT_SESSION_TTL_SECS: u64 = 6 * 60 * 60;
const DEFAULT_SOCKET_TIMEOUT_SECS: u64 = 30;
const DEFAULT_MERGE_OUTPUT_FORMAT: &str = "mkv";
const SESSION_SWEEP_SECS: u64 = 60;
const DEFAULT_LOG_DIR: &str = "logs";
const LOG_FILE_NAME: &str = "bot.log";

const CLEAN_YES: &str = "clean_yes";
const CLEAN_NO: &str = "clean_no";

const CLEAN_PROMPT_TEXT: &str =
    "🗂️ Папка для завантажень вже існує. Очистити перед новим завантаженням?";
const LINKS_PROMPT_TEXT: &str =
    "📥 Надішли список посилань на YouTube (через пробіл або нові рядки).";
const CLEANED_TEXT: &str = "🧹 Папку очищено. Надішли посилання.";
const KEPT_TEXT: &str = "📥 Надішли посилання.";
const DOWNLOADING_TEXT: &str = "⏳ Завантажую відео...";
const RENAME_PROMPT_TEXT: &str = "📝 Введи стартову цифру для перейменування першого відео.";
const RENAMED_TEXT: &str = "✅ Перейменування завершено.";
const INVALID_NUMBER_TEXT: &str = "❗️ Введи коректне число.";
const CANCELED_TEXT: &str = "🚫 Операцію скасовано.";

#[derive(Debug, Deserialize)]
struct ConfigFile {
    token: String,
    download_dir: PathBuf,
    #[serde(default)]
    log_dir: Option<PathBuf>,
    #[serde(default)]
    user_id: Option<u64>,
    #[serde(default)]
    session_ttl_seconds: Option<u64>,
    #[serde(default)]
    ytdlp_bin: Option<PathBuf>,
    #[serde(default)]
    socket_timeout_seconds: Option<u64>,
    #[serde(default)]
    merge_output_format: Option<String>,
}

#[derive(Debug, Clone)]
struct Config {
    token: String,
    download_dir: PathBuf,
    log_dir: PathBuf,
    user_id: Option<u64>,
    /// Idle lifetime of a conversation. Zero keeps sessions forever.
    session_ttl_secs: u64,
    download: DownloadOptions,
}

#[derive(Debug, Clone)]
struct DownloadOptions {
    ytdlp_bin: PathBuf,
    socket_timeout_secs: u64,
    merge_output_format: String,
}

#[derive(Parser, Debug)]
struct Args {
    #[arg(long)]
    config: PathBuf,
}

/// Result of splitting one links message into tokens.
///
/// `unique` holds recognized links in first-seen order, `order` maps each of
/// them to every 1-based position it occupied, and `skipped` lists the
/// positions of tokens that were not recognized.
#[derive(Clone, Debug, Default, PartialEq)]
struct ClassifiedLinks {
    unique: Vec<String>,
    order: HashMap<String, Vec<usize>>,
    skipped: Vec<usize>,
}

#[derive(Clone, Debug, PartialEq)]
struct DownloadedFile {
    link: String,
    filename: String,
}

#[derive(Clone, Debug, Default)]
struct DownloadReport {
    files: Vec<DownloadedFile>,
    failed: Vec<String>,
}

#[derive(Clone, Debug, PartialEq)]
struct RenamePlan {
    from: String,
    to: String,
}

#[derive(Debug, PartialEq)]
enum RenameOutcome {
    Completed {
        renamed: usize,
    },
    Aborted {
        renamed: usize,
        file: String,
        error: String,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
struct SessionKey {
    chat_id: i64,
    user_id: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Stage {
    ConfirmClean,
    AwaitLinks,
    AwaitRenameNumber,
}

#[derive(Clone, Debug)]
struct Session {
    stage: Stage,
    links: ClassifiedLinks,
    downloads: DownloadReport,
    expires_at: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum CleanChoice {
    Yes,
    No,
}

#[derive(Debug, PartialEq)]
enum Event<'a> {
    Command(&'a str),
    Text(&'a str),
    Button(&'a str),
}

#[derive(Debug, PartialEq)]
enum Step<'a> {
    Ignore,
    Begin,
    Clean(CleanChoice),
    Download(&'a str),
    Rename(i64),
    RejectNumber,
    Cancel,
}

struct AppState {
    config: Config,
    sessions: Mutex<HashMap<SessionKey, Session>>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = load_config(&args.config)?;
    init_logging(&config.log_dir)?;

    fs::create_dir_all(&config.download_dir).with_context(|| {
        format!("create download dir {}", config.download_dir.display())
    })?;
    info!(
        "Bot started, downloading into {}",
        config.download_dir.display()
    );

    let state = AppState {
        config: config.clone(),
        sessions: Mutex::new(HashMap::new()),
    };

    let state = std::sync::Arc::new(state);

    if config.session_ttl_secs > 0 {
        start_session_sweeper(state.clone(), SESSION_SWEEP_SECS);
    }

    let bot = Bot::new(config.token.clone());

    let handler = dptree::entry()
        .branch(Update::filter_message().endpoint(handle_message))
        .branch(Update::filter_callback_query().endpoint(handle_callback));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}
