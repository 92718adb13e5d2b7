use super::*;

pub(super) fn video_link_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^https?://(?:(?:www\.)?youtube\.com/watch\?v=|youtu\.be/)[\w-]+")
            .unwrap_or_else(|err| panic!("invalid video link pattern: {err}"))
    })
}

pub(super) fn is_video_link(token: &str) -> bool {
    video_link_pattern().is_match(token)
}

pub(super) fn classify_links(text: &str) -> ClassifiedLinks {
    let mut classified = ClassifiedLinks::default();
    for (index, token) in text.split_whitespace().enumerate() {
        let position = index + 1;
        if !is_video_link(token) {
            classified.skipped.push(position);
            continue;
        }
        match classified.order.get_mut(token) {
            Some(positions) => positions.push(position),
            None => {
                classified.order.insert(token.to_string(), vec![position]);
                classified.unique.push(token.to_string());
            }
        }
    }
    classified
}

pub(super) fn join_positions(positions: &[usize], separator: &str) -> String {
    positions
        .iter()
        .map(|p| p.to_string())
        .collect::<Vec<_>>()
        .join(separator)
}

/// `5`, `[1, 3]`, `Title.mkv` -> `5_1_3.mkv`
pub(super) fn renamed_filename(number: i64, positions: &[usize], original: &str) -> String {
    let mut name = number.to_string();
    if !positions.is_empty() {
        name.push('_');
        name.push_str(&join_positions(positions, "_"));
    }
    if let Some(ext) = Path::new(original).extension() {
        name.push('.');
        name.push_str(&ext.to_string_lossy());
    }
    name
}

pub(super) fn plan_renames(
    start: i64,
    links: &ClassifiedLinks,
    downloads: &DownloadReport,
) -> Vec<RenamePlan> {
    let mut number = start;
    let mut plan = Vec::with_capacity(downloads.files.len());
    for file in &downloads.files {
        let positions = links
            .order
            .get(&file.link)
            .map(|p| p.as_slice())
            .unwrap_or(&[]);
        plan.push(RenamePlan {
            from: file.filename.clone(),
            to: renamed_filename(number, positions, &file.filename),
        });
        number = number.saturating_add(1);
    }
    plan
}

/// Applies `plan` in order and stops at the first rename that fails.
pub(super) fn apply_renames(dir: &Path, plan: &[RenamePlan]) -> RenameOutcome {
    let mut renamed = 0;
    for step in plan {
        if let Err(err) = fs::rename(dir.join(&step.from), dir.join(&step.to)) {
            return RenameOutcome::Aborted {
                renamed,
                file: step.from.clone(),
                error: err.to_string(),
            };
        }
        renamed += 1;
    }
    RenameOutcome::Completed { renamed }
}

pub(super) fn build_download_summary(report: &DownloadReport) -> String {
    let mut text = format!("✅ Завантажено {} відео.", report.files.len());
    if !report.failed.is_empty() {
        text.push_str(&format!(
            "\n❌ Не вдалося завантажити: {}.",
            report.failed.join(", ")
        ));
    }
    text
}

pub(super) fn build_rename_summary(skipped: &[usize]) -> String {
    let mut text = RENAMED_TEXT.to_string();
    if !skipped.is_empty() {
        text.push_str(&format!(
            "\nПропущені посилання: {}",
            join_positions(skipped, ", ")
        ));
    }
    text
}

pub(super) fn build_rename_abort_text(renamed: usize, total: usize, file: &str, error: &str) -> String {
    format!(
        "❌ Перейменування зупинено на файлі {}: {}\nПерейменовано {} з {}.",
        file, error, renamed, total
    )
}

pub(super) fn build_clean_keyboard() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![
        InlineKeyboardButton::callback("Так", CLEAN_YES),
        InlineKeyboardButton::callback("Ні", CLEAN_NO),
    ]])
}

pub(super) fn dir_has_entries(dir: &Path) -> Result<bool> {
    if !dir.exists() {
        return Ok(false);
    }
    let mut entries =
        fs::read_dir(dir).with_context(|| format!("read download dir {}", dir.display()))?;
    Ok(entries.next().is_some())
}

pub(super) fn ensure_download_dir(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir).with_context(|| format!("create download dir {}", dir.display()))
}

pub(super) fn reset_download_dir(dir: &Path) -> Result<()> {
    if dir.exists() {
        fs::remove_dir_all(dir).with_context(|| format!("clean download dir {}", dir.display()))?;
    }
    ensure_download_dir(dir)
}

/// Carries out the cleanup answer and returns the reply that replaces the
/// prompt.
pub(super) fn apply_clean_choice(dir: &Path, choice: CleanChoice) -> Result<&'static str> {
    match choice {
        CleanChoice::Yes => {
            reset_download_dir(dir)?;
            Ok(CLEANED_TEXT)
        }
        CleanChoice::No => Ok(KEPT_TEXT),
    }
}

pub(super) fn resolve_config_path(path: &Path, config_dir: &Path) -> PathBuf {
    if path.is_relative() {
        config_dir.join(path)
    } else {
        path.to_path_buf()
    }
}

pub(super) fn load_config(path: &Path) -> Result<Config> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("read config {}", path.display()))?;
    let config_file: ConfigFile = toml::from_str(&contents).context("parse config")?;
    let config_dir = path.parent().unwrap_or_else(|| Path::new("."));
    if config_file.token.trim().is_empty() {
        return Err(anyhow!("token is empty"));
    }
    let merge_output_format = config_file
        .merge_output_format
        .unwrap_or_else(|| DEFAULT_MERGE_OUTPUT_FORMAT.to_string());
    let ytdlp_bin = config_file
        .ytdlp_bin
        .map(|p| {
            if p.components().count() > 1 {
                resolve_config_path(&p, config_dir)
            } else {
                p
            }
        })
        .unwrap_or_else(|| PathBuf::from("yt-dlp"));
    Ok(Config {
        token: config_file.token.trim().to_string(),
        download_dir: resolve_config_path(&config_file.download_dir, config_dir),
        log_dir: resolve_config_path(
            config_file
                .log_dir
                .as_deref()
                .unwrap_or_else(|| Path::new(DEFAULT_LOG_DIR)),
            config_dir,
        ),
        user_id: config_file.user_id,
        session_ttl_secs: config_file
            .session_ttl_seconds
            .unwrap_or(DEFAULT_SESSION_TTL_SECS),
        download: DownloadOptions {
            ytdlp_bin,
            socket_timeout_secs: config_file
                .socket_timeout_seconds
                .unwrap_or(DEFAULT_SOCKET_TIMEOUT_SECS),
            merge_output_format,
        },
    })
}

pub(super) fn init_logging(log_dir: &Path) -> Result<()> {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    builder.format(|buf, record| {
        writeln!(
            buf,
            "{} - {} - {}",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S,%3f"),
            record.level(),
            record.args()
        )
    });
    fs::create_dir_all(log_dir)
        .with_context(|| format!("create log dir {}", log_dir.display()))?;
    let path = log_dir.join(LOG_FILE_NAME);
    let file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("open log file {}", path.display()))?;
    builder.target(env_logger::Target::Pipe(Box::new(file)));
    builder.try_init().context("init logger")?;
    Ok(())
}

pub(super) fn is_allowed_user(config: &Config, user_id: u64) -> bool {
    config.user_id.map_or(true, |allowed| allowed == user_id)
}

pub(super) fn parse_command(text: &str) -> Option<&str> {
    let first = text.split_whitespace().next()?;
    if !first.starts_with('/') {
        return None;
    }
    let cmd = first.trim_start_matches('/');
    Some(cmd.split('@').next().unwrap_or(cmd))
}

pub(super) fn now_ts() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_else(|_| Duration::from_secs(0))
        .as_secs()
}

pub(super) fn start_session_sweeper(state: std::sync::Arc<AppState>, interval_secs: u64) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));
        loop {
            interval.tick().await;
            let pruned = {
                let mut sessions = state.sessions.lock().await;
                prune_expired_sessions(&mut sessions, now_ts())
            };
            if pruned > 0 {
                info!("Dropped {} expired session(s).", pruned);
            }
        }
    });
}
