use super::*;

/// Transition table of the download conversation.
///
/// `stage` is `None` when the user has no live session. Every pair not listed
/// resolves to `Step::Ignore`, which leaves the session exactly as it was.
pub(super) fn next_step<'a>(stage: Option<Stage>, event: &Event<'a>) -> Step<'a> {
    match (stage, event) {
        (None, Event::Command("start")) => Step::Begin,
        (None, _) => Step::Ignore,
        (Some(_), Event::Command("cancel")) => Step::Cancel,
        (Some(_), Event::Command(_)) => Step::Ignore,
        (Some(Stage::ConfirmClean), Event::Button(data)) => match CleanChoice::from_callback(data) {
            Some(choice) => Step::Clean(choice),
            None => Step::Ignore,
        },
        (Some(Stage::ConfirmClean), Event::Text(_)) => Step::Ignore,
        (Some(Stage::AwaitLinks), Event::Text(text)) => Step::Download(*text),
        (Some(Stage::AwaitRenameNumber), Event::Text(text)) => match parse_start_number(text) {
            Some(number) => Step::Rename(number),
            None => Step::RejectNumber,
        },
        (Some(Stage::AwaitLinks | Stage::AwaitRenameNumber), Event::Button(_)) => Step::Ignore,
    }
}

pub(super) fn parse_start_number(text: &str) -> Option<i64> {
    text.trim().parse::<i64>().ok()
}

impl CleanChoice {
    pub(super) fn from_callback(data: &str) -> Option<Self> {
        match data {
            CLEAN_YES => Some(CleanChoice::Yes),
            CLEAN_NO => Some(CleanChoice::No),
            _ => None,
        }
    }
}

impl Session {
    pub(super) fn new(stage: Stage, now: u64, ttl_secs: u64) -> Self {
        Session {
            stage,
            links: ClassifiedLinks::default(),
            downloads: DownloadReport::default(),
            expires_at: session_expiry(now, ttl_secs),
        }
    }

    /// Moves to `stage` and pushes the expiry forward.
    pub(super) fn advance(self, stage: Stage, now: u64, ttl_secs: u64) -> Self {
        Session {
            stage,
            expires_at: session_expiry(now, ttl_secs),
            ..self
        }
    }

    pub(super) fn with_batch(self, links: ClassifiedLinks, downloads: DownloadReport) -> Self {
        Session {
            links,
            downloads,
            ..self
        }
    }

    pub(super) fn is_expired(&self, now: u64) -> bool {
        self.expires_at <= now
    }
}

pub(super) fn session_expiry(now: u64, ttl_secs: u64) -> u64 {
    if ttl_secs == 0 {
        u64::MAX
    } else {
        now.saturating_add(ttl_secs)
    }
}

/// Removes the session for `key` so a handler can work on it without holding
/// the lock. Expired sessions are dropped and reported as absent.
pub(super) async fn take_session(
    state: &std::sync::Arc<AppState>,
    key: SessionKey,
) -> Option<Session> {
    let session = state.sessions.lock().await.remove(&key)?;
    if session.is_expired(now_ts()) {
        info!(
            "Session of user {} in chat {} expired.",
            key.user_id, key.chat_id
        );
        return None;
    }
    Some(session)
}

pub(super) async fn store_session(
    state: &std::sync::Arc<AppState>,
    key: SessionKey,
    session: Session,
) {
    state.sessions.lock().await.insert(key, session);
}

pub(super) fn prune_expired_sessions(sessions: &mut HashMap<SessionKey, Session>, now: u64) -> usize {
    let before = sessions.len();
    sessions.retain(|_, session| !session.is_expired(now));
    before - sessions.len()
}
