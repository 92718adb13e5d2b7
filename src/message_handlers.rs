use super::*;

pub(super) async fn handle_message(bot: Bot, msg: Message, state: std::sync::Arc<AppState>) -> Result<()> {
    let user_id = match msg.from() {
        Some(user) => user.id.0,
        None => return Ok(()),
    };

    if !is_allowed_user(&state.config, user_id) {
        return Ok(());
    }

    let text = match msg.text() {
        Some(text) => text.to_string(),
        None => return Ok(()),
    };

    let key = SessionKey {
        chat_id: msg.chat.id.0,
        user_id,
    };
    let session = take_session(&state, key).await;
    let event = match parse_command(&text) {
        Some(cmd) => Event::Command(cmd),
        None => Event::Text(&text),
    };

    match (next_step(session.as_ref().map(|s| s.stage), &event), session) {
        (Step::Begin, _) => {
            start_session(&bot, msg.chat.id, &state, key).await?;
        }
        (Step::Cancel, Some(_)) => {
            info!("User {} canceled the operation.", user_id);
            bot.send_message(msg.chat.id, CANCELED_TEXT).await?;
        }
        (Step::Download(links_text), Some(session)) => {
            handle_links_message(&bot, msg.chat.id, &state, key, session, links_text).await?;
        }
        (Step::Rename(start), Some(session)) => {
            handle_rename_number(&bot, msg.chat.id, &state, session, start).await?;
        }
        (Step::RejectNumber, Some(session)) => {
            reject_start_number(&bot, msg.chat.id, &state, key, session).await?;
        }
        (_, Some(session)) => {
            store_session(&state, key, session).await;
        }
        (_, None) => {}
    }

    Ok(())
}

async fn start_session(
    bot: &Bot,
    chat_id: ChatId,
    state: &std::sync::Arc<AppState>,
    key: SessionKey,
) -> Result<()> {
    let download_dir = &state.config.download_dir;
    let stage = if dir_has_entries(download_dir)? {
        Stage::ConfirmClean
    } else {
        ensure_download_dir(download_dir)?;
        Stage::AwaitLinks
    };

    info!("User {} started a download session.", key.user_id);
    let session = Session::new(stage, now_ts(), state.config.session_ttl_secs);
    store_session(state, key, session).await;

    match stage {
        Stage::ConfirmClean => {
            bot.send_message(chat_id, CLEAN_PROMPT_TEXT)
                .reply_markup(build_clean_keyboard())
                .await?;
        }
        _ => {
            bot.send_message(chat_id, LINKS_PROMPT_TEXT).await?;
        }
    }
    Ok(())
}

/// Puts the untouched session back if the batch never ran, and the
/// downloaded batch before any summary goes out.
pub(super) async fn handle_links_message(
    bot: &Bot,
    chat_id: ChatId,
    state: &std::sync::Arc<AppState>,
    key: SessionKey,
    session: Session,
    text: &str,
) -> Result<()> {
    let links = classify_links(text);
    let report = match announce_and_download(bot, chat_id, state, &links).await {
        Ok(report) => report,
        Err(err) => {
            store_session(state, key, session).await;
            return Err(err);
        }
    };

    let summary = build_download_summary(&report);
    let session = session.with_batch(links, report).advance(
        Stage::AwaitRenameNumber,
        now_ts(),
        state.config.session_ttl_secs,
    );
    store_session(state, key, session).await;

    bot.send_message(chat_id, summary).await?;
    bot.send_message(chat_id, RENAME_PROMPT_TEXT).await?;
    Ok(())
}

async fn announce_and_download(
    bot: &Bot,
    chat_id: ChatId,
    state: &std::sync::Arc<AppState>,
    links: &ClassifiedLinks,
) -> Result<DownloadReport> {
    bot.send_message(chat_id, DOWNLOADING_TEXT).await?;
    download_links(state, links.unique.clone()).await
}

pub(super) async fn reject_start_number(
    bot: &Bot,
    chat_id: ChatId,
    state: &std::sync::Arc<AppState>,
    key: SessionKey,
    session: Session,
) -> Result<()> {
    store_session(state, key, session).await;
    bot.send_message(chat_id, INVALID_NUMBER_TEXT).await?;
    Ok(())
}

/// Renames the batch and ends the session, whether or not every rename
/// went through.
pub(super) async fn handle_rename_number(
    bot: &Bot,
    chat_id: ChatId,
    state: &std::sync::Arc<AppState>,
    session: Session,
    start: i64,
) -> Result<()> {
    let plan = plan_renames(start, &session.links, &session.downloads);
    let text = match apply_renames(&state.config.download_dir, &plan) {
        RenameOutcome::Completed { .. } => build_rename_summary(&session.links.skipped),
        RenameOutcome::Aborted {
            renamed,
            file,
            error,
        } => build_rename_abort_text(renamed, plan.len(), &file, &error),
    };
    bot.send_message(chat_id, text).await?;
    Ok(())
}
