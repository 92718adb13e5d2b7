use super::*;

pub(super) async fn handle_callback(
    bot: Bot,
    q: CallbackQuery,
    state: std::sync::Arc<AppState>,
) -> Result<()> {
    let user_id = q.from.id.0;
    if !is_allowed_user(&state.config, user_id) {
        return Ok(());
    }

    let Some(message) = q.message.clone() else {
        bot.answer_callback_query(q.id).await?;
        return Ok(());
    };
    let data = q.data.clone().unwrap_or_default();
    bot.answer_callback_query(q.id).await?;

    let key = SessionKey {
        chat_id: message.chat.id.0,
        user_id,
    };
    let session = take_session(&state, key).await;
    let event = Event::Button(&data);

    match (next_step(session.as_ref().map(|s| s.stage), &event), session) {
        (Step::Clean(choice), Some(session)) => {
            handle_clean_choice(&bot, message.chat.id, message.id, &state, key, session, choice)
                .await?;
        }
        (_, Some(session)) => {
            store_session(&state, key, session).await;
        }
        (_, None) => {}
    }

    Ok(())
}

/// The session is back in the map before the prompt is edited, so a failed
/// edit leaves the conversation waiting for links.
pub(super) async fn handle_clean_choice(
    bot: &Bot,
    chat_id: ChatId,
    prompt_id: MessageId,
    state: &std::sync::Arc<AppState>,
    key: SessionKey,
    session: Session,
    choice: CleanChoice,
) -> Result<()> {
    let download_dir = &state.config.download_dir;
    let text = match apply_clean_choice(download_dir, choice) {
        Ok(text) => text,
        Err(err) => {
            store_session(state, key, session).await;
            return Err(err);
        }
    };
    if choice == CleanChoice::Yes {
        info!("User {} cleaned {}.", key.user_id, download_dir.display());
    }

    let session = session.advance(Stage::AwaitLinks, now_ts(), state.config.session_ttl_secs);
    store_session(state, key, session).await;
    bot.edit_message_text(chat_id, prompt_id, text).await?;
    Ok(())
}
