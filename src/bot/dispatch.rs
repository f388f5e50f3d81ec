use std::time::Instant;

use thiserror::Error;
use tracing::info;
use tracing::instrument;
use tracing::warn;

use crate::api::ApiError;
use crate::api::ReviewStore;
use crate::bot::anchors::AnchorKey;
use crate::bot::anchors::AnchorStore;
use crate::bot::parser::ArgValue;
use crate::bot::parser::ParsedCommand;
use crate::bot::parser::parse_command;
use crate::bot::session::FlowMode;
use crate::bot::session::Session;
use crate::bot::session::SessionStore;
use crate::bot::session::StepOutcome;
use crate::bot::session::apply_answer;
use crate::format;
use crate::models::ImageUpload;
use crate::models::RATING_MAX;
use crate::models::RATING_MIN;
use crate::models::ReviewFilter;
use crate::ratelimit::RateLimiter;

/// One outbound reply. When `anchor` is set, the transport records the sent
/// message against that review id so later photo replies can be correlated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
  pub text: String,
  pub anchor: Option<i64>,
}

impl Reply {
  pub fn text(text: impl Into<String>) -> Self {
    Self {
      text: text.into(),
      anchor: None,
    }
  }

  pub fn anchored(text: impl Into<String>, review_id: i64) -> Self {
    Self {
      text: text.into(),
      anchor: Some(review_id),
    }
  }
}

#[derive(Debug, Error)]
pub enum BotError {
  #[error("invalid argument: {0}")]
  Parse(String),
  #[error("validation failed: {0}")]
  Validation(String),
  #[error("review not found")]
  NotFound,
  #[error("actor does not own the review")]
  Authorization,
  #[error("reply anchor unresolved")]
  NoMatchingAttachment,
  #[error(transparent)]
  Upstream(ApiError),
}

impl From<ApiError> for BotError {
  fn from(err: ApiError) -> Self {
    match err {
      ApiError::NotFound => Self::NotFound,
      ApiError::Validation(detail) => Self::Validation(detail),
      other => Self::Upstream(other),
    }
  }
}

impl BotError {
  pub fn user_message(&self) -> String {
    match self {
      Self::Parse(detail) => format!("⚠️ {detail}"),
      Self::Validation(detail) => format!("⚠️ {detail}"),
      Self::NotFound => "❓ Review not found.".to_string(),
      Self::Authorization => "🚫 You can only change your own reviews.".to_string(),
      Self::NoMatchingAttachment => {
        "❓ That message does not reference a review. Reply to a review message I sent.".to_string()
      },
      Self::Upstream(_) => "⚠️ The review store is unavailable right now, try again later.".to_string(),
    }
  }
}

/// Routes every inbound message to the guided flow, a direct store call, or a
/// help reply. Owns the per-user sessions and the reply anchors; the store is
/// injected so tests can observe the emitted calls.
pub struct ReviewDispatcher<S> {
  store: S,
  sessions: SessionStore,
  anchors: AnchorStore,
  limiter: RateLimiter,
}

impl<S: ReviewStore> ReviewDispatcher<S> {
  pub fn new(store: S) -> Self {
    Self::with_limiter(store, RateLimiter::default())
  }

  pub fn with_limiter(store: S, limiter: RateLimiter) -> Self {
    Self {
      store,
      sessions: SessionStore::default(),
      anchors: AnchorStore::default(),
      limiter,
    }
  }

  pub fn store(&self) -> &S {
    &self.store
  }

  pub fn record_anchor(&self, key: AnchorKey, review_id: i64) {
    self.anchors.record(key, review_id);
  }

  /// Entry point for text messages. Holding the user's session slot for the
  /// whole call keeps one user's messages in arrival order while other users
  /// proceed in parallel.
  #[instrument(skip(self, text))]
  pub async fn handle_message(&self, user_id: i64, text: &str) -> Option<Reply> {
    self.handle_message_at(user_id, text, Instant::now()).await
  }

  async fn handle_message_at(&self, user_id: i64, text: &str, now: Instant) -> Option<Reply> {
    let slot = self.sessions.slot(user_id).await;
    let mut slot = slot.lock().await;
    if slot.as_ref().is_some_and(|session| session.expired_at(now)) {
      info!(user_id, "dropping expired session");
      *slot = None;
    }

    match parse_command(text) {
      Some(command) => {
        if needs_rate_limit(&command.name) {
          if let Err(retry_after) = self.limiter.check(user_id) {
            return Some(Reply::text(format!(
              "⏳ Too many requests. Try again in {}s.",
              retry_after.as_secs().max(1),
            )));
          }
        }
        Some(self.handle_command(user_id, &mut slot, command).await)
      },
      None => match slot.take() {
        Some(session) => Some(self.handle_answer(user_id, &mut slot, session, text).await),
        None => {
          info!(user_id, "ignoring non-command message with no active session");
          None
        },
      },
    }
  }

  /// Entry point for photo replies. Resolves the replied-to message through
  /// the anchor map and uploads the image to that review.
  #[instrument(skip(self, image))]
  pub async fn handle_photo_reply(&self, user_id: i64, reply_to: AnchorKey, image: ImageUpload) -> Reply {
    // same-user ordering also applies to photo messages
    let slot = self.sessions.slot(user_id).await;
    let _ordering = slot.lock().await;

    if let Err(retry_after) = self.limiter.check(user_id) {
      return Reply::text(format!(
        "⏳ Too many requests. Try again in {}s.",
        retry_after.as_secs().max(1),
      ));
    }

    match self.attach(user_id, reply_to, image).await {
      Ok(reply) => reply,
      Err(err) => {
        warn!(user_id, error = %err, "photo reply failed");
        Reply::text(err.user_message())
      },
    }
  }

  async fn attach(&self, user_id: i64, reply_to: AnchorKey, image: ImageUpload) -> Result<Reply, BotError> {
    let review_id = self.anchors.resolve(reply_to).ok_or(BotError::NoMatchingAttachment)?;
    let review = self.store.get(review_id).await?;
    if review.owner != Some(user_id) {
      return Err(BotError::Authorization);
    }
    let updated = self.store.attach_image(review_id, user_id, image).await?;
    info!(user_id, review_id, "image attached");
    Ok(Reply::anchored(
      format!("🖼️ Image attached.\n\n{}", format::render_updated(&updated)),
      updated.id,
    ))
  }

  async fn handle_command(&self, user_id: i64, slot: &mut Option<Session>, command: ParsedCommand) -> Reply {
    info!(user_id, command = %command.name, "dispatching command");
    let result = match command.name.as_str() {
      "start" => Ok(Reply::text(format::WELCOME_TEXT)),
      "help" => Ok(Reply::text(format::HELP_TEXT)),
      "cancel" => Ok(cancel_session(slot)),
      "reviews" => self.list_reviews(&command).await,
      "review" => self.show_review(&command).await,
      "review_new" => Ok(start_creation(slot)),
      "review_edit" => self.start_edit(user_id, slot, &command).await,
      "review_delete" => self.delete_review(user_id, &command).await,
      _ => Ok(Reply::text(format!(
        "🤔 Unknown command /{}. Use /help to see what I understand.",
        command.name,
      ))),
    };

    match result {
      Ok(reply) => reply,
      Err(err) => {
        match &err {
          BotError::Upstream(cause) => warn!(user_id, error = %cause, "store call failed"),
          other => info!(user_id, error = %other, "command rejected"),
        }
        Reply::text(err.user_message())
      },
    }
  }

  async fn handle_answer(&self, user_id: i64, slot: &mut Option<Session>, mut session: Session, text: &str) -> Reply {
    match apply_answer(&mut session, text) {
      StepOutcome::Rejected(message) => {
        session.touch();
        *slot = Some(session);
        Reply::text(message)
      },
      StepOutcome::Advanced => {
        session.touch();
        let prompt = session.prompt();
        *slot = Some(session);
        Reply::text(prompt)
      },
      StepOutcome::Discarded => {
        info!(user_id, "guided flow cancelled");
        Reply::text("❌ Cancelled. Nothing was saved.")
      },
      StepOutcome::Confirmed => match self.finish_flow(user_id, &session).await {
        Ok(reply) => reply,
        Err(err) => {
          // leave the session at Confirm so the user can retry or cancel
          match &err {
            BotError::Upstream(cause) => warn!(user_id, error = %cause, "store call failed at confirm"),
            other => info!(user_id, error = %other, "confirm rejected"),
          }
          session.touch();
          *slot = Some(session);
          Reply::text(format!(
            "{}\nAnswer yes to retry, or cancel to discard the draft.",
            err.user_message(),
          ))
        },
      },
    }
  }

  async fn finish_flow(&self, user_id: i64, session: &Session) -> Result<Reply, BotError> {
    match &session.mode {
      FlowMode::Creating => {
        let review = session
          .draft
          .complete(user_id)
          .ok_or_else(|| BotError::Validation("the draft is missing a field".to_string()))?;
        let created = self.store.create(&review).await?;
        info!(user_id, review_id = created.id, "review created");
        Ok(Reply::anchored(format::render_created(&created), created.id))
      },
      FlowMode::Editing { target_id } => {
        let current = session
          .defaults
          .as_ref()
          .ok_or_else(|| BotError::Validation("the edit session lost its review".to_string()))?;
        let patch = session.draft.patch_against(current);
        if patch.is_empty() {
          info!(user_id, review_id = target_id, "edit finished with no changes");
          return Ok(Reply::text("Nothing changed."));
        }
        let updated = self.store.update(*target_id, user_id, &patch).await?;
        info!(user_id, review_id = updated.id, "review updated");
        Ok(Reply::anchored(format::render_updated(&updated), updated.id))
      },
    }
  }

  async fn list_reviews(&self, command: &ParsedCommand) -> Result<Reply, BotError> {
    let kind = command.positional.first().map(|kind| kind.to_ascii_lowercase());
    let min_rating = match command.keyword.get("min_rating") {
      None => None,
      Some(ArgValue::Int(value)) if (RATING_MIN as i64..=RATING_MAX as i64).contains(value) => Some(*value as u8),
      Some(_) => {
        return Err(BotError::Parse(format!(
          "min_rating must be a whole number between {RATING_MIN} and {RATING_MAX}",
        )));
      },
    };

    let filter = ReviewFilter { kind, min_rating };
    let reviews = self.store.list(&filter).await?;
    if reviews.is_empty() {
      return Ok(Reply::text("📭 No reviews found."));
    }
    Ok(Reply::text(format::render_list(&reviews)))
  }

  async fn show_review(&self, command: &ParsedCommand) -> Result<Reply, BotError> {
    let review_id = parse_id_arg(command, "/review")?;
    let review = self.store.get(review_id).await?;
    Ok(Reply::anchored(format::render_detail(&review), review.id))
  }

  async fn start_edit(&self, user_id: i64, slot: &mut Option<Session>, command: &ParsedCommand) -> Result<Reply, BotError> {
    let review_id = parse_id_arg(command, "/review_edit")?;
    let review = self.store.get(review_id).await?;
    if review.owner != Some(user_id) {
      return Err(BotError::Authorization);
    }
    let session = Session::editing(review);
    let prompt = with_replace_note(slot.replace(session).is_some(), session_prompt(slot));
    Ok(Reply::text(prompt))
  }

  async fn delete_review(&self, user_id: i64, command: &ParsedCommand) -> Result<Reply, BotError> {
    let review_id = parse_id_arg(command, "/review_delete")?;
    let review = self.store.get(review_id).await?;
    if review.owner != Some(user_id) {
      return Err(BotError::Authorization);
    }
    self.store.delete(review_id, user_id).await?;
    info!(user_id, review_id, "review deleted");
    Ok(Reply::text(format::render_deleted(review_id)))
  }
}

fn start_creation(slot: &mut Option<Session>) -> Reply {
  let replaced = slot.replace(Session::creating()).is_some();
  Reply::text(with_replace_note(replaced, session_prompt(slot)))
}

fn session_prompt(slot: &Option<Session>) -> String {
  slot.as_ref().map(Session::prompt).unwrap_or_default()
}

fn with_replace_note(replaced: bool, prompt: String) -> String {
  if replaced {
    format!("♻️ Previous draft discarded.\n{prompt}")
  } else {
    prompt
  }
}

// /start, /help and /cancel touch only local state, never the store
fn needs_rate_limit(name: &str) -> bool {
  !matches!(name, "start" | "help" | "cancel")
}

fn cancel_session(slot: &mut Option<Session>) -> Reply {
  match slot.take() {
    Some(_) => Reply::text("❌ Cancelled. Nothing was saved."),
    None => Reply::text("Nothing to cancel."),
  }
}

fn parse_id_arg(command: &ParsedCommand, usage: &str) -> Result<i64, BotError> {
  command
    .positional
    .first()
    .and_then(|raw| raw.parse::<i64>().ok())
    .ok_or_else(|| BotError::Parse(format!("usage: {usage} <id>")))
}
