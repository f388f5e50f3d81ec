use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use std::time::Instant;

use tokio::sync::Mutex;

use crate::format;
use crate::models::NewReview;
use crate::models::RATING_MAX;
use crate::models::RATING_MIN;
use crate::models::Review;
use crate::models::ReviewPatch;

/// Sessions untouched for this long are dropped on next access.
pub const SESSION_TTL: Duration = Duration::from_secs(15 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowStep {
  Kind,
  Title,
  Body,
  Rating,
  Confirm,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowMode {
  Creating,
  Editing { target_id: i64 },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReviewDraft {
  pub kind: Option<String>,
  pub title: Option<String>,
  pub body: Option<String>,
  pub rating: Option<u8>,
}

impl ReviewDraft {
  pub fn complete(&self, owner: i64) -> Option<NewReview> {
    Some(NewReview {
      owner,
      kind: self.kind.clone()?,
      title: self.title.clone()?,
      body: self.body.clone()?,
      rating: self.rating?,
    })
  }

  /// Fields the user changed relative to the review being edited. Answers
  /// equal to the current value are dropped so the update stays minimal.
  pub fn patch_against(&self, current: &Review) -> ReviewPatch {
    ReviewPatch {
      kind: self.kind.clone().filter(|kind| *kind != current.kind),
      title: self.title.clone().filter(|title| *title != current.title),
      body: self.body.clone().filter(|body| *body != current.body),
      rating: self.rating.filter(|rating| *rating != current.rating),
    }
  }
}

#[derive(Debug, Clone)]
pub struct Session {
  pub mode: FlowMode,
  pub step: FlowStep,
  pub draft: ReviewDraft,
  pub defaults: Option<Review>,
  pub touched: Instant,
}

impl Session {
  pub fn creating() -> Self {
    Self {
      mode: FlowMode::Creating,
      step: FlowStep::Kind,
      draft: ReviewDraft::default(),
      defaults: None,
      touched: Instant::now(),
    }
  }

  pub fn editing(review: Review) -> Self {
    Self {
      mode: FlowMode::Editing { target_id: review.id },
      step: FlowStep::Kind,
      draft: ReviewDraft::default(),
      defaults: Some(review),
      touched: Instant::now(),
    }
  }

  pub fn touch(&mut self) {
    self.touched = Instant::now();
  }

  pub fn expired_at(&self, now: Instant) -> bool {
    now.duration_since(self.touched) >= SESSION_TTL
  }

  pub fn prompt(&self) -> String {
    match &self.mode {
      FlowMode::Creating => match self.step {
        FlowStep::Kind => "🧭 What kind of thing are you reviewing? (movie, tv, book, play, ...)".to_string(),
        FlowStep::Title => "📝 What is the title?".to_string(),
        FlowStep::Body => "🧾 Write your review text:".to_string(),
        FlowStep::Rating => format!("⭐ Rate it from {RATING_MIN} to {RATING_MAX}:"),
        FlowStep::Confirm => self.confirm_prompt(),
      },
      FlowMode::Editing { target_id } => {
        let current = self.defaults.as_ref();
        match self.step {
          FlowStep::Kind => format!(
            "✏️ Editing review #{target_id}.\nKind is '{}'. Send a new kind, or '-' to keep it.",
            current.map(|r| r.kind.as_str()).unwrap_or("?"),
          ),
          FlowStep::Title => format!(
            "Title is '{}'. Send a new title, or '-' to keep it.",
            current.map(|r| r.title.as_str()).unwrap_or("?"),
          ),
          FlowStep::Body => format!(
            "Current text:\n{}\n\nSend new text, or '-' to keep it.",
            current.map(|r| r.body.as_str()).unwrap_or("?"),
          ),
          FlowStep::Rating => format!(
            "Rating is {}. Send a new rating ({RATING_MIN}-{RATING_MAX}), or '-' to keep it.",
            current.map(|r| r.rating).unwrap_or(0),
          ),
          FlowStep::Confirm => self.confirm_prompt(),
        }
      },
    }
  }

  fn confirm_prompt(&self) -> String {
    match &self.mode {
      FlowMode::Creating => {
        let kind = self.draft.kind.as_deref().unwrap_or("?");
        format!(
          "📋 Draft review:\n{} {} — {}\n{}\n\n{}\n\nSave this review? (yes/no)",
          format::kind_emoji(kind),
          kind,
          self.draft.title.as_deref().unwrap_or("?"),
          format::render_rating(self.draft.rating.unwrap_or(0)),
          self.draft.body.as_deref().unwrap_or("?"),
        )
      },
      FlowMode::Editing { target_id } => {
        let mut changes = Vec::new();
        if let Some(current) = &self.defaults {
          let patch = self.draft.patch_against(current);
          if let Some(kind) = &patch.kind {
            changes.push(format!("• kind: {} → {}", current.kind, kind));
          }
          if let Some(title) = &patch.title {
            changes.push(format!("• title: {} → {}", current.title, title));
          }
          if patch.body.is_some() {
            changes.push("• text: replaced".to_string());
          }
          if let Some(rating) = patch.rating {
            changes.push(format!("• rating: {} → {}", current.rating, rating));
          }
        }
        if changes.is_empty() {
          format!("📋 No fields changed for review #{target_id}.\n\nAnswer yes to finish without changes, or cancel.")
        } else {
          format!(
            "📋 Changes to review #{target_id}:\n{}\n\nApply these changes? (yes/no)",
            changes.join("\n"),
          )
        }
      },
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
  /// Input accepted, session moved to the next step.
  Advanced,
  /// Input invalid for the current step; the step did not change.
  Rejected(String),
  /// Affirmative answer at the Confirm step.
  Confirmed,
  /// Negative or cancel answer; the draft is to be discarded.
  Discarded,
}

/// Applies a plain-text answer to the session's current step. Pure over the
/// session; store calls and replies are the dispatcher's job.
pub fn apply_answer(session: &mut Session, input: &str) -> StepOutcome {
  let input = input.trim();
  if input.eq_ignore_ascii_case("cancel") {
    return StepOutcome::Discarded;
  }

  let skip = matches!(session.mode, FlowMode::Editing { .. }) && input == "-";
  match session.step {
    FlowStep::Kind => {
      if !skip {
        if input.is_empty() {
          return StepOutcome::Rejected("Please send a kind, e.g. movie or book.".to_string());
        }
        session.draft.kind = Some(input.to_ascii_lowercase());
      }
      session.step = FlowStep::Title;
      StepOutcome::Advanced
    },
    FlowStep::Title => {
      if !skip {
        if input.is_empty() {
          return StepOutcome::Rejected("Please send a non-empty title.".to_string());
        }
        session.draft.title = Some(input.to_string());
      }
      session.step = FlowStep::Body;
      StepOutcome::Advanced
    },
    FlowStep::Body => {
      if !skip {
        if input.is_empty() {
          return StepOutcome::Rejected("Please send some review text.".to_string());
        }
        session.draft.body = Some(input.to_string());
      }
      session.step = FlowStep::Rating;
      StepOutcome::Advanced
    },
    FlowStep::Rating => {
      if !skip {
        match input.parse::<u8>() {
          Ok(rating) if (RATING_MIN..=RATING_MAX).contains(&rating) => {
            session.draft.rating = Some(rating);
          },
          _ => {
            return StepOutcome::Rejected(format!(
              "Rating must be a whole number between {RATING_MIN} and {RATING_MAX}.",
            ));
          },
        }
      }
      session.step = FlowStep::Confirm;
      StepOutcome::Advanced
    },
    FlowStep::Confirm => match input.to_ascii_lowercase().as_str() {
      "yes" | "y" => StepOutcome::Confirmed,
      "no" | "n" => StepOutcome::Discarded,
      _ => StepOutcome::Rejected("Answer yes, no, or cancel.".to_string()),
    },
  }
}

/// Per-user session slots. The outer lock is held only to fetch the slot;
/// holding a slot's lock across a whole message serializes that user while
/// other users proceed in parallel.
#[derive(Default)]
pub struct SessionStore {
  inner: Mutex<HashMap<i64, SessionSlot>>,
}

pub type SessionSlot = Arc<Mutex<Option<Session>>>;

impl SessionStore {
  /// Idle slots (no session, no in-flight handler) are pruned on every fetch
  /// so the map stays bounded by users with active flows.
  pub async fn slot(&self, user_id: i64) -> SessionSlot {
    let mut slots = self.inner.lock().await;
    slots.retain(|_, slot| {
      Arc::strong_count(slot) > 1 || slot.try_lock().map(|session| session.is_some()).unwrap_or(true)
    });
    slots.entry(user_id).or_default().clone()
  }

  #[cfg(test)]
  async fn len(&self) -> usize {
    self.inner.lock().await.len()
  }
}

#[cfg(test)]
mod tests {
  use std::time::Duration;
  use std::time::Instant;

  use super::FlowStep;
  use super::SESSION_TTL;
  use super::Session;
  use super::SessionStore;
  use super::StepOutcome;
  use super::apply_answer;
  use crate::models::Review;

  fn existing_review() -> Review {
    Review {
      id: 42,
      kind: "movie".to_string(),
      title: "Dune".to_string(),
      body: "great".to_string(),
      rating: 9,
      image_ref: None,
      owner: Some(7),
    }
  }

  #[test]
  fn creation_flow_collects_all_fields() {
    let mut session = Session::creating();
    assert_eq!(apply_answer(&mut session, "Movie"), StepOutcome::Advanced);
    assert_eq!(apply_answer(&mut session, "Dune"), StepOutcome::Advanced);
    assert_eq!(apply_answer(&mut session, "great"), StepOutcome::Advanced);
    assert_eq!(apply_answer(&mut session, "9"), StepOutcome::Advanced);
    assert_eq!(session.step, FlowStep::Confirm);

    let review = session.draft.complete(7).unwrap();
    assert_eq!(review.kind, "movie");
    assert_eq!(review.title, "Dune");
    assert_eq!(review.body, "great");
    assert_eq!(review.rating, 9);
    assert_eq!(review.owner, 7);

    assert_eq!(apply_answer(&mut session, "yes"), StepOutcome::Confirmed);
  }

  #[test]
  fn invalid_rating_does_not_advance() {
    let mut session = Session::creating();
    apply_answer(&mut session, "movie");
    apply_answer(&mut session, "Dune");
    apply_answer(&mut session, "great");

    let before = session.draft.clone();
    let outcome = apply_answer(&mut session, "eleven");
    assert!(matches!(outcome, StepOutcome::Rejected(_)));
    assert_eq!(session.step, FlowStep::Rating);
    assert_eq!(session.draft, before);

    let outcome = apply_answer(&mut session, "11");
    assert!(matches!(outcome, StepOutcome::Rejected(_)));
    assert_eq!(session.step, FlowStep::Rating);
  }

  #[test]
  fn empty_title_reprompts() {
    let mut session = Session::creating();
    apply_answer(&mut session, "movie");
    let outcome = apply_answer(&mut session, "   ");
    assert!(matches!(outcome, StepOutcome::Rejected(_)));
    assert_eq!(session.step, FlowStep::Title);
  }

  #[test]
  fn cancel_discards_at_any_step() {
    let mut session = Session::creating();
    assert_eq!(apply_answer(&mut session, "cancel"), StepOutcome::Discarded);

    let mut session = Session::creating();
    apply_answer(&mut session, "movie");
    apply_answer(&mut session, "Dune");
    assert_eq!(apply_answer(&mut session, "CANCEL"), StepOutcome::Discarded);
  }

  #[test]
  fn confirm_accepts_only_yes_no_cancel() {
    let mut session = Session::creating();
    apply_answer(&mut session, "movie");
    apply_answer(&mut session, "Dune");
    apply_answer(&mut session, "great");
    apply_answer(&mut session, "9");

    assert!(matches!(apply_answer(&mut session, "maybe"), StepOutcome::Rejected(_)));
    assert_eq!(session.step, FlowStep::Confirm);
    assert_eq!(apply_answer(&mut session, "no"), StepOutcome::Discarded);
  }

  #[test]
  fn edit_skip_keeps_fields_out_of_the_patch() {
    let mut session = Session::editing(existing_review());
    apply_answer(&mut session, "-");
    apply_answer(&mut session, "-");
    apply_answer(&mut session, "-");
    apply_answer(&mut session, "7");
    assert_eq!(session.step, FlowStep::Confirm);

    let patch = session.draft.patch_against(&existing_review());
    assert_eq!(patch.kind, None);
    assert_eq!(patch.title, None);
    assert_eq!(patch.body, None);
    assert_eq!(patch.rating, Some(7));
  }

  #[test]
  fn edit_answer_equal_to_current_value_is_not_a_change() {
    let mut session = Session::editing(existing_review());
    apply_answer(&mut session, "movie");
    apply_answer(&mut session, "-");
    apply_answer(&mut session, "-");
    apply_answer(&mut session, "9");

    let patch = session.draft.patch_against(&existing_review());
    assert!(patch.is_empty());
  }

  #[test]
  fn dash_is_a_literal_answer_outside_edit_mode() {
    let mut session = Session::creating();
    apply_answer(&mut session, "-");
    assert_eq!(session.draft.kind.as_deref(), Some("-"));
  }

  #[tokio::test]
  async fn idle_slots_are_pruned_on_access() {
    let store = SessionStore::default();
    for user_id in 0..100 {
      store.slot(user_id).await;
    }
    // every slot above is idle and unreferenced by now
    store.slot(100).await;
    assert_eq!(store.len().await, 1);
  }

  #[tokio::test]
  async fn slots_with_an_active_session_survive_pruning() {
    let store = SessionStore::default();
    {
      let slot = store.slot(1).await;
      *slot.lock().await = Some(Session::creating());
    }
    store.slot(2).await;
    let slot = store.slot(1).await;
    assert!(slot.lock().await.is_some());
  }

  #[test]
  fn session_expires_after_ttl() {
    let session = Session::creating();
    let later = session.touched + SESSION_TTL + Duration::from_secs(1);
    assert!(session.expired_at(later));
    assert!(!session.expired_at(Instant::now()));
  }
}
