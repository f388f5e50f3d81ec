use crate::models::RATING_MAX;
use crate::models::Review;

pub const WELCOME_TEXT: &str = "👋 Welcome to the Reviews Bot!\n\nThis bot keeps reviews of movies, TV shows, books, and plays.\n\n• /review_new starts a guided review\n• /reviews browses existing reviews\n• /help lists every command\n\nHappy reviewing! 🌟";

pub const HELP_TEXT: &str = "📝 Reviews Bot commands:\n\n/review_new — create a review step by step\n/reviews [kind] [min_rating=N] — list reviews, e.g. /reviews movie min_rating=8\n/review <id> — view one review\n/review_edit <id> — edit your review\n/review_delete <id> — delete your review\n/cancel — abandon the current guided flow\n\n📷 Reply to a review message from me with a photo to attach an image to that review.";

pub fn kind_emoji(kind: &str) -> &'static str {
  match kind {
    "movie" => "🎬",
    "tv" => "📺",
    "book" => "📖",
    "play" => "🎭",
    _ => "📝",
  }
}

pub fn render_rating(rating: u8) -> String {
  let filled = rating.min(5) as usize;
  let extra = rating.saturating_sub(5) as usize;
  format!("{}{} {rating}/{RATING_MAX}", "⭐".repeat(filled), "🌟".repeat(extra))
}

pub fn render_summary(review: &Review) -> String {
  format!(
    "#{} {} {} — {}\n{}",
    review.id,
    kind_emoji(&review.kind),
    review.kind,
    review.title,
    render_rating(review.rating),
  )
}

pub fn render_list(reviews: &[Review]) -> String {
  let mut text = String::from("📝 Reviews:");
  for review in reviews {
    text.push_str("\n\n");
    text.push_str(&render_summary(review));
  }
  text
}

pub fn render_detail(review: &Review) -> String {
  let mut text = format!(
    "Review #{}\n{} {} — {}\n{}\n\n{}",
    review.id,
    kind_emoji(&review.kind),
    review.kind,
    review.title,
    render_rating(review.rating),
    review.body,
  );
  if review.image_ref.is_some() {
    text.push_str("\n\n🖼️ Has an image attached");
  }
  text
}

pub fn render_created(review: &Review) -> String {
  format!(
    "✅ Review #{} created: {}\n\nUse /review {} to view it, or reply to this message with a photo to attach an image.",
    review.id, review.title, review.id,
  )
}

pub fn render_updated(review: &Review) -> String {
  format!("✅ Review #{} updated.\n\nUse /review {} to view it.", review.id, review.id)
}

pub fn render_deleted(review_id: i64) -> String {
  format!("🗑️ Review #{review_id} deleted.")
}

#[cfg(test)]
mod tests {
  use super::render_detail;
  use super::render_rating;
  use super::render_summary;
  use crate::models::Review;

  fn sample() -> Review {
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
  fn rating_renders_stars_and_scale() {
    assert_eq!(render_rating(3), "⭐⭐⭐ 3/10");
    assert_eq!(render_rating(9), "⭐⭐⭐⭐⭐🌟🌟🌟🌟 9/10");
  }

  #[test]
  fn summary_names_id_kind_and_title() {
    let text = render_summary(&sample());
    assert!(text.contains("#42"));
    assert!(text.contains("movie"));
    assert!(text.contains("Dune"));
  }

  #[test]
  fn detail_mentions_image_only_when_present() {
    let mut review = sample();
    assert!(!render_detail(&review).contains("image"));
    review.image_ref = Some("/uploads/reviews/42.jpg".to_string());
    assert!(render_detail(&review).contains("image"));
  }
}
