use std::sync::Arc;

use anyhow::Result;
use teloxide::dispatching::UpdateHandler;
use teloxide::dptree;
use teloxide::prelude::*;
use teloxide::types::ChatId;
use teloxide::types::FileId;
use teloxide::types::Message;
use tracing::info;
use tracing::instrument;
use tracing::warn;

use crate::api::HttpReviewStore;
use crate::bot::HandlerResult;
use crate::bot::anchors::AnchorKey;
use crate::bot::dispatch::Reply;
use crate::bot::dispatch::ReviewDispatcher;
use crate::models::ImageUpload;

type SharedCore = Arc<ReviewDispatcher<HttpReviewStore>>;

pub fn build_schema() -> UpdateHandler<anyhow::Error> {
  dptree::entry().branch(Update::filter_message().endpoint(handle_update))
}

#[instrument(skip(bot, core, msg))]
async fn handle_update(bot: Bot, core: SharedCore, msg: Message) -> HandlerResult {
  let Some(user) = msg.from.as_ref() else {
    return Ok(());
  };
  let user_id = user.id.0 as i64;

  if let Some(photos) = msg.photo() {
    let Some(largest) = photos.last() else {
      return Ok(());
    };
    let reply = match msg.reply_to_message() {
      Some(replied) => {
        let key = AnchorKey {
          chat_id: msg.chat.id.0,
          message_id: replied.id.0,
        };
        match download_photo(&bot, largest.file.id.clone(), msg.id.0).await {
          Ok(image) => core.handle_photo_reply(user_id, key, image).await,
          Err(err) => {
            warn!(user_id, error = %err, "photo download failed");
            Reply::text("⚠️ I could not download that photo, please send it again.")
          },
        }
      },
      None => Reply::text("❓ To attach a photo, send it as a reply to a review message I sent."),
    };
    return send_reply(&bot, &core, msg.chat.id, reply).await;
  }

  if let Some(text) = msg.text() {
    if let Some(reply) = core.handle_message(user_id, text).await {
      return send_reply(&bot, &core, msg.chat.id, reply).await;
    }
  }
  Ok(())
}

async fn send_reply(bot: &Bot, core: &SharedCore, chat: ChatId, reply: Reply) -> HandlerResult {
  let sent = bot.send_message(chat, reply.text).await?;
  if let Some(review_id) = reply.anchor {
    let key = AnchorKey {
      chat_id: chat.0,
      message_id: sent.id.0,
    };
    core.record_anchor(key, review_id);
    info!(review_id, chat_id = %chat, message_id = sent.id.0, "recorded reply anchor");
  }
  Ok(())
}

/// Fetches the photo bytes through the Bot API file endpoint.
async fn download_photo(bot: &Bot, file_id: FileId, message_id: i32) -> Result<ImageUpload> {
  let file = bot.get_file(file_id).await?;
  let url = format!("https://api.telegram.org/file/bot{}/{}", bot.token(), file.path);
  let response = reqwest::get(&url).await?.error_for_status()?;
  let data = response.bytes().await?.to_vec();
  Ok(ImageUpload {
    data,
    filename: format!("photo_{message_id}.jpg"),
  })
}
