mod api;
mod app;
mod bot;
mod config;
mod format;
mod models;
mod ratelimit;
mod telemetry;

use anyhow::Result;
use teloxide::prelude::Bot;
use tracing::info;
use tracing::warn;

#[tokio::main]
async fn main() -> Result<()> {
  telemetry::init()?;
  let config = config::Config::from_env()?;
  info!(api_base_url = %config.api_base_url, "starting bot");

  let store = api::HttpReviewStore::new(&config.api_base_url, config.request_timeout)?;
  if !store.health().await {
    warn!(api_base_url = %config.api_base_url, "review store did not answer its health probe");
  }

  let bot = Bot::new(config.bot_token.clone());
  let app = app::App::new(bot, store);
  app.run().await
}
