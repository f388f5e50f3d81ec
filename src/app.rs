use std::sync::Arc;

use teloxide::dispatching::UpdateHandler;
use teloxide::dptree;
use teloxide::prelude::*;

use crate::api::HttpReviewStore;
use crate::bot;
use crate::bot::ReviewDispatcher;

pub struct App {
  bot: Bot,
  core: Arc<ReviewDispatcher<HttpReviewStore>>,
  handler: UpdateHandler<anyhow::Error>,
}

impl App {
  pub fn new(bot: Bot, store: HttpReviewStore) -> Self {
    let core = Arc::new(ReviewDispatcher::new(store));
    let handler = bot::build_schema();
    Self { bot, core, handler }
  }

  pub async fn run(self) -> anyhow::Result<()> {
    Dispatcher::builder(self.bot, self.handler)
      .dependencies(dptree::deps![self.core])
      .enable_ctrlc_handler()
      .build()
      .dispatch()
      .await;

    Ok(())
  }
}
