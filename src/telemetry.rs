use anyhow::Result;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;

/// Crate logs at debug, dependencies (teloxide, reqwest, hyper) at info.
const DEFAULT_FILTER: &str = "reviews_bot=debug,info";

pub fn init() -> Result<()> {
  let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
  fmt().with_env_filter(env_filter).with_target(true).init();
  Ok(())
}

#[cfg(test)]
mod tests {
  use tracing_subscriber::EnvFilter;

  use super::DEFAULT_FILTER;

  #[test]
  fn default_filter_scopes_crate_logs() {
    let filter = EnvFilter::new(DEFAULT_FILTER);
    assert!(filter.to_string().contains("reviews_bot"));
  }
}
