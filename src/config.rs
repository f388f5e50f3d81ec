use std::env;
use std::time::Duration;

use anyhow::Context;
use anyhow::Result;

const DEFAULT_API_BASE_URL: &str = "http://localhost:8000";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone)]
pub struct Config {
  pub bot_token: String,
  pub api_base_url: String,
  pub request_timeout: Duration,
}

impl Config {
  pub fn from_env() -> Result<Self> {
    let bot_token = env::var("BOT_TOKEN")
      .or_else(|_| env::var("TELOXIDE_TOKEN"))
      .context("BOT_TOKEN or TELOXIDE_TOKEN must be set")?;
    let api_base_url = env::var("API_BASE_URL").unwrap_or_else(|_| DEFAULT_API_BASE_URL.to_string());
    let request_timeout = match env::var("REQUEST_TIMEOUT_SECS") {
      Ok(raw) => parse_timeout(&raw)?,
      Err(_) => Duration::from_secs(DEFAULT_TIMEOUT_SECS),
    };
    Ok(Self {
      bot_token,
      api_base_url,
      request_timeout,
    })
  }
}

fn parse_timeout(raw: &str) -> Result<Duration> {
  let secs: u64 = raw
    .trim()
    .parse()
    .with_context(|| format!("REQUEST_TIMEOUT_SECS must be a whole number of seconds, got {raw:?}"))?;
  Ok(Duration::from_secs(secs))
}

#[cfg(test)]
mod tests {
  use std::time::Duration;

  use super::parse_timeout;

  #[test]
  fn parses_valid_timeout() {
    assert_eq!(parse_timeout("45").unwrap(), Duration::from_secs(45));
    assert_eq!(parse_timeout(" 10 ").unwrap(), Duration::from_secs(10));
  }

  #[test]
  fn rejects_invalid_timeout() {
    assert!(parse_timeout("soon").is_err());
    assert!(parse_timeout("1.5").is_err());
  }
}
