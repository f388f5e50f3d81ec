use std::collections::HashMap;

/// A keyword argument value. All-digit values parse to `Int`; anything else
/// stays `Text` so the consumer can reject it with a precise message instead
/// of a silent coercion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgValue {
  Int(i64),
  Text(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCommand {
  pub name: String,
  pub positional: Vec<String>,
  pub keyword: HashMap<String, ArgValue>,
}

/// Splits chat text into a command. Returns `None` for anything that is not
/// command-shaped (no `/` prefix), which the dispatcher treats as a plain
/// utterance.
pub fn parse_command(text: &str) -> Option<ParsedCommand> {
  let mut tokens = text.split_whitespace();
  let head = tokens.next()?;
  let name = head.strip_prefix('/')?;
  // group chats address commands as /name@botname
  let name = name.split('@').next().unwrap_or(name).to_ascii_lowercase();
  if name.is_empty() {
    return None;
  }

  let mut positional = Vec::new();
  let mut keyword = HashMap::new();
  for token in tokens {
    match token.split_once('=') {
      Some((key, value)) if !key.is_empty() => {
        keyword.insert(key.to_ascii_lowercase(), parse_value(value));
      },
      _ => positional.push(token.to_string()),
    }
  }

  Some(ParsedCommand {
    name,
    positional,
    keyword,
  })
}

fn parse_value(raw: &str) -> ArgValue {
  match raw.parse::<i64>() {
    Ok(value) => ArgValue::Int(value),
    Err(_) => ArgValue::Text(raw.to_string()),
  }
}

#[cfg(test)]
mod tests {
  use super::ArgValue;
  use super::parse_command;

  #[test]
  fn plain_text_is_not_a_command() {
    assert!(parse_command("hello there").is_none());
    assert!(parse_command("").is_none());
    assert!(parse_command("/").is_none());
  }

  #[test]
  fn parses_name_case_insensitively() {
    let command = parse_command("/Reviews").unwrap();
    assert_eq!(command.name, "reviews");
  }

  #[test]
  fn strips_bot_mention_suffix() {
    let command = parse_command("/reviews@my_reviews_bot movie").unwrap();
    assert_eq!(command.name, "reviews");
    assert_eq!(command.positional, vec!["movie"]);
  }

  #[test]
  fn splits_positional_and_keyword_arguments() {
    let command = parse_command("/reviews movie min_rating=8").unwrap();
    assert_eq!(command.positional, vec!["movie"]);
    assert_eq!(command.keyword.get("min_rating"), Some(&ArgValue::Int(8)));
  }

  #[test]
  fn keeps_non_numeric_keyword_value_as_text() {
    let command = parse_command("/reviews min_rating=eight").unwrap();
    assert_eq!(
      command.keyword.get("min_rating"),
      Some(&ArgValue::Text("eight".to_string())),
    );
  }

  #[test]
  fn token_with_empty_key_stays_positional() {
    let command = parse_command("/reviews =8").unwrap();
    assert!(command.keyword.is_empty());
    assert_eq!(command.positional, vec!["=8"]);
  }

  #[test]
  fn keyword_order_does_not_matter() {
    let command = parse_command("/reviews min_rating=8 movie").unwrap();
    assert_eq!(command.positional, vec!["movie"]);
    assert_eq!(command.keyword.get("min_rating"), Some(&ArgValue::Int(8)));
  }
}
