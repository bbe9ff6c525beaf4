use regex::Regex;
use std::sync::LazyLock;

// Slack encodes mentions as <@U012ABC> or <@U012ABC|name>
static MENTION_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<@[^>]+>").expect("Invalid mention regex"));

/// Removes every user mention token and trims the rest.
pub fn strip_mentions(text: &str) -> String {
    MENTION_REGEX.replace_all(text, "").trim().to_string()
}
