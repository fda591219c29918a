//! Series selector rewriting for per-metric shards.
//!
//! The base filter is a selector such as `{job="node",instance=~"db-.*"}`.
//! Every shard narrows it to a single metric by replacing any `__name__`
//! matcher with `__name__="<metric>"`.

use crate::error::{MigrateError, Result};

const NAME_LABEL: &str = "__name__";

/// One `label op "value"` matcher, kept verbatim apart from trimming.
#[derive(Debug, Clone, PartialEq, Eq)]
struct LabelMatcher {
    label: String,
    rendered: String,
}

/// Merge `metric` into the `base` selector.
pub fn build_match_with_metric(base: &str, metric: &str) -> Result<String> {
    let matchers = parse_selector(base)?;

    let mut parts: Vec<String> = matchers
        .into_iter()
        .filter(|m| m.label != NAME_LABEL)
        .map(|m| m.rendered)
        .collect();
    parts.push(format!("{}=\"{}\"", NAME_LABEL, escape_value(metric)));

    Ok(format!("{{{}}}", parts.join(",")))
}

/// Check that `base` is a selector this module can rewrite.
pub fn validate_selector(base: &str) -> Result<()> {
    parse_selector(base).map(|_| ())
}

fn parse_selector(selector: &str) -> Result<Vec<LabelMatcher>> {
    let selector = selector.trim();
    if selector.is_empty() {
        return Ok(Vec::new());
    }

    let open = selector
        .find('{')
        .ok_or_else(|| invalid(selector, "missing '{'"))?;
    if !selector.ends_with('}') {
        return Err(invalid(selector, "missing closing '}'"));
    }

    let mut matchers = Vec::new();

    // `up{job="a"}` is shorthand for `{__name__="up",job="a"}`.
    let prefix = selector[..open].trim();
    if !prefix.is_empty() {
        if !is_valid_label_name(prefix) {
            return Err(invalid(selector, "invalid metric name before '{'"));
        }
        matchers.push(LabelMatcher {
            label: NAME_LABEL.to_string(),
            rendered: format!("{}=\"{}\"", NAME_LABEL, prefix),
        });
    }

    let body = &selector[open + 1..selector.len() - 1];
    for part in split_top_level(body).map_err(|msg| invalid(selector, msg))? {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        matchers.push(parse_matcher(part).map_err(|msg| invalid(selector, &msg))?);
    }

    Ok(matchers)
}

fn parse_matcher(part: &str) -> std::result::Result<LabelMatcher, String> {
    let op_start = part
        .find(['=', '!'])
        .ok_or_else(|| format!("matcher {:?} has no operator", part))?;
    let label = part[..op_start].trim();
    if !is_valid_label_name(label) {
        return Err(format!("invalid label name {:?}", label));
    }

    let rest = &part[op_start..];
    let op = ["=~", "!~", "!=", "="]
        .into_iter()
        .find(|op| rest.starts_with(op))
        .ok_or_else(|| format!("matcher {:?} has an unknown operator", part))?;

    let value = rest[op.len()..].trim();
    let quoted = value.len() >= 2
        && ((value.starts_with('"') && value.ends_with('"'))
            || (value.starts_with('\'') && value.ends_with('\'')));
    if !quoted {
        return Err(format!("value in matcher {:?} must be quoted", part));
    }

    Ok(LabelMatcher {
        label: label.to_string(),
        rendered: format!("{}{}{}", label, op, value),
    })
}

/// Split on commas that are not inside a quoted value.
fn split_top_level(body: &str) -> std::result::Result<Vec<&str>, &'static str> {
    let mut parts = Vec::new();
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut last = 0;

    for (i, c) in body.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match (quote, c) {
            (Some(_), '\\') => escaped = true,
            (Some(q), c) if c == q => quote = None,
            (None, '"') | (None, '\'') => quote = Some(c),
            (None, ',') => {
                parts.push(&body[last..i]);
                last = i + 1;
            }
            _ => {}
        }
    }

    if quote.is_some() {
        return Err("unterminated quoted value");
    }
    parts.push(&body[last..]);
    Ok(parts)
}

fn is_valid_label_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.' || c == ':')
}

fn escape_value(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

fn invalid(selector: &str, message: &str) -> MigrateError {
    MigrateError::Config(format!(
        "cannot parse match filter {:?}: {}",
        selector, message
    ))
}
