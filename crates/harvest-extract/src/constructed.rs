//! Strategy C: URLs guessed from the host profile's naming templates.
//!
//! Identifiers come from two places: path segments of the page URL that contain
//! a digit (the last two become `org` and `event`), and identifier-like tokens
//! in the collaborator's text (each rendered as `token`). Templates referring
//! to a variable that is not available are skipped.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use harvest_config::HostProfile;
use minijinja::{Environment, UndefinedBehavior};
use regex::Regex;
use serde_json::{Map, Value, json};
use tracing::debug;
use url::Url;

use crate::candidate::{CandidateReference, Origin};
use crate::extractor::is_fetchable_url;

static IDENTIFIER_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(r"\b[A-Za-z]{0,8}[-_]?\d{4,}(?:[-_][A-Za-z0-9]+)*\b").expect("valid regex")
});

/// Path segments that look like identifiers.
fn path_identifiers(url: &Url) -> Vec<String> {
  url
    .path_segments()
    .map(|segments| {
      segments
        .filter(|s| !s.is_empty() && s.chars().any(|c| c.is_ascii_digit()))
        .map(str::to_string)
        .collect()
    })
    .unwrap_or_default()
}

/// Distinct identifier-like tokens in first-seen order, at most `limit`.
fn text_tokens(text: &str, limit: usize) -> Vec<String> {
  let mut seen = BTreeSet::new();
  IDENTIFIER_TOKEN
    .find_iter(text)
    .map(|m| m.as_str().to_string())
    .filter(|t| seen.insert(t.clone()))
    .take(limit)
    .collect()
}

fn base_context(base: &Url) -> Map<String, Value> {
  let mut context = Map::new();
  context.insert("scheme".to_string(), json!(base.scheme()));
  context.insert("host".to_string(), json!(base.host_str().unwrap_or_default()));

  let segments: Vec<String> = base
    .path_segments()
    .map(|s| s.filter(|s| !s.is_empty()).map(str::to_string).collect())
    .unwrap_or_default();
  context.insert("segments".to_string(), json!(segments));

  let ids = path_identifiers(base);
  match ids.as_slice() {
    [] => {}
    [event] => {
      context.insert("event".to_string(), json!(event));
    }
    [.., org, event] => {
      context.insert("org".to_string(), json!(org));
      context.insert("event".to_string(), json!(event));
    }
  }
  context
}

/// Synthesize up to `profile.max_constructed` candidate URLs.
pub fn constructed(text: &str, base: &Url, profile: &HostProfile) -> Vec<CandidateReference> {
  if profile.url_templates.is_empty() || profile.max_constructed == 0 {
    return Vec::new();
  }

  let mut env = Environment::new();
  env.set_undefined_behavior(UndefinedBehavior::Strict);

  let context = base_context(base);
  let tokens = text_tokens(text, profile.max_constructed);
  let mut urls: Vec<Url> = Vec::new();

  'templates: for template in &profile.url_templates {
    let contexts: Vec<Value> = if template.contains("token") {
      tokens
        .iter()
        .map(|token| {
          let mut ctx = context.clone();
          ctx.insert("token".to_string(), json!(token));
          Value::Object(ctx)
        })
        .collect()
    } else {
      vec![Value::Object(context.clone())]
    };

    for ctx in contexts {
      if urls.len() >= profile.max_constructed {
        break 'templates;
      }
      let rendered = match env.render_str(template, ctx) {
        Ok(rendered) => rendered,
        Err(e) => {
          debug!(template = %template, error = %e, "skipping url template");
          continue 'templates;
        }
      };
      match Url::parse(rendered.trim()) {
        Ok(url) if is_fetchable_url(&url) => {
          if !urls.contains(&url) {
            urls.push(url);
          }
        }
        _ => debug!(rendered = %rendered, "url template rendered an unusable url"),
      }
    }
  }

  urls
    .into_iter()
    .map(|url| CandidateReference::remote(url, Origin::PatternConstructed))
    .collect()
}
