//! Text-to-candidate derivation.
//!
//! The collaborator's output is free text: prose, HTML fragments, script
//! snippets, sometimes a JSON link list. Three strategy families read it, in
//! priority order:
//!
//! - **direct** ([`direct_links`]): JSON `{filename, href}` lists and absolute
//!   `.pdf` URLs
//! - **script-derived** ([`script_derived`]): inline event handlers, navigation
//!   calls, link and form attributes, relative download/attachment paths
//! - **constructed** (`constructed`): URLs synthesized from
//!   the host profile's templates
//!
//! Nothing here touches the network.

use std::collections::HashSet;
use std::sync::LazyLock;

use harvest_config::HostProfile;
use regex::Regex;
use serde::Deserialize;
use tracing::debug;
use url::Url;

use crate::candidate::{CandidateReference, Origin};
use crate::constructed::constructed;
use crate::dedup::normalize_url;

static DIRECT_URL: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(r#"(?i)https?://[^\s<>"'`()\[\]{}]+\.pdf(?:\?[^\s<>"'`()\[\]{}#]*)?"#).expect("valid regex")
});

static HANDLER_ATTR: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(r#"(?i)\bon[a-z]+\s*=\s*(?:"([^"]*)"|'([^']*)')"#).expect("valid regex")
});

static LINK_ATTR: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(r#"(?i)\b(?:href|action|src|data-(?:url|href|src|download))\s*=\s*(?:"([^"]*)"|'([^']*)')"#)
    .expect("valid regex")
});

static SCRIPT_CALL: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(
    r#"(?i)(?:window\.open|location\.(?:assign|replace)|location(?:\.href)?\s*=)\s*\(?\s*['"]([^'"]+)['"]"#,
  )
  .expect("valid regex")
});

static QUOTED: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r#"['"]([^'"\s]+)['"]"#).expect("valid regex"));

static RELATIVE_PATH: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(r#"(?i)(?:^|[\s"'(=,])((?:\.\.?)?/[^\s"'<>()]*(?:download|attachment)[^\s"'<>()]*)"#)
    .expect("valid regex")
});

const TRAILING_PUNCTUATION: &[char] = &['.', ',', ';', ':', '!', '?', '*', '_'];

/// Entry of a JSON link list in the collaborator's reply.
#[derive(Debug, Deserialize)]
struct LinkEntry {
  #[serde(default)]
  filename: Option<String>,
  #[serde(alias = "url", alias = "link")]
  href: String,
}

/// Whether a raw link looks like it points at a document.
pub fn is_likely_document_url(raw: &str) -> bool {
  let lower = raw.trim().to_ascii_lowercase();
  let path = lower.split(['?', '#']).next().unwrap_or_default();
  path.ends_with(".pdf")
    || path.contains("/pdf/")
    || lower.contains("download")
    || lower.contains("attachment")
}

/// Whether a URL can be fetched with a plain GET.
pub fn is_fetchable_url(url: &Url) -> bool {
  matches!(url.scheme(), "http" | "https") && url.host_str().is_some_and(|h| !h.is_empty())
}

/// Whether `url` is on the page's host or one of its subdomains.
pub fn within_host(url: &Url, base: &Url) -> bool {
  let (Some(host), Some(base_host)) = (url.host_str(), base.host_str()) else {
    return false;
  };
  let host = host.to_ascii_lowercase();
  let base_host = base_host.to_ascii_lowercase();
  let site = base_host.strip_prefix("www.").unwrap_or(&base_host);
  host == site || host.ends_with(&format!(".{}", site))
}

fn resolve(raw: &str, base: &Url) -> Option<Url> {
  let cleaned = raw.trim().replace("&amp;", "&");
  if cleaned.is_empty() || cleaned.starts_with('#') {
    return None;
  }
  let lower = cleaned.to_ascii_lowercase();
  if lower.starts_with("javascript:") || lower.starts_with("mailto:") || lower.starts_with("data:") {
    return None;
  }
  let url = base.join(&cleaned).ok()?;
  is_fetchable_url(&url).then_some(url)
}

fn json_link_lists(text: &str) -> Vec<LinkEntry> {
  let mut entries = Vec::new();
  let mut offset = 0;

  while let Some(pos) = text[offset..].find('[') {
    let start = offset + pos;
    let rest = &text[start..];
    offset = start + 1;

    if !rest[1..].trim_start().starts_with('{') {
      continue;
    }
    let mut stream = serde_json::Deserializer::from_str(rest).into_iter::<Vec<LinkEntry>>();
    if let Some(Ok(list)) = stream.next() {
      offset = start + stream.byte_offset();
      entries.extend(list);
    }
  }

  entries
}

/// Strategy A: JSON link lists, then absolute document URLs.
pub fn direct_links(text: &str, base: &Url) -> Vec<CandidateReference> {
  let mut found = Vec::new();

  for entry in json_link_lists(text) {
    if let Some(url) = resolve(&entry.href, base) {
      let mut candidate = CandidateReference::remote(url, Origin::DirectLink);
      if let Some(name) = entry.filename {
        candidate = candidate.with_filename_hint(name);
      }
      found.push(candidate);
    }
  }

  for m in DIRECT_URL.find_iter(text) {
    let raw = m.as_str().trim_end_matches(TRAILING_PUNCTUATION);
    if let Some(url) = resolve(raw, base) {
      found.push(CandidateReference::remote(url, Origin::DirectLink));
    }
  }

  found
}

/// Quoted string literals inside script code that look like paths or URLs.
fn quoted_paths(code: &str) -> impl Iterator<Item = String> + '_ {
  QUOTED
    .captures_iter(code)
    .map(|caps| caps[1].to_string())
    .filter(|s| s.contains('/') || s.to_ascii_lowercase().ends_with(".pdf"))
}

/// Strategy B: links embedded in handlers, scripts and attributes.
pub fn script_derived(text: &str, base: &Url) -> Vec<CandidateReference> {
  let mut raw_links: Vec<String> = Vec::new();

  for caps in HANDLER_ATTR.captures_iter(text) {
    let Some(body) = caps.get(1).or_else(|| caps.get(2)) else {
      continue;
    };
    raw_links.extend(quoted_paths(body.as_str()));
  }

  for caps in SCRIPT_CALL.captures_iter(text) {
    raw_links.push(caps[1].to_string());
  }

  for caps in LINK_ATTR.captures_iter(text) {
    let Some(value) = caps.get(1).or_else(|| caps.get(2)) else {
      continue;
    };
    let value = value.as_str().trim();
    if value.to_ascii_lowercase().starts_with("javascript:") {
      raw_links.extend(quoted_paths(value));
    } else {
      raw_links.push(value.to_string());
    }
  }

  for caps in RELATIVE_PATH.captures_iter(text) {
    raw_links.push(caps[1].trim_end_matches(TRAILING_PUNCTUATION).to_string());
  }

  raw_links
    .iter()
    .filter(|raw| is_likely_document_url(raw))
    .filter_map(|raw| resolve(raw, base))
    .map(|url| CandidateReference::remote(url, Origin::ScriptDerived))
    .collect()
}

/// Run every strategy and return the merged candidates: priority ordered,
/// deduplicated, and restricted to the page's host.
pub fn extract_candidates(text: &str, base: &Url, profile: &HostProfile) -> Vec<CandidateReference> {
  let mut seen = HashSet::new();
  let mut candidates = Vec::new();

  let all = direct_links(text, base)
    .into_iter()
    .chain(script_derived(text, base))
    .chain(constructed(text, base, profile));

  for candidate in all {
    let Some(url) = candidate.url() else {
      continue;
    };
    if !within_host(url, base) {
      debug!(url = %url, origin = %candidate.origin, "dropping off-host candidate");
      continue;
    }
    if seen.insert(normalize_url(url.as_str())) {
      candidates.push(candidate);
    }
  }

  debug!(
    base = %base,
    direct = candidates.iter().filter(|c| c.origin == Origin::DirectLink).count(),
    script = candidates.iter().filter(|c| c.origin == Origin::ScriptDerived).count(),
    constructed = candidates.iter().filter(|c| c.origin == Origin::PatternConstructed).count(),
    "extracted candidates"
  );
  candidates
}
