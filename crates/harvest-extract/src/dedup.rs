//! URL normalisation for duplicate detection.

use std::collections::HashSet;

use url::Url;

/// Comparison key for a URL: lowercased, fragment dropped, query parameters
/// sorted. Strings that do not parse as URLs are trimmed and lowercased.
pub fn normalize_url(raw: &str) -> String {
  let trimmed = raw.trim();
  let Ok(url) = Url::parse(trimmed) else {
    return trimmed.to_lowercase();
  };

  let mut normalized = format!("{}://{}{}", url.scheme(), authority(&url), url.path());
  if let Some(query) = url.query().filter(|q| !q.is_empty()) {
    let mut params: Vec<&str> = query.split('&').filter(|p| !p.is_empty()).collect();
    params.sort_unstable();
    if !params.is_empty() {
      normalized.push('?');
      normalized.push_str(&params.join("&"));
    }
  }
  normalized.to_lowercase()
}

fn authority(url: &Url) -> String {
  let host = url.host_str().unwrap_or_default();
  match url.port() {
    Some(port) => format!("{}:{}", host, port),
    None => host.to_string(),
  }
}

/// Drop URLs whose normalized form was already seen, keeping first-seen order.
pub fn deduplicate_urls<I, S>(urls: I) -> Vec<String>
where
  I: IntoIterator<Item = S>,
  S: AsRef<str>,
{
  let mut seen = HashSet::new();
  urls
    .into_iter()
    .filter(|u| seen.insert(normalize_url(u.as_ref())))
    .map(|u| u.as_ref().to_string())
    .collect()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_normalize_ignores_fragment_case_and_param_order() {
    assert_eq!(
      normalize_url("https://Example.org/Docs/A.pdf?b=2&a=1#page=3"),
      normalize_url("  https://example.org/docs/a.pdf?a=1&b=2 ")
    );
    assert_ne!(
      normalize_url("https://example.org/a.pdf?id=1"),
      normalize_url("https://example.org/a.pdf?id=2")
    );
  }

  #[test]
  fn test_normalize_keeps_explicit_port() {
    assert_ne!(
      normalize_url("http://example.org:8080/a.pdf"),
      normalize_url("http://example.org/a.pdf")
    );
  }

  #[test]
  fn test_deduplicate_preserves_first_seen_order() {
    let urls = [
      "https://h.gov/b.pdf?y=2&x=1",
      "https://h.gov/a.pdf",
      "https://h.gov/b.pdf?x=1&y=2",
      "https://h.gov/A.pdf#section",
      "https://h.gov/c.pdf",
    ];
    assert_eq!(
      deduplicate_urls(urls),
      vec!["https://h.gov/b.pdf?y=2&x=1", "https://h.gov/a.pdf", "https://h.gov/c.pdf"]
    );
  }

  #[test]
  fn test_deduplicate_unparseable_strings() {
    assert_eq!(deduplicate_urls(["not a url", "NOT A URL "]), vec!["not a url"]);
  }
}
