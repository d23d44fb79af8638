//! Local file names for fetched documents.

use chrono::Utc;
use percent_encoding::percent_decode_str;
use url::Url;

const MAX_NAME_LEN: usize = 180;

fn percent_decode(raw: &str) -> String {
  percent_decode_str(raw).decode_utf8_lossy().into_owned()
}

/// Make a name safe to use as a single path component.
pub fn sanitize_file_name(raw: &str) -> String {
  let cleaned: String = raw
    .trim()
    .chars()
    .map(|c| match c {
      c if c.is_alphanumeric() => c,
      '.' | '-' | '_' | ' ' | '(' | ')' => c,
      _ => '_',
    })
    .collect();
  let cleaned = cleaned.trim().trim_start_matches('.');
  cleaned.chars().take(MAX_NAME_LEN).collect()
}

fn has_pdf_extension(name: &str) -> bool {
  name.to_ascii_lowercase().ends_with(".pdf") && name.len() > 4
}

/// Last path segment of `url`, decoded and sanitized, when it names a PDF.
pub fn pdf_tail(url: &Url) -> Option<String> {
  let tail = url.path_segments()?.rev().find(|s| !s.is_empty())?;
  let name = sanitize_file_name(&percent_decode(tail));
  has_pdf_extension(&name).then_some(name)
}

/// Name for a hint supplied by the collaborator or a Content-Disposition
/// header. The PDF extension is added when missing.
pub fn from_hint(hint: &str) -> Option<String> {
  let name = sanitize_file_name(hint);
  if name.is_empty() {
    return None;
  }
  if has_pdf_extension(&name) {
    Some(name)
  } else {
    Some(format!("{}.pdf", name.trim_end_matches('.')))
  }
}

/// Synthesized `{host}_{timestamp}.pdf` name.
pub fn synthesized(url: &Url) -> String {
  let host = url.host_str().unwrap_or("document").replace('.', "_");
  format!("{}_{}.pdf", host, Utc::now().format("%Y%m%d_%H%M%S_%3f"))
}

/// Pick a local name: the URL tail when it is a PDF name, otherwise a
/// timestamped one.
pub fn filename_for_url(url: &Url) -> String {
  pdf_tail(url).unwrap_or_else(|| synthesized(url))
}

/// `filename` parameter of a Content-Disposition header value.
pub fn disposition_filename(header: &str) -> Option<String> {
  header.split(';').map(str::trim).find_map(|part| {
    let (key, value) = part.split_once('=')?;
    let key = key.trim().to_ascii_lowercase();
    if key == "filename*" {
      let value = value.trim();
      let encoded = value.rsplit_once("''").map(|(_, v)| v).unwrap_or(value);
      Some(percent_decode(encoded.trim_matches('"')))
    } else if key == "filename" {
      Some(value.trim().trim_matches('"').to_string())
    } else {
      None
    }
  })
}

#[cfg(test)]
mod tests {
  use super::*;

  fn url(s: &str) -> Url {
    Url::parse(s).unwrap()
  }

  #[test]
  fn test_tail_is_used_when_it_names_a_pdf() {
    assert_eq!(
      filename_for_url(&url("https://caleprocure.ca.gov/docs/Addendum%201.PDF?x=1")),
      "Addendum 1.PDF"
    );
    assert_eq!(filename_for_url(&url("https://h.gov/a/b/report.pdf/")), "report.pdf");
  }

  #[test]
  fn test_synthesized_when_tail_is_not_a_pdf() {
    let name = filename_for_url(&url("https://caleprocure.ca.gov/download?id=5"));
    assert!(name.starts_with("caleprocure_ca_gov_"));
    assert!(name.ends_with(".pdf"));

    let name = filename_for_url(&url("https://h.gov/"));
    assert!(name.starts_with("h_gov_"));
  }

  #[test]
  fn test_sanitize_blocks_traversal() {
    assert_eq!(sanitize_file_name("../../etc/passwd"), "_.._etc_passwd");
    assert_eq!(sanitize_file_name(".hidden.pdf"), "hidden.pdf");
    assert!(pdf_tail(&url("https://h.gov/%2e%2e%2fsecret.pdf")).is_some_and(|n| !n.contains('/')));
  }

  #[test]
  fn test_hints_get_an_extension() {
    assert_eq!(from_hint("Bid Form").as_deref(), Some("Bid Form.pdf"));
    assert_eq!(from_hint("Spec.pdf").as_deref(), Some("Spec.pdf"));
    assert_eq!(from_hint("  "), None);
  }

  #[test]
  fn test_content_disposition() {
    assert_eq!(
      disposition_filename(r#"attachment; filename="Solicitation.pdf""#).as_deref(),
      Some("Solicitation.pdf")
    );
    assert_eq!(
      disposition_filename("attachment; filename*=UTF-8''Addendum%202.pdf").as_deref(),
      Some("Addendum 2.pdf")
    );
    assert_eq!(disposition_filename("inline"), None);
  }

  #[test]
  fn test_percent_decoding_keeps_multibyte_names() {
    assert_eq!(
      filename_for_url(&url("https://h.gov/docs/Anexo%C3%A9%20final.pdf")).as_str(),
      "Anexo\u{e9} final.pdf"
    );
    assert_eq!(percent_decode("100%zz.pdf"), "100%zz.pdf");
    assert_eq!(percent_decode("trailing%2"), "trailing%2");
  }
}
