use std::path::Path;

use harvest_config::HostProfile;
use minijinja::{Environment, context};
use url::Url;

use crate::error::NavigatorError;

/// Render the profile's instruction template for one page.
pub fn render_instructions(
  profile: &HostProfile,
  url: &Url,
  download_dir: &Path,
) -> Result<String, NavigatorError> {
  let env = Environment::new();
  env
    .render_str(
      &profile.instructions,
      context! {
        url => url.as_str(),
        host => url.host_str().unwrap_or_default(),
        download_dir => download_dir.display().to_string(),
      },
    )
    .map_err(|e| NavigatorError::Template {
      message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_default_instructions_mention_url_and_dir() {
    let url = Url::parse("https://caleprocure.ca.gov/event/0850/0000036230").unwrap();
    let text = render_instructions(
      &HostProfile::caleprocure(),
      &url,
      Path::new("/data/downloads/req-1"),
    )
    .unwrap();

    assert!(text.contains("Open https://caleprocure.ca.gov/event/0850/0000036230"));
    assert!(text.contains("/data/downloads/req-1"));
    assert!(!text.contains("{{"));
  }

  #[test]
  fn test_broken_template_is_reported() {
    let mut profile = HostProfile::generic("h.gov");
    profile.instructions = "Open {{ url ".to_string();
    let url = Url::parse("https://h.gov/").unwrap();
    assert!(matches!(
      render_instructions(&profile, &url, Path::new("/tmp")),
      Err(NavigatorError::Template { .. })
    ));
  }
}
