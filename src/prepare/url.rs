//! Song URL validation.
//!
//! Only YouTube watch URLs are accepted.  The check is a prefix match: the
//! input must start with `https://www.youtube.com/watch?v=` followed by at
//! least one ASCII alphanumeric character; anything after that run is
//! ignored.

use std::fmt;

use thiserror::Error;

/// Accepted URL prefix.
pub const WATCH_PREFIX: &str = "https://www.youtube.com/watch?v=";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UrlError {
    #[error("Please enter the URL of the song.")]
    Empty,

    #[error("Invalid URL! Please enter a valid YouTube URL.")]
    Invalid(String),
}

/// A validated watch URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoUrl {
    url: String,
    video_id: String,
}

impl VideoUrl {
    pub fn as_str(&self) -> &str {
        &self.url
    }

    /// The alphanumeric run after `v=`.
    pub fn video_id(&self) -> &str {
        &self.video_id
    }
}

impl fmt::Display for VideoUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url)
    }
}

/// Validate user input before any download work starts.
pub fn validate_url(input: &str) -> Result<VideoUrl, UrlError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(UrlError::Empty);
    }
    let video_id: String = input
        .strip_prefix(WATCH_PREFIX)
        .map(|rest| {
            rest.chars()
                .take_while(char::is_ascii_alphanumeric)
                .collect()
        })
        .unwrap_or_default();
    if video_id.is_empty() {
        return Err(UrlError::Invalid(input.to_string()));
    }
    Ok(VideoUrl {
        url: input.to_string(),
        video_id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_watch_url() {
        let url = validate_url("https://www.youtube.com/watch?v=dQw4w9WgXcQ").unwrap();
        assert_eq!(url.video_id(), "dQw4w9WgXcQ");
        assert_eq!(url.as_str(), "https://www.youtube.com/watch?v=dQw4w9WgXcQ");
    }

    #[test]
    fn trailing_query_is_allowed_by_prefix_match() {
        let url = validate_url("https://www.youtube.com/watch?v=abc123&t=42s").unwrap();
        assert_eq!(url.video_id(), "abc123");
    }

    #[test]
    fn short_links_are_rejected() {
        assert_eq!(
            validate_url("http://youtu.be/x"),
            Err(UrlError::Invalid("http://youtu.be/x".into()))
        );
    }

    #[test]
    fn missing_video_id_is_rejected() {
        assert!(validate_url("https://www.youtube.com/watch?v=").is_err());
        assert!(validate_url("https://www.youtube.com/watch?v=-abc").is_err());
        assert!(validate_url("http://www.youtube.com/watch?v=abc").is_err());
    }

    #[test]
    fn blank_input_is_empty() {
        assert_eq!(validate_url("   "), Err(UrlError::Empty));
    }
}
