//! Gift and contribution models.
//!
//! A gift is one product type (audio, video, markdown letter or image
//! gallery) whose content is revealed by the unlock flow. Contributions are
//! messages left on a gift by third parties.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db::{Contribution, Gift};

// ============================================================================
// Product Type
// ============================================================================

/// Which viewer renders a gift, and so which content fields it needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProductType {
    Audio,
    Video,
    Markdown,
    Gallery,
}

impl ProductType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Audio => "audio",
            Self::Video => "video",
            Self::Markdown => "markdown",
            Self::Gallery => "gallery",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "audio" => Some(Self::Audio),
            "video" => Some(Self::Video),
            "markdown" => Some(Self::Markdown),
            "gallery" => Some(Self::Gallery),
            _ => None,
        }
    }

    pub fn all() -> &'static [ProductType] {
        &[Self::Audio, Self::Video, Self::Markdown, Self::Gallery]
    }

    /// Check that the content fields this viewer renders are present.
    pub fn validate_content(&self, content: &GiftContent<'_>) -> Result<(), String> {
        let present = |v: Option<&str>| v.map(|s| !s.trim().is_empty()).unwrap_or(false);
        match self {
            Self::Audio if !present(content.audio_url) => {
                Err("audio gifts need an audio_url".to_string())
            }
            Self::Video if !present(content.video_url) => {
                Err("video gifts need a video_url".to_string())
            }
            Self::Markdown if !present(content.message) => {
                Err("markdown gifts need a message".to_string())
            }
            Self::Gallery if content.image_urls.iter().all(|u| u.trim().is_empty()) => {
                Err("gallery gifts need at least one image url".to_string())
            }
            _ => Ok(()),
        }
    }
}

impl std::fmt::Display for ProductType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Borrowed view of a gift's content fields, used for validation.
#[derive(Debug, Clone, Copy)]
pub struct GiftContent<'a> {
    pub message: Option<&'a str>,
    pub audio_url: Option<&'a str>,
    pub video_url: Option<&'a str>,
    pub image_urls: &'a [String],
}

// ============================================================================
// Contribution Kind
// ============================================================================

/// Maximum length of a text contribution, in characters.
pub const MAX_TEXT_CONTRIBUTION: usize = 2000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContributionKind {
    Text,
    Video,
}

impl ContributionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Video => "video",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "text" => Some(Self::Text),
            "video" => Some(Self::Video),
            _ => None,
        }
    }

    /// Validate contribution content for this kind.
    pub fn validate(&self, content: &str) -> Result<(), String> {
        let content = content.trim();
        if content.is_empty() {
            return Err("content must not be empty".to_string());
        }
        match self {
            Self::Text if content.chars().count() > MAX_TEXT_CONTRIBUTION => Err(format!(
                "text contributions are limited to {} characters",
                MAX_TEXT_CONTRIBUTION
            )),
            Self::Video if !is_http_url(content) => {
                Err("video contributions must be an http(s) url".to_string())
            }
            _ => Ok(()),
        }
    }
}

/// True when `value` parses as an absolute http or https URL.
pub fn is_http_url(value: &str) -> bool {
    url::Url::parse(value)
        .map(|u| matches!(u.scheme(), "http" | "https") && u.host_str().is_some())
        .unwrap_or(false)
}

// ============================================================================
// Views
// ============================================================================

/// Public preview of a gift. Never carries content or the access PIN.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GiftSummary {
    pub id: String,
    pub recipient_name: String,
    pub sender_name: String,
    pub product_type: String,
    pub requires_pin: bool,
    pub unlock_date: Option<DateTime<Utc>>,
    pub viewed: bool,
    pub contribution_count: i64,
}

impl GiftSummary {
    pub fn from_gift(gift: &Gift, contribution_count: i64) -> Self {
        Self {
            id: gift.id.clone(),
            recipient_name: gift.recipient_name.clone(),
            sender_name: gift.sender_name.clone(),
            product_type: gift.product_type.clone(),
            requires_pin: gift.locked,
            unlock_date: gift.unlock_date,
            viewed: gift.viewed,
            contribution_count,
        }
    }
}

/// A contribution as shown inside an unlocked gift.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContributionView {
    pub id: String,
    pub author: String,
    pub kind: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl From<Contribution> for ContributionView {
    fn from(c: Contribution) -> Self {
        Self {
            id: c.id,
            author: c.author,
            kind: c.kind,
            content: c.content,
            created_at: c.created_at,
        }
    }
}

/// Fully revealed gift: its content merged with every contribution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GiftView {
    pub id: String,
    pub recipient_name: String,
    pub sender_name: String,
    pub product_type: String,
    pub message: Option<String>,
    pub audio_url: Option<String>,
    pub video_url: Option<String>,
    pub image_urls: Vec<String>,
    pub viewed_at: Option<DateTime<Utc>>,
    pub contributions: Vec<ContributionView>,
}

impl GiftView {
    /// Merge a gift with its contributions, oldest contribution first.
    pub fn merge(gift: Gift, mut contributions: Vec<Contribution>) -> Self {
        contributions.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        let image_urls = gift.image_urls();
        Self {
            id: gift.id,
            recipient_name: gift.recipient_name,
            sender_name: gift.sender_name,
            product_type: gift.product_type,
            message: gift.message,
            audio_url: gift.audio_url,
            video_url: gift.video_url,
            image_urls,
            viewed_at: gift.viewed_at,
            contributions: contributions.into_iter().map(Into::into).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn content<'a>(
        message: Option<&'a str>,
        audio: Option<&'a str>,
        images: &'a [String],
    ) -> GiftContent<'a> {
        GiftContent {
            message,
            audio_url: audio,
            video_url: None,
            image_urls: images,
        }
    }

    #[test]
    fn test_product_type_parsing() {
        assert_eq!(ProductType::from_str("AUDIO"), Some(ProductType::Audio));
        assert_eq!(ProductType::from_str("gallery"), Some(ProductType::Gallery));
        assert_eq!(ProductType::from_str("hologram"), None);
    }

    #[test]
    fn test_product_type_requires_matching_content() {
        let none: Vec<String> = vec![];
        assert!(ProductType::Audio
            .validate_content(&content(Some("hi"), None, &none))
            .is_err());
        assert!(ProductType::Audio
            .validate_content(&content(None, Some("https://cdn.test/a.mp3"), &none))
            .is_ok());
        assert!(ProductType::Markdown
            .validate_content(&content(Some("   "), None, &none))
            .is_err());
        assert!(ProductType::Gallery
            .validate_content(&content(None, None, &none))
            .is_err());
        let images = vec!["https://cdn.test/1.jpg".to_string()];
        assert!(ProductType::Gallery
            .validate_content(&content(None, None, &images))
            .is_ok());
    }

    #[test]
    fn test_contribution_validation() {
        assert!(ContributionKind::Text.validate("Happy birthday!").is_ok());
        assert!(ContributionKind::Text.validate("  ").is_err());
        assert!(ContributionKind::Text
            .validate(&"x".repeat(MAX_TEXT_CONTRIBUTION + 1))
            .is_err());
        assert!(ContributionKind::Video
            .validate("https://video.test/clip.mp4")
            .is_ok());
        assert!(ContributionKind::Video.validate("javascript:alert(1)").is_err());
    }
}
