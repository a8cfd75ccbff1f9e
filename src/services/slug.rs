//! Slug generation for publicly shared notes and links.
//!
//! Slugs are human-readable and URL-safe, with a random suffix so that two
//! items with the same title never collide.

use crate::models::SHORT_ID_ALPHABET;

/// Longest title-derived prefix kept in a slug.
const MAX_BASE_LEN: usize = 48;

/// Generate a slug from a title.
///
/// Converts the title to lowercase, replaces non-alphanumeric characters
/// with hyphens, and trims leading/trailing hyphens.
///
/// # Example
/// ```
/// use giftbox::services::slug::slugify;
/// assert_eq!(slugify("Hello World!"), "hello-world");
/// assert_eq!(slugify("Reading List 2024"), "reading-list-2024");
/// ```
pub fn slugify(title: &str) -> String {
    let mut result = String::new();
    let mut prev_hyphen = true; // Start true to skip leading hyphens
    for c in title.to_lowercase().chars() {
        if c.is_ascii_alphanumeric() {
            result.push(c);
            prev_hyphen = false;
        } else if !prev_hyphen {
            result.push('-');
            prev_hyphen = true;
        }
        if result.len() >= MAX_BASE_LEN {
            break;
        }
    }

    while result.ends_with('-') {
        result.pop();
    }

    result
}

/// Generate a unique slug by appending a random 8-character nonce.
///
/// # Example
/// ```
/// use giftbox::services::slug::slugify_unique;
/// let slug = slugify_unique("Hello World");
/// assert!(slug.starts_with("hello-world-"));
/// ```
pub fn slugify_unique(title: &str) -> String {
    let base = slugify(title);
    let nonce = nanoid::nanoid!(8, &SHORT_ID_ALPHABET);
    if base.is_empty() {
        nonce
    } else {
        format!("{}-{}", base, nonce)
    }
}
