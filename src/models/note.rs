//! Notes and links shared rules.
//!
//! Both entities carry a visibility flag, an optional public slug and a tag
//! list. A slug only exists while the item is public.

use crate::services::slug::slugify_unique;

/// Maximum number of tags kept on a note or link.
pub const MAX_TAGS: usize = 20;

/// Compute the slug an item should have after a write.
///
/// Public items keep their existing slug or get a fresh one derived from
/// the title. Private items never have one.
pub fn resolve_slug(is_public: bool, current: Option<&str>, title: &str) -> Option<String> {
    if !is_public {
        return None;
    }
    match current {
        Some(existing) if !existing.is_empty() => Some(existing.to_string()),
        _ => Some(slugify_unique(title)),
    }
}

/// Trim, lowercase and de-duplicate tags, preserving first-seen order.
pub fn normalize_tags(tags: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for tag in tags {
        let tag = tag.trim().trim_start_matches('#').to_lowercase();
        if tag.is_empty() || out.contains(&tag) {
            continue;
        }
        out.push(tag);
        if out.len() == MAX_TAGS {
            break;
        }
    }
    out
}
