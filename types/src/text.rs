//! Small pure text helpers.

/// First `max_content` characters of `raw` followed by `...`.
///
/// The ellipsis is always appended, matching how conversation titles have always
/// been derived, so stored titles from older clients compare equal.
#[must_use]
pub(crate) fn title_preview(raw: &str, max_content: usize) -> String {
    let head: String = raw.chars().take(max_content).collect();
    format!("{head}...")
}

/// Truncate a string to a maximum length, adding `...` if needed.
///
/// - Trims surrounding whitespace before truncating.
/// - Uses `char` count (not bytes) to avoid splitting Unicode scalar values.
/// - Enforces a minimum `max` of 3 so the ellipsis fits.
#[must_use]
pub fn truncate_with_ellipsis(raw: &str, max: usize) -> String {
    let max = max.max(3);
    let trimmed = raw.trim();
    if trimmed.chars().count() <= max {
        return trimmed.to_string();
    }
    let head: String = trimmed.chars().take(max - 3).collect();
    format!("{head}...")
}
