//! Closed-issue classification.
//!
//! Status names are free text configured per project, so "closed" is decided
//! by a case-insensitive substring match against a fixed keyword table. The
//! match is lossy (e.g. "Not Done" counts as closed) and that is accepted.

/// Terminal-state keywords, English and Russian, lowercase.
pub const CLOSED_KEYWORDS: [&str; 5] = ["closed", "done", "resolved", "закрыт", "решено"];

pub fn is_closed(status_name: &str) -> bool {
    let lowered = status_name.to_lowercase();
    CLOSED_KEYWORDS
        .iter()
        .any(|keyword| lowered.contains(keyword))
}
