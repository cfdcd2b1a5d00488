//! Embedded disposable-domain list.

use std::collections::HashSet;
use std::sync::OnceLock;

static RAW_LIST: &str = include_str!("disposable_domains.txt");
static DISPOSABLE: OnceLock<HashSet<String>> = OnceLock::new();

/// Whether `domain` belongs to a known disposable mail provider. Lookups
/// use the ASCII domain form, matching the embedded list.
///
/// The list is parsed once on first use; blank lines and `#` comments are
/// skipped, entries are lowercased.
pub(crate) fn is_disposable(domain: &str) -> bool {
    let set = DISPOSABLE.get_or_init(|| {
        RAW_LIST
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(str::to_lowercase)
            .collect()
    });
    set.contains(&domain.to_lowercase())
}
