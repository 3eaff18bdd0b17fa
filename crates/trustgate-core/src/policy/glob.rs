//! Minimal glob matching for target patterns.
//!
//! Supported forms:
//! - `*` / `**` match anything
//! - `**/suffix` matches a trailing suffix or `suffix` as an inner path segment
//! - `prefix/**` matches a leading prefix
//! - one embedded `*` splits into a required prefix and suffix
//! - anything else is compared literally

pub fn glob_match(pattern: &str, target: &str) -> bool {
    if pattern == "*" || pattern == "**" {
        return true;
    }
    if let Some(suffix) = pattern.strip_prefix("**/") {
        return target.ends_with(suffix) || target.contains(&format!("/{suffix}/"));
    }
    if let Some(prefix) = pattern.strip_suffix("/**") {
        return target.starts_with(prefix);
    }
    if let Some((head, tail)) = pattern.split_once('*') {
        if !tail.contains('*') {
            return target.len() >= head.len() + tail.len()
                && target.starts_with(head)
                && target.ends_with(tail);
        }
    }
    pattern == target
}
