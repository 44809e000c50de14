//! Filename derivation and basename safety.

mod path;
mod sanitize;

pub use path::filename_from_url_path;
pub use sanitize::base_name;

/// Derives a download filename from the final URL path segment, reduced to a
/// safe basename. `None` when the URL carries no usable name.
///
/// - `derive_filename("https://host/models/sd15.ckpt")` → `Some("sd15.ckpt")`
/// - `derive_filename("https://host/")` → `None`
pub fn derive_filename(url: &str) -> Option<String> {
    filename_from_url_path(url).and_then(|s| base_name(&s))
}

/// Resolves the filename for a download: an explicit, non-blank `requested`
/// name wins (reduced to its basename); otherwise the URL decides.
pub fn choose_filename(requested: Option<&str>, url: &str) -> Option<String> {
    match requested.map(str::trim).filter(|s| !s.is_empty()) {
        Some(name) => base_name(name),
        None => derive_filename(url),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derive_from_url() {
        assert_eq!(
            derive_filename("https://host/models/sd15.ckpt").as_deref(),
            Some("sd15.ckpt")
        );
        assert_eq!(derive_filename("https://host/"), None);
        assert_eq!(derive_filename("https://host/.."), None);
    }

    #[test]
    fn explicit_name_wins() {
        assert_eq!(
            choose_filename(Some(" custom.bin "), "https://host/x.bin").as_deref(),
            Some("custom.bin")
        );
        assert_eq!(
            choose_filename(Some("../up.bin"), "https://host/x.bin").as_deref(),
            Some("up.bin")
        );
    }

    #[test]
    fn blank_name_falls_back_to_url() {
        assert_eq!(
            choose_filename(Some("   "), "https://host/x.bin").as_deref(),
            Some("x.bin")
        );
        assert_eq!(choose_filename(None, "https://host/"), None);
    }
}
