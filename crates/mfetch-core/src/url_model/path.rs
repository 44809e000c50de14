//! Filename hint from a URL path.

/// Returns the final non-empty path segment of `url` (query and fragment ignored).
///
/// Returns `None` if the URL cannot be parsed or has no usable segment.
pub fn filename_from_url_path(url: &str) -> Option<String> {
    let parsed = url::Url::parse(url).ok()?;
    let segment = parsed.path().split('/').filter(|s| !s.is_empty()).last()?;
    if segment == "." || segment == ".." {
        return None;
    }
    Some(segment.to_string())
}
