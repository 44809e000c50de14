//! Basename extraction for caller-supplied filenames.

/// Keeps only the final component of `name`, so a caller cannot smuggle
/// directories through the filename field.
///
/// Both `/` and `\` count as separators. Surrounding whitespace is kept, so
/// the file gets exactly the name the caller asked for. Control characters
/// become `_`.
/// Returns `None` when nothing usable remains (`""`, `"."`, `".."`, or a
/// name containing NUL).
pub fn base_name(name: &str) -> Option<String> {
    let last = name.rsplit(['/', '\\']).next().unwrap_or("");
    if last.is_empty() || last == "." || last == ".." || last.contains('\0') {
        return None;
    }
    Some(
        last.chars()
            .map(|c| if c.is_control() { '_' } else { c })
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_directories() {
        assert_eq!(base_name("../../etc/evil").as_deref(), Some("evil"));
        assert_eq!(base_name("/abs/path/model.bin").as_deref(), Some("model.bin"));
        assert_eq!(base_name("..\\..\\win.ini").as_deref(), Some("win.ini"));
    }

    #[test]
    fn plain_names_unchanged() {
        assert_eq!(base_name("model.safetensors").as_deref(), Some("model.safetensors"));
        assert_eq!(base_name("my model v2.ckpt").as_deref(), Some("my model v2.ckpt"));
    }

    #[test]
    fn rejects_reserved_and_empty() {
        assert_eq!(base_name(""), None);
        assert_eq!(base_name("dir/"), None);
        assert_eq!(base_name(".."), None);
        assert_eq!(base_name("a/."), None);
        assert_eq!(base_name("bad\0name"), None);
    }

    #[test]
    fn whitespace_is_part_of_the_name() {
        assert_eq!(base_name("model.bin ").as_deref(), Some("model.bin "));
        assert_eq!(base_name("dir/ spaced.ckpt").as_deref(), Some(" spaced.ckpt"));
    }

    #[test]
    fn control_chars_replaced() {
        assert_eq!(base_name("model\n.bin").as_deref(), Some("model_.bin"));
    }
}
