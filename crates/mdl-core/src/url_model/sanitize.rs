//! Filesystem-safe name sanitization for chapter folders and archive names.

/// Longest component we produce, in bytes (Linux NAME_MAX minus room for suffixes).
const NAME_MAX: usize = 200;

/// Sanitizes a title into a single path component.
///
/// - Replaces NUL, path separators, control characters, whitespace and the
///   characters `: * ? " < > |` with `_`
/// - Collapses consecutive underscores
/// - Trims leading/trailing dots, spaces and underscores
/// - Limits length to `NAME_MAX` bytes on a char boundary
///
/// This is a pure character substitution: distinct titles that differ only in
/// replaced characters map to the same name. `assign_chapter_folders` resolves
/// such collisions within a job.
pub fn sanitize_component(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut prev_underscore = false;

    for c in name.chars() {
        let replaced = c == '\0'
            || c == '/'
            || c == '\\'
            || c.is_control()
            || c.is_whitespace()
            || matches!(c, ':' | '*' | '?' | '"' | '<' | '>' | '|');
        if replaced || c == '_' {
            if !prev_underscore {
                out.push('_');
            }
            prev_underscore = true;
        } else {
            out.push(c);
            prev_underscore = false;
        }
    }

    let trimmed = out.trim_matches(|c| c == ' ' || c == '.' || c == '_');

    if trimmed.len() > NAME_MAX {
        let mut take = NAME_MAX;
        while take > 0 && !trimmed.is_char_boundary(take) {
            take -= 1;
        }
        trimmed[..take].to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn removes_slash_and_backslash() {
        assert_eq!(sanitize_component("a/b\\c"), "a_b_c");
    }

    #[test]
    fn trims_dots_and_spaces() {
        assert_eq!(sanitize_component("  ..  Chapter 3  ..  "), "Chapter_3");
    }

    #[test]
    fn collapses_underscores() {
        assert_eq!(sanitize_component("Vol. 1 -  Ch__2"), "Vol._1_-_Ch_2");
    }

    #[test]
    fn windows_reserved_characters() {
        assert_eq!(sanitize_component("What? <Really>: \"yes\""), "What_Really_yes");
    }

    #[test]
    fn control_chars() {
        assert_eq!(sanitize_component("ch\x00apter"), "ch_apter");
    }

    #[test]
    fn long_names_cut_on_char_boundary() {
        let name = "é".repeat(300);
        let s = sanitize_component(&name);
        assert!(s.len() <= NAME_MAX);
        assert!(s.chars().all(|c| c == 'é'));
    }

    #[test]
    fn near_duplicates_collide() {
        // Pure substitution is not injective; callers must disambiguate.
        assert_eq!(sanitize_component("Ch. 1/2"), sanitize_component("Ch. 1:2"));
        assert_eq!(sanitize_component("Ch 5"), sanitize_component("Ch  5"));
    }
}
