use regex::Regex;
use std::sync::LazyLock;

use crate::characters::CHARACTERS;

static UNSAFE_FILE_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-Za-z0-9._-]").expect("valid regex"));

/// Flattens a text run onto one line: newlines become spaces, soft hyphens
/// disappear and non-breaking spaces become plain spaces.
pub fn clean_text(raw: &str) -> String {
    let cleaned = raw
        .replace(CHARACTERS::NEWLINE, " ")
        .replace(CHARACTERS::CARRIAGE_RETURN, "")
        .replace(CHARACTERS::SOFT_HYPHEN, "")
        .replace(CHARACTERS::NON_BREAKING_SPACE, " ")
        .trim()
        .to_string();
    cleaned
}

/// Drops one leading `[` and one trailing `]`, e.g. `[Decreto]` -> `Decreto`.
pub fn strip_brackets(raw: &str) -> &str {
    let trimmed = raw.trim();
    let trimmed = trimmed.strip_prefix('[').unwrap_or(trimmed);
    trimmed.strip_suffix(']').unwrap_or(trimmed).trim()
}

/// Makes `raw` usable as a file name by replacing anything outside
/// `[A-Za-z0-9._-]` with `_`.
pub fn sanitize_file_stem(raw: &str) -> String {
    UNSAFE_FILE_CHARS.replace_all(raw.trim(), "_").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_text_flattens_whitespace_variants() {
        assert_eq!(
            clean_text("  Projeto\u{00A0}de\r\nLei n.\u{00AD}º 1  "),
            "Projeto de Lei n.º 1"
        );
    }

    #[test]
    fn strip_brackets_removes_one_pair() {
        assert_eq!(strip_brackets("[Decreto]"), "Decreto");
        assert_eq!(strip_brackets(" [DAR II série A] "), "DAR II série A");
        assert_eq!(strip_brackets("Anexo"), "Anexo");
        assert_eq!(strip_brackets("[[x]]"), "[x]");
    }

    #[test]
    fn sanitize_file_stem_replaces_unsafe_characters() {
        assert_eq!(sanitize_file_stem("pjl1-XII"), "pjl1-XII");
        assert_eq!(sanitize_file_stem("a b/c?d"), "a_b_c_d");
        assert_eq!(sanitize_file_stem("ppl%20 2.XII"), "ppl_20_2.XII");
    }
}
