//! Tokenizer for Indonesian legal text.
//!
//! Numbered legal references are collapsed into single tokens before generic
//! splitting, so `pasal 1365` is indexed and queried as `pasal_1365` rather
//! than as two unrelated terms:
//!
//! | Input          | Token      |
//! |----------------|------------|
//! | `Pasal 1365`   | `pasal_1365` |
//! | `ayat (1)`     | `ayat_1`   |
//! | `UU No. 40`    | `uu_40`    |
//!
//! Steps, in order: lowercase, collapse references, extract word runs,
//! drop single-character tokens.

use std::sync::LazyLock;

use regex::Regex;

static PASAL_RE: LazyLock<Regex> = LazyLock::new(|| compile(r"pasal\s+(\d+)"));
static AYAT_RE: LazyLock<Regex> = LazyLock::new(|| compile(r"ayat\s*\((\d+)\)"));
static UU_RE: LazyLock<Regex> = LazyLock::new(|| compile(r"uu\s+no\.?\s*(\d+)"));
static WORD_RE: LazyLock<Regex> = LazyLock::new(|| compile(r"\b[\w_]+\b"));

fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).expect("Invalid regex")
}

/// Lowercase `text` and collapse numbered legal references into `_`-joined tokens.
pub fn normalize_references(text: &str) -> String {
    let lower = text.to_lowercase();
    let step = PASAL_RE.replace_all(&lower, "pasal_${1}");
    let step = AYAT_RE.replace_all(&step, "ayat_${1}");
    UU_RE.replace_all(&step, "uu_${1}").into_owned()
}

/// Tokenize `text` for lexical indexing and querying.
///
/// Duplicates are kept; term frequency matters for both documents and queries.
pub fn tokenize(text: &str) -> Vec<String> {
    let normalized = normalize_references(text);
    WORD_RE
        .find_iter(&normalized)
        .map(|m| m.as_str())
        .filter(|t| t.chars().count() > 1)
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pasal_reference_collapsed() {
        assert_eq!(
            tokenize("Menurut Pasal 1365 KUHPerdata"),
            vec!["menurut", "pasal_1365", "kuhperdata"]
        );
    }

    #[test]
    fn test_ayat_reference_collapsed() {
        assert_eq!(tokenize("ayat (1)"), vec!["ayat_1"]);
        assert_eq!(tokenize("Ayat(2) huruf a"), vec!["ayat_2", "huruf"]);
    }

    #[test]
    fn test_uu_reference_collapsed() {
        assert_eq!(tokenize("UU No. 40 Tahun 2007"), vec!["uu_40", "tahun", "2007"]);
        assert_eq!(tokenize("uu no 13"), vec!["uu_13"]);
        assert_eq!(tokenize("UU No.11"), vec!["uu_11"]);
    }

    #[test]
    fn test_single_char_tokens_dropped() {
        assert_eq!(tokenize("a b cd e"), vec!["cd"]);
        assert!(tokenize("").is_empty());
        assert!(tokenize("!!! ?? .").is_empty());
    }

    #[test]
    fn test_duplicates_preserved() {
        assert_eq!(tokenize("hukum hukum"), vec!["hukum", "hukum"]);
    }

    #[test]
    fn test_references_inside_sentence() {
        let tokens = tokenize("Pasal 1234 ayat (1) menyatakan bahwa setiap warga negara");
        assert_eq!(&tokens[..2], &["pasal_1234", "ayat_1"]);
    }

    #[test]
    fn test_unicode_words_kept() {
        assert_eq!(tokenize("Dépôt ÜBER"), vec!["dépôt", "über"]);
    }
}
