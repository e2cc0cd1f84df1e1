use std::borrow::Cow;

/// Trims leading/trailing whitespace while borrowing the original when unchanged.
pub fn trim(input: &str) -> Cow<'_, str> {
    Cow::Borrowed(input.trim())
}

/// Trims and uppercases, avoiding allocation when the value is already canonical.
pub fn upper_trim(input: &str) -> Cow<'_, str> {
    let trimmed = input.trim();
    if trimmed.chars().all(|ch| !ch.is_lowercase()) {
        Cow::Borrowed(trimmed)
    } else {
        Cow::Owned(trimmed.to_uppercase())
    }
}

/// Trims and lowercases, avoiding allocation when the value is already canonical.
pub fn lower_trim(input: &str) -> Cow<'_, str> {
    let trimmed = input.trim();
    if trimmed.chars().all(|ch| !ch.is_uppercase()) {
        Cow::Borrowed(trimmed)
    } else {
        Cow::Owned(trimmed.to_lowercase())
    }
}

/// Collapses every whitespace run to a single space and trims the ends.
pub fn clean_spaces(input: &str) -> Cow<'_, str> {
    let trimmed = input.trim();
    let needs_work = trimmed
        .as_bytes()
        .windows(2)
        .any(|pair| pair[0].is_ascii_whitespace() && pair[1].is_ascii_whitespace())
        || trimmed.chars().any(|ch| ch.is_whitespace() && ch != ' ');
    if !needs_work {
        return Cow::Borrowed(trimmed);
    }
    let mut out = String::with_capacity(trimmed.len());
    for (idx, word) in trimmed.split_whitespace().enumerate() {
        if idx > 0 {
            out.push(' ');
        }
        out.push_str(word);
    }
    Cow::Owned(out)
}

/// Keeps only digits, folding Thai numerals (U+0E50..=U+0E59) to ASCII.
pub fn digits_only(input: &str) -> Cow<'_, str> {
    if input.bytes().all(|b| b.is_ascii_digit()) {
        Cow::Borrowed(input)
    } else {
        Cow::Owned(input.chars().filter_map(ascii_digit).collect())
    }
}

fn ascii_digit(ch: char) -> Option<char> {
    match ch {
        '0'..='9' => Some(ch),
        '\u{0E50}'..='\u{0E59}' => char::from_digit(u32::from(ch) - 0x0E50, 10),
        _ => None,
    }
}

/// Lowercases and strips everything except ASCII letters and digits.
pub fn alphanumeric_key(input: &str) -> String {
    input
        .chars()
        .filter(|ch| ch.is_ascii_alphanumeric())
        .map(|ch| ch.to_ascii_lowercase())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_spaces_collapses_mixed_whitespace() {
        assert_eq!(clean_spaces("  a \t\t b   c ").as_ref(), "a b c");
        assert!(matches!(clean_spaces("a b"), Cow::Borrowed(_)));
    }

    #[test]
    fn case_helpers_borrow_when_possible() {
        assert!(matches!(upper_trim(" ABC "), Cow::Borrowed("ABC")));
        assert_eq!(lower_trim(" AbC ").as_ref(), "abc");
    }

    #[test]
    fn digits_only_strips_punctuation() {
        assert_eq!(digits_only("(081) 234-5678").as_ref(), "0812345678");
        assert_eq!(alphanumeric_key("Create_Date"), "createdate");
    }

    #[test]
    fn digits_only_folds_thai_numerals() {
        assert_eq!(digits_only("๐๘๑-๒๓๔ 5678").as_ref(), "0812345678");
        assert_eq!(digits_only("๙").as_ref(), "9");
    }
}
