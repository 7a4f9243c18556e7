//! Word tokenizer for the text between a definition's brackets.

/// Split definition text into words.
///
/// A word is a run of alphanumerics starting with a letter, the contents of
/// a `"..."` string (no escapes), or a run of digits. Anything else
/// separates words.
pub fn tokenize(text: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut chars = text.char_indices().peekable();

    while let Some((start, c)) = chars.next() {
        if c.is_alphabetic() {
            let mut end = start + c.len_utf8();
            while let Some(&(i, next)) = chars.peek() {
                if !next.is_alphanumeric() {
                    break;
                }
                end = i + next.len_utf8();
                chars.next();
            }
            words.push(text[start..end].to_string());
        } else if c == '"' {
            let content_start = start + 1;
            let mut content_end = text.len();
            for (i, next) in chars.by_ref() {
                if next == '"' {
                    content_end = i;
                    break;
                }
            }
            words.push(text[content_start..content_end].to_string());
        } else if c.is_ascii_digit() {
            let mut end = start + 1;
            while let Some(&(i, next)) = chars.peek() {
                if !next.is_ascii_digit() {
                    break;
                }
                end = i + 1;
                chars.next();
            }
            words.push(text[start..end].to_string());
        }
    }

    words
}
