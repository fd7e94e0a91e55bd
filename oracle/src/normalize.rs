//! Post text shaping: cleanup of raw model output and length normalization.
//!
//! Lengths are counted in Unicode scalar values, never bytes.

pub const ELLIPSIS: &str = "...";

const ELLIPSIS_LEN: usize = 3;

/// Reduce `text` to at most `max_len` characters, preferring line and
/// sentence boundaries over mid-word cuts.
///
/// Never fails. When `max_len` is smaller than the ellipsis the first
/// `max_len` characters are returned as-is.
pub fn truncate(text: &str, max_len: usize) -> String {
    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= max_len {
        return text.to_string();
    }
    if max_len < ELLIPSIS_LEN {
        return chars[..max_len].iter().collect();
    }

    let window = &chars[..max_len];

    if let Some(pos) = window.iter().rposition(|&c| c == '\n').filter(|&pos| pos > 0) {
        return chars[..pos].iter().collect();
    }

    if let Some(pos) = window.iter().rposition(|&c| c == '.') {
        return chars[..=pos].iter().collect();
    }

    if let Some(cut) = cut_before_last_period(&chars, max_len) {
        return cut.iter().collect();
    }

    let room = max_len - ELLIPSIS_LEN;
    let mut truncated: String = match chars[..=room]
        .iter()
        .rposition(|c| c.is_whitespace())
        .filter(|&pos| pos > 0)
    {
        Some(pos) => chars[..pos].iter().collect(),
        None => chars[..room].iter().collect(),
    };
    truncated.push_str(ELLIPSIS);
    truncated
}

/// Drop everything from the last period on, at most twice, until the text fits.
fn cut_before_last_period(chars: &[char], max_len: usize) -> Option<&[char]> {
    let mut current = chars;
    for _ in 0..2 {
        let pos = current.iter().rposition(|&c| c == '.')?;
        current = &current[..pos];
        if current.len() <= max_len {
            return Some(current);
        }
    }
    None
}

/// Normalize raw model output before it is measured or posted: literal `\n`
/// escapes become line breaks, one pair of wrapping quotes is removed and
/// surrounding whitespace is trimmed.
pub fn clean_post(text: &str) -> String {
    let unescaped = text.replace("\\n", "\n");
    let trimmed = unescaped.trim();
    strip_wrapping_quotes(trimmed).trim().to_string()
}

fn strip_wrapping_quotes(text: &str) -> &str {
    let mut chars = text.chars();
    match (chars.next(), chars.next_back()) {
        (Some(first @ ('"' | '\'')), Some(last)) if first == last => chars.as_str(),
        _ => text,
    }
}

/// Put `1.`, `2.` and `3.` enumerations on their own lines.
pub fn split_numbered_lines(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len() + 3);

    for (i, &c) in chars.iter().enumerate() {
        let starts_item = matches!(c, '1' | '2' | '3')
            && chars.get(i + 1) == Some(&'.')
            && i > 0
            && !is_word_char(chars[i - 1])
            && chars[i - 1] != '\n';
        if starts_item {
            let kept = out.trim_end_matches([' ', '\t']).len();
            out.truncate(kept);
            if !out.is_empty() && !out.ends_with('\n') {
                out.push('\n');
            }
        }
        out.push(c);
    }

    out
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}
