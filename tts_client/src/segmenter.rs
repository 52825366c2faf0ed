//! Sentence splitting for the service's per-request text limit.

/// Characters that end a sentence (or clause) and make a good split point
const SENTENCE_TERMINATORS: &[char] = &[
    '.', '!', '?', ';', '…', '。', '！', '？', '；', '\n',
];

/// Split `text` into trimmed chunks of at most `max_chars` characters.
///
/// Within each window of `max_chars` characters the split goes after the last
/// sentence terminator, else at whitespace (including whitespace right after
/// the window), else exactly at the limit. A `.` only ends a sentence when
/// followed by whitespace or the end of the text, so `3.14` stays whole.
///
/// Every chunk has at least one alphanumeric character. Leftover punctuation
/// is appended to the previous chunk when it fits and dropped otherwise.
/// Empty or whitespace-only input gives no chunks. A limit of 0 is treated as 1.
pub fn split_sentences(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut chunks = Vec::new();
    let mut rest = text.trim();

    while !rest.is_empty() {
        let window_end = match rest.char_indices().nth(max_chars) {
            Some((idx, _)) => idx,
            None => {
                push_chunk(&mut chunks, rest, max_chars);
                break;
            }
        };

        let split_at = find_boundary(rest, window_end).unwrap_or(window_end);
        let (chunk, tail) = rest.split_at(split_at);

        push_chunk(&mut chunks, chunk, max_chars);
        rest = tail.trim_start();
    }

    chunks
}

fn push_chunk(chunks: &mut Vec<String>, chunk: &str, max_chars: usize) {
    let chunk = chunk.trim();
    if chunk.is_empty() {
        return;
    }
    if chunk.chars().any(char::is_alphanumeric) {
        chunks.push(chunk.to_string());
        return;
    }

    // Nothing to speak on its own
    if let Some(last) = chunks.last_mut() {
        if last.chars().count() + chunk.chars().count() <= max_chars {
            last.push_str(chunk);
            return;
        }
    }
    log::debug!("Dropping punctuation-only chunk {:?}", chunk);
}

/// Byte offset of the preferred split point for the window `rest[..window_end]`
fn find_boundary(rest: &str, window_end: usize) -> Option<usize> {
    let window = &rest[..window_end];

    window
        .char_indices()
        .rev()
        .find_map(|(idx, c)| {
            let end = idx + c.len_utf8();
            ends_sentence(c, rest[end..].chars().next()).then_some(end)
        })
        .or_else(|| {
            rest[window_end..]
                .starts_with(char::is_whitespace)
                .then_some(window_end)
        })
        .or_else(|| {
            window
                .char_indices()
                .rev()
                .find(|(_, c)| c.is_whitespace())
                .map(|(idx, _)| idx)
        })
        .filter(|&idx| idx > 0)
}

fn ends_sentence(c: char, next: Option<char>) -> bool {
    match c {
        '.' => next.map_or(true, char::is_whitespace),
        _ => SENTENCE_TERMINATORS.contains(&c),
    }
}
