//! Text chunking with fixed overlap and boundary-preferring cuts.
//!
//! Chunks are measured in characters. Each chunk after the first starts
//! exactly `overlap` characters before the previous chunk's end, so joining
//! the chunks while dropping exactly `overlap` characters from the head of
//! every chunk but the first reconstructs the source text. Cut points
//! prefer, in order: paragraph break, line break, sentence-ending
//! punctuation, whitespace, hard cut at the size limit.

/// Sentence-ending punctuation, including the CJK full-width set.
const SENTENCE_ENDINGS: &[char] = &['.', '!', '?', ';', '。', '！', '？', '；'];

/// Split `text` into overlapping chunks.
///
/// Deterministic for a given `(text, chunk_size, overlap)`. Empty input
/// yields no chunks; no chunk exceeds `chunk_size` characters. An `overlap`
/// that is not smaller than `chunk_size` is treated as zero.
pub fn split_text(text: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
    if text.is_empty() || chunk_size == 0 {
        return Vec::new();
    }

    let overlap = if overlap >= chunk_size { 0 } else { overlap };
    let chars: Vec<char> = text.chars().collect();
    let total = chars.len();

    let mut chunks = Vec::new();
    let mut start = 0;

    while start < total {
        let remaining = total - start;

        if remaining <= chunk_size {
            chunks.push(chars[start..].iter().collect());
            break;
        }

        let window = &chars[start..start + chunk_size];
        let cut = find_cut(window, overlap);

        chunks.push(window[..cut].iter().collect());

        // Rewind by exactly `overlap` so consecutive chunks share that many
        // characters; `cut > overlap` guarantees forward progress.
        start += cut - overlap;
    }

    tracing::debug!(
        "Chunked {} chars into {} chunks (size: {}, overlap: {})",
        total,
        chunks.len(),
        chunk_size,
        overlap
    );

    chunks
}

/// Choose the cut position inside a full-size window.
///
/// Boundary cuts are only taken in the back half of the window so boundary-
/// dense text does not degenerate into slivers; when no acceptable boundary
/// exists the window is cut at its full size.
fn find_cut(window: &[char], overlap: usize) -> usize {
    let size = window.len();
    let min_cut = (size / 2).max(overlap + 1);

    if let Some(cut) = last_paragraph_break(window, min_cut) {
        return cut;
    }
    if let Some(cut) = last_match(window, min_cut, |c| c == '\n') {
        return cut;
    }
    if let Some(cut) = last_match(window, min_cut, |c| SENTENCE_ENDINGS.contains(&c)) {
        return cut;
    }
    if let Some(cut) = last_match(window, min_cut, |c| c.is_whitespace()) {
        return cut;
    }

    size
}

/// Last position `p >= min_cut` where `window[p-2..p]` is a blank line.
fn last_paragraph_break(window: &[char], min_cut: usize) -> Option<usize> {
    (min_cut.max(2)..=window.len())
        .rev()
        .find(|&p| window[p - 1] == '\n' && window[p - 2] == '\n')
}

/// Last position `p >= min_cut` where the character before `p` matches.
fn last_match(window: &[char], min_cut: usize, pred: impl Fn(char) -> bool) -> Option<usize> {
    (min_cut.max(1)..=window.len())
        .rev()
        .find(|&p| pred(window[p - 1]))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Reassemble chunks by dropping the shared prefix of each chunk after
    /// the first.
    fn reconstruct(chunks: &[String], overlap: usize) -> String {
        let mut out = String::new();
        for (i, chunk) in chunks.iter().enumerate() {
            if i == 0 {
                out.push_str(chunk);
            } else {
                out.extend(chunk.chars().skip(overlap));
            }
        }
        out
    }

    #[test]
    fn test_empty_input() {
        assert!(split_text("", 500, 50).is_empty());
    }

    #[test]
    fn test_short_input_single_chunk() {
        let chunks = split_text("short text", 500, 50);
        assert_eq!(chunks, vec!["short text".to_string()]);
    }

    #[test]
    fn test_no_chunk_exceeds_size() {
        let text = "a".repeat(3000);
        let chunks = split_text(&text, 500, 50);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 500);
        }
    }

    #[test]
    fn test_reconstruction_plain() {
        let text = "abcdefghij".repeat(137);
        let chunks = split_text(&text, 200, 30);
        assert_eq!(reconstruct(&chunks, 30), text);
    }

    #[test]
    fn test_reconstruction_with_boundaries() {
        let text = "First paragraph with some words.\n\nSecond paragraph, also with words. \
                    Third sentence here! Fourth one? More text follows. "
            .repeat(20);
        let chunks = split_text(&text, 300, 40);
        assert!(chunks.len() > 1);
        assert_eq!(reconstruct(&chunks, 40), text);
    }

    #[test]
    fn test_exact_overlap_between_chunks() {
        let text = "word ".repeat(400);
        let chunks = split_text(&text, 250, 25);

        for pair in chunks.windows(2) {
            let prev: Vec<char> = pair[0].chars().collect();
            let next: Vec<char> = pair[1].chars().collect();
            let tail: String = prev[prev.len() - 25..].iter().collect();
            let head: String = next[..25].iter().collect();
            assert_eq!(tail, head);
        }
    }

    #[test]
    fn test_prefers_paragraph_break() {
        // One paragraph break in the back half of the first window
        let mut text = "x".repeat(400);
        text.push_str("\n\n");
        text.push_str(&"y".repeat(400));

        let chunks = split_text(&text, 500, 50);
        assert!(chunks[0].ends_with("\n\n"));
    }

    #[test]
    fn test_sentence_boundary_cut() {
        // No newlines; one period in the back half of the window
        let mut text = "x".repeat(380);
        text.push('.');
        text.push_str(&"y".repeat(400));

        let chunks = split_text(&text, 500, 50);
        assert!(chunks[0].ends_with('.'));
    }

    #[test]
    fn test_deterministic() {
        let text = "Some repeating sample text with, punctuation. ".repeat(50);
        assert_eq!(split_text(&text, 500, 50), split_text(&text, 500, 50));
    }

    #[test]
    fn test_two_thousand_chars_makes_at_least_four_chunks() {
        let text = "word and more words to fill the line. ".repeat(53); // > 2000 chars
        let text: String = text.chars().take(2000).collect();
        let chunks = split_text(&text, 500, 50);
        assert!(chunks.len() >= 4, "got {} chunks", chunks.len());
    }

    #[test]
    fn test_degenerate_overlap_treated_as_zero() {
        let text = "abc".repeat(100);
        let chunks = split_text(&text, 10, 10);
        assert_eq!(reconstruct(&chunks, 0), text);
    }

    #[test]
    fn test_multibyte_text_reconstructs() {
        let text = "知识库中的文档内容。这是第二句话！然后是第三句；最后一句吗？".repeat(30);
        let chunks = split_text(&text, 120, 20);
        assert_eq!(reconstruct(&chunks, 20), text);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 120);
        }
    }
}
