//! Deterministic overlapping text splitter.
//!
//! `split_text` is a pure function of `(text, config)`. Text no longer than
//! `max_chars` is returned untouched as a single chunk. Longer text is cut
//! into windows of at most `max_chars` characters; each cut prefers, in
//! order, the last paragraph break, sentence break, newline, or space inside
//! the window, falling back to a hard character cut. Consecutive chunks share
//! exactly `overlap_chars` characters.

/// Chunking parameters: 1024-character windows sharing 100 characters by
/// default.
#[derive(Debug, Clone, Copy)]
pub struct ChunkingConfig {
    pub max_chars: usize,
    pub overlap_chars: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_chars: 1024,
            overlap_chars: 100,
        }
    }
}

/// Split `text` into an ordered sequence of overlapping chunks.
///
/// Empty input yields an empty sequence. No content is dropped or duplicated
/// beyond the configured overlap.
pub fn split_text(text: &str, config: ChunkingConfig) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }

    let max_chars = config.max_chars.max(1);
    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= max_chars {
        return vec![text.to_string()];
    }

    // Overlap must leave room for the window to advance.
    let overlap = config.overlap_chars.min(max_chars - 1);

    let mut chunks = Vec::new();
    let mut start = 0usize;
    loop {
        let hard_end = (start + max_chars).min(chars.len());
        let end = if hard_end < chars.len() {
            snap_to_boundary(&chars, start + overlap + 1, hard_end)
        } else {
            hard_end
        };

        chunks.push(chars[start..end].iter().collect());
        if end == chars.len() {
            break;
        }
        start = end - overlap;
    }
    chunks
}

/// Best cut point in `chars[floor..end]`, scanning backwards: paragraph
/// break, then sentence break, then newline, then space, else `end`.
fn snap_to_boundary(chars: &[char], floor: usize, end: usize) -> usize {
    let window = &chars[..end];

    for probe in [
        break_after(window, floor, &['\n', '\n']),
        break_after(window, floor, &['.', ' ']),
        break_after(window, floor, &['\n']),
        break_after(window, floor, &[' ']),
    ] {
        if let Some(cut) = probe {
            return cut;
        }
    }
    end
}

/// Position just past the last occurrence of `pattern` ending at or after
/// `floor`, if any.
fn break_after(window: &[char], floor: usize, pattern: &[char]) -> Option<usize> {
    let len = pattern.len();
    if window.len() < len {
        return None;
    }
    (floor.max(len)..=window.len())
        .rev()
        .find(|&cut| window[cut - len..cut] == *pattern)
}
