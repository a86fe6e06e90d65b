//! Paragraph-first greedy text chunker.
//!
//! Splits document text into bounded-size pieces for embedding. The target
//! size is a packing goal, not a hard cap: a single sentence longer than the
//! target is emitted whole rather than truncated.
//!
//! # Algorithm
//!
//! 1. Split on blank-line paragraph boundaries. If the document has at most
//!    one paragraph, split on single newlines instead.
//! 2. Greedily pack units into a buffer joined by `"\n\n"`, flushing when the
//!    next unit would push the buffer past `target_chars`.
//! 3. A unit longer than `target_chars` flushes the buffer and is split into
//!    sentences (terminal punctuation kept attached), which are packed the
//!    same way joined by `" "`.
//!
//! Lengths are measured in characters, not bytes.
//!
//! # Example
//!
//! ```rust
//! use context_agent_core::chunk::chunk_text;
//!
//! let chunks = chunk_text("Hello world.\n\nSecond paragraph.", 300);
//! assert_eq!(chunks, vec!["Hello world.\n\nSecond paragraph.".to_string()]);
//! ```

/// Default packing target, in characters.
pub const DEFAULT_TARGET_CHARS: usize = 300;

/// Chunks shorter than this (after trimming) are not worth embedding.
pub const DEFAULT_MIN_CHUNK_CHARS: usize = 50;

/// Split `text` into chunks packed up to `target_chars`.
///
/// Returned chunks are trimmed and never empty. Their order follows the
/// document, and the position in the returned vector is the chunk index.
pub fn chunk_text(text: &str, target_chars: usize) -> Vec<String> {
    let mut units = split_paragraphs(text);
    if units.len() <= 1 {
        units = text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect();
    }

    let mut packer = Packer::new(target_chars);
    for unit in &units {
        if char_len(unit) > target_chars {
            packer.flush();
            for sentence in split_sentences(unit) {
                packer.push(sentence, " ");
            }
        } else {
            packer.push(unit, "\n\n");
        }
    }
    packer.finish()
}

/// Whether a chunk is long enough to keep, measured after trimming.
pub fn is_substantial(chunk: &str, min_chars: usize) -> bool {
    char_len(chunk.trim()) >= min_chars
}

struct Packer {
    target: usize,
    chunks: Vec<String>,
    current: String,
    current_len: usize,
}

impl Packer {
    fn new(target: usize) -> Self {
        Self {
            target,
            chunks: Vec::new(),
            current: String::new(),
            current_len: 0,
        }
    }

    fn push(&mut self, piece: &str, separator: &str) {
        let piece = piece.trim();
        if piece.is_empty() {
            return;
        }
        let piece_len = char_len(piece);

        if !self.current.is_empty() && self.current_len + piece_len > self.target {
            self.flush();
        }
        if !self.current.is_empty() {
            self.current.push_str(separator);
            self.current_len += char_len(separator);
        }
        self.current.push_str(piece);
        self.current_len += piece_len;
    }

    fn flush(&mut self) {
        let trimmed = self.current.trim();
        if !trimmed.is_empty() {
            self.chunks.push(trimmed.to_string());
        }
        self.current.clear();
        self.current_len = 0;
    }

    fn finish(mut self) -> Vec<String> {
        self.flush();
        self.chunks
    }
}

/// Group consecutive non-blank lines into paragraphs. A whitespace-only
/// line ends the current paragraph.
fn split_paragraphs(text: &str) -> Vec<String> {
    let mut paragraphs = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for line in text.lines() {
        if line.trim().is_empty() {
            if !current.is_empty() {
                paragraphs.push(current.join("\n"));
                current.clear();
            }
        } else {
            current.push(line);
        }
    }
    if !current.is_empty() {
        paragraphs.push(current.join("\n"));
    }

    paragraphs
        .into_iter()
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .collect()
}

/// Split on runs of `.`, `!`, `?` that are followed by whitespace or the end
/// of the text. The punctuation stays with its sentence, so decimals such as
/// `3.5` are not broken apart.
fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        if !is_terminal(c) {
            continue;
        }
        let mut end = i + c.len_utf8();
        while let Some(&(j, next)) = chars.peek() {
            if !is_terminal(next) {
                break;
            }
            end = j + next.len_utf8();
            chars.next();
        }
        let at_boundary = chars.peek().map_or(true, |&(_, next)| next.is_whitespace());
        if at_boundary {
            let sentence = text[start..end].trim();
            if !sentence.is_empty() {
                sentences.push(sentence);
            }
            start = end;
        }
    }

    let tail = text[start..].trim();
    if !tail.is_empty() {
        sentences.push(tail);
    }
    sentences
}

fn is_terminal(c: char) -> bool {
    matches!(c, '.' | '!' | '?')
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}
