use crate::error::ExtractError;
use regex::Regex;

/// Section labels are display hints only and get cut at this many chars.
pub const SECTION_LABEL_MAX_CHARS: usize = 80;

#[derive(Debug, Clone, Copy)]
pub struct ChunkingConfig {
    /// Upper bound on accumulated paragraph text per chunk, in chars.
    pub target_size: usize,
    /// Tail of the previous chunk carried into the next one, in chars.
    pub overlap_size: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            target_size: 900,
            overlap_size: 150,
        }
    }
}

impl ChunkingConfig {
    pub fn validate(&self) -> Result<(), ExtractError> {
        if self.overlap_size == 0 || self.overlap_size >= self.target_size {
            return Err(ExtractError::InvalidChunkConfig(format!(
                "overlap {} must satisfy 0 < overlap < target {}",
                self.overlap_size, self.target_size
            )));
        }
        Ok(())
    }
}

/// Collapses runs of horizontal whitespace to a single space and runs of
/// three or more newlines to exactly two, so a blank line is the only
/// paragraph separator the chunker has to recognise.
pub fn normalize_page_text(text: &str) -> Result<String, ExtractError> {
    let horizontal = Regex::new(r"[ \t\u{a0}]+")?;
    let newline_runs = Regex::new(r"\n{3,}")?;

    let collapsed = horizontal.replace_all(text, " ");
    Ok(newline_runs
        .replace_all(&collapsed, "\n\n")
        .trim()
        .to_string())
}

/// Splits one page of normalized text into bounded, overlapping passages.
///
/// Paragraphs are accumulated until the next one would push the buffer past
/// `target_size`; the buffer is then closed and the next buffer starts from
/// the last `overlap_size` chars of the closed chunk. A paragraph that alone
/// exceeds the target is hard-split into `target_size`-char slices after any
/// pending buffer is flushed; no overlap is applied inside such a split.
///
/// Pure function of its inputs: identical input yields identical output.
pub fn chunk_page(text: &str, config: ChunkingConfig) -> Vec<String> {
    let paragraphs = text
        .split("\n\n")
        .map(str::trim)
        .filter(|paragraph| !paragraph.is_empty())
        .collect::<Vec<_>>();

    let mut chunks: Vec<String> = Vec::new();
    let mut current = String::new();

    for paragraph in paragraphs {
        let paragraph_len = paragraph.chars().count();

        if paragraph_len > config.target_size {
            if !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
            }
            chunks.extend(hard_split(paragraph, config.target_size));
            continue;
        }

        if current.is_empty() {
            current.push_str(paragraph);
            continue;
        }

        if current.chars().count() + paragraph_len + 2 <= config.target_size {
            current.push_str("\n\n");
            current.push_str(paragraph);
        } else {
            let next = format!(
                "{}\n\n{}",
                overlap_tail(&current, config.overlap_size),
                paragraph
            );
            chunks.push(std::mem::replace(&mut current, next));
        }
    }

    if !current.is_empty() {
        chunks.push(current);
    }

    chunks
        .into_iter()
        .map(|chunk| chunk.trim().to_string())
        .filter(|chunk| !chunk.is_empty())
        .collect()
}

/// Last `overlap` chars of a closed chunk, or the whole chunk if shorter.
fn overlap_tail(chunk: &str, overlap: usize) -> &str {
    match chunk.char_indices().rev().nth(overlap.saturating_sub(1)) {
        Some((index, _)) => &chunk[index..],
        None => chunk,
    }
}

fn hard_split(paragraph: &str, target: usize) -> Vec<String> {
    let chars: Vec<char> = paragraph.chars().collect();
    chars
        .chunks(target.max(1))
        .map(|slice| slice.iter().collect())
        .collect()
}

/// First line of the chunk, truncated, as a display label.
pub fn guess_section(chunk_text: &str) -> String {
    let first_line = chunk_text.lines().next().unwrap_or_default().trim();
    first_line.chars().take(SECTION_LABEL_MAX_CHARS).collect()
}
