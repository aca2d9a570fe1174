//! Overlapping fixed-size text splitter.
//!
//! Cuts a record's text into chunks of at most `chunk_size` characters.
//! A chunk prefers to end right after a paragraph break, then a line break,
//! then a space; if none fits it is cut hard at `chunk_size`. The next chunk
//! always starts `chunk_overlap` characters before the previous one ended,
//! so neighbours share exactly that many characters.
//!
//! Lengths are counted in `char`s, never bytes, so multi-byte text is never
//! split inside a code point.

use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::models::{Chunk, RawRecord};

const SEPARATORS: [&str; 3] = ["\n\n", "\n", " "];

/// Split one record. Whitespace-only records produce no chunks.
///
/// `chunk_overlap` must be smaller than `chunk_size` (enforced by config
/// validation); a violating pair is clamped so the splitter always advances.
pub fn split_record(record: &RawRecord, chunk_size: usize, chunk_overlap: usize) -> Vec<Chunk> {
    split_text(&record.text, chunk_size, chunk_overlap)
        .into_iter()
        .enumerate()
        .map(|(index, (start_char, text))| {
            make_chunk(record, index as i64, start_char as i64, text)
        })
        .collect()
}

/// Split every record, preserving record order.
pub fn split_records(records: &[RawRecord], chunk_size: usize, chunk_overlap: usize) -> Vec<Chunk> {
    records
        .iter()
        .flat_map(|r| split_record(r, chunk_size, chunk_overlap))
        .collect()
}

/// Returns `(start_char, text)` pairs.
fn split_text(text: &str, chunk_size: usize, chunk_overlap: usize) -> Vec<(usize, &str)> {
    if text.trim().is_empty() || chunk_size == 0 {
        return Vec::new();
    }
    let overlap = chunk_overlap.min(chunk_size - 1);

    // Byte offset of every char boundary, including the end of the text.
    let bounds: Vec<usize> = text
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(text.len()))
        .collect();
    let total_chars = bounds.len() - 1;

    let mut pieces = Vec::new();
    let mut start = 0usize;

    loop {
        if total_chars - start <= chunk_size {
            pieces.push((start, &text[bounds[start]..]));
            break;
        }

        let hard_end = start + chunk_size;
        // The chunk must be longer than the overlap or the next start would not move.
        let min_end = start + overlap + 1;
        let end = soft_boundary(text, &bounds, min_end, hard_end).unwrap_or(hard_end);

        pieces.push((start, &text[bounds[start]..bounds[end]]));
        start = end - overlap;
    }

    pieces
}

/// Last char index in `min_end..=hard_end` that ends just after a separator.
fn soft_boundary(text: &str, bounds: &[usize], min_end: usize, hard_end: usize) -> Option<usize> {
    let window_start = bounds[min_end.saturating_sub(1)];
    let window = &text[window_start..bounds[hard_end]];

    for sep in SEPARATORS {
        if let Some(pos) = window.rfind(sep) {
            let end_byte = window_start + pos + sep.len();
            let end = bounds.binary_search(&end_byte).ok()?;
            if end >= min_end {
                return Some(end);
            }
        }
    }
    None
}

fn make_chunk(record: &RawRecord, index: i64, start_char: i64, text: &str) -> Chunk {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let hash = format!("{:x}", hasher.finalize());

    Chunk {
        id: Uuid::new_v4().to_string(),
        source: record.source.clone(),
        page: record.page,
        chunk_index: index,
        start_char,
        text: text.to_string(),
        hash,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn record(text: &str) -> RawRecord {
        RawRecord {
            source: PathBuf::from("/docs/a.txt"),
            page: None,
            text: text.to_string(),
        }
    }

    fn char_len(s: &str) -> usize {
        s.chars().count()
    }

    fn shared_overlap(a: &str, b: &str, overlap: usize) -> bool {
        let tail: String = a.chars().skip(char_len(a) - overlap).collect();
        let head: String = b.chars().take(overlap).collect();
        tail == head
    }

    #[test]
    fn short_text_single_chunk() {
        let chunks = split_record(&record("Hello, world!"), 800, 100);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].chunk_index, 0);
        assert_eq!(chunks[0].start_char, 0);
        assert_eq!(chunks[0].text, "Hello, world!");
        assert_eq!(chunks[0].source, PathBuf::from("/docs/a.txt"));
    }

    #[test]
    fn blank_text_yields_nothing() {
        assert!(split_record(&record(""), 800, 100).is_empty());
        assert!(split_record(&record("  \n\n \t"), 800, 100).is_empty());
    }

    #[test]
    fn chunks_bounded_and_overlapping() {
        let text = (0..200)
            .map(|i| format!("Sentence number {} talks about topic {}.", i, i % 7))
            .collect::<Vec<_>>()
            .join(" ");
        let chunks = split_record(&record(&text), 120, 20);
        assert!(chunks.len() > 5);
        for c in &chunks {
            assert!(char_len(&c.text) <= 120, "chunk too long: {}", char_len(&c.text));
        }
        for pair in chunks.windows(2) {
            assert!(shared_overlap(&pair[0].text, &pair[1].text, 20));
        }
    }

    #[test]
    fn prefers_paragraph_boundaries() {
        let para = "a".repeat(50);
        let text = format!("{p}\n\n{p}\n\n{p}", p = para);
        let chunks = split_record(&record(&text), 60, 5);
        assert!(chunks[0].text.ends_with("\n\n"));
        assert_eq!(char_len(&chunks[0].text), 52);
    }

    #[test]
    fn hard_cut_without_separators() {
        let text = "x".repeat(250);
        let chunks = split_record(&record(&text), 100, 10);
        let lens: Vec<usize> = chunks.iter().map(|c| char_len(&c.text)).collect();
        assert_eq!(lens, vec![100, 100, 70]);
        assert_eq!(chunks[1].start_char, 90);
        assert_eq!(chunks[2].start_char, 180);
    }

    #[test]
    fn multibyte_text_counts_chars() {
        let text = "é".repeat(30) + " " + &"ü".repeat(30);
        let chunks = split_record(&record(&text), 25, 5);
        for c in &chunks {
            assert!(char_len(&c.text) <= 25);
        }
        for pair in chunks.windows(2) {
            assert!(shared_overlap(&pair[0].text, &pair[1].text, 5));
        }
    }

    #[test]
    fn chunks_reassemble_original() {
        let text = "one two three\nfour five six\n\nseven eight nine ten eleven twelve";
        let chunks = split_record(&record(text), 16, 4);
        let mut rebuilt: String = chunks[0].text.clone();
        for c in &chunks[1..] {
            rebuilt.extend(c.text.chars().skip(4));
        }
        assert_eq!(rebuilt, text);
    }

    #[test]
    fn indices_contiguous_and_hashes_deterministic() {
        let text = "word ".repeat(400);
        let c1 = split_record(&record(&text), 64, 8);
        let c2 = split_record(&record(&text), 64, 8);
        assert_eq!(c1.len(), c2.len());
        for (i, (a, b)) in c1.iter().zip(c2.iter()).enumerate() {
            assert_eq!(a.chunk_index, i as i64);
            assert_eq!(a.hash, b.hash);
            assert_ne!(a.id, b.id);
        }
    }

    #[test]
    fn split_records_keeps_page_metadata() {
        let records = vec![
            RawRecord {
                source: PathBuf::from("/docs/r.pdf"),
                page: Some(1),
                text: "first page".to_string(),
            },
            RawRecord {
                source: PathBuf::from("/docs/r.pdf"),
                page: Some(2),
                text: "second page".to_string(),
            },
        ];
        let chunks = split_records(&records, 800, 100);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].page, Some(1));
        assert_eq!(chunks[1].page, Some(2));
        assert_eq!(chunks[1].chunk_index, 0);
    }
}
