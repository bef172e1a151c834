use anyhow::{Context, Result};
use regex::Regex;

use crate::model::{Chunk, ParsedChapter};
use crate::pagemap::{PageMap, select_lines_in_range};
use crate::refs::ReferenceExtractor;

/// Flush the buffer before a paragraph that would push it past this total.
pub const MAX_CHUNK_TOKENS: usize = 400;

/// Flush the buffer as soon as it reaches this total.
pub const MIN_CHUNK_TOKENS: usize = 50;

/// Cheap proxy for content length, not a true tokenization.
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(4)
}

/// Packs chapter text into token-budgeted chunks with per-chunk citation
/// extraction.
#[derive(Debug)]
pub struct ChunkAssembler {
    paragraph_break: Regex,
    references: ReferenceExtractor,
}

impl ChunkAssembler {
    pub fn new() -> Result<Self> {
        Ok(Self {
            paragraph_break: Regex::new(r"\n\s*\n")
                .context("failed to compile paragraph break regex")?,
            references: ReferenceExtractor::new()?,
        })
    }

    /// Re-slices the document by each chapter's logical page range, splits
    /// the slices into paragraphs, and greedily packs them into chunks.
    ///
    /// Chunk sequence numbers are global across the whole document,
    /// starting at 0 and strictly increasing.
    pub fn generate_chunks(
        &self,
        text: &str,
        chapters: &[ParsedChapter],
        textbook_id: &str,
    ) -> Result<Vec<Chunk>> {
        let lines: Vec<&str> = text.lines().collect();
        let map = PageMap::build(&lines)?;

        let mut chunks = Vec::new();
        let mut sequence = 0usize;

        for chapter in chapters {
            let chapter_text =
                select_lines_in_range(&lines, &map, chapter.start_page, chapter.end_page);
            let chapter_id = format!("ch-{}", chapter.number);
            self.pack_chapter(&chapter_text, &chapter_id, textbook_id, &mut sequence, &mut chunks);
        }

        Ok(chunks)
    }

    fn pack_chapter(
        &self,
        chapter_text: &str,
        chapter_id: &str,
        textbook_id: &str,
        sequence: &mut usize,
        chunks: &mut Vec<Chunk>,
    ) {
        let mut buffer: Vec<&str> = Vec::new();
        let mut buffered_tokens = 0usize;

        for paragraph in self.split_paragraphs(chapter_text) {
            let tokens = estimate_tokens(paragraph);

            if !buffer.is_empty() && buffered_tokens + tokens > MAX_CHUNK_TOKENS {
                self.flush(&mut buffer, &mut buffered_tokens, chapter_id, textbook_id, sequence, chunks);
            }

            buffer.push(paragraph);
            buffered_tokens += tokens;

            if buffered_tokens >= MIN_CHUNK_TOKENS {
                self.flush(&mut buffer, &mut buffered_tokens, chapter_id, textbook_id, sequence, chunks);
            }
        }

        self.flush(&mut buffer, &mut buffered_tokens, chapter_id, textbook_id, sequence, chunks);
    }

    fn flush(
        &self,
        buffer: &mut Vec<&str>,
        buffered_tokens: &mut usize,
        chapter_id: &str,
        textbook_id: &str,
        sequence: &mut usize,
        chunks: &mut Vec<Chunk>,
    ) {
        if buffer.is_empty() {
            return;
        }

        let content = buffer.join("\n\n");
        buffer.clear();
        let token_count = *buffered_tokens;
        *buffered_tokens = 0;

        if content.trim().is_empty() {
            return;
        }

        let statutory_refs = self.references.statutory_refs(&content);
        let case_refs = self.references.case_refs(&content);

        chunks.push(Chunk {
            id: format!("{}:chunk:{:05}", textbook_id, *sequence),
            chapter_id: chapter_id.to_string(),
            content,
            page_numbers: Vec::new(),
            token_count,
            statutory_refs,
            case_refs,
            sequence_order: *sequence,
        });
        *sequence += 1;
    }

    fn split_paragraphs<'a>(&self, text: &'a str) -> Vec<&'a str> {
        self.paragraph_break
            .split(text)
            .filter(|paragraph| !paragraph.trim().is_empty())
            .collect()
    }
}
