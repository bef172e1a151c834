use std::collections::HashSet;

use anyhow::{Context, Result};
use regex::Regex;

use crate::model::{FullStructure, ParsedChapter, ParsedSection, SectionKind};
use crate::pagemap::{PageMap, select_lines_in_range};
use crate::util::collapse_whitespace;

/// First source page that can hold real chapter content; everything before
/// it is preface and table-of-contents material.
pub const MIN_CONTENT_PAGE: u32 = 71;

/// Shortest collapsed line that can still be a section heading.
const MIN_HEADING_LEN: usize = 14;

/// Longest section title kept without truncation.
const MAX_TITLE_LEN: usize = 60;

/// Heading detection for OCR'd casebook text.
///
/// The patterns are deliberate heuristics tuned to this book family's
/// labeling conventions; downstream consumers depend on their exact
/// behavior, quirks included.
#[derive(Debug)]
pub struct StructureParser {
    chapter_heading: Regex,
    chapter_keyword: Regex,
    trailing_section_marker: Regex,
    section_heading: Regex,
    subsection_heading: Regex,
    subsubsection_heading: Regex,
}

impl StructureParser {
    pub fn new() -> Result<Self> {
        Ok(Self {
            chapter_heading: Regex::new(r"(?i:chapter)\s+(\d+)[.:]?\s+([A-Z][A-Z0-9\s,.:;'&()\-]+)")
                .context("failed to compile chapter heading regex")?,
            chapter_keyword: Regex::new(r"(?i:chapter)\s+\d+")
                .context("failed to compile chapter keyword regex")?,
            trailing_section_marker: Regex::new(r"[A-H]\.\s[A-Z]")
                .context("failed to compile trailing section marker regex")?,
            section_heading: Regex::new(r"^([A-H])\.\s+([A-Z][A-Z0-9\s,.:;'&()\-]+)$")
                .context("failed to compile section heading regex")?,
            subsection_heading: Regex::new(r"^([1-9])\.\s+([A-Z][A-Z0-9\s,.:;'&()\-]+)$")
                .context("failed to compile subsection heading regex")?,
            subsubsection_heading: Regex::new(r#"^([a-h])\.\s+"([^"]+)""#)
                .context("failed to compile sub-subsection heading regex")?,
        })
    }

    /// Scans the full document for chapter headings and returns an ordered,
    /// deduplicated chapter list with page spans.
    ///
    /// Degrades to a single synthetic "Full Text" chapter when no heading
    /// matches; absence of chapters is never an error.
    pub fn detect_chapters(&self, text: &str) -> Result<Vec<ParsedChapter>> {
        let lines: Vec<&str> = text.lines().collect();
        let map = PageMap::build(&lines)?;

        let mut chapters: Vec<ParsedChapter> = Vec::new();
        let mut seen_numbers: HashSet<u32> = HashSet::new();

        for (index, line) in lines.iter().enumerate() {
            if map.source_page(index) < MIN_CONTENT_PAGE {
                continue;
            }

            let collapsed = collapse_whitespace(line);
            // A line repeating the chapter keyword is a TOC listing, not a
            // real heading.
            if self.chapter_keyword.find_iter(&collapsed).count() > 1 {
                continue;
            }

            let Some(captures) = self.chapter_heading.captures(&collapsed) else {
                continue;
            };
            let number = captures[1]
                .parse::<u32>()
                .with_context(|| format!("invalid chapter number in heading: {collapsed}"))?;
            if !seen_numbers.insert(number) {
                continue;
            }

            let raw_title = captures.get(2).map(|m| m.as_str().trim()).unwrap_or("");
            let title = self.strip_trailing_section(raw_title);
            let page = map.logical_page(index);

            chapters.push(ParsedChapter {
                number,
                title,
                start_page: page,
                end_page: page,
            });
        }

        if chapters.is_empty() {
            return Ok(vec![ParsedChapter {
                number: 1,
                title: "Full Text".to_string(),
                start_page: 1,
                end_page: map.max_logical_page(),
            }]);
        }

        chapters.sort_by_key(|chapter| chapter.start_page);

        let next_starts: Vec<u32> = chapters.iter().skip(1).map(|c| c.start_page).collect();
        for (chapter, next_start) in chapters.iter_mut().zip(next_starts) {
            chapter.end_page = next_start.saturating_sub(1);
        }
        if let Some(last) = chapters.last_mut() {
            last.end_page = map.max_logical_page();
        }

        Ok(chapters)
    }

    /// Detects section headings within one chapter's text slice.
    ///
    /// `chapter_start` and `chapter_end` are logical book pages; detected
    /// section pages are confined to that range. Section spans use an
    /// inclusive boundary (a section's end page equals the next section's
    /// start page), unlike chapter spans.
    pub fn detect_sections(
        &self,
        text: &str,
        chapter_start: u32,
        chapter_end: u32,
    ) -> Result<Vec<ParsedSection>> {
        let lines: Vec<&str> = text.lines().collect();
        let map = PageMap::build(&lines)?;

        let mut sections: Vec<ParsedSection> = Vec::new();

        for (index, line) in lines.iter().enumerate() {
            let collapsed = collapse_whitespace(line);
            if collapsed.chars().count() < MIN_HEADING_LEN {
                continue;
            }

            let Some((kind, label, raw_title)) = self.match_section_heading(&collapsed) else {
                continue;
            };

            // Repeated headers and footers re-print the current heading;
            // keep only the first occurrence of a run.
            if let Some(previous) = sections.last() {
                if previous.label == label && previous.kind == kind {
                    continue;
                }
            }

            let page = map
                .logical_page(index)
                .max(chapter_start)
                .min(chapter_end.max(chapter_start));

            sections.push(ParsedSection {
                kind,
                label,
                title: truncate_title(&raw_title),
                start_page: page,
                end_page: chapter_end,
            });
        }

        let next_starts: Vec<u32> = sections.iter().skip(1).map(|s| s.start_page).collect();
        for (section, next_start) in sections.iter_mut().zip(next_starts) {
            section.end_page = next_start;
        }

        Ok(sections)
    }

    /// Detects chapters, then sections within each chapter's logical page
    /// range.
    pub fn detect_full_structure(&self, text: &str) -> Result<FullStructure> {
        let chapters = self.detect_chapters(text)?;
        let lines: Vec<&str> = text.lines().collect();
        let map = PageMap::build(&lines)?;

        let mut sections_by_chapter = Vec::with_capacity(chapters.len());
        for chapter in &chapters {
            let slice = select_lines_in_range(&lines, &map, chapter.start_page, chapter.end_page);
            let sections = self.detect_sections(&slice, chapter.start_page, chapter.end_page)?;
            sections_by_chapter.push(sections);
        }

        Ok(FullStructure {
            chapters,
            sections_by_chapter,
        })
    }

    /// Tries the three heading conventions in fixed priority order; the
    /// first match wins for a line.
    fn match_section_heading(&self, line: &str) -> Option<(SectionKind, String, String)> {
        if let Some(captures) = self.section_heading.captures(line) {
            return Some((
                SectionKind::Section,
                captures[1].to_string(),
                captures[2].trim().to_string(),
            ));
        }

        if let Some(captures) = self.subsection_heading.captures(line) {
            return Some((
                SectionKind::Subsection,
                captures[1].to_string(),
                captures[2].trim().to_string(),
            ));
        }

        if let Some(captures) = self.subsubsection_heading.captures(line) {
            return Some((
                SectionKind::Subsubsection,
                captures[1].to_string(),
                captures[2].trim().to_string(),
            ));
        }

        None
    }

    /// Strips a following section heading that got swept into the chapter
    /// title capture.
    fn strip_trailing_section(&self, title: &str) -> String {
        if let Some(found) = self.trailing_section_marker.find(title) {
            if found.start() > 10 {
                return title[..found.start()].trim_end().to_string();
            }
        }
        title.to_string()
    }
}

/// Cuts an over-long title at the last space before the limit when that
/// space is past the halfway column, otherwise hard-cuts at the limit.
fn truncate_title(title: &str) -> String {
    let title = title.trim();
    if title.chars().count() <= MAX_TITLE_LEN {
        return title.to_string();
    }

    let prefix: String = title.chars().take(MAX_TITLE_LEN).collect();
    match prefix.rfind(' ') {
        Some(position) if position > 30 => prefix[..position].trim_end().to_string(),
        _ => prefix.trim_end().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parser() -> StructureParser {
        StructureParser::new().expect("parser should build")
    }

    #[test]
    fn detects_chapter_heading_with_logical_pages() {
        let text = "--- Page 73 ---\nCHAPTER 1 INTRODUCTION TO TAXATION\nSome body text.\n\n--- Page 74 ---\nA. FIRST TOPIC\nMore text about the first topic.";
        let chapters = parser().detect_chapters(text).unwrap();

        assert_eq!(chapters.len(), 1);
        assert_eq!(chapters[0].number, 1);
        assert_eq!(chapters[0].title, "INTRODUCTION TO TAXATION");
        assert_eq!(chapters[0].start_page, 3);
        assert_eq!(chapters[0].end_page, 4);
    }

    #[test]
    fn duplicate_chapter_numbers_keep_first_occurrence() {
        let text = "--- Page 75 ---\nCHAPTER 3 CAPITAL STRUCTURE\ntext\n--- Page 80 ---\nCHAPTER 3 SOMETHING ELSE\nmore";
        let chapters = parser().detect_chapters(text).unwrap();

        assert_eq!(chapters.len(), 1);
        assert_eq!(chapters[0].number, 3);
        assert_eq!(chapters[0].title, "CAPITAL STRUCTURE");
    }

    #[test]
    fn toc_lines_with_repeated_chapter_keyword_are_skipped() {
        let text = "--- Page 75 ---\nCHAPTER 1 OVERVIEW CHAPTER 2 FORMATION\nbody";
        let chapters = parser().detect_chapters(text).unwrap();

        assert_eq!(chapters.len(), 1);
        assert_eq!(chapters[0].title, "Full Text");
    }

    #[test]
    fn headings_in_front_matter_are_ignored() {
        let text = "--- Page 20 ---\nCHAPTER 9 ACQUISITIVE REORGANIZATIONS\nbody";
        let chapters = parser().detect_chapters(text).unwrap();

        assert_eq!(chapters.len(), 1);
        assert_eq!(chapters[0].title, "Full Text");
        assert_eq!(chapters[0].number, 1);
    }

    #[test]
    fn fallback_chapter_spans_the_whole_document() {
        let text = "--- Page 90 ---\nplain body text only\nnothing that looks like a heading";
        let chapters = parser().detect_chapters(text).unwrap();

        assert_eq!(chapters.len(), 1);
        assert_eq!(chapters[0].start_page, 1);
        assert_eq!(chapters[0].end_page, 20);
    }

    #[test]
    fn chapter_end_pages_chain_to_next_start_minus_one() {
        let text = "--- Page 73 ---\nCHAPTER 1 OVERVIEW OF CORPORATE TAXATION\nbody\n--- Page 141 ---\nCHAPTER 2 FORMATION OF A CORPORATION\nbody\n--- Page 239 ---\nCHAPTER 3 CAPITAL STRUCTURE\nbody\n--- Page 250 ---\ntail";
        let chapters = parser().detect_chapters(text).unwrap();

        assert_eq!(chapters.len(), 3);
        assert_eq!(chapters[0].start_page, 3);
        assert_eq!(chapters[0].end_page, 70);
        assert_eq!(chapters[1].start_page, 71);
        assert_eq!(chapters[1].end_page, 168);
        assert_eq!(chapters[2].start_page, 169);
        assert_eq!(chapters[2].end_page, 180);
    }

    #[test]
    fn chapter_title_drops_trailing_section_heading() {
        let text = "--- Page 75 ---\nCHAPTER 2 FORMATION OF A CORPORATION A. INTRODUCTION\nbody";
        let chapters = parser().detect_chapters(text).unwrap();

        assert_eq!(chapters[0].title, "FORMATION OF A CORPORATION");
    }

    #[test]
    fn detects_lettered_sections_in_order() {
        let text = "A. INTRODUCTION\nbody text here\nB. SCOPE AND POLICY\nmore body";
        let sections = parser().detect_sections(text, 3, 10).unwrap();

        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0].label, "A");
        assert_eq!(sections[0].kind, SectionKind::Section);
        assert_eq!(sections[0].title, "INTRODUCTION");
        assert_eq!(sections[1].label, "B");
        assert_eq!(sections[1].title, "SCOPE AND POLICY");
    }

    #[test]
    fn section_patterns_match_in_priority_order() {
        let text = "A. CONTROL REQUIREMENT\nbody\n1. IMMEDIATELY AFTER THE EXCHANGE\nbody\na. \"Check-the-Box Election\"\nbody";
        let sections = parser().detect_sections(text, 1, 5).unwrap();

        assert_eq!(sections.len(), 3);
        assert_eq!(sections[0].kind, SectionKind::Section);
        assert_eq!(sections[1].kind, SectionKind::Subsection);
        assert_eq!(sections[1].label, "1");
        assert_eq!(sections[2].kind, SectionKind::Subsubsection);
        assert_eq!(sections[2].label, "a");
        assert_eq!(sections[2].title, "Check-the-Box Election");
    }

    #[test]
    fn consecutive_repeated_headings_are_deduplicated() {
        let text = "A. INTRODUCTION\nbody\nA. INTRODUCTION\nmore body\nB. SECOND SECTION\ntail";
        let sections = parser().detect_sections(text, 1, 9).unwrap();

        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0].label, "A");
        assert_eq!(sections[1].label, "B");
    }

    #[test]
    fn section_end_pages_use_inclusive_boundaries() {
        let text = "--- Page 73 ---\nA. FIRST SECTION HERE\nbody\n--- Page 78 ---\nB. SECOND SECTION HERE\nbody";
        let sections = parser().detect_sections(text, 3, 12).unwrap();

        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0].start_page, 3);
        // Inclusive boundary: the first section ends where the next starts.
        assert_eq!(sections[0].end_page, 8);
        assert_eq!(sections[1].start_page, 8);
        assert_eq!(sections[1].end_page, 12);
    }

    #[test]
    fn short_lines_are_not_section_headings() {
        let text = "B. TAX\nbody line that is long enough";
        let sections = parser().detect_sections(text, 1, 2).unwrap();
        assert!(sections.is_empty());
    }

    #[test]
    fn minimal_fourteen_char_heading_is_detected() {
        let text = "A. FIRST TOPIC\nMore text about the first topic.";
        let sections = parser().detect_sections(text, 4, 4).unwrap();

        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].label, "A");
        assert_eq!(sections[0].title, "FIRST TOPIC");
    }

    #[test]
    fn over_long_titles_are_cut_at_a_late_space() {
        let long = format!("A. {} {}", "TRANSFERS OF PROPERTY TO A CONTROLLED", "CORPORATION UNDER THE NONRECOGNITION REGIME");
        let sections = parser().detect_sections(&long, 1, 1).unwrap();

        assert_eq!(sections.len(), 1);
        let title = &sections[0].title;
        assert!(title.chars().count() <= 60, "title too long: {title}");
        assert!(!title.ends_with(' '));
        assert!(title.starts_with("TRANSFERS OF PROPERTY"));
    }

    #[test]
    fn full_structure_pairs_sections_with_their_chapter() {
        let text = "--- Page 73 ---\nCHAPTER 1 INTRODUCTION TO TAXATION\nSome body text.\n\n--- Page 74 ---\nA. FIRST TOPIC\nMore text about the first topic.";
        let structure = parser().detect_full_structure(text).unwrap();

        assert_eq!(structure.chapters.len(), 1);
        assert_eq!(structure.sections_by_chapter.len(), 1);
        let sections = &structure.sections_by_chapter[0];
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].label, "A");
        assert_eq!(sections[0].title, "FIRST TOPIC");
        assert_eq!(sections[0].start_page, 4);
        assert_eq!(sections[0].end_page, structure.chapters[0].end_page);
    }

    #[test]
    fn no_sections_found_yields_empty_list() {
        let sections = parser()
            .detect_sections("plain paragraph text without any headings at all", 1, 3)
            .unwrap();
        assert!(sections.is_empty());
    }
}
