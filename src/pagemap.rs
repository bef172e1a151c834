use anyhow::{Context, Result};
use regex::Regex;

/// Gap between the source document's marker pagination and the book's
/// printed pagination.
pub const PAGE_OFFSET: u32 = 70;

/// Per-line page numbers derived from inline `--- Page N ---` markers.
///
/// Built once per parse over the full line array; both the raw marker page
/// and the offset-translated logical book page are recorded for every line,
/// so later stages never rescan the document.
#[derive(Debug)]
pub struct PageMap {
    source: Vec<u32>,
    logical: Vec<u32>,
}

impl PageMap {
    pub fn build(lines: &[&str]) -> Result<Self> {
        let marker = marker_regex()?;
        let mut source = Vec::with_capacity(lines.len());
        let mut logical = Vec::with_capacity(lines.len());
        let mut current: u32 = 1;

        for line in lines {
            if let Some(captures) = marker.captures(line.trim()) {
                current = captures[1]
                    .parse::<u32>()
                    .with_context(|| format!("invalid page marker number: {}", line.trim()))?;
            }
            source.push(current);
            logical.push(translate(current));
        }

        Ok(Self { source, logical })
    }

    /// Raw page number from the most recent marker at or before this line.
    pub fn source_page(&self, line_index: usize) -> u32 {
        self.source.get(line_index).copied().unwrap_or(1)
    }

    /// Logical book page in effect at this line.
    pub fn logical_page(&self, line_index: usize) -> u32 {
        self.logical.get(line_index).copied().unwrap_or(1)
    }

    pub fn max_logical_page(&self) -> u32 {
        self.logical.iter().copied().max().unwrap_or(1)
    }

    pub fn len(&self) -> usize {
        self.logical.len()
    }

    pub fn is_empty(&self) -> bool {
        self.logical.is_empty()
    }
}

/// Translates a raw marker page into the printed book page, floored at 1.
pub fn translate(source_page: u32) -> u32 {
    source_page.saturating_sub(PAGE_OFFSET).max(1)
}

pub fn marker_regex() -> Result<Regex> {
    Regex::new(r"^---\s*(?i:page)\s+(\d+)\s*---$").context("failed to compile page marker regex")
}

/// Joins back the lines whose logical page falls within the inclusive
/// `[start_page, end_page]` window.
pub fn select_lines_in_range(
    lines: &[&str],
    map: &PageMap,
    start_page: u32,
    end_page: u32,
) -> String {
    lines
        .iter()
        .enumerate()
        .filter(|(index, _)| {
            let page = map.logical_page(*index);
            page >= start_page && page <= end_page
        })
        .map(|(_, line)| *line)
        .collect::<Vec<&str>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(text: &str) -> PageMap {
        let lines: Vec<&str> = text.lines().collect();
        PageMap::build(&lines).expect("page map should build")
    }

    #[test]
    fn lines_without_markers_all_map_to_page_one() {
        let map = build("first line\nsecond line\nthird line");
        for index in 0..map.len() {
            assert_eq!(map.source_page(index), 1);
            assert_eq!(map.logical_page(index), 1);
        }
        assert_eq!(map.max_logical_page(), 1);
    }

    #[test]
    fn marker_advances_logical_page_with_offset() {
        let map = build("before\n--- Page 80 ---\nbody one\nbody two");
        assert_eq!(map.logical_page(0), 1);
        assert_eq!(map.logical_page(1), 10);
        assert_eq!(map.logical_page(2), 10);
        assert_eq!(map.logical_page(3), 10);
        assert_eq!(map.source_page(3), 80);
    }

    #[test]
    fn marker_is_case_insensitive_and_whitespace_tolerant() {
        let map = build("---  PAGE 75  ---\ntext");
        assert_eq!(map.source_page(1), 75);
        assert_eq!(map.logical_page(1), 5);
    }

    #[test]
    fn logical_page_floors_at_one_below_the_offset() {
        let map = build("--- Page 12 ---\ntext");
        assert_eq!(map.logical_page(1), 1);
    }

    #[test]
    fn malformed_marker_lines_are_ignored() {
        let map = build("--- Page ---\n-- Page 90 --\ntext");
        assert_eq!(map.max_logical_page(), 1);
    }

    #[test]
    fn select_lines_in_range_keeps_only_the_window() {
        let text = "--- Page 73 ---\nin window\n--- Page 74 ---\nalso in\n--- Page 75 ---\nout";
        let lines: Vec<&str> = text.lines().collect();
        let map = PageMap::build(&lines).unwrap();
        let selected = select_lines_in_range(&lines, &map, 3, 4);
        assert_eq!(selected, "--- Page 73 ---\nin window\n--- Page 74 ---\nalso in");
    }
}
