use anyhow::{Context, Result};

use crate::model::ChapterPage;
use crate::pagemap;

/// Walks the document once and emits one record per physical page whose
/// logical book page falls within `[start_page, end_page]`.
///
/// Content is verbatim apart from leading/trailing whitespace trimming;
/// the walk stops as soon as a marker moves past the window.
pub fn extract_chapter_pages(
    text: &str,
    start_page: u32,
    end_page: u32,
) -> Result<Vec<ChapterPage>> {
    let marker = pagemap::marker_regex()?;

    let mut pages = Vec::new();
    let mut buffer: Vec<&str> = Vec::new();
    let mut current_source: u32 = 1;
    let mut in_range = {
        let logical = pagemap::translate(current_source);
        logical >= start_page && logical <= end_page
    };

    for line in text.lines() {
        let trimmed = line.trim();

        if let Some(captures) = marker.captures(trimmed) {
            if in_range {
                flush_page(&mut pages, &mut buffer, pagemap::translate(current_source));
            } else {
                buffer.clear();
            }

            current_source = captures[1]
                .parse::<u32>()
                .with_context(|| format!("invalid page marker number: {trimmed}"))?;
            let logical = pagemap::translate(current_source);
            if logical > end_page {
                return Ok(pages);
            }
            in_range = logical >= start_page && logical <= end_page;
            continue;
        }

        if in_range {
            buffer.push(line);
        }
    }

    if in_range {
        flush_page(&mut pages, &mut buffer, pagemap::translate(current_source));
    }

    Ok(pages)
}

fn flush_page(pages: &mut Vec<ChapterPage>, buffer: &mut Vec<&str>, page_number: u32) {
    let content = buffer.join("\n").trim().to_string();
    buffer.clear();

    if content.is_empty() {
        return;
    }

    pages.push(ChapterPage {
        page_number,
        content,
    });
}
