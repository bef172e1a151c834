use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedChapter {
    pub number: u32,
    pub title: String,
    pub start_page: u32,
    pub end_page: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionKind {
    Section,
    Subsection,
    Subsubsection,
}

impl SectionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SectionKind::Section => "section",
            SectionKind::Subsection => "subsection",
            SectionKind::Subsubsection => "subsubsection",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedSection {
    pub kind: SectionKind,
    pub label: String,
    pub title: String,
    pub start_page: u32,
    pub end_page: u32,
}

/// Chapter list plus the sections detected within each chapter's page range.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FullStructure {
    pub chapters: Vec<ParsedChapter>,
    pub sections_by_chapter: Vec<Vec<ParsedSection>>,
}

/// Token-budgeted span of consecutive paragraphs within one chapter.
///
/// `page_numbers` is left empty by the assembler; downstream enrichment may
/// fill it in before persistence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub id: String,
    pub chapter_id: String,
    pub content: String,
    pub page_numbers: Vec<u32>,
    pub token_count: usize,
    pub statutory_refs: Vec<String>,
    pub case_refs: Vec<String>,
    pub sequence_order: usize,
}

/// Verbatim content of one physical page, keyed by logical book page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterPage {
    pub page_number: u32,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChapterOutline {
    pub chapter: ParsedChapter,
    pub sections: Vec<ParsedSection>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructureManifest {
    pub manifest_version: u32,
    pub generated_at: String,
    pub source_path: String,
    pub source_sha256: String,
    pub line_count: usize,
    pub max_logical_page: u32,
    pub chapter_count: usize,
    pub section_count: usize,
    pub chapters: Vec<ChapterOutline>,
}

#[derive(Debug, Clone, Serialize)]
pub struct IngestPaths {
    pub cache_root: String,
    pub manifest_dir: String,
    pub input_path: String,
    pub db_path: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct IngestCounts {
    pub line_count: usize,
    pub max_logical_page: u32,
    pub chapters_detected: usize,
    pub sections_detected: usize,
    pub chunks_inserted: usize,
    pub statutory_refs_total: usize,
    pub case_refs_total: usize,
    pub chapters_total: i64,
    pub sections_total: i64,
    pub chunks_total: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct IngestRunManifest {
    pub manifest_version: u32,
    pub run_id: String,
    pub db_schema_version: String,
    pub status: String,
    pub started_at: String,
    pub updated_at: String,
    pub command: String,
    pub textbook_id: String,
    pub textbook_title: String,
    pub source_sha256: String,
    pub paths: IngestPaths,
    pub counts: IngestCounts,
    pub warnings: Vec<String>,
    pub notes: Vec<String>,
}
