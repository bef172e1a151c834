use std::collections::HashMap;

use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{Connection, params};
use tracing::{info, warn};

use crate::chunker::ChunkAssembler;
use crate::cli::IngestArgs;
use crate::model::{
    Chunk, FullStructure, IngestCounts, IngestPaths, IngestRunManifest, ParsedSection,
};
use crate::pagemap::PageMap;
use crate::structure::StructureParser;
use crate::util::{
    ensure_directory, now_utc_string, read_text_file, sanitize_id, sha256_file, utc_compact_string,
    write_json_pretty,
};

const DB_SCHEMA_VERSION: &str = "0.1.0";

pub fn run(args: IngestArgs) -> Result<()> {
    let started_ts = Utc::now();
    let started_at = now_utc_string();
    let run_id = format!("run-{}", utc_compact_string(started_ts));

    let cache_root = args.cache_root.clone();
    let manifest_dir = cache_root.join("manifests");
    ensure_directory(&manifest_dir)?;

    let ingest_manifest_path = args.ingest_manifest_path.clone().unwrap_or_else(|| {
        manifest_dir.join(format!("ingest_run_{}.json", utc_compact_string(started_ts)))
    });
    let db_path = args
        .db_path
        .clone()
        .unwrap_or_else(|| cache_root.join("taxbook_index.sqlite"));

    let textbook_id = args.textbook_id.clone().unwrap_or_else(|| {
        let stem = args
            .input
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or("textbook");
        sanitize_id(stem)
    });

    info!(
        input = %args.input.display(),
        textbook_id = %textbook_id,
        run_id = %run_id,
        "starting ingest"
    );

    let text = read_text_file(&args.input)?;
    let source_sha256 = sha256_file(&args.input)?;

    let parser = StructureParser::new()?;
    let structure = parser.detect_full_structure(&text)?;

    let assembler = ChunkAssembler::new()?;
    let chunks = assembler.generate_chunks(&text, &structure.chapters, &textbook_id)?;

    let lines: Vec<&str> = text.lines().collect();
    let map = PageMap::build(&lines)?;
    let line_count = lines.len();
    let max_logical_page = map.max_logical_page();

    let mut warnings = Vec::new();
    if structure.chapters.len() == 1 && structure.chapters[0].title == "Full Text" {
        warnings
            .push("no chapter headings detected; degraded to a single full-text chapter".to_string());
    }
    for (chapter, sections) in structure.chapters.iter().zip(&structure.sections_by_chapter) {
        if sections.is_empty() {
            warnings.push(format!("no sections detected in chapter {}", chapter.number));
        }
    }
    for warning in &warnings {
        warn!(warning = %warning, "ingest warning");
    }

    let mut connection = Connection::open(&db_path)
        .with_context(|| format!("failed to open {}", db_path.display()))?;
    configure_connection(&connection)?;
    ensure_schema(&connection)?;

    persist_textbook(
        &mut connection,
        &textbook_id,
        &args.title,
        &args.input.display().to_string(),
        &source_sha256,
        max_logical_page,
        &structure,
        &chunks,
    )?;

    let chapters_total = count_rows(&connection, "SELECT COUNT(*) FROM chapters")?;
    let sections_total = count_rows(&connection, "SELECT COUNT(*) FROM sections")?;
    let chunks_total = count_rows(&connection, "SELECT COUNT(*) FROM chunks")?;

    let sections_detected = structure
        .sections_by_chapter
        .iter()
        .map(Vec::len)
        .sum::<usize>();
    let statutory_refs_total = chunks.iter().map(|c| c.statutory_refs.len()).sum::<usize>();
    let case_refs_total = chunks.iter().map(|c| c.case_refs.len()).sum::<usize>();

    let manifest = IngestRunManifest {
        manifest_version: 1,
        run_id: run_id.clone(),
        db_schema_version: DB_SCHEMA_VERSION.to_string(),
        status: "completed".to_string(),
        started_at,
        updated_at: now_utc_string(),
        command: render_ingest_command(&args),
        textbook_id: textbook_id.clone(),
        textbook_title: args.title.clone(),
        source_sha256,
        paths: IngestPaths {
            cache_root: cache_root.display().to_string(),
            manifest_dir: manifest_dir.display().to_string(),
            input_path: args.input.display().to_string(),
            db_path: db_path.display().to_string(),
        },
        counts: IngestCounts {
            line_count,
            max_logical_page,
            chapters_detected: structure.chapters.len(),
            sections_detected,
            chunks_inserted: chunks.len(),
            statutory_refs_total,
            case_refs_total,
            chapters_total,
            sections_total,
            chunks_total,
        },
        warnings,
        notes: vec![
            "Ingest command completed using the local sqlite store.".to_string(),
            "Chapter and section detection uses heading heuristics over the page-marked text layer."
                .to_string(),
        ],
    };

    write_json_pretty(&ingest_manifest_path, &manifest)?;

    info!(path = %ingest_manifest_path.display(), "wrote ingest run manifest");
    info!(
        chapters = structure.chapters.len(),
        sections = sections_detected,
        chunks = chunks.len(),
        "ingest completed"
    );

    Ok(())
}

fn configure_connection(connection: &Connection) -> Result<()> {
    connection
        .pragma_update(None, "journal_mode", "WAL")
        .context("failed to set journal_mode=WAL")?;
    connection
        .pragma_update(None, "synchronous", "NORMAL")
        .context("failed to set synchronous=NORMAL")?;
    Ok(())
}

fn ensure_schema(connection: &Connection) -> Result<()> {
    connection.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS metadata (
          key TEXT PRIMARY KEY,
          value TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS textbooks (
          textbook_id TEXT PRIMARY KEY,
          title TEXT NOT NULL,
          source_path TEXT NOT NULL,
          sha256 TEXT NOT NULL,
          imported_at TEXT NOT NULL,
          max_page INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS chapters (
          chapter_id TEXT PRIMARY KEY,
          textbook_id TEXT NOT NULL,
          number INTEGER NOT NULL,
          title TEXT NOT NULL,
          page_start INTEGER NOT NULL,
          page_end INTEGER NOT NULL,
          FOREIGN KEY(textbook_id) REFERENCES textbooks(textbook_id)
        );

        CREATE TABLE IF NOT EXISTS sections (
          section_id TEXT PRIMARY KEY,
          textbook_id TEXT NOT NULL,
          chapter_id TEXT NOT NULL,
          kind TEXT NOT NULL,
          label TEXT NOT NULL,
          title TEXT NOT NULL,
          page_start INTEGER NOT NULL,
          page_end INTEGER NOT NULL,
          FOREIGN KEY(chapter_id) REFERENCES chapters(chapter_id)
        );

        CREATE TABLE IF NOT EXISTS chunks (
          chunk_id TEXT PRIMARY KEY,
          textbook_id TEXT NOT NULL,
          chapter_id TEXT NOT NULL,
          chunk_seq INTEGER NOT NULL,
          token_count INTEGER NOT NULL,
          statutory_refs TEXT NOT NULL,
          case_refs TEXT NOT NULL,
          content TEXT NOT NULL,
          FOREIGN KEY(textbook_id) REFERENCES textbooks(textbook_id)
        );
        ",
    )?;

    let now = now_utc_string();
    connection.execute(
        "INSERT INTO metadata(key, value) VALUES('db_schema_version', ?1)
         ON CONFLICT(key) DO UPDATE SET value=excluded.value",
        [DB_SCHEMA_VERSION],
    )?;
    connection.execute(
        "INSERT INTO metadata(key, value) VALUES('db_updated_at', ?1)
         ON CONFLICT(key) DO UPDATE SET value=excluded.value",
        [now],
    )?;

    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn persist_textbook(
    connection: &mut Connection,
    textbook_id: &str,
    title: &str,
    source_path: &str,
    source_sha256: &str,
    max_page: u32,
    structure: &FullStructure,
    chunks: &[Chunk],
) -> Result<()> {
    let tx = connection.transaction()?;

    // Re-ingest replaces the textbook's rows rather than duplicating them.
    tx.execute("DELETE FROM chunks WHERE textbook_id = ?1", [textbook_id])?;
    tx.execute("DELETE FROM sections WHERE textbook_id = ?1", [textbook_id])?;
    tx.execute("DELETE FROM chapters WHERE textbook_id = ?1", [textbook_id])?;

    tx.execute(
        "
        INSERT INTO textbooks(textbook_id, title, source_path, sha256, imported_at, max_page)
        VALUES(?1, ?2, ?3, ?4, ?5, ?6)
        ON CONFLICT(textbook_id) DO UPDATE SET
          title=excluded.title,
          source_path=excluded.source_path,
          sha256=excluded.sha256,
          imported_at=excluded.imported_at,
          max_page=excluded.max_page
        ",
        params![textbook_id, title, source_path, source_sha256, now_utc_string(), max_page],
    )?;

    {
        let mut chapter_statement = tx.prepare(
            "
            INSERT INTO chapters(chapter_id, textbook_id, number, title, page_start, page_end)
            VALUES(?1, ?2, ?3, ?4, ?5, ?6)
            ",
        )?;
        let mut section_statement = tx.prepare(
            "
            INSERT INTO sections(
              section_id, textbook_id, chapter_id, kind, label, title, page_start, page_end
            )
            VALUES(?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ",
        )?;

        for (chapter, sections) in structure
            .chapters
            .iter()
            .zip(&structure.sections_by_chapter)
        {
            let chapter_id = format!("ch-{}", chapter.number);
            chapter_statement.execute(params![
                chapter_id,
                textbook_id,
                chapter.number,
                &chapter.title,
                chapter.start_page,
                chapter.end_page
            ])?;

            let mut seen_labels: HashMap<String, i64> = HashMap::new();
            for section in sections {
                let section_id = section_id_for(&chapter_id, section, &mut seen_labels);
                section_statement.execute(params![
                    section_id,
                    textbook_id,
                    chapter_id,
                    section.kind.as_str(),
                    &section.label,
                    &section.title,
                    section.start_page,
                    section.end_page
                ])?;
            }
        }
    }

    {
        let mut chunk_statement = tx.prepare(
            "
            INSERT INTO chunks(
              chunk_id, textbook_id, chapter_id, chunk_seq, token_count,
              statutory_refs, case_refs, content
            )
            VALUES(?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ",
        )?;

        for chunk in chunks {
            let statutory_refs = serde_json::to_string(&chunk.statutory_refs)
                .context("failed to serialize statutory references")?;
            let case_refs = serde_json::to_string(&chunk.case_refs)
                .context("failed to serialize case references")?;

            chunk_statement.execute(params![
                &chunk.id,
                textbook_id,
                &chunk.chapter_id,
                chunk.sequence_order as i64,
                chunk.token_count as i64,
                statutory_refs,
                case_refs,
                &chunk.content
            ])?;
        }
    }

    tx.commit()?;
    Ok(())
}

fn section_id_for(
    chapter_id: &str,
    section: &ParsedSection,
    seen_labels: &mut HashMap<String, i64>,
) -> String {
    let key = format!("{}:{}", section.kind.as_str(), section.label.to_lowercase());
    let count = seen_labels
        .entry(key)
        .and_modify(|value| *value += 1)
        .or_insert(1);

    format!(
        "{}:{}:{}:{:03}",
        chapter_id,
        section.kind.as_str(),
        section.label.to_lowercase(),
        count
    )
}

fn count_rows(connection: &Connection, sql: &str) -> Result<i64> {
    let count = connection.query_row(sql, [], |row| row.get(0))?;
    Ok(count)
}

fn render_ingest_command(args: &IngestArgs) -> String {
    let mut command = vec![
        "taxbook".to_string(),
        "ingest".to_string(),
        "--input".to_string(),
        args.input.display().to_string(),
        "--cache-root".to_string(),
        args.cache_root.display().to_string(),
    ];

    if let Some(path) = &args.db_path {
        command.push("--db-path".to_string());
        command.push(path.display().to_string());
    }
    if let Some(path) = &args.ingest_manifest_path {
        command.push("--ingest-manifest-path".to_string());
        command.push(path.display().to_string());
    }
    if let Some(textbook_id) = &args.textbook_id {
        command.push("--textbook-id".to_string());
        command.push(textbook_id.clone());
    }
    command.push("--title".to_string());
    command.push(args.title.clone());

    command.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SectionKind;

    fn section(kind: SectionKind, label: &str) -> ParsedSection {
        ParsedSection {
            kind,
            label: label.to_string(),
            title: "TITLE".to_string(),
            start_page: 1,
            end_page: 2,
        }
    }

    #[test]
    fn section_ids_count_repeated_labels() {
        let mut seen = HashMap::new();
        let first = section_id_for("ch-2", &section(SectionKind::Section, "A"), &mut seen);
        let second = section_id_for("ch-2", &section(SectionKind::Section, "A"), &mut seen);
        let other = section_id_for("ch-2", &section(SectionKind::Subsection, "1"), &mut seen);

        assert_eq!(first, "ch-2:section:a:001");
        assert_eq!(second, "ch-2:section:a:002");
        assert_eq!(other, "ch-2:subsection:1:001");
    }

    #[test]
    fn render_ingest_command_includes_optional_flags() {
        let args = IngestArgs {
            input: "book.txt".into(),
            cache_root: ".cache/taxbook".into(),
            db_path: None,
            ingest_manifest_path: None,
            textbook_id: Some("corporate-tax".to_string()),
            title: "Fundamentals".to_string(),
        };

        let rendered = render_ingest_command(&args);
        assert!(rendered.starts_with("taxbook ingest --input book.txt"));
        assert!(rendered.contains("--textbook-id corporate-tax"));
        assert!(rendered.contains("--title Fundamentals"));
    }
}
