use std::fs;

use anyhow::{Context, Result};
use rusqlite::Connection;
use tracing::{info, warn};

use crate::cli::StatusArgs;
use crate::model::StructureManifest;

pub fn run(args: StatusArgs) -> Result<()> {
    let manifest_dir = args.cache_root.join("manifests");
    let structure_path = manifest_dir.join("structure.json");
    let db_path = args.cache_root.join("taxbook_index.sqlite");

    info!(cache_root = %args.cache_root.display(), "status requested");

    if structure_path.exists() {
        let raw = fs::read(&structure_path)
            .with_context(|| format!("failed to read {}", structure_path.display()))?;
        let manifest: StructureManifest = serde_json::from_slice(&raw)
            .with_context(|| format!("failed to parse {}", structure_path.display()))?;

        info!(
            generated_at = %manifest.generated_at,
            source = %manifest.source_path,
            chapters = manifest.chapter_count,
            sections = manifest.section_count,
            max_logical_page = manifest.max_logical_page,
            "loaded structure manifest"
        );
    } else {
        warn!(path = %structure_path.display(), "structure manifest missing");
    }

    if db_path.exists() {
        let conn = Connection::open(&db_path)
            .with_context(|| format!("failed to open {}", db_path.display()))?;
        let textbooks_count = query_count(&conn, "SELECT COUNT(*) FROM textbooks").unwrap_or(0);
        let chapters_count = query_count(&conn, "SELECT COUNT(*) FROM chapters").unwrap_or(0);
        let sections_count = query_count(&conn, "SELECT COUNT(*) FROM sections").unwrap_or(0);
        let chunks_count = query_count(&conn, "SELECT COUNT(*) FROM chunks").unwrap_or(0);

        info!(
            path = %db_path.display(),
            textbooks = textbooks_count,
            chapters = chapters_count,
            sections = sections_count,
            chunks = chunks_count,
            "database status"
        );
    } else {
        warn!(path = %db_path.display(), "database file missing");
    }

    Ok(())
}

fn query_count(conn: &Connection, sql: &str) -> Result<i64> {
    let count = conn.query_row(sql, [], |row| row.get(0))?;
    Ok(count)
}
