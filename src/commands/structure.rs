use anyhow::Result;
use tracing::info;

use crate::cli::StructureArgs;
use crate::model::{ChapterOutline, StructureManifest};
use crate::pagemap::PageMap;
use crate::structure::StructureParser;
use crate::util::{now_utc_string, read_text_file, sha256_file, write_json_pretty};

pub fn run(args: StructureArgs) -> Result<()> {
    let manifest = build_manifest(&args)?;

    if args.dry_run {
        info!(
            chapters = manifest.chapter_count,
            sections = manifest.section_count,
            max_logical_page = manifest.max_logical_page,
            "structure dry-run complete"
        );
        return Ok(());
    }

    let manifest_path = args
        .manifest_path
        .unwrap_or_else(|| args.cache_root.join("manifests").join("structure.json"));

    write_json_pretty(&manifest_path, &manifest)?;
    info!(path = %manifest_path.display(), "wrote structure manifest");
    info!(
        chapters = manifest.chapter_count,
        sections = manifest.section_count,
        "structure detection completed"
    );

    Ok(())
}

fn build_manifest(args: &StructureArgs) -> Result<StructureManifest> {
    let text = read_text_file(&args.input)?;
    let source_sha256 = sha256_file(&args.input)?;

    let parser = StructureParser::new()?;
    let structure = parser.detect_full_structure(&text)?;

    let lines: Vec<&str> = text.lines().collect();
    let map = PageMap::build(&lines)?;

    let section_count = structure
        .sections_by_chapter
        .iter()
        .map(Vec::len)
        .sum::<usize>();

    let chapters: Vec<ChapterOutline> = structure
        .chapters
        .into_iter()
        .zip(structure.sections_by_chapter)
        .map(|(chapter, sections)| ChapterOutline { chapter, sections })
        .collect();

    Ok(StructureManifest {
        manifest_version: 1,
        generated_at: now_utc_string(),
        source_path: args.input.display().to_string(),
        source_sha256,
        line_count: lines.len(),
        max_logical_page: map.max_logical_page(),
        chapter_count: chapters.len(),
        section_count,
        chapters,
    })
}
