use anyhow::{Context, Result, bail};
use tracing::info;

use crate::cli::PagesArgs;
use crate::pages::extract_chapter_pages;
use crate::util::read_text_file;

pub fn run(args: PagesArgs) -> Result<()> {
    if args.start_page > args.end_page {
        bail!(
            "start page {} is after end page {}",
            args.start_page,
            args.end_page
        );
    }

    let text = read_text_file(&args.input)?;
    let pages = extract_chapter_pages(&text, args.start_page, args.end_page)?;

    info!(
        input = %args.input.display(),
        start_page = args.start_page,
        end_page = args.end_page,
        pages = pages.len(),
        "extracted pages"
    );

    if args.json {
        let rendered =
            serde_json::to_string_pretty(&pages).context("failed to serialize pages to json")?;
        println!("{rendered}");
        return Ok(());
    }

    for page in &pages {
        println!("=== page {} ===", page.page_number);
        println!("{}", page.content);
        println!();
    }

    Ok(())
}
