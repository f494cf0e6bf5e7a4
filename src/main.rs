use clap::Parser;
use keyedbrowser::config::{BrowserConfig, Grouping, RenderStyle, Sorting};
use keyedbrowser::crawler::FileCrawler;
use keyedbrowser::record::FileRecord;
use keyedbrowser::render_tree::RenderRow;
use keyedbrowser::{Browser, BrowserCallbacks, BrowserView};
use chrono::Utc;
use std::error::Error;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Print a keyed file listing as a grouped, sorted tree.
#[derive(Parser, Debug)]
#[command(name = "keyedbrowser", version)]
struct Cli {
    /// Directory to scan
    #[arg(default_value = ".")]
    path: PathBuf,

    /// Read records from a JSON array instead of scanning (`-` for stdin)
    #[arg(long)]
    json: Option<PathBuf>,

    /// TOML file with browser settings
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long, value_enum)]
    group: Option<Grouping>,

    #[arg(long, value_enum)]
    sort: Option<Sorting>,

    #[arg(long, value_enum)]
    style: Option<RenderStyle>,

    /// Space-separated terms every shown key must contain
    #[arg(long)]
    filter: Option<String>,

    /// Key prefix stripped before grouping by folder
    #[arg(long, default_value = "")]
    root: String,

    /// Expand every folder
    #[arg(long)]
    open_all: bool,

    /// Include hidden entries when scanning
    #[arg(long)]
    hidden: bool,
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn load_records(cli: &Cli) -> Result<Vec<FileRecord>, Box<dyn Error>> {
    if let Some(json) = &cli.json {
        let text = if json == Path::new("-") {
            io::read_to_string(io::stdin())?
        } else {
            std::fs::read_to_string(json)?
        };
        return Ok(FileRecord::list_from_json(&text)?);
    }

    let (records, _) = FileCrawler::new().include_hidden(cli.hidden).scan(&cli.path)?;
    Ok(records)
}

fn build_config(cli: &Cli) -> Result<BrowserConfig, Box<dyn Error>> {
    let mut config = match &cli.config {
        Some(path) => BrowserConfig::load(path)?,
        None => BrowserConfig::default(),
    };
    if let Some(group) = cli.group {
        config.grouping = group;
    }
    if let Some(sort) = cli.sort {
        config.sorting = sort;
    }
    if let Some(style) = cli.style {
        config.render_style = style;
    }
    // Everything fits on one page when printing.
    config.page_size = usize::MAX / 2;
    Ok(config)
}

/// Open folders until every visible folder row is open.
fn open_all(browser: &mut Browser, records: &[FileRecord]) -> Result<(), Box<dyn Error>> {
    loop {
        let view = browser.render(records)?;
        let mut closed = Vec::new();
        collect_closed(&view.rows, &mut closed);
        if closed.is_empty() {
            return Ok(());
        }
        for key in closed {
            browser.open_folder(&key);
        }
    }
}

fn collect_closed(rows: &[RenderRow], out: &mut Vec<String>) {
    for row in rows {
        if row.is_folder() && !row.is_open {
            out.push(row.file_key.clone());
        }
        collect_closed(&row.children, out);
    }
}

fn flatten_rows<'a>(rows: &'a [RenderRow], out: &mut Vec<&'a RenderRow>) {
    for row in rows {
        out.push(row);
        flatten_rows(&row.children, out);
    }
}

fn print_view(view: &BrowserView, out: &mut impl Write) -> io::Result<()> {
    writeln!(out, "{} files", view.file_count)?;

    if let Some(message) = &view.empty_message {
        return writeln!(out, "{}", message);
    }

    let mut rows = Vec::new();
    flatten_rows(&view.rows, &mut rows);
    let now = Utc::now();

    match view.render_style {
        RenderStyle::List => {
            for row in rows {
                writeln!(out, "{}", row.label())?;
            }
        }
        RenderStyle::Table => {
            let labels: Vec<String> = rows.iter().map(|row| row.label()).collect();
            let sizes: Vec<String> = rows.iter().map(|row| row.size_text()).collect();
            let name_width = labels.iter().map(|label| label.chars().count()).max().unwrap_or(0).max(4);
            let size_width = sizes.iter().map(String::len).max().unwrap_or(0).max(4);

            writeln!(out, "{:<name_width$}  {:>size_width$}  Last Modified", "File", "Size")?;
            for ((row, label), size) in rows.iter().zip(&labels).zip(&sizes) {
                writeln!(
                    out,
                    "{:<name_width$}  {:>size_width$}  {}",
                    label,
                    size,
                    row.modified_text(now)
                )?;
            }
        }
    }

    if view.show_more {
        writeln!(out, "...")?;
    }
    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    init_logging();
    let cli = Cli::parse();

    let records = load_records(&cli)?;
    let config = build_config(&cli)?;
    tracing::debug!(records = records.len(), ?config, "listing loaded");

    let mut browser = Browser::new(config, BrowserCallbacks::default()).with_root(cli.root.clone());
    if let Some(filter) = &cli.filter {
        browser.update_filter(filter);
    }
    if cli.open_all {
        open_all(&mut browser, &records)?;
    }

    let view = browser.render(&records)?;
    let stdout = io::stdout();
    print_view(&view, &mut stdout.lock())?;
    Ok(())
}
