use chrono::Utc;
use clap::Parser;
use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyModifiers, MouseButton,
    MouseEvent, MouseEventKind,
};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen};
use keyedbrowser::browser::{BarAction, Browser, BrowserCallbacks, BrowserView};
use keyedbrowser::config::{BrowserConfig, Grouping, Sorting};
use keyedbrowser::crawler::{FileCrawler, ProgressReporter, ScanPhase, ScanProgress, ScanStats};
use keyedbrowser::format::file_size;
use keyedbrowser::key;
use keyedbrowser::record::FileRecord;
use keyedbrowser::render_tree::RenderRow;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState, Wrap};
use ratatui::{Frame, Terminal};
use std::fs::File;
use std::io::{self, stdout, Stdout};
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Browse a directory or a JSON listing interactively.
#[derive(Parser, Debug)]
#[command(name = "keyedbrowser-tui", version)]
struct Cli {
    /// Directory to scan
    #[arg(default_value = ".")]
    path: PathBuf,

    /// Read records from a JSON array instead of scanning
    #[arg(long)]
    json: Option<PathBuf>,

    /// TOML file with browser settings
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log file (defaults to the temp directory)
    #[arg(long)]
    log_file: Option<PathBuf>,
}

enum ScanEvent {
    Progress(ScanProgress),
    Completed(Result<(Vec<FileRecord>, ScanStats), String>),
}

/// Edits requested through browser callbacks, applied to the in-memory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
enum ListingChange {
    CreateFolder(String),
    Move { old_key: String, new_key: String },
    Delete(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Mode {
    Normal,
    Filter,
    Naming(String),
    ConfirmDelete,
}

/// Raw mode and the alternate screen for as long as this lives.
struct TerminalSession {
    terminal: Terminal<CrosstermBackend<Stdout>>,
}

impl TerminalSession {
    fn start() -> io::Result<Self> {
        enable_raw_mode()?;
        crossterm::execute!(stdout(), EnterAlternateScreen, EnableMouseCapture)?;
        let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;
        terminal.clear()?;
        Ok(Self { terminal })
    }
}

impl Drop for TerminalSession {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let _ = crossterm::execute!(self.terminal.backend_mut(), LeaveAlternateScreen, DisableMouseCapture);
        let _ = self.terminal.show_cursor();
    }
}

fn browser_callbacks(tx: &Sender<ListingChange>) -> BrowserCallbacks {
    let create = tx.clone();
    let move_file = tx.clone();
    let move_folder = tx.clone();
    let rename_file = tx.clone();
    let rename_folder = tx.clone();
    let delete_file = tx.clone();
    let delete_folder = tx.clone();
    let moved = |tx: &Sender<ListingChange>, old_key: &str, new_key: &str| {
        let _ = tx.send(ListingChange::Move {
            old_key: old_key.to_string(),
            new_key: new_key.to_string(),
        });
    };

    BrowserCallbacks::default()
        .on_create_folder(move |key| {
            let _ = create.send(ListingChange::CreateFolder(key.to_string()));
        })
        .on_move_file(move |old_key, new_key| moved(&move_file, old_key, new_key))
        .on_move_folder(move |old_key, new_key| moved(&move_folder, old_key, new_key))
        .on_rename_file(move |old_key, new_key| moved(&rename_file, old_key, new_key))
        .on_rename_folder(move |old_key, new_key| moved(&rename_folder, old_key, new_key))
        .on_delete_file(move |key| {
            let _ = delete_file.send(ListingChange::Delete(key.to_string()));
        })
        .on_delete_folder(move |key| {
            let _ = delete_folder.send(ListingChange::Delete(key.to_string()));
        })
}

/// Apply one edit to the listing. Folder edits cover everything under the folder.
fn apply_change(records: &mut Vec<FileRecord>, change: ListingChange) {
    match change {
        ListingChange::CreateFolder(key) => {
            if !records.iter().any(|record| record.key == key) {
                records.push(FileRecord::folder(key));
            }
        }
        ListingChange::Move { old_key, new_key } => {
            for record in records.iter_mut() {
                if key::is_folder_key(&old_key) {
                    if let Some(rest) = record.key.strip_prefix(old_key.as_str()) {
                        record.key = format!("{}{}", new_key, rest);
                    }
                } else if record.key == old_key {
                    record.key = new_key.clone();
                }
            }
        }
        ListingChange::Delete(key) => {
            if key::is_folder_key(&key) {
                records.retain(|record| !record.key.starts_with(key.as_str()));
            } else {
                records.retain(|record| record.key != key);
            }
        }
    }
}

struct App {
    source: Cli,
    browser: Browser,
    records: Vec<FileRecord>,
    change_rx: Receiver<ListingChange>,
    scan_rx: Option<Receiver<ScanEvent>>,
    scan_progress: Option<ScanProgress>,
    mode: Mode,
    cut: Option<String>,
    status: String,
    table_state: TableState,
    list_area: Option<Rect>,
    should_quit: bool,
}

impl App {
    fn new(source: Cli, config: BrowserConfig) -> Self {
        let (tx, change_rx) = mpsc::channel();
        let browser = Browser::new(config, browser_callbacks(&tx));
        Self {
            source,
            browser,
            records: Vec::new(),
            change_rx,
            scan_rx: None,
            scan_progress: None,
            mode: Mode::Normal,
            cut: None,
            status: String::new(),
            table_state: TableState::default(),
            list_area: None,
            should_quit: false,
        }
    }

    fn load(&mut self) {
        if let Some(json) = self.source.json.clone() {
            match std::fs::read_to_string(&json)
                .map_err(keyedbrowser::BrowserError::from)
                .and_then(|text| FileRecord::list_from_json(&text))
            {
                Ok(records) => {
                    self.status = format!("Loaded {} records from {}", records.len(), json.display());
                    self.records = records;
                }
                Err(err) => self.status = format!("Load failed: {}", err),
            }
            return;
        }
        self.start_scan();
    }

    fn start_scan(&mut self) {
        if self.scan_rx.is_some() {
            return;
        }

        let path = self.source.path.clone();
        self.status = format!("Scanning {} ...", path.display());
        self.scan_progress = None;

        let (tx, rx) = mpsc::channel::<ScanEvent>();
        self.scan_rx = Some(rx);

        thread::spawn(move || {
            let progress_tx = tx.clone();
            let reporter: ProgressReporter = Arc::new(move |progress: ScanProgress| {
                let _ = progress_tx.send(ScanEvent::Progress(progress));
            });

            let result = FileCrawler::new()
                .scan_with_progress(&path, Some(reporter))
                .map_err(|err| err.to_string());
            let _ = tx.send(ScanEvent::Completed(result));
        });
    }

    fn poll_scan_updates(&mut self) {
        let mut done = None;
        let mut disconnected = false;

        if let Some(rx) = self.scan_rx.as_ref() {
            loop {
                match rx.try_recv() {
                    Ok(ScanEvent::Progress(progress)) => self.scan_progress = Some(progress),
                    Ok(ScanEvent::Completed(result)) => done = Some(result),
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => {
                        disconnected = true;
                        break;
                    }
                }
            }
        }

        if disconnected && done.is_none() {
            self.status = "Scan channel disconnected".to_string();
        }
        if disconnected || done.is_some() {
            self.scan_rx = None;
            self.scan_progress = None;
        }

        match done {
            Some(Ok((records, stats))) => {
                self.records = records;
                self.status = format!(
                    "Scan complete: {} files, {} dirs, {} total",
                    stats.total_files,
                    stats.total_dirs,
                    file_size(stats.total_size),
                );
            }
            Some(Err(err)) => self.status = format!("Scan failed: {}", err),
            None => {}
        }
    }

    fn apply_changes(&mut self) {
        while let Ok(change) = self.change_rx.try_recv() {
            tracing::debug!(?change, "listing change");
            apply_change(&mut self.records, change);
        }
    }

    fn view(&self) -> Result<BrowserView, String> {
        self.browser.render(&self.records).map_err(|err| err.to_string())
    }

    fn visible_keys(&self) -> Vec<String> {
        let Ok(view) = self.view() else {
            return Vec::new();
        };
        let mut rows = Vec::new();
        flatten_rows(&view.rows, &mut rows);
        rows.into_iter().map(|row| row.file_key.clone()).collect()
    }

    fn selection(&self) -> Option<String> {
        self.browser.state().selection.clone()
    }

    fn move_cursor(&mut self, delta: isize) {
        let keys = self.visible_keys();
        if keys.is_empty() {
            return;
        }
        let current = self
            .selection()
            .and_then(|selection| keys.iter().position(|key| *key == selection));
        let next = match current {
            Some(index) => (index as isize + delta).clamp(0, keys.len() as isize - 1) as usize,
            None => 0,
        };
        self.browser.select(&keys[next]);
    }

    fn activate_selection(&mut self) {
        let Some(selection) = self.selection() else {
            return;
        };
        if key::is_folder_key(&selection) || self.is_bucket(&selection) {
            self.browser.toggle_folder(&selection);
        } else {
            self.browser.preview(&selection);
        }
    }

    /// Date buckets have plain keys without a trailing slash.
    fn is_bucket(&self, key: &str) -> bool {
        self.browser.config().grouping == Grouping::Modified
            && self
                .view()
                .map(|view| view.rows.iter().any(|row| row.is_folder() && row.file_key == key))
                .unwrap_or(false)
    }

    fn close_selection(&mut self) {
        if let Some(selection) = self.selection() {
            if self.browser.state().open_folders.is_open(&selection) {
                self.browser.toggle_folder(&selection);
            }
        }
    }

    fn start_naming(&mut self, action: BarAction) {
        let Ok(view) = self.view() else {
            return;
        };
        if !view.action_bar.actions.contains(&action) {
            self.status = format!("{} is not available here", action.label());
            return;
        }
        match action {
            BarAction::AddFolder | BarAction::AddSubfolder => {
                self.browser.begin_add_folder();
                self.mode = Mode::Naming(String::new());
            }
            BarAction::Rename => {
                let name = view.selected.map(|entry| entry.display_name()).unwrap_or_default();
                self.browser.begin_rename();
                self.mode = Mode::Naming(name);
            }
            BarAction::Delete => {
                self.browser.begin_delete();
                self.mode = Mode::ConfirmDelete;
            }
        }
    }

    fn submit_name(&mut self, name: &str) {
        let Some(target) = self.browser.state().action_target.clone() else {
            self.mode = Mode::Normal;
            return;
        };
        match self.browser.submit_rename(&target, name) {
            Ok(_) => self.mode = Mode::Normal,
            Err(err) => self.status = err.to_string(),
        }
    }

    fn paste(&mut self) {
        let Some(cut) = self.cut.take() else {
            self.status = "Nothing to paste".to_string();
            return;
        };
        let target = self.selection().unwrap_or_default();
        if !self.browser.drop_onto(&cut, &target) {
            self.status = format!("Cannot move {} there", cut);
        }
    }

    fn cycle_grouping(&mut self) {
        let config = self.browser.config_mut();
        config.grouping = match config.grouping {
            Grouping::Folder => Grouping::Modified,
            Grouping::Modified => Grouping::None,
            Grouping::None => Grouping::Folder,
        };
        self.status = format!("Grouping: {:?}", config.grouping);
    }

    fn cycle_sorting(&mut self) {
        let config = self.browser.config_mut();
        config.sorting = match config.sorting {
            Sorting::Natural => Sorting::LastModified,
            Sorting::LastModified => Sorting::None,
            Sorting::None => Sorting::Natural,
        };
        self.status = format!("Sorting: {:?}", config.sorting);
    }

    fn on_key(&mut self, key: KeyEvent) {
        if key.modifiers.contains(KeyModifiers::CONTROL) && matches!(key.code, KeyCode::Char('c')) {
            self.should_quit = true;
            return;
        }

        match self.mode.clone() {
            Mode::Filter => {
                let mut filter = self.browser.state().name_filter.clone();
                match key.code {
                    KeyCode::Enter => self.mode = Mode::Normal,
                    KeyCode::Esc => {
                        filter.clear();
                        self.mode = Mode::Normal;
                    }
                    KeyCode::Backspace => {
                        filter.pop();
                    }
                    KeyCode::Char(ch) => filter.push(ch),
                    _ => {}
                }
                self.browser.update_filter(&filter);
            }
            Mode::Naming(mut name) => match key.code {
                KeyCode::Enter => self.submit_name(&name),
                KeyCode::Esc => {
                    self.browser.end_action();
                    self.mode = Mode::Normal;
                }
                KeyCode::Backspace => {
                    name.pop();
                    self.mode = Mode::Naming(name);
                }
                KeyCode::Char(ch) => {
                    name.push(ch);
                    self.mode = Mode::Naming(name);
                }
                _ => {}
            },
            Mode::ConfirmDelete => {
                if let (KeyCode::Char('y'), Some(target)) = (key.code, self.browser.state().action_target.clone()) {
                    self.browser.submit_delete(&target);
                } else {
                    self.browser.end_action();
                }
                self.mode = Mode::Normal;
            }
            Mode::Normal => self.on_normal_key(key),
        }
    }

    fn on_normal_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Up | KeyCode::Char('k') => self.move_cursor(-1),
            KeyCode::Down | KeyCode::Char('j') => self.move_cursor(1),
            KeyCode::Enter | KeyCode::Right | KeyCode::Char('l') => self.activate_selection(),
            KeyCode::Left | KeyCode::Char('h') => self.close_selection(),
            KeyCode::Char('/') if self.browser.config().can_filter => self.mode = Mode::Filter,
            KeyCode::Char('a') => {
                let action = if self.selection().is_some() {
                    BarAction::AddSubfolder
                } else {
                    BarAction::AddFolder
                };
                self.start_naming(action);
            }
            KeyCode::Char('r') => self.start_naming(BarAction::Rename),
            KeyCode::Char('d') => self.start_naming(BarAction::Delete),
            KeyCode::Char('x') => {
                self.cut = self.selection();
                if let Some(cut) = &self.cut {
                    self.status = format!("Cut {}", cut);
                }
            }
            KeyCode::Char('p') => self.paste(),
            KeyCode::Char('m') => self.browser.show_more(),
            KeyCode::Char('g') => self.cycle_grouping(),
            KeyCode::Char('s') => self.cycle_sorting(),
            KeyCode::Char('R') if self.source.json.is_none() => self.start_scan(),
            KeyCode::Esc => {
                if self.browser.state().preview.is_some() {
                    self.browser.close_detail();
                } else {
                    self.browser.click_outside();
                }
            }
            _ => {}
        }
    }

    fn on_mouse(&mut self, event: MouseEvent) {
        let MouseEventKind::Down(MouseButton::Left) = event.kind else {
            return;
        };
        let Some(area) = self.list_area else {
            return;
        };
        let inside = event.column >= area.x
            && event.column < area.x + area.width
            && event.row > area.y
            && event.row < area.y + area.height;
        if !inside {
            self.browser.click_outside();
            return;
        }

        // First line of the table is the header.
        let index = self.table_state.offset() + (event.row - area.y - 1) as usize;
        let keys = self.visible_keys();
        if let Some(key) = keys.get(index) {
            let already_selected = self.selection().as_deref() == Some(key.as_str());
            self.browser.select(key);
            if already_selected {
                self.activate_selection();
            }
        }
    }
}

fn flatten_rows<'a>(rows: &'a [RenderRow], out: &mut Vec<&'a RenderRow>) {
    for row in rows {
        out.push(row);
        flatten_rows(&row.children, out);
    }
}

fn progress_status(progress: &ScanProgress) -> String {
    match progress.phase {
        ScanPhase::Discovering => format!("Discovering entries... {} found", progress.discovered_entries),
        ScanPhase::Processing => match progress.fraction() {
            Some(frac) => format!("Processing {:.0}%", frac * 100.0),
            None => "Processing...".to_string(),
        },
    }
}

fn row_cells<'a>(row: &RenderRow, mode: &Mode, now: chrono::DateTime<Utc>) -> Row<'a> {
    let name = match mode {
        Mode::Naming(buffer) if row.is_renaming || row.is_draft => {
            format!("{}{} {}_", "  ".repeat(row.depth), row.icon(), buffer)
        }
        _ => row.label(),
    };
    let mut style = Style::default();
    if row.is_draft {
        style = style.fg(Color::Yellow);
    }
    if row.is_deleting {
        style = style.fg(Color::Red).add_modifier(Modifier::BOLD);
    }
    Row::new(vec![
        Cell::from(name),
        Cell::from(row.size_text()),
        Cell::from(row.modified_text(now)),
    ])
    .style(style)
}

fn draw_ui(frame: &mut Frame, app: &mut App) {
    let root = frame.area();
    let view = app.view();

    let columns = if app.browser.state().preview.is_some() {
        Layout::horizontal([Constraint::Min(40), Constraint::Length(36)]).split(root)
    } else {
        Layout::horizontal([Constraint::Min(40)]).split(root)
    };
    let main = Layout::vertical([Constraint::Length(3), Constraint::Min(5), Constraint::Length(3)]).split(columns[0]);

    // Action bar: filter input plus available actions.
    let mut bar = Vec::new();
    if let Ok(view) = &view {
        if let Some(filter) = &view.action_bar.filter {
            let style = if app.mode == Mode::Filter {
                Style::default().fg(Color::Yellow)
            } else {
                Style::default().fg(Color::White)
            };
            bar.push(Span::styled(format!("Filter: {}", filter), style));
            bar.push(Span::raw("   "));
        }
        for action in &view.action_bar.actions {
            bar.push(Span::styled(format!("[{}] ", action.label()), Style::default().fg(Color::Cyan)));
        }
    }
    frame.render_widget(
        Paragraph::new(Line::from(bar)).block(Block::default().title(" Keyed Browser ").borders(Borders::ALL)),
        main[0],
    );

    let list_block = Block::default().borders(Borders::ALL);
    let list_inner = list_block.inner(main[1]);
    app.list_area = Some(list_inner);

    match &view {
        Ok(view) => {
            let title = format!(" {} files ", view.file_count);
            match &view.empty_message {
                Some(message) => frame.render_widget(
                    Paragraph::new(message.as_str())
                        .style(Style::default().fg(Color::Gray))
                        .block(list_block.title(title)),
                    main[1],
                ),
                None => {
                    let mut rows = Vec::new();
                    flatten_rows(&view.rows, &mut rows);
                    let now = Utc::now();
                    let selected = rows.iter().position(|row| row.is_selected);
                    app.table_state.select(selected);

                    let mut table_rows: Vec<Row> = rows.iter().map(|row| row_cells(row, &app.mode, now)).collect();
                    if view.show_more {
                        table_rows.push(Row::new(vec![Cell::from("... m: show more")]).style(Style::default().fg(Color::Gray)));
                    }
                    let table = Table::new(
                        table_rows,
                        [Constraint::Min(20), Constraint::Length(12), Constraint::Length(18)],
                    )
                    .header(
                        Row::new(vec!["File", "Size", "Last Modified"])
                            .style(Style::default().add_modifier(Modifier::BOLD)),
                    )
                    .highlight_style(Style::default().bg(Color::Rgb(60, 60, 90)))
                    .block(list_block.title(title));
                    frame.render_stateful_widget(table, main[1], &mut app.table_state);
                }
            }
        }
        Err(err) => frame.render_widget(
            Paragraph::new(err.as_str())
                .style(Style::default().fg(Color::Red))
                .block(list_block),
            main[1],
        ),
    }

    let status = match (&app.scan_progress, &app.mode) {
        (Some(progress), _) => progress_status(progress),
        (None, Mode::ConfirmDelete) => "Delete? y to confirm, any other key to cancel".to_string(),
        (None, Mode::Naming(_)) => "Enter: save   Esc: cancel".to_string(),
        (None, _) => app.status.clone(),
    };
    frame.render_widget(
        Paragraph::new(status).block(
            Block::default()
                .title(" j/k move  l open  h close  / filter  a add  r rename  d delete  x cut  p paste  g group  s sort  q quit ")
                .borders(Borders::ALL),
        ),
        main[2],
    );

    if let Some(preview) = &app.browser.state().preview {
        let kind = match preview.kind {
            key::FileKind::Image => "image",
            key::FileKind::Pdf => "pdf document",
            key::FileKind::Other => "file",
        };
        let lines = vec![
            Line::from(Span::styled(preview.name.clone(), Style::default().add_modifier(Modifier::BOLD))),
            Line::from(vec![Span::styled("Key: ", Style::default().fg(Color::Gray)), Span::raw(preview.key.clone())]),
            Line::from(vec![Span::styled("Type: ", Style::default().fg(Color::Gray)), Span::raw(kind)]),
            Line::from(vec![
                Span::styled("Extension: ", Style::default().fg(Color::Gray)),
                Span::raw(preview.extension.clone()),
            ]),
            Line::from(""),
            Line::from(Span::styled("Esc: close", Style::default().fg(Color::Gray))),
        ];
        frame.render_widget(
            Paragraph::new(lines)
                .wrap(Wrap { trim: true })
                .block(Block::default().title(" Preview ").borders(Borders::ALL)),
            columns[1],
        );
    }
}

fn run_app(session: &mut TerminalSession, app: &mut App) -> io::Result<()> {
    app.load();

    loop {
        app.poll_scan_updates();
        app.apply_changes();

        session.terminal.draw(|frame| draw_ui(frame, app))?;

        if app.should_quit {
            break;
        }

        if event::poll(Duration::from_millis(50))? {
            match event::read()? {
                Event::Key(key) => app.on_key(key),
                Event::Mouse(mouse) => app.on_mouse(mouse),
                Event::Resize(_, _) | Event::FocusGained | Event::FocusLost | Event::Paste(_) => {}
            }
        }
    }

    Ok(())
}

fn init_logging(path: PathBuf) -> io::Result<()> {
    let file = File::create(path)?;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_writer(Mutex::new(file))
        .init();
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let log_file = cli
        .log_file
        .clone()
        .unwrap_or_else(|| std::env::temp_dir().join("keyedbrowser-tui.log"));
    init_logging(log_file)?;

    let config = match &cli.config {
        Some(path) => BrowserConfig::load(path)?,
        None => BrowserConfig::default(),
    };
    let mut app = App::new(cli, config);

    let mut session = TerminalSession::start()?;
    run_app(&mut session, &mut app)?;
    drop(session);
    tracing::info!(records = app.records.len(), "browser closed");
    Ok(())
}
