mod uploader;
mod view;

use anyhow::{Result, bail};
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use richpost_config::{Config, ExternalValue};
use richpost_engine::emoji::{EMOJI_PALETTE, emoji_at};
use richpost_engine::model::HeadingLevel;
use richpost_engine::render::stored_markdown_to_html;
use richpost_engine::{
    BlockType, Cmd, EditorHost, ExternalValuePolicy, FormatKind, HostOptions, MarkdownCodec,
    UploadOutcome, upload_image,
};
use ratatui::{
    Frame, Terminal,
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
};
use std::{
    cell::{Cell, RefCell},
    env,
    io::{Stdout, stdout},
    path::{Path, PathBuf},
    process,
    rc::Rc,
};
use uploader::{DirectoryUploader, read_upload_file};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PromptKind {
    Link,
    Image,
}

impl PromptKind {
    fn label(self) -> &'static str {
        match self {
            PromptKind::Link => "Link URL",
            PromptKind::Image => "Image file",
        }
    }
}

enum Mode {
    Edit,
    Prompt { kind: PromptKind, input: String },
    Emoji { index: usize },
}

/// What a key press means while editing.
#[derive(Debug, PartialEq)]
enum Action {
    Quit,
    Save,
    Type(char),
    Run(Cmd),
    Prompt(PromptKind),
    EmojiPicker,
    Nothing,
}

fn edit_action(key: KeyEvent) -> Action {
    let extend = key.modifiers.contains(KeyModifiers::SHIFT);
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        return match key.code {
            KeyCode::Char('q') => Action::Quit,
            KeyCode::Char('w') | KeyCode::Char('s') => Action::Save,
            KeyCode::Char('a') => Action::Run(Cmd::SelectAll),
            KeyCode::Char('z') => Action::Run(Cmd::Undo),
            KeyCode::Char('y') => Action::Run(Cmd::Redo),
            KeyCode::Char('b') => Action::Run(Cmd::ToggleFormat(FormatKind::Bold)),
            KeyCode::Char('i') => Action::Run(Cmd::ToggleFormat(FormatKind::Italic)),
            KeyCode::Char('u') => Action::Run(Cmd::ToggleFormat(FormatKind::Underline)),
            KeyCode::Char('t') => Action::Run(Cmd::ToggleFormat(FormatKind::Strikethrough)),
            KeyCode::Char('d') => Action::Run(Cmd::ToggleFormat(FormatKind::Code)),
            KeyCode::Char('k') => Action::Prompt(PromptKind::Link),
            KeyCode::Char('o') => Action::Prompt(PromptKind::Image),
            KeyCode::Char('e') => Action::EmojiPicker,
            _ => Action::Nothing,
        };
    }
    if key.modifiers.contains(KeyModifiers::ALT) {
        let block = match key.code {
            KeyCode::Char('0') => BlockType::Paragraph,
            KeyCode::Char(c @ '1'..='6') => {
                let level = c.to_digit(10).and_then(|d| HeadingLevel::new(d as u8));
                match level {
                    Some(level) => BlockType::Heading(level),
                    None => return Action::Nothing,
                }
            }
            KeyCode::Char('q') => BlockType::Quote,
            KeyCode::Char('c') => BlockType::Code { language: None },
            KeyCode::Char('l') => BlockType::BulletList,
            KeyCode::Char('n') => BlockType::NumberedList,
            KeyCode::Char('h') => return Action::Run(Cmd::InsertHorizontalRule),
            _ => return Action::Nothing,
        };
        return Action::Run(Cmd::SetBlock(block));
    }
    match key.code {
        KeyCode::Esc => Action::Quit,
        KeyCode::Char(c) => Action::Type(c),
        KeyCode::Enter => Action::Run(Cmd::SplitBlock),
        KeyCode::Backspace => Action::Run(Cmd::DeleteBackward),
        KeyCode::Delete => Action::Run(Cmd::DeleteSelection),
        KeyCode::Left => Action::Run(Cmd::MoveLeft { extend }),
        KeyCode::Right => Action::Run(Cmd::MoveRight { extend }),
        _ => Action::Nothing,
    }
}

fn external_value_policy(value: ExternalValue) -> ExternalValuePolicy {
    match value {
        ExternalValue::IgnoreAfterMount => ExternalValuePolicy::IgnoreAfterMount,
        ExternalValue::ReimportOnChange => ExternalValuePolicy::ReimportOnChange,
    }
}

struct App {
    host: Rc<RefCell<EditorHost>>,
    post_path: PathBuf,
    uploader: DirectoryUploader,
    mode: Mode,
    status: String,
    dirty: Rc<Cell<bool>>,
    quit_armed: bool,
}

impl App {
    fn open(post_path: PathBuf, config: Config) -> Result<Self> {
        let value = if post_path.exists() {
            std::fs::read_to_string(&post_path)?
        } else {
            String::new()
        };
        let options = HostOptions {
            placeholder: config.placeholder.clone(),
            disabled: config.disabled,
            external_value: external_value_policy(config.external_value),
        };

        let mut host = EditorHost::new(value, options)?;
        let ambiguities = host.mount()?;
        for ambiguity in &ambiguities {
            log::warn!("{}:{ambiguity}", post_path.display());
        }
        let dirty = Rc::new(Cell::new(false));
        let flag = Rc::clone(&dirty);
        host.on_change(move |_| flag.set(true));
        host.focus()?;

        let status = if ambiguities.is_empty() {
            "Ctrl+W: Save | Esc: Quit".to_string()
        } else {
            format!("{} constructs were read as plain text", ambiguities.len())
        };

        Ok(Self {
            host: Rc::new(RefCell::new(host)),
            post_path,
            uploader: DirectoryUploader::new(config),
            mode: Mode::Edit,
            status,
            dirty,
            quit_armed: false,
        })
    }

    /// Handles one key press; returns true when the app should exit.
    fn handle_key(&mut self, key: KeyEvent) -> Result<bool> {
        match &mut self.mode {
            Mode::Edit => {}
            Mode::Prompt { kind, input } => {
                match key.code {
                    KeyCode::Esc => self.mode = Mode::Edit,
                    KeyCode::Backspace => {
                        input.pop();
                    }
                    KeyCode::Char(c) => input.push(c),
                    KeyCode::Enter => {
                        let (kind, input) = (*kind, std::mem::take(input));
                        self.mode = Mode::Edit;
                        self.finish_prompt(kind, input.trim());
                    }
                    _ => {}
                }
                return Ok(false);
            }
            Mode::Emoji { index } => {
                match key.code {
                    KeyCode::Esc => self.mode = Mode::Edit,
                    KeyCode::Left => {
                        *index = index.checked_sub(1).unwrap_or(EMOJI_PALETTE.len() - 1);
                    }
                    KeyCode::Right => *index = (*index + 1) % EMOJI_PALETTE.len(),
                    KeyCode::Enter => {
                        let emoji = emoji_at(*index).to_string();
                        self.mode = Mode::Edit;
                        self.run(Cmd::InsertEmoji { emoji });
                    }
                    _ => {}
                }
                return Ok(false);
            }
        }

        let action = edit_action(key);
        if action != Action::Quit {
            self.quit_armed = false;
        }
        match action {
            Action::Quit => {
                if self.dirty.get() && !self.quit_armed {
                    self.quit_armed = true;
                    self.status = "Unsaved changes. Press Esc again to quit".to_string();
                } else {
                    return Ok(true);
                }
            }
            Action::Save => self.save()?,
            Action::Type(c) => {
                let result = self.host.borrow_mut().type_char(c);
                if let Err(e) = result {
                    self.status = e.to_string();
                }
            }
            Action::Run(cmd) => self.run(cmd),
            Action::Prompt(kind) => {
                self.mode = Mode::Prompt {
                    kind,
                    input: String::new(),
                }
            }
            Action::EmojiPicker => self.mode = Mode::Emoji { index: 0 },
            Action::Nothing => {}
        }
        Ok(false)
    }

    fn run(&mut self, cmd: Cmd) {
        let result = self.host.borrow_mut().apply(cmd);
        if let Err(e) = result {
            self.status = e.to_string();
        }
    }

    fn finish_prompt(&mut self, kind: PromptKind, input: &str) {
        if input.is_empty() {
            return;
        }
        match kind {
            PromptKind::Link => self.run(Cmd::InsertLink {
                url: input.to_string(),
            }),
            PromptKind::Image => self.insert_image(Path::new(input)),
        }
    }

    fn insert_image(&mut self, path: &Path) {
        let file = match read_upload_file(path) {
            Ok(file) => file,
            Err(e) => {
                self.status = format!("Could not read {}: {e}", path.display());
                return;
            }
        };
        let upload = upload_image(Rc::downgrade(&self.host), &self.uploader, file);
        self.status = match futures::executor::block_on(upload) {
            Ok(UploadOutcome::InsertedAtSelection(_)) => "Image inserted".to_string(),
            Ok(UploadOutcome::Appended(_)) => "Image added at the end".to_string(),
            Ok(UploadOutcome::Discarded) => "Upload discarded".to_string(),
            Err(e) => e.to_string(),
        };
    }

    fn save(&mut self) -> Result<()> {
        std::fs::write(&self.post_path, self.host.borrow().value())?;
        self.dirty.set(false);
        self.status = format!("Saved {}", self.post_path.display());
        log::info!("Saved {}", self.post_path.display());
        Ok(())
    }
}

/// Output of one of the non-interactive modes.
fn convert(option: &str, post_path: &Path) -> Result<String> {
    let text = std::fs::read_to_string(post_path)?;
    let codec = MarkdownCodec::default();
    let parsed = codec.decode(&text);
    for ambiguity in &parsed.ambiguities {
        log::warn!("{}:{ambiguity}", post_path.display());
    }
    let output = match option {
        "--normalize" => codec.encode(&parsed.document)?,
        "--html" => stored_markdown_to_html(&codec.encode(&parsed.document)?),
        "--json" => parsed.document.to_json()?,
        _ => bail!("Unknown option {option}"),
    };
    Ok(output)
}

fn print_usage(program: &str) {
    eprintln!("Usage: {program} <post.md>");
    eprintln!("       {program} --normalize|--html|--json <post.md>");
}

fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();
    let program = args.first().map(String::as_str).unwrap_or("richpost");

    match args.as_slice() {
        [_, option, post] if option.starts_with("--") => {
            env_logger::Builder::from_default_env()
                .filter_level(log::LevelFilter::Warn)
                .init();
            match convert(option, Path::new(post)) {
                Ok(output) => print!("{output}"),
                Err(e) => {
                    eprintln!("Error: {e}");
                    print_usage(program);
                    process::exit(1);
                }
            }
            Ok(())
        }
        [_, post] if !post.starts_with("--") => edit(PathBuf::from(post)),
        _ => {
            print_usage(program);
            process::exit(1);
        }
    }
}

fn init_file_logging() -> Result<()> {
    let log_dir = Config::config_dir();
    std::fs::create_dir_all(&log_dir)?;
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_dir.join("richpost.log"))?;
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .target(env_logger::Target::Pipe(Box::new(log_file)))
        .init();
    Ok(())
}

fn edit(post_path: PathBuf) -> Result<()> {
    let config = match Config::load() {
        Ok(Some(config)) => config,
        Ok(None) => Config::default(),
        Err(e) => {
            eprintln!("Error: Failed to load config file: {e}");
            process::exit(1);
        }
    };
    // The terminal belongs to the editor, so logs go to a file.
    init_file_logging()?;

    let mut app = App::open(post_path, config)?;

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_app(&mut terminal, &mut app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        println!("{err:?}");
    }

    Ok(())
}

fn run_app(terminal: &mut Terminal<CrosstermBackend<Stdout>>, app: &mut App) -> Result<()> {
    loop {
        terminal.draw(|f| ui(f, app))?;

        if let Event::Key(key) = event::read()?
            && key.kind == KeyEventKind::Press
            && app.handle_key(key)?
        {
            return Ok(());
        }
    }
}

fn ui(f: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(1), Constraint::Min(0), Constraint::Length(1)])
        .split(f.area());

    let host = app.host.borrow();
    let selection = host.selection();
    let label = view::block_label(host.document(), selection);
    f.render_widget(
        Paragraph::new(view::toolbar_line(host.toolbar(), label)),
        chunks[0],
    );

    let lines = if host.show_placeholder() {
        vec![Line::from(Span::styled(
            host.placeholder().to_string(),
            Style::default()
                .fg(Color::DarkGray)
                .add_modifier(Modifier::ITALIC),
        ))]
    } else {
        view::document_lines(host.document(), selection)
    };
    // Keep the caret's line in view.
    let caret_line = lines
        .iter()
        .position(|l| l.spans.iter().any(|s| s.content.contains('▏')))
        .unwrap_or(0);
    let visible = usize::from(chunks[1].height.saturating_sub(2)).max(1);
    let scroll = u16::try_from(caret_line.saturating_sub(visible - 1)).unwrap_or(u16::MAX);

    let mut title = app
        .post_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    if app.dirty.get() {
        title.push_str(" [+]");
    }
    if host.options().disabled {
        title.push_str(" (read-only)");
    }
    let editor = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title(title))
        .wrap(Wrap { trim: false })
        .scroll((scroll, 0));
    f.render_widget(editor, chunks[1]);

    let status = match &app.mode {
        Mode::Edit => Line::from(app.status.as_str()),
        Mode::Prompt { kind, input } => Line::from(vec![
            Span::styled(
                format!("{}: ", kind.label()),
                Style::default().fg(Color::Yellow),
            ),
            Span::raw(input.as_str()),
        ]),
        Mode::Emoji { index } => emoji_strip(*index),
    };
    f.render_widget(Paragraph::new(status), chunks[2]);
}

/// The palette around `index`, current choice highlighted.
fn emoji_strip(index: usize) -> Line<'static> {
    let mut spans = vec![Span::raw("←/→ Enter: ")];
    for offset in 0..12 {
        let i = (index + offset) % EMOJI_PALETTE.len();
        let style = if offset == 0 {
            Style::default().bg(Color::Yellow)
        } else {
            Style::default()
        };
        spans.push(Span::styled(emoji_at(i), style));
        spans.push(Span::raw(" "));
    }
    Line::from(spans)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn key(code: KeyCode, modifiers: KeyModifiers) -> KeyEvent {
        KeyEvent::new(code, modifiers)
    }

    fn app(dir: &TempDir, contents: Option<&str>) -> App {
        let post = dir.path().join("post.md");
        if let Some(contents) = contents {
            std::fs::write(&post, contents).unwrap();
        }
        let config = Config {
            uploads_path: dir.path().join("uploads"),
            ..Default::default()
        };
        App::open(post, config).unwrap()
    }

    #[test]
    fn test_edit_action_mapping() {
        assert_eq!(
            edit_action(key(KeyCode::Char('A'), KeyModifiers::SHIFT)),
            Action::Type('A')
        );
        assert_eq!(
            edit_action(key(KeyCode::Char('b'), KeyModifiers::CONTROL)),
            Action::Run(Cmd::ToggleFormat(FormatKind::Bold))
        );
        assert_eq!(
            edit_action(key(KeyCode::Left, KeyModifiers::SHIFT)),
            Action::Run(Cmd::MoveLeft { extend: true })
        );
        assert_eq!(
            edit_action(key(KeyCode::Char('3'), KeyModifiers::ALT)),
            Action::Run(Cmd::SetBlock(BlockType::Heading(
                HeadingLevel::new(3).unwrap()
            )))
        );
        assert_eq!(
            edit_action(key(KeyCode::Char('k'), KeyModifiers::CONTROL)),
            Action::Prompt(PromptKind::Link)
        );
        assert_eq!(
            edit_action(key(KeyCode::Char('7'), KeyModifiers::ALT)),
            Action::Nothing
        );
    }

    #[test]
    fn test_typing_and_saving() {
        let dir = TempDir::new().unwrap();
        let mut app = app(&dir, None);

        for c in "# Hi".chars() {
            app.handle_key(key(KeyCode::Char(c), KeyModifiers::NONE))
                .unwrap();
        }
        assert!(app.dirty.get());
        app.handle_key(key(KeyCode::Char('w'), KeyModifiers::CONTROL))
            .unwrap();

        assert!(!app.dirty.get());
        let saved = std::fs::read_to_string(dir.path().join("post.md")).unwrap();
        assert_eq!(saved, "# Hi\n\n");
    }

    #[test]
    fn test_undo_and_redo_keys() {
        let dir = TempDir::new().unwrap();
        let mut app = app(&dir, Some("text\n\n"));
        for c in " more".chars() {
            app.handle_key(key(KeyCode::Char(c), KeyModifiers::NONE))
                .unwrap();
        }
        assert_eq!(app.host.borrow().value(), "text more\n\n");

        app.handle_key(key(KeyCode::Char('z'), KeyModifiers::CONTROL))
            .unwrap();
        assert_eq!(app.host.borrow().value(), "text\n\n");

        app.handle_key(key(KeyCode::Char('y'), KeyModifiers::CONTROL))
            .unwrap();
        assert_eq!(app.host.borrow().value(), "text more\n\n");
    }

    #[test]
    fn test_quit_with_unsaved_changes_needs_confirmation() {
        let dir = TempDir::new().unwrap();
        let mut app = app(&dir, Some("text\n\n"));
        let esc = key(KeyCode::Esc, KeyModifiers::NONE);

        assert!(app.handle_key(esc).unwrap());

        let mut app = self::app(&dir, Some("text\n\n"));
        app.handle_key(key(KeyCode::Char('!'), KeyModifiers::NONE))
            .unwrap();
        assert!(!app.handle_key(esc).unwrap());
        assert!(app.handle_key(esc).unwrap());
    }

    #[test]
    fn test_link_prompt_inserts_link() {
        let dir = TempDir::new().unwrap();
        let mut app = app(&dir, Some("see docs\n\n"));
        app.handle_key(key(KeyCode::Left, KeyModifiers::SHIFT))
            .unwrap();
        app.handle_key(key(KeyCode::Left, KeyModifiers::SHIFT))
            .unwrap();
        app.handle_key(key(KeyCode::Left, KeyModifiers::SHIFT))
            .unwrap();
        app.handle_key(key(KeyCode::Left, KeyModifiers::SHIFT))
            .unwrap();
        app.handle_key(key(KeyCode::Char('k'), KeyModifiers::CONTROL))
            .unwrap();
        for c in "http://x".chars() {
            app.handle_key(key(KeyCode::Char(c), KeyModifiers::NONE))
                .unwrap();
        }
        app.handle_key(key(KeyCode::Enter, KeyModifiers::NONE))
            .unwrap();

        assert_eq!(app.host.borrow().value(), "see [docs](http://x)\n\n");
    }

    #[test]
    fn test_emoji_picker_inserts_choice() {
        let dir = TempDir::new().unwrap();
        let mut app = app(&dir, None);
        app.handle_key(key(KeyCode::Char('e'), KeyModifiers::CONTROL))
            .unwrap();
        app.handle_key(key(KeyCode::Right, KeyModifiers::NONE))
            .unwrap();
        app.handle_key(key(KeyCode::Enter, KeyModifiers::NONE))
            .unwrap();

        assert_eq!(app.host.borrow().value(), format!("{}\n\n", EMOJI_PALETTE[1]));
    }

    #[test]
    fn test_image_prompt_uploads_into_post() {
        let dir = TempDir::new().unwrap();
        let image = dir.path().join("cat.png");
        std::fs::write(&image, b"png").unwrap();
        let mut app = app(&dir, None);

        app.handle_key(key(KeyCode::Char('o'), KeyModifiers::CONTROL))
            .unwrap();
        for c in image.to_string_lossy().chars() {
            app.handle_key(key(KeyCode::Char(c), KeyModifiers::NONE))
                .unwrap();
        }
        app.handle_key(key(KeyCode::Enter, KeyModifiers::NONE))
            .unwrap();

        assert_eq!(app.status, "Image inserted");
        let value = app.host.borrow().value().to_string();
        assert!(value.starts_with("![cat.png](file://"), "{value}");
        assert_eq!(std::fs::read_dir(dir.path().join("uploads")).unwrap().count(), 1);
    }

    #[test]
    fn test_convert_modes() {
        let dir = TempDir::new().unwrap();
        let post = dir.path().join("post.md");
        std::fs::write(&post, "hi\n\n\n\n*there*").unwrap();

        assert_eq!(
            convert("--normalize", &post).unwrap(),
            "hi\n\n&nbsp;\n\n*there*\n\n"
        );
        assert_eq!(
            convert("--html", &post).unwrap(),
            "<p>hi</p>\n<p><br /></p>\n<p><em>there</em></p>\n"
        );
        assert!(convert("--json", &post).unwrap().contains("\"there\""));
        assert!(convert("--yaml", &post).is_err());
    }
}
