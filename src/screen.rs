//! Key input and in-place rendering for the interactive flows.
//!
//! State machines never touch the terminal: they consume [`Key`]s and
//! describe themselves as a [`View`]. The [`Screen`] redraws views in place
//! on a terminal and appends them when stderr is piped.

use std::io::{self, IsTerminal, Read};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

use console::{Style, Term};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal;
use tokio::sync::mpsc;

/// How long a terminal read waits before checking for shutdown.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// A key press, already decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Char(char),
    Enter,
    Escape,
    Backspace,
}

impl Key {
    fn from_event(key: KeyEvent) -> Option<Self> {
        if key.kind == KeyEventKind::Release {
            return None;
        }
        match key.code {
            // Ctrl-C in raw mode arrives as a key, not a signal.
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                Some(Key::Escape)
            }
            KeyCode::Char(c) if !c.is_control() => Some(Key::Char(c)),
            KeyCode::Enter => Some(Key::Enter),
            KeyCode::Esc => Some(Key::Escape),
            KeyCode::Backspace => Some(Key::Backspace),
            _ => None,
        }
    }

    /// Decode one byte of piped input.
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            b'\n' | b'\r' => Some(Key::Enter),
            0x1b | 0x03 => Some(Key::Escape),
            0x7f | 0x08 => Some(Key::Backspace),
            0x20..=0x7e => Some(Key::Char(b as char)),
            _ => None,
        }
    }
}

// ── Key reader ───────────────────────────────────────────

/// Somewhere key presses come from, read with a bounded wait.
pub trait KeySource: Send + 'static {
    /// Wait up to `timeout` for a key. `Ok(None)` when nothing arrived.
    fn poll_key(&mut self, timeout: Duration) -> io::Result<Option<Key>>;
}

/// The controlling terminal in raw mode. Raw mode ends when this drops.
pub struct TerminalKeys(());

impl TerminalKeys {
    pub fn enable() -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        Ok(Self(()))
    }
}

impl KeySource for TerminalKeys {
    fn poll_key(&mut self, timeout: Duration) -> io::Result<Option<Key>> {
        if !event::poll(timeout)? {
            return Ok(None);
        }
        match event::read()? {
            Event::Key(key) => Ok(Key::from_event(key)),
            _ => Ok(None),
        }
    }
}

impl Drop for TerminalKeys {
    fn drop(&mut self) {
        if let Err(e) = terminal::disable_raw_mode() {
            tracing::warn!(error = %e, "cannot restore terminal mode");
        }
    }
}

/// Background thread feeding key presses into a channel.
///
/// Dropping the reader stops a polling thread and waits for it, so the
/// terminal is back in its original mode once the drop returns. A reader
/// over piped stdin is left blocked in `read`; it holds no terminal state.
pub struct KeyReader {
    shutdown: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl KeyReader {
    /// Read from the terminal in raw mode, or decode piped stdin bytes with
    /// [`Key::from_byte`]. The channel closes at end of input.
    pub fn spawn() -> (Self, mpsc::UnboundedReceiver<Key>) {
        if std::io::stdin().is_terminal() {
            match TerminalKeys::enable() {
                Ok(source) => return Self::with_source(source),
                Err(e) => tracing::warn!(error = %e, "raw mode unavailable, reading lines"),
            }
        }
        Self::piped()
    }

    /// Poll `source` on a thread until the reader is dropped.
    pub fn with_source<S: KeySource>(mut source: S) -> (Self, mpsc::UnboundedReceiver<Key>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let shutdown = Arc::new(AtomicBool::new(false));
        let stop = shutdown.clone();

        let thread = std::thread::spawn(move || {
            while !stop.load(Ordering::Acquire) {
                match source.poll_key(POLL_INTERVAL) {
                    Ok(Some(key)) => {
                        if tx.send(key).is_err() {
                            break;
                        }
                    }
                    Ok(None) => {}
                    Err(e) => {
                        tracing::debug!(error = %e, "key reader stopped");
                        break;
                    }
                }
            }
            drop(source);
        });

        let reader = Self {
            shutdown,
            thread: Some(thread),
        };
        (reader, rx)
    }

    fn piped() -> (Self, mpsc::UnboundedReceiver<Key>) {
        let (tx, rx) = mpsc::unbounded_channel();
        std::thread::spawn(move || {
            let mut stdin = std::io::stdin().lock();
            let mut buf = [0u8; 256];
            loop {
                let n = match stdin.read(&mut buf) {
                    Ok(0) | Err(_) => return,
                    Ok(n) => n,
                };
                for key in buf[..n].iter().filter_map(|b| Key::from_byte(*b)) {
                    if tx.send(key).is_err() {
                        return;
                    }
                }
            }
        });

        let reader = Self {
            shutdown: Arc::new(AtomicBool::new(false)),
            thread: None,
        };
        (reader, rx)
    }
}

impl Drop for KeyReader {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Release);
        if let Some(thread) = self.thread.take()
            && thread.join().is_err()
        {
            tracing::warn!("key reader thread panicked");
        }
    }
}

// ── Views ────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Plain,
    Info,
    Success,
    Warning,
    Danger,
    Muted,
}

impl Tone {
    fn style(self) -> Style {
        match self {
            Tone::Plain => Style::new(),
            Tone::Info => Style::new().cyan(),
            Tone::Success => Style::new().green(),
            Tone::Warning => Style::new().yellow(),
            Tone::Danger => Style::new().red(),
            Tone::Muted => Style::new().dim(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    pub tone: Tone,
    pub text: String,
}

/// Declarative description of one screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct View {
    pub title: String,
    pub tone: Tone,
    pub lines: Vec<Line>,
}

impl View {
    pub fn new(tone: Tone, title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            tone,
            lines: Vec::new(),
        }
    }

    pub fn line(mut self, tone: Tone, text: impl Into<String>) -> Self {
        self.lines.push(Line {
            tone,
            text: text.into(),
        });
        self
    }

    pub fn blank(self) -> Self {
        self.line(Tone::Plain, "")
    }

    /// Every line's text, title first. Used by tests and plain output.
    pub fn text(&self) -> String {
        std::iter::once(self.title.as_str())
            .chain(self.lines.iter().map(|l| l.text.as_str()))
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn render(&self) -> Vec<String> {
        let mut out = vec![self.tone.style().bold().apply_to(&self.title).to_string()];
        out.extend(
            self.lines
                .iter()
                .map(|l| l.tone.style().apply_to(&l.text).to_string()),
        );
        out
    }
}

// ── Screen ───────────────────────────────────────────────

/// Redraws the current view on stderr.
pub struct Screen {
    term: Term,
    drawn: Vec<String>,
}

impl Default for Screen {
    fn default() -> Self {
        Self::new()
    }
}

impl Screen {
    pub fn new() -> Self {
        Self {
            term: Term::stderr(),
            drawn: Vec::new(),
        }
    }

    /// Replace the previous view. Unchanged views are not redrawn.
    pub fn draw(&mut self, view: &View) {
        let lines = view.render();
        if lines == self.drawn {
            return;
        }
        if self.term.is_term() && !self.drawn.is_empty() {
            let _ = self.term.clear_last_lines(self.drawn.len());
        }
        // Raw mode does not translate \n, so every line ends in \r\n.
        for line in &lines {
            let _ = self.term.write_str(&format!("{line}\r\n"));
        }
        self.drawn = lines;
    }

    /// Forget the current view so the next draw starts below it.
    pub fn detach(&mut self) {
        self.drawn.clear();
    }
}
