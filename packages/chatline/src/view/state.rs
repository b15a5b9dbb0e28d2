use std::path::PathBuf;

use chat_protocol::{FrameOutcome, InboundFrame, Message, MessageLog, UploadedFile};
use ratatui::crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use tracing::{debug, warn};
use unicode_width::UnicodeWidthChar;

use crate::connection::{ConnectionState, TextSender};
use crate::upload::UploadError;

pub const UPLOAD_FAILED_TEXT: &str = "Failed to upload files. Please try again.";

/// Single-line text input with a byte-offset cursor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Composer {
    buffer: String,
    cursor: usize,
}

impl Composer {
    pub fn text(&self) -> &str {
        &self.buffer
    }

    pub fn is_blank(&self) -> bool {
        self.buffer.trim().is_empty()
    }

    /// Terminal columns taken by the text before the cursor.
    pub fn cursor_col(&self) -> usize {
        self.buffer[..self.cursor]
            .chars()
            .map(|c| c.width().unwrap_or(0))
            .sum()
    }

    pub fn insert(&mut self, c: char) {
        self.buffer.insert(self.cursor, c);
        self.cursor += c.len_utf8();
    }

    pub fn backspace(&mut self) {
        if let Some((prev, _)) = self.buffer[..self.cursor].char_indices().next_back() {
            self.buffer.remove(prev);
            self.cursor = prev;
        }
    }

    pub fn delete(&mut self) {
        if self.cursor < self.buffer.len() {
            self.buffer.remove(self.cursor);
        }
    }

    pub fn left(&mut self) {
        if let Some((prev, _)) = self.buffer[..self.cursor].char_indices().next_back() {
            self.cursor = prev;
        }
    }

    pub fn right(&mut self) {
        if let Some(c) = self.buffer[self.cursor..].chars().next() {
            self.cursor += c.len_utf8();
        }
    }

    pub fn home(&mut self) {
        self.cursor = 0;
    }

    pub fn end(&mut self) {
        self.cursor = self.buffer.len();
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
        self.cursor = 0;
    }

    /// Apply a plain editing key. Returns false if the key is not an edit.
    fn edit(&mut self, key: &KeyEvent) -> bool {
        match key.code {
            KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => self.insert(c),
            KeyCode::Backspace => self.backspace(),
            KeyCode::Delete => self.delete(),
            KeyCode::Left => self.left(),
            KeyCode::Right => self.right(),
            KeyCode::Home => self.home(),
            KeyCode::End => self.end(),
            _ => return false,
        }
        true
    }
}

/// Split the attach prompt into paths. Whitespace separates paths unless it
/// sits inside `"` or `'` quotes or follows a backslash.
pub(crate) fn parse_paths(input: &str) -> Vec<PathBuf> {
    let mut paths = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => current.push(c),
            None => match c {
                '"' | '\'' => quote = Some(c),
                // Only escapes whitespace, so Windows separators survive.
                '\\' if chars.peek().is_some_and(|n| n.is_whitespace()) => {
                    if let Some(next) = chars.next() {
                        current.push(next);
                    }
                }
                c if c.is_whitespace() => {
                    if !current.is_empty() {
                        paths.push(PathBuf::from(std::mem::take(&mut current)));
                    }
                }
                c => current.push(c),
            },
        }
    }
    if !current.is_empty() {
        paths.push(PathBuf::from(current));
    }
    paths
}

/// What the chat loop has to do after a key press.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewAction {
    None,
    Quit,
    Upload(Vec<PathBuf>),
}

/// The whole client-side conversation state. All mutations happen on the
/// chat loop task.
#[derive(Debug)]
pub struct ConversationView {
    log: MessageLog,
    composer: Composer,
    /// Open while the user is typing paths to attach
    attach: Option<Composer>,
    connection: ConnectionState,
    loading: bool,
    uploading: bool,
    alert: Option<String>,
}

impl Default for ConversationView {
    fn default() -> Self {
        Self::new()
    }
}

impl ConversationView {
    pub fn new() -> Self {
        Self {
            log: MessageLog::new(),
            composer: Composer::default(),
            attach: None,
            connection: ConnectionState::Connecting,
            loading: false,
            uploading: false,
            alert: None,
        }
    }

    pub fn messages(&self) -> &[Message] {
        self.log.messages()
    }

    pub fn composer(&self) -> &Composer {
        &self.composer
    }

    pub fn attach_prompt(&self) -> Option<&Composer> {
        self.attach.as_ref()
    }

    pub fn connection(&self) -> ConnectionState {
        self.connection
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn is_uploading(&self) -> bool {
        self.uploading
    }

    pub fn alert(&self) -> Option<&str> {
        self.alert.as_deref()
    }

    /// Send the composer's text as a user message.
    ///
    /// No-op when the input is blank, the connection is not up, or a reply
    /// is still loading. At most one turn is in flight at a time.
    pub fn submit(&mut self, out: &impl TextSender) -> bool {
        if self.composer.is_blank() || !self.connection.is_connected() || self.loading {
            return false;
        }

        let text = self.composer.text().to_string();
        self.log.push_user(text.as_str());
        self.loading = true;
        if !out.send_text(&text) {
            debug!("user text lost to a disconnect race");
        }
        self.composer.clear();
        true
    }

    pub fn apply_frame(&mut self, frame: &InboundFrame) -> FrameOutcome {
        let outcome = self.log.apply(frame);
        if frame.ends_loading() {
            self.loading = false;
        }
        outcome
    }

    pub fn set_connection(&mut self, state: ConnectionState) {
        self.connection = state;
    }

    pub fn upload_succeeded(&mut self, files: &[UploadedFile]) {
        self.uploading = false;
        self.attach = None;
        self.log
            .push_upload_summary(files.iter().map(|f| f.filename.as_str()));
    }

    pub fn upload_failed(&mut self, err: &UploadError) {
        warn!("upload failed: {}", err);
        self.uploading = false;
        self.alert = Some(UPLOAD_FAILED_TEXT.to_string());
    }

    pub fn handle_key(&mut self, key: KeyEvent, out: &impl TextSender) -> ViewAction {
        if key.kind != KeyEventKind::Press {
            return ViewAction::None;
        }
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);

        if ctrl && key.code == KeyCode::Char('c') {
            return ViewAction::Quit;
        }

        // The alert is modal: the first key only dismisses it.
        if self.alert.take().is_some() {
            return ViewAction::None;
        }

        if let Some(prompt) = self.attach.as_mut() {
            match key.code {
                KeyCode::Esc => self.attach = None,
                KeyCode::Enter => {
                    let paths = parse_paths(prompt.text());
                    if paths.is_empty() || self.uploading {
                        return ViewAction::None;
                    }
                    self.uploading = true;
                    return ViewAction::Upload(paths);
                }
                _ => {
                    prompt.edit(&key);
                }
            }
            return ViewAction::None;
        }

        match key.code {
            KeyCode::Esc => ViewAction::Quit,
            KeyCode::Enter => {
                self.submit(out);
                ViewAction::None
            }
            KeyCode::Char('o') if ctrl => {
                self.attach = Some(Composer::default());
                ViewAction::None
            }
            _ => {
                self.composer.edit(&key);
                ViewAction::None
            }
        }
    }
}
