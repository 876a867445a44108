use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

/// Result of feeding a key to the input box
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputAction {
    /// The key edited the text or moved the cursor
    Edited,
    /// A question was sent; holds the raw, untrimmed text
    Send(String),
    /// The key is not handled by the input box
    Ignored,
}

/// Multi-line question box with a send trigger
#[derive(Debug, Clone)]
pub struct QuestionInput {
    text: String,
    cursor: usize,
    pub placeholder: String,
    pub clear_on_send: bool,
    pub disabled: bool,
}

impl QuestionInput {
    pub fn new(placeholder: &str, clear_on_send: bool) -> Self {
        Self {
            text: String::new(),
            cursor: 0,
            placeholder: placeholder.to_string(),
            clear_on_send,
            disabled: false,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    #[cfg(test)]
    pub fn set_text(&mut self, text: &str) {
        self.text = text.to_string();
        self.cursor = self.text.chars().count();
    }

    /// Send the current text unless disabled or blank
    pub fn send(&mut self) -> Option<String> {
        if self.disabled || self.text.trim().is_empty() {
            return None;
        }

        let question = self.text.clone();

        if self.clear_on_send {
            self.text.clear();
            self.cursor = 0;
        }

        Some(question)
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> InputAction {
        match key.code {
            KeyCode::Enter
                if key.modifiers.intersects(KeyModifiers::SHIFT | KeyModifiers::ALT) =>
            {
                self.insert('\n');
                InputAction::Edited
            }
            KeyCode::Enter => match self.send() {
                Some(question) => InputAction::Send(question),
                None => InputAction::Edited,
            },
            KeyCode::Backspace => {
                if self.cursor > 0 {
                    self.cursor -= 1;
                    let byte_pos = char_to_byte_index(&self.text, self.cursor);
                    self.text.remove(byte_pos);
                }
                InputAction::Edited
            }
            KeyCode::Delete => {
                let char_count = self.text.chars().count();
                if self.cursor < char_count {
                    let byte_pos = char_to_byte_index(&self.text, self.cursor);
                    self.text.remove(byte_pos);
                }
                InputAction::Edited
            }
            KeyCode::Left => {
                self.cursor = self.cursor.saturating_sub(1);
                InputAction::Edited
            }
            KeyCode::Right => {
                let char_count = self.text.chars().count();
                self.cursor = (self.cursor + 1).min(char_count);
                InputAction::Edited
            }
            KeyCode::Home => {
                self.cursor = 0;
                InputAction::Edited
            }
            KeyCode::End => {
                self.cursor = self.text.chars().count();
                InputAction::Edited
            }
            KeyCode::Char(_) if key.modifiers.contains(KeyModifiers::CONTROL) => InputAction::Ignored,
            KeyCode::Char(c) => {
                self.insert(c);
                InputAction::Edited
            }
            _ => InputAction::Ignored,
        }
    }

    fn insert(&mut self, c: char) {
        let byte_pos = char_to_byte_index(&self.text, self.cursor);
        self.text.insert(byte_pos, c);
        self.cursor += 1;
    }

    /// Line and column of the cursor, both counted in chars
    pub fn cursor_line_col(&self) -> (usize, usize) {
        let before: String = self.text.chars().take(self.cursor).collect();
        let line = before.matches('\n').count();
        let col = before
            .rsplit('\n')
            .next()
            .map(|l| l.chars().count())
            .unwrap_or(0);
        (line, col)
    }
}
