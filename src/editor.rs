/// Operations the assistant core is allowed to perform on the editing
/// surface. The core reads the buffer to build request context and writes it
/// when a proposal is kept or inserted; it never holds onto internals.
pub trait EditorSurface {
    fn get_value(&self) -> String;
    fn set_value(&mut self, text: &str);
    fn focus(&mut self);
    fn replace_selection(&mut self, text: &str);
}

/// Convert a character index to a byte index for UTF-8 safe string operations
pub(crate) fn char_to_byte(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

/// The Markdown text buffer: content, cursor, and an optional selection.
/// Cursor and selection positions are character indices.
pub struct TextBuffer {
    text: String,
    cursor: usize,
    anchor: Option<usize>,
    focused: bool,
}

impl Default for TextBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl TextBuffer {
    pub fn new() -> Self {
        Self {
            text: String::new(),
            cursor: 0,
            anchor: None,
            focused: false,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn is_focused(&self) -> bool {
        self.focused
    }

    pub fn blur(&mut self) {
        self.focused = false;
    }

    /// Ordered selection range, or None when the selection is empty.
    pub fn selection(&self) -> Option<(usize, usize)> {
        match self.anchor {
            Some(anchor) if anchor != self.cursor => {
                Some((anchor.min(self.cursor), anchor.max(self.cursor)))
            }
            _ => None,
        }
    }

    pub fn selected_text(&self) -> String {
        match self.selection() {
            Some((start, end)) => {
                let bs = char_to_byte(&self.text, start);
                let be = char_to_byte(&self.text, end);
                self.text[bs..be].to_string()
            }
            None => String::new(),
        }
    }

    pub fn clear_selection(&mut self) {
        self.anchor = None;
    }

    pub fn insert_char(&mut self, c: char) {
        self.delete_selection();
        let byte_pos = char_to_byte(&self.text, self.cursor);
        self.text.insert(byte_pos, c);
        self.cursor += 1;
    }

    pub fn insert_str(&mut self, s: &str) {
        self.delete_selection();
        let byte_pos = char_to_byte(&self.text, self.cursor);
        self.text.insert_str(byte_pos, s);
        self.cursor += s.chars().count();
    }

    pub fn backspace(&mut self) {
        if self.selection().is_some() {
            self.delete_selection();
        } else if self.cursor > 0 {
            self.cursor -= 1;
            let byte_pos = char_to_byte(&self.text, self.cursor);
            self.text.remove(byte_pos);
        }
        self.anchor = None;
    }

    pub fn delete(&mut self) {
        if self.selection().is_some() {
            self.delete_selection();
        } else if self.cursor < self.char_len() {
            let byte_pos = char_to_byte(&self.text, self.cursor);
            self.text.remove(byte_pos);
        }
        self.anchor = None;
    }

    pub fn move_left(&mut self, extend: bool) {
        self.track_selection(extend);
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn move_right(&mut self, extend: bool) {
        self.track_selection(extend);
        self.cursor = (self.cursor + 1).min(self.char_len());
    }

    pub fn move_up(&mut self, extend: bool) {
        self.track_selection(extend);
        let (line, col) = self.cursor_line_col();
        if line > 0 {
            self.cursor = self.position_at(line - 1, col);
        } else {
            self.cursor = 0;
        }
    }

    pub fn move_down(&mut self, extend: bool) {
        self.track_selection(extend);
        let (line, col) = self.cursor_line_col();
        let last = self.line_starts().len() - 1;
        if line < last {
            self.cursor = self.position_at(line + 1, col);
        } else {
            self.cursor = self.char_len();
        }
    }

    pub fn move_home(&mut self, extend: bool) {
        self.track_selection(extend);
        let (line, _) = self.cursor_line_col();
        self.cursor = self.line_starts()[line];
    }

    pub fn move_end(&mut self, extend: bool) {
        self.track_selection(extend);
        let (line, _) = self.cursor_line_col();
        self.cursor = self.line_starts()[line] + self.line_len(line);
    }

    /// Zero-based (line, column) of the cursor, both in characters.
    pub fn cursor_line_col(&self) -> (usize, usize) {
        let starts = self.line_starts();
        let line = match starts.binary_search(&self.cursor) {
            Ok(i) => i,
            Err(i) => i - 1,
        };
        (line, self.cursor - starts[line])
    }

    fn track_selection(&mut self, extend: bool) {
        if extend {
            if self.anchor.is_none() {
                self.anchor = Some(self.cursor);
            }
        } else {
            self.anchor = None;
        }
    }

    fn delete_selection(&mut self) {
        if let Some((start, end)) = self.selection() {
            let bs = char_to_byte(&self.text, start);
            let be = char_to_byte(&self.text, end);
            self.text.replace_range(bs..be, "");
            self.cursor = start;
        }
        self.anchor = None;
    }

    /// Character index of the start of each line.
    fn line_starts(&self) -> Vec<usize> {
        let mut starts = vec![0];
        for (i, c) in self.text.chars().enumerate() {
            if c == '\n' {
                starts.push(i + 1);
            }
        }
        starts
    }

    fn line_len(&self, line: usize) -> usize {
        let starts = self.line_starts();
        let start = starts[line];
        let end = starts
            .get(line + 1)
            .map(|next| next - 1)
            .unwrap_or_else(|| self.char_len());
        end - start
    }

    fn position_at(&self, line: usize, col: usize) -> usize {
        let starts = self.line_starts();
        starts[line] + col.min(self.line_len(line))
    }
}

impl EditorSurface for TextBuffer {
    fn get_value(&self) -> String {
        self.text.clone()
    }

    fn set_value(&mut self, text: &str) {
        self.text = text.to_string();
        self.cursor = self.cursor.min(self.char_len());
        self.anchor = None;
    }

    fn focus(&mut self) {
        self.focused = true;
    }

    fn replace_selection(&mut self, text: &str) {
        self.insert_str(text);
    }
}
