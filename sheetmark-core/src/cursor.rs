/// Row cursor over a loaded table.
///
/// The index always stays in `[0, len - 1]` for a non-empty table; moving
/// past either end is a no-op rather than a wrap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RowCursor {
    index: usize,
    len: usize,
}

impl RowCursor {
    pub fn new(len: usize) -> Self {
        Self { index: 0, len }
    }

    /// Point at a freshly loaded table of `len` rows
    pub fn reset(&mut self, len: usize) {
        self.len = len;
        self.index = 0;
    }

    /// Current row index (0-based)
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// 1-based position for display
    pub fn position(&self) -> usize {
        if self.len == 0 {
            0
        } else {
            self.index + 1
        }
    }

    /// Fraction of the table reached, for progress bars
    pub fn progress(&self) -> f64 {
        if self.len == 0 {
            0.0
        } else {
            self.position() as f64 / self.len as f64
        }
    }

    pub fn is_first(&self) -> bool {
        self.index == 0
    }

    pub fn is_last(&self) -> bool {
        self.index + 1 >= self.len
    }

    pub fn prev(&mut self) {
        if self.index > 0 {
            self.index -= 1;
        }
    }

    pub fn next(&mut self) {
        if self.index + 1 < self.len {
            self.index += 1;
        }
    }

    pub fn first(&mut self) {
        self.index = 0;
    }

    pub fn last(&mut self) {
        self.index = self.len.saturating_sub(1);
    }

    /// Jump to a row, clamped to the table
    pub fn jump_to(&mut self, index: usize) {
        self.index = index.min(self.len.saturating_sub(1));
    }
}
