//! Multi-line comments and notes.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MultiLineComment {
    pub text: String,
    /// Draw a box around the text
    pub box_mode: bool,
    /// Word-wrap width
    pub max_width: usize,
}

impl MultiLineComment {
    pub const DEFAULT_WIDTH: usize = 80;

    pub fn new(text: &str) -> Self {
        Self {
            text: text.to_string(),
            box_mode: false,
            max_width: Self::DEFAULT_WIDTH,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}
