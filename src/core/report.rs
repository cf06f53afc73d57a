//! Load reports for external files.
//!
//! Platform symbol files and extension scripts report problems here instead
//! of failing, so analysis can continue without the broken resource.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileLoadItemKind {
    Notice,
    Warning,
    Error,
}

impl fmt::Display for FileLoadItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileLoadItemKind::Notice => write!(f, "Notice"),
            FileLoadItemKind::Warning => write!(f, "Warning"),
            FileLoadItemKind::Error => write!(f, "Error"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileLoadItem {
    pub line: Option<usize>,
    pub column: Option<usize>,
    pub kind: FileLoadItemKind,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileLoadReport {
    pub file_name: String,
    items: Vec<FileLoadItem>,
    has_warnings: bool,
    has_errors: bool,
}

impl FileLoadReport {
    pub fn new(file_name: &str) -> Self {
        Self {
            file_name: file_name.to_string(),
            ..Self::default()
        }
    }

    pub fn add(&mut self, kind: FileLoadItemKind, message: impl Into<String>) {
        self.add_at(None, None, kind, message);
    }

    pub fn add_line(&mut self, line: usize, kind: FileLoadItemKind, message: impl Into<String>) {
        self.add_at(Some(line), None, kind, message);
    }

    pub fn add_at(
        &mut self,
        line: Option<usize>,
        column: Option<usize>,
        kind: FileLoadItemKind,
        message: impl Into<String>,
    ) {
        match kind {
            FileLoadItemKind::Warning => self.has_warnings = true,
            FileLoadItemKind::Error => self.has_errors = true,
            FileLoadItemKind::Notice => {}
        }
        self.items.push(FileLoadItem {
            line,
            column,
            kind,
            message: message.into(),
        });
    }

    pub fn has_warnings(&self) -> bool {
        self.has_warnings
    }

    pub fn has_errors(&self) -> bool {
        self.has_errors
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FileLoadItem> + '_ {
        self.items.iter()
    }

    /// Multi-line text for display. Empty if there's nothing to report.
    pub fn format(&self) -> String {
        let mut out = String::new();
        if !self.items.is_empty() {
            out.push_str(&format!("File {}:\n", self.file_name));
        }
        for item in &self.items {
            let kind = item.kind.to_string();
            match (item.line, item.column) {
                (Some(line), Some(col)) => out.push_str(&format!(
                    "  Line {line}.{col}: {}: {}\n",
                    kind.to_lowercase(),
                    item.message
                )),
                (Some(line), None) => out.push_str(&format!(
                    "  Line {line}: {}: {}\n",
                    kind.to_lowercase(),
                    item.message
                )),
                _ => out.push_str(&format!("  {kind}: {}\n", item.message)),
            }
        }
        out
    }
}

impl fmt::Display for FileLoadReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "FileLoadReport: count={} hasWarn={} hasErr={}",
            self.items.len(),
            self.has_warnings,
            self.has_errors
        )
    }
}
