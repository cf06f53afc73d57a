//! Extension script host.
//!
//! Scripts run in a sandbox outside this crate. The core only drives their
//! lifecycle and asks whether a label edit could change what they do.

use crate::core::report::{FileLoadItemKind, FileLoadReport};
use crate::core::symbol::Symbol;
use std::path::Path;

pub trait ExtensionHost {
    /// Unload every script.
    fn clear(&mut self);

    /// Load one script. Problems go in the returned report.
    fn load(&mut self, ident: &str, project_dir: &Path) -> FileLoadReport;

    /// Would adding, removing or renaming this label change script behavior?
    /// Either side may be `None` for an add or a remove.
    fn is_label_significant(&self, old: Option<&Symbol>, new: Option<&Symbol>) -> bool;
}

/// Host used when no sandbox is available. Every load reports a warning.
#[derive(Debug, Default)]
pub struct NullExtensionHost {
    requested: Vec<String>,
}

impl NullExtensionHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scripts requested since the last `clear`.
    pub fn requested(&self) -> &[String] {
        &self.requested
    }
}

impl ExtensionHost for NullExtensionHost {
    fn clear(&mut self) {
        self.requested.clear();
    }

    fn load(&mut self, ident: &str, _project_dir: &Path) -> FileLoadReport {
        self.requested.push(ident.to_string());
        let mut report = FileLoadReport::new(ident);
        report.add(
            FileLoadItemKind::Warning,
            "extension scripts are not supported by this host",
        );
        report
    }

    fn is_label_significant(&self, _old: Option<&Symbol>, _new: Option<&Symbol>) -> bool {
        false
    }
}
