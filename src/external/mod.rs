//! External resources: platform symbol files and extension scripts.
//!
//! Failures here never abort analysis. Each file gets a `FileLoadReport`
//! and the reports are flattened into one block of text for the caller.

pub mod extensions;
pub mod platform_symbols;

use crate::config::ProjectProperties;
use crate::external::extensions::ExtensionHost;
use crate::external::platform_symbols::PlatformSymbolList;
use std::path::{Path, PathBuf};
use tracing::info;

/// Prefix for identifiers relative to the project directory.
pub const PROJECT_PREFIX: &str = "PROJ:";

/// Resolve a file identifier against the project directory.
pub fn resolve_ident(project_dir: &Path, ident: &str) -> PathBuf {
    let rel = ident.strip_prefix(PROJECT_PREFIX).unwrap_or(ident);
    let path = Path::new(rel);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        project_dir.join(path)
    }
}

/// Reload platform symbol files and extension scripts named in `props`.
///
/// Returns the loaded symbol lists (in load order, failed files omitted) and
/// the combined report text, which is empty when nothing went wrong.
pub fn load_external_files(
    props: &ProjectProperties,
    project_dir: &Path,
    host: &mut dyn ExtensionHost,
) -> (Vec<PlatformSymbolList>, String) {
    let _span = crate::span_trace!("load_external_files").entered();
    let mut lists = Vec::with_capacity(props.platform_symbol_files.len());
    let mut text = String::new();

    for (ordinal, ident) in props.platform_symbol_files.iter().enumerate() {
        let path = resolve_ident(project_dir, ident);
        let (list, report) = PlatformSymbolList::load_from_file(&path, ident, ordinal);
        text.push_str(&report.format());
        if !report.has_errors() {
            lists.push(list);
        }
    }

    host.clear();
    for ident in &props.extension_scripts {
        let report = host.load(ident, project_dir);
        text.push_str(&report.format());
    }

    info!(
        platform_files = lists.len(),
        scripts = props.extension_scripts.len(),
        "External files loaded"
    );
    (lists, text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::external::extensions::NullExtensionHost;

    #[test]
    fn test_resolve_ident() {
        let dir = Path::new("/proj");
        assert_eq!(resolve_ident(dir, "PROJ:a.sym65"), PathBuf::from("/proj/a.sym65"));
        assert_eq!(resolve_ident(dir, "/abs/b.sym65"), PathBuf::from("/abs/b.sym65"));
    }

    #[test]
    fn test_missing_file_reported() {
        let dir = tempfile::tempdir().unwrap();
        let mut props = ProjectProperties::default();
        props.platform_symbol_files.push("missing.sym65".to_string());
        let mut host = NullExtensionHost::new();
        let (lists, text) = load_external_files(&props, dir.path(), &mut host);
        assert!(lists.is_empty());
        assert!(text.starts_with("File missing.sym65:\n  Error: "));
    }
}
