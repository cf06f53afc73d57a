//! The project: owner of every persistent and derived structure.
//!
//! Persistent state changes only through change sets (see [`crate::change`]).
//! Derived state is rebuilt by the analysis pipeline and is read through
//! `&self` accessors, so nothing can hold on to it across a reanalysis.

pub mod queries;
pub mod repair;

use crate::analysis::data_fill::BasicDataAnalyzer;
use crate::analysis::pipeline::{DerivedState, Pipeline};
use crate::analysis::tracer::MiniTracer;
use crate::analysis::{AnalyzerTag, CodeAnalyzer, DataAnalyzer};
use crate::change::apply::{apply_changes, ApplyOutcome};
use crate::change::change_set::ChangeSet;
use crate::change::undo_stack::UndoStack;
use crate::change::undoable::ReanalysisScope;
use crate::config::ProjectProperties;
use crate::core::address_map::AddressMap;
use crate::core::anattrib::MiscFlags;
use crate::core::comment::MultiLineComment;
use crate::core::file_image::FileImage;
use crate::core::format_descriptor::FormatDescriptor;
use crate::core::local_variables::LocalVariableTable;
use crate::core::range_set::TypedRangeSet;
use crate::core::report::FileLoadReport;
use crate::core::status_flags::StatusFlags;
use crate::core::symbol::Symbol;
use crate::error::{DisasmError, Result};
use crate::external::extensions::{ExtensionHost, NullExtensionHost};
use crate::external::platform_symbols::PlatformSymbolList;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Per-offset tables authored by the user, as a persistence layer would
/// hand them over.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProjectTables {
    pub user_labels: BTreeMap<usize, Symbol>,
    pub operand_formats: BTreeMap<usize, FormatDescriptor>,
    pub comments: BTreeMap<usize, String>,
    pub long_comments: BTreeMap<usize, MultiLineComment>,
    pub notes: BTreeMap<usize, MultiLineComment>,
    pub lv_tables: BTreeMap<usize, LocalVariableTable>,
    pub analyzer_tags: TypedRangeSet<AnalyzerTag>,
    pub status_overrides: BTreeMap<usize, StatusFlags>,
    pub misc_flags: BTreeMap<usize, MiscFlags>,
}

pub struct DisasmProject {
    pub(crate) image: FileImage,
    pub(crate) addr_map: AddressMap,
    pub(crate) props: ProjectProperties,
    pub(crate) tables: ProjectTables,
    pub(crate) project_dir: PathBuf,
    pub(crate) platform_lists: Vec<PlatformSymbolList>,
    pub(crate) ext_host: Box<dyn ExtensionHost>,
    code_analyzer: Box<dyn CodeAnalyzer>,
    data_analyzer: Box<dyn DataAnalyzer>,
    pub(crate) derived: DerivedState,
    undo: UndoStack,
}

impl DisasmProject {
    /// Empty project for `image`, loaded as one region at `load_address`.
    pub fn new(image: FileImage, load_address: i32, props: ProjectProperties) -> Self {
        let addr_map = AddressMap::new(image.len(), load_address);
        Self {
            image,
            addr_map,
            props,
            tables: ProjectTables::default(),
            project_dir: PathBuf::from("."),
            platform_lists: Vec::new(),
            ext_host: Box::new(NullExtensionHost::new()),
            code_analyzer: Box::new(MiniTracer::new()),
            data_analyzer: Box::new(BasicDataAnalyzer::new()),
            derived: DerivedState::default(),
            undo: UndoStack::new(),
        }
    }

    /// Assemble a project from deserialized parts, then repair the tables.
    /// The report lists anything that had to be discarded. Only an address
    /// map that doesn't match the file length is an error.
    pub fn from_parts(
        image: FileImage,
        addr_map: AddressMap,
        props: ProjectProperties,
        tables: ProjectTables,
    ) -> Result<(Self, FileLoadReport)> {
        if addr_map.file_len() != image.len() {
            return Err(DisasmError::InvalidInput(format!(
                "address map covers {} bytes, file has {}",
                addr_map.file_len(),
                image.len()
            )));
        }
        let mut project = Self::new(image, 0, props);
        project.addr_map = addr_map;
        project.tables = tables;
        let report = project.fix_and_validate();
        Ok((project, report))
    }

    pub fn with_code_analyzer(mut self, analyzer: Box<dyn CodeAnalyzer>) -> Self {
        self.code_analyzer = analyzer;
        self
    }

    pub fn with_data_analyzer(mut self, analyzer: Box<dyn DataAnalyzer>) -> Self {
        self.data_analyzer = analyzer;
        self
    }

    pub fn with_extension_host(mut self, host: Box<dyn ExtensionHost>) -> Self {
        self.ext_host = host;
        self
    }

    /// Directory used to resolve `PROJ:` file identifiers.
    pub fn with_project_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.project_dir = dir.into();
        self
    }

    /// Load external files and run a full analysis. Returns the load report
    /// text, empty if nothing went wrong.
    pub fn prepare(&mut self) -> String {
        let report = self.load_external_files();
        self.analyze(ReanalysisScope::CodeAndData);
        report
    }

    /// Reload platform symbol files and extension scripts named in the
    /// properties.
    pub fn load_external_files(&mut self) -> String {
        let (lists, text) = crate::external::load_external_files(
            &self.props,
            &self.project_dir,
            self.ext_host.as_mut(),
        );
        self.platform_lists = lists;
        if !text.is_empty() {
            warn!(report = %text.trim_end(), "Problems loading external files");
        }
        text
    }

    /// Rebuild derived state. `None` and `DisplayOnly` do nothing.
    pub fn analyze(&mut self, scope: ReanalysisScope) {
        Pipeline {
            data: self.image.data(),
            addr_map: &self.addr_map,
            props: &self.props,
            platform_lists: &self.platform_lists,
            analyzer_tags: &self.tables.analyzer_tags,
            status_overrides: &self.tables.status_overrides,
            misc_flags: &self.tables.misc_flags,
            lv_tables: &self.tables.lv_tables,
            user_labels: &mut self.tables.user_labels,
            operand_formats: &mut self.tables.operand_formats,
            code_analyzer: self.code_analyzer.as_mut(),
            data_analyzer: self.data_analyzer.as_mut(),
        }
        .run(&mut self.derived, scope);
    }

    /// Apply `cs` to persistent state without touching the undo stack or
    /// running analysis.
    pub fn apply_changes(&mut self, cs: &ChangeSet, backward: bool) -> Result<ApplyOutcome> {
        apply_changes(self, cs, backward)
    }

    /// Record a change set that has already been applied.
    pub fn push_change_set(&mut self, cs: ChangeSet) {
        self.undo.push(cs);
    }

    /// Apply a new change set, record it, and reanalyze as much as it needs.
    pub fn do_changes(&mut self, cs: ChangeSet) -> Result<ApplyOutcome> {
        let outcome = self.apply_and_reanalyze(&cs, false)?;
        self.undo.push(cs);
        Ok(outcome)
    }

    /// Reverse the most recent change set.
    pub fn undo(&mut self) -> Result<ApplyOutcome> {
        let cs = self.undo.pop_undo()?.clone();
        info!(changes = cs.len(), "Undo");
        self.apply_and_reanalyze(&cs, true)
    }

    /// Re-apply the most recently undone change set.
    pub fn redo(&mut self) -> Result<ApplyOutcome> {
        let cs = self.undo.pop_redo()?.clone();
        info!(changes = cs.len(), "Redo");
        self.apply_and_reanalyze(&cs, false)
    }

    fn apply_and_reanalyze(&mut self, cs: &ChangeSet, backward: bool) -> Result<ApplyOutcome> {
        match apply_changes(self, cs, backward) {
            Ok(outcome) => {
                self.analyze(outcome.severity);
                Ok(outcome)
            }
            Err(err) => {
                // Part of the set may have landed; bring derived state back
                // in line with whatever persistent state we have now.
                let err = crate::log_error!(err, "change set aborted");
                self.analyze(ReanalysisScope::CodeAndData);
                Err(err)
            }
        }
    }

    pub fn image(&self) -> &FileImage {
        &self.image
    }

    pub fn data(&self) -> &[u8] {
        self.image.data()
    }

    pub fn addr_map(&self) -> &AddressMap {
        &self.addr_map
    }

    pub fn props(&self) -> &ProjectProperties {
        &self.props
    }

    pub fn tables(&self) -> &ProjectTables {
        &self.tables
    }

    pub fn user_labels(&self) -> &BTreeMap<usize, Symbol> {
        &self.tables.user_labels
    }

    pub fn operand_formats(&self) -> &BTreeMap<usize, FormatDescriptor> {
        &self.tables.operand_formats
    }

    pub fn project_dir(&self) -> &Path {
        &self.project_dir
    }

    pub fn platform_lists(&self) -> &[PlatformSymbolList] {
        &self.platform_lists
    }

    pub fn undo_stack(&self) -> &UndoStack {
        &self.undo
    }

    /// Mark the current undo position as the saved state.
    pub fn mark_saved(&mut self) {
        self.undo.reset_dirty_flag();
    }

    pub fn is_dirty(&self) -> bool {
        self.undo.is_dirty()
    }
}
