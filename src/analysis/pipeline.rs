//! Reanalysis orchestrator.
//!
//! Runs every stage in order over the project's persistent inputs and
//! rebuilds the derived state. Code-and-data analysis starts from a zeroed
//! attribute array and keeps a copy of the code analyzer's output; data-only
//! analysis starts from that copy instead.
//!
//! Nothing here returns an error. Problems with user data become messages,
//! internal inconsistencies are logged.

use crate::analysis::apply::{apply_format_descriptors, apply_user_labels, remove_hidden_labels};
use crate::analysis::autolabel::annotate_auto_labels;
use crate::analysis::platform_refs::generate_platform_symbol_refs;
use crate::analysis::symbol_merge::{
    merge_address_pre_labels, merge_platform_project_symbols, update_and_merge_user_labels,
};
use crate::analysis::validate::{validate, validate_address_map};
use crate::analysis::variable_refs::generate_variable_refs;
use crate::analysis::xrefs::generate_xrefs;
use crate::analysis::{
    AnalyzerTag, ByteCounts, CodeAnalysisInput, CodeAnalyzer, DataAnalysisInput, DataAnalyzer,
};
use crate::change::undoable::ReanalysisScope;
use crate::config::{AutoLabelStyle, ProjectProperties};
use crate::core::address_map::AddressMap;
use crate::core::anattrib::{Anattrib, MiscFlags};
use crate::core::def_symbol::DefSymbol;
use crate::core::format_descriptor::FormatDescriptor;
use crate::core::local_variables::LocalVariableTable;
use crate::core::messages::MessageList;
use crate::core::range_set::TypedRangeSet;
use crate::core::status_flags::StatusFlags;
use crate::core::symbol::{Symbol, SymbolSource};
use crate::core::symbol_table::SymbolTable;
use crate::core::xref::XrefSet;
use crate::external::platform_symbols::PlatformSymbolList;
use std::collections::BTreeMap;
use tracing::{debug, error, info};

/// Everything the pipeline produces. Replaced wholesale by each run.
#[derive(Debug, Clone, Default)]
pub struct DerivedState {
    pub anattribs: Vec<Anattrib>,
    /// Attribute array as the code analyzer left it
    pub code_snapshot: Option<Vec<Anattrib>>,
    pub symbols: SymbolTable,
    pub xrefs: BTreeMap<usize, XrefSet>,
    /// Xrefs to project, platform and variable symbols, by label
    pub def_xrefs: BTreeMap<String, XrefSet>,
    /// Project and platform symbols with at least one reference
    pub active_defs: Vec<DefSymbol>,
    pub messages: MessageList,
    pub byte_counts: ByteCounts,
}

/// Borrowed view of the project handed to one pipeline run.
///
/// User labels may have stale values corrected and operand formats may be
/// relabeled when auto labels are annotated; nothing else is written.
pub struct Pipeline<'a> {
    pub data: &'a [u8],
    pub addr_map: &'a AddressMap,
    pub props: &'a ProjectProperties,
    pub platform_lists: &'a [PlatformSymbolList],
    pub analyzer_tags: &'a TypedRangeSet<AnalyzerTag>,
    pub status_overrides: &'a BTreeMap<usize, StatusFlags>,
    pub misc_flags: &'a BTreeMap<usize, MiscFlags>,
    pub lv_tables: &'a BTreeMap<usize, LocalVariableTable>,
    pub user_labels: &'a mut BTreeMap<usize, Symbol>,
    pub operand_formats: &'a mut BTreeMap<usize, FormatDescriptor>,
    pub code_analyzer: &'a mut dyn CodeAnalyzer,
    pub data_analyzer: &'a mut dyn DataAnalyzer,
}

impl Pipeline<'_> {
    /// Run the pipeline at `scope`. `None` and `DisplayOnly` do nothing.
    /// A data-only run without a cached code snapshot is promoted to a full
    /// run.
    pub fn run(self, derived: &mut DerivedState, scope: ReanalysisScope) {
        let full = match scope {
            ReanalysisScope::None | ReanalysisScope::DisplayOnly => return,
            ReanalysisScope::CodeAndData => true,
            ReanalysisScope::DataOnly => {
                let usable = derived
                    .code_snapshot
                    .as_ref()
                    .is_some_and(|s| s.len() == self.data.len());
                if !usable {
                    debug!("No code snapshot, running full analysis");
                }
                !usable
            }
        };
        let _span = crate::span_trace!("analyze", full, len = self.data.len()).entered();

        let Pipeline {
            data,
            addr_map,
            props,
            platform_lists,
            analyzer_tags,
            status_overrides,
            misc_flags,
            lv_tables,
            user_labels,
            operand_formats,
            code_analyzer,
            data_analyzer,
        } = self;

        derived.messages.clear();

        {
            let _span = crate::span_trace!("symbol_merge").entered();
            derived.symbols.clear();
            merge_platform_project_symbols(&mut derived.symbols, platform_lists, &props.project_symbols);
            merge_address_pre_labels(&mut derived.symbols, addr_map);
            let fixed = update_and_merge_user_labels(&mut derived.symbols, user_labels, addr_map);
            if fixed != 0 {
                info!(fixed, "Corrected stale user label values");
            }
        }

        if full {
            let _span = crate::span_trace!("code_analysis").entered();
            let mut anattribs = vec![Anattrib::default(); data.len()];
            let input = CodeAnalysisInput {
                data,
                addr_map,
                analyzer_tags,
                status_overrides,
                entry_flags: props.entry_flags,
                params: &props.analysis,
                symbols: &derived.symbols,
                cpu: props.cpu,
                two_byte_brk: props.two_byte_brk,
            };
            code_analyzer.analyze(&input, &mut anattribs);
            derived.code_snapshot = Some(anattribs.clone());
            derived.anattribs = anattribs;
        } else if let Some(snapshot) = &derived.code_snapshot {
            let _span = crate::span_trace!("restore_snapshot").entered();
            derived.anattribs.clone_from(snapshot);
        }

        {
            let _span = crate::span_trace!("apply_user_data").entered();
            apply_user_labels(&mut derived.anattribs, user_labels);
            apply_format_descriptors(
                &mut derived.anattribs,
                operand_formats,
                addr_map,
                &mut derived.messages,
            );
        }

        {
            let _span = crate::span_trace!("data_analysis").entered();
            let input = DataAnalysisInput {
                data,
                addr_map,
                params: &props.analysis,
            };
            if let Err(err) =
                data_analyzer.analyze_data_targets(&input, &mut derived.anattribs, &mut derived.symbols)
            {
                error!(error = %err, "Data target analysis failed");
            }
            data_analyzer.analyze_uncategorized(&input, &mut derived.anattribs);
        }

        {
            let _span = crate::span_trace!("remove_hidden_labels").entered();
            remove_hidden_labels(
                &derived.anattribs,
                user_labels,
                &mut derived.symbols,
                &mut derived.messages,
            );
        }

        {
            let _span = crate::span_trace!("variable_refs").entered();
            generate_variable_refs(
                &mut derived.anattribs,
                data,
                lv_tables,
                &mut derived.symbols,
                &mut derived.messages,
            );
        }

        {
            let _span = crate::span_trace!("platform_refs").entered();
            generate_platform_symbol_refs(
                &mut derived.anattribs,
                data,
                addr_map,
                &derived.symbols,
                misc_flags,
                props.analysis.seek_nearby_targets,
            );
        }

        {
            let _span = crate::span_trace!("xrefs").entered();
            let result = generate_xrefs(
                &derived.anattribs,
                data,
                addr_map,
                lv_tables,
                &derived.symbols,
                &mut derived.messages,
            );
            derived.xrefs = result.xrefs;
            derived.def_xrefs = result.def_xrefs;
            derived.byte_counts = result.byte_counts;
        }

        if props.auto_label_style != AutoLabelStyle::Simple {
            let _span = crate::span_trace!("annotate_auto_labels").entered();
            annotate_auto_labels(
                &mut derived.anattribs,
                &mut derived.symbols,
                operand_formats,
                &derived.xrefs,
                props.auto_label_style,
            );
        }

        derived.active_defs = active_def_symbols(&derived.symbols, &derived.def_xrefs);

        if cfg!(debug_assertions) {
            let _span = crate::span_trace!("validate").entered();
            let problems = validate(&derived.anattribs, operand_formats);
            for problem in &problems {
                error!(problem = %problem, "Analysis validation failed");
            }
            debug_assert!(problems.is_empty(), "analysis validation failed: {problems:?}");
        }
        validate_address_map(addr_map, &mut derived.messages);
        derived.messages.sort();

        info!(
            code = derived.byte_counts.code,
            data = derived.byte_counts.data,
            junk = derived.byte_counts.junk,
            symbols = derived.symbols.len(),
            messages = derived.messages.len(),
            "Analysis complete"
        );
    }
}

/// Project and platform symbols that something references, ordered by
/// value then label.
pub fn active_def_symbols(
    table: &SymbolTable,
    def_xrefs: &BTreeMap<String, XrefSet>,
) -> Vec<DefSymbol> {
    let mut list: Vec<DefSymbol> = table
        .iter()
        .filter_map(|entry| entry.as_def())
        .filter(|def| matches!(def.symbol.source, SymbolSource::Project | SymbolSource::Platform))
        .filter(|def| def_xrefs.get(def.label()).is_some_and(|x| !x.is_empty()))
        .cloned()
        .collect();
    list.sort_by(|a, b| a.value().cmp(&b.value()).then_with(|| a.label().cmp(b.label())));
    list
}
