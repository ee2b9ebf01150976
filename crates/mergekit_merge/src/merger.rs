//! Sheet merger: read source workbooks and concatenate the target sheets.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use mergekit_io_xlsx::{SpecWorkbook, XlsxReadError, read_workbook};
use rayon::ThreadPoolBuilder;
use rayon::prelude::*;

use crate::report::ReportMergeBuilder;
use crate::spec::{
    EnumMergeWarning, MergeError, SpecMergeOptions, SpecMergedResult, SpecMergedSheet,
};

/// Effective number of reader threads.
///
/// `None` reads serially; `Some(n)` is clamped to `1..=available CPUs`.
pub fn calculate_worker_limit(num_workers_max: Option<usize>) -> usize {
    let n_cpu = std::thread::available_parallelism()
        .map(|v| v.get())
        .unwrap_or(1);

    match num_workers_max {
        Some(n) => n.clamp(1, n_cpu),
        None => 1,
    }
}

/// Reject target sets the merger cannot honor.
///
/// The retroactive-months sheet need not be a target; when it is absent the
/// column is simply not derived.
pub fn validate_merge_options(options: &SpecMergeOptions) -> Result<(), MergeError> {
    if options.sheet_names.is_empty() {
        return Err(MergeError::InvalidOption(
            "At least one target sheet name is required.".to_string(),
        ));
    }

    let mut set_seen = HashSet::new();
    for c_sheet_name in &options.sheet_names {
        if c_sheet_name.trim().is_empty() {
            return Err(MergeError::InvalidOption(
                "Target sheet names must not be blank.".to_string(),
            ));
        }
        if !set_seen.insert(c_sheet_name.as_str()) {
            return Err(MergeError::InvalidOption(format!(
                "Duplicate target sheet name: {c_sheet_name:?}"
            )));
        }
    }

    Ok(())
}

/// Read every source workbook, preserving input order.
///
/// With more than one worker the files are read on a rayon pool; results are
/// still returned in input order and the first failing file (in input order)
/// decides the error.
pub fn read_workbooks(
    l_paths: &[PathBuf],
    num_workers_max: Option<usize>,
) -> Result<Vec<(PathBuf, SpecWorkbook)>, MergeError> {
    let n_workers = calculate_worker_limit(num_workers_max).min(l_paths.len().max(1));
    let read_one = |path: &PathBuf| read_workbook(path).map(|workbook| (path.clone(), workbook));

    let l_results: Vec<Result<(PathBuf, SpecWorkbook), XlsxReadError>> = if n_workers <= 1 {
        l_paths.iter().map(read_one).collect()
    } else {
        match ThreadPoolBuilder::new().num_threads(n_workers).build() {
            Ok(thread_pool) => {
                thread_pool.install(|| l_paths.par_iter().map(read_one).collect())
            }
            Err(err) => {
                tracing::warn!(
                    workers = n_workers,
                    error = %err,
                    "Failed to initialize thread pool; fallback to serial read."
                );
                l_paths.iter().map(read_one).collect()
            }
        }
    };

    let mut l_sources = Vec::with_capacity(l_results.len());
    for res in l_results {
        l_sources.push(res?);
    }
    Ok(l_sources)
}

/// Concatenate the target sheets of already-read workbooks.
///
/// Each target sheet is the row-wise concatenation of that sheet across the
/// sources, in source order. Column set is the union in first-appearance order;
/// cells a source lacks are blank. A target no source contains stays empty.
pub fn merge_workbooks(
    l_sources: &[(PathBuf, SpecWorkbook)],
    l_sheet_names: &[String],
    builder: &mut ReportMergeBuilder,
) -> SpecMergedResult {
    let mut result = SpecMergedResult {
        sheets: l_sheet_names
            .iter()
            .map(|c_sheet_name| SpecMergedSheet {
                sheet_name: c_sheet_name.clone(),
                ..Default::default()
            })
            .collect(),
    };
    let set_targets: HashSet<&str> = l_sheet_names.iter().map(String::as_str).collect();

    for (path, workbook) in l_sources {
        merge_one_source(path, workbook, &mut result, builder);

        for c_sheet_name in workbook.sheet_names() {
            if !set_targets.contains(c_sheet_name) {
                builder.add_warning(EnumMergeWarning::IgnoredSheet {
                    path: path.clone(),
                    sheet_name: c_sheet_name.to_string(),
                });
            }
        }
    }
    builder.add_files(l_sources.len() as u64);

    for sheet in &result.sheets {
        if sheet.has_data() {
            builder.add_sheet();
            builder.add_rows(sheet.table.height() as u64);
        } else {
            builder.add_warning(EnumMergeWarning::NoSheetData {
                sheet_name: sheet.sheet_name.clone(),
            });
        }
    }

    result
}

fn merge_one_source(
    path: &Path,
    workbook: &SpecWorkbook,
    result: &mut SpecMergedResult,
    builder: &mut ReportMergeBuilder,
) {
    for sheet in &mut result.sheets {
        let Some(table) = workbook.get(&sheet.sheet_name) else {
            builder.add_warning(EnumMergeWarning::MissingSheet {
                path: path.to_path_buf(),
                sheet_name: sheet.sheet_name.clone(),
            });
            continue;
        };

        tracing::debug!(
            path = %path.display(),
            sheet = %sheet.sheet_name,
            rows = table.height(),
            "merge sheet"
        );
        sheet.table.append(table);
        sheet.sources.push(path.to_path_buf());
    }
}

/// Read `l_paths` and merge their target sheets.
///
/// Any unreadable file fails the whole call; no partial result is returned.
pub fn merge_files(
    l_paths: &[PathBuf],
    options: &SpecMergeOptions,
    builder: &mut ReportMergeBuilder,
) -> Result<SpecMergedResult, MergeError> {
    validate_merge_options(options)?;
    let l_sources = read_workbooks(l_paths, options.num_workers_max)?;
    Ok(merge_workbooks(&l_sources, &options.sheet_names, builder))
}
