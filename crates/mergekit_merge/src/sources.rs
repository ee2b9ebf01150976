//! Source collection: expand user inputs into an ordered list of workbook files.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use globset::{GlobBuilder, GlobMatcher};
use mergekit_io_xlsx::XlsxReadError;

use crate::report::ReportMergeBuilder;
use crate::spec::{EnumMergeWarning, MergeError};

/// Compile file-name patterns (case-insensitive).
pub fn compile_source_patterns(patterns: &[String]) -> Result<Vec<GlobMatcher>, MergeError> {
    if patterns.is_empty() {
        return Err(MergeError::InvalidPattern(
            "At least one source pattern is required.".to_string(),
        ));
    }

    let mut l_glob = Vec::with_capacity(patterns.len());
    for pattern in patterns {
        let matcher = GlobBuilder::new(pattern)
            .case_insensitive(true)
            .literal_separator(true)
            .build()
            .map_err(|e| MergeError::InvalidPattern(format!("{pattern:?}: {e}")))?
            .compile_matcher();
        l_glob.push(matcher);
    }
    Ok(l_glob)
}

fn is_source_file(path: &Path, l_glob: &[GlobMatcher]) -> bool {
    let Some(c_file_name) = path.file_name().and_then(|name| name.to_str()) else {
        return false;
    };
    l_glob.iter().any(|matcher| matcher.is_match(c_file_name))
}

/// Expand `l_inputs` into the ordered source list.
///
/// - A file is kept if its name matches a pattern, else `UnsupportedSource`.
/// - A directory contributes its matching direct children, sorted by name.
/// - A repeated file (same canonical path) is kept once, with `DuplicateSource`.
/// - A path that does not exist fails the call.
pub fn collect_source_files(
    l_inputs: &[PathBuf],
    patterns: &[String],
    builder: &mut ReportMergeBuilder,
) -> Result<Vec<PathBuf>, MergeError> {
    let l_glob = compile_source_patterns(patterns)?;
    let mut l_paths_out = Vec::new();
    let mut set_seen: HashSet<PathBuf> = HashSet::new();

    let mut push_unique = |path: PathBuf, builder: &mut ReportMergeBuilder| {
        let path_key = fs::canonicalize(&path).unwrap_or_else(|_| path.clone());
        if set_seen.insert(path_key) {
            l_paths_out.push(path);
        } else {
            builder.add_warning(EnumMergeWarning::DuplicateSource { path });
        }
    };

    for path_input in l_inputs {
        if path_input.is_dir() {
            let l_children = list_directory_sources(path_input, &l_glob)?;
            tracing::debug!(
                dir = %path_input.display(),
                files = l_children.len(),
                "expanded source directory"
            );
            for path_child in l_children {
                push_unique(path_child, builder);
            }
        } else if path_input.is_file() {
            if is_source_file(path_input, &l_glob) {
                push_unique(path_input.clone(), builder);
            } else {
                builder.add_warning(EnumMergeWarning::UnsupportedSource {
                    path: path_input.clone(),
                });
            }
        } else {
            return Err(XlsxReadError::Open {
                path: path_input.clone(),
                message: "No such file or directory".to_string(),
            }
            .into());
        }
    }

    Ok(l_paths_out)
}

fn list_directory_sources(
    path_dir: &Path,
    l_glob: &[GlobMatcher],
) -> Result<Vec<PathBuf>, MergeError> {
    let derive_dir_error = |err: std::io::Error| XlsxReadError::Open {
        path: path_dir.to_path_buf(),
        message: err.to_string(),
    };

    let mut l_children = Vec::new();
    for entry in fs::read_dir(path_dir).map_err(derive_dir_error)? {
        let path_child = entry.map_err(derive_dir_error)?.path();
        if path_child.is_file() && is_source_file(&path_child, l_glob) {
            l_children.push(path_child);
        }
    }
    l_children.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(l_children)
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;
    use crate::conf::TUP_PATTERNS_SOURCE;

    fn derive_patterns() -> Vec<String> {
        TUP_PATTERNS_SOURCE.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_collect_source_files_expands_directory_sorted() {
        let tmp = tempdir().expect("tempdir");
        for c_name in ["b.xlsx", "a.XLS", "notes.txt", "c.xlsx"] {
            fs::write(tmp.path().join(c_name), b"").expect("write");
        }
        fs::create_dir(tmp.path().join("nested.xlsx")).expect("mkdir");

        let mut builder = ReportMergeBuilder::default();
        let l_paths =
            collect_source_files(&[tmp.path().to_path_buf()], &derive_patterns(), &mut builder)
                .expect("collect");

        let l_names: Vec<String> = l_paths
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(l_names, ["a.XLS", "b.xlsx", "c.xlsx"]);
        assert!(builder.warnings.is_empty());
    }

    #[test]
    fn test_collect_source_files_warns_on_duplicate_and_unsupported() {
        let tmp = tempdir().expect("tempdir");
        let path_a = tmp.path().join("a.xlsx");
        let path_txt = tmp.path().join("a.csv");
        fs::write(&path_a, b"").expect("write");
        fs::write(&path_txt, b"").expect("write");

        let mut builder = ReportMergeBuilder::default();
        let l_paths = collect_source_files(
            &[path_a.clone(), path_txt.clone(), path_a.clone()],
            &derive_patterns(),
            &mut builder,
        )
        .expect("collect");

        assert_eq!(l_paths, [path_a.clone()]);
        assert_eq!(
            builder.warnings,
            [
                EnumMergeWarning::UnsupportedSource { path: path_txt },
                EnumMergeWarning::DuplicateSource { path: path_a },
            ]
        );
    }

    #[test]
    fn test_collect_source_files_missing_path_is_read_error() {
        let tmp = tempdir().expect("tempdir");
        let mut builder = ReportMergeBuilder::default();
        let res = collect_source_files(
            &[tmp.path().join("absent.xlsx")],
            &derive_patterns(),
            &mut builder,
        );
        assert!(matches!(res, Err(MergeError::Read(XlsxReadError::Open { .. }))));
    }

    #[test]
    fn test_compile_source_patterns_rejects_invalid_glob() {
        let res = compile_source_patterns(&["*.{xlsx".to_string()]);
        assert!(matches!(res, Err(MergeError::InvalidPattern(_))));

        let res = compile_source_patterns(&[]);
        assert!(matches!(res, Err(MergeError::InvalidPattern(_))));
    }
}
