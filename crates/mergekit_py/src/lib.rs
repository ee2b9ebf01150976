use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{Local, NaiveDate};
use mergekit_io_xlsx::derive_ipc_bytes_from_table;
use mergekit_merge::{
    MergeError, ReportMerge, SpecMergeOptions, SpecMergedResult, SpecMergedSheet,
    derive_default_output_name, merge_sources, run_merge, write_merged_result,
};
use pyo3::exceptions::{PyKeyError, PyOSError, PyRuntimeError, PyValueError};
use pyo3::prelude::*;
use pyo3::types::PyBytes;

const N_BRIDGE_ABI_VERSION: u64 = 1;
const C_BRIDGE_CONTRACT_VERSION: &str = "mergekit.merge.v1";
const C_BRIDGE_TRANSPORT: &str = "rust_native";

#[pyclass(name = "ReportMerge")]
#[derive(Debug, Clone)]
struct PyReportMerge {
    #[pyo3(get)]
    cnt_files: u64,
    #[pyo3(get)]
    cnt_sheets: u64,
    #[pyo3(get)]
    cnt_rows: u64,
    #[pyo3(get)]
    cnt_rows_retro: u64,
    #[pyo3(get)]
    path_out: Option<String>,
    #[pyo3(get)]
    warnings: Vec<String>,
    #[pyo3(get)]
    warning_kinds: Vec<String>,
    inner: ReportMerge,
}

impl From<ReportMerge> for PyReportMerge {
    fn from(report_merge: ReportMerge) -> Self {
        Self {
            cnt_files: report_merge.cnt_files,
            cnt_sheets: report_merge.cnt_sheets,
            cnt_rows: report_merge.cnt_rows,
            cnt_rows_retro: report_merge.cnt_rows_retro,
            path_out: report_merge
                .path_out
                .as_ref()
                .map(|path| path.to_string_lossy().to_string()),
            warnings: report_merge.warnings.iter().map(ToString::to_string).collect(),
            warning_kinds: report_merge
                .warnings
                .iter()
                .map(|warning| warning.kind().to_string())
                .collect(),
            inner: report_merge,
        }
    }
}

#[pymethods]
impl PyReportMerge {
    #[getter]
    fn warning_count(&self) -> usize {
        self.inner.warning_count()
    }

    fn to_dict(&self) -> BTreeMap<String, u64> {
        self.inner.to_dict()
    }

    #[pyo3(signature = (prefix = "[MERGE]"))]
    fn format(&self, prefix: &str) -> String {
        self.inner.format(prefix)
    }

    fn __str__(&self) -> String {
        self.inner.to_string()
    }
}

/// Merged workbook held on the Rust side; tables cross over as Arrow IPC.
#[pyclass(name = "MergedResult")]
#[derive(Debug, Clone)]
struct PyMergedResult {
    inner: SpecMergedResult,
    #[pyo3(get)]
    report: PyReportMerge,
}

impl PyMergedResult {
    fn derive_sheet(&self, sheet_name: &str) -> PyResult<&SpecMergedSheet> {
        self.inner
            .get(sheet_name)
            .ok_or_else(|| PyKeyError::new_err(format!("No merged sheet: {sheet_name:?}")))
    }
}

#[pymethods]
impl PyMergedResult {
    #[getter]
    fn sheet_names(&self) -> Vec<String> {
        self.inner
            .sheet_names()
            .into_iter()
            .map(ToString::to_string)
            .collect()
    }

    fn has_data(&self, sheet_name: &str) -> PyResult<bool> {
        Ok(self.derive_sheet(sheet_name)?.has_data())
    }

    fn columns(&self, sheet_name: &str) -> PyResult<Vec<String>> {
        Ok(self.derive_sheet(sheet_name)?.table.columns().to_vec())
    }

    fn height(&self, sheet_name: &str) -> PyResult<usize> {
        Ok(self.derive_sheet(sheet_name)?.table.height())
    }

    fn sources(&self, sheet_name: &str) -> PyResult<Vec<String>> {
        Ok(self
            .derive_sheet(sheet_name)?
            .sources
            .iter()
            .map(|path| path.to_string_lossy().to_string())
            .collect())
    }

    /// Arrow IPC bytes of one sheet (`polars.read_ipc(io.BytesIO(...))`).
    fn to_ipc_bytes<'py>(&self, py: Python<'py>, sheet_name: &str) -> PyResult<Bound<'py, PyBytes>> {
        let table = &self.derive_sheet(sheet_name)?.table;
        let v_bytes = derive_ipc_bytes_from_table(table)
            .map_err(|err| PyRuntimeError::new_err(format!("Failed to encode sheet: {err}")))?;
        Ok(PyBytes::new(py, &v_bytes))
    }

    #[pyo3(signature = (path_out, cols_text = None))]
    fn write(&self, py: Python<'_>, path_out: String, cols_text: Option<Vec<String>>) -> PyResult<()> {
        let mut write_options = SpecMergeOptions::default().write_options;
        if let Some(cols_text) = cols_text {
            write_options.cols_text = cols_text;
        }
        let path_out = PathBuf::from(path_out);
        py.allow_threads(|| write_merged_result(&self.inner, &path_out, &write_options))
            .map_err(map_merge_error)?;
        Ok(())
    }
}

fn parse_today(today: Option<&str>) -> PyResult<NaiveDate> {
    match today {
        None => Ok(Local::now().date_naive()),
        Some(value) => NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|err| {
            PyValueError::new_err(format!(
                "Invalid date: `{value}`. Expected `YYYY-MM-DD` ({err})"
            ))
        }),
    }
}

fn derive_merge_options(
    sheet_names: Option<Vec<String>>,
    cols_text: Option<Vec<String>>,
    if_retro: bool,
    num_workers_max: Option<usize>,
) -> SpecMergeOptions {
    let mut options = SpecMergeOptions {
        num_workers_max,
        ..SpecMergeOptions::default()
    };
    if let Some(sheet_names) = sheet_names {
        options.sheet_names = sheet_names;
    }
    if let Some(cols_text) = cols_text {
        options.write_options.cols_text = cols_text;
    }
    if !if_retro {
        options.policy_retro = None;
    }
    options
}

fn map_merge_error(exception: MergeError) -> PyErr {
    match exception {
        MergeError::Read(err) => PyOSError::new_err(err.to_string()),
        MergeError::Write(err) => PyOSError::new_err(err.to_string()),
        MergeError::InvalidPattern(message) | MergeError::InvalidOption(message) => {
            PyValueError::new_err(message)
        }
    }
}

#[pyfunction(name = "merge_files")]
#[pyo3(signature = (
    paths,
    sheet_names = None,
    today = None,
    if_retro = true,
    num_workers_max = None
))]
fn merge_files_py(
    py: Python<'_>,
    paths: Vec<String>,
    sheet_names: Option<Vec<String>>,
    today: Option<&str>,
    if_retro: bool,
    num_workers_max: Option<usize>,
) -> PyResult<PyMergedResult> {
    let today = parse_today(today)?;
    let options = derive_merge_options(sheet_names, None, if_retro, num_workers_max);
    let l_inputs: Vec<PathBuf> = paths.into_iter().map(PathBuf::from).collect();

    let (result, report) = py
        .allow_threads(|| merge_sources(&l_inputs, &options, today))
        .map_err(map_merge_error)?;
    Ok(PyMergedResult {
        inner: result,
        report: PyReportMerge::from(report),
    })
}

#[pyfunction(name = "run_merge")]
#[pyo3(signature = (
    paths,
    path_out,
    sheet_names = None,
    cols_text = None,
    today = None,
    if_retro = true,
    num_workers_max = None
))]
#[allow(clippy::too_many_arguments)]
fn run_merge_py(
    py: Python<'_>,
    paths: Vec<String>,
    path_out: String,
    sheet_names: Option<Vec<String>>,
    cols_text: Option<Vec<String>>,
    today: Option<&str>,
    if_retro: bool,
    num_workers_max: Option<usize>,
) -> PyResult<PyReportMerge> {
    let today = parse_today(today)?;
    let options = derive_merge_options(sheet_names, cols_text, if_retro, num_workers_max);
    let l_inputs: Vec<PathBuf> = paths.into_iter().map(PathBuf::from).collect();
    let path_out = PathBuf::from(path_out);

    let report_merge = py
        .allow_threads(|| run_merge(&l_inputs, &path_out, &options, today))
        .map_err(map_merge_error)?;
    Ok(PyReportMerge::from(report_merge))
}

#[pyfunction(name = "derive_default_output_name")]
#[pyo3(signature = (today = None))]
fn derive_default_output_name_py(today: Option<&str>) -> PyResult<String> {
    Ok(derive_default_output_name(parse_today(today)?))
}

#[pymodule]
fn _mergekit_rs(module: &Bound<'_, PyModule>) -> PyResult<()> {
    module.add_class::<PyReportMerge>()?;
    module.add_class::<PyMergedResult>()?;
    module.add_function(wrap_pyfunction!(merge_files_py, module)?)?;
    module.add_function(wrap_pyfunction!(run_merge_py, module)?)?;
    module.add_function(wrap_pyfunction!(derive_default_output_name_py, module)?)?;
    module.add("__bridge_abi__", N_BRIDGE_ABI_VERSION)?;
    module.add("__bridge_contract__", C_BRIDGE_CONTRACT_VERSION)?;
    module.add("__bridge_transport__", C_BRIDGE_TRANSPORT)?;
    Ok(())
}

