#[pyo3::pymodule]
mod ddm_py {
    use ::ddm::{ddm as lib_ddm, DdmConfig};
    use pyo3::exceptions::PyValueError;
    use pyo3::prelude::*;
    use serde_pyobject::{from_pyobject, to_pyobject};

    /// Compares two Newick trees described by a config dict and returns the
    /// difference matrix as `{"labels": [...], "data": [...]}`.
    #[pyfunction]
    fn ddm<'py>(py: Python<'py>, py_config: Bound<'py, PyAny>) -> PyResult<Bound<'py, PyAny>> {
        let config: DdmConfig =
            from_pyobject(py_config).map_err(|e| PyValueError::new_err(e.to_string()))?;
        let diff = lib_ddm(config).map_err(|e| PyValueError::new_err(e.to_string()))?;
        to_pyobject(py, &diff).map_err(|e| PyValueError::new_err(e.to_string()))
    }
}
