//! Thin helpers over the native netcdf library.

use std::sync::Once;

/// Silence HDF5's automatic error printing to stderr.
///
/// The HDF5 C library prints verbose error messages to stderr even when errors
/// are handled gracefully by the Rust code (e.g., when checking for optional
/// attributes that don't exist). This creates confusing log spam like:
///
/// ```text
/// HDF5-DIAG: Error detected in HDF5 (1.10.8) thread 3:
///   #003: ../../../src/H5Adense.c line 397 in H5A__dense_open(): can't locate attribute in name index
/// ```
///
/// Call it before the first file is opened; later calls are no-ops.
pub fn silence_hdf5_errors() {
    static INIT: Once = Once::new();

    INIT.call_once(|| {
        // SAFETY: H5Eset_auto2 is thread-safe and we're passing null pointers
        // to disable error output, which is a documented valid use.
        unsafe {
            hdf5_metno_sys::h5e::H5Eset_auto2(
                hdf5_metno_sys::h5e::H5E_DEFAULT,
                None,
                std::ptr::null_mut(),
            );
        }
    });
}

/// Check if a variable has an attribute with the given name.
/// This avoids HDF5 error spam when checking for optional attributes.
fn has_attr(var: &netcdf::Variable, name: &str) -> bool {
    var.attributes().any(|attr| attr.name() == name)
}

/// Numeric attribute as f64, whatever its stored width.
pub(crate) fn get_f64_attr(var: &netcdf::Variable, name: &str) -> Option<f64> {
    if !has_attr(var, name) {
        return None;
    }
    let attr_value = var.attribute_value(name)?.ok()?;
    use netcdf::AttributeValue as A;
    match attr_value {
        A::Double(v) => Some(v),
        A::Float(v) => Some(v as f64),
        A::Schar(v) => Some(v as f64),
        A::Uchar(v) => Some(v as f64),
        A::Short(v) => Some(v as f64),
        A::Ushort(v) => Some(v as f64),
        A::Int(v) => Some(v as f64),
        A::Uint(v) => Some(v as f64),
        A::Longlong(v) => Some(v as f64),
        A::Ulonglong(v) => Some(v as f64),
        _ => None,
    }
}

/// Sentinel for missing entries: `_FillValue`, else `missing_value`.
pub(crate) fn fill_value(var: &netcdf::Variable) -> Option<f64> {
    get_f64_attr(var, "_FillValue").or_else(|| get_f64_attr(var, "missing_value"))
}

/// CF packing parameters, if the variable is packed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Packing {
    pub scale_factor: f64,
    pub add_offset: f64,
}

impl Packing {
    pub(crate) fn of(var: &netcdf::Variable) -> Option<Self> {
        let scale_factor = get_f64_attr(var, "scale_factor");
        let add_offset = get_f64_attr(var, "add_offset");
        if scale_factor.is_none() && add_offset.is_none() {
            return None;
        }
        Some(Self {
            scale_factor: scale_factor.unwrap_or(1.0),
            add_offset: add_offset.unwrap_or(0.0),
        })
    }

    /// Unpack every entry except those equal to `fill`.
    pub(crate) fn apply(&self, values: &mut [f64], fill: Option<f64>) {
        for v in values.iter_mut() {
            if fill.is_some_and(|f| *v == f) {
                continue;
            }
            *v = *v * self.scale_factor + self.add_offset;
        }
    }
}

/// Replace entries equal to `fill` with NaN.
pub(crate) fn mask_fill(values: &mut [f64], fill: Option<f64>) {
    let Some(fill) = fill else {
        return;
    };
    for v in values.iter_mut().filter(|v| **v == fill) {
        *v = f64::NAN;
    }
}
