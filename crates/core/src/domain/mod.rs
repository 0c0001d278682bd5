pub mod alert;
pub mod city;
pub mod finance;
pub mod ivv;
pub mod weather;

/// Rounds half away from zero to `decimals` places.
pub(crate) fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}
