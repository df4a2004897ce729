//! Decimal scale factors shared between float fields of a trace header.
//!
//! A scaled field stores an `i32` mantissa together with a signed decimal exponent held in a
//! 2-byte scale field, and several fields usually share one scale field. On write, every record
//! picks one exponent per scale field: the one closest to zero that represents each value sharing
//! the field exactly to six decimals, raised until the largest magnitude fits the mantissa.

use seisio_error::{SeisResult, seis_bail};

/// The smallest exponent the encoder produces.
pub const MIN_EXPONENT: i16 = -6;
/// The largest exponent the encoder produces.
pub const MAX_EXPONENT: i16 = 9;

const EXACT_TOLERANCE: f64 = 1e-6;

/// Applies the decimal exponent `scale` to `mantissa`.
pub fn decode_scaled(mantissa: i32, scale: i16) -> f64 {
    let mantissa = f64::from(mantissa);
    match scale {
        0 => mantissa,
        s if s > 0 => mantissa * 10f64.powi(i32::from(s)),
        s => mantissa / 10f64.powi(-i32::from(s)),
    }
}

/// The mantissa representing `value` under `scale`, rounded to the nearest integer.
#[allow(clippy::cast_possible_truncation)]
pub fn encode_scaled(value: f64, scale: i16) -> SeisResult<i32> {
    let mantissa = unscaled(value, scale).round();
    if !mantissa.is_finite() || mantissa < f64::from(i32::MIN) || mantissa > f64::from(i32::MAX) {
        seis_bail!("{value} does not fit a 4-byte mantissa with exponent {scale}");
    }
    Ok(mantissa as i32)
}

fn unscaled(value: f64, scale: i16) -> f64 {
    match scale {
        0 => value,
        s if s > 0 => value / 10f64.powi(i32::from(s)),
        s => value * 10f64.powi(-i32::from(s)),
    }
}

/// The exponent closest to zero, no greater than zero, that represents `value` exactly to six
/// decimals. Values needing more decimals get [`MIN_EXPONENT`] and are rounded on encode.
pub fn required_exponent(value: f64) -> SeisResult<i16> {
    if !value.is_finite() {
        seis_bail!("cannot scale non-finite value {value}");
    }
    Ok((MIN_EXPONENT..=0)
        .rev()
        .find(|&exp| {
            let m = unscaled(value, exp);
            (m - m.round()).abs() < EXACT_TOLERANCE
        })
        .unwrap_or(MIN_EXPONENT))
}

/// Picks the exponent shared by `values`.
///
/// Starts from the finest exponent any value requires and raises it until the largest
/// magnitude fits an `i32` mantissa. An empty set of values uses exponent zero.
pub fn choose_scale<I>(values: I) -> SeisResult<i16>
where
    I: IntoIterator<Item = f64>,
{
    let mut exponent = 0;
    let mut largest = 0f64;
    for value in values {
        exponent = exponent.min(required_exponent(value)?);
        largest = largest.max(value.abs());
    }
    while unscaled(largest, exponent).round() > f64::from(i32::MAX) {
        if exponent == MAX_EXPONENT {
            seis_bail!("{largest} is too large to scale into a 4-byte mantissa");
        }
        exponent += 1;
    }
    Ok(exponent)
}
