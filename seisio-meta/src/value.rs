use std::fmt::{Display, Formatter};

use seisio_error::{SeisResult, seis_bail, seis_err};

use crate::EntryKind;

/// One metadata value, tagged by the storage kind it came from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldValue {
    /// A long value
    Long(i64),
    /// A short value
    Short(i16),
    /// A float value
    Float(f64),
    /// An index value
    Index(u64),
}

impl FieldValue {
    /// The storage kind of the value.
    pub fn kind(&self) -> EntryKind {
        match self {
            Self::Long(_) => EntryKind::Long,
            Self::Short(_) => EntryKind::Short,
            Self::Float(_) => EntryKind::Float,
            Self::Index(_) => EntryKind::Index,
        }
    }

    /// The value widened to a float.
    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64(&self) -> f64 {
        match *self {
            Self::Long(v) => v as f64,
            Self::Short(v) => f64::from(v),
            Self::Float(v) => v,
            Self::Index(v) => v as f64,
        }
    }

    /// Converts the value to the storage kind `kind`.
    ///
    /// Floats round to the nearest integer. Values outside the range of the target kind fail.
    #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
    pub fn cast(self, kind: EntryKind) -> SeisResult<Self> {
        if self.kind() == kind {
            return Ok(self);
        }
        let out_of_range = || seis_err!("{self} does not fit in a {kind} field");
        Ok(match kind {
            EntryKind::Long => Self::Long(match self {
                Self::Short(v) => i64::from(v),
                Self::Index(v) => i64::try_from(v).map_err(|_| out_of_range())?,
                Self::Float(v) => float_to_int(v, i64::MIN as f64, -(i64::MIN as f64))
                    .ok_or_else(out_of_range)? as i64,
                Self::Long(v) => v,
            }),
            EntryKind::Short => Self::Short(match self {
                Self::Long(v) => i16::try_from(v).map_err(|_| out_of_range())?,
                Self::Index(v) => i16::try_from(v).map_err(|_| out_of_range())?,
                Self::Float(v) => float_to_int(v, f64::from(i16::MIN), -f64::from(i16::MIN))
                    .ok_or_else(out_of_range)? as i16,
                Self::Short(v) => v,
            }),
            EntryKind::Float => Self::Float(self.as_f64()),
            EntryKind::Index => Self::Index(match self {
                Self::Long(v) => u64::try_from(v).map_err(|_| out_of_range())?,
                Self::Short(v) => u64::try_from(v).map_err(|_| out_of_range())?,
                Self::Float(v) => {
                    float_to_int(v, 0.0, 2.0 * -(i64::MIN as f64)).ok_or_else(out_of_range)? as u64
                }
                Self::Index(v) => v,
            }),
            EntryKind::Copy => seis_bail!(MismatchedTypes: kind, self.kind()),
        })
    }
}

/// `value` rounded to an integer in `[min, end)`. Both bounds are exact powers of two.
fn float_to_int(value: f64, min: f64, end: f64) -> Option<f64> {
    let rounded = value.round();
    (rounded >= min && rounded < end).then_some(rounded)
}

impl Display for FieldValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Long(v) => write!(f, "{v}i64"),
            Self::Short(v) => write!(f, "{v}i16"),
            Self::Float(v) => write!(f, "{v}f64"),
            Self::Index(v) => write!(f, "{v}u64"),
        }
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        Self::Long(value)
    }
}

impl From<i16> for FieldValue {
    fn from(value: i16) -> Self {
        Self::Short(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<u64> for FieldValue {
    fn from(value: u64) -> Self {
        Self::Index(value)
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use seisio_error::SeisError;

    use super::*;

    #[rstest]
    #[case(FieldValue::Long(7), EntryKind::Float, FieldValue::Float(7.0))]
    #[case(FieldValue::Float(2.6), EntryKind::Long, FieldValue::Long(3))]
    #[case(FieldValue::Float(-2.5), EntryKind::Short, FieldValue::Short(-3))]
    #[case(FieldValue::Short(-4), EntryKind::Long, FieldValue::Long(-4))]
    #[case(FieldValue::Index(9), EntryKind::Short, FieldValue::Short(9))]
    #[case(FieldValue::Long(12), EntryKind::Index, FieldValue::Index(12))]
    #[case(FieldValue::Float(-9_223_372_036_854_775_808.0), EntryKind::Long, FieldValue::Long(i64::MIN))]
    #[case(FieldValue::Float(32_767.4), EntryKind::Short, FieldValue::Short(i16::MAX))]
    fn casts(#[case] value: FieldValue, #[case] kind: EntryKind, #[case] expected: FieldValue) {
        assert_eq!(value.cast(kind).unwrap(), expected);
    }

    #[rstest]
    #[case(FieldValue::Long(40_000), EntryKind::Short)]
    #[case(FieldValue::Long(-1), EntryKind::Index)]
    #[case(FieldValue::Float(f64::NAN), EntryKind::Long)]
    #[case(FieldValue::Float(-0.7), EntryKind::Index)]
    #[case(FieldValue::Float(9_223_372_036_854_775_808.0), EntryKind::Long)]
    #[case(FieldValue::Float(18_446_744_073_709_551_616.0), EntryKind::Index)]
    #[case(FieldValue::Float(32_767.5), EntryKind::Short)]
    #[case(FieldValue::Float(f64::INFINITY), EntryKind::Long)]
    fn casts_out_of_range(#[case] value: FieldValue, #[case] kind: EntryKind) {
        assert!(matches!(
            value.cast(kind),
            Err(SeisError::InvalidArgument(..))
        ));
    }

    #[test]
    fn cast_to_copy() {
        assert!(matches!(
            FieldValue::Long(1).cast(EntryKind::Copy),
            Err(SeisError::MismatchedTypes(..))
        ));
    }
}
