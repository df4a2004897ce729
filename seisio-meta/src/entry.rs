use std::fmt::{Display, Formatter};
use std::ops::Range;

use enum_iterator::Sequence;
use seisio_error::{SeisResult, seis_bail};

use crate::segy::TRACE_HEADER_SIZE;

const LONG_WIDTH: usize = 4;
const SHORT_WIDTH: usize = 2;

/// The storage kind of a [`RuleEntry`], selecting which column family of a [`crate::Param`]
/// holds its values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Sequence)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum EntryKind {
    /// 4-byte signed integer on disk, `i64` in memory
    Long,
    /// 2-byte signed integer on disk, `i16` in memory
    Short,
    /// 4-byte mantissa with a shared 2-byte scale on disk, `f64` in memory
    Float,
    /// Memory only, `u64`
    Index,
    /// The whole header, kept verbatim
    Copy,
}

impl EntryKind {
    /// Bytes of [`crate::Param`] storage one column of this kind costs per record.
    pub fn value_size(&self) -> usize {
        match self {
            Self::Long => size_of::<i64>(),
            Self::Short => size_of::<i16>(),
            Self::Float => size_of::<f64>(),
            Self::Index => size_of::<u64>(),
            Self::Copy => TRACE_HEADER_SIZE,
        }
    }
}

impl Display for EntryKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Long => write!(f, "long"),
            Self::Short => write!(f, "short"),
            Self::Float => write!(f, "float"),
            Self::Index => write!(f, "index"),
            Self::Copy => write!(f, "copy"),
        }
    }
}

/// Where a value lives in the trace header, without a column assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FieldLocation {
    /// A 4-byte integer at the given offset
    Long(usize),
    /// A 2-byte integer at the given offset
    Short(usize),
    /// A 4-byte mantissa and the 2-byte scale field it shares
    Float {
        /// Offset of the mantissa
        loc: usize,
        /// Offset of the scale field
        scale_loc: usize,
    },
    /// No header storage
    Index,
    /// The whole header
    Copy,
}

impl FieldLocation {
    /// The storage kind this location produces.
    pub fn kind(&self) -> EntryKind {
        match self {
            Self::Long(_) => EntryKind::Long,
            Self::Short(_) => EntryKind::Short,
            Self::Float { .. } => EntryKind::Float,
            Self::Index => EntryKind::Index,
            Self::Copy => EntryKind::Copy,
        }
    }

    /// Checks that every byte range of the location is inside the trace header and that a
    /// float's mantissa and scale do not overlap.
    pub fn validate(&self) -> SeisResult<()> {
        match *self {
            Self::Long(loc) => check_range(loc, LONG_WIDTH),
            Self::Short(loc) => check_range(loc, SHORT_WIDTH),
            Self::Float { loc, scale_loc } => {
                check_range(loc, LONG_WIDTH)?;
                check_range(scale_loc, SHORT_WIDTH)?;
                if loc < scale_loc + SHORT_WIDTH && scale_loc < loc + LONG_WIDTH {
                    seis_bail!(
                        InvalidRule: "float mantissa at {loc} overlaps its scale field at {scale_loc}"
                    );
                }
                Ok(())
            }
            Self::Index | Self::Copy => Ok(()),
        }
    }

    /// Assigns the location to a column, validating it first.
    pub fn into_entry(self, slot: usize) -> SeisResult<RuleEntry> {
        self.validate()?;
        Ok(self.at_slot(slot))
    }

    pub(crate) fn at_slot(self, slot: usize) -> RuleEntry {
        match self {
            Self::Long(loc) => RuleEntry::Long { slot, loc },
            Self::Short(loc) => RuleEntry::Short { slot, loc },
            Self::Float { loc, scale_loc } => RuleEntry::Float {
                slot,
                loc,
                scale_loc,
            },
            Self::Index => RuleEntry::Index { slot },
            Self::Copy => RuleEntry::Copy,
        }
    }
}

fn check_range(loc: usize, width: usize) -> SeisResult<()> {
    if loc.checked_add(width).is_none_or(|end| end > TRACE_HEADER_SIZE) {
        seis_bail!(
            InvalidRule: "field at {loc} of width {width} extends beyond the {TRACE_HEADER_SIZE} byte header"
        );
    }
    Ok(())
}

/// How one [`crate::MetaKey`] is stored, both in the trace header and in a [`crate::Param`].
///
/// `slot` is the column index among the entries of the same kind in the owning rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RuleEntry {
    /// A 4-byte big-endian signed integer at `[loc, loc + 4)`
    Long {
        /// Column index among long entries
        slot: usize,
        /// Byte offset in the header
        loc: usize,
    },
    /// A 2-byte big-endian signed integer at `[loc, loc + 2)`
    Short {
        /// Column index among short entries
        slot: usize,
        /// Byte offset in the header
        loc: usize,
    },
    /// A 4-byte big-endian mantissa at `loc` scaled by the 2-byte exponent at `scale_loc`
    Float {
        /// Column index among float entries
        slot: usize,
        /// Byte offset of the mantissa
        loc: usize,
        /// Byte offset of the shared scale field
        scale_loc: usize,
    },
    /// A value that exists only in memory
    Index {
        /// Column index among index entries
        slot: usize,
    },
    /// The whole header, kept verbatim
    Copy,
}

impl RuleEntry {
    /// The storage kind of the entry.
    pub fn kind(&self) -> EntryKind {
        match self {
            Self::Long { .. } => EntryKind::Long,
            Self::Short { .. } => EntryKind::Short,
            Self::Float { .. } => EntryKind::Float,
            Self::Index { .. } => EntryKind::Index,
            Self::Copy => EntryKind::Copy,
        }
    }

    /// The column of the entry within its kind. A copy entry always occupies column zero.
    pub fn slot(&self) -> usize {
        match *self {
            Self::Long { slot, .. }
            | Self::Short { slot, .. }
            | Self::Float { slot, .. }
            | Self::Index { slot } => slot,
            Self::Copy => 0,
        }
    }

    /// The header location the entry was built from.
    pub fn location(&self) -> FieldLocation {
        match *self {
            Self::Long { loc, .. } => FieldLocation::Long(loc),
            Self::Short { loc, .. } => FieldLocation::Short(loc),
            Self::Float { loc, scale_loc, .. } => FieldLocation::Float { loc, scale_loc },
            Self::Index { .. } => FieldLocation::Index,
            Self::Copy => FieldLocation::Copy,
        }
    }

    /// The smallest header byte the entry touches, or `None` for index entries.
    pub fn min(&self) -> Option<usize> {
        self.byte_range().map(|r| r.start)
    }

    /// One past the largest header byte the entry touches, or `None` for index entries.
    pub fn max(&self) -> Option<usize> {
        self.byte_range().map(|r| r.end)
    }

    /// The span of header bytes the entry touches.
    ///
    /// A float entry spans both its mantissa and its scale field, including any gap between them.
    pub fn byte_range(&self) -> Option<Range<usize>> {
        match *self {
            Self::Long { loc, .. } => Some(loc..loc + LONG_WIDTH),
            Self::Short { loc, .. } => Some(loc..loc + SHORT_WIDTH),
            Self::Float { loc, scale_loc, .. } => {
                Some(loc.min(scale_loc)..(loc + LONG_WIDTH).max(scale_loc + SHORT_WIDTH))
            }
            Self::Index { .. } => None,
            Self::Copy => Some(0..TRACE_HEADER_SIZE),
        }
    }

    /// Re-checks the header ranges of an entry built outside [`FieldLocation::into_entry`].
    pub fn validate(&self) -> SeisResult<()> {
        self.location().validate()
    }
}

impl Display for RuleEntry {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Long { slot, loc } => write!(f, "long[{slot}]@{loc}"),
            Self::Short { slot, loc } => write!(f, "short[{slot}]@{loc}"),
            Self::Float {
                slot,
                loc,
                scale_loc,
            } => write!(f, "float[{slot}]@{loc}x{scale_loc}"),
            Self::Index { slot } => write!(f, "index[{slot}]"),
            Self::Copy => write!(f, "copy"),
        }
    }
}
