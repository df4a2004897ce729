//! The SEG-Y trace header layout and the default placement of each [`MetaKey`] within it.

use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::{FieldLocation, MetaKey};

/// The size in bytes of a SEG-Y trace header.
pub const TRACE_HEADER_SIZE: usize = 240;

/// The size in bytes of the SEG-Y file header (textual plus binary, no extended textual headers).
pub const FILE_HEADER_SIZE: usize = 3600;

/// Well-known fields of the SEG-Y trace header, valued by their zero-based byte offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[repr(u16)]
#[allow(missing_docs)]
pub enum TraceHeaderField {
    LineSequence = 0,
    FileSequence = 4,
    FieldRecord = 8,
    FieldTrace = 12,
    EnergySource = 16,
    EnsembleTrace = 24,
    TraceId = 28,
    VerticalStack = 30,
    HorizontalStack = 32,
    Offset = 36,
    ReceiverElevation = 40,
    SourceSurfaceElevation = 44,
    SourceDepth = 48,
    ReceiverDatum = 52,
    SourceDatum = 56,
    SourceWaterDepth = 60,
    ReceiverWaterDepth = 64,
    ElevationScale = 68,
    CoordinateScale = 70,
    SourceX = 72,
    SourceY = 76,
    ReceiverX = 80,
    ReceiverY = 84,
    SourceUphole = 94,
    ReceiverUphole = 96,
    SampleCount = 114,
    SampleInterval = 116,
    CmpX = 180,
    CmpY = 184,
    Inline = 188,
    Crossline = 192,
    ShotNumber = 196,
    ShotScale = 200,
    ValueUnit = 202,
    TransductionConstant = 204,
    TransductionExponent = 208,
    TransductionUnit = 210,
    TimeScale = 214,
    SourceMeasure = 224,
    SourceMeasureExponent = 228,
}

impl TraceHeaderField {
    /// The zero-based byte offset of the field.
    pub fn offset(self) -> usize {
        usize::from(u16::from(self))
    }

    /// The width of the field in bytes.
    pub fn width(self) -> usize {
        match self {
            Self::TraceId
            | Self::VerticalStack
            | Self::HorizontalStack
            | Self::ElevationScale
            | Self::CoordinateScale
            | Self::SourceUphole
            | Self::ReceiverUphole
            | Self::SampleCount
            | Self::SampleInterval
            | Self::ShotScale
            | Self::ValueUnit
            | Self::TransductionExponent
            | Self::TransductionUnit
            | Self::TimeScale
            | Self::SourceMeasureExponent => 2,
            _ => 4,
        }
    }
}

/// Keys installed by [`crate::Rule::new`] when default rules are requested.
pub const DEFAULT_KEYS: &[MetaKey] = &[
    MetaKey::SourceX,
    MetaKey::SourceY,
    MetaKey::ReceiverX,
    MetaKey::ReceiverY,
    MetaKey::CmpX,
    MetaKey::CmpY,
    MetaKey::InlineIdx,
    MetaKey::CrosslineIdx,
    MetaKey::Offset,
    MetaKey::GlobalTraceNum,
    MetaKey::LocalTraceNum,
];

/// Keys added on top of [`DEFAULT_KEYS`] to form the maximal rule set.
pub const EXTRA_KEYS: &[MetaKey] = &[
    MetaKey::ReceiverElevation,
    MetaKey::SourceSurfaceElevation,
    MetaKey::SourceDepth,
    MetaKey::ReceiverDatum,
    MetaKey::SourceDatum,
    MetaKey::SourceWaterDepth,
    MetaKey::ReceiverWaterDepth,
    MetaKey::LineTraceNum,
    MetaKey::FieldRecord,
    MetaKey::FieldTraceNum,
    MetaKey::ShotNum,
    MetaKey::TraceId,
    MetaKey::VerticalStack,
    MetaKey::HorizontalStack,
    MetaKey::SourceUphole,
    MetaKey::ReceiverUphole,
    MetaKey::SampleCount,
    MetaKey::SampleInterval,
    MetaKey::CopyAll,
];

impl MetaKey {
    /// Where the key lives in a SEG-Y trace header by default.
    pub fn default_location(&self) -> FieldLocation {
        use TraceHeaderField as F;

        let coord = |field: F| FieldLocation::Float {
            loc: field.offset(),
            scale_loc: F::CoordinateScale.offset(),
        };
        let elev = |field: F| FieldLocation::Float {
            loc: field.offset(),
            scale_loc: F::ElevationScale.offset(),
        };
        let long = |field: F| FieldLocation::Long(field.offset());
        let short = |field: F| FieldLocation::Short(field.offset());

        match self {
            Self::SourceX => coord(F::SourceX),
            Self::SourceY => coord(F::SourceY),
            Self::ReceiverX => coord(F::ReceiverX),
            Self::ReceiverY => coord(F::ReceiverY),
            Self::CmpX => coord(F::CmpX),
            Self::CmpY => coord(F::CmpY),
            Self::ReceiverElevation => elev(F::ReceiverElevation),
            Self::SourceSurfaceElevation => elev(F::SourceSurfaceElevation),
            Self::SourceDepth => elev(F::SourceDepth),
            Self::ReceiverDatum => elev(F::ReceiverDatum),
            Self::SourceDatum => elev(F::SourceDatum),
            Self::SourceWaterDepth => elev(F::SourceWaterDepth),
            Self::ReceiverWaterDepth => elev(F::ReceiverWaterDepth),
            Self::InlineIdx => long(F::Inline),
            Self::CrosslineIdx => long(F::Crossline),
            Self::LocalTraceNum => FieldLocation::Index,
            Self::GlobalTraceNum => long(F::FileSequence),
            Self::LineTraceNum => long(F::LineSequence),
            Self::FieldRecord => long(F::FieldRecord),
            Self::FieldTraceNum => long(F::FieldTrace),
            Self::ShotNum => long(F::ShotNumber),
            Self::Offset => long(F::Offset),
            Self::TraceId => short(F::TraceId),
            Self::VerticalStack => short(F::VerticalStack),
            Self::HorizontalStack => short(F::HorizontalStack),
            Self::SourceUphole => short(F::SourceUphole),
            Self::ReceiverUphole => short(F::ReceiverUphole),
            Self::SampleCount => short(F::SampleCount),
            Self::SampleInterval => short(F::SampleInterval),
            Self::CopyAll => FieldLocation::Copy,
        }
    }
}

#[cfg(test)]
mod tests {
    use enum_iterator::all;
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(TraceHeaderField::SourceX, 72, 4)]
    #[case(TraceHeaderField::CoordinateScale, 70, 2)]
    #[case(TraceHeaderField::Inline, 188, 4)]
    #[case(TraceHeaderField::SampleCount, 114, 2)]
    fn field_layout(#[case] field: TraceHeaderField, #[case] offset: usize, #[case] width: usize) {
        assert_eq!(field.offset(), offset);
        assert_eq!(field.width(), width);
    }

    #[test]
    fn fields_fit_in_header() {
        for offset in 0..TRACE_HEADER_SIZE {
            let Ok(field) = TraceHeaderField::try_from(u16::try_from(offset).unwrap()) else {
                continue;
            };
            assert!(field.offset() + field.width() <= TRACE_HEADER_SIZE);
        }
    }

    #[test]
    fn default_locations_are_valid() {
        for key in all::<MetaKey>() {
            key.default_location().validate().unwrap();
        }
    }

    #[test]
    fn key_sets_are_disjoint() {
        assert!(DEFAULT_KEYS.iter().all(|k| !EXTRA_KEYS.contains(k)));
    }
}
