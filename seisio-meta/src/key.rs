use std::fmt::{Display, Formatter};
use std::str::FromStr;

use enum_iterator::{Sequence, all};
use seisio_error::{SeisError, SeisResult, seis_err};

/// A semantic trace metadata identifier.
///
/// A [`crate::Rule`] maps each key it holds onto exactly one [`crate::RuleEntry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Sequence)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[non_exhaustive]
pub enum MetaKey {
    /// The X coordinate of the source
    SourceX,
    /// The Y coordinate of the source
    SourceY,
    /// The X coordinate of the receiver group
    ReceiverX,
    /// The Y coordinate of the receiver group
    ReceiverY,
    /// The X coordinate of the common midpoint
    CmpX,
    /// The Y coordinate of the common midpoint
    CmpY,
    /// The elevation of the receiver group
    ReceiverElevation,
    /// The surface elevation at the source
    SourceSurfaceElevation,
    /// The depth of the source below the surface
    SourceDepth,
    /// The datum elevation of the receiver group
    ReceiverDatum,
    /// The datum elevation of the source
    SourceDatum,
    /// The water depth at the source
    SourceWaterDepth,
    /// The water depth at the receiver group
    ReceiverWaterDepth,
    /// The inline grid index
    InlineIdx,
    /// The crossline grid index
    CrosslineIdx,
    /// The logical ordinal of a trace within its batch, used as the final tie-break of every
    /// standard ordering
    LocalTraceNum,
    /// The trace sequence number within the file
    GlobalTraceNum,
    /// The trace sequence number within the line
    LineTraceNum,
    /// The original field record number
    FieldRecord,
    /// The trace number within the original field record
    FieldTraceNum,
    /// The source point nearest to the midpoint
    ShotNum,
    /// The stored distance between source and receiver
    Offset,
    /// The trace identification code
    TraceId,
    /// The number of vertically stacked traces
    VerticalStack,
    /// The number of horizontally stacked traces
    HorizontalStack,
    /// The uphole time at the source
    SourceUphole,
    /// The uphole time at the receiver group
    ReceiverUphole,
    /// The number of samples in the trace
    SampleCount,
    /// The sample interval of the trace
    SampleInterval,
    /// The whole trace header, preserved verbatim
    CopyAll,
}

impl MetaKey {
    /// The stable name of the key, as used by [`Display`] and [`FromStr`].
    pub fn name(&self) -> &'static str {
        match self {
            Self::SourceX => "source_x",
            Self::SourceY => "source_y",
            Self::ReceiverX => "receiver_x",
            Self::ReceiverY => "receiver_y",
            Self::CmpX => "cmp_x",
            Self::CmpY => "cmp_y",
            Self::ReceiverElevation => "receiver_elevation",
            Self::SourceSurfaceElevation => "source_surface_elevation",
            Self::SourceDepth => "source_depth",
            Self::ReceiverDatum => "receiver_datum",
            Self::SourceDatum => "source_datum",
            Self::SourceWaterDepth => "source_water_depth",
            Self::ReceiverWaterDepth => "receiver_water_depth",
            Self::InlineIdx => "inline",
            Self::CrosslineIdx => "crossline",
            Self::LocalTraceNum => "local_trace_num",
            Self::GlobalTraceNum => "global_trace_num",
            Self::LineTraceNum => "line_trace_num",
            Self::FieldRecord => "field_record",
            Self::FieldTraceNum => "field_trace_num",
            Self::ShotNum => "shot_num",
            Self::Offset => "offset",
            Self::TraceId => "trace_id",
            Self::VerticalStack => "vertical_stack",
            Self::HorizontalStack => "horizontal_stack",
            Self::SourceUphole => "source_uphole",
            Self::ReceiverUphole => "receiver_uphole",
            Self::SampleCount => "sample_count",
            Self::SampleInterval => "sample_interval",
            Self::CopyAll => "copy_all",
        }
    }

    /// Whether the key is one of the source, receiver or midpoint coordinates.
    pub fn is_coordinate(&self) -> bool {
        matches!(
            self,
            Self::SourceX
                | Self::SourceY
                | Self::ReceiverX
                | Self::ReceiverY
                | Self::CmpX
                | Self::CmpY
        )
    }

    /// Whether the key is an elevation or depth sharing the elevation scale field.
    pub fn is_elevation(&self) -> bool {
        matches!(
            self,
            Self::ReceiverElevation
                | Self::SourceSurfaceElevation
                | Self::SourceDepth
                | Self::ReceiverDatum
                | Self::SourceDatum
                | Self::SourceWaterDepth
                | Self::ReceiverWaterDepth
        )
    }
}

impl Display for MetaKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for MetaKey {
    type Err = SeisError;

    fn from_str(s: &str) -> SeisResult<Self> {
        all::<MetaKey>()
            .find(|key| key.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| seis_err!(KeyNotFound: "unknown metadata key {s}"))
    }
}
