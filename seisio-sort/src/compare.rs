use std::cmp::Ordering;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use enum_iterator::{Sequence, all};
use itertools::Itertools;
use seisio_error::{SeisError, SeisResult, seis_bail, seis_err};
use seisio_meta::{EntryKind, MetaKey, Param, Rule};

/// A total order over records of [`Param`] batches.
///
/// `compare` may be handed records from two different batches that share a rule. Ties are
/// allowed; the sort engine breaks them on the global position of each record.
pub trait TraceCompare {
    /// Compares record `i` of `lhs` with record `j` of `rhs`.
    fn compare(&self, lhs: &Param, i: usize, rhs: &Param, j: usize) -> SeisResult<Ordering>;

    /// Checks that `rule` holds every key the comparator reads.
    fn validate(&self, _rule: &Rule) -> SeisResult<()> {
        Ok(())
    }

    /// A name identifying the order. Every rank of a distributed sort must agree on it.
    fn name(&self) -> &str {
        "custom"
    }
}

impl<F> TraceCompare for F
where
    F: Fn(&Param, usize, &Param, usize) -> SeisResult<Ordering>,
{
    fn compare(&self, lhs: &Param, i: usize, rhs: &Param, j: usize) -> SeisResult<Ordering> {
        self(lhs, i, rhs, j)
    }
}

/// A named closure comparator with an optional set of required keys.
pub struct FnCompare<F> {
    name: String,
    required: Vec<(MetaKey, EntryKind)>,
    f: F,
}

impl<F> FnCompare<F>
where
    F: Fn(&Param, usize, &Param, usize) -> SeisResult<Ordering>,
{
    /// Wraps `f` under `name`.
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self {
            name: name.into(),
            required: vec![],
            f,
        }
    }

    /// Requires `key` to be present in the rule with storage `kind`.
    pub fn requires(mut self, key: MetaKey, kind: EntryKind) -> Self {
        self.required.push((key, kind));
        self
    }
}

impl<F> TraceCompare for FnCompare<F>
where
    F: Fn(&Param, usize, &Param, usize) -> SeisResult<Ordering>,
{
    fn compare(&self, lhs: &Param, i: usize, rhs: &Param, j: usize) -> SeisResult<Ordering> {
        (self.f)(lhs, i, rhs, j)
    }

    fn validate(&self, rule: &Rule) -> SeisResult<()> {
        self.required
            .iter()
            .try_for_each(|&(key, kind)| require(rule, key, kind))
    }

    fn name(&self) -> &str {
        &self.name
    }
}

fn require(rule: &Rule, key: MetaKey, kind: EntryKind) -> SeisResult<()> {
    let entry = rule.entry(key)?;
    if entry.kind() != kind {
        seis_bail!(MismatchedTypes: kind, entry.kind());
    }
    Ok(())
}

/// Where the source to receiver offset of a record comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OffsetSource {
    /// The squared euclidean distance between the source and receiver coordinates.
    Computed,
    /// The [`MetaKey::Offset`] header field.
    Stored,
}

/// One level of a [`ChainCompare`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChainKey {
    /// A float key, compared with [`f64::total_cmp`].
    Float(MetaKey),
    /// A long key.
    Long(MetaKey),
    /// The source to receiver offset.
    Offset(OffsetSource),
}

impl ChainKey {
    fn compare(self, lhs: &Param, i: usize, rhs: &Param, j: usize) -> SeisResult<Ordering> {
        Ok(match self {
            Self::Float(key) => lhs.get::<f64>(i, key)?.total_cmp(&rhs.get::<f64>(j, key)?),
            Self::Long(key) => lhs.get::<i64>(i, key)?.cmp(&rhs.get::<i64>(j, key)?),
            Self::Offset(OffsetSource::Computed) => {
                squared_offset(lhs, i)?.total_cmp(&squared_offset(rhs, j)?)
            }
            Self::Offset(OffsetSource::Stored) => {
                Self::Long(MetaKey::Offset).compare(lhs, i, rhs, j)?
            }
        })
    }

    fn validate(self, rule: &Rule) -> SeisResult<()> {
        match self {
            Self::Float(key) => require(rule, key, EntryKind::Float),
            Self::Long(key) => require(rule, key, EntryKind::Long),
            Self::Offset(OffsetSource::Computed) => [
                MetaKey::SourceX,
                MetaKey::SourceY,
                MetaKey::ReceiverX,
                MetaKey::ReceiverY,
            ]
            .into_iter()
            .try_for_each(|key| require(rule, key, EntryKind::Float)),
            Self::Offset(OffsetSource::Stored) => require(rule, MetaKey::Offset, EntryKind::Long),
        }
    }
}

impl Display for ChainKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Float(key) | Self::Long(key) => write!(f, "{key}"),
            Self::Offset(OffsetSource::Computed) => write!(f, "computed_offset"),
            Self::Offset(OffsetSource::Stored) => write!(f, "{}", MetaKey::Offset),
        }
    }
}

/// Squared distance between the source and receiver of record `i`.
pub fn squared_offset(param: &Param, i: usize) -> SeisResult<f64> {
    let dx = param.get::<f64>(i, MetaKey::SourceX)? - param.get::<f64>(i, MetaKey::ReceiverX)?;
    let dy = param.get::<f64>(i, MetaKey::SourceY)? - param.get::<f64>(i, MetaKey::ReceiverY)?;
    Ok(dx * dx + dy * dy)
}

/// A lexicographic order over a chain of keys, ending in [`MetaKey::LocalTraceNum`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainCompare {
    name: String,
    keys: Vec<ChainKey>,
}

impl ChainCompare {
    /// Orders records by `keys` in turn, then by their local trace number.
    pub fn new(name: impl Into<String>, keys: Vec<ChainKey>) -> Self {
        Self {
            name: name.into(),
            keys,
        }
    }

    /// The keys compared before the trace number tie-break.
    pub fn keys(&self) -> &[ChainKey] {
        &self.keys
    }
}

impl TraceCompare for ChainCompare {
    fn compare(&self, lhs: &Param, i: usize, rhs: &Param, j: usize) -> SeisResult<Ordering> {
        for key in &self.keys {
            let ord = key.compare(lhs, i, rhs, j)?;
            if ord.is_ne() {
                return Ok(ord);
            }
        }
        Ok(lhs
            .get::<u64>(i, MetaKey::LocalTraceNum)?
            .cmp(&rhs.get::<u64>(j, MetaKey::LocalTraceNum)?))
    }

    fn validate(&self, rule: &Rule) -> SeisResult<()> {
        for key in &self.keys {
            key.validate(rule)?;
        }
        require(rule, MetaKey::LocalTraceNum, EntryKind::Index)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl Display for ChainCompare {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}({}, {})",
            self.name,
            self.keys.iter().join(", "),
            MetaKey::LocalTraceNum
        )
    }
}

/// The standard trace orders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Sequence)]
pub enum SortType {
    /// Source x, source y, receiver x, receiver y.
    SrcRcv,
    /// Source x, source y, computed offset.
    SrcOff,
    /// Source x, source y, stored offset.
    SrcROff,
    /// Receiver x, receiver y, computed offset.
    RcvOff,
    /// Receiver x, receiver y, stored offset.
    RcvROff,
    /// Inline, crossline, computed offset.
    LineOff,
    /// Inline, crossline, stored offset.
    LineROff,
    /// Computed offset, inline, crossline.
    OffLine,
    /// Stored offset, inline, crossline.
    ROffLine,
}

impl SortType {
    /// The keys this order compares, most significant first.
    pub fn keys(self) -> Vec<ChainKey> {
        use ChainKey::{Float, Long, Offset};
        use MetaKey::{CrosslineIdx, InlineIdx, ReceiverX, ReceiverY, SourceX, SourceY};
        use OffsetSource::{Computed, Stored};

        match self {
            Self::SrcRcv => vec![
                Float(SourceX),
                Float(SourceY),
                Float(ReceiverX),
                Float(ReceiverY),
            ],
            Self::SrcOff => vec![Float(SourceX), Float(SourceY), Offset(Computed)],
            Self::SrcROff => vec![Float(SourceX), Float(SourceY), Offset(Stored)],
            Self::RcvOff => vec![Float(ReceiverX), Float(ReceiverY), Offset(Computed)],
            Self::RcvROff => vec![Float(ReceiverX), Float(ReceiverY), Offset(Stored)],
            Self::LineOff => vec![Long(InlineIdx), Long(CrosslineIdx), Offset(Computed)],
            Self::LineROff => vec![Long(InlineIdx), Long(CrosslineIdx), Offset(Stored)],
            Self::OffLine => vec![Offset(Computed), Long(InlineIdx), Long(CrosslineIdx)],
            Self::ROffLine => vec![Offset(Stored), Long(InlineIdx), Long(CrosslineIdx)],
        }
    }

    /// The comparator implementing this order.
    pub fn comparator(self) -> ChainCompare {
        ChainCompare::new(self.to_string(), self.keys())
    }

    /// The order's name.
    pub fn name(self) -> &'static str {
        match self {
            Self::SrcRcv => "SrcRcv",
            Self::SrcOff => "SrcOff",
            Self::SrcROff => "SrcROff",
            Self::RcvOff => "RcvOff",
            Self::RcvROff => "RcvROff",
            Self::LineOff => "LineOff",
            Self::LineROff => "LineROff",
            Self::OffLine => "OffLine",
            Self::ROffLine => "ROffLine",
        }
    }
}

impl Display for SortType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SortType {
    type Err = SeisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        all::<SortType>()
            .find(|t| t.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| seis_err!(InvalidArgument: "unknown sort type {s}"))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use rstest::rstest;

    use super::*;

    fn batch(rows: &[(f64, f64, f64, f64, i64)]) -> Param {
        let rule = Arc::new(Rule::new(false, true, false));
        let mut param = Param::new(rule, rows.len());
        for (i, &(sx, sy, rx, ry, offset)) in rows.iter().enumerate() {
            param.set(i, MetaKey::SourceX, sx).unwrap();
            param.set(i, MetaKey::SourceY, sy).unwrap();
            param.set(i, MetaKey::ReceiverX, rx).unwrap();
            param.set(i, MetaKey::ReceiverY, ry).unwrap();
            param.set(i, MetaKey::Offset, offset).unwrap();
            param.set(i, MetaKey::LocalTraceNum, i as u64).unwrap();
        }
        param
    }

    #[test]
    fn names_round_trip() {
        for sort in all::<SortType>() {
            assert_eq!(sort.to_string().parse::<SortType>().unwrap(), sort);
            assert_eq!(sort.comparator().name(), sort.name());
        }
        assert_eq!("lineroff".parse::<SortType>().unwrap(), SortType::LineROff);
        assert!(matches!(
            "Shot".parse::<SortType>(),
            Err(SeisError::InvalidArgument(..))
        ));
    }

    #[rstest]
    #[case(SortType::SrcRcv, Ordering::Less)]
    #[case(SortType::SrcOff, Ordering::Less)]
    #[case(SortType::SrcROff, Ordering::Greater)]
    #[case(SortType::OffLine, Ordering::Less)]
    #[case(SortType::ROffLine, Ordering::Greater)]
    fn stored_and_computed_offsets_differ(#[case] sort: SortType, #[case] expected: Ordering) {
        // same source; record 0 is nearer its receiver but carries the larger stored offset
        let param = batch(&[(0.0, 0.0, 1.0, 0.0, 50), (0.0, 0.0, 3.0, 4.0, 10)]);
        let cmp = sort.comparator();
        assert_eq!(cmp.compare(&param, 0, &param, 1).unwrap(), expected);
        assert_eq!(cmp.compare(&param, 1, &param, 0).unwrap(), expected.reverse());
    }

    #[test]
    fn ties_fall_back_to_trace_number() {
        let param = batch(&[(1.0, 1.0, 2.0, 2.0, 5), (1.0, 1.0, 2.0, 2.0, 5)]);
        let cmp = SortType::SrcRcv.comparator();
        assert_eq!(cmp.compare(&param, 1, &param, 0).unwrap(), Ordering::Greater);
        assert_eq!(cmp.compare(&param, 0, &param, 0).unwrap(), Ordering::Equal);
    }

    #[test]
    fn negative_zero_orders_before_zero() {
        let param = batch(&[(0.0, 0.0, 0.0, 0.0, 0), (-0.0, 0.0, 0.0, 0.0, 0)]);
        let cmp = SortType::SrcRcv.comparator();
        assert_eq!(cmp.compare(&param, 1, &param, 0).unwrap(), Ordering::Less);
    }

    #[rstest]
    #[case(SortType::SrcRcv)]
    #[case(SortType::LineROff)]
    #[case(SortType::OffLine)]
    fn validate_against_rules(#[case] sort: SortType) {
        let cmp = sort.comparator();
        cmp.validate(&Rule::new(false, true, false)).unwrap();
        assert!(matches!(
            cmp.validate(&Rule::from_keys(&[MetaKey::LocalTraceNum])),
            Err(SeisError::KeyNotFound(..))
        ));

        let mut rule = Rule::new(false, true, false);
        rule.remove(MetaKey::LocalTraceNum);
        assert!(cmp.validate(&rule).is_err());
    }

    #[test]
    fn validate_checks_kind() {
        let mut rule = Rule::new(false, true, false);
        rule.add_short(MetaKey::Offset, 36).unwrap();
        assert!(matches!(
            SortType::SrcROff.comparator().validate(&rule),
            Err(SeisError::MismatchedTypes(..))
        ));
        SortType::SrcOff.comparator().validate(&rule).unwrap();
    }

    #[test]
    fn closures_compare() {
        let param = batch(&[(2.0, 0.0, 0.0, 0.0, 0), (1.0, 0.0, 0.0, 0.0, 0)]);
        let by_source = |a: &Param, i: usize, b: &Param, j: usize| -> SeisResult<Ordering> {
            Ok(a.get::<f64>(i, MetaKey::SourceX)?
                .total_cmp(&b.get::<f64>(j, MetaKey::SourceX)?))
        };
        let cmp: &dyn TraceCompare = &by_source;
        assert_eq!(cmp.name(), "custom");
        assert_eq!(cmp.compare(&param, 0, &param, 1).unwrap(), Ordering::Greater);

        let named = FnCompare::new("by_source", by_source)
            .requires(MetaKey::SourceX, EntryKind::Float);
        assert_eq!(named.name(), "by_source");
        named.validate(&Rule::new(false, true, false)).unwrap();
        assert!(named.validate(&Rule::from_keys(&[MetaKey::InlineIdx])).is_err());
    }

    #[test]
    fn display_lists_keys() {
        assert_eq!(
            SortType::LineOff.comparator().to_string(),
            "LineOff(inline, crossline, computed_offset, local_trace_num)"
        );
    }
}
