use std::marker::PhantomData;
use std::ops::Range;
use std::sync::Arc;

use seisio_error::{SeisResult, seis_bail};

use crate::segy::TRACE_HEADER_SIZE;
use crate::{EntryKind, FieldValue, MetaKey, Rule, RuleEntry};

/// A structure-of-arrays batch of decoded trace metadata governed by one [`Rule`].
///
/// Each storage kind keeps its values in one flat row-major array of `len × width(kind)`
/// entries, so the value of a key for record `i` lives at `i * width + slot`. When the rule
/// holds a copy entry the raw headers are kept back to back in `headers`.
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    rule: Arc<Rule>,
    len: usize,
    widths: Widths,
    longs: Vec<i64>,
    shorts: Vec<i16>,
    floats: Vec<f64>,
    indices: Vec<u64>,
    headers: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Widths {
    long: usize,
    short: usize,
    float: usize,
    index: usize,
    header: usize,
    fingerprint: u64,
}

impl Widths {
    fn of(rule: &Rule) -> Self {
        Self {
            long: rule.width(EntryKind::Long),
            short: rule.width(EntryKind::Short),
            float: rule.width(EntryKind::Float),
            index: rule.width(EntryKind::Index),
            header: if rule.has_copy() { TRACE_HEADER_SIZE } else { 0 },
            fingerprint: rule.fingerprint(),
        }
    }
}

impl Param {
    /// Allocates a zeroed batch of `len` records.
    pub fn new(rule: Arc<Rule>, len: usize) -> Self {
        let widths = Widths::of(&rule);
        Self {
            rule,
            len,
            widths,
            longs: vec![0; len * widths.long],
            shorts: vec![0; len * widths.short],
            floats: vec![0.0; len * widths.float],
            indices: vec![0; len * widths.index],
            headers: vec![0; len * widths.header],
        }
    }

    /// Assembles a batch from already laid out columns.
    pub fn try_from_columns(
        rule: Arc<Rule>,
        len: usize,
        longs: Vec<i64>,
        shorts: Vec<i16>,
        floats: Vec<f64>,
        indices: Vec<u64>,
        headers: Vec<u8>,
    ) -> SeisResult<Self> {
        let widths = Widths::of(&rule);
        for (name, actual, width) in [
            ("long", longs.len(), widths.long),
            ("short", shorts.len(), widths.short),
            ("float", floats.len(), widths.float),
            ("index", indices.len(), widths.index),
            ("header", headers.len(), widths.header),
        ] {
            if actual != len * width {
                seis_bail!(
                    "{name} column holds {actual} values but {len} records of width {width} need {}",
                    len * width
                );
            }
        }
        Ok(Self {
            rule,
            len,
            widths,
            longs,
            shorts,
            floats,
            indices,
            headers,
        })
    }

    /// The rule the batch was built with.
    pub fn rule(&self) -> &Arc<Rule> {
        &self.rule
    }

    /// The number of records.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the batch holds no records.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The raw long column family.
    pub fn longs(&self) -> &[i64] {
        &self.longs
    }

    /// The raw short column family.
    pub fn shorts(&self) -> &[i16] {
        &self.shorts
    }

    /// The raw float column family.
    pub fn floats(&self) -> &[f64] {
        &self.floats
    }

    /// The raw index column family.
    pub fn indices(&self) -> &[u64] {
        &self.indices
    }

    /// The raw headers, empty unless the rule holds a copy entry.
    pub fn headers(&self) -> &[u8] {
        &self.headers
    }

    /// Bytes held by the columns.
    pub fn nbytes(&self) -> usize {
        self.longs.len() * size_of::<i64>()
            + self.shorts.len() * size_of::<i16>()
            + self.floats.len() * size_of::<f64>()
            + self.indices.len() * size_of::<u64>()
            + self.headers.len()
    }

    fn check_index(&self, i: usize) -> SeisResult<()> {
        if i >= self.len {
            seis_bail!(OutOfBounds: i, 0, self.len);
        }
        Ok(())
    }

    /// Resolves `key` to a typed column handle, checking its kind once.
    pub fn resolve<T: ParamValue>(&self, key: MetaKey) -> SeisResult<Column<T>> {
        let entry = self.rule.entry(key)?;
        if entry.kind() != T::KIND {
            seis_bail!(MismatchedTypes: T::KIND, entry.kind());
        }
        Ok(Column {
            slot: entry.slot(),
            rule: self.widths.fingerprint,
            phantom: PhantomData,
        })
    }

    fn cell<T: ParamValue>(&self, i: usize, column: Column<T>) -> SeisResult<usize> {
        self.check_index(i)?;
        let width = T::width(self);
        if column.rule != self.widths.fingerprint || column.slot >= width {
            seis_bail!(
                InvalidArgument: "{} column {} was resolved under a different rule",
                T::KIND,
                column.slot
            );
        }
        Ok(i * width + column.slot)
    }

    /// The value in `column` of record `i`.
    ///
    /// The column must come from [`Param::resolve`] on a batch with the same rule.
    #[inline]
    pub fn at<T: ParamValue>(&self, i: usize, column: Column<T>) -> SeisResult<T> {
        let idx = self.cell(i, column)?;
        Ok(T::values(self)[idx])
    }

    /// Overwrites the value in `column` of record `i`.
    #[inline]
    pub fn put<T: ParamValue>(&mut self, i: usize, column: Column<T>, value: T) -> SeisResult<()> {
        let idx = self.cell(i, column)?;
        T::values_mut(self)[idx] = value;
        Ok(())
    }

    /// The value of `key` for record `i`.
    pub fn get<T: ParamValue>(&self, i: usize, key: MetaKey) -> SeisResult<T> {
        self.at(i, self.resolve(key)?)
    }

    /// Sets the value of `key` for record `i`.
    pub fn set<T: ParamValue>(&mut self, i: usize, key: MetaKey, value: T) -> SeisResult<()> {
        let column = self.resolve(key)?;
        self.put(i, column, value)
    }

    /// The value of `key` for record `i`, whatever its kind.
    pub fn value(&self, i: usize, key: MetaKey) -> SeisResult<FieldValue> {
        let entry = self.rule.entry(key)?;
        self.value_of(i, entry)
    }

    /// Sets the value of `key` for record `i`, converting it to the kind of the key.
    pub fn set_value(&mut self, i: usize, key: MetaKey, value: FieldValue) -> SeisResult<()> {
        let entry = self.rule.entry(key)?;
        self.set_value_of(i, entry, value)
    }

    fn value_of(&self, i: usize, entry: RuleEntry) -> SeisResult<FieldValue> {
        self.check_index(i)?;
        let slot = entry.slot();
        Ok(match entry.kind() {
            EntryKind::Long => FieldValue::Long(self.longs[i * self.widths.long + slot]),
            EntryKind::Short => FieldValue::Short(self.shorts[i * self.widths.short + slot]),
            EntryKind::Float => FieldValue::Float(self.floats[i * self.widths.float + slot]),
            EntryKind::Index => FieldValue::Index(self.indices[i * self.widths.index + slot]),
            EntryKind::Copy => seis_bail!("the copy entry holds no scalar value"),
        })
    }

    fn set_value_of(&mut self, i: usize, entry: RuleEntry, value: FieldValue) -> SeisResult<()> {
        self.check_index(i)?;
        let slot = entry.slot();
        match value.cast(entry.kind())? {
            FieldValue::Long(v) => self.longs[i * self.widths.long + slot] = v,
            FieldValue::Short(v) => self.shorts[i * self.widths.short + slot] = v,
            FieldValue::Float(v) => self.floats[i * self.widths.float + slot] = v,
            FieldValue::Index(v) => self.indices[i * self.widths.index + slot] = v,
        }
        Ok(())
    }

    /// The raw header of record `i`.
    pub fn header(&self, i: usize) -> SeisResult<&[u8]> {
        self.check_index(i)?;
        if !self.rule.has_copy() {
            seis_bail!(KeyNotFound: "{} is not in the rule", MetaKey::CopyAll);
        }
        Ok(&self.headers[i * TRACE_HEADER_SIZE..(i + 1) * TRACE_HEADER_SIZE])
    }

    /// The mutable raw header of record `i`.
    pub fn header_mut(&mut self, i: usize) -> SeisResult<&mut [u8]> {
        self.check_index(i)?;
        if !self.rule.has_copy() {
            seis_bail!(KeyNotFound: "{} is not in the rule", MetaKey::CopyAll);
        }
        Ok(&mut self.headers[i * TRACE_HEADER_SIZE..(i + 1) * TRACE_HEADER_SIZE])
    }

    /// A new batch holding the records at `indices`, in that order.
    pub fn take(&self, indices: &[usize]) -> SeisResult<Self> {
        let mut out = Self::new(self.rule.clone(), indices.len());
        for (dst, &src) in indices.iter().enumerate() {
            self.check_index(src)?;
            out.copy_row(dst, self, src);
        }
        Ok(out)
    }

    /// A new batch holding the records in `range`.
    pub fn slice(&self, range: Range<usize>) -> SeisResult<Self> {
        if range.start > range.end || range.end > self.len {
            seis_bail!(OutOfBounds: range.end, 0, self.len);
        }
        let w = self.widths;
        Ok(Self {
            rule: self.rule.clone(),
            len: range.len(),
            widths: w,
            longs: self.longs[range.start * w.long..range.end * w.long].to_vec(),
            shorts: self.shorts[range.start * w.short..range.end * w.short].to_vec(),
            floats: self.floats[range.start * w.float..range.end * w.float].to_vec(),
            indices: self.indices[range.start * w.index..range.end * w.index].to_vec(),
            headers: self.headers[range.start * w.header..range.end * w.header].to_vec(),
        })
    }

    /// Concatenates batches that share `rule`.
    pub fn concat(rule: Arc<Rule>, parts: &[Param]) -> SeisResult<Self> {
        let mut out = Self::new(rule, 0);
        for part in parts {
            if part.rule != out.rule {
                seis_bail!("cannot concatenate batches built with different rules");
            }
            out.len += part.len;
            out.longs.extend_from_slice(&part.longs);
            out.shorts.extend_from_slice(&part.shorts);
            out.floats.extend_from_slice(&part.floats);
            out.indices.extend_from_slice(&part.indices);
            out.headers.extend_from_slice(&part.headers);
        }
        Ok(out)
    }

    // Both batches must share a layout and both indices must be in range.
    fn copy_row(&mut self, dst: usize, src: &Param, src_idx: usize) {
        fn copy<T: Copy>(to: &mut [T], from: &[T], width: usize, dst: usize, src: usize) {
            to[dst * width..(dst + 1) * width].copy_from_slice(&from[src * width..(src + 1) * width]);
        }
        let w = self.widths;
        copy(&mut self.longs, &src.longs, w.long, dst, src_idx);
        copy(&mut self.shorts, &src.shorts, w.short, dst, src_idx);
        copy(&mut self.floats, &src.floats, w.float, dst, src_idx);
        copy(&mut self.indices, &src.indices, w.index, dst, src_idx);
        copy(&mut self.headers, &src.headers, w.header, dst, src_idx);
    }
}

/// Copies every field of record `src_idx` of `src` into the matching keys of record `dst_idx`
/// of `dst`.
///
/// Keys missing from the destination rule are skipped. Values are converted to the destination
/// kind, and the raw header is copied when both rules hold a copy entry.
pub fn copy_record(src_idx: usize, src: &Param, dst_idx: usize, dst: &mut Param) -> SeisResult<()> {
    src.check_index(src_idx)?;
    dst.check_index(dst_idx)?;
    if src.rule == dst.rule {
        dst.copy_row(dst_idx, src, src_idx);
        return Ok(());
    }
    let dst_rule = dst.rule.clone();
    for (key, entry) in src.rule.iter() {
        let Some(target) = dst_rule.get(key) else {
            continue;
        };
        if entry.kind() == EntryKind::Copy {
            if target.kind() == EntryKind::Copy {
                dst.header_mut(dst_idx)?.copy_from_slice(src.header(src_idx)?);
            }
            continue;
        }
        dst.set_value_of(dst_idx, target, src.value_of(src_idx, entry)?)?;
    }
    Ok(())
}

/// A resolved column of one key, skipping the rule lookup on every access.
#[derive(Debug)]
pub struct Column<T> {
    slot: usize,
    rule: u64,
    phantom: PhantomData<T>,
}

impl<T> Clone for Column<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Column<T> {}

impl<T> Column<T> {
    /// The column index within its kind.
    pub fn slot(&self) -> usize {
        self.slot
    }
}

mod private {
    pub trait Sealed {}

    impl Sealed for i64 {}
    impl Sealed for i16 {}
    impl Sealed for f64 {}
    impl Sealed for u64 {}
}

/// The in-memory value types of the four scalar storage kinds.
pub trait ParamValue: Copy + private::Sealed + 'static {
    /// The storage kind whose values have this type.
    const KIND: EntryKind;

    #[doc(hidden)]
    fn values(param: &Param) -> &[Self];

    #[doc(hidden)]
    fn values_mut(param: &mut Param) -> &mut [Self];

    #[doc(hidden)]
    fn width(param: &Param) -> usize;
}

macro_rules! param_value {
    ($T:ty, $kind:ident, $field:ident, $width:ident) => {
        impl ParamValue for $T {
            const KIND: EntryKind = EntryKind::$kind;

            #[inline]
            fn values(param: &Param) -> &[Self] {
                &param.$field
            }

            #[inline]
            fn values_mut(param: &mut Param) -> &mut [Self] {
                &mut param.$field
            }

            #[inline]
            fn width(param: &Param) -> usize {
                param.widths.$width
            }
        }
    };
}

param_value!(i64, Long, longs, long);
param_value!(i16, Short, shorts, short);
param_value!(f64, Float, floats, float);
param_value!(u64, Index, indices, index);

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use seisio_error::SeisError;

    use super::*;
    use crate::segy::DEFAULT_KEYS;

    fn default_param(len: usize) -> Param {
        Param::new(Arc::new(Rule::new(false, true, false)), len)
    }

    #[test]
    fn layout() {
        let param = default_param(3);
        assert_eq!(param.len(), 3);
        assert_eq!(param.floats().len(), 18);
        assert_eq!(param.longs().len(), 12);
        assert_eq!(param.indices().len(), 3);
        assert!(param.shorts().is_empty());
        assert!(param.headers().is_empty());
        assert_eq!(param.nbytes(), 3 * param.rule().param_memory_footprint());
    }

    #[test]
    fn get_set_round_trip() {
        let mut rule = Rule::new(false, true, false);
        rule.add_short(MetaKey::SampleCount, 114).unwrap();
        let mut param = Param::new(Arc::new(rule), 4);

        param.set(2, MetaKey::SourceX, 1234.5f64).unwrap();
        param.set(2, MetaKey::InlineIdx, -17i64).unwrap();
        param.set(2, MetaKey::SampleCount, 1001i16).unwrap();
        param.set(2, MetaKey::LocalTraceNum, 77u64).unwrap();

        assert_eq!(param.get::<f64>(2, MetaKey::SourceX).unwrap(), 1234.5);
        assert_eq!(param.get::<i64>(2, MetaKey::InlineIdx).unwrap(), -17);
        assert_eq!(param.get::<i16>(2, MetaKey::SampleCount).unwrap(), 1001);
        assert_eq!(param.get::<u64>(2, MetaKey::LocalTraceNum).unwrap(), 77);
        // neighbours untouched
        assert_eq!(param.get::<f64>(1, MetaKey::SourceX).unwrap(), 0.0);
        assert_eq!(param.get::<f64>(2, MetaKey::SourceY).unwrap(), 0.0);
    }

    #[test]
    fn resolved_columns() {
        let mut param = default_param(5);
        let il = param.resolve::<i64>(MetaKey::InlineIdx).unwrap();
        for i in 0..5 {
            param.put(i, il, i as i64 * 10).unwrap();
        }
        assert_eq!(param.get::<i64>(4, MetaKey::InlineIdx).unwrap(), 40);
        assert_eq!(param.at(3, il).unwrap(), 30);
    }

    #[test]
    fn columns_stay_with_their_rule() {
        let wide = default_param(3);
        let cmp_y = wide.resolve::<f64>(MetaKey::CmpY).unwrap();
        let mut narrow = Param::new(Arc::new(Rule::from_keys(&[MetaKey::InlineIdx])), 3);
        assert!(matches!(
            narrow.at(1, cmp_y),
            Err(SeisError::InvalidArgument(..))
        ));
        assert!(matches!(
            narrow.put(1, cmp_y, 2.0),
            Err(SeisError::InvalidArgument(..))
        ));

        // an equal rule behind another Arc accepts the column
        let twin = Param::new(Arc::new(wide.rule().as_ref().clone()), 3);
        assert_eq!(twin.at(2, cmp_y).unwrap(), 0.0);
    }

    #[test]
    fn access_errors() {
        let mut param = default_param(2);
        assert!(matches!(
            param.get::<i16>(0, MetaKey::SampleCount),
            Err(SeisError::KeyNotFound(..))
        ));
        assert!(matches!(
            param.get::<i64>(0, MetaKey::SourceX),
            Err(SeisError::MismatchedTypes(..))
        ));
        assert!(matches!(
            param.set(2, MetaKey::SourceX, 1.0f64),
            Err(SeisError::OutOfBounds(2, 0, 2, _))
        ));
        assert!(matches!(param.header(0), Err(SeisError::KeyNotFound(..))));
    }

    #[test]
    fn dynamic_values() {
        let mut param = default_param(1);
        param
            .set_value(0, MetaKey::InlineIdx, FieldValue::Float(12.0))
            .unwrap();
        assert_eq!(
            param.value(0, MetaKey::InlineIdx).unwrap(),
            FieldValue::Long(12)
        );
        param
            .set_value(0, MetaKey::CmpX, FieldValue::Long(-3))
            .unwrap();
        assert_eq!(param.get::<f64>(0, MetaKey::CmpX).unwrap(), -3.0);
    }

    #[test]
    fn copy_record_projects_onto_subset() {
        let mut src = Param::new(Arc::new(Rule::new(false, true, true)), 2);
        src.set(1, MetaKey::SourceX, 10.5f64).unwrap();
        src.set(1, MetaKey::InlineIdx, 4i64).unwrap();
        src.set(1, MetaKey::SampleCount, 250i16).unwrap();
        src.header_mut(1).unwrap()[0] = 0xAB;

        let mut dst = Param::new(
            Arc::new(Rule::from_keys(&[MetaKey::InlineIdx, MetaKey::SourceX])),
            3,
        );
        dst.set(0, MetaKey::InlineIdx, 99i64).unwrap();
        copy_record(1, &src, 2, &mut dst).unwrap();

        assert_eq!(dst.get::<f64>(2, MetaKey::SourceX).unwrap(), 10.5);
        assert_eq!(dst.get::<i64>(2, MetaKey::InlineIdx).unwrap(), 4);
        assert_eq!(dst.get::<i64>(0, MetaKey::InlineIdx).unwrap(), 99);
        assert!(dst.get::<i16>(2, MetaKey::SampleCount).is_err());
    }

    #[test]
    fn copy_record_converts_kinds() {
        let mut src = Param::new(Arc::new(Rule::from_keys(&[MetaKey::Offset])), 1);
        src.set(0, MetaKey::Offset, 450i64).unwrap();
        let mut rule = Rule::empty();
        rule.add_float(MetaKey::Offset, 36, 68).unwrap();
        let mut dst = Param::new(Arc::new(rule), 1);
        copy_record(0, &src, 0, &mut dst).unwrap();
        assert_eq!(dst.get::<f64>(0, MetaKey::Offset).unwrap(), 450.0);
    }

    #[test]
    fn copy_record_copies_headers() {
        let rule = Arc::new(Rule::from_keys(&[MetaKey::CopyAll, MetaKey::InlineIdx]));
        let mut src = Param::new(rule.clone(), 1);
        src.header_mut(0).unwrap().fill(7);
        let mut dst = Param::new(
            Arc::new(Rule::from_keys(&[MetaKey::CopyAll])),
            1,
        );
        copy_record(0, &src, 0, &mut dst).unwrap();
        assert!(dst.header(0).unwrap().iter().all(|b| *b == 7));
    }

    #[test]
    fn take_slice_concat() {
        let mut param = default_param(4);
        for i in 0..4 {
            param.set(i, MetaKey::GlobalTraceNum, i as i64).unwrap();
        }
        let taken = param.take(&[3, 1]).unwrap();
        assert_eq!(taken.get::<i64>(0, MetaKey::GlobalTraceNum).unwrap(), 3);
        assert_eq!(taken.get::<i64>(1, MetaKey::GlobalTraceNum).unwrap(), 1);
        assert!(param.take(&[4]).is_err());

        let head = param.slice(0..1).unwrap();
        let tail = param.slice(1..4).unwrap();
        assert_eq!(tail.len(), 3);
        let joined = Param::concat(param.rule().clone(), &[head, tail]).unwrap();
        assert_eq!(joined, param);
        assert!(param.slice(2..5).is_err());
    }

    #[test]
    fn concat_rejects_other_rules() {
        let a = default_param(1);
        let b = Param::new(Arc::new(Rule::from_keys(&DEFAULT_KEYS[..2])), 1);
        assert!(Param::concat(a.rule().clone(), &[a.clone(), b]).is_err());
    }

    #[rstest]
    #[case(0)]
    #[case(5)]
    fn from_columns(#[case] len: usize) {
        let rule = Arc::new(Rule::from_keys(&[MetaKey::InlineIdx, MetaKey::CrosslineIdx]));
        let param = Param::try_from_columns(
            rule.clone(),
            len,
            vec![1; len * 2],
            vec![],
            vec![],
            vec![],
            vec![],
        )
        .unwrap();
        assert_eq!(param.len(), len);
        assert!(
            Param::try_from_columns(rule, len, vec![1; len * 2 + 1], vec![], vec![], vec![], vec![])
                .is_err()
        );
    }

    #[test]
    fn columns_survive_removal() {
        let mut rule = Rule::new(false, true, false);
        rule.remove(MetaKey::SourceX);
        let mut param = Param::new(Arc::new(rule), 2);
        param.set(1, MetaKey::CmpY, 5.0f64).unwrap();
        assert_eq!(param.floats().len(), 12);
        assert_eq!(param.get::<f64>(1, MetaKey::CmpY).unwrap(), 5.0);
    }
}
