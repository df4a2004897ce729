use std::fmt::{Display, Formatter};
use std::hash::{Hash, Hasher};
use std::ops::Range;
use std::sync::OnceLock;

use enum_iterator::{Sequence, all};
use itertools::Itertools;
use log::debug;
use rustc_hash::{FxHashMap, FxHashSet, FxHasher};
use seisio_error::{SeisResult, seis_bail, seis_err};

use crate::segy::{DEFAULT_KEYS, EXTRA_KEYS, TRACE_HEADER_SIZE};
use crate::{EntryKind, FieldLocation, MetaKey, RuleEntry};

/// The active metadata schema: which keys are tracked and where each one lives.
///
/// Each key of the rule maps onto one [`RuleEntry`]. Adding an entry assigns it the lowest
/// column of its kind that no other entry uses. Removing an entry never moves the survivors.
#[derive(Clone, Default)]
pub struct Rule {
    entries: FxHashMap<MetaKey, RuleEntry>,
    counts: [usize; EntryKind::CARDINALITY],
    full_extent: bool,
    extent: OnceLock<Range<usize>>,
}

impl Rule {
    /// A rule with no entries.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Builds a rule from the zero, default or maximal set of keys at their SEG-Y locations.
    ///
    /// With `full_extent` the extent always covers the whole trace header.
    pub fn new(full_extent: bool, defaults: bool, extra: bool) -> Self {
        let mut rule = Self {
            full_extent,
            ..Self::default()
        };
        let keys = defaults
            .then_some(DEFAULT_KEYS)
            .into_iter()
            .chain(extra.then_some(EXTRA_KEYS))
            .flatten();
        for key in keys {
            rule.insert(*key, key.default_location());
        }
        rule
    }

    /// Builds a rule holding the given keys at their SEG-Y locations.
    pub fn from_keys(keys: &[MetaKey]) -> Self {
        let mut rule = Self::empty();
        for key in keys {
            rule.insert(*key, key.default_location());
        }
        rule
    }

    /// Rebuilds a rule from explicit entries, keeping their columns.
    pub fn from_entries<I>(full_extent: bool, entries: I) -> SeisResult<Self>
    where
        I: IntoIterator<Item = (MetaKey, RuleEntry)>,
    {
        let mut rule = Self {
            full_extent,
            ..Self::default()
        };
        let mut used = FxHashSet::default();
        for (key, entry) in entries {
            entry.validate()?;
            check_key_kind(key, entry.kind())?;
            if !used.insert((entry.kind(), entry.slot())) {
                seis_bail!(InvalidRule: "column {} of kind {} is assigned twice", entry.slot(), entry.kind());
            }
            if rule.entries.insert(key, entry).is_some() {
                seis_bail!(InvalidRule: "key {key} is assigned twice");
            }
            rule.counts[kind_idx(entry.kind())] += 1;
        }
        Ok(rule)
    }

    /// Adds a 4-byte integer entry at `loc`.
    pub fn add_long(&mut self, key: MetaKey, loc: usize) -> SeisResult<()> {
        self.add(key, FieldLocation::Long(loc))
    }

    /// Adds a 2-byte integer entry at `loc`.
    pub fn add_short(&mut self, key: MetaKey, loc: usize) -> SeisResult<()> {
        self.add(key, FieldLocation::Short(loc))
    }

    /// Adds a scaled float entry with its mantissa at `loc` and its scale at `scale_loc`.
    pub fn add_float(&mut self, key: MetaKey, loc: usize, scale_loc: usize) -> SeisResult<()> {
        self.add(key, FieldLocation::Float { loc, scale_loc })
    }

    /// Adds a memory-only entry.
    pub fn add_index(&mut self, key: MetaKey) -> SeisResult<()> {
        self.add(key, FieldLocation::Index)
    }

    /// Adds the entry preserving the whole header under [`MetaKey::CopyAll`].
    pub fn add_copy(&mut self) {
        self.insert(MetaKey::CopyAll, FieldLocation::Copy);
    }

    /// Adds an entry for `key` at `location`, replacing any entry the key already has.
    pub fn add(&mut self, key: MetaKey, location: FieldLocation) -> SeisResult<()> {
        location.validate()?;
        check_key_kind(key, location.kind())?;
        self.insert(key, location);
        Ok(())
    }

    fn insert(&mut self, key: MetaKey, location: FieldLocation) {
        let kind = location.kind();
        let slot = match self.remove(key) {
            Some(previous) => {
                debug!("replacing rule entry {previous} for {key}");
                if previous.kind() == kind {
                    previous.slot()
                } else {
                    self.lowest_free_slot(kind)
                }
            }
            None => self.lowest_free_slot(kind),
        };
        self.entries.insert(key, location.at_slot(slot));
        self.counts[kind_idx(kind)] += 1;
        self.extent = OnceLock::new();
    }

    fn lowest_free_slot(&self, kind: EntryKind) -> usize {
        let used = self
            .entries
            .values()
            .filter(|e| e.kind() == kind)
            .map(|e| e.slot())
            .collect::<FxHashSet<_>>();
        (0..).find(|slot| !used.contains(slot)).unwrap_or_default()
    }

    /// Removes the entry of `key`, returning it if it was present.
    pub fn remove(&mut self, key: MetaKey) -> Option<RuleEntry> {
        let entry = self.entries.remove(&key)?;
        self.counts[kind_idx(entry.kind())] -= 1;
        self.extent = OnceLock::new();
        Some(entry)
    }

    /// The entry of `key`.
    pub fn entry(&self, key: MetaKey) -> SeisResult<RuleEntry> {
        self.get(key)
            .ok_or_else(|| seis_err!(KeyNotFound: "{key} is not in the rule"))
    }

    /// The entry of `key`, if present.
    pub fn get(&self, key: MetaKey) -> Option<RuleEntry> {
        self.entries.get(&key).copied()
    }

    /// Whether the rule holds `key`.
    pub fn contains(&self, key: MetaKey) -> bool {
        self.entries.contains_key(&key)
    }

    /// Iterates over the entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (MetaKey, RuleEntry)> + '_ {
        self.entries
            .iter()
            .map(|(k, e)| (*k, *e))
            .sorted_unstable_by_key(|(k, _)| *k)
    }

    /// The number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the rule holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The number of entries of `kind`.
    pub fn count(&self, kind: EntryKind) -> usize {
        self.counts[kind_idx(kind)]
    }

    /// The number of long entries.
    pub fn num_long(&self) -> usize {
        self.count(EntryKind::Long)
    }

    /// The number of short entries.
    pub fn num_short(&self) -> usize {
        self.count(EntryKind::Short)
    }

    /// The number of float entries.
    pub fn num_float(&self) -> usize {
        self.count(EntryKind::Float)
    }

    /// The number of index entries.
    pub fn num_index(&self) -> usize {
        self.count(EntryKind::Index)
    }

    /// The number of copy entries.
    pub fn num_copy(&self) -> usize {
        self.count(EntryKind::Copy)
    }

    /// Whether the rule preserves the whole header.
    pub fn has_copy(&self) -> bool {
        self.num_copy() > 0
    }

    /// The number of columns a [`crate::Param`] allocates for `kind`.
    ///
    /// This is one past the highest column in use, which exceeds [`Rule::count`] only while a
    /// removal has left a hole below it.
    pub fn width(&self, kind: EntryKind) -> usize {
        if kind == EntryKind::Copy {
            return self.num_copy();
        }
        self.entries
            .values()
            .filter(|e| e.kind() == kind)
            .map(|e| e.slot() + 1)
            .max()
            .unwrap_or(0)
    }

    /// Whether the extent is pinned to the whole header.
    pub fn full_extent(&self) -> bool {
        self.full_extent
    }

    /// Pins, or unpins, the extent to the whole header.
    pub fn set_full_extent(&mut self, full_extent: bool) {
        self.full_extent = full_extent;
        self.extent = OnceLock::new();
    }

    /// The smallest range of header bytes covering every entry.
    ///
    /// A copy entry or a full-extent rule covers the whole header; a rule touching no header
    /// bytes has the empty extent `0..0`.
    pub fn extent(&self) -> Range<usize> {
        self.extent
            .get_or_init(|| {
                if self.full_extent || self.has_copy() {
                    return 0..TRACE_HEADER_SIZE;
                }
                self.entries
                    .values()
                    .filter_map(|e| e.byte_range())
                    .reduce(|a, b| a.start.min(b.start)..a.end.max(b.end))
                    .unwrap_or(0..0)
            })
            .clone()
    }

    /// Bytes of [`crate::Param`] storage per record.
    pub fn param_memory_footprint(&self) -> usize {
        all::<EntryKind>()
            .map(|kind| self.width(kind) * kind.value_size())
            .sum()
    }

    /// An estimate of the memory the rule itself occupies.
    pub fn rule_memory_footprint(&self) -> usize {
        size_of::<Self>()
            + self.entries.capacity() * (size_of::<MetaKey>() + size_of::<RuleEntry>())
    }

    /// The largest number of records whose [`crate::Param`] fits in `budget` bytes.
    pub fn max_records(&self, budget: usize) -> usize {
        budget / self.param_memory_footprint().max(1)
    }

    /// A process-independent hash of the entries, used to check that cooperating ranks share a
    /// schema.
    pub fn fingerprint(&self) -> u64 {
        let mut hasher = FxHasher::default();
        self.full_extent.hash(&mut hasher);
        for (key, entry) in self.iter() {
            key.hash(&mut hasher);
            entry.hash(&mut hasher);
        }
        hasher.finish()
    }
}

fn kind_idx(kind: EntryKind) -> usize {
    match kind {
        EntryKind::Long => 0,
        EntryKind::Short => 1,
        EntryKind::Float => 2,
        EntryKind::Index => 3,
        EntryKind::Copy => 4,
    }
}

fn check_key_kind(key: MetaKey, kind: EntryKind) -> SeisResult<()> {
    if (key == MetaKey::CopyAll) != (kind == EntryKind::Copy) {
        seis_bail!(InvalidRule: "{key} cannot be stored as {kind}");
    }
    Ok(())
}

impl PartialEq for Rule {
    fn eq(&self, other: &Self) -> bool {
        self.full_extent == other.full_extent && self.entries == other.entries
    }
}

impl Eq for Rule {}

impl std::fmt::Debug for Rule {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rule")
            .field("entries", &self.iter().collect::<Vec<_>>())
            .field("full_extent", &self.full_extent)
            .finish()
    }
}

impl Display for Rule {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{{{}}}",
            self.iter().format_with(", ", |(k, e), f| f(&format_args!("{k}: {e}")))
        )
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use seisio_error::SeisError;

    use super::*;
    use crate::segy::TraceHeaderField;

    #[test]
    fn empty_rule() {
        let rule = Rule::empty();
        assert!(rule.is_empty());
        assert_eq!(rule.extent(), 0..0);
        assert_eq!(rule.param_memory_footprint(), 0);
        assert_eq!(rule.max_records(1024), 1024);
    }

    #[rstest]
    #[case(false, false, 0)]
    #[case(true, false, DEFAULT_KEYS.len())]
    #[case(true, true, DEFAULT_KEYS.len() + EXTRA_KEYS.len())]
    #[case(false, true, EXTRA_KEYS.len())]
    fn rule_sets(#[case] defaults: bool, #[case] extra: bool, #[case] len: usize) {
        let rule = Rule::new(false, defaults, extra);
        assert_eq!(rule.len(), len);
        let total: usize = all::<EntryKind>().map(|k| rule.count(k)).sum();
        assert_eq!(total, len);
    }

    #[test]
    fn default_rule_counts() {
        let rule = Rule::new(false, true, false);
        assert_eq!(rule.num_float(), 6);
        assert_eq!(rule.num_long(), 4);
        assert_eq!(rule.num_index(), 1);
        assert_eq!(rule.num_short(), 0);
        assert_eq!(rule.num_copy(), 0);
        // GlobalTraceNum at 4 through Crossline at 192..196
        assert_eq!(rule.extent(), 4..196);
    }

    #[test]
    fn full_extent_and_copy() {
        assert_eq!(Rule::new(true, false, false).extent(), 0..TRACE_HEADER_SIZE);

        let mut rule = Rule::from_keys(&[MetaKey::InlineIdx]);
        assert_eq!(rule.extent(), 188..192);
        rule.add_copy();
        assert_eq!(rule.num_copy(), 1);
        assert_eq!(rule.extent(), 0..TRACE_HEADER_SIZE);
        rule.add_copy();
        assert_eq!(rule.num_copy(), 1);
        assert_eq!(rule.remove(MetaKey::CopyAll), Some(RuleEntry::Copy));
        assert_eq!(rule.extent(), 188..192);
    }

    #[test]
    fn extent_tracks_mutation() {
        let mut rule = Rule::empty();
        rule.add_long(MetaKey::InlineIdx, 188).unwrap();
        rule.add_long(MetaKey::CrosslineIdx, 192).unwrap();
        assert_eq!(rule.extent(), 188..196);
        rule.add_float(MetaKey::SourceX, 72, 70).unwrap();
        assert_eq!(rule.extent(), 70..196);
        rule.remove(MetaKey::CrosslineIdx);
        assert_eq!(rule.extent(), 70..192);
        rule.add_index(MetaKey::LocalTraceNum).unwrap();
        assert_eq!(rule.extent(), 70..192);
    }

    #[test]
    fn remove_then_readd_reproduces_entry() {
        let mut rule = Rule::new(false, true, false);
        let before = rule.entry(MetaKey::SourceY).unwrap();
        let removed = rule.remove(MetaKey::SourceY).unwrap();
        assert_eq!(before, removed);
        assert!(!rule.contains(MetaKey::SourceY));
        assert_eq!(rule.num_float(), 5);
        // survivors keep their columns
        assert_eq!(rule.width(EntryKind::Float), 6);

        rule.add_float(
            MetaKey::SourceY,
            TraceHeaderField::SourceY.offset(),
            TraceHeaderField::CoordinateScale.offset(),
        )
        .unwrap();
        assert_eq!(rule.entry(MetaKey::SourceY).unwrap(), before);
        assert_eq!(rule, Rule::new(false, true, false));
    }

    #[test]
    fn slots_are_lowest_free() {
        let mut rule = Rule::empty();
        rule.add_long(MetaKey::InlineIdx, 188).unwrap();
        rule.add_long(MetaKey::CrosslineIdx, 192).unwrap();
        rule.add_long(MetaKey::Offset, 36).unwrap();
        rule.remove(MetaKey::InlineIdx);
        assert_eq!(rule.width(EntryKind::Long), 3);
        rule.add_long(MetaKey::ShotNum, 196).unwrap();
        assert_eq!(rule.entry(MetaKey::ShotNum).unwrap().slot(), 0);
        assert_eq!(rule.width(EntryKind::Long), 3);
    }

    #[test]
    fn replace_keeps_column_of_same_kind() {
        let mut rule = Rule::empty();
        rule.add_long(MetaKey::InlineIdx, 188).unwrap();
        rule.add_long(MetaKey::CrosslineIdx, 192).unwrap();
        rule.add_long(MetaKey::InlineIdx, 8).unwrap();
        assert_eq!(rule.num_long(), 2);
        assert_eq!(
            rule.entry(MetaKey::InlineIdx).unwrap(),
            RuleEntry::Long { slot: 0, loc: 8 }
        );
    }

    #[test]
    fn replace_with_other_kind() {
        let mut rule = Rule::empty();
        rule.add_long(MetaKey::Offset, 36).unwrap();
        rule.add_float(MetaKey::Offset, 36, 68).unwrap();
        assert_eq!(rule.num_long(), 0);
        assert_eq!(rule.num_float(), 1);
        assert_eq!(rule.len(), 1);
        assert_eq!(rule.entry(MetaKey::Offset).unwrap().kind(), EntryKind::Float);
    }

    #[test]
    fn missing_key() {
        let rule = Rule::empty();
        assert!(matches!(
            rule.entry(MetaKey::SourceX),
            Err(SeisError::KeyNotFound(..))
        ));
    }

    #[rstest]
    #[case(MetaKey::SourceX, FieldLocation::Float { loc: 72, scale_loc: 72 })]
    #[case(MetaKey::InlineIdx, FieldLocation::Long(238))]
    #[case(MetaKey::CopyAll, FieldLocation::Long(0))]
    #[case(MetaKey::InlineIdx, FieldLocation::Copy)]
    fn invalid_adds(#[case] key: MetaKey, #[case] location: FieldLocation) {
        let mut rule = Rule::empty();
        assert!(matches!(
            rule.add(key, location),
            Err(SeisError::InvalidRule(..))
        ));
        assert!(rule.is_empty());
    }

    #[test]
    fn footprint() {
        let rule = Rule::new(false, true, false);
        assert_eq!(rule.param_memory_footprint(), 6 * 8 + 4 * 8 + 8);
        assert_eq!(rule.max_records(88 * 10 + 5), 10);
        assert!(rule.rule_memory_footprint() >= size_of::<Rule>());
    }

    #[test]
    fn fingerprint_depends_on_entries_only() {
        let a = Rule::new(false, true, false);
        let mut b = Rule::from_keys(DEFAULT_KEYS);
        assert_eq!(a.fingerprint(), b.fingerprint());
        b.remove(MetaKey::CmpY);
        assert_ne!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn from_entries_rejects_collisions() {
        let res = Rule::from_entries(
            false,
            [
                (MetaKey::InlineIdx, RuleEntry::Long { slot: 0, loc: 188 }),
                (MetaKey::CrosslineIdx, RuleEntry::Long { slot: 0, loc: 192 }),
            ],
        );
        assert!(matches!(res, Err(SeisError::InvalidRule(..))));
    }

    #[test]
    fn from_entries_keeps_holes() {
        let rule = Rule::from_entries(
            false,
            [(MetaKey::CrosslineIdx, RuleEntry::Long { slot: 2, loc: 192 })],
        )
        .unwrap();
        assert_eq!(rule.num_long(), 1);
        assert_eq!(rule.width(EntryKind::Long), 3);
    }

    #[test]
    fn display() {
        let rule = Rule::from_keys(&[MetaKey::InlineIdx, MetaKey::SourceX]);
        assert_eq!(rule.to_string(), "{source_x: float[0]@72x70, inline: long[0]@188}");
    }
}
