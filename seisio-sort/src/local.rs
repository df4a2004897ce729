use std::cmp::Ordering;

use seisio_error::SeisResult;
use seisio_meta::Param;

use crate::TraceCompare;

/// Stable merge sort of `items` under a fallible comparison.
///
/// The first error returned by `cmp` aborts the sort and leaves `items` in an unspecified order.
/// Runs that are already in order are merged with a single comparison.
pub fn try_sort_by<T, F>(items: &mut Vec<T>, mut cmp: F) -> SeisResult<()>
where
    T: Copy,
    F: FnMut(&T, &T) -> SeisResult<Ordering>,
{
    let n = items.len();
    let mut buf = items.clone();
    let mut width = 1;
    while width < n {
        for start in (0..n).step_by(2 * width) {
            let mid = (start + width).min(n);
            let end = (start + 2 * width).min(n);
            merge(&items[start..mid], &items[mid..end], &mut buf[start..end], &mut cmp)?;
        }
        std::mem::swap(items, &mut buf);
        width *= 2;
    }
    Ok(())
}

fn merge<T, F>(left: &[T], right: &[T], out: &mut [T], cmp: &mut F) -> SeisResult<()>
where
    T: Copy,
    F: FnMut(&T, &T) -> SeisResult<Ordering>,
{
    let in_order = match (left.last(), right.first()) {
        (Some(l), Some(r)) => cmp(l, r)?.is_le(),
        _ => true,
    };
    if in_order {
        out[..left.len()].copy_from_slice(left);
        out[left.len()..].copy_from_slice(right);
        return Ok(());
    }

    let (mut i, mut j) = (0, 0);
    for slot in out.iter_mut() {
        let take_left = j == right.len() || (i < left.len() && cmp(&left[i], &right[j])?.is_le());
        if take_left {
            *slot = left[i];
            i += 1;
        } else {
            *slot = right[j];
            j += 1;
        }
    }
    Ok(())
}

/// The permutation that sorts `param` under `cmp`, ties kept in their original order.
pub fn sort_permutation(param: &Param, cmp: &dyn TraceCompare) -> SeisResult<Vec<usize>> {
    let mut perm = (0..param.len()).collect();
    try_sort_by(&mut perm, |&a, &b| cmp.compare(param, a, param, b))?;
    Ok(perm)
}

/// A copy of `param` sorted under `cmp`.
pub fn sort_param(param: &Param, cmp: &dyn TraceCompare) -> SeisResult<Param> {
    param.take(&sort_permutation(param, cmp)?)
}

/// The first record of `param` that orders after its successor, if any.
pub fn first_inversion(param: &Param, cmp: &dyn TraceCompare) -> SeisResult<Option<usize>> {
    for i in 1..param.len() {
        if cmp.compare(param, i - 1, param, i)?.is_gt() {
            return Ok(Some(i - 1));
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use rstest::rstest;
    use seisio_error::{SeisError, seis_bail};
    use seisio_meta::{MetaKey, Rule};

    use super::*;
    use crate::SortType;

    #[rstest]
    #[case(vec![])]
    #[case(vec![1])]
    #[case(vec![3, 1, 2])]
    #[case(vec![5, 4, 3, 2, 1, 0, 9, 8, 7])]
    #[case((0..100).rev().collect())]
    #[case((0..33).map(|i| (i * 17) % 11).collect())]
    fn merge_sort_matches_std(#[case] values: Vec<i32>) {
        let mut expected = values.clone();
        expected.sort();
        let mut actual = values;
        try_sort_by(&mut actual, |a, b| Ok(a.cmp(b))).unwrap();
        assert_eq!(actual, expected);
    }

    #[test]
    fn merge_sort_is_stable() {
        let mut pairs = vec![(1, 'a'), (0, 'b'), (1, 'c'), (0, 'd'), (1, 'e')];
        try_sort_by(&mut pairs, |a, b| Ok(a.0.cmp(&b.0))).unwrap();
        assert_eq!(pairs, vec![(0, 'b'), (0, 'd'), (1, 'a'), (1, 'c'), (1, 'e')]);
    }

    #[test]
    fn merge_sort_stops_at_error() {
        let mut values = vec![3, 2, 1];
        let result = try_sort_by(&mut values, |a: &i32, b: &i32| {
            if *a == 1 || *b == 1 {
                seis_bail!(InvalidArgument: "cannot compare 1");
            }
            Ok(a.cmp(b))
        });
        assert!(matches!(result, Err(SeisError::InvalidArgument(..))));
    }

    fn lines(values: &[(i64, i64)]) -> Param {
        let rule = Arc::new(Rule::new(false, true, false));
        let mut param = Param::new(rule, values.len());
        for (i, &(il, xl)) in values.iter().enumerate() {
            param.set(i, MetaKey::InlineIdx, il).unwrap();
            param.set(i, MetaKey::CrosslineIdx, xl).unwrap();
            param.set(i, MetaKey::LocalTraceNum, i as u64).unwrap();
        }
        param
    }

    #[test]
    fn sort_by_line() {
        let param = lines(&[(2, 1), (1, 2), (1, 1), (2, 0)]);
        let cmp = SortType::LineROff.comparator();
        assert_eq!(sort_permutation(&param, &cmp).unwrap(), vec![2, 1, 3, 0]);

        let sorted = sort_param(&param, &cmp).unwrap();
        assert_eq!(first_inversion(&sorted, &cmp).unwrap(), None);
        assert_eq!(first_inversion(&param, &cmp).unwrap(), Some(0));
        assert_eq!(sorted.get::<u64>(0, MetaKey::LocalTraceNum).unwrap(), 2);
    }

    #[test]
    fn sort_reports_missing_keys() {
        let param = Param::new(Arc::new(Rule::from_keys(&[MetaKey::InlineIdx])), 2);
        assert!(matches!(
            sort_param(&param, &SortType::SrcRcv.comparator()),
            Err(SeisError::KeyNotFound(..))
        ));
    }
}
