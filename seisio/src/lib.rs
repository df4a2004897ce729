pub use seisio_meta::*;
pub use {
    seisio_comm as comm, seisio_error as error, seisio_io as io, seisio_meta as meta,
    seisio_sort as sort,
};

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::comm::{Communicator, LocalGroup, decompose};
    use crate::io::{MemoryHeaders, read_param, write_param};
    use crate::sort::{SortOptions, SortType, check_order};
    use crate::{MetaKey, Param, Rule};

    #[test]
    fn line_sort_round_trip() {
        let rule = Arc::new(Rule::new(false, true, false));
        let mut param = Param::new(rule.clone(), 12);
        for i in 0..12 {
            param.set(i, MetaKey::InlineIdx, (i as i64 * 5) % 12).unwrap();
        }
        let mut store = MemoryHeaders::new(12);
        write_param(&mut store, 0, &param).unwrap();

        let cmp = SortType::LineOff.comparator();
        let source = &store;
        let outcomes = LocalGroup::run(2, |comm| {
            let (offset, count) = decompose(12, comm.size(), comm.rank()).unwrap();
            let shard = read_param(source, rule.clone(), offset, count).unwrap();
            let outcome =
                crate::sort::sort(&comm, &shard, &cmp, &SortOptions::default()).unwrap();
            (offset, outcome.param)
        });
        for (offset, sorted) in &outcomes {
            write_param(&mut store, *offset, sorted).unwrap();
        }
        assert!(check_order(&store, rule, (0, 12), &cmp).unwrap());
    }
}
