use seisio_error::{SeisResult, seis_bail};

/// The contiguous block of `total` records owned by `rank` in a group of `size` ranks, as
/// `(offset, count)`.
///
/// The first `total % size` ranks own one record more than the others.
pub fn decompose(total: usize, size: usize, rank: usize) -> SeisResult<(usize, usize)> {
    if rank >= size {
        seis_bail!(OutOfBounds: rank, 0, size);
    }
    let base = total / size;
    let extra = total % size;
    let count = base + usize::from(rank < extra);
    let offset = rank * base + rank.min(extra);
    Ok((offset, count))
}
