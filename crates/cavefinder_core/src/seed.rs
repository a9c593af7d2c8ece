//! # Seed Sources and Work Partitioning
//!
//! A scan walks either a contiguous inclusive range of seeds or an explicit
//! list. Ranges are cut into segments (bounded sub-ranges executed one after
//! another) and every segment is cut further into work units.
//!
//! ## Granularity
//!
//! - **Compressed** seeds: one unit per seed. Each expands into up to 65536
//!   full seeds, but the unit counts as 1 for progress.
//! - **Full** seeds: units are batches of up to [`FULL_SEED_BATCH`] seeds and
//!   progress advances by the number of seeds actually evaluated.

use crate::error::{ScanError, ScanResult};
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;

/// Number of full seeds behind a single compressed seed.
pub const EXPANSION_FACTOR: u64 = 65_536;

/// Maximum number of full seeds in one work unit.
pub const FULL_SEED_BATCH: u64 = 1_000;

/// Which kind of seed the scan input contains.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeedKind {
    /// Reduced-entropy seeds that expand into many full seeds.
    #[default]
    #[serde(alias = "structure")]
    Compressed,
    /// Seeds used directly by noise sampling.
    #[serde(alias = "world")]
    Full,
}

impl SeedKind {
    /// Full seeds represented by one completed progress unit.
    #[inline]
    #[must_use]
    pub const fn seeds_per_unit(self) -> u64 {
        match self {
            Self::Compressed => EXPANSION_FACTOR,
            Self::Full => 1,
        }
    }
}

/// Contiguous inclusive interval of seeds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SeedRange {
    /// First seed (inclusive).
    pub start: i64,
    /// Last seed (inclusive).
    pub end: i64,
}

impl SeedRange {
    /// Creates a range, rejecting `end < start`.
    pub fn new(start: i64, end: i64) -> ScanResult<Self> {
        if end < start {
            return Err(ScanError::InvalidRange { start, end });
        }
        Ok(Self { start, end })
    }

    /// Parses both bounds from user text.
    pub fn parse(start: &str, end: &str) -> ScanResult<Self> {
        Self::new(parse_seed(start)?, parse_seed(end)?)
    }

    /// Number of seeds in the range. Can exceed `u64::MAX` by one.
    #[inline]
    #[must_use]
    pub fn len(&self) -> u128 {
        (i128::from(self.end) - i128::from(self.start) + 1) as u128
    }

    /// Always false: a range holds at least one seed.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        false
    }

    /// Seed count when it fits in `u64`, `None` for the full 2^64 span.
    #[must_use]
    pub fn total(&self) -> Option<u64> {
        u64::try_from(self.len()).ok()
    }

    /// Iterates every seed of the range in ascending order.
    #[inline]
    #[must_use]
    pub fn seeds(&self) -> RangeInclusive<i64> {
        self.start..=self.end
    }

    /// Splits the range into consecutive sub-ranges of at most `size` seeds.
    ///
    /// The pieces are gap-free, non-overlapping and cover the range exactly.
    #[must_use]
    pub fn segments(&self, size: u64) -> Segments {
        Segments {
            next: Some(self.start),
            end: self.end,
            size: size.max(1),
        }
    }

    /// Number of pieces [`segments`](Self::segments) yields for `size`.
    #[must_use]
    pub fn segment_count(&self, size: u64) -> u128 {
        self.len().div_ceil(u128::from(size.max(1)))
    }
}

/// Iterator over the consecutive pieces of a [`SeedRange`].
#[derive(Clone, Debug)]
pub struct Segments {
    next: Option<i64>,
    end: i64,
    size: u64,
}

impl Iterator for Segments {
    type Item = SeedRange;

    fn next(&mut self) -> Option<SeedRange> {
        let start = self.next?;
        let span = i64::try_from(self.size - 1).unwrap_or(i64::MAX);
        let end = start.saturating_add(span).min(self.end);
        self.next = if end < self.end { Some(end + 1) } else { None };
        Some(SeedRange { start, end })
    }
}

/// Parses one seed token, surrounding whitespace ignored.
pub fn parse_seed(token: &str) -> ScanResult<i64> {
    let trimmed = token.trim();
    trimmed.parse().map_err(|_| ScanError::InvalidSeed {
        token: trimmed.to_string(),
    })
}

/// Outcome of reading a newline-separated seed list.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SeedList {
    /// Parsed seeds in input order, duplicates kept.
    pub seeds: Vec<i64>,
    /// Non-blank tokens that were not integers.
    pub skipped: Vec<String>,
}

impl SeedList {
    /// Parses one seed per line. Blank lines are ignored silently.
    ///
    /// Returns [`ScanError::EmptySeedList`] when the text holds no tokens.
    pub fn parse(text: &str) -> ScanResult<Self> {
        if text.trim().is_empty() {
            return Err(ScanError::EmptySeedList);
        }
        let mut list = Self::default();
        for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
            match line.parse() {
                Ok(seed) => list.seeds.push(seed),
                Err(_) => list.skipped.push(line.to_string()),
            }
        }
        Ok(list)
    }
}

/// The minimal item submitted to the worker pool.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WorkUnit {
    /// One compressed seed, expanded by the worker.
    Compressed(i64),
    /// A contiguous batch of full seeds.
    FullRange(SeedRange),
    /// A batch of full seeds taken from a list.
    FullList(Vec<i64>),
}

/// Work units covering a range for the given seed kind.
pub fn range_units(range: SeedRange, kind: SeedKind) -> Box<dyn Iterator<Item = WorkUnit> + Send> {
    match kind {
        SeedKind::Compressed => Box::new(range.seeds().map(WorkUnit::Compressed)),
        SeedKind::Full => Box::new(range.segments(FULL_SEED_BATCH).map(WorkUnit::FullRange)),
    }
}

/// Work units covering a list for the given seed kind.
pub fn list_units(seeds: &[i64], kind: SeedKind) -> Box<dyn Iterator<Item = WorkUnit> + '_> {
    match kind {
        SeedKind::Compressed => Box::new(seeds.iter().copied().map(WorkUnit::Compressed)),
        SeedKind::Full => Box::new(
            seeds
                .chunks(FULL_SEED_BATCH as usize)
                .map(|batch| WorkUnit::FullList(batch.to_vec())),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_exact_cover(range: SeedRange, size: u64) {
        let pieces: Vec<_> = range.segments(size).collect();
        assert_eq!(pieces.len() as u128, range.segment_count(size));
        assert_eq!(pieces.first().map(|s| s.start), Some(range.start));
        assert_eq!(pieces.last().map(|s| s.end), Some(range.end));
        for piece in &pieces {
            assert!(piece.start <= piece.end);
            assert!(piece.len() <= u128::from(size));
        }
        for pair in pieces.windows(2) {
            assert_eq!(pair[0].end + 1, pair[1].start, "gap or overlap between {pair:?}");
        }
    }

    #[test]
    fn test_segments_cover_range() {
        assert_exact_cover(SeedRange::new(0, 99).unwrap(), 10);
        assert_exact_cover(SeedRange::new(0, 100).unwrap(), 10);
        assert_exact_cover(SeedRange::new(-17, 23).unwrap(), 7);
        assert_exact_cover(SeedRange::new(5, 5).unwrap(), 1_000);
        assert_exact_cover(SeedRange::new(-3, 3).unwrap(), 1);
    }

    #[test]
    fn test_segments_at_integer_limits() {
        assert_exact_cover(SeedRange::new(i64::MAX - 25, i64::MAX).unwrap(), 10);
        assert_exact_cover(SeedRange::new(i64::MIN, i64::MIN + 25).unwrap(), 10);

        let everything = SeedRange::new(i64::MIN, i64::MAX).unwrap();
        assert_eq!(everything.total(), None);
        assert_eq!(everything.segment_count(u64::MAX), 2);
        let pieces: Vec<_> = everything.segments(u64::MAX).collect();
        assert_eq!(pieces.len(), 2);
        assert_eq!(pieces[1].end, i64::MAX);
    }

    #[test]
    fn test_segment_count_rounds_up() {
        let range = SeedRange::new(1, 25).unwrap();
        assert_eq!(range.segment_count(10), 3);
        assert_eq!(range.segment_count(25), 1);
        assert_eq!(range.segment_count(100), 1);
    }

    #[test]
    fn test_reversed_range_rejected() {
        assert!(matches!(
            SeedRange::new(10, 9),
            Err(ScanError::InvalidRange { start: 10, end: 9 })
        ));
    }

    #[test]
    fn test_parse_range_text() {
        let range = SeedRange::parse(" -5 ", "5").unwrap();
        assert_eq!(range.total(), Some(11));
        assert!(matches!(
            SeedRange::parse("12abc", "20"),
            Err(ScanError::InvalidSeed { token }) if token == "12abc"
        ));
    }

    #[test]
    fn test_seed_list_skips_bad_tokens() {
        let list = SeedList::parse("1\n\n  2 \nnope\n2\n-9223372036854775808\n99999999999999999999\n").unwrap();
        assert_eq!(list.seeds, vec![1, 2, 2, i64::MIN]);
        assert_eq!(list.skipped, vec!["nope".to_string(), "99999999999999999999".to_string()]);
    }

    #[test]
    fn test_empty_seed_list_rejected() {
        assert!(matches!(SeedList::parse(" \n\t\n"), Err(ScanError::EmptySeedList)));
    }

    #[test]
    fn test_full_seed_units_are_batched() {
        let range = SeedRange::new(0, 2_499).unwrap();
        let units: Vec<_> = range_units(range, SeedKind::Full).collect();
        assert_eq!(units.len(), 3);
        assert_eq!(units[2], WorkUnit::FullRange(SeedRange { start: 2_000, end: 2_499 }));

        let seeds: Vec<i64> = (0..1_001).collect();
        let units: Vec<_> = list_units(&seeds, SeedKind::Full).collect();
        assert_eq!(units.len(), 2);
        assert_eq!(units[1], WorkUnit::FullList(vec![1_000]));
    }

    #[test]
    fn test_compressed_units_are_single_seeds() {
        let range = SeedRange::new(7, 9).unwrap();
        let units: Vec<_> = range_units(range, SeedKind::Compressed).collect();
        assert_eq!(
            units,
            vec![WorkUnit::Compressed(7), WorkUnit::Compressed(8), WorkUnit::Compressed(9)]
        );
    }
}
