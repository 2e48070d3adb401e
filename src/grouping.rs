//! Calendar grouping of a snapshot time series
//!
//! Filters snapshots to a region and an inclusive date window, tags each with
//! its calendar month (and year), and partitions them into [`PeriodGroup`]s.

use crate::errors::{ClimNormError, Result};
use crate::region::Region;
use crate::snapshot::GridSnapshot;
use chrono::{Datelike, NaiveDate};
use log::debug;
use std::collections::{BTreeMap, BTreeSet};

/// Month abbreviations, index 0 is January
pub const MONTH_NAMES: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// How snapshots are partitioned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupBy {
    /// Twelve groups, one per calendar month, all years merged
    Month,
    /// One group per observed (year, month) pair
    YearMonth,
}

impl GroupBy {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Month => "month",
            Self::YearMonth => "year-month",
        }
    }
}

/// Calendar key of a group; `year` is set only for [`GroupBy::YearMonth`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PeriodKey {
    pub month: u32,
    pub year: Option<i32>,
}

impl PeriodKey {
    #[must_use]
    pub fn month_name(&self) -> &'static str {
        MONTH_NAMES[(self.month - 1) as usize]
    }
}

/// Snapshots sharing a calendar key
#[derive(Debug, Clone)]
pub struct PeriodGroup<'a> {
    pub key: PeriodKey,
    pub members: Vec<&'a GridSnapshot>,
}

impl<'a> PeriodGroup<'a> {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Distinct years among the members
    #[must_use]
    pub fn years(&self) -> BTreeSet<i32> {
        self.members.iter().map(|s| s.date.year()).collect()
    }
}

/// Reject an inverted date window
pub fn validate_range(start: NaiveDate, end: NaiveDate) -> Result<()> {
    if start > end {
        return Err(ClimNormError::InvalidRange {
            message: format!("start date {start} is after end date {end}"),
        });
    }
    Ok(())
}

/// Filter, tag and partition snapshots by calendar period
///
/// Keeps snapshots whose extent intersects `region` and whose date lies in
/// `[start, end]`. With [`GroupBy::Month`] exactly twelve groups are returned and
/// months without data are present as empty groups. With
/// [`GroupBy::YearMonth`] only observed pairs appear. Groups are ordered by
/// month, then year; members by date.
///
/// # Errors
///
/// Returns [`ClimNormError::InvalidRange`] when `start > end`.
pub fn group<'a>(
    snapshots: &'a [GridSnapshot],
    region: &Region,
    start: NaiveDate,
    end: NaiveDate,
    group_by: GroupBy,
) -> Result<Vec<PeriodGroup<'a>>> {
    validate_range(start, end)?;

    let mut buckets: BTreeMap<PeriodKey, Vec<&'a GridSnapshot>> = BTreeMap::new();
    if group_by == GroupBy::Month {
        for month in 1..=12 {
            buckets.insert(PeriodKey { month, year: None }, Vec::new());
        }
    }

    let mut retained = 0_usize;
    for snapshot in snapshots {
        if snapshot.date < start || snapshot.date > end || !region.intersects(&snapshot.extent) {
            continue;
        }
        let key = PeriodKey {
            month: snapshot.date.month(),
            year: match group_by {
                GroupBy::Month => None,
                GroupBy::YearMonth => Some(snapshot.date.year()),
            },
        };
        buckets.entry(key).or_default().push(snapshot);
        retained += 1;
    }

    debug!(
        "Retained {retained} of {} snapshots in {start}..={end}, {} groups by {}",
        snapshots.len(),
        buckets.len(),
        group_by.as_str()
    );

    Ok(buckets
        .into_iter()
        .map(|(key, mut members)| {
            members.sort_by_key(|s| s.date);
            PeriodGroup { key, members }
        })
        .collect())
}

/// Distinct years among all grouped snapshots
#[must_use]
pub fn observed_years(groups: &[PeriodGroup<'_>]) -> BTreeSet<i32> {
    groups.iter().flat_map(PeriodGroup::years).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::GridExtent;

    fn extent() -> GridExtent {
        GridExtent::new(0.0, 2.0, 1.0, 1.0, 2, 2)
    }

    fn snap(y: i32, m: u32, d: u32) -> GridSnapshot {
        GridSnapshot::uniform(NaiveDate::from_ymd_opt(y, m, d).unwrap(), extent(), &["precipitation"], 1.0)
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_month_grouping_pads_empty_months() {
        let snaps = vec![snap(2000, 3, 2), snap(2001, 3, 5), snap(2000, 1, 1)];
        let region = Region::from_extent(&extent()).unwrap();
        let groups = group(&snaps, &region, date(2000, 1, 1), date(2001, 12, 31), GroupBy::Month).unwrap();

        assert_eq!(groups.len(), 12);
        let months: Vec<u32> = groups.iter().map(|g| g.key.month).collect();
        assert_eq!(months, (1..=12).collect::<Vec<_>>());
        assert_eq!(groups[0].len(), 1);
        assert!(groups[1].is_empty());
        assert_eq!(groups[2].len(), 2);
        assert_eq!(groups[2].key.month_name(), "Mar");
    }

    #[test]
    fn test_year_month_grouping_is_sparse_and_ordered() {
        let snaps = vec![snap(2001, 2, 1), snap(2000, 2, 3), snap(2000, 2, 1), snap(2000, 5, 1)];
        let region = Region::from_extent(&extent()).unwrap();
        let groups = group(&snaps, &region, date(2000, 1, 1), date(2001, 12, 31), GroupBy::YearMonth).unwrap();

        let keys: Vec<(u32, Option<i32>)> = groups.iter().map(|g| (g.key.month, g.key.year)).collect();
        assert_eq!(keys, vec![(2, Some(2000)), (2, Some(2001)), (5, Some(2000))]);
        assert_eq!(groups[0].members[0].date, date(2000, 2, 1));
        assert_eq!(groups[0].members[1].date, date(2000, 2, 3));
        assert_eq!(observed_years(&groups).into_iter().collect::<Vec<_>>(), vec![2000, 2001]);
    }

    #[test]
    fn test_filters_dates_inclusive_and_region() {
        let snaps = vec![snap(1999, 12, 31), snap(2000, 1, 1), snap(2000, 1, 31), snap(2000, 2, 1)];
        let region = Region::from_extent(&extent()).unwrap();
        let groups = group(&snaps, &region, date(2000, 1, 1), date(2000, 1, 31), GroupBy::YearMonth).unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].len(), 2);

        let far_away = Region::rectangle(50.0, 50.0, 51.0, 51.0).unwrap();
        let groups = group(&snaps, &far_away, date(1999, 1, 1), date(2000, 12, 31), GroupBy::YearMonth).unwrap();
        assert!(groups.is_empty());
    }

    #[test]
    fn test_inverted_range_rejected() {
        let region = Region::from_extent(&extent()).unwrap();
        let err = group(&[], &region, date(2001, 1, 1), date(2000, 1, 1), GroupBy::Month).unwrap_err();
        assert!(matches!(err, ClimNormError::InvalidRange { .. }));
    }
}
