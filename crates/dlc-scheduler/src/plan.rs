//! Dispatch planning: priority regions first, then fixed-size batches.

use std::collections::HashSet;

use dlc_core::RegionCode;

use crate::error::SchedulerError;

/// Ordered batches for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunPlan {
    batches: Vec<Vec<RegionCode>>,
}

impl RunPlan {
    /// Order `regions` with `priority` first and split into `batch_size` groups.
    ///
    /// Priority entries not in `regions` are ignored. Duplicates are dropped,
    /// keeping the first occurrence.
    pub fn build(
        regions: &[RegionCode],
        priority: &[RegionCode],
        batch_size: usize,
    ) -> Result<Self, SchedulerError> {
        if batch_size == 0 {
            return Err(SchedulerError::ZeroBatchSize);
        }
        let ordered = dispatch_order(regions, priority);
        if ordered.is_empty() {
            return Err(SchedulerError::NoRegions);
        }
        Ok(Self {
            batches: ordered.chunks(batch_size).map(<[_]>::to_vec).collect(),
        })
    }

    pub fn batches(&self) -> &[Vec<RegionCode>] {
        &self.batches
    }

    pub fn region_count(&self) -> usize {
        self.batches.iter().map(Vec::len).sum()
    }
}

/// Priority regions (that are configured) in priority order, then the rest.
pub fn dispatch_order(regions: &[RegionCode], priority: &[RegionCode]) -> Vec<RegionCode> {
    let configured: HashSet<&RegionCode> = regions.iter().collect();
    let mut seen = HashSet::new();
    priority
        .iter()
        .filter(|r| configured.contains(r))
        .chain(regions.iter())
        .filter(|r| seen.insert(*r))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codes(names: &[&str]) -> Vec<RegionCode> {
        names.iter().map(|n| RegionCode::new(n).unwrap()).collect()
    }

    fn names(regions: &[RegionCode]) -> Vec<&str> {
        regions.iter().map(RegionCode::as_str).collect()
    }

    #[test]
    fn priority_regions_go_first() {
        let order = dispatch_order(&codes(&["A", "B", "C", "D"]), &codes(&["C", "A"]));
        assert_eq!(names(&order), ["C", "A", "B", "D"]);
    }

    #[test]
    fn unknown_priority_regions_are_ignored() {
        let order = dispatch_order(&codes(&["A", "B"]), &codes(&["Z", "B"]));
        assert_eq!(names(&order), ["B", "A"]);
    }

    #[test]
    fn duplicates_are_dropped() {
        let order = dispatch_order(&codes(&["A", "B", "A"]), &codes(&["B", "B"]));
        assert_eq!(names(&order), ["B", "A"]);
    }

    #[test]
    fn six_regions_batch_five_then_one() {
        let plan = RunPlan::build(&codes(&["A", "B", "C", "D", "E", "F"]), &[], 5).unwrap();
        assert_eq!(plan.batches().len(), 2);
        assert_eq!(plan.batches()[0].len(), 5);
        assert_eq!(names(&plan.batches()[1]), ["F"]);
        assert_eq!(plan.region_count(), 6);
    }

    #[test]
    fn empty_or_zero_sized_plans_are_rejected() {
        assert!(matches!(
            RunPlan::build(&[], &[], 5),
            Err(SchedulerError::NoRegions)
        ));
        assert!(matches!(
            RunPlan::build(&codes(&["A"]), &[], 0),
            Err(SchedulerError::ZeroBatchSize)
        ));
    }
}
