//! Cluster and gap length constraints.
//!
//! On each checked day, a faculty member's classes are merged into clusters: consecutive
//! classes whose gap is at most `max_gap` belong to the same cluster. A cluster's length runs
//! from its first start to its last end; the gaps are the spaces between consecutive
//! clusters. Too-long rules count every offending cluster (or gap). Too-short rules let the
//! first offender of each day go free and count the rest.
//!
//! Every way the faculty member's day could look (each section either absent that day or in
//! one of its slots that meets that day, with no two chosen slots in conflict) is evaluated,
//! and a day with `v` violations is forbidden unless the criterion of rank `v` for that day
//! is set. Ranks are chained (`c(d, r+1) → c(d, r)`), so a day with `v` violations costs `v`
//! criteria. Layouts skipped for a slot conflict are covered by tying the faculty member's
//! conflicting slots on that day to the first rank.

use log::{trace, warn};

use crate::encoding::context::{EncoderCache, EncodingContext};
use crate::encoding::faculty_days::{MAX_DAY_PATTERNS, guard_double_booking};
use crate::sat::literal::{Lit, Var};
use crate::timetable::clock::{Day, Duration, Time};
use crate::timetable::constraint::ClusterLimit;
use crate::timetable::model::{SectionId, TimeSlotId, TimetableData};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Measure {
    Cluster,
    Gap,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bound {
    TooShort,
    TooLong,
}

/// Merges `[start, end)` intervals whose gap is at most `max_gap`. Overlapping intervals
/// always merge.
#[must_use]
pub fn merge_clusters(intervals: &[(Time, Time)], max_gap: Duration) -> Vec<(Time, Time)> {
    let mut sorted = intervals.to_vec();
    sorted.sort_unstable();

    let mut clusters: Vec<(Time, Time)> = Vec::with_capacity(sorted.len());
    for (start, end) in sorted {
        match clusters.last_mut() {
            Some(last) if start.minutes_since(last.1) <= i32::from(max_gap.minutes()) => {
                last.1 = last.1.max(end);
            }
            _ => clusters.push((start, end)),
        }
    }
    clusters
}

/// Number of violations on one day, given that day's clusters.
#[must_use]
pub fn count_violations(clusters: &[(Time, Time)], measure: Measure, bound: Bound, limit: Duration) -> usize {
    let lengths: Vec<Duration> = match measure {
        Measure::Cluster => clusters.iter().map(|&(start, end)| end - start).collect(),
        Measure::Gap => clusters.windows(2).map(|w| w[1].0 - w[0].1).collect(),
    };
    match bound {
        Bound::TooLong => lengths.iter().filter(|&&l| l > limit).count(),
        Bound::TooShort => lengths.iter().filter(|&&l| l < limit).count().saturating_sub(1),
    }
}

/// One way a section can spend the day.
#[derive(Debug, Clone, Copy)]
struct DayOption {
    /// True exactly when this option is taken.
    lit: Lit,
    slot: Option<TimeSlotId>,
}

#[derive(Debug)]
struct DayPattern {
    /// The literals of the chosen options.
    chosen: Vec<Lit>,
    violations: usize,
}

pub fn encode_cluster_limit(
    ctx: &mut EncodingContext<'_>,
    cache: &mut EncoderCache,
    priority: u32,
    message: &str,
    limit: &ClusterLimit,
    measure: Measure,
    bound: Bound,
) -> Vec<Var> {
    let data = ctx.data();
    let sections: Vec<SectionId> = data
        .faculty_member(limit.faculty)
        .sections
        .iter()
        .copied()
        .filter(|&s| !data.section(s).time_slots.is_empty())
        .collect();
    if sections.is_empty() {
        return Vec::new();
    }

    let mut by_day: Vec<(Day, Vec<DayPattern>, bool)> = Vec::new();
    let mut visited = 0;
    for day in limit.days.iter() {
        let options: Vec<Vec<DayOption>> = sections
            .iter()
            .filter_map(|&s| day_options(ctx, cache, s, day))
            .collect();

        let mut search = DaySearch {
            data,
            options: &options,
            limit,
            measure,
            bound,
            chosen: Vec::new(),
            patterns: Vec::new(),
            visited,
            pruned: false,
        };
        if !search.descend() {
            warn!("{message}: more than {MAX_DAY_PATTERNS} day layouts to check; constraint skipped");
            return Vec::new();
        }
        visited = search.visited;
        by_day.push((day, search.patterns, search.pruned));
    }
    trace!("{message}: {visited} day layouts checked");

    let mut criteria = Vec::new();
    for (day, patterns, pruned) in by_day {
        let mut ranks: Vec<Var> = Vec::new();
        let rank = |ctx: &mut EncodingContext<'_>, ranks: &mut Vec<Var>, r: usize| {
            while ranks.len() < r {
                let c = ctx.new_criterion(priority, format!("{message} [{day} #{}]", ranks.len() + 1));
                if let Some(&prev) = ranks.last() {
                    ctx.add_clause([c.negative(), prev.positive()]);
                }
                ranks.push(c);
            }
            ranks[r - 1]
        };
        for pattern in patterns {
            let c = rank(ctx, &mut ranks, pattern.violations);
            ctx.add_clause(
                pattern
                    .chosen
                    .iter()
                    .map(|l| l.negated())
                    .chain(std::iter::once(c.positive())),
            );
        }
        if pruned {
            let c = rank(ctx, &mut ranks, 1);
            guard_double_booking(ctx, &sections, c, |t| data.time_slot(t).days.contains(day));
        }
        criteria.extend(ranks);
    }
    criteria
}

/// `None` if the section can never meet on `day`.
fn day_options(
    ctx: &mut EncodingContext<'_>,
    cache: &mut EncoderCache,
    section: SectionId,
    day: Day,
) -> Option<Vec<DayOption>> {
    let data = ctx.data();
    let meets = cache.meets_day(ctx, section, day)?;

    let slots = &data.section(section).time_slots;
    let mut options = Vec::with_capacity(slots.len() + 1);
    if slots.iter().any(|&t| !data.time_slot(t).days.contains(day)) {
        options.push(DayOption {
            lit: meets.negative(),
            slot: None,
        });
    }
    for &t in slots {
        if data.time_slot(t).days.contains(day) {
            options.push(DayOption {
                lit: ctx.time_var(section, t).positive(),
                slot: Some(t),
            });
        }
    }
    Some(options)
}

struct DaySearch<'a> {
    data: &'a TimetableData,
    options: &'a [Vec<DayOption>],
    limit: &'a ClusterLimit,
    measure: Measure,
    bound: Bound,
    chosen: Vec<DayOption>,
    patterns: Vec<DayPattern>,
    visited: usize,
    pruned: bool,
}

impl DaySearch<'_> {
    fn descend(&mut self) -> bool {
        let i = self.chosen.len();
        if i == self.options.len() {
            self.visited += 1;
            if self.visited > MAX_DAY_PATTERNS {
                return false;
            }
            let intervals: Vec<(Time, Time)> = self
                .chosen
                .iter()
                .filter_map(|o| o.slot)
                .map(|t| {
                    let slot = self.data.time_slot(t);
                    (slot.start, slot.end_time())
                })
                .collect();
            let clusters = merge_clusters(&intervals, self.limit.max_gap);
            let violations = count_violations(&clusters, self.measure, self.bound, self.limit.duration);
            if violations > 0 {
                self.patterns.push(DayPattern {
                    chosen: self.chosen.iter().map(|o| o.lit).collect(),
                    violations,
                });
            }
            return true;
        }

        let options = self.options;
        for &option in &options[i] {
            let fits = option.slot.is_none_or(|t| {
                self.chosen
                    .iter()
                    .filter_map(|o| o.slot)
                    .all(|u| !self.data.conflicts(t, u))
            });
            if fits {
                self.chosen.push(option);
                if !self.descend() {
                    return false;
                }
                self.chosen.pop();
            } else {
                self.pruned = true;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::placement::encode_placement;
    use crate::encoding::totalizer::at_most_k;
    use crate::sat::dpll::DpllSolver;
    use crate::sat::solver::SatSolver;
    use crate::timetable::model::{FacultyId, TimetableBuilder};

    fn minutes(m: u16) -> Duration {
        Duration::from_minutes(m)
    }

    fn iv(h1: u16, m1: u16, h2: u16, m2: u16) -> (Time, Time) {
        (Time::hm(h1, m1), Time::hm(h2, m2))
    }

    #[test]
    fn test_merge_clusters() {
        let clusters = merge_clusters(
            &[iv(13, 0, 13, 50), iv(9, 0, 9, 50), iv(10, 0, 10, 50), iv(10, 30, 11, 0)],
            minutes(10),
        );
        assert_eq!(clusters, vec![iv(9, 0, 11, 0), iv(13, 0, 13, 50)]);
        assert_eq!(merge_clusters(&[iv(9, 0, 9, 50), iv(10, 0, 10, 50)], minutes(5)).len(), 2);
    }

    #[test]
    fn test_first_short_cluster_is_free() {
        let one = [iv(9, 0, 9, 50)];
        let two = [iv(9, 0, 9, 50), iv(13, 0, 13, 50)];
        let three = [iv(8, 0, 8, 50), iv(11, 0, 11, 50), iv(15, 0, 15, 50)];
        let short = |c: &[(Time, Time)]| count_violations(c, Measure::Cluster, Bound::TooShort, minutes(120));
        assert_eq!(short(&one), 0);
        assert_eq!(short(&two), 1);
        assert_eq!(short(&three), 2);
    }

    #[test]
    fn test_long_clusters_and_gaps_all_count() {
        let day = [iv(8, 0, 11, 0), iv(13, 0, 16, 30)];
        assert_eq!(count_violations(&day, Measure::Cluster, Bound::TooLong, minutes(150)), 2);
        assert_eq!(count_violations(&day, Measure::Gap, Bound::TooLong, minutes(90)), 1);
        assert_eq!(count_violations(&day, Measure::Gap, Bound::TooLong, minutes(120)), 0);
        // a single gap that is too short is the free one
        assert_eq!(count_violations(&day, Measure::Gap, Bound::TooShort, minutes(180)), 0);
    }

    /// Ada teaches one fixed Monday section per start time.
    fn monday(starts: &[u16]) -> TimetableData {
        let mut b = TimetableBuilder::new();
        let mut sections = Vec::new();
        for (i, &h) in starts.iter().enumerate() {
            let t = b
                .add_time_slot(&format!("M{h}"), "M".parse().unwrap(), Time::hm(h, 0), minutes(50))
                .unwrap();
            sections.push(b.add_section(&format!("S{i}"), [], [t]).unwrap());
        }
        b.add_faculty("Ada", sections).unwrap();
        b.build()
    }

    fn too_short(data: &TimetableData) -> (Vec<Var>, EncodingContext<'_>) {
        let mut ctx = EncodingContext::new(data);
        let mut cache = EncoderCache::new();
        encode_placement(&mut ctx);
        let limit = ClusterLimit {
            faculty: FacultyId::new(0),
            days: "MTWRF".parse().unwrap(),
            duration: minutes(120),
            max_gap: minutes(15),
        };
        let criteria = encode_cluster_limit(
            &mut ctx,
            &mut cache,
            2,
            "short",
            &limit,
            Measure::Cluster,
            Bound::TooShort,
        );
        (criteria, ctx)
    }

    fn min_k(ctx: &EncodingContext<'_>, criteria: &[Var]) -> usize {
        let lits: Vec<Lit> = criteria.iter().map(|v| v.positive()).collect();
        (0..=criteria.len())
            .find(|&k| {
                let mut ctx = ctx.clone();
                at_most_k(&mut ctx, &lits, k);
                DpllSolver::new().solve(&ctx.to_cnf(), None).unwrap().is_sat()
            })
            .unwrap()
    }

    #[test]
    fn test_one_short_cluster_costs_nothing() {
        let data = monday(&[9]);
        let (criteria, ctx) = too_short(&data);
        assert!(criteria.is_empty());
        assert_eq!(min_k(&ctx, &criteria), 0);
    }

    #[test]
    fn test_two_short_clusters_cost_one() {
        let data = monday(&[9, 13]);
        let (criteria, ctx) = too_short(&data);
        assert_eq!(criteria.len(), 1);
        assert_eq!(min_k(&ctx, &criteria), 1);
    }

    #[test]
    fn test_double_booking_does_not_merge_short_clusters() {
        // S0 is fixed at 9:00, S1 may take 9:00 too or 13:00; sharing 9:00 would leave one
        // short cluster and nothing to count
        let mut b = TimetableBuilder::new();
        let m9 = b.add_time_slot("M9", "M".parse().unwrap(), Time::hm(9, 0), minutes(50)).unwrap();
        let m13 = b.add_time_slot("M13", "M".parse().unwrap(), Time::hm(13, 0), minutes(50)).unwrap();
        let s0 = b.add_section("S0", [], [m9]).unwrap();
        let s1 = b.add_section("S1", [], [m9, m13]).unwrap();
        b.add_faculty("Ada", [s0, s1]).unwrap();
        let data = b.build();

        let (criteria, ctx) = too_short(&data);
        assert_eq!(criteria.len(), 1);
        assert_eq!(min_k(&ctx, &criteria), 1);
    }

    #[test]
    fn test_ranks_are_chained() {
        let data = monday(&[8, 11, 15]);
        let (criteria, ctx) = too_short(&data);
        assert_eq!(criteria.len(), 2);
        assert_eq!(min_k(&ctx, &criteria), 2);
    }
}
