//! Faculty days-off and evenly-spread constraints.
//!
//! Both rules are functions of one thing: on which of the checked days each of the faculty
//! member's sections meets. Each section contributes one "day group" per distinct day set
//! among its candidate slots, and every combination of groups that the faculty member could
//! actually teach (some choice of slots within the groups is pairwise conflict-free) is
//! evaluated. A combination that breaks the rule is forbidden unless the criterion is set, by a
//! clause over the "section meets on day" variables that spells out that combination.
//!
//! Only realizable combinations are visited, which keeps the clause count proportional to
//! what the faculty member can teach instead of `2^(sections × days)`. When a combination is
//! skipped because two of its slots conflict, placing the faculty member in both of those
//! slots also sets the criterion, so double-booking never sidesteps the rule.

use std::collections::BTreeMap;

use log::{trace, warn};

use crate::encoding::context::{EncoderCache, EncodingContext, LazyCriterion};
use crate::sat::literal::{Lit, Var};
use crate::timetable::clock::Days;
use crate::timetable::model::{FacultyId, SectionId, TimeSlotId, TimetableData};

/// Upper bound on the day combinations visited for one constraint.
pub const MAX_DAY_PATTERNS: usize = 200_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayRule {
    /// Exactly this many checked days without class.
    DaysOff(usize),
    /// Class counts on teaching days differ by at most one.
    EvenlySpread,
}

impl DayRule {
    /// Whether the per-day class counts (one entry per checked day) break the rule.
    #[must_use]
    pub fn is_violated(self, loads: &[usize]) -> bool {
        match self {
            Self::DaysOff(desired) => loads.iter().filter(|&&l| l == 0).count() != desired,
            Self::EvenlySpread => {
                let active = loads.iter().copied().filter(|&l| l > 0);
                match (active.clone().min(), active.max()) {
                    (Some(min), Some(max)) => max - min > 1,
                    _ => false,
                }
            }
        }
    }
}

#[derive(Debug)]
struct DayGroup {
    days: Days,
    slots: Vec<TimeSlotId>,
}

/// Encodes a days-off or evenly-spread rule for `faculty` over `window`.
pub fn encode_day_rule(
    ctx: &mut EncodingContext<'_>,
    cache: &mut EncoderCache,
    priority: u32,
    message: &str,
    faculty: FacultyId,
    window: Days,
    rule: DayRule,
) -> Vec<Var> {
    let data = ctx.data();
    let sections: Vec<SectionId> = data
        .faculty_member(faculty)
        .sections
        .iter()
        .copied()
        .filter(|&s| !data.section(s).time_slots.is_empty())
        .collect();
    if sections.is_empty() || window.is_empty() {
        return Vec::new();
    }

    let groups: Vec<Vec<DayGroup>> = sections
        .iter()
        .map(|&s| day_groups(data, s, window))
        .collect();

    let mut search = PatternSearch {
        data,
        groups: &groups,
        chosen: Vec::with_capacity(groups.len()),
        visited: 0,
        pruned: false,
        violating: Vec::new(),
        window,
        rule,
    };
    if !search.descend() {
        warn!("{message}: more than {MAX_DAY_PATTERNS} day patterns to check; constraint skipped");
        return Vec::new();
    }
    trace!(
        "{message}: {} of {} day patterns violate",
        search.violating.len(),
        search.visited
    );
    let PatternSearch { violating, pruned, .. } = search;

    // meets[i][d] for every section i and checked day d it could meet on
    let window_days: Vec<_> = window.iter().collect();
    let mut meets: Vec<Vec<Option<Var>>> = Vec::with_capacity(sections.len());
    for &s in &sections {
        let mut row = Vec::with_capacity(window_days.len());
        for &d in &window_days {
            row.push(cache.meets_day(ctx, s, d));
        }
        meets.push(row);
    }

    let mut criterion = LazyCriterion::new(priority, message);
    for pattern in violating {
        let mut clause: Vec<Lit> = Vec::new();
        for (i, &g) in pattern.iter().enumerate() {
            let days = groups[i][g].days;
            for (j, &d) in window_days.iter().enumerate() {
                if let Some(m) = meets[i][j] {
                    clause.push(if days.contains(d) { m.negative() } else { m.positive() });
                }
            }
        }
        clause.push(criterion.get(ctx).positive());
        ctx.add_clause(clause);
    }
    if pruned {
        let c = criterion.get(ctx);
        guard_double_booking(ctx, &sections, c, |_| true);
    }
    criterion.var().into_iter().collect()
}

/// Adds `¬time(a, t) ∨ ¬time(b, u) ∨ c` for every pair of distinct sections and every pair
/// of conflicting slots `t`, `u` that pass `keep`.
pub(crate) fn guard_double_booking(
    ctx: &mut EncodingContext<'_>,
    sections: &[SectionId],
    criterion: Var,
    keep: impl Fn(TimeSlotId) -> bool,
) {
    let data = ctx.data();
    for (i, &a) in sections.iter().enumerate() {
        for &b in &sections[i + 1..] {
            for &t in data.section(a).time_slots.iter().filter(|&&t| keep(t)) {
                for &u in data.section(b).time_slots.iter().filter(|&&u| keep(u)) {
                    if data.conflicts(t, u) {
                        let time_a = ctx.time_var(a, t);
                        let time_b = ctx.time_var(b, u);
                        ctx.add_clause([time_a.negative(), time_b.negative(), criterion.positive()]);
                    }
                }
            }
        }
    }
}

fn day_groups(data: &TimetableData, section: SectionId, window: Days) -> Vec<DayGroup> {
    let mut groups: BTreeMap<Days, Vec<TimeSlotId>> = BTreeMap::new();
    for &t in &data.section(section).time_slots {
        groups
            .entry(data.time_slot(t).days.intersection(window))
            .or_default()
            .push(t);
    }
    groups
        .into_iter()
        .map(|(days, slots)| DayGroup { days, slots })
        .collect()
}

struct PatternSearch<'a> {
    data: &'a TimetableData,
    groups: &'a [Vec<DayGroup>],
    /// Group index chosen for each section so far.
    chosen: Vec<usize>,
    visited: usize,
    /// Set once a combination was skipped for a slot conflict.
    pruned: bool,
    violating: Vec<Vec<usize>>,
    window: Days,
    rule: DayRule,
}

impl PatternSearch<'_> {
    /// Returns `false` once more than [`MAX_DAY_PATTERNS`] combinations have been visited.
    fn descend(&mut self) -> bool {
        let i = self.chosen.len();
        if i == self.groups.len() {
            self.visited += 1;
            if self.visited > MAX_DAY_PATTERNS {
                return false;
            }
            if self.rule.is_violated(&self.loads()) {
                self.violating.push(self.chosen.clone());
            }
            return true;
        }

        for g in 0..self.groups[i].len() {
            self.chosen.push(g);
            let mut slots = Vec::with_capacity(self.chosen.len());
            if self.realizable(&mut slots) {
                if !self.descend() {
                    return false;
                }
            } else {
                self.pruned = true;
            }
            self.chosen.pop();
        }
        true
    }

    fn loads(&self) -> Vec<usize> {
        self.window
            .iter()
            .map(|d| {
                self.chosen
                    .iter()
                    .enumerate()
                    .filter(|&(i, &g)| self.groups[i][g].days.contains(d))
                    .count()
            })
            .collect()
    }

    /// Whether the chosen groups admit pairwise conflict-free slots.
    fn realizable(&self, slots: &mut Vec<TimeSlotId>) -> bool {
        let i = slots.len();
        if i == self.chosen.len() {
            return true;
        }
        for &t in &self.groups[i][self.chosen[i]].slots {
            if slots.iter().all(|&u| !self.data.conflicts(t, u)) {
                slots.push(t);
                if self.realizable(slots) {
                    return true;
                }
                slots.pop();
            }
        }
        false
    }
}
