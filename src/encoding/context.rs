//! The variable and clause factory for one SAT instance.
//!
//! An [`EncodingContext`] is created fresh for every priority level. Creating it allocates the
//! placement variables: one per (section, candidate time slot) and one per (section,
//! candidate room), numbered from 1 in section order. Everything after that (auxiliary
//! variables, criterion variables, totalizer nodes) is allocated on demand by the encoders.
//!
//! Criterion variables are registered together with the priority and message they stand for,
//! so that a model can be translated back into human-readable violations.

use std::collections::BTreeMap;

use bit_vec::BitVec;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::sat::clause::Clause;
use crate::sat::cnf::Cnf;
use crate::sat::literal::{Lit, Var};
use crate::timetable::clock::Day;
use crate::timetable::model::{FacultyId, RoomId, SectionId, TimeSlotId, TimetableData};

/// What a criterion variable licenses.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Problem {
    pub priority: u32,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct EncodingContext<'a> {
    data: &'a TimetableData,
    next_var: u32,
    clauses: Vec<Clause>,
    seen: FxHashSet<Clause>,
    section_time_vars: FxHashMap<(SectionId, TimeSlotId), Var>,
    section_room_vars: FxHashMap<(SectionId, RoomId), Var>,
    /// Largest placement variable; everything above is auxiliary.
    last_placement_var: u32,
    problems: BTreeMap<Var, Problem>,
}

impl<'a> EncodingContext<'a> {
    #[must_use]
    pub fn new(data: &'a TimetableData) -> Self {
        let mut ctx = Self {
            data,
            next_var: 1,
            clauses: Vec::new(),
            seen: FxHashSet::default(),
            section_time_vars: FxHashMap::default(),
            section_room_vars: FxHashMap::default(),
            last_placement_var: 0,
            problems: BTreeMap::new(),
        };

        for s in data.schedulable_sections() {
            let section = data.section(s);
            for &t in &section.time_slots {
                let v = ctx.new_var();
                ctx.section_time_vars.insert((s, t), v);
            }
            for &r in &section.rooms {
                let v = ctx.new_var();
                ctx.section_room_vars.insert((s, r), v);
            }
        }
        ctx.last_placement_var = ctx.next_var - 1;
        ctx
    }

    #[must_use]
    pub const fn data(&self) -> &'a TimetableData {
        self.data
    }

    /// A fresh variable; identifiers are never reused.
    pub fn new_var(&mut self) -> Var {
        let v = Var::new(self.next_var);
        self.next_var += 1;
        v
    }

    /// Number of variables allocated so far.
    #[must_use]
    pub const fn num_vars(&self) -> u32 {
        self.next_var - 1
    }

    #[must_use]
    pub const fn is_placement_var(&self, var: Var) -> bool {
        var.id() <= self.last_placement_var
    }

    /// Adds a clause. Duplicates and tautologies are dropped.
    ///
    /// # Panics
    ///
    /// If the clause is empty or mentions a variable that was never allocated.
    pub fn add_clause(&mut self, literals: impl IntoIterator<Item = Lit>) {
        let clause = Clause::new(literals);
        assert!(!clause.is_empty(), "encoder produced an empty clause");
        assert!(
            clause.iter().all(|l| l.var().id() < self.next_var),
            "clause {clause:?} uses an unallocated variable"
        );
        if clause.is_tautology() || self.seen.contains(&clause) {
            return;
        }
        self.seen.insert(clause.clone());
        self.clauses.push(clause);
    }

    #[must_use]
    pub fn num_clauses(&self) -> usize {
        self.clauses.len()
    }

    /// Allocates a criterion variable: when true, it licenses one violation of `message` at
    /// `priority`.
    pub fn new_criterion(&mut self, priority: u32, message: impl Into<String>) -> Var {
        let v = self.new_var();
        self.problems.insert(
            v,
            Problem {
                priority,
                message: message.into(),
            },
        );
        v
    }

    #[must_use]
    pub fn problem(&self, var: Var) -> Option<&Problem> {
        self.problems.get(&var)
    }

    pub fn problems(&self) -> impl Iterator<Item = (Var, &Problem)> {
        self.problems.iter().map(|(&v, p)| (v, p))
    }

    /// Criterion variables registered at exactly `priority`, in allocation order.
    #[must_use]
    pub fn criteria_at(&self, priority: u32) -> Vec<Var> {
        self.problems
            .iter()
            .filter(|(_, p)| p.priority == priority)
            .map(|(&v, _)| v)
            .collect()
    }

    /// # Panics
    ///
    /// If `section` is not schedulable or `time_slot` is not one of its candidates.
    #[must_use]
    pub fn time_var(&self, section: SectionId, time_slot: TimeSlotId) -> Var {
        self.section_time_vars[&(section, time_slot)]
    }

    #[must_use]
    pub fn try_time_var(&self, section: SectionId, time_slot: TimeSlotId) -> Option<Var> {
        self.section_time_vars.get(&(section, time_slot)).copied()
    }

    #[must_use]
    pub fn try_room_var(&self, section: SectionId, room: RoomId) -> Option<Var> {
        self.section_room_vars.get(&(section, room)).copied()
    }

    /// # Panics
    ///
    /// If `section` is not schedulable or `room` is not one of its candidates.
    #[must_use]
    pub fn room_var(&self, section: SectionId, room: RoomId) -> Var {
        self.section_room_vars[&(section, room)]
    }

    /// Reverse lookup of every placement variable.
    #[must_use]
    pub fn placement_vars(&self) -> FxHashMap<Var, PlacementVar> {
        let times = self
            .section_time_vars
            .iter()
            .map(|(&(s, t), &v)| (v, PlacementVar::Time(s, t)));
        let rooms = self
            .section_room_vars
            .iter()
            .map(|(&(s, r), &v)| (v, PlacementVar::Room(s, r)));
        times.chain(rooms).collect()
    }

    /// Fails fast on a criterion variable that no clause mentions, which would let the solver
    /// set it for free.
    ///
    /// # Panics
    ///
    /// On the first such variable.
    pub fn assert_criteria_used(&self) {
        let mut used = BitVec::from_elem(self.next_var as usize, false);
        for lit in self.clauses.iter().flat_map(Clause::iter) {
            used.set(lit.var().index(), true);
        }
        for (var, problem) in &self.problems {
            assert!(
                used.get(var.index()).unwrap_or(false),
                "criterion {var} ({}) appears in no clause",
                problem.message
            );
        }
    }

    /// The instance built so far.
    #[must_use]
    pub fn to_cnf(&self) -> Cnf {
        Cnf::new(self.num_vars(), self.clauses.clone())
    }
}

/// What a placement variable means.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlacementVar {
    Time(SectionId, TimeSlotId),
    Room(SectionId, RoomId),
}

/// Auxiliary variables shared between constraint encoders within one instance.
///
/// Several constraints about the same faculty member need the same derived facts ("section
/// meets on Monday", "Ada teaches in room 105 at 9:00"); the cache makes sure each is defined
/// once per instance. It must not outlive the [`EncodingContext`] it was filled from.
#[derive(Debug, Clone, Default)]
pub struct EncoderCache {
    meets_day: FxHashMap<(SectionId, Day), Option<Var>>,
    occupies: FxHashMap<(FacultyId, RoomId, TimeSlotId), Var>,
    uses_room: FxHashMap<(FacultyId, RoomId), Var>,
}

impl EncoderCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A variable equivalent to "`section` meets on `day`", or `None` when none of its
    /// candidate slots meets that day.
    pub fn meets_day(&mut self, ctx: &mut EncodingContext<'_>, section: SectionId, day: Day) -> Option<Var> {
        if let Some(&v) = self.meets_day.get(&(section, day)) {
            return v;
        }

        let data = ctx.data();
        let slots: Vec<Var> = data
            .section(section)
            .time_slots
            .iter()
            .filter(|&&t| data.time_slot(t).days.contains(day))
            .filter_map(|&t| ctx.try_time_var(section, t))
            .collect();

        let var = if slots.is_empty() {
            None
        } else {
            let m = ctx.new_var();
            // m <-> OR(slots)
            ctx.add_clause(std::iter::once(m.negative()).chain(slots.iter().map(|v| v.positive())));
            for x in &slots {
                ctx.add_clause([x.negative(), m.positive()]);
            }
            Some(m)
        };
        self.meets_day.insert((section, day), var);
        var
    }

    /// A variable implied by "some section of `faculty` is in `room` at `time_slot`".
    pub fn occupies(
        &mut self,
        ctx: &mut EncodingContext<'_>,
        faculty: FacultyId,
        room: RoomId,
        time_slot: TimeSlotId,
    ) -> Option<Var> {
        if let Some(&v) = self.occupies.get(&(faculty, room, time_slot)) {
            return Some(v);
        }

        let data = ctx.data();
        let pairs: Vec<(Var, Var)> = data
            .faculty_member(faculty)
            .sections
            .iter()
            .filter_map(|&s| Some((ctx.try_time_var(s, time_slot)?, ctx.try_room_var(s, room)?)))
            .collect();
        if pairs.is_empty() {
            return None;
        }

        let o = ctx.new_var();
        for (x, y) in pairs {
            ctx.add_clause([x.negative(), y.negative(), o.positive()]);
        }
        self.occupies.insert((faculty, room, time_slot), o);
        Some(o)
    }

    /// A variable implied by "some section of `faculty` is placed in `room`".
    pub fn uses_room(&mut self, ctx: &mut EncodingContext<'_>, faculty: FacultyId, room: RoomId) -> Option<Var> {
        if let Some(&v) = self.uses_room.get(&(faculty, room)) {
            return Some(v);
        }

        let data = ctx.data();
        let rooms: Vec<Var> = data
            .faculty_member(faculty)
            .sections
            .iter()
            .filter_map(|&s| ctx.try_room_var(s, room))
            .collect();
        if rooms.is_empty() {
            return None;
        }

        let u = ctx.new_var();
        for y in rooms {
            ctx.add_clause([y.negative(), u.positive()]);
        }
        self.uses_room.insert((faculty, room), u);
        Some(u)
    }
}

/// A criterion variable that is only allocated once something needs it, so constraints that
/// turn out to be trivially satisfied register nothing.
#[derive(Debug, Clone)]
pub struct LazyCriterion {
    priority: u32,
    message: String,
    var: Option<Var>,
}

impl LazyCriterion {
    pub fn new(priority: u32, message: impl Into<String>) -> Self {
        Self {
            priority,
            message: message.into(),
            var: None,
        }
    }

    pub fn get(&mut self, ctx: &mut EncodingContext<'_>) -> Var {
        if let Some(v) = self.var {
            return v;
        }
        let v = ctx.new_criterion(self.priority, self.message.clone());
        self.var = Some(v);
        v
    }

    #[must_use]
    pub const fn var(&self) -> Option<Var> {
        self.var
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timetable::clock::{Duration, Time};
    use crate::timetable::model::TimetableBuilder;

    fn data() -> TimetableData {
        let mut b = TimetableBuilder::new();
        let r1 = b.add_room("R1").unwrap();
        let r2 = b.add_room("R2").unwrap();
        let t1 = b
            .add_time_slot("T1", "MWF".parse().unwrap(), Time::hm(9, 0), Duration::from_minutes(50))
            .unwrap();
        let t2 = b
            .add_time_slot("T2", "TR".parse().unwrap(), Time::hm(9, 0), Duration::from_minutes(75))
            .unwrap();
        let a = b.add_section("A", [r1, r2], [t1, t2]).unwrap();
        b.add_section("B", [], [t2]).unwrap();
        b.add_faculty("Ada", [a]).unwrap();
        b.build()
    }

    #[test]
    fn test_placement_vars_come_first() {
        let data = data();
        let ctx = EncodingContext::new(&data);
        // A: two slots, two rooms; B: one slot
        assert_eq!(ctx.num_vars(), 5);
        assert_eq!(ctx.placement_vars().len(), 5);
        assert!(ctx.is_placement_var(Var::new(5)));
        assert!(ctx.try_room_var(SectionId::new(1), RoomId::new(0)).is_none());
    }

    #[test]
    fn test_duplicate_and_tautological_clauses_collapse() {
        let data = data();
        let mut ctx = EncodingContext::new(&data);
        let a = ctx.new_var();
        let b = ctx.new_var();
        ctx.add_clause([a.positive(), b.negative()]);
        ctx.add_clause([b.negative(), a.positive()]);
        ctx.add_clause([a.positive(), a.negative()]);
        assert_eq!(ctx.num_clauses(), 1);
    }

    #[test]
    #[should_panic(expected = "appears in no clause")]
    fn test_unused_criterion_panics() {
        let data = data();
        let mut ctx = EncodingContext::new(&data);
        let _ = ctx.new_criterion(1, "dangling");
        ctx.assert_criteria_used();
    }

    #[test]
    fn test_criteria_are_grouped_by_priority() {
        let data = data();
        let mut ctx = EncodingContext::new(&data);
        let c1 = ctx.new_criterion(1, "one");
        let c2 = ctx.new_criterion(2, "two");
        let c3 = ctx.new_criterion(1, "three");
        assert_eq!(ctx.criteria_at(1), vec![c1, c3]);
        assert_eq!(ctx.criteria_at(2), vec![c2]);
        assert_eq!(ctx.problem(c2).unwrap().message, "two");
    }

    #[test]
    fn test_cache_defines_each_fact_once() {
        let data = data();
        let mut ctx = EncodingContext::new(&data);
        let mut cache = EncoderCache::new();
        let a = SectionId::new(0);
        let monday = Day::new(0);
        let sunday = Day::new(6);

        let m1 = cache.meets_day(&mut ctx, a, monday);
        let m2 = cache.meets_day(&mut ctx, a, monday);
        assert!(m1.is_some());
        assert_eq!(m1, m2);
        assert_eq!(cache.meets_day(&mut ctx, a, sunday), None);

        let ada = FacultyId::new(0);
        let u = cache.uses_room(&mut ctx, ada, RoomId::new(1));
        assert_eq!(u, cache.uses_room(&mut ctx, ada, RoomId::new(1)));
        assert!(cache.occupies(&mut ctx, ada, RoomId::new(0), TimeSlotId::new(1)).is_some());
    }

    #[test]
    fn test_lazy_criterion_allocates_once() {
        let data = data();
        let mut ctx = EncodingContext::new(&data);
        let mut c = LazyCriterion::new(3, "late");
        assert_eq!(c.var(), None);
        let v = c.get(&mut ctx);
        assert_eq!(c.get(&mut ctx), v);
        assert_eq!(ctx.criteria_at(3), vec![v]);
    }
}
