//! The hard structure every instance starts from: each schedulable section gets exactly one
//! time slot and, if it has candidate rooms, exactly one room; and no room holds two
//! sections at conflicting times.

use log::debug;

use crate::encoding::context::EncodingContext;
use crate::sat::literal::Var;

/// Adds the exactly-one clauses for every section's time slot and room.
pub fn encode_placement(ctx: &mut EncodingContext<'_>) {
    let data = ctx.data();
    for s in data.schedulable_sections() {
        let section = data.section(s);
        let times: Vec<Var> = section.time_slots.iter().map(|&t| ctx.time_var(s, t)).collect();
        exactly_one(ctx, &times);

        if !section.rooms.is_empty() {
            let rooms: Vec<Var> = section.rooms.iter().map(|&r| ctx.room_var(s, r)).collect();
            exactly_one(ctx, &rooms);
        }
    }
}

/// For every room, forbids two sections that both list it from using it at conflicting
/// times: `¬(timeA ∧ roomA ∧ timeB ∧ roomB)`.
pub fn encode_room_conflicts(ctx: &mut EncodingContext<'_>) {
    let data = ctx.data();
    let before = ctx.num_clauses();

    for room in data.room_ids() {
        let sections: Vec<_> = data
            .schedulable_sections()
            .filter(|&s| data.section(s).rooms.binary_search(&room).is_ok())
            .collect();

        for (i, &a) in sections.iter().enumerate() {
            let room_a = ctx.room_var(a, room);
            for &b in &sections[i + 1..] {
                let room_b = ctx.room_var(b, room);
                for &ta in &data.section(a).time_slots {
                    for &tb in &data.section(b).time_slots {
                        if data.conflicts(ta, tb) {
                            let time_a = ctx.time_var(a, ta);
                            let time_b = ctx.time_var(b, tb);
                            ctx.add_clause([
                                time_a.negative(),
                                room_a.negative(),
                                time_b.negative(),
                                room_b.negative(),
                            ]);
                        }
                    }
                }
            }
        }
    }

    debug!("room conflicts: {} clauses", ctx.num_clauses() - before);
}

fn exactly_one(ctx: &mut EncodingContext<'_>, vars: &[Var]) {
    ctx.add_clause(vars.iter().map(|v| v.positive()));
    for (i, a) in vars.iter().enumerate() {
        for b in &vars[i + 1..] {
            ctx.add_clause([a.negative(), b.negative()]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sat::dpll::DpllSolver;
    use crate::sat::solver::{SatSolver, SolveOutcome};
    use crate::timetable::clock::{Duration, Time};
    use crate::timetable::model::{TimetableBuilder, TimetableData};

    /// Two sections that can only use R1, at the given candidate slots.
    fn two_sections(second_slot_overlaps: bool) -> TimetableData {
        let mut b = TimetableBuilder::new();
        let r1 = b.add_room("R1").unwrap();
        let t1 = b
            .add_time_slot("T1", "MWF".parse().unwrap(), Time::hm(9, 0), Duration::from_minutes(50))
            .unwrap();
        let start = if second_slot_overlaps { Time::hm(9, 30) } else { Time::hm(10, 0) };
        let t2 = b
            .add_time_slot("T2", "MWF".parse().unwrap(), start, Duration::from_minutes(50))
            .unwrap();
        b.add_section("A", [r1], [t1]).unwrap();
        b.add_section("B", [r1], [t2]).unwrap();
        b.build()
    }

    fn solve(data: &TimetableData) -> SolveOutcome {
        let mut ctx = EncodingContext::new(data);
        encode_placement(&mut ctx);
        encode_room_conflicts(&mut ctx);
        DpllSolver::new().solve(&ctx.to_cnf(), None).unwrap()
    }

    #[test]
    fn test_overlapping_sections_in_one_room_are_unsat() {
        assert_eq!(solve(&two_sections(true)), SolveOutcome::Unsatisfiable);
    }

    #[test]
    fn test_disjoint_sections_share_a_room() {
        assert!(solve(&two_sections(false)).is_sat());
    }

    #[test]
    fn test_exactly_one_slot_and_room() {
        let mut b = TimetableBuilder::new();
        let rooms: Vec<_> = ["R1", "R2", "R3"].iter().map(|r| b.add_room(r).unwrap()).collect();
        let slots: Vec<_> = (0..4u16)
            .map(|i| {
                b.add_time_slot(
                    &format!("T{i}"),
                    "TR".parse().unwrap(),
                    Time::hm(8 + 2 * i, 0),
                    Duration::from_minutes(75),
                )
                .unwrap()
            })
            .collect();
        let s = b.add_section("A", rooms.clone(), slots.clone()).unwrap();
        let data = b.build();

        let mut ctx = EncodingContext::new(&data);
        encode_placement(&mut ctx);
        let SolveOutcome::Satisfiable(model) = DpllSolver::new().solve(&ctx.to_cnf(), None).unwrap()
        else {
            panic!("expected a model");
        };
        let chosen_slots = slots.iter().filter(|&&t| model.value(ctx.time_var(s, t))).count();
        let chosen_rooms = rooms.iter().filter(|&&r| model.value(ctx.room_var(s, r))).count();
        assert_eq!(chosen_slots, 1);
        assert_eq!(chosen_rooms, 1);
    }

    #[test]
    fn test_roomless_section_gets_no_room_clauses() {
        let mut b = TimetableBuilder::new();
        let t = b
            .add_time_slot("T", "M".parse().unwrap(), Time::hm(8, 0), Duration::from_minutes(50))
            .unwrap();
        b.add_section("Online", [], [t]).unwrap();
        let data = b.build();
        let mut ctx = EncodingContext::new(&data);
        encode_placement(&mut ctx);
        // just the unit clause selecting the only slot
        assert_eq!(ctx.num_clauses(), 1);
    }
}
