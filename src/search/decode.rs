use std::collections::{BTreeMap, BTreeSet};

use crate::encoding::context::{EncodingContext, PlacementVar};
use crate::sat::assignment::Model;
use crate::search::schedule::{Assignment, Placement, Violation};
use crate::timetable::model::{RoomId, SectionId, TimeSlotId};

/// Reads the placement and the set criteria out of a model of `ctx`'s instance.
///
/// # Panics
///
/// If the model contradicts the encoding: a variable the instance never allocated is true, a
/// section has two slots or rooms, or a schedulable section has no slot.
#[must_use]
pub fn decode(ctx: &EncodingContext<'_>, model: &Model) -> (Placement, BTreeSet<Violation>) {
    let data = ctx.data();
    let lookup = ctx.placement_vars();
    let mut slots: BTreeMap<SectionId, TimeSlotId> = BTreeMap::new();
    let mut rooms: BTreeMap<SectionId, RoomId> = BTreeMap::new();

    for var in model.true_vars() {
        assert!(
            var.id() <= ctx.num_vars(),
            "model sets variable {var} but only {} were encoded",
            ctx.num_vars()
        );
        if !ctx.is_placement_var(var) {
            continue;
        }
        match lookup.get(&var) {
            Some(&PlacementVar::Time(s, t)) => {
                let previous = slots.insert(s, t);
                assert!(previous.is_none(), "{} has two time slots", data.section(s).name);
            }
            Some(&PlacementVar::Room(s, r)) => {
                let previous = rooms.insert(s, r);
                assert!(previous.is_none(), "{} has two rooms", data.section(s).name);
            }
            None => panic!("variable {var} is not a placement variable"),
        }
    }

    let mut placement = Placement::new();
    for s in data.schedulable_sections() {
        let section = data.section(s);
        let Some(&t) = slots.get(&s) else {
            panic!("{} has no time slot", section.name);
        };
        placement.insert(
            section.name.clone(),
            Assignment {
                room: rooms.get(&s).map(|&r| data.room(r).name.clone()),
                time_slot: data.time_slot(t).name.clone(),
            },
        );
    }

    let violations = ctx
        .problems()
        .filter(|&(var, _)| model.value(var))
        .map(|(_, problem)| Violation {
            priority: problem.priority,
            message: problem.message.clone(),
        })
        .collect();

    (placement, violations)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::placement::encode_placement;
    use crate::sat::literal::Var;
    use crate::timetable::clock::{Duration, Time};
    use crate::timetable::model::{TimetableBuilder, TimetableData};

    fn data() -> TimetableData {
        let mut b = TimetableBuilder::new();
        let r = b.add_room("R1").unwrap();
        let t1 = b
            .add_time_slot("T1", "MWF".parse().unwrap(), Time::hm(9, 0), Duration::from_minutes(50))
            .unwrap();
        let t2 = b
            .add_time_slot("T2", "MWF".parse().unwrap(), Time::hm(10, 0), Duration::from_minutes(50))
            .unwrap();
        b.add_section("A", [r], [t1, t2]).unwrap();
        b.add_section("Online", [], [t2]).unwrap();
        b.add_section("Unplaced", [r], []).unwrap();
        b.build()
    }

    fn model(vars: &[Var]) -> Model {
        Model::from_literals(vars.iter().map(|v| v.positive().to_i32()))
    }

    #[test]
    fn test_decode_placement_and_violations() {
        let data = data();
        let mut ctx = EncodingContext::new(&data);
        encode_placement(&mut ctx);
        let a = SectionId::new(0);
        let c = ctx.new_criterion(3, "A placed in R1");
        let in_r1 = ctx.room_var(a, RoomId::new(0));
        ctx.add_clause([in_r1.negative(), c.positive()]);

        let online = SectionId::new(1);
        let vars = [
            ctx.time_var(a, TimeSlotId::new(1)),
            ctx.room_var(a, RoomId::new(0)),
            ctx.time_var(online, TimeSlotId::new(1)),
            c,
        ];
        let (placement, violations) = decode(&ctx, &model(&vars));

        assert_eq!(placement.len(), 2);
        assert_eq!(
            placement["A"],
            Assignment {
                room: Some("R1".to_string()),
                time_slot: "T2".to_string()
            }
        );
        assert_eq!(placement["Online"].room, None);
        assert!(!placement.contains_key("Unplaced"));
        assert_eq!(violations.len(), 1);
        assert_eq!(violations.iter().next().unwrap().priority, 3);
    }

    #[test]
    #[should_panic(expected = "has two time slots")]
    fn test_decode_rejects_double_placement() {
        let data = data();
        let ctx = EncodingContext::new(&data);
        let a = SectionId::new(0);
        let vars = [ctx.time_var(a, TimeSlotId::new(0)), ctx.time_var(a, TimeSlotId::new(1))];
        let _ = decode(&ctx, &model(&vars));
    }

    #[test]
    #[should_panic(expected = "only")]
    fn test_decode_rejects_unknown_variable() {
        let data = data();
        let ctx = EncodingContext::new(&data);
        let _ = decode(&ctx, &Model::from_literals([i32::try_from(ctx.num_vars()).unwrap() + 5]));
    }
}
