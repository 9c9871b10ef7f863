#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
//! Translation of a timetable into CNF.
//!
//! Every soft constraint is encoded as hard clauses that can be escaped by setting one of its
//! criterion variables; the search then bounds how many criteria may be true per priority.

use log::trace;

use crate::sat::literal::Var;
use crate::timetable::constraint::{Constraint, ConstraintKind};

pub mod clusters;
pub mod context;
pub mod faculty_days;
pub mod faculty_rooms;
pub mod placement;
pub mod section_constraints;
pub mod totalizer;

use clusters::{Bound, Measure};
use context::{EncoderCache, EncodingContext};
use faculty_days::DayRule;

/// Encodes one constraint and returns the criterion variables it registered.
pub fn encode_constraint(
    ctx: &mut EncodingContext<'_>,
    cache: &mut EncoderCache,
    constraint: &Constraint,
) -> Vec<Var> {
    let message = constraint.display(ctx.data()).to_string();
    let p = constraint.priority;

    let criteria = match &constraint.kind {
        ConstraintKind::Conflict { a, b } => section_constraints::encode_conflict(ctx, p, &message, *a, *b),
        ConstraintKind::AntiConflict { single, group } => {
            section_constraints::encode_anti_conflict(ctx, p, &message, *single, group)
        }
        ConstraintKind::RoomPreference { section, room } => {
            section_constraints::encode_room_preference(ctx, p, &message, *section, *room)
        }
        ConstraintKind::TimeSlotPreference { section, time_slot } => {
            section_constraints::encode_time_slot_preference(ctx, p, &message, *section, *time_slot)
        }
        ConstraintKind::TimePatternMatch { sections } => {
            section_constraints::encode_time_pattern_match(ctx, p, &message, sections)
        }
        ConstraintKind::FacultyDaysOff {
            faculty,
            days,
            desired_days_off,
        } => faculty_days::encode_day_rule(
            ctx,
            cache,
            p,
            &message,
            *faculty,
            *days,
            DayRule::DaysOff(*desired_days_off),
        ),
        ConstraintKind::FacultyEvenlySpread { faculty, days } => {
            faculty_days::encode_day_rule(ctx, cache, p, &message, *faculty, *days, DayRule::EvenlySpread)
        }
        ConstraintKind::FacultyNoRoomSwitch { faculty, days, max_gap } => {
            faculty_rooms::encode_no_room_switch(ctx, cache, p, &message, *faculty, *days, *max_gap)
        }
        ConstraintKind::FacultyTooManyRooms {
            faculty,
            desired_max_rooms,
        } => faculty_rooms::encode_too_many_rooms(ctx, cache, p, &message, *faculty, *desired_max_rooms),
        ConstraintKind::FacultyGapTooShort(limit) => {
            clusters::encode_cluster_limit(ctx, cache, p, &message, limit, Measure::Gap, Bound::TooShort)
        }
        ConstraintKind::FacultyGapTooLong(limit) => {
            clusters::encode_cluster_limit(ctx, cache, p, &message, limit, Measure::Gap, Bound::TooLong)
        }
        ConstraintKind::FacultyClusterTooShort(limit) => {
            clusters::encode_cluster_limit(ctx, cache, p, &message, limit, Measure::Cluster, Bound::TooShort)
        }
        ConstraintKind::FacultyClusterTooLong(limit) => {
            clusters::encode_cluster_limit(ctx, cache, p, &message, limit, Measure::Cluster, Bound::TooLong)
        }
    };

    trace!("{}: {} criteria", constraint.label(ctx.data()), criteria.len());
    criteria
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timetable::clock::{Duration, Time};
    use crate::timetable::model::TimetableBuilder;

    #[test]
    fn test_encode_constraint_uses_display_message() {
        let mut b = TimetableBuilder::new();
        let r = b.add_room("R1").unwrap();
        let t = b
            .add_time_slot("MWF0900", "MWF".parse().unwrap(), Time::hm(9, 0), Duration::from_minutes(50))
            .unwrap();
        let a = b.add_section("A", [r], [t]).unwrap();
        let c = b.add_section("B", [r], [t]).unwrap();
        b.add_constraint(2, ConstraintKind::Conflict { a, b: c });
        let data = b.build();

        let mut ctx = EncodingContext::new(&data);
        let mut cache = EncoderCache::new();
        let criteria = encode_constraint(&mut ctx, &mut cache, &data.constraints[0]);
        assert_eq!(criteria.len(), 1);
        let problem = ctx.problem(criteria[0]).unwrap();
        assert_eq!(problem.priority, 2);
        assert_eq!(problem.message, "A and B conflict");
    }

    #[test]
    fn test_preference_on_other_room_is_free() {
        let mut b = TimetableBuilder::new();
        let r1 = b.add_room("R1").unwrap();
        let r2 = b.add_room("R2").unwrap();
        let t = b
            .add_time_slot("M0800", "M".parse().unwrap(), Time::hm(8, 0), Duration::from_minutes(50))
            .unwrap();
        let a = b.add_section("A", [r1], [t]).unwrap();
        b.add_constraint(1, ConstraintKind::RoomPreference { section: a, room: r2 });
        let data = b.build();

        let mut ctx = EncodingContext::new(&data);
        let mut cache = EncoderCache::new();
        assert!(encode_constraint(&mut ctx, &mut cache, &data.constraints[0]).is_empty());
    }
}
