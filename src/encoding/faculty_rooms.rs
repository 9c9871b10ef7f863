//! Faculty room constraints: staying in one room between back-to-back classes, and not
//! spreading classes over too many rooms.

use itertools::Itertools;
use log::{trace, warn};

use crate::encoding::context::{EncoderCache, EncodingContext, LazyCriterion};
use crate::encoding::totalizer::Totalizer;
use crate::sat::literal::{Lit, Var};
use crate::timetable::clock::{Days, Duration};
use crate::timetable::model::{FacultyId, RoomId, SectionId, TimeSlotId, TimetableData};

/// Above this many candidate rooms the minimum room count is approximated greedily.
pub const EXACT_ROOM_SEARCH_LIMIT: usize = 16;

fn sections_with_rooms(data: &TimetableData, faculty: FacultyId) -> Vec<SectionId> {
    data.faculty_member(faculty)
        .sections
        .iter()
        .copied()
        .filter(|&s| {
            let section = data.section(s);
            !section.rooms.is_empty() && !section.time_slots.is_empty()
        })
        .collect()
}

/// For each checked day, one criterion that is needed whenever two back-to-back classes
/// (the second starting at most `max_gap` after the first ends) are in different rooms.
pub fn encode_no_room_switch(
    ctx: &mut EncodingContext<'_>,
    cache: &mut EncoderCache,
    priority: u32,
    message: &str,
    faculty: FacultyId,
    days: Days,
    max_gap: Duration,
) -> Vec<Var> {
    let data = ctx.data();
    let occupancy: Vec<(RoomId, TimeSlotId)> = sections_with_rooms(data, faculty)
        .into_iter()
        .flat_map(|s| {
            let section = data.section(s);
            section
                .rooms
                .iter()
                .cartesian_product(section.time_slots.iter())
                .map(|(&r, &t)| (r, t))
        })
        .sorted_unstable()
        .dedup()
        .collect();

    let mut criteria = Vec::new();
    for day in days.iter() {
        let today: Vec<_> = occupancy
            .iter()
            .copied()
            .filter(|&(_, t)| data.time_slot(t).days.contains(day))
            .collect();

        let mut criterion = LazyCriterion::new(priority, format!("{message} [{day}]"));
        for &(r1, t1) in &today {
            let first_end = data.time_slot(t1).end_time();
            for &(r2, t2) in &today {
                let gap = data.time_slot(t2).start.minutes_since(first_end);
                if r1 == r2 || gap < 0 || gap > i32::from(max_gap.minutes()) {
                    continue;
                }
                let (Some(o1), Some(o2)) = (
                    cache.occupies(ctx, faculty, r1, t1),
                    cache.occupies(ctx, faculty, r2, t2),
                ) else {
                    continue;
                };
                let c = criterion.get(ctx);
                ctx.add_clause([o1.negative(), o2.negative(), c.positive()]);
            }
        }
        criteria.extend(criterion.var());
    }
    criteria
}

/// Criteria for every room beyond `max(desired_max_rooms, minimum needed)`: the `i`-th one is
/// needed once the faculty member uses more than `limit + i` rooms.
pub fn encode_too_many_rooms(
    ctx: &mut EncodingContext<'_>,
    cache: &mut EncoderCache,
    priority: u32,
    message: &str,
    faculty: FacultyId,
    desired_max_rooms: usize,
) -> Vec<Var> {
    let data = ctx.data();
    let sections = sections_with_rooms(data, faculty);
    let rooms: Vec<RoomId> = sections
        .iter()
        .flat_map(|&s| data.section(s).rooms.iter().copied())
        .sorted_unstable()
        .dedup()
        .collect();
    if rooms.len() <= desired_max_rooms {
        return Vec::new();
    }

    let candidate_sets: Vec<&[RoomId]> = sections.iter().map(|&s| data.section(s).rooms.as_slice()).collect();
    let minimum = minimum_rooms(&rooms, &candidate_sets);
    if minimum > desired_max_rooms {
        warn!(
            "{message}: needs at least {minimum} rooms, more than the {desired_max_rooms} requested; using {minimum}"
        );
    }
    let limit = desired_max_rooms.max(minimum);
    if limit >= rooms.len() {
        return Vec::new();
    }

    let used: Vec<Lit> = rooms
        .iter()
        .filter_map(|&r| cache.uses_room(ctx, faculty, r))
        .map(Var::positive)
        .collect();
    let totalizer = Totalizer::build(ctx, &used);

    let mut criteria = Vec::new();
    for (i, &at_least) in totalizer.outputs().iter().enumerate().skip(limit) {
        let c = ctx.new_criterion(priority, format!("{message} [more than {i} rooms]"));
        ctx.add_clause([at_least.negated(), c.positive()]);
        criteria.push(c);
    }
    trace!("{message}: {} rooms, limit {limit}", rooms.len());
    criteria
}

/// The fewest rooms such that every section has at least one of its candidates among them.
/// Exact up to [`EXACT_ROOM_SEARCH_LIMIT`] rooms, greedy beyond.
#[must_use]
pub fn minimum_rooms(rooms: &[RoomId], candidate_sets: &[&[RoomId]]) -> usize {
    let covers = |chosen: &[RoomId]| {
        candidate_sets
            .iter()
            .all(|set| set.iter().any(|r| chosen.contains(r)))
    };

    if rooms.len() <= EXACT_ROOM_SEARCH_LIMIT {
        return (0..=rooms.len())
            .find(|&size| {
                rooms
                    .iter()
                    .copied()
                    .combinations(size)
                    .any(|chosen| covers(&chosen))
            })
            .unwrap_or(rooms.len());
    }

    warn!(
        "{} candidate rooms; approximating the minimum room count greedily",
        rooms.len()
    );
    let mut uncovered: Vec<&[RoomId]> = candidate_sets.to_vec();
    let mut count = 0;
    while !uncovered.is_empty() {
        let Some(best) = rooms
            .iter()
            .max_by_key(|r| uncovered.iter().filter(|set| set.contains(r)).count())
        else {
            break;
        };
        uncovered.retain(|set| !set.contains(best));
        count += 1;
    }
    count
}
