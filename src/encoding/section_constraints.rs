//! Encoders for constraints stated directly in terms of sections: conflicts, anti-conflicts,
//! room and time slot preferences, and time pattern matching.
//!
//! Each encoder returns the criterion variables it registered; an empty result means the
//! constraint can never be violated by any placement.

use std::collections::BTreeMap;

use crate::encoding::context::{EncodingContext, LazyCriterion};
use crate::sat::literal::{Lit, Var};
use crate::timetable::model::{RoomId, SectionId, TimeSlotId};

/// `(¬timeA ∨ ¬timeB ∨ c)` for every conflicting pair of candidate slots. A section never
/// conflicts with itself.
pub fn encode_conflict(
    ctx: &mut EncodingContext<'_>,
    priority: u32,
    message: &str,
    a: SectionId,
    b: SectionId,
) -> Vec<Var> {
    if a == b {
        return Vec::new();
    }
    let data = ctx.data();
    let mut criterion = LazyCriterion::new(priority, message);

    for &ta in &data.section(a).time_slots {
        for &tb in &data.section(b).time_slots {
            if !data.conflicts(ta, tb) {
                continue;
            }
            let (Some(xa), Some(xb)) = (ctx.try_time_var(a, ta), ctx.try_time_var(b, tb)) else {
                continue;
            };
            let c = criterion.get(ctx);
            ctx.add_clause([xa.negative(), xb.negative(), c.positive()]);
        }
    }

    criterion.var().into_iter().collect()
}

/// For every slot `single` may use: some member of `group` uses the same slot, or `c`.
pub fn encode_anti_conflict(
    ctx: &mut EncodingContext<'_>,
    priority: u32,
    message: &str,
    single: SectionId,
    group: &[SectionId],
) -> Vec<Var> {
    let data = ctx.data();
    let mut criterion = LazyCriterion::new(priority, message);

    for &t in &data.section(single).time_slots {
        let Some(x) = ctx.try_time_var(single, t) else {
            continue;
        };
        let partners: Vec<Lit> = group
            .iter()
            .filter(|&&g| g != single)
            .filter_map(|&g| ctx.try_time_var(g, t))
            .map(Var::positive)
            .collect();

        let c = criterion.get(ctx);
        ctx.add_clause(
            std::iter::once(x.negative())
                .chain(partners)
                .chain(std::iter::once(c.positive())),
        );
    }

    criterion.var().into_iter().collect()
}

/// `(¬room ∨ c)`; nothing if `room` is not a candidate of `section`.
pub fn encode_room_preference(
    ctx: &mut EncodingContext<'_>,
    priority: u32,
    message: &str,
    section: SectionId,
    room: RoomId,
) -> Vec<Var> {
    let Some(y) = ctx.try_room_var(section, room) else {
        return Vec::new();
    };
    let c = ctx.new_criterion(priority, message);
    ctx.add_clause([y.negative(), c.positive()]);
    vec![c]
}

/// `(¬time ∨ c)`; nothing if `time_slot` is not a candidate of `section`.
pub fn encode_time_slot_preference(
    ctx: &mut EncodingContext<'_>,
    priority: u32,
    message: &str,
    section: SectionId,
    time_slot: TimeSlotId,
) -> Vec<Var> {
    let Some(x) = ctx.try_time_var(section, time_slot) else {
        return Vec::new();
    };
    let c = ctx.new_criterion(priority, message);
    ctx.add_clause([x.negative(), c.positive()]);
    vec![c]
}

/// All of `sections` use slots with the same `(days, duration)` pattern.
///
/// At priority 0 this is encoded exactly: one selector per pattern, exactly one selector
/// true, and every slot implies its pattern's selector. At other priorities a single
/// criterion covers every pair of sections placed with different patterns.
pub fn encode_time_pattern_match(
    ctx: &mut EncodingContext<'_>,
    priority: u32,
    message: &str,
    sections: &[SectionId],
) -> Vec<Var> {
    let data = ctx.data();
    let mut by_section: Vec<Vec<(Var, TimeSlotId)>> = Vec::new();
    for &s in sections {
        let slots: Vec<_> = data
            .section(s)
            .time_slots
            .iter()
            .filter_map(|&t| Some((ctx.try_time_var(s, t)?, t)))
            .collect();
        if !slots.is_empty() {
            by_section.push(slots);
        }
    }

    if priority == 0 {
        let mut selectors = BTreeMap::new();
        for slots in &by_section {
            for &(_, t) in slots {
                selectors
                    .entry(data.time_slot(t).time_pattern())
                    .or_insert_with(|| ctx.new_var());
            }
        }
        let selector_vars: Vec<Var> = selectors.values().copied().collect();
        if selector_vars.len() > 1 {
            ctx.add_clause(selector_vars.iter().map(|v| v.positive()));
            for (i, a) in selector_vars.iter().enumerate() {
                for b in &selector_vars[i + 1..] {
                    ctx.add_clause([a.negative(), b.negative()]);
                }
            }
            for slots in &by_section {
                for &(x, t) in slots {
                    let sel = selectors[&data.time_slot(t).time_pattern()];
                    ctx.add_clause([x.negative(), sel.positive()]);
                }
            }
        }
        return Vec::new();
    }

    let mut criterion = LazyCriterion::new(priority, message);
    for (i, first) in by_section.iter().enumerate() {
        for second in &by_section[i + 1..] {
            for &(xa, ta) in first {
                for &(xb, tb) in second {
                    if data.time_slot(ta).time_pattern() != data.time_slot(tb).time_pattern() {
                        let c = criterion.get(ctx);
                        ctx.add_clause([xa.negative(), xb.negative(), c.positive()]);
                    }
                }
            }
        }
    }
    criterion.var().into_iter().collect()
}
