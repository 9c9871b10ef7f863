//! The immutable timetable snapshot the encoders work from.
//!
//! Entities reference each other through dense index types ([`RoomId`], [`TimeSlotId`],
//! [`SectionId`], [`FacultyId`]) rather than names, so the encoders can key their variable
//! pools on small `Copy` values. Names are only used for input and output.
//!
//! A [`TimetableData`] is normally produced by [`TimetableBuilder`] (directly or through the
//! JSON [`loader`](crate::timetable::loader)), which resolves names, derives each section's
//! faculty from the roster and builds the symmetric time slot conflict relation.

use std::collections::BTreeSet;

use rustc_hash::FxHashMap;

use crate::error::DataError;
use crate::timetable::clock::{Days, Duration, Time, MINUTES_PER_DAY};
use crate::timetable::constraint::{Constraint, ConstraintKind};

macro_rules! index_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(u32);

        impl $name {
            #[must_use]
            #[allow(clippy::cast_possible_truncation)]
            pub const fn new(index: usize) -> Self {
                Self(index as u32)
            }

            #[must_use]
            pub const fn index(self) -> usize {
                self.0 as usize
            }
        }
    };
}

index_type!(
    /// Index of a [`Room`] in [`TimetableData::rooms`].
    RoomId
);
index_type!(
    /// Index of a [`TimeSlot`] in [`TimetableData::time_slots`].
    TimeSlotId
);
index_type!(
    /// Index of a [`Section`] in [`TimetableData::sections`].
    SectionId
);
index_type!(
    /// Index of a [`Faculty`] member in [`TimetableData::faculty`].
    FacultyId
);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Room {
    pub name: String,
}

/// `(number of days, duration)`: two slots with the same pattern "look the same" on a grid,
/// e.g. every MWF 50 minute slot shares a pattern with every MTW 50 minute slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimePattern {
    pub days: usize,
    pub duration: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeSlot {
    pub name: String,
    pub days: Days,
    pub start: Time,
    pub duration: Duration,
}

impl TimeSlot {
    #[must_use]
    pub fn end_time(&self) -> Time {
        self.start + self.duration
    }

    #[must_use]
    pub const fn time_pattern(&self) -> TimePattern {
        TimePattern {
            days: self.days.len(),
            duration: self.duration,
        }
    }

    /// Shares a day and the half-open intervals `[start, end)` intersect.
    #[must_use]
    pub fn overlaps(&self, other: &Self) -> bool {
        self.days.intersects(other.days)
            && self.start < other.end_time()
            && other.start < self.end_time()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Section {
    pub name: String,
    /// Candidate rooms, sorted. Empty means the section meets without a room.
    pub rooms: Vec<RoomId>,
    /// Candidate time slots, sorted.
    pub time_slots: Vec<TimeSlotId>,
    /// Rooms penalised at the given priority if chosen.
    pub room_preferences: Vec<(RoomId, u32)>,
    /// Time slots penalised at the given priority if chosen.
    pub time_slot_preferences: Vec<(TimeSlotId, u32)>,
    /// Derived from the faculty roster.
    pub faculty: Vec<FacultyId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Faculty {
    pub name: String,
    pub sections: Vec<SectionId>,
}

/// One term's worth of scheduling input. Read-only once built.
#[derive(Debug, Clone, Default)]
pub struct TimetableData {
    pub rooms: Vec<Room>,
    pub time_slots: Vec<TimeSlot>,
    pub sections: Vec<Section>,
    pub faculty: Vec<Faculty>,
    pub constraints: Vec<Constraint>,
    /// For each time slot, the sorted list of slots it conflicts with (itself included).
    pub conflicts: Vec<Vec<TimeSlotId>>,
}

impl TimetableData {
    #[must_use]
    pub fn room(&self, id: RoomId) -> &Room {
        &self.rooms[id.index()]
    }

    #[must_use]
    pub fn time_slot(&self, id: TimeSlotId) -> &TimeSlot {
        &self.time_slots[id.index()]
    }

    #[must_use]
    pub fn section(&self, id: SectionId) -> &Section {
        &self.sections[id.index()]
    }

    #[must_use]
    pub fn faculty_member(&self, id: FacultyId) -> &Faculty {
        &self.faculty[id.index()]
    }

    pub fn section_ids(&self) -> impl Iterator<Item = SectionId> {
        (0..self.sections.len()).map(SectionId::new)
    }

    pub fn room_ids(&self) -> impl Iterator<Item = RoomId> {
        (0..self.rooms.len()).map(RoomId::new)
    }

    /// Whether two slots may not be used at the same time by one room or one person.
    #[must_use]
    pub fn conflicts(&self, a: TimeSlotId, b: TimeSlotId) -> bool {
        self.conflicts
            .get(a.index())
            .is_some_and(|list| list.binary_search(&b).is_ok())
    }

    /// Distinct constraint priorities, most important first.
    #[must_use]
    pub fn priorities(&self) -> BTreeSet<u32> {
        self.constraints.iter().map(|c| c.priority).collect()
    }

    pub fn constraints_at(&self, priority: u32) -> impl Iterator<Item = &Constraint> {
        self.constraints.iter().filter(move |c| c.priority == priority)
    }

    /// Sections that have at least one candidate time slot and will therefore be placed.
    pub fn schedulable_sections(&self) -> impl Iterator<Item = SectionId> + '_ {
        self.section_ids()
            .filter(|&s| !self.section(s).time_slots.is_empty())
    }
}

/// Assembles a [`TimetableData`], checking names as they are added.
#[derive(Debug, Default)]
pub struct TimetableBuilder {
    data: TimetableData,
    explicit_conflicts: Vec<(TimeSlotId, TimeSlotId)>,
    room_names: FxHashMap<String, RoomId>,
    time_slot_names: FxHashMap<String, TimeSlotId>,
    section_names: FxHashMap<String, SectionId>,
    faculty_names: FxHashMap<String, FacultyId>,
}

fn insert_name<Id: Copy>(
    names: &mut FxHashMap<String, Id>,
    kind: &'static str,
    name: &str,
    id: Id,
) -> Result<Id, DataError> {
    if names.contains_key(name) {
        return Err(DataError::DuplicateName {
            kind,
            name: name.to_string(),
        });
    }
    names.insert(name.to_string(), id);
    Ok(id)
}

impl TimetableBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// # Errors
    ///
    /// If a room with this name already exists.
    pub fn add_room(&mut self, name: &str) -> Result<RoomId, DataError> {
        let id = insert_name(&mut self.room_names, "room", name, RoomId::new(self.data.rooms.len()))?;
        self.data.rooms.push(Room {
            name: name.to_string(),
        });
        Ok(id)
    }

    /// # Errors
    ///
    /// If the name is taken, the slot has no days, or it has zero length or runs past
    /// midnight.
    pub fn add_time_slot(
        &mut self,
        name: &str,
        days: Days,
        start: Time,
        duration: Duration,
    ) -> Result<TimeSlotId, DataError> {
        if days.is_empty() {
            return Err(DataError::InvalidDays(format!("{name}: no days")));
        }
        if duration == Duration::ZERO
            || start.minutes() + duration.minutes() > MINUTES_PER_DAY
        {
            return Err(DataError::InvalidDuration(i64::from(duration.minutes())));
        }
        let id = insert_name(
            &mut self.time_slot_names,
            "time slot",
            name,
            TimeSlotId::new(self.data.time_slots.len()),
        )?;
        self.data.time_slots.push(TimeSlot {
            name: name.to_string(),
            days,
            start,
            duration,
        });
        Ok(id)
    }

    /// Declares two slots as conflicting even if they do not overlap, e.g. for cross-listed
    /// sections that must be kept apart.
    pub fn add_conflict(&mut self, a: TimeSlotId, b: TimeSlotId) {
        self.explicit_conflicts.push((a, b));
    }

    /// # Errors
    ///
    /// If the name is taken.
    pub fn add_section(
        &mut self,
        name: &str,
        rooms: impl IntoIterator<Item = RoomId>,
        time_slots: impl IntoIterator<Item = TimeSlotId>,
    ) -> Result<SectionId, DataError> {
        let id = insert_name(
            &mut self.section_names,
            "section",
            name,
            SectionId::new(self.data.sections.len()),
        )?;
        let mut rooms: Vec<_> = rooms.into_iter().collect();
        rooms.sort_unstable();
        rooms.dedup();
        let mut time_slots: Vec<_> = time_slots.into_iter().collect();
        time_slots.sort_unstable();
        time_slots.dedup();
        self.data.sections.push(Section {
            name: name.to_string(),
            rooms,
            time_slots,
            ..Section::default()
        });
        Ok(id)
    }

    pub fn prefer_not_room(&mut self, section: SectionId, room: RoomId, priority: u32) {
        self.data.sections[section.index()]
            .room_preferences
            .push((room, priority));
    }

    pub fn prefer_not_time_slot(&mut self, section: SectionId, time_slot: TimeSlotId, priority: u32) {
        self.data.sections[section.index()]
            .time_slot_preferences
            .push((time_slot, priority));
    }

    /// # Errors
    ///
    /// If the name is taken.
    pub fn add_faculty(
        &mut self,
        name: &str,
        sections: impl IntoIterator<Item = SectionId>,
    ) -> Result<FacultyId, DataError> {
        let id = insert_name(
            &mut self.faculty_names,
            "faculty",
            name,
            FacultyId::new(self.data.faculty.len()),
        )?;
        let mut sections: Vec<_> = sections.into_iter().collect();
        sections.sort_unstable();
        sections.dedup();
        self.data.faculty.push(Faculty {
            name: name.to_string(),
            sections,
        });
        Ok(id)
    }

    pub fn add_constraint(&mut self, priority: u32, kind: ConstraintKind) {
        self.data.constraints.push(Constraint { priority, kind });
    }

    #[must_use]
    pub fn room_id(&self, name: &str) -> Option<RoomId> {
        self.room_names.get(name).copied()
    }

    #[must_use]
    pub fn time_slot_id(&self, name: &str) -> Option<TimeSlotId> {
        self.time_slot_names.get(name).copied()
    }

    #[must_use]
    pub fn section_id(&self, name: &str) -> Option<SectionId> {
        self.section_names.get(name).copied()
    }

    #[must_use]
    pub fn faculty_id(&self, name: &str) -> Option<FacultyId> {
        self.faculty_names.get(name).copied()
    }

    /// Finishes the snapshot: derives section faculty, expands section preferences into
    /// constraints and computes the symmetric conflict relation.
    #[must_use]
    pub fn build(mut self) -> TimetableData {
        for (f, faculty) in self.data.faculty.iter().enumerate() {
            for &s in &faculty.sections {
                self.data.sections[s.index()].faculty.push(FacultyId::new(f));
            }
        }

        for (s, section) in self.data.sections.iter().enumerate() {
            let section_id = SectionId::new(s);
            for &(room, priority) in &section.room_preferences {
                self.data.constraints.push(Constraint {
                    priority,
                    kind: ConstraintKind::RoomPreference {
                        section: section_id,
                        room,
                    },
                });
            }
            for &(time_slot, priority) in &section.time_slot_preferences {
                self.data.constraints.push(Constraint {
                    priority,
                    kind: ConstraintKind::TimeSlotPreference {
                        section: section_id,
                        time_slot,
                    },
                });
            }
        }

        let slots = &self.data.time_slots;
        let mut conflicts: Vec<Vec<TimeSlotId>> = (0..slots.len())
            .map(|a| {
                (0..slots.len())
                    .filter(|&b| slots[a].overlaps(&slots[b]))
                    .map(TimeSlotId::new)
                    .collect()
            })
            .collect();
        for (a, b) in self.explicit_conflicts {
            conflicts[a.index()].push(b);
            conflicts[b.index()].push(a);
        }
        for list in &mut conflicts {
            list.sort_unstable();
            list.dedup();
        }
        self.data.conflicts = conflicts;

        self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slot(b: &mut TimetableBuilder, name: &str, days: &str, start: Time, minutes: u16) -> TimeSlotId {
        b.add_time_slot(name, days.parse().unwrap(), start, Duration::from_minutes(minutes))
            .unwrap()
    }

    #[test]
    fn test_geometric_conflicts_are_symmetric() {
        let mut b = TimetableBuilder::new();
        let mwf9 = slot(&mut b, "MWF0900", "MWF", Time::hm(9, 0), 50);
        let mw9 = slot(&mut b, "MW0900", "MW", Time::hm(9, 0), 75);
        let tr9 = slot(&mut b, "TR0900", "TR", Time::hm(9, 0), 75);
        let mwf950 = slot(&mut b, "MWF0950", "MWF", Time::hm(9, 50), 50);
        let data = b.build();

        assert!(data.conflicts(mwf9, mwf9));
        assert!(data.conflicts(mwf9, mw9));
        assert!(data.conflicts(mw9, mwf9));
        assert!(!data.conflicts(mwf9, tr9));
        // back to back is not an overlap
        assert!(!data.conflicts(mwf9, mwf950));
        assert!(data.conflicts(mw9, mwf950));
    }

    #[test]
    fn test_explicit_conflicts_are_added_both_ways() {
        let mut b = TimetableBuilder::new();
        let a = slot(&mut b, "A", "M", Time::hm(8, 0), 50);
        let c = slot(&mut b, "C", "T", Time::hm(8, 0), 50);
        b.add_conflict(a, c);
        let data = b.build();
        assert!(data.conflicts(a, c));
        assert!(data.conflicts(c, a));
    }

    #[test]
    fn test_duplicate_names_are_rejected() {
        let mut b = TimetableBuilder::new();
        b.add_room("R1").unwrap();
        assert!(matches!(
            b.add_room("R1"),
            Err(DataError::DuplicateName { kind: "room", .. })
        ));
    }

    #[test]
    fn test_slot_past_midnight_is_rejected() {
        let mut b = TimetableBuilder::new();
        let err = b
            .add_time_slot("late", Days::WEEKDAYS, Time::hm(23, 30), Duration::from_minutes(60))
            .unwrap_err();
        assert!(matches!(err, DataError::InvalidDuration(60)));
    }

    #[test]
    fn test_build_derives_faculty_and_preferences() {
        let mut b = TimetableBuilder::new();
        let r = b.add_room("R1").unwrap();
        let t = slot(&mut b, "T", "MWF", Time::hm(8, 0), 50);
        let s = b.add_section("CS 1400-01", [r], [t]).unwrap();
        b.prefer_not_room(s, r, 3);
        b.prefer_not_time_slot(s, t, 2);
        let f = b.add_faculty("Ada", [s]).unwrap();
        let data = b.build();

        assert_eq!(data.section(s).faculty, vec![f]);
        assert_eq!(data.priorities().into_iter().collect::<Vec<_>>(), vec![2, 3]);
        assert_eq!(data.constraints_at(3).count(), 1);
    }

    #[test]
    fn test_time_pattern() {
        let mut b = TimetableBuilder::new();
        let a = slot(&mut b, "A", "MWF", Time::hm(8, 0), 50);
        let c = slot(&mut b, "C", "MTW", Time::hm(10, 0), 50);
        let d = slot(&mut b, "D", "TR", Time::hm(10, 0), 75);
        let data = b.build();
        assert_eq!(data.time_slot(a).time_pattern(), data.time_slot(c).time_pattern());
        assert_ne!(data.time_slot(a).time_pattern(), data.time_slot(d).time_pattern());
    }
}
