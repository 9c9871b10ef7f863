//! Pre-flight consistency check of a [`TimetableData`] snapshot.
//!
//! Snapshots assembled by [`TimetableBuilder`](crate::timetable::model::TimetableBuilder)
//! pass by construction; this is for snapshots built or edited by hand, and it runs before
//! every search so the encoders can index freely.

use rustc_hash::FxHashSet;

use crate::error::DataError;
use crate::timetable::constraint::ConstraintKind;
use crate::timetable::model::{TimeSlotId, TimetableData};

/// # Errors
///
/// The first inconsistency found.
pub fn validate(data: &TimetableData) -> Result<(), DataError> {
    check_unique(data.rooms.iter().map(|r| r.name.as_str()), "room")?;
    check_unique(data.time_slots.iter().map(|t| t.name.as_str()), "time slot")?;
    check_unique(data.sections.iter().map(|s| s.name.as_str()), "section")?;
    check_unique(data.faculty.iter().map(|f| f.name.as_str()), "faculty")?;

    for section in &data.sections {
        if section.time_slots.is_empty() {
            return Err(DataError::NoCandidateTimeSlots(section.name.clone()));
        }
        if let Some(room) = section.rooms.iter().find(|r| r.index() >= data.rooms.len()) {
            return Err(DataError::UnknownRoom {
                owner: section.name.clone(),
                room: format!("#{}", room.index()),
            });
        }
        if let Some(slot) = section
            .time_slots
            .iter()
            .find(|t| t.index() >= data.time_slots.len())
        {
            return Err(DataError::UnknownTimeSlot {
                owner: section.name.clone(),
                time_slot: format!("#{}", slot.index()),
            });
        }
    }

    for faculty in &data.faculty {
        if let Some(s) = faculty.sections.iter().find(|s| s.index() >= data.sections.len()) {
            return Err(DataError::unknown_section(&faculty.name, format!("#{}", s.index())));
        }
    }

    for constraint in &data.constraints {
        let label = || constraint.label(data);
        for s in constraint.kind.sections() {
            if s.index() >= data.sections.len() {
                return Err(DataError::unknown_section(label(), format!("#{}", s.index())));
            }
        }
        if let Some(f) = constraint.kind.faculty() {
            if f.index() >= data.faculty.len() {
                return Err(DataError::unknown_faculty(label(), format!("#{}", f.index())));
            }
        }
        match &constraint.kind {
            ConstraintKind::RoomPreference { room, .. } if room.index() >= data.rooms.len() => {
                return Err(DataError::UnknownRoom {
                    owner: label(),
                    room: format!("#{}", room.index()),
                });
            }
            ConstraintKind::TimeSlotPreference { time_slot, .. }
                if time_slot.index() >= data.time_slots.len() =>
            {
                return Err(DataError::UnknownTimeSlot {
                    owner: label(),
                    time_slot: format!("#{}", time_slot.index()),
                });
            }
            _ => {}
        }
    }

    check_conflicts(data)
}

fn check_unique<'a>(names: impl Iterator<Item = &'a str>, kind: &'static str) -> Result<(), DataError> {
    let mut seen = FxHashSet::default();
    for name in names {
        if !seen.insert(name) {
            return Err(DataError::DuplicateName {
                kind,
                name: name.to_string(),
            });
        }
    }
    Ok(())
}

fn check_conflicts(data: &TimetableData) -> Result<(), DataError> {
    let name = |i: usize| {
        data.time_slots
            .get(i)
            .map_or_else(|| format!("#{i}"), |t| t.name.clone())
    };

    if data.conflicts.len() != data.time_slots.len() {
        return Err(DataError::UnknownTimeSlot {
            owner: "conflicts".to_string(),
            time_slot: format!("#{}", data.conflicts.len().max(data.time_slots.len()) - 1),
        });
    }
    for (a, list) in data.conflicts.iter().enumerate() {
        for &b in list {
            if b.index() >= data.time_slots.len() {
                return Err(DataError::UnknownTimeSlot {
                    owner: "conflicts".to_string(),
                    time_slot: name(b.index()),
                });
            }
            if data.conflicts[b.index()].binary_search(&TimeSlotId::new(a)).is_err() {
                return Err(DataError::AsymmetricConflict(name(a), name(b.index())));
            }
        }
    }
    Ok(())
}
