//! Reads a timetable snapshot from JSON.
//!
//! The snapshot is the hand-off from whatever system manages the course catalog: rooms,
//! time slots, sections with their candidate rooms and slots, the faculty roster and the
//! list of constraints. Names are resolved to ids here, so every dangling reference is
//! reported as a [`DataError`] naming the constraint or section that contains it.
//!
//! Constraints are tagged by a `kind` string. Kinds this crate does not know are skipped;
//! each unknown kind is logged once and counted in the returned [`LoadReport`].

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use itertools::Itertools;
use log::{debug, warn};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::error::DataError;
use crate::timetable::clock::{Days, Duration, Time};
use crate::timetable::constraint::{ClusterLimit, ConstraintKind};
use crate::timetable::model::{
    FacultyId, RoomId, SectionId, TimeSlotId, TimetableBuilder, TimetableData,
};

#[derive(Debug, Deserialize)]
struct RawSnapshot {
    #[serde(default)]
    rooms: Vec<RawRoom>,
    time_slots: Vec<RawTimeSlot>,
    #[serde(default)]
    conflicts: Vec<(String, String)>,
    sections: Vec<RawSection>,
    #[serde(default)]
    faculty: Vec<RawFaculty>,
    #[serde(default)]
    constraints: Vec<RawConstraint>,
}

#[derive(Debug, Deserialize)]
struct RawRoom {
    name: String,
}

#[derive(Debug, Deserialize)]
struct RawTimeSlot {
    name: String,
    days: Days,
    start: Time,
    duration: Duration,
}

#[derive(Debug, Deserialize)]
struct RawSection {
    name: String,
    #[serde(default)]
    rooms: Vec<String>,
    time_slots: Vec<String>,
    #[serde(default)]
    room_preferences: BTreeMap<String, u32>,
    #[serde(default)]
    time_slot_preferences: BTreeMap<String, u32>,
}

#[derive(Debug, Deserialize)]
struct RawFaculty {
    name: String,
    #[serde(default)]
    sections: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RawConstraint {
    kind: String,
    priority: u32,
    #[serde(flatten)]
    fields: Map<String, Value>,
}

const fn default_days() -> Days {
    Days::WEEKDAYS
}

#[derive(Debug, Deserialize)]
struct SectionList {
    sections: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct AntiConflictFields {
    single: String,
    group: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RoomPreferenceFields {
    section: String,
    room: String,
}

#[derive(Debug, Deserialize)]
struct TimeSlotPreferenceFields {
    section: String,
    time_slot: String,
}

#[derive(Debug, Deserialize)]
struct DaysOffFields {
    faculty: String,
    #[serde(default = "default_days")]
    days: Days,
    desired_days_off: usize,
}

#[derive(Debug, Deserialize)]
struct EvenlySpreadFields {
    faculty: String,
    #[serde(default = "default_days")]
    days: Days,
}

#[derive(Debug, Deserialize)]
struct NoRoomSwitchFields {
    faculty: String,
    #[serde(default = "default_days")]
    days: Days,
    max_gap: Duration,
}

#[derive(Debug, Deserialize)]
struct TooManyRoomsFields {
    faculty: String,
    desired_max_rooms: usize,
}

#[derive(Debug, Deserialize)]
struct ClusterFields {
    faculty: String,
    #[serde(default = "default_days")]
    days: Days,
    duration: Duration,
    max_gap: Duration,
}

/// What the loader skipped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// Unknown constraint kinds and how many constraints of each were skipped.
    pub skipped_kinds: BTreeMap<String, usize>,
}

impl LoadReport {
    #[must_use]
    pub fn skipped(&self) -> usize {
        self.skipped_kinds.values().sum()
    }
}

/// Loads a snapshot from a JSON file.
///
/// # Errors
///
/// If the file cannot be read, is not valid JSON, or references unknown entities.
pub fn load_file(path: impl AsRef<Path>) -> Result<(TimetableData, LoadReport), DataError> {
    let path = path.as_ref();
    debug!("loading timetable snapshot from {}", path.display());
    load(BufReader::new(File::open(path)?))
}

/// Loads a snapshot from JSON text.
///
/// # Errors
///
/// See [`load_file`].
pub fn load_str(json: &str) -> Result<(TimetableData, LoadReport), DataError> {
    load(json.as_bytes())
}

/// # Errors
///
/// See [`load_file`].
pub fn load<R: Read>(reader: R) -> Result<(TimetableData, LoadReport), DataError> {
    let raw: RawSnapshot = serde_json::from_reader(reader)?;
    Loader::default().run(raw)
}

#[derive(Debug, Default)]
struct Loader {
    builder: TimetableBuilder,
    report: LoadReport,
}

impl Loader {
    fn run(mut self, raw: RawSnapshot) -> Result<(TimetableData, LoadReport), DataError> {
        for room in &raw.rooms {
            self.builder.add_room(&room.name)?;
        }
        for slot in &raw.time_slots {
            self.builder
                .add_time_slot(&slot.name, slot.days, slot.start, slot.duration)?;
        }
        for (a, b) in &raw.conflicts {
            let a = self.time_slot("conflicts", a)?;
            let b = self.time_slot("conflicts", b)?;
            self.builder.add_conflict(a, b);
        }

        for section in &raw.sections {
            let rooms = section
                .rooms
                .iter()
                .map(|r| self.room(&section.name, r))
                .collect::<Result<Vec<_>, _>>()?;
            let time_slots = section
                .time_slots
                .iter()
                .map(|t| self.time_slot(&section.name, t))
                .collect::<Result<Vec<_>, _>>()?;
            let id = self.builder.add_section(&section.name, rooms, time_slots)?;

            for (room, &priority) in &section.room_preferences {
                let room = self.room(&section.name, room)?;
                self.builder.prefer_not_room(id, room, priority);
            }
            for (slot, &priority) in &section.time_slot_preferences {
                let slot = self.time_slot(&section.name, slot)?;
                self.builder.prefer_not_time_slot(id, slot, priority);
            }
        }

        for faculty in &raw.faculty {
            let sections = faculty
                .sections
                .iter()
                .map(|s| self.section(&faculty.name, s))
                .collect::<Result<Vec<_>, _>>()?;
            self.builder.add_faculty(&faculty.name, sections)?;
        }

        for (i, constraint) in raw.constraints.into_iter().enumerate() {
            self.constraint(i, constraint)?;
        }

        Ok((self.builder.build(), self.report))
    }

    fn constraint(&mut self, index: usize, raw: RawConstraint) -> Result<(), DataError> {
        let owner = format!("{}#{index}", raw.kind);
        let priority = raw.priority;
        let fields = Value::Object(raw.fields);

        let kinds = match raw.kind.as_str() {
            "conflict" => {
                let f: SectionList = parse(fields)?;
                // a section listed twice is one section
                let sections: Vec<SectionId> =
                    self.sections(&owner, &f.sections)?.into_iter().unique().collect();
                let mut kinds = Vec::new();
                for (i, &a) in sections.iter().enumerate() {
                    for &b in &sections[i + 1..] {
                        kinds.push(ConstraintKind::Conflict { a, b });
                    }
                }
                kinds
            }
            "anti_conflict" => {
                let f: AntiConflictFields = parse(fields)?;
                vec![ConstraintKind::AntiConflict {
                    single: self.section(&owner, &f.single)?,
                    group: self.sections(&owner, &f.group)?,
                }]
            }
            "room_preference" => {
                let f: RoomPreferenceFields = parse(fields)?;
                vec![ConstraintKind::RoomPreference {
                    section: self.section(&owner, &f.section)?,
                    room: self.room(&owner, &f.room)?,
                }]
            }
            "time_slot_preference" => {
                let f: TimeSlotPreferenceFields = parse(fields)?;
                vec![ConstraintKind::TimeSlotPreference {
                    section: self.section(&owner, &f.section)?,
                    time_slot: self.time_slot(&owner, &f.time_slot)?,
                }]
            }
            "faculty_days_off" => {
                let f: DaysOffFields = parse(fields)?;
                vec![ConstraintKind::FacultyDaysOff {
                    faculty: self.faculty(&owner, &f.faculty)?,
                    days: f.days,
                    desired_days_off: f.desired_days_off,
                }]
            }
            "faculty_evenly_spread" => {
                let f: EvenlySpreadFields = parse(fields)?;
                vec![ConstraintKind::FacultyEvenlySpread {
                    faculty: self.faculty(&owner, &f.faculty)?,
                    days: f.days,
                }]
            }
            "faculty_no_room_switch" => {
                let f: NoRoomSwitchFields = parse(fields)?;
                vec![ConstraintKind::FacultyNoRoomSwitch {
                    faculty: self.faculty(&owner, &f.faculty)?,
                    days: f.days,
                    max_gap: f.max_gap,
                }]
            }
            "faculty_too_many_rooms" => {
                let f: TooManyRoomsFields = parse(fields)?;
                vec![ConstraintKind::FacultyTooManyRooms {
                    faculty: self.faculty(&owner, &f.faculty)?,
                    desired_max_rooms: f.desired_max_rooms,
                }]
            }
            "faculty_gap_too_short" => vec![ConstraintKind::FacultyGapTooShort(
                self.cluster_limit(&owner, fields)?,
            )],
            "faculty_gap_too_long" => vec![ConstraintKind::FacultyGapTooLong(
                self.cluster_limit(&owner, fields)?,
            )],
            "faculty_cluster_too_short" => vec![ConstraintKind::FacultyClusterTooShort(
                self.cluster_limit(&owner, fields)?,
            )],
            "faculty_cluster_too_long" => vec![ConstraintKind::FacultyClusterTooLong(
                self.cluster_limit(&owner, fields)?,
            )],
            "time_pattern_match" => {
                let f: SectionList = parse(fields)?;
                vec![ConstraintKind::TimePatternMatch {
                    sections: self.sections(&owner, &f.sections)?,
                }]
            }
            other => {
                let count = self.report.skipped_kinds.entry(other.to_string()).or_insert(0);
                if *count == 0 {
                    warn!("unsupported constraint kind '{other}'; constraints of this kind are skipped");
                }
                *count += 1;
                Vec::new()
            }
        };

        for kind in kinds {
            self.builder.add_constraint(priority, kind);
        }
        Ok(())
    }

    fn cluster_limit(&self, owner: &str, fields: Value) -> Result<ClusterLimit, DataError> {
        let f: ClusterFields = parse(fields)?;
        Ok(ClusterLimit {
            faculty: self.faculty(owner, &f.faculty)?,
            days: f.days,
            duration: f.duration,
            max_gap: f.max_gap,
        })
    }

    fn room(&self, owner: &str, name: &str) -> Result<RoomId, DataError> {
        self.builder.room_id(name).ok_or_else(|| DataError::UnknownRoom {
            owner: owner.to_string(),
            room: name.to_string(),
        })
    }

    fn time_slot(&self, owner: &str, name: &str) -> Result<TimeSlotId, DataError> {
        self.builder
            .time_slot_id(name)
            .ok_or_else(|| DataError::UnknownTimeSlot {
                owner: owner.to_string(),
                time_slot: name.to_string(),
            })
    }

    fn section(&self, owner: &str, name: &str) -> Result<SectionId, DataError> {
        self.builder
            .section_id(name)
            .ok_or_else(|| DataError::unknown_section(owner, name))
    }

    fn sections(&self, owner: &str, names: &[String]) -> Result<Vec<SectionId>, DataError> {
        names.iter().map(|n| self.section(owner, n)).collect()
    }

    fn faculty(&self, owner: &str, name: &str) -> Result<FacultyId, DataError> {
        self.builder
            .faculty_id(name)
            .ok_or_else(|| DataError::unknown_faculty(owner, name))
    }
}

fn parse<T: DeserializeOwned>(fields: Value) -> Result<T, DataError> {
    Ok(serde_json::from_value(fields)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SNAPSHOT: &str = r#"{
        "rooms": [{"name": "SET 105"}, {"name": "SET 106"}],
        "time_slots": [
            {"name": "MWF0900+50", "days": "MWF", "start": "09:00", "duration": 50},
            {"name": "MW0900+75", "days": "MW", "start": "09:00", "duration": 75},
            {"name": "TR0900+75", "days": "TR", "start": "09:00", "duration": 75}
        ],
        "conflicts": [["MWF0900+50", "TR0900+75"]],
        "sections": [
            {"name": "CS 1400-01", "rooms": ["SET 105"], "time_slots": ["MWF0900+50", "TR0900+75"],
             "room_preferences": {"SET 105": 2}},
            {"name": "CS 1410-01", "rooms": ["SET 105", "SET 106"], "time_slots": ["MW0900+75"]},
            {"name": "CS 2420-01", "time_slots": ["TR0900+75"]}
        ],
        "faculty": [{"name": "Ada", "sections": ["CS 1400-01", "CS 1410-01"]}, {"name": "Bob"}],
        "constraints": [
            {"kind": "conflict", "priority": 1, "sections": ["CS 1400-01", "CS 1410-01", "CS 2420-01"]},
            {"kind": "faculty_days_off", "priority": 3, "faculty": "Ada", "days": "MTWRF", "desired_days_off": 2},
            {"kind": "faculty_cluster_too_long", "priority": 4, "faculty": "Ada", "duration": 180, "max_gap": 15},
            {"kind": "lunch_break", "priority": 5, "faculty": "Ada"},
            {"kind": "lunch_break", "priority": 5, "faculty": "Bob"}
        ]
    }"#;

    #[test]
    fn test_load_snapshot() {
        let (data, report) = load_str(SNAPSHOT).unwrap();
        assert_eq!(data.rooms.len(), 2);
        assert_eq!(data.time_slots.len(), 3);
        assert_eq!(data.sections.len(), 3);
        assert!(data.sections[2].rooms.is_empty());
        assert_eq!(data.sections[0].faculty, vec![FacultyId::new(0)]);
        assert!(data.faculty[1].sections.is_empty());

        // three pairwise conflicts, days off, cluster, and the expanded room preference
        assert_eq!(data.constraints.len(), 6);
        assert_eq!(data.priorities().into_iter().collect::<Vec<_>>(), vec![1, 2, 3, 4]);

        let mwf = TimeSlotId::new(0);
        let tr = TimeSlotId::new(2);
        assert!(data.conflicts(mwf, tr));
        assert!(data.conflicts(tr, mwf));

        assert_eq!(report.skipped(), 2);
        assert_eq!(report.skipped_kinds.get("lunch_break"), Some(&2));
    }

    #[test]
    fn test_repeated_section_in_conflict_group_is_ignored() {
        let json = r#"{
            "time_slots": [{"name": "T", "days": "M", "start": "08:00", "duration": 50}],
            "sections": [
                {"name": "A", "time_slots": ["T"]},
                {"name": "B", "time_slots": ["T"]}
            ],
            "constraints": [{"kind": "conflict", "priority": 1, "sections": ["A", "B", "A"]}]
        }"#;
        let (data, _) = load_str(json).unwrap();
        assert_eq!(data.constraints.len(), 1);
        assert!(matches!(
            data.constraints[0].kind,
            ConstraintKind::Conflict { a, b } if a != b
        ));
    }

    #[test]
    fn test_cluster_defaults_to_weekdays() {
        let (data, _) = load_str(SNAPSHOT).unwrap();
        let cluster = data
            .constraints
            .iter()
            .find_map(|c| match &c.kind {
                ConstraintKind::FacultyClusterTooLong(limit) => Some(*limit),
                _ => None,
            })
            .unwrap();
        assert_eq!(cluster.days, Days::WEEKDAYS);
        assert_eq!(cluster.duration, Duration::from_minutes(180));
    }

    #[test]
    fn test_unknown_section_names_the_constraint() {
        let json = r#"{
            "time_slots": [{"name": "T", "days": "M", "start": "08:00", "duration": 50}],
            "sections": [{"name": "A", "time_slots": ["T"]}],
            "constraints": [{"kind": "conflict", "priority": 1, "sections": ["A", "Z"]}]
        }"#;
        let err = load_str(json).unwrap_err();
        match err {
            DataError::UnknownSection { constraint, section } => {
                assert_eq!(constraint, "conflict#0");
                assert_eq!(section, "Z");
            }
            other => panic!("unexpected error {other}"),
        }
    }

    #[test]
    fn test_unknown_room_in_section() {
        let json = r#"{
            "time_slots": [{"name": "T", "days": "M", "start": "08:00", "duration": 50}],
            "sections": [{"name": "A", "rooms": ["nowhere"], "time_slots": ["T"]}]
        }"#;
        assert!(matches!(
            load_str(json),
            Err(DataError::UnknownRoom { .. })
        ));
    }

    #[test]
    fn test_bad_time_is_rejected() {
        let json = r#"{
            "time_slots": [{"name": "T", "days": "M", "start": "08:03", "duration": 50}],
            "sections": []
        }"#;
        assert!(matches!(load_str(json), Err(DataError::Json(_))));
    }

    #[test]
    fn test_out_of_range_hour_is_rejected() {
        let json = r#"{
            "time_slots": [{"name": "T", "days": "M", "start": "2000:00", "duration": 50}],
            "sections": []
        }"#;
        assert!(matches!(load_str(json), Err(DataError::Json(_))));
    }
}
