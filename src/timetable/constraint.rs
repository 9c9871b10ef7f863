use core::fmt;

use crate::timetable::clock::{Days, Duration};
use crate::timetable::model::{FacultyId, RoomId, SectionId, TimeSlotId, TimetableData};

/// A preference or requirement at a priority level. Level 0 is hard; larger numbers are
/// less important.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Constraint {
    pub priority: u32,
    pub kind: ConstraintKind,
}

/// Parameters shared by the four cluster/gap length constraints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClusterLimit {
    pub faculty: FacultyId,
    pub days: Days,
    /// The length a cluster or gap is compared against.
    pub duration: Duration,
    /// Classes separated by at most this much belong to the same cluster.
    pub max_gap: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConstraintKind {
    /// The two sections must not meet at conflicting times.
    Conflict { a: SectionId, b: SectionId },
    /// `single` must share its time slot with at least one member of `group`.
    AntiConflict {
        single: SectionId,
        group: Vec<SectionId>,
    },
    /// Penalises placing `section` in `room`.
    RoomPreference { section: SectionId, room: RoomId },
    /// Penalises placing `section` at `time_slot`.
    TimeSlotPreference {
        section: SectionId,
        time_slot: TimeSlotId,
    },
    FacultyDaysOff {
        faculty: FacultyId,
        days: Days,
        desired_days_off: usize,
    },
    /// On the days the faculty member teaches, class counts differ by at most one.
    FacultyEvenlySpread { faculty: FacultyId, days: Days },
    /// Back-to-back classes on one day stay in the same room.
    FacultyNoRoomSwitch {
        faculty: FacultyId,
        days: Days,
        max_gap: Duration,
    },
    FacultyTooManyRooms {
        faculty: FacultyId,
        desired_max_rooms: usize,
    },
    FacultyGapTooShort(ClusterLimit),
    FacultyGapTooLong(ClusterLimit),
    FacultyClusterTooShort(ClusterLimit),
    FacultyClusterTooLong(ClusterLimit),
    /// All sections use slots with the same number of days and duration.
    TimePatternMatch { sections: Vec<SectionId> },
}

impl ConstraintKind {
    /// The name used for this kind in snapshot files.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Conflict { .. } => "conflict",
            Self::AntiConflict { .. } => "anti_conflict",
            Self::RoomPreference { .. } => "room_preference",
            Self::TimeSlotPreference { .. } => "time_slot_preference",
            Self::FacultyDaysOff { .. } => "faculty_days_off",
            Self::FacultyEvenlySpread { .. } => "faculty_evenly_spread",
            Self::FacultyNoRoomSwitch { .. } => "faculty_no_room_switch",
            Self::FacultyTooManyRooms { .. } => "faculty_too_many_rooms",
            Self::FacultyGapTooShort(_) => "faculty_gap_too_short",
            Self::FacultyGapTooLong(_) => "faculty_gap_too_long",
            Self::FacultyClusterTooShort(_) => "faculty_cluster_too_short",
            Self::FacultyClusterTooLong(_) => "faculty_cluster_too_long",
            Self::TimePatternMatch { .. } => "time_pattern_match",
        }
    }

    /// Every section this constraint names directly.
    #[must_use]
    pub fn sections(&self) -> Vec<SectionId> {
        match self {
            Self::Conflict { a, b } => vec![*a, *b],
            Self::AntiConflict { single, group } => {
                std::iter::once(*single).chain(group.iter().copied()).collect()
            }
            Self::RoomPreference { section, .. } | Self::TimeSlotPreference { section, .. } => {
                vec![*section]
            }
            Self::TimePatternMatch { sections } => sections.clone(),
            _ => Vec::new(),
        }
    }

    #[must_use]
    pub const fn faculty(&self) -> Option<FacultyId> {
        match self {
            Self::FacultyDaysOff { faculty, .. }
            | Self::FacultyEvenlySpread { faculty, .. }
            | Self::FacultyNoRoomSwitch { faculty, .. }
            | Self::FacultyTooManyRooms { faculty, .. } => Some(*faculty),
            Self::FacultyGapTooShort(limit)
            | Self::FacultyGapTooLong(limit)
            | Self::FacultyClusterTooShort(limit)
            | Self::FacultyClusterTooLong(limit) => Some(limit.faculty),
            _ => None,
        }
    }
}

impl Constraint {
    /// A short human-readable label such as `faculty_days_off(Ada)@2`, used in error messages.
    /// Ids out of range are shown by number.
    #[must_use]
    pub fn label(&self, data: &TimetableData) -> String {
        let section_name = |s: SectionId| {
            data.sections
                .get(s.index())
                .map_or_else(|| format!("#{}", s.index()), |x| x.name.clone())
        };
        let subject = match self.kind.faculty() {
            Some(f) => data
                .faculty
                .get(f.index())
                .map_or_else(|| format!("#{}", f.index()), |x| x.name.clone()),
            None => self
                .kind
                .sections()
                .into_iter()
                .map(section_name)
                .collect::<Vec<_>>()
                .join(", "),
        };
        format!("{}({subject})@{}", self.kind.name(), self.priority)
    }

    /// Displays the constraint with entity names resolved against `data`.
    #[must_use]
    pub const fn display<'a>(&'a self, data: &'a TimetableData) -> DisplayConstraint<'a> {
        DisplayConstraint { constraint: self, data }
    }
}

/// See [`Constraint::display`].
#[derive(Debug, Clone, Copy)]
pub struct DisplayConstraint<'a> {
    constraint: &'a Constraint,
    data: &'a TimetableData,
}

impl fmt::Display for DisplayConstraint<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let data = self.data;
        let section = |s: SectionId| data.section(s).name.as_str();
        let faculty = |id: FacultyId| data.faculty_member(id).name.as_str();

        match &self.constraint.kind {
            ConstraintKind::Conflict { a, b } => {
                write!(f, "{} and {} conflict", section(*a), section(*b))
            }
            ConstraintKind::AntiConflict { single, group } => {
                let group = group.iter().map(|&s| section(s)).collect::<Vec<_>>();
                write!(
                    f,
                    "{} should meet at the same time as one of [{}]",
                    section(*single),
                    group.join(", ")
                )
            }
            ConstraintKind::RoomPreference { section: s, room } => {
                write!(f, "{} placed in {}", section(*s), data.room(*room).name)
            }
            ConstraintKind::TimeSlotPreference { section: s, time_slot } => {
                write!(f, "{} placed at {}", section(*s), data.time_slot(*time_slot).name)
            }
            ConstraintKind::FacultyDaysOff {
                faculty: id,
                days,
                desired_days_off,
            } => write!(f, "{} wants {desired_days_off} day(s) off on {days}", faculty(*id)),
            ConstraintKind::FacultyEvenlySpread { faculty: id, days } => {
                write!(f, "{} wants classes evenly spread over {days}", faculty(*id))
            }
            ConstraintKind::FacultyNoRoomSwitch {
                faculty: id,
                days,
                max_gap,
            } => write!(
                f,
                "{} should not switch rooms between classes at most {max_gap} apart on {days}",
                faculty(*id)
            ),
            ConstraintKind::FacultyTooManyRooms {
                faculty: id,
                desired_max_rooms,
            } => write!(f, "{} wants at most {desired_max_rooms} room(s)", faculty(*id)),
            ConstraintKind::FacultyGapTooShort(l) => write_cluster(f, data, "gap", "shorter than", l),
            ConstraintKind::FacultyGapTooLong(l) => write_cluster(f, data, "gap", "longer than", l),
            ConstraintKind::FacultyClusterTooShort(l) => {
                write_cluster(f, data, "cluster", "shorter than", l)
            }
            ConstraintKind::FacultyClusterTooLong(l) => {
                write_cluster(f, data, "cluster", "longer than", l)
            }
            ConstraintKind::TimePatternMatch { sections } => {
                let names = sections.iter().map(|&s| section(s)).collect::<Vec<_>>();
                write!(f, "[{}] should share a time pattern", names.join(", "))
            }
        }
    }
}

fn write_cluster(
    f: &mut fmt::Formatter<'_>,
    data: &TimetableData,
    what: &str,
    cmp: &str,
    limit: &ClusterLimit,
) -> fmt::Result {
    write!(
        f,
        "{}: {what} {cmp} {} on {} (gap within cluster <= {})",
        data.faculty_member(limit.faculty).name,
        limit.duration,
        limit.days,
        limit.max_gap
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timetable::clock::Time;
    use crate::timetable::model::TimetableBuilder;

    #[test]
    fn test_label_and_display() {
        let mut b = TimetableBuilder::new();
        let t = b
            .add_time_slot("T", Days::WEEKDAYS, Time::hm(8, 0), Duration::from_minutes(50))
            .unwrap();
        let s1 = b.add_section("CS 1400-01", [], [t]).unwrap();
        let s2 = b.add_section("CS 1410-01", [], [t]).unwrap();
        let ada = b.add_faculty("Ada", [s1]).unwrap();
        b.add_constraint(1, ConstraintKind::Conflict { a: s1, b: s2 });
        b.add_constraint(
            2,
            ConstraintKind::FacultyDaysOff {
                faculty: ada,
                days: "MWF".parse().unwrap(),
                desired_days_off: 1,
            },
        );
        let data = b.build();

        let conflict = &data.constraints[0];
        assert_eq!(conflict.label(&data), "conflict(CS 1400-01, CS 1410-01)@1");
        assert_eq!(
            conflict.display(&data).to_string(),
            "CS 1400-01 and CS 1410-01 conflict"
        );
        let days_off = &data.constraints[1];
        assert_eq!(days_off.label(&data), "faculty_days_off(Ada)@2");
        assert_eq!(
            days_off.display(&data).to_string(),
            "Ada wants 1 day(s) off on MWF"
        );
    }

    #[test]
    fn test_referenced_entities() {
        let kind = ConstraintKind::AntiConflict {
            single: SectionId::new(3),
            group: vec![SectionId::new(1), SectionId::new(2)],
        };
        assert_eq!(kind.sections().len(), 3);
        assert_eq!(kind.faculty(), None);
        assert_eq!(kind.name(), "anti_conflict");
    }
}
