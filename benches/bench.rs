use criterion::{Criterion, criterion_group, criterion_main};
use std::collections::BTreeMap;
use std::hint::black_box;
use std::time::Duration;
use timetable_sat::encoding::context::EncodingContext;
use timetable_sat::encoding::totalizer::{Totalizer, at_most_k};
use timetable_sat::sat::dpll::DpllSolver;
use timetable_sat::sat::literal::Lit;
use timetable_sat::search::engine::{PriorityEngine, SearchOptions, encode_level};
use timetable_sat::timetable::clock::{Duration as Minutes, Time};
use timetable_sat::timetable::constraint::{ClusterLimit, ConstraintKind};
use timetable_sat::timetable::model::{TimetableBuilder, TimetableData};

/// A department-sized term: `sections` sections over `rooms` rooms and the usual MWF/TR
/// grid, each faculty member teaching three sections with the common preferences attached.
fn synthetic_term(sections: usize, rooms: usize, seed: u64) -> TimetableData {
    let mut rng = fastrand::Rng::with_seed(seed);
    let mut b = TimetableBuilder::new();

    let rooms: Vec<_> = (0..rooms).map(|i| b.add_room(&format!("R{i}")).unwrap()).collect();
    let mut slots = Vec::new();
    for hour in 8..16u16 {
        slots.push(
            b.add_time_slot(&format!("MWF{hour:02}00"), "MWF".parse().unwrap(), Time::hm(hour, 0), Minutes::from_minutes(50))
                .unwrap(),
        );
    }
    for start in [Time::hm(7, 30), Time::hm(9, 0), Time::hm(10, 30), Time::hm(12, 0), Time::hm(13, 30), Time::hm(15, 0)] {
        slots.push(
            b.add_time_slot(&format!("TR{start}"), "TR".parse().unwrap(), start, Minutes::from_minutes(75))
                .unwrap(),
        );
    }

    let ids: Vec<_> = (0..sections)
        .map(|i| {
            let candidate_rooms: Vec<_> = rooms.iter().copied().filter(|_| rng.bool()).collect();
            let candidate_slots: Vec<_> = slots.iter().copied().filter(|_| rng.u8(..4) != 0).collect();
            b.add_section(&format!("CS {:04}-01", 1000 + i), candidate_rooms, candidate_slots)
                .unwrap()
        })
        .collect();

    for (f, chunk) in ids.chunks(3).enumerate() {
        b.add_faculty(&format!("F{f}"), chunk.iter().copied()).unwrap();
        let faculty = b.faculty_id(&format!("F{f}")).unwrap();
        b.add_constraint(
            2,
            ConstraintKind::FacultyDaysOff {
                faculty,
                days: "MTWRF".parse().unwrap(),
                desired_days_off: 1,
            },
        );
        b.add_constraint(
            3,
            ConstraintKind::FacultyGapTooLong(ClusterLimit {
                faculty,
                days: "MTWRF".parse().unwrap(),
                duration: Minutes::from_minutes(120),
                max_gap: Minutes::from_minutes(15),
            }),
        );
        if chunk.len() > 1 {
            b.add_constraint(1, ConstraintKind::Conflict { a: chunk[0], b: chunk[1] });
        }
    }
    b.build()
}

fn bench_totalizer(c: &mut Criterion) {
    let data = TimetableData::default();
    let mut group = c.benchmark_group("totalizer - inputs");
    group.sample_size(50);

    for n in [16usize, 64, 256] {
        group.bench_function(format!("build {n}"), |b| {
            b.iter(|| {
                let mut ctx = EncodingContext::new(&data);
                let inputs: Vec<Lit> = (0..n).map(|_| ctx.new_var().positive()).collect();
                let totalizer = Totalizer::build(&mut ctx, black_box(&inputs));
                black_box(totalizer.len())
            });
        });
        group.bench_function(format!("at most {} of {n}", n / 4), |b| {
            b.iter(|| {
                let mut ctx = EncodingContext::new(&data);
                let inputs: Vec<Lit> = (0..n).map(|_| ctx.new_var().positive()).collect();
                at_most_k(&mut ctx, black_box(&inputs), n / 4);
                black_box(ctx.num_clauses())
            });
        });
    }
    group.finish();
}

fn bench_encoding(c: &mut Criterion) {
    let mut group = c.benchmark_group("encoding - level");
    group.sample_size(20);
    group.measurement_time(Duration::from_secs(10));

    for (sections, rooms) in [(30, 6), (90, 12)] {
        let data = synthetic_term(sections, rooms, 7);
        let pins: BTreeMap<u32, usize> = [(0, 0), (1, 0), (2, 2)].into_iter().collect();
        group.bench_function(format!("{sections} sections, level 3"), |b| {
            b.iter(|| {
                let (ctx, criteria) = encode_level(black_box(&data), 3, &pins);
                black_box((ctx.num_clauses(), criteria.len()))
            });
        });
    }
    group.finish();
}

fn bench_search(c: &mut Criterion) {
    let data = synthetic_term(12, 4, 11);
    let mut group = c.benchmark_group("search - builtin");
    group.sample_size(10);
    group.measurement_time(Duration::from_secs(20));

    group.bench_function("12 sections, levels 0-1", |b| {
        b.iter(|| {
            let options = SearchOptions {
                max_priority: Some(1),
                ..SearchOptions::default()
            };
            let mut engine = PriorityEngine::new(&data, DpllSolver::new(), options);
            black_box(engine.run().ok())
        });
    });
    group.finish();
}

criterion_group!(benches, bench_totalizer, bench_encoding, bench_search);
criterion_main!(benches);
