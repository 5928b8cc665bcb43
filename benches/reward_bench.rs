use brainbet::reward::{award, level_to_multiplier};
use brainbet::timer;
use chrono::{Duration, TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

fn bench_award(c: &mut Criterion) {
    c.bench_function("award(5400s, L7)", |b| {
        b.iter(|| award(black_box(5400), black_box(7)));
    });
}

fn bench_level_to_multiplier(c: &mut Criterion) {
    c.bench_function("level_to_multiplier(1..100)", |b| {
        b.iter(|| {
            (1..100)
                .map(|l| level_to_multiplier(black_box(l)).hundredths())
                .sum::<i64>()
        });
    });
}

fn bench_pause_resume_cycle(c: &mut Criterion) {
    let t0 = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
    c.bench_function("start/pause/resume/stop", |b| {
        b.iter(|| {
            let s = timer::start(None, Some(25), t0).unwrap();
            let p = timer::pause(Some(s.session()), t0 + Duration::seconds(300)).unwrap();
            let r = timer::start(Some(&p), None, t0 + Duration::seconds(400)).unwrap();
            timer::stop(Some(r.session()), None, black_box(t0 + Duration::seconds(900))).unwrap()
        });
    });
}

criterion_group!(
    benches,
    bench_award,
    bench_level_to_multiplier,
    bench_pause_resume_cycle
);
criterion_main!(benches);
