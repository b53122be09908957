//! Properties that hold for any sequence of operations.

use simon_core::quantiles::Buckets;
use simon_core::{Manager, Simon, SimonPattern, SimonState};

fn pseudo_random(seed: &mut u64) -> u64 {
    // xorshift64
    *seed ^= *seed << 13;
    *seed ^= *seed >> 7;
    *seed ^= *seed << 17;
    *seed
}

#[test]
fn counter_equals_increments_minus_decrements() {
    let manager = Manager::new();
    let counter = manager.get_counter("balance").unwrap();
    let mut seed = 0x9e37_79b9_7f4a_7c15;

    for _ in 0..1_000 {
        let amount = pseudo_random(&mut seed) % 50;
        if pseudo_random(&mut seed) % 2 == 0 {
            counter.increase(amount);
        } else {
            counter.decrease(amount);
        }
    }

    let sample = counter.sample().unwrap();
    assert_eq!(
        sample.counter,
        sample.increment_sum as i64 - sample.decrement_sum as i64
    );
    assert!(sample.min.unwrap() <= sample.counter);
    assert!(sample.max.unwrap() >= sample.counter);
}

#[test]
fn set_does_not_touch_sums() {
    let manager = Manager::new();
    let counter = manager.get_counter("gauge").unwrap();
    counter.increase(4).set(-10).decrease(1);

    let sample = counter.sample().unwrap();
    assert_eq!(sample.counter, -11);
    assert_eq!(sample.increment_sum, 4);
    assert_eq!(sample.decrement_sum, 1);
    assert_eq!(sample.min, Some(-11));
    assert_eq!(sample.max, Some(4));
}

#[test]
fn stopwatch_moments_match_recorded_durations() {
    let manager = Manager::new();
    let stopwatch = manager.get_stopwatch("moments").unwrap();
    let mut seed = 42;
    let durations: Vec<u64> = (0..500)
        .map(|_| pseudo_random(&mut seed) % 1_000_000)
        .collect();

    for &d in &durations {
        stopwatch.add(d);
    }

    let sample = stopwatch.sample().unwrap();
    let n = durations.len() as f64;
    let mean = durations.iter().sum::<u64>() as f64 / n;
    let m2: f64 = durations.iter().map(|&d| (d as f64 - mean).powi(2)).sum();

    assert_eq!(sample.counter, durations.len() as u64);
    assert_eq!(sample.total, durations.iter().sum::<u64>());
    assert_eq!(sample.min, durations.iter().copied().min());
    assert_eq!(sample.max, durations.iter().copied().max());
    assert_eq!(sample.last, *durations.last().unwrap());
    assert!((sample.mean - mean).abs() / mean < 1e-9);
    assert!((sample.variance_n - m2 / n).abs() / (m2 / n) < 1e-9);
    assert!((sample.variance - m2 / (n - 1.0)).abs() / (m2 / (n - 1.0)) < 1e-9);
    assert!((sample.standard_deviation - sample.variance.sqrt()).abs() < 1e-6);
}

#[test]
fn single_split_has_zero_variance() {
    let manager = Manager::new();
    let stopwatch = manager.get_stopwatch("once").unwrap();
    stopwatch.add(123);

    let sample = stopwatch.sample().unwrap();
    assert_eq!(sample.mean, 123.0);
    assert_eq!(sample.variance, 0.0);
    assert_eq!(sample.variance_n, 0.0);
    assert_eq!(sample.standard_deviation, 0.0);
}

#[test]
fn bucket_counts_cover_every_value() {
    let buckets = Buckets::new(100, 900, 8).unwrap();
    let mut seed = 7;
    for _ in 0..2_000 {
        buckets.add_value(pseudo_random(&mut seed) % 1_200);
    }

    let sample = buckets.sample();
    let per_bucket: u64 = sample.buckets.iter().map(|b| b.count).sum();
    assert_eq!(per_bucket, 2_000);
    assert_eq!(buckets.count(), 2_000);
}

#[test]
fn names_include_every_ancestor() {
    let manager = Manager::new();
    manager.get_counter("a.b.c").unwrap();

    assert_eq!(manager.simon_names(), vec!["", "a", "a.b", "a.b.c"]);
}

#[test]
fn effective_state_is_nearest_explicit_ancestor() {
    let manager = Manager::new();
    let names = [
        "a", "a.b", "a.b.c", "a.b.c.d", "a.e", "a.e.f", "g", "g.h", "g.h.i",
    ];
    for name in names {
        manager.get_simon(name).unwrap();
    }

    let mut seed = 99;
    for _ in 0..50 {
        let name = names[(pseudo_random(&mut seed) % names.len() as u64) as usize];
        let state = match pseudo_random(&mut seed) % 3 {
            0 => SimonState::Enabled,
            1 => SimonState::Disabled,
            _ => SimonState::Inherit,
        };
        let cascade = pseudo_random(&mut seed) % 4 == 0;
        manager.get_simon(name).unwrap().set_state(state, cascade);

        for simon in manager.simons(&SimonPattern::new("*")) {
            assert_eq!(
                simon.is_enabled(),
                expected_enabled(&simon),
                "{} after setting {} to {:?}",
                simon.name(),
                name,
                state
            );
        }
    }
}

fn expected_enabled(simon: &Simon) -> bool {
    let mut current = Some(simon.clone());
    while let Some(node) = current {
        match node.state() {
            SimonState::Enabled => return true,
            SimonState::Disabled => return false,
            SimonState::Inherit => current = node.parent(),
        }
    }
    unreachable!("the root always has an explicit state")
}

#[test]
fn reset_clears_measurements() {
    let manager = Manager::new();
    let counter = manager.get_counter("r.counter").unwrap();
    let stopwatch = manager.get_stopwatch("r.stopwatch").unwrap();
    counter.increase(7).decrease(2);
    stopwatch.add(50);
    stopwatch.add(70);

    counter.reset();
    stopwatch.reset();

    let c = counter.sample().unwrap();
    assert_eq!(c.counter, 0);
    assert_eq!(c.increment_sum, 0);
    assert_eq!(c.decrement_sum, 0);
    assert_eq!(c.min, None);
    assert_eq!(c.max, None);

    let s = stopwatch.sample().unwrap();
    assert_eq!(s.counter, 0);
    assert_eq!(s.total, 0);
    assert_eq!(s.min, None);
    assert_eq!(s.max, None);
    assert_eq!(s.mean, 0.0);
    assert_eq!(s.variance_n, 0.0);
}
