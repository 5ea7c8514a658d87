//! Oracle Benchmark Suite - Safety Check vs Deadlock Detection
//!
//! Both engines share one reduction skeleton; the scan restarts from slot 0
//! after every reduction, so the worst case is an order in which only the
//! highest unfinished slot is reducible at each step.
//!
//! # Scenarios
//!
//! 1. **Reverse chain**: slot `i` can only run after slot `i + 1` returns
//!    its units. Exercises the restart cost.
//! 2. **All reducible**: every slot fits on the first pass.
//! 3. **Full deadlock**: nothing reduces; one pass and out.
//! 4. **Manager round trip**: uncontended request + release through the
//!    lock, with the safety check inside.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use krepis_allocator::{
    AllocationPolicy, DeadlockDetector, ManagerConfig, ResourceManager, ResourceState,
    SafetyOracle, Units,
};

const TYPES: usize = 8;

// ============================================================================
// Fixtures
// ============================================================================

/// One unit free; slot `i` needs `n - i`, so only the last slot fits at first
fn reverse_chain(n: usize) -> ResourceState {
    let existing = vec![(n + 1) as Units; TYPES];
    let allocation = vec![vec![1; TYPES]; n];
    let claim = (0..n).map(|i| vec![(n - i + 1) as Units; TYPES]).collect();
    ResourceState::from_matrices(
        AllocationPolicy::Avoidance,
        existing,
        allocation,
        vec![vec![0; TYPES]; n],
        Some(claim),
        vec![false; n],
    )
    .unwrap()
}

fn all_reducible(n: usize) -> ResourceState {
    let existing = vec![(2 * n) as Units; TYPES];
    let allocation = vec![vec![1; TYPES]; n];
    let claim = vec![vec![2; TYPES]; n];
    ResourceState::from_matrices(
        AllocationPolicy::Avoidance,
        existing,
        allocation,
        vec![vec![0; TYPES]; n],
        Some(claim),
        vec![false; n],
    )
    .unwrap()
}

/// Every unit held, every worker waiting for one more
fn full_deadlock(n: usize) -> ResourceState {
    ResourceState::from_matrices(
        AllocationPolicy::Detection,
        vec![n as Units; TYPES],
        vec![vec![1; TYPES]; n],
        vec![vec![1; TYPES]; n],
        None,
        vec![false; n],
    )
    .unwrap()
}

// ============================================================================
// Benchmarks
// ============================================================================

fn bench_safety_oracle(c: &mut Criterion) {
    let mut group = c.benchmark_group("safety_oracle");

    for n in [4usize, 16, 64].iter() {
        let chain = reverse_chain(*n);
        group.bench_with_input(BenchmarkId::new("reverse_chain", n), &chain, |b, state| {
            b.iter(|| black_box(SafetyOracle::is_safe(black_box(state))))
        });

        let easy = all_reducible(*n);
        group.bench_with_input(BenchmarkId::new("all_reducible", n), &easy, |b, state| {
            b.iter(|| black_box(SafetyOracle::is_safe(black_box(state))))
        });
    }

    group.finish();
}

fn bench_deadlock_detector(c: &mut Criterion) {
    let mut group = c.benchmark_group("deadlock_detector");

    for n in [4usize, 16, 64].iter() {
        let stuck = full_deadlock(*n);
        group.bench_with_input(BenchmarkId::new("full_deadlock", n), &stuck, |b, state| {
            b.iter(|| black_box(DeadlockDetector::detect(black_box(state))))
        });
    }

    group.finish();
}

fn bench_manager_round_trip(c: &mut Criterion) {
    let mut group = c.benchmark_group("manager_round_trip");

    for policy in [AllocationPolicy::Avoidance, AllocationPolicy::Detection] {
        let config = ManagerConfig::builder()
            .workers(16)
            .existing(vec![16; TYPES])
            .policy(policy)
            .build();
        let rm = ResourceManager::new(config).unwrap();
        let token = rm.register_start(0).unwrap();
        if policy.is_avoidance() {
            rm.declare_claim(&token, &[4; TYPES]).unwrap();
        }
        let req = [1; TYPES];

        group.bench_function(policy.to_string(), |b| {
            b.iter(|| {
                rm.request(&token, black_box(&req)).unwrap();
                rm.release(&token, black_box(&req)).unwrap();
            })
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_safety_oracle,
    bench_deadlock_detector,
    bench_manager_round_trip
);
criterion_main!(benches);
