//! Integration Test: Invariants Under Contention
//!
//! Many workers hammer one manager while an observer keeps taking
//! snapshots. Every snapshot must satisfy conservation and, under
//! avoidance, be safe.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use krepis_allocator::{ManagerConfig, ResourceManager, SafetyOracle, Units};

const WORKERS: usize = 8;
const ROUNDS: usize = 40;

fn manager(existing: Vec<Units>, avoid: bool) -> Arc<ResourceManager> {
    let config = ManagerConfig::builder()
        .workers(WORKERS)
        .existing(existing)
        .avoidance(avoid)
        .build();
    Arc::new(ResourceManager::new(config).unwrap())
}

/// Snapshot continuously until `done`; returns how many were checked
fn spawn_observer(rm: Arc<ResourceManager>, done: Arc<AtomicBool>, avoid: bool) -> thread::JoinHandle<usize> {
    thread::spawn(move || {
        let mut checked = 0;
        while !done.load(Ordering::Acquire) {
            let snap = rm.snapshot();
            assert_eq!(snap.check_invariants(), Ok(()));
            if avoid {
                assert!(SafetyOracle::is_safe(&snap), "unsafe state escaped the lock");
            }
            checked += 1;
            thread::yield_now();
        }
        checked
    })
}

#[test]
fn test_avoidance_stress_keeps_states_safe() {
    let existing = vec![6, 4, 5];
    let rm = manager(existing.clone(), true);
    let done = Arc::new(AtomicBool::new(false));
    let observer = spawn_observer(Arc::clone(&rm), Arc::clone(&done), true);

    let workers: Vec<_> = (0..WORKERS)
        .map(|slot| {
            let rm = Arc::clone(&rm);
            let claim: Vec<Units> = existing
                .iter()
                .enumerate()
                .map(|(j, &e)| ((slot + j) % 3 + 1).min(e as usize) as Units)
                .collect();
            thread::spawn(move || {
                let token = rm.register_start(slot).unwrap();
                rm.declare_claim(&token, &claim).unwrap();

                // Climb to the full claim one unit at a time, then drop it all.
                for _ in 0..ROUNDS {
                    for (j, &units) in claim.iter().enumerate() {
                        let mut unit = vec![0; claim.len()];
                        unit[j] = 1;
                        for _ in 0..units {
                            rm.request(&token, &unit).unwrap();
                        }
                    }
                    rm.release(&token, &claim).unwrap();
                }
                rm.register_end(token).unwrap();
            })
        })
        .collect();

    for w in workers {
        w.join().unwrap();
    }
    done.store(true, Ordering::Release);
    assert!(observer.join().unwrap() > 0);

    let snap = rm.snapshot();
    assert_eq!(snap.available(), existing.as_slice());
    assert!(snap.workers().all(|s| snap.is_finished(s)));
}

#[test]
fn test_detection_stress_conserves_units() {
    let existing = vec![WORKERS as Units * 2, WORKERS as Units];
    let rm = manager(existing.clone(), false);
    let done = Arc::new(AtomicBool::new(false));
    let observer = spawn_observer(Arc::clone(&rm), Arc::clone(&done), false);

    let workers: Vec<_> = (0..WORKERS)
        .map(|slot| {
            let rm = Arc::clone(&rm);
            thread::spawn(move || {
                let token = rm.register_start(slot).unwrap();
                for round in 0..ROUNDS {
                    let req = [2, (round % 2) as Units];
                    rm.request(&token, &req).unwrap();
                    rm.release(&token, &req).unwrap();
                }
                rm.register_end(token).unwrap();
            })
        })
        .collect();

    for w in workers {
        w.join().unwrap();
    }
    done.store(true, Ordering::Release);
    observer.join().unwrap();

    assert_eq!(rm.snapshot().available(), existing.as_slice());
    assert_eq!(rm.detect_deadlock().count(), 0);
}

#[test]
fn test_tokens_move_between_threads() {
    let rm = manager(vec![2], false);
    let token = rm.register_start(3).unwrap();
    rm.request(&token, &[1]).unwrap();

    let worker = Arc::clone(&rm);
    thread::spawn(move || {
        worker.release(&token, &[1]).unwrap();
        worker.register_end(token).unwrap();
    })
    .join()
    .unwrap();

    assert_eq!(rm.snapshot().available(), &[2]);
}
