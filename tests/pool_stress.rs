use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use warehouse::pool::{Pool, PoolInit};

struct TestObj {
    id: u64,
}

/// Seed scenario 5: pool of `start=5, max=10`; 50 threads each perform 100
/// iterations of `{acquire, sleep 5ms, release}`. Expect zero acquire
/// failures and zero exclusivity violations (no two live handles ever
/// observe the same item id at once).
#[test]
fn pool_parallel_stress() {
    let next_id = Arc::new(Mutex::new(0u64));
    let pool: Pool<TestObj> = Pool::new(5, 10, PoolInit::Sequential, move || {
        let mut next = next_id.lock().unwrap();
        let id = *next;
        *next += 1;
        Ok(TestObj { id })
    })
    .unwrap();

    let in_use_ids: Arc<Mutex<HashSet<u64>>> = Arc::new(Mutex::new(HashSet::new()));
    let violations = Arc::new(Mutex::new(0usize));
    let acquire_failures = Arc::new(Mutex::new(0usize));

    std::thread::scope(|scope| {
        for _ in 0..50 {
            let pool = pool.clone();
            let in_use_ids = Arc::clone(&in_use_ids);
            let violations = Arc::clone(&violations);
            let acquire_failures = Arc::clone(&acquire_failures);
            scope.spawn(move || {
                for _ in 0..100 {
                    match pool.get_timeout(Duration::from_secs(5)) {
                        Ok(handle) => {
                            let inserted = in_use_ids.lock().unwrap().insert(handle.id);
                            if !inserted {
                                *violations.lock().unwrap() += 1;
                            }
                            std::thread::sleep(Duration::from_millis(5));
                            in_use_ids.lock().unwrap().remove(&handle.id);
                        }
                        Err(_) => {
                            *acquire_failures.lock().unwrap() += 1;
                        }
                    }
                }
            });
        }
    });

    assert_eq!(*acquire_failures.lock().unwrap(), 0);
    assert_eq!(*violations.lock().unwrap(), 0);
    assert!(pool.current_size() <= 10);
}
