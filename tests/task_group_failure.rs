use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use warehouse::error::{Error, TaskError, TaskGroupError};
use warehouse::task::TaskGroup;

/// Seed scenario 6: a task group with limit 4, five tasks (three succeed, two
/// fail with messages "E1"/"E2"). After `wait()`: 3 succeeded, 2 failed, and
/// `exception_info()` names both failing tasks.
#[test]
fn failure_aggregation_without_stop_on_error() {
    let group = TaskGroup::new(4);
    let succeeded = Arc::new(AtomicUsize::new(0));

    for i in 0..3 {
        let succeeded = Arc::clone(&succeeded);
        group.add(format!("ok-{i}"), move |_| {
            succeeded.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
    }
    group.add("bad-e1", |_| {
        Err(TaskError::Failed {
            name: "bad-e1".to_string(),
            cause: Error::new("E1"),
        })
    });
    group.add("bad-e2", |_| {
        Err(TaskError::Failed {
            name: "bad-e2".to_string(),
            cause: Error::new("E2"),
        })
    });

    let result = group.wait();
    assert!(matches!(result, Err(TaskGroupError::Failed(2))));
    assert_eq!(succeeded.load(Ordering::SeqCst), 3);

    let exceptions = group.exception_info();
    assert_eq!(exceptions.len(), 2);
    let names: Vec<&str> = exceptions.iter().map(|(name, _)| name.as_str()).collect();
    assert!(names.contains(&"bad-e1"));
    assert!(names.contains(&"bad-e2"));
}

/// With `stop_on_error` enabled, the first observed failure cancels the
/// remaining active tasks and `wait()` still reports the failure.
#[test]
fn stop_on_error_cancels_remaining_tasks() {
    let group = TaskGroup::new(4);
    group.set_stop_on_error(true);

    group.add("bad-e1", |_| {
        Err(TaskError::Failed {
            name: "bad-e1".to_string(),
            cause: Error::new("E1"),
        })
    });

    let cancelled = Arc::new(AtomicUsize::new(0));
    let c = Arc::clone(&cancelled);
    group.add("long-runner", move |token| {
        for _ in 0..200 {
            if token.is_cancelled() {
                c.fetch_add(1, Ordering::SeqCst);
                return Err(TaskError::Interrupted);
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        Ok(())
    });

    let result = group.wait();
    assert!(result.is_err());
    assert_eq!(cancelled.load(Ordering::SeqCst), 1);
}
