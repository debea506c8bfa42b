use super::*;
use crate::test_support::QueueHost;
use std::cell::Cell;

fn counting_cleanup(counter: &Rc<Cell<usize>>) -> TimerCleanup {
    let counter = Rc::clone(counter);
    Box::new(move || counter.set(counter.get() + 1))
}

#[test]
fn remove_runs_cleanup_once_and_recycles_id() {
    let pool = SharedIdPool::new();
    let registry = TimerRegistry::new(pool.clone());
    let cleanups = Rc::new(Cell::new(0));
    let id = registry.acquire();
    registry.add_timer(id, TimerKind::Timeout, counting_cleanup(&cleanups));

    assert!(registry.contains(id));
    assert!(registry.remove_timer(id));
    assert!(!registry.remove_timer(id));
    assert_eq!(cleanups.get(), 1);
    assert_eq!(pool.pooled(), 1);
    assert!(registry.is_empty());
}

#[test]
fn batched_removal_uses_one_flush() {
    let host = QueueHost::new();
    let context = host.as_context();
    let registry = TimerRegistry::new(SharedIdPool::new());
    let cleanups = Rc::new(Cell::new(0));
    let ids: Vec<_> = (0..3)
        .map(|_| {
            let id = registry.acquire();
            registry.add_timer(id, TimerKind::Timeout, counting_cleanup(&cleanups));
            id
        })
        .collect();

    for id in &ids {
        registry.schedule_timer_removal(*id, &context);
    }
    assert_eq!(host.pending(), 1);
    assert_eq!(registry.pending_removals(), 3);
    assert!(registry.has_scheduled_flush());
    assert_eq!(registry.len(), 3);

    host.advance(0);
    assert!(registry.is_empty());
    assert_eq!(cleanups.get(), 3);
    assert!(!registry.has_scheduled_flush());
}

#[test]
fn removal_of_untracked_id_is_ignored() {
    let host = QueueHost::new();
    let registry = TimerRegistry::new(SharedIdPool::new());
    registry.schedule_timer_removal(TimerId::NONE, &host.as_context());
    assert_eq!(host.pending(), 0);
    assert_eq!(registry.pending_removals(), 0);
}

#[test]
fn explicit_remove_drops_pending_entry() {
    let host = QueueHost::new();
    let registry = TimerRegistry::new(SharedIdPool::new());
    let cleanups = Rc::new(Cell::new(0));
    let id = registry.acquire();
    registry.add_timer(id, TimerKind::Timeout, counting_cleanup(&cleanups));
    registry.schedule_timer_removal(id, &host.as_context());

    assert!(registry.remove_timer(id));
    assert_eq!(registry.pending_removals(), 0);
    host.advance(0);
    assert_eq!(cleanups.get(), 1);
}

#[test]
fn clear_all_cancels_flush_and_cleans_every_timer() {
    let host = QueueHost::new();
    let pool = SharedIdPool::new();
    let registry = TimerRegistry::new(pool.clone());
    let cleanups = Rc::new(Cell::new(0));
    let fired = registry.acquire();
    registry.add_timer(fired, TimerKind::Timeout, counting_cleanup(&cleanups));
    let interval = registry.acquire();
    registry.add_timer(interval, TimerKind::Interval, counting_cleanup(&cleanups));
    registry.schedule_timer_removal(fired, &host.as_context());
    assert_eq!(registry.count_of(TimerKind::Interval), 1);

    registry.clear_all_timers();
    assert_eq!(host.pending(), 0);
    assert_eq!(cleanups.get(), 2);
    assert_eq!(pool.pooled(), 2);
    assert!(registry.is_empty());
}

#[test]
fn cleanup_may_reenter_registry() {
    let registry = TimerRegistry::new(SharedIdPool::new());
    let first = registry.acquire();
    let second = registry.acquire();
    let inner = registry.clone();
    registry.add_timer(
        first,
        TimerKind::Timeout,
        Box::new(move || {
            inner.remove_timer(second);
        }),
    );
    registry.add_timer(second, TimerKind::Timeout, Box::new(|| {}));

    assert!(registry.remove_timer(first));
    assert!(registry.is_empty());
}
