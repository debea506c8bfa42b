use super::*;

#[test]
fn ids_start_at_one_and_grow() {
    let mut pool = IdPool::new();
    assert_eq!(pool.acquire().get(), 1);
    assert_eq!(pool.acquire().get(), 2);
    assert_eq!(pool.acquire().get(), 3);
}

#[test]
fn released_ids_are_reused_last_in_first_out() {
    let mut pool = IdPool::new();
    let a = pool.acquire();
    let b = pool.acquire();
    pool.release(a);
    pool.release(b);
    assert_eq!(pool.pooled(), 2);
    assert_eq!(pool.acquire(), b);
    assert_eq!(pool.acquire(), a);
    assert_eq!(pool.acquire().get(), 3);
}

#[test]
fn outstanding_ids_are_never_handed_out_twice() {
    let mut pool = IdPool::with_capacity(4);
    let mut outstanding = crate::collections::map::HashSet::default();
    for round in 0..50 {
        let id = pool.acquire();
        assert!(outstanding.insert(id), "{id} handed out while outstanding");
        if round % 3 == 0 {
            let released = *outstanding.iter().min().unwrap();
            outstanding.remove(&released);
            pool.release(released);
        }
    }
}

#[test]
fn releases_past_capacity_are_dropped() {
    let mut pool = IdPool::with_capacity(2);
    let ids: Vec<_> = (0..3).map(|_| pool.acquire()).collect();
    for id in &ids {
        pool.release(*id);
    }
    assert_eq!(pool.pooled(), 2);
    assert_eq!(pool.acquire(), ids[1]);
    assert_eq!(pool.acquire(), ids[0]);
    assert_eq!(pool.acquire().get(), 4);
}

#[test]
fn none_is_never_pooled() {
    let mut pool = IdPool::new();
    pool.release(TimerId::NONE);
    assert_eq!(pool.pooled(), 0);
    assert!(!TimerId::NONE.is_some());
    assert_eq!(TimerId::default(), TimerId::NONE);
}

#[test]
fn shared_pool_is_visible_through_every_handle() {
    let pool = SharedIdPool::new();
    let other = pool.clone();
    let id = pool.acquire();
    other.release(id);
    assert_eq!(pool.pooled(), 1);
    assert_eq!(pool.acquire(), id);
}
