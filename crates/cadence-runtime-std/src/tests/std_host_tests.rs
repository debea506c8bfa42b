use super::*;
use cadence_core::{DebounceOptions, ThrottleOptions};
use std::cell::Cell;

#[test]
fn std_clock_is_monotonic() {
    let clock = StdClock::new();
    let first = clock.now_millis();
    std::thread::sleep(Duration::from_millis(2));
    let second = clock.now_millis();
    assert!(second >= first + 1.0);
    assert!(clock.elapsed() >= Duration::from_millis(2));
}

#[test]
fn timeouts_run_in_deadline_order() {
    let host = StdHost::new();
    let order = Rc::new(RefCell::new(Vec::new()));
    for (label, delay) in [("b", 6), ("a", 2), ("c", 10)] {
        let order = Rc::clone(&order);
        host.set_timeout(Box::new(move || order.borrow_mut().push(label)), delay);
    }

    host.run_until_idle();
    assert_eq!(*order.borrow(), vec!["a", "b", "c"]);
    assert!(!host.has_pending_work());
}

#[test]
fn controller_timers_and_batched_removal_settle() {
    let host = StdHost::new();
    let controller = host.controller();
    let fired = Rc::new(Cell::new(0));
    for delay in [1, 1, 2] {
        let fired = Rc::clone(&fired);
        controller.set_timeout(move || fired.set(fired.get() + 1), delay);
    }

    host.run_until_idle();
    assert_eq!(fired.get(), 3);
    assert_eq!(controller.active_timers(), 0);
}

#[test]
fn interval_stops_when_controller_disposes() {
    let host = StdHost::new();
    let controller = host.controller();
    let ticks = Rc::new(Cell::new(0));
    let (count, owner) = (Rc::clone(&ticks), controller.clone());
    controller.set_interval(
        move || {
            count.set(count.get() + 1);
            if count.get() == 3 {
                owner.dispose();
            }
        },
        1,
    );

    host.run_until_idle();
    assert_eq!(ticks.get(), 3);
    assert_eq!(host.pending_timers(), 0);
}

#[test]
fn emulated_frames_receive_a_timestamp() {
    let host = StdHost::new();
    let controller = host.controller();
    let stamp = Rc::new(Cell::new(-1.0));
    let seen = Rc::clone(&stamp);
    controller.request_animation_frame(move |timestamp| seen.set(timestamp), None);
    assert_eq!(host.pending_frames(), 1);

    host.run_until_idle();
    assert!(stamp.get() >= 0.0);
}

#[test]
fn frames_fall_back_to_timers_when_disabled() {
    let host = StdHost::with_config(StdHostConfig {
        animation_frames: false,
        ..StdHostConfig::default()
    });
    let controller = host.controller();
    let ran = Rc::new(Cell::new(false));
    let flag = Rc::clone(&ran);
    controller.request_animation_frame(move |_| flag.set(true), None);
    assert_eq!(host.pending_frames(), 0);
    assert_eq!(host.pending_timers(), 1);

    host.run_until_idle();
    assert!(ran.get());
}

#[test]
fn block_on_waits_for_delay() {
    let host = StdHost::new();
    let controller = host.controller();
    let started = Instant::now();

    assert_eq!(host.block_on(controller.delay(5)), Some(()));
    assert!(started.elapsed() >= Duration::from_millis(5));
}

#[test]
fn block_on_gives_up_when_delay_cannot_finish() {
    let host = StdHost::new();
    let controller = host.controller();
    controller.dispose();

    assert_eq!(host.block_on(controller.delay(5)), None);
}

#[test]
fn throttle_and_debounce_on_wall_clock() {
    let host = StdHost::new();
    let controller = host.controller();
    let throttled_runs = Rc::new(Cell::new(0));
    let debounced_runs = Rc::new(Cell::new(0));

    let counter = Rc::clone(&throttled_runs);
    let throttled = controller.throttle(
        move |_: ()| counter.set(counter.get() + 1),
        50,
        ThrottleOptions::default(),
    );
    let counter = Rc::clone(&debounced_runs);
    let debounced = controller.debounce(
        move |_: ()| counter.set(counter.get() + 1),
        5,
        DebounceOptions::default(),
    );

    throttled.call(());
    throttled.call(());
    debounced.call(());
    debounced.call(());
    assert_eq!(throttled_runs.get(), 1);
    assert_eq!(debounced_runs.get(), 0);

    host.run_until_idle();
    assert_eq!(throttled_runs.get(), 2);
    assert_eq!(debounced_runs.get(), 1);
}

#[test]
fn clearing_a_timeout_that_owns_another_controller_releases_its_timers() {
    let host = StdHost::new();
    let parent = host.controller();
    let child = host.controller();
    child.set_timeout(|| {}, 100);
    let id = parent.set_timeout(move || child.dispose(), 50);
    assert_eq!(host.pending_timers(), 2);

    parent.clear_timeout(id);
    assert_eq!(host.pending_timers(), 0);
    assert!(!host.has_pending_work());
}

#[test]
fn cancelling_a_frame_that_owns_a_delay_cancels_the_delay() {
    let host = StdHost::new();
    let controller = host.controller();
    let delay = controller.delay(100);
    let id = controller.request_animation_frame(move |_| drop(delay), None);
    assert_eq!(host.pending_frames(), 1);

    controller.cancel_animation_frame(id);
    assert!(!host.has_pending_work());
    assert_eq!(controller.active_timers(), 0);
}
