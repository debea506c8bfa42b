//! Randomised call streams against the throttle and debounce wrappers.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use cadence_core::{DebounceOptions, ThrottleOptions};
use cadence_testing::TestHost;
use proptest::prelude::*;

const SETTLE_MS: u64 = 10_000;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Step {
    Call(u64),
    Run { at: u64, inside_call: bool },
}

struct Recorder {
    steps: Rc<RefCell<Vec<Step>>>,
    inside_call: Rc<Cell<bool>>,
}

impl Recorder {
    fn new() -> Self {
        Self {
            steps: Rc::new(RefCell::new(Vec::new())),
            inside_call: Rc::new(Cell::new(false)),
        }
    }

    fn func(&self, host: &Rc<TestHost>) -> impl Fn(u32) -> u32 + 'static {
        let steps = Rc::clone(&self.steps);
        let inside_call = Rc::clone(&self.inside_call);
        let clock = Rc::clone(host);
        move |value| {
            steps.borrow_mut().push(Step::Run {
                at: clock.now(),
                inside_call: inside_call.get(),
            });
            value
        }
    }

    /// Calls at each of `times`, then lets every pending timer run.
    fn drive(&self, host: &TestHost, times: &[u64], call: impl Fn()) -> Vec<Step> {
        for &t in times {
            host.advance_to(t);
            self.steps.borrow_mut().push(Step::Call(t));
            self.inside_call.set(true);
            call();
            self.inside_call.set(false);
        }
        let last = times.last().copied().unwrap_or(0);
        host.advance_to(last + SETTLE_MS);
        self.steps.borrow().clone()
    }
}

fn call_times(gaps: &[u64]) -> Vec<u64> {
    gaps.iter()
        .scan(0, |now, gap| {
            *now += gap;
            Some(*now)
        })
        .collect()
}

fn run_times(steps: &[Step]) -> Vec<u64> {
    steps
        .iter()
        .filter_map(|step| match step {
            Step::Run { at, .. } => Some(*at),
            Step::Call(_) => None,
        })
        .collect()
}

fn runs_after_last_call(steps: &[Step]) -> usize {
    let last_call = steps
        .iter()
        .rposition(|step| matches!(step, Step::Call(_)))
        .unwrap_or(0);
    steps[last_call..]
        .iter()
        .filter(|step| matches!(step, Step::Run { .. }))
        .count()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn throttle_runs_are_spaced_and_settle_once(
        gaps in prop::collection::vec(0_u64..250, 1..40),
        wait in 1_u64..120,
        leading in any::<bool>(),
        trailing in any::<bool>(),
    ) {
        let host = TestHost::new();
        let controller = host.controller();
        let recorder = Recorder::new();
        let throttled =
            controller.throttle(recorder.func(&host), wait, ThrottleOptions { leading, trailing });
        let times = call_times(&gaps);

        let steps = recorder.drive(&host, &times, || {
            throttled.call(0);
        });
        let runs = run_times(&steps);

        for pair in runs.windows(2) {
            prop_assert!(pair[1] - pair[0] >= wait, "runs {pair:?} closer than {wait}ms");
        }
        if leading {
            prop_assert_eq!(steps[1], Step::Run { at: times[0], inside_call: true });
        } else {
            let any_inside_call = steps
                .iter()
                .any(|step| matches!(step, Step::Run { inside_call: true, .. }));
            prop_assert!(!any_inside_call);
        }
        match (leading, trailing) {
            (false, false) => prop_assert!(runs.is_empty()),
            (_, true) => prop_assert_eq!(runs_after_last_call(&steps), 1),
            (true, false) => prop_assert!(runs_after_last_call(&steps) <= 1),
        }
        prop_assert!(!throttled.pending());
    }

    #[test]
    fn debounce_runs_only_after_quiet_or_max_wait(
        gaps in prop::collection::vec(0_u64..250, 1..40),
        wait in 1_u64..120,
        leading in any::<bool>(),
        trailing in any::<bool>(),
        max_wait in prop::option::of(1_u64..300),
    ) {
        let host = TestHost::new();
        let controller = host.controller();
        let recorder = Recorder::new();
        let options = DebounceOptions { leading, trailing, max_wait };
        let debounced = controller.debounce(recorder.func(&host), wait, options);
        let times = call_times(&gaps);

        let steps = recorder.drive(&host, &times, || {
            debounced.call(0);
        });

        let mut last_call: Option<u64> = None;
        let mut previous_call: Option<u64> = None;
        let mut last_run = 0;
        for step in &steps {
            match *step {
                Step::Call(t) => {
                    previous_call = last_call;
                    last_call = Some(t);
                }
                Step::Run { at, inside_call } => {
                    let quiet_since = if inside_call { previous_call } else { last_call };
                    let quiet = quiet_since.map_or(true, |call| at - call >= wait);
                    let overdue = max_wait.is_some_and(|max_wait| at - last_run >= max_wait);
                    let allowed = if inside_call {
                        (leading && quiet) || overdue
                    } else {
                        quiet || overdue
                    };
                    prop_assert!(allowed, "unexpected run at {at}ms in {steps:?}");
                    last_run = at;
                }
            }
        }

        if !leading && !trailing {
            prop_assert!(run_times(&steps).is_empty());
        }
        if trailing {
            prop_assert_eq!(runs_after_last_call(&steps), 1);
        } else {
            prop_assert!(runs_after_last_call(&steps) <= 1);
        }
        prop_assert!(!debounced.pending());
    }

    #[test]
    fn debounce_max_wait_bounds_the_gap_between_runs(
        gaps in prop::collection::vec(0_u64..80, 1..60),
        wait in 20_u64..120,
        max_wait in 1_u64..200,
        leading in any::<bool>(),
    ) {
        let host = TestHost::new();
        let controller = host.controller();
        let recorder = Recorder::new();
        let options = DebounceOptions { leading, trailing: true, max_wait: Some(max_wait) };
        let debounced = controller.debounce(recorder.func(&host), wait, options);
        let times = call_times(&gaps);

        let steps = recorder.drive(&host, &times, || {
            debounced.call(0);
        });

        let mut last_run = 0;
        let mut first_call_since_run: Option<u64> = None;
        for step in &steps {
            match *step {
                Step::Call(t) => {
                    first_call_since_run.get_or_insert(t);
                }
                Step::Run { at, .. } => {
                    if let Some(first_call) = first_call_since_run.take() {
                        let deadline = (last_run + max_wait).max(first_call);
                        prop_assert!(
                            at <= deadline,
                            "run at {at}ms later than {deadline}ms in {steps:?}"
                        );
                    }
                    last_run = at;
                }
            }
        }
        prop_assert!(first_call_since_run.is_none());
    }
}
