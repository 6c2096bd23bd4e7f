//! Engine-level behavior of the manager and tasks, driven through
//! `update(now)` with explicit instants.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use cotick::{handler, Config, RuntimeError, Step, StepCtx, Task, TaskError, TaskManager};

fn manager() -> TaskManager {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
    TaskManager::new(Config::default())
}

#[test]
fn clock_is_monotonic_and_count_increments_by_one() {
    let mut mgr = manager();
    let seen: Rc<RefCell<Vec<(f64, u64)>>> = Rc::new(RefCell::new(Vec::new()));

    let sink = seen.clone();
    mgr.spawn_fn("clock", move |cx: &StepCtx| {
        sink.borrow_mut().push((cx.time, cx.count));
        Ok(Step::Sleep(0.1))
    });

    for i in 0..6 {
        mgr.update(i as f64 * 0.1).unwrap();
    }

    let seen = seen.borrow();
    assert_eq!(seen.len(), 6);
    for pair in seen.windows(2) {
        assert!(pair[1].0 > pair[0].0, "time must strictly increase");
        assert_eq!(pair[1].1, pair[0].1 + 1, "count must step by one");
    }
}

#[test]
fn sleep_catches_up_on_irregular_ticks() {
    let mut mgr = manager();
    let task = mgr.spawn_fn("sleeper", |_cx| Ok(Step::Sleep(0.1)));

    for now in [0.0, 0.05, 0.09, 0.11, 0.19, 0.21] {
        mgr.update(now).unwrap();
    }
    // resumptions at virtual 0.0, >=0.1, >=0.2
    assert_eq!(task.count(), 3);
}

#[test]
fn sleep_catches_up_within_a_single_update() {
    let mut mgr = manager();
    let seen: Rc<RefCell<Vec<(f64, f64)>>> = Rc::new(RefCell::new(Vec::new()));

    let sink = seen.clone();
    let task = mgr.spawn_fn("burst", move |cx: &StepCtx| {
        sink.borrow_mut().push((cx.time, cx.dtime));
        Ok(Step::Sleep(0.1))
    });

    mgr.update(0.0).unwrap();
    mgr.update(0.35).unwrap();

    // one resumption per elapsed multiple, each seeing nominal time
    assert_eq!(task.count(), 4);
    let seen = seen.borrow();
    assert_eq!(seen[0], (0.0, 0.0));
    for (i, (time, dtime)) in seen.iter().enumerate().skip(1) {
        assert!((time - i as f64 * 0.1).abs() < 1e-9);
        assert!((dtime - 0.1).abs() < 1e-9);
    }
}

#[test]
fn catchup_can_be_capped() {
    let mut mgr = TaskManager::new(Config {
        max_catchup: 2,
        ..Config::default()
    });
    let task = mgr.spawn_fn("capped", |_cx| Ok(Step::Sleep(0.1)));

    mgr.update(0.0).unwrap();
    mgr.update(1.0).unwrap(); // cap reached mid catch-up: 2 resumptions

    assert_eq!(task.count(), 3);

    mgr.update(1.0001).unwrap(); // leftover carries over
    assert_eq!(task.count(), 5);
}

#[test]
fn first_tick_anchors_tasks_added_beforehand() {
    let mut mgr = manager();
    let task = mgr.spawn_fn("early", |_cx| Ok(Step::Sleep(0.1)));

    // a driver supplying absolute time must not trigger a catch-up replay
    mgr.update(1000.0).unwrap();
    assert_eq!(task.count(), 1, "exactly one resumption on the first tick");
    assert_eq!(task.epoch(), 1000.0);

    mgr.update(1000.1).unwrap();
    assert_eq!(task.count(), 2);
}

#[test]
fn task_time_tracks_the_driver_instant() {
    let mut mgr = manager();
    let task = mgr.spawn_fn("t", |_cx| Ok(Step::Sleep(0.1)));

    mgr.update(0.0).unwrap();
    mgr.update(0.07).unwrap(); // not due, the clock still advances
    assert!((task.time() - 0.07).abs() < 1e-9);

    mgr.update(0.25).unwrap(); // catch-up resumed at nominal 0.1 and 0.2
    assert_eq!(task.count(), 3);
    assert!(
        (task.time() - 0.25).abs() < 1e-9,
        "after the tick the task reads the wall, not its last nominal resumption"
    );
}

#[test]
fn tick_resumes_exactly_once_per_update() {
    let mut mgr = manager();
    let task = mgr.spawn_fn("frame", |_cx| Ok(Step::Tick));

    for i in 0..5 {
        mgr.update(i as f64 * 0.1).unwrap();
    }
    assert_eq!(task.count(), 5);

    // a large gap still yields a single resumption
    mgr.update(10.0).unwrap();
    assert_eq!(task.count(), 6);
}

#[test]
fn add_is_idempotent_for_the_same_handle() {
    let mut mgr = manager();
    let task = Task::from_fn("once", |_cx| Ok(Step::Tick));

    mgr.add(task.clone());
    mgr.add(task.clone());
    assert_eq!(mgr.len(), 1);

    mgr.update(0.0).unwrap();
    assert_eq!(task.count(), 1);
}

#[test]
fn join_resumes_in_the_tick_the_dependency_finalizes() {
    let mut mgr = manager();

    let b = Task::from_fn("b", |cx: &StepCtx| {
        if cx.count == 1 {
            Ok(Step::Sleep(0.25))
        } else {
            Ok(Step::Done)
        }
    });

    let dep = b.clone();
    let resumed_after_join: Rc<Cell<bool>> = Rc::new(Cell::new(false));
    let flag = resumed_after_join.clone();
    let a = Task::from_fn("a", move |cx: &StepCtx| {
        if cx.count == 1 {
            return Ok(Step::Join(dep.clone()));
        }
        flag.set(true);
        Ok(Step::Done)
    });

    mgr.add(a.clone());
    mgr.add(b.clone());

    mgr.update(0.0).unwrap();
    mgr.update(0.1).unwrap();
    assert!(!resumed_after_join.get(), "a must not resume before b ends");
    assert_eq!(a.count(), 1);

    mgr.update(0.25).unwrap();
    assert!(b.is_finalized());
    assert!(a.is_finalized(), "a resumes in the tick b finalizes");
    assert!(resumed_after_join.get());
}

#[test]
fn join_on_already_finalized_task_wakes_immediately() {
    let mut mgr = manager();

    let b = Task::from_fn("b", |_cx| Ok(Step::Done));
    mgr.add(b.clone());
    mgr.update(0.0).unwrap();
    assert!(b.is_finalized());

    let dep = b.clone();
    let a = mgr.spawn_fn("a", move |cx: &StepCtx| {
        if cx.count == 1 {
            Ok(Step::Join(dep.clone()))
        } else {
            Ok(Step::Done)
        }
    });

    mgr.update(0.1).unwrap();
    assert!(a.is_finalized());
}

#[test]
fn join_wake_presents_the_wall_clock() {
    let mut mgr = manager();

    let b = Task::from_fn("b", |cx: &StepCtx| {
        if cx.count == 1 {
            Ok(Step::Sleep(0.5))
        } else {
            Ok(Step::Done)
        }
    });

    let seen: Rc<RefCell<Vec<(f64, f64)>>> = Rc::new(RefCell::new(Vec::new()));
    let dep = b.clone();
    let sink = seen.clone();
    let a = Task::from_fn("a", move |cx: &StepCtx| {
        sink.borrow_mut().push((cx.time, cx.dtime));
        match cx.count {
            1 => Ok(Step::Join(dep.clone())),
            2 => Ok(Step::Sleep(0.1)),
            _ => Ok(Step::Done),
        }
    });

    mgr.add(a.clone());
    mgr.add(b);

    mgr.update(0.0).unwrap();
    mgr.update(0.5).unwrap(); // b finalizes; a wakes within this tick
    mgr.update(0.55).unwrap(); // a's fresh sleep not due yet
    assert_eq!(a.count(), 2);
    mgr.update(0.6).unwrap();
    assert!(a.is_finalized());

    let seen = seen.borrow();
    assert!((seen[1].0 - 0.5).abs() < 1e-9, "wake observes the wall instant");
    assert!((seen[1].1 - 0.5).abs() < 1e-9, "dtime spans the blocked wait");
    assert!((seen[2].0 - 0.6).abs() < 1e-9, "the blocked interval is not replayed");
}

#[test]
fn routine_can_retire_another_task_mid_step() {
    let mut mgr = manager();
    let victim = mgr.spawn_fn("victim", |_cx| Ok(Step::Sleep(10.0)));

    let fired: Rc<Cell<u32>> = Rc::new(Cell::new(0));
    let sink = fired.clone();
    victim.on_finished(handler(move |_: &Task| sink.set(sink.get() + 1)));

    let spawner = mgr.spawner();
    let target = victim.clone();
    mgr.spawn_fn("canceller", move |_cx| {
        spawner.retire(target.clone());
        Ok(Step::Done)
    });

    mgr.update(0.0).unwrap();
    assert!(victim.is_finalized(), "retirement lands within the tick");
    assert_eq!(fired.get(), 1, "finished fires like a forced removal");
    assert!(mgr.is_empty());

    // retiring a task the manager no longer owns is a harmless no-op
    mgr.spawner().retire(victim.clone());
    mgr.update(0.1).unwrap();
    assert_eq!(fired.get(), 1);
}

#[test]
fn remove_fires_finished_exactly_once_even_when_suspended() {
    let mut mgr = manager();
    let task = mgr.spawn_fn("idle", |_cx| Ok(Step::Sleep(10.0)));
    mgr.update(0.0).unwrap();

    task.suspend();
    let fired: Rc<Cell<u32>> = Rc::new(Cell::new(0));
    let sink = fired.clone();
    task.on_finished(handler(move |_: &Task| sink.set(sink.get() + 1)));

    assert!(mgr.remove(&task));
    assert_eq!(fired.get(), 1);
    assert!(task.is_finalized());
    assert!(!task.alive());

    // removing again is a harmless no-op
    assert!(!mgr.remove(&task));
    assert_eq!(fired.get(), 1);
}

#[test]
fn completion_scenario_matches_expected_counts() {
    let mut mgr = manager();
    let task = mgr.spawn_fn("t", |cx: &StepCtx| {
        if cx.count <= 2 {
            Ok(Step::Sleep(0.1))
        } else {
            Ok(Step::Done)
        }
    });

    mgr.update(0.0).unwrap();
    assert_eq!(task.count(), 1);
    mgr.update(0.05).unwrap();
    assert_eq!(task.count(), 1);
    mgr.update(0.1).unwrap();
    assert_eq!(task.count(), 2);
    mgr.update(0.2).unwrap();
    assert_eq!(task.count(), 3);
    assert!(!task.alive());
    assert!(mgr.is_empty());
}

#[test]
fn task_spawned_mid_tick_runs_before_the_tick_ends() {
    let mut mgr = manager();
    let spawner = mgr.spawner();
    let child: Rc<RefCell<Option<Task>>> = Rc::new(RefCell::new(None));

    let slot = child.clone();
    mgr.spawn_fn("parent", move |_cx| {
        let task = spawner.spawn_fn("child", |_cx| Ok(Step::Tick));
        *slot.borrow_mut() = Some(task);
        Ok(Step::Done)
    });

    mgr.update(5.0).unwrap();
    let child = child.borrow();
    let child = child.as_ref().unwrap();
    assert_eq!(child.count(), 1, "child resumed within the spawning tick");
    assert_eq!(child.epoch(), 5.0, "virtual clock starts at admission");
    assert_eq!(mgr.len(), 1);
}

#[test]
fn fault_finalizes_detaches_and_surfaces() {
    let mut mgr = manager();
    let fired: Rc<Cell<u32>> = Rc::new(Cell::new(0));

    let task = mgr.spawn_fn("bad", |cx: &StepCtx| {
        if cx.count == 1 {
            Ok(Step::Sleep(0.1))
        } else {
            Err(TaskError::fail("boom"))
        }
    });
    let sink = fired.clone();
    task.on_finished(handler(move |_: &Task| sink.set(sink.get() + 1)));

    mgr.update(0.0).unwrap();
    let err = mgr.update(0.1).unwrap_err();
    assert!(matches!(err, RuntimeError::TaskFaulted { .. }));
    assert_eq!(err.as_label(), "task_faulted");

    assert!(task.is_finalized());
    assert_eq!(fired.get(), 1, "dependents are not left hanging");
    assert!(mgr.is_empty());

    // the next tick proceeds normally
    mgr.update(0.2).unwrap();
}

#[test]
fn resume_on_finalized_task_is_an_error() {
    let mut mgr = manager();
    let task = mgr.spawn_fn("short", |_cx| Ok(Step::Done));
    mgr.update(0.0).unwrap();

    let err = task.resume().unwrap_err();
    assert_eq!(err.as_label(), "resume_finalized");

    // suspend/resume are idempotent on live tasks
    let live = mgr.spawn_fn("live", |_cx| Ok(Step::Sleep(1.0)));
    live.suspend();
    live.suspend();
    live.resume().unwrap();
    live.resume().unwrap();
}

#[test]
fn finalizer_runs_once_on_completion_and_on_removal() {
    let mut mgr = manager();

    let ran: Rc<Cell<u32>> = Rc::new(Cell::new(0));
    let sink = ran.clone();
    let done = Task::from_fn("done", |_cx| Ok(Step::Done))
        .with_finalizer(move |_cx| sink.set(sink.get() + 1));
    mgr.add(done);
    mgr.update(0.0).unwrap();
    assert_eq!(ran.get(), 1);

    let sink = ran.clone();
    let forced = Task::from_fn("forced", |_cx| Ok(Step::Sleep(10.0)))
        .with_finalizer(move |_cx| sink.set(sink.get() + 1));
    mgr.add(forced.clone());
    mgr.update(0.1).unwrap();
    mgr.remove(&forced);
    assert_eq!(ran.get(), 2);
}

#[test]
fn running_count_tracks_active_non_daemon_tasks() {
    let mut mgr = manager();
    let gauge = mgr.gauge();

    let work = mgr.spawn_fn("work", |_cx| Ok(Step::Sleep(10.0)));
    mgr.add(Task::daemon("watcher", cotick::RoutineFn::boxed(|_cx| Ok(Step::Sleep(1.0)))));
    mgr.update(0.0).unwrap();
    assert_eq!(gauge.get(), 1, "daemons do not count as running work");

    work.suspend();
    mgr.update(0.1).unwrap();
    assert_eq!(gauge.get(), 0);
    assert!(gauge.is_idle());

    work.resume().unwrap();
    mgr.update(0.2).unwrap();
    assert_eq!(gauge.get(), 1);
}
