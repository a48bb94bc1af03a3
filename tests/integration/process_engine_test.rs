// Process delta engine driven by scripted snapshots

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use taskscope::core::config::ProcessConfig;
use taskscope::core::process::{
    NoInspection, NoOwners, ProcessBackends, ProcessCategory, ProcessDeltaEngine, RawProcessSample,
    UsernameResolver, WindowCatalog, UNKNOWN_OWNER,
};

use super::support::{sample, CountingIcons, Frame, ScriptedSnapshots};

struct OneWindow;

impl WindowCatalog for OneWindow {
    fn application_windows(&mut self) -> HashMap<u32, String> {
        HashMap::from([(1000, "Untitled - Notepad".to_string())])
    }
}

fn config() -> ProcessConfig {
    ProcessConfig {
        tick_interval_ms: 1000,
        resolve_usernames: true,
        resolve_icons: true,
        resolve_command_lines: false,
    }
}

fn engine_with(frames: Vec<Frame>, icons: Arc<CountingIcons>) -> ProcessDeltaEngine {
    let backends = ProcessBackends {
        snapshots: Box::new(ScriptedSnapshots::new(frames)),
        owners: Box::new(NoOwners),
        windows: Box::new(OneWindow),
        inspector: Box::new(NoInspection),
        icons,
    };
    ProcessDeltaEngine::new(backends, config())
}

fn three_processes() -> Vec<RawProcessSample> {
    vec![
        sample(4, "System", 1),
        sample(1000, "notepad.exe", 10),
        sample(1001, "worker.exe", 11),
    ]
}

#[test]
fn test_first_tick_adds_everything_with_zero_rates() {
    let mut engine = engine_with(vec![Frame::ok(5_000_000, three_processes())], Arc::default());

    let delta = engine.tick().unwrap();
    let mut added = delta.added.clone();
    added.sort_unstable();
    assert_eq!(added, vec![4, 1000, 1001]);
    assert!(delta.updated.is_empty());
    assert!(delta.removed.is_empty());
    assert_eq!(delta.system_delta, 0);

    for record in engine.records() {
        assert_eq!(record.cpu_usage, 0.0);
        assert_eq!(record.read_bytes_per_sec, 0);
    }
    assert_eq!(engine.get(4).unwrap().category, ProcessCategory::Background);
    let notepad = engine.get(1000).unwrap();
    assert_eq!(notepad.category, ProcessCategory::Application);
    assert_eq!(notepad.main_window_title, "Untitled - Notepad");
    assert_eq!(engine.get(1001).unwrap().category, ProcessCategory::Background);
}

#[test]
fn test_cpu_share_from_system_delta() {
    let mut busy = three_processes();
    busy[2].user_time = 250_000;
    busy[2].read_bytes = 4096;

    let mut engine = engine_with(
        vec![
            Frame::ok(1_000_000, three_processes()),
            Frame::ok(2_000_000, busy),
        ],
        Arc::default(),
    );
    engine.tick().unwrap();
    let delta = engine.tick().unwrap();

    assert_eq!(delta.system_delta, 1_000_000);
    assert_eq!(delta.updated.len(), 3);
    let worker = engine.get(1001).unwrap();
    assert!((worker.cpu_usage - 25.0).abs() < 1e-9);
    assert_eq!(worker.read_bytes_per_sec, 4096);
    assert_eq!(engine.get(1000).unwrap().cpu_usage, 0.0);
}

#[test]
fn test_cpu_usage_is_bounded() {
    let mut runaway = three_processes();
    runaway[1].kernel_time = 9_000_000;

    let mut engine = engine_with(
        vec![Frame::ok(1_000, three_processes()), Frame::ok(2_000, runaway)],
        Arc::default(),
    );
    engine.tick().unwrap();
    engine.tick().unwrap();

    for record in engine.records() {
        assert!((0.0..=100.0).contains(&record.cpu_usage));
    }
    assert_eq!(engine.get(1000).unwrap().cpu_usage, 100.0);
}

#[test]
fn test_disk_counter_going_backwards_reports_zero() {
    let mut before = three_processes();
    before[2].write_bytes = 1_000_000;
    let mut after = three_processes();
    after[2].write_bytes = 10;

    let mut engine = engine_with(
        vec![Frame::ok(1_000, before), Frame::ok(2_000, after)],
        Arc::default(),
    );
    engine.tick().unwrap();
    engine.tick().unwrap();

    let worker = engine.get(1001).unwrap();
    assert_eq!(worker.write_bytes_per_sec, 0);
    assert_eq!(worker.write_bytes, 10);
}

#[test]
fn test_pid_reuse_is_remove_then_add() {
    let mut reused = three_processes();
    reused[2] = sample(1001, "other.exe", 99);

    let mut engine = engine_with(
        vec![Frame::ok(1_000, three_processes()), Frame::ok(2_000, reused)],
        Arc::default(),
    );
    engine.tick().unwrap();
    let delta = engine.tick().unwrap();

    assert!(delta.added.contains(&1001));
    assert!(delta.removed.iter().any(|r| r.pid == 1001 && r.name == "worker.exe"));
    assert!(!delta.updated.contains(&1001));
    let record = engine.get(1001).unwrap();
    assert_eq!(record.name, "other.exe");
    assert_eq!(record.cpu_usage, 0.0);
}

#[test]
fn test_pid_returning_after_exit_starts_from_zero_baseline() {
    let mut old = three_processes();
    old[2].user_time = 800_000;
    let mut gone = three_processes();
    gone.pop();
    let mut back = three_processes();
    back[2] = sample(1001, "fresh.exe", 500);
    back[2].user_time = 300;
    let mut busy = back.clone();
    busy[2].user_time = 550;

    let mut engine = engine_with(
        vec![
            Frame::ok(1_000, old),
            Frame::ok(2_000, gone),
            Frame::ok(3_000, back),
            Frame::ok(4_000, busy),
        ],
        Arc::default(),
    );
    engine.tick().unwrap();

    let delta = engine.tick().unwrap();
    assert!(delta.removed.iter().any(|r| r.pid == 1001));
    assert!(engine.get(1001).is_none());

    let delta = engine.tick().unwrap();
    assert_eq!(delta.added, vec![1001]);
    let record = engine.get(1001).unwrap();
    assert_eq!(record.name, "fresh.exe");
    assert_eq!(record.cpu_usage, 0.0);
    assert_eq!(record.user_time, 300);

    // Next delta is measured against the new lifetime only.
    engine.tick().unwrap();
    assert!((engine.get(1001).unwrap().cpu_usage - 25.0).abs() < 1e-9);
}

#[test]
fn test_exited_process_is_removed() {
    let mut fewer = three_processes();
    fewer.pop();

    let mut engine = engine_with(
        vec![Frame::ok(1_000, three_processes()), Frame::ok(2_000, fewer)],
        Arc::default(),
    );
    engine.tick().unwrap();
    let delta = engine.tick().unwrap();

    assert_eq!(delta.removed.len(), 1);
    assert_eq!(delta.removed[0].pid, 1001);
    assert!(engine.get(1001).is_none());
    assert_eq!(engine.len(), 2);
}

#[test]
fn test_failed_tick_leaves_table_unchanged() {
    let mut busy = three_processes();
    busy[2].user_time = 500;

    let mut engine = engine_with(
        vec![
            Frame::ok(1_000, three_processes()),
            Frame::failing(2_000),
            Frame::ok(3_000, busy),
        ],
        Arc::default(),
    );
    engine.tick().unwrap();
    let before: Vec<u32> = {
        let mut pids: Vec<u32> = engine.records().map(|r| r.pid).collect();
        pids.sort_unstable();
        pids
    };

    assert!(engine.tick().is_err());
    assert_eq!(engine.consecutive_failures(), 1);
    assert!(engine.last_error().is_some());
    let mut after: Vec<u32> = engine.records().map(|r| r.pid).collect();
    after.sort_unstable();
    assert_eq!(before, after);

    // The baseline still belongs to the last good tick.
    let delta = engine.tick().unwrap();
    assert_eq!(delta.system_delta, 2_000);
    assert_eq!(engine.consecutive_failures(), 0);
    assert!((engine.get(1001).unwrap().cpu_usage - 25.0).abs() < 1e-9);
}

struct CountingOwners(Arc<AtomicUsize>);

impl UsernameResolver for CountingOwners {
    fn resolve_owner(&mut self, pid: u32) -> String {
        self.0.fetch_add(1, Ordering::SeqCst);
        format!("HOST\\user{}", pid)
    }
}

#[test]
fn test_usernames_resolved_once_per_lifetime() {
    let lookups = Arc::new(AtomicUsize::new(0));
    let mut reused = three_processes();
    reused[2] = sample(1001, "other.exe", 99);

    let backends = ProcessBackends {
        snapshots: Box::new(ScriptedSnapshots::new(vec![
            Frame::ok(1_000, three_processes()),
            Frame::ok(2_000, three_processes()),
            Frame::ok(3_000, reused),
        ])),
        owners: Box::new(CountingOwners(Arc::clone(&lookups))),
        windows: Box::new(OneWindow),
        inspector: Box::new(NoInspection),
        icons: Arc::new(CountingIcons::default()),
    };
    let mut engine = ProcessDeltaEngine::new(backends, config());

    engine.tick().unwrap();
    engine.tick().unwrap();
    assert_eq!(lookups.load(Ordering::SeqCst), 3);
    assert_eq!(engine.get(1000).unwrap().username, "HOST\\user1000");

    // A reused pid is a new lifetime.
    engine.tick().unwrap();
    assert_eq!(lookups.load(Ordering::SeqCst), 4);
}

#[test]
fn test_owner_lookup_skipped_when_disabled() {
    let lookups = Arc::new(AtomicUsize::new(0));
    let backends = ProcessBackends {
        snapshots: Box::new(ScriptedSnapshots::new(vec![Frame::ok(1_000, three_processes())])),
        owners: Box::new(CountingOwners(Arc::clone(&lookups))),
        windows: Box::new(OneWindow),
        inspector: Box::new(NoInspection),
        icons: Arc::new(CountingIcons::default()),
    };
    let config = ProcessConfig {
        resolve_usernames: false,
        ..config()
    };
    let mut engine = ProcessDeltaEngine::new(backends, config);

    engine.tick().unwrap();
    assert_eq!(lookups.load(Ordering::SeqCst), 0);
    assert_eq!(engine.get(1000).unwrap().username, UNKNOWN_OWNER);
}

#[test]
fn test_icons_shared_by_key_and_destroyed_on_drop() {
    let icons = Arc::new(CountingIcons::default());
    let twins = vec![sample(2000, "app.exe", 1), sample(2001, "app.exe", 2)];
    {
        let mut engine = engine_with(vec![Frame::ok(1_000, twins)], Arc::clone(&icons));
        engine.tick().unwrap();

        assert_eq!(engine.icon_cache().ref_count("app.exe"), Some(2));
        assert_eq!(engine.get(2000).unwrap().icon(), engine.get(2001).unwrap().icon());
        assert_eq!(icons.extracted.load(Ordering::SeqCst), 1);
    }
    assert_eq!(icons.destroyed.load(Ordering::SeqCst), 1);
}

#[test]
fn test_icon_released_when_last_holder_exits() {
    let icons = Arc::new(CountingIcons::default());
    let mut engine = engine_with(
        vec![
            Frame::ok(1_000, vec![sample(2000, "app.exe", 1), sample(2001, "app.exe", 2)]),
            Frame::ok(2_000, vec![sample(2000, "app.exe", 1)]),
            Frame::ok(3_000, vec![]),
        ],
        Arc::clone(&icons),
    );

    engine.tick().unwrap();
    engine.tick().unwrap();
    assert_eq!(engine.icon_cache().ref_count("app.exe"), Some(1));
    assert_eq!(icons.destroyed.load(Ordering::SeqCst), 0);

    engine.tick().unwrap();
    assert!(engine.is_empty());
    assert_eq!(icons.destroyed.load(Ordering::SeqCst), 1);
}
