//! End-to-end reconciliation against an in-memory source.

use std::fs;
use std::sync::{Arc, Mutex};

use assert_fs::prelude::*;
use assert_fs::TempDir;
use predicates::prelude::*;

use confd_core::{ChangeBatch, KeyChange, WatchGroup};
use confd_sync::{
    ChangeListener, ConfigSource, HookRunner, MemorySource, Reconciler, SyncError, WatchIndex,
};

#[derive(Default)]
struct RecordingHooks {
    commands: Mutex<Vec<String>>,
}

impl RecordingHooks {
    fn commands(&self) -> Vec<String> {
        self.commands.lock().unwrap().clone()
    }
}

impl HookRunner for RecordingHooks {
    fn start(&self, command: &str) -> Result<(), SyncError> {
        self.commands.lock().unwrap().push(command.to_string());
        Ok(())
    }
}

struct Harness {
    source: Arc<MemorySource>,
    hooks: Arc<RecordingHooks>,
    reconciler: Arc<Reconciler>,
}

fn harness(groups: Vec<(WatchGroup, Vec<&str>)>, namespaces: &[&str]) -> Harness {
    let source = Arc::new(MemorySource::new());
    source.seed("ns1", "testkey", "{{ mydata.name }}");
    source.seed("ns1", "other", "other={{ mydata.name }}");
    source.seed("mydata.json", "content", r#"{"name":"hello"}"#);
    let hooks = Arc::new(RecordingHooks::default());
    let reconciler = Arc::new(Reconciler::new(
        source.clone(),
        namespaces.iter().map(|s| s.to_string()).collect(),
        WatchIndex::build(groups),
        hooks.clone(),
    ));
    source.subscribe(reconciler.clone());
    Harness {
        source,
        hooks,
        reconciler,
    }
}

const NAMESPACES: &[&str] = &["ns1", "mydata.json"];

#[test]
fn data_change_rerenders_and_fires_hook_once() {
    let out = TempDir::new().unwrap();
    let h = harness(
        vec![(WatchGroup::new(out.path(), "/bin/true"), vec!["ns1:testkey"])],
        NAMESPACES,
    );

    h.reconciler.initial_load().expect("initial load");
    out.child("testkey").assert("hello");
    assert!(h.hooks.commands().is_empty(), "initial load never fires hooks");

    h.source.put("mydata.json", "content", r#"{"name":"world"}"#);

    out.child("testkey").assert("world");
    assert_eq!(h.hooks.commands(), vec!["/bin/true".to_string()]);
}

#[test]
fn template_change_renders_only_that_template() {
    let out = TempDir::new().unwrap();
    let h = harness(
        vec![(WatchGroup::new(out.path(), "/bin/reload"), vec!["ns1:testkey", "ns1:other"])],
        NAMESPACES,
    );
    h.reconciler.initial_load().unwrap();

    h.source.put("ns1", "testkey", "name={{ mydata.name }}");

    out.child("testkey").assert("name=hello");
    out.child("other").assert("other=hello");
    assert_eq!(h.hooks.commands().len(), 1);
}

#[test]
fn two_keys_in_one_batch_fire_hook_once() {
    let out = TempDir::new().unwrap();
    let h = harness(
        vec![(WatchGroup::new(out.path(), "/bin/reload"), vec!["ns1:testkey", "ns1:other"])],
        NAMESPACES,
    );
    h.reconciler.initial_load().unwrap();

    let outcome = h.reconciler.on_change_batch(&ChangeBatch::new(
        "ns1",
        vec![
            KeyChange::modified("testkey", "{{ mydata.name }}", "A {{ mydata.name }}"),
            KeyChange::modified("other", "other={{ mydata.name }}", "B {{ mydata.name }}"),
        ],
    ));

    assert_eq!(outcome.affected.len(), 1);
    assert_eq!(outcome.hooks_started, 1);
    out.child("testkey").assert("A hello");
    out.child("other").assert("B hello");
}

#[test]
fn data_change_fans_out_to_every_group() {
    let a = TempDir::new().unwrap();
    let b = TempDir::new().unwrap();
    let c = TempDir::new().unwrap();
    let h = harness(
        vec![
            (WatchGroup::new(a.path(), "/bin/a"), vec!["ns1:testkey"]),
            (WatchGroup::new(b.path(), "/bin/b"), vec!["ns1:testkey"]),
            (WatchGroup::new(c.path(), ""), vec!["ns1:other"]),
        ],
        NAMESPACES,
    );
    h.reconciler.initial_load().unwrap();

    h.source.put("mydata.json", "content", r#"{"name":"world"}"#);

    a.child("testkey").assert("world");
    b.child("testkey").assert("world");
    c.child("other").assert("other=world");
    let mut commands = h.hooks.commands();
    commands.sort();
    assert_eq!(commands, vec!["/bin/a".to_string(), "/bin/b".to_string()]);
}

#[test]
fn template_deletion_removes_file_and_fires_hook() {
    let out = TempDir::new().unwrap();
    let h = harness(
        vec![(WatchGroup::new(out.path(), "/bin/reload"), vec!["ns1:testkey"])],
        NAMESPACES,
    );
    h.reconciler.initial_load().unwrap();
    out.child("testkey").assert(predicate::path::exists());

    h.source.delete("ns1", "testkey");

    out.child("testkey").assert(predicate::path::missing());
    assert_eq!(h.hooks.commands(), vec!["/bin/reload".to_string()]);
}

#[test]
fn data_deletion_rerenders_without_the_data_set() {
    let out = TempDir::new().unwrap();
    let h = harness(
        vec![(WatchGroup::new(out.path(), "/bin/reload"), vec!["ns1:testkey"])],
        NAMESPACES,
    );
    h.reconciler.initial_load().unwrap();

    let outcome = h.reconciler.on_change_batch(&ChangeBatch::new(
        "mydata.json",
        vec![KeyChange::deleted("content", Some(r#"{"name":"hello"}"#.to_string()))],
    ));

    assert!(outcome.data_changed);
    assert!(!h.reconciler.has_data("mydata"));
    // Rendering now fails on the missing variable; the old file stays.
    out.child("testkey").assert("hello");
    assert_eq!(outcome.hooks_started, 0);
}

#[test]
fn empty_batch_leaves_state_untouched() {
    let out = TempDir::new().unwrap();
    let h = harness(
        vec![(WatchGroup::new(out.path(), "/bin/reload"), vec!["ns1:testkey"])],
        NAMESPACES,
    );
    h.reconciler.initial_load().unwrap();

    h.source.publish(&ChangeBatch::new("mydata.json", Vec::new()));

    assert!(h.reconciler.has_data("mydata"));
    out.child("testkey").assert("hello");
    assert!(h.hooks.commands().is_empty());
}

#[test]
fn broken_template_change_keeps_previous_render() {
    let out = TempDir::new().unwrap();
    let h = harness(
        vec![(WatchGroup::new(out.path(), "/bin/reload"), vec!["ns1:testkey"])],
        NAMESPACES,
    );
    h.reconciler.initial_load().unwrap();

    h.source.put("ns1", "testkey", "{{ unclosed");

    out.child("testkey").assert("hello");
    assert!(h.hooks.commands().is_empty());

    // The agent keeps working after the bad edit.
    h.source.put("ns1", "testkey", "fixed {{ mydata.name }}");
    out.child("testkey").assert("fixed hello");
    assert_eq!(h.hooks.commands().len(), 1);
}

#[test]
fn unchanged_render_does_not_fire_hooks() {
    let out = TempDir::new().unwrap();
    let h = harness(
        vec![(WatchGroup::new(out.path(), "/bin/reload"), vec!["ns1:testkey"])],
        NAMESPACES,
    );
    h.reconciler.initial_load().unwrap();

    h.source.put("mydata.json", "content", r#"{"name":"hello","extra":1}"#);

    out.child("testkey").assert("hello");
    assert!(h.hooks.commands().is_empty());
}

#[test]
fn default_namespace_keys_resolve() {
    let out = TempDir::new().unwrap();
    let h = harness(
        vec![(WatchGroup::new(out.path(), ""), vec!["plain.conf"])],
        &["default", "mydata.json"],
    );
    h.source.seed("default", "plain.conf", "x={{ mydata.name }}");
    h.reconciler.initial_load().unwrap();

    out.child("plain.conf").assert("x=hello");
    assert_eq!(fs::read_dir(out.path()).unwrap().count(), 1);
}

#[test]
fn missing_namespace_fails_initial_load() {
    let out = TempDir::new().unwrap();
    let h = harness(
        vec![(WatchGroup::new(out.path(), ""), vec!["ns1:testkey"])],
        &["ns1", "absent"],
    );
    let err = h.reconciler.initial_load().unwrap_err();
    assert!(err.to_string().contains("absent"), "got: {err}");
}

#[test]
fn listener_trait_object_dispatches() {
    let out = TempDir::new().unwrap();
    let h = harness(
        vec![(WatchGroup::new(out.path(), "/bin/reload"), vec!["ns1:testkey"])],
        NAMESPACES,
    );
    h.reconciler.initial_load().unwrap();

    let listener: Arc<dyn ChangeListener> = h.reconciler.clone();
    listener.on_batch(&ChangeBatch::new(
        "ns1",
        vec![KeyChange::added("testkey", "via listener")],
    ));
    out.child("testkey").assert("via listener");
}

#[test]
fn template_with_broken_extends_does_not_block_later_edits() {
    let out = TempDir::new().unwrap();
    let h = harness(
        vec![(WatchGroup::new(out.path(), "/bin/reload"), vec!["ns1:a_bad", "ns1:b_good"])],
        NAMESPACES,
    );
    h.source.seed("ns1", "a_bad", r#"{% extends "ns1:nope" %}"#);
    h.source.seed("ns1", "b_good", "good");

    let summary = h.reconciler.initial_load().unwrap();
    assert_eq!(summary.failed, 1);
    assert!(!h.reconciler.has_template("ns1:a_bad"));
    out.child("b_good").assert("good");

    h.source.put("ns1", "b_good", "good v2");

    out.child("b_good").assert("good v2");
    assert_eq!(h.hooks.commands(), vec!["/bin/reload".to_string()]);
}

#[test]
fn unwatched_partial_edits_apply_on_next_full_load() {
    let out = TempDir::new().unwrap();
    let h = harness(
        vec![(WatchGroup::new(out.path(), "/bin/reload"), vec!["ns1:page"])],
        NAMESPACES,
    );
    h.source.seed("ns1", "header", "H1");
    h.source.seed("ns1", "page", r#"{% include "ns1:header" %}-{{ mydata.name }}"#);
    h.reconciler.initial_load().unwrap();
    out.child("page").assert("H1-hello");

    h.source.put("ns1", "header", "H2");
    out.child("page").assert("H1-hello");
    assert!(h.hooks.commands().is_empty());

    h.reconciler.load_namespace("ns1").unwrap();
    assert!(h.reconciler.load_all().any_changed());
    out.child("page").assert("H2-hello");
}

#[test]
fn concurrent_batches_and_reloads_are_serialized() {
    const GROUPS: usize = 4;
    const ROUNDS: usize = 20;

    let out = TempDir::new().unwrap();
    let source = Arc::new(MemorySource::new());
    source.seed("mydata.json", "content", r#"{"name":"hello"}"#);
    let mut specs = Vec::new();
    for i in 0..GROUPS {
        source.seed("ns1", &format!("k{i}"), &format!("k{i}-0 {{{{ mydata.name }}}}"));
        specs.push((
            WatchGroup::new(out.path().join(format!("g{i}")), format!("/bin/hook{i}")),
            vec![format!("ns1:k{i}")],
        ));
    }
    let hooks = Arc::new(RecordingHooks::default());
    let reconciler = Reconciler::new(
        source,
        vec!["ns1".to_string(), "mydata.json".to_string()],
        WatchIndex::build(specs),
        hooks.clone(),
    );
    reconciler.initial_load().unwrap();

    std::thread::scope(|scope| {
        for i in 0..GROUPS {
            let reconciler = &reconciler;
            scope.spawn(move || {
                for round in 1..=ROUNDS {
                    let outcome = reconciler.on_change_batch(&ChangeBatch::new(
                        "ns1",
                        vec![KeyChange::modified(
                            format!("k{i}"),
                            format!("k{i}-{} {{{{ mydata.name }}}}", round - 1),
                            format!("k{i}-{round} {{{{ mydata.name }}}}"),
                        )],
                    ));
                    assert_eq!(outcome.affected.into_iter().collect::<Vec<_>>(), vec![i]);
                    assert_eq!(outcome.hooks_started, 1);
                }
            });
        }
        let reconciler = &reconciler;
        scope.spawn(move || {
            for _ in 0..ROUNDS * 2 {
                // Batches render under the cycle lock.
                let summary = reconciler.load_all();
                assert_eq!(summary.failed, 0);
                assert!(!summary.any_changed());
            }
        });
    });

    for i in 0..GROUPS {
        out.child(format!("g{i}"))
            .child(format!("k{i}"))
            .assert(format!("k{i}-{ROUNDS} hello").as_str());
    }
    let commands = hooks.commands();
    assert_eq!(commands.len(), GROUPS * ROUNDS);
    for i in 0..GROUPS {
        let hook = format!("/bin/hook{i}");
        assert_eq!(commands.iter().filter(|c| **c == hook).count(), ROUNDS);
    }
}
