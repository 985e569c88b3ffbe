mod support;

use std::fs;

use punchlist::error::Error;
use punchlist::record::{self, State};
use punchlist::store::{FsStore, RecordStore};

use support::{task_text, TestScope};

#[test]
fn list_skips_corrupt_and_foreign_files() {
    let scope = TestScope::init();
    scope.write_task("001-one.md", &task_text(1, "one", "TODO"));
    scope.write_task("002-broken.md", "---\nid: [unclosed\n---\n");
    scope.write_task("003-three.md", &task_text(3, "three", "DONE"));
    scope.write_task("README.txt", "not a task");

    let store = FsStore::new(scope.tasks_dir());
    let mut ids: Vec<u32> = store
        .list()
        .expect("list")
        .into_iter()
        .map(|stored| stored.record.id)
        .collect();
    ids.sort();
    assert_eq!(ids, vec![1, 3]);
}

#[test]
fn list_walks_subdirectories_but_find_does_not() {
    let scope = TestScope::init();
    scope.write_task("001-top.md", &task_text(1, "top", "TODO"));
    scope.write_task("archive/002-old.md", &task_text(2, "old", "DONE"));

    let store = FsStore::new(scope.tasks_dir());
    assert_eq!(store.list().expect("list").len(), 2);
    assert_eq!(
        store.find(1).expect("find"),
        scope.tasks_dir().join("001-top.md")
    );
    assert!(matches!(store.find(2), Err(Error::NotFound(2))));
}

#[test]
fn find_uses_numeric_prefix_only() {
    let scope = TestScope::init();
    // the header id disagrees with the filename; lookup trusts the filename
    scope.write_task("0042-answer.md", &task_text(7, "answer", "TODO"));

    let store = FsStore::new(scope.tasks_dir());
    let path = store.find(42).expect("find");
    assert_eq!(path.file_name().unwrap(), "0042-answer.md");
    assert!(matches!(store.find(7), Err(Error::NotFound(7))));
}

#[test]
fn load_reports_the_path_on_parse_failure() {
    let scope = TestScope::init();
    let path = scope.write_task("005-bad.md", "---\nstate: SOMEDAY\n---\n");

    let store = FsStore::new(scope.tasks_dir());
    match store.load(&path) {
        Err(Error::Parse { path: reported, .. }) => assert_eq!(reported, path),
        other => panic!("unexpected result: {other:?}"),
    }
    // parsing never rewrites the file
    assert_eq!(
        fs::read_to_string(&path).expect("read"),
        "---\nstate: SOMEDAY\n---\n"
    );
}

#[test]
fn save_then_parse_is_stable_on_disk() {
    let scope = TestScope::init();
    let mut store = FsStore::new(scope.tasks_dir());
    let path = scope.tasks_dir().join(record::file_name(9, 3, "ship"));

    let mut rec = record::Record::new(9, "Ship", State::Confirm, punchlist::clock::now())
        .expect("record");
    rec.tags = vec!["release".to_string()];
    rec.body = "# Ship\n\n## Log\n\n- 2025-01-01T00:00:00+00:00: cut branch".to_string();
    store.save(&path, &rec).expect("save");

    let first = fs::read_to_string(&path).expect("read");
    let loaded = store.load(&path).expect("load");
    store.save(&path, &loaded).expect("save again");
    assert_eq!(fs::read_to_string(&path).expect("read"), first);
    assert_eq!(scope.task_names(), vec!["009-ship.md"]);
}
