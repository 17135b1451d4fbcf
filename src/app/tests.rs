use std::sync::Arc;

use super::episode::*;
use super::*;
use crate::testing::{FakeSource, cover, line};

fn temp_db() -> (tempfile::TempDir, Arc<Database>) {
    let dir = tempfile::tempdir().expect("tempdir");
    let db = Database::open(&dir.path().join("shows.db")).expect("open db");
    db.migrate().expect("migrate");
    (dir, Arc::new(db))
}

fn starred(source_id: &str, id: &str, title: &str) -> StarredShowRecord {
    let mut record = StarredShowRecord::starred_now(&cover(source_id, id, title));
    let watched = line("sub", 12);
    record.watch_process = watched.progress_label(&watched.episodes[6]);
    record.last_episode = Some(watched.episodes[6].clone());
    record.last_play_line = Some(watched);
    record.tags = "weekly".to_string();
    record
}

fn migrate_args(row: usize, to: &[&str]) -> MigrateArgs {
    MigrateArgs {
        row,
        to: to.iter().map(|id| id.to_string()).collect(),
        min_results: None,
        pick: None,
        line: None,
        episode: None,
        yes: true,
    }
}

#[test]
fn truncate_keeps_short_text_and_marks_cut_text() {
    assert_eq!(truncate("Mushishi", 10), "Mushishi");
    assert_eq!(truncate("Fullmetal Alchemist", 10), "Fullmet...");
    assert_eq!(truncate("日本語のタイトルです", 6), "日本語...");
}

#[test]
fn star_time_formats_as_local_date() {
    let formatted = format_star_time(1_700_000_000_000);
    assert!(formatted.starts_with("2023-11-1"), "got {formatted}");
}

#[test]
fn progress_description_prefers_snapshot() {
    let mut record = starred("a", "1", "Show");
    assert_eq!(describe_progress(&record), "sub ep 7 (7/12)");

    record.last_episode = None;
    assert_eq!(describe_progress(&record), "7/12");

    record.watch_process.clear();
    assert_eq!(describe_progress(&record), "-");
}

#[test]
fn preview_follows_sort_preference() {
    let mut special = line("sub", 3);
    special.episodes[0].label = "10".to_string();
    assert_eq!(preview_labels(&special, "default", false), "10, 2, 3");
    assert_eq!(preview_labels(&special, "label", false), "2, 3, 10");
    assert_eq!(preview_labels(&special, "label", true), "10, 3, 2");
}

#[test]
fn preview_elides_long_lines() {
    assert_eq!(
        preview_labels(&line("sub", 24), "default", false),
        "1, 2, 3, ..., 22, 23, 24"
    );
}

#[test]
fn confirmation_accepts_only_yes() {
    assert!(parse_confirmation("y\n"));
    assert!(parse_confirmation(" YES "));
    assert!(!parse_confirmation("\n"));
    assert!(!parse_confirmation("nope"));
}

#[test]
fn default_priority_skips_the_show_source() {
    let config = Config::default();
    let record = starred("allanime-sub", "x", "Show");

    assert_eq!(
        migration_priority(&config, &record, &[]),
        vec!["allanime-dub".to_string()]
    );
    assert_eq!(
        migration_priority(&config, &record, &["allanime-sub".to_string()]),
        vec!["allanime-sub".to_string()]
    );
}

#[test]
fn rows_are_one_based() {
    let (_dir, db) = temp_db();
    db.upsert_starred(&starred("a", "1", "Only")).expect("upsert");

    assert_eq!(starred_at(&db, 1).expect("row 1").title, "Only");
    assert!(starred_at(&db, 0).is_err());
    assert!(starred_at(&db, 2).is_err());
}

#[tokio::test]
async fn migrate_moves_progress_to_best_match() {
    let (_dir, db) = temp_db();
    db.upsert_starred(&starred("old", "1", "Frieren")).expect("upsert");
    let mut registry = SourceRegistry::default();
    registry.register(Arc::new(
        FakeSource::new("new")
            .page(&["Frieren: Beyond Journey's End", "Frieren"])
            .play_lines(vec![line("dub", 10), line("sub", 12)]),
    ));

    run_migrate(
        &Config::default(),
        Arc::new(registry),
        db.clone(),
        migrate_args(1, &["new"]),
    )
    .await
    .expect("migrated");

    let stored = db.list_starred().expect("list");
    assert_eq!(stored.len(), 1);
    let migrated = &stored[0];
    assert_eq!(migrated.source_id, "new");
    assert_eq!(migrated.title, "Frieren");
    assert_eq!(migrated.tags, "weekly");
    assert_eq!(migrated.watch_process, "7/12");
    assert_eq!(describe_progress(migrated), "sub ep 7 (7/12)");
}

#[tokio::test]
async fn migrate_honours_pick_and_line_overrides() {
    let (_dir, db) = temp_db();
    db.upsert_starred(&starred("old", "1", "Frieren")).expect("upsert");
    let mut registry = SourceRegistry::default();
    registry.register(Arc::new(
        FakeSource::new("new")
            .page(&["Frieren", "Frieren Recap"])
            .play_lines(vec![line("dub", 10), line("sub", 12)]),
    ));
    let mut args = migrate_args(1, &["new"]);
    args.pick = Some(2);
    args.line = Some("dub".to_string());
    args.episode = Some(3);

    run_migrate(&Config::default(), Arc::new(registry), db.clone(), args)
        .await
        .expect("migrated");

    let stored = db.list_starred().expect("list");
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].title, "Frieren Recap");
    assert_eq!(describe_progress(&stored[0]), "dub ep 3 (3/10)");
}

#[tokio::test]
async fn migrate_without_match_keeps_library_untouched() {
    let (_dir, db) = temp_db();
    let original = starred("old", "1", "Frieren");
    db.upsert_starred(&original).expect("upsert");
    let mut registry = SourceRegistry::default();
    registry.register(Arc::new(FakeSource::new("new")));

    run_migrate(
        &Config::default(),
        Arc::new(registry),
        db.clone(),
        migrate_args(1, &["new"]),
    )
    .await
    .expect("no match is not an error");

    assert_eq!(db.list_starred().expect("list"), vec![original]);
}

#[tokio::test]
async fn migrate_rejects_episode_missing_from_chosen_line() {
    let (_dir, db) = temp_db();
    let original = starred("old", "1", "Frieren");
    db.upsert_starred(&original).expect("upsert");
    let mut registry = SourceRegistry::default();
    registry.register(Arc::new(
        FakeSource::new("new")
            .page(&["Frieren"])
            .play_lines(vec![line("dub", 10), line("sub", 12)]),
    ));
    let mut args = migrate_args(1, &["new"]);
    args.line = Some("dub".to_string());
    args.episode = Some(30);

    let err = run_migrate(&Config::default(), Arc::new(registry), db.clone(), args)
        .await
        .expect_err("unknown episode order is refused");

    assert!(err.to_string().contains("no episode with order 30"), "got {err}");
    assert_eq!(db.list_starred().expect("list"), vec![original]);
}
