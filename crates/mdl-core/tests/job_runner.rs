//! Job runner against an in-memory web: resume, partial success, bounds,
//! progress, outages, and in-place archive updates.

mod common;

use common::{chapter_url, drain, harness, FakeWeb};
use mdl_core::cache::COMPLETE_MARKER;
use mdl_core::model::{Chapter, ChapterSource, JobOutcome, JobState};
use mdl_core::packaging::{apply_seeded_folders, seed_cache_from_archive};
use std::io::Read;
use std::path::Path;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

fn archive_entries(path: &Path) -> Vec<String> {
    let file = std::fs::File::open(path).unwrap();
    let zip = zip::ZipArchive::new(file).unwrap();
    let mut names: Vec<String> = zip.file_names().map(str::to_string).collect();
    names.sort();
    names
}

fn comic_info(path: &Path) -> String {
    let file = std::fs::File::open(path).unwrap();
    let mut zip = zip::ZipArchive::new(file).unwrap();
    let mut xml = String::new();
    zip.by_name("ComicInfo.xml").unwrap().read_to_string(&mut xml).unwrap();
    xml
}

#[tokio::test]
async fn resume_fetches_only_chapters_missing_from_cache() {
    let h = harness(FakeWeb::with_chapters(10, 2)).await;
    let op = h.operation("job-resume", 10);
    for c in [1, 2, 3, 5, 8, 9] {
        h.seed_complete(&op, c).await;
    }

    let outcome = h.runner.run(op.clone(), CancellationToken::new()).await;

    let JobOutcome::Completed { archive, result } = outcome else {
        panic!("expected completion, got {outcome:?}");
    };
    assert!(result.failed_chapters.is_empty());
    let mut expected: Vec<String> = [4, 6, 7, 10].into_iter().map(chapter_url).collect();
    expected.sort();
    assert_eq!(h.web.discovered(), expected);
    assert_eq!(h.web.image_gets(), 8);

    assert_eq!(Path::new(&archive), h.archive_path(&op));
    let pages = archive_entries(&h.archive_path(&op))
        .into_iter()
        .filter(|n| n.ends_with(".png"))
        .count();
    assert_eq!(pages, 6 + 4 * 2);

    assert_eq!(h.store.state(&op.location_key()).await.unwrap(), Some(JobState::Completed));
    let stored = h.store.load(&op.location_key()).await.unwrap().unwrap();
    assert!(stored
        .chapters
        .iter()
        .all(|c| c.available_sources.contains(&ChapterSource::Cache)));
    assert!(!h.work_dir(&op).exists(), "cache is dropped after a clean run");
}

#[tokio::test]
async fn new_chapter_with_a_colliding_title_leaves_cached_chapter_alone() {
    let h = harness(FakeWeb::with_chapters(4, 2)).await;
    let runner = h.runner.clone().keep_cache(true);
    let op = h.operation("job-collide-1", 3);
    assert!(runner.run(op.clone(), CancellationToken::new()).await.is_completed());
    assert_eq!(h.web.image_gets(), 6);

    // The site later lists a second "Chapter 2" under another URL.
    let mut op = h.store.load(&op.location_key()).await.unwrap().unwrap();
    op.job_id = "job-collide-2".into();
    op.chapters.push(Chapter::from_web(chapter_url(4), "Chapter 2"));
    let outcome = runner.run(op.clone(), CancellationToken::new()).await;

    assert!(outcome.is_completed(), "{outcome:?}");
    assert_eq!(h.web.image_gets(), 8, "only the new chapter is fetched");
    assert!(h.work_dir(&op).join("Chapter_2").join(COMPLETE_MARKER).exists());
    let pages = archive_entries(&h.archive_path(&op))
        .into_iter()
        .filter(|n| n.ends_with(".png"))
        .count();
    assert_eq!(pages, 8);
}

#[tokio::test]
async fn failed_chapters_still_produce_an_annotated_archive() {
    let mut web = FakeWeb::with_chapters(10, 2);
    for c in [3, 6, 9] {
        web.missing_chapters.insert(chapter_url(c));
    }
    let h = harness(web).await;
    let op = h.operation("job-partial", 10);

    let outcome = h.runner.run(op.clone(), CancellationToken::new()).await;

    let JobOutcome::Completed { result, .. } = outcome else {
        panic!("expected completion, got {outcome:?}");
    };
    assert_eq!(result.failed_titles(), vec!["Chapter 3", "Chapter 6", "Chapter 9"]);
    for reasons in result.failed_chapters.values() {
        assert!(!reasons.is_empty());
        assert!(reasons[0].message.starts_with("no images found"));
    }
    assert_eq!(result.successful_folders.len(), 7);

    let xml = comic_info(&h.archive_path(&op));
    assert!(xml.contains("Missing chapters: Chapter 3, Chapter 6, Chapter 9"), "{xml}");

    let stored = h.store.load(&op.location_key()).await.unwrap().unwrap();
    let broken: Vec<&str> = stored
        .chapters
        .iter()
        .filter(|c| c.is_broken)
        .map(|c| c.title.as_str())
        .collect();
    assert_eq!(broken, vec!["Chapter 3", "Chapter 6", "Chapter 9"]);
    assert!(h.work_dir(&op).exists(), "cache is kept while chapters are missing");
}

#[tokio::test]
async fn image_fetches_per_chapter_stay_within_the_job_limit() {
    let mut web = FakeWeb::with_chapters(2, 12);
    web.delay = Duration::from_millis(15);
    let h = harness(web).await;
    let mut op = h.operation("job-bounded", 2);
    op.workers = 3;

    let outcome = h.runner.run(op, CancellationToken::new()).await;

    assert!(outcome.is_completed(), "{outcome:?}");
    assert_eq!(h.web.image_gets(), 24);
    let max = h.web.max_in_flight_per_chapter();
    assert!((1..=3).contains(&max), "max in flight {max}");
}

#[tokio::test]
async fn progress_starts_at_the_cached_share_and_never_goes_back() {
    let mut web = FakeWeb::with_chapters(4, 3);
    web.delay = Duration::from_millis(2);
    let h = harness(web).await;
    let op = h.operation("job-progress", 4);
    h.seed_complete(&op, 1).await;
    h.seed_complete(&op, 2).await;
    let mut sub = h.bus.subscribe();

    let outcome = h.runner.run(op, CancellationToken::new()).await;
    assert!(outcome.is_completed(), "{outcome:?}");

    let updates = drain(&mut sub);
    let progress: Vec<f32> = updates.iter().filter_map(|u| u.progress).collect();
    assert!(progress.windows(2).all(|w| w[0] <= w[1]), "{progress:?}");
    assert!(progress.contains(&0.5), "initial share of cached chapters: {progress:?}");
    assert_eq!(progress.last().copied(), Some(1.0));

    let downloaded: u32 = updates.iter().filter_map(|u| u.downloaded_chapters).sum();
    assert_eq!(downloaded, 4);
    let last = updates.last().unwrap();
    assert!(last.is_finished);
    assert_eq!(updates.iter().filter(|u| u.is_finished).count(), 1);
}

#[tokio::test]
async fn network_outage_pauses_instead_of_shipping_an_empty_archive() {
    let mut web = FakeWeb::with_chapters(3, 2);
    web.offline = true;
    let h = harness(web).await;
    let op = h.operation("job-offline", 3);

    let outcome = h.runner.run(op.clone(), CancellationToken::new()).await;

    let JobOutcome::Paused { reason } = outcome else {
        panic!("expected pause, got {outcome:?}");
    };
    assert!(reason.contains("network unavailable"), "{reason}");
    assert!(!h.archive_path(&op).exists());
    assert_eq!(h.store.state(&op.location_key()).await.unwrap(), Some(JobState::Paused));
}

#[tokio::test]
async fn malformed_operation_fails_without_retry() {
    let h = harness(FakeWeb::with_chapters(1, 1)).await;
    let mut op = h.operation("job-bad", 1);
    op.chapters.clear();
    let mut sub = h.bus.subscribe();

    let outcome = h.runner.run(op, CancellationToken::new()).await;

    let JobOutcome::Failed { message } = outcome else {
        panic!("expected failure, got {outcome:?}");
    };
    assert!(message.contains("no chapters"), "{message}");
    let last = drain(&mut sub).pop().unwrap();
    assert!(last.is_finished);
    assert!(last.error_message.is_some());
    assert_eq!(h.web.image_gets(), 0);
}

#[tokio::test]
async fn cancelled_before_start_pauses_and_keeps_the_record() {
    let h = harness(FakeWeb::with_chapters(2, 1)).await;
    let op = h.operation("job-early-stop", 2);
    let token = CancellationToken::new();
    token.cancel();

    let outcome = h.runner.run(op, token).await;

    assert!(outcome.is_paused(), "{outcome:?}");
    assert_eq!(h.web.image_gets(), 0);
}

#[tokio::test]
async fn update_rebuilds_an_existing_archive_in_place() {
    let h = harness(FakeWeb::with_chapters(5, 1)).await;
    let first = h.operation("job-first", 3);
    assert!(h.runner.run(first.clone(), CancellationToken::new()).await.is_completed());
    let existing = h.archive_path(&first);
    let fetched_before = h.web.image_gets();

    let mut update = h.operation("job-update", 5);
    update.archive_name = Some(existing.to_string_lossy().into_owned());
    let work_dir = h.work_dir(&update);
    let seeded = seed_cache_from_archive(&existing, &work_dir).unwrap();
    assert_eq!(seeded.len(), 3);
    assert_eq!(apply_seeded_folders(&mut update, &seeded), 3);

    let outcome = h.runner.run(update, CancellationToken::new()).await;

    let JobOutcome::Completed { archive, .. } = outcome else {
        panic!("expected completion, got {outcome:?}");
    };
    assert_eq!(Path::new(&archive), existing);
    assert_eq!(h.web.image_gets() - fetched_before, 2);
    let pages = archive_entries(&existing)
        .into_iter()
        .filter(|n| n.ends_with(".png"))
        .count();
    assert_eq!(pages, 5);
}
