use std::collections::HashSet;
use std::path::{Path, PathBuf};

use moodcrawl_common::{CrawlConfig, Emotion, PostRecord};
use moodcrawl_crawler::lang::FixedLanguage;
use moodcrawl_crawler::testing::{
    post_href, post_item, test_config, InstantPacer, MockBrowser, SearchScript,
};
use moodcrawl_crawler::{RunStats, Scheduler};

async fn run(browser: &MockBrowser, config: &CrawlConfig) -> RunStats {
    Scheduler::new(config, browser, &InstantPacer, &FixedLanguage("en"))
        .run()
        .await
        .unwrap()
}

fn shard_files(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<_> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().path())
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with("threads_autoscrape_shard") && n.ends_with(".csv"))
        })
        .collect();
    files.sort();
    files
}

fn read_records(path: &Path) -> Vec<PostRecord> {
    csv::Reader::from_path(path)
        .unwrap()
        .deserialize::<PostRecord>()
        .map(Result::unwrap)
        .collect()
}

fn persisted(dir: &Path) -> Vec<PostRecord> {
    shard_files(dir).iter().flat_map(|path| read_records(path)).collect()
}

/// Search page for `keyword` linking to one post per id, each mentioning the keyword.
fn productive(browser: MockBrowser, keyword: &str, ids: &[&str]) -> MockBrowser {
    let links: Vec<String> = ids.iter().map(|id| post_href("u", &format!("P{id}"))).collect();
    let mut browser = browser.on_search(keyword, SearchScript::new().links(links));
    for id in ids {
        let code = format!("P{id}");
        browser = browser.on_post(
            "u",
            &code,
            &[post_item(id, &code, "u", &format!("{keyword} post {id}"))],
        );
    }
    browser
}

// --- termination ---

#[tokio::test]
async fn full_rotation_without_progress_halts() {
    let tmp = tempfile::tempdir().unwrap();
    let config = test_config(tmp.path(), &[(Emotion::Sad, "sad"), (Emotion::Happy, "happy")]);
    let browser = MockBrowser::new();

    let stats = run(&browser, &config).await;

    assert_eq!(stats.rotations, 1);
    assert!(stats.halted_without_progress);
    assert_eq!(stats.sessions, 2);
    assert_eq!(stats.sessions_stagnant, 2);
    assert!(shard_files(tmp.path()).is_empty());
}

#[tokio::test]
async fn target_reached_stops_and_flushes_remainder() {
    let tmp = tempfile::tempdir().unwrap();
    let config = CrawlConfig {
        target_total: 3,
        ..test_config(tmp.path(), &[(Emotion::Sad, "sad")])
    };
    let browser = productive(MockBrowser::new(), "sad", &["1", "2", "3", "4"]);

    let stats = run(&browser, &config).await;

    assert_eq!(stats.accepted, 3);
    assert_eq!(stats.rotations, 1);
    assert!(!stats.halted_without_progress);
    assert_eq!(stats.shards_written, 1);
    assert_eq!(persisted(tmp.path()).len(), 3);
}

#[tokio::test]
async fn rotation_cap_bounds_the_run() {
    let tmp = tempfile::tempdir().unwrap();
    let config = CrawlConfig {
        max_rotations: Some(1),
        ..test_config(tmp.path(), &[(Emotion::Sad, "sad")])
    };
    let browser = productive(MockBrowser::new(), "sad", &["1"]);

    let stats = run(&browser, &config).await;

    assert_eq!(stats.rotations, 1);
    assert_eq!(stats.accepted, 1);
    assert!(!stats.halted_without_progress);
}

// --- persistence ---

#[tokio::test]
async fn ids_are_unique_across_shards_and_rotations() {
    let tmp = tempfile::tempdir().unwrap();
    let config = CrawlConfig {
        shard_size: 2,
        ..test_config(tmp.path(), &[(Emotion::Sad, "sad"), (Emotion::Happy, "happy")])
    };
    // Both searches surface the same posts; every text carries both keywords.
    let ids = ["1", "2", "3"];
    let links: Vec<String> = ids.iter().map(|id| post_href("u", &format!("P{id}"))).collect();
    let mut browser = MockBrowser::new()
        .on_search("sad", SearchScript::new().links(links.clone()))
        .on_search("happy", SearchScript::new().links(links));
    for id in ids {
        let code = format!("P{id}");
        browser = browser.on_post("u", &code, &[post_item(id, &code, "u", "sad but happy")]);
    }

    let stats = run(&browser, &config).await;

    let records = persisted(tmp.path());
    let unique: HashSet<_> = records.iter().map(|r| r.id.clone()).collect();
    assert_eq!(records.len(), 3);
    assert_eq!(unique.len(), 3);
    assert_eq!(stats.shards_written, 2);
    assert_eq!(stats.rotations, 2);
    assert!(stats.halted_without_progress);
}

#[tokio::test]
async fn previous_runs_are_not_collected_again() {
    let tmp = tempfile::tempdir().unwrap();
    std::fs::write(
        tmp.path().join("threads_autoscrape_shard3_1700000000.csv"),
        "id,code\n1,OLD\n",
    )
    .unwrap();
    let config = test_config(tmp.path(), &[(Emotion::Sad, "sad")]);
    let browser = productive(MockBrowser::new(), "sad", &["1", "2"]);

    let stats = run(&browser, &config).await;

    assert_eq!(stats.accepted, 1);
    let new_shards: Vec<_> = shard_files(tmp.path())
        .into_iter()
        .filter(|p| p.to_string_lossy().contains("_shard4_"))
        .collect();
    assert_eq!(new_shards.len(), 1);
    let ids: Vec<_> = read_records(&new_shards[0]).into_iter().map(|r| r.id).collect();
    assert_eq!(ids, vec!["2".to_string()]);
}

#[tokio::test]
async fn records_carry_session_context() {
    let tmp = tempfile::tempdir().unwrap();
    let config = test_config(tmp.path(), &[(Emotion::Happy, "joy")]);
    let browser = productive(MockBrowser::new(), "joy", &["7"]);

    run(&browser, &config).await;

    let records = persisted(tmp.path());
    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert_eq!(record.keyword, "joy");
    assert_eq!(record.emotion, Emotion::Happy);
    assert_eq!(record.locale_context, "en-US");
    assert_eq!(record.lang_detect, "en");
    assert_eq!(record.url, "https://www.threads.net/@u/post/P7");
    assert_eq!(record.reply_count, 2);
}

// --- browser contexts ---

#[tokio::test]
async fn contexts_are_released_whatever_the_outcome() {
    let tmp = tempfile::tempdir().unwrap();
    let config = test_config(tmp.path(), &[(Emotion::Sad, "sad"), (Emotion::Happy, "happy")]);
    let browser = MockBrowser::new().on_search("sad", SearchScript::failing());

    let stats = run(&browser, &config).await;

    assert_eq!(stats.sessions_nav_failed, 1);
    assert_eq!(browser.contexts_opened(), 2);
    assert_eq!(browser.contexts_closed(), 2);
    assert_eq!(browser.open_pages(), 0);
    assert!(browser.context_locales().iter().all(|l| l == "en-US"));
}

#[tokio::test]
async fn context_failure_skips_the_task() {
    let tmp = tempfile::tempdir().unwrap();
    let config = test_config(tmp.path(), &[(Emotion::Sad, "sad")]);
    let browser = productive(MockBrowser::new(), "sad", &["1"]).failing_contexts(1);

    let stats = run(&browser, &config).await;

    assert_eq!(stats.context_failures, 1);
    assert_eq!(stats.sessions, 0);
    assert!(stats.halted_without_progress);
}
