mod common;

use std::collections::HashSet;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use chrono::{Duration as ChronoDuration, Utc};
use tokio_test::{assert_err, assert_ok};
use tokio_util::sync::CancellationToken;

use termiflow::error::AppError;
use termiflow::models::TimeRange;
use termiflow::providers::search::SearchProvider;
use termiflow::scheduler::{Scheduler, SEARCH_MAX_RESULTS};

use common::{candidate, subscription, MockFeeds, MockSearch, RecordingStore, ScriptedLlm};

fn scheduler(
    llm: Arc<ScriptedLlm>,
    search: Option<Arc<MockSearch>>,
    feeds: Arc<MockFeeds>,
    store: Arc<RecordingStore>,
) -> Scheduler {
    Scheduler::new(
        llm,
        search.map(|s| s as Arc<dyn SearchProvider>),
        feeds,
        store,
        4,
        Duration::from_secs(5),
    )
}

#[tokio::test]
async fn relevant_search_result_is_curated_and_stored() {
    let llm = ScriptedLlm::new()
        .score("Async closures stabilized", "0.9")
        .summary("X")
        .tags("rust, async")
        .build();
    let search = MockSearch::returning(vec![candidate(
        "Async closures stabilized",
        "https://blog.rust-lang.org/async-closures",
        "tavily",
    )]);
    let store = RecordingStore::new().with_category("rust-lang", &[]).build();
    let scheduler = scheduler(llm, Some(search), MockFeeds::new().build(), store.clone());

    let sub = subscription(7, "rust-lang", "daily");
    let items = scheduler
        .refresh_subscription(&sub, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(items.len(), 1);
    assert_eq!(items[0].relevance_score, 0.9);
    assert_eq!(items[0].summary, "X");
    assert_eq!(items[0].tags, vec!["rust", "async"]);
    assert_eq!(items[0].subscription_id, 7);

    let created = store.created();
    assert_eq!(created.len(), 1);
    assert_eq!(created[0].source_url, "https://blog.rust-lang.org/async-closures");
    assert_eq!(store.updates().len(), 1);
    assert_eq!(store.updates()[0].0, 7);
}

#[tokio::test]
async fn duplicate_url_across_sources_is_processed_once() {
    let url = "https://chips.example/2nm";
    let llm = ScriptedLlm::new().score("2nm node", "0.8").build();
    let search = MockSearch::returning(vec![candidate("2nm node", url, "tavily")]);
    let feeds = MockFeeds::new()
        .feed("https://chips.example/rss", vec![candidate("2nm node", url, "Chip Weekly")])
        .build();
    let store = RecordingStore::new()
        .with_category("silicon-chips", &["https://chips.example/rss"])
        .build();
    let scheduler = scheduler(llm.clone(), Some(search), feeds, store.clone());

    let items = scheduler
        .refresh_subscription(&subscription(1, "silicon-chips", "daily"), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(llm.score_calls.load(Ordering::SeqCst), 1);
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].source_name, "tavily");
    assert_eq!(store.created().len(), 1);
}

#[tokio::test]
async fn known_items_are_not_stored_again_but_fetch_time_advances() {
    let url = "https://known.example/post";
    let llm = ScriptedLlm::new().score("Known post", "0.9").build();
    let search = MockSearch::returning(vec![candidate("Known post", url, "tavily")]);
    let store = RecordingStore::new().with_existing(url).build();
    let scheduler = scheduler(llm, Some(search), MockFeeds::new().build(), store.clone());

    let items = scheduler
        .refresh_subscription(&subscription(3, "llm-inference", "hourly"), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(items.len(), 1);
    assert!(store.created().is_empty());
    assert_eq!(store.updates().len(), 1);
}

#[tokio::test]
async fn empty_refresh_still_marks_subscription_fetched() {
    let store = RecordingStore::new().build();
    let scheduler = scheduler(
        ScriptedLlm::new().build(),
        None,
        MockFeeds::new().build(),
        store.clone(),
    );

    let items = scheduler
        .refresh_subscription(&subscription(2, "nothing here", "weekly"), &CancellationToken::new())
        .await
        .unwrap();

    assert!(items.is_empty());
    assert_eq!(store.updates().len(), 1);
}

#[tokio::test]
async fn search_request_uses_topic_cap_and_tier_time_range() {
    let search = MockSearch::returning(Vec::new());
    let scheduler = scheduler(
        ScriptedLlm::new().build(),
        Some(search.clone()),
        MockFeeds::new().build(),
        RecordingStore::new().build(),
    );

    assert_ok!(
        scheduler
            .refresh_subscription(&subscription(1, "webgpu", "hourly"), &CancellationToken::new())
            .await
    );

    let requests = search.requests.lock().unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].query, "webgpu");
    assert_eq!(requests[0].max_results, SEARCH_MAX_RESULTS);
    assert_eq!(requests[0].time_range, TimeRange::Day);
}

#[tokio::test]
async fn unavailable_search_is_not_called() {
    let search = MockSearch::unavailable();
    let scheduler = scheduler(
        ScriptedLlm::new().build(),
        Some(search.clone()),
        MockFeeds::new().build(),
        RecordingStore::new().build(),
    );

    assert_ok!(
        scheduler
            .refresh_subscription(&subscription(1, "webgpu", "daily"), &CancellationToken::new())
            .await
    );
    assert!(search.requests.lock().unwrap().is_empty());
}

#[tokio::test]
async fn source_failures_are_swallowed_per_source() {
    let llm = ScriptedLlm::new().score("From the good feed", "0.7").build();
    let feeds = MockFeeds::new()
        .failing_feed("https://broken.example/rss")
        .feed(
            "https://good.example/rss",
            vec![candidate("From the good feed", "https://good.example/1", "Good")],
        )
        .build();
    let store = RecordingStore::new()
        .with_category(
            "silicon-chips",
            &["https://broken.example/rss", "https://good.example/rss"],
        )
        .build();
    let scheduler = scheduler(llm, Some(MockSearch::failing()), feeds.clone(), store.clone());

    let items = scheduler
        .refresh_subscription(&subscription(4, "silicon-chips", "daily"), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(items.len(), 1);
    assert_eq!(items[0].source_url, "https://good.example/1");
    assert_eq!(feeds.fetches.lock().unwrap().len(), 2);
    assert_eq!(store.updates().len(), 1);
}

#[tokio::test]
async fn feeds_are_filtered_from_last_fetch() {
    let last = Utc::now() - ChronoDuration::days(2);
    let feeds = MockFeeds::new().feed("https://chips.example/rss", Vec::new()).build();
    let store = RecordingStore::new()
        .with_category("silicon-chips", &["https://chips.example/rss"])
        .build();
    let scheduler = scheduler(ScriptedLlm::new().build(), None, feeds.clone(), store);

    let mut sub = subscription(1, "silicon-chips", "daily");
    sub.last_fetched_at = Some(last);
    assert_ok!(scheduler.refresh_subscription(&sub, &CancellationToken::new()).await);

    let fetches = feeds.fetches.lock().unwrap();
    assert_eq!(fetches[0].1, Some(last));
}

#[tokio::test]
async fn failed_existence_check_still_attempts_insert() {
    let llm = ScriptedLlm::new().score("Post", "0.9").build();
    let search = MockSearch::returning(vec![candidate("Post", "https://a.example", "tavily")]);
    let store = Arc::new(RecordingStore {
        fail_exists: true,
        ..RecordingStore::new()
    });
    let scheduler = scheduler(llm, Some(search), MockFeeds::new().build(), store.clone());

    assert_ok!(
        scheduler
            .refresh_subscription(&subscription(1, "topic", "daily"), &CancellationToken::new())
            .await
    );
    assert_eq!(store.created().len(), 1);
}

#[tokio::test]
async fn failed_inserts_do_not_abort_the_refresh() {
    let llm = ScriptedLlm::new().score("One", "0.9").score("Two", "0.8").build();
    let search = MockSearch::returning(vec![
        candidate("One", "https://one.example", "tavily"),
        candidate("Two", "https://two.example", "tavily"),
    ]);
    let store = Arc::new(RecordingStore {
        fail_create: true,
        ..RecordingStore::new()
    });
    let scheduler = scheduler(llm, Some(search), MockFeeds::new().build(), store.clone());

    let items = scheduler
        .refresh_subscription(&subscription(1, "topic", "daily"), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(items.len(), 2);
    assert_eq!(store.updates().len(), 1);
}

#[tokio::test]
async fn failed_timestamp_update_is_fatal() {
    let llm = ScriptedLlm::new().score("Post", "0.9").build();
    let search = MockSearch::returning(vec![candidate("Post", "https://a.example", "tavily")]);
    let store = Arc::new(RecordingStore {
        fail_update_for: HashSet::from([9]),
        ..RecordingStore::new()
    });
    let scheduler = scheduler(llm, Some(search), MockFeeds::new().build(), store.clone());

    assert_err!(
        scheduler
            .refresh_subscription(&subscription(9, "topic", "daily"), &CancellationToken::new())
            .await
    );
    assert_eq!(store.created().len(), 1);
}

#[tokio::test]
async fn cancelled_refresh_leaves_fetch_time_untouched() {
    let cancel = CancellationToken::new();
    cancel.cancel();
    let search = MockSearch::returning(vec![candidate("Post", "https://a.example", "tavily")]);
    let store = RecordingStore::new().build();
    let scheduler = scheduler(
        ScriptedLlm::new().score("Post", "0.9").build(),
        Some(search),
        MockFeeds::new().build(),
        store.clone(),
    );

    let res = scheduler
        .refresh_subscription(&subscription(1, "topic", "daily"), &cancel)
        .await;

    assert!(matches!(res, Err(AppError::Cancelled)));
    assert!(store.created().is_empty());
    assert!(store.updates().is_empty());
}

#[tokio::test]
async fn cancelling_mid_refresh_keeps_stored_items_but_not_fetch_time() {
    let cancel = CancellationToken::new();
    let search = MockSearch::returning(vec![
        candidate("First", "https://a.example/1", "tavily"),
        candidate("Second", "https://a.example/2", "tavily"),
    ]);
    let store = RecordingStore::new()
        .cancelling_after_first_insert(cancel.clone())
        .build();
    let llm = ScriptedLlm::new()
        .score("First", "0.9")
        .score("Second", "0.8")
        .build();
    let scheduler = scheduler(llm, Some(search), MockFeeds::new().build(), store.clone());

    let res = scheduler
        .refresh_subscription(&subscription(1, "topic", "daily"), &cancel)
        .await;

    assert!(matches!(res, Err(AppError::Cancelled)));
    let created = store.created();
    assert_eq!(created.len(), 1);
    assert_eq!(created[0].source_url, "https://a.example/1");
    assert!(store.updates().is_empty());
}

#[tokio::test]
async fn failed_summary_and_tags_keep_the_item_bare() {
    let llm = ScriptedLlm::new()
        .score("Borrow checker deep dive", "0.9")
        .fail_summary()
        .fail_tags()
        .build();
    let search = MockSearch::returning(vec![candidate(
        "Borrow checker deep dive",
        "https://a.example/borrowck",
        "tavily",
    )]);
    let store = RecordingStore::new().build();
    let scheduler = scheduler(llm, Some(search), MockFeeds::new().build(), store.clone());

    let items = assert_ok!(
        scheduler
            .refresh_subscription(&subscription(1, "rust", "daily"), &CancellationToken::new())
            .await
    );

    assert_eq!(items.len(), 1);
    assert_eq!(items[0].relevance_score, 0.9);
    assert_eq!(items[0].summary, "");
    assert!(items[0].tags.is_empty());
    assert_eq!(store.created().len(), 1);
    assert_eq!(store.updates().len(), 1);
}

#[tokio::test]
async fn curated_output_is_ranked_and_filtered() {
    let llm = ScriptedLlm::new()
        .score("Noise", "0.1")
        .score("Neutral", "0.5")
        .score("Strong", "0.95")
        .summary("summary")
        .build();
    let search = MockSearch::returning(vec![
        candidate("Noise", "https://noise", "tavily"),
        candidate("Neutral", "https://neutral", "tavily"),
        candidate("Strong", "https://strong", "tavily"),
    ]);
    let scheduler = scheduler(
        llm,
        Some(search),
        MockFeeds::new().build(),
        RecordingStore::new().build(),
    );

    let items = scheduler
        .refresh_subscription(&subscription(1, "topic", "daily"), &CancellationToken::new())
        .await
        .unwrap();

    let urls: Vec<_> = items.iter().map(|i| i.source_url.as_str()).collect();
    assert_eq!(urls, vec!["https://strong", "https://neutral"]);
    assert_eq!(items[0].summary, "summary");
    assert!(items[1].summary.is_empty());
}

#[tokio::test]
async fn refresh_all_only_runs_due_subscriptions_and_survives_failures() {
    let mut fresh = subscription(1, "fresh", "daily");
    fresh.last_fetched_at = Some(Utc::now() - ChronoDuration::hours(1));
    let due = subscription(2, "due", "daily");
    let broken = subscription(3, "broken", "daily");
    let mut paused = subscription(4, "paused", "daily");
    paused.is_active = false;

    let store = Arc::new(RecordingStore {
        subscriptions: vec![fresh, due, broken, paused],
        fail_update_for: HashSet::from([3]),
        ..RecordingStore::new()
    });
    let scheduler = scheduler(
        ScriptedLlm::new().build(),
        None,
        MockFeeds::new().build(),
        store.clone(),
    );

    let summary = scheduler
        .refresh_all(&CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summary.refreshed, 1);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.skipped, 1);
    let updated: Vec<_> = store.updates().iter().map(|(id, _)| *id).collect();
    assert_eq!(updated, vec![2]);
}

#[tokio::test]
async fn refresh_all_fails_when_subscriptions_cannot_be_listed() {
    let store = Arc::new(RecordingStore {
        fail_list: true,
        ..RecordingStore::new()
    });
    let scheduler = scheduler(ScriptedLlm::new().build(), None, MockFeeds::new().build(), store);

    assert_err!(scheduler.refresh_all(&CancellationToken::new()).await);
}
