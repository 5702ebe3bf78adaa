use std::sync::Arc;
use std::time::Duration;

use linkcheck_core::interfaces::LinkSource;
use linkcheck_core::link::Link;
use linkcheck_core::policy::MaxStatusOccurrences;
use linkcheck_core::rate_limit::requests_per_time_interval;
use linkcheck_core::stream::LinkStream;
use linkcheck_core::test_support::test_helpers::{Canned, ScriptedHttpClient};

struct Links(Vec<Link>);

impl LinkSource for Links {
    fn into_links(self: Box<Self>) -> Box<dyn Iterator<Item = Link>> {
        Box::new(self.0.into_iter())
    }
}

fn stream_of(links: Vec<Link>) -> LinkStream {
    LinkStream::new(Box::new(Links(links)))
}

/// A plain 404 is reported as invalid with the status code in the message.
#[tokio::test]
async fn reports_404_as_invalid() {
    let client = Arc::new(ScriptedHttpClient::new());
    client.queue("https://example.test/missing", Canned::Status(404));

    let stream = stream_of(vec![Link::resolved("https://example.test/missing#sec")])
        .with_http_client(client);

    let errors = stream.validate().await.unwrap();
    assert_eq!(errors.count(), 1);
    let result = &errors.to_list()[0];
    assert_eq!(result.status_code(), 404);
    assert!(result.message().unwrap().contains("404"));
}

/// A 429 with Retry-After is rescheduled and the retry succeeds.
#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn retries_429_then_succeeds() {
    let client = Arc::new(ScriptedHttpClient::new());
    client.queue(
        "https://example.test/flaky",
        Canned::StatusWithHeader(429, "retry-after", "2"),
    );
    client.queue("https://example.test/flaky", Canned::Status(200));

    let stream = stream_of(vec![Link::resolved("https://example.test/flaky")])
        .with_http_client(client)
        .retry_attempts(1)
        .overall_timeout(10_000);

    let errors = stream.validate().await.unwrap();
    assert!(errors.is_empty());
}

/// A 429 with Retry-After is rescheduled but the retry fails too, so it
/// surfaces as one invalid result.
#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn retries_429_then_fails() {
    let client = Arc::new(ScriptedHttpClient::new());
    client.queue(
        "https://example.test/flaky",
        Canned::StatusWithHeader(429, "retry-after", "2"),
    );
    client.queue("https://example.test/flaky", Canned::Status(429));

    let stream = stream_of(vec![Link::resolved("https://example.test/flaky")])
        .with_http_client(client)
        .retry_attempts(1)
        .overall_timeout(10_000);

    let errors = stream.validate().await.unwrap();
    assert_eq!(errors.count(), 1);
    assert_eq!(errors.to_list()[0].status_code(), 429);
}

/// A slow first link exhausts the overall timeout before the second
/// link's attempt begins, so the second is skipped rather than attempted.
#[tokio::test]
async fn deadline_skips_later_links() {
    let client = Arc::new(ScriptedHttpClient::new());
    client.queue(
        "https://slow.test/a",
        Canned::DelayedStatus(Duration::from_millis(60), 200),
    );
    client.queue("https://slow.test/b", Canned::Status(200));

    let stream = stream_of(vec![
        Link::resolved("https://slow.test/a"),
        Link::resolved("https://slow.test/b"),
    ])
    .with_http_client(client)
    .overall_timeout(50);

    let errors = stream.validate().await.unwrap();
    assert_eq!(errors.count(), 1);
    let result = &errors.to_list()[0];
    assert_eq!(result.link().resolved_uri(), "https://slow.test/b");
    assert_eq!(result.status_code(), 0);
    assert!(result.message().unwrap().starts_with("Did not try"));
}

/// A continuation policy stops after 3 occurrences of 429; the remaining 7
/// links are skipped outright (not surfaced as errors), and a final policy
/// reports the saturation as one synthetic invalid.
#[tokio::test]
async fn continuation_policy_skips_after_saturation() {
    let client = Arc::new(ScriptedHttpClient::new());
    for i in 0..10 {
        client.queue(format!("https://api.slow/{i}"), Canned::Status(429));
    }

    let links: Vec<Link> = (0..10)
        .map(|i| Link::resolved(format!("https://api.slow/{i}")))
        .collect();

    let stream = stream_of(links)
        .with_http_client(client)
        .retry_attempts(0)
        .group(r"https://api\.slow/.*")
        .continuation_policy(MaxStatusOccurrences::new(429, 3))
        .final_policy(MaxStatusOccurrences::new(429, 3))
        .end_group()
        .unwrap();

    let errors = stream.validate().await.unwrap();
    // 3 genuine 429s + 1 synthetic final-policy violation.
    assert_eq!(errors.count(), 4);
    let statuses: Vec<i32> = errors.iter().map(|r| r.status_code()).collect();
    assert_eq!(statuses.iter().filter(|&&s| s == 429).count(), 3);
    assert!(statuses.contains(&-5));
}

/// A fragment with no matching id falls back to `a[name=...]`.
#[tokio::test]
async fn fragment_falls_back_to_name_attribute() {
    let client = Arc::new(ScriptedHttpClient::new());
    client.queue(
        "https://example.test/page.html",
        Canned::StatusWithBody(200, r#"<a name="top"></a>"#),
    );

    let stream = stream_of(vec![Link::resolved("https://example.test/page.html#top")])
        .with_http_client(client);

    let errors = stream.validate().await.unwrap();
    assert!(errors.is_empty());
}

/// GitHub blob line-anchor fragments are validated against the decoded
/// file's line count.
#[tokio::test]
async fn github_blob_line_anchors_checked_against_line_count() {
    use base64::Engine;

    let content: String = (1..=100).map(|n| format!("line {n}\n")).collect();
    let encoded = base64::engine::general_purpose::STANDARD.encode(content);
    let body = serde_json::json!({ "content": encoded }).to_string();

    let client = Arc::new(ScriptedHttpClient::new());
    let body: &'static str = Box::leak(body.into_boxed_str());
    for _ in 0..4 {
        client.queue("https://raw.test/blob", Canned::StatusWithBody(200, body));
    }

    let links = vec![
        Link::resolved("https://raw.test/blob#L50"),
        Link::resolved("https://raw.test/blob#L1-L100"),
        Link::resolved("https://raw.test/blob#L0"),
        Link::resolved("https://raw.test/blob#L1-L101"),
    ];

    let stream = stream_of(links)
        .with_http_client(client)
        .group(r"https://raw\.test/.*")
        .fragment_validator(linkcheck_core::fragment::GithubBlobFragmentValidator)
        .end_group()
        .unwrap();

    let errors = stream.validate().await.unwrap();
    assert_eq!(errors.count(), 2);
    let bad: Vec<&str> = errors.iter().map(|r| r.link().fragment().unwrap()).collect();
    assert!(bad.contains(&"#L0"));
    assert!(bad.contains(&"#L1-L101"));
}

/// Property 6 — a sliding-window rate limit never admits more than `n`
/// requests per rolling window of width `w`.
#[tokio::test]
async fn rate_limit_bounds_attempts_per_window() {
    let client = Arc::new(ScriptedHttpClient::new());
    let uris: Vec<String> = (0..4).map(|i| format!("https://limited.test/{i}")).collect();
    for uri in &uris {
        client.queue(uri.clone(), Canned::Status(200));
    }
    let links: Vec<Link> = uris.iter().map(|u| Link::resolved(u.as_str())).collect();

    let start = std::time::Instant::now();
    let stream = stream_of(links)
        .with_http_client(client)
        .group(r"https://limited\.test/.*")
        .rate_limit(requests_per_time_interval(2, Duration::from_millis(100)))
        .end_group()
        .unwrap();

    let errors = stream.validate().await.unwrap();
    assert!(errors.is_empty());
    // 4 requests at 2 per 100ms requires at least one full window wait.
    assert!(start.elapsed() >= Duration::from_millis(100));
}

/// Property 9 — two identically-built streams classify the same way.
#[tokio::test]
async fn idempotent_classification_across_runs() {
    let build = || {
        let client = Arc::new(ScriptedHttpClient::new());
        client.queue("https://example.test/missing", Canned::Status(404));
        client.queue("https://example.test/ok", Canned::Status(200));
        stream_of(vec![
            Link::resolved("https://example.test/missing"),
            Link::resolved("https://example.test/ok"),
        ])
        .with_http_client(client)
    };

    let first = build().validate().await.unwrap();
    let second = build().validate().await.unwrap();

    let first_codes: Vec<i32> = first.iter().map(|r| r.status_code()).collect();
    let second_codes: Vec<i32> = second.iter().map(|r| r.status_code()).collect();
    assert_eq!(first_codes, second_codes);
}

/// Property 3 — builder methods never mutate the receiver.
#[tokio::test]
async fn immutability_prior_reference_still_usable() {
    let client = Arc::new(ScriptedHttpClient::new());
    client.queue("https://example.test/a", Canned::Status(200));
    client.queue("https://example.test/a", Canned::Status(200));

    let base = stream_of(vec![Link::resolved("https://example.test/a")]).with_http_client(client);
    let _with_longer_timeout = base.overall_timeout(60_000);

    // `base` must still be valid and independently usable.
    let errors = base.validate().await.unwrap();
    assert!(errors.is_empty());
}
