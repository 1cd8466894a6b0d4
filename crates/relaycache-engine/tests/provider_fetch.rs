mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{
    BrokenBackend, CountingTracer, OverSharingBackend, PlaceholderBackend, sample_backend,
    start_origin, template, zzz_routes,
};
use relaycache_engine::{EngineError, Provider, RouteResolver};
use relaycache_storage::MemoryBackend;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn read_known_and_unknown_keys() {
    let provider = Provider::builder(sample_backend()).prefix("zzz").build();

    let value = provider.read("foo").await.expect("cached value");
    assert_eq!(value, br#"{"zzz":"bar"}"#);

    let err = provider.read("unknown").await.expect_err("miss");
    assert!(err.is_backend());
}

#[tokio::test]
async fn read_multi_keeps_only_requested_keys() {
    let data = (0..200)
        .map(|i| (format!("zzz:k{i}"), format!("v{i}").into_bytes()))
        .collect();
    let provider = Provider::builder(OverSharingBackend { data })
        .prefix("zzz")
        .build();

    let keys: Vec<String> = (0..100).step_by(2).map(|i| format!("k{i}")).collect();
    let mut requested = keys.clone();
    requested.push("absent".to_string());

    let found = provider.read_multi(&requested).await.expect("read_multi");

    assert_eq!(found.len(), keys.len() + 1);
    assert_eq!(found["zzz:k10"], b"v10");
    assert!(found["zzz:absent"].is_empty());
    assert!(!found.contains_key("zzz:k11"));
    assert!(!found.contains_key("zzz:k150"));
}

#[tokio::test]
async fn broken_backend_surfaces_errors_on_direct_calls() {
    let provider = Provider::builder(BrokenBackend).build();

    assert!(provider.read("foo").await.is_err());
    assert!(provider.read_multi(&["foo", "boo"]).await.is_err());
    assert!(provider.write("foo", b"bar", Duration::from_secs(10)).await.is_err());
    assert!(provider.delete("foo").await.is_err());
    assert_eq!(provider.name(), "cache/broken");
}

#[tokio::test]
async fn fetch_returns_origin_body() {
    let origin = start_origin().await;
    let provider = Provider::builder(MemoryBackend::new())
        .prefix("zzz")
        .resolver(zzz_routes())
        .build();

    let body = provider.fetch("zoo", &template(&origin)).await.expect("fetch");
    assert_eq!(body, br#"{"zoo":"zac"}"#);

    let map = provider
        .fetch_map("zoo", &template(&origin))
        .await
        .expect("fetch_map");
    assert_eq!(map["zoo"], "zac");
}

#[tokio::test]
async fn fetch_unresolvable_key_issues_no_request() {
    let origin = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&origin)
        .await;

    let provider = Provider::builder(MemoryBackend::new())
        .prefix("zzz")
        .resolver(zzz_routes())
        .build();

    let err = provider
        .fetch("unknown", &template(&origin))
        .await
        .expect_err("unresolvable");
    assert!(matches!(err, EngineError::Unresolvable { .. }));
}

#[tokio::test]
async fn fetch_non_200_reports_status() {
    let origin = start_origin().await;
    let provider = Provider::builder(MemoryBackend::new())
        .prefix("zzz")
        .resolver(zzz_routes())
        .build();

    let err = provider
        .fetch("bad", &template(&origin))
        .await
        .expect_err("500 from origin");

    let text = err.to_string();
    assert!(text.contains("500"), "{text}");
    assert!(text.contains("Internal Server Error"), "{text}");
    let info = err.fetch_info().expect("status failures carry fetch info");
    assert_eq!(info.status_code, 500);
    assert!(info.remote_url.ends_with("/bad"));
}

#[tokio::test]
async fn fetch_times_out_on_slow_origin() {
    let origin = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/zoo"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(r#"{"zoo":"zac"}"#)
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&origin)
        .await;

    let provider = Provider::builder(MemoryBackend::new())
        .prefix("zzz")
        .resolver(zzz_routes())
        .timeout(Duration::from_micros(1))
        .build();

    let err = provider
        .fetch("zoo", &template(&origin))
        .await
        .expect_err("client-side timeout");

    assert!(err.is_timeout(), "{err:?}");
    assert!(err.to_string().contains("timed out"));
    assert!(err.fetch_info().is_none());
}

#[tokio::test]
async fn fetch_reports_transport_failure() {
    let provider = Provider::builder(MemoryBackend::new())
        .prefix("zzz")
        .resolver(zzz_routes())
        .timeout(Duration::from_secs(5))
        .build();

    // Nothing listens on port 1
    let template = relaycache_engine::RequestTemplate::get("http://127.0.0.1:1/").unwrap();
    let err = provider.fetch("zoo", &template).await.expect_err("refused");
    assert!(matches!(err, EngineError::Transport { .. }), "{err:?}");
}

#[tokio::test]
async fn fetch_multi_isolates_failures() {
    let origin = start_origin().await;
    let provider = Provider::builder(MemoryBackend::new())
        .prefix("zzz")
        .resolver(zzz_routes())
        .build();

    let (values, error) = provider
        .fetch_multi(&["zoo", "unknown", "zoo2"], &template(&origin))
        .await
        .into_parts();

    assert_eq!(values.len(), 2);
    assert_eq!(values["zzz:zoo"], br#"{"zoo":"zac"}"#);
    assert_eq!(values["zzz:zoo2"], br#"{"zoo":"zed"}"#);
    assert!(!values.contains_key("zzz:unknown"));

    let error = error.expect("one key failed");
    assert_eq!(error.len(), 1);
    assert!(error.to_string().contains("zzz:unknown: unknown cache"));
}

#[tokio::test]
async fn fetch_multi_reports_every_failed_key() {
    let origin = start_origin().await;
    let provider = Provider::builder(MemoryBackend::new())
        .prefix("zzz")
        .resolver(zzz_routes())
        .max_concurrency(1)
        .build();

    let batch = provider
        .fetch_multi(&["bad", "zoo", "nope"], &template(&origin))
        .await;

    assert_eq!(batch.values.len(), 1);
    let error = batch.error.expect("two keys failed");
    let mut keys: Vec<_> = error.keys().collect();
    keys.sort_unstable();
    assert_eq!(keys, vec!["zzz:bad", "zzz:nope"]);
    assert!(error.to_string().contains("zzz:bad: invalid http status: 500"));
}

#[tokio::test]
async fn fetch_multi_without_failures_has_no_error() {
    let origin = start_origin().await;
    let provider = Provider::builder(MemoryBackend::new())
        .prefix("zzz")
        .resolver(zzz_routes())
        .build();

    let batch = provider
        .fetch_multi(&["zoo", "other:zoo2"], &template(&origin))
        .await;
    assert!(batch.is_complete());
    assert_eq!(batch.values.len(), 2);
}

#[tokio::test]
async fn read_fetch_prefers_cache_and_issues_no_request() {
    let origin = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("remote"))
        .expect(0)
        .mount(&origin)
        .await;

    let tracer = Arc::new(CountingTracer::default());
    let provider = Provider::builder(sample_backend())
        .prefix("zzz")
        .resolver(zzz_routes())
        .tracer(tracer.clone())
        .build();

    let value = provider
        .read_fetch("foo", &template(&origin))
        .await
        .expect("cached");
    assert_eq!(value, br#"{"zzz":"bar"}"#);
    assert_eq!(tracer.cache_hits(), 1);
    assert_eq!(tracer.backend_fetches(), 0);
}

#[tokio::test]
async fn read_fetch_falls_back_to_origin() {
    let origin = start_origin().await;
    let tracer = Arc::new(CountingTracer::default());
    let provider = Provider::builder(sample_backend())
        .prefix("zzz")
        .resolver(zzz_routes())
        .tracer(tracer.clone())
        .build();

    let value = provider
        .read_fetch("zoo", &template(&origin))
        .await
        .expect("fetched");
    assert_eq!(value, br#"{"zoo":"zac"}"#);
    assert_eq!(tracer.backend_fetches(), 1);
    assert_eq!(tracer.backend_calls(), vec![("/zoo".to_string(), 200)]);

    let err = provider
        .read_fetch("bad", &template(&origin))
        .await
        .expect_err("origin failure is surfaced");
    assert!(err.to_string().contains("500"));
}

#[tokio::test]
async fn read_fetch_hides_cache_errors() {
    let origin = start_origin().await;
    let provider = Provider::builder(BrokenBackend)
        .prefix("zzz")
        .resolver(zzz_routes())
        .build();

    let value = provider
        .read_fetch("zoo", &template(&origin))
        .await
        .expect("fetched despite broken cache");
    assert_eq!(value, br#"{"zoo":"zac"}"#);
}

#[tokio::test]
async fn read_multi_records_one_metric_per_batch() {
    let tracer = Arc::new(CountingTracer::default());
    let provider = Provider::builder(sample_backend())
        .prefix("zzz")
        .tracer(tracer.clone())
        .build();

    let found = provider
        .read_multi(&["foo", "boo", "missing"])
        .await
        .expect("read_multi");

    assert_eq!(found.len(), 3);
    assert_eq!(
        tracer.cache_actions(),
        vec![("Memory".to_string(), "ReadMulti".to_string())]
    );
}

#[tokio::test]
async fn read_fetch_multi_merges_cache_and_origin() {
    let origin = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/zoo"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"zoo":"zac"}"#))
        .expect(1)
        .mount(&origin)
        .await;
    Mock::given(method("GET"))
        .and(path("/foo"))
        .respond_with(ResponseTemplate::new(200).set_body_string("remote foo"))
        .expect(0)
        .mount(&origin)
        .await;

    let provider = Provider::builder(sample_backend())
        .prefix("zzz")
        .resolver(zzz_routes())
        .build();

    let batch = provider
        .read_fetch_multi(&["foo", "zoo", "unknown"], &template(&origin))
        .await;

    assert_eq!(batch.values.len(), 2);
    assert_eq!(batch.values["zzz:foo"], br#"{"zzz":"bar"}"#);
    assert_eq!(batch.values["zzz:zoo"], br#"{"zoo":"zac"}"#);
    assert!(!batch.values.contains_key("zzz:unknown"));

    let error = batch.error.expect("unknown key failed");
    assert_eq!(error.keys().collect::<Vec<_>>(), vec!["zzz:unknown"]);
}

#[tokio::test]
async fn read_fetch_multi_refetches_empty_placeholders() {
    let origin = start_origin().await;
    let backend = PlaceholderBackend {
        data: [("zzz:zoo".to_string(), Vec::new())].into_iter().collect(),
    };
    let provider = Provider::builder(backend)
        .prefix("zzz")
        .resolver(zzz_routes())
        .build();

    let batch = provider
        .read_fetch_multi(&["zoo", "zoo2"], &template(&origin))
        .await;

    assert!(batch.is_complete());
    assert_eq!(batch.values["zzz:zoo"], br#"{"zoo":"zac"}"#);
    assert_eq!(batch.values["zzz:zoo2"], br#"{"zoo":"zed"}"#);
}

#[tokio::test]
async fn read_fetch_multi_uses_exact_key_partition() {
    let origin = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/foobar"))
        .respond_with(ResponseTemplate::new(200).set_body_string("foobar"))
        .expect(1)
        .mount(&origin)
        .await;

    // "zzz:foo" is cached; "zzz:foobar" merely contains it and must be fetched
    let provider = Provider::builder(sample_backend())
        .prefix("zzz")
        .resolver(RouteResolver::new().route("zzz:foobar", "/foobar"))
        .build();

    let batch = provider
        .read_fetch_multi(&["foo", "foobar"], &template(&origin))
        .await;

    assert!(batch.is_complete());
    assert_eq!(batch.values["zzz:foobar"], b"foobar");
    assert_eq!(batch.values["zzz:foo"], br#"{"zzz":"bar"}"#);
}

#[tokio::test]
async fn read_fetch_multi_swallows_cache_errors() {
    let origin = start_origin().await;
    let provider = Provider::builder(BrokenBackend)
        .prefix("zzz")
        .resolver(zzz_routes())
        .build();

    let batch = provider
        .read_fetch_multi(&["zoo", "bad"], &template(&origin))
        .await;

    assert_eq!(batch.values.len(), 1);
    assert_eq!(batch.values["zzz:zoo"], br#"{"zoo":"zac"}"#);
    let error = batch.error.expect("bad key failed");
    assert_eq!(error.len(), 1);
    assert!(error.get("zzz:bad").is_some());
}

#[tokio::test]
async fn concurrent_callers_share_one_provider() {
    let origin = start_origin().await;
    let provider = Arc::new(
        Provider::builder(sample_backend())
            .prefix("zzz")
            .resolver(zzz_routes())
            .build(),
    );
    let template = template(&origin);

    let mut set = tokio::task::JoinSet::new();
    for i in 0..8 {
        let provider = Arc::clone(&provider);
        let template = template.clone();
        set.spawn(async move {
            let key = if i % 2 == 0 { "foo" } else { "zoo" };
            provider.read_fetch(key, &template).await
        });
    }

    while let Some(result) = set.join_next().await {
        let body = result.expect("task").expect("read_fetch");
        assert!(!body.is_empty());
    }
}
