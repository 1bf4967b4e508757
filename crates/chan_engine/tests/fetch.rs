use std::sync::Once;
use std::time::Duration;

use chan_core::{BoardTarget, Endpoints, Fetched, ImageBoard};
use chan_engine::{FailureKind, FetchSettings, Fetcher, ReqwestFetcher};
use pretty_assertions::assert_eq;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const DVACH_CATALOG: &str = r#"{"threads": [
  {"num": 100, "timestamp": 1700000000, "views": 10, "posts_count": 2, "lasthit": 1700000100}
]}"#;

const DVACH_THREAD: &str = r#"{"title": "Hello", "unique_posters": 2, "threads": [{"posts": [
  {"num": 100, "timestamp": 1700000000, "name": "Anon", "comment": "op", "banned": 0, "op": 1,
   "files": [{"path": "/b/src/100/1.png", "thumbnail": "/b/thumb/100/1s.jpg", "name": "1.png",
              "fullname": "cat.png", "md5": "abc"}]}
]}]}"#;

const FOURCHAN_THREAD: &str = r#"{"posts": [
  {"no": 7, "resto": 0, "time": 1700000000, "name": "Anonymous"}
]}"#;

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(engine_logging::initialize_for_tests);
}

fn dvach() -> BoardTarget {
    BoardTarget::new(ImageBoard::Dvach, "b")
}

fn fetcher_for(server: &MockServer, settings: FetchSettings) -> ReqwestFetcher {
    let base = format!("{}/", server.uri()).parse().unwrap();
    ReqwestFetcher::new(settings, Endpoints::single_host(base)).expect("client")
}

async fn mount_json(server: &MockServer, route: &str, body: &str) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(body.as_bytes().to_vec(), "application/json; charset=utf-8"),
        )
        .mount(server)
        .await;
}

#[tokio::test]
async fn fetches_and_parses_catalog() {
    init_logging();
    let server = MockServer::start().await;
    mount_json(&server, "/b/catalog.json", DVACH_CATALOG).await;
    let fetcher = fetcher_for(&server, FetchSettings::default());

    let catalog = fetcher.fetch_catalog(&dvach()).await.expect("fetch ok");

    let Fetched::Found(threads) = catalog else {
        panic!("catalog should be found");
    };
    assert_eq!(threads.len(), 1);
    assert_eq!(threads[0].number, 100);
    assert_eq!(threads[0].views_count, 10);
}

#[tokio::test]
async fn thread_media_urls_point_at_configured_host() {
    init_logging();
    let server = MockServer::start().await;
    mount_json(&server, "/b/res/100.json", DVACH_THREAD).await;
    let fetcher = fetcher_for(&server, FetchSettings::default());

    let thread = fetcher
        .fetch_thread(&dvach(), 100)
        .await
        .expect("fetch ok")
        .found()
        .expect("thread found");

    assert_eq!(thread.number, 100);
    assert_eq!(
        thread.posts[0].files[0].url,
        format!("{}/b/src/100/1.png", server.uri())
    );
}

#[tokio::test]
async fn fourchan_thread_uses_thread_route() {
    init_logging();
    let server = MockServer::start().await;
    mount_json(&server, "/g/thread/7.json", FOURCHAN_THREAD).await;
    let fetcher = fetcher_for(&server, FetchSettings::default());
    let target = BoardTarget::new(ImageBoard::FourChan, "g");

    let result = fetcher.fetch_thread(&target, 7).await.expect("fetch ok");

    assert!(result.is_found());
}

#[tokio::test]
async fn not_found_is_not_an_error() {
    init_logging();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/b/res/404.json"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    let fetcher = fetcher_for(&server, FetchSettings::default());

    let result = fetcher.fetch_thread(&dvach(), 404).await.expect("not an error");

    assert_eq!(result, Fetched::NotFound);
}

#[tokio::test]
async fn server_error_is_an_error() {
    init_logging();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/b/catalog.json"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;
    let fetcher = fetcher_for(&server, FetchSettings::default());

    let err = fetcher.fetch_catalog(&dvach()).await.unwrap_err();

    assert_eq!(err.kind, FailureKind::HttpStatus(503));
}

#[tokio::test]
async fn html_content_type_is_rejected() {
    init_logging();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/b/catalog.json"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("<html>captcha</html>", "text/html"))
        .mount(&server)
        .await;
    let fetcher = fetcher_for(&server, FetchSettings::default());

    let err = fetcher.fetch_catalog(&dvach()).await.unwrap_err();

    assert_eq!(
        err.kind,
        FailureKind::UnsupportedContentType {
            content_type: "text/html".to_string(),
        }
    );
}

#[tokio::test]
async fn missing_content_type_is_rejected() {
    init_logging();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/b/catalog.json"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(DVACH_CATALOG.as_bytes().to_vec()))
        .mount(&server)
        .await;
    let fetcher = fetcher_for(&server, FetchSettings::default());

    let err = fetcher.fetch_catalog(&dvach()).await.unwrap_err();

    assert_eq!(err.kind, FailureKind::MissingContentType);
}

#[tokio::test]
async fn malformed_payload_is_a_parse_failure() {
    init_logging();
    let server = MockServer::start().await;
    mount_json(&server, "/b/res/100.json", r#"{"threads": [{"posts": [{"num": 100}]}]}"#).await;
    let fetcher = fetcher_for(&server, FetchSettings::default());

    let err = fetcher.fetch_thread(&dvach(), 100).await.unwrap_err();

    assert_eq!(err.kind, FailureKind::Parse);
}

#[tokio::test]
async fn slow_response_times_out() {
    init_logging();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/b/catalog.json"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(Duration::from_millis(250))
                .set_body_raw(DVACH_CATALOG.as_bytes().to_vec(), "application/json"),
        )
        .mount(&server)
        .await;
    let settings = FetchSettings {
        request_timeout: Duration::from_millis(50),
        ..FetchSettings::default()
    };
    let fetcher = fetcher_for(&server, settings);

    let err = fetcher.fetch_catalog(&dvach()).await.unwrap_err();

    assert_eq!(err.kind, FailureKind::Timeout);
}

#[tokio::test]
async fn oversized_response_is_rejected() {
    init_logging();
    let server = MockServer::start().await;
    mount_json(&server, "/b/catalog.json", DVACH_CATALOG).await;
    let settings = FetchSettings {
        max_bytes: 16,
        ..FetchSettings::default()
    };
    let fetcher = fetcher_for(&server, settings);

    let err = fetcher.fetch_catalog(&dvach()).await.unwrap_err();

    assert!(
        matches!(err.kind, FailureKind::TooLarge { max_bytes: 16, .. }),
        "{err}"
    );
}
