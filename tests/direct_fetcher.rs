use std::time::Duration;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use quizly::config::FetchConfig;
use quizly::extractors::direct::DirectFetcher;
use quizly::extractors::{FetchError, MediaFetcher};

fn fetcher() -> DirectFetcher {
    DirectFetcher::new(&FetchConfig::default()).unwrap()
}

#[tokio::test]
async fn test_downloads_media_into_workdir() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/media/rust_ownership-basics.mp3"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(b"ID3 fake audio".to_vec(), "audio/mpeg"))
        .expect(1)
        .mount(&server)
        .await;

    let workdir = tempfile::tempdir().unwrap();
    let url = Url::parse(&format!("{}/media/rust_ownership-basics.mp3", server.uri())).unwrap();

    let audio = fetcher().fetch(&url, workdir.path()).await.unwrap();

    assert_eq!(audio.title, "rust ownership basics");
    assert!(audio.path.starts_with(workdir.path()));
    assert_eq!(fs_err::read(&audio.path).unwrap(), b"ID3 fake audio");
}

#[tokio::test]
async fn test_html_page_is_not_audio() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("<html></html>", "text/html"))
        .mount(&server)
        .await;

    let workdir = tempfile::tempdir().unwrap();
    let url = Url::parse(&format!("{}/talk.mp4", server.uri())).unwrap();

    let err = fetcher().fetch(&url, workdir.path()).await.unwrap_err();

    assert!(matches!(err, FetchError::NoAudioStream(_)));
}

#[tokio::test]
async fn test_slow_server_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(b"ID3 fake audio".to_vec(), "audio/mpeg")
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let config = FetchConfig {
        timeout_seconds: 1,
        ..FetchConfig::default()
    };
    let workdir = tempfile::tempdir().unwrap();
    let url = Url::parse(&format!("{}/slow.mp3", server.uri())).unwrap();

    let err = DirectFetcher::new(&config)
        .unwrap()
        .fetch(&url, workdir.path())
        .await
        .unwrap_err();

    assert!(matches!(err, FetchError::Timeout(1)));
}

#[tokio::test]
async fn test_missing_media_fails() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let workdir = tempfile::tempdir().unwrap();
    let url = Url::parse(&format!("{}/gone.mp3", server.uri())).unwrap();

    let err = fetcher().fetch(&url, workdir.path()).await.unwrap_err();

    assert!(matches!(err, FetchError::Failed(ref message) if message.contains("404")));
}
