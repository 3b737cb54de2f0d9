//! Remote fetch behavior against a local mock origin: naming, redirects,
//! error statuses, and redirect-loop cutoff.

use axum::Router;
use axum::http::StatusCode;
use axum::response::Redirect;
use axum::routing::get;
use std::net::SocketAddr;
use std::sync::mpsc;
use urlpipe::{App, AppConfig, FetchConfig, FetchError, JobError};

// ---------------------------------------------------------------------------
// Mock origin
// ---------------------------------------------------------------------------

/// Serve a tiny origin on a random port. The fetch client is blocking, so
/// the server lives on its own thread with its own runtime rather than in
/// the test's.
fn spawn_origin() -> SocketAddr {
    let router = Router::new()
        .route("/files/logo.png", get(|| async { "png bytes here" }))
        .route(
            "/moved",
            get(|| async { Redirect::permanent("/files/logo.png") }),
        )
        .route(
            "/missing",
            get(|| async { (StatusCode::NOT_FOUND, "no such file") }),
        )
        .route("/loop", get(|| async { Redirect::temporary("/loop") }));

    let (tx, rx) = mpsc::channel();
    std::thread::spawn(move || {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .expect("tokio runtime");
        runtime.block_on(async move {
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
                .await
                .expect("bind mock origin");
            tx.send(listener.local_addr().expect("local addr"))
                .expect("report bound addr");
            axum::serve(listener, router).await.expect("serve");
        });
    });
    rx.recv().expect("origin failed to start")
}

fn plain_app() -> App {
    App::builder().build().unwrap()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[test]
fn fetch_url_downloads_and_names_the_content() {
    let addr = spawn_origin();
    let app = plain_app();
    let mut job = app.fetch_url(format!("http://{addr}/files/logo.png"));

    // the filename is known before any request goes out
    assert_eq!(job.url_attributes().name().as_deref(), Some("logo.png"));

    assert_eq!(&job.data().unwrap()[..], b"png bytes here");
    assert_eq!(job.name().unwrap().as_deref(), Some("logo.png"));
}

#[test]
fn schemeless_urls_default_to_http() {
    let addr = spawn_origin();
    let app = plain_app();
    let mut job = app.fetch_url(format!("{addr}/files/logo.png"));
    assert_eq!(&job.data().unwrap()[..], b"png bytes here");
}

#[test]
fn redirects_are_followed_to_the_final_body() {
    let addr = spawn_origin();
    let app = plain_app();
    let mut job = app.fetch_url(format!("http://{addr}/moved"));
    assert_eq!(&job.data().unwrap()[..], b"png bytes here");
}

#[test]
fn error_statuses_surface_with_their_body() {
    let addr = spawn_origin();
    let app = plain_app();
    let mut job = app.fetch_url(format!("http://{addr}/missing"));
    match job.data() {
        Err(JobError::Fetch(FetchError::BadStatus { status, body })) => {
            assert_eq!(status, 404);
            assert!(body.contains("no such file"), "unexpected body {body:?}");
        }
        other => panic!("expected BadStatus, got {other:?}"),
    }
}

#[test]
fn redirect_loops_are_cut_off() {
    let addr = spawn_origin();
    let config = AppConfig {
        fetch: FetchConfig {
            max_redirects: 3,
            ..FetchConfig::default()
        },
        ..AppConfig::default()
    };
    let app = App::builder().config(config).build().unwrap();
    let mut job = app.fetch_url(format!("http://{addr}/loop"));
    assert!(matches!(
        job.data(),
        Err(JobError::Fetch(FetchError::TooManyRedirects(_)))
    ));
}

#[test]
fn unparseable_urls_error_without_any_request() {
    let app = plain_app();
    let mut job = app.fetch_url("http://");
    assert!(matches!(
        job.data(),
        Err(JobError::Fetch(FetchError::InvalidUrl(_)))
    ));
}
