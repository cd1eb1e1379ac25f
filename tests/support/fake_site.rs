//! A novel site served by wiremock: one landing page per work and one page
//! per chapter, laid out the way the locator and extractor expect.

use std::time::Duration;

use noveldl_core::DownloaderConfig;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub fn chapter_path(work_id: &str, index: u32) -> String {
    format!("/book/{work_id}/{index}.html")
}

pub fn landing_path(work_id: &str) -> String {
    format!("/book/{work_id}/")
}

/// Body text served for chapter `index`.
pub fn chapter_body(index: u32) -> String {
    format!("Body of chapter {index}.")
}

pub fn landing_page(work_id: &str, title: &str, chapter_titles: &[&str]) -> String {
    let links: String = chapter_titles
        .iter()
        .zip(1u32..)
        .map(|(name, index)| {
            format!(
                "<dd><a href=\"{}\">{name}</a></dd>",
                chapter_path(work_id, index)
            )
        })
        .collect();
    format!(
        "<html><head><title>{title} - Read Online</title></head><body>\
         <h1>{title}</h1><div class=\"listmain\"><dl>{links}</dl></div></body></html>"
    )
}

pub fn chapter_page(body: &str) -> String {
    format!(
        "<html><body><div class=\"nav\">Prev | Next</div>\
         <div id=\"content\">{body}</div><script>track();</script></body></html>"
    )
}

fn html(body: String) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body.into_bytes(), "text/html; charset=utf-8")
}

/// Mounts the landing page, expecting `expected_fetches` requests.
pub async fn mount_landing(
    server: &MockServer,
    work_id: &str,
    title: &str,
    chapter_titles: &[&str],
    expected_fetches: u64,
) {
    Mock::given(method("GET"))
        .and(path(landing_path(work_id)))
        .respond_with(html(landing_page(work_id, title, chapter_titles)))
        .expect(expected_fetches)
        .mount(server)
        .await;
}

/// Mounts chapter `index` serving [`chapter_body`], expecting `expected_fetches` requests.
pub async fn mount_chapter(server: &MockServer, work_id: &str, index: u32, expected_fetches: u64) {
    Mock::given(method("GET"))
        .and(path(chapter_path(work_id, index)))
        .respond_with(html(chapter_page(&chapter_body(index))))
        .expect(expected_fetches)
        .mount(server)
        .await;
}

/// Makes the next `times` requests for chapter `index` fail with `status`.
///
/// Must be mounted before the chapter's success mock so it matches first.
pub async fn mount_chapter_failure(
    server: &MockServer,
    work_id: &str,
    index: u32,
    status: u16,
    times: u64,
) {
    Mock::given(method("GET"))
        .and(path(chapter_path(work_id, index)))
        .respond_with(ResponseTemplate::new(status))
        .up_to_n_times(times)
        .expect(times)
        .mount(server)
        .await;
}

/// Settings for `server` with short backoff so retries finish quickly.
#[allow(clippy::unwrap_used)]
pub fn fast_config(server: &MockServer, max_attempts: u32) -> DownloaderConfig {
    let mut config = DownloaderConfig::new(&server.uri()).unwrap();
    config.max_attempts = max_attempts;
    config.base_delay = Duration::from_millis(10);
    config.max_delay = Duration::from_millis(40);
    config.concurrency = 2;
    config
}

/// The merged document expected for chapters `1..=count` served by [`mount_chapter`].
pub fn expected_merged(title: &str, chapter_titles: &[&str]) -> String {
    let boundary = "=".repeat(50);
    let mut document = format!("{title}\n\n");
    for (name, index) in chapter_titles.iter().zip(1u32..) {
        document.push_str(&format!(
            "Chapter {index} {name}\n\n{}\n\n{boundary}\n\n",
            chapter_body(index)
        ));
    }
    document
}
