//! 카탈로그 스크래퍼 모듈 - 코스 목록/상세 페이지 수집
//!
//! 목록 페이지를 한 번 가져와 카드를 순회하고, 카드마다 상세 페이지를 가져와
//! 레코드에 병합한 뒤 레코드 파일을 원자적으로 교체합니다.
//!
//! - 목록 페이지 실패: 스크랩 전체 실패, 기존 레코드 파일 유지
//! - 상세 페이지 실패: 해당 카드만 상세 필드 없이 계속 진행

pub mod card;
pub mod detail;

use std::path::Path;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use scraper::{ElementRef, Selector};
use url::Url;

use crate::config::Settings;
use crate::course::{save_records, CourseDetails, CourseRecord};
use crate::error::{PipelineError, PipelineResult};

pub use card::{extract_card, parse_catalog, parse_lessons_count, parse_price, resolve_url};
pub use detail::{assemble_description, parse_details, split_features};

/// 카탈로그 스크래퍼
pub struct CatalogScraper {
    client: reqwest::Client,
    catalog_url: String,
    base_url: Url,
    detail_concurrency: usize,
}

impl CatalogScraper {
    /// 새 스크래퍼 생성
    ///
    /// # Arguments
    /// * `catalog_url` - 목록 페이지 URL
    /// * `base_url` - 카드 href 해석 기준 URL
    pub fn new(catalog_url: &str, base_url: &str) -> PipelineResult<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| PipelineError::Config(format!("invalid base URL '{}': {}", base_url, e)))?;

        let client = reqwest::Client::builder()
            .user_agent(concat!("course-rag/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| PipelineError::Config(format!("HTTP 클라이언트 생성 실패: {}", e)))?;

        Ok(Self {
            client,
            catalog_url: catalog_url.to_string(),
            base_url,
            detail_concurrency: crate::config::DEFAULT_DETAIL_CONCURRENCY,
        })
    }

    /// 설정에서 생성
    pub fn from_settings(settings: &Settings) -> PipelineResult<Self> {
        Ok(Self::new(&settings.catalog_url, &settings.base_url)?
            .with_detail_concurrency(settings.detail_concurrency))
    }

    /// 상세 페이지 동시 요청 수 지정 (최소 1)
    pub fn with_detail_concurrency(mut self, concurrency: usize) -> Self {
        self.detail_concurrency = concurrency.max(1);
        self
    }

    /// 카탈로그 전체 스크랩
    ///
    /// 반환 순서는 목록 페이지의 카드 순서와 같습니다.
    pub async fn scrape(&self) -> PipelineResult<Vec<CourseRecord>> {
        tracing::info!("Scraping catalog: {}", self.catalog_url);

        let html = self.fetch_html(&self.catalog_url).await?;
        let cards = parse_catalog(&html, &self.base_url);
        tracing::info!("Found {} course cards", cards.len());

        // buffered는 완료 순서와 무관하게 입력 순서를 유지함
        let records = stream::iter(cards)
            .map(|record| self.attach_details(record))
            .buffered(self.detail_concurrency)
            .collect::<Vec<_>>()
            .await;

        Ok(records)
    }

    /// 스크랩 후 레코드 파일 교체
    ///
    /// 스크랩이 실패하면 기존 파일은 건드리지 않습니다.
    pub async fn scrape_and_persist(&self, path: &Path) -> PipelineResult<Vec<CourseRecord>> {
        let records = self.scrape().await?;

        save_records(path, &records).map_err(|cause| PipelineError::Persist {
            path: path.to_path_buf(),
            cause,
        })?;

        tracing::info!("Successfully scraped {} courses!", records.len());
        Ok(records)
    }

    /// 카드 레코드에 상세 페이지 필드 병합
    async fn attach_details(&self, mut record: CourseRecord) -> CourseRecord {
        let Some(course_url) = record.course_url.clone() else {
            return record;
        };

        tracing::info!(
            "Fetching details for course: {}",
            record.title.as_deref().unwrap_or_default()
        );

        let details = self.fetch_details(&course_url).await;
        record.merge_details(details);
        record
    }

    /// 상세 페이지 가져오기 (실패 시 빈 상세 정보)
    async fn fetch_details(&self, course_url: &str) -> CourseDetails {
        match self.fetch_html(course_url).await {
            Ok(html) => parse_details(&html),
            Err(e) => {
                tracing::warn!("Error fetching course details: {:#}", anyhow::Error::new(e));
                CourseDetails::default()
            }
        }
    }

    /// HTML 가져오기 (HTTP 에러 상태 포함 실패 처리)
    async fn fetch_html(&self, url: &str) -> PipelineResult<String> {
        let fetch_error = |source| PipelineError::Fetch {
            url: url.to_string(),
            source,
        };

        let response = self
            .client
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(fetch_error)?;

        response.text().await.map_err(fetch_error)
    }
}

// ============================================================================
// HTML Helpers
// ============================================================================

/// 범위 내 첫 번째 일치 요소
pub(crate) fn select_first<'a>(scope: ElementRef<'a>, css: &str) -> Option<ElementRef<'a>> {
    let selector = Selector::parse(css).ok()?;
    scope.select(&selector).next()
}

/// 요소의 전체 텍스트 (앞뒤 공백 제거)
pub(crate) fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::course::load_records;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const CATALOG_HTML: &str = r#"
        <html><body>
            <div class="single-courses-box">
                <img src="/img/py.png" alt="Python">
                <h3><a href="/courses/python-101">Python 101</a></h3>
                <p>Learn Python from scratch.</p>
                <span class="price-per-session">$15</span>
                <span class="price-per-session-text">per session</span>
                <ul><li>8 Lessons</li></ul>
            </div>
            <div class="single-courses-box">
                <h3><a href="/courses/broken">Broken Course</a></h3>
                <p>Detail page is down.</p>
            </div>
            <div class="single-courses-box">
                <h3>Coming soon</h3>
                <p>No link yet.</p>
            </div>
        </body></html>
    "#;

    const DETAIL_HTML: &str = r#"
        <html><body>
            <div class="courses-overview">
                <h3>Course Description</h3>
                <p>Python basics for kids.</p>
                <ul><li>Variables</li><li>Loops</li></ul>
            </div>
            <ul class="info"><li><span>Duration:</span> 8 weeks</li></ul>
        </body></html>
    "#;

    async fn setup_mock_catalog(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/courses/category/technical"))
            .respond_with(ResponseTemplate::new(200).set_body_string(CATALOG_HTML))
            .mount(server)
            .await;

        Mock::given(method("GET"))
            .and(path("/courses/python-101"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(DETAIL_HTML)
                    .set_delay(Duration::from_millis(100)),
            )
            .mount(server)
            .await;

        Mock::given(method("GET"))
            .and(path("/courses/broken"))
            .respond_with(ResponseTemplate::new(500))
            .mount(server)
            .await;
    }

    fn scraper_for(server: &MockServer) -> CatalogScraper {
        let catalog_url = format!("{}/courses/category/technical", server.uri());
        CatalogScraper::new(&catalog_url, &server.uri())
            .unwrap()
            .with_detail_concurrency(3)
    }

    #[test]
    fn test_invalid_base_url() {
        let result = CatalogScraper::new("https://example.com", "not a url");
        assert!(matches!(result, Err(PipelineError::Config(_))));
    }

    #[tokio::test]
    async fn test_scrape_catalog_with_details() {
        let server = MockServer::start().await;
        setup_mock_catalog(&server).await;

        let records = scraper_for(&server).scrape().await.unwrap();
        assert_eq!(records.len(), 3);

        // 목록 순서 유지 (첫 상세 페이지가 더 늦게 응답해도)
        assert_eq!(records[0].title.as_deref(), Some("Python 101"));
        assert_eq!(records[1].title.as_deref(), Some("Broken Course"));
        assert!(records[2].title.is_none());

        let python = &records[0];
        assert_eq!(
            python.course_url.as_deref(),
            Some(format!("{}/courses/python-101", server.uri()).as_str())
        );
        assert_eq!(
            python.course_description.as_deref(),
            Some("Python basics for kids.\n• Variables\n• Loops")
        );
        assert_eq!(python.sidebar.get("duration").map(String::as_str), Some("8 weeks"));
        assert_eq!(python.price_per_session, Some(15.0));
        assert_eq!(python.lessons_count, Some(8));

        // 상세 페이지 실패는 해당 카드만 영향
        let broken = &records[1];
        assert!(broken.course_description.is_none());
        assert_eq!(broken.short_description.as_deref(), Some("Detail page is down."));
    }

    #[tokio::test]
    async fn test_scrape_and_persist() {
        let server = MockServer::start().await;
        setup_mock_catalog(&server).await;

        let temp_dir = TempDir::new().unwrap();
        let records_path = temp_dir.path().join("courses_data.json");

        let records = scraper_for(&server)
            .scrape_and_persist(&records_path)
            .await
            .unwrap();

        assert_eq!(load_records(&records_path), records);
    }

    #[tokio::test]
    async fn test_catalog_http_error_keeps_previous_records() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let temp_dir = TempDir::new().unwrap();
        let records_path = temp_dir.path().join("courses_data.json");
        std::fs::write(&records_path, r#"[{"title": "Old"}]"#).unwrap();

        let result = scraper_for(&server).scrape_and_persist(&records_path).await;
        assert!(matches!(result, Err(PipelineError::Fetch { .. })));
        assert_eq!(
            std::fs::read_to_string(&records_path).unwrap(),
            r#"[{"title": "Old"}]"#
        );
    }

    #[tokio::test]
    async fn test_unreachable_catalog_keeps_previous_records() {
        let scraper = CatalogScraper::new("http://127.0.0.1:1/courses", "http://127.0.0.1:1").unwrap();

        let temp_dir = TempDir::new().unwrap();
        let records_path = temp_dir.path().join("courses_data.json");
        std::fs::write(&records_path, "[]").unwrap();

        let result = scraper.scrape_and_persist(&records_path).await;
        assert!(matches!(result, Err(PipelineError::Fetch { .. })));
        assert_eq!(std::fs::read_to_string(&records_path).unwrap(), "[]");
    }
}
