//! 카탈로그 카드 추출 - 목록 페이지의 카드 하나를 레코드로 변환
//!
//! 카드에서 제목 링크, 이미지, 짧은 설명, 가격, 레슨 수를 읽습니다.
//! 찾지 못한 필드는 `None`으로 남고 추출은 절대 실패하지 않습니다.

use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::course::CourseRecord;

use super::{element_text, select_first};

/// 카드 컨테이너 셀렉터
const CARD_SELECTOR: &str = "div.single-courses-box";

/// 가격 앞에서 제거할 통화 기호
const CURRENCY_SYMBOLS: &[char] = &['$', '€', '£', '¥', '₹'];

/// 목록 페이지에서 카드 레코드 추출 (문서 순서 유지)
pub fn parse_catalog(html: &str, base_url: &Url) -> Vec<CourseRecord> {
    let document = Html::parse_document(html);
    let Ok(selector) = Selector::parse(CARD_SELECTOR) else {
        return Vec::new();
    };

    document
        .select(&selector)
        .enumerate()
        .map(|(index, card)| extract_card(card, base_url, index))
        .collect()
}

/// 카드 하나에서 필드 추출
pub fn extract_card(card: ElementRef<'_>, base_url: &Url, index: usize) -> CourseRecord {
    let mut record = CourseRecord::default();

    if let Some(img) = select_first(card, "img") {
        record.image_url = Some(img.value().attr("src").unwrap_or_default().to_string());
        record.image_alt = Some(img.value().attr("alt").unwrap_or_default().to_string());
    }

    // 제목 링크가 없으면 title/course_url 키 자체를 생략
    if let Some(link) = select_first(card, "h3").and_then(|h3| select_first(h3, "a")) {
        let href = link.value().attr("href").unwrap_or_default();
        record.title = Some(element_text(link));
        record.course_url = Some(resolve_url(base_url, href));
    }

    if let Some(desc) = select_first(card, "p") {
        record.short_description = Some(element_text(desc));
    }

    if let Some(price) = select_first(card, "span.price-per-session") {
        let raw = element_text(price);
        record.price_per_session = parse_price(&raw);
        if record.price_per_session.is_none() && !raw.is_empty() {
            tracing::warn!("Card #{}: unparseable price '{}'", index, raw);
        }
    }

    if let Some(price_text) = select_first(card, "span.price-per-session-text") {
        record.price_text = Some(element_text(price_text));
    }

    if let Ok(li_selector) = Selector::parse("li") {
        if let Some(lessons) = card
            .select(&li_selector)
            .map(element_text)
            .find(|text| text.contains("Lessons"))
        {
            record.lessons_count = parse_lessons_count(&lessons);
        }
    }

    record
}

/// 상대 href를 기준 URL로 해석
///
/// `Url::join`이 실패하면 단순 연결로 대체합니다.
pub fn resolve_url(base_url: &Url, href: &str) -> String {
    match base_url.join(href.trim()) {
        Ok(url) => url.to_string(),
        Err(_) => format!("{}{}", base_url.as_str().trim_end_matches('/'), href),
    }
}

/// 가격 파싱 (앞쪽 통화 기호와 공백 제거)
///
/// 양수가 아니거나 숫자로 변환할 수 없으면 `None`입니다.
pub fn parse_price(raw: &str) -> Option<f64> {
    let trimmed = raw.trim().trim_start_matches(CURRENCY_SYMBOLS).trim();
    trimmed
        .parse::<f64>()
        .ok()
        .filter(|price| price.is_finite() && *price > 0.0)
}

/// 레슨 수 파싱
///
/// 라벨의 모든 숫자 문자를 이어 붙여 정수로 변환합니다.
/// "10 of 12 Lessons"는 1012가 됩니다.
pub fn parse_lessons_count(text: &str) -> Option<u64> {
    let digits: String = text.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }

    match digits.parse() {
        Ok(count) => Some(count),
        Err(e) => {
            tracing::warn!("Lessons count '{}' out of range: {}", digits, e);
            None
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
