//! 상세 페이지 추출 - 긴 설명, 주요 특징, 사이드바 메타데이터, 이미지

use std::collections::BTreeMap;

use scraper::{ElementRef, Html, Selector};

use crate::course::CourseDetails;

use super::{element_text, select_first};

/// 설명 섹션 제목
const DESCRIPTION_HEADING: &str = "Course Description";

/// 주요 특징 블록 라벨
const FEATURES_MARKER: &str = "MAIN FEATURES OF THE PROGRAM:";

/// 특징 구분 기호
const BULLET: char = '•';

/// 상세 페이지 HTML 파싱
///
/// 구조가 예상과 다르면 해당 필드만 빠지고 나머지는 그대로 추출됩니다.
pub fn parse_details(html: &str) -> CourseDetails {
    let document = Html::parse_document(html);
    let root = document.root_element();
    let mut details = CourseDetails::default();

    if let Some(overview) = select_first(root, "div.courses-overview") {
        if let Some(heading) = find_heading(overview, DESCRIPTION_HEADING) {
            details.course_description = Some(assemble_description(overview, heading));
        }

        let overview_text: String = overview.text().collect();
        details.main_features = split_features(&overview_text);
    }

    if let Some(info) = select_first(root, "ul.info") {
        details.sidebar = parse_sidebar(info);
    }

    if let Some(img) = select_first(root, "div.image").and_then(|div| select_first(div, "img")) {
        details.detail_image = Some(img.value().attr("src").unwrap_or_default().to_string());
    }

    details
}

/// 텍스트가 일치하는 h3 찾기
fn find_heading<'a>(scope: ElementRef<'a>, text: &str) -> Option<ElementRef<'a>> {
    let selector = Selector::parse("h3").ok()?;
    scope.select(&selector).find(|h| element_text(*h) == text)
}

/// 설명 블록 조립
///
/// 제목 다음부터 같은 레벨의 다음 제목(또는 `scope`의 끝)까지 문서 순서대로 순회합니다.
/// - `<p>`: 공백 제거 후 비어 있지 않으면 한 줄
/// - `<br>`: 빈 줄
/// - `<ul>`: 항목마다 `• 항목` 한 줄
///
/// 이미 소비한 `<p>`/`<ul>`의 하위 노드는 다시 방문하지 않습니다.
pub fn assemble_description(scope: ElementRef<'_>, heading: ElementRef<'_>) -> String {
    let heading_level = heading.value().name();
    let li_selector = Selector::parse("li").ok();

    let heading_id = (*heading).id();
    let mut lines: Vec<String> = Vec::new();
    let mut started = false;
    let mut consumed_id = heading_id;

    for node in scope.descendants() {
        if !started {
            started = node.id() == heading_id;
            continue;
        }

        if node.ancestors().any(|a| a.id() == consumed_id) {
            continue;
        }

        let Some(element) = ElementRef::wrap(node) else {
            continue;
        };

        match element.value().name() {
            name if name == heading_level => break,
            "p" => {
                let text = element_text(element);
                if !text.is_empty() {
                    lines.push(text);
                }
                consumed_id = node.id();
            }
            "br" => lines.push(String::new()),
            "ul" => {
                if let Some(ref li_selector) = li_selector {
                    for li in element.select(li_selector) {
                        lines.push(format!("{} {}", BULLET, element_text(li)));
                    }
                }
                consumed_id = node.id();
            }
            _ => {}
        }
    }

    lines.join("\n")
}

/// 주요 특징 분리
///
/// 라벨 뒤 텍스트를 `•`로 나누고, 빈 조각과 라벨을 반복한 조각은 버립니다.
/// 라벨이 없으면 `None`입니다.
pub fn split_features(text: &str) -> Option<Vec<String>> {
    let (_, after) = text.split_once(FEATURES_MARKER)?;

    Some(
        after
            .split(BULLET)
            .map(str::trim)
            .filter(|f| !f.is_empty() && !f.starts_with("MAIN FEATURES"))
            .map(str::to_string)
            .collect(),
    )
}

/// 사이드바 목록 파싱
///
/// 각 `<li>`의 첫 `<span>`이 라벨입니다. 라벨이 겹치면 뒤 항목이 이깁니다.
fn parse_sidebar(info: ElementRef<'_>) -> BTreeMap<String, String> {
    let mut sidebar = BTreeMap::new();
    let (Ok(li_selector), Ok(span_selector)) = (Selector::parse("li"), Selector::parse("span"))
    else {
        return sidebar;
    };

    for item in info.select(&li_selector) {
        let Some(label) = item.select(&span_selector).next() else {
            continue;
        };

        let label_text: String = label.text().collect();
        let key = label_text.trim().replace(':', "").to_lowercase();
        let item_text: String = item.text().collect();
        let value = item_text.replace(&label_text, "").trim().to_string();

        sidebar.insert(key, value);
    }

    sidebar
}

// ============================================================================
// Tests
// ============================================================================
