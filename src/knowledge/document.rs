//! Document Builder - 코스 레코드를 검색용 문서로 변환
//!
//! 순수 함수이며 I/O가 없습니다. 같은 레코드는 항상 같은 문서를 만듭니다.
//!
//! 본문 템플릿 (한 줄에 한 필드, 순서 고정):
//! ```text
//! Title: ...
//! Description: ...
//! Price: $<price_per_session> <price_text>
//! Number of Lessons: ...
//! Main Features:        (특징이 있을 때만)
//! - ...
//! ```
//! 없는 필드도 라벨은 남겨서 텍스트 검색이 라벨로 일치할 수 있게 합니다.

use serde::{Deserialize, Serialize};

use crate::course::CourseRecord;

/// 검색 문서
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// 임베딩 대상 본문
    pub content: String,
    /// 고정 메타데이터
    pub metadata: DocumentMetadata,
}

/// 문서 메타데이터 (항상 네 개의 키)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub title: String,
    pub url: String,
    pub image_url: String,
    /// 세션당 가격 (없으면 0)
    pub price: f64,
}

/// 레코드 하나를 문서로 변환
pub fn build_document(record: &CourseRecord) -> Document {
    Document {
        content: build_content(record),
        metadata: build_metadata(record),
    }
}

/// 레코드 목록을 문서 목록으로 변환 (순서 유지)
pub fn build_documents(records: &[CourseRecord]) -> Vec<Document> {
    records.iter().map(build_document).collect()
}

fn build_content(record: &CourseRecord) -> String {
    let description = record
        .course_description
        .as_deref()
        .or(record.short_description.as_deref())
        .unwrap_or_default();

    let price = record
        .price_per_session
        .map(format_price)
        .unwrap_or_default();

    let lessons = record
        .lessons_count
        .map(|n| n.to_string())
        .unwrap_or_default();

    let mut lines = vec![
        format!("Title: {}", record.title.as_deref().unwrap_or_default()),
        format!("Description: {}", description),
        format!(
            "Price: ${} {}",
            price,
            record.price_text.as_deref().unwrap_or_default()
        ),
        format!("Number of Lessons: {}", lessons),
    ];

    if let Some(features) = record.main_features.as_ref().filter(|f| !f.is_empty()) {
        lines.push("Main Features:".to_string());
        lines.extend(features.iter().map(|f| format!("- {}", f)));
    }

    lines.join("\n")
}

fn build_metadata(record: &CourseRecord) -> DocumentMetadata {
    DocumentMetadata {
        title: record.title.clone().unwrap_or_default(),
        url: record.course_url.clone().unwrap_or_default(),
        image_url: record.image_url.clone().unwrap_or_default(),
        price: record.price_per_session.unwrap_or(0.0),
    }
}

/// 가격 표기 (정수값도 소수점 한 자리 유지: 15 -> "15.0")
fn format_price(price: f64) -> String {
    if price.is_finite() && price.fract() == 0.0 {
        format!("{:.1}", price)
    } else {
        price.to_string()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn python_record() -> CourseRecord {
        CourseRecord {
            title: Some("Python 101".to_string()),
            course_url: Some("https://x/1".to_string()),
            price_per_session: Some(15.0),
            price_text: Some("per session".to_string()),
            lessons_count: Some(8),
            short_description: Some("intro".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_content_lines() {
        let doc = build_document(&python_record());
        let lines: Vec<&str> = doc.content.lines().collect();

        assert_eq!(
            lines,
            vec![
                "Title: Python 101",
                "Description: intro",
                "Price: $15.0 per session",
                "Number of Lessons: 8",
            ]
        );
    }

    #[test]
    fn test_metadata() {
        let doc = build_document(&python_record());
        assert_eq!(
            doc.metadata,
            DocumentMetadata {
                title: "Python 101".to_string(),
                url: "https://x/1".to_string(),
                image_url: String::new(),
                price: 15.0,
            }
        );
    }

    #[test]
    fn test_prefers_long_description() {
        let record = CourseRecord {
            course_description: Some("Long text\n• A".to_string()),
            ..python_record()
        };
        let doc = build_document(&record);
        assert!(doc.content.contains("Description: Long text\n• A\n"));
        assert!(!doc.content.contains("intro"));
    }

    #[test]
    fn test_missing_fields_keep_labels() {
        let doc = build_document(&CourseRecord::default());
        assert_eq!(
            doc.content,
            "Title: \nDescription: \nPrice: $ \nNumber of Lessons: "
        );
        assert_eq!(doc.metadata.price, 0.0);
        assert_eq!(doc.metadata.title, "");
        assert_eq!(doc.metadata.url, "");
    }

    #[test]
    fn test_main_features_block() {
        let record = CourseRecord {
            main_features: Some(vec!["Live classes".to_string(), "Projects".to_string()]),
            ..python_record()
        };
        let doc = build_document(&record);
        assert!(doc
            .content
            .ends_with("Number of Lessons: 8\nMain Features:\n- Live classes\n- Projects"));

        let empty = CourseRecord {
            main_features: Some(Vec::new()),
            ..python_record()
        };
        assert!(!build_document(&empty).content.contains("Main Features"));
    }

    #[test]
    fn test_sidebar_is_not_required() {
        let mut record = python_record();
        record
            .sidebar
            .insert("duration".to_string(), "8 weeks".to_string());
        assert_eq!(build_document(&record), build_document(&python_record()));
    }

    #[test]
    fn test_deterministic() {
        let record = CourseRecord {
            main_features: Some(vec!["A".to_string()]),
            price_per_session: Some(12.5),
            ..python_record()
        };
        let a = build_document(&record);
        let b = build_document(&record);
        assert_eq!(a, b);
        assert_eq!(
            serde_json::to_string(&a).unwrap(),
            serde_json::to_string(&b).unwrap()
        );
        assert!(a.content.contains("Price: $12.5 per session"));
    }
}
