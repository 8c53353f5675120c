//! Vector Store - 벡터 저장소 트레이트 및 타입
//!
//! 인덱스는 항상 전체 문서 집합으로 재구축됩니다 (부분 갱신 없음).

use anyhow::Result;
use async_trait::async_trait;
use sha2::{Digest, Sha256};

use super::document::Document;

// ============================================================================
// Types
// ============================================================================

/// 벡터 엔트리 (저장용)
#[derive(Debug, Clone)]
pub struct VectorEntry {
    /// 문서 ID (`document_id`)
    pub id: String,
    /// 정규화된 임베딩 벡터
    pub embedding: Vec<f32>,
    /// 원본 문서
    pub document: Document,
}

/// 검색 결과
#[derive(Debug, Clone)]
pub struct SearchResult {
    /// 일치한 문서
    pub document: Document,
    /// 유사도 스코어 (정규화 벡터 기준 코사인 유사도)
    pub similarity: f32,
}

// ============================================================================
// VectorStore Trait
// ============================================================================

/// VectorStore 트레이트 (async)
///
/// 벡터 저장소의 공통 인터페이스입니다.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// 컬렉션 전체 교체
    ///
    /// 기존 엔트리는 모두 사라지고 `entries`만 남습니다. 빈 입력이면 컬렉션이 비워집니다.
    async fn rebuild(&self, entries: &[VectorEntry]) -> Result<usize>;

    /// 유사도 상위 `limit`개 검색 (좋은 순)
    async fn search(&self, query_embedding: &[f32], limit: usize) -> Result<Vec<SearchResult>>;

    /// 벡터 개수 조회
    async fn count(&self) -> Result<usize>;
}

// ============================================================================
// Utility Functions
// ============================================================================

/// 문서 ID 생성
///
/// 같은 URL/제목이 여러 번 나와도 구분되도록 위치를 포함합니다.
pub fn document_id(position: usize, document: &Document) -> String {
    let mut hasher = Sha256::new();
    hasher.update(position.to_le_bytes());
    hasher.update(document.metadata.url.as_bytes());
    hasher.update([0u8]);
    hasher.update(document.metadata.title.as_bytes());

    hasher
        .finalize()
        .iter()
        .take(16)
        .map(|b| format!("{:02x}", b))
        .collect()
}

/// 제곱 L2 거리를 코사인 유사도로 변환
///
/// 단위 벡터 a, b에 대해 |a - b|² = 2 - 2·cos 입니다.
pub fn similarity_from_distance(squared_l2: f32) -> f32 {
    1.0 - squared_l2 / 2.0
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::document::DocumentMetadata;

    fn doc(title: &str, url: &str) -> Document {
        Document {
            content: format!("Title: {}", title),
            metadata: DocumentMetadata {
                title: title.to_string(),
                url: url.to_string(),
                image_url: String::new(),
                price: 0.0,
            },
        }
    }

    #[test]
    fn test_document_id_stable() {
        let a = document_id(0, &doc("Python 101", "https://x/1"));
        let b = document_id(0, &doc("Python 101", "https://x/1"));
        assert_eq!(a, b);
        assert_eq!(a.len(), 32);
    }

    #[test]
    fn test_document_id_distinguishes_position() {
        let d = doc("Python 101", "https://x/1");
        assert_ne!(document_id(0, &d), document_id(1, &d));
    }

    #[test]
    fn test_similarity_from_distance() {
        assert!((similarity_from_distance(0.0) - 1.0).abs() < 1e-6);
        assert!((similarity_from_distance(2.0) - 0.0).abs() < 1e-6);
        assert!((similarity_from_distance(4.0) + 1.0).abs() < 1e-6);
    }
}
