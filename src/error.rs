//! 파이프라인 에러 타입
//!
//! 외부 호출자(CLI, HTTP 레이어, 채팅 오케스트레이션)에 노출되는 경계 에러입니다.
//! 파싱 실패는 에러 값이 아니라 `Option` 필드로 표현됩니다.

use std::path::PathBuf;

use thiserror::Error;

/// 파이프라인 경계 에러
#[derive(Debug, Error)]
pub enum PipelineError {
    /// 카탈로그/상세 페이지 요청 실패 (네트워크 또는 HTTP 상태 코드)
    #[error("failed to fetch {url}")]
    Fetch {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// 저장된 레코드가 없거나 비어 있음
    #[error("no course data available at {}", .0.display())]
    DataUnavailable(PathBuf),

    /// 임베딩 생성 실패
    #[error("embedding failed: {0:#}")]
    Embedding(anyhow::Error),

    /// 벡터 저장소 빌드/검색 실패
    #[error("vector store error: {0:#}")]
    Store(anyhow::Error),

    /// 레코드 파일 저장 실패
    #[error("failed to persist course records to {}: {cause:#}", path.display())]
    Persist { path: PathBuf, cause: anyhow::Error },

    /// 잘못된 설정값
    #[error("invalid configuration: {0}")]
    Config(String),
}

/// 파이프라인 결과 타입
pub type PipelineResult<T> = std::result::Result<T, PipelineError>;
