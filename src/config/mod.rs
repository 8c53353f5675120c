//! 설정 모듈 - 환경변수 기반 파이프라인 설정
//!
//! `main`에서 `.env` 파일을 먼저 로드한 뒤 `Settings::from_env()`로 읽습니다.
//! CLI 플래그는 개별 값을 덮어씁니다.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::PipelineError;

/// 기본 카탈로그 목록 페이지
pub const DEFAULT_CATALOG_URL: &str = "https://brainlox.com/courses/category/technical";

/// 카드의 상대 href를 해석할 기준 URL
pub const DEFAULT_BASE_URL: &str = "https://brainlox.com";

/// 기본 컬렉션 이름
pub const DEFAULT_COLLECTION: &str = "brainlox_courses";

/// 기본 검색 결과 개수
pub const DEFAULT_TOP_K: usize = 3;

/// 상세 페이지 동시 요청 수
pub const DEFAULT_DETAIL_CONCURRENCY: usize = 4;

/// Gemini 임베딩 출력 차원 (768, 1536, 3072)
pub const DEFAULT_GEMINI_DIMENSION: usize = 768;

const RECORDS_FILE: &str = "courses_data.json";
const INDEX_DIR: &str = "chroma_db.lance";

// ============================================================================
// Data Directory
// ============================================================================

/// 데이터 디렉토리 경로 (~/.course-rag/)
pub fn get_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".course-rag")
}

// ============================================================================
// Embedder Kind
// ============================================================================

/// 사용할 임베딩 프로바이더
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EmbedderKind {
    /// 오프라인 해시 임베딩
    #[default]
    Local,
    /// Gemini 임베딩 API
    Gemini,
}

impl FromStr for EmbedderKind {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "local" | "hash" => Ok(Self::Local),
            "gemini" => Ok(Self::Gemini),
            other => Err(PipelineError::Config(format!(
                "unknown embedder '{}', expected 'local' or 'gemini'",
                other
            ))),
        }
    }
}

// ============================================================================
// Settings
// ============================================================================

/// 파이프라인 설정
#[derive(Debug, Clone)]
pub struct Settings {
    /// 카탈로그 목록 페이지 URL
    pub catalog_url: String,
    /// 카드 href 해석 기준 URL
    pub base_url: String,
    /// 데이터 디렉토리
    pub data_dir: PathBuf,
    /// 레코드 JSON 파일 경로
    pub records_path: PathBuf,
    /// 벡터 인덱스 디렉토리
    pub index_path: PathBuf,
    /// 인덱스 컬렉션(테이블) 이름
    pub collection: String,
    /// 임베딩 프로바이더
    pub embedder: EmbedderKind,
    /// Gemini 출력 차원
    pub gemini_dimension: usize,
    /// 기본 검색 결과 개수
    pub top_k: usize,
    /// 상세 페이지 동시 요청 수
    pub detail_concurrency: usize,
}

impl Settings {
    /// 데이터 디렉토리 기준 기본 설정
    pub fn with_data_dir(data_dir: &Path) -> Self {
        Self {
            catalog_url: DEFAULT_CATALOG_URL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            data_dir: data_dir.to_path_buf(),
            records_path: data_dir.join(RECORDS_FILE),
            index_path: data_dir.join(INDEX_DIR),
            collection: DEFAULT_COLLECTION.to_string(),
            embedder: EmbedderKind::default(),
            gemini_dimension: DEFAULT_GEMINI_DIMENSION,
            top_k: DEFAULT_TOP_K,
            detail_concurrency: DEFAULT_DETAIL_CONCURRENCY,
        }
    }

    /// 데이터 디렉토리 변경 (레코드/인덱스 경로도 함께 이동)
    pub fn relocate(&mut self, data_dir: &Path) {
        self.data_dir = data_dir.to_path_buf();
        self.records_path = data_dir.join(RECORDS_FILE);
        self.index_path = data_dir.join(INDEX_DIR);
    }

    /// 환경변수에서 설정 로드
    ///
    /// - `COURSE_RAG_CATALOG_URL`, `COURSE_RAG_BASE_URL`
    /// - `COURSE_RAG_DATA_DIR`, `COURSE_RAG_RECORDS_PATH`, `COURSE_RAG_INDEX_PATH`
    /// - `COURSE_RAG_COLLECTION`, `COURSE_RAG_EMBEDDER`, `COURSE_RAG_GEMINI_DIMENSION`
    /// - `COURSE_RAG_TOP_K`, `COURSE_RAG_DETAIL_CONCURRENCY`
    pub fn from_env() -> Result<Self, PipelineError> {
        let data_dir = env_var("COURSE_RAG_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(get_data_dir);

        let mut settings = Self::with_data_dir(&data_dir);

        if let Some(url) = env_var("COURSE_RAG_CATALOG_URL") {
            settings.catalog_url = url;
        }
        if let Some(url) = env_var("COURSE_RAG_BASE_URL") {
            settings.base_url = url;
        }
        if let Some(path) = env_var("COURSE_RAG_RECORDS_PATH") {
            settings.records_path = PathBuf::from(path);
        }
        if let Some(path) = env_var("COURSE_RAG_INDEX_PATH") {
            settings.index_path = PathBuf::from(path);
        }
        if let Some(name) = env_var("COURSE_RAG_COLLECTION") {
            settings.collection = name;
        }
        if let Some(kind) = env_var("COURSE_RAG_EMBEDDER") {
            settings.embedder = kind.parse()?;
        }

        settings.gemini_dimension =
            env_usize("COURSE_RAG_GEMINI_DIMENSION", DEFAULT_GEMINI_DIMENSION);
        settings.top_k = env_usize("COURSE_RAG_TOP_K", DEFAULT_TOP_K);
        settings.detail_concurrency =
            env_usize("COURSE_RAG_DETAIL_CONCURRENCY", DEFAULT_DETAIL_CONCURRENCY).max(1);

        Ok(settings)
    }
}

/// 비어 있지 않은 환경변수 값
fn env_var(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// 숫자 환경변수 (파싱 실패 시 기본값)
fn env_usize(key: &str, default: usize) -> usize {
    match env_var(key) {
        Some(raw) => raw.parse().unwrap_or_else(|_| {
            tracing::warn!("Invalid {}='{}', using default {}", key, raw, default);
            default
        }),
        None => default,
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedder_kind_parse() {
        assert_eq!("local".parse::<EmbedderKind>().unwrap(), EmbedderKind::Local);
        assert_eq!(" Gemini ".parse::<EmbedderKind>().unwrap(), EmbedderKind::Gemini);
        assert_eq!("hash".parse::<EmbedderKind>().unwrap(), EmbedderKind::Local);
    }

    #[test]
    fn test_embedder_kind_unknown() {
        let err = "openai".parse::<EmbedderKind>().unwrap_err();
        assert!(err.to_string().contains("unknown embedder"));
    }

    #[test]
    fn test_with_data_dir_paths() {
        let settings = Settings::with_data_dir(Path::new("/tmp/course-rag"));
        assert_eq!(
            settings.records_path,
            PathBuf::from("/tmp/course-rag/courses_data.json")
        );
        assert_eq!(
            settings.index_path,
            PathBuf::from("/tmp/course-rag/chroma_db.lance")
        );
        assert_eq!(settings.top_k, 3);
        assert_eq!(settings.collection, "brainlox_courses");
        assert_eq!(settings.embedder, EmbedderKind::Local);
        assert_eq!(settings.gemini_dimension, 768);
    }

    #[test]
    fn test_relocate_keeps_other_fields() {
        let mut settings = Settings::with_data_dir(Path::new("/tmp/a"));
        settings.collection = "custom".to_string();
        settings.top_k = 7;

        settings.relocate(Path::new("/tmp/b"));
        assert_eq!(settings.data_dir, PathBuf::from("/tmp/b"));
        assert_eq!(settings.records_path, PathBuf::from("/tmp/b/courses_data.json"));
        assert_eq!(settings.index_path, PathBuf::from("/tmp/b/chroma_db.lance"));
        assert_eq!(settings.collection, "custom");
        assert_eq!(settings.top_k, 7);
    }
}
