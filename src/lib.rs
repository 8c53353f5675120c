//! course-rag - 코스 카탈로그 검색 파이프라인
//!
//! 코스 목록/상세 페이지를 스크랩해 레코드로 저장하고,
//! 레코드를 문서로 변환해 LanceDB 벡터 인덱스에서 유사도 검색합니다.

pub mod cli;
pub mod config;
pub mod course;
pub mod embedding;
pub mod error;
pub mod knowledge;
pub mod scraper;

// Re-exports
pub use config::{get_data_dir, EmbedderKind, Settings};
pub use course::{load_records, save_records, CourseDetails, CourseRecord};
pub use embedding::{
    create_embedder, get_api_key, has_api_key, EmbeddingProvider, GeminiEmbedding,
    LocalHashEmbedding,
};
pub use error::{PipelineError, PipelineResult};
pub use knowledge::{
    build_document, build_documents, initialize, Document, DocumentMetadata, IndexManifest,
    KnowledgeBase, LanceVectorStore, Retriever, SearchResult, VectorEntry, VectorStore,
};
pub use crate::scraper::CatalogScraper;
