//! Knowledge 모듈 - 코스 검색 지식베이스
//!
//! - Document: 코스 레코드 → 검색 문서 변환
//! - LanceDB: 벡터 인덱스 (컬렉션 단위 전체 재구축)
//! - Retrieval: 로드/구축/검색 파사드

mod document;
mod lance;
mod retrieval;
mod vector;

// Re-exports
pub use document::{build_document, build_documents, Document, DocumentMetadata};
pub use lance::LanceVectorStore;
pub use retrieval::{initialize, IndexManifest, KnowledgeBase, Retriever};
pub use vector::{document_id, similarity_from_distance, SearchResult, VectorEntry, VectorStore};
