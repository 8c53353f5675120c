//! 검색 파사드 - 레코드 로드 → 문서 생성 → 인덱스 구축 → 유사도 검색
//!
//! 외부 호출자(HTTP 레이어, 채팅 오케스트레이션)가 사용하는 유일한 진입점입니다.
//! 전역 상태 없이 `KnowledgeBase` 값을 만들어 각 호출에 넘깁니다.

use std::path::{Path, PathBuf};

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::Settings;
use crate::course::load_records;
use crate::embedding::{create_embedder, l2_normalize, EmbeddingProvider};
use crate::error::{PipelineError, PipelineResult};
use crate::scraper::CatalogScraper;

use super::document::{build_documents, Document};
use super::lance::LanceVectorStore;
use super::vector::{document_id, SearchResult, VectorEntry, VectorStore};

// ============================================================================
// Retriever Trait
// ============================================================================

/// 질문에 대해 관련 문서 k개를 돌려주는 기능
///
/// 채팅 레이어가 이 트레이트에만 의존합니다. 대화 기록은 보지 않습니다.
#[async_trait]
pub trait Retriever: Send + Sync {
    async fn retrieve(&self, question: &str) -> PipelineResult<Vec<Document>>;
}

// ============================================================================
// Index Manifest
// ============================================================================

/// 인덱스 빌드 정보
///
/// 다른 임베더로 만든 인덱스를 조회하면 결과가 무의미하므로 열 때 검증합니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexManifest {
    pub collection: String,
    pub embedder: String,
    pub dimension: usize,
    pub document_count: usize,
    pub built_at: DateTime<Utc>,
}

impl IndexManifest {
    fn path(index_path: &Path, collection: &str) -> PathBuf {
        index_path.join(format!("{}.manifest.json", collection))
    }

    /// 매니페스트 로드 (없으면 None)
    pub fn load(index_path: &Path, collection: &str) -> anyhow::Result<Option<Self>> {
        let path = Self::path(index_path, collection);
        if !path.exists() {
            return Ok(None);
        }

        let raw = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let manifest = serde_json::from_str(&raw)
            .with_context(|| format!("Invalid index manifest {}", path.display()))?;
        Ok(Some(manifest))
    }

    fn save(&self, index_path: &Path) -> anyhow::Result<()> {
        let path = Self::path(index_path, &self.collection);
        let json = serde_json::to_string_pretty(self).context("Failed to serialize manifest")?;
        std::fs::write(&path, json).with_context(|| format!("Failed to write {}", path.display()))
    }
}

// ============================================================================
// KnowledgeBase
// ============================================================================

/// 코스 지식베이스 (벡터 인덱스 + 임베더)
pub struct KnowledgeBase {
    store: LanceVectorStore,
    embedder: Box<dyn EmbeddingProvider>,
    manifest: IndexManifest,
    top_k: usize,
}

impl KnowledgeBase {
    /// 레코드 파일에서 인덱스 재구축
    ///
    /// 레코드가 없거나 비어 있으면 `DataUnavailable`입니다. 빈 인덱스로 진행하지 않습니다.
    pub async fn build(
        settings: &Settings,
        embedder: Box<dyn EmbeddingProvider>,
    ) -> PipelineResult<Self> {
        tracing::info!("Loading course data from {}", settings.records_path.display());
        let records = load_records(&settings.records_path);
        if records.is_empty() {
            return Err(PipelineError::DataUnavailable(settings.records_path.clone()));
        }

        let documents = build_documents(&records);
        Self::build_from_documents(settings, embedder, &documents).await
    }

    /// 문서 집합으로 인덱스 전체 교체
    pub async fn build_from_documents(
        settings: &Settings,
        embedder: Box<dyn EmbeddingProvider>,
        documents: &[Document],
    ) -> PipelineResult<Self> {
        tracing::info!(
            "Embedding {} documents with {}",
            documents.len(),
            embedder.name()
        );

        let texts: Vec<String> = documents.iter().map(|d| d.content.clone()).collect();
        let embeddings = embedder
            .embed_batch(&texts)
            .await
            .map_err(PipelineError::Embedding)?;

        if embeddings.len() != documents.len() {
            return Err(PipelineError::Embedding(anyhow::anyhow!(
                "embedder returned {} vectors for {} documents",
                embeddings.len(),
                documents.len()
            )));
        }

        let entries = documents
            .iter()
            .zip(embeddings)
            .enumerate()
            .map(|(position, (document, mut embedding))| {
                if embedding.len() != embedder.dimension() {
                    return Err(PipelineError::Embedding(anyhow::anyhow!(
                        "expected dimension {}, got {}",
                        embedder.dimension(),
                        embedding.len()
                    )));
                }
                l2_normalize(&mut embedding);
                Ok(VectorEntry {
                    id: document_id(position, document),
                    embedding,
                    document: document.clone(),
                })
            })
            .collect::<PipelineResult<Vec<_>>>()?;

        let store = LanceVectorStore::open(&settings.index_path, &settings.collection)
            .await
            .map_err(PipelineError::Store)?;
        let count = store.rebuild(&entries).await.map_err(PipelineError::Store)?;

        let manifest = IndexManifest {
            collection: settings.collection.clone(),
            embedder: embedder.name().to_string(),
            dimension: embedder.dimension(),
            document_count: count,
            built_at: Utc::now(),
        };
        manifest
            .save(&settings.index_path)
            .map_err(PipelineError::Store)?;

        Ok(Self {
            store,
            embedder,
            manifest,
            top_k: settings.top_k,
        })
    }

    /// 이미 구축된 인덱스 열기 (읽기 전용 조회)
    pub async fn open(
        settings: &Settings,
        embedder: Box<dyn EmbeddingProvider>,
    ) -> PipelineResult<Self> {
        let manifest = IndexManifest::load(&settings.index_path, &settings.collection)
            .map_err(PipelineError::Store)?
            .ok_or_else(|| {
                PipelineError::Store(anyhow::anyhow!(
                    "collection '{}' has not been built at {}",
                    settings.collection,
                    settings.index_path.display()
                ))
            })?;

        if manifest.embedder != embedder.name() || manifest.dimension != embedder.dimension() {
            return Err(PipelineError::Store(anyhow::anyhow!(
                "index was built with {} ({}d), current embedder is {} ({}d); rebuild the index",
                manifest.embedder,
                manifest.dimension,
                embedder.name(),
                embedder.dimension()
            )));
        }

        let store = LanceVectorStore::open(&settings.index_path, &settings.collection)
            .await
            .map_err(PipelineError::Store)?;

        Ok(Self {
            store,
            embedder,
            manifest,
            top_k: settings.top_k,
        })
    }

    /// 인덱스 빌드 정보
    pub fn manifest(&self) -> &IndexManifest {
        &self.manifest
    }

    /// 저장된 문서 수
    pub async fn document_count(&self) -> PipelineResult<usize> {
        self.store.count().await.map_err(PipelineError::Store)
    }

    /// 유사도 상위 k개 문서 (좋은 순, k 기본값은 설정의 top_k)
    pub async fn similarity_search(
        &self,
        query: &str,
        k: Option<usize>,
    ) -> PipelineResult<Vec<Document>> {
        Ok(self
            .search_with_scores(query, k)
            .await?
            .into_iter()
            .map(|r| r.document)
            .collect())
    }

    /// 유사도 점수 포함 검색
    pub async fn search_with_scores(
        &self,
        query: &str,
        k: Option<usize>,
    ) -> PipelineResult<Vec<SearchResult>> {
        let k = k.unwrap_or(self.top_k);

        let mut embedding = self
            .embedder
            .embed_query(query)
            .await
            .map_err(PipelineError::Embedding)?;
        l2_normalize(&mut embedding);

        let results = self
            .store
            .search(&embedding, k)
            .await
            .map_err(PipelineError::Store)?;

        tracing::debug!("Query '{}' matched {} documents", query, results.len());
        Ok(results)
    }
}

#[async_trait]
impl Retriever for KnowledgeBase {
    async fn retrieve(&self, question: &str) -> PipelineResult<Vec<Document>> {
        self.similarity_search(question, None).await
    }
}

// ============================================================================
// Initialization
// ============================================================================

/// 시스템 초기화
///
/// 레코드 파일이 없을 때만 스크랩한 뒤, 인덱스를 재구축합니다.
/// 스크랩 실패(목록 페이지 요청 실패)는 그대로 전달됩니다.
pub async fn initialize(settings: &Settings) -> PipelineResult<KnowledgeBase> {
    tracing::info!("Starting system initialization...");

    if !settings.records_path.exists() {
        tracing::info!("Scraping course data...");
        CatalogScraper::from_settings(settings)?
            .scrape_and_persist(&settings.records_path)
            .await?;
    }

    let embedder = create_embedder(settings).map_err(PipelineError::Embedding)?;
    let knowledge = KnowledgeBase::build(settings, embedder).await?;

    tracing::info!("System initialization complete!");
    Ok(knowledge)
}

// ============================================================================
// Tests
// ============================================================================
