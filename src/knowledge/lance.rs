//! LanceDB Vector Store - 디스크 기반 벡터 인덱스
//!
//! 컬렉션 하나가 LanceDB 테이블 하나입니다. 문서 본문과 메타데이터를
//! 임베딩과 같은 행에 저장하므로 검색 결과만으로 문서를 복원할 수 있습니다.
//! ref: https://lancedb.github.io/lancedb/

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use arrow_array::{
    Array, FixedSizeListArray, Float32Array, Float64Array, RecordBatch, RecordBatchIterator,
    StringArray,
};
use arrow_schema::{DataType, Field, Schema};
use async_trait::async_trait;
use futures::TryStreamExt;
use lancedb::connection::Connection;
use lancedb::query::{ExecutableQuery, QueryBase};

use super::document::{Document, DocumentMetadata};
use super::vector::{similarity_from_distance, SearchResult, VectorEntry, VectorStore};

// ============================================================================
// LanceVectorStore
// ============================================================================

/// LanceDB 벡터 저장소 구현
pub struct LanceVectorStore {
    db: Connection,
    collection: String,
}

impl LanceVectorStore {
    /// LanceDB 저장소 열기
    ///
    /// # Arguments
    /// * `path` - .lance 디렉토리 경로
    /// * `collection` - 테이블 이름
    pub async fn open(path: &Path, collection: &str) -> Result<Self> {
        if !path.exists() {
            tokio::fs::create_dir_all(path)
                .await
                .context("Failed to create LanceDB directory")?;
        }

        let path_str = path
            .to_str()
            .ok_or_else(|| anyhow::anyhow!("Invalid path encoding"))?;

        let db = lancedb::connect(path_str)
            .execute()
            .await
            .context("Failed to connect to LanceDB")?;

        Ok(Self {
            db,
            collection: collection.to_string(),
        })
    }

    /// 컬렉션 이름
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// 테이블 스키마 (임베딩 차원은 엔트리에서 결정)
    fn create_schema(dimension: i32) -> Schema {
        Schema::new(vec![
            Field::new("id", DataType::Utf8, false),
            Field::new("content", DataType::Utf8, false),
            Field::new("title", DataType::Utf8, false),
            Field::new("url", DataType::Utf8, false),
            Field::new("image_url", DataType::Utf8, false),
            Field::new("price", DataType::Float64, false),
            Field::new(
                "embedding",
                DataType::FixedSizeList(
                    Arc::new(Field::new("item", DataType::Float32, true)),
                    dimension,
                ),
                false,
            ),
        ])
    }

    /// 엔트리들을 Arrow RecordBatch로 변환
    fn entries_to_batch(entries: &[VectorEntry]) -> Result<RecordBatch> {
        let first = entries
            .first()
            .ok_or_else(|| anyhow::anyhow!("Cannot create batch from empty entries"))?;
        let dimension = first.embedding.len();

        if dimension == 0 {
            anyhow::bail!("Embedding dimension must be non-zero");
        }
        if let Some(bad) = entries.iter().find(|e| e.embedding.len() != dimension) {
            anyhow::bail!(
                "Embedding dimension mismatch for {}: {} != {}",
                bad.id,
                bad.embedding.len(),
                dimension
            );
        }

        let dimension = i32::try_from(dimension).context("Embedding dimension too large")?;

        let ids = StringArray::from_iter_values(entries.iter().map(|e| e.id.as_str()));
        let contents =
            StringArray::from_iter_values(entries.iter().map(|e| e.document.content.as_str()));
        let titles = StringArray::from_iter_values(
            entries.iter().map(|e| e.document.metadata.title.as_str()),
        );
        let urls =
            StringArray::from_iter_values(entries.iter().map(|e| e.document.metadata.url.as_str()));
        let image_urls = StringArray::from_iter_values(
            entries.iter().map(|e| e.document.metadata.image_url.as_str()),
        );
        let prices = Float64Array::from(
            entries
                .iter()
                .map(|e| e.document.metadata.price)
                .collect::<Vec<_>>(),
        );

        // 임베딩을 FixedSizeList로 변환
        let embeddings_flat: Vec<f32> = entries
            .iter()
            .flat_map(|e| e.embedding.iter().copied())
            .collect();

        let values = Float32Array::from(embeddings_flat);
        let field = Arc::new(Field::new("item", DataType::Float32, true));
        let embeddings_list = FixedSizeListArray::try_new(
            field,
            dimension,
            Arc::new(values) as Arc<dyn Array>,
            None,
        )
        .context("Failed to create embedding array")?;

        RecordBatch::try_new(
            Arc::new(Self::create_schema(dimension)),
            vec![
                Arc::new(ids),
                Arc::new(contents),
                Arc::new(titles),
                Arc::new(urls),
                Arc::new(image_urls),
                Arc::new(prices),
                Arc::new(embeddings_list),
            ],
        )
        .context("Failed to create RecordBatch")
    }

    /// 결과 배치를 검색 결과로 변환
    fn batch_to_results(batch: &RecordBatch) -> Result<Vec<SearchResult>> {
        let contents = string_column(batch, "content")?;
        let titles = string_column(batch, "title")?;
        let urls = string_column(batch, "url")?;
        let image_urls = string_column(batch, "image_url")?;

        let prices = batch
            .column_by_name("price")
            .and_then(|c| c.as_any().downcast_ref::<Float64Array>())
            .ok_or_else(|| anyhow::anyhow!("Missing price column"))?;

        // _distance 컬럼 (LanceDB가 자동 추가, 제곱 L2 거리)
        let distances = batch
            .column_by_name("_distance")
            .and_then(|c| c.as_any().downcast_ref::<Float32Array>())
            .ok_or_else(|| anyhow::anyhow!("Missing _distance column"))?;

        Ok((0..batch.num_rows())
            .map(|i| SearchResult {
                document: Document {
                    content: contents.value(i).to_string(),
                    metadata: DocumentMetadata {
                        title: titles.value(i).to_string(),
                        url: urls.value(i).to_string(),
                        image_url: image_urls.value(i).to_string(),
                        price: prices.value(i),
                    },
                },
                similarity: similarity_from_distance(distances.value(i)),
            })
            .collect())
    }

    /// 테이블 존재 여부 확인
    async fn table_exists(&self) -> Result<bool> {
        let names = self
            .db
            .table_names()
            .execute()
            .await
            .context("Failed to list tables")?;
        Ok(names.iter().any(|n| n == &self.collection))
    }

    /// 기존 테이블 열기 (없으면 None)
    async fn open_table(&self) -> Result<Option<lancedb::table::Table>> {
        if !self.table_exists().await? {
            return Ok(None);
        }

        let table = self
            .db
            .open_table(&self.collection)
            .execute()
            .await
            .context("Failed to open table")?;
        Ok(Some(table))
    }
}

/// 문자열 컬럼 조회
fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<StringArray>())
        .ok_or_else(|| anyhow::anyhow!("Missing {} column", name))
}

#[async_trait]
impl VectorStore for LanceVectorStore {
    async fn rebuild(&self, entries: &[VectorEntry]) -> Result<usize> {
        // 배치 변환을 먼저 해서 잘못된 입력이면 기존 테이블을 유지
        let batch = if entries.is_empty() {
            None
        } else {
            Some(Self::entries_to_batch(entries)?)
        };

        if self.table_exists().await? {
            self.db
                .drop_table(&self.collection)
                .await
                .context("Failed to drop existing table")?;
        }

        let Some(batch) = batch else {
            tracing::info!("Collection '{}' cleared (no documents)", self.collection);
            return Ok(0);
        };

        let schema = batch.schema();
        let batches = RecordBatchIterator::new(vec![Ok(batch)], schema);
        self.db
            .create_table(&self.collection, batches)
            .execute()
            .await
            .context("Failed to create table")?;

        tracing::info!(
            "Collection '{}' rebuilt with {} documents",
            self.collection,
            entries.len()
        );
        Ok(entries.len())
    }

    async fn search(&self, query_embedding: &[f32], limit: usize) -> Result<Vec<SearchResult>> {
        if limit == 0 {
            return Ok(vec![]);
        }

        let Some(table) = self.open_table().await? else {
            return Ok(vec![]);
        };

        let stream = table
            .vector_search(query_embedding.to_vec())
            .context("Failed to create vector search")?
            .limit(limit)
            .execute()
            .await
            .context("Failed to execute vector search")?;

        let batches: Vec<RecordBatch> = stream
            .try_collect()
            .await
            .context("Failed to read search results")?;

        let mut results = Vec::new();
        for batch in &batches {
            results.extend(Self::batch_to_results(batch)?);
        }

        results.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
        results.truncate(limit);
        Ok(results)
    }

    async fn count(&self) -> Result<usize> {
        let Some(table) = self.open_table().await? else {
            return Ok(0);
        };

        table.count_rows(None).await.context("Failed to count rows")
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::l2_normalize;
    use tempfile::TempDir;

    const DIM: usize = 8;

    fn axis(i: usize) -> Vec<f32> {
        let mut v = vec![0.0; DIM];
        v[i] = 1.0;
        v
    }

    fn create_test_entry(i: usize, title: &str) -> VectorEntry {
        VectorEntry {
            id: format!("id-{}", i),
            embedding: axis(i),
            document: Document {
                content: format!("Title: {}", title),
                metadata: DocumentMetadata {
                    title: title.to_string(),
                    url: format!("https://x/{}", i),
                    image_url: String::new(),
                    price: i as f64,
                },
            },
        }
    }

    #[tokio::test]
    async fn test_rebuild_and_search() {
        let temp_dir = TempDir::new().unwrap();
        let store = LanceVectorStore::open(&temp_dir.path().join("test.lance"), "courses")
            .await
            .unwrap();

        assert_eq!(store.count().await.unwrap(), 0);

        let entries = vec![
            create_test_entry(0, "Python"),
            create_test_entry(1, "Java"),
            create_test_entry(2, "Scratch"),
        ];
        assert_eq!(store.rebuild(&entries).await.unwrap(), 3);
        assert_eq!(store.count().await.unwrap(), 3);

        // 1번 축에 가장 가까운 질의
        let mut query = axis(1);
        query[0] = 0.3;
        l2_normalize(&mut query);

        let results = store.search(&query, 2).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].document.metadata.title, "Java");
        assert_eq!(results[1].document.metadata.title, "Python");
        assert!(results[0].similarity >= results[1].similarity);
        assert_eq!(results[0].document.metadata.url, "https://x/1");
        assert_eq!(results[0].document.metadata.price, 1.0);
    }

    #[tokio::test]
    async fn test_rebuild_replaces_previous_entries() {
        let temp_dir = TempDir::new().unwrap();
        let store = LanceVectorStore::open(&temp_dir.path().join("replace.lance"), "courses")
            .await
            .unwrap();

        store
            .rebuild(&[create_test_entry(0, "Old A"), create_test_entry(1, "Old B")])
            .await
            .unwrap();
        store.rebuild(&[create_test_entry(2, "New")]).await.unwrap();

        assert_eq!(store.count().await.unwrap(), 1);
        let results = store.search(&axis(0), 5).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].document.metadata.title, "New");
    }

    #[tokio::test]
    async fn test_empty_rebuild_then_search() {
        let temp_dir = TempDir::new().unwrap();
        let store = LanceVectorStore::open(&temp_dir.path().join("empty.lance"), "courses")
            .await
            .unwrap();

        store.rebuild(&[create_test_entry(0, "Python")]).await.unwrap();
        assert_eq!(store.rebuild(&[]).await.unwrap(), 0);

        assert_eq!(store.count().await.unwrap(), 0);
        assert!(store.search(&axis(0), 3).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_dimension_mismatch_keeps_table() {
        let temp_dir = TempDir::new().unwrap();
        let store = LanceVectorStore::open(&temp_dir.path().join("mismatch.lance"), "courses")
            .await
            .unwrap();

        store.rebuild(&[create_test_entry(0, "Python")]).await.unwrap();

        let mut bad = create_test_entry(1, "Bad");
        bad.embedding = vec![1.0; DIM + 1];
        let result = store.rebuild(&[create_test_entry(2, "Ok"), bad]).await;

        assert!(result.is_err());
        assert_eq!(store.count().await.unwrap(), 1);
    }
}
