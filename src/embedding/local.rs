//! 로컬 해시 임베딩 - 네트워크 없이 동작하는 결정적 임베딩
//!
//! 단어 토큰과 문자 trigram을 SHA-256으로 해싱해 고정 차원 버킷에 누적합니다.
//! 같은 텍스트는 프로세스/플랫폼과 무관하게 항상 같은 벡터가 됩니다.

use anyhow::Result;
use async_trait::async_trait;
use sha2::{Digest, Sha256};

use super::{l2_normalize, EmbeddingProvider};

/// 로컬 임베딩 차원 (all-MiniLM-L6-v2와 같은 크기)
pub const LOCAL_DIMENSION: usize = 384;

const WORD_WEIGHT: f32 = 1.0;
const TRIGRAM_WEIGHT: f32 = 0.5;

/// 해시 기반 임베딩
#[derive(Debug, Clone)]
pub struct LocalHashEmbedding {
    dimension: usize,
}

impl LocalHashEmbedding {
    pub fn new() -> Self {
        Self::with_dimension(LOCAL_DIMENSION)
    }

    pub fn with_dimension(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    /// 동기 임베딩 (정규화 포함)
    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];

        for token in tokenize(text) {
            self.accumulate(&mut vector, &format!("w:{}", token), WORD_WEIGHT);

            let padded: Vec<char> = format!(" {} ", token).chars().collect();
            for window in padded.windows(3) {
                let trigram: String = window.iter().collect();
                self.accumulate(&mut vector, &format!("t:{}", trigram), TRIGRAM_WEIGHT);
            }
        }

        l2_normalize(&mut vector);
        vector
    }

    /// 특징 하나를 버킷에 더함 (해시 상위 비트로 부호 결정)
    fn accumulate(&self, vector: &mut [f32], feature: &str, weight: f32) {
        let digest = Sha256::digest(feature.as_bytes());
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&digest[..8]);
        let hash = u64::from_le_bytes(bytes);

        let bucket = (hash % self.dimension as u64) as usize;
        let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
        vector[bucket] += sign * weight;
    }
}

impl Default for LocalHashEmbedding {
    fn default() -> Self {
        Self::new()
    }
}

/// 소문자 영숫자 토큰
fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
}

#[async_trait]
impl EmbeddingProvider for LocalHashEmbedding {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.embed_text(text))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &str {
        "local-hash"
    }
}
