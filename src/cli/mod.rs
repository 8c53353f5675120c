//! CLI 모듈
//!
//! course-rag CLI 명령어 정의 및 구현

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use crate::config::{EmbedderKind, Settings};
use crate::course::load_records;
use crate::embedding::{create_embedder, has_api_key};
use crate::knowledge::{initialize, IndexManifest, KnowledgeBase, SearchResult};
use crate::scraper::CatalogScraper;

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Parser)]
#[command(name = "course-rag")]
#[command(version, about = "코스 카탈로그 스크래핑 + 벡터 검색", long_about = None)]
pub struct Cli {
    /// 데이터 디렉토리 (기본: COURSE_RAG_DATA_DIR 또는 ~/.course-rag)
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// 임베딩 프로바이더 (local | gemini)
    #[arg(long, global = true)]
    pub embedder: Option<EmbedderKind>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// 카탈로그를 스크랩해 레코드 파일 저장
    Scrape {
        /// 카탈로그 목록 URL
        #[arg(long)]
        url: Option<String>,
    },

    /// 레코드 파일로 벡터 인덱스 재구축
    Index,

    /// 레코드가 없으면 스크랩한 뒤 인덱스 재구축
    Init,

    /// 지식베이스 검색
    Query {
        /// 검색 쿼리
        query: String,

        /// 결과 개수 (기본: COURSE_RAG_TOP_K)
        #[arg(short, long)]
        k: Option<usize>,

        /// JSON으로 출력
        #[arg(long)]
        json: bool,
    },

    /// 상태 확인
    Status,
}

// ============================================================================
// CLI Runner
// ============================================================================

/// CLI 명령어 실행
pub async fn run(cli: Cli) -> Result<()> {
    let mut settings = Settings::from_env().context("설정 로드 실패")?;
    if let Some(ref dir) = cli.data_dir {
        settings.relocate(dir);
    }
    if let Some(kind) = cli.embedder {
        settings.embedder = kind;
    }

    match cli.command {
        Commands::Scrape { url } => cmd_scrape(settings, url).await,
        Commands::Index => cmd_index(&settings).await,
        Commands::Init => cmd_init(&settings).await,
        Commands::Query { query, k, json } => cmd_query(&settings, &query, k, json).await,
        Commands::Status => cmd_status(&settings).await,
    }
}

// ============================================================================
// Command Implementations
// ============================================================================

/// 스크랩 명령어 (scrape)
///
/// 실패하면 기존 레코드 파일은 그대로 남습니다.
async fn cmd_scrape(mut settings: Settings, url: Option<String>) -> Result<()> {
    if let Some(url) = url {
        settings.catalog_url = url;
    }

    println!("[*] 카탈로그 스크래핑 중: {}", settings.catalog_url);

    let scraper = CatalogScraper::from_settings(&settings).context("스크래퍼 생성 실패")?;
    let records = scraper
        .scrape_and_persist(&settings.records_path)
        .await
        .context("스크래핑 실패")?;

    println!("[OK] 코스 {} 건 저장됨", records.len());
    println!("     파일: {}", settings.records_path.display());

    Ok(())
}

/// 인덱스 명령어 (index)
async fn cmd_index(settings: &Settings) -> Result<()> {
    println!("[*] 인덱스 재구축 중: {}", settings.index_path.display());

    let embedder = create_embedder(settings).context("임베더 생성 실패")?;
    let knowledge = KnowledgeBase::build(settings, embedder)
        .await
        .context("인덱스 구축 실패")?;

    print_manifest(knowledge.manifest());
    Ok(())
}

/// 초기화 명령어 (init)
async fn cmd_init(settings: &Settings) -> Result<()> {
    println!("[*] 시스템 초기화 중...");

    let knowledge = initialize(settings).await.context("초기화 실패")?;

    print_manifest(knowledge.manifest());
    Ok(())
}

/// 검색 명령어 (query)
async fn cmd_query(settings: &Settings, query: &str, k: Option<usize>, json: bool) -> Result<()> {
    let embedder = create_embedder(settings).context("임베더 생성 실패")?;
    let knowledge = KnowledgeBase::open(settings, embedder)
        .await
        .context("인덱스 열기 실패 (먼저 `course-rag index` 실행)")?;

    let results = knowledge
        .search_with_scores(query, k)
        .await
        .context("검색 실패")?;

    if json {
        let documents: Vec<_> = results.iter().map(|r| &r.document).collect();
        println!("{}", serde_json::to_string_pretty(&documents)?);
        return Ok(());
    }

    println!("[*] 검색 중: \"{}\"", query);

    if results.is_empty() {
        println!("\n[!] 검색 결과가 없습니다.");
        return Ok(());
    }

    println!("\n[OK] 검색 결과 ({} 건):\n", results.len());
    for (i, result) in results.iter().enumerate() {
        print_result(i + 1, result);
    }

    Ok(())
}

/// 상태 명령어 (status)
async fn cmd_status(settings: &Settings) -> Result<()> {
    println!("course-rag v{}", env!("CARGO_PKG_VERSION"));
    println!();

    println!("[*] 데이터 디렉토리: {}", settings.data_dir.display());
    println!("[*] 카탈로그: {}", settings.catalog_url);
    println!("[*] 임베더: {:?}", settings.embedder);

    if settings.embedder == EmbedderKind::Gemini {
        if has_api_key() {
            println!("[OK] API 키: 설정됨");
        } else {
            println!("[!] API 키: 미설정");
            println!("    설정: export GEMINI_API_KEY=your-key");
        }
    }

    // 레코드 파일
    match std::fs::metadata(&settings.records_path) {
        Ok(meta) => {
            let records = load_records(&settings.records_path);
            println!(
                "[OK] 레코드: {} 건 ({})",
                records.len(),
                format_bytes(meta.len() as usize)
            );
        }
        Err(_) => {
            println!("[!] 레코드 파일 없음: {}", settings.records_path.display());
        }
    }

    // 인덱스
    match IndexManifest::load(&settings.index_path, &settings.collection) {
        Ok(Some(manifest)) => print_manifest(&manifest),
        Ok(None) => println!("[!] 인덱스 미구축: {}", settings.collection),
        Err(e) => println!("[!] 매니페스트 읽기 실패: {}", e),
    }

    Ok(())
}

// ============================================================================
// Helper Functions
// ============================================================================

fn print_manifest(manifest: &IndexManifest) {
    println!(
        "[OK] 인덱스 '{}': 문서 {} 건",
        manifest.collection, manifest.document_count
    );
    println!(
        "     임베더: {} ({}차원), 구축: {}",
        manifest.embedder,
        manifest.dimension,
        manifest.built_at.format("%Y-%m-%d %H:%M")
    );
}

fn print_result(rank: usize, result: &SearchResult) {
    let metadata = &result.document.metadata;

    println!(
        "{}. [점수: {:.4}] {}",
        rank,
        result.similarity,
        if metadata.title.is_empty() {
            "-"
        } else {
            metadata.title.as_str()
        }
    );

    if !metadata.url.is_empty() {
        println!("   URL: {}", metadata.url);
    }
    if metadata.price > 0.0 {
        println!("   가격: ${}", metadata.price);
    }
    println!("   내용: {}", truncate_text(&result.document.content, 200));
    println!();
}

/// 텍스트 자르기 (UTF-8 안전)
fn truncate_text(text: &str, max_chars: usize) -> String {
    let cleaned = text.replace('\n', " ").replace('\r', "");
    let cleaned = cleaned.trim();

    if cleaned.chars().count() <= max_chars {
        cleaned.to_string()
    } else {
        let truncated: String = cleaned.chars().take(max_chars).collect();
        format!("{}...", truncated)
    }
}

/// 바이트 크기 포맷팅
fn format_bytes(bytes: usize) -> String {
    const KB: usize = 1024;
    const MB: usize = KB * 1024;

    if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_text() {
        assert_eq!(truncate_text("Title: A", 20), "Title: A");
        assert_eq!(truncate_text("Title: Python 101", 5), "Title...");
        assert_eq!(
            truncate_text("Title: A\nDescription: B", 40),
            "Title: A Description: B"
        );
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(500), "500 B");
        assert_eq!(format_bytes(1536), "1.50 KB");
        assert_eq!(format_bytes(1048576), "1.00 MB");
    }

    #[test]
    fn test_parse_query_command() {
        let cli = Cli::parse_from([
            "course-rag",
            "--embedder",
            "local",
            "query",
            "python basics",
            "-k",
            "5",
            "--json",
        ]);
        assert_eq!(cli.embedder, Some(EmbedderKind::Local));
        match cli.command {
            Commands::Query { query, k, json } => {
                assert_eq!(query, "python basics");
                assert_eq!(k, Some(5));
                assert!(json);
            }
            _ => panic!("expected query command"),
        }
    }

    #[test]
    fn test_parse_rejects_unknown_embedder() {
        let result = Cli::try_parse_from(["course-rag", "--embedder", "openai", "status"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_global_data_dir_after_subcommand() {
        let cli = Cli::parse_from(["course-rag", "index", "--data-dir", "/tmp/x"]);
        assert_eq!(cli.data_dir, Some(PathBuf::from("/tmp/x")));
        assert!(matches!(cli.command, Commands::Index));
    }
}
