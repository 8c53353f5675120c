//! 코스 레코드 모듈 - 스크랩된 카탈로그 항목과 영속 레코드 파일
//!
//! 레코드 파일은 `CourseRecord` 객체의 JSON 배열입니다 (UTF-8, 4칸 들여쓰기).
//! 저장은 임시 파일 + rename으로 원자적으로 교체됩니다.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ============================================================================
// CourseRecord
// ============================================================================

/// 카탈로그 항목 하나의 정규화된 레코드
///
/// 마크업에서 찾지 못한 필드는 `None`이며 JSON에서 키 자체가 빠집니다.
/// `title`/`course_url`이 없다는 것은 "알 수 없음"이고 빈 문자열과 구분됩니다.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CourseRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_alt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub course_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub course_description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub main_features: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail_image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub short_description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_per_session: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lessons_count: Option<u64>,
    /// 사이드바 메타데이터 (소문자 라벨 -> 값). 키는 레코드마다 다릅니다.
    #[serde(flatten)]
    pub sidebar: BTreeMap<String, String>,
}

/// 상세 페이지에서 추출한 필드
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CourseDetails {
    pub course_description: Option<String>,
    pub main_features: Option<Vec<String>>,
    pub sidebar: BTreeMap<String, String>,
    pub detail_image: Option<String>,
}

impl CourseDetails {
    pub fn is_empty(&self) -> bool {
        self.course_description.is_none()
            && self.main_features.is_none()
            && self.sidebar.is_empty()
            && self.detail_image.is_none()
    }
}

impl CourseRecord {
    /// 상세 필드 병합 (키 충돌 시 상세 값이 우선)
    ///
    /// 사이드바 라벨이 고정 문자열 필드 이름과 같으면 해당 필드를 덮어씁니다.
    /// 숫자 필드 이름과 겹치는 라벨은 타입이 맞지 않으므로 버립니다.
    pub fn merge_details(&mut self, details: CourseDetails) {
        if details.course_description.is_some() {
            self.course_description = details.course_description;
        }
        if details.main_features.is_some() {
            self.main_features = details.main_features;
        }
        if details.detail_image.is_some() {
            self.detail_image = details.detail_image;
        }

        for (key, value) in details.sidebar {
            let slot = match key.as_str() {
                "image_url" => &mut self.image_url,
                "image_alt" => &mut self.image_alt,
                "title" => &mut self.title,
                "course_url" => &mut self.course_url,
                "course_description" => &mut self.course_description,
                "detail_image" => &mut self.detail_image,
                "short_description" => &mut self.short_description,
                "price_text" => &mut self.price_text,
                "main_features" | "price_per_session" | "lessons_count" => {
                    tracing::debug!("Dropping sidebar entry '{}' (typed field)", key);
                    continue;
                }
                _ => {
                    self.sidebar.insert(key, value);
                    continue;
                }
            };
            *slot = Some(value);
        }
    }
}

// ============================================================================
// Persisted Record Set
// ============================================================================

/// 레코드 파일 로드
///
/// 파일이 없거나 JSON이 잘못된 경우 에러 대신 빈 목록을 반환합니다.
/// 빈 목록은 상위(검색 파사드)에서 "데이터 없음"으로 처리됩니다.
///
/// 레코드는 하나씩 변환합니다. 타입이 맞지 않는 필드는 가능한 만큼 변환하고,
/// 객체가 아닌 원소만 건너뜁니다.
pub fn load_records(path: &Path) -> Vec<CourseRecord> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::warn!("{} not found. Run the scraper first.", path.display());
            return Vec::new();
        }
        Err(e) => {
            tracing::warn!("Failed to read {}: {}", path.display(), e);
            return Vec::new();
        }
    };

    let values = match serde_json::from_str::<Vec<Value>>(&raw) {
        Ok(values) => values,
        Err(e) => {
            tracing::warn!("Invalid JSON format in {}: {}", path.display(), e);
            return Vec::new();
        }
    };

    let records: Vec<CourseRecord> = values
        .into_iter()
        .enumerate()
        .filter_map(|(index, value)| record_from_value(index, value))
        .collect();

    tracing::debug!("Loaded {} course records from {}", records.len(), path.display());
    records
}

/// JSON 원소 하나를 레코드로 변환
fn record_from_value(index: usize, value: Value) -> Option<CourseRecord> {
    let Value::Object(map) = value else {
        tracing::warn!("Skipping record {}: not a JSON object", index);
        return None;
    };

    match CourseRecord::deserialize(&Value::Object(map.clone())) {
        Ok(record) => Some(record),
        Err(e) => {
            tracing::warn!("Record {} has mistyped fields ({}), coercing", index, e);
            Some(coerce_record(map))
        }
    }
}

/// 필드 단위 변환 (변환할 수 없는 값은 버림)
fn coerce_record(map: Map<String, Value>) -> CourseRecord {
    let mut record = CourseRecord::default();

    for (key, value) in map {
        match key.as_str() {
            "image_url" => record.image_url = value_string(&value),
            "image_alt" => record.image_alt = value_string(&value),
            "title" => record.title = value_string(&value),
            "course_url" => record.course_url = value_string(&value),
            "course_description" => record.course_description = value_string(&value),
            "detail_image" => record.detail_image = value_string(&value),
            "short_description" => record.short_description = value_string(&value),
            "price_text" => record.price_text = value_string(&value),
            "main_features" => {
                record.main_features = value
                    .as_array()
                    .map(|items| items.iter().filter_map(value_string).collect());
            }
            "price_per_session" => record.price_per_session = value_f64(&value),
            "lessons_count" => record.lessons_count = value_u64(&value),
            _ => match value_string(&value) {
                Some(text) => {
                    record.sidebar.insert(key, text);
                }
                None => tracing::debug!("Dropping non-scalar field '{}'", key),
            },
        }
    }

    record
}

fn value_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn value_f64(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };
    number.filter(|n| n.is_finite())
}

fn value_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// 레코드 파일 저장 (원자적 교체)
///
/// 같은 디렉토리의 임시 파일에 쓴 뒤 rename합니다. 실패하면 기존 파일은 그대로입니다.
pub fn save_records(path: &Path, records: &[CourseRecord]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent).context("Failed to create records directory")?;
        }
    }

    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
    records
        .serialize(&mut serializer)
        .context("Failed to serialize course records")?;

    let tmp_path = temp_path(path);
    std::fs::write(&tmp_path, &buf)
        .with_context(|| format!("Failed to write {}", tmp_path.display()))?;

    if let Err(e) = std::fs::rename(&tmp_path, path) {
        let _ = std::fs::remove_file(&tmp_path);
        return Err(e).with_context(|| format!("Failed to replace {}", path.display()));
    }

    tracing::debug!("Saved {} course records to {}", records.len(), path.display());
    Ok(())
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "courses_data.json".into());
    name.push(".tmp");
    path.with_file_name(name)
}

// ============================================================================
// Tests
// ============================================================================
