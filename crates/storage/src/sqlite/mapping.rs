use quiz_core::model::{OptionId, QuestionKind};

use crate::repository::StorageError;

pub(super) fn id_i64(field: &'static str, v: u64) -> Result<i64, StorageError> {
    i64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} overflow")))
}

pub(super) fn id_u64(field: &'static str, v: i64) -> Result<u64, StorageError> {
    u64::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

pub(super) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

pub(super) fn u32_from_i64(field: &'static str, v: i64) -> Result<u32, StorageError> {
    u32::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

pub(super) fn usize_from_i64(field: &'static str, v: i64) -> Result<usize, StorageError> {
    usize::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

pub(super) fn kind_to_str(kind: QuestionKind) -> &'static str {
    match kind {
        QuestionKind::SingleChoice => "single_select_mcq",
        QuestionKind::MultiChoice => "multiple_select_mcq",
    }
}

pub(super) fn kind_from_str(value: &str) -> Result<QuestionKind, StorageError> {
    match value {
        "single_select_mcq" => Ok(QuestionKind::SingleChoice),
        "multiple_select_mcq" => Ok(QuestionKind::MultiChoice),
        other => Err(StorageError::Serialization(format!(
            "unknown question kind: {other}"
        ))),
    }
}

pub(super) fn selected_to_json(selected: &[OptionId]) -> Result<String, StorageError> {
    serde_json::to_string(selected).map_err(ser)
}

pub(super) fn selected_from_json(value: &str) -> Result<Vec<OptionId>, StorageError> {
    serde_json::from_str(value).map_err(ser)
}
