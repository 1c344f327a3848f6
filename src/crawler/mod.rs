use serde_json::Value;

use crate::logging;

/// 台灣證券櫃檯買賣中心
pub mod tpex;
/// 台灣證券交易所
pub mod twse;

/// OpenAPI 回傳的應為陣列，其餘格式視為沒有資料
fn into_rows(url: &str, value: Value) -> Vec<Value> {
    match value {
        Value::Array(rows) => rows,
        other => {
            logging::warn_file_async(format!(
                "{} returned a non-array document ({}), treat as empty",
                url,
                json_kind(&other)
            ));
            Vec::new()
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
