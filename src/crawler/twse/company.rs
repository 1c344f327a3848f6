use serde_json::Value;

use crate::{
    crawler::{into_rows, twse},
    error::FetchError,
    util::http::Fetch,
};

/// 上市公司基本資料 OpenAPI 的網址
pub fn url() -> String {
    format!("https://openapi.{}/v1/opendata/t187ap03_L", twse::HOST)
}

/// 取得上市公司基本資料，每列的鍵為中文欄位名稱（公司代號、公司名稱、產業別…）
pub async fn visit(fetcher: &dyn Fetch) -> Result<Vec<Value>, FetchError> {
    let url = url();
    let document = fetcher.get_json(&url).await?;

    Ok(into_rows(&url, document))
}
