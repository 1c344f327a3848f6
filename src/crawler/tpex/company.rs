use serde_json::Value;

use crate::{
    crawler::{into_rows, tpex},
    error::FetchError,
    util::http::Fetch,
};

/// 上櫃公司基本資料 OpenAPI 的網址
pub fn url() -> String {
    format!("https://www.{}/openapi/v1/mopsfin_t187ap03_R", tpex::HOST)
}

/// 取得上櫃公司基本資料。
///
/// 欄位名稱可能是中文（公司代號）或英文（SecuritiesCompanyCode），由正規化時挑選。
pub async fn visit(fetcher: &dyn Fetch) -> Result<Vec<Value>, FetchError> {
    let url = url();
    let document = fetcher.get_json(&url).await?;

    Ok(into_rows(&url, document))
}
