//! 將兩個交易所格式不一的資料列整理成 [`StockSymbol`]。
//!
//! 不符合條件的列（代號不是四碼數字、沒有名稱、不是物件）直接略過，不回報錯誤。

use hashbrown::HashMap;
use serde_json::Value;

use crate::{
    crawler::twse::international_securities_identification_number::IsinEntry,
    database::table::stock_symbol::StockSymbol,
    declare::{is_stock_code, StockExchangeMarket},
    util::text::derive_short_name,
};

/// 同一種輸出格式的正規化規則
pub trait Normalize {
    /// 產出資料的市場別
    const MARKET: StockExchangeMarket;

    /// 轉換單一列，不合格時回傳 `None`
    fn normalize_row(row: &Value) -> Option<StockSymbol>;

    fn normalize(rows: &[Value]) -> Vec<StockSymbol> {
        rows.iter().filter_map(Self::normalize_row).collect()
    }
}

/// TWSE 上市公司 OpenAPI（t187ap03_L）
pub struct TwseListed;

impl Normalize for TwseListed {
    const MARKET: StockExchangeMarket = StockExchangeMarket::Listed;

    fn normalize_row(row: &Value) -> Option<StockSymbol> {
        let code = pick(row, &["公司代號"]);
        let name = pick(row, &["公司名稱"]);
        if !is_stock_code(&code) || name.is_empty() {
            return None;
        }

        let mut item = StockSymbol::new(Self::MARKET, &code, name);
        item.short_name = Some(derive_short_name(&item.name));
        item.industry = non_empty(pick(row, &["產業別"]));

        Some(item)
    }
}

/// TPEx 上櫃公司 OpenAPI（mopsfin_t187ap03_R），欄位可能是中文或英文
pub struct TpexOverTheCounter;

impl Normalize for TpexOverTheCounter {
    const MARKET: StockExchangeMarket = StockExchangeMarket::OverTheCounter;

    fn normalize_row(row: &Value) -> Option<StockSymbol> {
        let code = pick(row, &["公司代號", "CompanyCode", "SecuritiesCompanyCode"]);
        let name = pick(row, &["公司名稱", "CompanyName"]);
        if !is_stock_code(&code) || name.is_empty() {
            return None;
        }

        let abbreviation = pick(row, &["CompanyAbbreviation", "公司簡稱"]);
        let mut item = StockSymbol::new(Self::MARKET, &code, name);
        item.short_name = Some(if abbreviation.is_empty() {
            derive_short_name(&item.name)
        } else {
            abbreviation
        });
        item.industry = non_empty(pick(
            row,
            &["產業別", "IndustryCategory", "SecuritiesIndustryCode"],
        ));

        Some(item)
    }
}

/// 只用 ISIN 上櫃頁面建立上櫃名單，名稱與簡稱都使用頁面上的名稱
pub fn from_isin(isin: &HashMap<String, IsinEntry>) -> Vec<StockSymbol> {
    let mut items: Vec<StockSymbol> = isin
        .iter()
        .filter(|(code, entry)| is_stock_code(code) && !entry.short_name.is_empty())
        .map(|(code, entry)| {
            let mut item = StockSymbol::new(
                StockExchangeMarket::OverTheCounter,
                code,
                entry.short_name.clone(),
            );
            item.short_name = Some(entry.short_name.clone());
            item.industry = non_empty(entry.industry.clone());
            item
        })
        .collect();

    items.sort_by(|a, b| a.symbol().cmp(b.symbol()));
    items
}

/// 依序嘗試候選鍵，回傳第一個非空白的值；都沒有則回傳空字串
pub fn pick(row: &Value, keys: &[&str]) -> String {
    let Some(object) = row.as_object() else {
        return String::new();
    };

    keys.iter()
        .filter_map(|key| object.get(*key))
        .filter_map(|value| match value {
            Value::String(s) => Some(s.trim().to_string()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        })
        .find(|s| !s.is_empty())
        .unwrap_or_default()
}

fn non_empty(s: String) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}
