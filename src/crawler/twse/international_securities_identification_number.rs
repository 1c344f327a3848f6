//! # TWSE 國際證券辨識號碼一覽表
//!
//! `https://isin.twse.com.tw/isin/C_public.jsp?strMode=2`（上市）與 `strMode=4`（上櫃）
//! 以表格列出每一檔有價證券，第一欄為「代號　名稱」，其後依序為 ISIN、上市日、
//! 市場別、產業別、CFICode、備註。
//!
//! 這裡只取四碼數字的股票代號，輸出 `代號 => (簡稱, 產業別)`，供補齊 OpenAPI 缺少的
//! 簡稱與產業文字。頁面格式並無保證，任何不符的列都會被略過，抓取失敗則回傳空集合。

use concat_string::concat_string;
use hashbrown::HashMap;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use crate::{
    declare::StockExchangeMarket,
    logging,
    util::{self, http::Fetch},
};

/// 一列至少要有的欄位數
const MIN_CELLS: usize = 6;
/// 「市場別」欄位的索引
const MARKET_CELL: usize = 3;
/// 「產業別」欄位的索引
const INDUSTRY_CELL: usize = 4;

static ROW_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("tr").expect("Failed to parse row selector"));

static CELL_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("td").expect("Failed to parse cell selector"));

/// 第一欄的「代號 名稱」，例︰`2330 台積電`
static CODE_AND_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([0-9]{4})\s+(.+)$").expect("Failed to compile code and name regex")
});

/// ISIN 頁面上的一檔股票
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IsinEntry {
    /// 頁面上的名稱（即簡稱）
    pub short_name: String,
    /// 產業別文字，可能為空
    pub industry: String,
}

/// 指定市場別的 ISIN 頁面網址
pub fn url(market: StockExchangeMarket) -> String {
    concat_string!(
        "https://isin.twse.com.tw/isin/C_public.jsp?strMode=",
        market.serial().to_string()
    )
}

/// 請求 ISIN 頁面時帶上的 Referer
pub fn referer(market: StockExchangeMarket) -> String {
    concat_string!(
        "https://isin.twse.com.tw/isin/class_i.jsp?kind=",
        market.serial().to_string()
    )
}

/// 抓取並解析指定市場別的 ISIN 頁面。
///
/// 失敗不會中斷流程，只記錄警告並回傳空集合。
pub async fn visit(fetcher: &dyn Fetch, market: StockExchangeMarket) -> HashMap<String, IsinEntry> {
    let html = match fetcher.get_html(&url(market), &referer(market)).await {
        Ok(html) => html,
        Err(why) => {
            logging::warn_file_async(format!(
                "Failed to visit ISIN {} page because {}",
                market.name(),
                why
            ));
            return HashMap::new();
        }
    };

    let result = parse(&html, market);
    if result.is_empty() {
        logging::warn_file_async(format!(
            "ISIN {} page returned no rows, the layout may have changed",
            market.name()
        ));
    }

    result
}

/// 解析 ISIN 頁面，只保留市場別包含 `market.name()` 的四碼股票
pub fn parse(html: &str, market: StockExchangeMarket) -> HashMap<String, IsinEntry> {
    let document = Html::parse_document(html);
    let marker = market.name();
    let mut result = HashMap::with_capacity(2048);

    for row in document.select(&ROW_SELECTOR) {
        let cells: Vec<String> = row.select(&CELL_SELECTOR).map(cell_text).collect();
        if cells.len() < MIN_CELLS {
            continue;
        }

        if !cells[MARKET_CELL].contains(marker) {
            continue;
        }

        let Some(caps) = CODE_AND_NAME.captures(&cells[0]) else {
            continue;
        };

        let code = caps[1].to_string();
        let short_name = caps[2].trim().to_string();
        if short_name.is_empty() {
            continue;
        }

        result.insert(
            code,
            IsinEntry {
                short_name,
                industry: cells[INDUSTRY_CELL].clone(),
            },
        );
    }

    result
}

/// 取出欄位內所有文字節點，以空白串接後整理空白
fn cell_text(cell: ElementRef) -> String {
    util::text::collapse_whitespace(&cell.text().collect::<Vec<_>>().join(" "))
}
