//! # 股票代號
//!
//! 抓取上市與上櫃公司清單，整理成 `stock_symbols` 的紀錄後寫入資料庫。
//! 全程依序執行，只使用一條資料庫連線。

use hashbrown::HashMap;
use scopeguard::defer;

use crate::{
    config::{self, OtcSource},
    crawler::{
        tpex,
        twse::{self, international_securities_identification_number as isin},
    },
    database::{self, table::stock_symbol::StockSymbol},
    declare::StockExchangeMarket,
    error::Result,
    logging,
    util::http::{Fetch, HttpFetcher},
};

use self::normalize::{Normalize, TpexOverTheCounter, TwseListed};

pub mod enrich;
pub mod normalize;

/// 寫入後在日誌中列出的樣本筆數
const SAMPLE_SIZE: usize = 5;

/// 更新 `stock_symbols`，回傳寫入的筆數
pub async fn execute(app: &config::App) -> Result<usize> {
    logging::info_file_async("更新股票代號開始");
    defer! {
        logging::info_file_async("更新股票代號結束");
    }

    let fetcher = HttpFetcher::new(app.http.json_policy(), app.http.html_policy())?;

    logging::info_file_async(format!(
        "Connecting to PostgreSQL {}:{}/{}",
        app.postgresql.host, app.postgresql.port, app.postgresql.db
    ));
    let mut conn = database::connect(&app.postgresql).await?;
    let result = seed(&mut conn, &fetcher, app.source.otc).await;
    database::close(conn).await;

    result
}

async fn seed(
    conn: &mut sqlx::PgConnection,
    fetcher: &dyn Fetch,
    otc: OtcSource,
) -> Result<usize> {
    StockSymbol::ensure_schema(conn).await?;

    let items = collect(fetcher, otc).await?;
    logging::info_file_async(format!(
        "Upserting {} items into {}",
        items.len(),
        database::table::stock_symbol::TABLE
    ));

    let total = StockSymbol::upsert(conn, &items).await?;
    logging::info_file_async(format!("Done upserting. Total: {}", total));

    for item in items.iter().take(SAMPLE_SIZE) {
        logging::info_file_async(format!("Sample record: {:?}", item));
    }

    Ok(total)
}

/// 取得上市與上櫃的完整清單，上市在前。
///
/// 上市 OpenAPI 失敗會中止整個流程；ISIN 頁面失敗只會少了補充資料。
pub async fn collect(fetcher: &dyn Fetch, otc: OtcSource) -> Result<Vec<StockSymbol>> {
    let mut items = collect_listed(fetcher).await?;
    items.extend(collect_over_the_counter(fetcher, otc).await?);

    Ok(items)
}

async fn collect_listed(fetcher: &dyn Fetch) -> Result<Vec<StockSymbol>> {
    logging::info_file_async("Fetching TWSE listed companies");
    let rows = twse::company::visit(fetcher).await?;
    let items = TwseListed::normalize(&rows);
    logging::info_file_async(format!(
        "TWSE rows: {}, normalized: {}",
        rows.len(),
        items.len()
    ));

    let entries = visit_isin(fetcher, StockExchangeMarket::Listed).await;

    Ok(enrich::enrich(items, StockExchangeMarket::Listed, &entries))
}

async fn collect_over_the_counter(
    fetcher: &dyn Fetch,
    source: OtcSource,
) -> Result<Vec<StockSymbol>> {
    let items = match source {
        OtcSource::Isin => {
            let entries = visit_isin(fetcher, StockExchangeMarket::OverTheCounter).await;
            normalize::from_isin(&entries)
        }
        OtcSource::OpenApi => {
            logging::info_file_async("Fetching TPEx over-the-counter companies");
            let rows = tpex::company::visit(fetcher).await?;
            let items = TpexOverTheCounter::normalize(&rows);
            let entries = visit_isin(fetcher, StockExchangeMarket::OverTheCounter).await;
            enrich::enrich(items, StockExchangeMarket::OverTheCounter, &entries)
        }
    };

    logging::info_file_async(format!("TPEx normalized: {}", items.len()));

    Ok(items)
}

async fn visit_isin(
    fetcher: &dyn Fetch,
    market: StockExchangeMarket,
) -> HashMap<String, isin::IsinEntry> {
    let entries = isin::visit(fetcher, market).await;
    logging::info_file_async(format!("ISIN {} entries: {}", market.name(), entries.len()));
    entries
}
