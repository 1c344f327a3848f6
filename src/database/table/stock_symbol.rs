use concat_string::concat_string;
use hashbrown::{HashMap, HashSet};
use sqlx::{Connection, PgConnection, Postgres, QueryBuilder};

use crate::{declare::StockExchangeMarket, error::DatabaseError, logging};

pub const TABLE: &str = "stock_symbols";

/// PostgreSQL 單一語句可綁定的參數上限
const MAX_BIND_PARAMS: usize = 65535;

const CREATE_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS stock_symbols (
    symbol VARCHAR(20) PRIMARY KEY,
    name VARCHAR(100) NOT NULL,
    short_name VARCHAR(100),
    market VARCHAR(16),
    industry VARCHAR(64)
)"#;

/// 舊版資料表可能沒有的欄位
const ADD_COLUMNS: [&str; 3] = [
    "ALTER TABLE stock_symbols ADD COLUMN IF NOT EXISTS short_name VARCHAR(100)",
    "ALTER TABLE stock_symbols ADD COLUMN IF NOT EXISTS market VARCHAR(16)",
    "ALTER TABLE stock_symbols ADD COLUMN IF NOT EXISTS industry VARCHAR(64)",
];

/// 股票代號資料列（`stock_symbols`）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockSymbol {
    /// 代號加市場後綴，例︰`2330.TW`、`8086.TWO`
    symbol: String,
    /// 公司名稱
    pub name: String,
    /// 簡稱
    pub short_name: Option<String>,
    /// 市場別，只由代號後綴決定
    market: StockExchangeMarket,
    /// 產業別
    pub industry: Option<String>,
}

impl StockSymbol {
    /// 以四碼代號與市場別建立，代號後綴由市場別決定
    pub fn new(market: StockExchangeMarket, code: &str, name: String) -> Self {
        StockSymbol {
            symbol: concat_string!(code, market.suffix()),
            name,
            short_name: None,
            market,
            industry: None,
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn market(&self) -> StockExchangeMarket {
        self.market
    }

    /// 不含市場後綴的四碼代號
    pub fn code(&self) -> &str {
        &self.symbol[..self.symbol.len() - self.market.suffix().len()]
    }

    /// 建立資料表並補上舊版資料表缺少的欄位，可重複執行
    pub async fn ensure_schema(conn: &mut PgConnection) -> Result<(), DatabaseError> {
        let step = "ensure stock_symbols schema";
        let mut tx = conn
            .begin()
            .await
            .map_err(|why| DatabaseError::new(step, why))?;

        sqlx::query(CREATE_TABLE)
            .execute(&mut *tx)
            .await
            .map_err(|why| DatabaseError::new(step, why))?;

        for sql in ADD_COLUMNS {
            sqlx::query(sql)
                .execute(&mut *tx)
                .await
                .map_err(|why| DatabaseError::new(step, why))?;
        }

        tx.commit()
            .await
            .map_err(|why| DatabaseError::new(step, why))
    }

    /// 以 symbol 為鍵批次新增或更新，回傳處理的筆數。
    ///
    /// 只寫入資料表目前實際存在的欄位；同一批內重複的 symbol 以最後一筆為準。
    /// 空的輸入不會連線資料庫。
    pub async fn upsert(conn: &mut PgConnection, items: &[StockSymbol]) -> Result<usize, DatabaseError> {
        if items.is_empty() {
            return Ok(0);
        }

        let columns = Columns::fetch(conn).await?;
        let rows = dedup_by_symbol(items);
        let step = "upsert stock_symbols";
        let mut tx = conn
            .begin()
            .await
            .map_err(|why| DatabaseError::new(step, why))?;

        for chunk in rows.chunks(columns.max_rows_per_statement()) {
            build_upsert(&columns, chunk)
                .build()
                .execute(&mut *tx)
                .await
                .map_err(|why| DatabaseError::new(step, why))?;
            logging::debug_file_async(format!("Upserted a chunk of {} rows", chunk.len()));
        }

        tx.commit()
            .await
            .map_err(|why| DatabaseError::new(step, why))?;

        Ok(items.len())
    }
}

/// `stock_symbols` 目前具備的選用欄位，每次寫入前重新查詢
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Columns {
    pub market: bool,
    pub industry: bool,
    pub short_name: bool,
}

impl Columns {
    /// 查詢目前 schema 下 `stock_symbols` 的欄位
    pub async fn fetch(conn: &mut PgConnection) -> Result<Columns, DatabaseError> {
        let names: Vec<String> = sqlx::query_scalar(
            r#"
SELECT column_name::text
FROM information_schema.columns
WHERE table_schema = current_schema() AND table_name = $1
"#,
        )
        .bind(TABLE)
        .fetch_all(&mut *conn)
        .await
        .map_err(|why| DatabaseError::new("introspect stock_symbols columns", why))?;

        Ok(Columns::from_names(names.iter().map(String::as_str)))
    }

    pub fn from_names<'a>(names: impl IntoIterator<Item = &'a str>) -> Columns {
        let names: HashSet<&str> = names.into_iter().collect();
        Columns {
            market: names.contains("market"),
            industry: names.contains("industry"),
            short_name: names.contains("short_name"),
        }
    }

    /// 寫入時使用的欄位，順序固定為 symbol, name, market, industry, short_name
    pub fn insert_columns(&self) -> Vec<&'static str> {
        let mut columns = vec!["symbol", "name"];
        if self.market {
            columns.push("market");
        }
        if self.industry {
            columns.push("industry");
        }
        if self.short_name {
            columns.push("short_name");
        }
        columns
    }

    fn max_rows_per_statement(&self) -> usize {
        MAX_BIND_PARAMS / self.insert_columns().len()
    }
}

/// 同一個 symbol 只留最後一筆，順序依第一次出現的位置
fn dedup_by_symbol(items: &[StockSymbol]) -> Vec<&StockSymbol> {
    let mut index: HashMap<&str, usize> = HashMap::with_capacity(items.len());
    let mut rows: Vec<&StockSymbol> = Vec::with_capacity(items.len());

    for item in items {
        match index.get(item.symbol()) {
            Some(&i) => rows[i] = item,
            None => {
                index.insert(item.symbol(), rows.len());
                rows.push(item);
            }
        }
    }

    rows
}

fn build_upsert<'a>(columns: &Columns, rows: &[&'a StockSymbol]) -> QueryBuilder<'a, Postgres> {
    let insert_columns = columns.insert_columns();
    let mut query_builder = QueryBuilder::new(format!(
        "INSERT INTO {} ({}) ",
        TABLE,
        insert_columns.join(", ")
    ));

    query_builder.push_values(rows.iter().copied(), |mut b, row| {
        b.push_bind(row.symbol()).push_bind(&row.name);
        if columns.market {
            let market: &'static str = row.market().into();
            b.push_bind(market);
        }
        if columns.industry {
            b.push_bind(&row.industry);
        }
        if columns.short_name {
            b.push_bind(&row.short_name);
        }
    });

    let updates: Vec<String> = insert_columns
        .iter()
        .skip(1)
        .map(|c| format!("{c} = EXCLUDED.{c}"))
        .collect();
    query_builder.push(" ON CONFLICT (symbol) DO UPDATE SET ");
    query_builder.push(updates.join(", "));

    query_builder
}
