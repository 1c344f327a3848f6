use strum::{AsRefStr, Display, EnumIter, EnumString, IntoStaticStr};

/// 市場別
#[derive(
    PartialEq, Eq, Hash, Debug, Copy, Clone, AsRefStr, Display, EnumIter, EnumString, IntoStaticStr,
)]
#[repr(i32)]
pub enum StockExchangeMarket {
    /// 上市 2
    #[strum(serialize = "listed")]
    Listed = 2,
    /// 上櫃 4
    #[strum(serialize = "otc")]
    OverTheCounter = 4,
}

impl StockExchangeMarket {
    /// ISIN 頁面的 strMode
    pub fn serial(&self) -> i32 {
        *self as i32
    }

    /// ISIN 頁面「市場別」欄位的文字
    pub fn name(&self) -> &'static str {
        match *self {
            StockExchangeMarket::Listed => "上市",
            StockExchangeMarket::OverTheCounter => "上櫃",
        }
    }

    /// 股票代號的市場後綴
    pub fn suffix(&self) -> &'static str {
        match *self {
            StockExchangeMarket::Listed => ".TW",
            StockExchangeMarket::OverTheCounter => ".TWO",
        }
    }

    /// 由 `2330.TW`、`8086.TWO` 這類代號的後綴判斷市場別
    pub fn from_symbol(symbol: &str) -> Option<StockExchangeMarket> {
        if symbol.ends_with(StockExchangeMarket::OverTheCounter.suffix()) {
            Some(StockExchangeMarket::OverTheCounter)
        } else if symbol.ends_with(StockExchangeMarket::Listed.suffix()) {
            Some(StockExchangeMarket::Listed)
        } else {
            None
        }
    }
}

/// 判斷是否為四碼數字的股票代號
pub fn is_stock_code(code: &str) -> bool {
    code.len() == 4 && code.bytes().all(|b| b.is_ascii_digit())
}
