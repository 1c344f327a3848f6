/// 股票代號
pub mod stock_symbol;
