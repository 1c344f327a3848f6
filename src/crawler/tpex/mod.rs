/// 上櫃公司基本資料
pub mod company;

const HOST: &str = "tpex.org.tw";
