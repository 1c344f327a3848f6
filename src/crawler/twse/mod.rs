/// 上市公司基本資料
pub mod company;
/// 國際證券辨識
pub mod international_securities_identification_number;

const HOST: &str = "twse.com.tw";
