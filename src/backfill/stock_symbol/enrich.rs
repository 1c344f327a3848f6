use hashbrown::HashMap;

use crate::{
    crawler::twse::international_securities_identification_number::IsinEntry,
    database::table::stock_symbol::StockSymbol, declare::StockExchangeMarket,
};

/// 以 ISIN 頁面的簡稱與產業別覆寫同市場的資料。
///
/// 只處理 `market` 的紀錄；ISIN 上為空白的欄位不會蓋掉原值。重複套用結果相同。
pub fn enrich(
    mut items: Vec<StockSymbol>,
    market: StockExchangeMarket,
    isin: &HashMap<String, IsinEntry>,
) -> Vec<StockSymbol> {
    if isin.is_empty() {
        return items;
    }

    for item in items.iter_mut().filter(|item| item.market() == market) {
        let Some(entry) = isin.get(item.code()) else {
            continue;
        };

        if !entry.short_name.is_empty() {
            item.short_name = Some(entry.short_name.clone());
        }

        if !entry.industry.is_empty() {
            item.industry = Some(entry.industry.clone());
        }
    }

    items
}

#[cfg(test)]
mod tests {
    use super::*;

    fn isin() -> HashMap<String, IsinEntry> {
        let mut isin = HashMap::new();
        isin.insert(
            "2330".to_string(),
            IsinEntry {
                short_name: "台積電".to_string(),
                industry: "半導體業".to_string(),
            },
        );
        isin.insert(
            "1101".to_string(),
            IsinEntry {
                short_name: "台泥".to_string(),
                industry: String::new(),
            },
        );
        isin
    }

    fn listed(code: &str, name: &str, industry: Option<&str>) -> StockSymbol {
        let mut item = StockSymbol::new(StockExchangeMarket::Listed, code, name.to_string());
        item.short_name = Some(name.to_string());
        item.industry = industry.map(str::to_string);
        item
    }

    #[test]
    fn test_enrich() {
        let items = vec![
            listed("2330", "台灣積體電路製造股份有限公司", Some("24")),
            listed("1101", "臺灣水泥股份有限公司", Some("01")),
            listed("2303", "聯華電子股份有限公司", None),
        ];

        let items = enrich(items, StockExchangeMarket::Listed, &isin());

        assert_eq!(items[0].short_name.as_deref(), Some("台積電"));
        assert_eq!(items[0].industry.as_deref(), Some("半導體業"));
        assert_eq!(items[0].name, "台灣積體電路製造股份有限公司");
        // 空白的產業別不覆寫
        assert_eq!(items[1].short_name.as_deref(), Some("台泥"));
        assert_eq!(items[1].industry.as_deref(), Some("01"));
        // 查無代號則維持原樣
        assert_eq!(items[2].short_name.as_deref(), Some("聯華電子股份有限公司"));
        assert_eq!(items[2].industry, None);
    }

    #[test]
    fn test_enrich_is_idempotent() {
        let items = vec![listed("2330", "台灣積體電路製造股份有限公司", None)];

        let once = enrich(items, StockExchangeMarket::Listed, &isin());
        let twice = enrich(once.clone(), StockExchangeMarket::Listed, &isin());

        assert_eq!(once, twice);
    }

    #[test]
    fn test_enrich_with_empty_map() {
        let items = vec![listed("2330", "台積電", Some("24"))];
        let result = enrich(items.clone(), StockExchangeMarket::Listed, &HashMap::new());
        assert_eq!(result, items);
    }

    #[test]
    fn test_enrich_skips_other_market() {
        let mut item = StockSymbol::new(
            StockExchangeMarket::OverTheCounter,
            "2330",
            "同代號的上櫃資料".to_string(),
        );
        item.short_name = Some("上櫃".to_string());
        let items = vec![item];

        let result = enrich(items.clone(), StockExchangeMarket::Listed, &isin());
        assert_eq!(result, items);
    }
}
