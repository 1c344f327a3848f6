use encoding_rs::{Encoding, BIG5, UTF_8};
use once_cell::sync::Lazy;
use regex::Regex;

/// 公司名稱中常見的法人字樣，較長、較特定的寫法必須排在前面，
/// 否則「公司」會先被移除而留下「(股)」這類殘字
const COMPANY_SUFFIXES: [&str; 8] = [
    "(股)有限公司",
    "(股)公司",
    "有限股份公司",
    "股份有限公司",
    "股份有公司",
    "有限公司",
    "股份有限",
    "公司",
];

/// 去除法人字樣後，頭尾需要一併去掉的符號
const SHORT_NAME_TRIM_CHARS: &[char] = &[' ', '、', '，', '(', ')', '（', '）'];

/// 簡稱的最大字數
const SHORT_NAME_MAX_CHARS: usize = 8;

/// 只檢查文件開頭這個長度內的 meta charset 宣告
const META_SNIFF_BYTES: usize = 1024;

static CHARSET_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)charset\s*=\s*["']?([A-Za-z0-9_\-:.]+)"#)
        .expect("Failed to compile charset regex")
});

/// 由公司全名推導顯示用的簡稱。
///
/// 移除法人字樣並去掉頭尾符號後，超過 8 個字只取前 8 個字；
/// 若移除後什麼都不剩則回傳原本的全名。例︰
/// `台灣積體電路製造股份有限公司` => `台灣積體電路製造`
pub fn derive_short_name(full_name: &str) -> String {
    if full_name.is_empty() {
        return String::new();
    }

    let mut name = full_name.to_string();
    for suffix in COMPANY_SUFFIXES {
        name = name.replace(suffix, "");
    }

    let trimmed = name.trim_matches(SHORT_NAME_TRIM_CHARS);
    let short: String = trimmed.chars().take(SHORT_NAME_MAX_CHARS).collect();

    if short.is_empty() {
        full_name.to_string()
    } else {
        short
    }
}

/// 將表格欄位的文字整理成單一空白分隔，全形空白與 NBSP 視為一般空白
pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// 依序以 Content-Type 宣告、meta charset 宣告、UTF-8 檢查、Big5 決定編碼後解碼。
///
/// 無法解碼的位元組會以 U+FFFD 取代，不會回傳錯誤。
pub fn decode_html(data: &[u8], content_type: Option<&str>) -> String {
    let encoding = detect_encoding(data, content_type);
    let (text, _, _) = encoding.decode(data);
    text.into_owned()
}

fn detect_encoding(data: &[u8], content_type: Option<&str>) -> &'static Encoding {
    if let Some(encoding) = content_type.and_then(charset_of) {
        return encoding;
    }

    let head = &data[..data.len().min(META_SNIFF_BYTES)];
    if let Some(encoding) = charset_of(&String::from_utf8_lossy(head)) {
        return encoding;
    }

    if std::str::from_utf8(data).is_ok() {
        UTF_8
    } else {
        BIG5
    }
}

fn charset_of(text: &str) -> Option<&'static Encoding> {
    CHARSET_RE
        .captures(text)
        .and_then(|caps| caps.get(1))
        .and_then(|label| Encoding::for_label(label.as_str().as_bytes()))
}
