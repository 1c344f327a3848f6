use std::{
    env,
    path::{Path, PathBuf},
    str::FromStr,
    time::Duration,
};

use config::{Config as config_config, File as config_file};
use serde::{Deserialize, Serialize};

use crate::{error, util::http::FetchPolicy};

const CONFIG_PATH: &str = "app.json";

#[derive(Serialize, Deserialize, Default, Debug, Clone, PartialEq)]
pub struct App {
    #[serde(default)]
    pub postgresql: PostgreSQL,
    #[serde(default)]
    pub http: Http,
    #[serde(default)]
    pub source: Source,
}

const DB_HOST: &str = "DB_HOST";
const DB_PORT: &str = "DB_PORT";
const DB_USER: &str = "DB_USER";
const DB_PASSWORD: &str = "DB_PASSWORD";
const DB_NAME: &str = "DB_NAME";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct PostgreSQL {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub db: String,
}

impl Default for PostgreSQL {
    fn default() -> Self {
        PostgreSQL {
            host: "localhost".to_string(),
            port: 5432,
            user: "postgres".to_string(),
            password: "postgres".to_string(),
            db: "postgres".to_string(),
        }
    }
}

const HTTP_RETRIES: &str = "HTTP_RETRIES";
const HTTP_BACKOFF_MS: &str = "HTTP_BACKOFF_MS";
const HTTP_JSON_TIMEOUT_SECS: &str = "HTTP_JSON_TIMEOUT_SECS";
const HTTP_HTML_TIMEOUT_SECS: &str = "HTTP_HTML_TIMEOUT_SECS";

/// 對外 HTTP 請求的逾時與重試設定
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Http {
    /// JSON 資料源失敗後的重試次數
    pub retries: usize,
    /// 兩次嘗試之間的固定等待時間（毫秒）
    pub backoff_ms: u64,
    pub json_timeout_secs: u64,
    pub html_timeout_secs: u64,
    /// ISIN 頁面的重試次數，預設只請求一次
    pub html_retries: usize,
}

impl Default for Http {
    fn default() -> Self {
        Http {
            retries: 1,
            backoff_ms: 800,
            json_timeout_secs: 15,
            html_timeout_secs: 30,
            html_retries: 0,
        }
    }
}

impl Http {
    /// JSON 資料源使用的請求策略
    pub fn json_policy(&self) -> FetchPolicy {
        FetchPolicy {
            timeout: Duration::from_secs(self.json_timeout_secs),
            retries: self.retries,
            backoff: Duration::from_millis(self.backoff_ms),
        }
    }

    /// ISIN 頁面使用的請求策略
    pub fn html_policy(&self) -> FetchPolicy {
        FetchPolicy {
            timeout: Duration::from_secs(self.html_timeout_secs),
            retries: self.html_retries,
            backoff: Duration::from_millis(self.backoff_ms),
        }
    }
}

const SEED_OTC_SOURCE: &str = "SEED_OTC_SOURCE";

/// 上櫃名單的來源
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum OtcSource {
    /// 只使用 ISIN 上櫃頁面
    #[default]
    Isin,
    /// 使用 TPEx OpenAPI，再以 ISIN 頁面補上簡稱與產業
    OpenApi,
}

impl FromStr for OtcSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "isin" => Ok(OtcSource::Isin),
            "open_api" | "openapi" => Ok(OtcSource::OpenApi),
            other => Err(format!("unknown otc source '{}'", other)),
        }
    }
}

#[derive(Serialize, Deserialize, Default, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Source {
    pub otc: OtcSource,
}

impl App {
    /// 讀取 app.json（存在時），再以環境變數覆蓋
    pub fn get() -> error::Result<Self> {
        let config_path = config_path();
        if config_path.exists() {
            return Ok(Self::load(&config_path)?.override_with_env());
        }

        Ok(App::default().override_with_env())
    }

    fn load(path: &Path) -> error::Result<Self> {
        let config = config_config::builder()
            .add_source(config_file::from(path))
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// 將來至於 env 的設定值覆蓋掉 json 上的設定值
    fn override_with_env(mut self) -> Self {
        if let Ok(host) = env::var(DB_HOST) {
            self.postgresql.host = host;
        }

        if let Ok(port) = env::var(DB_PORT) {
            self.postgresql.port = u16::from_str(port.trim()).unwrap_or(5432);
        }

        if let Ok(user) = env::var(DB_USER) {
            self.postgresql.user = user;
        }

        if let Ok(password) = env::var(DB_PASSWORD) {
            self.postgresql.password = password;
        }

        if let Ok(db) = env::var(DB_NAME) {
            self.postgresql.db = db;
        }

        let http_default = Http::default();
        if let Ok(retries) = env::var(HTTP_RETRIES) {
            self.http.retries = usize::from_str(retries.trim()).unwrap_or(http_default.retries);
        }

        if let Ok(backoff) = env::var(HTTP_BACKOFF_MS) {
            self.http.backoff_ms = u64::from_str(backoff.trim()).unwrap_or(http_default.backoff_ms);
        }

        if let Ok(timeout) = env::var(HTTP_JSON_TIMEOUT_SECS) {
            self.http.json_timeout_secs =
                u64::from_str(timeout.trim()).unwrap_or(http_default.json_timeout_secs);
        }

        if let Ok(timeout) = env::var(HTTP_HTML_TIMEOUT_SECS) {
            self.http.html_timeout_secs =
                u64::from_str(timeout.trim()).unwrap_or(http_default.html_timeout_secs);
        }

        if let Ok(source) = env::var(SEED_OTC_SOURCE) {
            self.source.otc = OtcSource::from_str(&source).unwrap_or_default();
        }

        self
    }
}

/// 回傳設定檔的路徑
fn config_path() -> PathBuf {
    PathBuf::from(CONFIG_PATH)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default() {
        let app = App::default();
        assert_eq!(app.postgresql.host, "localhost");
        assert_eq!(app.postgresql.port, 5432);
        assert_eq!(app.postgresql.db, "postgres");
        assert_eq!(app.http.retries, 1);
        assert_eq!(app.source.otc, OtcSource::Isin);

        let json = app.http.json_policy();
        assert_eq!(json.timeout, Duration::from_secs(15));
        assert_eq!(json.backoff, Duration::from_millis(800));
        assert_eq!(json.retries, 1);

        let html = app.http.html_policy();
        assert_eq!(html.timeout, Duration::from_secs(30));
        assert_eq!(html.retries, 0);
    }

    #[test]
    fn test_partial_json_falls_back_to_default() {
        let app: App = serde_json::from_str(r#"{"postgresql":{"host":"db.local"}}"#)
            .expect("partial config should deserialize");
        assert_eq!(app.postgresql.host, "db.local");
        assert_eq!(app.postgresql.port, 5432);
        assert_eq!(app.http, Http::default());
    }

    fn write_temp(name: &str, content: &str) -> PathBuf {
        let path = env::temp_dir().join(format!("{}_{}.json", name, std::process::id()));
        std::fs::write(&path, content).expect("temp config should be written");
        path
    }

    #[test]
    fn test_load() {
        let path = write_temp(
            "stock_symbol_seeder_app",
            r#"{"postgresql":{"host":"db.local","port":6543},"source":{"otc":"open_api"}}"#,
        );
        let app = App::load(&path).expect("config should load");
        let _ = std::fs::remove_file(&path);

        assert_eq!(app.postgresql.host, "db.local");
        assert_eq!(app.postgresql.port, 6543);
        assert_eq!(app.source.otc, OtcSource::OpenApi);
    }

    #[test]
    fn test_load_malformed_file_is_a_config_error() {
        let path = write_temp("stock_symbol_seeder_broken", r#"{"postgresql": {"host": "#);
        let result = App::load(&path);
        let _ = std::fs::remove_file(&path);

        assert!(matches!(result, Err(error::Error::Config(_))));
    }

    #[test]
    fn test_otc_source_from_str() {
        assert_eq!(OtcSource::from_str("ISIN"), Ok(OtcSource::Isin));
        assert_eq!(OtcSource::from_str(" open_api "), Ok(OtcSource::OpenApi));
        assert!(OtcSource::from_str("csv").is_err());
    }
}
