use std::{
    future::Future,
    sync::Once,
    time::{Duration, Instant},
};

use async_trait::async_trait;
use once_cell::sync::Lazy;
use reqwest::{
    header::{self, HeaderMap, HeaderValue},
    Client, Response,
};
use serde_json::Value;

use crate::{
    error::{FetchError, FetchFailure},
    logging::Logger,
    util,
};

static LOGGER: Lazy<Logger> = Lazy::new(|| Logger::new("http"));

static INSTALL_CRYPTO_PROVIDER: Once = Once::new();

const USER_AGENT: &str = "Mozilla/5.0 (compatible; StockSymbolSeeder/1.0)";

const HTML_ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";

/// UTF-8 BOM，部分 OpenAPI 端點會在 JSON 前面帶上
const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// 單一類型請求的逾時與重試策略
#[derive(Debug, Clone, PartialEq)]
pub struct FetchPolicy {
    /// 單次請求的逾時
    pub timeout: Duration,
    /// 第一次失敗後再嘗試的次數
    pub retries: usize,
    /// 兩次嘗試之間的固定等待
    pub backoff: Duration,
}

impl FetchPolicy {
    fn attempts(&self) -> usize {
        self.retries + 1
    }
}

/// 取得遠端資料的介面，測試時可用替身取代實際的 HTTP 請求
#[async_trait]
pub trait Fetch: Send + Sync {
    /// 取得 JSON 資料源，失敗時依策略重試
    async fn get_json(&self, url: &str) -> Result<Value, FetchError>;

    /// 取得 HTML 頁面並依宣告或偵測到的編碼轉為 UTF-8
    async fn get_html(&self, url: &str, referer: &str) -> Result<String, FetchError>;
}

/// 以 reqwest 實作的 [`Fetch`]
pub struct HttpFetcher {
    client: Client,
    json_policy: FetchPolicy,
    html_policy: FetchPolicy,
}

impl HttpFetcher {
    /// Builds the reqwest client shared by every request of the run.
    ///
    /// Timeouts are applied per request from the given policies, so the client
    /// itself only carries the connection settings.
    pub fn new(json_policy: FetchPolicy, html_policy: FetchPolicy) -> Result<Self, reqwest::Error> {
        INSTALL_CRYPTO_PROVIDER.call_once(|| {
            let _ = rustls::crypto::ring::default_provider().install_default();
        });

        let client = Client::builder()
            // ===== 壓縮 =====
            .brotli(true)
            .gzip(true)
            .zstd(true)
            // ===== 超時設置 =====
            .connect_timeout(Duration::from_secs(8))
            // ===== 連接池 =====
            .pool_max_idle_per_host(2)
            .redirect(reqwest::redirect::Policy::limited(5))
            .default_headers(default_headers())
            .build()?;

        Ok(HttpFetcher {
            client,
            json_policy,
            html_policy,
        })
    }

    async fn get_json_once(&self, url: &str) -> Result<Value, FetchFailure> {
        let response = self
            .client
            .get(url)
            .timeout(self.json_policy.timeout)
            .send()
            .await?;
        let bytes = success(response)?.bytes().await?;
        let body = bytes.strip_prefix(UTF8_BOM).unwrap_or(&bytes[..]);

        serde_json::from_slice::<Value>(body)
            .map_err(|why| FetchFailure::Body(format!("not a JSON document: {}", why)))
    }

    async fn get_html_once(&self, url: &str, referer: &str) -> Result<String, FetchFailure> {
        let mut rb = self
            .client
            .get(url)
            .timeout(self.html_policy.timeout)
            .header(header::ACCEPT, HeaderValue::from_static(HTML_ACCEPT));

        match HeaderValue::from_str(referer) {
            Ok(value) => rb = rb.header(header::REFERER, value),
            Err(why) => LOGGER.warn(format!("Ignore invalid referer {} because {:?}", referer, why)),
        }

        let response = success(rb.send().await?)?;
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = response.bytes().await?;

        Ok(util::text::decode_html(&bytes, content_type.as_deref()))
    }
}

#[async_trait]
impl Fetch for HttpFetcher {
    async fn get_json(&self, url: &str) -> Result<Value, FetchError> {
        send_with_retry(url, &self.json_policy, || self.get_json_once(url)).await
    }

    async fn get_html(&self, url: &str, referer: &str) -> Result<String, FetchError> {
        send_with_retry(url, &self.html_policy, || self.get_html_once(url, referer)).await
    }
}

/// 每個請求都帶上的標頭：不使用快取並表明身分
fn default_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert(header::PRAGMA, HeaderValue::from_static("no-cache"));
    headers.insert(header::USER_AGENT, HeaderValue::from_static(USER_AGENT));
    headers
}

/// 非 2xx 的回應視為失敗
fn success(response: Response) -> Result<Response, FetchFailure> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(FetchFailure::Status(status))
    }
}

/// Runs `attempt` up to `policy.retries + 1` times, sleeping `policy.backoff`
/// between attempts.
///
/// # Errors
///
/// Returns a [`FetchError`] carrying the url, the number of attempts made and the
/// failure of the last attempt.
async fn send_with_retry<T, F, Fut>(
    url: &str,
    policy: &FetchPolicy,
    mut attempt: F,
) -> Result<T, FetchError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, FetchFailure>>,
{
    let attempts = policy.attempts();
    let mut current = 1;

    loop {
        let msg = format!("Attempt {} to send GET:{}", current, url);
        let start = Instant::now();
        let res = attempt().await;
        let elapsed = start.elapsed().as_millis();

        match res {
            Ok(value) => {
                LOGGER.debug(format!("{} {} ms", msg, elapsed));
                return Ok(value);
            }
            Err(why) => {
                LOGGER.debug(format!("{} failed because {}. {} ms", msg, why, elapsed));
                if current >= attempts {
                    return Err(FetchError {
                        url: url.to_string(),
                        attempts,
                        source: why,
                    });
                }
            }
        }

        tokio::time::sleep(policy.backoff).await;
        current += 1;
    }
}

#[cfg(test)]
mod tests {
    use encoding_rs::BIG5;

    use super::*;

    fn policy(retries: usize) -> FetchPolicy {
        FetchPolicy {
            timeout: Duration::from_secs(5),
            retries,
            backoff: Duration::from_millis(10),
        }
    }

    fn fetcher() -> HttpFetcher {
        HttpFetcher::new(policy(1), policy(0)).expect("client should build")
    }

    #[tokio::test]
    async fn test_get_json_sends_fixed_headers() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/v1/opendata/t187ap03_L")
            .match_header("cache-control", "no-cache")
            .match_header("pragma", "no-cache")
            .match_header("user-agent", USER_AGENT)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"[{"公司代號":"2330"}]"#)
            .expect(1)
            .create_async()
            .await;

        let url = format!("{}/v1/opendata/t187ap03_L", server.url());
        let value = fetcher().get_json(&url).await.expect("json should be fetched");

        assert_eq!(value[0]["公司代號"], "2330");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_get_json_strips_bom() {
        let mut server = mockito::Server::new_async().await;
        let mut body = UTF8_BOM.to_vec();
        body.extend_from_slice(br#"{"ok":true}"#);
        let _mock = server
            .mock("GET", "/bom")
            .with_status(200)
            .with_body(body)
            .create_async()
            .await;

        let url = format!("{}/bom", server.url());
        let value = fetcher().get_json(&url).await.expect("json should be fetched");
        assert_eq!(value["ok"], true);
    }

    #[tokio::test]
    async fn test_get_json_retries_once_then_fails() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/down")
            .with_status(503)
            .expect(2)
            .create_async()
            .await;

        let url = format!("{}/down", server.url());
        let err = fetcher().get_json(&url).await.expect_err("should fail");

        assert_eq!(err.attempts, 2);
        assert_eq!(err.url, url);
        assert!(matches!(
            err.source,
            FetchFailure::Status(status) if status == reqwest::StatusCode::SERVICE_UNAVAILABLE
        ));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_get_json_waits_backoff_before_retry() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/slow")
            .with_status(502)
            .expect(2)
            .create_async()
            .await;

        let backoff = Duration::from_millis(200);
        let json_policy = FetchPolicy {
            timeout: Duration::from_secs(5),
            retries: 1,
            backoff,
        };
        let fetcher = HttpFetcher::new(json_policy, policy(0)).expect("client should build");

        let url = format!("{}/slow", server.url());
        let start = Instant::now();
        let err = fetcher.get_json(&url).await.expect_err("should fail");

        assert_eq!(err.attempts, 2);
        assert!(start.elapsed() >= backoff, "elapsed {:?}", start.elapsed());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_get_json_non_json_body_is_a_failure() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/html")
            .with_status(200)
            .with_body("<html>maintenance</html>")
            .expect(2)
            .create_async()
            .await;

        let url = format!("{}/html", server.url());
        let err = fetcher().get_json(&url).await.expect_err("should fail");

        assert!(matches!(err.source, FetchFailure::Body(_)));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_get_html_decodes_big5() {
        let mut server = mockito::Server::new_async().await;
        let (body, _, _) = BIG5.encode("<td>2330　台積電</td><td>上市</td>");
        let mock = server
            .mock("GET", "/isin/C_public.jsp")
            .match_query(mockito::Matcher::UrlEncoded("strMode".into(), "2".into()))
            .match_header("accept", HTML_ACCEPT)
            .match_header("referer", "https://isin.twse.com.tw/isin/class_i.jsp?kind=2")
            .with_status(200)
            .with_header("content-type", "text/html; charset=big5")
            .with_body(body.into_owned())
            .expect(1)
            .create_async()
            .await;

        let url = format!("{}/isin/C_public.jsp?strMode=2", server.url());
        let html = fetcher()
            .get_html(&url, "https://isin.twse.com.tw/isin/class_i.jsp?kind=2")
            .await
            .expect("html should be fetched");

        assert_eq!(html, "<td>2330　台積電</td><td>上市</td>");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_get_html_single_attempt() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/missing")
            .with_status(404)
            .expect(1)
            .create_async()
            .await;

        let url = format!("{}/missing", server.url());
        let err = fetcher()
            .get_html(&url, "https://isin.twse.com.tw/")
            .await
            .expect_err("should fail");

        assert_eq!(err.attempts, 1);
        mock.assert_async().await;
    }
}
