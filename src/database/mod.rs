use sqlx::{postgres::PgConnectOptions, Connection, PgConnection};

use crate::{config, error::DatabaseError, logging};

pub mod table;

const APPLICATION_NAME: &str = "stock_symbol_seeder";

/// 由設定組出 PostgreSQL 連線參數
pub fn connect_options(config: &config::PostgreSQL) -> PgConnectOptions {
    PgConnectOptions::new()
        .host(&config.host)
        .port(config.port)
        .username(&config.user)
        .password(&config.password)
        .database(&config.db)
        .application_name(APPLICATION_NAME)
}

/// 建立本次執行唯一的一條連線。
///
/// 呼叫端負責在結束時以 [`close`] 釋放，不論成功或失敗。
///
/// # Errors
/// 無法連上資料庫時回傳錯誤。
pub async fn connect(config: &config::PostgreSQL) -> Result<PgConnection, DatabaseError> {
    PgConnection::connect_with(&connect_options(config))
        .await
        .map_err(|why| DatabaseError::new("connect to PostgreSQL", why))
}

/// 關閉連線，失敗時只記錄
pub async fn close(conn: PgConnection) {
    if let Err(why) = conn.close().await {
        logging::warn_file_async(format!("Failed to close PostgreSQL connection because {}", why));
    }
}
