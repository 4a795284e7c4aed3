pub mod models;
pub use models::*;

use crate::core::catalog::CatalogEntry;
use anyhow::Result;
use sqlx::sqlite::SqlitePoolOptions;
pub use sqlx::SqlitePool;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::debug;

/// 打开（必要时创建）数据库并运行迁移
pub async fn connect(db_path: &Path) -> Result<SqlitePool> {
    // Windows 路径需要转换反斜杠为正斜杠
    let db_path_str = db_path
        .to_str()
        .ok_or_else(|| anyhow::anyhow!("Invalid database path"))?
        .replace('\\', "/");

    let db = SqlitePoolOptions::new()
        .max_connections(5)
        .acquire_timeout(Duration::from_secs(30))
        .idle_timeout(Duration::from_secs(600))
        .connect(&format!("sqlite:{}?mode=rwc", db_path_str))
        .await?;

    sqlx::migrate!("./migrations").run(&db).await?;
    Ok(db)
}

/// 内存数据库，单连接保证所有查询看到同一份数据
#[cfg(test)]
pub async fn connect_memory() -> Result<SqlitePool> {
    let db = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;
    sqlx::migrate!("./migrations").run(&db).await?;
    Ok(db)
}

/// 读取配置项
pub async fn get_config(pool: &SqlitePool, key: &str) -> Result<Option<String>> {
    let value = sqlx::query_scalar::<_, String>("SELECT value FROM config WHERE key = ?")
        .bind(key)
        .fetch_optional(pool)
        .await?;
    Ok(value)
}

/// 写入配置项
pub async fn save_config(pool: &SqlitePool, key: &str, value: &str) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO config (key, value) VALUES (?, ?)
        ON CONFLICT(key) DO UPDATE SET value = excluded.value
        "#,
    )
    .bind(key)
    .bind(value)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn delete_config(pool: &SqlitePool, key: &str) -> Result<()> {
    sqlx::query("DELETE FROM config WHERE key = ?")
        .bind(key)
        .execute(pool)
        .await?;
    Ok(())
}

/// 书名映射存储；所有写入经过同一把锁
#[derive(Clone)]
pub struct MappingStore {
    db: Arc<SqlitePool>,
    write_lock: Arc<Mutex<()>>,
}

impl MappingStore {
    pub fn new(db: Arc<SqlitePool>) -> Self {
        Self {
            db,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    pub async fn get(&self, name: &str) -> Result<Option<BookRecord>> {
        let row = sqlx::query_as::<_, BookRow>("SELECT * FROM books WHERE name = ?")
            .bind(name)
            .fetch_optional(self.db.as_ref())
            .await?;
        Ok(row.map(BookRecord::from))
    }

    /// 整条记录一次写入
    pub async fn upsert(&self, record: &BookRecord) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let local_path = record
            .local_path
            .as_ref()
            .map(|p| p.to_string_lossy().into_owned());

        sqlx::query(
            r#"
            INSERT INTO books (name, remote_id, local_path, category, status, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(name) DO UPDATE SET
                remote_id = excluded.remote_id,
                local_path = excluded.local_path,
                category = excluded.category,
                status = excluded.status,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&record.name)
        .bind(&record.remote_id)
        .bind(&local_path)
        .bind(&record.category)
        .bind(record.status.as_str())
        .bind(record.updated_at)
        .execute(self.db.as_ref())
        .await?;

        debug!("映射已更新: {}", record.name);
        Ok(())
    }

    pub async fn delete(&self, name: &str) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        sqlx::query("DELETE FROM books WHERE name = ?")
            .bind(name)
            .execute(self.db.as_ref())
            .await?;
        Ok(())
    }

    pub async fn list_all(&self) -> Result<Vec<BookRecord>> {
        let rows = sqlx::query_as::<_, BookRow>("SELECT * FROM books ORDER BY name")
            .fetch_all(self.db.as_ref())
            .await?;
        Ok(rows.into_iter().map(BookRecord::from).collect())
    }

    /// 离线目录视图
    pub async fn cached_entries(&self) -> Result<Vec<CatalogEntry>> {
        Ok(self.list_all().await?.iter().map(BookRecord::to_entry).collect())
    }
}
