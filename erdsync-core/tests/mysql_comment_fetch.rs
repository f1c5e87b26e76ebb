//! MySQL comment fetching against a real server.
//!
//! Requires Docker; compiled only with `--features container-tests`.

#![cfg(feature = "container-tests")]

use erdsync_core::{
    BatchSettings, ConnectionSettings, MetadataFetcher, MySqlCommentSource, Result, SyncSettings,
    encode_comment, error::ErdSyncError, security::Credentials, synchronize,
};
use sqlx::MySqlPool;
use std::time::Duration;
use testcontainers_modules::{mysql::Mysql, testcontainers::runners::AsyncRunner};

async fn wait_for_mysql_ready(database_url: &str, max_attempts: u32) -> Result<()> {
    let mut attempts = 0;
    while attempts < max_attempts {
        if let Ok(pool) = MySqlPool::connect(database_url).await {
            if sqlx::query("SELECT 1").fetch_one(&pool).await.is_ok() {
                pool.close().await;
                return Ok(());
            }
            pool.close().await;
        }
        attempts += 1;
        if attempts < max_attempts {
            tokio::time::sleep(Duration::from_millis(500)).await;
        }
    }
    Err(ErdSyncError::connection_failed(std::io::Error::new(
        std::io::ErrorKind::TimedOut,
        format!(
            "MySQL failed to become ready after {} attempts",
            max_attempts
        ),
    )))
}

async fn create_shop_schema(database_url: &str) {
    let pool = MySqlPool::connect(database_url).await.unwrap();
    sqlx::query(
        "CREATE TABLE USERS (
            ID INT PRIMARY KEY COMMENT '회원 번호',
            NICK VARCHAR(50),
            EMAIL VARCHAR(255) COMMENT 'e-mail 주소'
        ) COMMENT = '회원 정보'",
    )
    .execute(&pool)
    .await
    .unwrap();
    sqlx::query("CREATE TABLE AUDIT_LOG (ID INT PRIMARY KEY)")
        .execute(&pool)
        .await
        .unwrap();
    pool.close().await;
}

fn settings_for(port: u16) -> ConnectionSettings {
    ConnectionSettings::new("127.0.0.1".to_string(), "test".to_string())
        .with_port(port)
        .with_credentials(Credentials::new("root".to_string(), None))
}

#[tokio::test]
async fn test_container_fetches_comments() -> Result<()> {
    let mysql = Mysql::default().start().await.unwrap();
    let port = mysql.get_host_port_ipv4(3306).await.unwrap();
    let database_url = format!("mysql://root@127.0.0.1:{}/test", port);

    wait_for_mysql_ready(&database_url, 30).await?;
    create_shop_schema(&database_url).await;

    let settings = settings_for(port);
    let source = MySqlCommentSource::connect(&settings).await?;
    let maps = MetadataFetcher::new(&source, &settings).fetch().await?;
    source.close().await;

    assert_eq!(maps.table_comment("USERS"), Some("회원 정보"));
    assert_eq!(maps.table_comment("AUDIT_LOG"), Some(""));
    assert_eq!(maps.column_comment("USERS", "ID"), Some("회원 번호"));
    assert_eq!(maps.column_comment("USERS", "NICK"), Some(""));
    assert_eq!(maps.column_comment("USERS", "EMAIL"), Some("e-mail 주소"));
    assert_eq!(maps.table_comment("users"), None);

    Ok(())
}

#[tokio::test]
async fn test_container_synchronizes_folder() -> Result<()> {
    let mysql = Mysql::default().start().await.unwrap();
    let port = mysql.get_host_port_ipv4(3306).await.unwrap();
    let database_url = format!("mysql://root@127.0.0.1:{}/test", port);

    wait_for_mysql_ready(&database_url, 30).await?;
    create_shop_schema(&database_url).await;

    let dir = tempfile::tempdir().unwrap();
    let diagram = dir.path().join("shop.dxml");
    std::fs::write(
        &diagram,
        r#"<?xml version="1.0" encoding="UTF-8"?>
<ERD>
  <TABLE Tablename="USERS"><COLUMN ColName="ID"/></TABLE>
</ERD>
"#,
    )
    .unwrap();

    let settings = SyncSettings::new(settings_for(port), BatchSettings::new(dir.path()));
    let source = MySqlCommentSource::connect(&settings.connection).await?;
    let report = synchronize(&source, &settings).await?;
    source.close().await;

    assert_eq!(report.written_count(), 1);
    let content = std::fs::read_to_string(&diagram).unwrap();
    assert!(content.contains(&format!(
        r#"<TABLE Tablename="USERS" Comments="{}">"#,
        encode_comment(Some("회원 정보"))
    )));
    assert!(content.contains(&format!(
        r#"<COLUMN ColName="ID" Comments="{}"/>"#,
        encode_comment(Some("회원 번호"))
    )));

    Ok(())
}

#[tokio::test]
async fn test_container_unknown_schema_is_empty() -> Result<()> {
    let mysql = Mysql::default().start().await.unwrap();
    let port = mysql.get_host_port_ipv4(3306).await.unwrap();
    let database_url = format!("mysql://root@127.0.0.1:{}/test", port);

    wait_for_mysql_ready(&database_url, 30).await?;
    create_shop_schema(&database_url).await;

    let settings = settings_for(port);
    let source = MySqlCommentSource::connect(&settings).await?;
    let maps = MetadataFetcher::for_schema(&source, "no_such_schema")
        .fetch()
        .await?;
    source.close().await;

    assert!(maps.is_empty());
    Ok(())
}
