//! End-to-end folder synchronization with an in-memory comment source.

use erdsync_core::{
    BatchSettings, ConnectionSettings, EncodingPolicy, FailurePolicy, MergePolicy,
    StaticCommentSource, SyncSettings, decode_escaped, encode_comment, synchronize, transcode,
};
use std::fs;
use std::path::Path;

const SHOP: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<!-- exported diagram -->
<ERD Version="3">
  <TABLE Tablename="USERS" TableType="0" X='10' Y="20">
    <COLUMNS>
      <COLUMN ColName="ID" DataType="INT" Comments=""/>
      <COLUMN ColName="LEGACY" DataType="CHAR"/>
    </COLUMNS>
  </TABLE>
  <TABLE Tablename="ORDERS" TableType="0">
    <COLUMN ColName="ID"/>
  </TABLE>
  <TABLE Tablename="AUDIT_LOG"/>
</ERD>
"#;

fn source() -> StaticCommentSource {
    StaticCommentSource::new()
        .with_table("USERS", "회원 정보")
        .with_table("ORDERS", "주문 내역")
        .with_column("USERS", "ID", "회원 번호")
        .with_column("ORDERS", "ID", "주문 번호")
}

fn settings(folder: &Path) -> SyncSettings {
    SyncSettings::new(
        ConnectionSettings::new("localhost".to_string(), "shop".to_string()),
        BatchSettings::new(folder),
    )
}

#[tokio::test]
async fn test_folder_sync_updates_only_matching_nodes() {
    let dir = tempfile::tempdir().unwrap();
    let diagram = dir.path().join("shop.dxml");
    fs::write(&diagram, SHOP).unwrap();
    fs::write(dir.path().join("README.txt"), "not a diagram").unwrap();

    let report = synchronize(&source(), &settings(dir.path())).await.unwrap();
    assert_eq!(report.files.len(), 1);
    assert_eq!(report.tables_updated(), 2);
    assert_eq!(report.columns_updated(), 2);

    let content = fs::read_to_string(&diagram).unwrap();
    assert!(content.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<!-- exported diagram -->"));
    assert!(content.contains(&format!(
        r#"<TABLE Tablename="USERS" TableType="0" X="10" Y="20" Comments="{}">"#,
        encode_comment(Some("회원 정보"))
    )));
    assert!(content.contains(r#"<COLUMN ColName="LEGACY" DataType="CHAR"/>"#));
    assert!(content.contains(r#"<TABLE Tablename="AUDIT_LOG"/>"#));
    assert_eq!(
        fs::read_to_string(dir.path().join("README.txt")).unwrap(),
        "not a diagram"
    );
}

#[tokio::test]
async fn test_second_run_is_byte_identical() {
    let dir = tempfile::tempdir().unwrap();
    let diagram = dir.path().join("shop.dxml");
    fs::write(&diagram, SHOP).unwrap();

    synchronize(&source(), &settings(dir.path())).await.unwrap();
    let first = fs::read(&diagram).unwrap();

    let report = synchronize(&source(), &settings(dir.path())).await.unwrap();
    assert_eq!(report.changed_count(), 0);
    assert_eq!(report.written_count(), 0);
    assert_eq!(fs::read(&diagram).unwrap(), first);
}

#[tokio::test]
async fn test_written_comments_decode_to_codepage_bytes() {
    let dir = tempfile::tempdir().unwrap();
    let diagram = dir.path().join("shop.dxml");
    fs::write(&diagram, SHOP).unwrap();

    synchronize(&source(), &settings(dir.path())).await.unwrap();
    let content = fs::read_to_string(&diagram).unwrap();

    let marker = r#"<TABLE Tablename="ORDERS" TableType="0" Comments=""#;
    let start = content.find(marker).unwrap() + marker.len();
    let end = start + content[start..].find('"').unwrap();
    let escaped = &content[start..end];

    assert_eq!(decode_escaped(escaped).unwrap(), transcode("주문 내역"));
    assert_eq!(
        transcode("주문 내역"),
        vec![193, 214, 185, 174, 32, 179, 187, 191, 170]
    );
}

#[tokio::test]
async fn test_policies_flow_through_settings() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("shop.dxml"), SHOP).unwrap();
    fs::write(dir.path().join("broken.dxml"), "<ERD><TABLE>").unwrap();

    let mut settings = settings(dir.path());
    settings.batch = BatchSettings::new(dir.path())
        .with_merge_policy(MergePolicy {
            encoding: EncodingPolicy::HangulOnly,
            table_type: Some("1".to_string()),
            ..Default::default()
        })
        .with_failure_policy(FailurePolicy::Continue);

    let report = synchronize(&source(), &settings).await.unwrap();
    assert_eq!(report.files.len(), 1);
    assert_eq!(report.failures.len(), 1);
    assert!(report.failures[0].path.ends_with("broken.dxml"));

    let content = fs::read_to_string(dir.path().join("shop.dxml")).unwrap();
    assert!(content.contains(
        r#"<TABLE Tablename="ORDERS" TableType="1" Comments="\193\214\185\174 \179\187\191\170">"#
    ));
}
