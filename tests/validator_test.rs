// ABOUTME: Integration tests for column compatibility validation
// ABOUTME: Runs the validator and row-count comparison over two SQLite stores

mod common;

use common::sqlite_store;
use pg2mysql::commands::validate;
use pg2mysql::compare::compare_row_counts;
use pg2mysql::validator::{IncompatibleColumnMetadata, MigrationConfig, Validator};

#[tokio::test]
async fn test_reports_rows_too_long_for_destination() {
    let source = sqlite_store(&[
        "CREATE TABLE posts (id INTEGER PRIMARY KEY, title VARCHAR(100))",
        "INSERT INTO posts VALUES (1, 'short'), (2, 'much too long'), (3, 'tiny')",
    ])
    .await;
    let destination =
        sqlite_store(&["CREATE TABLE posts (id INTEGER PRIMARY KEY, title VARCHAR(5))"]).await;

    let results = Validator::new(&source, &destination)
        .validate(&MigrationConfig::default())
        .await
        .unwrap();

    assert_eq!(results.len(), 1);
    let result = &results[0];
    assert_eq!(result.table_name, "posts");
    assert_eq!(result.incompatible_row_count, 1);
    assert_eq!(result.incompatible_row_ids, Some(vec!["2".to_string()]));
    assert_eq!(
        result.incompatible_columns,
        Some(vec![IncompatibleColumnMetadata {
            column_name: "title".to_string(),
            max_chars: 13,
        }])
    );
}

#[tokio::test]
async fn test_wider_destination_is_ok() {
    let source = sqlite_store(&[
        "CREATE TABLE posts (id INTEGER PRIMARY KEY, title VARCHAR(5))",
        "INSERT INTO posts VALUES (1, 'abcde')",
    ])
    .await;
    let destination =
        sqlite_store(&["CREATE TABLE posts (id INTEGER PRIMARY KEY, title VARCHAR(255))"]).await;

    let results = Validator::new(&source, &destination)
        .validate(&MigrationConfig::default())
        .await
        .unwrap();

    assert_eq!(results.len(), 1);
    assert!(results[0].is_ok());
    assert_eq!(results[0].incompatible_row_ids, Some(vec![]));
}

#[tokio::test]
async fn test_unbounded_source_checks_every_row() {
    let source = sqlite_store(&[
        "CREATE TABLE notes (id INTEGER PRIMARY KEY, body TEXT)",
        "INSERT INTO notes VALUES (1, 'ok'), (2, 'too long'), (3, 'also too long')",
    ])
    .await;
    let destination =
        sqlite_store(&["CREATE TABLE notes (id INTEGER PRIMARY KEY, body VARCHAR(4))"]).await;

    let results = Validator::new(&source, &destination)
        .validate(&MigrationConfig::default())
        .await
        .unwrap();

    assert_eq!(results[0].incompatible_row_count, 2);
    assert_eq!(
        results[0].incompatible_row_ids,
        Some(vec!["2".to_string(), "3".to_string()])
    );
}

#[tokio::test]
async fn test_table_without_primary_key_reports_count() {
    let source = sqlite_store(&[
        "CREATE TABLE events (kind VARCHAR(50), detail VARCHAR(50))",
        "INSERT INTO events VALUES ('login', 'ok'), ('logout-forced', 'session expired')",
    ])
    .await;
    let destination =
        sqlite_store(&["CREATE TABLE events (kind VARCHAR(6), detail VARCHAR(10))"]).await;

    let results = Validator::new(&source, &destination)
        .validate(&MigrationConfig::default())
        .await
        .unwrap();

    let result = &results[0];
    // one row violates both columns, counted once per column
    assert_eq!(result.incompatible_row_count, 2);
    assert_eq!(result.incompatible_row_ids, None);
    let columns: Vec<&str> = result
        .incompatible_columns
        .as_ref()
        .unwrap()
        .iter()
        .map(|c| c.column_name.as_str())
        .collect();
    assert_eq!(columns, vec!["kind", "detail"]);
    assert_eq!(
        validate::format_result(result),
        "found 2 incompatible rows in events (which has no primary key)"
    );
}

#[tokio::test]
async fn test_composite_key_table_reports_count_without_ids() {
    let source = sqlite_store(&[
        "CREATE TABLE tags (post_id INTEGER, tag VARCHAR(40), PRIMARY KEY (post_id, tag))",
        "INSERT INTO tags VALUES (1, 'rust'), (1, 'databases and storage'), (2, 'sql')",
    ])
    .await;
    let destination = sqlite_store(&[
        "CREATE TABLE tags (post_id INTEGER, tag VARCHAR(8), PRIMARY KEY (post_id, tag))",
    ])
    .await;

    let results = Validator::new(&source, &destination)
        .validate(&MigrationConfig::default())
        .await
        .unwrap();

    // post_id 1 alone would not say which row is too long
    assert_eq!(results[0].incompatible_row_count, 1);
    assert_eq!(results[0].incompatible_row_ids, None);
}

#[tokio::test]
async fn test_ignored_tables_yield_no_result() {
    let source = sqlite_store(&[
        "CREATE TABLE audit (id INTEGER PRIMARY KEY, entry TEXT)",
        "CREATE TABLE users (id INTEGER PRIMARY KEY, name VARCHAR(20))",
        "INSERT INTO audit VALUES (1, 'far longer than the destination allows')",
    ])
    .await;
    // audit is absent from the destination, which would otherwise be fatal
    let destination =
        sqlite_store(&["CREATE TABLE users (id INTEGER PRIMARY KEY, name VARCHAR(20))"]).await;

    let results = Validator::new(&source, &destination)
        .validate(&MigrationConfig::new(["audit"]))
        .await
        .unwrap();

    let tables: Vec<&str> = results.iter().map(|r| r.table_name.as_str()).collect();
    assert_eq!(tables, vec!["users"]);
}

#[tokio::test]
async fn test_missing_destination_table_is_fatal() {
    let source = sqlite_store(&[
        "CREATE TABLE accounts (id INTEGER PRIMARY KEY)",
        "CREATE TABLE extra (id INTEGER PRIMARY KEY)",
    ])
    .await;
    let destination = sqlite_store(&["CREATE TABLE accounts (id INTEGER PRIMARY KEY)"]).await;

    let err = Validator::new(&source, &destination)
        .validate(&MigrationConfig::default())
        .await
        .unwrap_err();

    assert_eq!(
        err.to_string(),
        "failed to get table from destination schema: table 'extra' not found"
    );
}

#[tokio::test]
async fn test_destination_column_missing_from_source_is_fatal() {
    let source = sqlite_store(&["CREATE TABLE users (id INTEGER PRIMARY KEY)"]).await;
    let destination =
        sqlite_store(&["CREATE TABLE users (id INTEGER PRIMARY KEY, email VARCHAR(255))"]).await;

    let err = Validator::new(&source, &destination)
        .validate(&MigrationConfig::default())
        .await
        .unwrap_err();

    assert!(err
        .to_string()
        .contains("failed to find column 'users/email' in source schema"));
}

#[tokio::test]
async fn test_validate_command_lines_are_sorted() {
    let source = sqlite_store(&[
        "CREATE TABLE zebras (id INTEGER PRIMARY KEY, name VARCHAR(10))",
        "CREATE TABLE apples (id INTEGER PRIMARY KEY, name VARCHAR(10))",
        "INSERT INTO zebras VALUES (7, 'marty the zebra')",
    ])
    .await;
    let destination = sqlite_store(&[
        "CREATE TABLE apples (id INTEGER PRIMARY KEY, name VARCHAR(10))",
        "CREATE TABLE zebras (id INTEGER PRIMARY KEY, name VARCHAR(5))",
    ])
    .await;

    let lines = validate::run(&source, &destination, &MigrationConfig::default())
        .await
        .unwrap();

    assert_eq!(
        lines,
        vec![
            "apples OK".to_string(),
            "found 1 incompatible rows in zebras with column names \
             [{ColumnName: name, MaxChars: 15}] with IDs [7]"
                .to_string(),
        ]
    );
}

#[tokio::test]
async fn test_compare_row_counts() {
    let source = sqlite_store(&[
        "CREATE TABLE a (id INTEGER PRIMARY KEY)",
        "CREATE TABLE b (id INTEGER PRIMARY KEY)",
        "INSERT INTO a VALUES (1), (2), (3)",
        "INSERT INTO b VALUES (1)",
    ])
    .await;
    let destination = sqlite_store(&[
        "CREATE TABLE a (id INTEGER PRIMARY KEY)",
        "CREATE TABLE b (id INTEGER PRIMARY KEY)",
        "INSERT INTO a VALUES (1)",
        "INSERT INTO b VALUES (1)",
    ])
    .await;

    let comparisons = compare_row_counts(&source, &destination, &MigrationConfig::default())
        .await
        .unwrap();

    assert_eq!(comparisons.len(), 2);
    assert_eq!(comparisons[0].table, "a");
    assert_eq!(comparisons[0].missing(), 2);
    assert!(!comparisons[0].matches());
    assert!(comparisons[1].matches());
}
