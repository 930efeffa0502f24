use std::collections::HashMap;

use trawler_core::PipelineStage;
use trawler_db::{CrawlItem, CrawlItemRepository};

use crate::integration::common::setup_test_db;

#[tokio::test]
async fn save_and_read_back_latest() {
    let (pool, _container) = setup_test_db().await;
    let repo = CrawlItemRepository::new(pool);

    let headers = HashMap::from([("content-type".to_string(), "text/html".to_string())]);
    let item = CrawlItem::new(
        "https://example.com",
        200,
        serde_json::json!({"title": "Example Domain"}),
    )
    .with_headers(headers.clone());

    let id = repo.save(&item).await.unwrap();
    assert!(!id.is_nil());

    let latest = repo.latest(5).await.unwrap();
    assert_eq!(latest.len(), 1);
    assert_eq!(latest[0].id, id);
    assert_eq!(latest[0].url, "https://example.com");
    assert_eq!(latest[0].status, 200);
    assert_eq!(latest[0].headers, headers);
    assert_eq!(latest[0].data, serde_json::json!({"title": "Example Domain"}));
}

#[tokio::test]
async fn count_and_latest_respect_limit_and_order() {
    let (pool, _container) = setup_test_db().await;
    let repo = CrawlItemRepository::new(pool);

    assert_eq!(repo.count().await.unwrap(), 0);

    for i in 0..4 {
        let item = CrawlItem::new(format!("https://example.com/{i}"), 200, serde_json::json!({"n": i}));
        repo.save(&item).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }

    assert_eq!(repo.count().await.unwrap(), 4);

    let latest = repo.latest(2).await.unwrap();
    let urls: Vec<_> = latest.iter().map(|item| item.url.as_str()).collect();
    assert_eq!(urls, vec!["https://example.com/3", "https://example.com/2"]);
}

#[tokio::test]
async fn repository_works_as_pipeline_stage() {
    let (pool, _container) = setup_test_db().await;
    let repo = CrawlItemRepository::new(pool);

    let item = CrawlItem::new("https://example.com/missing", 404, serde_json::Value::Null);
    repo.process(&item).await.unwrap();

    assert_eq!(PipelineStage::<CrawlItem>::name(&repo), "postgres");
    let stored = repo.latest(1).await.unwrap();
    assert_eq!(stored[0].status, 404);
    assert_eq!(stored[0].data, serde_json::Value::Null);
}

#[tokio::test]
async fn status_column_rejects_values_outside_u16() {
    let (pool, _container) = setup_test_db().await;

    let result = sqlx::query("INSERT INTO crawl_items (url, status, data) VALUES ($1, $2, $3)")
        .bind("https://example.com/odd")
        .bind(70_000_i32)
        .bind(serde_json::Value::Null)
        .execute(&pool)
        .await;

    assert!(result.is_err());
    assert_eq!(CrawlItemRepository::new(pool).count().await.unwrap(), 0);
}
