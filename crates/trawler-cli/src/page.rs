//! The page handler used by `trawler crawl`.

use std::sync::Arc;

use futures::future::BoxFuture;
use scraper::{Html, Selector};
use serde_json::json;
use trawler_client::{extract_links, same_host};
use trawler_core::{CrawlError, HandlerResult, PipelineStage, ResponseContext, Task};
use trawler_db::CrawlItem;

/// Link-following rules shared by every page task of a run.
#[derive(Debug, Clone)]
pub struct FollowRules {
    /// Seeds are depth 0; links are followed while `depth < max_depth`.
    pub max_depth: usize,
    /// Only follow links on the host of the seed a page descends from.
    pub same_host: bool,
}

/// Build the task for one page. `origin` is the seed URL it descends from.
pub fn page_task(
    url: String,
    origin: Arc<str>,
    depth: usize,
    rules: Arc<FollowRules>,
) -> Task<CrawlItem> {
    Task::new(url, move |ctx| Ok(handle_page(ctx, &origin, depth, &rules)))
}

fn handle_page(
    ctx: &ResponseContext,
    origin: &Arc<str>,
    depth: usize,
    rules: &Arc<FollowRules>,
) -> HandlerResult<CrawlItem> {
    let is_html = ctx
        .header("content-type")
        .is_none_or(|content_type| content_type.contains("html"));

    let (title, links) = if is_html {
        (
            page_title(&ctx.body_text),
            extract_links(&ctx.body_text, &ctx.key),
        )
    } else {
        (None, Vec::new())
    };

    let mut result = HandlerResult::empty();
    if ctx.is_success() && depth < rules.max_depth {
        for link in &links {
            if rules.same_host && !same_host(link, origin) {
                continue;
            }
            result = result.follow(page_task(
                link.clone(),
                Arc::clone(origin),
                depth + 1,
                Arc::clone(rules),
            ));
        }
    }

    let item = CrawlItem::new(
        ctx.key.clone(),
        ctx.status,
        json!({ "title": title, "links": links }),
    )
    .with_headers(ctx.headers.clone());

    result.emit(item)
}

fn page_title(html: &str) -> Option<String> {
    let selector = Selector::parse("title").ok()?;
    let document = Html::parse_document(html);
    let title = document
        .select(&selector)
        .next()?
        .text()
        .collect::<String>()
        .trim()
        .to_string();
    (!title.is_empty()).then_some(title)
}

/// Writes each item to stdout as one JSON line: `{url, status, title, links}`.
pub struct JsonLinesStage;

impl JsonLinesStage {
    fn line(item: &CrawlItem) -> serde_json::Value {
        let mut line = serde_json::Map::new();
        line.insert("url".into(), json!(item.url));
        line.insert("status".into(), json!(item.status));
        if let serde_json::Value::Object(data) = &item.data {
            line.extend(data.clone());
        }
        serde_json::Value::Object(line)
    }
}

impl PipelineStage<CrawlItem> for JsonLinesStage {
    fn name(&self) -> &str {
        "stdout"
    }

    fn process<'a>(&'a self, item: &'a CrawlItem) -> BoxFuture<'a, Result<(), CrawlError>> {
        Box::pin(async move {
            use std::io::Write;

            let line = serde_json::to_string(&Self::line(item))?;
            writeln!(std::io::stdout().lock(), "{line}")
                .map_err(|e| CrawlError::pipeline("stdout", e.to_string()))
        })
    }
}
