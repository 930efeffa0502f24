pub mod common;
mod crawl_items_tests;
