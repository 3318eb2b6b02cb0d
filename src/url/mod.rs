//! URL handling module for Serial-Harvest
//!
//! This module provides authority keys for strategy dispatch, link resolution
//! against a page's base URL, and table-of-contents page URL formatting.

mod authority;
mod resolve;

pub use authority::{authority_key, parse_http_url};
pub use resolve::{format_page_url, query_param, resolve_link};
