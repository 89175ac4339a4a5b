//! Stock and content files.
//!
//! Both are line-oriented: `"<id> <value>"`, whitespace separated, one record
//! per line, loaded once at startup and never modified.  Blank lines are
//! skipped; anything else that does not parse is a [`ConfigError`].

use std::path::Path;
use std::str::FromStr;

use rust_decimal::Decimal;

use crate::config::ConfigError;

/// One sellable item in the store's stock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogItem {
    pub id: i64,
    pub price: Decimal,
}

/// One downloadable item held by the content repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentItem {
    pub id: i64,
    pub content: String,
}

/// Render a price with at least one fractional digit: `5` → `5.0`, `9.99` → `9.99`.
pub fn format_price(price: &Decimal) -> String {
    if price.scale() == 0 {
        let mut p = *price;
        p.rescale(1);
        p.to_string()
    } else {
        price.to_string()
    }
}

pub fn load_catalog(path: &Path) -> Result<Vec<CatalogItem>, ConfigError> {
    parse_catalog(&read(path)?)
}

pub fn load_content(path: &Path) -> Result<Vec<ContentItem>, ConfigError> {
    parse_content(&read(path)?)
}

pub fn parse_catalog(text: &str) -> Result<Vec<CatalogItem>, ConfigError> {
    records(text)?
        .into_iter()
        .map(|(line, id, value)| {
            let price = Decimal::from_str(value).map_err(|e| ConfigError::BadRecord {
                line,
                reason: format!("price {value:?}: {e}"),
            })?;
            Ok(CatalogItem { id, price })
        })
        .collect()
}

pub fn parse_content(text: &str) -> Result<Vec<ContentItem>, ConfigError> {
    Ok(records(text)?
        .into_iter()
        .map(|(_, id, value)| ContentItem {
            id,
            content: value.to_string(),
        })
        .collect())
}

fn read(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|source| ConfigError::Unreadable {
        path: path.to_path_buf(),
        source,
    })
}

/// Split every non-blank line into `(line_number, id, value)`.
fn records(text: &str) -> Result<Vec<(usize, i64, &str)>, ConfigError> {
    let mut out = Vec::new();
    for (i, raw) in text.lines().enumerate() {
        let line = i + 1;
        let raw = raw.trim();
        if raw.is_empty() {
            continue;
        }
        let Some((id, value)) = raw.split_once(char::is_whitespace) else {
            return Err(ConfigError::BadRecord {
                line,
                reason: format!("expected \"<id> <value>\", got {raw:?}"),
            });
        };
        let id = id.parse::<i64>().map_err(|_| ConfigError::BadRecord {
            line,
            reason: format!("id {id:?} is not an integer"),
        })?;
        out.push((line, id, value.trim()));
    }
    Ok(out)
}
