//! Item catalogue loading. Every violation is fatal: the run never starts with a
//! partially valid catalogue.

use std::collections::HashSet;
use std::path::Path;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;
use tracing::info;

use crate::error::{AppError, Result};
use crate::extract::CompiledSelector;
use crate::types::{Catalog, ItemConfig};

#[derive(Debug, Deserialize)]
struct RawCatalog {
    #[serde(default)]
    global_notification_channels: Option<Vec<Value>>,
    items: Option<Vec<RawItem>>,
}

#[derive(Debug, Deserialize)]
struct RawItem {
    name: Option<Value>,
    url: Option<Value>,
    #[serde(alias = "selector")]
    selectors: Option<Value>,
    target_price: Option<Value>,
}

pub fn load(path: impl AsRef<Path>) -> Result<Catalog> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|e| {
        AppError::Config(format!("cannot read item catalogue '{}': {e}", path.display()))
    })?;
    let catalog = parse(&text)?;
    info!(
        items = catalog.items.len(),
        channels = ?catalog.channels,
        "[CONFIG] Loaded item catalogue from {}",
        path.display()
    );
    Ok(catalog)
}

pub fn parse(text: &str) -> Result<Catalog> {
    let raw: RawCatalog = serde_json::from_str(text)?;

    let raw_items = raw
        .items
        .ok_or_else(|| AppError::Config("'items' is missing".to_string()))?;
    if raw_items.is_empty() {
        return Err(AppError::Config("'items' is empty".to_string()));
    }

    let mut names = HashSet::new();
    let mut items = Vec::with_capacity(raw_items.len());
    for (index, raw_item) in raw_items.into_iter().enumerate() {
        let item = validate_item(index, raw_item)?;
        if !names.insert(item.name.clone()) {
            return Err(AppError::Config(format!(
                "item {index}: duplicate name '{}'",
                item.name
            )));
        }
        items.push(item);
    }

    let channels = channels(raw.global_notification_channels.unwrap_or_default())?;
    Ok(Catalog { channels, items })
}

fn validate_item(index: usize, raw: RawItem) -> Result<ItemConfig> {
    let err = |msg: String| AppError::Config(format!("item {index}: {msg}"));

    let name = required_string(raw.name, "name").map_err(err)?;
    let err = |msg: String| AppError::Config(format!("item {index} ('{name}'): {msg}"));

    let url = required_string(raw.url, "url").map_err(err)?;
    match reqwest::Url::parse(&url) {
        Ok(parsed) if matches!(parsed.scheme(), "http" | "https") && parsed.has_host() => {}
        _ => return Err(err(format!("'url' must be an absolute http(s) URL, got '{url}'"))),
    }

    let selectors = selector_rules(raw.selectors).map_err(err)?;

    let target_price = match raw.target_price {
        Some(Value::Number(n)) => {
            let text = n.to_string();
            Decimal::from_str(&text)
                .or_else(|_| Decimal::from_scientific(&text))
                .map_err(|_| err(format!("'target_price' {text} is out of range")))?
        }
        Some(other) => return Err(err(format!("'target_price' must be a number, got {other}"))),
        None => return Err(err("'target_price' is missing".to_string())),
    };
    if target_price <= Decimal::ZERO {
        return Err(err(format!("'target_price' must be greater than 0, got {target_price}")));
    }

    Ok(ItemConfig { name, url, selectors, target_price })
}

fn required_string(value: Option<Value>, field: &str) -> std::result::Result<String, String> {
    match value {
        Some(Value::String(s)) if !s.trim().is_empty() => Ok(s.trim().to_string()),
        Some(Value::String(_)) => Err(format!("'{field}' is empty")),
        Some(other) => Err(format!("'{field}' must be a string, got {other}")),
        None => Err(format!("'{field}' is missing")),
    }
}

fn selector_rules(value: Option<Value>) -> std::result::Result<Vec<CompiledSelector>, String> {
    let raw: Vec<String> = match value {
        Some(Value::String(s)) => vec![s],
        Some(Value::Array(entries)) => entries
            .into_iter()
            .map(|entry| match entry {
                Value::String(s) => Ok(s),
                other => Err(format!("selector entries must be strings, got {other}")),
            })
            .collect::<std::result::Result<_, _>>()?,
        Some(other) => return Err(format!("'selectors' must be a string or a list of strings, got {other}")),
        None => return Err("'selectors' is missing".to_string()),
    };

    if raw.iter().any(|s| s.trim().is_empty()) {
        return Err("selector entries must not be empty".to_string());
    }
    if raw.is_empty() {
        return Err("'selectors' is empty".to_string());
    }
    raw.iter()
        .map(|s| CompiledSelector::parse(s).map_err(|e| e.to_string()))
        .collect()
}

fn channels(raw: Vec<Value>) -> Result<Vec<String>> {
    let mut seen = HashSet::new();
    let mut channels = Vec::new();
    for entry in raw {
        let Value::String(name) = entry else {
            return Err(AppError::Config(format!(
                "'global_notification_channels' entries must be strings, got {entry}"
            )));
        };
        let name = name.trim().to_string();
        if !name.is_empty() && seen.insert(name.clone()) {
            channels.push(name);
        }
    }
    Ok(channels)
}
