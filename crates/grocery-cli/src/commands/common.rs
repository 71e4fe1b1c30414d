use std::cmp::Ordering;

use chrono::Utc;
use grocery_core::{
    EntityStore, GroceryItem, GroceryList, HttpRemoteClient, ListCategory, RemoteApi, Repository,
};
use serde::Serialize;

use crate::cli::ItemSort;
use crate::config::{env_lookup, resolve_engine_config, Paths};
use crate::error::CliError;

const SHORT_ID_LEN: usize = 13;

pub type Repo = Repository<HttpRemoteClient>;

#[derive(Debug, Serialize)]
pub struct ListRow {
    pub id: String,
    pub name: String,
    pub category: String,
    pub open_items: usize,
    pub total_items: usize,
    pub updated_at: i64,
    pub relative_time: String,
}

#[derive(Debug, Serialize)]
pub struct ItemRow {
    pub id: String,
    pub name: String,
    pub quantity: String,
    pub unit: String,
    pub notes: String,
    pub category: String,
    pub is_completed: bool,
    pub on_offer: bool,
    pub price: String,
    pub priority: i32,
    pub updated_at: i64,
}

pub fn open_repository(paths: &Paths) -> Result<Repo, CliError> {
    let config = resolve_engine_config(&paths.config, env_lookup)?;
    let store = EntityStore::open(&paths.db)?;
    Ok(Repository::connect(store, config)?)
}

/// Join trailing words into one name; `None` when nothing is left after trimming
pub fn join_words(parts: &[String]) -> Option<String> {
    let joined = parts.join(" ");
    let trimmed = joined.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

pub fn normalize_identifier(id: &str) -> Result<String, CliError> {
    let trimmed = id.trim();
    if trimmed.is_empty() {
        Err(CliError::EmptyIdentifier)
    } else {
        Ok(trimmed.to_string())
    }
}

pub async fn resolve_list<R: RemoteApi>(
    repo: &Repository<R>,
    query: &str,
) -> Result<GroceryList, CliError> {
    let query = normalize_identifier(query)?;
    pick_list(repo.lists().await?, &query)
}

/// Find an item on any list by id or id prefix
pub async fn resolve_item<R: RemoteApi>(
    repo: &Repository<R>,
    query: &str,
) -> Result<GroceryItem, CliError> {
    let query = normalize_identifier(query)?;
    let mut items = Vec::new();
    for list in repo.lists().await? {
        items.extend(repo.items(&list.id).await?);
    }
    pick_item(items, &query)
}

/// Match a list by exact id, then exact name (case-insensitive), then id prefix
pub fn pick_list(lists: Vec<GroceryList>, query: &str) -> Result<GroceryList, CliError> {
    if let Some(list) = lists.iter().find(|list| list.id.as_str() == query) {
        return Ok(list.clone());
    }

    let by_name = lists
        .iter()
        .filter(|list| list.name.eq_ignore_ascii_case(query))
        .collect::<Vec<_>>();
    match by_name.as_slice() {
        [list] => return Ok((*list).clone()),
        [] => {}
        _ => {
            return Err(CliError::AmbiguousId(format!(
                "List name '{query}' is ambiguous; use an ID: {}",
                by_name
                    .iter()
                    .map(|list| short_id(list.id.as_str()))
                    .collect::<Vec<_>>()
                    .join(", ")
            )))
        }
    }

    let ids = lists
        .iter()
        .map(|list| list.id.as_str())
        .collect::<Vec<_>>();
    let index = pick_by_prefix(&ids, query)?
        .ok_or_else(|| CliError::ListNotFound(query.to_string()))?;
    Ok(lists[index].clone())
}

pub fn pick_item(items: Vec<GroceryItem>, query: &str) -> Result<GroceryItem, CliError> {
    if let Some(item) = items.iter().find(|item| item.id.as_str() == query) {
        return Ok(item.clone());
    }

    let ids = items
        .iter()
        .map(|item| item.id.as_str())
        .collect::<Vec<_>>();
    let index = pick_by_prefix(&ids, query)?
        .ok_or_else(|| CliError::ItemNotFound(query.to_string()))?;
    Ok(items[index].clone())
}

fn pick_by_prefix(ids: &[&str], prefix: &str) -> Result<Option<usize>, CliError> {
    let matches = ids
        .iter()
        .enumerate()
        .filter(|(_, id)| id.starts_with(prefix))
        .map(|(index, _)| index)
        .collect::<Vec<_>>();

    match matches.as_slice() {
        [] => Ok(None),
        [index] => Ok(Some(*index)),
        _ => {
            let options = matches
                .iter()
                .take(3)
                .map(|index| short_id(ids[*index]))
                .collect::<Vec<_>>()
                .join(", ");
            Err(CliError::AmbiguousId(format!(
                "ID prefix '{prefix}' is ambiguous; matches: {options}"
            )))
        }
    }
}

pub fn short_id(id: &str) -> String {
    id.chars().take(SHORT_ID_LEN).collect()
}

pub fn sort_items(items: &mut [GroceryItem], sort: ItemSort) {
    match sort {
        ItemSort::Store => items.sort_by(|a, b| {
            a.is_completed
                .cmp(&b.is_completed)
                .then(a.category.sort_order().cmp(&b.category.sort_order()))
                .then(a.priority.cmp(&b.priority))
                .then_with(|| compare_names(&a.name, &b.name))
        }),
        ItemSort::Name => items.sort_by(|a, b| compare_names(&a.name, &b.name)),
    }
}

fn compare_names(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| a.cmp(b))
}

pub fn list_row(list: &GroceryList, items: &[GroceryItem], now_ms: i64) -> ListRow {
    ListRow {
        id: list.id.to_string(),
        name: list.name.clone(),
        category: list.category.as_str().to_string(),
        open_items: items.iter().filter(|item| !item.is_completed).count(),
        total_items: items.len(),
        updated_at: list.updated_at,
        relative_time: format_relative_time(list.updated_at, now_ms),
    }
}

pub fn item_row(item: &GroceryItem) -> ItemRow {
    ItemRow {
        id: item.id.to_string(),
        name: item.name.clone(),
        quantity: item.quantity.clone(),
        unit: item.unit.clone(),
        notes: item.notes.clone(),
        category: item.category.as_str().to_string(),
        is_completed: item.is_completed,
        on_offer: item.on_offer,
        price: item.price.clone(),
        priority: item.priority,
        updated_at: item.updated_at,
    }
}

pub fn format_list_line(row: &ListRow) -> String {
    let letter = ListCategory::from_tag(&row.category).letter();
    format!(
        "{:<13}  [{letter}] {:<30}  {:>3} open / {:<3}  {}",
        short_id(&row.id),
        row.name,
        row.open_items,
        row.total_items,
        row.relative_time
    )
}

pub fn format_item_line(item: &GroceryItem) -> String {
    let check = if item.is_completed { 'x' } else { ' ' };
    let amount = [item.quantity.trim(), item.unit.trim()]
        .into_iter()
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

    let mut line = format!(
        "{:<13}  [{check}] {:<30}  {:<10}  {}",
        short_id(item.id.as_str()),
        item.name,
        amount,
        item.category.display_name()
    );
    if item.on_offer {
        line.push_str("  (offer)");
    }
    if !item.price.trim().is_empty() {
        line.push_str(&format!("  {}", item.price.trim()));
    }
    line.trim_end().to_string()
}

pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

pub fn format_sync_timestamp(timestamp_ms: i64) -> String {
    chrono::DateTime::from_timestamp_millis(timestamp_ms).map_or_else(
        || timestamp_ms.to_string(),
        |date_time| date_time.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    )
}

pub fn format_relative_time(timestamp_ms: i64, now_ms: i64) -> String {
    let diff = now_ms.saturating_sub(timestamp_ms);
    let minute = 60_000;
    let hour = 60 * minute;
    let day = 24 * hour;
    let week = 7 * day;

    if diff < minute {
        "just now".to_string()
    } else if diff < hour {
        format!("{}m ago", diff / minute)
    } else if diff < day {
        format!("{}h ago", diff / hour)
    } else if diff < week {
        format!("{}d ago", diff / day)
    } else {
        format!("{}w ago", diff / week)
    }
}
