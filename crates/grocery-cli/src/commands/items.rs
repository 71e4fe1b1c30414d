use grocery_core::{GroceryItem, RemoteApi, Repository};

use crate::cli::{ItemCommands, ItemFields, ItemSort};
use crate::commands::common::{
    format_item_line, item_row, join_words, resolve_item, resolve_list, sort_items, ItemRow,
};
use crate::error::CliError;

pub async fn run_items<R: RemoteApi>(
    repo: &Repository<R>,
    list: &str,
    as_json: bool,
    sort: ItemSort,
) -> Result<(), CliError> {
    let list = resolve_list(repo, list).await?;
    let mut items = repo.items(&list.id).await?;
    sort_items(&mut items, sort);

    if as_json {
        let rows = items.iter().map(item_row).collect::<Vec<ItemRow>>();
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    if items.is_empty() {
        println!("{} is empty.", list.name);
        return Ok(());
    }
    for item in &items {
        println!("{}", format_item_line(item));
    }
    Ok(())
}

pub async fn run_item_command<R: RemoteApi>(
    repo: &Repository<R>,
    command: ItemCommands,
) -> Result<(), CliError> {
    match command {
        ItemCommands::Add { list, name, fields } => {
            let list = resolve_list(repo, &list).await?;
            let name = join_words(&name).ok_or(CliError::EmptyItemName)?;
            let mut item = GroceryItem::new(list.id, name);
            apply_fields(&mut item, fields);
            let item = repo.add_item(item).await?;
            println!("{}", item.id);
        }
        ItemCommands::Edit { item, name, fields } => {
            if name.is_none() && fields == ItemFields::default() {
                return Err(CliError::NothingToEdit);
            }
            let mut item = resolve_item(repo, &item).await?;
            if let Some(name) = name {
                item.name = join_words(&[name]).ok_or(CliError::EmptyItemName)?;
            }
            apply_fields(&mut item, fields);
            let item = repo.update_item(item).await?;
            println!("{}", item.id);
        }
        ItemCommands::Complete { item, undo } => {
            let item = resolve_item(repo, &item).await?;
            let item = repo.set_item_completed(&item.id, !undo).await?;
            println!("{}", item.id);
        }
        ItemCommands::Move { item, to } => {
            let item = resolve_item(repo, &item).await?;
            let target = resolve_list(repo, &to).await?;
            let item = repo.move_item(&item.id, &target.id).await?;
            println!("{}", item.id);
        }
        ItemCommands::Delete { item } => {
            let item = resolve_item(repo, &item).await?;
            repo.delete_item(&item.id).await?;
            println!("{}", item.id);
        }
    }
    Ok(())
}

pub async fn run_clear_completed<R: RemoteApi>(
    repo: &Repository<R>,
    list: &str,
) -> Result<(), CliError> {
    let list = resolve_list(repo, list).await?;
    let removed = repo.clear_completed(&list.id).await?;
    println!("Removed {removed} completed item(s) from {}", list.name);
    Ok(())
}

/// Overwrite the fields that were given on the command line
pub fn apply_fields(item: &mut GroceryItem, fields: ItemFields) {
    let ItemFields {
        quantity,
        unit,
        notes,
        category,
        price,
        priority,
        offer,
    } = fields;

    if let Some(quantity) = quantity {
        item.quantity = quantity.trim().to_string();
    }
    if let Some(unit) = unit {
        item.unit = unit.trim().to_string();
    }
    if let Some(notes) = notes {
        item.notes = notes.trim().to_string();
    }
    if let Some(category) = category {
        item.category = category;
    }
    if let Some(price) = price {
        item.price = price.trim().to_string();
    }
    if let Some(priority) = priority {
        item.priority = priority;
    }
    if let Some(offer) = offer {
        item.on_offer = offer;
    }
}
