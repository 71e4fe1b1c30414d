use grocery_core::{GroceryList, RemoteApi, Repository};

use crate::cli::ListCommands;
use crate::commands::common::{
    format_list_line, join_words, list_row, now_ms, resolve_list, ListRow,
};
use crate::error::CliError;

pub async fn run_lists<R: RemoteApi>(repo: &Repository<R>, as_json: bool) -> Result<(), CliError> {
    let rows = list_rows(repo).await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    if rows.is_empty() {
        println!("No lists yet. Create one with `grocery list create <name>`.");
        return Ok(());
    }
    for row in &rows {
        println!("{}", format_list_line(row));
    }
    Ok(())
}

pub async fn run_list_command<R: RemoteApi>(
    repo: &Repository<R>,
    command: ListCommands,
) -> Result<(), CliError> {
    match command {
        ListCommands::Create { name, category } => {
            let name = join_words(&name).ok_or(CliError::EmptyListName)?;
            let list = repo.create_list(&name, category).await?;
            println!("{}", list.id);
        }
        ListCommands::Rename {
            list,
            name,
            category,
        } => {
            let existing = resolve_list(repo, &list).await?;
            let name = join_words(&name).ok_or(CliError::EmptyListName)?;
            let saved = repo
                .save_list(GroceryList {
                    name,
                    category: category.unwrap_or(existing.category),
                    ..existing
                })
                .await?;
            println!("{}", saved.id);
        }
        ListCommands::Delete { list } => {
            let list = resolve_list(repo, &list).await?;
            repo.delete_list(&list.id).await?;
            println!("{}", list.id);
        }
        ListCommands::Duplicate {
            list,
            name,
            category,
        } => {
            let source = resolve_list(repo, &list).await?;
            let name = join_words(&name).ok_or(CliError::EmptyListName)?;
            let copy = repo
                .duplicate_list(&source.id, &name, category.unwrap_or(source.category))
                .await?;
            println!("{}", copy.id);
        }
    }
    Ok(())
}

/// Every live list with its item counts
pub async fn list_rows<R: RemoteApi>(repo: &Repository<R>) -> Result<Vec<ListRow>, CliError> {
    let now = now_ms();
    let mut rows = Vec::new();
    for list in repo.lists().await? {
        let items = repo.items(&list.id).await?;
        rows.push(list_row(&list, &items, now));
    }
    Ok(rows)
}
