use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use grocery_core::{Category, ListCategory};

#[derive(Parser)]
#[command(name = "grocery")]
#[command(about = "Offline-first grocery lists from the command line")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Optional path to local database file
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,

    /// Optional path to config file
    #[arg(long = "config", global = true, value_name = "PATH")]
    pub config_path: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show all lists
    Lists {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Create, rename, delete or duplicate a list
    List {
        #[command(subcommand)]
        command: ListCommands,
    },
    /// Show the items of a list
    Items {
        /// List ID, unique ID prefix or name
        list: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
        /// Item order
        #[arg(long, value_enum, default_value_t = ItemSort::Store)]
        sort: ItemSort,
    },
    /// Add, edit, complete, move or delete an item
    Item {
        #[command(subcommand)]
        command: ItemCommands,
    },
    /// Remove completed items from a list
    ClearCompleted {
        /// List ID, unique ID prefix or name
        list: String,
    },
    /// Sync with the backend
    Sync {
        /// Sync even if the last sync was recent
        #[arg(long)]
        force: bool,
    },
    /// Show sync status
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete every list and item, locally and on the backend
    ClearAll {
        /// Confirm the wipe
        #[arg(long)]
        yes: bool,
    },
    /// Manage the config file
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum ItemSort {
    /// Aisle order, then priority
    Store,
    /// Alphabetical
    Name,
}

#[derive(Subcommand)]
pub enum ListCommands {
    /// Create a new list
    #[command(alias = "new")]
    Create {
        /// List name
        name: Vec<String>,
        /// Store: rema, coop or andre
        #[arg(long, value_parser = parse_list_category, default_value = "rema")]
        category: ListCategory,
    },
    /// Rename a list or change its store
    Rename {
        /// List ID, unique ID prefix or name
        list: String,
        /// New name
        name: Vec<String>,
        /// New store
        #[arg(long, value_parser = parse_list_category)]
        category: Option<ListCategory>,
    },
    /// Delete a list
    Delete {
        /// List ID, unique ID prefix or name
        list: String,
    },
    /// Copy a list with its items
    Duplicate {
        /// List ID, unique ID prefix or name
        list: String,
        /// Name of the copy
        name: Vec<String>,
        /// Store of the copy (defaults to the source list's)
        #[arg(long, value_parser = parse_list_category)]
        category: Option<ListCategory>,
    },
}

#[derive(clap::Args, Debug, Default, Clone, PartialEq, Eq)]
pub struct ItemFields {
    #[arg(short, long)]
    pub quantity: Option<String>,
    #[arg(short, long)]
    pub unit: Option<String>,
    #[arg(long)]
    pub notes: Option<String>,
    /// Aisle, e.g. mejeri or frugt
    #[arg(short, long, value_parser = parse_category)]
    pub category: Option<Category>,
    #[arg(long)]
    pub price: Option<String>,
    /// Lower sorts first
    #[arg(long)]
    pub priority: Option<i32>,
    /// Mark the item as on offer
    #[arg(long)]
    pub offer: Option<bool>,
}

#[derive(Subcommand)]
pub enum ItemCommands {
    /// Add an item to a list
    #[command(alias = "new")]
    Add {
        /// List ID, unique ID prefix or name
        list: String,
        /// Item name
        name: Vec<String>,
        #[command(flatten)]
        fields: ItemFields,
    },
    /// Change an item
    Edit {
        /// Item ID or unique ID prefix
        item: String,
        #[arg(short, long)]
        name: Option<String>,
        #[command(flatten)]
        fields: ItemFields,
    },
    /// Mark an item as bought
    Complete {
        /// Item ID or unique ID prefix
        item: String,
        /// Mark as not bought instead
        #[arg(long)]
        undo: bool,
    },
    /// Move an item to another list
    Move {
        /// Item ID or unique ID prefix
        item: String,
        /// Target list ID, unique ID prefix or name
        to: String,
    },
    /// Delete an item
    Delete {
        /// Item ID or unique ID prefix
        item: String,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Write the config file
    Init {
        /// Backend base URL
        #[arg(long, value_name = "URL")]
        api_base_url: Option<String>,
        /// User id lists are shared under
        #[arg(long, value_name = "ID")]
        user_id: Option<String>,
        /// Minimum seconds between automatic syncs
        #[arg(long, value_name = "SECS")]
        min_sync_interval_secs: Option<u64>,
    },
    /// Print the resolved configuration
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

pub fn parse_list_category(value: &str) -> Result<ListCategory, String> {
    ListCategory::ALL
        .into_iter()
        .find(|category| category.as_str().eq_ignore_ascii_case(value.trim()))
        .ok_or_else(|| {
            let options = ListCategory::ALL.map(|category| category.as_str().to_lowercase());
            format!("unknown store '{value}' (expected one of {})", options.join(", "))
        })
}

pub fn parse_category(value: &str) -> Result<Category, String> {
    Category::ALL
        .into_iter()
        .find(|category| {
            category.as_str().eq_ignore_ascii_case(value.trim())
                || category.display_name().eq_ignore_ascii_case(value.trim())
        })
        .ok_or_else(|| {
            let options = Category::ALL.map(|category| category.as_str().to_lowercase());
            format!("unknown aisle '{value}' (expected one of {})", options.join(", "))
        })
}
