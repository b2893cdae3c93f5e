use std::{error::Error, path::PathBuf, process::ExitCode};

use clap::{Parser, Subcommand};
use time::{Date, OffsetDateTime, macros::format_description};
use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt};

use tallybook::{
    AccountId, CategoryId, TransactionId,
    account::{
        create_account, delete_account, get_accounts, get_total_account_balance, update_account,
    },
    category::{
        CategoryKind, CategoryName, create_category, get_categories, get_category,
        move_category_to_trash, propagate_category_details, update_category,
    },
    db,
    ledger::{
        BucketScope, delete_permanently, get_month_summaries, get_summary, move_to_trash,
        restore_from_trash, upsert_transaction,
    },
    transaction::{
        CategorySnapshot, Period, Transaction, TransactionFilter, TransactionSort,
        get_filtered_transactions, get_transaction, group_transactions_by_month,
    },
};

/// A personal finance tracker that keeps incremental running totals.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// File path to the application SQLite database.
    #[arg(long, default_value = "tallybook.db")]
    db_path: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Record a new transaction.
    Add {
        /// The amount in minor currency units; negative for an expense.
        #[arg(long, allow_hyphen_values = true)]
        amount: i64,

        /// The ID of the category to file the transaction under.
        #[arg(long)]
        category: CategoryId,

        /// What the transaction was for.
        #[arg(long, default_value = "")]
        memo: String,

        /// The date of the transaction (YYYY-MM-DD). Defaults to today.
        #[arg(long, value_parser = parse_date)]
        date: Option<Date>,
    },

    /// Edit an existing transaction.
    Edit {
        /// The ID of the transaction to edit.
        id: TransactionId,

        /// The new amount in minor currency units.
        #[arg(long, allow_hyphen_values = true)]
        amount: Option<i64>,

        /// The ID of the category to move the transaction to.
        #[arg(long)]
        category: Option<CategoryId>,

        /// The new memo text.
        #[arg(long)]
        memo: Option<String>,

        /// The new date (YYYY-MM-DD).
        #[arg(long, value_parser = parse_date)]
        date: Option<Date>,
    },

    /// Move a transaction to the trash.
    Trash {
        /// The ID of the transaction to trash.
        id: TransactionId,
    },

    /// Restore a transaction from the trash.
    Restore {
        /// The ID of the transaction to restore.
        id: TransactionId,
    },

    /// Permanently delete a trashed transaction.
    Purge {
        /// The ID of the transaction to delete for good.
        id: TransactionId,
    },

    /// List live transactions grouped by month.
    List {
        /// Restrict the listing to the month containing this date (YYYY-MM-DD).
        #[arg(long, value_parser = parse_date, conflicts_with = "year")]
        month: Option<Date>,

        /// Restrict the listing to the year containing this date (YYYY-MM-DD).
        #[arg(long, value_parser = parse_date)]
        year: Option<Date>,

        /// Only show transactions filed under this category ID. May be repeated.
        #[arg(long = "category")]
        categories: Vec<CategoryId>,

        /// Only show transactions whose memo contains this text.
        #[arg(long)]
        search: Option<String>,

        /// Sort order: date, amount or memo.
        #[arg(long, default_value = "date")]
        sort: String,

        /// Print the listing as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Show the summary figures for a month or for all time.
    Summary {
        /// The month to summarize (any date in it, YYYY-MM-DD). Defaults to
        /// all time.
        #[arg(long, value_parser = parse_date)]
        month: Option<Date>,

        /// Print the summary as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Show the totals of every month bucket in chronological order.
    Months,

    /// Manage categories.
    #[command(subcommand)]
    Category(CategoryCommand),

    /// Manage savings accounts.
    #[command(subcommand)]
    Account(AccountCommand),
}

#[derive(Subcommand, Debug)]
enum CategoryCommand {
    /// Create a new category.
    Add {
        /// The name of the category.
        #[arg(long)]
        name: String,

        /// The display color as a hex string, e.g. '#4CAF50'.
        #[arg(long, default_value = "#9E9E9E")]
        color: String,

        /// Whether the category groups income or expenses.
        #[arg(long, default_value = "expense")]
        kind: String,
    },

    /// Rename and/or recolor a category and propagate the change to its
    /// transactions.
    Update {
        /// The ID of the category to update.
        id: CategoryId,

        /// The new name.
        #[arg(long)]
        name: Option<String>,

        /// The new display color.
        #[arg(long)]
        color: Option<String>,
    },

    /// Move a category to the trash.
    Trash {
        /// The ID of the category to trash.
        id: CategoryId,
    },

    /// List every category that is not in the trash.
    List,
}

#[derive(Subcommand, Debug)]
enum AccountCommand {
    /// Create a new savings account.
    Add {
        /// The name of the account.
        #[arg(long)]
        name: String,

        /// The opening balance in minor currency units.
        #[arg(long, allow_hyphen_values = true, default_value_t = 0)]
        balance: i64,

        /// The date the balance was taken (YYYY-MM-DD). Defaults to today.
        #[arg(long, value_parser = parse_date)]
        date: Option<Date>,
    },

    /// Update an account's balance.
    Update {
        /// The ID of the account to update.
        id: AccountId,

        /// The new balance in minor currency units.
        #[arg(long, allow_hyphen_values = true)]
        balance: i64,

        /// The date the balance was taken (YYYY-MM-DD). Defaults to today.
        #[arg(long, value_parser = parse_date)]
        date: Option<Date>,
    },

    /// Delete an account.
    Delete {
        /// The ID of the account to delete.
        id: AccountId,
    },

    /// List every account and the total balance.
    List,
}

fn main() -> ExitCode {
    setup_logging();

    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("{error}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    let conn = db::open(&cli.db_path)?;
    db::initialize(&conn)?;

    match cli.command {
        Command::Add {
            amount,
            category,
            memo,
            date,
        } => {
            let category = get_category(category, &conn)?;
            let builder = Transaction::build(
                amount,
                date.unwrap_or_else(today),
                &memo,
                CategorySnapshot::of(&category),
            );

            let transaction = upsert_transaction(&builder, &conn)?;

            println!(
                "Added transaction #{} for {}",
                transaction.id,
                format_amount(transaction.amount)
            );
        }
        Command::Edit {
            id,
            amount,
            category,
            memo,
            date,
        } => {
            let existing = get_transaction(id, &conn)?;
            let category = match category {
                Some(category_id) => CategorySnapshot::of(&get_category(category_id, &conn)?),
                None => existing.category.clone(),
            };
            let builder = Transaction::build(
                amount.unwrap_or(existing.amount),
                date.unwrap_or(existing.date),
                &memo.unwrap_or(existing.memo),
                category,
            )
            .id(id);

            let transaction = upsert_transaction(&builder, &conn)?;

            println!(
                "Updated transaction #{} to {}",
                transaction.id,
                format_amount(transaction.amount)
            );
        }
        Command::Trash { id } => {
            move_to_trash(id, &conn)?;
            println!("Moved transaction #{id} to the trash");
        }
        Command::Restore { id } => {
            restore_from_trash(id, &conn)?;
            println!("Restored transaction #{id} from the trash");
        }
        Command::Purge { id } => {
            delete_permanently(id, &conn)?;
            println!("Permanently deleted transaction #{id}");
        }
        Command::List {
            month,
            year,
            categories,
            search,
            sort,
            json,
        } => {
            let period = match (month, year) {
                (Some(anchor), _) => Period::Month(anchor),
                (None, Some(anchor)) => Period::Year(anchor),
                (None, None) => Period::Total,
            };
            let filter = TransactionFilter {
                category_ids: categories,
                period,
                memo_search: search,
                sort: parse_sort(&sort)?,
            };

            let transactions = get_filtered_transactions(&filter, &conn)?;
            let groups = group_transactions_by_month(transactions);

            if json {
                println!("{}", serde_json::to_string_pretty(&groups)?);
            } else {
                for group in groups {
                    println!("{}", group.label);

                    for transaction in group.transactions {
                        println!(
                            "  #{:<5} {}  {:>12}  {}  [{}]",
                            transaction.id,
                            transaction.date,
                            format_amount(transaction.amount),
                            transaction.memo,
                            transaction.category.name,
                        );
                    }
                }
            }
        }
        Command::Summary { month, json } => {
            let scope = match month {
                Some(anchor) => BucketScope::month_of(anchor),
                None => BucketScope::AllTime,
            };
            let summary = get_summary(&scope, &conn)?;

            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                println!("Summary for {scope}");
                println!("  net:     {:>12}", format_amount(summary.totals.net));
                println!("  income:  {:>12}", format_amount(summary.totals.income));
                println!("  expense: {:>12}", format_amount(summary.totals.expense));

                let mut by_category: Vec<_> = summary.by_category.into_iter().collect();
                by_category.sort_by_key(|(category_id, _)| *category_id);

                for (category_id, total) in by_category {
                    let label = match get_category(category_id, &conn) {
                        Ok(category) => category.name.to_string(),
                        Err(_) => format!("category #{category_id}"),
                    };
                    println!("  {label}: {}", format_amount(total));
                }
            }
        }
        Command::Months => {
            for (month, totals) in get_month_summaries(&conn)? {
                println!(
                    "{month}  net {:>12}  income {:>12}  expense {:>12}",
                    format_amount(totals.net),
                    format_amount(totals.income),
                    format_amount(totals.expense),
                );
            }
        }
        Command::Category(command) => run_category_command(command, &conn)?,
        Command::Account(command) => run_account_command(command, &conn)?,
    }

    Ok(())
}

fn run_category_command(
    command: CategoryCommand,
    conn: &rusqlite::Connection,
) -> Result<(), Box<dyn Error>> {
    match command {
        CategoryCommand::Add { name, color, kind } => {
            let category = create_category(
                CategoryName::new(&name)?,
                &color,
                kind.parse::<CategoryKind>()?,
                conn,
            )?;

            println!("Added category #{} '{}'", category.id, category.name);
        }
        CategoryCommand::Update { id, name, color } => {
            let existing = get_category(id, conn)?;
            let name = match name {
                Some(name) => CategoryName::new(&name)?,
                None => existing.name.clone(),
            };
            let color = color.unwrap_or(existing.color);

            let updated = update_category(id, name, &color, conn)?;

            // Best-effort fan-out: a failure only leaves stale display
            // details on some transactions until the next propagation.
            match propagate_category_details(&updated, conn) {
                Ok(rows_updated) => {
                    println!(
                        "Updated category #{} '{}' ({rows_updated} transactions refreshed)",
                        updated.id, updated.name
                    );
                }
                Err(error) => {
                    tracing::warn!("could not propagate category details: {error}");
                    println!("Updated category #{} '{}'", updated.id, updated.name);
                }
            }
        }
        CategoryCommand::Trash { id } => {
            move_category_to_trash(id, conn)?;
            println!("Moved category #{id} to the trash");
        }
        CategoryCommand::List => {
            for category in get_categories(conn)? {
                println!(
                    "#{:<5} {}  {}  ({})",
                    category.id, category.color, category.name, category.kind
                );
            }
        }
    }

    Ok(())
}

fn run_account_command(
    command: AccountCommand,
    conn: &rusqlite::Connection,
) -> Result<(), Box<dyn Error>> {
    match command {
        AccountCommand::Add {
            name,
            balance,
            date,
        } => {
            let account = create_account(&name, balance, date.unwrap_or_else(today), conn)?;

            println!("Added account #{} '{}'", account.id, account.name);
        }
        AccountCommand::Update { id, balance, date } => {
            let account = update_account(id, balance, date.unwrap_or_else(today), conn)?;

            println!(
                "Updated account #{} '{}' to {}",
                account.id,
                account.name,
                format_amount(account.balance)
            );
        }
        AccountCommand::Delete { id } => {
            delete_account(id, conn)?;
            println!("Deleted account #{id}");
        }
        AccountCommand::List => {
            for account in get_accounts(conn)? {
                println!(
                    "#{:<5} {:>12}  {}  (updated {})",
                    account.id,
                    format_amount(account.balance),
                    account.name,
                    account.date,
                );
            }

            println!("Total: {}", format_amount(get_total_account_balance(conn)?));
        }
    }

    Ok(())
}

fn setup_logging() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer().pretty().with_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
            ),
        )
        .init();
}

fn parse_date(input: &str) -> Result<Date, String> {
    Date::parse(input, &format_description!("[year]-[month]-[day]"))
        .map_err(|error| format!("expected a date like 2024-03-05: {error}"))
}

fn parse_sort(input: &str) -> Result<TransactionSort, String> {
    match input {
        "date" => Ok(TransactionSort::DateDescending),
        "amount" => Ok(TransactionSort::AmountDescending),
        "memo" => Ok(TransactionSort::MemoAscending),
        other => Err(format!(
            "unknown sort order \"{other}\", expected date, amount or memo"
        )),
    }
}

fn today() -> Date {
    OffsetDateTime::now_utc().date()
}

/// Format an amount in minor currency units as a decimal string, e.g. `-12.34`.
fn format_amount(minor_units: i64) -> String {
    let sign = if minor_units < 0 { "-" } else { "" };
    let magnitude = minor_units.unsigned_abs();

    format!("{sign}{}.{:02}", magnitude / 100, magnitude % 100)
}
