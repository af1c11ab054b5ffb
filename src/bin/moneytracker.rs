use std::{error::Error, fs::File, path::PathBuf};

use clap::{Parser, Subcommand};
use rusqlite::Connection;
use serde::Serialize;
use time::OffsetDateTime;

use moneytracker_rs::{
    YearMonth,
    budget::{get_active_notifications, get_budget_summaries, get_budget_summary},
    dashboard::get_monthly_overview,
    import::import_csv,
    initialize_db, setup_logging,
    user::{User, create_user, get_user_by_username},
};

/// Track expenses, incomes and monthly budgets from the command line.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// File path to the application SQLite database.
    #[arg(long, env = "MONEYTRACKER_DB")]
    db_path: PathBuf,

    /// Also append debug logs to this file.
    #[arg(long)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create the database tables.
    Init,
    /// Register a new user.
    AddUser {
        /// The new user's unique name.
        username: String,
    },
    /// Import expenses and incomes from a CSV file.
    Import {
        /// The user to import for.
        #[arg(long, short)]
        user: String,
        /// A CSV file with the header `date,kind,amount,description,category,account`.
        path: PathBuf,
    },
    /// Print a month's totals as JSON.
    Overview {
        /// The user to summarise.
        #[arg(long, short)]
        user: String,
        /// The month as YYYY-MM. Defaults to the current month.
        #[arg(long, short)]
        month: Option<YearMonth>,
    },
    /// Print budget progress as JSON.
    Budgets {
        /// The user to summarise.
        #[arg(long, short)]
        user: String,
        /// Only show this month (YYYY-MM) instead of every budgeted month.
        #[arg(long, short)]
        month: Option<YearMonth>,
    },
    /// Print a user's active budget notifications as JSON.
    Notifications {
        /// The user to check.
        #[arg(long, short)]
        user: String,
    },
}

fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    setup_logging(args.log_file.as_deref())?;

    let conn = Connection::open(&args.db_path)?;
    initialize_db(&conn)?;

    match args.command {
        Command::Init => {
            tracing::info!("Initialized database at {:?}", args.db_path);
        }
        Command::AddUser { username } => {
            let user = create_user(&username, &conn)?;
            print_json(&user)?;
        }
        Command::Import { user, path } => {
            let user = find_user(&user, &conn)?;
            let summary = import_csv(user.id, File::open(&path)?, &conn)?;
            print_json(&summary)?;
        }
        Command::Overview { user, month } => {
            let user = find_user(&user, &conn)?;
            let month = month.unwrap_or_else(current_month);
            print_json(&get_monthly_overview(user.id, month, &conn)?)?;
        }
        Command::Budgets { user, month } => {
            let user = find_user(&user, &conn)?;
            match month {
                Some(month) => print_json(&get_budget_summary(user.id, month, &conn)?)?,
                None => print_json(&get_budget_summaries(user.id, &conn)?)?,
            }
        }
        Command::Notifications { user } => {
            let user = find_user(&user, &conn)?;
            print_json(&get_active_notifications(user.id, &conn)?)?;
        }
    }

    Ok(())
}

fn find_user(username: &str, conn: &Connection) -> Result<User, moneytracker_rs::Error> {
    get_user_by_username(username, conn).map_err(|error| match error {
        moneytracker_rs::Error::NotFound => {
            moneytracker_rs::Error::UnknownUsername(username.to_owned())
        }
        error => error,
    })
}

fn current_month() -> YearMonth {
    let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
    YearMonth::containing(now.date())
}

fn print_json(value: &impl Serialize) -> Result<(), serde_json::Error> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
