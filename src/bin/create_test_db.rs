use std::collections::HashMap;
use std::error::Error;
use std::path::Path;
use std::process::exit;

use clap::Parser;
use rusqlite::Connection;
use time::{Date, Duration, OffsetDateTime};

use moneytracker_rs::{
    Money, YearMonth,
    account::{AccountKind, create_account},
    budget::set_month_budget,
    category::{CategoryKind, CategoryName, create_category},
    connection::{ConnectionResponse, SendOutcome, respond_to_request, send_connection_request},
    initialize_db,
    ledger::{Expense, Income, Transfer, create_expense, create_income, create_transfer},
    user::create_user,
};

/// A utility for creating a demo database for moneytracker_rs.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// File path to save the SQLite database to.
    #[arg(long, short)]
    output_path: String,
}

/// Create and populate a database for manual testing.
fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    let output_path = Path::new(&args.output_path);

    match output_path.extension() {
        Some(extension) if !extension.is_empty() => {}
        _ => {
            eprintln!("Output path must include a file extension (e.g., 'my_database.db').");
            exit(1);
        }
    }

    if output_path.is_file() {
        eprintln!("File already exists at {output_path:#?}!");
        exit(1);
    }

    println!("Creating database at {output_path:#?}");
    let conn = Connection::open(output_path)?;

    initialize_db(&conn)?;

    println!("Creating test users...");
    let demo = create_user("demo", &conn)?;
    let partner = create_user("partner", &conn)?;

    if let SendOutcome::Sent(request) = send_connection_request(demo.id, "partner", &conn)? {
        respond_to_request(request.id, partner.id, ConnectionResponse::Accept, &conn)?;
    }

    println!("Creating accounts and categories...");
    let everyday = create_account(
        demo.id,
        "Everyday",
        AccountKind::Checking,
        Money::from_cents(1_500_00),
        &conn,
    )?;
    let savings = create_account(
        demo.id,
        "Savings",
        AccountKind::Savings,
        Money::from_cents(5_000_00),
        &conn,
    )?;
    create_account(
        demo.id,
        "Visa",
        AccountKind::Credit,
        Money::from_cents(-250_00),
        &conn,
    )?;

    let mut expense_categories = Vec::new();
    for name in ["Groceries", "Rent", "Transport", "Eating Out"] {
        expense_categories.push(create_category(
            demo.id,
            CategoryName::new(name)?,
            CategoryKind::Expense,
            &conn,
        )?);
    }
    let salary = create_category(
        demo.id,
        CategoryName::new("Salary")?,
        CategoryKind::Income,
        &conn,
    )?;

    println!("Creating transactions and budgets...");
    let today = OffsetDateTime::now_utc().date();
    let this_month = YearMonth::containing(today);
    let first_month = YearMonth::containing(today - Duration::days(62));
    let mut month = first_month;

    while month <= this_month {
        let first_day = month.first_day();
        let days_in_month = (month.next_first_day() - first_day).whole_days();

        create_income(
            demo.id,
            Income::build(Money::from_cents(4_200_00), first_day, "Employer")
                .account_id(Some(everyday.id))
                .category_id(Some(salary.id)),
            &conn,
        )?;
        create_transfer(
            demo.id,
            Transfer::build(Money::from_cents(500_00), first_day, everyday.id, savings.id)
                .description("Monthly saving"),
            &conn,
        )?;

        let limits: HashMap<_, _> = expense_categories
            .iter()
            .zip([600_00, 1_800_00, 150_00, 200_00])
            .map(|(category, cents)| (category.id, Money::from_cents(cents)))
            .collect();
        set_month_budget(demo.id, month, Money::from_cents(3_000_00), &limits, &conn)?;

        for day in (2..days_in_month).step_by(3) {
            let date: Date = first_day + Duration::days(day);
            if date > today {
                break;
            }

            let category = &expense_categories[day as usize % expense_categories.len()];
            let cents = 15_00 + (day * 7 % 50) * 100;
            create_expense(
                demo.id,
                Expense::build(Money::from_cents(cents), date, &format!("{} spend", category.name))
                    .account_id(Some(everyday.id))
                    .category_id(Some(category.id)),
                &conn,
            )?;
        }

        month = month.next();
    }

    create_expense(
        partner.id,
        Expense::build(
            Money::from_cents(42_00),
            today.replace_day(1).unwrap_or(today),
            "Books",
        ),
        &conn,
    )?;

    println!(
        "Success! Created users \"demo\" and \"partner\" with data from {first_month} to {this_month}."
    );

    Ok(())
}
