use std::error::Error;
use std::path::Path;
use std::process::exit;

use clap::Parser;
use rusqlite::Connection;
use time::{Duration, OffsetDateTime};

use cashbook::{
    NewTransaction, NewUser, PasswordHash, TransactionType, ValidatedPassword, create_transaction,
    create_user, get_all_categories, get_role_by_name, initialize_db, seed_defaults,
};

/// A utility for creating a test database for the cashbook server.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// File path to save the SQLite database to.
    #[arg(long, short)]
    output_path: String,

    /// How many days of transactions to generate, counting back from today.
    #[arg(long, default_value_t = 90)]
    days: i64,
}

/// The demo accounts created alongside the seeded admin account.
const DEMO_USERS: [(&str, &str); 2] = [("manager", "Manager"), ("viewer", "Viewer")];

/// The password of every demo account.
const DEMO_PASSWORD: &str = "test";

/// Expenses cycled through when generating transactions: description, party, category and amount.
const EXPENSES: [(&str, &str, &str, f64); 6] = [
    ("Weekly groceries", "FreshMart", "Food & Dining", 84.20),
    ("Bus pass top up", "Metro", "Transportation", 20.00),
    ("Electricity bill", "PowerCo", "Bills & Utilities", 132.75),
    ("Movie tickets", "Cinema Centre", "Entertainment", 36.00),
    ("Pharmacy", "City Pharmacy", "Healthcare", 18.50),
    ("New shoes", "Shoe Store", "Shopping", 119.99),
];

/// Create and populate a database for manual testing.
fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    let output_path = Path::new(&args.output_path);

    match output_path.extension() {
        None => {
            eprintln!("Output path must include a file extension (e.g., 'my_database.db').");
            exit(1);
        }
        Some(extension) if extension.is_empty() => {
            eprintln!("Output path must include a file extension (e.g., 'my_database.db').");
            exit(1);
        }
        _ => {}
    }

    if output_path.is_file() {
        eprintln!("File already exists at {output_path:#?}!");
        exit(1);
    }

    println!("Creating database at {output_path:#?}");
    let connection = Connection::open(output_path)?;

    initialize_db(&connection)?;
    seed_defaults(&connection)?;

    let transaction = connection.unchecked_transaction()?;

    println!("Creating demo users...");
    let password_hash = PasswordHash::new(
        ValidatedPassword::new_unchecked(DEMO_PASSWORD),
        PasswordHash::DEFAULT_COST,
    )?;

    let mut user_ids = Vec::new();
    for (username, role_name) in DEMO_USERS {
        let role = get_role_by_name(role_name, &transaction)?;
        let user = create_user(
            NewUser {
                username: username.to_owned(),
                email: format!("{username}@example.com"),
                password_hash: password_hash.clone(),
                first_name: role_name.to_owned(),
                last_name: "Demo".to_owned(),
                phone: String::new(),
                role_id: role.id,
            },
            &transaction,
        )?;
        user_ids.push(user.id);
    }

    println!("Creating transactions for the last {} days...", args.days);
    let categories = get_all_categories(&transaction)?;
    let category_id = |name: &str| {
        categories
            .iter()
            .find(|category| category.name == name)
            .map(|category| category.id)
            .ok_or_else(|| format!("the category \"{name}\" was not seeded"))
    };
    let salary_id = category_id("Salary")?;
    let today = OffsetDateTime::now_utc().date();
    let mut count = 0;

    for (user_index, user_id) in user_ids.iter().enumerate() {
        for day in 0..args.days {
            let date = today - Duration::days(day);

            if day % 14 == 0 {
                create_transaction(
                    NewTransaction {
                        transaction_type: TransactionType::Income,
                        amount: 2400.0,
                        description: "Fortnightly pay".to_owned(),
                        notes: None,
                        party: Some("Employer Ltd".to_owned()),
                        date,
                        user_id: *user_id,
                        category_id: salary_id,
                    },
                    &transaction,
                )?;
                count += 1;
            }

            if (day as usize + user_index) % 2 == 0 {
                let (description, party, category, amount) =
                    EXPENSES[(day as usize + user_index) % EXPENSES.len()];

                create_transaction(
                    NewTransaction {
                        transaction_type: TransactionType::Expense,
                        amount,
                        description: description.to_owned(),
                        notes: None,
                        party: Some(party.to_owned()),
                        date,
                        user_id: *user_id,
                        category_id: category_id(category)?,
                    },
                    &transaction,
                )?;
                count += 1;
            }
        }
    }

    transaction.commit()?;

    println!("Created {count} transactions.");
    println!(
        "Log in as {} with the password \"{DEMO_PASSWORD}\", or as the seeded admin account.",
        DEMO_USERS.map(|(username, _)| username).join(" or ")
    );
    println!("Success!");

    Ok(())
}
