use std::io;

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use tracing::{debug, error};
use tracing_subscriber::EnvFilter;

use budgetmate::config::Settings;
use budgetmate::http::HttpService;
use budgetmate::service::Registration;
use budgetmate::session::{self, Session};
use budgetmate::statement::write_statement;
use budgetmate::storage::FileStorage;
use budgetmate::summary::BudgetSummary;
use budgetmate::transactions::{TransactionDraft, TransactionId};
use budgetmate::{BudgetAggregator, TransactionStore};

#[derive(Parser)]
#[command(version, author = "Vance Longwill <vancelongwill@gmail.com>")]
struct Opts {
    #[command(flatten)]
    settings: Settings,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create an account
    Register {
        #[arg(long)]
        username: String,
        #[arg(long)]
        password: String,
        #[arg(long)]
        first_name: String,
        #[arg(long)]
        last_name: String,
    },
    /// Log in and remember the session
    Login {
        #[arg(long)]
        username: String,
        #[arg(long)]
        password: String,
    },
    /// Forget the current session
    Logout,
    /// List transactions, newest first
    List,
    /// Record an income or an expense
    Add {
        description: String,
        amount: String,
        #[arg(long, default_value = "expense")]
        kind: String,
    },
    /// Change the description and amount of a transaction
    Edit {
        id: i64,
        description: String,
        amount: String,
    },
    /// Delete a transaction
    Remove { id: i64 },
    /// Set the monthly budget
    Budget { value: String },
    /// Show budget, balance and totals per category
    Summary,
    /// Write category totals as CSV to stdout
    Export,
}

fn print_summary(summary: &BudgetSummary) {
    let or_dashes = |value: Option<rust_decimal::Decimal>| {
        value.map_or_else(|| "--".to_string(), |v| v.to_string())
    };
    println!("Monthly budget:        {}", or_dashes(summary.budget));
    println!("Budget + total income: {}", or_dashes(summary.combined_budget));
    println!("Balance:               {}", or_dashes(summary.balance));
    println!("Total expenses:        {}", summary.total_expenses);
    println!("Total income:          {}", summary.total_income);
    if summary.over_budget {
        println!("You have exceeded your combined budget!");
    }
    if summary.categories.is_empty() {
        println!("No expenses recorded.");
        return;
    }
    println!();
    for category in &summary.categories {
        let mut notes = Vec::new();
        if category.too_high {
            notes.push("too high");
        }
        if category.discretionary {
            notes.push("discretionary");
        }
        println!("{:<24} {:>12}  {}", category.category, category.total, notes.join(", "));
    }
}

async fn run() -> Result<()> {
    let opts: Opts = Opts::parse();
    let settings = opts.settings;

    let service = HttpService::new(settings.api.clone())?;
    let storage = FileStorage::new(&settings.state);
    debug!(api = settings.api.as_str(), state = ?storage.path(), "Starting");

    let command = match opts.command {
        Command::Register {
            username,
            password,
            first_name,
            last_name,
        } => {
            let registration = Registration {
                username,
                password,
                first_name,
                last_name,
            };
            session::register(&service, &registration).await?;
            println!("Account created successfully! You can now log in.");
            return Ok(());
        }
        Command::Login { username, password } => {
            let session = session::login(&service, &storage, &username, &password).await?;
            println!("Logged in as user {}", session.user());
            return Ok(());
        }
        Command::Logout => {
            session::logout(&storage)?;
            println!("Logged out");
            return Ok(());
        }
        command => command,
    };
    let session: Session = session::resume(&storage)?
        .ok_or_else(|| anyhow!("not logged in, run `budgetmate login` first"))?;

    let store = TransactionStore::new(&service, &storage, session, settings.store_options())?;
    let aggregator = BudgetAggregator::default();

    match command {
        Command::List => {
            store.load().await?;
            for t in store.transactions() {
                println!("{:>6}  {:<8} {:<24} {:>12}", t.id.0, t.kind, t.category, t.amount);
            }
        }
        Command::Add {
            description,
            amount,
            kind,
        } => {
            let id = store
                .add(TransactionDraft::new(&description, &amount, &kind))
                .await?;
            println!("Added transaction {}", id);
        }
        Command::Edit {
            id,
            description,
            amount,
        } => {
            let id = TransactionId(id);
            store.load().await?;
            store.update(id, &description, &amount).await?;
            println!("Updated transaction {}", id);
        }
        Command::Remove { id } => {
            let id = TransactionId(id);
            store.load().await?;
            store.remove(id).await?;
            println!("Removed transaction {}", id);
        }
        Command::Budget { value } => {
            let budget = store.set_budget(&value)?;
            println!("Monthly budget set to {}", budget);
        }
        Command::Summary => {
            store.load().await?;
            print_summary(&aggregator.summarize(&store.snapshot()));
        }
        Command::Export => {
            store.load().await?;
            write_statement(&aggregator.summarize(&store.snapshot()), io::stdout())?;
        }
        Command::Register { .. } | Command::Login { .. } | Command::Logout => {}
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    if let Err(e) = run().await {
        error!(error = e.to_string(), "Something went wrong");
        eprintln!("{:#}", e);
        std::process::exit(1);
    }
}
