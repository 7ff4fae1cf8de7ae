use magio_lib::logging::init_tracing;
use magio_lib::{
    AccountService, ApiClient, ApiError, CancelSource, Config, ConfigError, DashboardError,
    DashboardService, FinancialService, LogNotifier,
};
use serde::Serialize;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, warn};

const TRANSACTIONS_PAGE_SIZE: u32 = 15;

const USAGE: &str = "usage: magio <command>

commands:
  login <email> <password>
  register <full-name> <email> <password>
  logout
  profile
  dashboard
  transactions [page]";

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("{0}")]
    Usage(String),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to build http client: {0}")]
    Client(#[from] reqwest::Error),
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Dashboard(#[from] DashboardError),
    #[error("failed to render output: {0}")]
    Output(#[from] serde_json::Error),
}

enum Command {
    Login { email: String, password: String },
    Register { full_name: String, email: String, password: String },
    Logout,
    Profile,
    Dashboard,
    Transactions { page: u32 },
}

fn parse_args(args: &[String]) -> Result<Command, CliError> {
    let usage = || CliError::Usage(USAGE.to_string());
    let (name, rest) = args.split_first().ok_or_else(usage)?;
    let command = match (name.as_str(), rest) {
        ("login", [email, password]) => Command::Login {
            email: email.clone(),
            password: password.clone(),
        },
        ("register", [full_name, email, password]) => Command::Register {
            full_name: full_name.clone(),
            email: email.clone(),
            password: password.clone(),
        },
        ("logout", []) => Command::Logout,
        ("profile", []) => Command::Profile,
        ("dashboard", []) => Command::Dashboard,
        ("transactions", []) => Command::Transactions { page: 1 },
        ("transactions", [page]) => {
            let page = page
                .parse::<u32>()
                .ok()
                .filter(|p| *p > 0)
                .ok_or_else(|| CliError::Usage(format!("invalid page: {page}")))?;
            Command::Transactions { page }
        }
        _ => return Err(usage()),
    };
    Ok(command)
}

fn print_json(value: &impl Serialize) -> Result<(), CliError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn run(command: Command) -> Result<(), CliError> {
    let config = Config::from_env()?;
    let api = ApiClient::from_config(&config, Arc::new(LogNotifier))?;

    let cancel = CancelSource::new();
    let token = cancel.token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted; cancelling in-flight requests");
            cancel.cancel();
        }
    });

    match command {
        Command::Login { email, password } => {
            let tokens = AccountService::new(api).login(&email, &password).await?;
            if tokens.is_none() {
                warn!("no token was stored; the server may rely on cookies only");
            }
        }
        Command::Register {
            full_name,
            email,
            password,
        } => {
            AccountService::new(api)
                .register(&full_name, &email, &password)
                .await?;
        }
        Command::Logout => {
            let server_logout = AccountService::new(api).logout();
            let _ = server_logout.await;
        }
        Command::Profile => {
            let profile = AccountService::new(api).fetch_profile().await?;
            print_json(&profile)?;
        }
        Command::Dashboard => {
            let dashboard = DashboardService::new(api).load(Some(&token)).await?;
            print_json(&dashboard)?;
        }
        Command::Transactions { page } => {
            let transactions = FinancialService::new(api)
                .transactions_page(page, TRANSACTIONS_PAGE_SIZE, Some(&token))
                .await?;
            print_json(&transactions)?;
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let result = match parse_args(&args) {
        Ok(command) => run(command).await,
        Err(err) => Err(err),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(CliError::Usage(usage)) => {
            eprintln!("{usage}");
            ExitCode::from(2)
        }
        Err(err) => {
            error!(error = %err, "command failed");
            ExitCode::FAILURE
        }
    }
}
