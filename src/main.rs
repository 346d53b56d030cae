use clap::Parser;
use serde::Serialize;
use std::env;
use std::time::Duration;
use telctl::config::{self, Cli, Command, CommonArgs, OutputFormat, RunArgs};
use telctl::error::{ApiError, ErrorCode, TelnetResult};
use telctl::session::{Connection, PromptStage, Session};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    match cli.command {
        Command::Run(args) => run(args).await?,
        Command::Banner(args) => run_banner(args).await?,
    }
    Ok(())
}

#[derive(Debug, Serialize)]
struct RunReport {
    host: String,
    prompt: String,
    enabled: Option<bool>,
    login: String,
    commands: Vec<CommandOutput>,
}

#[derive(Debug, Serialize)]
struct CommandOutput {
    command: String,
    output: String,
}

async fn run(args: RunArgs) -> TelnetResult<()> {
    let config = config::Config::load(&args.common)?;
    init_logging(&config.logging);

    let password = secret(args.password.clone(), "TELCTL_PASSWORD").ok_or_else(|| {
        ApiError::new(
            ErrorCode::InvalidArgument,
            "A password is required (--password or TELCTL_PASSWORD)",
        )
    })?;
    let timeout = Duration::from_millis(args.login_timeout_ms);
    let session = Session::connect(&args.common.host, &config).await?;

    let (session, login) = if args.hp {
        session
            .hp_login(&args.username, &password, args.send_space, timeout)
            .await?
    } else if args.username.is_empty() {
        session.password_login(&password, timeout).await?
    } else {
        session.login(&args.username, &password, timeout).await?
    };

    let report = if args.enable {
        let enable_password = secret(args.enable_password.clone(), "TELCTL_ENABLE_PASSWORD")
            .unwrap_or_else(|| password.clone());
        let (session, enable) = session.enable(&enable_password, timeout).await?;
        finish(session, &args, login + &enable).await?
    } else {
        finish(session, &args, login).await?
    };

    match args.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Text => {
            for entry in &report.commands {
                print!("{}", entry.output);
            }
            println!();
        }
    }
    Ok(())
}

async fn finish<S: PromptStage>(
    mut session: Session<S>,
    args: &RunArgs,
    login: String,
) -> TelnetResult<RunReport> {
    let mut commands = Vec::with_capacity(args.commands.len());
    for command in &args.commands {
        let output = session.command(command).await?;
        commands.push(CommandOutput {
            command: command.clone(),
            output,
        });
    }

    let report = RunReport {
        host: args.common.host.clone(),
        prompt: session.prompt().to_string(),
        enabled: session.is_enabled().ok(),
        login,
        commands,
    };

    if args.hp {
        session.hp_logout(None).await?;
    } else {
        session.close().await;
    }
    Ok(report)
}

async fn run_banner(args: CommonArgs) -> TelnetResult<()> {
    let config = config::Config::load(&args)?;
    init_logging(&config.logging);

    let mut conn = Connection::connect_with_config(&args.host, &config).await?;
    if let Some(banner) = conn.read().await {
        print!("{banner}");
    }
    conn.close().await;
    Ok(())
}

fn secret(flag: Option<String>, var: &str) -> Option<String> {
    flag.or_else(|| env::var(var).ok())
}

fn init_logging(logging: &config::LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::new(logging.level.clone());
    if logging.format == "json" {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
}
