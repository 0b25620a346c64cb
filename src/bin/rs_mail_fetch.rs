use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use log::error;

use rs_mail_fetch::auth::credential_store;
use rs_mail_fetch::daemon::{WatchConfig, run_watch};
use rs_mail_fetch::runner::{fetch_once, list_mailboxes};

#[derive(Parser)]
#[command(name = "rs_mail_fetch")]
#[command(about = "Fetch IMAP messages into flat text files", long_about = None)]
struct Cli {
    /// Config file (default: <config dir>/rs_mail_fetch/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch once and write both artifacts
    Fetch {
        /// Maximum records for this run (overrides max_records)
        count: Option<usize>,
    },

    /// Write the mailbox list only
    ListMailboxes,

    /// Fetch repeatedly until Ctrl-C
    Watch {
        #[arg(long, default_value_t = 300)]
        interval: u64,

        /// Maximum records per cycle (overrides max_records)
        count: Option<usize>,
    },

    /// Store the IMAP password in the keyring
    SetPassword {
        #[arg(long)]
        user: String,
    },
}

fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format(|buf, record| {
            writeln!(
                buf,
                "{} [{}] [{}] {} - {}",
                buf.timestamp(),
                record.level(),
                std::thread::current().name().unwrap_or("-"),
                record.target(),
                record.args()
            )
        })
        .init();
}

fn run(cli: Cli) -> Result<ExitCode> {
    match cli.cmd {
        Command::SetPassword { user } => {
            eprintln!("Paste password (end with Ctrl-D):");
            let mut secret = String::new();
            std::io::Read::read_to_string(&mut std::io::stdin(), &mut secret)?;
            let secret = secret.trim();
            credential_store::save_password(&user, secret)?;
            println!("Saved password for {}", user);
            Ok(ExitCode::SUCCESS)
        }

        Command::Fetch { count } => {
            let report = fetch_once(cli.config.as_deref(), count)?;
            Ok(report.exit_code())
        }

        Command::ListMailboxes => {
            let mailboxes = list_mailboxes(cli.config.as_deref())?;
            for name in &mailboxes {
                println!("{name}");
            }
            Ok(ExitCode::SUCCESS)
        }

        Command::Watch { interval, count } => {
            run_watch(WatchConfig {
                interval_secs: interval,
                config_path: cli.config,
                max_records_override: count,
            })?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}
