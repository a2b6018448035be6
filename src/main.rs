use anyhow::Result;
use clap::Parser;
use colored::*;
use env_logger::{Builder, Env};
use gestorftpd::config::{log_config, Config};
use gestorftpd::constants::DEFAULT_CONFIG_FILE;
use gestorftpd::core_admin::{AdminOutput, Console};
use gestorftpd::core_cli::Cli;
use gestorftpd::server::ServerController;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    // Initialize the logger with a custom format and colors
    let default_filter = if args.verbose { "debug" } else { "info" };
    Builder::from_env(Env::default().default_filter_or(default_filter))
        .format(|buf, record| {
            let timestamp = buf.timestamp().to_string();
            let level = match record.level() {
                log::Level::Error => record.level().to_string().red(),
                log::Level::Warn => record.level().to_string().yellow(),
                log::Level::Info => record.level().to_string().green(),
                log::Level::Debug => record.level().to_string().blue(),
                log::Level::Trace => record.level().to_string().white(),
            };
            writeln!(buf, "[{}] [{}] {}", timestamp, level, record.args())
        })
        .init();

    let mut config = match &args.config {
        Some(path) => Config::load_from_file(path)?,
        None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
            Config::load_from_file(Path::new(DEFAULT_CONFIG_FILE))?
        }
        None => {
            log::warn!(
                "No configuration file found, using defaults (looked for {})",
                DEFAULT_CONFIG_FILE
            );
            Config::default()
        }
    };
    if let Some(port) = args.port {
        config.server.listen_port = port;
    }
    if let Some(root) = args.root {
        config.server.root_path = root;
    }

    log::info!("Configuration:");
    log_config(&config.server);

    let controller = Arc::new(ServerController::from_config(config.server)?);
    let console = Console::new(Arc::clone(&controller));

    if args.autostart {
        match controller.start().await {
            Ok(addr) => println!("Server started on {}", addr),
            Err(e) => eprintln!("{}", format!("Error: {}", e).red()),
        }
    }

    println!("gestorftpd console. Type 'help' for the list of commands.");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let line = match lines.next_line().await? {
            Some(line) => line,
            None => break,
        };
        match console.execute_line(&line).await {
            Ok(Some(AdminOutput::Exit)) => break,
            Ok(Some(output)) => println!("{}", output),
            Ok(None) => {}
            Err(e) => eprintln!("{}", format!("Error: {}", e).red()),
        }
    }

    if controller.state().is_running() {
        controller.stop().await?;
    }
    println!("Bye");
    Ok(())
}
