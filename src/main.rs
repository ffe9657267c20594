use std::fs::File;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use daemonize::Daemonize;

use rbak::commands::{self, SetArgs};
use rbak::settings::{self, SettingsStore};
use rbak::{logging, service};

const BANNER: &str = r"
        _           _
  _ __ | |__   __ _| | __
 | '__|| '_ \ / _` | |/ /
 | |   | |_) | (_| |   <
 |_|   |_.__/ \__,_|_|\_\

Welcome to rbak - scheduled backups for Linux systems
";

#[derive(Parser)]
#[command(name = "rbak")]
#[command(about = "Scheduled backup daemon with retention cleanup", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Set backup configuration")]
    Set(SetArgs),
    #[command(about = "List available time zones")]
    Timezones {
        #[arg(long, value_name = "KEYWORD")]
        filter: Option<String>,
    },
    #[command(about = "Start the backup service")]
    Start,
    #[command(about = "Stop the backup service")]
    Stop,
    #[command(about = "Show service status and configuration")]
    Status,
    #[command(about = "Run a backup immediately")]
    Backup,
    // The detached scheduler process; `start` spawns this.
    #[command(hide = true)]
    Daemon {
        #[arg(long, help = "Stay in the foreground instead of detaching")]
        foreground: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let Some(command) = cli.command else {
        print_welcome();
        return Ok(());
    };

    if let Commands::Daemon { foreground } = command {
        return run_daemon(foreground);
    }

    logging::init_console();
    let store = SettingsStore::open(settings::default_config_path())?;

    match command {
        Commands::Set(args) => commands::set_config(&store, args),
        Commands::Timezones { filter } => {
            commands::list_timezones(filter.as_deref());
            Ok(())
        }
        Commands::Start => commands::start_service(&store),
        Commands::Stop => commands::stop_service(&store),
        Commands::Status => {
            commands::show_status(&store);
            Ok(())
        }
        Commands::Backup => commands::backup_now(&store),
        Commands::Daemon { .. } => unreachable!("handled before logging init"),
    }
}

fn run_daemon(foreground: bool) -> Result<()> {
    let log_dir = settings::default_log_dir();
    std::fs::create_dir_all(&log_dir)
        .with_context(|| format!("failed to create log directory {}", log_dir.display()))?;

    if !foreground {
        let out = File::create(log_dir.join("daemon.out"))
            .context("failed to create daemon stdout file")?;
        let err = File::create(log_dir.join("daemon.err"))
            .context("failed to create daemon stderr file")?;
        let daemonize = Daemonize::new()
            .pid_file("/tmp/rbak.pid")
            .stdout(out)
            .stderr(err);
        daemonize.start().context("failed to detach daemon")?;
    }

    let _guard = logging::init_daemon(&log_dir)?;
    let store = Arc::new(SettingsStore::open(settings::default_config_path())?);
    service::daemon_main(store)
}

fn print_welcome() {
    println!("{}", BANNER.green());
    println!("{}", "Available commands:".blue());
    println!("  set         Configure backup settings");
    println!("  timezones   List available time zones");
    println!("  start       Start the backup service");
    println!("  stop        Stop the backup service");
    println!("  status      Show service status");
    println!("  backup      Run a backup immediately");
    println!("\nUse 'rbak <command> --help' for more information");
}
