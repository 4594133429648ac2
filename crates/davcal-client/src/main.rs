//! davcal CLI entry point.

use std::process::ExitCode;

use clap::Parser;

use davcal_caldav::CalDavSession;
use davcal_client::cli::{Cli, Command, ConfigAction};
use davcal_client::commands::{self, calendars, objects};
use davcal_client::config::ClientConfig;
use davcal_client::error::ClientResult;
use davcal_core::{ObjectKind, init_tracing};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> ClientResult<()> {
    let config = match cli.config {
        Some(ref path) => ClientConfig::load_from(path)?,
        None => ClientConfig::load()?,
    }
    .with_overrides(&cli.overrides());

    if let Err(e) = init_tracing(config.tracing_config(cli.debug)?) {
        eprintln!("warning: logging disabled: {}", e);
    }

    let mut out = std::io::stdout();
    let command = match cli.command {
        Command::Config { action } => {
            return match action {
                ConfigAction::Dump => commands::config::dump(&config, &mut out),
                ConfigAction::Validate => commands::config::validate(&config, &mut out),
                ConfigAction::Path => commands::config::path(&mut out),
            };
        }
        command => command,
    };

    let mut session = commands::open_session(&config)?;
    let result = dispatch(&session, &config, command, cli.json, &mut out).await;
    session.close();
    result
}

async fn dispatch(
    session: &CalDavSession,
    config: &ClientConfig,
    command: Command,
    json: bool,
    out: &mut std::io::Stdout,
) -> ClientResult<()> {
    if let Command::Calendars = command {
        return calendars::list(session, json, out).await;
    }

    let calendar = commands::target_calendar(session, config.caldav.calendar.as_deref()).await?;
    let url = calendar.url.as_str();

    match command {
        Command::Events => objects::list(session, url, ObjectKind::Event, json, out).await,
        Command::Todos => objects::list(session, url, ObjectKind::Todo, json, out).await,
        Command::Show { uid } => objects::show(session, url, &uid, json, out).await,
        Command::AddEvent(new) => objects::add_event(session, url, new, json, out).await,
        Command::AddTodo(new) => objects::add_todo(session, url, new, json, out).await,
        Command::UpdateEvent { uid, changes } => {
            objects::update_event(session, url, &uid, changes, out).await
        }
        Command::Complete { uid } => objects::complete(session, url, &uid, out).await,
        Command::Delete { uid } => objects::delete(session, url, &uid, out).await,
        Command::Calendars | Command::Config { .. } => Ok(()),
    }
}
