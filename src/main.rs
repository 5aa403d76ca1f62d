use std::time::Duration;

use clap::Parser;

use pxc::backend::{Backend, ProxmoxBackend, SimulatedBackend};
use pxc::cli::{Cli, Command, ConfigCommand, IsoCommand, PackagesCommand};
use pxc::error::PxcError;
use pxc::packages::PresetArgs;
use pxc::settings::SettingsStore;
use pxc::{config, create, iso, lifecycle, logging, packages, paths};

/// Pace of simulated transfers, so the progress bar is visible.
const SIMULATED_STEP: Duration = Duration::from_millis(20);

/// What `main` should do once a command returns.
enum Finish {
    Return,
    /// Leave immediately. The key reader thread may still be blocked on
    /// the terminal and would otherwise hold the process open.
    Exit,
}

#[tokio::main]
async fn main() {
    // Usage errors exit 1; --help and --version exit 0.
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let code = if e.use_stderr() { 1 } else { 0 };
            let _ = e.print();
            std::process::exit(code);
        }
    };

    let file_log = logging::init(cli.verbose);
    if cli.mutates()
        && let Err(e) = file_log.set_file(&paths::log_file())
    {
        tracing::warn!(error = %e, "operation log unavailable");
    }

    let store = SettingsStore::open_default();
    tracing::debug!(settings = %store.path().display(), simulate = cli.simulate, "starting");

    let result = if cli.simulate {
        let backend = SimulatedBackend::new().with_step_delay(SIMULATED_STEP);
        run(&backend, &store, cli.command).await
    } else {
        run(&ProxmoxBackend, &store, cli.command).await
    };

    // Handled failures are reported, not turned into a failing exit code.
    match result {
        Ok(Finish::Return) => {}
        Ok(Finish::Exit) => std::process::exit(0),
        Err(PxcError::Cancelled) => println!("Cancelled."),
        Err(e) => {
            tracing::error!(error = %e, "command failed");
            eprintln!("{:?}", miette::Report::new(e));
        }
    }
}

async fn run<B: Backend>(
    backend: &B,
    store: &SettingsStore,
    command: Command,
) -> Result<Finish, PxcError> {
    match command {
        Command::Create { preset } => create::run(backend, store, preset).await?,
        Command::List => lifecycle::list(backend).await?,
        Command::Start { id } => lifecycle::start(backend, id).await?,
        Command::Stop { id, force } => lifecycle::stop(backend, id, force).await?,
        Command::Delete { id, dry_run } => {
            if lifecycle::delete(backend, store, id, dry_run).await? {
                return Ok(Finish::Exit);
            }
        }
        Command::Iso { action } => match action {
            IsoCommand::List => iso::list(backend).await?,
            IsoCommand::Download { url, storage, name } => {
                iso::download(backend, store, &url, storage, name).await?
            }
            IsoCommand::Upload { file, storage } => {
                iso::upload(backend, store, &file, storage).await?
            }
            IsoCommand::Delete { name } => iso::delete(backend, &name).await?,
        },
        Command::Config { action } => match action {
            ConfigCommand::Show => config::show(store)?,
            ConfigCommand::Path => config::path(store),
            ConfigCommand::Set { key, value } => config::set(store, &key, &value)?,
            ConfigCommand::SetNode { node, key, value } => {
                config::set_node(store, &node, &key, &value)?
            }
        },
        Command::Packages { action } => match action {
            PackagesCommand::List => packages::list(store),
            PackagesCommand::Show { name } => packages::show(store, &name),
            PackagesCommand::Add {
                name,
                cores,
                memory,
                disk,
                bridge,
            } => packages::add(
                store,
                &name,
                PresetArgs {
                    cores,
                    memory,
                    disk,
                    bridge,
                },
            )?,
            PackagesCommand::Delete { name } => packages::delete(store, &name)?,
        },
    }
    Ok(Finish::Return)
}
