use std::process::ExitCode;

use clap::Parser;
use log::{error, info};

use notably::{
    serve, App, Cli, ClientConfig, Commands, Config, FileSessionStore, HttpBackend, Store,
};

pub fn initialize_logger(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_timestamp_secs()
        .format_module_path(true)
        .init();

    info!("Logger initialized");
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    initialize_logger(cli.verbose);

    match run(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!("{}", e);
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> notably::Result<bool> {
    match cli.command {
        Commands::Serve { port, data_dir } => {
            let mut config = Config::load(cli.config.as_deref())?;
            if let Some(port) = port {
                config.port = port;
            }
            if let Some(data_dir) = data_dir {
                config.data_dir = data_dir;
            }

            info!("Application starting up");
            serve(config).await?;
            info!("Application shutting down");
            Ok(true)
        }
        command => {
            let config = ClientConfig::new(cli.server, cli.session_file);
            let store = Store::new(
                HttpBackend::new(config.server_url),
                FileSessionStore::new(config.session_file),
            );
            App::new(store, cli.verbose).run(command).await
        }
    }
}
