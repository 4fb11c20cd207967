use std::convert::Infallible;
use std::env;
use std::process;

use env_logger::{Builder, Target};
use hyper::service::{make_service_fn, service_fn};
use hyper::Server;
use log::{debug, error, info, LevelFilter};

use config::Config;
use error::ConfigError;
use relay::Relay;

mod config;
mod connector;
mod data;
mod error;
mod forwarder;
mod relay;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let config = match Config::from_args(env::args_os()) {
        Ok(config) => config,
        Err(ConfigError::Cli(err)) => err.exit(),
        Err(err) => {
            eprintln!("{}", err);
            process::exit(1);
        }
    };
    init_logging(config.verbosity);

    debug!("Options: {:?}", config);
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let addr = config.listen_addr().await?;
    let relay = Relay::new(&config)?;
    let service = make_service_fn(move |_| {
        let relay = relay.clone();
        async move {
            Ok::<_, Infallible>(service_fn(move |req| {
                let relay = relay.clone();
                async move { Ok::<_, Infallible>(relay.handle(req).await) }
            }))
        }
    });

    let server = Server::try_bind(&addr)?
        .serve(service)
        .with_graceful_shutdown(shutdown_signal());
    info!("Starting server at http://{}", addr);
    server.await?;
    info!("Server stopped");
    Ok(())
}

fn init_logging(verbosity: u64) {
    logger(verbosity, env::var("RUST_LOG").ok().as_deref()).init();
}

/// Logs go to stdout; `RUST_LOG` filters win over the verbosity flag.
fn logger(verbosity: u64, filters: Option<&str>) -> Builder {
    let mut builder = pretty_env_logger::formatted_builder();
    builder.target(Target::Stdout);
    match filters {
        Some(filters) => builder.parse_filters(filters),
        None if verbosity >= 1 => builder.filter_level(LevelFilter::Debug),
        None => builder.filter_level(LevelFilter::Info),
    };
    builder
}

/// Resolves on Ctrl-C, or SIGTERM on unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", err);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!("Failed to install SIGTERM handler: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received Ctrl+C, shutting down"),
        () = terminate => info!("Received SIGTERM, shutting down"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_selects_level() {
        assert_eq!(logger(0, None).build().filter(), LevelFilter::Info);
        assert_eq!(logger(2, None).build().filter(), LevelFilter::Debug);
    }

    #[test]
    fn rust_log_overrides_verbosity() {
        assert_eq!(logger(1, Some("warn")).build().filter(), LevelFilter::Warn);
        assert_eq!(logger(0, Some("hecrelay=trace")).build().filter(), LevelFilter::Trace);
    }
}
