use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::process::ExitCode;

use anyhow::Result;
use clap::error::ErrorKind;
use clap::Parser;
use market_wire::{Dispatcher, Handler};
use marketplace::client::{self, Request};
use marketplace::{catalog, server, Cli, NetOptions, Role, RoleSettings};

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e)
            if matches!(
                e.kind(),
                ErrorKind::DisplayHelp
                    | ErrorKind::DisplayVersion
                    | ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand
            ) =>
        {
            e.exit()
        }
        Err(e) => {
            let detail = e.to_string();
            let first = detail.lines().next().unwrap_or_default();
            eprintln!("Invalid command line arguments: {}", first.trim_start_matches("error: "));
            return ExitCode::FAILURE;
        }
    };

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let net = cli.net;
    match cli.role {
        Role::NameServer { port } => {
            let dispatcher = server::name_server(&settings(&net, port, port)).await?;
            serve(dispatcher).await
        }
        Role::Bank { port, registry_port } => {
            let dispatcher = server::bank(&settings(&net, port, registry_port)).await?;
            serve(dispatcher).await
        }
        Role::Content {
            port,
            content_file,
            registry_port,
        } => {
            let items = catalog::load_content(&content_file)?;
            let dispatcher = server::content(&settings(&net, port, registry_port), items).await?;
            serve(dispatcher).await
        }
        Role::Store {
            port,
            stock_file,
            registry_port,
        } => {
            let items = catalog::load_catalog(&stock_file)?;
            let dispatcher = server::store(&settings(&net, port, registry_port), items).await?;
            serve(dispatcher).await
        }
        Role::Client { request, registry_port } => {
            let output = client::run(
                Request::from_number(request),
                net.registry_addr(registry_port),
                IpAddr::V4(Ipv4Addr::UNSPECIFIED),
                &net.channel_config(),
            )
            .await?;
            print!("{output}");
            Ok(())
        }
    }
}

fn settings(net: &NetOptions, port: u16, registry_port: u16) -> RoleSettings {
    RoleSettings {
        bind: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), port),
        advertise_ip: net.advertise_ip,
        registry: net.registry_addr(registry_port),
        channel: net.channel_config(),
    }
}

async fn serve<H: Handler>(mut dispatcher: Dispatcher<H>) -> Result<()> {
    dispatcher.serve_until(shutdown_signal()).await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::warn!("[main] cannot listen for ctrl-c: {e}");
        std::future::pending::<()>().await;
    }
}
