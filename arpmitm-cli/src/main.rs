use arpmitm_capture::{filters, list_interfaces, FrameSource, PacketCapture};
use arpmitm_cli::{ensure_root, shutdown_signal, Cli, Commands};
use arpmitm_core::{EngineConfig, Error, Interface, Result};
use arpmitm_engine::{CaptureSetup, DatalinkLink, HostScanner, MitmEngine, ProcForwarding, RunReport};
use ipnetwork::Ipv4Network;
use std::net::Ipv4Addr;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse_args();

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.log_level()));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .init();

    match run(cli.command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "arpmitm failed");
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Commands) -> Result<()> {
    match command {
        Commands::Interfaces => {
            for iface in list_interfaces()? {
                println!("{}", iface);
            }
            Ok(())
        }
        Commands::Scan {
            interface,
            range,
            timeout,
        } => scan(&interface, range, Duration::from_secs(timeout)).await,
        Commands::Mitm {
            interface,
            target,
            gateway,
            params,
            no_sniff,
        } => mitm(&interface, target, gateway, &params, no_sniff).await,
    }
}

async fn scan(interface: &str, range: Option<Ipv4Network>, timeout: Duration) -> Result<()> {
    ensure_root("scan")?;

    let iface = Interface::by_name(interface)?;
    let network = match range.or(iface.ipv4_network) {
        Some(net) => Ipv4Network::new(net.network(), net.prefix())
            .map_err(|e| Error::invalid_parameter("range", e.to_string()))?,
        None => {
            return Err(Error::invalid_parameter(
                "range",
                format!("{} has no IPv4 network, pass --range", interface),
            ))
        }
    };

    let link = Arc::new(DatalinkLink::open(iface)?);
    let hosts = HostScanner::new(link)
        .with_timeout(timeout)
        .scan(network)
        .await?;

    println!("{:<16} MAC", "IP");
    for host in &hosts {
        if let Some(mac) = host.mac {
            println!("{:<16} {}", host.ip, mac);
        }
    }
    println!("{} host(s) up in {}", hosts.len(), network);
    Ok(())
}

async fn mitm(
    interface: &str,
    target: Ipv4Addr,
    gateway: Ipv4Addr,
    params: &[String],
    no_sniff: bool,
) -> Result<()> {
    let mut config = EngineConfig::new(interface, target, gateway);
    for param in params {
        config.apply_param(param)?;
    }
    if no_sniff {
        config.capture_http = false;
    }
    config.validate()?;

    ensure_root("mitm")?;
    let shutdown = shutdown_signal()?;

    let iface = Interface::by_name(&config.interface)?;
    let link = Arc::new(DatalinkLink::open(iface)?);
    let forwarding = Arc::new(ProcForwarding::new(&config.forward_path));
    let capture = if config.capture_http {
        Some(open_sniffer(&config)?)
    } else {
        None
    };

    let engine = MitmEngine::new(config, link, forwarding)?;
    info!("Press Ctrl-C to stop and restore the network");
    let report = engine.run(capture, shutdown).await?;

    print_report(&report);
    Ok(())
}

fn open_sniffer(config: &EngineConfig) -> Result<CaptureSetup> {
    let mut capture = PacketCapture::new(&config.interface)?;
    let filter = config
        .capture_filter
        .clone()
        .unwrap_or_else(|| filters::mitm_filter(config.target, config.gateway));
    capture.set_filter(&filter);

    let source: Box<dyn FrameSource> = Box::new(capture.open()?);
    Ok((capture, source))
}

fn print_report(report: &RunReport) {
    println!();
    println!("Session {}", report.session.id);
    println!("  {}", report.binding);
    println!("  Sent packets: {}", report.session.packets_sent);
    println!(
        "  Frames transmitted: {} ({} bytes)",
        report.session.frames_transmitted, report.session.bytes_sent
    );
    if report.session.resolve_failures > 0 || report.session.send_errors > 0 {
        println!(
            "  Resolve failures: {}, send errors: {}",
            report.session.resolve_failures, report.session.send_errors
        );
    }
    match &report.restore {
        Some(restore) => {
            println!("  Restored target: {}", restore.target);
            println!("  Restored gateway: {}", restore.gateway);
        }
        None => println!("  Network was already restored"),
    }
    if let Some(capture) = &report.capture {
        println!("  {}", capture.format());
    }
}
