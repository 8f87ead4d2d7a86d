//! CLI argument parsing

use clap::{Parser, Subcommand};
use ipnetwork::Ipv4Network;
use std::net::Ipv4Addr;

#[derive(Parser, Debug)]
#[command(name = "arpmitm")]
#[command(version, about = "ARP cache poisoning man-in-the-middle tool", long_about = None)]
pub struct Cli {
    /// Verbose output (-v, -vv, -vvv for increasing verbosity)
    #[arg(short = 'v', long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List available network interfaces
    Interfaces,

    /// Find live hosts on a subnet with ARP requests
    Scan {
        /// Network interface name
        #[arg(short, long)]
        interface: String,

        /// CIDR range to sweep; defaults to the interface's own subnet
        #[arg(short, long, value_name = "CIDR")]
        range: Option<Ipv4Network>,

        /// Seconds to wait for replies
        #[arg(short, long, value_name = "SECONDS", default_value = "10")]
        timeout: u64,
    },

    /// Poison a target and its gateway, sniffing HTTP until Ctrl-C
    Mitm {
        /// Network interface name
        #[arg(short, long)]
        interface: String,

        /// Victim host
        #[arg(short, long)]
        target: Ipv4Addr,

        /// Gateway the victim talks through
        #[arg(short, long)]
        gateway: Ipv4Addr,

        /// Engine parameters (interval, timeout, restore_count, filter, ...)
        #[arg(short = 'p', long = "param", value_name = "KEY=VALUE")]
        params: Vec<String>,

        /// Poison only, do not capture traffic
        #[arg(long)]
        no_sniff: bool,
    },
}

impl Cli {
    /// Parse command-line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Default log directive for the `-v` count
    pub fn log_level(&self) -> &'static str {
        match self.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_mitm() {
        let cli = Cli::try_parse_from([
            "arpmitm", "-vv", "mitm", "-i", "eth0", "-t", "192.168.1.20", "-g", "192.168.1.1",
            "-p", "interval=1", "-p", "restore_count=6",
        ])
        .unwrap();

        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.log_level(), "trace");
        match cli.command {
            Commands::Mitm {
                interface,
                target,
                gateway,
                params,
                no_sniff,
            } => {
                assert_eq!(interface, "eth0");
                assert_eq!(target, Ipv4Addr::new(192, 168, 1, 20));
                assert_eq!(gateway, Ipv4Addr::new(192, 168, 1, 1));
                assert_eq!(params, vec!["interval=1", "restore_count=6"]);
                assert!(!no_sniff);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_parse_scan() {
        let cli =
            Cli::try_parse_from(["arpmitm", "scan", "-i", "eth0", "-r", "10.0.0.0/24"]).unwrap();
        match cli.command {
            Commands::Scan { range, timeout, .. } => {
                assert_eq!(range, Some("10.0.0.0/24".parse().unwrap()));
                assert_eq!(timeout, 10);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_rejects_bad_address() {
        assert!(Cli::try_parse_from([
            "arpmitm", "mitm", "-i", "eth0", "-t", "not-an-ip", "-g", "192.168.1.1",
        ])
        .is_err());
    }
}
