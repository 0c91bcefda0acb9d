//! hostprobe - Host introspection tool.
//!
//! Prints host load snapshots, CPU topology, firmware identity, port owners
//! and IP classifications as JSON.

use hostprobe::runtime::TrackingAllocator;
#[global_allocator]
static GLOBAL: TrackingAllocator = TrackingAllocator;

use std::net::IpAddr;

use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::json;
use tracing::{Level, debug, info};
use tracing_subscriber::EnvFilter;

use hostprobe::collector::{Collector, DEFAULT_DMI_PATH, RealFs};
use hostprobe::runtime::{force_purge, runtime_stats};
use hostprobe::util::{is_private_ip, is_public_ip};

/// Host introspection tool.
#[derive(Parser)]
#[command(name = "hostprobe", about = "Host introspection tool", version)]
struct Args {
    /// Path to /proc filesystem (for testing/mocking).
    #[arg(long, default_value = "/proc", global = true)]
    proc_path: String,

    /// Directory holding DMI identity files.
    #[arg(long, default_value = DEFAULT_DMI_PATH, global = true)]
    dmi_path: String,

    /// Mount point whose usage is reported in the snapshot.
    #[arg(long, default_value = "/", global = true)]
    disk_path: String,

    /// Indent JSON output.
    #[arg(long, global = true)]
    pretty: bool,

    /// Increase logging verbosity (-v info, -vv debug, -vvv trace). Default is warn level.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Quiet mode - only show errors.
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Host load snapshot (CPU, memory, disk, allocator counters).
    Snapshot,
    /// CPU topology from /proc/cpuinfo.
    Cpu,
    /// BIOS identity.
    Bios,
    /// Mainboard identity.
    Board,
    /// Pid listening on a port (0 when unknown).
    Port {
        port: u16,
    },
    /// Every listening socket with its owner.
    Listeners,
    /// Private/public classification of an IP address.
    Ip {
        address: String,
    },
    /// Return unused allocator memory to the OS and print the counters.
    Purge,
}

/// Initializes the tracing subscriber with the appropriate log level.
/// Logs go to stderr so stdout stays valid JSON.
fn init_logging(verbose: u8, quiet: bool) {
    let level = if quiet {
        Level::ERROR
    } else {
        match verbose {
            0 => Level::WARN,
            1 => Level::INFO,
            2 => Level::DEBUG,
            _ => Level::TRACE,
        }
    };

    let mut filter = EnvFilter::from_default_env();
    if let Ok(directive) = format!("hostprobe={}", level).parse() {
        filter = filter.add_directive(directive);
    }

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn print_json<T: Serialize>(value: &T, pretty: bool) {
    let rendered = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    };

    match rendered {
        Ok(s) => println!("{}", s),
        Err(e) => {
            eprintln!("Error serializing output: {e}");
            std::process::exit(1);
        }
    }
}

fn main() {
    let args = Args::parse();
    init_logging(args.verbose, args.quiet);

    debug!(
        "Config: proc={}, dmi={}, disk={}",
        args.proc_path, args.dmi_path, args.disk_path
    );

    let mut collector = Collector::new(RealFs::new(), &args.proc_path)
        .with_dmi_path(&args.dmi_path)
        .with_disk_path(&args.disk_path);

    match args.command {
        Command::Snapshot => {
            let snapshot = collector.collect_snapshot();
            print_json(&snapshot, args.pretty);
        }
        Command::Cpu => print_json(&collector.cpu_topology(), args.pretty),
        Command::Bios => print_json(&collector.bios(), args.pretty),
        Command::Board => print_json(&collector.board(), args.pretty),
        Command::Port { port } => {
            let pid = collector.pid_by_port(port);
            let exe = pid.and_then(|pid| collector.exec_path(pid));
            info!("port {} owner: {:?}", port, pid);
            print_json(
                &json!({
                    "port": port,
                    "pid": pid.unwrap_or(0),
                    "exe": exe.map(|p| p.display().to_string()),
                }),
                args.pretty,
            );
        }
        Command::Listeners => {
            let listeners: Vec<_> = collector
                .listeners()
                .into_iter()
                .map(|(record, pid)| {
                    json!({
                        "protocol": record.protocol,
                        "port": record.local_port,
                        "inode": record.inode,
                        "pid": pid.unwrap_or(0),
                    })
                })
                .collect();
            print_json(&listeners, args.pretty);
        }
        Command::Ip { address } => match is_private_ip(&address) {
            Ok(private) => {
                let public = address.parse::<IpAddr>().is_ok_and(is_public_ip);
                print_json(
                    &json!({
                        "address": address,
                        "private": private,
                        "public": public,
                    }),
                    args.pretty,
                );
            }
            Err(e) => {
                eprintln!("Error: {address}: {e}");
                std::process::exit(1);
            }
        },
        Command::Purge => {
            force_purge();
            print_json(&runtime_stats(), args.pretty);
        }
    }
}
