use anyhow::{Context, Result};
use clap::Parser;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing::level_filters::LevelFilter;

use sr_lab_abstract::{ProtocolOverride, SimConfig, TestScenario};
use sr_lab_protocol::ArqConfig;
use sr_lab_simulator::{SimulationReport, Simulator, scenario_runner, validate_config};

#[derive(Parser, Debug)]
#[command(author, version, about = "Selective-Repeat ARQ over an emulated lossy channel")]
struct Args {
    /// Run a scenario from disk instead of a generated workload.
    #[arg(long)]
    scenario: Option<PathBuf>,

    /// Number of messages to generate.
    #[arg(long, short = 'n')]
    messages: Option<u32>,

    /// Packet loss probability.
    #[arg(long)]
    loss: Option<f64>,

    /// Packet corruption probability.
    #[arg(long)]
    corrupt: Option<f64>,

    /// Mean time between messages from the application layer.
    #[arg(long)]
    interval: Option<u64>,

    #[arg(long)]
    seed: Option<u64>,

    /// Use the classic window 6 / sequence space 8 constants.
    #[arg(long, default_value_t = false)]
    classic: bool,

    #[arg(long)]
    window: Option<u32>,
    #[arg(long)]
    seq_space: Option<u32>,

    /// Retransmission timeout (RTT) in simulated time units.
    #[arg(long)]
    timeout: Option<u64>,

    /// Write a JSON trace of the finished simulation.
    #[arg(long)]
    trace_out: Option<PathBuf>,

    /// Increase log verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);
    info!("sr-lab starting…");

    let scenario = args
        .scenario
        .as_deref()
        .map(scenario_runner::load_scenario)
        .transpose()?;

    let arq = args.protocol_config(scenario.as_ref());
    let (sender, receiver) =
        sr_lab_protocol::pair(arq).context("Invalid protocol configuration")?;

    let report = match &scenario {
        Some(scenario) => scenario_runner::run_scenario(scenario, sender, receiver)?,
        None => {
            let config = args.sim_config();
            validate_config(&config)?;
            let mut sim = Simulator::new(config.clone(), sender, receiver);
            sim.schedule_generated_messages(config.message_count, config.message_interval, 0);
            info!("Starting headless simulation…");
            sim.run_until_complete();
            info!("Simulation complete.");
            sim.export_report()
        }
    };

    print_summary(&arq, &report);

    if let Some(trace_path) = &args.trace_out {
        write_trace(trace_path, &report)?;
    }

    Ok(())
}

impl Args {
    fn protocol_config(&self, scenario: Option<&TestScenario>) -> ArqConfig {
        let mut over = scenario
            .map(|s| s.protocol.clone())
            .unwrap_or_default();
        over.classic |= self.classic;
        let cli = ProtocolOverride {
            window_size: self.window.or(over.window_size),
            seq_space: self.seq_space.or(over.seq_space),
            timeout: self.timeout.or(over.timeout),
            ..over
        };
        ArqConfig::from_override(&cli)
    }

    fn sim_config(&self) -> SimConfig {
        let mut config = SimConfig::default();
        if let Some(v) = self.messages {
            config.message_count = v;
        }
        if let Some(v) = self.loss {
            config.loss_rate = v;
        }
        if let Some(v) = self.corrupt {
            config.corrupt_rate = v;
        }
        if let Some(v) = self.interval {
            config.message_interval = v;
        }
        if let Some(v) = self.seed {
            config.seed = v;
        }
        config
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        2 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };
    tracing_subscriber::fmt().with_max_level(level).init();
}

fn print_summary(arq: &ArqConfig, report: &SimulationReport) {
    let c = &report.counters;
    println!(
        "Simulator terminated at time {} after {} messages from the application layer",
        report.duration,
        report.accepted_data.len() as u32 + report.rejected_sends
    );
    println!(
        "protocol: selective repeat (window {}, sequence space {}, timeout {})",
        arq.window_size, arq.seq_space, arq.timeout
    );
    println!("  messages accepted:            {}", report.accepted_data.len());
    println!("  messages refused (window):    {}", c.window_full);
    println!("  packets sent by sender:       {}", report.sender_packet_count);
    println!("  packets resent:               {}", c.packets_resent);
    println!("  packets received (new):       {}", c.packets_received);
    println!("  ACKs received (uncorrupted):  {}", c.total_acks_received);
    println!("  new ACKs:                     {}", c.new_acks);
    println!("  duplicate/stale ACKs:         {}", c.duplicate_acks);
    println!("  corrupted packets detected:   {}", c.corrupted_packets);
    println!("  max packets in flight:        {}", report.max_in_flight);
    println!(
        "channel: {} packets, {} lost, {} corrupted, {} delivered to application",
        report.channel.to_channel,
        report.channel.lost,
        report.channel.corrupted,
        report.channel.delivered
    );
    println!(
        "delivery: {}",
        if report.delivered_in_order() {
            "complete and in order"
        } else {
            "INCOMPLETE or out of order"
        }
    );
}

fn write_trace(path: &Path, report: &SimulationReport) -> Result<()> {
    let data = serde_json::to_vec_pretty(report).context("Failed to serialize simulation trace")?;
    fs::write(path, &data)
        .with_context(|| format!("Failed to write trace file {}", path.display()))?;
    Ok(())
}
