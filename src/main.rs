use anyhow::Context;
use clap::{Parser, Subcommand};
use pulsar_mbus::constants::MBUS_CONTROL_INFO_RESP_VARIABLE;
use pulsar_mbus::payload::parse_variable_payload;
use pulsar_mbus::{
    init_logger, parse_frame, MBusFrameType, MeterAddress, MeterPoller, PollerConfig, RecordMap,
    SerialTransport,
};
use std::time::Duration;

#[derive(Parser)]
#[command(name = "pulsar-cli")]
#[command(about = "Poll Pulsar heat meters over wired M-Bus")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Poll the configured meters and print readings as JSON
    Poll {
        /// Serial port path, e.g. /dev/ttyUSB0
        #[arg(short, long)]
        port: String,
        /// Comma-separated hex meter addresses, e.g. 79,82,22
        #[arg(short, long, value_delimiter = ',')]
        addresses: Vec<String>,
        /// Repeat every N seconds instead of polling once
        #[arg(short, long)]
        interval: Option<u64>,
    },
    /// Decode a hex-encoded frame and dump its records
    Decode {
        /// Frame bytes as hex, spaces allowed
        hex: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logger();

    let cli = Cli::parse();
    match cli.command {
        Commands::Poll {
            port,
            addresses,
            interval,
        } => {
            let addresses = addresses
                .iter()
                .map(|s| s.parse::<MeterAddress>())
                .collect::<Result<Vec<_>, _>>()
                .context("parsing meter addresses")?;
            let config = PollerConfig {
                port,
                addresses,
                poll_interval_secs: interval,
                record_map: RecordMap::default(),
            };

            let transport = SerialTransport::connect(&config.port)
                .await
                .with_context(|| format!("opening serial port {}", config.port))?;
            let mut poller =
                MeterPoller::new(transport, config.addresses.clone(), config.record_map.clone());

            loop {
                let readings = poller.poll_all().await?;
                println!("{}", serde_json::to_string_pretty(&readings)?);
                match config.poll_interval_secs {
                    Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
                    None => break,
                }
            }
        }
        Commands::Decode { hex } => {
            let bytes = hex::decode(hex.replace(' ', "")).context("invalid hex input")?;
            let frame = parse_frame(&bytes)?;
            println!("{frame:#?}");
            if frame.frame_type == MBusFrameType::Long
                && frame.control_information == MBUS_CONTROL_INFO_RESP_VARIABLE
            {
                let (header, records) = parse_variable_payload(&frame.data)?;
                println!("{header:#?}");
                for record in records {
                    println!(
                        "record {}: {:?} {} ({})",
                        record.index, record.value, record.unit, record.quantity
                    );
                }
            }
        }
    }

    Ok(())
}
