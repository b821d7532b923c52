use chrono::{Duration, Utc};
use clap::Parser;
use futures_util::StreamExt;
use serde::Deserialize;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::time::sleep;
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message};

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// WebSocket endpoint of a running server_transit
    #[clap(long, default_value = "ws://127.0.0.1:5001/ws")]
    url: String,

    /// Report interval in minutes
    #[clap(short, long, default_value_t = 1)]
    report_interval_minutes: u64,
}

#[derive(Debug, Deserialize)]
struct VehicleUpdate {
    #[serde(rename = "type")]
    msg_type: String,
    sequence: u64,
    records: Vec<serde_json::Value>,
}

#[derive(Default)]
struct Stats {
    frame_timestamps: VecDeque<chrono::DateTime<Utc>>,
    last_sequence: u64,
    last_vehicles: usize,
    skipped_sequences: u64,
    out_of_order: u64,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    let stats = Arc::new(Mutex::new(Stats::default()));

    // Clone for the reporter task
    let stats_reporter = Arc::clone(&stats);
    let report_interval_seconds = args.report_interval_minutes * 60;
    tokio::spawn(async move {
        loop {
            sleep(std::time::Duration::from_secs(report_interval_seconds)).await;
            let one_minute_ago = Utc::now() - Duration::minutes(1);

            let mut data = stats_reporter.lock().unwrap();
            while data.frame_timestamps.front().is_some_and(|&t| t < one_minute_ago) {
                data.frame_timestamps.pop_front();
            }

            println!("\n----- 1-Minute Summary -----");
            println!("Frames: {} /min", data.frame_timestamps.len());
            println!("Last sequence: {} ({} vehicles)", data.last_sequence, data.last_vehicles);
            println!("Skipped sequences: {}", data.skipped_sequences);
            println!("Out of order: {}", data.out_of_order);
            println!("----------------------------\n");
        }
    });

    println!("Connecting to {}...", args.url);
    let (ws_stream, _) = connect_async(args.url.as_str()).await.expect("Failed to connect");
    let (_write, mut read) = ws_stream.split();
    println!("Connected. Press Ctrl+C to stop.");

    while let Some(Ok(msg)) = read.next().await {
        let Message::Text(text) = msg else { continue };
        let Ok(update) = serde_json::from_str::<VehicleUpdate>(&text) else { continue };
        if update.msg_type != "vehicle_update" {
            continue;
        }

        let mut data = stats.lock().unwrap();
        data.frame_timestamps.push_back(Utc::now());
        if data.last_sequence != 0 {
            if update.sequence <= data.last_sequence {
                data.out_of_order += 1;
            } else {
                // Every install reaches every live subscriber
                data.skipped_sequences += update.sequence - data.last_sequence - 1;
            }
        }
        data.last_sequence = data.last_sequence.max(update.sequence);
        data.last_vehicles = update.records.len();
    }

    println!("Connection closed.");
}
