//! # Live Feed Test
//!
//! Fetches one GTFS-Realtime `VehiclePositions` payload through lib_common and
//! prints what the decoder makes of it.

use clap::Parser;
use lib_common::core::{FeedDecoder, FeedSource, Snapshot};
use lib_common::retrieve::ClientOptions;
use lib_common::transit::{GtfsRealtimeDecoder, HttpFeedSource};

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// Feed URL
    #[clap(long, env = "TRANSIT_FEED_URL", default_value = "https://otd.delhi.gov.in/api/realtime/VehiclePositions.pb")]
    feed_url: String,

    /// API key sent as the `key` query parameter
    #[clap(long, env = "TRANSIT_API_KEY", hide_env_values = true)]
    api_key: String,

    /// Records to print
    #[clap(short, long, default_value_t = 5)]
    show: usize,
}

/// Executes the live fetch.
///
/// // Statement: Prints a summary and the first records to stdout on success.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let args = Args::parse();

    // // Statement: One attempt, no retries, so failures show up as they are
    let options = ClientOptions {
        max_retries: 0,
        ..ClientOptions::default()
    };
    let source = HttpFeedSource::new(&args.feed_url, args.api_key, &options)?;

    println!("[*] Requesting live data from {} ...", args.feed_url);

    let bytes = match source.fetch().await {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("\n[ERROR] Fetch failed:");
            eprintln!(">>> {}", e);
            std::process::exit(1);
        }
    };

    match GtfsRealtimeDecoder::new().decode(&bytes) {
        Ok(decoded) => {
            let snapshot = Snapshot::new(decoded.records, 1, chrono::Utc::now(), decoded.feed_timestamp);
            println!("\n[SUCCESS] {} bytes, {} vehicles", bytes.len(), snapshot.len());
            println!("-----------------------------------------------");
            for record in snapshot.records.iter().take(args.show) {
                println!("{}", serde_json::to_string(record)?);
            }
            println!("-----------------------------------------------");
            println!("[INFO] Feed timestamp: {:?}", snapshot.feed_timestamp);
        }
        Err(e) => {
            eprintln!("\n[ERROR] Decode failed:");
            eprintln!(">>> {}", e);
            std::process::exit(1);
        }
    }

    Ok(())
}
