//! Probe a single host with the ICMP engine
//!
//! Usage: cargo run --example watch_host -- 192.168.0.1
//!
//! Note: The engine uses a RAW ICMP socket, so this needs CAP_NET_RAW or
//! root.

use netwatch_monitor::icmp::{Controller, Outcome, Worker};
use std::net::IpAddr;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let target: IpAddr = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "127.0.0.1".to_string())
        .parse()?;

    let controller = Controller::new();
    let mut worker = Worker::new(&controller);

    println!(
        "Probing {} (timeout {:?}, interval {:?})",
        target,
        worker.timeout(),
        worker.interval()
    );

    let report = worker.probe(target).await?;
    match report.outcome {
        Outcome::EchoReply { rtt } => {
            println!(
                "✓ Reply from {}: time={:.2}ms",
                report.from,
                rtt.as_secs_f64() * 1000.0
            );
        }
        other => {
            println!("✗ {}: {}", other, other.status().summary);
        }
    }

    Ok(())
}
