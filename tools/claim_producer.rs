//! Test Claim Producer
//!
//! Generates synthetic insurance claims and publishes them to NATS for
//! pipeline testing. Suspicious claims are issued in small rings that share
//! a phone number, an address and a medical provider so the network
//! analyzer has something to find.

use chrono::{Duration as ChronoDuration, Utc};
use claim_fraud_engine::types::{Claim, Vertical};
use rand::Rng;
use std::time::Duration;
use tracing::{info, warn};

const FIRST_NAMES: &[&str] = &["John", "Maria", "Wei", "Aisha", "Carlos", "Emma", "Noah", "Priya"];
const LAST_NAMES: &[&str] = &["Smith", "Garcia", "Chen", "Khan", "Lopez", "Brown", "Miller", "Patel"];
const STREETS: &[&str] = &["Oak St", "Maple Ave", "Pine Rd", "Cedar Ln", "Elm Dr", "Birch Way"];
const CITIES: &[&str] = &["Springfield", "Riverton", "Fairview", "Lakeside", "Greenville"];
const PROVIDERS: &[&str] = &[
    "Riverside Family Clinic",
    "Metro Orthopedics",
    "Northside Physical Therapy",
    "St. Anne Medical Center",
    "Valley Chiropractic",
];

const LEGITIMATE_INCIDENTS: &[&str] = &[
    "Rear-ended at a red light on the highway during evening traffic. Police report filed at the scene.",
    "Hail storm damaged the roof and hood while the car was parked outside the office.",
    "Slid on ice into a guard rail while driving to work. No other vehicles involved.",
    "Backed into a pole in a parking garage, damaging the rear bumper.",
];

const RING_INCIDENTS: &[&str] = &[
    "Sudden stop by the vehicle in front caused a collision at low speed. All passengers reported neck and back pain the following day.",
    "Another car swerved into our lane and braked hard. No police report was filed. Passengers began treatment at the same clinic.",
    "Minor collision in a parking lot at night with no witnesses. Soft tissue injuries reported by all occupants.",
];

/// Identity shared by every member of a ring
struct Ring {
    phone: String,
    address: String,
    provider: String,
    remaining: u32,
}

/// Claim generator for testing
struct ClaimGenerator {
    rng: rand::rngs::ThreadRng,
    claim_counter: u64,
    ring: Option<Ring>,
}

impl ClaimGenerator {
    fn new() -> Self {
        Self {
            rng: rand::thread_rng(),
            claim_counter: 0,
            ring: None,
        }
    }

    fn next_id(&mut self) -> String {
        self.claim_counter += 1;
        format!("CLM-{:08}", self.claim_counter)
    }

    fn random_phone(&mut self) -> String {
        format!(
            "({}) 555-{:04}",
            self.rng.gen_range(200..999),
            self.rng.gen_range(0..10000)
        )
    }

    fn random_address(&mut self) -> String {
        let number = self.rng.gen_range(10..9999);
        let street = self.random_choice(STREETS);
        let city = self.random_choice(CITIES);
        format!("{} {}, {}", number, street, city)
    }

    fn random_name(&mut self) -> String {
        let first = self.random_choice(FIRST_NAMES);
        let last = self.random_choice(LAST_NAMES);
        format!("{} {}", first, last)
    }

    fn random_vin(&mut self) -> String {
        const VIN_CHARS: &[u8] = b"ABCDEFGHJKLMNPRSTUVWXYZ0123456789";
        (0..17)
            .map(|_| VIN_CHARS[self.rng.gen_range(0..VIN_CHARS.len())] as char)
            .collect()
    }

    fn incident_date(&mut self) -> String {
        let days_ago = self.rng.gen_range(1..60);
        (Utc::now() - ChronoDuration::days(days_ago))
            .format("%Y-%m-%d")
            .to_string()
    }

    /// Generate a random legitimate claim
    fn generate_legitimate(&mut self) -> Claim {
        let claim_id = self.next_id();
        let coverage = self.rng.gen_range(20_000.0..100_000.0_f64).round();
        let amount = self.rng.gen_range(500.0..8_000.0_f64).round();
        let name = self.random_name();
        let phone = self.random_phone();
        let address = self.random_address();
        let vin = self.random_vin();
        let date = self.incident_date();
        let description = self.random_choice(LEGITIMATE_INCIDENTS);

        Claim::new(claim_id.clone(), Vertical::Auto)
            .with_field("claimant.name", name)
            .with_field("claimant.phone", phone)
            .with_field("claimant.address", address)
            .with_field("policy.number", format!("POL-{}", self.rng.gen_range(100_000..999_999)))
            .with_field("policy.coverage_amount", coverage)
            .with_field("claim.amount", amount)
            .with_field("claim.type", "collision")
            .with_field("incident.description", description)
            .with_field("incident.date", date)
            .with_field("vehicle.vin", vin)
            .with_image(format!("https://claims.example.com/{}/front.jpg", claim_id))
    }

    /// Generate a claim belonging to a ring of linked claimants
    fn generate_suspicious(&mut self) -> Claim {
        if self.ring.as_ref().map_or(true, |ring| ring.remaining == 0) {
            let phone = self.random_phone();
            let address = self.random_address();
            let provider = self.random_choice(PROVIDERS).to_string();
            let size = self.rng.gen_range(3..6);
            self.ring = Some(Ring {
                phone,
                address,
                provider,
                remaining: size,
            });
        }

        let claim_id = self.next_id();
        let coverage = self.rng.gen_range(10_000.0..30_000.0_f64).round();
        // Amounts close to or above the policy limit
        let amount = (coverage * self.rng.gen_range(0.9..1.3)).round();
        let costs = (amount * self.rng.gen_range(0.5..1.4)).round();
        let name = self.random_name();
        let vin = self.random_vin();
        let date = self.incident_date();
        let description = self.random_choice(RING_INCIDENTS);

        let (phone, address, provider) = match self.ring.as_mut() {
            Some(ring) => {
                ring.remaining -= 1;
                (ring.phone.clone(), ring.address.clone(), ring.provider.clone())
            }
            None => (String::new(), String::new(), String::new()),
        };

        Claim::new(claim_id.clone(), Vertical::Auto)
            .with_field("claimant.name", name)
            .with_field("claimant.phone", phone)
            .with_field("claimant.address", address)
            .with_field("policy.number", format!("POL-{}", self.rng.gen_range(100_000..999_999)))
            .with_field("policy.coverage_amount", coverage)
            .with_field("claim.amount", amount)
            .with_field("claim.type", "bodily_injury")
            .with_field("incident.description", description)
            .with_field("incident.date", date)
            .with_field("medical.providers", vec![provider])
            .with_field("medical.costs", costs)
            .with_field("medical.injuries", vec!["whiplash", "lower back strain"])
            .with_field("vehicle.vin", vin)
            .with_image(format!("https://claims.example.com/{}/damage.jpg", claim_id))
    }

    fn random_choice<'a>(&mut self, choices: &[&'a str]) -> &'a str {
        choices[self.rng.gen_range(0..choices.len())]
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("claim_producer=info".parse()?),
        )
        .init();

    info!("Starting Test Claim Producer");

    // Parse arguments
    let args: Vec<String> = std::env::args().collect();
    let nats_url = args.get(1).map(|s| s.as_str()).unwrap_or("nats://localhost:4222");
    let subject = args.get(2).map(|s| s.as_str()).unwrap_or("claims.submitted");
    let count: u64 = args.get(3).and_then(|s| s.parse().ok()).unwrap_or(50);
    let fraud_rate: f64 = args.get(4).and_then(|s| s.parse().ok()).unwrap_or(0.2);
    let delay_ms: u64 = args.get(5).and_then(|s| s.parse().ok()).unwrap_or(500);
    let fraud_rate = fraud_rate.clamp(0.0, 1.0);

    info!(
        nats_url = %nats_url,
        subject = %subject,
        count = count,
        fraud_rate = fraud_rate,
        delay_ms = delay_ms,
        "Configuration loaded"
    );

    // Connect to NATS
    let client = match async_nats::connect(nats_url).await {
        Ok(c) => {
            info!("Connected to NATS");
            c
        }
        Err(e) => {
            warn!(error = %e, "Failed to connect to NATS. Running in dry-run mode.");
            return run_dry_mode(count, fraud_rate, delay_ms).await;
        }
    };

    let mut generator = ClaimGenerator::new();
    let mut rng = rand::thread_rng();

    info!("Starting to publish {} claims...", count);

    let mut legitimate_count = 0;
    let mut suspicious_count = 0;

    for i in 0..count {
        let claim = if rng.gen_bool(fraud_rate) {
            suspicious_count += 1;
            generator.generate_suspicious()
        } else {
            legitimate_count += 1;
            generator.generate_legitimate()
        };

        let payload = serde_json::to_vec(&claim)?;
        client.publish(subject.to_string(), payload.into()).await?;

        if (i + 1) % 10 == 0 {
            info!(
                "Published {}/{} claims ({} legitimate, {} suspicious)",
                i + 1,
                count,
                legitimate_count,
                suspicious_count
            );
        }

        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
    }

    client.flush().await?;
    info!(
        "Completed! Published {} claims ({} legitimate, {} suspicious)",
        count, legitimate_count, suspicious_count
    );

    Ok(())
}

async fn run_dry_mode(count: u64, fraud_rate: f64, delay_ms: u64) -> anyhow::Result<()> {
    info!("Running in dry-run mode (no NATS connection)");

    let mut generator = ClaimGenerator::new();
    let mut rng = rand::thread_rng();

    for i in 0..count {
        let claim = if rng.gen_bool(fraud_rate) {
            generator.generate_suspicious()
        } else {
            generator.generate_legitimate()
        };

        let json = serde_json::to_string_pretty(&claim)?;

        if (i + 1) % 10 == 0 || i == 0 {
            info!("Sample claim {}:\n{}", i + 1, json);
        }

        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
    }

    Ok(())
}
