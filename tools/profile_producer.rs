//! Test Profile Producer
//!
//! Generates synthetic score requests and publishes them to NATS for load
//! testing the worker.
//!
//! ```text
//! profile-producer [nats_url] [subject] [count] [fake_rate] [delay_ms]
//! ```

use fake_profile_detector::types::{ProfileAttributes, ScoreRequest};
use rand::Rng;
use std::time::Duration;
use tracing::{info, warn};

const FIRST_NAMES: [&str; 12] = [
    "james", "maria", "ahmed", "sofia", "li", "olga", "daniel", "emma", "kenji", "fatima",
    "lucas", "anna",
];
const LANGUAGES: [&str; 6] = ["en", "es", "pt-BR", "fr", "de", "tr"];

/// Synthetic profile generator
struct ProfileGenerator {
    rng: rand::rngs::ThreadRng,
    request_counter: u64,
}

impl ProfileGenerator {
    fn new() -> Self {
        Self {
            rng: rand::thread_rng(),
            request_counter: 0,
        }
    }

    fn next_request_id(&mut self) -> String {
        self.request_counter += 1;
        format!("req_{:012}", self.request_counter)
    }

    /// An established account with balanced activity
    fn generate_genuine(&mut self) -> ScoreRequest {
        let request_id = self.next_request_id();
        let name = self.random_choice(&FIRST_NAMES);
        let followers: u64 = self.rng.gen_range(50..5_000);

        let profile = ProfileAttributes::new()
            .with_user_id(&format!("{}_{}", name, self.rng.gen_range(1..9999)))
            .with_name(&capitalize(name))
            .with_statuses(self.rng.gen_range(200..20_000u64))
            .with_followers(followers)
            .with_friends(self.rng.gen_range(followers / 2..followers * 2 + 1))
            .with_favourites(self.rng.gen_range(100..30_000u64))
            .with_listed(self.rng.gen_range(0..50u64))
            .with_description_length(self.rng.gen_range(20..160u64))
            .with_profile_image(true)
            .with_private(self.rng.gen_bool(0.2))
            .with_verified(self.rng.gen_bool(0.02))
            .with_language(self.random_choice(&LANGUAGES))
            .with_account_age_days(self.rng.gen_range(365..4_000u64));

        ScoreRequest {
            request_id,
            profile,
            models: None,
        }
    }

    /// A young account with a bought audience or a follow-spam pattern
    fn generate_fake(&mut self) -> ScoreRequest {
        let request_id = self.next_request_id();
        let bought_followers = self.rng.gen_bool(0.5);
        let (followers, friends) = if bought_followers {
            (self.rng.gen_range(2_000..50_000u64), self.rng.gen_range(0..20u64))
        } else {
            (self.rng.gen_range(0..30u64), self.rng.gen_range(1_000..7_500u64))
        };

        let mut profile = ProfileAttributes::new()
            .with_user_id(&format!("user{:08}", self.rng.gen::<u32>()))
            .with_statuses(self.rng.gen_range(0..15u64))
            .with_followers(followers)
            .with_friends(friends)
            .with_favourites(self.rng.gen_range(0..10u64))
            .with_listed(0u64)
            .with_description_length(self.rng.gen_range(0..10u64))
            .with_profile_image(self.rng.gen_bool(0.3))
            .with_private(false)
            .with_verified(false)
            .with_account_age_days(self.rng.gen_range(1..60u64));

        // Form clients often send counts as strings
        if self.rng.gen_bool(0.3) {
            profile = profile.with_followers(followers.to_string().as_str());
        }

        ScoreRequest {
            request_id,
            profile,
            models: None,
        }
    }

    fn random_choice<'a>(&mut self, choices: &[&'a str]) -> &'a str {
        choices[self.rng.gen_range(0..choices.len())]
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("profile_producer=info".parse()?),
        )
        .init();

    info!("Starting Test Profile Producer");

    let args: Vec<String> = std::env::args().collect();
    let nats_url = args.get(1).map(|s| s.as_str()).unwrap_or("nats://localhost:4222");
    let subject = args.get(2).map(|s| s.as_str()).unwrap_or("profiles.score");
    let count: u64 = args.get(3).and_then(|s| s.parse().ok()).unwrap_or(100);
    let fake_rate: f64 = args
        .get(4)
        .and_then(|s| s.parse().ok())
        .unwrap_or(0.3f64)
        .clamp(0.0, 1.0);
    let delay_ms: u64 = args.get(5).and_then(|s| s.parse().ok()).unwrap_or(100);

    info!(
        nats_url = %nats_url,
        subject = %subject,
        count = count,
        fake_rate = fake_rate,
        delay_ms = delay_ms,
        "Configuration loaded"
    );

    let client = match async_nats::connect(nats_url).await {
        Ok(c) => {
            info!("Connected to NATS");
            c
        }
        Err(e) => {
            warn!(error = %e, "Failed to connect to NATS. Running in dry-run mode.");
            return run_dry_mode(count, fake_rate, delay_ms).await;
        }
    };

    let mut generator = ProfileGenerator::new();
    let mut rng = rand::thread_rng();

    info!("Starting to publish {} profiles...", count);

    let mut genuine_count = 0;
    let mut fake_count = 0;

    for i in 0..count {
        let request = if rng.gen_bool(fake_rate) {
            fake_count += 1;
            generator.generate_fake()
        } else {
            genuine_count += 1;
            generator.generate_genuine()
        };

        let payload = serde_json::to_vec(&request)?;
        client.publish(subject.to_string(), payload.into()).await?;

        if (i + 1) % 10 == 0 {
            info!(
                "Published {}/{} profiles ({} genuine, {} fake)",
                i + 1,
                count,
                genuine_count,
                fake_count
            );
        }

        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
    }

    client.flush().await?;
    info!(
        "Completed! Published {} profiles ({} genuine, {} fake)",
        count, genuine_count, fake_count
    );

    Ok(())
}

async fn run_dry_mode(count: u64, fake_rate: f64, delay_ms: u64) -> anyhow::Result<()> {
    info!("Running in dry-run mode (no NATS connection)");

    let mut generator = ProfileGenerator::new();
    let mut rng = rand::thread_rng();

    for i in 0..count {
        let request = if rng.gen_bool(fake_rate) {
            generator.generate_fake()
        } else {
            generator.generate_genuine()
        };

        let json = serde_json::to_string_pretty(&request)?;

        if (i + 1) % 10 == 0 || i == 0 {
            info!("Sample request {}:\n{}", i + 1, json);
        }

        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
    }

    Ok(())
}
