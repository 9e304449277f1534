//! Sample Application Generator
//!
//! Writes random, valid loan applications as JSON lines to stdout, for
//! feeding the batch scorer.
//!
//! Usage: sample-applications [COUNT] [LOW_FICO_RATE] [SEED]

use loan_risk_pipeline::ApplicationRecord;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::io::{BufWriter, Write};
use tracing::info;

const PURPOSES: [&str; 7] = [
    "debt_consolidation",
    "credit_card",
    "home_improvement",
    "major_purchase",
    "small_business",
    "car",
    "medical",
];
const HOME_OWNERSHIP: [&str; 4] = ["RENT", "OWN", "MORTGAGE", "OTHER"];
const VERIFICATION: [&str; 3] = ["Not Verified", "Source Verified", "Verified"];
const DEFAULT_LOW_FICO_RATE: f64 = 0.2;
const STATES: [&str; 8] = ["CA", "TX", "NY", "FL", "IL", "PA", "OH", "GA"];

/// Application generator for testing
struct ApplicationGenerator {
    rng: StdRng,
}

impl ApplicationGenerator {
    fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self { rng }
    }

    /// Generate an applicant with a typical credit profile
    fn generate_prime(&mut self) -> ApplicationRecord {
        let fico_low = self.rng.gen_range(66..=84) as f64 * 10.0;
        self.generate(fico_low, 15.0..90.0, 0.0..30.0)
    }

    /// Generate an applicant with a thin or damaged credit profile
    fn generate_subprime(&mut self) -> ApplicationRecord {
        let fico_low = self.rng.gen_range(58..66) as f64 * 10.0;
        self.generate(fico_low, 12.0..45.0, 20.0..45.0)
    }

    fn generate(
        &mut self,
        fico_low: f64,
        income_k: std::ops::Range<f64>,
        dti: std::ops::Range<f64>,
    ) -> ApplicationRecord {
        let term = if self.rng.gen_bool(0.25) {
            "60 months"
        } else {
            "36 months"
        };
        let application_type = if self.rng.gen_bool(0.05) {
            "Joint App"
        } else {
            "Individual"
        };

        ApplicationRecord {
            loan_amnt: (self.rng.gen_range(1000.0..40000.0_f64) / 25.0).round() * 25.0,
            term: term.to_string(),
            purpose: self.random_choice(&PURPOSES).to_string(),
            annual_inc: (self.rng.gen_range(income_k) * 1000.0).round(),
            emp_length: self.rng.gen_range(0..=10) as f64,
            home_ownership: self.random_choice(&HOME_OWNERSHIP).to_string(),
            verification_status: self.random_choice(&VERIFICATION).to_string(),
            application_type: application_type.to_string(),
            addr_state: self.random_choice(&STATES).to_string(),
            dti: (self.rng.gen_range(dti) * 100.0).round() / 100.0,
            fico_range_low: fico_low,
            fico_range_high: fico_low + 4.0,
        }
    }

    fn random_choice<'a>(&mut self, choices: &[&'a str]) -> &'a str {
        choices[self.rng.gen_range(0..choices.len())]
    }
}

/// Share of low-FICO applicants, clamped to [0, 1]; missing, malformed or
/// non-finite input falls back to the default
fn parse_rate(arg: Option<&str>) -> f64 {
    arg.and_then(|s| s.parse::<f64>().ok())
        .filter(|rate| rate.is_finite())
        .unwrap_or(DEFAULT_LOW_FICO_RATE)
        .clamp(0.0, 1.0)
}

fn main() -> anyhow::Result<()> {
    // Logs go to stderr; stdout carries the generated records
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("sample_applications=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();
    let count: u64 = args.get(1).and_then(|s| s.parse().ok()).unwrap_or(100);
    let low_fico_rate = parse_rate(args.get(2).map(|s| s.as_str()));
    let seed: Option<u64> = args.get(3).and_then(|s| s.parse().ok());

    info!(
        count = count,
        low_fico_rate = low_fico_rate,
        seed = ?seed,
        "Generating sample applications"
    );

    let mut generator = ApplicationGenerator::new(seed);
    let mut coin = StdRng::seed_from_u64(seed.unwrap_or(0).wrapping_add(1));
    let mut out = BufWriter::new(std::io::stdout().lock());

    let mut subprime_count = 0;
    for _ in 0..count {
        let application = if coin.gen_bool(low_fico_rate) {
            subprime_count += 1;
            generator.generate_subprime()
        } else {
            generator.generate_prime()
        };

        serde_json::to_writer(&mut out, &application)?;
        out.write_all(b"\n")?;
    }
    out.flush()?;

    info!(
        "Completed! Generated {} applications ({} prime, {} low FICO)",
        count,
        count - subprime_count,
        subprime_count
    );

    Ok(())
}
