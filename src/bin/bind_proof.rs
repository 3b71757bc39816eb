use anyhow::{ensure, Context, Result};
use clap::Parser;
use serde::Serialize;

use meter_ledger::constants::proof::{ENCRYPTED_READING_LEN, PUBLIC_KEY_LEN};
use meter_ledger::models::ProofSubmission;
use meter_ledger::services::proof_ledger::bind_proof;

/// Build a proof blob that the commitment-binding verifier accepts.
#[derive(Parser)]
#[command(
    name = "bind_proof",
    about = "Bind a disclosed meter reading to its encrypted commitment"
)]
struct Cli {
    /// Circuit id the ledger currently accepts
    #[arg(long)]
    circuit_id: u32,

    /// Cumulative reading being disclosed
    #[arg(long)]
    disclosed_reading: u64,

    /// Encrypted reading commitment, hex
    #[arg(long)]
    encrypted_reading: String,

    /// Submitter public key registered with the ledger, hex
    #[arg(long)]
    public_key: Option<String>,

    /// Print a complete submission body for POST /api/v1/submissions
    #[arg(long)]
    json: bool,

    #[arg(long)]
    nonce: Option<u64>,

    /// Block height the proof was generated at
    #[arg(long)]
    generated_at: Option<u64>,

    #[arg(long)]
    current_block: Option<u64>,
}

#[derive(Serialize)]
struct SubmissionBody {
    #[serde(flatten)]
    submission: ProofSubmission,
    current_block: u64,
}

fn decode_hex(name: &str, value: &str, expected_len: usize) -> Result<Vec<u8>> {
    let bytes = hex::decode(value.trim_start_matches("0x"))
        .with_context(|| format!("--{} is not valid hex", name))?;
    ensure!(
        bytes.len() == expected_len,
        "--{} must be {} bytes, got {}",
        name,
        expected_len,
        bytes.len()
    );
    Ok(bytes)
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let encrypted_reading =
        decode_hex("encrypted-reading", &cli.encrypted_reading, ENCRYPTED_READING_LEN)?;
    let public_key = cli
        .public_key
        .as_deref()
        .map(|key| decode_hex("public-key", key, PUBLIC_KEY_LEN))
        .transpose()?;

    let proof = bind_proof(
        cli.circuit_id,
        &encrypted_reading,
        cli.disclosed_reading,
        public_key.as_deref(),
    );

    if !cli.json {
        println!("{}", hex::encode(&proof));
        return Ok(());
    }

    let (Some(nonce), Some(generated_at), Some(current_block)) =
        (cli.nonce, cli.generated_at, cli.current_block)
    else {
        anyhow::bail!("--json needs --nonce, --generated-at and --current-block");
    };

    let body = SubmissionBody {
        submission: ProofSubmission {
            encrypted_reading,
            proof,
            nonce,
            disclosed_reading: cli.disclosed_reading,
            circuit_id: cli.circuit_id,
            generated_at,
        },
        current_block,
    };
    println!("{}", serde_json::to_string_pretty(&body)?);
    Ok(())
}
