use std::{env, fs};

use num_bigint::BigUint;
use receipt_inputs::{
    backend,
    config::Config,
    core::{PublicKeyMaterial, RawMessage, SignatureMaterial},
    error::ExtractError,
    format::{ContractCall, format_call},
    providers::{Provider, extract},
};
use tracing_subscriber::EnvFilter;

const USAGE: &str =
    "usage: demo <provider> <header-file> <body-file> <modulus-hex> <signature-hex> [config.json]";

fn parse_hex(name: &str, text: &str) -> Result<BigUint, ExtractError> {
    let digits = text.trim().trim_start_matches("0x");
    BigUint::parse_bytes(digits.as_bytes(), 16)
        .ok_or_else(|| ExtractError::Config(format!("{} is not hex: `{}`", name, text)))
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = env::args().skip(1).collect();
    if args.len() < 5 {
        eprintln!("{}", USAGE);
        std::process::exit(2);
    }

    let provider: Provider = args[0].parse()?;
    let config = match args.get(5) {
        Some(path) => Config::from_json_file(path)?,
        None => Config::default(),
    };

    // header and body arrive already split and DKIM-verified
    let msg = RawMessage {
        header: fs::read(&args[1])?,
        body: fs::read(&args[2])?,
        public_key: PublicKeyMaterial::Modulus(parse_hex("modulus", &args[3])?),
        signature: SignatureMaterial::Integer(parse_hex("signature", &args[4])?),
    };

    let crypto = backend::acquire()?;
    let extraction = extract(provider, &msg, &config, crypto.as_ref())?;
    let call = format_call(&extraction, &config)?;

    let limits = provider.limits(&config);
    let email = extraction.email();
    eprintln!("provider:      {} (verifier id {})", provider, provider.verifier_id().id());
    eprintln!("header bytes:  {} / {}", email.header.len, limits.max_header_len);
    eprintln!("body bytes:    {} / {}", msg.body.len(), limits.max_body_len);
    eprintln!("from at:       {}", email.from.index);
    eprintln!("subject at:    {}", email.subject.index);
    if let ContractCall::United(submission) = &call {
        let capsules: usize = submission.capsules.iter().map(|set| set.len()).sum();
        eprintln!("capsules:      {}", capsules);
    }

    println!("{}", serde_json::to_string_pretty(&call)?);
    Ok(())
}
