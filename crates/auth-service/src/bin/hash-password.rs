//! Print an Argon2id hash for a password, or check a password against a hash.
//!
//! The password is read from `--password`, `HASH_PASSWORD`, or the first line
//! of stdin, in that order.

use anyhow::{Context, Result};
use clap::Parser;
use std::io::BufRead;

#[derive(Parser, Debug)]
#[command(name = "hash-password")]
#[command(about = "Generate or verify Argon2id password hashes", long_about = None)]
struct Args {
    #[arg(long, env = "HASH_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Check the password against this PHC hash instead of generating one
    #[arg(long, value_name = "HASH")]
    verify: Option<String>,
}

fn read_password(args: &Args) -> Result<String> {
    if let Some(password) = &args.password {
        return Ok(password.clone());
    }
    let mut line = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .context("failed to read password from stdin")?;
    let password = line.trim_end_matches(['\r', '\n']).to_string();
    anyhow::ensure!(!password.is_empty(), "no password given");
    Ok(password)
}

fn main() -> Result<()> {
    let args = Args::parse();
    let password = read_password(&args)?;

    match &args.verify {
        Some(hash) => {
            if auth_service::crypto::verify_password(&password, hash)? {
                println!("match");
            } else {
                println!("no match");
                std::process::exit(1);
            }
        }
        None => println!("{}", auth_service::crypto::hash_password(&password)?),
    }

    Ok(())
}
