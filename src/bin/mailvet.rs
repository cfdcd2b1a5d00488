//! Command-line front end for address validation.

use std::io::{self, BufRead};
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::Parser;

use mailvet::{
    BulkOptions, CancelToken, DnsOptions, SmtpOptions, ValidationResult, Validator,
};

#[derive(Parser)]
#[command(
    name = "mailvet",
    about = "Validate email addresses at the syntax, DNS, domain and SMTP levels"
)]
struct Cli {
    /// Addresses to validate; use --stdin to read one per line instead.
    addresses: Vec<String>,

    /// Read addresses from stdin, one per line.
    #[arg(long)]
    stdin: bool,

    /// Enable the DNS (MX existence) level.
    #[arg(long)]
    dns: bool,

    /// Accept A records when the MX lookup fails.
    #[arg(long, requires = "dns")]
    fallback_to_a: bool,

    /// Enable the domain reputation level (disposable + typo detection).
    #[arg(long)]
    domain: bool,

    /// Enable the SMTP RCPT TO probe (requires --helo and --mail-from).
    #[arg(long)]
    smtp: bool,

    /// Domain announced in EHLO.
    #[arg(long)]
    helo: Option<String>,

    /// Envelope sender for MAIL FROM.
    #[arg(long)]
    mail_from: Option<String>,

    /// Run every level even after a failure.
    #[arg(long)]
    all: bool,

    /// Concurrent workers for bulk validation.
    #[arg(long, default_value_t = 5)]
    workers: usize,

    /// Output format: human, json or ndjson.
    #[arg(long, default_value = "human")]
    format: String,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    match run() {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            eprintln!("mailvet: {err:#}");
            ExitCode::from(2)
        }
    }
}

fn run() -> Result<bool> {
    let cli = Cli::parse();

    let mut addresses = cli.addresses.clone();
    if cli.stdin {
        for line in io::stdin().lock().lines() {
            let line = line.context("reading stdin")?;
            let line = line.trim();
            if !line.is_empty() {
                addresses.push(line.to_string());
            }
        }
    }
    if addresses.is_empty() {
        bail!("no addresses given (pass them as arguments or use --stdin)");
    }

    let mut validator = Validator::new();
    if cli.dns {
        validator = validator.with_dns_options(DnsOptions {
            fallback_to_a: cli.fallback_to_a,
            ..DnsOptions::default()
        });
    }
    if cli.domain {
        validator = validator.with_domain();
    }
    if cli.smtp {
        let (Some(helo), Some(mail_from)) = (cli.helo.clone(), cli.mail_from.clone()) else {
            bail!("--smtp requires --helo and --mail-from");
        };
        validator = validator.with_smtp(SmtpOptions {
            helo_domain: helo,
            mail_from,
            ..SmtpOptions::default()
        });
    }

    let cancel = CancelToken::new();
    let results = if cli.all {
        addresses
            .iter()
            .map(|address| validator.validate_all(&cancel, address))
            .collect::<Result<Vec<_>, _>>()?
    } else if addresses.len() == 1 {
        vec![validator.validate(&cancel, &addresses[0])?]
    } else {
        validator.validate_many(
            &cancel,
            &addresses,
            BulkOptions {
                workers: cli.workers,
            },
        )?
    };
    validator.close();

    match cli.format.as_str() {
        "json" => println!("{}", serde_json::to_string_pretty(&results)?),
        "ndjson" => {
            for result in &results {
                println!("{}", serde_json::to_string(result)?);
            }
        }
        "human" => {
            for result in &results {
                print_human(result);
            }
        }
        other => bail!("unknown format: {other}"),
    }

    Ok(results.iter().all(|result| result.valid))
}

fn print_human(result: &ValidationResult) {
    println!("{} valid={}", result.email, result.valid);
    for check in &result.checks {
        let verdict = if check.passed { "ok  " } else { "FAIL" };
        let mut line = format!("  [{}] {} {}", check.level, verdict, check.details);
        if let Some(host) = &check.mx_host {
            line.push_str(&format!(" mx={host}"));
        }
        if let Some(code) = check.smtp_code {
            line.push_str(&format!(" code={code}"));
        }
        if let Some(suggestion) = &check.suggestion {
            line.push_str(&format!(" (did you mean {suggestion}?)"));
        }
        println!("{line}");
    }
}
