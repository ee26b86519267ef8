//! Attestation CLI
//!
//! Runs one attestation operation against the configured provider and
//! prints its outcome.

use anyhow::{anyhow, bail, Context};
use attestbridge_attestation::{
    AttestationListener, AttestationResult, AttestationService, Fault, Operation, RequestId,
    DEFAULT_CLOUD_PROJECT_ID,
};
use attestbridge_core::{logging, Config};
use std::path::PathBuf;
use std::process;

#[derive(Debug)]
struct Options {
    operation: Operation,
    nonce: Option<String>,
    project_id: i64,
    config: Option<PathBuf>,
    json: bool,
}

/// Human-readable outcome printer.
struct Printer;

impl Printer {
    fn fail(&mut self, request_id: RequestId, operation: Operation, fault: &Fault) {
        eprintln!("✗ {} {} [{}]: {}", operation, request_id, fault.kind, fault);
    }
}

impl AttestationListener for Printer {
    fn on_attestation_generated(&mut self, request_id: RequestId, result: AttestationResult) {
        println!("✓ Attestation generated ({})", request_id);
        for (key, value) in result.to_structured_map() {
            match serde_json::to_string(&value) {
                Ok(rendered) => println!("    {:<20} {}", key, rendered),
                Err(_) => println!("    {:<20} <unprintable>", key),
            }
        }
    }

    fn on_hardware_backed_result(&mut self, request_id: RequestId, available: bool) {
        println!(
            "✓ Hardware-backed attestation {} ({})",
            if available { "AVAILABLE" } else { "NOT AVAILABLE" },
            request_id
        );
    }

    fn on_key_reset_complete(&mut self, request_id: RequestId) {
        println!("✓ Attestation key reset ({})", request_id);
    }

    fn on_attestation_error(&mut self, request_id: RequestId, operation: Operation, fault: Fault) {
        self.fail(request_id, operation, &fault);
    }

    fn on_integrity_token_received(&mut self, request_id: RequestId, token: String) {
        println!("✓ Integrity token ({})", request_id);
        println!("{}", token);
    }

    fn on_integrity_token_error(&mut self, request_id: RequestId, fault: Fault) {
        self.fail(request_id, Operation::RequestIntegrityToken, &fault);
    }
}

fn parse_operation(command: &str) -> Option<Operation> {
    match command {
        "generate" => Some(Operation::GenerateAttestation),
        "check-hardware" => Some(Operation::CheckHardwareBacked),
        "reset-key" => Some(Operation::ResetKey),
        "integrity-token" => Some(Operation::RequestIntegrityToken),
        _ => None,
    }
}

fn parse_args(args: &[String]) -> anyhow::Result<Options> {
    let command = args
        .first()
        .ok_or_else(|| anyhow!("Usage: attest-cli <command> [options]"))?;
    let operation =
        parse_operation(command).ok_or_else(|| anyhow!("Unknown command '{}'", command))?;

    let mut options = Options {
        operation,
        nonce: None,
        project_id: DEFAULT_CLOUD_PROJECT_ID,
        config: None,
        json: false,
    };

    let mut rest = args[1..].iter();
    while let Some(arg) = rest.next() {
        match arg.as_str() {
            "--nonce" | "-n" => {
                options.nonce = Some(rest.next().context("--nonce requires a value")?.clone());
            }
            "--project-id" | "-p" => {
                let value = rest.next().context("--project-id requires a value")?;
                options.project_id = value
                    .parse()
                    .with_context(|| format!("Invalid --project-id '{}'", value))?;
            }
            "--config" | "-c" => {
                options.config = Some(PathBuf::from(
                    rest.next().context("--config requires a value")?,
                ));
            }
            "--json" => options.json = true,
            other => bail!("Unknown option '{}'", other),
        }
    }

    if options.operation == Operation::RequestIntegrityToken && options.nonce.is_none() {
        bail!("integrity-token requires --nonce");
    }

    Ok(options)
}

fn print_usage() {
    println!("Attestation CLI - Device attestation and integrity tokens");
    println!();
    println!("USAGE:");
    println!("    attest-cli generate [--config <file>] [--json]");
    println!("    attest-cli check-hardware [--config <file>] [--json]");
    println!("    attest-cli reset-key [--config <file>] [--json]");
    println!("    attest-cli integrity-token --nonce <nonce> [--project-id <id>] [--config <file>] [--json]");
    println!();
    println!("COMMANDS:");
    println!("    generate          Generate a device attestation");
    println!("    check-hardware    Report whether hardware-backed attestation is available");
    println!("    reset-key         Delete the attestation key");
    println!("    integrity-token   Request an integrity token for a nonce");
    println!();
    println!("ENVIRONMENT:");
    println!("    ATTESTBRIDGE_PROVIDER             auto | hardware | stub | cloud");
    println!("    ATTESTBRIDGE_CLOUD_ENDPOINT       Integrity token endpoint URL");
    println!("    RUST_LOG                          Log filter (logs go to stderr)");
}

/// Returns whether the operation succeeded.
fn run(options: Options) -> anyhow::Result<bool> {
    let config = Config::load(options.config.as_deref()).context("Failed to load configuration")?;
    logging::try_init_with(&config.logging)?;

    let (service, mut queue) = AttestationService::from_config(&config, None)
        .context("Failed to start attestation service")?;

    let request_id = match options.operation {
        Operation::GenerateAttestation => service.generate_attestation(),
        Operation::CheckHardwareBacked => service.check_hardware_backed(),
        Operation::ResetKey => service.reset_key(),
        Operation::RequestIntegrityToken => {
            let nonce = options.nonce.unwrap_or_default();
            service.request_integrity_token(nonce, options.project_id)
        }
    };

    let notification = queue
        .blocking_recv()
        .ok_or_else(|| anyhow!("Service stopped before {} completed", request_id))?;
    let failed = notification.is_failure();

    if options.json {
        println!("{}", serde_json::to_string_pretty(&notification)?);
    } else {
        notification.dispatch_to(&mut Printer);
    }

    Ok(!failed)
}

fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();
    if matches!(args.first().map(String::as_str), Some("--help" | "-h" | "help")) {
        print_usage();
        return;
    }

    let options = match parse_args(&args) {
        Ok(options) => options,
        Err(e) => {
            eprintln!("Error: {}", e);
            println!();
            print_usage();
            process::exit(2);
        }
    };

    match run(options) {
        Ok(true) => {}
        Ok(false) => process::exit(1),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            process::exit(1);
        }
    }
}
