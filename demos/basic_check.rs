//! Example: Basic signature check
//!
//! Validates one file with the backend for the host platform and prints the
//! result, then the same result as JSON.

use signinspect::logging::init_tracing;
use signinspect::{validate_signature, Platform};

fn main() {
    let args: Vec<String> = std::env::args().collect();
    if args.len() != 2 {
        eprintln!("Usage: {} <path_to_file>", args[0]);
        std::process::exit(1);
    }
    init_tracing();

    let path = &args[1];
    println!("Checking signature for: {} ({})\n", path, Platform::host());

    let result = validate_signature(path);

    if result.is_signed && result.is_valid {
        println!("✓ File is signed and valid");
        println!("  Signer: {}", result.signer_name);
        if !result.issuer_name.is_empty() {
            println!("  Issuer: {}", result.issuer_name);
        }
        if result.is_expired {
            println!("  (signing certificate has expired)");
        }
    } else if result.is_signed {
        println!("? File is signed but the signer could not be read");
    } else {
        println!("✗ File is not signed");
    }
    if let Some(error) = &result.error_message {
        println!("  Error: {}", error);
    }

    match serde_json::to_string_pretty(&result) {
        Ok(json) => println!("\n{}", json),
        Err(e) => eprintln!("failed to serialize result: {}", e),
    }
}
