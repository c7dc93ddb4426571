use std::process;

use argile_core::envelope::{from_fragment, generate_key_hex, to_fragment};
use argile_core::EnvelopeCipher;
use argile_parcours::Settings;

use crate::{print_json, report_error, OutputFormat};

/// Print a fresh key suitable for `ENCRYPTION_KEY`.
pub(crate) fn cmd_keygen(output: OutputFormat) {
    let key = generate_key_hex();
    match output {
        OutputFormat::Text => println!("{}", key),
        OutputFormat::Json => print_json(&serde_json::json!({ "key": key })),
    }
}

pub(crate) fn cmd_encrypt(
    settings: &Settings,
    plaintext: &str,
    fragment: bool,
    output: OutputFormat,
    quiet: bool,
) {
    let cipher = load_cipher(settings, output, quiet);
    let envelope = match cipher.encrypt(plaintext) {
        Ok(e) => e,
        Err(e) => {
            report_error(&format!("error: {}", e), output, quiet);
            process::exit(1);
        }
    };
    let envelope = if fragment {
        to_fragment(&envelope)
    } else {
        envelope
    };
    match output {
        OutputFormat::Text => println!("{}", envelope),
        OutputFormat::Json => print_json(&serde_json::json!({ "envelope": envelope })),
    }
}

/// Decrypt a bare envelope, a `#d=` fragment or a full URL carrying one.
pub(crate) fn cmd_decrypt(settings: &Settings, input: &str, output: OutputFormat, quiet: bool) {
    let cipher = load_cipher(settings, output, quiet);
    let envelope = from_fragment(input).unwrap_or(input);
    match cipher.decrypt(envelope) {
        Ok(plaintext) => match output {
            OutputFormat::Text => println!("{}", plaintext),
            OutputFormat::Json => print_json(&serde_json::json!({ "plaintext": plaintext })),
        },
        Err(e) => {
            report_error(&format!("error: {}", e), output, quiet);
            process::exit(1);
        }
    }
}

fn load_cipher(settings: &Settings, output: OutputFormat, quiet: bool) -> EnvelopeCipher {
    match settings.envelope_cipher() {
        Ok(c) => c,
        Err(e) => {
            report_error(&format!("error: {}", e), output, quiet);
            process::exit(1);
        }
    }
}
