use std::process;

use argile_parcours::{DossierSource, DsUrls, GraphqlDossierSource, Settings};

use crate::{print_json, report_error, OutputFormat};

/// Fetch one dossier from the DS GraphQL API and print it.
pub(crate) fn cmd_dossier(settings: &Settings, number: i64, output: OutputFormat, quiet: bool) {
    let source = match GraphqlDossierSource::new(&settings.ds) {
        Ok(s) => s,
        Err(e) => {
            report_error(&format!("error: {}", e), output, quiet);
            process::exit(1);
        }
    };
    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            report_error(
                &format!("error: failed to create tokio runtime: {}", e),
                output,
                quiet,
            );
            process::exit(1);
        }
    };

    let snapshot = match rt.block_on(source.get_dossier(number)) {
        Ok(s) => s,
        Err(e) => {
            report_error(&format!("error: {}", e), output, quiet);
            process::exit(1);
        }
    };

    let url = DsUrls::new(&settings.ds.base_url).dossier_url(number);
    match output {
        OutputFormat::Json => {
            let mut value = serde_json::to_value(&snapshot).unwrap_or_default();
            value["url"] = serde_json::Value::String(url);
            print_json(&value);
        }
        OutputFormat::Text => {
            println!("Dossier {}", snapshot.number);
            println!(
                "  state:  {} ({})",
                snapshot.state,
                snapshot.state.ds_state()
            );
            println!("  parcours status: {}", snapshot.state.to_journey_status());
            if let Some(at) = snapshot.date_depot {
                println!("  deposited: {}", at);
            }
            if let Some(at) = snapshot.date_traitement {
                println!("  processed: {}", at);
            }
            println!("  url:    {}", url);
        }
    }
}
