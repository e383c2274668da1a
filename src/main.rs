mod cli;

use clap::Parser;
use cli::{AssetsCommand, Cli, Commands, ContactsCommand};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

use tonebox::config::{self, Config, ProvisioningConfig, Validation};
use tonebox::directory::Contact;
use tonebox::download::host_of;
use tonebox::humanize::ByteSize;
use tonebox::observability::init_tracing;
use tonebox::pipeline::{RunReport, sanitize_error};
use tonebox::runtime::Runtime;

type AnyError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() -> Result<(), AnyError> {
    init_tracing();

    let cli = Cli::parse();
    let (config, config_path) = load_settings(cli.config)?;
    let runtime = Runtime::build(config, &config_path)?;

    let result = match cli.command {
        Commands::Apply => apply(&runtime).await,
        Commands::Validate => validate(&runtime),
        Commands::Serve(args) => {
            let address = args.address.unwrap_or(runtime.config.server.bind_addr);
            // Serving persists the ledger on shutdown
            return tonebox::api::run(runtime, address).await;
        }
        Commands::Contacts(ContactsCommand::Add { name, phones }) => {
            add_contact(&runtime, name, phones)
        }
        Commands::Contacts(ContactsCommand::List) => list_contacts(&runtime),
        Commands::Assets(AssetsCommand::List) => list_assets(&runtime),
    };

    runtime.ledger.persist()?;
    result
}

fn load_settings(path: Option<PathBuf>) -> Result<(Config, PathBuf), AnyError> {
    match path {
        Some(path) => {
            dotenvy::dotenv().ok();
            let config = Config::load_from_path(&path)?;
            Ok((config, path))
        }
        None => {
            let config = Config::load()?;
            Ok((config, config::config_path()))
        }
    }
}

async fn apply(runtime: &Runtime) -> Result<(), AnyError> {
    let report = match runtime.orchestrator.run(&CancellationToken::new()).await {
        Ok(report) => report,
        Err(e) => {
            eprintln!("Provisioning failed: {}", sanitize_error(&e));
            return Err(e.into());
        }
    };

    print_report(&report);

    if let Some(message) = report.summary_error() {
        eprintln!("{message}");
    }
    report.into_result()?;
    Ok(())
}

fn print_report(report: &RunReport) {
    println!(
        "Registered {} ({}, {})",
        report.handle,
        report.outcome.content_type,
        ByteSize(report.outcome.bytes_written)
    );
    for result in &report.results {
        let name = result.resolved_name.as_deref().unwrap_or("-");
        match &result.error {
            None => println!("  ok      {:<20} {}", result.identifier, name),
            Some(error) => println!("  failed  {:<20} {} ({})", result.identifier, name, error),
        }
    }
    println!(
        "{} of {} contacts updated after {} round(s)",
        report.succeeded(),
        report.results.len(),
        report.rounds
    );
}

fn validate(runtime: &Runtime) -> Result<(), AnyError> {
    match runtime.orchestrator.read_config() {
        Validation::Valid(provisioning) => {
            println!("Configuration valid");
            for line in describe_valid(&provisioning) {
                println!("  {line}");
            }
            Ok(())
        }
        Validation::Invalid(errors) => {
            eprintln!("Configuration invalid:");
            for error in &errors {
                eprintln!("  - {error}");
            }
            Err(format!("{} configuration error(s)", errors.len()).into())
        }
    }
}

/// Summary lines for a usable configuration; the source shows its host only
fn describe_valid(provisioning: &ProvisioningConfig) -> Vec<String> {
    vec![
        format!("source:     https://{}/...", host_of(provisioning.source_url())),
        format!("name:       {}", provisioning.display_name()),
        format!(
            "recipients: {}",
            provisioning.recipient_identifiers().join(", ")
        ),
    ]
}

fn add_contact(runtime: &Runtime, name: String, phones: Vec<String>) -> Result<(), AnyError> {
    let contact = Contact::new(name, phones);
    runtime.directory.upsert_contact(&contact)?;
    println!("Added contact {} ({})", contact.display_name, contact.id);
    Ok(())
}

fn list_contacts(runtime: &Runtime) -> Result<(), AnyError> {
    for contact in runtime.directory.list_contacts()? {
        println!(
            "{}  {:<24} {:<32} {}",
            contact.id,
            contact.display_name,
            contact.phone_numbers.join(","),
            contact.custom_ringtone.as_deref().unwrap_or("-")
        );
    }
    Ok(())
}

fn list_assets(runtime: &Runtime) -> Result<(), AnyError> {
    for record in runtime.assets.visible_entries()? {
        println!(
            "{}  {:<24} {:<12} {:>10}  {}",
            record.handle,
            record.display_name,
            record.mime_type,
            ByteSize(record.size).to_string(),
            record
                .committed_at
                .map(|at| at.to_rfc3339())
                .unwrap_or_default()
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tonebox::config::ConfigValidator;

    #[test]
    fn test_valid_summary_hides_signature() {
        let Validation::Valid(provisioning) = ConfigValidator::default().validate(
            Some("https://acct.blob.core.windows.net/t/a.mp3?sv=2024&sig=TOPSECRET"),
            Some("+14155552671"),
            Some("Brand"),
        ) else {
            panic!("expected a valid configuration");
        };

        let lines = describe_valid(&provisioning);
        assert_eq!(lines[0], "source:     https://acct.blob.core.windows.net/...");
        assert!(lines.iter().all(|line| !line.contains("TOPSECRET")));
        assert_eq!(lines[2], "recipients: +14155552671");
    }
}
