use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "tonebox")]
#[command(about = "Provision a shared ringtone onto contacts", long_about = None)]
pub struct Cli {
    /// Settings file (defaults to TONEBOX_CONFIG or config/tonebox.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the provisioning pipeline once and print per-contact results
    Apply,
    /// Check the provisioning values without touching anything
    Validate,
    /// Serve the control surface with background runs on config changes
    Serve(ServeArgs),
    /// Manage the local contact directory
    #[command(subcommand)]
    Contacts(ContactsCommand),
    /// Inspect the ringtone registry
    #[command(subcommand)]
    Assets(AssetsCommand),
}

#[derive(clap::Args, Debug)]
pub struct ServeArgs {
    /// Address to bind, overriding `[server] bind_addr`
    #[arg(long)]
    pub address: Option<SocketAddr>,
}

#[derive(Subcommand, Debug)]
pub enum ContactsCommand {
    /// Add a contact
    Add {
        #[arg(long)]
        name: String,
        /// Phone number; repeat for several
        #[arg(long = "phone", required = true)]
        phones: Vec<String>,
    },
    /// List contacts and their custom ringtone
    List,
}

#[derive(Subcommand, Debug)]
pub enum AssetsCommand {
    /// List finalized ringtone entries
    List,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_contacts_add() {
        let cli = Cli::parse_from([
            "tonebox",
            "contacts",
            "add",
            "--name",
            "Ada",
            "--phone",
            "+14155552671",
            "--phone",
            "+12125551234",
        ]);
        let Commands::Contacts(ContactsCommand::Add { name, phones }) = cli.command else {
            panic!("expected contacts add");
        };
        assert_eq!(name, "Ada");
        assert_eq!(phones.len(), 2);
    }

    #[test]
    fn test_parse_serve_with_global_config() {
        let cli = Cli::parse_from([
            "tonebox",
            "serve",
            "--address",
            "127.0.0.1:9000",
            "--config",
            "/etc/tonebox.toml",
        ]);
        assert_eq!(cli.config, Some(PathBuf::from("/etc/tonebox.toml")));
        let Commands::Serve(args) = cli.command else {
            panic!("expected serve");
        };
        assert_eq!(args.address, Some("127.0.0.1:9000".parse().unwrap()));
    }
}
