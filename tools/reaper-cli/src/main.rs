use anyhow::Context;
use clap::builder::NonEmptyStringValueParser;
use clap::{Parser, Subcommand};
use policy_engine::{ReaperEngine, SweepReport};
use reaper_core::{CloudClient, ReaperConfig, BUILD_INFO, DEFAULT_PAUSE_SECS};
use sdc_client::SdcClient;
use std::path::PathBuf;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

/// Machines older than this many hours are reaped by default.
const DEFAULT_OLD_AGE_HOURS: u64 = 12;

#[derive(Parser, Debug)]
#[command(name = "reaper")]
#[command(about = "Reaper CLI - Stop and delete old machines in a CloudAPI account")]
#[command(version = reaper_core::VERSION)]
struct Cli {
    /// Log mutating calls instead of sending them
    #[arg(short = 'd', long, global = true)]
    dry_run: bool,

    /// Debug-level logging
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    /// CloudAPI endpoint
    #[arg(short = 'u', long, env = "SDC_URL", global = true)]
    sdc_url: Option<String>,

    /// Account login
    #[arg(short = 'a', long, env = "SDC_ACCOUNT", global = true)]
    account: Option<String>,

    /// Fingerprint or name of the account SSH key
    #[arg(short = 'k', long, env = "SDC_KEY_ID", global = true)]
    key_id: Option<String>,

    /// Private key used to sign requests
    #[arg(short = 'p', long, env = "SDC_KEY_PATH", global = true)]
    key_path: Option<PathBuf>,

    /// Seconds to wait between stopping and deleting a machine
    #[arg(long, default_value_t = DEFAULT_PAUSE_SECS, global = true)]
    pause: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List all machines in the account
    ListMachines,
    /// Show one machine as JSON
    ShowMachine { id: String },
    /// Stop and delete machines older than the given age
    DeleteOldMachines {
        /// Age threshold in hours
        #[arg(long, default_value_t = DEFAULT_OLD_AGE_HOURS)]
        old_age: u64,
        /// Who to tell about machines that could not be deleted
        #[arg(long, value_parser = NonEmptyStringValueParser::new())]
        contact_mail_address: String,
    },
}

impl Cli {
    fn config(&self) -> anyhow::Result<ReaperConfig> {
        let mut config = ReaperConfig::new(
            self.sdc_url.clone().context("--sdc-url or SDC_URL is required")?,
            self.account.clone().context("--account or SDC_ACCOUNT is required")?,
            self.key_id.clone().context("--key-id or SDC_KEY_ID is required")?,
            self.key_path.clone().context("--key-path or SDC_KEY_PATH is required")?,
        );
        config.dry_run = self.dry_run;
        config.verbose = self.verbose;
        config.pause_secs = self.pause;
        config.validate()?;
        Ok(config)
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    debug!("Starting {}", BUILD_INFO);

    let config = cli.config()?;
    let client = SdcClient::new(config.clone())?;

    match cli.command {
        Commands::ListMachines => handle_list_machines(&client),
        Commands::ShowMachine { id } => handle_show_machine(&client, &id),
        Commands::DeleteOldMachines {
            old_age,
            contact_mail_address,
        } => handle_delete_old_machines(client, &config, old_age, &contact_mail_address),
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn handle_list_machines(client: &impl CloudClient) -> anyhow::Result<()> {
    let machines = client.list_machines().context("listing machines")?;
    for machine in &machines {
        println!(
            "{}\t{}\t{}\t{}",
            machine.id,
            machine.state,
            machine.created,
            machine.name.as_deref().unwrap_or("-")
        );
    }
    info!(count = machines.len(), "Listed machines");
    Ok(())
}

fn handle_show_machine(client: &impl CloudClient, id: &str) -> anyhow::Result<()> {
    let machine = client
        .get_machine(id)
        .with_context(|| format!("fetching machine {id}"))?;
    println!("{}", serde_json::to_string_pretty(&machine)?);
    Ok(())
}

fn handle_delete_old_machines(
    client: SdcClient,
    config: &ReaperConfig,
    old_age: u64,
    contact_mail_address: &str,
) -> anyhow::Result<()> {
    let engine = ReaperEngine::from_config(client, config);
    let report = engine
        .delete_old_machines(old_age, contact_mail_address)
        .context("sweeping old machines")?;
    print_summary(&report, config.dry_run);
    Ok(())
}

fn print_summary(report: &SweepReport, dry_run: bool) {
    let prefix = if dry_run { "[dry run] " } else { "" };
    println!(
        "{}examined {} machine(s), {} older than threshold",
        prefix, report.examined, report.eligible
    );
    for id in &report.reaped {
        println!("{}deleted {}", prefix, id);
    }
    for machine in &report.unexpected {
        println!("needs manual deletion: {} ({})", machine.id, machine.state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_args() {
        let cli = Cli::try_parse_from([
            "reaper", "-d", "-v", "-u", "sdc_url", "-a", "account", "-k", "key_id", "-p",
            "key/path", "list-machines",
        ])
        .unwrap();
        assert_eq!(cli.sdc_url.as_deref(), Some("sdc_url"));
        assert_eq!(cli.account.as_deref(), Some("account"));
        assert_eq!(cli.key_id.as_deref(), Some("key_id"));
        assert_eq!(cli.key_path, Some(PathBuf::from("key/path")));
        assert!(cli.dry_run);
        assert!(cli.verbose);
        assert_eq!(cli.pause, 3);
        assert!(matches!(cli.command, Commands::ListMachines));
    }

    #[test]
    fn test_delete_old_machines_args() {
        let cli = Cli::try_parse_from([
            "reaper",
            "delete-old-machines",
            "--old-age",
            "1",
            "--contact-mail-address",
            "foo@bar",
            "--pause",
            "0",
        ])
        .unwrap();
        assert_eq!(cli.pause, 0);
        match cli.command {
            Commands::DeleteOldMachines {
                old_age,
                contact_mail_address,
            } => {
                assert_eq!(old_age, 1);
                assert_eq!(contact_mail_address, "foo@bar");
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_contact_address_is_required() {
        let missing = Cli::try_parse_from(["reaper", "delete-old-machines"]);
        assert!(missing.is_err());

        let empty =
            Cli::try_parse_from(["reaper", "delete-old-machines", "--contact-mail-address", ""]);
        assert!(empty.is_err());
    }

    #[test]
    fn test_config_from_flags() {
        let cli = Cli::try_parse_from([
            "reaper", "-d", "-u", "https://cloudapi.example.com", "-a", "ci", "-k", "aa:bb", "-p",
            "./key", "list-machines",
        ])
        .unwrap();
        let config = cli.config().unwrap();
        assert_eq!(config.account, "ci");
        assert!(config.dry_run);
        assert!(!config.verbose);
        assert_eq!(config.pause_secs, 3);
    }

    #[test]
    fn test_config_rejects_bad_url() {
        let cli = Cli::try_parse_from([
            "reaper", "-u", "not-a-url", "-a", "ci", "-k", "aa:bb", "-p", "./key", "list-machines",
        ])
        .unwrap();
        assert!(cli.config().is_err());
    }
}
