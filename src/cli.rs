use clap::{ArgGroup, Args, Parser, Subcommand, ValueEnum};

use crate::fetch::FetchFormat;

#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    Fetch(FetchArgs),
}

#[derive(Debug, Args)]
#[command(group(ArgGroup::new("source").required(true).multiple(false)))]
pub struct FetchArgs {
    /// Application serial number (8 digits).
    #[arg(long, group = "source")]
    pub serial: Option<String>,

    /// Registration number (7 digits).
    #[arg(long, group = "source")]
    pub registration: Option<String>,

    /// Saved status payload (XML or zip file) instead of a TSDR call.
    #[arg(long, group = "source")]
    pub file: Option<String>,

    /// API key sent in the USPTO-API-KEY header.
    #[arg(long)]
    pub api_key: Option<String>,

    /// Payload format to request from TSDR.
    #[arg(long, value_enum, default_value_t = FormatArg::St96)]
    pub format: FormatArg,

    /// Print the decoded record as JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FormatArg {
    St66,
    St96,
    Zip,
}

impl FormatArg {
    pub fn to_fetch_format(self) -> FetchFormat {
        match self {
            FormatArg::St66 => FetchFormat::St66,
            FormatArg::St96 => FetchFormat::St96,
            FormatArg::Zip => FetchFormat::Zip,
        }
    }
}
