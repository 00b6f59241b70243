use std::process::ExitCode;

use anyhow::Context as _;
use clap::Parser as _;

use markstatus::cli::{Cli, Command, FetchArgs};
use markstatus::fetch::IdKind;
use markstatus::record::StatusRecord;
use markstatus::request::StatusRequest;

fn main() -> ExitCode {
    if let Err(err) = try_main() {
        eprintln!("{err:#}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

fn try_main() -> anyhow::Result<()> {
    markstatus::logging::init().context("init logging")?;

    let cli = Cli::parse();
    tracing::debug!(?cli, "parsed cli");

    match cli.command {
        Command::Fetch(args) => run_fetch(args).context("fetch")?,
    }

    Ok(())
}

fn run_fetch(args: FetchArgs) -> anyhow::Result<()> {
    let mut request = StatusRequest::new();
    if let Some(key) = &args.api_key {
        request.set_api_key(key.clone());
    }
    request.set_fetch_format(args.format.to_fetch_format());

    if let Some(file) = &args.file {
        request
            .retrieve_from_file(file)
            .context("retrieve from file")?;
    } else if let Some(serial) = &args.serial {
        request
            .retrieve_from_pto(serial, IdKind::Serial)
            .context("retrieve by serial number")?;
    } else if let Some(registration) = &args.registration {
        request
            .retrieve_from_pto(registration, IdKind::Registration)
            .context("retrieve by registration number")?;
    } else {
        anyhow::bail!("one of --serial, --registration, or --file is required");
    }

    if !request.record_valid() {
        let fault = request
            .fault()
            .context("a stage failed but recorded no fault")?;
        anyhow::bail!("{fault}");
    }

    if args.json {
        let json =
            serde_json::to_string_pretty(request.record()).context("serialize record json")?;
        println!("{json}");
    } else {
        print_record(request.record());
    }

    Ok(())
}

fn print_record(record: &StatusRecord) {
    let mut keys: Vec<&String> = record.scalars.keys().collect();
    keys.sort();
    for key in keys {
        println!("{key}: {}", record.scalars[key]);
    }

    let mut names: Vec<&String> = record.groups.keys().collect();
    names.sort();
    for name in names {
        println!("{name}:");
        for (index, member) in record.groups[name].iter().enumerate() {
            println!("  [{index}]");
            let mut fields: Vec<&String> = member.keys().collect();
            fields.sort();
            for field in fields {
                println!("    {field}: {}", member[field]);
            }
        }
    }
}
