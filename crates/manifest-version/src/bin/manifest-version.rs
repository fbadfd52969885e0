use std::{path::PathBuf, process::ExitCode};

use clap::{ArgAction, Args, CommandFactory, Parser, Subcommand};
use manifest_version::{
    manifest::{IMPLEMENTATION_TITLE, IMPLEMENTATION_VERSION},
    Chain, EmbeddedLocator, Location, Manifest, ManifestVersionProvider, ResourceLocator,
    SearchPath, VersionProvider, MANIFEST_PATH,
};
use serde::Serialize;
use tracing::Level;

const PATH_VAR: &str = "MANIFEST_VERSION_PATH";

#[manifest_version::version_provider("manifest-version")]
struct ToolVersion;

#[derive(Parser, Debug)]
#[command(name = "manifest-version", about, disable_version_flag = true)]
struct RootCli {
    /// Print the version of this tool
    #[arg(short = 'V', long = "version", action = ArgAction::SetTrue)]
    version: bool,
    /// Log more (repeat for debug and trace output)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
    #[command(subcommand)]
    cmd: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Resolve the version line of a project
    Resolve {
        #[arg(value_name = "PROJECT")]
        project: String,
        #[command(flatten)]
        source: SourceArgs,
        #[arg(long)]
        json: bool,
    },
    /// List every manifest candidate with its title and version
    List {
        #[command(flatten)]
        source: SourceArgs,
        #[arg(long)]
        json: bool,
        /// Also print all attributes of each manifest
        #[arg(long)]
        full: bool,
    },
}

#[derive(Args, Debug)]
struct SourceArgs {
    /// Directory searched for META-INF/MANIFEST.MF, in order (also read from
    /// MANIFEST_VERSION_PATH)
    #[arg(long = "root", value_name = "DIR")]
    roots: Vec<PathBuf>,
    /// Executable scanned for embedded manifests
    #[arg(long = "binary", value_name = "PATH")]
    binary: Option<PathBuf>,
}

type CliLocator = Chain<Option<EmbeddedLocator>, SearchPath>;

#[derive(Serialize)]
struct Resolved<'a> {
    project: &'a str,
    version: Option<&'a str>,
}

#[derive(Serialize)]
struct Candidate {
    location: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    manifest: Option<Manifest>,
}

fn main() -> anyhow::Result<ExitCode> {
    manifest_version::embed_manifest!();
    dotenv::dotenv().ok();

    let root = RootCli::parse();
    init_tracing(root.verbose);

    if root.version {
        for line in ToolVersion.version()? {
            println!("{line}");
        }
        return Ok(ExitCode::SUCCESS);
    }

    match root.cmd {
        Some(Commands::Resolve {
            project,
            source,
            json,
        }) => resolve_cmd(project, source, json),
        Some(Commands::List { source, json, full }) => list_cmd(source, json, full),
        None => {
            RootCli::command().print_help()?;
            Ok(ExitCode::FAILURE)
        }
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();
}

/// Explicit roots first, then the ones from the environment. With neither
/// roots nor a binary, falls back to the running executable.
fn locator(source: SourceArgs) -> anyhow::Result<CliLocator> {
    let env_roots = SearchPath::from_env(PATH_VAR);
    let search = SearchPath::new()
        .roots(source.roots)
        .roots(env_roots.as_slice().to_vec());

    if search.is_empty() && source.binary.is_none() {
        return Ok(Chain(
            Some(EmbeddedLocator::current_exe()?),
            SearchPath::beside_exe()?,
        ));
    }
    Ok(Chain(source.binary.map(EmbeddedLocator::from_path), search))
}

fn resolve_cmd(project: String, source: SourceArgs, json: bool) -> anyhow::Result<ExitCode> {
    let provider = ManifestVersionProvider::new(project, locator(source)?)?;
    let version = provider.version_line()?;

    if json {
        let resolved = Resolved {
            project: provider.project(),
            version: version.as_deref(),
        };
        println!("{}", serde_json::to_string_pretty(&resolved)?);
    } else if let Some(line) = &version {
        println!("{line}");
    }

    Ok(if version.is_some() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn list_cmd(source: SourceArgs, json: bool, full: bool) -> anyhow::Result<ExitCode> {
    let locator = locator(source)?;
    let candidates = locator
        .resources(MANIFEST_PATH)?
        .map(|location| inspect(&location, full))
        .collect::<Vec<_>>();

    if json {
        println!("{}", serde_json::to_string_pretty(&candidates)?);
    } else {
        for c in &candidates {
            match &c.error {
                Some(e) => println!("{}\terror: {e}", c.location),
                None => println!(
                    "{}\t{}\t{}",
                    c.location,
                    c.title.as_deref().unwrap_or("-"),
                    c.version.as_deref().unwrap_or("-"),
                ),
            }
            if let Some(manifest) = &c.manifest {
                print!("{manifest}");
            }
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn inspect(location: &impl Location, full: bool) -> Candidate {
    let manifest = location
        .open()
        .map_err(anyhow::Error::from)
        .and_then(Manifest::read);

    match manifest {
        Ok(manifest) => {
            let main = manifest.main_attributes();
            Candidate {
                location: location.to_string(),
                title: main.get(IMPLEMENTATION_TITLE).map(str::to_string),
                version: main.get(IMPLEMENTATION_VERSION).map(str::to_string),
                error: None,
                manifest: full.then(|| manifest.clone()),
            }
        }
        Err(e) => Candidate {
            location: location.to_string(),
            title: None,
            version: None,
            error: Some(format!("{e:#}")),
            manifest: None,
        },
    }
}
