//! portgroups - list the port groups a connection matrix would show for a
//! session snapshot.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use serde::Serialize;

use portgroups::bundle::{Channel, Color, DataType};
use portgroups::config::{self, Preferences};
use portgroups::portgroup::{GatherOptions, PortGroupList};
use portgroups::session::SessionSnapshot;

#[derive(Debug, Parser)]
#[command(
    name = "portgroups",
    version = env!("CARGO_PKG_VERSION"),
    about = "Group a session's ports the way a connection matrix shows them",
    after_help = "EXAMPLES:\n\
        \x20 portgroups session.json\n\
        \x20 portgroups session.json --inputs --type midi\n\
        \x20 portgroups session.json --json > groups.json"
)]
struct Cli {
    /// Session snapshot (JSON).
    #[arg(value_name = "SNAPSHOT")]
    snapshot: PathBuf,

    /// Gather input ports.
    #[arg(long, overrides_with = "outputs")]
    inputs: bool,

    /// Gather output ports.
    #[arg(long, overrides_with = "inputs")]
    outputs: bool,

    /// Only gather ports of this type (`any` for every type).
    #[arg(long = "type", value_enum, value_name = "TYPE")]
    data_type: Option<TypeArg>,

    /// Allow several bundles offering the same ports in one group.
    #[arg(long, overrides_with = "no_allow_dups")]
    allow_dups: bool,

    /// Drop bundles offering the same ports as an earlier one.
    #[arg(long, overrides_with = "allow_dups")]
    no_allow_dups: bool,

    /// Include the session's automatic bundles.
    #[arg(long, overrides_with = "no_session_bundles")]
    session_bundles: bool,

    /// Leave out the session's automatic bundles.
    #[arg(long, overrides_with = "session_bundles")]
    no_session_bundles: bool,

    /// Print JSON.
    #[arg(long, overrides_with = "text")]
    json: bool,

    /// Print a text listing.
    #[arg(long, overrides_with = "json")]
    text: bool,

    /// Store the effective options as the new defaults.
    #[arg(long)]
    save_preferences: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum TypeArg {
    Audio,
    Midi,
    Any,
}

impl TypeArg {
    fn filter(self) -> Option<DataType> {
        match self {
            TypeArg::Audio => Some(DataType::Audio),
            TypeArg::Midi => Some(DataType::Midi),
            TypeArg::Any => None,
        }
    }
}

/// `Some(true)` / `Some(false)` when one of a flag pair was given.
fn flag_pair(on: bool, off: bool) -> Option<bool> {
    match (on, off) {
        (true, _) => Some(true),
        (_, true) => Some(false),
        _ => None,
    }
}

impl Cli {
    /// Command-line flags layered over the stored preferences.
    fn apply(&self, prefs: &mut Preferences) {
        let gather = &mut prefs.gather;
        if let Some(inputs) = flag_pair(self.inputs, self.outputs) {
            gather.inputs = inputs;
        }
        if let Some(t) = self.data_type {
            gather.data_type = t.filter();
        }
        if let Some(allow) = flag_pair(self.allow_dups, self.no_allow_dups) {
            gather.allow_dups = allow;
        }
        if let Some(use_them) = flag_pair(self.session_bundles, self.no_session_bundles) {
            gather.use_session_bundles = use_them;
        }
        if let Some(json) = flag_pair(self.json, self.text) {
            prefs.json_output = json;
        }
    }
}

#[derive(Serialize)]
struct GroupReport {
    name: String,
    bundles: Vec<BundleReport>,
}

#[derive(Serialize)]
struct BundleReport {
    name: String,
    inputs: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    owner: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    color: Option<Color>,
    channels: Vec<Channel>,
}

fn report(list: &PortGroupList) -> Vec<GroupReport> {
    list.groups()
        .iter()
        .map(|group| GroupReport {
            name: group.name().to_string(),
            bundles: group
                .records()
                .map(|r| BundleReport {
                    name: r.bundle.name(),
                    inputs: r.bundle.ports_are_inputs(),
                    owner: r.io().map(|io| io.name()),
                    color: r.color,
                    channels: r.bundle.channels().clone(),
                })
                .collect(),
        })
        .collect()
}

fn print_text(groups: &[GroupReport], options: &GatherOptions) {
    println!(
        "{} groups ({}, {})",
        groups.len(),
        if options.inputs { "inputs" } else { "outputs" },
        options.data_type.map_or("all types", |t| t.as_str())
    );
    for group in groups {
        println!("{}", group.name);
        for bundle in &group.bundles {
            match (&bundle.owner, bundle.color) {
                (Some(owner), Some(color)) => {
                    println!("  {} [{}] {}", bundle.name, owner, color)
                }
                (Some(owner), None) => println!("  {} [{}]", bundle.name, owner),
                (None, Some(color)) => println!("  {} {}", bundle.name, color),
                (None, None) => println!("  {}", bundle.name),
            }
            for channel in &bundle.channels {
                println!(
                    "    {:<16} {:<5} {}",
                    channel.name,
                    channel.data_type,
                    channel.ports.join(", ")
                );
            }
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let mut prefs = config::load_preferences();
    cli.apply(&mut prefs);
    if cli.save_preferences {
        config::save_preferences(&prefs);
    }

    let mut snapshot = SessionSnapshot::load(&cli.snapshot)?;
    snapshot
        .program_name
        .get_or_insert_with(|| prefs.program_name.clone());
    let model = snapshot.build();

    let mut list = PortGroupList::new();
    list.gather(Some(model.session()), &model.context(), &prefs.gather);

    let groups = report(&list);
    if prefs.json_output {
        println!("{}", serde_json::to_string_pretty(&groups)?);
    } else {
        print_text(&groups, &prefs.gather);
    }

    Ok(())
}
