use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};

use rusty_pipette::compiler;
use rusty_pipette::config::Parameters;
use rusty_pipette::data::loader;
use rusty_pipette::hardware::DryRun;
use rusty_pipette::labware;
use rusty_pipette::protocols::{self, ProtocolKind};

#[derive(Parser, Debug)]
#[command(
    version = env!("CARGO_PKG_VERSION"),
    about = "Turn liquid-handling experiment designs into robot commands",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: MainMenu,
}

#[derive(Subcommand, Debug)]
enum MainMenu {
    /// Dry-run a workflow and print its commands as JSON lines.
    Run {
        #[clap(flatten)]
        design: DesignArgs,
        #[arg(short, long, help = "Write commands here instead of stdout")]
        output: Option<PathBuf>,
    },

    /// Derive the labware layout CSV of a workflow.
    Labware {
        #[clap(flatten)]
        design: DesignArgs,
        #[arg(short, long, help = "Write the CSV here instead of stdout")]
        output: Option<PathBuf>,
    },

    /// Fill the placeholders of a protocol template.
    Compile {
        #[arg(short = 'd', long, default_value = "templates/", help = "Directory containing protocol templates")]
        template_dir: PathBuf,
        #[arg(required = true, help = "Template file name inside the template directory")]
        template: String,
        #[clap(flatten)]
        inputs: InputArgs,
        #[arg(short, long, default_value = "compiled_protocol.py")]
        output: PathBuf,
    },

    /// Prepend the design table and parameters to a protocol file.
    Embed {
        #[arg(required = true, help = "Path to the protocol template")]
        template: PathBuf,
        #[clap(flatten)]
        inputs: InputArgs,
        #[arg(short, long, required = true)]
        output: PathBuf,
    },
}

#[derive(Args, Debug, Clone)]
struct InputArgs {
    #[arg(short = 'j', long, help = "Path to the JSON parameter file")]
    params: PathBuf,
    #[arg(short = 'c', long, help = "Path to the CSV design table")]
    csv: PathBuf,
}

#[derive(Args, Debug, Clone)]
struct DesignArgs {
    #[arg(short = 'p', long, value_enum)]
    protocol: ProtocolKind,
    #[clap(flatten)]
    inputs: InputArgs,
}

impl DesignArgs {
    fn load(&self) -> Result<(Parameters, rusty_pipette::data::model::ExperimentTable)> {
        let params = Parameters::load_file(&self.inputs.params)?;
        let table = loader::load_file(&self.inputs.csv)?;
        Ok((params, table))
    }
}

fn read(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
}

fn write_or_print(output: Option<&Path>, text: &str) -> Result<()> {
    match output {
        Some(path) => {
            std::fs::write(path, text).with_context(|| format!("writing {}", path.display()))?;
            log::info!("wrote {}", path.display());
        }
        None => print!("{text}"),
    }
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        MainMenu::Run { design, output } => {
            let (params, table) = design.load()?;
            let mut driver = DryRun::new();
            let issued = protocols::run(design.protocol, &params, &table, &mut driver)
                .with_context(|| format!("{} protocol failed", design.protocol))?;
            log::info!("{issued} commands issued");
            write_or_print(output.as_deref(), &driver.to_json_lines()?)?;
        }
        MainMenu::Labware { design, output } => {
            let (params, table) = design.load()?;
            let records = labware::records(design.protocol, &params, &table)?;
            write_or_print(output.as_deref(), &labware::to_csv_string(&records)?)?;
        }
        MainMenu::Compile {
            template_dir,
            template,
            inputs,
            output,
        } => {
            let text = compiler::load_template(&template_dir, &template)?;
            let rendered = compiler::render(&text, &read(&inputs.params)?, &read(&inputs.csv)?)
                .with_context(|| format!("rendering {template}"))?;
            write_or_print(Some(&output), &rendered)?;
        }
        MainMenu::Embed {
            template,
            inputs,
            output,
        } => {
            let embedded = compiler::embed(&read(&template)?, &read(&inputs.csv)?, &read(&inputs.params)?);
            write_or_print(Some(&output), &embedded)?;
        }
    }
    Ok(())
}
