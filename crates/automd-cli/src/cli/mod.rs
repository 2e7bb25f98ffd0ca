mod commands;

use automd_core::domain::MdError;
use clap::Parser;

pub fn run_from_env() -> i32 {
    let args: Vec<String> = std::env::args().collect();
    match parse_and_dispatch(args) {
        Ok(code) => code,
        Err(error) => {
            let md_error = error.as_md_error();
            eprintln!("{}", md_error.diagnostic_line());
            if let Some(diagnostic) = md_error.diagnostic() {
                if !diagnostic.is_empty() {
                    eprintln!("--- tool output ---\n{}", diagnostic);
                }
            }
            md_error.exit_code()
        }
    }
}

fn parse_and_dispatch(args: Vec<String>) -> Result<i32, CliError> {
    match Cli::try_parse_from(&args) {
        Ok(cli) => dispatch_parsed(cli.command),
        Err(err) => match err.kind() {
            clap::error::ErrorKind::DisplayHelp | clap::error::ErrorKind::DisplayVersion => {
                print!("{}", err);
                Ok(0)
            }
            _ => Err(CliError::Usage(err.to_string())),
        },
    }
}

#[derive(Parser)]
#[command(name = "automd-rs", about = "GROMACS molecular-dynamics run orchestrator")]
struct Cli {
    #[command(subcommand)]
    command: CliCommand,
}

#[derive(clap::Subcommand)]
enum CliCommand {
    /// Run the full pipeline for one structure and print the result record
    Run(commands::RunArgs),
    /// Generate a UFF topology for a structure without running the engine
    GenTop(commands::GenTopArgs),
    /// Generate a run-control file from the configuration flags
    GenMdrun(commands::GenMdrunArgs),
    /// Run the full pipeline and write one xyz file per trajectory frame
    Isomers(commands::RunArgs),
}

fn dispatch_parsed(command: CliCommand) -> Result<i32, CliError> {
    match command {
        CliCommand::Run(args) => commands::run_run_command(args),
        CliCommand::GenTop(args) => commands::run_gen_top_command(args),
        CliCommand::GenMdrun(args) => commands::run_gen_mdrun_command(args),
        CliCommand::Isomers(args) => commands::run_isomers_command(args),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("{0}")]
    Usage(String),
    #[error("{0}")]
    Compute(MdError),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl CliError {
    fn as_md_error(&self) -> MdError {
        match self {
            Self::Usage(message) => MdError::config("CONFIG.CLI_USAGE", message.clone()),
            Self::Compute(error) => error.clone(),
            Self::Internal(error) => MdError::internal("SYS.CLI", format!("{error:#}")),
        }
    }
}
