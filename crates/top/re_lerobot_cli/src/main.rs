use std::process::ExitCode;

use clap::Parser as _;

use re_lerobot_cli::RemoveEpisodesCommand;

fn main() -> ExitCode {
    re_log::setup_logging();

    let command = RemoveEpisodesCommand::parse();
    match command.run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            re_log::error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}
