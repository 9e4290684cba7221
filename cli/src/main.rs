use clap::{CommandFactory, Parser};
use hebi_cli::commands::Command;
use hebi_cli::common::InputArgs;

#[derive(Debug, Parser)]
#[clap(name = "hebi", version)]
pub struct App {
  #[clap(subcommand)]
  command: Option<Command>,

  /// A bare file argument is treated as `run <file>`.
  file: Option<std::path::PathBuf>,
}

fn main() -> anyhow::Result<()> {
  let app = App::parse();

  let command = match (app.command, app.file) {
    (Some(command), _) => command,
    (None, Some(path)) => Command::run(InputArgs::from_path(path)),
    (None, None) => {
      App::command().print_help()?;
      println!();
      return Ok(());
    }
  };

  command.execute()?;

  Ok(())
}
