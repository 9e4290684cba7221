use clap::Subcommand;

use crate::common::InputArgs;

#[derive(Clone, Debug, Subcommand)]
pub enum Command {
  /// Execute a Hebi file.
  Run(InputArgs),
  /// Execute a Hebi file (alias of `run`; the reserved `server` block is
  /// parsed but lowers to nothing, so the only difference is the banner).
  Serve(InputArgs),
  /// Parse a Hebi file without compiling or running it.
  Check(InputArgs),
  /// Disassemble a Hebi file.
  #[clap(visible_alias = "dis")]
  Disassemble(InputArgs),
  /// Print the version banner.
  Version,
}

impl Command {
  pub fn run(input: InputArgs) -> Self {
    Self::Run(input)
  }

  pub fn execute(self) -> anyhow::Result<()> {
    match self {
      Self::Run(input) => handle_run(input, "run"),
      Self::Serve(input) => handle_run(input, "serve"),
      Self::Check(input) => handle_check(input),
      Self::Disassemble(input) => handle_disassemble(input),
      Self::Version => handle_version(),
    }
  }
}

fn handle_run(input: InputArgs, banner: &str) -> anyhow::Result<()> {
  let source = input.source()?;
  let hebi = crate::hebi::build_hebi();
  match hebi.run(&source) {
    Ok(()) => Ok(()),
    Err(e) => {
      crate::hebi::report_errors(&source, e);
      anyhow::bail!("Failed to {banner} {}", input.name());
    }
  }
}

fn handle_check(input: InputArgs) -> anyhow::Result<()> {
  let source = input.source()?;
  let hebi = crate::hebi::build_hebi();
  match hebi.check(&source) {
    Ok(()) => {
      println!("OK: {}", input.name());
      Ok(())
    }
    Err(e) => {
      crate::hebi::report_errors(&source, e);
      println!("FAIL: {}", input.name());
      Ok(())
    }
  }
}

fn handle_disassemble(input: InputArgs) -> anyhow::Result<()> {
  let source = input.source()?;
  let hebi = crate::hebi::build_hebi();
  match hebi.disassemble(&source) {
    Ok(text) => {
      println!("{text}");
      Ok(())
    }
    Err(e) => {
      crate::hebi::report_errors(&source, e);
      anyhow::bail!("Failed to disassemble {}", input.name());
    }
  }
}

fn handle_version() -> anyhow::Result<()> {
  println!("hebi {}", env!("CARGO_PKG_VERSION"));
  Ok(())
}
