//! Builds the single `Hebi` instance the CLI drives every subcommand
//! through, and renders its errors with source snippets and, when the
//! output is a real terminal, ANSI color — matching the teacher's own
//! `report_errors` helper.

use hebi::Hebi;

pub fn build_hebi() -> Hebi {
  Hebi::builder().with_io(std::io::stdout()).build()
}

pub fn report_errors(source: &str, e: hebi::Error) {
  let color = supports_color::on(supports_color::Stream::Stderr)
    .map(|c| c.has_basic)
    .unwrap_or(false);
  eprint!("{}", e.report(source, color));
}
