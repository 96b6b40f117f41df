use itertools::Itertools;
use miette::{Diagnostic, GraphicalReportHandler, GraphicalTheme};

/// Renders a diagnostic exactly as a terminal without colour support would see it, minus any trailing whitespace
pub fn render_diagnostic(diagnostic: &dyn Diagnostic) -> String {
    let mut out = String::new();
    GraphicalReportHandler::new_themed(GraphicalTheme::unicode_nocolor())
        .with_width(80)
        .render_report(&mut out, diagnostic)
        .unwrap();
    out.lines().map(str::trim_end).join("\n")
}

macro_rules! assert_miette_snapshot {
    ($diag:expr, @$snapshot:literal) => {{
        use insta::{assert_snapshot, with_settings};

        let out = $crate::testing_tools::render_diagnostic(&$diag.unwrap_err());
        with_settings!({
            description => stringify!($diag)
        }, {
            assert_snapshot!(out, @$snapshot);
        });
    }};
}

pub(crate) use assert_miette_snapshot;
