use std::{env, fmt::Write, fs, sync::LazyLock};

use isochem::{AtomicDatabase, Composition, Config, MassReport, Result};
use miette::{Diagnostic, GraphicalReportHandler, GraphicalTheme, IntoDiagnostic};
use rustyline::DefaultEditor;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

static DB: LazyLock<AtomicDatabase> = LazyLock::new(AtomicDatabase::default);

/// Names a JSON file of settings for mixtures, empirical formulas, and spectra
const CONFIG_VARIABLE: &str = "MOLMASS_CONFIG";

fn main() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let config = load_config()?;
    let mut rl = DefaultEditor::new().into_diagnostic()?;
    while let Ok(formula) = rl.readline("Formula: ") {
        let formula = formula.trim();
        if formula.is_empty() {
            continue;
        }
        rl.add_history_entry(formula).into_diagnostic()?;
        match molecule_info(formula, &config) {
            Ok(info) => println!("{info}"),
            Err(diagnostic) => render_error(*diagnostic),
        }
    }
    Ok(())
}

fn load_config() -> miette::Result<Config> {
    let Ok(path) = env::var(CONFIG_VARIABLE) else {
        debug!("{CONFIG_VARIABLE} is unset, so the default configuration will be used");
        return Ok(Config::default());
    };
    let text = fs::read_to_string(&path).into_diagnostic()?;
    let config = Config::from_json(&path, text).map_err(|e| miette::Report::new(*e))?;
    info!(%path, "loaded configuration");
    Ok(config)
}

fn molecule_info(formula: &str, config: &Config) -> Result<String> {
    let mut buf = String::new();
    let composition = Composition::new_with_config(&DB, formula, &config.mixture)?;
    let report = MassReport::compute_with_config(&composition, &config.empirical);

    // SAFETY: Writing to a `String` never fails
    writeln!(buf, "{report}\n").unwrap();
    writeln!(buf, "{}\n", composition.records()).unwrap();
    match composition.spectrum(&config.spectrum) {
        Ok(spectrum) => writeln!(buf, "{spectrum}").unwrap(),
        // NOTE: Masses are still worth printing for formulas that can't produce a spectrum
        Err(error) => {
            print!("{buf}");
            return Err(Box::new(error.into()));
        }
    }

    Ok(buf)
}

fn render_error(diagnostic: impl Into<Box<dyn Diagnostic + 'static>>) {
    let mut buf = String::new();
    // SAFETY: Rendering into a `String` never fails
    GraphicalReportHandler::new_themed(GraphicalTheme::unicode())
        .render_report(&mut buf, diagnostic.into().as_ref())
        .unwrap();
    println!("{buf}");
}
