use chrono::Local;
use clap::{Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use log::{info, warn};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use subsector_override::catalog::Catalog;
use subsector_override::client::{HttpTransport, Notifier, Submitter};
use subsector_override::config::ClientConfig;
use subsector_override::download;
use subsector_override::form::{self, FormState, HtmlFormSink, TomlFormSink};
use subsector_override::payload;

#[derive(Parser)]
#[command(
    name = "subsector-override",
    about = "Submit per-subsector load overrides to the processing service"
)]
struct Cli {
    /// TOML file with endpoint / output_dir / timeout_secs
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum FormFormat {
    Html,
    Toml,
}

#[derive(Subcommand)]
enum Commands {
    /// List the known subsectors in form order
    Catalog,

    /// Render the override form
    Form {
        #[arg(long, value_enum, default_value = "toml")]
        format: FormFormat,

        /// Output file
        #[arg(long, default_value = "form.toml")]
        out: PathBuf,
    },

    /// Build the request from a filled-in form and send it
    Submit {
        /// Filled-in form (see `form --format toml`); blank form if omitted
        #[arg(long)]
        form: Option<PathBuf>,

        #[arg(long)]
        year: Option<String>,

        #[arg(long)]
        weather_year: Option<String>,

        #[arg(long)]
        scenario: Option<String>,

        /// State to apply overrides to (blank = all states)
        #[arg(long)]
        region: Option<String>,

        /// Override percentage, e.g. --set "cement=3.5"
        #[arg(long = "set", value_name = "SUBSECTOR=PERCENT")]
        overrides: Vec<String>,

        /// Fallback scenario, e.g. --fallback "cement=advanced"
        #[arg(long = "fallback", value_name = "SUBSECTOR=SCENARIO")]
        fallbacks: Vec<String>,

        /// Processing endpoint
        #[arg(long)]
        endpoint: Option<String>,

        /// Directory for custom_output.csv
        #[arg(long)]
        output_dir: Option<PathBuf>,

        /// Print the JSON payload instead of sending it
        #[arg(long)]
        dry_run: bool,

        /// Also write the payload as JSON next to the download
        #[arg(long)]
        save_payload: bool,
    },
}

fn load_form(
    catalog: &Catalog,
    path: Option<&PathBuf>,
    overrides: &[String],
    fallbacks: &[String],
) -> Result<FormState, form::FormError> {
    let mut state = match path {
        Some(p) => FormState::load(p)?.conform(catalog)?,
        None => FormState::blank(catalog),
    };

    for text in overrides {
        let (subsector, value) = form::parse_assignment(text)?;
        state.set_percent(subsector, value)?;
    }
    for text in fallbacks {
        let (subsector, value) = form::parse_assignment(text)?;
        state.set_scenario(subsector, value)?;
    }
    Ok(state)
}

fn spinner(endpoint: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner} {msg}") {
        pb.set_style(style);
    }
    pb.set_message(format!("POST {}", endpoint));
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Prints alerts to stderr without tearing the spinner line.
struct SpinnerNotifier<'a>(&'a ProgressBar);

impl Notifier for SpinnerNotifier<'_> {
    fn alert(&mut self, message: &str) {
        self.0.suspend(|| eprintln!("{}", message));
    }
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();
    let catalog = Catalog::default();

    let mut config = match &cli.config {
        Some(path) => match ClientConfig::load(path) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("{}", e);
                return ExitCode::FAILURE;
            }
        },
        None => ClientConfig::default(),
    };

    match cli.command {
        Commands::Catalog => {
            for (i, name) in catalog.iter().enumerate() {
                println!("{:>3}  {}", i + 1, name);
            }
        }

        Commands::Form { format, out } => {
            let contents = match format {
                FormFormat::Html => {
                    let mut sink = HtmlFormSink::with_endpoint(config.endpoint.as_str());
                    form::render_into(&catalog, &mut sink);
                    sink.into_html()
                }
                FormFormat::Toml => {
                    let mut sink = TomlFormSink::new();
                    form::render_into(&catalog, &mut sink);
                    match sink.into_toml() {
                        Ok(s) => s,
                        Err(e) => {
                            eprintln!("{}", e);
                            return ExitCode::FAILURE;
                        }
                    }
                }
            };
            match form::save_form(&contents, &out) {
                Ok(()) => println!("Wrote {} rows to {}", catalog.len(), out.display()),
                Err(e) => {
                    eprintln!("Error saving form: {}", e);
                    return ExitCode::FAILURE;
                }
            }
        }

        Commands::Submit {
            form,
            year,
            weather_year,
            scenario,
            region,
            overrides,
            fallbacks,
            endpoint,
            output_dir,
            dry_run,
            save_payload,
        } => {
            let mut state = match load_form(&catalog, form.as_ref(), &overrides, &fallbacks) {
                Ok(s) => s,
                Err(e) => {
                    eprintln!("{}", e);
                    return ExitCode::FAILURE;
                }
            };
            if let Some(v) = year {
                state.year = v;
            }
            if let Some(v) = weather_year {
                state.weather_year = v;
            }
            if let Some(v) = scenario {
                state.scenario = v;
            }
            if let Some(v) = region {
                state.region = v;
            }
            if let Some(v) = endpoint {
                config.endpoint = v;
            }
            if let Some(v) = output_dir {
                config.output_dir = v;
            }

            let (request, warnings) = payload::build_payload(&state);
            for w in &warnings {
                warn!("{}", w);
            }

            if dry_run {
                match serde_json::to_string_pretty(&request) {
                    Ok(json) => println!("{}", json),
                    Err(e) => {
                        eprintln!("Error encoding payload: {}", e);
                        return ExitCode::FAILURE;
                    }
                }
                return ExitCode::SUCCESS;
            }

            if save_payload {
                let name = format!("payload_{}.json", Local::now().format("%Y%m%d_%H%M%S"));
                let path = config.output_dir.join(name);
                match payload::save_payload_json(&request, &path) {
                    Ok(()) => info!("Saved payload to {}", path.display()),
                    Err(e) => warn!("Error saving payload: {}", e),
                }
            }

            let transport = match HttpTransport::new(config.timeout()) {
                Ok(t) => t,
                Err(e) => {
                    eprintln!("Error creating HTTP client: {}", e);
                    return ExitCode::FAILURE;
                }
            };
            let submitter = Submitter::new(transport, config.endpoint.as_str());

            let pb = spinner(submitter.endpoint());
            let result = submitter.submit(&request, &config.output_dir, &mut SpinnerNotifier(&pb));
            pb.finish_and_clear();

            match result {
                Ok(path) => match download::summarize_csv(&path) {
                    Ok(summary) => println!(
                        "Saved {} ({} columns, {} rows)",
                        path.display(),
                        summary.columns.len(),
                        summary.records
                    ),
                    Err(e) => {
                        warn!("Response is not readable as CSV: {}", e);
                        println!("Saved {}", path.display());
                    }
                },
                Err(_) => return ExitCode::FAILURE,
            }
        }
    }

    ExitCode::SUCCESS
}
