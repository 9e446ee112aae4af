//! Rendermill CLI - render templates from the command line
//!
//! Commands: render, render-all
//! Outputs JSON to stdout, logs to stderr
//! Exit 1 on bad input or configuration, 2 on render failure

use clap::{Args, Parser, Subcommand, ValueEnum};
use serde_json::json;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use rendermill_core::{
    Interpolator, JsonE, OutputFormat, PipelineError, RenderPipeline, RenderRequest,
    TemplateEvaluator, ENGINE_VERSION,
};

#[derive(Parser)]
#[command(name = "rendermill-cli")]
#[command(version = ENGINE_VERSION)]
#[command(about = "Rendermill CLI - multi-document template renderer")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a template that holds exactly one document
    Render(RenderArgs),

    /// Render every document of a template
    RenderAll(RenderArgs),
}

#[derive(Args)]
struct RenderArgs {
    /// Request file (JSON or YAML) holding template, format and context
    #[arg(short, long, conflicts_with_all = ["template", "format", "vars", "yaml_context"])]
    request: Option<PathBuf>,

    /// Template file, `-` for stdin
    #[arg(short, long)]
    template: Option<PathBuf>,

    /// Output format: json or yaml
    #[arg(short, long)]
    format: Option<String>,

    /// Context variable as KEY=VALUE (string values, repeatable)
    #[arg(long = "var", value_name = "KEY=VALUE")]
    vars: Vec<String>,

    /// Context as YAML text, for numbers, booleans and nesting
    #[arg(long)]
    yaml_context: Option<String>,

    /// Template language
    #[arg(long, value_enum, default_value_t = EvaluatorKind::JsonE)]
    evaluator: EvaluatorKind,
}

#[derive(Clone, Copy, ValueEnum)]
enum EvaluatorKind {
    /// json-e operators and interpolation
    #[value(name = "json-e")]
    JsonE,
    /// `${...}` interpolation with helper calls
    Interpolate,
}

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "rendermill_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let (args, single) = match &cli.command {
        Commands::Render(args) => (args, true),
        Commands::RenderAll(args) => (args, false),
    };

    let evaluator: Box<dyn TemplateEvaluator> = match args.evaluator {
        EvaluatorKind::JsonE => Box::new(JsonE),
        EvaluatorKind::Interpolate => Box::new(Interpolator),
    };
    let pipeline = RenderPipeline::new(evaluator);

    let request = match build_request(args) {
        Ok(r) => r,
        Err(e) => {
            println!("{}", json!({ "error": e }));
            return ExitCode::FAILURE;
        }
    };

    let output = if single {
        pipeline
            .render_template(&request)
            .map(|r| json!({ "rendered": r.rendered, "id": r.id }))
    } else {
        pipeline
            .render_templates(&request)
            .map(|r| json!({ "rendered": r.rendered, "id": r.id }))
    };

    match output {
        Ok(output) => {
            println!("{:#}", output);
            ExitCode::SUCCESS
        }
        Err(e) => {
            println!("{}", json!({ "error": e.to_string() }));
            match e {
                PipelineError::Configuration(_) => ExitCode::FAILURE,
                _ => ExitCode::from(2),
            }
        }
    }
}

fn build_request(args: &RenderArgs) -> Result<RenderRequest, String> {
    if let Some(path) = &args.request {
        return RenderRequest::load(path).map_err(|e| e.to_string());
    }

    let path = args
        .template
        .as_deref()
        .ok_or_else(|| "either --template or --request is required".to_string())?;
    let mut request = RenderRequest::new(read_template(path)?);

    if let Some(format) = &args.format {
        request = request.with_format(format.parse::<OutputFormat>().map_err(|e| e.to_string())?);
    }

    for var in &args.vars {
        let (key, value) = var
            .split_once('=')
            .ok_or_else(|| format!("invalid --var '{}', expected KEY=VALUE", var))?;
        request = request.with_var(key, value);
    }

    if let Some(text) = &args.yaml_context {
        request = request.with_yaml_context(text.as_str());
    }

    Ok(request)
}

fn read_template(path: &Path) -> Result<String, String> {
    if path == Path::new("-") {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .map_err(|e| format!("Failed to read stdin: {}", e))?;
        return Ok(text);
    }
    std::fs::read_to_string(path).map_err(|e| format!("Failed to read {}: {}", path.display(), e))
}
