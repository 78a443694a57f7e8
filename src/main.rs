// Flowdeck — Schema-driven workflow input forms and execution console
// License: Apache-2.0

use anyhow::Context;
use clap::{Parser, Subcommand};
use flowdeck::config::Config;
use flowdeck::console::{ConsoleError, WorkflowConsole};
use flowdeck::notify::{Notifier, Placement, TerminalNotifier};
use flowdeck::rpc::http::JsonRpcBackend;
use flowdeck::rpc::{resolve_workflow, WorkflowBackend, WorkflowInfo};
use flowdeck::schema::{FieldDescriptor, PropertyKind, Widget};
use flowdeck::session::{FormSession, InputMode};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;

const LOGO: &str = "⚡";

// ---------------------------------------------------------------------------
// CLI definition
// ---------------------------------------------------------------------------

#[derive(Parser)]
#[command(
    name = "flowdeck",
    about = "Flowdeck — Fill in and run workflows from their input schema",
    version
)]
struct Cli {
    /// Config file path
    #[arg(short, long, global = true)]
    config: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args)]
struct WorkflowArgs {
    /// Workflow name
    name: String,
    /// Workflow namespace
    #[arg(short, long)]
    namespace: Option<String>,
    /// Workflow version (default: last listed)
    #[arg(long)]
    version: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// List workflows known to the backend
    List,
    /// Show the input form of a workflow
    Schema {
        #[command(flatten)]
        workflow: WorkflowArgs,
    },
    /// Fill in a workflow's input and execute it
    Run {
        #[command(flatten)]
        workflow: WorkflowArgs,
        /// Set a form field (repeatable): --set field=value
        #[arg(short, long = "set", value_name = "FIELD=VALUE")]
        set: Vec<String>,
        /// Raw input text, for workflows without an input schema
        #[arg(short, long, conflicts_with = "input_file")]
        input: Option<String>,
        /// Read raw input from a file
        #[arg(long)]
        input_file: Option<PathBuf>,
        /// Prompt for each field before running
        #[arg(long)]
        interactive: bool,
        /// Also write the output to this file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Show version information
    Version,
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() {
    flowdeck::logger::init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::List => list_cmd(cli.config).await,
        Commands::Schema { workflow } => schema_cmd(cli.config, workflow).await,
        Commands::Run {
            workflow,
            set,
            input,
            input_file,
            interactive,
            output,
        } => {
            run_cmd(
                cli.config,
                workflow,
                RunOptions {
                    set,
                    input,
                    input_file,
                    interactive,
                    output,
                },
            )
            .await
        }
        Commands::Version => {
            version_cmd();
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("{} Error: {:#}", LOGO, e);
        std::process::exit(1);
    }
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

async fn list_cmd(config_path: Option<String>) -> anyhow::Result<()> {
    let backend = create_backend(config_path.as_deref())?;
    let workflows = backend.get_workflows().await?;

    println!("{} {} workflow(s)\n", LOGO, workflows.len());
    for w in &workflows {
        println!("  {}", w.id);
        if let Some(desc) = w.description.as_deref().filter(|d| !d.is_empty()) {
            println!("      {}", desc);
        }
    }
    Ok(())
}

async fn schema_cmd(config_path: Option<String>, workflow: WorkflowArgs) -> anyhow::Result<()> {
    let cfg = load_config(config_path.as_deref())?;
    let backend: Arc<dyn WorkflowBackend> = Arc::new(JsonRpcBackend::new(&cfg.backend)?);
    let info = find_workflow(backend.as_ref(), &workflow).await?;

    let mut console = WorkflowConsole::new(backend, Arc::new(TerminalNotifier));
    let session = console
        .select_and_load(info)
        .await
        .context("session closed while loading schema")?;

    print_header(session.info());
    match session.input() {
        InputMode::Schema(form) => {
            println!("Fields:");
            for field in form.fields() {
                println!("  {:<28} {}", field.label(), describe_field(field));
            }
            println!("\nDefault input:\n{}", form.canonical_text());
        }
        InputMode::Raw(_) => {
            println!("No usable input schema: input is sent as raw text.");
        }
    }
    Ok(())
}

struct RunOptions {
    set: Vec<String>,
    input: Option<String>,
    input_file: Option<PathBuf>,
    interactive: bool,
    output: Option<PathBuf>,
}

async fn run_cmd(
    config_path: Option<String>,
    workflow: WorkflowArgs,
    opts: RunOptions,
) -> anyhow::Result<()> {
    let cfg = load_config(config_path.as_deref())?;
    let backend: Arc<dyn WorkflowBackend> = Arc::new(JsonRpcBackend::new(&cfg.backend)?);
    let notifier: Arc<dyn Notifier> = Arc::new(TerminalNotifier);
    let info = find_workflow(backend.as_ref(), &workflow).await?;

    let mut console = WorkflowConsole::new(backend, notifier.clone())
        .with_execution_timeout(cfg.execution.timeout());
    console.select_and_load(info).await;

    let raw_text = match (&opts.input, &opts.input_file) {
        (Some(text), _) => Some(text.clone()),
        (None, Some(path)) => Some(
            std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?,
        ),
        (None, None) => None,
    };
    if let Some(text) = raw_text {
        console.set_raw_input(text)?;
    }

    for assignment in &opts.set {
        let (name, value) = assignment
            .split_once('=')
            .with_context(|| format!("expected FIELD=VALUE, got '{}'", assignment))?;
        let signal = match field_of(&console, name) {
            Some(field) => widget_signal(&field, value),
            None => Value::String(value.to_string()),
        };
        // Rejected edits are already reported; the last valid value stays.
        if let Err(e @ (ConsoleError::NoSession | ConsoleError::RawMode(_))) =
            console.edit_field(name, &signal)
        {
            return Err(e.into());
        }
    }

    if opts.interactive {
        prompt_input(&mut console)?;
    }

    if let Some(session) = console.session() {
        print_header(session.info());
    }

    let outcome = console.execute().await.map(str::to_string);
    println!("{}", console.output());

    if let Some(path) = &opts.output {
        std::fs::write(path, console.output())
            .with_context(|| format!("failed to write {}", path.display()))?;
        notifier.show_success_message(&format!("{} written.", path.display()), Placement::BottomEnd);
    }

    match outcome {
        Ok(_) => Ok(()),
        Err(ConsoleError::Execution(_)) => std::process::exit(1),
        Err(e) => Err(e.into()),
    }
}

fn version_cmd() {
    println!("{} Flowdeck v{}", LOGO, flowdeck::VERSION);
}

// ---------------------------------------------------------------------------
// Interactive input
// ---------------------------------------------------------------------------

/// Prompt for every form field, or for a raw input block without a schema.
fn prompt_input(console: &mut WorkflowConsole) -> anyhow::Result<()> {
    let mut rl = rustyline::DefaultEditor::new()?;

    let fields: Vec<FieldDescriptor> = match console.session().and_then(FormSession::form) {
        Some(form) => form.fields().to_vec(),
        None => {
            println!("Enter raw input, finish with an empty line:");
            let mut lines = Vec::new();
            loop {
                match rl.readline("… ") {
                    Ok(line) if line.is_empty() => break,
                    Ok(line) => lines.push(line),
                    Err(rustyline::error::ReadlineError::Eof) => break,
                    Err(e) => return Err(e.into()),
                }
            }
            console.set_raw_input(lines.join("\n"))?;
            return Ok(());
        }
    };

    println!("Press Enter to keep the current value.\n");
    for field in &fields {
        loop {
            let current = console
                .session()
                .and_then(FormSession::form)
                .map(|f| f.display_value(&field.name))
                .unwrap_or_default();
            let prompt = format!("{} [{}]: ", field.label(), describe_field(field));
            let line = match rl.readline_with_initial(&prompt, (current.as_str(), "")) {
                Ok(line) => line,
                Err(rustyline::error::ReadlineError::Eof) => return Ok(()),
                Err(rustyline::error::ReadlineError::Interrupted) => {
                    anyhow::bail!("input cancelled")
                }
                Err(e) => return Err(e.into()),
            };
            if line == current {
                break;
            }
            // Invalid input is reported by the console; ask again.
            if console.edit_field(&field.name, &widget_signal(field, &line)).is_ok() {
                break;
            }
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn load_config(path: Option<&str>) -> anyhow::Result<Config> {
    let config_path = if let Some(p) = path {
        PathBuf::from(p)
    } else {
        Config::default_path().unwrap_or_else(|_| PathBuf::from("config.json"))
    };

    let cfg = Config::load(&config_path).unwrap_or_else(|e| {
        tracing::warn!("Failed to load config: {}, using defaults", e);
        Config::default()
    });
    cfg.validate()?;
    Ok(cfg)
}

fn create_backend(config_path: Option<&str>) -> anyhow::Result<JsonRpcBackend> {
    let cfg = load_config(config_path)?;
    Ok(JsonRpcBackend::new(&cfg.backend)?)
}

async fn find_workflow(
    backend: &dyn WorkflowBackend,
    args: &WorkflowArgs,
) -> anyhow::Result<WorkflowInfo> {
    resolve_workflow(
        backend,
        &args.name,
        args.namespace.as_deref(),
        args.version.as_deref(),
    )
    .await?
    .with_context(|| format!("workflow '{}' not found", args.name))
}

fn field_of(console: &WorkflowConsole, name: &str) -> Option<FieldDescriptor> {
    console
        .session()
        .and_then(FormSession::form)
        .and_then(|f| f.field(name))
        .cloned()
}

/// What the field's widget would emit for typed text.
fn widget_signal(field: &FieldDescriptor, text: &str) -> Value {
    match field.kind.widget() {
        Widget::Checkbox => Value::Bool(matches!(
            text.trim().to_ascii_lowercase().as_str(),
            "true" | "yes" | "y" | "1" | "on" | "x"
        )),
        Widget::ComboBox => field
            .enum_values()
            .and_then(|values| values.iter().find(|v| enum_label(v) == text))
            .cloned()
            .unwrap_or_else(|| Value::String(text.to_string())),
        _ => Value::String(text.to_string()),
    }
}

fn enum_label(value: &Value) -> String {
    value
        .as_str()
        .map(str::to_string)
        .unwrap_or_else(|| value.to_string())
}

fn describe_field(field: &FieldDescriptor) -> String {
    match &field.kind {
        PropertyKind::Enum(values) => {
            let choices: Vec<String> = values.iter().map(enum_label).collect();
            format!("one of: {}", choices.join(", "))
        }
        kind => kind.type_name().to_string(),
    }
}

fn print_header(info: &WorkflowInfo) {
    println!("{} {}", LOGO, info.id.name);
    println!("   Namespace: {} · Version: {}", info.id.namespace, info.id.version);
    if let Some(desc) = info.description.as_deref().filter(|d| !d.is_empty()) {
        println!("   {}", desc);
    }
    println!();
}
