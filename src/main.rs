// SPDX-License-Identifier: MIT

use aiworks_rs::adk::agent::{AgentFactory, AgentSpec};
use aiworks_rs::adk::chat::ChatSession;
use aiworks_rs::adk::model::gemini::GeminiModel;
use aiworks_rs::adk::model::ModelProvider;
use aiworks_rs::works::codegen::{self, templates, Language};
use aiworks_rs::works::config::Config;
use aiworks_rs::works::engine::{ExecutionEvent, ExecutionStatus, WorkflowRunner};
use aiworks_rs::works::executor::ExecutorRegistry;
use aiworks_rs::works::server;
use aiworks_rs::works::workflow::WorkflowLoader;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use serde_json::Value;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Model used for AI features (overrides AIWORKS_MODEL)
    #[arg(short, long, global = true)]
    model: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Chat with the model interactively
    Chat {
        /// System instructions for the conversation
        #[arg(short, long)]
        system: Option<String>,
    },
    /// Run a workflow file (YAML or JSON)
    Run {
        /// Path to the workflow file
        file: PathBuf,

        /// Input to the workflow; parsed as JSON when possible
        #[arg(short, long)]
        input: Option<String>,

        /// Print progress events while running
        #[arg(long)]
        stream: bool,

        /// Print the whole execution context as JSON
        #[arg(long)]
        json: bool,
    },
    /// Check a workflow file for structural problems
    Validate {
        /// Path to the workflow file
        file: PathBuf,
    },
    /// Start the HTTP API
    Serve {
        /// Port to listen on (overrides AIWORKS_PORT)
        #[arg(short, long)]
        port: Option<u16>,

        /// Where workflows and executions are stored (overrides AIWORKS_DATA_DIR)
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },
    /// Generate source code for a workflow or an agent definition
    Codegen {
        /// Workflow file, or agent file with --agent
        file: PathBuf,

        /// python, typescript or rust
        #[arg(short, long, default_value = "python")]
        language: Language,

        /// Treat the file as an agent definition
        #[arg(long)]
        agent: bool,

        /// Write to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// List built-in templates, or print one
    Templates {
        /// Template id to print as YAML
        id: Option<String>,
    },
    /// Draft a workflow from a description using the model
    Generate {
        /// What the workflow should do
        description: String,

        /// Write the workflow JSON here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Run an agent or team definition
    Agent {
        /// Path to the agent YAML file
        file: PathBuf,

        /// Input for the agent
        #[arg(short, long)]
        input: String,
    },
    /// Check that the configured API key works
    CheckKey,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    env_logger::init();

    let args = Args::parse();
    let mut config = Config::from_env()?;
    if let Some(model) = args.model {
        config.model = model;
    }

    match args.command {
        Commands::Chat { system } => chat(&config, system).await?,
        Commands::Run {
            file,
            input,
            stream,
            json,
        } => run(&config, &file, input.as_deref(), stream, json).await?,
        Commands::Validate { file } => {
            let workflow = WorkflowLoader::load(&file)?;
            let report = workflow.validate();
            for warning in &report.warnings {
                println!("warning: {}", warning);
            }
            for error in &report.errors {
                println!("error: {}", error);
            }
            if !report.is_valid() {
                bail!("{} has {} error(s)", file.display(), report.errors.len());
            }
            println!("{} is valid", workflow.name);
        }
        Commands::Serve { port, data_dir } => {
            if let Some(port) = port {
                config.port = port;
            }
            if let Some(data_dir) = data_dir {
                config.data_dir = data_dir;
            }
            server::serve(config).await?;
        }
        Commands::Codegen {
            file,
            language,
            agent,
            output,
        } => {
            let code = if agent {
                match AgentFactory::load_spec(&file)? {
                    AgentSpec::Agent(def) => codegen::generate_agent_code(&def, language),
                    AgentSpec::Team(team) => {
                        bail!("'{}' is a team; code generation needs a single agent", team.name)
                    }
                }
            } else {
                codegen::generate_workflow_code(&WorkflowLoader::load(&file)?, language)
            };
            emit(&code, output.as_deref())?;
        }
        Commands::Templates { id: None } => {
            for template in templates::builtin() {
                println!(
                    "{:<18} {}",
                    template.id, template.workflow.description
                );
            }
        }
        Commands::Templates { id: Some(id) } => {
            let workflow = templates::instantiate(&id)
                .with_context(|| format!("No template named '{}'", id))?;
            print!("{}", serde_yaml::to_string(&workflow)?);
        }
        Commands::Generate {
            description,
            output,
        } => {
            let model = config.require_model_provider()?.model(None)?;
            let workflow = codegen::generate_workflow(model.as_ref(), &description).await?;
            emit(&serde_json::to_string_pretty(&workflow)?, output.as_deref())?;
        }
        Commands::Agent { file, input } => {
            let spec = AgentFactory::load_spec(&file)?;
            let factory = AgentFactory::new(config.require_model_provider()?);
            let agent = factory.build(&spec)?;
            println!("Running agent: {}", agent.name());
            let response = agent.run(input).await?;
            println!("{}", response);
        }
        Commands::CheckKey => {
            let api_key = config
                .api_key
                .clone()
                .context("GOOGLE_API_KEY (or GEMINI_API_KEY) is not set")?;
            let model = GeminiModel::with_api_key(api_key, config.model.clone())?
                .with_base_url(config.api_base.clone());
            let count = model.validate_key().await?;
            println!("API key is valid ({} models available)", count);
        }
    }

    Ok(())
}

async fn run(
    config: &Config,
    file: &Path,
    input: Option<&str>,
    stream: bool,
    json: bool,
) -> anyhow::Result<()> {
    let workflow = WorkflowLoader::load(file)?;
    let models = config
        .model_provider()
        .map(|p| p as Arc<dyn ModelProvider>);
    let registry = ExecutorRegistry::with_builtins(models, config.max_delay_ms);
    let runner = WorkflowRunner::new(registry).with_max_steps(config.max_steps);
    let input = input.map(parse_input).unwrap_or(Value::Null);

    log::info!("Running workflow: {}", workflow.name);
    let ctx = if stream {
        let (tx, mut rx) = mpsc::channel(100);
        let printer = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                print_event(&event);
            }
        });
        let ctx = runner.run_with_events(&workflow, input, tx).await;
        printer.await?;
        ctx?
    } else {
        runner.run(&workflow, input).await?
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&ctx)?);
    } else if let Some(output) = &ctx.final_output {
        match output {
            Value::String(s) => println!("{}", s),
            other => println!("{}", serde_json::to_string_pretty(other)?),
        }
    }

    if ctx.status == ExecutionStatus::Failed {
        bail!(ctx.error.unwrap_or_else(|| "Execution failed".to_string()));
    }
    Ok(())
}

fn print_event(event: &ExecutionEvent) {
    match event {
        ExecutionEvent::NodeStarted { node_id, node_type } => {
            eprintln!("> {} ({})", node_id, node_type)
        }
        ExecutionEvent::NodeCompleted {
            node_id,
            duration_ms,
            ..
        } => eprintln!("  {} done in {}ms", node_id, duration_ms),
        ExecutionEvent::NodeFailed { node_id, error } => eprintln!("! {}: {}", node_id, error),
        ExecutionEvent::Log(entry) => eprintln!("  [{:?}] {}", entry.level, entry.message),
        ExecutionEvent::Started { .. }
        | ExecutionEvent::Completed { .. }
        | ExecutionEvent::Failed { .. } => {}
    }
}

async fn chat(config: &Config, system: Option<String>) -> anyhow::Result<()> {
    let model = config.require_model_provider()?.model(None)?;
    println!("Chatting with {} (/reset clears history, /exit quits)", model.model_name());

    let mut session = ChatSession::new(model);
    if let Some(system) = system {
        session = session.with_system(system);
    }

    let stdin = std::io::stdin();
    loop {
        print!("you> ");
        std::io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        match line.trim() {
            "" => continue,
            "/exit" | "/quit" => break,
            "/reset" => {
                session.reset();
                println!("(history cleared)");
            }
            message => match session.send(message).await {
                Ok(reply) => println!("model> {}\n", reply),
                Err(e) => eprintln!("error: {}", e),
            },
        }
    }
    Ok(())
}

/// CLI input is JSON when it parses, a plain string otherwise
fn parse_input(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

fn emit(content: &str, output: Option<&Path>) -> anyhow::Result<()> {
    match output {
        Some(path) => {
            std::fs::write(path, content)
                .with_context(|| format!("failed to write {}", path.display()))?;
            eprintln!("Wrote {}", path.display());
        }
        None => println!("{}", content),
    }
    Ok(())
}
