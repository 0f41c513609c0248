use anyhow::{anyhow, bail, Context, Result};
use log::{error, info};
use pincfg_tool::auth::hash_password;
use pincfg_tool::command::CliCommand;
use pincfg_tool::config::ToolConfig;
use pincfg_tool::model::{GlobalKey, SwitchKind};
use pincfg_tool::store::export_filename;
use pincfg_tool::{ChunkedOutput, DecodeOptions, Editor, SizeStatus};
use std::io::Read;
use std::path::Path;

const USAGE: &str = "Usage: pincfg-tool [--config PATH] <command> [args]

Commands:
  generate [CHUNK_SIZE]        Print the configuration text and transport lines
  parse <FILE|-> [--strict]    Decode wire text into the stored configuration
  validate <FILE|->            Check wire text, exit non-zero on errors
  export [FILE]                Write a JSON snapshot
  import <FILE>                Replace the configuration from a JSON snapshot
  password <TEXT>              Set the CLI password
  password-hash <HASH>         Set the CLI password hash directly
  command <NAME> [NEW_PWD]     Build a device CLI command
  global <KEY> <VALUE|off>     Set or disable a global (CD, CM, CR, CN, CA)
  add-switch <TYPE> [PIN]      Add a switch (S, SF, SI, SIF, ST, STF)
  add-input [PIN]              Add an input
  clear                        Remove all entities
  show                         Print the stored configuration as JSON";

#[tokio::main]
async fn main() -> Result<()> {
    init_logger();

    let mut args: Vec<String> = std::env::args().skip(1).collect();
    let explicit_config = match args.iter().position(|a| a == "--config") {
        Some(i) => {
            if i + 1 >= args.len() {
                bail!("--config needs a path\n\n{}", USAGE);
            }
            let path = args.remove(i + 1);
            args.remove(i);
            Some(path)
        }
        None => None,
    };

    let config_path = ToolConfig::resolve_path(explicit_config.as_deref());
    info!("Loading tool configuration from: {}", config_path.display());
    let tool = ToolConfig::load(&config_path)
        .context(format!("Failed to load config file: {}", config_path.display()))?;

    let mut editor = Editor::new(tool);

    let command = args.first().cloned().ok_or_else(|| anyhow!(USAGE))?;
    let arg = |n: usize| args.get(n).map(String::as_str);

    match command.as_str() {
        "generate" => {
            let generation = editor.generate();
            println!("{}", generation.encoded.display());
            let status = match generation.size_status {
                SizeStatus::Ok => "ok",
                SizeStatus::Warning => "warning",
                SizeStatus::Error => "too large",
            };
            println!(
                "Size: {} / {} bytes ({})",
                generation.encoded.size(),
                generation.max_size,
                status
            );
            let output = match arg(1) {
                Some(size) => {
                    let size: usize = size
                        .parse()
                        .context(format!("Invalid chunk size: {}", size))?;
                    editor.set_chunk_size(size).cloned().unwrap_or(generation.output)
                }
                None => generation.output,
            };
            print_chunks(&output);
        }
        "parse" => {
            let source = arg(1).ok_or_else(|| anyhow!("parse needs a file or -"))?;
            let text = read_input(source)?;
            let options = DecodeOptions {
                strict: args.iter().any(|a| a == "--strict"),
            };
            let skipped = editor.load_wire_text(&text, options).await?;
            let config = editor.config();
            info!(
                "Parsed {} switches, {} inputs, {} triggers, {} measurement sources, {} sensor reporters",
                config.switches.len(),
                config.inputs.len(),
                config.triggers.len(),
                config.measurement_sources.len(),
                config.sensor_reporters.len()
            );
            for record in skipped {
                println!("Skipped: {}", record);
            }
        }
        "validate" => {
            let source = arg(1).ok_or_else(|| anyhow!("validate needs a file or -"))?;
            let text = read_input(source)?;
            let errors = editor.validate(&text);
            if errors.is_empty() {
                println!("Configuration is valid");
            } else {
                for e in &errors {
                    error!("{}", e);
                    println!("{}", e);
                }
                std::process::exit(1);
            }
        }
        "export" => {
            let file = export_filename(arg(1));
            editor
                .export(Path::new(&file))
                .context(format!("Failed to export to {}", file))?;
            println!("{}", file);
        }
        "import" => {
            let file = arg(1).ok_or_else(|| anyhow!("import needs a file"))?;
            editor
                .import(Path::new(file))
                .context(format!("Error loading configuration file: {}", file))?;
        }
        "password" => {
            let text = arg(1).ok_or_else(|| anyhow!("password needs a value"))?;
            editor.set_password(text).await?;
            println!("{}", editor.config().auth_password_hash);
        }
        "password-hash" => {
            let hash = arg(1).ok_or_else(|| anyhow!("password-hash needs a value"))?;
            editor.set_password_hash(hash)?;
        }
        "command" => {
            let name = arg(1).ok_or_else(|| anyhow!("command needs a name"))?;
            let new_hash = match arg(2) {
                Some(new_password) => Some(hash_password(new_password).await?),
                None => None,
            };
            let command = CliCommand::parse(name, new_hash.as_deref())?;
            info!("{}", command.description());
            print_chunks(&editor.build_command(&command)?);
        }
        "global" => {
            let tag = arg(1).ok_or_else(|| anyhow!("global needs a key"))?;
            let key = GlobalKey::from_tag(tag).ok_or_else(|| anyhow!("Unknown global: {}", tag))?;
            match arg(2) {
                Some("off") => editor.set_global(key, None, Some(false))?,
                Some(value) => editor.set_global(key, Some(value), Some(true))?,
                None => bail!("global needs a value or off"),
            }
        }
        "add-switch" => {
            let tag = arg(1).ok_or_else(|| anyhow!("add-switch needs a type"))?;
            let kind = SwitchKind::from_tag(tag)
                .ok_or_else(|| anyhow!("Unknown switch type: {}", tag))?;
            let id = editor.add_switch(kind)?;
            if let Some(pin) = arg(2) {
                editor.update(|c| {
                    if let Some(sw) = c.switch_mut(id) {
                        sw.pin = pin.to_string();
                    }
                    Ok(())
                })?;
            }
            println!("{}", id);
        }
        "add-input" => {
            let id = editor.add_input()?;
            if let Some(pin) = arg(1) {
                editor.update(|c| {
                    if let Some(input) = c.input_mut(id) {
                        input.pin = pin.to_string();
                    }
                    Ok(())
                })?;
            }
            println!("{}", id);
        }
        "clear" => {
            editor.update(|c| {
                c.clear();
                Ok(())
            })?;
        }
        "show" => {
            println!("{}", serde_json::to_string_pretty(editor.config())?);
        }
        other => bail!("Unknown command: {}\n\n{}", other, USAGE),
    }

    Ok(())
}

fn read_input(source: &str) -> Result<String> {
    if source == "-" {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .context("Failed to read stdin")?;
        Ok(text)
    } else {
        std::fs::read_to_string(source).context(format!("Failed to read file: {}", source))
    }
}

fn print_chunks(output: &ChunkedOutput) {
    for line in output.chunks() {
        println!("{}", line);
    }
}

fn init_logger() {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info");
    }
    env_logger::init();
}
