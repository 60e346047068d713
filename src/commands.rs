//! Command execution.

use crate::config::Config;
use crate::dump;
use crate::{CommandAction, Commands, ConfigAction, PackageAction};
use colored::Colorize;
use marshal_buffer::Codec;
use marshal_protocol::{
    decode_message, encode_command, read_package_header, scan_packages, write_package_header_file,
    CommandStructure, Message, Package, PackageHeader,
};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use tokio::io::BufReader;

type CommandResult = Result<String, Box<dyn std::error::Error>>;

/// Shared state for one invocation.
pub struct Context {
    pub config: Config,
    pub codec: Codec<'static>,
    pub json: bool,
    pub hex: bool,
}

impl Context {
    pub fn new(config: Config, json: bool, hex: bool) -> Self {
        let codec = Codec::new().with_max_managed_length(config.codec.max_managed_length);
        Self {
            config,
            codec,
            json,
            hex,
        }
    }

    fn package_dir(&self, dir: Option<PathBuf>) -> PathBuf {
        dir.unwrap_or_else(|| self.config.packages.directory.clone())
    }

    fn extension(&self) -> &str {
        &self.config.packages.extension
    }
}

/// Executes a command and returns the formatted output.
pub async fn execute(ctx: &Context, cmd: Commands) -> CommandResult {
    match cmd {
        Commands::Command(CommandAction::Encode {
            region,
            subcommand,
            args,
            output,
        }) => encode(ctx, CommandStructure::new(region, subcommand, args), &output).await,

        Commands::Command(CommandAction::Decode { file }) => decode(ctx, &file).await,

        Commands::Package(PackageAction::Create {
            name,
            version,
            output,
        }) => create_package(ctx, PackageHeader::new(name, version), ctx.package_dir(output)).await,

        Commands::Package(PackageAction::Inspect { file }) => inspect_package(ctx, &file).await,

        Commands::Package(PackageAction::List { dir }) => list_packages(ctx, &ctx.package_dir(dir)).await,

        Commands::Config(ConfigAction::Show) => show_config(ctx),

        Commands::Config(ConfigAction::Save { output }) => save_config(ctx, &output),

        Commands::Dump {
            file,
            shape,
            offset,
        } => dump_message(ctx, &file, &shape, offset).await,
    }
}

async fn encode(ctx: &Context, command: CommandStructure, output: &Path) -> CommandResult {
    let bytes = encode_command(&ctx.codec, &command)?;
    tokio::fs::write(output, &bytes).await?;
    tracing::info!(path = %output.display(), bytes = bytes.len(), "wrote command message");

    if ctx.json {
        let mut value = json!({
            "path": output.display().to_string(),
            "bytes": bytes.len(),
            "command": command,
        });
        if ctx.hex {
            value["hex"] = json!(hex::encode(&bytes));
        }
        return Ok(format_json(&value));
    }

    let mut out = format!(
        "{} command message ({} bytes) to {}",
        "Wrote".green(),
        bytes.len(),
        output.display().to_string().cyan()
    );
    if ctx.hex {
        out.push('\n');
        out.push_str(&hex::encode(&bytes));
    }
    Ok(out)
}

async fn decode(ctx: &Context, file: &Path) -> CommandResult {
    let bytes = tokio::fs::read(file).await?;
    let (message, consumed) = decode_message(&ctx.codec, &bytes)?;

    if ctx.json {
        let mut value = json!({
            "message": message,
            "bytes": consumed,
            "trailing": bytes.len() - consumed,
        });
        if ctx.hex {
            value["hex"] = json!(hex::encode(&bytes[..consumed]));
        }
        return Ok(format_json(&value));
    }

    let mut out = match &message {
        Message::Command(command) => format!(
            "{}\n  region:     {}\n  subcommand: {}\n  arguments:  {}",
            "Command".bold(),
            command.region.cyan(),
            command.subcommand.cyan(),
            command.arguments
        ),
        Message::Package(header) => format!("{}\n{}", "Package".bold(), format_header(header)),
    };
    if consumed < bytes.len() {
        out.push_str(&format!(
            "\n{}: {} trailing bytes",
            "Note".yellow(),
            bytes.len() - consumed
        ));
    }
    if ctx.hex {
        out.push('\n');
        out.push_str(&hex::encode(&bytes[..consumed]));
    }
    Ok(out)
}

async fn create_package(ctx: &Context, header: PackageHeader, dir: PathBuf) -> CommandResult {
    tokio::fs::create_dir_all(&dir).await?;
    let package = write_package_header_file(&ctx.codec, &dir, ctx.extension(), &header).await?;

    if ctx.json {
        return Ok(format_json(&json!(package)));
    }
    Ok(format!(
        "{} package {} v{} at {}",
        "Created".green(),
        package.name.cyan(),
        package.version,
        package.location.display()
    ))
}

async fn inspect_package(ctx: &Context, file: &Path) -> CommandResult {
    let mut reader = BufReader::new(tokio::fs::File::open(file).await?);
    let header = read_package_header(&ctx.codec, &mut reader).await?;

    let encoded = if ctx.hex {
        Some(hex::encode(ctx.codec.encode_managed(&header)?))
    } else {
        None
    };

    if ctx.json {
        let mut value = json!({
            "header": header,
            "signature": format!("{:#010x}", header.signature),
            "location": file.display().to_string(),
        });
        if let Some(hex) = encoded {
            value["hex"] = json!(hex);
        }
        return Ok(format_json(&value));
    }

    let mut out = format!(
        "{}\n{}",
        format!("Package {}", file.display()).bold(),
        format_header(&header)
    );
    if let Some(hex) = encoded {
        out.push('\n');
        out.push_str(&hex);
    }
    Ok(out)
}

async fn list_packages(ctx: &Context, dir: &Path) -> CommandResult {
    let packages = scan_packages(&ctx.codec, dir, ctx.extension()).await?;

    if ctx.json {
        return Ok(format_json(&json!(packages)));
    }
    if packages.is_empty() {
        return Ok(format!("No packages in {}", dir.display()).yellow().to_string());
    }

    let lines: Vec<String> = packages.iter().map(format_package_line).collect();
    Ok(lines.join("\n"))
}

async fn dump_message(ctx: &Context, file: &Path, shape: &[String], offset: usize) -> CommandResult {
    let identities = dump::parse_shape(shape)?;
    let bytes = tokio::fs::read(file).await?;
    if offset > bytes.len() {
        return Err(format!("offset {} is past the end of the file ({} bytes)", offset, bytes.len()).into());
    }
    let bytes = &bytes[offset..];

    let mut reader = ctx.codec.managed_reader();
    for identity in &identities {
        reader.add_identity(*identity)?;
    }
    let header_size = reader.schema().header_size();
    let (values, consumed) = reader.decode(bytes)?;

    let members: Vec<(String, String, Value)> = values
        .into_iter()
        .map(|(identity, value)| {
            let (text, json) = dump::render(identity, value.as_ref());
            (identity.short_name().to_string(), text, json)
        })
        .collect();

    if ctx.json {
        let mut value = json!({
            "members": members
                .iter()
                .map(|(ty, _, v)| json!({ "type": ty, "value": v }))
                .collect::<Vec<_>>(),
            "header_bytes": header_size,
            "body_bytes": consumed - header_size,
            "trailing": bytes.len() - consumed,
        });
        if ctx.hex {
            value["header_hex"] = json!(hex::encode(&bytes[..header_size]));
            value["body_hex"] = json!(hex::encode(&bytes[header_size..consumed]));
        }
        return Ok(format_json(&value));
    }

    let mut out = format!(
        "{} ({} header + {} body bytes)",
        "Message".bold(),
        header_size,
        consumed - header_size
    );
    for (index, (ty, text, _)) in members.iter().enumerate() {
        out.push_str(&format!("\n  [{}] {:<10} {}", index, ty.dimmed(), text));
    }
    if ctx.hex {
        out.push_str(&format!(
            "\n  header: {}\n  body:   {}",
            hex::encode(&bytes[..header_size]),
            hex::encode(&bytes[header_size..consumed])
        ));
    }
    Ok(out)
}

fn show_config(ctx: &Context) -> CommandResult {
    if ctx.json {
        return Ok(format_json(&json!(ctx.config)));
    }
    Ok(serde_yaml::to_string(&ctx.config)?.trim_end().to_string())
}

fn save_config(ctx: &Context, output: &Path) -> CommandResult {
    ctx.config.save(output)?;
    tracing::info!(path = %output.display(), "saved configuration");
    Ok(format!(
        "{} configuration to {}",
        "Saved".green(),
        output.display().to_string().cyan()
    ))
}

fn format_header(header: &PackageHeader) -> String {
    format!(
        "  name:      {}\n  version:   {}\n  created:   {}\n  signature: {:#010x}",
        header.name.cyan(),
        header.version,
        header.date_created,
        header.signature
    )
}

fn format_package_line(package: &Package) -> String {
    format!(
        "{:<24} {:<8} {}  {}",
        package.name.cyan(),
        package.version,
        package.date_created,
        package.location.display().to_string().dimmed()
    )
}

fn format_json(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}
