//! Import command - Add a media file to the library.

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Args;

use veo_core::{ContextId, ContextKind, FileField, ItemContext, ItemTemplate};

use crate::config::AppConfig;

#[derive(Args)]
pub struct ImportArgs {
    /// Media file to import
    #[arg(short, long)]
    file: PathBuf,

    /// Context the item is used in
    #[arg(long, value_name = "ID")]
    context: u64,

    /// Kind of the context, registers the context when given
    #[arg(long, value_parser = parse_kind)]
    context_kind: Option<ContextKind>,

    /// Name format token of the context, as NAME=VALUE (repeatable)
    #[arg(long = "token", value_name = "NAME=VALUE", value_parser = parse_token, requires = "context_kind")]
    tokens: Vec<(String, String)>,

    #[arg(long, default_value = "mod_resource")]
    component: String,

    #[arg(long, default_value = "content")]
    area: String,

    #[arg(long, default_value = "video/mp4")]
    mime: String,

    /// E-mail of the owner, used to find the owner on the publishing service
    #[arg(long, value_name = "EMAIL")]
    owner: Option<String>,
}

fn parse_kind(value: &str) -> Result<ContextKind, String> {
    ContextKind::from_str(value).ok_or_else(|| format!("unknown context kind '{}'", value))
}

fn parse_token(value: &str) -> Result<(String, String), String> {
    match value.split_once('=') {
        Some((name, token)) if !name.is_empty() => Ok((name.to_string(), token.to_string())),
        _ => Err(format!("expected NAME=VALUE, got '{}'", value)),
    }
}

pub async fn execute(args: ImportArgs, config: AppConfig) -> Result<()> {
    let bytes = std::fs::read(&args.file)
        .with_context(|| format!("Failed to read {}", args.file.display()))?;
    let filename = args
        .file
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .with_context(|| format!("Invalid file argument {}", args.file.display()))?;

    let store = super::open_library(&config)?;

    let context_id = ContextId(args.context);
    if let Some(kind) = args.context_kind {
        let context = args
            .tokens
            .into_iter()
            .fold(ItemContext::new(context_id, kind), |context, (name, value)| {
                context.with_token(name, value)
            });
        store.add_context(context)?;
    }

    let template = ItemTemplate {
        filename,
        mime_type: args.mime,
        created_at: Utc::now(),
        context_id,
        field: FileField::new(args.component, args.area),
        owner_email: args.owner,
    };
    let item = store.add_item(&template, &bytes)?;

    println!(
        "✅ Imported {} as item {} ({} bytes)",
        item.filename,
        item.id,
        bytes.len()
    );
    Ok(())
}
