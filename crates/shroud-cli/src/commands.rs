use std::io::Write;
use std::sync::Arc;

use anyhow::{bail, Context};
use colored::Colorize;
use serde_json::json;
use shroud_sdk::{
    Client, ClientConfig, FileHandle, FileMeta, HttpNetwork, LocalCrypto, TransferEvent,
};
use tokio::io::AsyncWriteExt;
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::cli::*;

pub async fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = ClientConfig::load(&cli.config)?;
    debug!(path = %cli.config.display(), "configuration loaded");
    if let Command::Config = cli.command {
        print!("{}", config.to_toml()?);
        return Ok(());
    }
    let client = connect(config, cli.seed.as_deref())?;
    let format = cli.format;
    match cli.command {
        Command::Mkdir(args) => cmd_mkdir(&client, args).await,
        Command::Ls(args) => cmd_ls(&client, args, format).await,
        Command::Upload(args) => cmd_upload(&client, args, format).await,
        Command::Download(args) => cmd_download(&client, args).await,
        Command::RmFile(args) => cmd_rm_file(&client, args).await,
        Command::MetaGet(args) => cmd_meta_get(&client, args).await,
        Command::Keys => cmd_keys(&client, format).await,
        Command::Config => Ok(()),
    }
}

fn connect(config: ClientConfig, seed: Option<&str>) -> anyhow::Result<Client> {
    let Some(seed) = seed.map(str::to_owned).or_else(|| config.account_seed.clone()) else {
        bail!("no account seed: set SHROUD_ACCOUNT_SEED or account_seed in the config file");
    };
    let crypto = LocalCrypto::from_hex(&seed).context("invalid account seed")?;
    info!(
        metadata = %config.metadata.metadata_node,
        storage = %config.transfer.storage_node,
        "connecting"
    );
    Ok(Client::new(config, Arc::new(crypto), Arc::new(HttpNetwork::new())))
}

fn parse_handle(handle: &str) -> anyhow::Result<FileHandle> {
    FileHandle::from_hex(handle.trim()).context("invalid file handle")
}

async fn cmd_mkdir(client: &Client, args: MkdirArgs) -> anyhow::Result<()> {
    let folder = client.account().add_folder(&args.path).await?;
    println!("{} Created folder {}", "✓".green().bold(), folder.path.bold());
    Ok(())
}

async fn cmd_ls(client: &Client, args: LsArgs, format: OutputFormat) -> anyhow::Result<()> {
    let account = client.account();
    let folder = account.get_folder_metadata_by_path(&args.path).await?;
    let children = account.folders_in_folder(&folder.path).await?;
    let mut files = folder.files.clone();
    files.sort_by(|a, b| a.name.cmp(&b.name));

    if format == OutputFormat::Json {
        let out = json!({
            "path": folder.path,
            "folders": children.iter().map(|f| &f.path).collect::<Vec<_>>(),
            "files": files.iter().map(|f| &f.name).collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!("{} ({} files)", folder.path.bold(), folder.size);
    for child in &children {
        let name = child.path.rsplit('/').next().unwrap_or_default();
        println!("  {}/", name.blue().bold());
    }
    for file in &files {
        let meta = account.get_file_metadata(&file.location).await?;
        let state = if meta.finished {
            "".normal()
        } else {
            " (incomplete)".yellow()
        };
        println!(
            "  {:<32} {:>10}  {}{}",
            file.name,
            meta.size,
            format_millis(meta.modified).dimmed(),
            state
        );
    }
    Ok(())
}

fn format_millis(millis: i64) -> String {
    chrono::DateTime::from_timestamp_millis(millis)
        .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_default()
}

async fn report_progress(mut events: broadcast::Receiver<TransferEvent>) {
    loop {
        match events.recv().await {
            Ok(TransferEvent::Progress { fraction }) => {
                eprint!("\r  {:>5.1}%", fraction * 100.0);
                let _ = std::io::stderr().flush();
            }
            Ok(TransferEvent::Finished(timings)) => {
                eprintln!("\r  done in {:.2?}", timings.duration);
                return;
            }
            Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {}
            Err(broadcast::error::RecvError::Closed) => return,
        }
    }
}

async fn cmd_upload(client: &Client, args: UploadArgs, format: OutputFormat) -> anyhow::Result<()> {
    let name = args
        .file
        .file_name()
        .and_then(|n| n.to_str())
        .context("upload path has no file name")?
        .to_string();
    let file = tokio::fs::File::open(&args.file)
        .await
        .with_context(|| format!("could not open {}", args.file.display()))?;
    let stat = file.metadata().await?;
    let mut meta = FileMeta::new(stat.len(), args.mime);
    if let Ok(modified) = stat.modified() {
        meta.last_modified = chrono::DateTime::<chrono::Utc>::from(modified).timestamp_millis();
    }

    let upload = client.upload(&name, &args.dir, meta).await?;
    let progress = tokio::spawn(report_progress(upload.subscribe()));
    upload.start(file)?;
    let result = upload.finish().await;
    progress.abort();
    result?;

    let handle = upload.handle().to_hex();
    if format == OutputFormat::Json {
        println!("{}", json!({ "name": name, "dir": args.dir, "handle": handle }));
    } else {
        println!("{} Uploaded {} to {}", "✓".green().bold(), name.bold(), args.dir);
        println!("  Handle: {}", handle.yellow());
    }
    Ok(())
}

async fn cmd_download(client: &Client, args: DownloadArgs) -> anyhow::Result<()> {
    let handle = parse_handle(&args.handle)?;
    let download = client.download(handle);
    let progress = tokio::spawn(report_progress(download.subscribe()));
    let mut rx = download.start()?;

    let mut out = tokio::fs::File::create(&args.out)
        .await
        .with_context(|| format!("could not create {}", args.out.display()))?;
    while let Some(block) = rx.recv().await {
        out.write_all(&block).await?;
    }
    out.flush().await?;
    let result = download.finish().await;
    progress.abort();
    result?;

    println!(
        "{} Downloaded {} bytes to {}",
        "✓".green().bold(),
        download.metadata().map(|m| m.size).unwrap_or_default(),
        args.out.display()
    );
    Ok(())
}

async fn cmd_rm_file(client: &Client, args: RmFileArgs) -> anyhow::Result<()> {
    let handle = parse_handle(&args.handle)?;
    client.delete_file(&handle).await?;
    println!("{} Deleted {}", "✓".green().bold(), handle.location.to_hex().dimmed());
    Ok(())
}

async fn cmd_meta_get(client: &Client, args: MetaGetArgs) -> anyhow::Result<()> {
    match client.metadata().get(&args.path).await? {
        Some(doc) => println!("{}", serde_json::to_string_pretty(&doc.state())?),
        None => println!("{}", "(no document)".dimmed()),
    }
    Ok(())
}

async fn cmd_keys(client: &Client, format: OutputFormat) -> anyhow::Result<()> {
    let keys = client.metadata().get_metadata_location_keys_list().await?;
    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&keys)?);
        return Ok(());
    }
    for key in &keys {
        match &key.encrypt_key {
            Some(_) => println!("{} {}", key.public_key, "public".cyan()),
            None => println!("{}", key.public_key),
        }
    }
    println!("{} keys", keys.len().to_string().bold());
    Ok(())
}
