mod watch;


use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use tracing::info;

use crate::cli::{Cli, Command, SaveArgs};
use crate::client::{RangeClient, RangeFetch, RangeService};
use crate::config::{
    resolve_bind_addr, resolve_database_path, resolve_plugin_version, resolve_server_url,
};
use crate::db::Database;
use crate::model::{ActiveRange, SaveRequest, SkipRange};
use crate::server::{self, Router};
use crate::timecode::{format_timecode, parse_timecode};

pub fn run(cli: Cli) -> Result<()> {
    let client = RangeClient::new(&resolve_server_url(cli.server.as_deref()));

    match cli.command {
        Command::Serve { bind, db } => run_serve(bind.as_deref(), db.as_deref())?,
        Command::Fetch {
            episode_id,
            file_id,
            title,
        } => run_fetch(&client, &episode_id, file_id.as_deref(), title.as_deref())?,
        Command::Save(args) => run_save(&client, &args)?,
        Command::Delete { episode_id } => run_delete(&client, &episode_id)?,
        Command::Exists { episode_id } => run_exists(&client, &episode_id)?,
        Command::Export { output } => run_export(&client, output.as_deref())?,
        Command::Ping => run_ping(&client)?,
        Command::Watch(args) => watch::run_watch(&client, &args)?,
    }

    Ok(())
}

fn run_serve(bind: Option<&str>, db: Option<&Path>) -> Result<()> {
    let db_path = resolve_database_path(db.map(Path::to_path_buf))?;
    let db = open_db(&db_path)?;
    info!(path = %db_path.display(), "range store ready");

    let addr = resolve_bind_addr(bind);
    let listener = server::bind(&addr)?;
    let router = Router::new(db, resolve_plugin_version());
    println!("Listening on http://{addr}");
    server::serve(&listener, &router);
    Ok(())
}

fn run_fetch(
    client: &RangeClient,
    episode_id: &str,
    file_id: Option<&str>,
    title: Option<&str>,
) -> Result<()> {
    let fetch = client
        .fetch_range(episode_id, file_id, title)
        .with_context(|| format!("fetching range for {episode_id}"))?;
    println!("{}", describe_fetch(episode_id, &fetch));
    Ok(())
}

fn run_save(client: &RangeClient, args: &SaveArgs) -> Result<()> {
    let request = save_request_from_args(args);
    let stored = client
        .save_range(&request)
        .with_context(|| format!("saving range for {}", args.episode_id))?;
    println!("Saved {}", describe_record(&stored));
    Ok(())
}

fn run_delete(client: &RangeClient, episode_id: &str) -> Result<()> {
    if client.delete_range(episode_id)? {
        println!("Deleted range for {episode_id}");
    } else {
        println!("No range stored for {episode_id}");
    }
    Ok(())
}

fn run_exists(client: &RangeClient, episode_id: &str) -> Result<()> {
    let found = client.range_exists(episode_id)?;
    println!("{episode_id}: {}", if found { "present" } else { "absent" });
    Ok(())
}

fn run_export(client: &RangeClient, output: Option<&Path>) -> Result<()> {
    let body = client.export().context("downloading ranges")?;
    match output {
        Some(path) => {
            fs::write(path, &body)
                .with_context(|| format!("failed to write export to {}", path.display()))?;
            println!("Wrote {}", path.display());
        }
        None => println!("{body}"),
    }
    Ok(())
}

fn run_ping(client: &RangeClient) -> Result<()> {
    let pong = client.ping()?;
    if pong.status != "ok" {
        bail!("{} answered with status {}", client.base_url(), pong.status);
    }
    println!("{} is up ({})", client.base_url(), pong.time);
    Ok(())
}

fn open_db(path: &Path) -> Result<Database> {
    let db = Database::open(path)?;
    db.migrate()?;
    Ok(db)
}

fn save_request_from_args(args: &SaveArgs) -> SaveRequest {
    SaveRequest {
        episode_id: args.episode_id.trim().to_string(),
        file_id: args.file_id.clone(),
        start: parse_timecode(&args.start),
        end: parse_timecode(&args.end),
        offset: args.offset,
        title: args.title.clone(),
    }
}

fn describe_active(range: &ActiveRange) -> String {
    let mut line = format!(
        "{} -> {}",
        format_timecode(range.start),
        format_timecode(range.end)
    );
    if range.offset != 0.0 {
        line.push_str(&format!(" (offset {}s)", range.offset));
    }
    if let Some(title) = range.title.as_deref() {
        line.push_str(&format!("  {title}"));
    }
    line
}

fn describe_fetch(episode_id: &str, fetch: &RangeFetch) -> String {
    match fetch {
        RangeFetch::Found(range) => format!("{episode_id}: {}", describe_active(range)),
        RangeFetch::Empty => format!("{episode_id}: no skip range stored"),
    }
}

fn describe_record(record: &SkipRange) -> String {
    let mut line = format!(
        "{}: {} -> {}",
        record.episode_id,
        format_timecode(record.start),
        format_timecode(record.end)
    );
    if !record.offsets.is_empty() {
        let offsets = record
            .offsets
            .iter()
            .map(|(file_id, offset)| format!("{file_id}={offset}"))
            .collect::<Vec<_>>()
            .join(", ");
        line.push_str(&format!(" [offsets {offsets}]"));
    }
    line
}
