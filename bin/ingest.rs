use anyhow::{bail, Context};
use clap::{Arg, ArgAction, ArgMatches, Command};
use edgar_ingest::{
    count_rows, load_config, parse_index, recommended_chunk_size, BulkInsertApi, HttpBulkClient,
    IndexSource, IngestConfig, ParseOptions, PreparedUpload, ProgressMode, UploadDriver,
    UploadOptions, UploadStatus,
};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tokio::io::{AsyncBufReadExt, BufReader};

fn file_arg() -> Arg {
    Arg::new("path")
        .help("Master index file (.idx or .idx.gz)")
        .value_parser(clap::value_parser!(PathBuf))
        .required(true)
}

fn limit_arg() -> Arg {
    Arg::new("limit")
        .long("limit")
        .help("Stop after N data rows (test mode)")
        .value_parser(clap::value_parser!(u64))
}

fn cli() -> Command {
    Command::new("ingest")
        .about("Load SEC EDGAR master index files into the filings store")
        .subcommand_required(true)
        .arg(
            Arg::new("config")
                .long("config")
                .global(true)
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("progress")
                .long("progress")
                .global(true)
                .value_parser(["off", "human", "json"]),
        )
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .short('v')
                .global(true)
                .action(ArgAction::SetTrue),
        )
        .subcommand(Command::new("count").about("Count data rows (pass 1)").arg(file_arg()))
        .subcommand(
            Command::new("parse")
                .about("Count and parse, print dictionary sizes")
                .arg(file_arg())
                .arg(limit_arg()),
        )
        .subcommand(Command::new("status").about("Show remote table setup and row counts"))
        .subcommand(
            Command::new("upload")
                .about("Parse and upload in chunks")
                .arg(file_arg())
                .arg(limit_arg())
                .arg(
                    Arg::new("chunk-size")
                        .long("chunk-size")
                        .value_parser(clap::value_parser!(usize)),
                )
                .arg(
                    Arg::new("manual")
                        .long("manual")
                        .help("Pause after every chunk and wait for Enter")
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("start-chunk")
                        .long("start-chunk")
                        .help("Resume at this chunk (chunk 1 is always sent first)")
                        .value_parser(clap::value_parser!(usize)),
                ),
        )
}

fn progress_mode(matches: &ArgMatches) -> ProgressMode {
    match matches.get_one::<String>("progress").map(String::as_str) {
        Some("off") => ProgressMode::Off,
        Some("human") => ProgressMode::Human,
        Some("json") => ProgressMode::Json,
        _ => ProgressMode::default_for_tty(),
    }
}

fn load(matches: &ArgMatches) -> anyhow::Result<IngestConfig> {
    match matches.get_one::<PathBuf>("config") {
        Some(path) => Ok(load_config(path)?),
        None => Ok(IngestConfig::default()),
    }
}

fn source_for(config: &IngestConfig, path: &Path) -> anyhow::Result<IndexSource> {
    Ok(IndexSource::from_path(path)
        .with_charset(config.parse.encoding()?)
        .with_max_line_length(config.parse.max_line_length))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let matches = cli().get_matches();
    edgar_ingest::logging::init(matches.get_flag("verbose"));

    let mut config = load(&matches)?;
    let mode = progress_mode(&matches);

    match matches.subcommand() {
        Some(("count", sub)) => {
            let path = sub.get_one::<PathBuf>("path").context("missing path")?;
            let source = source_for(&config, path)?;
            let start = Instant::now();
            let rows = count_rows(source.lines().await?, mode.reporter().as_ref()).await?;
            let elapsed = start.elapsed().as_secs_f64();
            println!(
                "source={} rows={}\nelapsed={:.1}s rows/sec={:.0}",
                path.display(),
                rows,
                elapsed,
                rows as f64 / elapsed
            );
        }
        Some(("parse", sub)) => {
            let path = sub.get_one::<PathBuf>("path").context("missing path")?;
            if let Some(limit) = sub.get_one::<u64>("limit") {
                config.parse.row_limit = Some(*limit);
            }
            let source = source_for(&config, path)?;
            let reporter = mode.reporter();

            let start = Instant::now();
            let total = count_rows(source.lines().await?, reporter.as_ref()).await?;
            let options = ParseOptions {
                row_limit: config.parse.row_limit,
                total_rows: Some(total),
            };
            let outcome = parse_index(&source, &options, reporter.as_ref()).await?;
            let elapsed = start.elapsed().as_secs_f64();
            println!(
                "source={} rows={} records={} skipped={} truncated={}\n\
                 form_types={} extensions={} companies={}\n\
                 suggested_chunk_size={} elapsed={:.1}s",
                path.display(),
                outcome.rows_processed,
                outcome.index.filings.len(),
                outcome.skipped,
                outcome.truncated,
                outcome.index.form_types.len(),
                outcome.index.extensions.len(),
                outcome.index.companies.len(),
                recommended_chunk_size(total),
                elapsed
            );
        }
        Some(("status", _)) => {
            let client = HttpBulkClient::new(config.api.clone())?;
            let status = client.setup_status().await?;
            println!("ready={}", status.ready);
            if !status.missing_tables.is_empty() {
                println!("missing_tables={}", status.missing_tables.join(","));
            }
            if status.ready {
                let stats = client.stats().await?;
                println!(
                    "form_types={} extensions={} companies={} filings={}",
                    stats.form_types, stats.extensions, stats.companies, stats.filings
                );
            }
        }
        Some(("upload", sub)) => {
            let path = sub.get_one::<PathBuf>("path").context("missing path")?;
            if let Some(limit) = sub.get_one::<u64>("limit") {
                config.parse.row_limit = Some(*limit);
            }
            if let Some(size) = sub.get_one::<usize>("chunk-size") {
                config.upload.chunk_size = Some(*size);
            }
            if sub.get_flag("manual") {
                config.upload.auto = false;
            }
            config.validate()?;
            upload(
                &config,
                path,
                sub.get_one::<usize>("start-chunk").copied(),
                mode,
            )
            .await?;
        }
        _ => unreachable!("subcommand_required"),
    }
    Ok(())
}

async fn upload(
    config: &IngestConfig,
    path: &Path,
    start_chunk: Option<usize>,
    mode: ProgressMode,
) -> anyhow::Result<()> {
    let client = HttpBulkClient::new(config.api.clone())?;
    let status = client
        .setup_status()
        .await
        .context("checking remote table setup")?;
    if !status.ready {
        bail!(
            "remote tables are not set up (missing: {})",
            status.missing_tables.join(", ")
        );
    }

    let source = source_for(config, path)?;
    let reporter = mode.reporter();
    let total = count_rows(source.lines().await?, reporter.as_ref()).await?;
    let chunk_size = config
        .upload
        .chunk_size
        .unwrap_or_else(|| recommended_chunk_size(total));
    let options = ParseOptions {
        row_limit: config.parse.row_limit,
        total_rows: Some(total),
    };
    let outcome = parse_index(&source, &options, reporter.as_ref()).await?;
    let prepared = PreparedUpload::new(outcome.index, chunk_size)?;

    let mut driver = UploadDriver::new(
        client,
        prepared,
        UploadOptions {
            auto: config.upload.auto,
            strict_remap: config.upload.strict_remap,
        },
    )
    .with_reporter(mode.reporter());

    let cancel = driver.cancel_flag();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received; stopping after the in-flight chunk");
            cancel.cancel();
        }
    });

    // Server ids only come back with chunk 1, so a resume always re-sends it first
    if let Some(start) = start_chunk.filter(|&c| c > 1) {
        driver.set_auto(false);
        let state = driver.start().await?;
        if state.status == UploadStatus::Failed {
            bail!("chunk 1 failed: {:?}", state.failure);
        }
        driver.set_auto(config.upload.auto);
        if driver.cancel_flag().is_cancelled() {
            println!("stopped by user after chunk 1; rerun with --start-chunk {start} to resume");
            return Ok(());
        }
        tracing::info!(start, "resuming at requested chunk");
        driver.run_from(start).await?;
    } else {
        driver.start().await?;
    }

    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let state = driver.state().clone();
        match state.status {
            UploadStatus::Paused => {
                eprintln!(
                    "paused before chunk {} of {}. Enter to continue, q to cancel",
                    state.current_chunk, state.total_chunks
                );
                let answer = tokio::select! {
                    line = stdin.next_line() => line?.unwrap_or_default(),
                    _ = tokio::signal::ctrl_c() => {
                        driver.cancel_flag().cancel();
                        String::new()
                    }
                };
                if answer.trim().eq_ignore_ascii_case("q") {
                    driver.reset();
                    println!("upload cancelled");
                    return Ok(());
                }
                // a pending stop is recorded by the driver without sending
                driver.resume().await?;
            }
            UploadStatus::Completed => {
                let c = state.counts;
                println!(
                    "chunks={} form_types={} extensions={} companies={} filings={}",
                    state.total_chunks, c.form_types, c.extensions, c.companies, c.filings
                );
                return Ok(());
            }
            UploadStatus::Failed => {
                let failure = state.failure.context("failed state without a failure")?;
                if failure.is_user_stop() {
                    println!(
                        "stopped by user at chunk {}; rerun with --start-chunk {} to resume",
                        failure.chunk, failure.chunk
                    );
                    return Ok(());
                }
                bail!(
                    "chunk {} of {} failed: {:?}; rerun with --start-chunk {}",
                    failure.chunk,
                    state.total_chunks,
                    failure.kind,
                    failure.chunk
                );
            }
            UploadStatus::Pending | UploadStatus::Running => {
                bail!("upload driver returned in state {:?}", state.status)
            }
        }
    }
}
