//! coredns-mysql-store - manage records served by the CoreDNS mysql plugin

use anyhow::{Context, Result};
use chrono::Local;
use clap::{Parser, Subcommand};
use coredns_mysql_store::config::Config;
use coredns_mysql_store::{ConnectionDescriptor, OpContext, Record, RecordProvider, ZoneStore};
use rolling_file::{RollingConditionBasic, RollingFileAppender};
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

// 日志默认输出 UTC 时间，这里统一换成本地时间
struct LocalTimer;
impl fmt::time::FormatTime for LocalTimer {
    fn format_time(&self, w: &mut fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(w, "{}", Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z"))
    }
}

#[derive(Parser, Debug)]
#[command(name = "coredns-mysql-store")]
#[command(about = "Manage DNS records stored for the CoreDNS mysql plugin", long_about = None)]
struct Args {
    /// Corefile holding the mysql plugin blocks
    #[arg(short, long, default_value = "Corefile")]
    config: String,

    /// Connection URL or Go-style DSN, overrides the Corefile
    #[arg(long)]
    dsn: Option<String>,

    /// Deadline for the whole command (e.g. 500ms, 10s, 1m)
    #[arg(long, default_value = "10s", value_parser = parse_duration)]
    timeout: Duration,

    /// Also write daily-rotated logs into this directory
    #[arg(long)]
    log_dir: Option<String>,

    /// Print store metrics to stderr when done
    #[arg(long)]
    metrics: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List all records of a zone
    List { zone: String },

    /// Add one record to a zone
    Append {
        zone: String,
        #[arg(long = "type", default_value = "A")]
        rtype: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        value: String,
        #[arg(long, default_value = "3600s", value_parser = parse_duration)]
        ttl: Duration,
        #[arg(long, default_value_t = 0)]
        priority: u16,
    },

    /// Delete records of a zone by id
    Delete {
        zone: String,
        #[arg(required = true)]
        ids: Vec<String>,
    },

    /// Replace a record in place (not supported by the store)
    Set {
        zone: String,
        #[arg(long)]
        id: String,
        #[arg(long = "type", default_value = "A")]
        rtype: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        value: String,
        #[arg(long, default_value = "3600s", value_parser = parse_duration)]
        ttl: Duration,
    },
}

impl Command {
    fn zone(&self) -> &str {
        match self {
            Command::List { zone } | Command::Append { zone, .. } | Command::Delete { zone, .. } | Command::Set { zone, .. } => zone,
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .thread_name("mysql-store-worker")
        .enable_all()
        .build()?;

    runtime.block_on(async_main(args))
}

async fn async_main(args: Args) -> Result<()> {
    // 文件日志可选，按本地时区每天切割，保留 30 天
    let (file_layer, _guard) = match &args.log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir).with_context(|| format!("Failed to create log dir '{}'", dir))?;
            let appender = RollingFileAppender::new(
                format!("{}/coredns-mysql-store.log", dir),
                RollingConditionBasic::new().daily(),
                30,
            )?;
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);
            (Some(fmt::layer().with_writer(non_blocking).with_ansi(false).with_timer(LocalTimer)), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(file_layer)
        .with(fmt::layer().with_writer(std::io::stderr).with_timer(LocalTimer))
        .init();

    info!("coredns-mysql-store version {}", env!("CARGO_PKG_VERSION"));

    let zone = args.command.zone().to_string();
    let descriptor = match &args.dsn {
        Some(dsn) => ConnectionDescriptor::parse(dsn)?,
        None => Config::load(&args.config)?
            .descriptor_for(&zone)
            .cloned()
            .with_context(|| format!("No mysql block in '{}' serves zone '{}'", args.config, zone))?,
    };
    info!(">>> Zone '{}' stored at {}", zone, descriptor);

    let store = ZoneStore::new(descriptor);
    let ctx = OpContext::with_timeout(args.timeout);

    // Ctrl-C 取消正在执行的数据库调用
    let interrupt = ctx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, cancelling");
            interrupt.cancel();
        }
    });

    let result = match args.command {
        Command::List { zone } => store.list(&ctx, &zone).await,
        Command::Append { zone, rtype, name, value, ttl, priority } => {
            let record = Record::new(rtype, name, value, ttl).with_priority(priority);
            store.append(&ctx, &zone, &[record]).await
        }
        Command::Delete { zone, ids } => {
            let records: Vec<Record> = ids.into_iter().map(|id| Record::default().with_id(id)).collect();
            store.delete(&ctx, &zone, &records).await
        }
        Command::Set { zone, id, rtype, name, value, ttl } => {
            let record = Record::new(rtype, name, value, ttl).with_id(id);
            store.set(&ctx, &zone, &[record]).await
        }
    };

    store.connections().close().await;

    let outcome = match result {
        Ok(records) => {
            for record in &records {
                println!("{}", record);
            }
            Ok(())
        }
        Err(err) => {
            let (completed, error) = err.into_parts();
            for record in &completed {
                println!("{}", record);
            }
            Err(error).with_context(|| format!("{} record(s) completed before the failure", completed.len()))
        }
    };

    if args.metrics {
        eprint!("{}", coredns_mysql_store::metrics::render()?);
    }
    outcome
}

fn parse_duration(s: &str) -> Result<Duration> {
    let s = s.trim();
    if let Some(stripped) = s.strip_suffix("ms") { Ok(Duration::from_millis(stripped.parse()?)) }
    else if let Some(stripped) = s.strip_suffix('s') { Ok(Duration::from_secs(stripped.parse()?)) }
    else if let Some(stripped) = s.strip_suffix('m') { Ok(Duration::from_secs(stripped.parse::<u64>()? * 60)) }
    else if let Some(stripped) = s.strip_suffix('h') { Ok(Duration::from_secs(stripped.parse::<u64>()? * 3600)) }
    else { Ok(Duration::from_secs(s.parse()?)) }
}
