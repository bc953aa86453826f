//! sqlite-fanout-bench - concurrent SQLite load and memory instrumentation harness

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use sqlite_fanout_bench::{BenchConfig, StatusReport, run, shutdown_signal};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sqlite-fanout-bench")]
#[command(author, version, about, long_about = None)]
struct Cli {
   /// Path to a TOML configuration file
   #[arg(short, long)]
   config: Option<PathBuf>,

   /// Number of databases provisioned in parallel
   #[arg(long)]
   instances: Option<usize>,

   /// Rows inserted into each database
   #[arg(long)]
   rows: Option<u64>,

   /// Concurrent readers per database
   #[arg(long)]
   readers: Option<usize>,

   /// Rows committed per write transaction
   #[arg(long)]
   batch_size: Option<u64>,

   /// Shortest random text value
   #[arg(long)]
   min_len: Option<usize>,

   /// Longest random text value (exclusive)
   #[arg(long)]
   max_len: Option<usize>,

   /// Directory to create the per-instance databases in
   #[arg(long)]
   temp_root: Option<PathBuf>,

   /// Preallocate a SQLite page cache of this many bytes before opening anything
   #[arg(long, value_name = "BYTES")]
   preallocate: Option<usize>,

   /// Print the report as JSON
   #[arg(long)]
   json: bool,

   /// Enable verbose output
   #[arg(short, long)]
   verbose: bool,
}

impl Cli {
   fn load_config(&self) -> Result<BenchConfig> {
      let mut config = match &self.config {
         Some(path) => BenchConfig::from_toml_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
         None => BenchConfig::default(),
      };

      if let Some(instances) = self.instances {
         config.instances = instances;
      }
      if let Some(rows) = self.rows {
         config.write_rows = rows;
      }
      if let Some(readers) = self.readers {
         config.readers = readers;
      }
      if let Some(batch_size) = self.batch_size {
         config.batch_size = batch_size;
      }
      if let Some(min_len) = self.min_len {
         config.min_len = min_len;
      }
      if let Some(max_len) = self.max_len {
         config.max_len = max_len;
      }
      if let Some(temp_root) = &self.temp_root {
         config.temp_root = Some(temp_root.clone());
      }
      if let Some(bytes) = self.preallocate {
         config.page_cache_bytes = Some(bytes);
      }

      config.validate()?;
      Ok(config)
   }
}

fn print_report(report: &StatusReport, json: bool) {
   if !json {
      println!("{report}");
      return;
   }

   match serde_json::to_string_pretty(report) {
      Ok(text) => println!("{text}"),
      Err(e) => tracing::error!(error = %e, "Failed to serialize report"),
   }
}

#[tokio::main]
async fn main() -> Result<()> {
   let cli = Cli::parse();

   let default_level = if cli.verbose {
      tracing::Level::DEBUG
   } else {
      tracing::Level::INFO
   };
   tracing_subscriber::fmt()
      .with_env_filter(EnvFilter::from_default_env().add_directive(default_level.into()))
      .init();

   let config = cli.load_config()?;
   tracing::info!(
      instances = config.instances,
      rows = config.write_rows,
      readers = config.readers,
      "sqlite-fanout-bench starting"
   );

   let json = cli.json;
   run(&config, |report| print_report(report, json), shutdown_signal()).await?;

   Ok(())
}
