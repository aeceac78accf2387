//! CLI for the MDL manga downloader.

mod app;
mod commands;
mod progress;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use mdl_core::model::OutputFormat;
use std::path::PathBuf;

use app::App;
use commands::{
    run_download, run_proxy_test, run_remove, run_resume, run_serve, run_status, run_stop,
    DownloadArgs,
};

/// Top-level CLI for MDL.
#[derive(Debug, Parser)]
#[command(name = "mdl")]
#[command(about = "MDL: resumable manga chapter downloader", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FormatArg {
    Cbz,
    Epub,
}

impl From<FormatArg> for OutputFormat {
    fn from(f: FormatArg) -> Self {
        match f {
            FormatArg::Cbz => OutputFormat::Cbz,
            FormatArg::Epub => OutputFormat::Epub,
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Download a series (or a single chapter) into one archive.
    Download {
        /// Series page URL, or a single chapter URL.
        url: String,

        /// Archive title (default: derived from the series URL).
        #[arg(long)]
        title: Option<String>,

        /// Skip chapters whose URL slug matches (repeatable), e.g. `chapter-0`.
        #[arg(long, value_name = "SLUG")]
        exclude: Vec<String>,

        #[arg(long, value_enum, default_value = "cbz")]
        format: FormatArg,

        /// Destination directory (default: config `output_dir`, else the current directory).
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,

        /// Concurrent image downloads per chapter for this job.
        #[arg(long, value_name = "N")]
        workers: Option<usize>,

        /// Concurrent chapters (applies to every running job).
        #[arg(long, value_name = "N")]
        chapter_workers: Option<usize>,

        /// Existing CBZ to update: its chapters are reused, only new ones are fetched.
        #[arg(long, value_name = "FILE")]
        update: Option<PathBuf>,
    },

    /// Resume a paused job by key, or every unfinished job.
    Resume {
        /// Job key as shown by `mdl status`.
        key: Option<String>,
    },

    /// Show stored jobs and their cache progress.
    Status,

    /// Remove a stored job and its cached chapters.
    Remove {
        /// Job key as shown by `mdl status`.
        key: String,

        /// Keep the downloaded chapters in the cache.
        #[arg(long)]
        keep_cache: bool,
    },

    /// Stop a job running in the daemon.
    Stop {
        /// Job identifier.
        #[arg(required_unless_present = "all", conflicts_with = "all")]
        job_id: Option<String>,

        /// Stop every running job.
        #[arg(long)]
        all: bool,
    },

    /// Run the download daemon on the control socket.
    Serve,

    /// Check that the proxy changes the public address and fails closed.
    ProxyTest {
        /// Proxy URL (default: config `proxy_url`).
        #[arg(long)]
        proxy: Option<String>,

        /// IP lookup endpoint (default: config `ip_lookup_url`).
        #[arg(long)]
        lookup: Option<String>,
    },
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let app = App::load().await?;

        match cli.command {
            CliCommand::Download {
                url,
                title,
                exclude,
                format,
                output,
                workers,
                chapter_workers,
                update,
            } => {
                let args = DownloadArgs {
                    url,
                    title,
                    exclude,
                    format: format.into(),
                    output,
                    workers,
                    chapter_workers,
                    update,
                };
                run_download(&app, args).await?;
            }
            CliCommand::Resume { key } => run_resume(&app, key.as_deref()).await?,
            CliCommand::Status => run_status(&app).await?,
            CliCommand::Remove { key, keep_cache } => run_remove(&app, &key, keep_cache).await?,
            CliCommand::Stop { job_id, all } => run_stop(&app, job_id.as_deref(), all).await?,
            CliCommand::Serve => run_serve(&app).await?,
            CliCommand::ProxyTest { proxy, lookup } => {
                run_proxy_test(&app, proxy.as_deref(), lookup.as_deref()).await?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
