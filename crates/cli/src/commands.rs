use clap::{Args, Subcommand};
use spark_batch::{CreateParams, GeneratorConfig};
use spark_runtime::{RunnerSettings, StatusLog};
use std::{path::PathBuf, time::Duration};

/// Connection options shared by every command. Unset values fall back to the
/// `CSPARK_*` environment variables.
#[derive(Args, Debug, Clone, Default)]
pub struct GlobalArgs {
    #[arg(long, global = true, help = "Spark base URL, e.g. https://excel.uat.us.coherent.global/my-tenant")]
    pub base_url: Option<String>,

    #[arg(long, global = true, help = "Tenant name; overrides the one in the base URL")]
    pub tenant: Option<String>,

    #[arg(long, global = true, help = "API key, or \"open\" for public endpoints")]
    pub api_key: Option<String>,

    #[arg(long, global = true, help = "Bearer token")]
    pub token: Option<String>,

    #[arg(long, global = true, help = "Env file to load before reading CSPARK_* variables")]
    pub env_file: Option<PathBuf>,

    #[arg(long, global = true, help = "Request timeout in milliseconds")]
    pub timeout: Option<u64>,

    #[arg(long, global = true, help = "Retries for throttled or timed-out requests")]
    pub max_retries: Option<u32>,

    #[arg(long, global = true, help = "Print responses as JSON instead of a table")]
    pub json: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Manage async batch pipelines
    Batch {
        #[command(subcommand)]
        command: BatchCommand,
    },
}

#[derive(Subcommand)]
pub enum BatchCommand {
    /// Show the batch pipelines of the tenant
    Describe,
    /// Create a batch pipeline for a service
    Create(CreateArgs),
    Status {
        #[arg(long, help = "Batch pipeline ID")]
        id: String,
    },
    Info {
        #[arg(long, help = "Batch pipeline ID")]
        id: String,
    },
    /// Close a pipeline; no more chunks are accepted
    Close {
        #[arg(long, help = "Batch pipeline ID")]
        id: String,
    },
    Cancel {
        #[arg(long, help = "Batch pipeline ID")]
        id: String,
    },
    /// Stream every CSV file of a directory through a new batch pipeline
    Run(RunArgs),
}

#[derive(Args, Debug, Clone)]
pub struct CreateArgs {
    #[arg(
        long,
        help = "Service locator: folder/service[version], service/<id> or version/<id>"
    )]
    pub service: String,

    #[arg(long)]
    pub min_runners: Option<u32>,

    #[arg(long)]
    pub max_runners: Option<u32>,

    #[arg(long)]
    pub chunks_per_vm: Option<u32>,

    #[arg(long)]
    pub runners_per_vm: Option<u32>,

    #[arg(long, help = "Input buffer size in MB")]
    pub max_input_size: Option<f64>,

    #[arg(long, help = "Output buffer size in MB")]
    pub max_output_size: Option<f64>,

    #[arg(long, help = "Share of records that must succeed, between 0 and 1")]
    pub accuracy: Option<f64>,

    #[arg(long, value_delimiter = ',')]
    pub subservices: Vec<String>,

    #[arg(long, value_delimiter = ',')]
    pub selected_outputs: Vec<String>,

    #[arg(long, value_delimiter = ',')]
    pub unique_record_key: Vec<String>,

    #[arg(long, help = "Resolve the service version active at this timestamp")]
    pub active_since: Option<String>,

    #[arg(long)]
    pub source_system: Option<String>,

    #[arg(long)]
    pub call_purpose: Option<String>,

    #[arg(long)]
    pub correlation_id: Option<String>,
}

impl CreateArgs {
    pub fn params(&self) -> CreateParams {
        let mut params = CreateParams::default()
            .with_subservices(self.subservices.clone())
            .with_selected_outputs(self.selected_outputs.clone())
            .with_unique_record_key(self.unique_record_key.clone())
            .with_runners(self.min_runners, self.max_runners)
            .with_buffer_sizes(self.max_input_size, self.max_output_size);

        params.chunks_per_vm = self.chunks_per_vm;
        params.runners_per_vm = self.runners_per_vm;
        params.accuracy = self.accuracy;
        params.active_since = self.active_since.clone();
        params.source_system = self.source_system.clone();
        params.call_purpose = self.call_purpose.clone();
        params.correlation_id = self.correlation_id.clone();
        params
    }
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    #[command(flatten)]
    pub create: CreateArgs,

    #[arg(long, help = "Directory of CSV files to submit")]
    pub input_dir: PathBuf,

    #[arg(long, help = "Directory receiving <count>_output.csv files")]
    pub output_dir: PathBuf,

    #[arg(long, default_value_t = 5, help = "Records per chunk")]
    pub chunk_size: usize,

    #[arg(long, default_value_t = 2, help = "Chunks per push")]
    pub chunks_per_push: usize,

    #[arg(long, help = "Stop after this many records")]
    pub max_records: Option<usize>,

    #[arg(long, help = "Also write every submitted chunk to this directory")]
    pub persist_dir: Option<PathBuf>,

    #[arg(long, default_value_t = 1)]
    pub upload_threads: usize,

    #[arg(long, default_value_t = 1)]
    pub download_threads: usize,

    #[arg(long, default_value_t = 0.5, help = "Input buffer ratio above which uploads pause")]
    pub target: f64,

    #[arg(long, default_value_t = 2.0, help = "Seconds to wait between retries and polls")]
    pub delay: f64,

    #[arg(long, default_value_t = 100, help = "Maximum chunk results per pull")]
    pub pull_max: usize,

    #[arg(long, default_value_t = 10, help = "Write an output file every N chunk results")]
    pub flush_every: usize,

    #[arg(long, help = "Path prefix of a CSV status log, e.g. logs/status_")]
    pub status_log: Option<String>,
}

impl RunArgs {
    pub fn generator_config(&self) -> GeneratorConfig {
        let mut config = GeneratorConfig::default()
            .with_chunk_size(self.chunk_size)
            .with_num_chunk(self.chunks_per_push);
        if let Some(max) = self.max_records {
            config = config.with_max_records(max);
        }
        if let Some(dir) = &self.persist_dir {
            config = config.with_persist_dir(dir.clone());
        }
        config
    }

    pub fn runner_settings(&self) -> RunnerSettings {
        let delay = Duration::try_from_secs_f64(self.delay).unwrap_or(Duration::from_secs(2));
        let mut settings = RunnerSettings::default()
            .with_threads(self.upload_threads, self.download_threads)
            .with_target_ratio(self.target)
            .with_delay(delay)
            .with_pull_max(self.pull_max);
        if let Some(prefix) = &self.status_log {
            settings = settings.with_status_log(StatusLog::new(prefix));
        }
        settings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        global: GlobalArgs,
        #[command(subcommand)]
        command: Commands,
    }

    fn parse(args: &[&str]) -> TestCli {
        TestCli::try_parse_from(std::iter::once("spark").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn parses_create_with_lists() {
        let cli = parse(&[
            "batch",
            "create",
            "--service",
            "my-folder/my-service",
            "--min-runners",
            "10",
            "--subservices",
            "sub1,sub2",
            "--accuracy",
            "0.9",
            "--json",
        ]);
        assert!(cli.global.json);

        let Commands::Batch {
            command: BatchCommand::Create(args),
        } = cli.command
        else {
            panic!("expected batch create");
        };
        let params = args.params();
        assert_eq!(params.min_runners, Some(10));
        assert_eq!(params.subservices, vec!["sub1", "sub2"]);
        assert_eq!(params.acceptable_error_percentage(), 10);
    }

    #[test]
    fn run_defaults_follow_runner_settings() {
        let cli = parse(&[
            "--tenant",
            "my-tenant",
            "batch",
            "run",
            "--service",
            "f/s",
            "--input-dir",
            "in",
            "--output-dir",
            "out",
            "--delay",
            "1.5",
        ]);
        assert_eq!(cli.global.tenant.as_deref(), Some("my-tenant"));

        let Commands::Batch {
            command: BatchCommand::Run(args),
        } = cli.command
        else {
            panic!("expected batch run");
        };
        let settings = args.runner_settings();
        assert_eq!(settings.upload_threads, 1);
        assert_eq!(settings.target_ratio, 0.5);
        assert_eq!(settings.delay, Duration::from_millis(1500));
        assert!(settings.status_log.is_none());

        let generator = args.generator_config();
        assert_eq!(generator.chunk_size, 5);
        assert_eq!(generator.num_chunk, 2);
    }
}
