use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use sql_job_gateway::{
    config::{Environment, GatewayConfigBuilder},
    server,
};

#[derive(Parser, Debug)]
#[command(name = "sql-job-gateway", version, about = "HTTP gateway for asynchronous SQL batch jobs")]
struct CliArgs {
    /// YAML config file; flags override its values
    #[arg(long, env = "SQL_JOB_GATEWAY_CONFIG")]
    config: Option<PathBuf>,

    #[arg(long, env = "SQL_JOB_GATEWAY_HOST")]
    host: Option<String>,

    #[arg(long, env = "SQL_JOB_GATEWAY_PORT")]
    port: Option<u16>,

    /// Prefix for the job routes, e.g. /api/v2
    #[arg(long, env = "SQL_JOB_GATEWAY_BASE_PATH")]
    base_path: Option<String>,

    /// development, production or test
    #[arg(long, env = "SQL_JOB_GATEWAY_ENVIRONMENT")]
    environment: Option<String>,

    /// Database port handed to batch jobs instead of the resolved one
    #[arg(long, env = "SQL_JOB_GATEWAY_BATCH_PORT")]
    batch_port: Option<u16>,

    #[arg(long)]
    default_max_payload_kb: Option<u64>,

    #[arg(long, env = "SQL_JOB_GATEWAY_DB_HOST")]
    db_host: Option<String>,

    #[arg(long, env = "SQL_JOB_GATEWAY_DB_PORT")]
    db_port: Option<u16>,

    #[arg(long, default_value_t = false)]
    profiling: bool,

    #[arg(long)]
    log_level: Option<String>,

    #[arg(long, default_value_t = false)]
    log_json: bool,

    #[arg(long)]
    log_dir: Option<String>,

    /// Expose Prometheus metrics on this port
    #[arg(long)]
    prometheus_port: Option<u16>,

    #[arg(long, default_value = "0.0.0.0")]
    prometheus_host: String,
}

impl CliArgs {
    fn to_builder(&self) -> anyhow::Result<GatewayConfigBuilder> {
        let mut builder = match &self.config {
            Some(path) => GatewayConfigBuilder::from_yaml_file(path)?,
            None => GatewayConfigBuilder::new(),
        };

        if let Some(host) = &self.host {
            builder = builder.host(host);
        }
        if let Some(port) = self.port {
            builder = builder.port(port);
        }
        if let Some(base_path) = &self.base_path {
            builder = builder.base_path(base_path);
        }
        if let Some(environment) = &self.environment {
            let environment: Environment = environment
                .parse()
                .with_context(|| format!("invalid environment '{environment}'"))?;
            builder = builder.environment(environment);
        }
        if self.batch_port.is_some() {
            builder = builder.maybe_batch_port(self.batch_port);
        }
        if let Some(kb) = self.default_max_payload_kb {
            builder = builder.default_max_payload_kb(kb);
        }
        if let Some(db_host) = &self.db_host {
            builder = builder.database_host(db_host);
        }
        if let Some(db_port) = self.db_port {
            builder = builder.database_port(db_port);
        }
        if self.profiling {
            builder = builder.profiling(true);
        }
        if let Some(level) = &self.log_level {
            builder = builder.log_level(level);
        }
        if self.log_json {
            builder = builder.log_json(true);
        }
        if let Some(dir) = &self.log_dir {
            builder = builder.log_dir(dir);
        }
        if let Some(port) = self.prometheus_port {
            builder = builder.prometheus(&self.prometheus_host, port);
        }
        Ok(builder)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();
    let config = args
        .to_builder()?
        .build()
        .context("invalid gateway configuration")?;
    server::startup(config).await
}
