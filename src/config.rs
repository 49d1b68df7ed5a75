use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use std::{env, path::PathBuf, str::FromStr, time::Duration};

/// Prefix shared by every environment variable. Flag names map to
/// `ECOMM_<FLAG>` with dashes removed, e.g. `--reporter-endpoint` is
/// `ECOMM_REPORTERENDPOINT`.
pub const ENV_PREFIX: &str = "ECOMM";

/// Command-line entry point.
#[derive(Parser, Debug)]
#[command(name = "ecomm-reporter", author, version, about = "eCommerce reporting services")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the frontend gateway
    Frontend(FrontendArgs),
    /// Start the reporter backend
    Backend(ReporterArgs),
    /// Print the CLI version
    Version,
}

#[derive(Args, Debug, Default)]
pub struct FrontendArgs {
    /// Host to bind to (overrides ECOMM_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides ECOMM_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Base url of the reporter service; required
    #[arg(short = 'r', long)]
    pub reporter_endpoint: Option<String>,

    /// Orders database URL (overrides ECOMM_DATABASEURL)
    #[arg(long)]
    pub database_url: Option<String>,

    /// Directory holding the built single-page app
    #[arg(long)]
    pub spa_build_root: Option<PathBuf>,

    /// Deadline for each call to the reporter, in seconds
    #[arg(long)]
    pub reporter_timeout_secs: Option<u64>,

    /// Host (or host:port) absolute archive urls may point at. Repeatable;
    /// none means any host is allowed
    #[arg(long = "allowed-archive-host")]
    pub allowed_archive_hosts: Vec<String>,
}

#[derive(Args, Debug, Default)]
pub struct ReporterArgs {
    /// Host to bind to (overrides ECOMM_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides ECOMM_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Bucket name for archive storage; required
    #[arg(short = 'b', long)]
    pub bucket: Option<String>,

    /// Directory where archive payloads are stored
    #[arg(long)]
    pub storage_dir: Option<String>,

    /// Metadata database URL (overrides ECOMM_DATABASEURL)
    #[arg(long)]
    pub database_url: Option<String>,

    /// Region recorded for the bucket
    #[arg(short = 'r', long)]
    pub static_region: Option<String>,
}

/// Resolved frontend configuration.
#[derive(Debug, Clone)]
pub struct FrontendConfig {
    pub host: String,
    pub port: u16,
    pub reporter_endpoint: String,
    pub database_url: String,
    pub spa_build_root: Option<PathBuf>,
    pub reporter_timeout: Duration,
    pub allowed_archive_hosts: Vec<String>,
}

/// Resolved reporter configuration.
#[derive(Debug, Clone)]
pub struct ReporterConfig {
    pub host: String,
    pub port: u16,
    pub bucket: String,
    pub storage_dir: String,
    pub database_url: String,
    pub static_region: String,
}

/// Flag value, else environment value, else nothing.
struct Layer<'a, E: Fn(&str) -> Option<String>> {
    env: &'a E,
}

fn env_name(flag: &str) -> String {
    format!("{}_{}", ENV_PREFIX, flag.replace('-', "").to_ascii_uppercase())
}

impl<E: Fn(&str) -> Option<String>> Layer<'_, E> {
    fn var(&self, flag: &str) -> Option<String> {
        (self.env)(&env_name(flag)).filter(|value| !value.is_empty())
    }

    fn string(&self, arg: Option<String>, flag: &str) -> Option<String> {
        arg.or_else(|| self.var(flag))
    }

    fn parsed<T>(&self, arg: Option<T>, flag: &str) -> Result<Option<T>>
    where
        T: FromStr,
        T::Err: std::error::Error + Send + Sync + 'static,
    {
        if arg.is_some() {
            return Ok(arg);
        }
        match self.var(flag) {
            Some(value) => value
                .parse::<T>()
                .map(Some)
                .with_context(|| format!("parsing {} value `{}`", env_name(flag), value)),
            None => Ok(None),
        }
    }
}

fn process_env(name: &str) -> Option<String> {
    env::var(name).ok()
}

impl FrontendConfig {
    pub fn from_args(args: FrontendArgs) -> Result<Self> {
        Self::from_args_with(args, &process_env)
    }

    pub fn from_args_with<E>(args: FrontendArgs, env: &E) -> Result<Self>
    where
        E: Fn(&str) -> Option<String>,
    {
        let layer = Layer { env };

        let Some(reporter_endpoint) = layer.string(args.reporter_endpoint, "reporter-endpoint")
        else {
            bail!("must pass --reporter-endpoint flag (-r)");
        };

        let allowed_archive_hosts = if args.allowed_archive_hosts.is_empty() {
            layer
                .var("allowed-archive-hosts")
                .map(|list| {
                    list.split(',')
                        .map(str::trim)
                        .filter(|h| !h.is_empty())
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default()
        } else {
            args.allowed_archive_hosts
        };

        Ok(Self {
            host: layer
                .string(args.host, "host")
                .unwrap_or_else(|| "0.0.0.0".into()),
            port: layer.parsed(args.port, "port")?.unwrap_or(8080),
            reporter_endpoint,
            database_url: layer
                .string(args.database_url, "database-url")
                .unwrap_or_else(|| "sqlite://./data/orders.db".into()),
            spa_build_root: args
                .spa_build_root
                .or_else(|| layer.var("spa-build-root").map(PathBuf::from)),
            reporter_timeout: Duration::from_secs(
                layer
                    .parsed(args.reporter_timeout_secs, "reporter-timeout-secs")?
                    .unwrap_or(30),
            ),
            allowed_archive_hosts,
        })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl ReporterConfig {
    pub fn from_args(args: ReporterArgs) -> Result<Self> {
        Self::from_args_with(args, &process_env)
    }

    pub fn from_args_with<E>(args: ReporterArgs, env: &E) -> Result<Self>
    where
        E: Fn(&str) -> Option<String>,
    {
        let layer = Layer { env };

        let Some(bucket) = layer.string(args.bucket, "bucket") else {
            bail!("must pass --bucket flag (-b)");
        };

        Ok(Self {
            host: layer
                .string(args.host, "host")
                .unwrap_or_else(|| "0.0.0.0".into()),
            port: layer.parsed(args.port, "port")?.unwrap_or(9999),
            bucket,
            storage_dir: layer
                .string(args.storage_dir, "storage-dir")
                .unwrap_or_else(|| "./data/archives".into()),
            database_url: layer
                .string(args.database_url, "database-url")
                .unwrap_or_else(|| "sqlite://./data/meta/reporter.db".into()),
            static_region: layer
                .string(args.static_region, "static-region")
                .unwrap_or_else(|| "local".into()),
        })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn frontend_requires_reporter_endpoint() {
        let err = FrontendConfig::from_args_with(FrontendArgs::default(), &env_of(&[]))
            .unwrap_err();
        assert!(err.to_string().contains("--reporter-endpoint"));
    }

    #[test]
    fn frontend_reads_env_with_prefix() {
        let env = env_of(&[
            ("ECOMM_REPORTERENDPOINT", "http://reporter:9999"),
            ("ECOMM_PORT", "8081"),
            ("ECOMM_ALLOWEDARCHIVEHOSTS", "a.internal, b.internal"),
        ]);
        let cfg = FrontendConfig::from_args_with(FrontendArgs::default(), &env).unwrap();

        assert_eq!(cfg.reporter_endpoint, "http://reporter:9999");
        assert_eq!(cfg.port, 8081);
        assert_eq!(cfg.host, "0.0.0.0");
        assert_eq!(cfg.reporter_timeout, Duration::from_secs(30));
        assert_eq!(cfg.allowed_archive_hosts, vec!["a.internal", "b.internal"]);
        assert!(cfg.spa_build_root.is_none());
    }

    #[test]
    fn flags_win_over_env() {
        let env = env_of(&[("ECOMM_REPORTERENDPOINT", "http://env"), ("ECOMM_PORT", "1")]);
        let args = FrontendArgs {
            reporter_endpoint: Some("http://flag".into()),
            port: Some(2),
            ..FrontendArgs::default()
        };
        let cfg = FrontendConfig::from_args_with(args, &env).unwrap();

        assert_eq!(cfg.reporter_endpoint, "http://flag");
        assert_eq!(cfg.port, 2);
    }

    #[test]
    fn bad_port_in_env_is_reported() {
        let env = env_of(&[("ECOMM_BUCKET", "reports"), ("ECOMM_PORT", "ninety")]);
        let err = ReporterConfig::from_args_with(ReporterArgs::default(), &env).unwrap_err();
        assert!(format!("{:#}", err).contains("ECOMM_PORT"));
    }

    #[test]
    fn reporter_requires_bucket_and_has_defaults() {
        assert!(ReporterConfig::from_args_with(ReporterArgs::default(), &env_of(&[])).is_err());

        let env = env_of(&[("ECOMM_BUCKET", "reports")]);
        let cfg = ReporterConfig::from_args_with(ReporterArgs::default(), &env).unwrap();
        assert_eq!(cfg.bucket, "reports");
        assert_eq!(cfg.addr(), "0.0.0.0:9999");
        assert_eq!(cfg.static_region, "local");
    }

    #[test]
    fn cli_parses_subcommands() {
        let cli = Cli::try_parse_from([
            "ecomm-reporter",
            "backend",
            "-b",
            "reports",
            "-r",
            "us-east-1",
        ])
        .unwrap();
        match cli.command {
            Command::Backend(args) => {
                assert_eq!(args.bucket.as_deref(), Some("reports"));
                assert_eq!(args.static_region.as_deref(), Some("us-east-1"));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }
}
