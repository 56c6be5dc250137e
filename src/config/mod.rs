//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{net::SocketAddr, path::PathBuf, str::FromStr, time::Duration};

use clap::{Args, Parser, Subcommand, ValueHint, builder::BoolishValueParser};
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

use crate::domain::school::SchoolProfile;

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "naskah";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_GRACEFUL_SHUTDOWN_SECS: u64 = 30;
const DEFAULT_SESSIONS_FILE: &str = "data/sessions.json";
const DEFAULT_MAX_ATTACHMENT_BYTES: u64 = 10 * 1024 * 1024;
const DEFAULT_AI_MODEL: &str = "gemini-2.0-flash-exp";
const DEFAULT_AI_TEMPERATURE: f32 = 0.7;
const DEFAULT_AI_TIMEOUT_SECS: u64 = 60;

const DEFAULT_SCHOOL_GOVERNMENT_LINE: &str = "PEMERINTAH KABUPATEN MOJOKERTO";
const DEFAULT_SCHOOL_OFFICE_LINE: &str = "DINAS PENDIDIKAN KABUPATEN MOJOKERTO";
const DEFAULT_SCHOOL_NAME: &str = "SMPN 3 PACET";
const DEFAULT_SCHOOL_ADDRESS: &str =
    "Jl. Tirtawening Desa Kembangbelor Kec. Pacet Kab. Mojokerto";
const DEFAULT_SCHOOL_TAG: &str = "SMPN3Pacet";
const DEFAULT_PRINCIPAL_NAME: &str = "Didik Sulistyo, M.M.Pd";
const DEFAULT_PRINCIPAL_NIP: &str = "196605181989011002";
const DEFAULT_SCHOOL_YEAR: &str = "2025/2026";

/// Command-line arguments for the Naskah binary.
#[derive(Debug, Parser)]
#[command(name = "naskah", version, about = "Naskah school administration assistant")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "NASKAH_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the Naskah HTTP service.
    Serve(Box<ServeArgs>),
    /// Render a raw assistant reply into a standalone document.
    #[command(name = "render")]
    RenderDocument(RenderArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Clone)]
pub struct RenderArgs {
    /// Input file with the raw reply text; reads stdin when omitted.
    #[arg(value_name = "FILE", value_hint = ValueHint::FilePath)]
    pub input: Option<PathBuf>,

    /// Output file for the document; writes stdout when omitted.
    #[arg(long = "output", short = 'o', value_name = "FILE", value_hint = ValueHint::FilePath)]
    pub output: Option<PathBuf>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    /// Override the listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the listener port.
    #[arg(long = "server-port", value_name = "PORT")]
    pub server_port: Option<u16>,

    /// Override the graceful shutdown timeout.
    #[arg(long = "server-graceful-shutdown-seconds", value_name = "SECONDS")]
    pub server_graceful_shutdown_seconds: Option<u64>,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,

    /// Override the generation model name.
    #[arg(long = "ai-model", value_name = "MODEL")]
    pub ai_model: Option<String>,

    /// Override the generation request timeout.
    #[arg(long = "ai-timeout-seconds", value_name = "SECONDS")]
    pub ai_timeout_seconds: Option<u64>,

    /// Override the sessions file path.
    #[arg(long = "sessions-file", value_name = "PATH")]
    pub sessions_file: Option<PathBuf>,

    /// Override the per-attachment size ceiling in bytes.
    #[arg(long = "uploads-max-attachment-bytes", value_name = "BYTES")]
    pub uploads_max_attachment_bytes: Option<u64>,
}

/// Fully-resolved deployment settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub school: SchoolProfile,
    pub ai: AiSettings,
    pub sessions: SessionSettings,
    pub uploads: UploadSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub addr: SocketAddr,
    pub graceful_shutdown: Duration,
    /// Optional shared passphrase gating the interface; open when unset.
    pub staff_passphrase: Option<String>,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct AiSettings {
    /// Fallback credential; a key saved through the interface wins.
    pub api_key: Option<String>,
    pub model: String,
    pub temperature: f32,
    pub timeout: Duration,
    pub base_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub file: PathBuf,
}

#[derive(Debug, Clone)]
pub struct UploadSettings {
    pub max_attachment_bytes: usize,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix("NASKAH").separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_serve_overrides(&args.overrides),
        Some(Command::RenderDocument(_)) | None => {
            raw.apply_serve_overrides(&ServeOverrides::default())
        }
    }

    Settings::from_raw(raw)
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    school: RawSchoolSettings,
    ai: RawAiSettings,
    sessions: RawSessionSettings,
    uploads: RawUploadSettings,
}

impl RawSettings {
    fn apply_serve_overrides(&mut self, overrides: &ServeOverrides) {
        if let Some(host) = overrides.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(port) = overrides.server_port {
            self.server.port = Some(port);
        }
        if let Some(seconds) = overrides.server_graceful_shutdown_seconds {
            self.server.graceful_shutdown_seconds = Some(seconds);
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(model) = overrides.ai_model.as_ref() {
            self.ai.model = Some(model.clone());
        }
        if let Some(seconds) = overrides.ai_timeout_seconds {
            self.ai.timeout_seconds = Some(seconds);
        }
        if let Some(file) = overrides.sessions_file.as_ref() {
            self.sessions.file = Some(file.clone());
        }
        if let Some(limit) = overrides.uploads_max_attachment_bytes {
            self.uploads.max_attachment_bytes = Some(limit);
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            school,
            ai,
            sessions,
            uploads,
        } = raw;

        let server = build_server_settings(server)?;
        let logging = build_logging_settings(logging)?;
        let school = build_school_profile(school)?;
        let ai = build_ai_settings(ai)?;
        let sessions = build_session_settings(sessions)?;
        let uploads = build_upload_settings(uploads)?;

        Ok(Self {
            server,
            logging,
            school,
            ai,
            sessions,
            uploads,
        })
    }
}

fn build_server_settings(server: RawServerSettings) -> Result<ServerSettings, LoadError> {
    let host = server.host.unwrap_or_else(|| DEFAULT_HOST.to_string());

    let port = server.port.unwrap_or(DEFAULT_PORT);
    if port == 0 {
        return Err(LoadError::invalid(
            "server.port",
            "port must be greater than zero",
        ));
    }

    let addr = parse_socket_addr(&host, port)
        .map_err(|reason| LoadError::invalid("server.addr", reason))?;

    let graceful_secs = server
        .graceful_shutdown_seconds
        .unwrap_or(DEFAULT_GRACEFUL_SHUTDOWN_SECS);
    if graceful_secs == 0 {
        return Err(LoadError::invalid(
            "server.graceful_shutdown_seconds",
            "must be greater than zero",
        ));
    }

    let staff_passphrase = server.staff_passphrase.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    });

    Ok(ServerSettings {
        addr,
        graceful_shutdown: Duration::from_secs(graceful_secs),
        staff_passphrase,
    })
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_school_profile(school: RawSchoolSettings) -> Result<SchoolProfile, LoadError> {
    let field = |value: Option<String>, fallback: &str, key: &'static str| {
        let resolved = value.unwrap_or_else(|| fallback.to_string());
        if resolved.trim().is_empty() {
            return Err(LoadError::invalid(key, "must not be blank"));
        }
        Ok(resolved)
    };

    Ok(SchoolProfile {
        government_line: field(
            school.government_line,
            DEFAULT_SCHOOL_GOVERNMENT_LINE,
            "school.government_line",
        )?,
        office_line: field(
            school.office_line,
            DEFAULT_SCHOOL_OFFICE_LINE,
            "school.office_line",
        )?,
        name: field(school.name, DEFAULT_SCHOOL_NAME, "school.name")?,
        address: field(school.address, DEFAULT_SCHOOL_ADDRESS, "school.address")?,
        tag: field(school.tag, DEFAULT_SCHOOL_TAG, "school.tag")?,
        principal_name: field(
            school.principal_name,
            DEFAULT_PRINCIPAL_NAME,
            "school.principal_name",
        )?,
        principal_nip: field(
            school.principal_nip,
            DEFAULT_PRINCIPAL_NIP,
            "school.principal_nip",
        )?,
        school_year: field(school.school_year, DEFAULT_SCHOOL_YEAR, "school.school_year")?,
    })
}

fn build_ai_settings(ai: RawAiSettings) -> Result<AiSettings, LoadError> {
    let api_key = ai.api_key.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    });

    let model = ai.model.unwrap_or_else(|| DEFAULT_AI_MODEL.to_string());
    if model.trim().is_empty() {
        return Err(LoadError::invalid("ai.model", "must not be blank"));
    }

    let temperature = ai.temperature.unwrap_or(DEFAULT_AI_TEMPERATURE);
    if !(0.0..=2.0).contains(&temperature) {
        return Err(LoadError::invalid(
            "ai.temperature",
            "must be between 0.0 and 2.0",
        ));
    }

    let timeout_secs = ai.timeout_seconds.unwrap_or(DEFAULT_AI_TIMEOUT_SECS);
    if timeout_secs == 0 {
        return Err(LoadError::invalid(
            "ai.timeout_seconds",
            "must be greater than zero",
        ));
    }

    let base_url = ai.base_url.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    });

    Ok(AiSettings {
        api_key,
        model,
        temperature,
        timeout: Duration::from_secs(timeout_secs),
        base_url,
    })
}

fn build_session_settings(sessions: RawSessionSettings) -> Result<SessionSettings, LoadError> {
    let file = sessions
        .file
        .unwrap_or_else(|| PathBuf::from(DEFAULT_SESSIONS_FILE));
    if file.as_os_str().is_empty() {
        return Err(LoadError::invalid("sessions.file", "path must not be empty"));
    }
    Ok(SessionSettings { file })
}

fn build_upload_settings(uploads: RawUploadSettings) -> Result<UploadSettings, LoadError> {
    let limit = uploads
        .max_attachment_bytes
        .unwrap_or(DEFAULT_MAX_ATTACHMENT_BYTES);
    if limit == 0 {
        return Err(LoadError::invalid(
            "uploads.max_attachment_bytes",
            "must be greater than zero",
        ));
    }
    let max_attachment_bytes = usize::try_from(limit).map_err(|_| {
        LoadError::invalid(
            "uploads.max_attachment_bytes",
            "value exceeds supported range for usize",
        )
    })?;

    Ok(UploadSettings {
        max_attachment_bytes,
    })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    port: Option<u16>,
    graceful_shutdown_seconds: Option<u64>,
    staff_passphrase: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSchoolSettings {
    government_line: Option<String>,
    office_line: Option<String>,
    name: Option<String>,
    address: Option<String>,
    tag: Option<String>,
    principal_name: Option<String>,
    principal_nip: Option<String>,
    school_year: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawAiSettings {
    api_key: Option<String>,
    model: Option<String>,
    temperature: Option<f32>,
    timeout_seconds: Option<u64>,
    base_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSessionSettings {
    file: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawUploadSettings {
    max_attachment_bytes: Option<u64>,
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = format!("{host}:{port}");
    candidate
        .parse()
        .map_err(|err| format!("invalid address `{candidate}`: {err}"))
}
