use std::net::{IpAddr, Ipv4Addr};
use std::str::FromStr;
use std::sync::OnceLock;
use std::time::Duration;

use crate::ports::ai::Language;
use crate::rtp::{Codec, RtpEngineConfig};

#[derive(Clone, Debug)]
pub struct Config {
    pub rtp_bind_ip: IpAddr,
    pub advertised_ip: String,
    pub rtp_send_queue: usize,
    pub rtp_join_timeout: Duration,
    pub session_max_age: Duration,
    pub sweep_interval: Duration,
}

impl Config {
    /// Reads `RTP_BIND_IP`, `ADVERTISED_IP`, `RTP_SEND_QUEUE`,
    /// `RTP_JOIN_TIMEOUT_MS`, `SESSION_MAX_AGE_SEC` and
    /// `SESSION_SWEEP_INTERVAL_SEC`, falling back to defaults for unset or
    /// unparsable values.
    pub fn from_env() -> Self {
        Self {
            rtp_bind_ip: env_parse("RTP_BIND_IP", IpAddr::V4(Ipv4Addr::UNSPECIFIED)),
            advertised_ip: env_non_empty("ADVERTISED_IP").unwrap_or_else(|| "127.0.0.1".to_string()),
            rtp_send_queue: env_parse("RTP_SEND_QUEUE", 256usize).max(1),
            rtp_join_timeout: env_duration_ms("RTP_JOIN_TIMEOUT_MS", 1_000),
            session_max_age: env_duration_sec("SESSION_MAX_AGE_SEC", 1_800),
            sweep_interval: env_duration_sec("SESSION_SWEEP_INTERVAL_SEC", 30),
        }
    }

    pub fn engine_config(&self, codec: Codec) -> RtpEngineConfig {
        RtpEngineConfig {
            bind_ip: self.rtp_bind_ip,
            codec,
            send_queue: self.rtp_send_queue,
            join_timeout: self.rtp_join_timeout,
        }
    }
}

/// Per-call tuning shared by every session.
#[derive(Clone, Debug)]
pub struct SessionRuntimeConfig {
    pub default_language: Language,
    pub ivr_timeout: Duration,
    pub ivr_prompt_delay: Duration,
    pub ivr_energy_threshold: f64,
    pub silence_threshold: f64,
    pub llm_timeout: Duration,
    pub tts_timeout: Duration,
    pub join_timeout: Duration,
}

impl Default for SessionRuntimeConfig {
    fn default() -> Self {
        Self {
            default_language: Language::Zh,
            ivr_timeout: Duration::from_secs(10),
            ivr_prompt_delay: Duration::from_millis(1_000),
            ivr_energy_threshold: 1_000.0,
            silence_threshold: 300.0,
            llm_timeout: Duration::from_millis(15_000),
            tts_timeout: Duration::from_millis(15_000),
            join_timeout: Duration::from_millis(1_000),
        }
    }
}

impl SessionRuntimeConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            default_language: env_parse("DEFAULT_LANGUAGE", defaults.default_language),
            ivr_timeout: env_duration_sec("IVR_TIMEOUT_SEC", 10),
            ivr_prompt_delay: env_duration_ms("IVR_PROMPT_DELAY_MS", 1_000),
            ivr_energy_threshold: env_parse("IVR_ENERGY_THRESHOLD", defaults.ivr_energy_threshold),
            silence_threshold: env_parse("SILENCE_THRESHOLD", defaults.silence_threshold),
            llm_timeout: env_duration_ms("LLM_TIMEOUT_MS", 15_000),
            tts_timeout: env_duration_ms("TTS_TIMEOUT_MS", 15_000),
            join_timeout: env_duration_ms("RTP_JOIN_TIMEOUT_MS", 1_000),
        }
    }
}

#[derive(Clone, Debug)]
pub struct VadConfig {
    pub energy_threshold: f64,
    pub end_silence_ms: u64,
    pub min_speech_ms: u64,
    pub max_speech_ms: u64,
}

impl Default for VadConfig {
    fn default() -> Self {
        Self {
            energy_threshold: 500.0,
            end_silence_ms: 800,
            min_speech_ms: 300,
            max_speech_ms: 30_000,
        }
    }
}

impl VadConfig {
    fn from_env() -> Self {
        Self {
            energy_threshold: env_parse("VAD_ENERGY_THRESHOLD", 500.0),
            end_silence_ms: env_parse("VAD_END_SILENCE_MS", 800u64),
            min_speech_ms: env_parse("VAD_MIN_SPEECH_MS", 300u64),
            max_speech_ms: env_parse("VAD_MAX_SPEECH_MS", 30_000u64),
        }
    }
}

static VAD_CONFIG: OnceLock<VadConfig> = OnceLock::new();

pub fn vad_config() -> &'static VadConfig {
    VAD_CONFIG.get_or_init(VadConfig::from_env)
}

#[derive(Clone, Debug)]
pub struct Timeouts {
    pub ai_http: Duration,
}

impl Timeouts {
    fn from_env() -> Self {
        Self {
            ai_http: env_duration_ms("AI_HTTP_TIMEOUT_MS", 20_000),
        }
    }
}

static TIMEOUTS: OnceLock<Timeouts> = OnceLock::new();

pub fn timeouts() -> &'static Timeouts {
    TIMEOUTS.get_or_init(Timeouts::from_env)
}

#[derive(Clone, Debug)]
pub struct AiConfig {
    pub asr_url: String,
    pub ollama_url: String,
    pub ollama_model: String,
    pub tts_url: String,
}

impl AiConfig {
    fn from_env() -> Self {
        Self {
            asr_url: env_non_empty("ASR_URL")
                .unwrap_or_else(|| "http://localhost:9000/transcribe".to_string()),
            ollama_url: env_non_empty("OLLAMA_URL")
                .unwrap_or_else(|| "http://localhost:11434/api/chat".to_string()),
            ollama_model: env_non_empty("OLLAMA_MODEL").unwrap_or_else(|| "qwen2.5:3b".to_string()),
            tts_url: env_non_empty("TTS_URL").unwrap_or_else(|| "http://localhost:50000/tts".to_string()),
        }
    }
}

static AI_CONFIG: OnceLock<AiConfig> = OnceLock::new();

pub fn ai_config() -> &'static AiConfig {
    AI_CONFIG.get_or_init(AiConfig::from_env)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogMode {
    Stdout,
    File,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub mode: LogMode,
    pub format: LogFormat,
    pub dir: Option<String>,
    pub file_name: String,
}

impl LoggingConfig {
    fn from_env() -> Self {
        let dir_env = env_non_empty("LOG_DIR");
        let format = match env_non_empty("LOG_FORMAT").as_deref() {
            Some("json") => LogFormat::Json,
            _ => LogFormat::Text,
        };
        let mode = match env_non_empty("LOG_MODE").as_deref() {
            Some("file") => LogMode::File,
            Some("stdout") => LogMode::Stdout,
            _ if dir_env.is_some() => LogMode::File,
            _ => LogMode::Stdout,
        };
        let dir = match mode {
            LogMode::File => Some(dir_env.unwrap_or_else(|| "logs".to_string())),
            LogMode::Stdout => None,
        };
        let file_name =
            env_non_empty("LOG_FILE_NAME").unwrap_or_else(|| "rtp-voice-agent.log".to_string());
        Self {
            mode,
            format,
            dir,
            file_name,
        }
    }
}

static LOGGING: OnceLock<LoggingConfig> = OnceLock::new();

pub fn logging_config() -> &'static LoggingConfig {
    LOGGING.get_or_init(LoggingConfig::from_env)
}

fn env_duration_ms(key: &str, default_ms: u64) -> Duration {
    Duration::from_millis(env_parse(key, default_ms))
}

fn env_duration_sec(key: &str, default_sec: u64) -> Duration {
    Duration::from_secs(env_parse(key, default_sec))
}

fn env_parse<T: FromStr>(key: &str, default_value: T) -> T {
    let Some(raw) = env_non_empty(key) else {
        return default_value;
    };
    match raw.parse::<T>() {
        Ok(value) => value,
        Err(_) => {
            log::warn!("[config] invalid {}={:?}, using default", key, raw);
            default_value
        }
    }
}

fn env_non_empty(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_and_invalid_values_fall_back() {
        std::env::remove_var("RTP_CFG_TEST_UNSET");
        assert_eq!(env_parse("RTP_CFG_TEST_UNSET", 7u64), 7);
        std::env::set_var("RTP_CFG_TEST_BAD", "not-a-number");
        assert_eq!(env_parse("RTP_CFG_TEST_BAD", 7u64), 7);
        std::env::set_var("RTP_CFG_TEST_LANG", "en");
        assert_eq!(env_parse("RTP_CFG_TEST_LANG", Language::Zh), Language::En);
        std::env::set_var("RTP_CFG_TEST_BLANK", "   ");
        assert_eq!(env_non_empty("RTP_CFG_TEST_BLANK"), None);
    }

    #[test]
    fn session_defaults() {
        let cfg = SessionRuntimeConfig::default();
        assert_eq!(cfg.default_language, Language::Zh);
        assert_eq!(cfg.ivr_timeout, Duration::from_secs(10));
        assert_eq!(cfg.ivr_energy_threshold, 1000.0);
        assert_eq!(cfg.silence_threshold, 300.0);
    }
}
