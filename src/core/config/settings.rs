use super::parsing::{
    env_optional, env_or_default, parse_bool, parse_cors_origins, parse_environment, parse_f64,
    parse_mode, parse_u32, parse_u64,
};
use super::types::{
    ApiSettings, ConfigError, CorsSettings, RuntimeSettings, ScoringSettings, ServerHost,
    ServerPort, ServerSettings, Settings, TelemetrySettings, WidgetSettings,
};
use crate::schemas::essay::WidgetConfig;

const DEFAULT_INSTRUCTIONS: &str = "You are a PTE-style writing examiner. Evaluate the essay \
    based on grammar, vocabulary, coherence & cohesion, and task response. Return a JSON object \
    matching the config.scoring.categories ids and fields.";

const DEFAULT_PROMPT_HTML: &str = "<p><strong>Sample essay prompt:</strong> Discuss the \
    advantages and disadvantages of online learning compared to traditional classrooms.</p>";

impl Settings {
    pub(crate) fn load() -> Result<Self, ConfigError> {
        let host = env_or_default("ESSAY_HOST", "0.0.0.0");
        let port = env_or_default("ESSAY_PORT", "8000");

        let environment =
            parse_environment(env_optional("ESSAY_ENV").or_else(|| env_optional("ENVIRONMENT")));
        let strict_config =
            env_optional("ESSAY_STRICT_CONFIG").map(|value| parse_bool(&value)).unwrap_or(false)
                || environment.is_production();

        let project_name = env_or_default("PROJECT_NAME", "Essay Feedback API");
        let version = env_or_default("VERSION", env!("CARGO_PKG_VERSION"));
        let api_v1_str = env_or_default("API_V1_STR", "/api/v1");

        let cors_origins = parse_cors_origins(env_optional("BACKEND_CORS_ORIGINS"))?;

        let api_url = env_or_default("SCORING_API_URL", "");
        let timeout_seconds =
            parse_u64("SCORING_TIMEOUT_SECONDS", env_or_default("SCORING_TIMEOUT_SECONDS", "200"))?;
        let language = env_or_default("ESSAY_LANGUAGE", "en");
        let instructions = env_or_default("SCORING_INSTRUCTIONS", DEFAULT_INSTRUCTIONS);
        let topic_id = env_or_default("ESSAY_TOPIC_ID", "pte_essay_01");
        let widget_id = env_or_default("WIDGET_ID", "essay-widget");
        let course_id = env_or_default("COURSE_ID", "course-v1:DEMO+ESSAY+2025");
        let grade_weight = parse_f64("GRADE_WEIGHT", env_or_default("GRADE_WEIGHT", "1.0"))?;

        let mode = parse_mode("ESSAY_MODE", env_or_default("ESSAY_MODE", "practice"))?;
        let min_words = parse_u32("MIN_WORDS", env_or_default("MIN_WORDS", "150"))?;
        let max_words = parse_u32("MAX_WORDS", env_or_default("MAX_WORDS", "250"))?;
        let max_chars = parse_u32("MAX_CHARS", env_or_default("MAX_CHARS", "1500"))?;
        let max_attempts = parse_u32("MAX_ATTEMPTS", env_or_default("MAX_ATTEMPTS", "3"))?;
        let show_score_in_exam =
            env_optional("SHOW_SCORE_IN_EXAM").map(|value| parse_bool(&value)).unwrap_or(true);
        let prompt_html = env_or_default("ESSAY_PROMPT_HTML", DEFAULT_PROMPT_HTML);

        let log_level = env_or_default("LOG_LEVEL", "info");
        let json = env_optional("LOG_JSON").map(|value| parse_bool(&value)).unwrap_or(false);
        let prometheus_enabled =
            env_optional("PROMETHEUS_ENABLED").map(|value| parse_bool(&value)).unwrap_or(false);

        let settings = Self {
            server: ServerSettings {
                host: ServerHost::parse(host)?,
                port: ServerPort::parse(port)?,
            },
            runtime: RuntimeSettings { environment, strict_config },
            api: ApiSettings { project_name, version, api_v1_str },
            cors: CorsSettings { origins: cors_origins },
            scoring: ScoringSettings {
                api_url,
                timeout_seconds,
                language,
                instructions,
                topic_id,
                widget_id,
                course_id,
                grade_weight,
            },
            widget: WidgetSettings {
                mode,
                min_words,
                max_words,
                max_chars,
                max_attempts,
                show_score_in_exam,
                prompt_html,
            },
            telemetry: TelemetrySettings { log_level, json, prometheus_enabled },
        };

        settings.validate()?;
        Ok(settings)
    }

    pub(crate) fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host.0, self.server.port.0)
    }

    pub(crate) fn server_host(&self) -> &str {
        &self.server.host.0
    }

    pub(crate) fn server_port(&self) -> u16 {
        self.server.port.0
    }

    pub(crate) fn api(&self) -> &ApiSettings {
        &self.api
    }

    pub(crate) fn cors(&self) -> &CorsSettings {
        &self.cors
    }

    pub(crate) fn scoring(&self) -> &ScoringSettings {
        &self.scoring
    }

    pub(crate) fn widget(&self) -> &WidgetSettings {
        &self.widget
    }

    pub(crate) fn telemetry(&self) -> &TelemetrySettings {
        &self.telemetry
    }

    pub(crate) fn runtime(&self) -> &RuntimeSettings {
        &self.runtime
    }

    /// Widget initialization arguments for one learner.
    pub(crate) fn widget_config(&self, attempts_used: u32, has_previous_result: bool) -> WidgetConfig {
        WidgetConfig {
            mode: self.widget.mode,
            min_words: self.widget.min_words,
            max_words: self.widget.max_words,
            max_chars: self.widget.max_chars,
            max_attempts: self.widget.max_attempts,
            attempts_used,
            show_score_in_exam: self.widget.show_score_in_exam,
            has_previous_result,
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.widget.max_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                field: "MAX_ATTEMPTS",
                value: "0".to_string(),
            });
        }

        if self.scoring.timeout_seconds == 0 {
            return Err(ConfigError::InvalidValue {
                field: "SCORING_TIMEOUT_SECONDS",
                value: "0".to_string(),
            });
        }

        if self.scoring.grade_weight < 0.0 {
            return Err(ConfigError::InvalidValue {
                field: "GRADE_WEIGHT",
                value: self.scoring.grade_weight.to_string(),
            });
        }

        if !(self.runtime.strict_config || self.runtime.environment.is_production()) {
            return Ok(());
        }

        if !self.scoring.is_configured() {
            return Err(ConfigError::MissingSecret("SCORING_API_URL"));
        }

        Ok(())
    }
}
