pub const HEALTH_PATH: &str = "/health";
pub const MODELS_PATH: &str = "/api/models";
pub const CONVERT_PATH: &str = "/api/convert";

pub const REQUEST_ID_HEADER: &str = "x-request-id";

pub const CONFIG_PATH_ENV: &str = "CODESHIFT_CONFIG_PATH";
pub const DEFAULT_CONFIG_PATH: &str = "./codeshift_config.yaml";

pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:3001";
pub const DEFAULT_OLLAMA_ENDPOINT: &str = "http://localhost:11434";
pub const DEFAULT_MODEL: &str = "qwen2.5-coder:7b";
pub const DEFAULT_HEALTH_TIMEOUT_SECS: u64 = 2;
pub const DEFAULT_MODELS_TIMEOUT_SECS: u64 = 3;

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are an expert software engineer who converts source code between programming languages. \
Translate the code you are given into idiomatic, working code in the language the user asks for, or into modern Python when no target is named. \
Reply with the converted code only, without explanations or markdown fences.";
