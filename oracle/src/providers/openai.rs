use super::Provider;

/// OpenAI-compatible chat completions (the default dialect).
#[derive(Debug, Clone, Default)]
pub struct OpenAi;

impl Provider for OpenAi {}
