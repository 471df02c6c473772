use serde::Deserialize;
use serde::Serialize;

/// Why the provider stopped generating. Distinct from HTTP/transport
/// errors, which surface as `loom_error::Error::Provider`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
    ToolCalls,
    Length,
    ContentFilter,
    Other,
}

impl Default for FinishReason {
    /// Normalization default when a provider omits the field or reports
    /// an unrecognized value — treated as a clean stop rather than
    /// propagating `Other` silently through the loop.
    fn default() -> Self {
        FinishReason::Stop
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
    #[serde(default)]
    pub cache_read_tokens: u32,
    #[serde(default)]
    pub cache_write_tokens: u32,
}

impl TokenUsage {
    pub fn total(&self) -> u32 {
        self.input_tokens + self.output_tokens
    }

    /// Merge a later usage report into this one, keeping the maximum of
    /// each field. Providers emit usage progressively as a stream
    /// advances and later reports are cumulative supersets in practice,
    /// but occasional out-of-order delivery means `max` is safer than
    /// unconditional overwrite.
    pub fn merge_max(&mut self, other: &TokenUsage) {
        self.input_tokens = self.input_tokens.max(other.input_tokens);
        self.output_tokens = self.output_tokens.max(other.output_tokens);
        self.cache_read_tokens = self.cache_read_tokens.max(other.cache_read_tokens);
        self.cache_write_tokens = self.cache_write_tokens.max(other.cache_write_tokens);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_max_keeps_larger_values() {
        let mut a = TokenUsage {
            input_tokens: 10,
            output_tokens: 5,
            ..Default::default()
        };
        let b = TokenUsage {
            input_tokens: 8,
            output_tokens: 12,
            ..Default::default()
        };
        a.merge_max(&b);
        assert_eq!(a.input_tokens, 10);
        assert_eq!(a.output_tokens, 12);
    }
}
