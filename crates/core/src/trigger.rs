use regex::Regex;

/// Body of every reply the bot sends.
pub const REPLY_BODY: &str = "PONG";

// Whole-word, case-sensitive. "pinging" and "sping" must not match.
const PING_PATTERN: &str = r"(?:^|\W)ping(?:$|\W)";

/// The reply decision: does a post body contain the trigger word?
#[derive(Clone, Debug)]
pub struct PingTrigger {
    pattern: Regex,
}

impl Default for PingTrigger {
    fn default() -> Self {
        Self { pattern: Regex::new(PING_PATTERN).expect("static trigger pattern compiles") }
    }
}

impl PingTrigger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn matches(&self, message: &str) -> bool {
        self.pattern.is_match(message)
    }
}
