use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Built-in desktop browser user agents
pub const DEFAULT_USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Safari/605.1.15",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/123.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:125.0) Gecko/20100101 Firefox/125.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
];

/// Round-robin user-agent rotation
///
/// Each loader context owns its own rotor, so concurrent runs do not share
/// rotation state.
#[derive(Debug, Clone)]
pub struct UserAgentRotator {
    agents: Arc<[String]>,
    next: Arc<AtomicUsize>,
}

impl UserAgentRotator {
    /// Uses `agents`, or the built-in pool when empty
    pub fn new(agents: &[String]) -> Self {
        let agents: Vec<String> = if agents.is_empty() {
            DEFAULT_USER_AGENTS.iter().map(|s| s.to_string()).collect()
        } else {
            agents.to_vec()
        };
        Self {
            agents: agents.into(),
            next: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Returns the next agent in rotation
    pub fn next(&self) -> &str {
        let index = self.next.fetch_add(1, Ordering::Relaxed) % self.agents.len();
        &self.agents[index]
    }

    /// First agent of the pool, used for browser pages
    pub fn primary(&self) -> &str {
        &self.agents[0]
    }
}

impl Default for UserAgentRotator {
    fn default() -> Self {
        Self::new(&[])
    }
}
