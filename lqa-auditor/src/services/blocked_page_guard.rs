//! Vision check for anti-bot and access-denied pages
//!
//! Scrapers can return content successfully while the page itself is a
//! captcha, a bot challenge or an error wall. The guard asks a vision model
//! to classify the screenshot. It fails open: any classifier error or
//! unexpected answer counts as accessible.

use std::sync::Arc;

use crate::types::VisionClassifier;

/// Maximum number of words kept from the classifier's reason
pub const MAX_REASON_WORDS: usize = 50;

/// Reason used when the classifier flags a page without saying why
pub const DEFAULT_BLOCK_REASON: &str = "Blocked page detected";

pub const CLASSIFICATION_PROMPT: &str = "\
Look at this website screenshot. Is this page blocked or inaccessible?

Signs of a blocked page:
- CAPTCHA or \"verify you are human\" challenges
- Cloudflare, Akamai or similar bot-protection interstitials
- \"Access denied\", \"403 Forbidden\" or rate-limit messages
- Empty pages with only an error message

Answer with exactly one line:
BLOCKED: <short reason>
or
ACCESSIBLE";

/// Classification of one screenshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockVerdict {
    pub blocked: bool,
    pub reason: Option<String>,
}

impl BlockVerdict {
    pub fn accessible() -> Self {
        Self {
            blocked: false,
            reason: None,
        }
    }
}

/// Parse the classifier's answer
///
/// A leading `BLOCKED:` (any case) means blocked; everything else means
/// accessible.
pub fn parse_verdict(answer: &str) -> BlockVerdict {
    let answer = answer.trim();
    let Some(prefix) = answer.get(..8) else {
        return BlockVerdict::accessible();
    };
    if !prefix.eq_ignore_ascii_case("BLOCKED:") {
        return BlockVerdict::accessible();
    }

    let reason = answer[8..]
        .split_whitespace()
        .take(MAX_REASON_WORDS)
        .collect::<Vec<_>>()
        .join(" ");

    BlockVerdict {
        blocked: true,
        reason: Some(if reason.is_empty() {
            DEFAULT_BLOCK_REASON.to_string()
        } else {
            reason
        }),
    }
}

pub struct BlockedPageGuard {
    classifier: Arc<dyn VisionClassifier>,
}

impl BlockedPageGuard {
    pub fn new(classifier: Arc<dyn VisionClassifier>) -> Self {
        Self { classifier }
    }

    /// Classify a screenshot; errors are logged and treated as accessible
    pub async fn classify(&self, screenshot: &[u8]) -> BlockVerdict {
        match self.classifier.classify(CLASSIFICATION_PROMPT, screenshot).await {
            Ok(answer) => {
                let verdict = parse_verdict(&answer);
                tracing::debug!(
                    blocked = verdict.blocked,
                    reason = verdict.reason.as_deref().unwrap_or(""),
                    "Blocked-page classification"
                );
                verdict
            }
            Err(e) => {
                tracing::warn!(error = %e, "Blocked-page classifier failed, treating page as accessible");
                BlockVerdict::accessible()
            }
        }
    }
}
