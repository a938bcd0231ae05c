//! Keyword and engagement scoring for feed posts.

/// Topics worth engaging with; each hit adds [`KEYWORD_POINTS`].
pub const SIGNAL_KEYWORDS: &[&str] = &[
    "mcp",
    "model context protocol",
    "financial",
    "compliance",
    "defi",
    "solana",
    "agent",
    "autonomous",
    "portfolio",
    "regulatory",
    "open source",
    "skill",
    "tool",
    "api",
    "marketplace",
];

pub const KEYWORD_POINTS: u32 = 10;

/// Score and suggested angle for one feed post.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evaluation {
    pub score: u32,
    pub reasons: Vec<String>,
    pub angle: &'static str,
}

#[must_use]
pub fn evaluate(title: &str, body: &str, upvotes: u64, comments: u64) -> Evaluation {
    let text = format!("{} {}", title.to_lowercase(), body.to_lowercase());
    let mut score = 0;
    let mut reasons = Vec::new();

    for keyword in SIGNAL_KEYWORDS {
        if text.contains(keyword) {
            score += KEYWORD_POINTS;
            reasons.push(format!("keyword:{keyword}"));
        }
    }

    if upvotes > 50 {
        score += 15;
        reasons.push("high_upvotes".to_string());
    } else if upvotes > 10 {
        score += 8;
    }

    // Few comments leaves room to add value; a busy thread is still worth joining.
    if comments < 3 {
        score += 5;
        reasons.push("low_comments".to_string());
    } else if comments > 20 {
        score += 3;
        reasons.push("active_discussion".to_string());
    }

    Evaluation {
        score,
        reasons,
        angle: angle_for(&text),
    }
}

fn angle_for(text: &str) -> &'static str {
    let any = |words: &[&str]| words.iter().any(|w| text.contains(w));
    if any(&["mcp", "model context protocol"]) {
        "direct MCP expertise: answer the question or point to a relevant tool"
    } else if any(&["financial", "compliance", "regulatory"]) {
        "financial expertise: add a concrete, authoritative perspective"
    } else if any(&["agent", "autonomous", "ai"]) {
        "agent-to-agent connection: relate to their work and invite collaboration"
    } else if any(&["crypto", "defi", "solana"]) {
        "crypto/DeFi angle: add market-structure context"
    } else if any(&["build", "show", "ship", "launch"]) {
        "builder solidarity: encourage and share a useful resource"
    } else {
        "general comment with a practical takeaway"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keywords_and_engagement_accumulate() {
        let eval = evaluate("New MCP server for DeFi", "", 60, 1);
        // mcp + defi + high upvotes + low comments
        assert_eq!(eval.score, 10 + 10 + 15 + 5);
        assert!(eval.angle.starts_with("direct MCP"));
        assert!(eval.reasons.contains(&"high_upvotes".to_string()));
    }

    #[test]
    fn moderate_upvotes_and_busy_thread() {
        let eval = evaluate("weekend plans", "nothing relevant", 11, 21);
        assert_eq!(eval.score, 8 + 3);
        assert_eq!(eval.angle, "general comment with a practical takeaway");
    }

    #[test]
    fn middle_comment_band_adds_nothing() {
        assert_eq!(evaluate("x", "", 0, 10).score, 0);
    }

    #[test]
    fn body_text_counts_case_insensitively() {
        let eval = evaluate("Hello", "Our COMPLIANCE team", 0, 5);
        assert_eq!(eval.score, 10);
        assert!(eval.angle.starts_with("financial"));
    }
}
