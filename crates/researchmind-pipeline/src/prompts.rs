//! Prompt text for each stage and the parsers for the structured replies.

use std::fmt::Write as _;

use crate::records::{Claim, ClaimStatus, Confidence, Critique, Evidence, Summary, Verdict};

pub const SUMMARIZER_HEADER: &str = "You are a research summarizer.";
pub const CRITIC_HEADER: &str = "You are a critical research reviewer.";
pub const FACT_CHECKER_HEADER: &str = "You are a fact-checker.";
pub const SYNTHESIZER_HEADER: &str = "You are a research synthesizer.";

pub const DISPUTED_HEADING: &str = "## Disputed or Uncertain Points";

const SUMMARY_INPUT_CHARS: usize = 2000;

/// Longest prefix of `s` with at most `max` characters.
pub fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

pub fn summarize(query: &str, evidence: &Evidence) -> String {
    format!(
        "{SUMMARIZER_HEADER} Summarize the source below in 3-5 sentences, keeping only facts that help answer the research question.\n\n\
         Research question: {query}\n\
         Source: {}\n\n\
         Content:\n{}\n\n\
         Summary:",
        evidence.source,
        truncate_chars(&evidence.content, SUMMARY_INPUT_CHARS)
    )
}

pub fn critique(query: &str, summary: &Summary) -> String {
    format!(
        "{CRITIC_HEADER} Assess how reliable the summary below is for answering the research question.\n\n\
         Research question: {query}\n\
         Source: {} ({})\n\n\
         Summary:\n{}\n\n\
         Respond in exactly this format:\n\
         CONFIDENCE: HIGH, MEDIUM, or LOW\n\
         ISSUES: bias, missing context or unsupported statements, or None\n\
         VERDICT: RELIABLE, QUESTIONABLE, or UNRELIABLE",
        summary.source, summary.source_type, summary.summary
    )
}

pub fn fact_check(query: &str, reliable: &[Critique], max_claims: usize) -> String {
    let mut sources = String::new();
    for (i, c) in reliable.iter().enumerate() {
        let _ = write!(sources, "[Source {}] {}\n{}\n\n", i + 1, c.summary.source, c.summary.summary);
    }
    format!(
        "{FACT_CHECKER_HEADER} Extract between 3 and {max_claims} key factual claims from the summaries below and check each claim against the other sources.\n\n\
         Research question: {query}\n\n\
         {sources}\
         For each claim respond with:\n\
         CLAIM: the claim\n\
         STATUS: VERIFIED (supported by more than one source), DISPUTED (sources disagree), or UNVERIFIED (single source only)\n\
         REASON: one sentence\n\
         ---"
    )
}

/// Context block handed to the synthesizer.
pub fn synthesis_context(reliable: &[Critique], claims: &[Claim]) -> String {
    let mut ctx = String::from("=== VERIFIED RESEARCH SUMMARIES ===\n");
    if reliable.is_empty() {
        ctx.push_str("(no verified sources were found)\n");
    }
    for (i, c) in reliable.iter().enumerate() {
        let _ = write!(ctx, "\n[Source {}] {}\nConfidence: {}\nSummary: {}\n", i + 1, c.summary.source, c.confidence, c.summary.summary);
    }
    ctx.push_str("\n=== FACT-CHECKED CLAIMS ===\n");
    if claims.is_empty() {
        ctx.push_str("(no claims were extracted)\n");
    }
    for claim in claims {
        let mark = match claim.status {
            ClaimStatus::Verified => "✓",
            ClaimStatus::Disputed => "⚠",
            ClaimStatus::Unverified => "?",
        };
        let _ = writeln!(ctx, "{mark} {}: {} ({})", claim.status, claim.claim, claim.reason);
    }
    ctx
}

pub fn disputed_warning(disputed: &[&Claim]) -> Option<String> {
    if disputed.is_empty() { return None; }
    let list: Vec<&str> = disputed.iter().map(|c| c.claim.as_str()).collect();
    Some(format!("Note: The following claims are disputed across sources: {}", list.join("; ")))
}

pub fn synthesize(query: &str, context: &str, warning: Option<&str>) -> String {
    let warning = warning.map(|w| format!("{w}\n\n")).unwrap_or_default();
    format!(
        "{SYNTHESIZER_HEADER} Write a clear, well-structured answer to the research question using only the verified material below. \
         Cite sources inline as [Source N].\n\n\
         Research question: {query}\n\n\
         {context}\n\
         {warning}\
         Structure the answer with these sections:\n\
         ## Summary\n\
         ## Key Findings\n\
         {DISPUTED_HEADING}\n\
         ## Conclusion"
    )
}

/// Text after `label` when `line` starts with it, ignoring ASCII case.
fn strip_label<'a>(line: &'a str, label: &str) -> Option<&'a str> {
    line.get(..label.len())
        .filter(|head| head.eq_ignore_ascii_case(label))
        .map(|_| line[label.len()..].trim())
}

/// Reads `CONFIDENCE:` / `ISSUES:` / `VERDICT:` lines. Missing or garbled
/// fields fall back to MEDIUM / "None" / RELIABLE. Issues may continue over
/// the following lines.
pub fn parse_critique(response: &str) -> (Confidence, String, Verdict) {
    let mut confidence = Confidence::Medium;
    let mut issues: Vec<String> = Vec::new();
    let mut verdict = Verdict::Reliable;
    let mut in_issues = false;

    for line in response.lines().map(str::trim) {
        if let Some(rest) = strip_label(line, "CONFIDENCE:") {
            let rest = rest.to_uppercase();
            in_issues = false;
            confidence = if rest.contains("HIGH") {
                Confidence::High
            } else if rest.contains("LOW") {
                Confidence::Low
            } else {
                Confidence::Medium
            };
        } else if let Some(rest) = strip_label(line, "ISSUES:") {
            in_issues = true;
            if !rest.is_empty() { issues.push(rest.to_string()); }
        } else if let Some(rest) = strip_label(line, "VERDICT:") {
            let rest = rest.to_uppercase();
            in_issues = false;
            verdict = if rest.contains("UNRELIABLE") {
                Verdict::Unreliable
            } else if rest.contains("QUESTIONABLE") {
                Verdict::Questionable
            } else {
                Verdict::Reliable
            };
        } else if in_issues && !line.is_empty() {
            issues.push(line.to_string());
        }
    }

    let issues = if issues.is_empty() { "None".to_string() } else { issues.join(" ") };
    (confidence, issues, verdict)
}

/// Reads `CLAIM:` / `STATUS:` / `REASON:` blocks. A block ends at `---` or
/// at the next `CLAIM:`. Blocks without claim text are dropped.
pub fn parse_claims(response: &str) -> Vec<Claim> {
    struct Draft {
        claim: String,
        status: ClaimStatus,
        reason: String,
    }
    fn flush(draft: &mut Option<Draft>, out: &mut Vec<Claim>) {
        if let Some(d) = draft.take() {
            if !d.claim.is_empty() { out.push(Claim { claim: d.claim, status: d.status, reason: d.reason }); }
        }
    }

    let mut claims = Vec::new();
    let mut draft: Option<Draft> = None;
    for line in response.lines().map(str::trim) {
        if let Some(text) = strip_label(line, "CLAIM:") {
            flush(&mut draft, &mut claims);
            draft = Some(Draft { claim: text.to_string(), status: ClaimStatus::Unverified, reason: String::new() });
        } else if let Some(rest) = strip_label(line, "STATUS:") {
            let rest = rest.to_uppercase();
            if let Some(d) = draft.as_mut() {
                d.status = if rest.contains("UNVERIFIED") {
                    ClaimStatus::Unverified
                } else if rest.contains("DISPUTED") {
                    ClaimStatus::Disputed
                } else if rest.contains("VERIFIED") {
                    ClaimStatus::Verified
                } else {
                    ClaimStatus::Unverified
                };
            }
        } else if let Some(reason) = strip_label(line, "REASON:") {
            if let Some(d) = draft.as_mut() { d.reason = reason.to_string(); }
        } else if line.starts_with("---") {
            flush(&mut draft, &mut claims);
        }
    }
    flush(&mut draft, &mut claims);
    claims
}

/// Makes sure the answer has a disputed-points section naming every
/// disputed claim.
pub fn ensure_disputed_section(answer: &str, disputed: &[&Claim]) -> String {
    let mut answer = answer.trim_end().to_string();
    match answer.find(DISPUTED_HEADING) {
        None => {
            let _ = write!(answer, "\n\n{DISPUTED_HEADING}\n");
            if disputed.is_empty() {
                answer.push_str("- No disputed claims were identified across the sources.\n");
            }
            for c in disputed {
                let _ = writeln!(answer, "- {} ({})", c.claim, c.reason);
            }
        }
        Some(pos) => {
            let missing: Vec<&&Claim> = disputed.iter().filter(|c| !answer.contains(c.claim.as_str())).collect();
            if !missing.is_empty() {
                let line_end = answer[pos..].find('\n').map_or(answer.len(), |i| pos + i);
                let mut bullets = String::new();
                for c in missing {
                    let _ = write!(bullets, "\n- {} ({})", c.claim, c.reason);
                }
                answer.insert_str(line_end, &bullets);
            }
        }
    }
    answer
}
