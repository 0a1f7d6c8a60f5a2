//! Response Formatter (C8) — splits a completion's Markdown-ish output
//! into header/section blocks with dividers between them, mirroring
//! `format_for_slack` in the original chat skill. The line-scanning style
//! (`.lines()`, `.strip_prefix()`, accumulate-then-flush) follows
//! `skynet-discord::embed::try_parse_embed`.

/// A single formatted block, ready to hand to the messaging platform
/// adapter alongside the plain-text fallback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    Header { text: String },
    Section { text: String },
    Divider,
}

/// The result of formatting a response: the plain text always present,
/// plus rich blocks when `include_blocks` was requested.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormattedResponse {
    pub text: String,
    pub blocks: Option<Vec<Block>>,
}

/// Format `text` for delivery. When `include_blocks` is true, the text is
/// split into header/section blocks with dividers between sections and
/// the trailing divider removed; when false, `blocks` is `None` and the
/// caller gets plain text only.
pub fn format_response(text: &str, include_blocks: bool) -> FormattedResponse {
    if !include_blocks {
        return FormattedResponse {
            text: text.to_string(),
            blocks: None,
        };
    }

    let sections = split_into_sections(text);
    let mut blocks = Vec::new();
    for section in &sections {
        push_section_blocks(section, &mut blocks);
        blocks.push(Block::Divider);
    }
    if matches!(blocks.last(), Some(Block::Divider)) {
        blocks.pop();
    }

    FormattedResponse {
        text: text.to_string(),
        blocks: Some(blocks),
    }
}

/// An error reply (§4.8): always carries a fixed `{header "Error", section
/// message}` block pair, regardless of whether the caller would otherwise
/// have requested blocks — there is no plain-text-only error surface.
pub fn format_error(message: &str) -> FormattedResponse {
    FormattedResponse {
        text: message.to_string(),
        blocks: Some(vec![
            Block::Header {
                text: "Error".to_string(),
            },
            Block::Section {
                text: message.to_string(),
            },
        ]),
    }
}

/// Render [`Block`]s into the wire shape §6 specifies for the outbound
/// message post payload: `type ∈ {header, section, divider, context}`, with
/// a nested `{type, text}` object for header/section/context elements.
pub fn to_wire_blocks(blocks: &[Block]) -> Vec<serde_json::Value> {
    blocks
        .iter()
        .map(|block| match block {
            Block::Header { text } => serde_json::json!({
                "type": "header",
                "text": {"type": "plain_text", "text": text},
            }),
            Block::Section { text } => serde_json::json!({
                "type": "section",
                "text": {"type": "mrkdwn", "text": text},
            }),
            Block::Divider => serde_json::json!({"type": "divider"}),
        })
        .collect()
}

fn is_header_line(line: &str) -> bool {
    line.starts_with("# ") || line.starts_with("## ") || line.starts_with("### ")
}

/// Break `text` into sections, each starting at a header line (or at the
/// very start of the text if it begins without one). Blank trailing
/// sections are dropped.
fn split_into_sections(text: &str) -> Vec<String> {
    let mut sections = Vec::new();
    let mut current = String::new();

    for line in text.lines() {
        if is_header_line(line) {
            if !current.trim().is_empty() {
                sections.push(current.trim().to_string());
            }
            current = format!("{line}\n");
        } else {
            current.push_str(line);
            current.push('\n');
        }
    }
    if !current.trim().is_empty() {
        sections.push(current.trim().to_string());
    }
    sections
}

/// Append the blocks for a single section: a header block plus a
/// following section block when the section starts with a header line,
/// otherwise one plain section block.
fn push_section_blocks(section: &str, blocks: &mut Vec<Block>) {
    let lines: Vec<&str> = section.lines().collect();
    let Some(first) = lines.first() else {
        return;
    };

    if is_header_line(first) {
        let header_text = first.trim_start_matches('#').trim().to_string();
        blocks.push(Block::Header { text: header_text });
        if lines.len() > 1 {
            blocks.push(Block::Section {
                text: lines[1..].join("\n"),
            });
        }
    } else {
        blocks.push(Block::Section {
            text: section.to_string(),
        });
    }
}
