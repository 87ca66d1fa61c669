use serde::Serialize;

use crate::db::{DiscussionItem, Document};

/// Longest evidence paragraph passed to generation, in characters.
const MAX_EVIDENCE_CHARS: usize = 2_000;

pub fn build_answer_prompt(query: &str, evidence: &[&str]) -> String {
    let evidence: Vec<String> = evidence
        .iter()
        .map(|text| truncate_chars(text, MAX_EVIDENCE_CHARS))
        .collect();
    let evidence_json = serde_json::to_string(&evidence).unwrap_or_else(|_| "[]".to_string());

    let lines = [
        "You are an AI assistant. Use the following content to answer the user's query.".to_string(),
        String::new(),
        "Instructions:".to_string(),
        "1. Only use the information provided in the relevant content chunks.".to_string(),
        "2. Provide a clear, concise and informative answer.".to_string(),
        "3. Highlight disagreements, recurring ideas or differing opinions if present.".to_string(),
        "4. Keep the tone neutral, factual and professional.".to_string(),
        "5. Do not include information not present in the content.".to_string(),
        String::new(),
        format!("User query: {}", serde_json::Value::String(query.trim().to_string())),
        String::new(),
        format!("Relevant content chunks: {}", evidence_json),
        String::new(),
        "Answer:".to_string(),
    ];
    lines.join("\n")
}

#[derive(Serialize)]
struct PromptComment<'a> {
    content: &'a str,
    created_at: String,
}

pub fn build_summary_prompt(document: &Document, discussion: &[DiscussionItem]) -> String {
    let comments: Vec<PromptComment<'_>> = discussion
        .iter()
        .map(|item| PromptComment {
            content: &item.content,
            created_at: item.created_at.to_rfc3339(),
        })
        .collect();
    let comments_json = serde_json::to_string(&comments).unwrap_or_else(|_| "[]".to_string());
    let tags_json = serde_json::to_string(&document.tags).unwrap_or_else(|_| "[]".to_string());
    let kind = serde_json::to_value(document.kind)
        .ok()
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_default();

    let lines = [
        "You are an AI assistant. I will provide you with a post and its associated comments. \
         Summarize the content for a user in a concise and informative way. Include the following:"
            .to_string(),
        String::new(),
        "1. Post summary: what is the post about? Key points only.".to_string(),
        "2. Comment thread summary: main opinions, arguments or insights from the comments."
            .to_string(),
        "3. Tone: neutral and clear.".to_string(),
        "4. Optional: highlight disagreements or recurring ideas.".to_string(),
        String::new(),
        "Here is the data:".to_string(),
        String::new(),
        "Post:".to_string(),
        format!("Title: {:?}", document.title),
        format!("Content: {:?}", document.body),
        format!("Type: {:?}", kind),
        format!("Tags: {}", tags_json),
        String::new(),
        format!("Comments: {}", comments_json),
    ];
    lines.join("\n")
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() > max_chars {
        text.chars().take(max_chars).collect()
    } else {
        text.to_string()
    }
}
