mod llm;
mod mail;
mod prompts;

pub use llm::GeminiClient;
pub use mail::{welcome_email_html, ResendMailer, WELCOME_SUBJECT};
pub use prompts::{build_answer_prompt, build_summary_prompt};
