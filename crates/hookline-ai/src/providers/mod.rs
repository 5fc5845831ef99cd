mod common;
mod gemini;
mod openai_chat;

pub use gemini::GeminiClient;
pub use openai_chat::OpenAiChatClient;
