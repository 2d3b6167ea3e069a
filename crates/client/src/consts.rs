/// Environment variable naming the gateway that serves `/api/chat` and `/api/tts`.
pub const API_BASE_URL: &str = "LINGO_API_BASE_URL";

pub const CHAT_PATH: &str = "/api/chat";
pub const TTS_PATH: &str = "/api/tts";
