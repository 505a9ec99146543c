// src/models/settings.rs
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

pub const DEFAULT_API_URL: &str = "http://localhost:3000";
pub const DEFAULT_POSITION: &str = "bottom-right";
pub const DEFAULT_PRIMARY_COLOR: &str = "#667eea";
pub const DEFAULT_RATE_LIMIT: u32 = 60;
pub const MAX_RATE_LIMIT: u32 = 1000;

const WIDGET_POSITIONS: [&str; 4] = ["bottom-right", "bottom-left", "top-right", "top-left"];

lazy_static! {
    static ref HEX_COLOR: Regex = Regex::new(r"^#([0-9a-fA-F]{3}|[0-9a-fA-F]{6})$").unwrap();
}

/// The single persisted settings record edited from the admin dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssistantSettings {
    pub api_url: String,
    pub api_key: String,
    pub project_id: String,
    pub widget_position: String,
    pub widget_enabled: bool,
    pub greeting_message: String,
    pub greeting_message_fa: String,
    pub placeholder_text: String,
    pub placeholder_text_fa: String,
    pub primary_color: String,
    pub forbidden_words: String,
    pub collect_email: bool,
    pub collect_phone: bool,
    pub show_timestamp: bool,
    pub enable_emojis: bool,
    pub rate_limit: u32,
}

impl Default for AssistantSettings {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            api_key: String::new(),
            project_id: String::new(),
            widget_position: DEFAULT_POSITION.to_string(),
            widget_enabled: true,
            greeting_message: "Hi! How can I help you today?".to_string(),
            greeting_message_fa: "سلام! چطور می‌تونم کمکتون کنم؟".to_string(),
            placeholder_text: "Type your message...".to_string(),
            placeholder_text_fa: "پیام خود را بنویسید...".to_string(),
            primary_color: DEFAULT_PRIMARY_COLOR.to_string(),
            forbidden_words: String::new(),
            collect_email: true,
            collect_phone: true,
            show_timestamp: true,
            enable_emojis: false,
            rate_limit: DEFAULT_RATE_LIMIT,
        }
    }
}

impl AssistantSettings {
    /// Normalizes every field the way the settings form is expected to be stored.
    pub fn sanitized(self) -> Self {
        let api_url = clean_text(&self.api_url);
        let api_url = if api_url.starts_with("http://") || api_url.starts_with("https://") {
            api_url.trim_end_matches('/').to_string()
        } else {
            String::new()
        };

        let widget_position = clean_text(&self.widget_position);
        let widget_position = if WIDGET_POSITIONS.contains(&widget_position.as_str()) {
            widget_position
        } else {
            DEFAULT_POSITION.to_string()
        };

        let primary_color = clean_text(&self.primary_color);
        let primary_color = if HEX_COLOR.is_match(&primary_color) {
            primary_color
        } else {
            DEFAULT_PRIMARY_COLOR.to_string()
        };

        Self {
            api_url,
            api_key: clean_text(&self.api_key),
            project_id: clean_text(&self.project_id),
            widget_position,
            widget_enabled: self.widget_enabled,
            greeting_message: clean_text(&self.greeting_message),
            greeting_message_fa: clean_text(&self.greeting_message_fa),
            placeholder_text: clean_text(&self.placeholder_text),
            placeholder_text_fa: clean_text(&self.placeholder_text_fa),
            primary_color,
            forbidden_words: clean_textarea(&self.forbidden_words),
            collect_email: self.collect_email,
            collect_phone: self.collect_phone,
            show_timestamp: self.show_timestamp,
            enable_emojis: self.enable_emojis,
            rate_limit: self.rate_limit.clamp(1, MAX_RATE_LIMIT),
        }
    }

    pub fn relay_configured(&self) -> bool {
        !self.api_key.is_empty() && !self.api_url.is_empty()
    }

    /// Greeting and placeholder for the visitor's locale; Persian for `fa*`.
    pub fn localized_copy(&self, locale: &str) -> (&str, &str) {
        if locale.to_ascii_lowercase().starts_with("fa") {
            (&self.greeting_message_fa, &self.placeholder_text_fa)
        } else {
            (&self.greeting_message, &self.placeholder_text)
        }
    }
}

fn clean_text(value: &str) -> String {
    value
        .chars()
        .filter(|c| !c.is_control())
        .collect::<String>()
        .trim()
        .to_string()
}

fn clean_textarea(value: &str) -> String {
    value
        .chars()
        .filter(|c| *c == '\n' || !c.is_control())
        .collect::<String>()
        .trim()
        .to_string()
}
