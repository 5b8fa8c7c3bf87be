use serde::{Deserialize, Serialize};
use std::fmt;

/// Separator between the tokens of the accumulated input path.
pub const INPUT_DELIMITER: char = '*';

/// One exchange as delivered by the USSD gateway.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UssdRequest {
    pub session_id: Option<String>,
    pub service_code: Option<String>,
    pub phone_number: Option<String>,
    /// Every input of the session so far, joined by [`INPUT_DELIMITER`].
    pub text: Option<String>,
}

impl UssdRequest {
    pub fn new(session_id: &str, phone_number: &str, text: &str) -> Self {
        Self {
            session_id: Some(session_id.to_string()),
            service_code: None,
            phone_number: Some(phone_number.to_string()),
            text: Some(text.to_string()),
        }
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
    }

    pub fn phone_number(&self) -> Option<&str> {
        self.phone_number.as_deref().filter(|p| !p.is_empty())
    }

    /// The last token of the input path; earlier tokens are history.
    pub fn current_input(&self) -> &str {
        self.text
            .as_deref()
            .and_then(|text| text.rsplit(INPUT_DELIMITER).next())
            .unwrap_or_default()
            .trim()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyKind {
    Continue,
    End,
}

/// Menu or result text plus whether the gateway should keep the session open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub kind: ReplyKind,
    pub body: String,
}

impl Reply {
    pub fn con(body: impl Into<String>) -> Self {
        Self {
            kind: ReplyKind::Continue,
            body: body.into(),
        }
    }

    pub fn end(body: impl Into<String>) -> Self {
        Self {
            kind: ReplyKind::End,
            body: body.into(),
        }
    }

    pub fn is_end(&self) -> bool {
        self.kind == ReplyKind::End
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            ReplyKind::Continue => write!(f, "CON {}", self.body),
            ReplyKind::End => write!(f, "END {}", self.body),
        }
    }
}
