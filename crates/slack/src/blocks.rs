use serde::Serialize;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseType {
    #[default]
    Ephemeral,
    InChannel,
}

/// A slash command response body.
///
/// Only `text` and `response_type` are always present; the remaining fields
/// are omitted from the JSON unless set.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Reply {
    pub text: String,
    pub response_type: ResponseType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thread_ts: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replace_original: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delete_original: Option<bool>,
}

impl Reply {
    pub fn ephemeral(text: impl Into<String>) -> Self {
        MessageBuilder::new(text).build()
    }

    pub fn in_channel(text: impl Into<String>) -> Self {
        MessageBuilder::new(text).response_type(ResponseType::InChannel).build()
    }
}

pub struct MessageBuilder {
    reply: Reply,
}

impl MessageBuilder {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            reply: Reply {
                text: text.into(),
                response_type: ResponseType::Ephemeral,
                thread_ts: None,
                replace_original: None,
                delete_original: None,
            },
        }
    }

    pub fn response_type(mut self, response_type: ResponseType) -> Self {
        self.reply.response_type = response_type;
        self
    }

    pub fn thread_ts(mut self, thread_ts: impl Into<String>) -> Self {
        self.reply.thread_ts = Some(thread_ts.into());
        self
    }

    pub fn replace_original(mut self, replace: bool) -> Self {
        self.reply.replace_original = Some(replace);
        self
    }

    pub fn delete_original(mut self, delete: bool) -> Self {
        self.reply.delete_original = Some(delete);
        self
    }

    pub fn build(self) -> Reply {
        self.reply
    }
}
