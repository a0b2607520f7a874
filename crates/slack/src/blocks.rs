use serde::Serialize;

use musicshare_core::Reply;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TextObject {
    PlainText { text: String },
    Mrkdwn { text: String },
}

impl TextObject {
    pub fn plain(text: impl Into<String>) -> Self {
        Self::PlainText { text: text.into() }
    }

    pub fn mrkdwn(text: impl Into<String>) -> Self {
        Self::Mrkdwn { text: text.into() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    Section { block_id: String, text: TextObject },
    Context { block_id: String, elements: Vec<TextObject> },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MessageTemplate {
    #[serde(rename = "text")]
    pub fallback_text: String,
    pub blocks: Vec<Block>,
}

pub struct MessageBuilder {
    fallback_text: String,
    blocks: Vec<Block>,
}

impl MessageBuilder {
    pub fn new(fallback_text: impl Into<String>) -> Self {
        Self { fallback_text: fallback_text.into(), blocks: Vec::new() }
    }

    pub fn section<F>(mut self, block_id: impl Into<String>, build: F) -> Self
    where
        F: FnOnce(&mut SectionBuilder),
    {
        let mut builder = SectionBuilder::default();
        build(&mut builder);
        self.blocks.push(Block::Section { block_id: block_id.into(), text: builder.build() });
        self
    }

    pub fn context<F>(mut self, block_id: impl Into<String>, build: F) -> Self
    where
        F: FnOnce(&mut ContextBuilder),
    {
        let mut builder = ContextBuilder::default();
        build(&mut builder);
        self.blocks.push(Block::Context { block_id: block_id.into(), elements: builder.build() });
        self
    }

    pub fn build(self) -> MessageTemplate {
        MessageTemplate { fallback_text: self.fallback_text, blocks: self.blocks }
    }
}

#[derive(Default)]
pub struct SectionBuilder {
    text: Option<TextObject>,
}

impl SectionBuilder {
    pub fn plain(&mut self, text: impl Into<String>) -> &mut Self {
        self.text = Some(TextObject::plain(text));
        self
    }

    pub fn mrkdwn(&mut self, text: impl Into<String>) -> &mut Self {
        self.text = Some(TextObject::mrkdwn(text));
        self
    }

    fn build(self) -> TextObject {
        self.text.unwrap_or_else(|| TextObject::plain(""))
    }
}

#[derive(Default)]
pub struct ContextBuilder {
    elements: Vec<TextObject>,
}

impl ContextBuilder {
    pub fn plain(&mut self, text: impl Into<String>) -> &mut Self {
        self.elements.push(TextObject::plain(text));
        self
    }

    pub fn mrkdwn(&mut self, text: impl Into<String>) -> &mut Self {
        self.elements.push(TextObject::mrkdwn(text));
        self
    }

    fn build(self) -> Vec<TextObject> {
        self.elements
    }
}

/// Renders a bot reply. Failures carry a correlation context line so operators can find the logs.
pub fn reply_message(reply: &Reply, correlation_id: &str) -> MessageTemplate {
    let block_prefix = format!("musicshare.{}", reply.kind());
    let builder = MessageBuilder::new(reply.text());

    match reply {
        Reply::RatingRecorded { url, rating } => builder
            .section(format!("{block_prefix}.summary.v1"), |section| {
                section.mrkdwn(format!(":star: Rated <{url}|this track> *{rating}*/10"));
            })
            .build(),
        Reply::Usage => builder
            .section(format!("{block_prefix}.summary.v1"), |section| {
                section.mrkdwn(
                    "Not sure what you mean. Try:\n• `share <spotify track link>`\n\
                     • `rate <spotify track link> <0-10>`",
                );
            })
            .build(),
        Reply::InvalidRating { .. } | Reply::NotAllowed { .. } | Reply::RoleRequired { .. } => {
            builder
                .section(format!("{block_prefix}.summary.v1"), |section| {
                    section.mrkdwn(reply.text());
                })
                .build()
        }
        Reply::NoMatchingTrack { .. } | Reply::RecordFailed | Reply::UnknownUser => builder
            .section(format!("{block_prefix}.summary.v1"), |section| {
                section.mrkdwn(format!(":warning: {}", reply.text()));
            })
            .context(format!("{block_prefix}.context.v1"), |context| {
                context.plain(format!("Correlation ID: {correlation_id}"));
            })
            .build(),
    }
}
