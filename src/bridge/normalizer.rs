//! Message normalization.
//!
//! Converts a raw protocol payload into a [`MessageRecord`]. Payload shape
//! probing happens exactly once, when classifying the payload into
//! [`MessageContent`]; everything downstream works on the tagged union.

use chrono::{DateTime, Utc};
use wacore::types::message::MessageInfo;
use waproto::whatsapp::Message;

use super::authorship::{self, AuthorshipSignals};
use super::record::{MessageKind, MessageRecord, LOCAL_USER_LABEL, UNKNOWN_NAME};

/// Generic marker for payloads with no usable text.
const MEDIA_MARKER: &str = "[Mídia]";

/// Classified message payload. One variant per payload kind the bridge
/// understands; everything else lands in `Other`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageContent {
    Text(String),
    Extended(String),
    Image { caption: Option<String> },
    Video { caption: Option<String> },
    Audio,
    Document { file_name: Option<String> },
    Sticker,
    Other,
}

/// Unwrap nested wrappers (device-sent, ephemeral, view-once,
/// document-with-caption) down to the innermost message.
fn unwrap_message(msg: &Message) -> &Message {
    if let Some(inner) = msg
        .device_sent_message
        .as_ref()
        .and_then(|m| m.message.as_deref())
    {
        return unwrap_message(inner);
    }
    if let Some(inner) = msg
        .ephemeral_message
        .as_ref()
        .and_then(|m| m.message.as_deref())
    {
        return unwrap_message(inner);
    }
    if let Some(inner) = msg
        .view_once_message
        .as_ref()
        .and_then(|m| m.message.as_deref())
    {
        return unwrap_message(inner);
    }
    if let Some(inner) = msg
        .document_with_caption_message
        .as_ref()
        .and_then(|m| m.message.as_deref())
    {
        return unwrap_message(inner);
    }
    msg
}

impl MessageContent {
    /// Classify a raw protocol payload. Unrecognized shapes fall through to
    /// `Other` — never an error.
    pub fn from_proto(msg: &Message) -> Self {
        let msg = unwrap_message(msg);

        if let Some(ref text) = msg.conversation {
            if !text.is_empty() {
                return MessageContent::Text(text.clone());
            }
        }
        if let Some(text) = msg.extended_text_message.as_ref().and_then(|e| e.text.clone()) {
            return MessageContent::Extended(text);
        }
        if let Some(ref img) = msg.image_message {
            return MessageContent::Image {
                caption: img.caption.clone().filter(|c| !c.is_empty()),
            };
        }
        if let Some(ref vid) = msg.video_message {
            return MessageContent::Video {
                caption: vid.caption.clone().filter(|c| !c.is_empty()),
            };
        }
        if msg.audio_message.is_some() {
            return MessageContent::Audio;
        }
        if let Some(ref doc) = msg.document_message {
            return MessageContent::Document {
                file_name: doc.file_name.clone().filter(|n| !n.is_empty()),
            };
        }
        if msg.sticker_message.is_some() {
            return MessageContent::Sticker;
        }
        MessageContent::Other
    }

    pub fn kind(&self) -> MessageKind {
        match self {
            MessageContent::Text(_) | MessageContent::Extended(_) => MessageKind::Text,
            MessageContent::Image { .. } => MessageKind::Image,
            MessageContent::Video { .. } => MessageKind::Video,
            MessageContent::Audio => MessageKind::Audio,
            MessageContent::Document { .. } => MessageKind::Document,
            MessageContent::Sticker => MessageKind::Sticker,
            MessageContent::Other => MessageKind::Unknown,
        }
    }

    /// Display text, by the fixed precedence order: plain text, extended
    /// text, captioned media (kind marker prefix), fixed markers for audio /
    /// documents / stickers, generic media marker otherwise. A captionless
    /// image or video gets the generic marker.
    pub fn display_text(&self) -> String {
        match self {
            MessageContent::Text(t) | MessageContent::Extended(t) => t.clone(),
            MessageContent::Image { caption: Some(c) } => format!("[Imagem] {c}"),
            MessageContent::Video { caption: Some(c) } => format!("[Vídeo] {c}"),
            MessageContent::Audio => "[Áudio]".to_string(),
            MessageContent::Document { file_name: Some(n) } => format!("[Documento] {n}"),
            MessageContent::Document { file_name: None } => "[Documento]".to_string(),
            MessageContent::Sticker => "[Sticker]".to_string(),
            MessageContent::Image { caption: None }
            | MessageContent::Video { caption: None }
            | MessageContent::Other => MEDIA_MARKER.to_string(),
        }
    }
}

/// Historic message handed over by a history source. The protocol timestamp
/// is kept, unlike live events.
#[derive(Debug, Clone)]
pub struct HistoricMessage {
    pub id: String,
    pub chat: String,
    pub sender: String,
    pub from_me: bool,
    pub push_name: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub message: Message,
}

/// Strip the JID domain suffix, keeping the phone-number part.
pub fn strip_jid_domain(jid: &str) -> &str {
    jid.split('@').next().unwrap_or(jid)
}

/// Normalize a live protocol event into a canonical record. Timestamp is the
/// observation time, not the protocol's.
pub fn normalize_live(msg: &Message, info: &MessageInfo, own_id: Option<&str>) -> MessageRecord {
    let content = MessageContent::from_proto(msg);
    let sender = info.source.sender.to_string();
    let from_me = authorship::resolve(&AuthorshipSignals {
        force_from_me: false,
        protocol_from_me: info.source.is_from_me,
        sender_id: &sender,
        origin: &info.source.chat.to_string(),
        own_id,
    });

    let push_name = if from_me {
        LOCAL_USER_LABEL.to_string()
    } else if info.push_name.is_empty() {
        UNKNOWN_NAME.to_string()
    } else {
        info.push_name.clone()
    };

    MessageRecord {
        id: info.id.clone(),
        from_number: info.source.chat.user.clone(),
        text: content.display_text(),
        timestamp: Utc::now(),
        push_name,
        from_me,
        kind: content.kind(),
        is_historic: false,
        saved_at: None,
    }
}

/// Normalize a backfilled historic message. The id gets a `-hist` suffix so
/// it never collides with a live capture of the same message.
pub fn normalize_historic(historic: &HistoricMessage, own_id: Option<&str>) -> MessageRecord {
    let content = MessageContent::from_proto(&historic.message);
    let from_me = authorship::resolve(&AuthorshipSignals {
        force_from_me: false,
        protocol_from_me: historic.from_me,
        sender_id: &historic.sender,
        origin: &historic.chat,
        own_id,
    });

    let push_name = if from_me {
        LOCAL_USER_LABEL.to_string()
    } else {
        historic
            .push_name
            .clone()
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| UNKNOWN_NAME.to_string())
    };

    MessageRecord {
        id: format!("{}-hist", historic.id),
        from_number: strip_jid_domain(&historic.chat).to_string(),
        text: content.display_text(),
        timestamp: historic.timestamp,
        push_name,
        from_me,
        kind: content.kind(),
        is_historic: true,
        saved_at: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text_msg(text: &str) -> Message {
        Message {
            conversation: Some(text.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_plain_text() {
        let content = MessageContent::from_proto(&text_msg("hello"));
        assert_eq!(content, MessageContent::Text("hello".into()));
        assert_eq!(content.kind(), MessageKind::Text);
        assert_eq!(content.display_text(), "hello");
    }

    #[test]
    fn test_extended_text() {
        let msg = Message {
            extended_text_message: Some(Box::new(
                waproto::whatsapp::message::ExtendedTextMessage {
                    text: Some("quoted reply".to_string()),
                    ..Default::default()
                },
            )),
            ..Default::default()
        };
        let content = MessageContent::from_proto(&msg);
        assert_eq!(content.kind(), MessageKind::Text);
        assert_eq!(content.display_text(), "quoted reply");
    }

    #[test]
    fn test_image_caption_prefixed() {
        let msg = Message {
            image_message: Some(Box::new(waproto::whatsapp::message::ImageMessage {
                caption: Some("look".to_string()),
                ..Default::default()
            })),
            ..Default::default()
        };
        let content = MessageContent::from_proto(&msg);
        assert_eq!(content.kind(), MessageKind::Image);
        assert_eq!(content.display_text(), "[Imagem] look");
    }

    #[test]
    fn test_captionless_image_is_generic_media() {
        let msg = Message {
            image_message: Some(Box::new(Default::default())),
            ..Default::default()
        };
        let content = MessageContent::from_proto(&msg);
        assert_eq!(content.kind(), MessageKind::Image);
        assert_eq!(content.display_text(), "[Mídia]");
    }

    #[test]
    fn test_audio_marker() {
        let msg = Message {
            audio_message: Some(Box::new(Default::default())),
            ..Default::default()
        };
        let content = MessageContent::from_proto(&msg);
        assert_eq!(content.kind(), MessageKind::Audio);
        assert_eq!(content.display_text(), "[Áudio]");
    }

    #[test]
    fn test_document_with_filename() {
        let msg = Message {
            document_message: Some(Box::new(waproto::whatsapp::message::DocumentMessage {
                file_name: Some("fatura.pdf".to_string()),
                ..Default::default()
            })),
            ..Default::default()
        };
        let content = MessageContent::from_proto(&msg);
        assert_eq!(content.kind(), MessageKind::Document);
        assert_eq!(content.display_text(), "[Documento] fatura.pdf");
    }

    #[test]
    fn test_sticker_marker() {
        let msg = Message {
            sticker_message: Some(Box::new(Default::default())),
            ..Default::default()
        };
        let content = MessageContent::from_proto(&msg);
        assert_eq!(content.kind(), MessageKind::Sticker);
        assert_eq!(content.display_text(), "[Sticker]");
    }

    #[test]
    fn test_empty_payload_falls_through() {
        let content = MessageContent::from_proto(&Message::default());
        assert_eq!(content, MessageContent::Other);
        assert_eq!(content.kind(), MessageKind::Unknown);
        assert_eq!(content.display_text(), "[Mídia]");
    }

    #[test]
    fn test_unwraps_ephemeral_wrapper() {
        let msg = Message {
            ephemeral_message: Some(Box::new(waproto::whatsapp::message::FutureProofMessage {
                message: Some(Box::new(text_msg("disappearing"))),
            })),
            ..Default::default()
        };
        assert_eq!(
            MessageContent::from_proto(&msg),
            MessageContent::Text("disappearing".into())
        );
    }

    #[test]
    fn test_strip_jid_domain() {
        assert_eq!(strip_jid_domain("5511999999999@s.whatsapp.net"), "5511999999999");
        assert_eq!(strip_jid_domain("5511999999999"), "5511999999999");
    }

    #[test]
    fn test_normalize_historic_suffixes_id() {
        let historic = HistoricMessage {
            id: "MSG1".into(),
            chat: "5511999999999@s.whatsapp.net".into(),
            sender: "5511999999999@s.whatsapp.net".into(),
            from_me: false,
            push_name: Some("Maria".into()),
            timestamp: Utc::now(),
            message: text_msg("oi"),
        };
        let record = normalize_historic(&historic, None);
        assert_eq!(record.id, "MSG1-hist");
        assert_eq!(record.from_number, "5511999999999");
        assert!(record.is_historic);
        assert_eq!(record.push_name, "Maria");
        assert_eq!(record.timestamp, historic.timestamp);
    }

    #[test]
    fn test_normalize_historic_from_me_label() {
        let historic = HistoricMessage {
            id: "MSG2".into(),
            chat: "5511999999999@s.whatsapp.net".into(),
            sender: "5511000000000@s.whatsapp.net".into(),
            from_me: true,
            push_name: None,
            timestamp: Utc::now(),
            message: text_msg("tudo bem?"),
        };
        let record = normalize_historic(&historic, None);
        assert!(record.from_me);
        assert_eq!(record.push_name, LOCAL_USER_LABEL);
    }
}
