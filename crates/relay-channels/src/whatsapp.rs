//! WhatsApp Cloud API Integration
//!
//! Webhook payload parsing, subscription verification and outbound sends
//! through the Graph API (`{api_url}/{version}/{phone_number_id}/messages`).

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::channel::{Channel, InboundText, ReplySender, check_status, send_json};
use crate::error::{ChannelError, Result};

const CHANNEL: &str = "WhatsApp";

// ============================================================================
// Webhook payloads
// ============================================================================

/// Top-level webhook notification
#[derive(Clone, Debug, Default, Deserialize)]
pub struct WebhookPayload {
    #[serde(default)]
    pub object: Option<String>,

    #[serde(default)]
    pub entry: Vec<Entry>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct Entry {
    #[serde(default)]
    pub id: Option<String>,

    #[serde(default)]
    pub changes: Vec<Change>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct Change {
    #[serde(default)]
    pub field: Option<String>,

    #[serde(default)]
    pub value: Option<ChangeValue>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct ChangeValue {
    #[serde(default)]
    pub messages: Vec<IncomingMessage>,

    #[serde(default)]
    pub contacts: Vec<Contact>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct IncomingMessage {
    #[serde(default)]
    pub id: Option<String>,

    /// Sender phone number
    pub from: String,

    #[serde(default)]
    pub timestamp: Option<String>,

    #[serde(rename = "type")]
    pub kind: String,

    #[serde(default)]
    pub text: Option<TextBody>,

    #[serde(default)]
    pub image: Option<MediaRef>,

    #[serde(default)]
    pub document: Option<MediaRef>,

    #[serde(default)]
    pub audio: Option<MediaRef>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct TextBody {
    pub body: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct MediaRef {
    pub id: String,

    #[serde(default)]
    pub caption: Option<String>,

    #[serde(default)]
    pub filename: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Contact {
    #[serde(default)]
    pub wa_id: Option<String>,

    #[serde(default)]
    pub profile: Option<Profile>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Profile {
    pub name: String,
}

/// What an inbound message carries
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MessageContent {
    Text(String),
    Image {
        media_id: String,
        caption: Option<String>,
    },
    Document {
        media_id: String,
        filename: Option<String>,
        caption: Option<String>,
    },
    Audio {
        media_id: String,
    },
    Unsupported(String),
}

impl IncomingMessage {
    pub fn content(&self) -> MessageContent {
        match self.kind.as_str() {
            "text" => match &self.text {
                Some(text) => MessageContent::Text(text.body.clone()),
                None => MessageContent::Unsupported(self.kind.clone()),
            },
            "image" => match &self.image {
                Some(media) => MessageContent::Image {
                    media_id: media.id.clone(),
                    caption: media.caption.clone(),
                },
                None => MessageContent::Unsupported(self.kind.clone()),
            },
            "document" => match &self.document {
                Some(media) => MessageContent::Document {
                    media_id: media.id.clone(),
                    filename: media.filename.clone(),
                    caption: media.caption.clone(),
                },
                None => MessageContent::Unsupported(self.kind.clone()),
            },
            "audio" => match &self.audio {
                Some(media) => MessageContent::Audio {
                    media_id: media.id.clone(),
                },
                None => MessageContent::Unsupported(self.kind.clone()),
            },
            other => MessageContent::Unsupported(other.to_owned()),
        }
    }
}

impl WebhookPayload {
    /// Parse a raw webhook body. A body without entries is rejected.
    pub fn parse(body: &[u8]) -> Result<Self> {
        let payload: Self = serde_json::from_slice(body)?;
        if payload.entry.is_empty() {
            return Err(ChannelError::InvalidPayload("entry is missing or empty".into()));
        }
        Ok(payload)
    }

    /// Every message across all entries and changes, in delivery order
    pub fn messages(&self) -> impl Iterator<Item = &IncomingMessage> {
        self.entry
            .iter()
            .flat_map(|e| e.changes.iter())
            .filter_map(|c| c.value.as_ref())
            .flat_map(|v| v.messages.iter())
    }

    /// Text messages only; media and other types are skipped
    pub fn text_messages(&self) -> Vec<InboundText> {
        self.messages()
            .filter_map(|m| match m.content() {
                MessageContent::Text(text) => Some(InboundText {
                    channel: Channel::WhatsApp,
                    user_id: m.from.clone(),
                    reply_to: m.from.clone(),
                    text,
                }),
                other => {
                    tracing::debug!(
                        from = %m.from,
                        content = ?other,
                        "Skipping non-text WhatsApp message"
                    );
                    None
                }
            })
            .collect()
    }
}

/// Answer a `GET` subscription handshake. Returns the challenge to echo back
/// when mode and token match.
pub fn verify_subscription<'a>(
    mode: Option<&str>,
    token: Option<&str>,
    challenge: Option<&'a str>,
    expected_token: &str,
) -> Option<&'a str> {
    if expected_token.is_empty() {
        return None;
    }
    match (mode, token) {
        (Some("subscribe"), Some(token)) if token == expected_token => {
            Some(challenge.unwrap_or(""))
        }
        _ => None,
    }
}

// ============================================================================
// Outbound client
// ============================================================================

/// Graph API credentials
#[derive(Clone, Debug)]
pub struct WhatsAppConfig {
    pub api_url: String,
    pub api_version: String,
    pub access_token: String,
    pub phone_number_id: String,
}

impl WhatsAppConfig {
    pub fn new(access_token: impl Into<String>, phone_number_id: impl Into<String>) -> Self {
        Self {
            api_url: "https://graph.facebook.com".into(),
            api_version: "v18.0".into(),
            access_token: access_token.into(),
            phone_number_id: phone_number_id.into(),
        }
    }
}

#[derive(Clone, Debug, Serialize)]
struct OutboundMessage<'a> {
    messaging_product: &'static str,
    recipient_type: &'static str,
    to: &'a str,
    #[serde(rename = "type")]
    kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<OutboundText<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    image: Option<OutboundLink<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    document: Option<OutboundLink<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    audio: Option<OutboundLink<'a>>,
}

#[derive(Clone, Debug, Serialize)]
struct OutboundText<'a> {
    preview_url: bool,
    body: &'a str,
}

#[derive(Clone, Debug, Serialize)]
struct OutboundLink<'a> {
    link: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    caption: Option<&'a str>,
}

impl<'a> OutboundMessage<'a> {
    fn new(to: &'a str, kind: &'static str) -> Self {
        Self {
            messaging_product: "whatsapp",
            recipient_type: "individual",
            to,
            kind,
            text: None,
            image: None,
            document: None,
            audio: None,
        }
    }
}

/// WhatsApp Cloud API client
pub struct WhatsAppClient {
    client: Client,
    config: WhatsAppConfig,
}

impl WhatsAppClient {
    pub fn new(config: WhatsAppConfig) -> Result<Self> {
        if config.access_token.is_empty() || config.phone_number_id.is_empty() {
            return Err(ChannelError::Config(
                "WhatsApp access token and phone number id are required".into(),
            ));
        }
        Ok(Self {
            client: Client::new(),
            config,
        })
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/{}/{}",
            self.config.api_url.trim_end_matches('/'),
            self.config.api_version,
            path
        )
    }

    async fn send(&self, message: &OutboundMessage<'_>) -> Result<Value> {
        let url = self.url(&format!("{}/messages", self.config.phone_number_id));
        let body = send_json(
            CHANNEL,
            self.client
                .post(url)
                .bearer_auth(&self.config.access_token)
                .json(message),
        )
        .await?;

        tracing::info!(to = message.to, kind = message.kind, "WhatsApp message sent");
        Ok(body)
    }

    pub async fn send_text(&self, to: &str, text: &str) -> Result<Value> {
        let mut message = OutboundMessage::new(to, "text");
        message.text = Some(OutboundText {
            preview_url: false,
            body: text,
        });
        self.send(&message).await
    }

    pub async fn send_image(&self, to: &str, image_url: &str) -> Result<Value> {
        let mut message = OutboundMessage::new(to, "image");
        message.image = Some(OutboundLink {
            link: image_url,
            caption: None,
        });
        self.send(&message).await
    }

    pub async fn send_document(
        &self,
        to: &str,
        document_url: &str,
        caption: Option<&str>,
    ) -> Result<Value> {
        let mut message = OutboundMessage::new(to, "document");
        message.document = Some(OutboundLink {
            link: document_url,
            caption,
        });
        self.send(&message).await
    }

    pub async fn send_audio(&self, to: &str, audio_url: &str) -> Result<Value> {
        let mut message = OutboundMessage::new(to, "audio");
        message.audio = Some(OutboundLink {
            link: audio_url,
            caption: None,
        });
        self.send(&message).await
    }

    /// Resolve a media id from an inbound message to a download URL
    pub async fn media_url(&self, media_id: &str) -> Result<String> {
        let body = send_json(
            CHANNEL,
            self.client
                .get(self.url(media_id))
                .bearer_auth(&self.config.access_token),
        )
        .await?;

        body["url"]
            .as_str()
            .map(str::to_owned)
            .ok_or_else(|| ChannelError::InvalidPayload("media response has no url".into()))
    }

    pub async fn download_media(&self, media_url: &str) -> Result<Vec<u8>> {
        let response = self
            .client
            .get(media_url)
            .bearer_auth(&self.config.access_token)
            .send()
            .await?;
        let response = check_status(CHANNEL, response).await?;
        Ok(response.bytes().await?.to_vec())
    }
}

#[async_trait]
impl ReplySender for WhatsAppClient {
    fn channel(&self) -> Channel {
        Channel::WhatsApp
    }

    async fn send_reply(&self, recipient: &str, text: &str) -> Result<()> {
        self.send_text(recipient, text).await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn sample_payload() -> Value {
        json!({
            "object": "whatsapp_business_account",
            "entry": [{
                "id": "WABA",
                "changes": [{
                    "field": "messages",
                    "value": {
                        "contacts": [{ "wa_id": "34612345678", "profile": { "name": "Ana" } }],
                        "messages": [
                            {
                                "id": "m1", "from": "34612345678", "type": "text",
                                "text": { "body": "Hola" }
                            },
                            {
                                "id": "m2", "from": "34612345678", "type": "image",
                                "image": { "id": "img-1", "caption": "foto" }
                            },
                            {
                                "id": "m3", "from": "34699999999", "type": "text",
                                "text": { "body": "¿Horario?" }
                            }
                        ]
                    }
                }, {
                    "field": "statuses",
                    "value": { "statuses": [] }
                }]
            }]
        })
    }

    fn client(mock_server: &MockServer) -> WhatsAppClient {
        WhatsAppClient::new(WhatsAppConfig {
            api_url: mock_server.uri(),
            ..WhatsAppConfig::new("token", "PHONE_ID")
        })
        .unwrap()
    }

    #[test]
    fn test_text_messages_extracted_in_order() {
        let body = serde_json::to_vec(&sample_payload()).unwrap();
        let payload = WebhookPayload::parse(&body).unwrap();

        assert_eq!(payload.messages().count(), 3);

        let texts = payload.text_messages();
        assert_eq!(texts.len(), 2);
        assert_eq!(texts[0].user_id, "34612345678");
        assert_eq!(texts[0].reply_to, "34612345678");
        assert_eq!(texts[0].text, "Hola");
        assert_eq!(texts[1].text, "¿Horario?");
        assert_eq!(texts[1].channel, Channel::WhatsApp);
    }

    #[test]
    fn test_media_content() {
        let body = serde_json::to_vec(&sample_payload()).unwrap();
        let payload = WebhookPayload::parse(&body).unwrap();
        let image = payload.messages().nth(1).unwrap();

        assert_eq!(
            image.content(),
            MessageContent::Image {
                media_id: "img-1".into(),
                caption: Some("foto".into())
            }
        );
    }

    #[test]
    fn test_empty_entry_rejected() {
        assert!(matches!(
            WebhookPayload::parse(br#"{"entry":[]}"#),
            Err(ChannelError::InvalidPayload(_))
        ));
        assert!(matches!(
            WebhookPayload::parse(br#"{"object":"x"}"#),
            Err(ChannelError::InvalidPayload(_))
        ));
        assert!(matches!(WebhookPayload::parse(b"not json"), Err(ChannelError::Json(_))));
    }

    #[test]
    fn test_verify_subscription() {
        assert_eq!(
            verify_subscription(Some("subscribe"), Some("vt"), Some("1158201444"), "vt"),
            Some("1158201444")
        );
        assert_eq!(verify_subscription(Some("subscribe"), Some("bad"), Some("c"), "vt"), None);
        assert_eq!(verify_subscription(Some("unsubscribe"), Some("vt"), Some("c"), "vt"), None);
        assert_eq!(verify_subscription(Some("subscribe"), None, Some("c"), "vt"), None);
        assert_eq!(verify_subscription(Some("subscribe"), Some(""), Some("c"), ""), None);
    }

    #[test]
    fn test_client_requires_credentials() {
        assert!(WhatsAppClient::new(WhatsAppConfig::new("", "PHONE_ID")).is_err());
        assert!(WhatsAppClient::new(WhatsAppConfig::new("token", "")).is_err());
    }

    #[tokio::test]
    async fn test_send_text() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v18.0/PHONE_ID/messages"))
            .and(header("authorization", "Bearer token"))
            .and(body_json(json!({
                "messaging_product": "whatsapp",
                "recipient_type": "individual",
                "to": "34612345678",
                "type": "text",
                "text": { "preview_url": false, "body": "Hola" }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "messages": [{ "id": "wamid.1" }]
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let response = client(&mock_server).send_text("34612345678", "Hola").await.unwrap();
        assert_eq!(response["messages"][0]["id"], "wamid.1");
    }

    #[tokio::test]
    async fn test_send_document_with_caption() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v18.0/PHONE_ID/messages"))
            .and(body_json(json!({
                "messaging_product": "whatsapp",
                "recipient_type": "individual",
                "to": "34612345678",
                "type": "document",
                "document": { "link": "https://example.com/f.pdf", "caption": "Factura" }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(1)
            .mount(&mock_server)
            .await;

        client(&mock_server)
            .send_document("34612345678", "https://example.com/f.pdf", Some("Factura"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_api_error() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v18.0/PHONE_ID/messages"))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid token"))
            .mount(&mock_server)
            .await;

        let err = client(&mock_server).send_reply("34612345678", "Hola").await.unwrap_err();
        assert!(matches!(err, ChannelError::Api { status: 401, .. }));
    }

    #[tokio::test]
    async fn test_media_url_and_download() {
        let mock_server = MockServer::start().await;
        let media_url = format!("{}/files/img-1", mock_server.uri());
        Mock::given(method("GET"))
            .and(path("/v18.0/img-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "url": media_url })))
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/files/img-1"))
            .and(header("authorization", "Bearer token"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![1u8, 2, 3]))
            .mount(&mock_server)
            .await;

        let whatsapp = client(&mock_server);
        let url = whatsapp.media_url("img-1").await.unwrap();
        assert_eq!(url, media_url);
        assert_eq!(whatsapp.download_media(&url).await.unwrap(), vec![1, 2, 3]);
    }
}
