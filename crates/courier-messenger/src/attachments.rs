//! Attachment classification.
//!
//! Messenger attaches media to messages as loosely structured GraphQL
//! dicts. This module maps each one onto a message type, text, typed
//! attributes, and a media payload.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;
use url::Url;

use courier_core::config::ExperimentalFlags;
use courier_core::types::{MediaFile, Message, MsgAttribute, MsgType};

use crate::client::{EmojiSize, MessengerClient, LIKE_STICKER_PACK};
use crate::error::Result;
use crate::graphql::{get_str, get_string, get_value};
use crate::http::process_url;

/// Coordinates embedded in a static-map preview URL.
static LOCATION_MARKERS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"markers=([\d.-]+)%2C([\d.-]+)").expect("invalid regex"));

/// Type tag of an attachment dict.
///
/// The base tag is `blob_attachment.__typename`; a sticker attachment
/// overrides it with `__Sticker`, an extensible attachment with `__Link`
/// (or `MessageLocation` when its target is a location, live or pinned).
pub fn attachment_tag(attachment: &Value) -> Option<String> {
    let mut tag = get_string(attachment, &["mercury", "blob_attachment", "__typename"]);
    if get_value(attachment, &["mercury", "sticker_attachment"]).is_some() {
        tag = Some("__Sticker".to_string());
    }
    if get_value(attachment, &["mercury", "extensible_attachment"]).is_some() {
        tag = Some("__Link".to_string());
        let target = get_str(
            attachment,
            &[
                "mercury",
                "extensible_attachment",
                "story_attachment",
                "target",
                "__typename",
            ],
        );
        if matches!(target, Some("MessageLocation" | "MessageLiveLocation")) {
            tag = Some("MessageLocation".to_string());
        }
    }
    tag
}

/// Classifies raw attachment dicts onto messages.
pub struct AttachmentClassifier {
    client: Arc<dyn MessengerClient>,
    flags: ExperimentalFlags,
}

impl AttachmentClassifier {
    pub fn new(client: Arc<dyn MessengerClient>, flags: ExperimentalFlags) -> Self {
        Self { client, flags }
    }

    fn process_url(&self, url: &str, override_proxy: bool) -> String {
        process_url(url, override_proxy, self.flags.proxy_links_by_facebook)
    }

    /// Fills `msg` in from one attachment dict: message type, text,
    /// attributes, filename, MIME type, and media payload.
    ///
    /// Media is carried by URL where the payload can be fetched later;
    /// stickers are fetched eagerly since their MIME type comes from the
    /// response headers.
    pub async fn attach_media(&self, msg: &mut Message, attachment: &Value) -> Result<()> {
        let tag = attachment_tag(attachment);
        debug!(
            uid = %msg.uid,
            tag = tag.as_deref().unwrap_or("<none>"),
            "classifying attachment"
        );

        msg.filename = get_string(attachment, &["filename"]).filter(|v| !v.is_empty());
        msg.mime = get_string(attachment, &["mimeType"]).filter(|v| !v.is_empty());

        let null = Value::Null;
        let blob = get_value(attachment, &["mercury", "blob_attachment"]).unwrap_or(&null);

        match tag.as_deref() {
            Some("MessageAudio") => {
                msg.msg_type = MsgType::Voice;
                msg.filename.get_or_insert_with(|| "audio.mp3".to_string());
                msg.mime.get_or_insert_with(|| "audio/mpeg".to_string());
                if let Some(url) = get_str(blob, &["playable_url"]) {
                    msg.file = Some(MediaFile::Url(url.to_string()));
                }
            }
            Some("MessageImage") => {
                msg.msg_type = MsgType::Image;
                msg.filename.get_or_insert_with(|| "image.png".to_string());
                msg.mime.get_or_insert_with(|| "image/png".to_string());
                let app = get_str(blob, &["attribution_app", "name"]).filter(|a| !a.is_empty());
                if let Some(app) = app {
                    if msg.text.is_empty() {
                        msg.text = format!("via {app}");
                    } else {
                        msg.text = format!("{} (via {app})", msg.text);
                    }
                }
                if let Some(id) = get_str(attachment, &["id"]) {
                    let url = self.client.fetch_image_url(id).await?;
                    msg.file = Some(MediaFile::Url(url));
                }
            }
            Some("MessageAnimatedImage") => {
                msg.msg_type = MsgType::Animation;
                msg.filename.get_or_insert_with(|| "image.gif".to_string());
                msg.mime.get_or_insert_with(|| "image/gif".to_string());
                if let Some(uri) = get_str(blob, &["animated_image", "uri"]) {
                    msg.file = Some(MediaFile::Url(uri.to_string()));
                }
            }
            Some("MessageFile") => {
                msg.msg_type = MsgType::File;
                msg.filename.get_or_insert_with(|| "file".to_string());
                msg.mime
                    .get_or_insert_with(|| "application/octet-stream".to_string());
                if let Some(url) = get_str(blob, &["url"]) {
                    msg.file = Some(MediaFile::Url(self.process_url(url, true)));
                }
            }
            Some("MessageVideo") => {
                msg.msg_type = MsgType::Video;
                msg.filename.get_or_insert_with(|| "video.mp4".to_string());
                msg.mime.get_or_insert_with(|| "video/mpeg".to_string());
                if let Some(url) = get_str(blob, &["playable_url"]) {
                    msg.file = Some(MediaFile::Url(url.to_string()));
                }
            }
            Some("__Sticker") => {
                let sticker =
                    get_value(attachment, &["mercury", "sticker_attachment"]).unwrap_or(&null);
                if get_str(sticker, &["pack", "id"]) == Some(LIKE_STICKER_PACK) {
                    let size = get_str(sticker, &["id"]).and_then(EmojiSize::from_sticker_id);
                    if let Some(size) = size {
                        debug!(uid = %msg.uid, "Like sticker received, converting to text");
                        msg.msg_type = MsgType::Text;
                        msg.text = format!("👍 ({})", size.letter());
                        return Ok(());
                    }
                }
                msg.msg_type = MsgType::Sticker;
                msg.text = get_string(sticker, &["label"]).unwrap_or_default();
                match get_str(sticker, &["url"]) {
                    Some(url) => {
                        let filename = sticker_filename(url);
                        let (data, content_type) = self.client.fetch_url(url).await?;
                        msg.mime = content_type.or_else(|| {
                            mime_guess::from_path(&filename)
                                .first()
                                .map(|m| m.to_string())
                        });
                        msg.filename = Some(filename);
                        msg.file = Some(MediaFile::Bytes(data));
                    }
                    None => mark_unsupported(msg),
                }
            }
            Some("__Link") => {
                msg.msg_type = MsgType::Link;
                let story = get_value(
                    attachment,
                    &["mercury", "extensible_attachment", "story_attachment"],
                )
                .unwrap_or(&null);
                let title = get_string(story, &["title_with_entities", "text"]).unwrap_or_default();
                let mut description =
                    get_string(story, &["description", "text"]).unwrap_or_default();
                let source = get_str(story, &["source", "text"]).filter(|s| !s.is_empty());
                if let Some(source) = source {
                    description.push_str(&format!(" (via {source})"));
                }
                let playable = get_value(story, &["media", "is_playable"])
                    .and_then(Value::as_bool)
                    .unwrap_or(false);
                let mut preview = None;
                if playable {
                    preview = get_str(story, &["media", "playable_url"]).filter(|s| !s.is_empty());
                }
                let preview = preview
                    .or_else(|| get_str(story, &["media", "image", "uri"]).filter(|s| !s.is_empty()));
                // A present-but-null `url` key deliberately yields no URL
                // rather than falling back to the preview.
                let url = match get_value(story, &["url"]) {
                    Some(value) => value.as_str(),
                    None => preview,
                };
                msg.attributes = Some(MsgAttribute::Link {
                    title,
                    description,
                    image: preview.map(|p| self.process_url(p, false)),
                    url: url.map(|u| self.process_url(u, false)).unwrap_or_default(),
                });
            }
            Some("MessageLocation") => {
                let story = get_value(
                    attachment,
                    &["mercury", "extensible_attachment", "story_attachment"],
                )
                .unwrap_or(&null);
                let title = get_string(story, &["title_with_entities", "text"]).unwrap_or_default();
                let description =
                    get_string(story, &["description", "text"]).unwrap_or_default();
                msg.text = format!("{title}\n{description}");
                let preview = get_str(story, &["media", "image", "uri"]).unwrap_or("");
                match parse_map_markers(preview) {
                    Some((latitude, longitude)) => {
                        msg.msg_type = MsgType::Location;
                        msg.attributes = Some(MsgAttribute::Location {
                            latitude,
                            longitude,
                        });
                    }
                    None => mark_unsupported(msg),
                }
            }
            _ => mark_unsupported(msg),
        }
        Ok(())
    }
}

fn mark_unsupported(msg: &mut Message) {
    msg.msg_type = MsgType::Unsupported;
    msg.text = format!("Message type unsupported.\n{}", msg.text);
}

/// Last path segment of a sticker URL, used as the filename.
fn sticker_filename(url: &str) -> String {
    Url::parse(url)
        .ok()
        .and_then(|parsed| {
            parsed
                .path_segments()
                .and_then(|segments| segments.last())
                .map(str::to_string)
        })
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| "sticker".to_string())
}

/// Extracts `(latitude, longitude)` from a static-map preview URL.
fn parse_map_markers(uri: &str) -> Option<(f64, f64)> {
    let captures = LOCATION_MARKERS.captures(uri)?;
    let latitude = captures.get(1)?.as_str().parse().ok()?;
    let longitude = captures.get(2)?.as_str().parse().ok()?;
    Some((latitude, longitude))
}
