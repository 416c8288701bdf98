//! Hexo-style tag pairs with YAML bodies.
//!
//! `{% links %}` renders a friend-link card list and `{% media audio|video %}`
//! renders a track list. Bodies are YAML sequences parsed with `serde_yaml`
//! and rendered through fixed templates; every value is escaped.

use std::fmt::Write;

use serde::Deserialize;

use crate::util::escape_html;

/// Media element kind for `{% media … %}`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MediaKind {
    Audio,
    Video,
}

impl MediaKind {
    pub(crate) fn from_name(name: &str) -> Option<Self> {
        match name {
            "audio" => Some(Self::Audio),
            "video" => Some(Self::Video),
            _ => None,
        }
    }

    fn tag(self) -> &'static str {
        match self {
            Self::Audio => "audio",
            Self::Video => "video",
        }
    }
}

/// One card in a `{% links %}` list.
#[derive(Debug, Deserialize)]
struct LinkEntry {
    name: String,
    #[serde(alias = "url")]
    link: String,
    #[serde(default)]
    avatar: Option<String>,
    #[serde(default, alias = "description")]
    descr: Option<String>,
}

/// One track in a `{% media %}` list.
#[derive(Debug, Deserialize)]
struct MediaTrack {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    artist: Option<String>,
    url: String,
    #[serde(default)]
    cover: Option<String>,
}

/// Parse a YAML sequence body; an empty body is an empty list.
fn parse_list<T: for<'de> Deserialize<'de>>(body: &str) -> Result<Vec<T>, serde_yaml::Error> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }
    serde_yaml::from_str(trimmed)
}

/// Render a `{% links %}` body.
pub(crate) fn render_links(body: &str) -> Result<String, serde_yaml::Error> {
    let entries: Vec<LinkEntry> = parse_list(body)?;

    let mut out = String::from("<div class=\"links-block\">\n");
    for entry in &entries {
        let name = escape_html(&entry.name);
        write!(
            out,
            r#"<a class="link-card" href="{}" target="_blank" rel="noopener">"#,
            escape_html(&entry.link)
        )
        .unwrap();
        if let Some(avatar) = &entry.avatar {
            write!(
                out,
                r#"<img class="link-avatar" src="{}" alt="{name}" loading="lazy" />"#,
                escape_html(avatar)
            )
            .unwrap();
        }
        write!(out, r#"<span class="link-name">{name}</span>"#).unwrap();
        if let Some(descr) = &entry.descr {
            write!(out, r#"<span class="link-descr">{}</span>"#, escape_html(descr)).unwrap();
        }
        out.push_str("</a>\n");
    }
    out.push_str("</div>\n");
    Ok(out)
}

/// Render a `{% media audio|video %}` body.
pub(crate) fn render_media(kind: MediaKind, body: &str) -> Result<String, serde_yaml::Error> {
    let tracks: Vec<MediaTrack> = parse_list(body)?;
    let tag = kind.tag();

    let mut out = format!("<div class=\"media-block media-{tag}\">\n");
    for track in &tracks {
        out.push_str(r#"<figure class="media-track">"#);
        write!(out, r#"<{tag} controls="controls" preload="metadata" src="{}""#, escape_html(&track.url)).unwrap();
        if kind == MediaKind::Video
            && let Some(cover) = &track.cover
        {
            write!(out, r#" poster="{}""#, escape_html(cover)).unwrap();
        }
        write!(out, "></{tag}>").unwrap();

        let caption = match (&track.name, &track.artist) {
            (Some(name), Some(artist)) => Some(format!("{name} - {artist}")),
            (Some(name), None) => Some(name.clone()),
            (None, Some(artist)) => Some(artist.clone()),
            (None, None) => None,
        };
        if let Some(caption) = caption {
            write!(out, "<figcaption>{}</figcaption>", escape_html(&caption)).unwrap();
        }
        out.push_str("</figure>\n");
    }
    out.push_str("</div>\n");
    Ok(out)
}
