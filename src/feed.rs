//! RSS 2.0 rendering.

use std::io::Write;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

use crate::error::{Error, Result};
use crate::extract::ArticleRecord;
use crate::text::normalize_text;

const DC_NAMESPACE: &str = "http://purl.org/dc/elements/1.1/";
const ATOM_NAMESPACE: &str = "http://www.w3.org/2005/Atom";

/// Feed-level fields of the rendered channel.
#[derive(Debug, Clone, Copy)]
pub struct Channel<'a> {
    pub title: &'a str,
    pub link: &'a str,
    pub description: &'a str,
}

fn xml_err(e: impl std::fmt::Display) -> Error {
    Error::Render(e.to_string())
}

fn write_text_element<W: Write>(w: &mut Writer<W>, name: &str, text: &str) -> Result<()> {
    w.write_event(Event::Start(BytesStart::new(name))).map_err(xml_err)?;
    let s = sanitize_text(text);
    w.write_event(Event::Text(BytesText::new(&s))).map_err(xml_err)?;
    w.write_event(Event::End(BytesEnd::new(name))).map_err(xml_err)?;
    Ok(())
}

// Strip control characters that XML 1.0 does not allow (tab, LF, CR stay).
fn sanitize_text(input: &str) -> String {
    input
        .chars()
        .filter(|&c| {
            let code = c as u32;
            code == 0x09 || code == 0x0A || code == 0x0D || code >= 0x20
        })
        .collect::<String>()
}

/// Render `articles` in the given order as a pretty-printed RSS 2.0
/// document. Titles and descriptions are whitespace-normalized; the author
/// is emitted only when present.
pub fn render(channel: Channel<'_>, articles: &[ArticleRecord]) -> Result<String> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))
        .map_err(xml_err)?;

    let mut rss_start = BytesStart::new("rss");
    rss_start.push_attribute(("version", "2.0"));
    rss_start.push_attribute(("xmlns:dc", DC_NAMESPACE));
    rss_start.push_attribute(("xmlns:atom", ATOM_NAMESPACE));
    writer.write_event(Event::Start(rss_start)).map_err(xml_err)?;
    writer
        .write_event(Event::Start(BytesStart::new("channel")))
        .map_err(xml_err)?;

    write_text_element(&mut writer, "title", channel.title)?;
    write_text_element(&mut writer, "link", channel.link)?;
    write_text_element(&mut writer, "description", channel.description)?;

    let mut self_link = BytesStart::new("atom:link");
    self_link.push_attribute(("href", channel.link));
    self_link.push_attribute(("rel", "self"));
    writer.write_event(Event::Empty(self_link)).map_err(xml_err)?;

    write_text_element(&mut writer, "language", "en")?;
    if let Some(latest) = articles.iter().map(|a| a.published).max() {
        write_text_element(&mut writer, "lastBuildDate", &latest.to_rfc2822())?;
    }

    for article in articles {
        writer
            .write_event(Event::Start(BytesStart::new("item")))
            .map_err(xml_err)?;
        write_text_element(&mut writer, "title", &normalize_text(&article.title))?;
        write_text_element(&mut writer, "link", &article.link)?;
        write_text_element(&mut writer, "description", &normalize_text(&article.description))?;
        write_text_element(&mut writer, "pubDate", &article.published.to_rfc2822())?;
        if let Some(author) = article.author.as_deref().filter(|a| !a.trim().is_empty()) {
            write_text_element(&mut writer, "dc:creator", author)?;
        }

        let mut guid = BytesStart::new("guid");
        guid.push_attribute(("isPermaLink", "true"));
        writer.write_event(Event::Start(guid)).map_err(xml_err)?;
        writer
            .write_event(Event::Text(BytesText::new(&sanitize_text(&article.link))))
            .map_err(xml_err)?;
        writer
            .write_event(Event::End(BytesEnd::new("guid")))
            .map_err(xml_err)?;

        writer
            .write_event(Event::End(BytesEnd::new("item")))
            .map_err(xml_err)?;
    }

    writer
        .write_event(Event::End(BytesEnd::new("channel")))
        .map_err(xml_err)?;
    writer
        .write_event(Event::End(BytesEnd::new("rss")))
        .map_err(xml_err)?;

    let mut out = writer.into_inner();
    out.push(b'\n');
    String::from_utf8(out).map_err(xml_err)
}
