//! RSS 2.0 feed document encoding and decoding.
//!
//! Item descriptions are written as CDATA so diff text containing `<`, `&`
//! and friends never collides with the feed's own markup.

use quick_xml::Reader;
use quick_xml::Writer;
use quick_xml::events::{BytesCData, BytesDecl, BytesEnd, BytesStart, BytesText, Event};

use crate::error::{AppError, Result};
use crate::models::FeedEntry;

/// Channel-level metadata, regenerated on every write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Channel {
    pub title: String,
    pub link: String,
    pub description: String,
    pub language: String,
    pub last_build_date: String,
}

/// Encode a complete feed document.
pub fn render_feed(channel: &Channel, entries: &[FeedEntry]) -> Result<String> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);

    emit(&mut writer, Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;

    let mut rss = BytesStart::new("rss");
    rss.push_attribute(("version", "2.0"));
    rss.push_attribute(("xmlns:atom", "http://www.w3.org/2005/Atom"));
    emit(&mut writer, Event::Start(rss))?;
    emit(&mut writer, Event::Start(BytesStart::new("channel")))?;

    text_element(&mut writer, "title", &channel.title)?;
    text_element(&mut writer, "link", &channel.link)?;
    text_element(&mut writer, "description", &channel.description)?;
    text_element(&mut writer, "language", &channel.language)?;
    text_element(&mut writer, "lastBuildDate", &channel.last_build_date)?;

    for entry in entries {
        emit(&mut writer, Event::Start(BytesStart::new("item")))?;
        text_element(&mut writer, "title", &entry.title)?;
        text_element(&mut writer, "link", &entry.link)?;
        cdata_element(&mut writer, "description", &entry.description)?;
        if !entry.pub_date.is_empty() {
            text_element(&mut writer, "pubDate", &entry.pub_date)?;
        }
        if !entry.guid.is_empty() {
            text_element(&mut writer, "guid", &entry.guid)?;
        }
        emit(&mut writer, Event::End(BytesEnd::new("item")))?;
    }

    emit(&mut writer, Event::End(BytesEnd::new("channel")))?;
    emit(&mut writer, Event::End(BytesEnd::new("rss")))?;

    let mut xml = String::from_utf8(writer.into_inner())
        .map_err(|e| AppError::feed_write(format!("feed is not valid UTF-8: {e}")))?;
    xml.push('\n');
    Ok(xml)
}

/// Decode the items of a feed document, in document order.
///
/// Fails on malformed XML or when the `<rss>` root is missing or unclosed.
pub fn parse_entries(xml: &str) -> Result<Vec<FeedEntry>> {
    let mut reader = Reader::from_str(xml);
    let mut entries = Vec::new();
    let mut current: Option<FeedEntry> = None;
    let mut field: Option<Field> = None;
    let mut text = String::new();
    let mut opened = false;
    let mut closed = false;

    loop {
        let event = match reader.read_event() {
            Ok(event) => event,
            Err(e) => {
                return Err(AppError::feed_write(format!(
                    "malformed feed at byte {}: {e}",
                    reader.buffer_position()
                )));
            }
        };

        match event {
            Event::Start(start) => match start.name().as_ref() {
                b"rss" => opened = true,
                b"item" => current = Some(FeedEntry::default()),
                name if current.is_some() => {
                    field = Field::from_tag(name);
                    text.clear();
                }
                _ => {}
            },
            Event::Text(t) if field.is_some() => {
                let unescaped = t
                    .unescape()
                    .map_err(|e| AppError::feed_write(format!("bad entity in feed: {e}")))?;
                text.push_str(&unescaped);
            }
            Event::CData(data) if field.is_some() => {
                text.push_str(&String::from_utf8_lossy(&data.into_inner()));
            }
            Event::End(end) => match end.name().as_ref() {
                b"item" => entries.extend(current.take()),
                b"rss" => closed = true,
                _ => {
                    if let (Some(f), Some(entry)) = (field.take(), current.as_mut()) {
                        f.assign(entry, text.trim().to_string());
                    }
                }
            },
            Event::Eof => break,
            _ => {}
        }
    }

    if !opened || !closed {
        return Err(AppError::feed_write("feed has no complete <rss> root"));
    }
    Ok(entries)
}

#[derive(Debug, Clone, Copy)]
enum Field {
    Title,
    Link,
    Description,
    PubDate,
    Guid,
}

impl Field {
    fn from_tag(tag: &[u8]) -> Option<Self> {
        match tag {
            b"title" => Some(Field::Title),
            b"link" => Some(Field::Link),
            b"description" => Some(Field::Description),
            b"pubDate" => Some(Field::PubDate),
            b"guid" => Some(Field::Guid),
            _ => None,
        }
    }

    fn assign(self, entry: &mut FeedEntry, value: String) {
        match self {
            Field::Title => entry.title = value,
            Field::Link => entry.link = value,
            Field::Description => entry.description = value,
            Field::PubDate => entry.pub_date = value,
            Field::Guid => entry.guid = value,
        }
    }
}

fn emit(writer: &mut Writer<Vec<u8>>, event: Event<'_>) -> Result<()> {
    writer
        .write_event(event)
        .map_err(|e| AppError::feed_write(format!("encoding feed: {e}")))
}

fn text_element(writer: &mut Writer<Vec<u8>>, name: &str, text: &str) -> Result<()> {
    emit(writer, Event::Start(BytesStart::new(name)))?;
    emit(writer, Event::Text(BytesText::new(text)))?;
    emit(writer, Event::End(BytesEnd::new(name)))
}

fn cdata_element(writer: &mut Writer<Vec<u8>>, name: &str, text: &str) -> Result<()> {
    emit(writer, Event::Start(BytesStart::new(name)))?;
    for section in cdata_sections(text) {
        emit(writer, Event::CData(BytesCData::new(section)))?;
    }
    emit(writer, Event::End(BytesEnd::new(name)))
}

/// Split text so no section contains the CDATA terminator `]]>`.
fn cdata_sections(text: &str) -> Vec<String> {
    let parts: Vec<&str> = text.split("]]>").collect();
    let last = parts.len() - 1;
    parts
        .iter()
        .enumerate()
        .map(|(i, part)| {
            let mut section = String::new();
            if i > 0 {
                section.push('>');
            }
            section.push_str(part);
            if i < last {
                section.push_str("]]");
            }
            section
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channel() -> Channel {
        Channel {
            title: "demo Updates".into(),
            link: "https://site.example/feeds/demo.xml".into(),
            description: "Updates from demo".into(),
            language: "en".into(),
            last_build_date: "Mon, 11 Aug 2025 12:00:00 +0000".into(),
        }
    }

    fn entry(n: usize, description: &str) -> FeedEntry {
        FeedEntry {
            title: format!("Update {n} & more"),
            link: format!("https://site.example/content/demo/{n}.html?date=x&y=z"),
            description: description.to_string(),
            pub_date: "Mon, 11 Aug 2025 12:00:00 +0000".into(),
            guid: format!("demo-{n:08}"),
        }
    }

    #[test]
    fn test_render_shape() {
        let xml = render_feed(&channel(), &[entry(1, "plain")]).unwrap();

        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"utf-8\"?>"));
        assert!(xml.contains("<rss version=\"2.0\""));
        assert!(xml.contains("<language>en</language>"));
        assert!(xml.contains("<lastBuildDate>Mon, 11 Aug 2025 12:00:00 +0000</lastBuildDate>"));
        assert!(xml.contains("<description><![CDATA[plain]]></description>"));
        assert!(xml.contains("<title>Update 1 &amp; more</title>"));
        assert!(xml.contains("<guid>demo-00000001</guid>"));
    }

    #[test]
    fn test_diff_text_survives_round_trip() {
        let description = "Summary\n\n<pre>@@ -1,1 +1,1 @@\n-<p>a & b</p>\n+<p>a && b</p></pre>";
        let xml = render_feed(&channel(), &[entry(1, description), entry(2, "second")]).unwrap();

        let entries = parse_entries(&xml).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0], entry(1, description));
        assert_eq!(entries[1].description, "second");
    }

    #[test]
    fn test_cdata_terminator_is_split() {
        let tricky = "array[idx[0]]> 1";
        assert_eq!(cdata_sections(tricky), vec!["array[idx[0]]", "> 1"]);

        let xml = render_feed(&channel(), &[entry(1, tricky)]).unwrap();
        assert_eq!(parse_entries(&xml).unwrap()[0].description, tricky);
    }

    #[test]
    fn test_channel_fields_are_not_entries() {
        let xml = render_feed(&channel(), &[]).unwrap();
        assert!(parse_entries(&xml).unwrap().is_empty());
    }

    #[test]
    fn test_rejects_corrupt_documents() {
        assert!(parse_entries("").is_err());
        assert!(parse_entries("not xml at all").is_err());
        assert!(parse_entries("<rss><channel><item><title>x</title>").is_err());
        assert!(parse_entries("<rss><channel></item></channel></rss>").is_err());
    }
}
