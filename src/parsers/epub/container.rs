//! Zip container, package document and navigation reading.

use crate::error::{ReaderError, Result};
use roxmltree::{Document, Node, ParsingOptions};
use std::collections::HashMap;
use std::io::{Cursor, Read};
use tracing::{debug, warn};
use zip::ZipArchive;

const CONTAINER_PATH: &str = "META-INF/container.xml";
const NCX_MEDIA_TYPE: &str = "application/x-dtbncx+xml";
const OPS_NAMESPACE: &str = "http://www.idpf.org/2007/ops";

/// Manifest entry with its href resolved to an archive path.
#[derive(Debug, Clone)]
pub struct ManifestItem {
    pub id: String,
    pub path: String,
    pub media_type: String,
    pub properties: Option<String>,
}

impl ManifestItem {
    fn has_property(&self, name: &str) -> bool {
        self.properties
            .as_deref()
            .map(|props| props.split_whitespace().any(|p| p == name))
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone)]
pub struct SpineItem {
    pub idref: String,
    pub path: String,
}

/// A top-level navigation entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TocEntry {
    pub label: String,
    /// Archive path of the target document, fragment removed.
    pub path: String,
}

#[derive(Debug, Clone, Default)]
pub struct PackageMetadata {
    pub title: Option<String>,
    pub creator: Option<String>,
    pub publisher: Option<String>,
    pub description: Option<String>,
    cover_id: Option<String>,
}

pub struct EpubContainer<'a> {
    archive: ZipArchive<Cursor<&'a [u8]>>,
    pub metadata: PackageMetadata,
    pub manifest: HashMap<String, ManifestItem>,
    pub spine: Vec<SpineItem>,
    spine_toc_id: Option<String>,
}

impl<'a> EpubContainer<'a> {
    /// Open the archive and read its package document.
    ///
    /// Fails when the archive, `container.xml` or the package document cannot
    /// be read.
    pub fn open(data: &'a [u8]) -> Result<Self> {
        let mut archive = ZipArchive::new(Cursor::new(data))?;

        let container_xml = read_entry_string(&mut archive, CONTAINER_PATH)
            .map_err(|e| ReaderError::epub_error(format!("missing {CONTAINER_PATH}: {e}")))?;
        let opf_path = find_rootfile(&container_xml)?;
        let opf_dir = parent_dir(&opf_path);
        debug!(opf_path = %opf_path, "Located package document");

        let opf_xml = read_entry_string(&mut archive, &opf_path)?;
        let opf = parse_xml(&opf_xml)?;
        let package = opf.root_element();

        let metadata = child_element(package, "metadata")
            .map(parse_metadata)
            .unwrap_or_default();
        let manifest = child_element(package, "manifest")
            .map(|node| parse_manifest(node, &opf_dir))
            .unwrap_or_default();
        let spine_node = child_element(package, "spine")
            .ok_or_else(|| ReaderError::epub_error("package document has no spine"))?;
        let spine = parse_spine(spine_node, &manifest);
        let spine_toc_id = spine_node.attribute("toc").map(str::to_string);

        Ok(Self {
            archive,
            metadata,
            manifest,
            spine,
            spine_toc_id,
        })
    }

    pub fn read_bytes(&mut self, path: &str) -> Result<Vec<u8>> {
        let mut file = self.archive.by_name(path)?;
        let mut buf = Vec::new();
        file.read_to_end(&mut buf)?;
        Ok(buf)
    }

    pub fn read_string(&mut self, path: &str) -> Result<String> {
        read_entry_string(&mut self.archive, path)
    }

    /// Spine section whose document is `path`.
    pub fn spine_item_for(&self, path: &str) -> Option<&SpineItem> {
        self.spine.iter().find(|item| item.path == path)
    }

    /// The declared cover image: EPUB 3 `cover-image` property first, then the
    /// EPUB 2 `<meta name="cover">` reference.
    pub fn cover_item(&self) -> Option<&ManifestItem> {
        self.manifest
            .values()
            .find(|item| item.has_property("cover-image"))
            .or_else(|| {
                self.metadata
                    .cover_id
                    .as_deref()
                    .and_then(|id| self.manifest.get(id))
            })
    }

    /// Top-level table-of-contents entries.
    ///
    /// The EPUB 3 navigation document is tried first; when it is missing,
    /// empty or not well-formed the NCX is used instead. Returns an empty list
    /// when neither yields entries. An NCX that cannot be parsed is an error.
    pub fn navigation(&mut self) -> Result<Vec<TocEntry>> {
        if let Some(nav) = self.manifest.values().find(|item| item.has_property("nav")).cloned() {
            match self
                .read_string(&nav.path)
                .and_then(|xml| parse_nav_document(&xml, &parent_dir(&nav.path)))
            {
                Ok(entries) if !entries.is_empty() => return Ok(entries),
                Ok(_) => debug!(path = %nav.path, "Navigation document lists no entries"),
                Err(err) => warn!(path = %nav.path, "Navigation document unusable, trying NCX: {err}"),
            }
        }

        let ncx = self
            .spine_toc_id
            .as_deref()
            .and_then(|id| self.manifest.get(id))
            .or_else(|| {
                self.manifest
                    .values()
                    .find(|item| item.media_type == NCX_MEDIA_TYPE)
            })
            .cloned();

        match ncx {
            Some(ncx) => match self.read_string(&ncx.path) {
                Ok(xml) => parse_ncx(&xml, &parent_dir(&ncx.path)),
                Err(err) => {
                    warn!(path = %ncx.path, "NCX document unreadable: {err}");
                    Ok(Vec::new())
                }
            },
            None => Ok(Vec::new()),
        }
    }
}

/// Parse XML that may carry a DOCTYPE declaration.
pub(crate) fn parse_xml(text: &str) -> Result<Document<'_>> {
    let options = ParsingOptions {
        allow_dtd: true,
        ..ParsingOptions::default()
    };
    Ok(Document::parse_with_options(text, options)?)
}

fn read_entry_string(archive: &mut ZipArchive<Cursor<&[u8]>>, path: &str) -> Result<String> {
    let mut file = archive.by_name(path)?;
    let mut buf = Vec::new();
    file.read_to_end(&mut buf)?;
    let text = String::from_utf8_lossy(&buf);
    Ok(text.strip_prefix('\u{feff}').unwrap_or(&text).to_string())
}

fn find_rootfile(container_xml: &str) -> Result<String> {
    let doc = parse_xml(container_xml)?;
    doc.descendants()
        .find(|n| n.tag_name().name() == "rootfile")
        .and_then(|n| n.attribute("full-path"))
        .map(str::to_string)
        .ok_or_else(|| ReaderError::epub_error("container.xml names no rootfile"))
}

fn child_element<'a, 'input>(node: Node<'a, 'input>, name: &str) -> Option<Node<'a, 'input>> {
    node.children()
        .find(|child| child.is_element() && child.tag_name().name() == name)
}

fn node_text(node: Node) -> String {
    node.descendants()
        .filter(|n| n.is_text())
        .filter_map(|n| n.text())
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn parse_metadata(node: Node) -> PackageMetadata {
    let mut meta = PackageMetadata::default();
    for child in node.children().filter(Node::is_element) {
        let value = || Some(node_text(child)).filter(|v| !v.is_empty());
        match child.tag_name().name() {
            "title" if meta.title.is_none() => meta.title = value(),
            "creator" if meta.creator.is_none() => meta.creator = value(),
            "publisher" if meta.publisher.is_none() => meta.publisher = value(),
            "description" if meta.description.is_none() => meta.description = value(),
            "meta" if child.attribute("name") == Some("cover") => {
                meta.cover_id = child.attribute("content").map(str::to_string);
            }
            _ => {}
        }
    }
    meta
}

fn parse_manifest(node: Node, opf_dir: &str) -> HashMap<String, ManifestItem> {
    node.children()
        .filter(|n| n.is_element() && n.tag_name().name() == "item")
        .filter_map(|item| {
            let id = item.attribute("id")?;
            let href = item.attribute("href")?;
            Some((
                id.to_string(),
                ManifestItem {
                    id: id.to_string(),
                    path: resolve_href(opf_dir, href),
                    media_type: item.attribute("media-type").unwrap_or_default().to_string(),
                    properties: item.attribute("properties").map(str::to_string),
                },
            ))
        })
        .collect()
}

fn parse_spine(node: Node, manifest: &HashMap<String, ManifestItem>) -> Vec<SpineItem> {
    node.children()
        .filter(|n| n.is_element() && n.tag_name().name() == "itemref")
        .filter_map(|itemref| {
            let idref = itemref.attribute("idref")?;
            match manifest.get(idref) {
                Some(item) => Some(SpineItem {
                    idref: idref.to_string(),
                    path: item.path.clone(),
                }),
                None => {
                    warn!(idref, "Spine references a missing manifest item");
                    None
                }
            }
        })
        .collect()
}

fn parse_nav_document(xml: &str, base_dir: &str) -> Result<Vec<TocEntry>> {
    let doc = parse_xml(xml)?;
    let navs: Vec<Node> = doc
        .descendants()
        .filter(|n| n.is_element() && n.tag_name().name() == "nav")
        .collect();
    let toc_nav = navs
        .iter()
        .find(|nav| nav.attribute((OPS_NAMESPACE, "type")) == Some("toc"))
        .or_else(|| navs.first());

    let Some(list) = toc_nav.and_then(|nav| {
        nav.descendants()
            .find(|n| n.is_element() && n.tag_name().name() == "ol")
    }) else {
        return Ok(Vec::new());
    };

    let entries = list
        .children()
        .filter(|n| n.is_element() && n.tag_name().name() == "li")
        .filter_map(|li| {
            let anchor = li
                .children()
                .find(|n| n.is_element() && n.tag_name().name() == "a")?;
            let href = anchor.attribute("href")?;
            Some(TocEntry {
                label: node_text(anchor),
                path: resolve_href(base_dir, href),
            })
        })
        .collect();
    Ok(entries)
}

fn parse_ncx(xml: &str, base_dir: &str) -> Result<Vec<TocEntry>> {
    let doc = parse_xml(xml)?;
    let Some(nav_map) = doc
        .descendants()
        .find(|n| n.is_element() && n.tag_name().name() == "navMap")
    else {
        return Ok(Vec::new());
    };

    let entries = nav_map
        .children()
        .filter(|n| n.is_element() && n.tag_name().name() == "navPoint")
        .filter_map(|point| {
            let src = child_element(point, "content")?.attribute("src")?;
            let label = child_element(point, "navLabel")
                .map(node_text)
                .unwrap_or_default();
            Some(TocEntry {
                label,
                path: resolve_href(base_dir, src),
            })
        })
        .collect();
    Ok(entries)
}

fn parent_dir(path: &str) -> String {
    path.rsplit_once('/')
        .map(|(dir, _)| dir.to_string())
        .unwrap_or_default()
}

/// Resolve an href against the directory of the document containing it.
/// The fragment is dropped and percent-escapes are decoded.
pub(crate) fn resolve_href(base_dir: &str, href: &str) -> String {
    let href = href.split('#').next().unwrap_or_default();
    let href = percent_decode(href);

    let mut parts: Vec<&str> = if href.starts_with('/') {
        Vec::new()
    } else {
        base_dir.split('/').filter(|p| !p.is_empty()).collect()
    };
    for component in href.split('/') {
        match component {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }
    parts.join("/")
}

fn percent_decode(input: &str) -> String {
    if !input.contains('%') {
        return input.to_string();
    }
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let hi = (bytes[i + 1] as char).to_digit(16);
            let lo = (bytes[i + 2] as char).to_digit(16);
            if let (Some(hi), Some(lo)) = (hi, lo) {
                out.push((hi * 16 + lo) as u8);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}
