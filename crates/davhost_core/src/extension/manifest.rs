//! App manifest model and extension list extraction.
//!
//! # Responsibility
//! - Represent loosely-structured app manifests as a tagged tree.
//! - Parse `info.xml` and `info.json` documents into that tree.
//! - Extract declared plugin/collection identifiers in declaration order.
//!
//! # Invariants
//! - Scalar-or-sequence ambiguity is resolved here; callers only ever see
//!   `Vec<String>`.
//! - Extraction is pure and total: absent or mis-shaped sections yield `[]`.
//! - Extracted identifiers are never structural containers or blank.

use crate::extension::descriptor::ExtensionKind;
use quick_xml::events::Event;
use quick_xml::Reader;
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Top-level manifest key holding DAV server declarations.
pub const SABRE_KEY: &str = "sabre";

/// One node of a parsed app manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManifestNode {
    Null,
    Scalar(String),
    Sequence(Vec<ManifestNode>),
    Map(BTreeMap<String, ManifestNode>),
}

impl ManifestNode {
    /// Returns child node for `key` when this node is a map.
    pub fn get(&self, key: &str) -> Option<&ManifestNode> {
        match self {
            Self::Map(entries) => entries.get(key),
            _ => None,
        }
    }

    pub fn as_scalar(&self) -> Option<&str> {
        match self {
            Self::Scalar(value) => Some(value.as_str()),
            _ => None,
        }
    }

    pub fn is_map(&self) -> bool {
        matches!(self, Self::Map(_))
    }
}

impl From<serde_json::Value> for ManifestNode {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(flag) => Self::Scalar(flag.to_string()),
            serde_json::Value::Number(number) => Self::Scalar(number.to_string()),
            serde_json::Value::String(text) => Self::Scalar(text),
            serde_json::Value::Array(items) => {
                Self::Sequence(items.into_iter().map(Self::from).collect())
            }
            serde_json::Value::Object(entries) => Self::Map(
                entries
                    .into_iter()
                    .map(|(key, value)| (key, Self::from(value)))
                    .collect(),
            ),
        }
    }
}

/// Parsed per-app manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    root: ManifestNode,
}

impl Manifest {
    pub fn new(root: ManifestNode) -> Self {
        Self { root }
    }

    /// Manifest with no declarations at all.
    pub fn empty() -> Self {
        Self::new(ManifestNode::Map(BTreeMap::new()))
    }

    pub fn root(&self) -> &ManifestNode {
        &self.root
    }

    /// Parses an `info.json` document.
    pub fn from_json_str(source: &str) -> Result<Self, ManifestError> {
        let value: serde_json::Value = serde_json::from_str(source)
            .map_err(|err| ManifestError::InvalidJson(err.to_string()))?;
        Ok(Self::new(ManifestNode::from(value)))
    }

    /// Parses an `info.xml` document.
    ///
    /// The root element becomes the manifest root. Nested elements become
    /// maps, repeated sibling elements become sequences in document order,
    /// text-only elements become scalars. Attributes are ignored.
    pub fn from_xml_str(source: &str) -> Result<Self, ManifestError> {
        let mut reader = Reader::from_str(source);
        reader.config_mut().trim_text(true);

        let mut stack: Vec<XmlFrame> = Vec::new();
        let mut root: Option<ManifestNode> = None;
        let mut buf = Vec::new();

        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(ref e)) => {
                    stack.push(XmlFrame::new(local_name(e.local_name().as_ref())));
                }
                Ok(Event::Empty(ref e)) => {
                    let name = local_name(e.local_name().as_ref());
                    attach_xml_node(
                        &mut stack,
                        &mut root,
                        name,
                        ManifestNode::Scalar(String::new()),
                    )?;
                }
                Ok(Event::Text(ref e)) => {
                    let text = e
                        .unescape()
                        .map_err(|err| ManifestError::InvalidXml(err.to_string()))?;
                    if let Some(frame) = stack.last_mut() {
                        frame.text.push_str(&text);
                    }
                }
                Ok(Event::CData(e)) => {
                    if let Some(frame) = stack.last_mut() {
                        frame.text.push_str(&String::from_utf8_lossy(&e.into_inner()));
                    }
                }
                Ok(Event::End(_)) => {
                    let frame = stack.pop().ok_or_else(|| {
                        ManifestError::InvalidXml("unexpected closing tag".to_string())
                    })?;
                    let name = frame.name.clone();
                    let node = frame.into_node();
                    attach_xml_node(&mut stack, &mut root, name, node)?;
                }
                Ok(Event::Eof) => break,
                Err(err) => return Err(ManifestError::InvalidXml(err.to_string())),
                _ => {}
            }
            buf.clear();
        }

        if let Some(frame) = stack.last() {
            return Err(ManifestError::InvalidXml(format!(
                "element `{}` is not closed",
                frame.name
            )));
        }

        root.map(Self::new).ok_or(ManifestError::MissingRootElement)
    }
}

struct XmlFrame {
    name: String,
    text: String,
    children: BTreeMap<String, ManifestNode>,
}

impl XmlFrame {
    fn new(name: String) -> Self {
        Self {
            name,
            text: String::new(),
            children: BTreeMap::new(),
        }
    }

    fn into_node(self) -> ManifestNode {
        if self.children.is_empty() {
            ManifestNode::Scalar(self.text.trim().to_string())
        } else {
            ManifestNode::Map(self.children)
        }
    }

    fn push_child(&mut self, name: String, node: ManifestNode) {
        match self.children.entry(name) {
            Entry::Vacant(slot) => {
                slot.insert(node);
            }
            // Element nodes are never sequences, so an existing sequence can
            // only come from an earlier repetition.
            Entry::Occupied(mut slot) => match slot.get_mut() {
                ManifestNode::Sequence(items) => items.push(node),
                existing => {
                    let first = std::mem::replace(existing, ManifestNode::Null);
                    *existing = ManifestNode::Sequence(vec![first, node]);
                }
            },
        }
    }
}

fn attach_xml_node(
    stack: &mut [XmlFrame],
    root: &mut Option<ManifestNode>,
    name: String,
    node: ManifestNode,
) -> Result<(), ManifestError> {
    if let Some(parent) = stack.last_mut() {
        parent.push_child(name, node);
        return Ok(());
    }
    if root.is_some() {
        return Err(ManifestError::InvalidXml(format!(
            "multiple root elements, second is `{name}`"
        )));
    }
    *root = Some(node);
    Ok(())
}

fn local_name(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw).into_owned()
}

/// Returns identifiers declared under `sabre.<section>.<item>` for `kind`.
///
/// A scalar leaf yields one identifier; a sequence leaf yields its scalar
/// entries in declaration order. Anything absent or mis-shaped yields `[]`.
pub fn extract_identifiers(manifest: &Manifest, kind: ExtensionKind) -> Vec<String> {
    let leaf = manifest
        .root()
        .get(SABRE_KEY)
        .and_then(|sabre| sabre.get(kind.section_key()))
        .and_then(|section| section.get(kind.item_key()));

    match leaf {
        Some(ManifestNode::Scalar(value)) => scalar_identifier(value).into_iter().collect(),
        Some(ManifestNode::Sequence(items)) => items
            .iter()
            .filter_map(ManifestNode::as_scalar)
            .filter_map(scalar_identifier)
            .collect(),
        Some(ManifestNode::Null) | Some(ManifestNode::Map(_)) | None => Vec::new(),
    }
}

fn scalar_identifier(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Manifest parse errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManifestError {
    InvalidXml(String),
    InvalidJson(String),
    MissingRootElement,
}

impl Display for ManifestError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidXml(message) => write!(f, "manifest xml is invalid: {message}"),
            Self::InvalidJson(message) => write!(f, "manifest json is invalid: {message}"),
            Self::MissingRootElement => write!(f, "manifest has no root element"),
        }
    }
}

impl Error for ManifestError {}

#[cfg(test)]
mod tests {
    use super::{extract_identifiers, Manifest, ManifestError, ManifestNode};
    use crate::extension::descriptor::ExtensionKind;

    #[test]
    fn xml_repeated_siblings_become_sequence_in_document_order() {
        let manifest = Manifest::from_xml_str(
            r#"<?xml version="1.0"?>
            <info>
                <id>calendar</id>
                <sabre>
                    <plugins>
                        <plugin>Calendar\Dav\B</plugin>
                        <plugin>Calendar\Dav\A</plugin>
                    </plugins>
                </sabre>
            </info>"#,
        )
        .expect("xml manifest should parse");

        assert_eq!(
            manifest.root().get("id"),
            Some(&ManifestNode::Scalar("calendar".to_string()))
        );
        assert_eq!(
            extract_identifiers(&manifest, ExtensionKind::Plugin),
            vec!["Calendar\\Dav\\B".to_string(), "Calendar\\Dav\\A".to_string()]
        );
    }

    #[test]
    fn xml_single_element_stays_scalar() {
        let manifest = Manifest::from_xml_str(
            "<info><sabre><collections><collection>Files\\Root</collection></collections></sabre></info>",
        )
        .expect("xml manifest should parse");

        let collections = manifest
            .root()
            .get("sabre")
            .and_then(|node| node.get("collections"))
            .and_then(|node| node.get("collection"));
        assert_eq!(
            collections,
            Some(&ManifestNode::Scalar("Files\\Root".to_string()))
        );
    }

    #[test]
    fn xml_ignores_attributes_and_reads_cdata() {
        let manifest = Manifest::from_xml_str(
            r#"<info><sabre lang="en"><plugins><plugin><![CDATA[Mail\Dav\Plugin]]></plugin></plugins></sabre></info>"#,
        )
        .expect("xml manifest should parse");
        assert_eq!(
            extract_identifiers(&manifest, ExtensionKind::Plugin),
            vec!["Mail\\Dav\\Plugin".to_string()]
        );
    }

    #[test]
    fn xml_rejects_unclosed_document() {
        let err = Manifest::from_xml_str("<info><sabre>").expect_err("unclosed xml must fail");
        assert!(matches!(err, ManifestError::InvalidXml(_)));
    }

    #[test]
    fn xml_rejects_document_without_root() {
        let err = Manifest::from_xml_str("<?xml version=\"1.0\"?>").expect_err("no root");
        assert_eq!(err, ManifestError::MissingRootElement);
    }

    #[test]
    fn json_manifest_parses_into_tree() {
        let manifest = Manifest::from_json_str(
            r#"{"sabre": {"plugins": {"plugin": ["A", "B"]}}, "version": 3}"#,
        )
        .expect("json manifest should parse");
        assert_eq!(
            manifest.root().get("version"),
            Some(&ManifestNode::Scalar("3".to_string()))
        );
        assert_eq!(
            extract_identifiers(&manifest, ExtensionKind::Plugin),
            vec!["A".to_string(), "B".to_string()]
        );
    }

    #[test]
    fn json_rejects_invalid_document() {
        let err = Manifest::from_json_str("{").expect_err("invalid json must fail");
        assert!(matches!(err, ManifestError::InvalidJson(_)));
    }

    #[test]
    fn extraction_drops_structural_and_blank_entries() {
        let manifest = Manifest::from_json_str(
            r#"{"sabre": {"plugins": {"plugin": ["A", {"nested": "x"}, "  ", ["B"], "C"]}}}"#,
        )
        .expect("json manifest should parse");
        assert_eq!(
            extract_identifiers(&manifest, ExtensionKind::Plugin),
            vec!["A".to_string(), "C".to_string()]
        );
    }

    #[test]
    fn extraction_treats_null_and_map_leaf_as_absent() {
        let null_leaf = Manifest::from_json_str(r#"{"sabre": {"plugins": {"plugin": null}}}"#)
            .expect("json manifest should parse");
        assert!(extract_identifiers(&null_leaf, ExtensionKind::Plugin).is_empty());

        let map_leaf =
            Manifest::from_json_str(r#"{"sabre": {"plugins": {"plugin": {"name": "A"}}}}"#)
                .expect("json manifest should parse");
        assert!(extract_identifiers(&map_leaf, ExtensionKind::Plugin).is_empty());
    }

    #[test]
    fn extraction_rejects_non_map_intermediate_sections() {
        let manifest = Manifest::from_json_str(r#"{"sabre": "plugins"}"#)
            .expect("json manifest should parse");
        assert!(extract_identifiers(&manifest, ExtensionKind::Plugin).is_empty());

        let manifest = Manifest::from_json_str(r#"{"sabre": {"collections": ["C1"]}}"#)
            .expect("json manifest should parse");
        assert!(extract_identifiers(&manifest, ExtensionKind::Collection).is_empty());
    }
}
