use anyhow::{Context, Result};

/// Namespace URI bound to Android framework attributes.
pub(crate) const ANDROID_NS: &str = "http://schemas.android.com/apk/res/android";
/// Prefix conventionally bound to the Android namespace, used in messages.
pub(crate) const ANDROID_PREFIX: &str = "android:";

/// One attribute of a manifest element, keyed by namespace URI and local name.
#[derive(Clone, Debug)]
pub(crate) struct ManifestAttribute {
    pub(crate) namespace: Option<String>,
    pub(crate) name: String,
    pub(crate) value: String,
}

/// Owned view of one manifest element, detached from the XML document.
#[derive(Clone, Debug)]
pub(crate) struct ManifestElement {
    /// Local tag name, without any prefix.
    pub(crate) tag: String,
    /// Namespace URI of the tag itself; `None` for default (un-prefixed) elements.
    pub(crate) namespace: Option<String>,
    pub(crate) attributes: Vec<ManifestAttribute>,
    /// 1-based source position of the element's start tag.
    pub(crate) line: u32,
    pub(crate) column: u32,
}

impl ManifestElement {
    /// Look up an attribute value by namespace URI and local name.
    pub(crate) fn attribute(&self, namespace: Option<&str>, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|attribute| attribute.namespace.as_deref() == namespace && attribute.name == name)
            .map(|attribute| attribute.value.as_str())
    }
}

/// Parse manifest XML into its elements, in document order.
pub(crate) fn elements(text: &str) -> Result<Vec<ManifestElement>> {
    let document = roxmltree::Document::parse(text).context("failed to parse manifest XML")?;

    let mut elements = Vec::new();
    for node in document.descendants().filter(roxmltree::Node::is_element) {
        let position = document.text_pos_at(node.range().start);
        let attributes = node
            .attributes()
            .map(|attribute| ManifestAttribute {
                namespace: attribute.namespace().map(str::to_string),
                name: attribute.name().to_string(),
                value: attribute.value().to_string(),
            })
            .collect();
        elements.push(ManifestElement {
            tag: node.tag_name().name().to_string(),
            namespace: node.tag_name().namespace().map(str::to_string),
            attributes,
            line: position.row,
            column: position.col,
        });
    }

    Ok(elements)
}
