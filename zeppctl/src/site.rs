//! Hadoop-style site configuration (`zeppelin-site.xml`).
//!
//! The site file is a flat property map:
//!
//! ```text
//! <configuration>
//!   <property>
//!     <name>zeppelin.server.port</name>
//!     <value>8080</value>
//!   </property>
//! </configuration>
//! ```
//!
//! This is the one fixed format we own end to end, so the parser is a small
//! line-independent scanner rather than a full XML library. Descriptions and
//! comments are not preserved across a rewrite; the live site file is already
//! reset from templates on every reconfiguration, so nothing of value is
//! lost.

use std::path::Path;

use crate::errors::{ZeppError, ZeppResult};

/// Ordered name/value property map backing a site XML file.
#[derive(Clone, Debug, Default)]
pub struct SiteConfig {
    entries: Vec<(String, String)>,
}

impl SiteConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a site file from disk.
    pub fn load(path: &Path) -> ZeppResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            ZeppError::Config(format!("failed to read {}: {e}", path.display()))
        })?;
        Self::parse(&text)
            .map_err(|e| ZeppError::Config(format!("malformed site file {}: {e}", path.display())))
    }

    /// Parse the property map out of XML text.
    fn parse(text: &str) -> Result<Self, String> {
        let mut entries = Vec::new();
        let mut rest = text;

        while let Some(start) = rest.find("<property>") {
            let after = &rest[start + "<property>".len()..];
            let end = after
                .find("</property>")
                .ok_or("unterminated <property> block")?;
            let block = &after[..end];

            let name = extract(block, "name").ok_or("property without <name>")?;
            // An empty <value/> is legal and treated as the empty string.
            let value = extract(block, "value").unwrap_or_default();
            entries.push((unescape(&name), unescape(&value)));

            rest = &after[end + "</property>".len()..];
        }

        Ok(Self { entries })
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Update an existing property or append a new one, preserving order.
    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self.entries.iter_mut().find(|(n, _)| n == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name.to_string(), value)),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Serialize back to XML.
    pub fn to_xml(&self) -> String {
        let mut out = String::from("<?xml version=\"1.0\"?>\n<configuration>\n");
        for (name, value) in &self.entries {
            out.push_str("  <property>\n");
            out.push_str(&format!("    <name>{}</name>\n", escape(name)));
            out.push_str(&format!("    <value>{}</value>\n", escape(value)));
            out.push_str("  </property>\n");
        }
        out.push_str("</configuration>\n");
        out
    }

    /// Write the map back to disk.
    pub fn save(&self, path: &Path) -> ZeppResult<()> {
        std::fs::write(path, self.to_xml()).map_err(|e| {
            ZeppError::Config(format!("failed to write {}: {e}", path.display()))
        })
    }
}

/// Extract the text of `<tag>...</tag>` within a property block.
/// Self-closing tags (`<value/>`) yield `None`.
fn extract(block: &str, tag: &str) -> Option<String> {
    let open = format!("<{tag}>");
    let close = format!("</{tag}>");
    let start = block.find(&open)? + open.len();
    let end = block[start..].find(&close)? + start;
    Some(block[start..end].trim().to_string())
}

fn escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn unescape(s: &str) -> String {
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}
