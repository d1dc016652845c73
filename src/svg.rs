//! Vector graphic asset pipeline.
//!
//! An SVG goes through three steps before it can be inlined: read, optimize,
//! then split into the root element's attributes and its inner markup. The
//! template merges those attributes with the generated class and id, and
//! writes the inner markup as the element body.
//!
//! Nothing here is cached or shared. Loads of different paths can run in any
//! interleaving.

use std::collections::BTreeMap;

use quick_xml::events::attributes::AttrError;
use quick_xml::events::Event;
use quick_xml::reader::Reader;
use thiserror::Error;

use crate::fs::FileSystem;
use crate::path::SourcePath;
use crate::toolchain::SvgOptimizer;

/// An SVG ready to be inlined.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Svg {
    /// Attributes of the root `<svg>` element, unescaped.
    pub attributes: BTreeMap<String, String>,
    /// Everything between the root start and end tags, verbatim.
    pub content: String,
}

#[derive(Debug, Error)]
pub enum SvgError {
    #[error("unreadable: {0}")]
    Read(#[source] std::io::Error),

    #[error("optimization failed: {0}")]
    Optimize(#[source] anyhow::Error),

    #[error("malformed markup: {0}")]
    Markup(#[from] quick_xml::Error),

    #[error("malformed attribute: {0}")]
    Attribute(#[from] AttrError),

    #[error("no root element")]
    MissingRoot,
}

/// Reads, optimizes and splits the SVG at `path`.
pub async fn load_svg<F: FileSystem>(
    fs: &F,
    optimizer: &dyn SvgOptimizer,
    path: &SourcePath,
) -> Result<Svg, SvgError> {
    let text = fs.read_utf8(path).await.map_err(SvgError::Read)?;
    let optimized = optimizer.optimize(&text).map_err(SvgError::Optimize)?;
    let svg = separate_attributes_and_content(&optimized)?;

    tracing::debug!(
        path = %path,
        original_bytes = text.len(),
        optimized_bytes = optimized.len(),
        "loaded svg"
    );

    Ok(svg)
}

/// Splits an SVG document into root attributes and inner markup.
///
/// Anything before the root element (declarations, comments, doctype) is
/// dropped. A self-closing root has empty content.
pub fn separate_attributes_and_content(markup: &str) -> Result<Svg, SvgError> {
    let mut reader = Reader::from_str(markup);

    let mut attributes = BTreeMap::new();
    let mut content_start: Option<usize> = None;
    let mut depth = 0usize;

    loop {
        let event_start = reader.buffer_position() as usize;
        match reader.read_event()? {
            Event::Start(element) => {
                if content_start.is_none() {
                    attributes = collect_attributes(&element)?;
                    content_start = Some(reader.buffer_position() as usize);
                } else {
                    depth += 1;
                }
            }
            Event::Empty(element) => {
                if content_start.is_none() {
                    return Ok(Svg {
                        attributes: collect_attributes(&element)?,
                        content: String::new(),
                    });
                }
            }
            Event::End(_) => {
                if depth == 0 {
                    let start = content_start.ok_or(SvgError::MissingRoot)?;
                    return Ok(Svg {
                        attributes,
                        content: markup[start..event_start].to_string(),
                    });
                }
                depth -= 1;
            }
            Event::Eof => return Err(SvgError::MissingRoot),
            _ => {}
        }
    }
}

fn collect_attributes(
    element: &quick_xml::events::BytesStart<'_>,
) -> Result<BTreeMap<String, String>, SvgError> {
    let mut attributes = BTreeMap::new();
    for attribute in element.attributes() {
        let attribute = attribute?;
        let key = String::from_utf8_lossy(attribute.key.as_ref()).into_owned();
        let value = attribute.unescape_value()?.into_owned();
        attributes.insert(key, value);
    }
    Ok(attributes)
}

// ---------------------------------------------------------------------------
// usvg-backed optimizer
// ---------------------------------------------------------------------------

/// Optimizes by round-tripping through `usvg`.
///
/// Parsing resolves styles and `use` references, converts shapes to paths and
/// drops comments, metadata, titles, descriptions, editor namespaces and
/// invisible elements. Writing rounds coordinates to `precision` decimals and
/// transform matrices to `transforms_precision` decimals. Scale and rotation
/// entries are fractions, so rounding them as hard as coordinates distorts
/// the graphic.
///
/// usvg is built without its `text` feature: `<text>` elements are dropped
/// rather than converted to outlines. Convert text to paths before exporting.
#[derive(Debug, Clone, Copy)]
pub struct UsvgOptimizer {
    pub precision: u8,
    pub transforms_precision: u8,
}

impl Default for UsvgOptimizer {
    fn default() -> Self {
        Self {
            precision: 0,
            transforms_precision: 5,
        }
    }
}

impl SvgOptimizer for UsvgOptimizer {
    fn optimize(&self, svg: &str) -> anyhow::Result<String> {
        let options = usvg::Options::default();
        let tree = usvg::Tree::from_str(svg, &options)?;
        let write_options = usvg::WriteOptions {
            coordinates_precision: self.precision,
            transforms_precision: self.transforms_precision,
            ..Default::default()
        };
        Ok(tree.to_string(&write_options))
    }
}
