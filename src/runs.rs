//! Styled text runs to inline markup.

use quick_xml::escape::escape;

use crate::model::Run;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tag {
    Strong,
    Em,
    Code,
}

impl Tag {
    /// Close and open order.
    const ALL: [Tag; 3] = [Tag::Strong, Tag::Em, Tag::Code];

    fn name(self) -> &'static str {
        match self {
            Tag::Strong => "strong",
            Tag::Em => "em",
            Tag::Code => "code",
        }
    }

    fn wanted_by(self, run: &Run) -> bool {
        match self {
            Tag::Strong => run.bold,
            Tag::Em => run.italic,
            Tag::Code => run.code,
        }
    }
}

/// Converts runs to well-nested `strong`/`em`/`code` markup.
///
/// Tags are kept on a stack. Before a run is written, any open tag the run
/// does not want is closed by popping until it is gone, then missing tags are
/// opened. A trailing unformatted run closes whatever is still open. Nesting is
/// always valid; the tag count is not always minimal.
pub fn convert_runs_to_html(runs: &[Run]) -> String {
    let sentinel = Run::default();
    let mut output = String::new();
    let mut stack: Vec<Tag> = Vec::new();

    for run in runs.iter().chain(std::iter::once(&sentinel)) {
        for tag in Tag::ALL {
            while stack.contains(&tag) && !tag.wanted_by(run) {
                if let Some(open) = stack.pop() {
                    output.push_str("</");
                    output.push_str(open.name());
                    output.push('>');
                }
            }
        }

        for tag in Tag::ALL {
            if tag.wanted_by(run) && !stack.contains(&tag) {
                output.push('<');
                output.push_str(tag.name());
                output.push('>');
                stack.push(tag);
            }
        }

        output.push_str(&escape(run.plain_text.as_str()));
    }

    output
}
