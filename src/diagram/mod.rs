//! Diagram Post-Processing
//!
//! Rewrites `click <node> "<path>"` directives in generated Mermaid text into
//! absolute repository links. Parsing and rendering are separate pure steps:
//! directives are first tokenized into `ClickDirective` records carrying
//! their byte span, then the text is re-assembled in one linear pass.
//!
//! ```text
//! click api "src/api/routes.py#Router"
//!   -> click api "https://github.com/owner/repo/blob/main/src/api/routes.py"
//! click web "frontend/src"
//!   -> click web "https://github.com/owner/repo/tree/main/frontend/src"
//! ```
//!
//! The `#fragment` is dropped from the link. The raw path (fragment included)
//! stays available on each `ClickDirective`.

use regex::Regex;
use serde::Serialize;
use std::ops::Range;
use std::sync::LazyLock;

use crate::constants::github::DEFAULT_WEB_HOST;

/// `click <identifier> "<path>"`; identifier has no whitespace or quotes
const CLICK_PATTERN: &str = r#"click ([^\s"]+)\s+"([^"]+)""#;

static CLICK_DIRECTIVE: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(CLICK_PATTERN).ok());

/// One click directive as it appears in the diagram text
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClickDirective {
    pub node: String,
    /// Raw path argument, fragment included
    pub path: String,
    /// Byte range of the whole directive in the source text
    #[serde(skip)]
    pub span: Range<usize>,
}

impl ClickDirective {
    /// Path up to (not including) the first `#`
    pub fn path_without_fragment(&self) -> &str {
        self.path
            .split_once('#')
            .map_or(self.path.as_str(), |(path, _)| path)
    }

    pub fn fragment(&self) -> Option<&str> {
        self.path.split_once('#').map(|(_, fragment)| fragment)
    }

    /// A path whose final segment contains a `.` is a file, otherwise a directory
    pub fn is_file(&self) -> bool {
        let path = self.path_without_fragment();
        path.rsplit('/').next().is_some_and(|segment| segment.contains('.'))
    }
}

/// Tokenize every click directive, in document order
pub fn parse_click_directives(text: &str) -> Vec<ClickDirective> {
    let Some(re) = CLICK_DIRECTIVE.as_ref() else {
        return Vec::new();
    };

    re.captures_iter(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            Some(ClickDirective {
                node: caps.get(1)?.as_str().to_string(),
                path: caps.get(2)?.as_str().to_string(),
                span: whole.range(),
            })
        })
        .collect()
}

/// Where click-through links point
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkTarget {
    pub host: String,
    pub owner: String,
    pub repo: String,
    pub branch: String,
}

impl LinkTarget {
    pub fn new(owner: &str, repo: &str, branch: &str) -> Self {
        Self {
            host: DEFAULT_WEB_HOST.to_string(),
            owner: owner.to_string(),
            repo: repo.to_string(),
            branch: branch.to_string(),
        }
    }

    pub fn with_host(mut self, host: &str) -> Self {
        self.host = host.to_string();
        self
    }

    pub fn url_for(&self, directive: &ClickDirective) -> String {
        let kind = if directive.is_file() { "blob" } else { "tree" };
        format!(
            "https://{}/{}/{}/{}/{}/{}",
            self.host,
            self.owner,
            self.repo,
            kind,
            self.branch,
            directive.path_without_fragment()
        )
    }
}

/// Splice rewritten directives into `text`.
///
/// `directives` must come from `parse_click_directives(text)`; spans are
/// consumed in order and everything between them is copied verbatim.
pub fn render(text: &str, directives: &[ClickDirective], target: &LinkTarget) -> String {
    let mut out = String::with_capacity(text.len() + directives.len() * 48);
    let mut cursor = 0;

    for directive in directives {
        if directive.span.start < cursor || directive.span.end > text.len() {
            continue;
        }
        out.push_str(&text[cursor..directive.span.start]);
        out.push_str(&format!(
            "click {} \"{}\"",
            directive.node,
            target.url_for(directive)
        ));
        cursor = directive.span.end;
    }

    out.push_str(&text[cursor..]);
    out
}

/// Rewrite every click directive to a `github.com` link
pub fn rewrite(text: &str, owner: &str, repo: &str, branch: &str) -> String {
    let directives = parse_click_directives(text);
    render(text, &directives, &LinkTarget::new(owner, repo, branch))
}

/// Final diagram of a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagramArtifact {
    /// Stage output after fence stripping, before link rewriting
    pub raw: String,
    /// Diagram with absolute links
    pub diagram: String,
    pub clicks: Vec<ClickDirective>,
}

/// Post-processor bound to a web host
#[derive(Debug, Clone)]
pub struct DiagramPostProcessor {
    host: String,
}

impl Default for DiagramPostProcessor {
    fn default() -> Self {
        Self::new(DEFAULT_WEB_HOST)
    }
}

impl DiagramPostProcessor {
    pub fn new(host: &str) -> Self {
        Self {
            host: host.to_string(),
        }
    }

    pub fn process(&self, raw: String, owner: &str, repo: &str, branch: &str) -> DiagramArtifact {
        let target = LinkTarget::new(owner, repo, branch).with_host(&self.host);
        let clicks = parse_click_directives(&raw);
        let diagram = render(&raw, &clicks, &target);

        DiagramArtifact {
            raw,
            diagram,
            clicks,
        }
    }
}
