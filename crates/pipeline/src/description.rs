//! A typed model of GStreamer pipeline descriptions.
//!
//! Topologies are assembled from [`Element`]s and caps filters and rendered
//! to the textual form understood by `gst::parse_launch` and `gst-launch-1.0`
//! (see the [pipeline description
//! syntax](https://gstreamer.freedesktop.org/documentation/tools/gst-launch.html#pipeline-description)).

use std::fmt;

/// Name given to the tee that splits the source into branches.
pub const TEE_NAME: &str = "t";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Element {
    pub factory: String,
    pub name: Option<String>,
    pub properties: Vec<(String, String)>,
}

impl Element {
    pub fn new(factory: impl Into<String>) -> Self {
        Self {
            factory: factory.into(),
            name: None,
            properties: Vec::new(),
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn property(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.properties.push((key.into(), value.to_string()));
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.properties
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    fn push_args(&self, args: &mut Vec<String>) {
        args.push(self.factory.clone());

        if let Some(name) = &self.name {
            args.push(format!("name={}", quote(name)));
        }

        for (key, value) in &self.properties {
            args.push(format!("{}={}", key, quote(value)));
        }
    }
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.factory)?;

        if let Some(name) = &self.name {
            write!(f, " name={}", quote(name))?;
        }

        for (key, value) in &self.properties {
            write!(f, " {}={}", key, quote(value))?;
        }

        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Link {
    Element(Element),
    /// A caps filter, e.g. `video/x-h264,width=640,height=360`.
    Caps(String),
}

impl fmt::Display for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Link::Element(element) => element.fmt(f),
            Link::Caps(caps) => f.write_str(caps),
        }
    }
}

/// Elements linked one after the other.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Chain(pub Vec<Link>);

impl Chain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn element(mut self, element: Element) -> Self {
        self.0.push(Link::Element(element));
        self
    }

    pub fn caps(mut self, caps: impl Into<String>) -> Self {
        self.0.push(Link::Caps(caps.into()));
        self
    }

    pub fn extend(mut self, other: Chain) -> Self {
        self.0.extend(other.0);
        self
    }

    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.0.iter().filter_map(|link| match link {
            Link::Element(element) => Some(element),
            Link::Caps(_) => None,
        })
    }

    pub fn factories(&self) -> Vec<&str> {
        self.elements().map(|e| e.factory.as_str()).collect()
    }

    fn push_args(&self, args: &mut Vec<String>) {
        for (i, link) in self.0.iter().enumerate() {
            if i > 0 {
                args.push("!".to_owned());
            }

            match link {
                Link::Element(element) => element.push_args(args),
                Link::Caps(caps) => args.push(caps.clone()),
            }
        }
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, link) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" ! ")?;
            }
            link.fmt(f)?;
        }

        Ok(())
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BranchKind {
    Record,
    Network,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Branch {
    pub kind: BranchKind,
    pub chain: Chain,
}

/// A source chain, optionally fanned out by a tee into several branches.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Topology {
    pub source: Chain,
    pub branches: Vec<Branch>,
}

impl Topology {
    pub fn linear(chain: Chain) -> Self {
        Self {
            source: chain,
            branches: Vec::new(),
        }
    }

    pub fn branch(&self, kind: BranchKind) -> Option<&Chain> {
        self.branches
            .iter()
            .find(|b| b.kind == kind)
            .map(|b| &b.chain)
    }

    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.source
            .elements()
            .chain(self.branches.iter().flat_map(|b| b.chain.elements()))
    }

    pub fn find(&self, factory: &str) -> Option<&Element> {
        self.elements().find(|e| e.factory == factory)
    }

    pub fn to_launch_string(&self) -> String {
        self.to_string()
    }

    /// The description split into `gst-launch-1.0` arguments: one per
    /// element, property and link. `gst-launch-1.0` escapes the spaces inside
    /// each of its arguments, so the description cannot be passed whole.
    pub fn to_launch_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        self.source.push_args(&mut args);

        if self.branches.is_empty() {
            return args;
        }

        args.extend(["!".to_owned(), "tee".to_owned(), format!("name={TEE_NAME}")]);

        for branch in &self.branches {
            args.extend([format!("{TEE_NAME}."), "!".to_owned()]);
            branch.chain.push_args(&mut args);
        }

        args
    }
}

impl fmt::Display for Topology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.source.fmt(f)?;

        if self.branches.is_empty() {
            return Ok(());
        }

        write!(f, " ! tee name={TEE_NAME}")?;

        for branch in &self.branches {
            write!(f, " {TEE_NAME}. ! {}", branch.chain)?;
        }

        Ok(())
    }
}

fn quote(value: &str) -> String {
    let plain = !value.is_empty()
        && !value
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, '"' | '\'' | '!' | '\\' | ',' | '='));

    if plain {
        return value.to_owned();
    }

    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('"');
    for c in value.chars() {
        if matches!(c, '"' | '\\') {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted.push('"');
    quoted
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_linear_chain() {
        let topology = Topology::linear(
            Chain::new()
                .element(Element::new("v4l2src").property("device", "/dev/video1"))
                .caps("video/x-h264,width=640,height=360")
                .element(Element::new("h264parse").named("vid-parse"))
                .element(
                    Element::new("udpsink")
                        .property("host", "10.0.0.2")
                        .property("port", 5600),
                ),
        );

        assert_eq!(
            topology.to_launch_string(),
            "v4l2src device=/dev/video1 ! video/x-h264,width=640,height=360 \
             ! h264parse name=vid-parse ! udpsink host=10.0.0.2 port=5600"
        );
    }

    #[test]
    fn renders_tee_branches() {
        let topology = Topology {
            source: Chain::new().element(Element::new("videotestsrc")),
            branches: vec![
                Branch {
                    kind: BranchKind::Record,
                    chain: Chain::new()
                        .element(Element::new("queue"))
                        .element(Element::new("fakesink")),
                },
                Branch {
                    kind: BranchKind::Network,
                    chain: Chain::new()
                        .element(Element::new("queue"))
                        .element(Element::new("autovideosink")),
                },
            ],
        };

        assert_eq!(
            topology.to_launch_string(),
            "videotestsrc ! tee name=t t. ! queue ! fakesink t. ! queue ! autovideosink"
        );
        assert_eq!(
            topology.branch(BranchKind::Network).unwrap().factories(),
            vec!["queue", "autovideosink"]
        );
    }

    #[test]
    fn splits_launch_args() {
        let topology = Topology {
            source: Chain::new()
                .element(
                    Element::new("v4l2src")
                        .named("vid-src")
                        .property("device", "/dev/video1"),
                )
                .caps("video/x-h264,width=640,height=360"),
            branches: vec![
                Branch {
                    kind: BranchKind::Record,
                    chain: Chain::new().element(Element::new("queue")).element(
                        Element::new("filesink").property("location", "/media/my disk/out"),
                    ),
                },
                Branch {
                    kind: BranchKind::Network,
                    chain: Chain::new().element(Element::new("fakesink")),
                },
            ],
        };

        let args = topology.to_launch_args();
        assert_eq!(
            args,
            vec![
                "v4l2src",
                "name=vid-src",
                "device=/dev/video1",
                "!",
                "video/x-h264,width=640,height=360",
                "!",
                "tee",
                "name=t",
                "t.",
                "!",
                "queue",
                "!",
                "filesink",
                r#"location="/media/my disk/out""#,
                "t.",
                "!",
                "fakesink",
            ]
        );

        // same pipeline as the single-string form
        assert_eq!(args.join(" "), topology.to_launch_string());
    }

    #[test]
    fn quotes_awkward_values() {
        let element = Element::new("filesink").property("location", "/media/my \"disk\"/out");

        assert_eq!(
            element.to_string(),
            r#"filesink location="/media/my \"disk\"/out""#
        );
        assert_eq!(element.get("location"), Some("/media/my \"disk\"/out"));
    }
}
