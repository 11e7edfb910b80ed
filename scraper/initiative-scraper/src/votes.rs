//! Vote breakdown parsing.
//!
//! The page renders a vote as a run of labels followed by party or deputy names,
//! e.g. `A Favor: <i>PSD</i>, <i>CDS-PP</i><br>Contra: <i>PCP</i>`. A single
//! name may share the label's text run (`Abstenção: Isabel Oneto (PS)`).

use scraper::{ElementRef, Node};
use tracing::error;

use crate::model::VoteTally;

pub const LABEL_AGAINST: &str = "Contra:";
pub const LABEL_IN_FAVOR: &str = "A Favor:";
pub const LABEL_ABSTENTION: &str = "Abstenção:";

/// Which list names are currently being added to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Bucket {
    #[default]
    Unset,
    For,
    Against,
    Abstain,
}

impl Bucket {
    /// Matches a section label at the start of `text`, returning the bucket
    /// and whatever follows the label.
    fn from_label(text: &str) -> Option<(Bucket, &str)> {
        [
            (LABEL_AGAINST, Bucket::Against),
            (LABEL_IN_FAVOR, Bucket::For),
            (LABEL_ABSTENTION, Bucket::Abstain),
        ]
        .into_iter()
        .find_map(|(label, bucket)| text.strip_prefix(label).map(|rest| (bucket, rest)))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoteAnomaly {
    /// A name showed up before any label.
    NameBeforeLabel(String),
    /// Markup other than a line break or emphasis.
    UnexpectedMarkup(String),
    /// A text run that is neither a separator nor a label.
    UnrecognizedText(String),
}

/// State threaded through the scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VoteScan {
    pub bucket: Bucket,
    pub tally: VoteTally,
    pub anomalies: Vec<VoteAnomaly>,
}

impl VoteScan {
    fn push(mut self, name: &str) -> Self {
        let name = name.to_string();
        match self.bucket {
            Bucket::For => self.tally.in_favor.push(name),
            Bucket::Against => self.tally.against.push(name),
            Bucket::Abstain => self.tally.abstain.push(name),
            Bucket::Unset => {
                error!(name = %name, "vote name appears before any section label");
                self.anomalies.push(VoteAnomaly::NameBeforeLabel(name));
            }
        }
        self
    }

    fn element(mut self, el: ElementRef) -> Self {
        match el.value().name() {
            "br" => self,
            "i" | "em" => {
                let name = el.text().collect::<String>();
                let name = name.trim();
                if name.is_empty() {
                    self
                } else {
                    self.push(name)
                }
            }
            other => {
                error!(tag = other, "unexpected markup in vote details");
                self.anomalies
                    .push(VoteAnomaly::UnexpectedMarkup(other.to_string()));
                self
            }
        }
    }

    fn text(mut self, raw: &str) -> Self {
        // Separators stick to the next label, e.g. `, Contra: Maria Silva`.
        let text = raw.trim_matches(is_separator);
        if text.is_empty() {
            return self;
        }

        match Bucket::from_label(text) {
            Some((bucket, rest)) => {
                self.bucket = bucket;
                let rest = rest.trim_matches(is_separator);
                if rest.is_empty() {
                    self
                } else {
                    self.push(rest)
                }
            }
            None => {
                error!(text, "unrecognized text in vote details");
                self.anomalies
                    .push(VoteAnomaly::UnrecognizedText(text.to_string()));
                self
            }
        }
    }
}

fn is_separator(c: char) -> bool {
    c.is_whitespace() || c == ','
}

/// Scans the child nodes of `fragment` left to right, keeping every anomaly.
pub fn scan_votes(fragment: ElementRef) -> VoteScan {
    fragment
        .children()
        .fold(VoteScan::default(), |scan, node| match node.value() {
            Node::Text(text) => scan.text(text),
            Node::Element(_) => match ElementRef::wrap(node) {
                Some(el) => scan.element(el),
                None => scan,
            },
            _ => scan,
        })
}

pub fn parse_votes(fragment: ElementRef) -> VoteTally {
    scan_votes(fragment).tally
}
