//! Records produced by the extractor and written by the output layer.

use serde::{Deserialize, Serialize};

/// One legislative initiative as shown on its detail page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Initiative {
    pub id: u32,
    pub title: String,
    pub summary: String,
    pub url: String,
    #[serde(default)]
    pub authors: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pdf_url: Option<String>,
    /// Raw text as shown on the page, not parsed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dist_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parlgroup: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub events: Vec<TimelineEvent>,
    /// ISO 8601 timestamp string (UTC).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scrape_date: Option<String>,
}

/// One dated step in an initiative's procedural history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawEvent", into = "RawEvent")]
pub struct TimelineEvent {
    pub date: String,
    pub kind: String,
    pub payload: Option<EventPayload>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventPayload {
    Committee(String),
    References(Vec<Reference>),
    Votes(VoteTally),
    Info(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    pub url: String,
    pub title: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteTally {
    #[serde(rename = "for", default)]
    pub in_favor: Vec<String>,
    #[serde(default)]
    pub against: Vec<String>,
    #[serde(default)]
    pub abstain: Vec<String>,
}

impl VoteTally {
    pub fn is_empty(&self) -> bool {
        self.in_favor.is_empty() && self.against.is_empty() && self.abstain.is_empty()
    }
}

/// Flat wire shape of a [`TimelineEvent`]: the payload is whichever one of the
/// optional keys is present.
#[derive(Serialize, Deserialize)]
struct RawEvent {
    date: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    committee: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    references: Option<Vec<Reference>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    votes: Option<VoteTally>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    info: Option<String>,
}

impl TryFrom<RawEvent> for TimelineEvent {
    type Error = String;

    fn try_from(raw: RawEvent) -> Result<Self, Self::Error> {
        let mut payloads = [
            raw.committee.map(EventPayload::Committee),
            raw.references.map(EventPayload::References),
            raw.votes.map(EventPayload::Votes),
            raw.info.map(EventPayload::Info),
        ]
        .into_iter()
        .flatten();

        let payload = payloads.next();
        if payloads.next().is_some() {
            return Err(format!(
                "event '{}' on {} carries more than one payload",
                raw.kind, raw.date
            ));
        }

        Ok(TimelineEvent {
            date: raw.date,
            kind: raw.kind,
            payload,
        })
    }
}

impl From<TimelineEvent> for RawEvent {
    fn from(event: TimelineEvent) -> Self {
        let mut raw = RawEvent {
            date: event.date,
            kind: event.kind,
            committee: None,
            references: None,
            votes: None,
            info: None,
        };
        match event.payload {
            Some(EventPayload::Committee(name)) => raw.committee = Some(name),
            Some(EventPayload::References(refs)) => raw.references = Some(refs),
            Some(EventPayload::Votes(tally)) => raw.votes = Some(tally),
            Some(EventPayload::Info(text)) => raw.info = Some(text),
            None => {}
        }
        raw
    }
}
