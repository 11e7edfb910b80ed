//! Turns one timeline block into a typed payload based on its event label.

use crawl::utils::{clean_text, strip_brackets};
use scraper::{ElementRef, Selector};
use std::sync::LazyLock;
use tracing::{debug, warn};

use crate::locator::{FieldLocator, PageField};
use crate::model::{EventPayload, Reference, VoteTally};
use crate::votes::parse_votes;

pub const COMMITTEE_REFERRAL: &str = "Baixa comissão para discussão";
pub const PUBLICATION: &str = "Publicação";
pub const VOTE_ON_GENERALITY: &str = "Votação na generalidade";
pub const DELIBERATION_VOTE: &str = "Votação Deliberação";
pub const FINAL_GLOBAL_VOTE: &str = "Votação final global";

static LINK_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a").expect("valid selector"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    CommitteeReferral,
    Publication,
    Vote,
    Other,
}

impl EventKind {
    /// Exact match on the label; case and accents matter.
    pub fn from_label(label: &str) -> EventKind {
        match label {
            COMMITTEE_REFERRAL => EventKind::CommitteeReferral,
            PUBLICATION => EventKind::Publication,
            VOTE_ON_GENERALITY | DELIBERATION_VOTE | FINAL_GLOBAL_VOTE => EventKind::Vote,
            _ => EventKind::Other,
        }
    }
}

pub fn classify(
    locator: &FieldLocator,
    event_type: &str,
    info: ElementRef,
) -> Option<EventPayload> {
    match EventKind::from_label(event_type) {
        EventKind::CommitteeReferral => locator
            .find_in(info, PageField::Committee)
            .map(|el| clean_text(&el.text().collect::<String>()))
            .filter(|name| !name.is_empty())
            .map(EventPayload::Committee),
        EventKind::Publication => Some(EventPayload::References(extract_references(info))),
        EventKind::Vote => {
            let tally = match locator.find_in(info, PageField::VoteDetails) {
                Some(details) => parse_votes(details),
                None => {
                    warn!(event_type, "vote event without vote details");
                    VoteTally::default()
                }
            };
            Some(EventPayload::Votes(tally))
        }
        EventKind::Other => {
            let text = info.text().collect::<String>();
            let text = text.trim();
            if text.is_empty() {
                None
            } else {
                Some(EventPayload::Info(text.to_string()))
            }
        }
    }
}

fn extract_references(info: ElementRef) -> Vec<Reference> {
    info.select(&LINK_SELECTOR)
        .filter_map(|link| {
            let Some(href) = link.value().attr("href") else {
                debug!("skipping publication link without href");
                return None;
            };
            let text = link.text().collect::<String>();
            Some(Reference {
                url: href.to_string(),
                title: strip_brackets(&text).to_string(),
            })
        })
        .collect()
}
