use crawl::utils::clean_text;
use itertools::izip;
use scraper::{ElementRef, Html};
use tracing::{debug, info, warn};

use crate::classify::classify;
use crate::locator::{FieldLocator, PageField};
use crate::model::{Initiative, TimelineEvent};

/// Detail page of one initiative, e.g. `...DetalheIniciativa.aspx?BID=38165`.
pub const DEFAULT_URL_TEMPLATE: &str =
    "http://www.parlamento.pt/ActividadeParlamentar/Paginas/DetalheIniciativa.aspx?BID={id}";

pub fn initiative_url(template: &str, id: u32) -> String {
    template.replace("{id}", &id.to_string())
}

/// Builds the record for `id` from its parsed page.
///
/// Returns `None` when the page has no title, which is how the site answers
/// for identifiers that do not exist.
pub fn extract(locator: &FieldLocator, id: u32, url: &str, document: &Html) -> Option<Initiative> {
    let Some(title) = locator.find(document, PageField::Title) else {
        debug!(id, "no initiative");
        return None;
    };
    let title = element_text(title);

    let summary = match locator.find(document, PageField::Summary) {
        Some(summary) => element_text(summary),
        None => {
            warn!(id, "initiative page without summary");
            String::new()
        }
    };

    let authors = locator
        .find_all(document, PageField::Author)
        .into_iter()
        .map(element_text)
        .collect();

    let initiative = Initiative {
        id,
        summary,
        url: url.to_string(),
        authors,
        doc_url: link_target(locator, document, PageField::DocumentLink),
        pdf_url: link_target(locator, document, PageField::PdfLink),
        dist_date: optional_text(locator, document, PageField::DistributionDate),
        parlgroup: optional_text(locator, document, PageField::ParliamentaryGroup),
        events: extract_events(locator, id, document),
        scrape_date: None,
        title,
    };

    info!(id, title = %initiative.title, "scraped initiative");
    Some(initiative)
}

fn extract_events(locator: &FieldLocator, id: u32, document: &Html) -> Vec<TimelineEvent> {
    let dates = locator.find_all(document, PageField::EventDate);
    let types = locator.find_all(document, PageField::EventType);
    let infos = locator.find_all(document, PageField::EventInfo);

    if dates.len() != types.len() || dates.len() != infos.len() {
        warn!(
            id,
            dates = dates.len(),
            types = types.len(),
            infos = infos.len(),
            "timeline arrays differ in length, keeping the shortest"
        );
    }

    izip!(dates, types, infos)
        .map(|(date, kind, info)| {
            let kind = element_text(kind);
            let has_content = !info.text().collect::<String>().trim().is_empty();
            let payload = if has_content {
                classify(locator, &kind, info)
            } else {
                None
            };

            TimelineEvent {
                date: date.text().collect(),
                kind,
                payload,
            }
        })
        .collect()
}

fn element_text(el: ElementRef) -> String {
    clean_text(&el.text().collect::<String>())
}

fn optional_text(locator: &FieldLocator, document: &Html, field: PageField) -> Option<String> {
    locator.find(document, field).map(element_text)
}

fn link_target(locator: &FieldLocator, document: &Html, field: PageField) -> Option<String> {
    locator
        .find(document, field)
        .and_then(|link| link.value().attr("href"))
        .map(str::to_string)
}
