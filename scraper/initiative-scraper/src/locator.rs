//! Where each field lives on an initiative page.
//!
//! The upstream page exposes its fields through ASP.NET control ids such as
//! `ctl00_..._lblTitulo`. Nothing else in the crate knows about those ids: the
//! extractor and classifier ask for a [`PageField`] and this table answers with
//! the matching elements.

use regex::Regex;
use scraper::{ElementRef, Html, Selector};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PageField {
    Title,
    Summary,
    DocumentLink,
    PdfLink,
    Author,
    ParliamentaryGroup,
    DistributionDate,
    EventDate,
    EventType,
    EventInfo,
    Committee,
    VoteDetails,
}

impl PageField {
    pub const ALL: [PageField; 12] = [
        PageField::Title,
        PageField::Summary,
        PageField::DocumentLink,
        PageField::PdfLink,
        PageField::Author,
        PageField::ParliamentaryGroup,
        PageField::DistributionDate,
        PageField::EventDate,
        PageField::EventType,
        PageField::EventInfo,
        PageField::Committee,
        PageField::VoteDetails,
    ];

    /// Tag name and id pattern of the element carrying this field.
    fn pattern(self) -> (&'static str, &'static str) {
        match self {
            PageField::Title => ("span", "lblTitulo"),
            PageField::Summary => ("span", "lblDocumentoTitulo"),
            PageField::DocumentLink => ("a", "hplDocumentoDOC"),
            PageField::PdfLink => ("a", "hplDocumentoPDF"),
            PageField::Author => ("a", "hplAutor"),
            PageField::ParliamentaryGroup => ("span", "lblDeputadosGP"),
            PageField::DistributionDate => ("span", "lblDataDistribuicao"),
            // Anchored so it does not also match lblDataDistribuicao.
            PageField::EventDate => ("span", "lblData$"),
            PageField::EventType => ("span", "lblEvento"),
            PageField::EventInfo => ("div", "pnlDiscussao"),
            PageField::Committee => ("span", "lblComissao"),
            PageField::VoteDetails => ("span", "lblDetalhesVotacao"),
        }
    }
}

struct FieldLookup {
    field: PageField,
    selector: Selector,
    id: Regex,
}

/// Compiled lookup table for every [`PageField`].
pub struct FieldLocator {
    lookups: Vec<FieldLookup>,
}

impl FieldLocator {
    pub fn new() -> Self {
        let lookups = PageField::ALL
            .iter()
            .map(|&field| {
                let (tag, id) = field.pattern();
                FieldLookup {
                    field,
                    selector: Selector::parse(&format!("{tag}[id]")).expect("valid selector"),
                    id: Regex::new(id).expect("valid id pattern"),
                }
            })
            .collect();

        FieldLocator { lookups }
    }

    fn lookup(&self, field: PageField) -> &FieldLookup {
        self.lookups
            .iter()
            .find(|lookup| lookup.field == field)
            .expect("every field has a lookup")
    }

    /// First element for `field` in document order.
    pub fn find<'a>(&self, document: &'a Html, field: PageField) -> Option<ElementRef<'a>> {
        let lookup = self.lookup(field);
        document
            .select(&lookup.selector)
            .find(|el| Self::id_matches(lookup, el))
    }

    pub fn find_all<'a>(&self, document: &'a Html, field: PageField) -> Vec<ElementRef<'a>> {
        let lookup = self.lookup(field);
        document
            .select(&lookup.selector)
            .filter(|el| Self::id_matches(lookup, el))
            .collect()
    }

    /// Like [`FieldLocator::find`], scoped to the descendants of `fragment`.
    pub fn find_in<'a>(&self, fragment: ElementRef<'a>, field: PageField) -> Option<ElementRef<'a>> {
        let lookup = self.lookup(field);
        fragment
            .select(&lookup.selector)
            .find(|el| Self::id_matches(lookup, el))
    }

    fn id_matches(lookup: &FieldLookup, el: &ElementRef) -> bool {
        el.value()
            .attr("id")
            .map(|id| lookup.id.is_match(id))
            .unwrap_or(false)
    }
}

impl Default for FieldLocator {
    fn default() -> Self {
        Self::new()
    }
}
