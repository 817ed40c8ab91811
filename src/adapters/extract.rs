//! Selector-map driven item extraction
//!
//! This module handles:
//! - Compiling a [`SelectorMap`] into parsed CSS selectors once per adapter
//! - Picking the container selector from its fallback chain
//! - Pulling each field out of a container through its own fallback chain
//!
//! Parsing is synchronous; `scraper::Html` is not `Send`, so callers must not
//! hold a parsed document across an `.await`.

use crate::config::{SelectorChain, SelectorMap};
use crate::model::RawRecord;
use crate::normalize::{clean_product_name, clean_text, join_href};
use crate::ConfigError;
use scraper::{ElementRef, Html, Selector};
use url::Url;

/// A fallback chain with every selector already parsed
#[derive(Debug, Clone)]
struct CompiledChain(Vec<Selector>);

impl CompiledChain {
    fn compile(chain: &SelectorChain) -> Result<Self, ConfigError> {
        let selectors = chain
            .iter()
            .filter(|s| !s.trim().is_empty())
            .map(|s| {
                Selector::parse(s).map_err(|e| ConfigError::InvalidSelector {
                    selector: s.to_string(),
                    message: format!("{:?}", e),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self(selectors))
    }

    /// First non-empty value produced by `read` across the chain
    fn first_value<F>(&self, scope: ElementRef<'_>, read: F) -> Option<String>
    where
        F: Fn(ElementRef<'_>) -> Option<String>,
    {
        self.0
            .iter()
            .flat_map(|selector| scope.select(selector))
            .find_map(read)
    }
}

/// Parsed selectors for every field of the item model
#[derive(Debug, Clone)]
pub struct CompiledSelectors {
    container: CompiledChain,
    name: CompiledChain,
    price: CompiledChain,
    link: CompiledChain,
    image: CompiledChain,
    availability: CompiledChain,
    condition: CompiledChain,
}

impl CompiledSelectors {
    pub fn compile(map: &SelectorMap) -> Result<Self, ConfigError> {
        Ok(Self {
            container: CompiledChain::compile(&map.container)?,
            name: CompiledChain::compile(&map.name)?,
            price: CompiledChain::compile(&map.price)?,
            link: CompiledChain::compile(&map.link)?,
            image: CompiledChain::compile(&map.image)?,
            availability: CompiledChain::compile(&map.availability)?,
            condition: CompiledChain::compile(&map.condition)?,
        })
    }
}

/// Items found on one listing page
#[derive(Debug, Default)]
pub struct PageExtraction {
    /// Containers matched, including ones later dropped
    pub containers: usize,
    /// Items that carried both a name and a link
    pub items: Vec<RawRecord>,
}

/// Extracts one raw record per container on a listing page
///
/// # Arguments
///
/// * `html` - The page body
/// * `page_url` - Final URL of the page, used to resolve relative hrefs
/// * `selectors` - Compiled selector map
/// * `page` - Page number stamped on every record
///
/// Containers without a name or a resolvable link are dropped. A name made
/// only of listing badges ("New Listing") does not count as a name. Each
/// record carries its 1-based position among the page's containers.
pub fn extract_items(
    html: &str,
    page_url: &Url,
    selectors: &CompiledSelectors,
    page: u32,
) -> PageExtraction {
    let document = Html::parse_document(html);

    let containers: Vec<ElementRef<'_>> = selectors
        .container
        .0
        .iter()
        .map(|selector| document.select(selector).collect::<Vec<_>>())
        .find(|matched| !matched.is_empty())
        .unwrap_or_default();

    let items = containers
        .iter()
        .zip(1u32..)
        .filter_map(|(container, position)| {
            extract_item(*container, page_url, selectors, page, position)
        })
        .collect();

    PageExtraction {
        containers: containers.len(),
        items,
    }
}

fn extract_item(
    container: ElementRef<'_>,
    page_url: &Url,
    selectors: &CompiledSelectors,
    page: u32,
    position: u32,
) -> Option<RawRecord> {
    // Listing titles are often truncated in text but complete in `title`
    let name = selectors.name.first_value(container, |el| {
        el.value()
            .attr("title")
            .and_then(clean_text)
            .or_else(|| element_text(el))
            .filter(|name| clean_product_name(name).is_some())
    })?;

    let link = selectors.link.first_value(container, |el| {
        el.value()
            .attr("href")
            .and_then(|href| join_href(page_url, href))
    })?;

    let image = selectors.image.first_value(container, |el| {
        el.value()
            .attr("src")
            .or_else(|| el.value().attr("data-src"))
            .and_then(|src| join_href(page_url, src))
    });

    Some(RawRecord {
        name: Some(name),
        price_raw: selectors.price.first_value(container, element_text),
        link: Some(link),
        image,
        availability_raw: selectors.availability.first_value(container, element_text),
        condition: selectors.condition.first_value(container, element_text),
        page,
        position,
    })
}

fn element_text(el: ElementRef<'_>) -> Option<String> {
    clean_text(&el.text().collect::<String>())
}
