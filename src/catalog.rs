//! The read-only product catalog and the listing filter.
//!
//! The listing page keeps its filter in the URL: `?mainCategory=INTERIOR&category=Living+Room`. [`CatalogFilter`]
//! reads such a query string, produces a new one when the filter changes, and selects the matching products. Both
//! predicates are optional; when both are given a product has to satisfy both.

use std::collections::HashSet;
use std::path::Path;
use tracing::debug;
use tracing::instrument;
use url::form_urlencoded;

use crate::error::Result;
use crate::error::StoreError;
use crate::types::Product;
use crate::types::ProductId;
use crate::types::Section;

pub const CATEGORY_PARAM: &str = "category";
pub const MAIN_CATEGORY_PARAM: &str = "mainCategory";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogFilter {
    main_category: Option<String>,
    category:      Option<String>,
}

impl CatalogFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse the filter out of a URL query string. A leading `?` is accepted, unrelated parameters are ignored and the
    /// first occurrence of a repeated parameter wins.
    pub fn from_query(query: &str) -> Self {
        let query = query.strip_prefix('?').unwrap_or(query);
        let mut main_category = None;
        let mut category = None;

        for (name, value) in form_urlencoded::parse(query.as_bytes()) {
            let slot = match name.as_ref() {
                CATEGORY_PARAM => &mut category,
                MAIN_CATEGORY_PARAM => &mut main_category,
                _ => continue,
            };
            // An empty first value still shadows the later ones.
            slot.get_or_insert_with(|| value.into_owned());
        }

        Self {
            main_category: main_category.and_then(non_empty),
            category:      category.and_then(non_empty),
        }
    }

    pub fn with_main_category<S: Into<String>>(mut self, main_category: Option<S>) -> Self {
        self.main_category = main_category.and_then(|s| non_empty(s.into()));
        self
    }

    pub fn with_category<S: Into<String>>(mut self, category: Option<S>) -> Self {
        self.category = category.and_then(|s| non_empty(s.into()));
        self
    }

    pub fn main_category(&self) -> Option<&str> {
        self.main_category.as_deref()
    }

    pub fn category(&self) -> Option<&str> {
        self.category.as_deref()
    }

    pub fn is_empty(&self) -> bool {
        self.main_category.is_none() && self.category.is_none()
    }

    pub fn matches(&self, product: &Product) -> bool {
        self.main_category.as_ref().is_none_or(|mc| *mc == product.main_category)
            && self.category.as_ref().is_none_or(|c| *c == product.category)
    }

    /// The query string for this filter, without the leading `?`. Empty when nothing is filtered.
    pub fn to_query(&self) -> String {
        let mut serializer = form_urlencoded::Serializer::new(String::new());
        if let Some(ref mc) = self.main_category {
            serializer.append_pair(MAIN_CATEGORY_PARAM, mc);
        }
        if let Some(ref c) = self.category {
            serializer.append_pair(CATEGORY_PARAM, c);
        }
        serializer.finish()
    }

    /// A link to `path` carrying this filter. This is what gets pushed into the history when the filter changes.
    pub fn href(&self, path: &str) -> String {
        let query = self.to_query();
        if query.is_empty() {
            path.to_string()
        }
        else {
            format!("{path}?{query}")
        }
    }
}

fn non_empty(s: String) -> Option<String> {
    if s.is_empty() {
        None
    }
    else {
        Some(s)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Catalog {
    products: Vec<Product>,
    sections: Vec<Section>,
}

impl Catalog {
    /// The products are taken as is; [`from_json`](Self::from_json) is the validating constructor.
    pub fn new(products: Vec<Product>) -> Self {
        Self {
            products,
            sections: Section::defaults(),
        }
    }

    pub fn with_sections(mut self, sections: Vec<Section>) -> Self {
        self.sections = sections;
        self
    }

    /// Build a catalog from a JSON array of products. Product ids must be unique and prices finite and non-negative.
    pub fn from_json(json: &str) -> Result<Self> {
        let products: Vec<Product> = serde_json::from_str(json)?;
        validate(&products)?;
        Ok(Self::new(products))
    }

    #[instrument(level = "debug", skip(path), fields(path = %path.as_ref().display()))]
    pub async fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = tokio::fs::read_to_string(path.as_ref()).await?;
        let catalog = Self::from_json(&json)?;
        debug!("Loaded {} products", catalog.len());
        Ok(catalog)
    }

    pub fn products(&self) -> &[Product] {
        &self.products
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    pub fn len(&self) -> usize {
        self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }

    pub fn find(&self, id: ProductId) -> Option<&Product> {
        self.products.iter().find(|p| p.id == id)
    }

    /// Products matching the filter, in catalog order.
    pub fn filter<'a>(&'a self, filter: &'a CatalogFilter) -> impl Iterator<Item = &'a Product> + 'a {
        self.products.iter().filter(move |p| filter.matches(p))
    }

    pub fn filter_query(&self, query: &str) -> Vec<&Product> {
        let filter = CatalogFilter::from_query(query);
        self.products.iter().filter(|p| filter.matches(p)).collect()
    }

    pub fn main_categories(&self) -> Vec<&str> {
        self.sections.iter().map(|s| s.label.as_str()).collect()
    }

    pub fn categories_of(&self, main_category: &str) -> Option<&[String]> {
        self.sections
            .iter()
            .find(|s| s.label == main_category)
            .map(|s| s.categories.as_slice())
    }
}

fn validate(products: &[Product]) -> Result<()> {
    let mut seen = HashSet::with_capacity(products.len());
    for product in products {
        if !seen.insert(product.id) {
            return Err(StoreError::DuplicateProduct(product.id));
        }
        if !product.price.is_finite() || product.price < 0.0 {
            return Err(StoreError::InvalidPrice(product.id));
        }
    }
    Ok(())
}
