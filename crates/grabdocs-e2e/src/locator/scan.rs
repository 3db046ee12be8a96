// Bounded keyword scan
//
// When no candidate list matches, flows fall back to walking the interactive
// elements of the page and reading their labels. The walk never inspects more
// than `cap` elements.

use super::Resolver;
use crate::surface::{Surface, Target};

/// Interactive elements most fallbacks walk
pub const INTERACTIVE_ROOTS: &[&str] = &["button", "[role=\"button\"]", "a"];

/// Default number of elements inspected per scan
pub const DEFAULT_CAP: usize = 30;

/// One way a label can match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeywordRule {
    /// Label contains the keyword
    Contains(String),
    /// Label contains every keyword
    AllOf(Vec<String>),
    /// Visible text equals the keyword
    Exact(String),
    /// Visible text is a positive integer (calendar day cells)
    PositiveNumber,
}

impl KeywordRule {
    pub fn contains(keyword: &str) -> Self {
        KeywordRule::Contains(keyword.to_lowercase())
    }

    pub fn all_of(keywords: &[&str]) -> Self {
        KeywordRule::AllOf(keywords.iter().map(|k| k.to_lowercase()).collect())
    }

    pub fn exact(text: &str) -> Self {
        KeywordRule::Exact(text.to_lowercase())
    }

    fn matches(&self, label: &ElementLabel) -> bool {
        let combined = label.combined();
        match self {
            KeywordRule::Contains(k) => combined.contains(k.as_str()),
            KeywordRule::AllOf(ks) => ks.iter().all(|k| combined.contains(k.as_str())),
            KeywordRule::Exact(k) => label.text.trim().to_lowercase() == *k,
            KeywordRule::PositiveNumber => label
                .text
                .trim()
                .parse::<u32>()
                .map(|n| n > 0)
                .unwrap_or(false),
        }
    }
}

/// The readable parts of one element
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ElementLabel {
    pub text: String,
    pub aria_label: String,
    pub title: String,
}

impl ElementLabel {
    /// Lower-cased text, aria-label and title joined by spaces
    pub fn combined(&self) -> String {
        [&self.text, &self.aria_label, &self.title]
            .iter()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase()
    }
}

/// Whether any rule matches. No rules means every label matches.
pub fn label_matches(label: &ElementLabel, rules: &[KeywordRule]) -> bool {
    rules.is_empty() || rules.iter().any(|rule| rule.matches(label))
}

/// Whether the label contains any excluded keyword
pub fn label_excluded(label: &ElementLabel, excluded: &[String]) -> bool {
    let combined = label.combined();
    excluded.iter().any(|k| combined.contains(k.as_str()))
}

/// Walks up to `cap` elements and returns the first visible one whose label matches.
#[derive(Debug, Clone)]
pub struct KeywordScan {
    roots: Vec<String>,
    keywords: Vec<KeywordRule>,
    cap: usize,
    exclude_types: Vec<String>,
    exclude_keywords: Vec<String>,
    within: Option<Target>,
}

impl KeywordScan {
    pub fn new<I, S>(roots: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            roots: roots.into_iter().map(Into::into).collect(),
            keywords: Vec::new(),
            cap: DEFAULT_CAP,
            exclude_types: Vec::new(),
            exclude_keywords: Vec::new(),
            within: None,
        }
    }

    /// Scan over buttons, role buttons and anchors
    pub fn interactive() -> Self {
        Self::new(INTERACTIVE_ROOTS.iter().copied())
    }

    /// Adds one `Contains` rule per keyword
    pub fn keywords(mut self, keywords: &[&str]) -> Self {
        self.keywords
            .extend(keywords.iter().map(|k| KeywordRule::contains(k)));
        self
    }

    pub fn rule(mut self, rule: KeywordRule) -> Self {
        self.keywords.push(rule);
        self
    }

    pub fn cap(mut self, cap: usize) -> Self {
        self.cap = cap;
        self
    }

    /// Skips elements whose `type` attribute is one of `types` (e.g. `submit`)
    pub fn exclude_types(mut self, types: &[&str]) -> Self {
        self.exclude_types = types.iter().map(|t| t.to_lowercase()).collect();
        self
    }

    /// Skips elements whose label contains any of `keywords` (e.g. `cancel`)
    pub fn exclude_keywords(mut self, keywords: &[&str]) -> Self {
        self.exclude_keywords = keywords.iter().map(|k| k.to_lowercase()).collect();
        self
    }

    /// Restricts the scan to a container's subtree
    pub fn within(mut self, container: Target) -> Self {
        self.within = Some(container);
        self
    }

    /// Most elements one scan inspects
    pub fn max_elements(&self) -> usize {
        self.cap
    }

    /// Returns the first visible matching element, or `None` once the cap is spent.
    pub async fn find(&self, surface: &dyn Surface, resolver: &Resolver) -> Option<Target> {
        let mut inspected = 0usize;

        for root in &self.roots {
            if inspected >= self.cap {
                break;
            }
            let base = match &self.within {
                Some(container) => container.within(root),
                None => Target::main(root.as_str()),
            };
            let count = surface.count(&base).await.unwrap_or(0);
            let budget = count.min(self.cap - inspected);

            for index in 0..budget {
                inspected += 1;
                let element = base.nth(index);
                if !resolver.probe(surface, &element).await {
                    continue;
                }
                if self.is_excluded(surface, &element).await {
                    continue;
                }
                let label = read_label(surface, &element).await;
                if label_excluded(&label, &self.exclude_keywords) {
                    continue;
                }
                if label_matches(&label, &self.keywords) {
                    tracing::debug!("Keyword scan matched {} ('{}')", element, label.combined());
                    return Some(element);
                }
            }
        }

        tracing::debug!(
            "Keyword scan over {} found nothing after {} elements",
            self.roots.join(", "),
            inspected
        );
        None
    }

    async fn is_excluded(&self, surface: &dyn Surface, element: &Target) -> bool {
        if self.exclude_types.is_empty() {
            return false;
        }
        match surface.attribute(element, "type").await {
            Ok(Some(kind)) => self.exclude_types.contains(&kind.to_lowercase()),
            _ => false,
        }
    }
}

async fn read_label(surface: &dyn Surface, element: &Target) -> ElementLabel {
    ElementLabel {
        text: surface
            .text_content(element)
            .await
            .ok()
            .flatten()
            .unwrap_or_default(),
        aria_label: read_attribute(surface, element, "aria-label").await,
        title: read_attribute(surface, element, "title").await,
    }
}

async fn read_attribute(surface: &dyn Surface, element: &Target, name: &str) -> String {
    surface
        .attribute(element, name)
        .await
        .ok()
        .flatten()
        .unwrap_or_default()
}
