use std::collections::HashMap;
use std::sync::Mutex;

/// Read-and-act capability over one rendered page. The controller only
/// ever talks to the page through this trait, so the whole flow runs
/// against [`FakePage`] in tests.
///
/// Selector arguments are comma-separated candidate lists; the first
/// visible match wins. Methods that act return whether a target was
/// found, and finding none is an ordinary outcome, not an error.
pub trait PageAccessor: Send + Sync {
    fn url(&self) -> String;

    fn hostname(&self) -> String;

    /// Full visible text of the page body.
    fn body_text(&self) -> String;

    fn is_visible(&self, selectors: &str) -> bool;

    /// Fill the first visible match with `value`.
    fn fill(&self, selectors: &str, value: &str) -> bool;

    /// Click the first visible, enabled match.
    fn click(&self, selectors: &str) -> bool;

    /// Click the first visible, enabled button whose label contains
    /// `needle`. Fallback for pages that carry none of the known
    /// selectors.
    fn click_button_with_text(&self, needle: &str) -> bool;
}

#[derive(Debug, Clone, Default)]
pub struct FakeElement {
    pub visible: bool,
    pub enabled: bool,
    pub is_button: bool,
    pub text: String,
    pub value: String,
    pub fill_count: u32,
    pub click_count: u32,
}

/// In-memory page for tests. Elements are registered under the exact
/// selector string they should answer to.
pub struct FakePage {
    inner: Mutex<Inner>,
}

struct Inner {
    url: String,
    hostname: String,
    body_text: String,
    elements: HashMap<String, FakeElement>,
}

impl FakePage {
    pub fn new(url: &str, hostname: &str, body_text: &str) -> Self {
        Self {
            inner: Mutex::new(Inner {
                url: url.to_string(),
                hostname: hostname.to_string(),
                body_text: body_text.to_string(),
                elements: HashMap::new(),
            }),
        }
    }

    pub fn add_input(&self, selector: &str) {
        self.inner.lock().unwrap().elements.insert(
            selector.to_string(),
            FakeElement {
                visible: true,
                enabled: true,
                ..FakeElement::default()
            },
        );
    }

    pub fn add_button(&self, selector: &str, label: &str) {
        self.inner.lock().unwrap().elements.insert(
            selector.to_string(),
            FakeElement {
                visible: true,
                enabled: true,
                is_button: true,
                text: label.to_string(),
                ..FakeElement::default()
            },
        );
    }

    pub fn remove_element(&self, selector: &str) {
        self.inner.lock().unwrap().elements.remove(selector);
    }

    pub fn set_url(&self, url: &str) {
        self.inner.lock().unwrap().url = url.to_string();
    }

    pub fn set_body_text(&self, text: &str) {
        self.inner.lock().unwrap().body_text = text.to_string();
    }

    /// Snapshot of a registered element, for assertions.
    pub fn element(&self, selector: &str) -> Option<FakeElement> {
        self.inner.lock().unwrap().elements.get(selector).cloned()
    }
}

fn candidates(selectors: &str) -> impl Iterator<Item = &str> {
    selectors.split(',').map(str::trim)
}

impl PageAccessor for FakePage {
    fn url(&self) -> String {
        self.inner.lock().unwrap().url.clone()
    }

    fn hostname(&self) -> String {
        self.inner.lock().unwrap().hostname.clone()
    }

    fn body_text(&self) -> String {
        self.inner.lock().unwrap().body_text.clone()
    }

    fn is_visible(&self, selectors: &str) -> bool {
        let inner = self.inner.lock().unwrap();
        candidates(selectors).any(|s| inner.elements.get(s).map(|e| e.visible).unwrap_or(false))
    }

    fn fill(&self, selectors: &str, value: &str) -> bool {
        let mut inner = self.inner.lock().unwrap();
        for selector in candidates(selectors) {
            if let Some(element) = inner.elements.get_mut(selector) {
                if element.visible {
                    element.value = value.to_string();
                    element.fill_count += 1;
                    return true;
                }
            }
        }
        false
    }

    fn click(&self, selectors: &str) -> bool {
        let mut inner = self.inner.lock().unwrap();
        for selector in candidates(selectors) {
            if let Some(element) = inner.elements.get_mut(selector) {
                if element.visible && element.enabled {
                    element.click_count += 1;
                    return true;
                }
            }
        }
        false
    }

    fn click_button_with_text(&self, needle: &str) -> bool {
        let mut inner = self.inner.lock().unwrap();
        for element in inner.elements.values_mut() {
            if element.is_button
                && element.visible
                && element.enabled
                && element.text.contains(needle)
            {
                element.click_count += 1;
                return true;
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fill_picks_first_visible_candidate() {
        let page = FakePage::new("https://x", "x", "");
        page.add_input(r#"input[name="email"]"#);

        assert!(page.fill(r#"input[name="missing"], input[name="email"]"#, "a@b.c"));
        let element = page.element(r#"input[name="email"]"#).unwrap();
        assert_eq!(element.value, "a@b.c");
        assert_eq!(element.fill_count, 1);
    }

    #[test]
    fn test_click_by_text_requires_button() {
        let page = FakePage::new("https://x", "x", "");
        page.add_input("input.confirm");
        assert!(!page.click_button_with_text("Confirm"));

        page.add_button("button.confirm", "Confirm and continue");
        assert!(page.click_button_with_text("Confirm"));
    }
}
