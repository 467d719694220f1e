//! Minimal element tree with subtree-insertion observers.
//!
//! This is the platform boundary for markup watching: a host that renders
//! markup drives insertions through [`Document::append`] /
//! [`Document::append_to`], and observers see every inserted subtree before
//! it becomes part of the document. Outside such a host nothing is observed.

use std::sync::Arc;

/// An element and its subtree.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Element {
    pub tag: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<Element>,
    pub text: Option<String>,
}

impl Element {
    pub fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_ascii_lowercase(),
            ..Self::default()
        }
    }

    pub fn attr(mut self, name: &str, value: &str) -> Self {
        self.attributes
            .push((name.to_ascii_lowercase(), value.to_string()));
        self
    }

    pub fn child(mut self, child: Element) -> Self {
        self.children.push(child);
        self
    }

    pub fn with_text(mut self, text: &str) -> Self {
        self.text = Some(text.to_string());
        self
    }

    pub fn get_attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn has_attr(&self, name: &str) -> bool {
        self.get_attr(name).is_some()
    }

    /// Depth-first search of this element and its descendants.
    pub fn find(&self, pred: &dyn Fn(&Element) -> bool) -> Option<&Element> {
        if pred(self) {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find(pred))
    }

    /// First element in the subtree with `id`.
    pub fn find_by_id(&self, id: &str) -> Option<&Element> {
        self.find(&|e: &Element| e.get_attr("id") == Some(id))
    }

    /// Number of elements in the subtree with `tag`.
    pub fn count_tag(&self, tag: &str) -> usize {
        let own = usize::from(self.tag.eq_ignore_ascii_case(tag));
        own + self.children.iter().map(|c| c.count_tag(tag)).sum::<usize>()
    }
}

/// What should happen to an inserted subtree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Keep,
    Remove,
}

/// Receives every subtree inserted into a [`Document`].
///
/// Observers may mutate the subtree (e.g. strip attributes or drop
/// descendants) and may veto the insertion of its root.
pub trait SubtreeObserver: Send + Sync {
    fn on_insert(&self, node: &mut Element) -> Disposition;
}

/// A document root with observers.
pub struct Document {
    root: Element,
    observers: Vec<Arc<dyn SubtreeObserver>>,
}

impl Document {
    pub fn new() -> Self {
        Self {
            root: Element::new("body"),
            observers: Vec::new(),
        }
    }

    pub fn observe(&mut self, observer: Arc<dyn SubtreeObserver>) {
        self.observers.push(observer);
    }

    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    pub fn root(&self) -> &Element {
        &self.root
    }

    /// Insert under the root. Returns false if an observer removed it.
    pub fn append(&mut self, element: Element) -> bool {
        match self.admit(element) {
            Some(element) => {
                self.root.children.push(element);
                true
            }
            None => false,
        }
    }

    /// Insert under the first element with `parent_id`. Returns false if the
    /// parent does not exist or an observer removed the subtree.
    pub fn append_to(&mut self, parent_id: &str, element: Element) -> bool {
        if self.root.find_by_id(parent_id).is_none() {
            return false;
        }
        let Some(element) = self.admit(element) else {
            return false;
        };
        match find_by_id_mut(&mut self.root, parent_id) {
            Some(parent) => {
                parent.children.push(element);
                true
            }
            None => false,
        }
    }

    fn admit(&self, mut element: Element) -> Option<Element> {
        for observer in &self.observers {
            if observer.on_insert(&mut element) == Disposition::Remove {
                return None;
            }
        }
        Some(element)
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

fn find_by_id_mut<'a>(node: &'a mut Element, id: &str) -> Option<&'a mut Element> {
    if node.get_attr("id") == Some(id) {
        return Some(node);
    }
    node.children
        .iter_mut()
        .find_map(|child| find_by_id_mut(child, id))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct RejectTag(&'static str);

    impl SubtreeObserver for RejectTag {
        fn on_insert(&self, node: &mut Element) -> Disposition {
            if node.tag == self.0 {
                Disposition::Remove
            } else {
                Disposition::Keep
            }
        }
    }

    #[test]
    fn test_append_without_observers() {
        let mut doc = Document::new();
        assert!(doc.append(Element::new("DIV").attr("ID", "main")));
        assert!(doc.append_to("main", Element::new("p").with_text("hi")));
        assert!(!doc.append_to("missing", Element::new("p")));

        let main = doc.root().find_by_id("main").unwrap();
        assert_eq!(main.tag, "div");
        assert_eq!(main.children[0].text.as_deref(), Some("hi"));
    }

    #[test]
    fn test_observer_can_veto() {
        let mut doc = Document::new();
        doc.observe(Arc::new(RejectTag("marquee")));

        assert!(!doc.append(Element::new("marquee")));
        assert!(doc.append(Element::new("div")));
        assert_eq!(doc.root().count_tag("marquee"), 0);
        assert_eq!(doc.root().count_tag("div"), 1);
    }
}
