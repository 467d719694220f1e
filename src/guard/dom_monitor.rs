//! Runtime scrubbing of inserted markup.

use std::sync::Arc;

use crate::clock::Clock;
use crate::dom::{Disposition, Element, SubtreeObserver};
use crate::observability::{SecurityEvent, SecurityEventKind, SecuritySink, Severity};

/// Elements removed outright when inserted.
pub const DANGEROUS_TAGS: [&str; 8] = [
    "script", "iframe", "object", "embed", "applet", "frame", "frameset", "base",
];

/// Common inline event handlers. Any `on*` attribute is treated as a handler
/// and stripped, not only these.
pub const DANGEROUS_ATTRIBUTES: [&str; 18] = [
    "onabort",
    "onanimationstart",
    "onblur",
    "onchange",
    "onclick",
    "ondblclick",
    "onerror",
    "onfocus",
    "oninput",
    "onkeydown",
    "onkeypress",
    "onkeyup",
    "onload",
    "onmousedown",
    "onmouseout",
    "onmouseover",
    "onmouseup",
    "onsubmit",
];

pub fn is_dangerous_tag(tag: &str) -> bool {
    DANGEROUS_TAGS.iter().any(|t| t.eq_ignore_ascii_case(tag))
}

pub fn is_dangerous_attribute(name: &str) -> bool {
    name.len() > 2
        && name
            .get(..2)
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case("on"))
}

/// Observer that removes dangerous elements and strips inline handlers
/// anywhere in an inserted subtree.
pub struct DomMonitor {
    sink: Arc<dyn SecuritySink>,
    clock: Arc<dyn Clock>,
}

impl DomMonitor {
    pub fn new(sink: Arc<dyn SecuritySink>, clock: Arc<dyn Clock>) -> Self {
        Self { sink, clock }
    }

    fn report_element(&self, element: &Element) {
        let event = SecurityEvent::new(
            SecurityEventKind::DangerousElementRemoved,
            Severity::Warning,
            self.clock.wall(),
        )
        .with("tag", element.tag.clone());
        self.sink.emit(&event);
    }

    fn report_attribute(&self, element: &Element, attribute: &str) {
        let event = SecurityEvent::new(
            SecurityEventKind::DangerousAttributeRemoved,
            Severity::Warning,
            self.clock.wall(),
        )
        .with("tag", element.tag.clone())
        .with("attribute", attribute);
        self.sink.emit(&event);
    }

    fn scrub(&self, element: &mut Element) {
        let mut stripped = Vec::new();
        element.attributes.retain(|(name, _)| {
            if is_dangerous_attribute(name) {
                stripped.push(name.clone());
                false
            } else {
                true
            }
        });
        for name in &stripped {
            self.report_attribute(element, name);
        }

        let mut kept = Vec::with_capacity(element.children.len());
        for child in element.children.drain(..) {
            if is_dangerous_tag(&child.tag) {
                self.report_element(&child);
            } else {
                kept.push(child);
            }
        }
        for child in &mut kept {
            self.scrub(child);
        }
        element.children = kept;
    }
}

impl SubtreeObserver for DomMonitor {
    fn on_insert(&self, node: &mut Element) -> Disposition {
        if is_dangerous_tag(&node.tag) {
            self.report_element(node);
            return Disposition::Remove;
        }
        self.scrub(node);
        Disposition::Keep
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use crate::dom::Document;
    use crate::observability::MemorySink;

    fn document() -> (Document, Arc<MemorySink>) {
        let sink = Arc::new(MemorySink::new());
        let mut doc = Document::new();
        doc.observe(Arc::new(DomMonitor::new(sink.clone(), Arc::new(SystemClock))));
        (doc, sink)
    }

    #[test]
    fn test_dangerous_root_is_removed() {
        let (mut doc, sink) = document();
        assert!(!doc.append(Element::new("SCRIPT").with_text("alert(1)")));
        assert_eq!(doc.root().count_tag("script"), 0);
        assert_eq!(sink.count(SecurityEventKind::DangerousElementRemoved), 1);
    }

    #[test]
    fn test_handler_attribute_stripped_element_kept() {
        let (mut doc, sink) = document();
        let img = Element::new("img")
            .attr("id", "avatar")
            .attr("src", "/a.png")
            .attr("onError", "alert(1)");
        assert!(doc.append(img));

        let img = doc.root().find_by_id("avatar").unwrap();
        assert!(!img.has_attr("onerror"));
        assert_eq!(img.get_attr("src"), Some("/a.png"));
        let events = sink.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].details["attribute"], "onerror");
    }

    #[test]
    fn test_nested_subtree_is_scrubbed() {
        let (mut doc, sink) = document();
        let widget = Element::new("div")
            .attr("id", "widget")
            .child(Element::new("iframe").attr("src", "https://evil.example.net"))
            .child(
                Element::new("p")
                    .attr("id", "caption")
                    .attr("onclick", "steal()")
                    .child(Element::new("object")),
            );
        assert!(doc.append(widget));

        let root = doc.root();
        assert_eq!(root.count_tag("iframe"), 0);
        assert_eq!(root.count_tag("object"), 0);
        assert_eq!(root.count_tag("p"), 1);
        assert!(!root.find_by_id("caption").unwrap().has_attr("onclick"));
        assert_eq!(sink.count(SecurityEventKind::DangerousElementRemoved), 2);
        assert_eq!(sink.count(SecurityEventKind::DangerousAttributeRemoved), 1);
    }

    #[test]
    fn test_any_on_prefixed_attribute_is_stripped() {
        let (mut doc, sink) = document();
        let details = Element::new("details")
            .attr("id", "d")
            .attr("open", "")
            .attr("ontoggle", "steal()")
            .attr("onpointerdown", "x()")
            .attr("OnWheel", "y()");
        assert!(doc.append(details));

        let details = doc.root().find_by_id("d").unwrap();
        assert!(!details.has_attr("ontoggle"));
        assert!(!details.has_attr("onpointerdown"));
        assert!(!details.has_attr("onwheel"));
        assert!(details.has_attr("open"));
        assert_eq!(sink.count(SecurityEventKind::DangerousAttributeRemoved), 3);
    }

    #[test]
    fn test_attribute_classification() {
        for name in DANGEROUS_ATTRIBUTES {
            assert!(is_dangerous_attribute(name));
        }
        assert!(is_dangerous_attribute("onfocusin"));
        assert!(is_dangerous_attribute("ONBEFOREINPUT"));
        assert!(!is_dangerous_attribute("on"));
        assert!(!is_dangerous_attribute("open"));
        assert!(!is_dangerous_attribute("class"));
        assert!(!is_dangerous_attribute("ö"));
    }

    #[test]
    fn test_safe_markup_untouched() {
        let (mut doc, sink) = document();
        let form = Element::new("form")
            .attr("id", "f")
            .child(Element::new("input").attr("name", "email").attr("type", "email"));
        let expected = form.clone();
        assert!(doc.append(form));
        assert_eq!(doc.root().find_by_id("f"), Some(&expected));
        assert!(sink.events().is_empty());
    }
}
