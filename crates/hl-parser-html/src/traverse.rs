use hl_core::HintResult;
use hl_dom::Document;
use hl_dom::Element;
use hl_events::Event;
use hl_events::EventBus;

/// Depth-first walk that reports every element on a bus.
///
/// Each element yields `element::<tag>` then `traverse::down`, its subtree,
/// then `traverse::up`; the walk is bracketed by `traverse::start` and
/// `traverse::end`. Elements without children still get a down/up pair.
#[derive(Debug, Default, Clone, Copy)]
pub struct Walker;

impl Walker {
    pub fn walk(&self, document: &Document, resource: &str, bus: &EventBus) -> HintResult<()> {
        bus.emit(&Event::TraverseStart { resource })?;

        let root = document.root();
        let mut visited = 1_usize;
        enter(root, resource, bus)?;

        let mut stack = vec![(root, root.children())];
        while let Some((element, children)) = stack.last_mut() {
            if let Some(child) = children.next() {
                enter(child, resource, bus)?;
                visited += 1;
                stack.push((child, child.children()));
                continue;
            }

            bus.emit(&Event::TraverseUp {
                resource,
                element: *element,
            })?;
            stack.pop();
        }

        bus.emit(&Event::TraverseEnd { resource })?;
        log::debug!("traversed {visited} elements of {resource}");
        Ok(())
    }
}

fn enter(element: Element<'_>, resource: &str, bus: &EventBus) -> HintResult<()> {
    bus.emit(&Event::Element { resource, element })?;
    bus.emit(&Event::TraverseDown { resource, element })
}

#[cfg(test)]
mod tests {
    use super::Walker;
    use hl_dom::Document;
    use hl_events::EventBus;
    use hl_events::EventFilter;
    use scraper::Html;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn walk(source: &str) -> Vec<String> {
        let document = Document::new(Html::parse_document(source));
        let bus = EventBus::default();
        let names = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&names);
        let added = bus.on(EventFilter::All, move |event| {
            sink.borrow_mut().push(event.name());
            Ok(())
        });
        assert!(added.is_ok());
        assert!(Walker.walk(&document, "test.html", &bus).is_ok());
        names.take()
    }

    #[test]
    fn every_element_gets_a_down_up_pair() {
        assert_eq!(
            walk("<p><b>x</b><i></i></p>"),
            vec![
                "traverse::start",
                "element::html",
                "traverse::down",
                "element::head",
                "traverse::down",
                "traverse::up",
                "element::body",
                "traverse::down",
                "element::p",
                "traverse::down",
                "element::b",
                "traverse::down",
                "traverse::up",
                "element::i",
                "traverse::down",
                "traverse::up",
                "traverse::up",
                "traverse::up",
                "traverse::up",
                "traverse::end",
            ]
        );
    }

    #[test]
    fn foreign_elements_use_lower_case_names() {
        let names = walk("<svg><clipPath></clipPath><foreignObject></foreignObject></svg><math><mi>x</mi></math>");
        let elements: Vec<_> = names
            .iter()
            .filter(|name| name.starts_with("element::"))
            .map(String::as_str)
            .collect();
        assert_eq!(
            elements,
            vec![
                "element::html",
                "element::head",
                "element::body",
                "element::svg",
                "element::clippath",
                "element::foreignobject",
                "element::math",
                "element::mi",
            ]
        );
    }

    #[test]
    fn deep_documents_stay_balanced() {
        let source = "<div>".repeat(500);
        let names = walk(&source);
        let count = |wanted: &str| names.iter().filter(|name| *name == wanted).count();
        assert_eq!(count("element::div"), 500);
        assert_eq!(count("traverse::down"), 503);
        assert_eq!(count("traverse::up"), 503);
    }
}
