//! Typed event bus shared by Hintline plugins.
//!
//! Events borrow their payloads, so a handler may only inspect a document
//! for the duration of the call that delivered it.

use hl_core::HintError;
use hl_core::HintResult;
use hl_dom::Element;
use hl_js::Window;
use std::cell::Cell;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

const MAX_LISTENERS_CEILING: usize = 65_536;

/// Resource category derived from a response media type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceType {
    Html,
    Css,
    Script,
    Image,
    Json,
    Xml,
    Txt,
    Unknown,
}

impl ResourceType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Html => "html",
            Self::Css => "css",
            Self::Script => "script",
            Self::Image => "image",
            Self::Json => "json",
            Self::Xml => "xml",
            Self::Txt => "txt",
            Self::Unknown => "unknown",
        }
    }

    pub fn from_name(value: &str) -> Option<Self> {
        match value {
            "html" => Some(Self::Html),
            "css" => Some(Self::Css),
            "script" => Some(Self::Script),
            "image" => Some(Self::Image),
            "json" => Some(Self::Json),
            "xml" => Some(Self::Xml),
            "txt" => Some(Self::Txt),
            "unknown" => Some(Self::Unknown),
            _ => None,
        }
    }

    /// Classifies a media type such as `text/html; charset=utf-8`.
    pub fn from_media_type(media_type: &str) -> Self {
        let essence = media_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();

        match essence.as_str() {
            "text/html" | "application/xhtml+xml" => Self::Html,
            "text/css" => Self::Css,
            "text/javascript" | "application/javascript" | "application/x-javascript"
            | "text/ecmascript" | "application/ecmascript" | "module" => Self::Script,
            "application/json" | "text/json" => Self::Json,
            "text/xml" | "application/xml" => Self::Xml,
            "text/plain" => Self::Txt,
            _ if essence.starts_with("image/") => Self::Image,
            _ if essence.ends_with("+json") => Self::Json,
            _ if essence.ends_with("+xml") => Self::Xml,
            _ => Self::Unknown,
        }
    }
}

/// Decoded text plus the raw bytes it came from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseBody {
    pub content: String,
    pub raw_content: Option<Vec<u8>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// Final URL after redirects.
    pub url: String,
    pub status_code: u16,
    pub media_type: String,
    pub charset: Option<String>,
    pub body: ResponseBody,
}

impl Response {
    pub fn new(url: impl Into<String>, media_type: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            status_code: 200,
            media_type: media_type.into(),
            charset: None,
            body: ResponseBody {
                content: content.into(),
                raw_content: None,
            },
        }
    }
}

/// A completed retrieval.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchEnd {
    pub resource: String,
    pub response: Response,
}

impl FetchEnd {
    pub fn resource_type(&self) -> ResourceType {
        ResourceType::from_media_type(&self.response.media_type)
    }
}

/// Payload of `parse::end::html`.
#[derive(Debug, Clone, Copy)]
pub struct HtmlParse<'a> {
    pub resource: &'a str,
    /// The text that was parsed, unchanged.
    pub html: &'a str,
    pub window: &'a Window,
}

/// Every event that travels over the bus.
#[derive(Debug, Clone, Copy)]
pub enum Event<'a> {
    FetchEnd(&'a FetchEnd),
    ParseStart { resource: &'a str },
    ParseEnd(HtmlParse<'a>),
    TraverseStart { resource: &'a str },
    Element { resource: &'a str, element: Element<'a> },
    TraverseDown { resource: &'a str, element: Element<'a> },
    TraverseUp { resource: &'a str, element: Element<'a> },
    TraverseEnd { resource: &'a str },
}

impl<'a> Event<'a> {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::FetchEnd(_) => EventKind::FetchEnd,
            Self::ParseStart { .. } => EventKind::ParseStart,
            Self::ParseEnd(_) => EventKind::ParseEnd,
            Self::TraverseStart { .. } => EventKind::TraverseStart,
            Self::Element { .. } => EventKind::Element,
            Self::TraverseDown { .. } => EventKind::TraverseDown,
            Self::TraverseUp { .. } => EventKind::TraverseUp,
            Self::TraverseEnd { .. } => EventKind::TraverseEnd,
        }
    }

    /// Wire name, e.g. `fetch::end::html` or `element::div`. Element names
    /// are always lower case, so SVG `clipPath` is `element::clippath`.
    pub fn name(&self) -> String {
        match self {
            Self::FetchEnd(fetch) => format!("fetch::end::{}", fetch.resource_type().as_str()),
            Self::Element { element, .. } => format!("element::{}", element.tag_name()),
            _ => self.kind().as_str().to_owned(),
        }
    }

    pub fn resource(&self) -> &'a str {
        match *self {
            Self::FetchEnd(fetch) => &fetch.resource,
            Self::ParseEnd(parse) => parse.resource,
            Self::ParseStart { resource }
            | Self::TraverseStart { resource }
            | Self::Element { resource, .. }
            | Self::TraverseDown { resource, .. }
            | Self::TraverseUp { resource, .. }
            | Self::TraverseEnd { resource } => resource,
        }
    }

    /// The element carried by element and traversal-step events.
    pub fn element(&self) -> Option<Element<'a>> {
        match *self {
            Self::Element { element, .. }
            | Self::TraverseDown { element, .. }
            | Self::TraverseUp { element, .. } => Some(element),
            _ => None,
        }
    }
}

/// Event kinds without payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    FetchEnd,
    ParseStart,
    ParseEnd,
    TraverseStart,
    Element,
    TraverseDown,
    TraverseUp,
    TraverseEnd,
}

impl EventKind {
    /// Name prefix; `fetch::end` and `element` take a suffix on the wire.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::FetchEnd => "fetch::end",
            Self::ParseStart => "parse::start::html",
            Self::ParseEnd => "parse::end::html",
            Self::TraverseStart => "traverse::start",
            Self::Element => "element",
            Self::TraverseDown => "traverse::down",
            Self::TraverseUp => "traverse::up",
            Self::TraverseEnd => "traverse::end",
        }
    }
}

/// Which events a listener receives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventFilter {
    All,
    Kind(EventKind),
    /// `element::<tag>` for one tag, compared case-insensitively.
    Element(String),
    /// `fetch::end::<type>` for one resource type.
    Fetch(ResourceType),
}

impl EventFilter {
    pub fn matches(&self, event: &Event<'_>) -> bool {
        match (self, event) {
            (Self::All, _) => true,
            (Self::Kind(kind), event) => *kind == event.kind(),
            (Self::Element(tag), Event::Element { element, .. }) => {
                element.local_name().eq_ignore_ascii_case(tag)
            }
            (Self::Fetch(resource_type), Event::FetchEnd(fetch)) => {
                fetch.resource_type() == *resource_type
            }
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BusConfig {
    /// Zero means unlimited.
    pub max_listeners: usize,
}

impl BusConfig {
    pub fn validate(&self) -> HintResult<()> {
        if self.max_listeners > MAX_LISTENERS_CEILING {
            return Err(HintError::new(
                "bus.max_listeners_too_large",
                format!("max_listeners exceeds hard limit ({MAX_LISTENERS_CEILING})"),
            ));
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

pub type Handler = Rc<dyn Fn(&Event<'_>) -> HintResult<()>>;

struct Listener {
    id: ListenerId,
    filter: EventFilter,
    handler: Handler,
}

/// Synchronous, single-threaded publish/subscribe hub.
///
/// Handlers run in subscription order. Dispatch works on a snapshot of the
/// matching listeners, so handlers may emit, subscribe or unsubscribe while
/// an event is in flight.
pub struct EventBus {
    config: BusConfig,
    next_id: Cell<u64>,
    listeners: RefCell<Vec<Listener>>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self {
            config: BusConfig::default(),
            next_id: Cell::new(1),
            listeners: RefCell::new(Vec::new()),
        }
    }
}

impl EventBus {
    pub fn new(config: BusConfig) -> HintResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            ..Self::default()
        })
    }

    pub fn shared(config: BusConfig) -> HintResult<Rc<Self>> {
        Self::new(config).map(Rc::new)
    }

    pub fn on<F>(&self, filter: EventFilter, handler: F) -> HintResult<ListenerId>
    where
        F: Fn(&Event<'_>) -> HintResult<()> + 'static,
    {
        let mut listeners = self.listeners.borrow_mut();
        if self.config.max_listeners > 0 && listeners.len() >= self.config.max_listeners {
            return Err(HintError::new(
                "bus.too_many_listeners",
                format!("listener limit {} reached", self.config.max_listeners),
            ));
        }

        let id = ListenerId(self.next_id.get());
        self.next_id.set(id.0.saturating_add(1));
        listeners.push(Listener {
            id,
            filter,
            handler: Rc::new(handler),
        });
        Ok(id)
    }

    /// Removes a listener; returns false when it was not registered.
    pub fn off(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.borrow_mut();
        let before = listeners.len();
        listeners.retain(|listener| listener.id != id);
        listeners.len() != before
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.borrow().len()
    }

    /// Delivers `event` to every matching listener; the first error stops
    /// dispatch and is returned.
    pub fn emit(&self, event: &Event<'_>) -> HintResult<()> {
        let handlers: Vec<Handler> = self
            .listeners
            .borrow()
            .iter()
            .filter(|listener| listener.filter.matches(event))
            .map(|listener| Rc::clone(&listener.handler))
            .collect();

        log::trace!(
            "emit {} for {} ({} listeners)",
            event.name(),
            event.resource(),
            handlers.len()
        );

        for handler in handlers {
            handler(event)?;
        }

        Ok(())
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("config", &self.config)
            .field("listeners", &self.listener_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::BusConfig;
    use super::Event;
    use super::EventBus;
    use super::EventFilter;
    use super::EventKind;
    use super::FetchEnd;
    use super::ResourceType;
    use super::Response;
    use hl_core::HintError;
    use hl_dom::Document;
    use scraper::Html;
    use std::cell::RefCell;
    use std::rc::Rc;

    type Log = Rc<RefCell<Vec<String>>>;

    fn recorder(bus: &EventBus, filter: EventFilter, tag: &'static str, log: &Log) {
        let log = Rc::clone(log);
        let added = bus.on(filter, move |event| {
            log.borrow_mut().push(format!("{tag}:{}", event.name()));
            Ok(())
        });
        assert!(added.is_ok());
    }

    fn fetch(media_type: &str) -> FetchEnd {
        FetchEnd {
            resource: "test.html".to_owned(),
            response: Response::new("test.html", media_type, "<p>x</p>"),
        }
    }

    #[test]
    fn classifies_media_types() {
        let cases = [
            ("text/html; charset=utf-8", ResourceType::Html),
            ("TEXT/HTML", ResourceType::Html),
            ("application/xhtml+xml", ResourceType::Html),
            ("text/css", ResourceType::Css),
            ("application/javascript", ResourceType::Script),
            ("image/svg+xml", ResourceType::Image),
            ("application/ld+json", ResourceType::Json),
            ("application/rss+xml", ResourceType::Xml),
            ("text/plain", ResourceType::Txt),
            ("application/octet-stream", ResourceType::Unknown),
            ("", ResourceType::Unknown),
        ];
        for (media_type, expected) in cases {
            assert_eq!(ResourceType::from_media_type(media_type), expected, "{media_type}");
            assert_eq!(ResourceType::from_name(expected.as_str()), Some(expected));
        }
    }

    #[test]
    fn names_events_on_the_wire() {
        let document = Document::new(Html::parse_document("<div></div>"));
        let div = document.get_elements_by_tag_name("div")[0];
        let html = fetch("text/html");
        let css = fetch("text/css");

        assert_eq!(Event::FetchEnd(&html).name(), "fetch::end::html");
        assert_eq!(Event::FetchEnd(&css).name(), "fetch::end::css");
        assert_eq!(Event::ParseStart { resource: "r" }.name(), "parse::start::html");
        let element = Event::Element {
            resource: "r",
            element: div,
        };
        assert_eq!(element.name(), "element::div");
        assert_eq!(element.kind(), EventKind::Element);
        assert_eq!(element.element(), Some(div));
        assert_eq!(element.resource(), "r");
        assert_eq!(Event::TraverseEnd { resource: "r" }.name(), "traverse::end");
        assert_eq!(Event::TraverseEnd { resource: "r" }.element(), None);
    }

    #[test]
    fn filters_select_matching_events() {
        let document = Document::new(Html::parse_document("<div></div><p></p>"));
        let div = document.get_elements_by_tag_name("div")[0];
        let p = document.get_elements_by_tag_name("p")[0];
        let html = fetch("text/html");
        let css = fetch("text/css");

        let div_event = Event::Element {
            resource: "r",
            element: div,
        };
        let p_event = Event::Element {
            resource: "r",
            element: p,
        };
        assert!(EventFilter::Element("DIV".to_owned()).matches(&div_event));
        assert!(!EventFilter::Element("div".to_owned()).matches(&p_event));
        assert!(EventFilter::Kind(EventKind::Element).matches(&p_event));
        assert!(EventFilter::Fetch(ResourceType::Html).matches(&Event::FetchEnd(&html)));
        assert!(!EventFilter::Fetch(ResourceType::Html).matches(&Event::FetchEnd(&css)));
        assert!(!EventFilter::Kind(EventKind::TraverseUp).matches(&div_event));
        assert!(EventFilter::All.matches(&Event::FetchEnd(&css)));
    }

    #[test]
    fn foreign_element_names_are_lower_case() {
        let document = Document::new(Html::parse_document("<svg><foreignObject></foreignObject></svg>"));
        let foreign = document.get_elements_by_tag_name("foreignobject")[0];
        let event = Event::Element {
            resource: "r",
            element: foreign,
        };
        assert_eq!(event.name(), "element::foreignobject");
        assert!(EventFilter::Element("foreignObject".to_owned()).matches(&event));
    }

    #[test]
    fn delivers_in_subscription_order() {
        let bus = EventBus::default();
        let log: Log = Rc::default();
        recorder(&bus, EventFilter::All, "a", &log);
        recorder(&bus, EventFilter::Kind(EventKind::TraverseStart), "b", &log);
        recorder(&bus, EventFilter::All, "c", &log);

        assert!(bus.emit(&Event::TraverseStart { resource: "r" }).is_ok());
        assert!(bus.emit(&Event::TraverseEnd { resource: "r" }).is_ok());
        assert_eq!(
            *log.borrow(),
            vec![
                "a:traverse::start",
                "b:traverse::start",
                "c:traverse::start",
                "a:traverse::end",
                "c:traverse::end",
            ]
        );
    }

    #[test]
    fn first_error_stops_dispatch() {
        let bus = EventBus::default();
        let log: Log = Rc::default();
        recorder(&bus, EventFilter::All, "before", &log);
        let failing = bus.on(EventFilter::All, |_| Err(HintError::new("test.failed", "boom")));
        assert!(failing.is_ok());
        recorder(&bus, EventFilter::All, "after", &log);

        let result = bus.emit(&Event::TraverseStart { resource: "r" });
        assert!(matches!(result, Err(error) if error.code == "test.failed"));
        assert_eq!(*log.borrow(), vec!["before:traverse::start"]);
    }

    #[test]
    fn handlers_may_emit_and_subscribe_reentrantly() {
        let bus = Rc::new(EventBus::default());
        let log: Log = Rc::default();

        let weak = Rc::downgrade(&bus);
        let inner_log = Rc::clone(&log);
        let added = bus.on(EventFilter::Kind(EventKind::TraverseStart), move |event| {
            let Some(bus) = weak.upgrade() else {
                return Ok(());
            };
            recorder(&bus, EventFilter::Kind(EventKind::TraverseEnd), "late", &inner_log);
            bus.emit(&Event::TraverseEnd {
                resource: event.resource(),
            })
        });
        assert!(added.is_ok());
        recorder(&bus, EventFilter::All, "all", &log);

        assert!(bus.emit(&Event::TraverseStart { resource: "r" }).is_ok());
        assert_eq!(
            *log.borrow(),
            vec!["all:traverse::end", "late:traverse::end", "all:traverse::start"]
        );
        assert_eq!(bus.listener_count(), 3);
    }

    #[test]
    fn enforces_listener_limit_and_removal() {
        let bus = EventBus::new(BusConfig { max_listeners: 1 });
        assert!(bus.is_ok());
        let bus = bus.unwrap_or_else(|_| unreachable!());

        let first = bus.on(EventFilter::All, |_| Ok(()));
        assert!(first.is_ok());
        let second = bus.on(EventFilter::All, |_| Ok(()));
        assert!(matches!(second, Err(error) if error.code == "bus.too_many_listeners"));

        let first = first.unwrap_or_else(|_| unreachable!());
        assert!(bus.off(first));
        assert!(!bus.off(first));
        assert_eq!(bus.listener_count(), 0);
        assert!(bus.on(EventFilter::All, |_| Ok(())).is_ok());

        assert!(BusConfig { max_listeners: usize::MAX }.validate().is_err());
    }
}
