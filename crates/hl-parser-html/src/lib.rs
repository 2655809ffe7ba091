//! HTML parser plugin: turns `fetch::end::html` into parse and traversal events.

mod traverse;

pub use traverse::Walker;

use hl_core::HintError;
use hl_core::HintResult;
use hl_events::Event;
use hl_events::EventBus;
use hl_events::EventFilter;
use hl_events::FetchEnd;
use hl_events::HtmlParse;
use hl_events::ListenerId;
use hl_events::ResourceType;
use hl_html::HtmlConfig;
use hl_html::HtmlParser;
use hl_js::ScriptConfig;
use hl_js::Window;
use std::borrow::Cow;
use std::rc::Rc;
use url::Url;

/// Plugin limits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParserConfig {
    pub max_document_bytes: usize,
    pub strict: bool,
    pub script: ScriptConfig,
}

impl Default for ParserConfig {
    fn default() -> Self {
        let html = HtmlConfig::default();
        Self {
            max_document_bytes: html.max_document_bytes,
            strict: html.strict,
            script: ScriptConfig::default(),
        }
    }
}

impl ParserConfig {
    pub fn validate(&self) -> HintResult<()> {
        self.html_config().validate()?;
        self.script.validate()
    }

    fn html_config(&self) -> HtmlConfig {
        HtmlConfig {
            max_document_bytes: self.max_document_bytes,
            strict: self.strict,
        }
    }
}

/// Parses fetched HTML and republishes it as a window plus a traversal.
#[derive(Debug)]
pub struct HtmlParserPlugin {
    parser: HtmlParser,
    script: ScriptConfig,
    walker: Walker,
}

impl HtmlParserPlugin {
    pub fn new(config: ParserConfig) -> HintResult<Self> {
        config.validate()?;
        Ok(Self {
            parser: HtmlParser::new(config.html_config())?,
            script: config.script,
            walker: Walker,
        })
    }

    /// Subscribes a new plugin to HTML fetch events on `bus`.
    ///
    /// The subscription holds the bus weakly; once the last strong handle is
    /// dropped the listener goes quiet.
    pub fn attach(bus: &Rc<EventBus>, config: ParserConfig) -> HintResult<ListenerId> {
        let plugin = Self::new(config)?;
        let weak = Rc::downgrade(bus);
        bus.on(EventFilter::Fetch(ResourceType::Html), move |event| {
            let Event::FetchEnd(fetch) = event else {
                return Ok(());
            };
            let Some(bus) = weak.upgrade() else {
                return Ok(());
            };
            plugin.handle_fetch(&bus, fetch)
        })
    }

    /// Runs one parse cycle for `fetch`: `parse::start::html`, then
    /// `parse::end::html` with the window, then the traversal. Non-HTML
    /// fetches are ignored. A parse failure stops the cycle after
    /// `parse::start::html` and is returned to the emitter.
    pub fn handle_fetch(&self, bus: &EventBus, fetch: &FetchEnd) -> HintResult<()> {
        let resource_type = fetch.resource_type();
        if resource_type != ResourceType::Html {
            log::debug!(
                "ignoring {} fetch of {}",
                resource_type.as_str(),
                fetch.resource
            );
            return Ok(());
        }

        let resource = fetch.resource.as_str();
        bus.emit(&Event::ParseStart { resource })?;

        let html = self.source_text(fetch).inspect_err(|error| {
            log::warn!("cannot decode {resource}: {error}");
        })?;
        let document = self.parser.parse(&html).inspect_err(|error| {
            log::warn!("cannot parse {resource}: {error}");
        })?;

        let url = match Url::parse(&fetch.response.url) {
            Ok(url) => Some(url),
            Err(error) => {
                log::debug!(
                    "window for {resource} has no location ({}: {error})",
                    fetch.response.url
                );
                None
            }
        };
        let window = Window::new(document, url, self.script.clone());

        bus.emit(&Event::ParseEnd(HtmlParse {
            resource,
            html: &html,
            window: &window,
        }))?;
        self.walker.walk(window.document(), resource, bus)
    }

    /// Decoded body text; raw bytes are decoded only when no text was supplied.
    fn source_text<'f>(&self, fetch: &'f FetchEnd) -> HintResult<Cow<'f, str>> {
        let body = &fetch.response.body;
        let Some(raw) = body.raw_content.as_deref() else {
            return Ok(Cow::Borrowed(body.content.as_str()));
        };
        if !body.content.is_empty() {
            return Ok(Cow::Borrowed(body.content.as_str()));
        }

        let config = self.parser.config();
        if raw.len() > config.max_document_bytes {
            return Err(HintError::new(
                "parse.document_too_large",
                format!(
                    "document is {} bytes, limit is {}",
                    raw.len(),
                    config.max_document_bytes
                ),
            ));
        }

        hl_html::decode_html_bytes(
            raw,
            &fetch.response.media_type,
            fetch.response.charset.as_deref(),
            config.strict,
        )
        .map(Cow::Owned)
    }
}

#[cfg(test)]
mod tests {
    use super::HtmlParserPlugin;
    use super::ParserConfig;
    use hl_events::EventBus;
    use hl_events::FetchEnd;
    use hl_events::Response;
    use hl_js::ScriptConfig;
    use std::rc::Rc;

    #[test]
    fn validates_config() {
        assert!(ParserConfig::default().validate().is_ok());
        let too_small = ParserConfig {
            max_document_bytes: 0,
            ..ParserConfig::default()
        };
        assert!(HtmlParserPlugin::new(too_small).is_err());
        let bad_script = ParserConfig {
            script: ScriptConfig {
                recursion_limit: 0,
                ..ScriptConfig::default()
            },
            ..ParserConfig::default()
        };
        assert!(bad_script.validate().is_err());
    }

    #[test]
    fn attach_registers_one_listener() {
        let bus = Rc::new(EventBus::default());
        assert!(HtmlParserPlugin::attach(&bus, ParserConfig::default()).is_ok());
        assert_eq!(bus.listener_count(), 1);
    }

    #[test]
    fn ignores_non_html_when_called_directly() {
        let plugin = HtmlParserPlugin::new(ParserConfig::default());
        assert!(plugin.is_ok());
        let plugin = plugin.unwrap_or_else(|_| unreachable!());
        let bus = EventBus::default();
        let counted = Rc::new(std::cell::Cell::new(0_usize));
        let sink = Rc::clone(&counted);
        let added = bus.on(hl_events::EventFilter::All, move |_| {
            sink.set(sink.get() + 1);
            Ok(())
        });
        assert!(added.is_ok());

        let fetch = FetchEnd {
            resource: "style.css".to_owned(),
            response: Response::new("https://example.test/style.css", "text/css", "p{}"),
        };
        assert!(plugin.handle_fetch(&bus, &fetch).is_ok());
        assert_eq!(counted.get(), 0);
    }
}
