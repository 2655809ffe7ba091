//! Script evaluation against a parsed document.
//!
//! A [`Window`] owns the [`Document`] and a lazily created boa realm whose
//! `document` reads and queries that same tree through native calls. Page
//! `<script>` elements are never executed; only sources passed to
//! [`Window::evaluate`] run.

mod dom_env;
mod host;

use boa_engine::Context;
use boa_engine::JsResult;
use boa_engine::JsValue;
use boa_engine::NativeFunction;
use boa_engine::Source;
use boa_engine::js_string;
use boa_engine::object::ObjectInitializer;
use boa_engine::property::Attribute;
use hl_core::HintError;
use hl_core::HintResult;
use hl_dom::Document;
use host::DomHost;
use host::HostScope;
use std::cell::OnceCell;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use url::Url;

const BOOTSTRAP_ENV: &str = r#"
globalThis.window = globalThis;
globalThis.self = globalThis;
globalThis.global = globalThis;
globalThis.navigator = {
  userAgent: "Mozilla/5.0 (compatible; Hintline)",
  language: "en-US",
  languages: ["en-US", "en"],
  platform: "",
  sendBeacon: function () { return true; }
};
(function () {
  var bridge = globalThis.__hl_console;

  function inspect(value) {
    if (typeof value === "string") {
      return value;
    }
    try {
      var json = JSON.stringify(value);
      if (typeof json === "string") {
        return json;
      }
    } catch (_error) {}
    return String(value);
  }

  function sink(level) {
    return function () {
      var parts = [];
      for (var i = 0; i < arguments.length; i += 1) {
        parts.push(inspect(arguments[i]));
      }
      bridge.write(level, parts.join(" "));
    };
  }

  globalThis.console = {
    log: sink("info"),
    info: sink("info"),
    debug: sink("debug"),
    trace: sink("debug"),
    warn: sink("warn"),
    error: sink("error")
  };

  var timers = [];
  var nextId = 1;
  var sequence = 0;
  var now = 0;

  function schedule(callback, delay, args, repeat) {
    var cb = callback;
    if (typeof cb !== "function") {
      var src = String(callback);
      cb = function () { (0, eval)(src); };
    }
    var wait = Number(delay);
    if (!(wait > 0)) {
      wait = 0;
    }
    var id = nextId;
    nextId += 1;
    timers.push({ id: id, due: now + wait, seq: sequence, cb: cb, args: args, interval: repeat ? wait : -1 });
    sequence += 1;
    return id;
  }

  function cancel(id) {
    var wanted = Number(id);
    for (var i = 0; i < timers.length; i += 1) {
      if (timers[i].id === wanted) {
        timers.splice(i, 1);
        return;
      }
    }
  }

  globalThis.setTimeout = function (callback, delay) {
    return schedule(callback, delay, Array.prototype.slice.call(arguments, 2), false);
  };
  globalThis.setInterval = function (callback, delay) {
    return schedule(callback, delay, Array.prototype.slice.call(arguments, 2), true);
  };
  globalThis.clearTimeout = cancel;
  globalThis.clearInterval = cancel;
  globalThis.requestAnimationFrame = function (callback) {
    return schedule(function () {
      if (typeof callback === "function") {
        callback(now);
      }
    }, 16, [], false);
  };
  globalThis.cancelAnimationFrame = cancel;
  globalThis.queueMicrotask = function (callback) {
    Promise.resolve().then(function () { callback(); });
  };
  globalThis.performance = {
    now: function () { return now; },
    timeOrigin: 0,
    mark: function () {},
    measure: function () {},
    getEntriesByType: function () { return []; }
  };
  globalThis.matchMedia = function (query) {
    return {
      media: String(query || ""),
      matches: false,
      onchange: null,
      addListener: function () {},
      removeListener: function () {},
      addEventListener: function () {},
      removeEventListener: function () {},
      dispatchEvent: function () { return true; }
    };
  };

  function describe(error) {
    if (error && typeof error === "object" && "message" in error) {
      return (error.name ? error.name + ": " : "") + error.message;
    }
    return String(error);
  }

  // Runs the earliest due timer, advancing virtual time to it.
  globalThis.__hl_run_next_timer = function () {
    if (timers.length === 0) {
      return false;
    }
    var best = 0;
    for (var i = 1; i < timers.length; i += 1) {
      var candidate = timers[i];
      if (candidate.due < timers[best].due
        || (candidate.due === timers[best].due && candidate.seq < timers[best].seq)) {
        best = i;
      }
    }
    var task = timers.splice(best, 1)[0];
    if (task.due > now) {
      now = task.due;
    }
    if (task.interval >= 0) {
      task.due = now + task.interval;
      task.seq = sequence;
      sequence += 1;
      timers.push(task);
    }
    try {
      task.cb.apply(globalThis, task.args);
    } catch (error) {
      bridge.write("error", "Uncaught " + describe(error));
    }
    return true;
  };

  globalThis.__hl_eval = { settled: true, ok: true, value: undefined, error: "" };
  globalThis.__hl_begin = function (src) {
    var state = { settled: false, ok: false, value: undefined, error: "" };
    globalThis.__hl_eval = state;
    var completion;
    try {
      completion = (0, eval)(src);
    } catch (error) {
      state.settled = true;
      state.error = describe(error);
      return;
    }
    var thenable = completion !== null
      && (typeof completion === "object" || typeof completion === "function")
      && typeof completion.then === "function";
    if (!thenable) {
      state.settled = true;
      state.ok = true;
      state.value = completion;
      return;
    }
    Promise.resolve(completion).then(function (value) {
      state.settled = true;
      state.ok = true;
      state.value = value;
    }, function (error) {
      state.settled = true;
      state.error = describe(error);
    });
  };
  globalThis.__hl_json = function (value) {
    try {
      var json = JSON.stringify(value);
      if (typeof json === "string") {
        return json;
      }
    } catch (_error) {}
    return String(value);
  };
})();
"#;

/// Evaluation limits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptConfig {
    /// Sources longer than this are rejected before evaluation.
    pub max_script_bytes: usize,
    pub recursion_limit: usize,
    pub stack_size_limit: usize,
    pub loop_iteration_limit: u64,
    /// Timer callbacks one evaluation may run while waiting for a promise.
    pub max_timer_runs: usize,
}

impl Default for ScriptConfig {
    fn default() -> Self {
        Self {
            max_script_bytes: 2 * 1024 * 1024,
            recursion_limit: 512,
            stack_size_limit: 10 * 1024,
            loop_iteration_limit: 1_000_000,
            max_timer_runs: 1024,
        }
    }
}

impl ScriptConfig {
    pub fn validate(&self) -> HintResult<()> {
        if self.max_script_bytes == 0 {
            return Err(HintError::new(
                "config.invalid_script_limit",
                "max_script_bytes must be greater than zero",
            ));
        }

        if self.recursion_limit == 0 || self.stack_size_limit == 0 || self.loop_iteration_limit == 0 {
            return Err(HintError::new(
                "config.invalid_script_limit",
                "runtime limits must be greater than zero",
            ));
        }

        Ok(())
    }
}

/// Completion value of an evaluated script.
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptValue {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    /// Objects and arrays, JSON-serialised.
    Json(String),
}

impl ScriptValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(text) | Self::Json(text) => Some(text),
            _ => None,
        }
    }
}

impl fmt::Display for ScriptValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Undefined => f.write_str("undefined"),
            Self::Null => f.write_str("null"),
            Self::Bool(value) => write!(f, "{value}"),
            Self::Number(value) if value.is_nan() => f.write_str("NaN"),
            Self::Number(value) if value.is_infinite() => {
                f.write_str(if value.is_sign_positive() { "Infinity" } else { "-Infinity" })
            }
            Self::Number(value) => write!(f, "{value}"),
            Self::String(text) | Self::Json(text) => f.write_str(text),
        }
    }
}

/// Parsed document plus its script-execution context.
pub struct Window {
    document: Rc<Document>,
    url: Option<Url>,
    config: ScriptConfig,
    host: OnceCell<Rc<DomHost>>,
    realm: RefCell<Option<Context>>,
}

impl Window {
    pub fn new(document: Document, url: Option<Url>, config: ScriptConfig) -> Self {
        Self {
            document: Rc::new(document),
            url,
            config,
            host: OnceCell::new(),
            realm: RefCell::new(None),
        }
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn url(&self) -> Option<&Url> {
        self.url.as_ref()
    }

    pub fn config(&self) -> &ScriptConfig {
        &self.config
    }

    /// Evaluates `source` in the window's realm.
    ///
    /// A promise completion is driven to settlement by running queued jobs
    /// and then timers in virtual-time order.
    pub fn evaluate(&self, source: &str) -> HintResult<ScriptValue> {
        if source.len() > self.config.max_script_bytes {
            return Err(HintError::new(
                "script.too_large",
                format!(
                    "script is {} bytes, limit is {}",
                    source.len(),
                    self.config.max_script_bytes
                ),
            ));
        }

        let _scope = HostScope::enter(self.host());
        let mut realm = self.realm.try_borrow_mut().map_err(|_| {
            HintError::new(
                "script.reentrant",
                "evaluate was called while another evaluation is running",
            )
        })?;
        if realm.is_none() {
            *realm = Some(self.create_realm()?);
        }
        let Some(context) = realm.as_mut() else {
            return Err(HintError::new("script.no_realm", "script realm is unavailable"));
        };

        let begin = format!("__hl_begin({});", dom_env::js_string_literal(source));
        eval_in(context, &begin)?;

        let mut timer_runs = 0_usize;
        loop {
            context.run_jobs();
            if eval_in(context, "__hl_eval.settled")?.to_boolean() {
                break;
            }
            if timer_runs >= self.config.max_timer_runs {
                return Err(HintError::new(
                    "script.timer_budget_exhausted",
                    format!("promise still pending after {timer_runs} timer callbacks"),
                ));
            }
            if !eval_in(context, "__hl_run_next_timer()")?.to_boolean() {
                return Err(HintError::new(
                    "script.unsettled",
                    "promise can never settle: no pending jobs or timers",
                ));
            }
            timer_runs += 1;
        }

        if timer_runs > 0 {
            log::debug!("script settled after {timer_runs} timer callbacks");
        }

        if !eval_in(context, "__hl_eval.ok")?.to_boolean() {
            let message = eval_string(context, "String(__hl_eval.error)")?;
            return Err(HintError::new("script.evaluation_failed", message));
        }

        read_completion(context)
    }

    fn host(&self) -> &Rc<DomHost> {
        self.host
            .get_or_init(|| Rc::new(DomHost::new(Rc::clone(&self.document))))
    }

    fn create_realm(&self) -> HintResult<Context> {
        let mut context = Context::default();
        context
            .runtime_limits_mut()
            .set_recursion_limit(self.config.recursion_limit);
        context
            .runtime_limits_mut()
            .set_stack_size_limit(self.config.stack_size_limit);
        context
            .runtime_limits_mut()
            .set_loop_iteration_limit(self.config.loop_iteration_limit);

        register_console_bridge(&mut context).map_err(|error| {
            HintError::new("script.bootstrap_failed", format!("console bridge: {error}"))
        })?;
        host::register_dom_natives(&mut context).map_err(|error| {
            HintError::new("script.bootstrap_failed", format!("dom natives: {error}"))
        })?;

        let document_bootstrap =
            dom_env::build_document_bootstrap(&self.document, self.url.as_ref());
        for (stage, source) in [
            ("environment", BOOTSTRAP_ENV),
            ("dom", dom_env::DOM_ENV),
            ("document", document_bootstrap.as_str()),
        ] {
            context
                .eval(Source::from_bytes(source.as_bytes()))
                .map_err(|error| {
                    HintError::new("script.bootstrap_failed", format!("{stage}: {error}"))
                })?;
        }

        log::debug!(
            "created script realm for {} ({} nodes)",
            self.url.as_ref().map_or("about:blank", Url::as_str),
            self.host().len()
        );
        Ok(context)
    }
}

impl fmt::Debug for Window {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Window")
            .field("url", &self.url.as_ref().map(Url::as_str))
            .field("config", &self.config)
            .field(
                "realm",
                &self.realm.try_borrow().map(|realm| realm.is_some()).ok(),
            )
            .finish_non_exhaustive()
    }
}

fn eval_in(context: &mut Context, source: &str) -> HintResult<JsValue> {
    context
        .eval(Source::from_bytes(source.as_bytes()))
        .map_err(|error| HintError::new("script.evaluation_failed", error.to_string()))
}

fn eval_string(context: &mut Context, source: &str) -> HintResult<String> {
    let value = eval_in(context, source)?;
    let text = value
        .to_string(context)
        .map_err(|error| HintError::new("script.evaluation_failed", error.to_string()))?;
    Ok(text.to_std_string_escaped())
}

fn read_completion(context: &mut Context) -> HintResult<ScriptValue> {
    let value = eval_in(context, "__hl_eval.value")?;

    if value.is_undefined() {
        return Ok(ScriptValue::Undefined);
    }
    if value.is_null() {
        return Ok(ScriptValue::Null);
    }
    if let Some(flag) = value.as_boolean() {
        return Ok(ScriptValue::Bool(flag));
    }
    if let Some(number) = value.as_number() {
        return Ok(ScriptValue::Number(number));
    }
    if let Some(text) = value.as_string() {
        return Ok(ScriptValue::String(text.to_std_string_escaped()));
    }
    if value.is_object() && !value.is_callable() {
        return eval_string(context, "__hl_json(__hl_eval.value)").map(ScriptValue::Json);
    }

    eval_string(context, "String(__hl_eval.value)").map(ScriptValue::String)
}

fn register_console_bridge(context: &mut Context) -> JsResult<()> {
    let write = NativeFunction::from_copy_closure(|_this, args, ctx| {
        let level = argument_string(args, 0, ctx)?;
        let message = argument_string(args, 1, ctx)?;
        match level.as_str() {
            "error" => log::error!(target: "js-console", "{message}"),
            "warn" => log::warn!(target: "js-console", "{message}"),
            "debug" => log::debug!(target: "js-console", "{message}"),
            _ => log::info!(target: "js-console", "{message}"),
        }
        Ok(JsValue::undefined())
    });

    let bridge = ObjectInitializer::new(context)
        .function(write, js_string!("write"), 2)
        .build();
    context.register_global_property(js_string!("__hl_console"), bridge, Attribute::all())
}

fn argument_string(args: &[JsValue], index: usize, context: &mut Context) -> JsResult<String> {
    Ok(args
        .get(index)
        .map(|value| value.to_string(context))
        .transpose()?
        .map(|text| text.to_std_string_escaped())
        .unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::ScriptConfig;
    use super::ScriptValue;
    use super::Window;
    use hl_core::HintResult;
    use hl_dom::Document;
    use scraper::Html;
    use url::Url;

    const PAGE: &str = "<!DOCTYPE html><div id=\"test\">Test</div>";

    fn window(source: &str) -> Window {
        Window::new(
            Document::new(Html::parse_document(source)),
            None,
            ScriptConfig::default(),
        )
    }

    fn error_code(result: HintResult<ScriptValue>) -> Option<&'static str> {
        result.err().map(|error| error.code)
    }

    #[test]
    fn evaluates_plain_completion_values() {
        let window = window(PAGE);
        assert_eq!(window.evaluate("1 + 2"), Ok(ScriptValue::Number(3.0)));
        assert_eq!(window.evaluate("'a' + 'b'"), Ok(ScriptValue::String("ab".to_owned())));
        assert_eq!(window.evaluate("null"), Ok(ScriptValue::Null));
        assert_eq!(window.evaluate("void 0"), Ok(ScriptValue::Undefined));
        assert_eq!(window.evaluate("1 < 2"), Ok(ScriptValue::Bool(true)));
        assert_eq!(
            window.evaluate("({ a: [1, 'x'] })"),
            Ok(ScriptValue::Json("{\"a\":[1,\"x\"]}".to_owned()))
        );
    }

    #[test]
    fn resolves_promises_after_timers() {
        let window = window(PAGE);
        let result = window.evaluate(
            "new Promise(function (resolve) { setTimeout(function () { resolve(document.body.firstElementChild.id); }, 10); })",
        );
        assert_eq!(result, Ok(ScriptValue::String("test".to_owned())));
    }

    #[test]
    fn reads_text_content_from_the_document() {
        let window = window(PAGE);
        assert_eq!(
            window.evaluate("document.getElementById('test').textContent"),
            Ok(ScriptValue::String("Test".to_owned()))
        );
        assert_eq!(
            window.evaluate("document.querySelector('body > div').tagName"),
            Ok(ScriptValue::String("DIV".to_owned()))
        );
    }

    #[test]
    fn timers_run_in_virtual_time_order() {
        let window = window(PAGE);
        let result = window.evaluate(
            "new Promise(function (resolve) {
               var order = [];
               setTimeout(function () { order.push('slow'); }, 50);
               setTimeout(function () { order.push('fast'); }, 10);
               queueMicrotask(function () { order.push('micro'); });
               setTimeout(function () { resolve(order.join(',') + '@' + performance.now()); }, 100);
             })",
        );
        assert_eq!(result, Ok(ScriptValue::String("micro,fast,slow@100".to_owned())));
    }

    #[test]
    fn thrown_errors_and_rejections_fail() {
        let window = window(PAGE);
        let thrown = window.evaluate("throw new Error('boom')");
        assert!(matches!(&thrown, Err(error) if error.code == "script.evaluation_failed" && error.message.contains("boom")));

        let rejected = window.evaluate("Promise.reject(new TypeError('nope'))");
        assert!(matches!(&rejected, Err(error) if error.message == "TypeError: nope"));

        assert_eq!(error_code(window.evaluate("let = ;")), Some("script.evaluation_failed"));
    }

    #[test]
    fn never_settling_promise_is_reported() {
        let window = window(PAGE);
        assert_eq!(
            error_code(window.evaluate("new Promise(function () {})")),
            Some("script.unsettled")
        );
    }

    #[test]
    fn timer_budget_bounds_intervals() {
        let window = Window::new(
            Document::new(Html::parse_document(PAGE)),
            None,
            ScriptConfig {
                max_timer_runs: 5,
                ..ScriptConfig::default()
            },
        );
        let result = window.evaluate(
            "new Promise(function () { setInterval(function () {}, 1); })",
        );
        assert_eq!(error_code(result), Some("script.timer_budget_exhausted"));
    }

    #[test]
    fn realm_persists_between_evaluations() {
        let window = window(PAGE);
        assert_eq!(window.evaluate("globalThis.counter = 41"), Ok(ScriptValue::Number(41.0)));
        assert_eq!(window.evaluate("counter + 1"), Ok(ScriptValue::Number(42.0)));
    }

    #[test]
    fn script_markup_matches_the_document() {
        let source = "<!DOCTYPE html><title>a &amp; b</title><p class=\"x\" title='\"q\"'>1 &lt; 2<br><!--c--></p><script>if (a < b) {}</script>";
        let window = window(source);
        let expected = window.document().page_html();
        assert_eq!(
            window.evaluate("document.documentElement.outerHTML"),
            Ok(ScriptValue::String(expected))
        );
        assert_eq!(
            window.evaluate("document.title"),
            Ok(ScriptValue::String("a & b".to_owned()))
        );
    }

    #[test]
    fn selector_engine_covers_common_forms() {
        let window = window(
            "<ul id=\"list\"><li class=\"a b\">1</li><li data-k=\"v\">2</li></ul><p><span>3</span></p>",
        );
        let cases = [
            ("document.querySelectorAll('li').length", 2.0),
            ("document.querySelectorAll('ul > li.a').length", 1.0),
            ("document.querySelectorAll('#list [data-k=v]').length", 1.0),
            ("document.querySelectorAll('[data-k]').length", 1.0),
            ("document.querySelectorAll('li, span').length", 3.0),
            ("document.querySelectorAll('body *').length", 5.0),
            ("document.querySelectorAll('li + li').length", 1.0),
            ("document.getElementsByClassName('b').length", 1.0),
            ("document.getElementsByTagName('LI').length", 2.0),
            ("document.querySelector('p').querySelectorAll('span').length", 1.0),
        ];
        for (script, expected) in cases {
            assert_eq!(window.evaluate(script), Ok(ScriptValue::Number(expected)), "{script}");
        }
        assert!(matches!(
            window.evaluate("document.querySelector('li[')"),
            Err(error) if error.message.starts_with("SyntaxError")
        ));
    }

    #[test]
    fn script_queries_agree_with_document_queries() {
        let window = window(
            "<div class=\"x\">a</div><div>b</div><ul><li>1</li><li>2</li></ul><svg><clipPath></clipPath></svg>",
        );
        for selectors in [
            "div:first-child",
            "div:not(.x)",
            "li:nth-child(2)",
            "ul > li:last-child",
            "div, li",
            "body > *",
        ] {
            let expected = window
                .document()
                .query_selector_all(selectors)
                .map(|found| ScriptValue::Number(found.len() as f64));
            let script = format!("document.querySelectorAll({selectors:?}).length");
            assert_eq!(window.evaluate(&script), expected, "{selectors}");
        }
        assert_eq!(
            window.evaluate("document.querySelectorAll('div:first-child').length"),
            Ok(ScriptValue::Number(1.0))
        );

        let checks = [
            ("document.querySelector('li') === document.getElementsByTagName('li')[0]", ScriptValue::Bool(true)),
            ("document.querySelector('li').matches('ul > li:first-child')", ScriptValue::Bool(true)),
            ("document.querySelectorAll('li')[1].closest('ul').tagName", ScriptValue::String("UL".to_owned())),
            ("document.querySelector('li').nextElementSibling.textContent", ScriptValue::String("2".to_owned())),
            ("document.getElementsByTagName('clippath')[0].nodeName", ScriptValue::String("clipPath".to_owned())),
            ("document.body.parentNode === document.documentElement", ScriptValue::Bool(true)),
            ("document.documentElement.parentNode === document", ScriptValue::Bool(true)),
        ];
        for (script, expected) in checks {
            assert_eq!(window.evaluate(script), Ok(expected), "{script}");
        }
    }

    #[test]
    fn script_cannot_mutate_the_shared_document() {
        let window = window(PAGE);
        for script in [
            "document.body.firstElementChild.setAttribute('data-x', '1')",
            "document.body.firstElementChild.textContent = 'changed'",
            "document.body.appendChild(document.createElement('p'))",
            "document.title = 'renamed'",
        ] {
            let result = window.evaluate(script);
            assert!(
                matches!(&result, Err(error) if error.code == "script.evaluation_failed" && error.message.contains("read-only")),
                "{script}: {result:?}"
            );
        }

        assert_eq!(
            window.evaluate("document.querySelectorAll('[data-x]').length"),
            Ok(ScriptValue::Number(0.0))
        );
        assert_eq!(
            window.document().query_selector_all("[data-x]").map(|found| found.len()),
            Ok(0)
        );
        assert_eq!(
            window.evaluate("document.getElementById('test').textContent"),
            Ok(ScriptValue::String("Test".to_owned()))
        );
    }

    #[test]
    fn document_access_is_not_bound_by_the_loop_limit() {
        let source = format!("<!DOCTYPE html><body>{}</body>", "<i></i>".repeat(300));
        let window = Window::new(
            Document::new(Html::parse_document(&source)),
            None,
            ScriptConfig {
                loop_iteration_limit: 50,
                ..ScriptConfig::default()
            },
        );
        let cases = [
            ("document.getElementsByTagName('i').length", 300.0),
            ("document.querySelectorAll('body > i').length", 300.0),
            ("document.body.children.length", 300.0),
            ("document.body.innerHTML.length", 2100.0),
        ];
        for (script, expected) in cases {
            assert_eq!(window.evaluate(script), Ok(ScriptValue::Number(expected)), "{script}");
        }
        assert_eq!(
            error_code(window.evaluate("for (var n = 0; n < 1000; n += 1) {} n")),
            Some("script.evaluation_failed")
        );
    }

    #[test]
    fn elements_serialise_to_json_as_markup() {
        let window = window(PAGE);
        assert_eq!(
            window.evaluate("[document.getElementById('test')]"),
            Ok(ScriptValue::Json("[\"<div id=\\\"test\\\">Test</div>\"]".to_owned()))
        );
    }

    #[test]
    fn location_reflects_the_window_url() {
        let url = Url::parse("https://example.test/a?b=1#c").ok();
        let window = Window::new(
            Document::new(Html::parse_document(PAGE)),
            url,
            ScriptConfig::default(),
        );
        assert_eq!(
            window.evaluate("location.pathname + location.search + location.hash"),
            Ok(ScriptValue::String("/a?b=1#c".to_owned()))
        );
        assert_eq!(
            window.evaluate("document.URL"),
            Ok(ScriptValue::String("https://example.test/a?b=1#c".to_owned()))
        );
    }

    #[test]
    fn page_scripts_are_not_executed() {
        let window = window("<script>globalThis.ran = true;</script><p>x</p>");
        assert_eq!(
            window.evaluate("typeof ran"),
            Ok(ScriptValue::String("undefined".to_owned()))
        );
        assert_eq!(window.evaluate("console.log('hello', { a: 1 })"), Ok(ScriptValue::Undefined));
    }

    #[test]
    fn oversized_scripts_are_rejected() {
        let window = Window::new(
            Document::new(Html::parse_document(PAGE)),
            None,
            ScriptConfig {
                max_script_bytes: 4,
                ..ScriptConfig::default()
            },
        );
        assert_eq!(error_code(window.evaluate("1 + 2 + 3")), Some("script.too_large"));
        assert!(ScriptConfig::default().validate().is_ok());
        let zero = ScriptConfig {
            max_script_bytes: 0,
            ..ScriptConfig::default()
        };
        assert!(zero.validate().is_err());
    }

    #[test]
    fn displays_values_like_script() {
        assert_eq!(ScriptValue::Number(3.0).to_string(), "3");
        assert_eq!(ScriptValue::Number(0.5).to_string(), "0.5");
        assert_eq!(ScriptValue::Number(f64::NAN).to_string(), "NaN");
        assert_eq!(ScriptValue::Undefined.to_string(), "undefined");
        assert_eq!(ScriptValue::String("x".to_owned()).as_str(), Some("x"));
    }
}
