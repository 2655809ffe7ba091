//! Script-side `document`: DOM-shaped wrappers over the native host.
//!
//! Wrapper objects are cached per node index so identity comparisons hold.
//! Mutating calls throw; the document is shared with Rust listeners and
//! stays read-only.

use hl_dom::Document;
use url::Url;

pub(crate) const DOM_ENV: &str = r###"
(function () {
  var dom = globalThis.__hl_dom;
  var cache = [];
  var doc;

  function readOnly(what) {
    return new Error("NoModificationAllowedError: " + what + " is not allowed, the document is read-only");
  }

  function Node(index) {
    this.__index = index;
    this.style = {};
  }

  function wrap(index) {
    if (index < 0) {
      return null;
    }
    var node = cache[index];
    if (!node) {
      node = new Node(index);
      cache[index] = node;
    }
    return node;
  }

  function wrapAll(indices) {
    return indices.map(wrap);
  }

  function getter(name, get, set) {
    Object.defineProperty(Node.prototype, name, {
      get: get,
      set: set || function () { throw readOnly("setting " + name); },
      configurable: true,
      enumerable: false
    });
  }

  function rejecter(what) {
    return function () { throw readOnly(what); };
  }

  function classesOf(node) {
    var value = node.getAttribute("class");
    return value ? value.split(/\s+/).filter(function (name) { return name.length > 0; }) : [];
  }

  getter("nodeType", function () { return dom.nodeType(this.__index); });
  getter("nodeName", function () { return dom.nodeName(this.__index); });
  getter("localName", function () { return dom.localName(this.__index); });
  getter("tagName", function () {
    return this.nodeType === 1 ? dom.nodeName(this.__index) : undefined;
  });
  getter("ownerDocument", function () { return this === doc ? null : doc; });
  getter("parentNode", function () {
    if (this === doc) {
      return null;
    }
    var parent = dom.parent(this.__index);
    return parent < 0 ? doc : wrap(parent);
  });
  getter("parentElement", function () {
    var parent = this.parentNode;
    return parent && parent.nodeType === 1 ? parent : null;
  });
  getter("childNodes", function () { return wrapAll(dom.children(this.__index, false)); });
  getter("children", function () { return wrapAll(dom.children(this.__index, true)); });
  getter("childElementCount", function () { return dom.children(this.__index, true).length; });
  getter("firstChild", function () { return this.childNodes[0] || null; });
  getter("lastChild", function () {
    var nodes = this.childNodes;
    return nodes[nodes.length - 1] || null;
  });
  getter("firstElementChild", function () { return this.children[0] || null; });
  getter("lastElementChild", function () {
    var children = this.children;
    return children[children.length - 1] || null;
  });
  getter("nextSibling", function () { return wrap(dom.sibling(this.__index, 1, false)); });
  getter("previousSibling", function () { return wrap(dom.sibling(this.__index, -1, false)); });
  getter("nextElementSibling", function () { return wrap(dom.sibling(this.__index, 1, true)); });
  getter("previousElementSibling", function () { return wrap(dom.sibling(this.__index, -1, true)); });
  getter("id", function () {
    return this.nodeType === 1 ? (this.getAttribute("id") || "") : undefined;
  });
  getter("className", function () {
    return this.nodeType === 1 ? (this.getAttribute("class") || "") : undefined;
  });
  getter("classList", function () {
    var element = this;
    return {
      get length() { return classesOf(element).length; },
      get value() { return element.getAttribute("class") || ""; },
      item: function (index) { return classesOf(element)[index] || null; },
      contains: function (name) { return classesOf(element).indexOf(String(name)) >= 0; },
      add: rejecter("classList.add"),
      remove: rejecter("classList.remove"),
      toggle: rejecter("classList.toggle")
    };
  });
  getter("attributes", function () {
    var flat = dom.attributes(this.__index);
    return flat.filter(function (_item, position) {
      return position % 2 === 0;
    }).map(function (name, position) {
      return { name: name, value: flat[position * 2 + 1] };
    });
  });
  getter("textContent", function () { return dom.textContent(this.__index); });
  getter("innerText", function () { return dom.textContent(this.__index); });
  getter("data", function () { return dom.data(this.__index); });
  getter("nodeValue", function () { return dom.data(this.__index); });
  getter("outerHTML", function () { return dom.html(this.__index, true); });
  getter("innerHTML", function () { return dom.html(this.__index, false); });

  Node.prototype.getAttribute = function (name) {
    return this.nodeType === 1 ? dom.attribute(this.__index, String(name)) : null;
  };
  Node.prototype.hasAttribute = function (name) {
    return this.getAttribute(name) !== null;
  };
  Node.prototype.getAttributeNames = function () {
    return this.attributes.map(function (attr) { return attr.name; });
  };
  Node.prototype.querySelectorAll = function (selectors) {
    return wrapAll(dom.query(this.__index, String(selectors), false));
  };
  Node.prototype.querySelector = function (selectors) {
    return wrapAll(dom.query(this.__index, String(selectors), true))[0] || null;
  };
  Node.prototype.getElementsByTagName = function (name) {
    return wrapAll(dom.byTag(this.__index, String(name)));
  };
  Node.prototype.getElementsByClassName = function (names) {
    return wrapAll(dom.byClass(this.__index, String(names)));
  };
  Node.prototype.matches = function (selectors) {
    return dom.matches(this.__index, String(selectors));
  };
  Node.prototype.closest = function (selectors) {
    var source = String(selectors);
    for (var node = this; node && node.nodeType === 1; node = node.parentElement) {
      if (dom.matches(node.__index, source)) {
        return node;
      }
    }
    return null;
  };
  Node.prototype.contains = function (other) {
    for (var node = other; node; node = node.parentNode) {
      if (node === this) {
        return true;
      }
    }
    return false;
  };
  Node.prototype.hasChildNodes = function () {
    return dom.children(this.__index, false).length > 0;
  };
  Node.prototype.setAttribute = rejecter("setAttribute");
  Node.prototype.removeAttribute = rejecter("removeAttribute");
  Node.prototype.appendChild = rejecter("appendChild");
  Node.prototype.insertBefore = rejecter("insertBefore");
  Node.prototype.removeChild = rejecter("removeChild");
  Node.prototype.replaceChild = rejecter("replaceChild");
  Node.prototype.remove = rejecter("remove");
  Node.prototype.addEventListener = function (type, handler) {
    var key = String(type || "");
    if (!key || typeof handler !== "function") {
      return;
    }
    if (!this.__listeners) {
      this.__listeners = Object.create(null);
    }
    if (!this.__listeners[key]) {
      this.__listeners[key] = [];
    }
    this.__listeners[key].push(handler);
  };
  Node.prototype.removeEventListener = function (type, handler) {
    var list = this.__listeners && this.__listeners[String(type || "")];
    if (!list) {
      return;
    }
    var index = list.indexOf(handler);
    if (index >= 0) {
      list.splice(index, 1);
    }
  };
  Node.prototype.dispatchEvent = function (event) {
    var evt = event || {};
    var list = this.__listeners && this.__listeners[String(evt.type || "")];
    if (list) {
      list = list.slice();
      for (var i = 0; i < list.length; i += 1) {
        list[i].call(this, evt);
      }
    }
    return true;
  };
  Node.prototype.toJSON = function () {
    switch (this.nodeType) {
      case 1: return this.outerHTML;
      case 9: return "#document";
      default: return this.data;
    }
  };
  Node.prototype.toString = function () {
    return "[object " + (this.nodeType === 1 ? "HTMLElement" : this.nodeName) + "]";
  };

  globalThis.__hl_install_document = function (loc, doctype) {
    doc = new Node(-1);

    var location = {
      href: loc.href,
      protocol: loc.protocol,
      host: loc.host,
      hostname: loc.hostname,
      port: loc.port,
      pathname: loc.pathname,
      search: loc.search,
      hash: loc.hash,
      origin: loc.origin,
      assign: rejecter("location.assign"),
      replace: rejecter("location.replace"),
      reload: function () {},
      toString: function () { return this.href; }
    };

    function rootChild(names) {
      var root = wrap(0);
      if (!root) {
        return null;
      }
      return root.children.filter(function (child) {
        return names.indexOf(child.localName) >= 0;
      })[0] || null;
    }

    Object.defineProperties(doc, {
      documentElement: { get: function () { return wrap(0); }, enumerable: true },
      head: { get: function () { return rootChild(["head"]); }, enumerable: true },
      body: { get: function () { return rootChild(["body", "frameset"]); }, enumerable: true },
      title: {
        get: function () { return dom.title(); },
        set: rejecter("setting title"),
        enumerable: true
      }
    });
    doc.URL = loc.href;
    doc.documentURI = loc.href;
    doc.location = location;
    doc.readyState = "complete";
    doc.compatMode = doctype === "html" ? "CSS1Compat" : "BackCompat";
    doc.doctype = doctype === null ? null : { name: doctype, nodeType: 10 };
    doc.defaultView = globalThis;
    doc.getElementById = function (id) {
      return wrap(dom.byId(String(id)));
    };
    doc.createElement = rejecter("createElement");
    doc.createTextNode = rejecter("createTextNode");
    doc.createComment = rejecter("createComment");
    doc.write = rejecter("document.write");

    globalThis.document = doc;
    globalThis.location = location;
  };
})();
"###;

/// JS statement that installs `document` and `location`.
pub(crate) fn build_document_bootstrap(document: &Document, url: Option<&Url>) -> String {
    let location = build_location_object(url);
    let doctype = document
        .doctype()
        .map(|name| js_string_literal(&name.to_ascii_lowercase()))
        .unwrap_or_else(|| "null".to_owned());
    format!("__hl_install_document({location}, {doctype});")
}

fn build_location_object(url: Option<&Url>) -> String {
    let Some(url) = url else {
        return "{href:\"about:blank\",protocol:\"about:\",host:\"\",hostname:\"\",port:\"\",pathname:\"blank\",search:\"\",hash:\"\",origin:\"null\"}".to_owned();
    };

    let hostname = url.host_str().unwrap_or_default();
    let port = url.port().map(|port| port.to_string()).unwrap_or_default();
    let host = if port.is_empty() {
        hostname.to_owned()
    } else {
        format!("{hostname}:{port}")
    };
    let search = url.query().map(|query| format!("?{query}")).unwrap_or_default();
    let hash = url
        .fragment()
        .map(|fragment| format!("#{fragment}"))
        .unwrap_or_default();

    format!(
        "{{href:{},protocol:{},host:{},hostname:{},port:{},pathname:{},search:{},hash:{},origin:{}}}",
        js_string_literal(url.as_str()),
        js_string_literal(&format!("{}:", url.scheme())),
        js_string_literal(&host),
        js_string_literal(hostname),
        js_string_literal(&port),
        js_string_literal(url.path()),
        js_string_literal(&search),
        js_string_literal(&hash),
        js_string_literal(&url.origin().ascii_serialization()),
    )
}

pub(crate) fn js_string_literal(input: &str) -> String {
    format!("{input:?}")
}
