//! Native document access for scripts.
//!
//! Script nodes are wrappers around preorder indices into the Rust
//! [`Document`]. Reads and selector queries run on the document itself
//! through the functions on `__hl_dom`; index `-1` stands for the document
//! node. Native functions cannot capture state, so the document of the
//! running evaluation is published through a thread-local stack.

use boa_engine::Context;
use boa_engine::JsError;
use boa_engine::JsNativeError;
use boa_engine::JsResult;
use boa_engine::JsString;
use boa_engine::JsValue;
use boa_engine::NativeFunction;
use boa_engine::js_string;
use boa_engine::object::ObjectInitializer;
use boa_engine::object::builtins::JsArray;
use boa_engine::property::Attribute;
use hl_core::HintError;
use hl_dom::Document;
use hl_dom::Element;
use hl_dom::NodeKey;
use hl_dom::NodeView;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::argument_string;

const ELEMENT_NODE: u8 = 1;
const TEXT_NODE: u8 = 3;
const COMMENT_NODE: u8 = 8;
const DOCUMENT_NODE: u8 = 9;

thread_local! {
    static ACTIVE: RefCell<Vec<Rc<DomHost>>> = const { RefCell::new(Vec::new()) };
}

/// Preorder index over a document's element, text and comment nodes.
pub(crate) struct DomHost {
    document: Rc<Document>,
    keys: Vec<NodeKey>,
    node_types: Vec<u8>,
    parents: Vec<Option<usize>>,
    children: Vec<Vec<usize>>,
    positions: HashMap<NodeKey, usize>,
}

impl DomHost {
    pub(crate) fn new(document: Rc<Document>) -> Self {
        let mut host = Self {
            document: Rc::clone(&document),
            keys: Vec::new(),
            node_types: Vec::new(),
            parents: Vec::new(),
            children: Vec::new(),
            positions: HashMap::new(),
        };

        for node in document.nodes() {
            let index = host.keys.len();
            let parent = node
                .parent
                .and_then(|key| host.positions.get(&key).copied());
            if let Some(siblings) = parent.and_then(|parent| host.children.get_mut(parent)) {
                siblings.push(index);
            }
            host.keys.push(node.key);
            host.node_types.push(match node.view {
                NodeView::Element(_) => ELEMENT_NODE,
                NodeView::Text(_) => TEXT_NODE,
                NodeView::Comment(_) => COMMENT_NODE,
            });
            host.parents.push(parent);
            host.children.push(Vec::new());
            host.positions.insert(node.key, index);
        }

        host
    }

    pub(crate) fn len(&self) -> usize {
        self.keys.len()
    }

    fn node_type(&self, index: usize) -> JsResult<u8> {
        self.node_types
            .get(index)
            .copied()
            .ok_or_else(|| unknown_node(index))
    }

    fn view(&self, index: usize) -> JsResult<NodeView<'_>> {
        self.keys
            .get(index)
            .and_then(|key| self.document.node(*key))
            .ok_or_else(|| unknown_node(index))
    }

    fn element(&self, index: usize) -> JsResult<Element<'_>> {
        match self.view(index)? {
            NodeView::Element(element) => Ok(element),
            _ => Err(JsNativeError::typ()
                .with_message(format!("node {index} is not an element"))
                .into()),
        }
    }

    fn position(&self, element: &Element<'_>) -> Option<usize> {
        self.positions.get(&element.key()).copied()
    }

    fn positions_of<'d>(&self, elements: impl IntoIterator<Item = Element<'d>>) -> Vec<usize> {
        elements
            .into_iter()
            .filter_map(|element| self.position(&element))
            .collect()
    }

    /// Child indices of `scope`; the document's only child is `<html>`.
    fn child_indices(&self, scope: Option<usize>) -> JsResult<&[usize]> {
        match scope {
            None => Ok(if self.keys.is_empty() { &[] } else { &[0] }),
            Some(index) => self
                .children
                .get(index)
                .map(Vec::as_slice)
                .ok_or_else(|| unknown_node(index)),
        }
    }

    /// Elements under `scope`, excluding the scope itself.
    fn scoped_elements(&self, scope: Option<usize>) -> JsResult<Vec<Element<'_>>> {
        match scope {
            None => Ok(self.document.elements().collect()),
            Some(index) => Ok(self.element(index)?.descendants().collect()),
        }
    }
}

/// Publishes a host to native calls until dropped.
pub(crate) struct HostScope(());

impl HostScope {
    pub(crate) fn enter(host: &Rc<DomHost>) -> Self {
        ACTIVE.with(|active| active.borrow_mut().push(Rc::clone(host)));
        Self(())
    }
}

impl Drop for HostScope {
    fn drop(&mut self) {
        ACTIVE.with(|active| {
            active.borrow_mut().pop();
        });
    }
}

fn with_host<R>(f: impl FnOnce(&DomHost) -> JsResult<R>) -> JsResult<R> {
    let host = ACTIVE.with(|active| active.borrow().last().cloned());
    match host {
        Some(host) => f(&host),
        None => Err(JsNativeError::error()
            .with_message("no document is attached to this realm")
            .into()),
    }
}

type Native = fn(&JsValue, &[JsValue], &mut Context) -> JsResult<JsValue>;

const NATIVES: [(&str, usize, Native); 17] = [
    ("nodeType", 1, node_type),
    ("localName", 1, local_name),
    ("nodeName", 1, node_name),
    ("data", 1, data),
    ("parent", 1, parent),
    ("children", 2, children),
    ("sibling", 3, sibling),
    ("attribute", 2, attribute),
    ("attributes", 1, attributes),
    ("textContent", 1, text_content),
    ("html", 2, html),
    ("query", 3, query),
    ("matches", 2, matches),
    ("byId", 1, by_id),
    ("byTag", 2, by_tag),
    ("byClass", 2, by_class),
    ("title", 0, title),
];

/// Installs the `__hl_dom` object.
pub(crate) fn register_dom_natives(context: &mut Context) -> JsResult<()> {
    let mut natives = ObjectInitializer::new(context);
    for (name, length, function) in NATIVES {
        natives.function(NativeFunction::from_fn_ptr(function), JsString::from(name), length);
    }
    let natives = natives.build();
    context.register_global_property(js_string!("__hl_dom"), natives, Attribute::all())
}

fn node_type(_this: &JsValue, args: &[JsValue], context: &mut Context) -> JsResult<JsValue> {
    let scope = index_arg(args, 0, context)?;
    with_host(|host| {
        let node_type = match scope {
            None => DOCUMENT_NODE,
            Some(index) => host.node_type(index)?,
        };
        Ok(JsValue::from(i32::from(node_type)))
    })
}

fn local_name(_this: &JsValue, args: &[JsValue], context: &mut Context) -> JsResult<JsValue> {
    let scope = index_arg(args, 0, context)?;
    with_host(|host| {
        let Some(index) = scope else {
            return Ok(JsValue::null());
        };
        Ok(match host.view(index)? {
            NodeView::Element(element) => string_value(element.local_name()),
            NodeView::Text(_) | NodeView::Comment(_) => JsValue::null(),
        })
    })
}

fn node_name(_this: &JsValue, args: &[JsValue], context: &mut Context) -> JsResult<JsValue> {
    let scope = index_arg(args, 0, context)?;
    with_host(|host| {
        let Some(index) = scope else {
            return Ok(string_value("#document"));
        };
        Ok(match host.view(index)? {
            NodeView::Element(element) => string_value(&element.node_name()),
            NodeView::Text(_) => string_value("#text"),
            NodeView::Comment(_) => string_value("#comment"),
        })
    })
}

fn data(_this: &JsValue, args: &[JsValue], context: &mut Context) -> JsResult<JsValue> {
    let scope = index_arg(args, 0, context)?;
    with_host(|host| {
        let Some(index) = scope else {
            return Ok(JsValue::null());
        };
        Ok(match host.view(index)? {
            NodeView::Text(text) | NodeView::Comment(text) => string_value(text),
            NodeView::Element(_) => JsValue::null(),
        })
    })
}

fn parent(_this: &JsValue, args: &[JsValue], context: &mut Context) -> JsResult<JsValue> {
    let scope = index_arg(args, 0, context)?;
    with_host(|host| {
        let parent = match scope {
            None => None,
            Some(index) => *host.parents.get(index).ok_or_else(|| unknown_node(index))?,
        };
        Ok(index_value(parent))
    })
}

fn children(_this: &JsValue, args: &[JsValue], context: &mut Context) -> JsResult<JsValue> {
    let scope = index_arg(args, 0, context)?;
    let elements_only = args.get(1).is_some_and(JsValue::to_boolean);
    let indices = with_host(|host| {
        Ok(host
            .child_indices(scope)?
            .iter()
            .copied()
            .filter(|&child| !elements_only || host.node_types.get(child) == Some(&ELEMENT_NODE))
            .collect::<Vec<_>>())
    })?;
    Ok(index_array(indices, context))
}

fn sibling(_this: &JsValue, args: &[JsValue], context: &mut Context) -> JsResult<JsValue> {
    let scope = index_arg(args, 0, context)?;
    let forward = args
        .get(1)
        .map(|delta| delta.to_number(context))
        .transpose()?
        .is_some_and(|delta| delta > 0.0);
    let elements_only = args.get(2).is_some_and(JsValue::to_boolean);

    with_host(|host| {
        let Some(index) = scope else {
            return Ok(index_value(None));
        };
        let parent = *host.parents.get(index).ok_or_else(|| unknown_node(index))?;
        let siblings = host.child_indices(parent)?;
        let Some(at) = siblings.iter().position(|&child| child == index) else {
            return Ok(index_value(None));
        };

        let wanted = |child: &&usize| {
            !elements_only || host.node_types.get(**child) == Some(&ELEMENT_NODE)
        };
        let found = if forward {
            siblings.iter().skip(at + 1).find(wanted)
        } else {
            siblings.iter().take(at).rev().find(wanted)
        };
        Ok(index_value(found.copied()))
    })
}

fn attribute(_this: &JsValue, args: &[JsValue], context: &mut Context) -> JsResult<JsValue> {
    let scope = index_arg(args, 0, context)?;
    let name = argument_string(args, 1, context)?;
    with_host(|host| {
        let Some(index) = scope else {
            return Ok(JsValue::null());
        };
        let element = host.element(index)?;
        let value = element
            .get_attribute(&name)
            .or_else(|| element.get_attribute(&name.to_ascii_lowercase()));
        Ok(value.map_or_else(JsValue::null, string_value))
    })
}

/// Flat `[name, value, ...]` list in source order.
fn attributes(_this: &JsValue, args: &[JsValue], context: &mut Context) -> JsResult<JsValue> {
    let scope = index_arg(args, 0, context)?;
    let pairs = with_host(|host| {
        let Some(index) = scope else {
            return Ok(Vec::new());
        };
        Ok(host
            .element(index)?
            .attributes()
            .iter()
            .flat_map(|attribute| [string_value(attribute.name), string_value(attribute.value)])
            .collect::<Vec<_>>())
    })?;
    Ok(JsArray::from_iter(pairs, context).into())
}

fn text_content(_this: &JsValue, args: &[JsValue], context: &mut Context) -> JsResult<JsValue> {
    let scope = index_arg(args, 0, context)?;
    with_host(|host| {
        let Some(index) = scope else {
            return Ok(JsValue::null());
        };
        Ok(match host.view(index)? {
            NodeView::Element(element) => string_value(&element.text_content()),
            NodeView::Text(text) | NodeView::Comment(text) => string_value(text),
        })
    })
}

fn html(_this: &JsValue, args: &[JsValue], context: &mut Context) -> JsResult<JsValue> {
    let scope = index_arg(args, 0, context)?;
    let outer = args.get(1).is_some_and(JsValue::to_boolean);
    with_host(|host| {
        let element = match scope {
            None => host.document.root(),
            Some(index) => host.element(index)?,
        };
        let markup = if outer || scope.is_none() {
            element.outer_html()
        } else {
            element.inner_html()
        };
        Ok(string_value(&markup))
    })
}

fn query(_this: &JsValue, args: &[JsValue], context: &mut Context) -> JsResult<JsValue> {
    let scope = index_arg(args, 0, context)?;
    let selectors = argument_string(args, 1, context)?;
    let first = args.get(2).is_some_and(JsValue::to_boolean);

    let indices = with_host(|host| {
        let found = match (scope, first) {
            (None, false) => host.document.query_selector_all(&selectors),
            (None, true) => host
                .document
                .query_selector(&selectors)
                .map(|found| found.into_iter().collect()),
            (Some(index), false) => host.element(index)?.query_selector_all(&selectors),
            (Some(index), true) => host
                .element(index)?
                .query_selector(&selectors)
                .map(|found| found.into_iter().collect()),
        }
        .map_err(|error| selector_error(&selectors, &error))?;
        Ok(host.positions_of(found))
    })?;
    Ok(index_array(indices, context))
}

fn matches(_this: &JsValue, args: &[JsValue], context: &mut Context) -> JsResult<JsValue> {
    let scope = index_arg(args, 0, context)?;
    let selectors = argument_string(args, 1, context)?;
    with_host(|host| {
        let Some(index) = scope else {
            return Ok(JsValue::from(false));
        };
        let matched = host
            .element(index)?
            .matches(&selectors)
            .map_err(|error| selector_error(&selectors, &error))?;
        Ok(JsValue::from(matched))
    })
}

fn by_id(_this: &JsValue, args: &[JsValue], context: &mut Context) -> JsResult<JsValue> {
    let id = argument_string(args, 0, context)?;
    with_host(|host| {
        let found = host.document.get_element_by_id(&id);
        Ok(index_value(found.and_then(|element| host.position(&element))))
    })
}

fn by_tag(_this: &JsValue, args: &[JsValue], context: &mut Context) -> JsResult<JsValue> {
    let scope = index_arg(args, 0, context)?;
    let name = argument_string(args, 1, context)?;
    let indices = with_host(|host| {
        let found = match scope {
            None => host.document.get_elements_by_tag_name(&name),
            Some(index) => host.element(index)?.get_elements_by_tag_name(&name),
        };
        Ok(host.positions_of(found))
    })?;
    Ok(index_array(indices, context))
}

fn by_class(_this: &JsValue, args: &[JsValue], context: &mut Context) -> JsResult<JsValue> {
    let scope = index_arg(args, 0, context)?;
    let names = argument_string(args, 1, context)?;
    let wanted: Vec<&str> = names.split_ascii_whitespace().collect();

    let indices = with_host(|host| {
        if wanted.is_empty() {
            return Ok(Vec::new());
        }
        let found = host.scoped_elements(scope)?.into_iter().filter(|element| {
            let classes: Vec<&str> = element.classes().collect();
            wanted.iter().all(|name| classes.contains(name))
        });
        Ok(host.positions_of(found))
    })?;
    Ok(index_array(indices, context))
}

fn title(_this: &JsValue, _args: &[JsValue], _context: &mut Context) -> JsResult<JsValue> {
    with_host(|host| Ok(string_value(&host.document.title())))
}

/// Non-negative integers address nodes; anything else is the document.
fn index_arg(args: &[JsValue], position: usize, context: &mut Context) -> JsResult<Option<usize>> {
    let number = match args.get(position) {
        Some(value) => value.to_number(context)?,
        None => -1.0,
    };
    if number >= 0.0 && number.fract() == 0.0 {
        Ok(Some(number as usize))
    } else {
        Ok(None)
    }
}

fn index_value(index: Option<usize>) -> JsValue {
    index.map_or_else(|| JsValue::from(-1), |index| JsValue::from(index as f64))
}

fn index_array(indices: Vec<usize>, context: &mut Context) -> JsValue {
    JsArray::from_iter(
        indices.into_iter().map(|index| JsValue::from(index as f64)),
        context,
    )
    .into()
}

fn string_value(text: &str) -> JsValue {
    JsValue::from(JsString::from(text))
}

fn unknown_node(index: usize) -> JsError {
    JsNativeError::range()
        .with_message(format!("no node at index {index}"))
        .into()
}

fn selector_error(selectors: &str, error: &HintError) -> JsError {
    log::debug!("{error}");
    JsNativeError::syntax()
        .with_message(format!("'{selectors}' is not a valid selector"))
        .into()
}
