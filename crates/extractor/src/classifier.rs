//! Component classification.
//!
//! Declarations are classified by an ordered table of rules. The first rule
//! whose shape matches and whose test passes decides whether the declaration
//! is a UI component; if no rule fires it is not one. Non-component
//! declarations then fall back to `function`, `class` or `variable`.

use crate::types::EntityKind;
use once_cell::sync::Lazy;
use regex::Regex;

/// Syntactic shape of a top-level declaration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclarationShape {
    Function,
    Class,
    Variable,
}

/// Everything the rules look at for one declaration
#[derive(Debug, Clone, Copy)]
pub struct DeclarationFacts<'a> {
    pub shape: DeclarationShape,
    pub name: &'a str,
    /// Full text of the declaration
    pub text: &'a str,
    /// Initializer text, for variables
    pub initializer: Option<&'a str>,
    /// The file allows inline markup (`.tsx`, `.jsx`)
    pub markup_context: bool,
    /// The syntax tree shows the body returning a markup element
    pub returns_markup: bool,
}

impl<'a> DeclarationFacts<'a> {
    pub fn new(shape: DeclarationShape, name: &'a str, text: &'a str) -> Self {
        Self {
            shape,
            name,
            text,
            initializer: None,
            markup_context: false,
            returns_markup: false,
        }
    }

    #[must_use]
    pub fn with_initializer(mut self, initializer: Option<&'a str>) -> Self {
        self.initializer = initializer;
        self
    }

    #[must_use]
    pub fn in_markup_context(mut self, markup_context: bool) -> Self {
        self.markup_context = markup_context;
        self
    }

    #[must_use]
    pub fn returning_markup(mut self, returns_markup: bool) -> Self {
        self.returns_markup = returns_markup;
        self
    }

    fn initializer_text(&self) -> &'a str {
        self.initializer.unwrap_or("").trim()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Component,
    NotComponent,
}

/// One row of the classification table
pub struct Rule {
    pub name: &'static str,
    pub shapes: &'static [DeclarationShape],
    pub test: fn(&DeclarationFacts<'_>) -> bool,
    pub verdict: Verdict,
}

impl std::fmt::Debug for Rule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rule")
            .field("name", &self.name)
            .field("verdict", &self.verdict)
            .finish()
    }
}

use DeclarationShape::{Class, Function, Variable};

const VERB_PREFIXES: &[&str] = &[
    "get", "set", "create", "build", "make", "do", "run", "execute", "process", "handle",
    "manage", "validate", "parse", "format", "transform", "convert", "generate", "load", "save",
    "fetch", "send", "post", "put", "delete", "update", "find", "search", "filter", "sort", "map",
    "reduce", "forEach", "some", "every", "has", "is", "can", "should", "will", "add", "remove",
    "insert", "append", "prepend", "clear", "reset", "init", "start", "stop", "pause", "resume",
    "toggle", "enable", "disable", "activate", "deactivate", "register", "unregister",
    "subscribe", "unsubscribe", "emit", "on", "off", "once", "use", "apply", "call", "bind",
    "extend", "mixin", "clone", "copy", "merge", "assign", "compare", "equals", "toString",
    "valueOf", "render", "collect", "calculate", "normalize", "resolve", "analyze", "extract",
    "combine", "compile", "decode", "encode", "log", "debug", "warn", "error", "test", "mock",
    "stub", "spy", "watch", "listen", "notify", "trigger", "dispatch", "schedule", "queue",
    "retry", "timeout", "delay", "throttle", "debounce", "cache", "store", "retrieve", "destroy",
    "release", "close", "open", "connect", "disconnect", "authenticate", "authorize", "login",
    "logout", "signup", "signout", "check", "verify", "confirm", "cancel", "reject", "approve",
    "deny", "block", "unblock", "lock", "unlock",
];

const HELPER_SUFFIXES: &[&str] = &[
    "Prompt", "Util", "Utils", "Helper", "Helpers", "Handler", "Handlers", "Service", "Services",
    "Manager", "Managers", "Config", "Configuration", "Factory", "Builder", "Adapter", "Strategy",
    "Provider", "Repository", "Store", "Cache", "Logger", "Router", "Middleware", "Plugin",
    "Tool", "Tools",
];

const BUSINESS_CLASS_SUFFIXES: &[&str] = &[
    "Handler", "Service", "Manager", "Controller", "Provider", "Repository", "Store", "Model",
    "Entity", "DTO", "DAO", "Util", "Utils", "Helper", "Config", "Configuration", "Builder",
    "Factory", "Strategy", "Adapter", "Interceptor", "Middleware", "Analyzer", "Processor",
    "Generator", "Validator", "Transformer", "Converter", "Extractor", "Loader", "Monitor",
    "Client",
];

static VERB_PREFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!("(?i)^(?:{})", VERB_PREFIXES.join("|"))).expect("Invalid regex")
});

static HELPER_SUFFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!("(?i)(?:{})$", HELPER_SUFFIXES.join("|"))).expect("Invalid regex")
});

static BUSINESS_CLASS_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!("(?:{})$|Base[A-Z]", BUSINESS_CLASS_SUFFIXES.join("|")))
        .expect("Invalid regex")
});

static EXTENDS_REACT_COMPONENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)extends\s+(?:React\.)?Component\b").expect("Invalid regex"));

static RENDER_METHOD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"render\s*\(\s*\)\s*\{").expect("Invalid regex"));

static EXTENDS_DOMAIN_BASE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)extends\s+\w*(?:Domain|Service|Base|Manager|Handler|Controller|Provider|Repository|Store|Model|Entity|Util|Helper|Config|Builder|Factory|Strategy|Adapter|Interceptor|Middleware|Analyzer|Processor|Generator|Validator|Transformer|Converter|Extractor|Loader|Monitor|Client)\b")
        .expect("Invalid regex")
});

static EXTENDS_UI_BASE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)extends\s+\w*(?:Component|Widget|Element|View|Page|Dialog|Modal|Panel|Card|Button|Input|Form|Table|List|Grid|Menu|Tab|Tooltip|Popup|Overlay)\b")
        .expect("Invalid regex")
});

static COMPONENT_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)@component\b").expect("Invalid regex"));

static UI_METHOD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:render|paint|draw|show|hide|toggle|focus|blur|click|hover|resize|scroll)\s*\(")
        .expect("Invalid regex")
});

static RETURNS_MARKUP: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"return\s*\(?\s*<[A-Za-z>]").expect("Invalid regex"));

static ARROW_MARKUP: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"=>\s*<|(?s)=>\s*\(.*<|return\s*\(?\s*<").expect("Invalid regex")
});

static CONSTANT_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Z_][A-Z0-9_]*$").expect("Invalid regex"));

static LITERAL_VALUE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?s)^(?:['"`].*['"`]|-?[\d.]+|true|false|null|undefined)$"#).expect("Invalid regex")
});

static PASCAL_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Z][a-zA-Z0-9]*$").expect("Invalid regex"));

static FUNCTION_VALUE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"=>|^(?:async\s+)?function\b").expect("Invalid regex"));

fn has_verb_prefix(name: &str) -> bool {
    // `renderComponent…` names factories that build components
    VERB_PREFIX.is_match(name) && !name.to_lowercase().starts_with("rendercomponent")
}

fn starts_uppercase(name: &str) -> bool {
    name.chars().next().is_some_and(|c| c.is_ascii_uppercase())
}

/// PascalCase for variables, leading capital for everything else
fn has_component_name(facts: &DeclarationFacts<'_>) -> bool {
    match facts.shape {
        Variable => PASCAL_NAME.is_match(facts.name),
        Function | Class => starts_uppercase(facts.name),
    }
}

/// `UPPER_CASE` name, or a literal / object / array initializer
pub fn is_constant(name: &str, initializer: &str) -> bool {
    let init = initializer.trim();
    CONSTANT_NAME.is_match(name)
        || LITERAL_VALUE.is_match(init)
        || (init.starts_with('{') && init.ends_with('}'))
        || (init.starts_with('[') && init.ends_with(']'))
}

fn is_function_value(initializer: &str) -> bool {
    FUNCTION_VALUE.is_match(initializer.trim())
}

/// Ordered classification table
pub static RULES: &[Rule] = &[
    Rule {
        name: "constant value",
        shapes: &[Variable],
        test: |f| is_constant(f.name, f.initializer_text()),
        verdict: Verdict::NotComponent,
    },
    Rule {
        name: "verb-prefixed name",
        shapes: &[Function, Variable],
        test: |f| has_verb_prefix(f.name),
        verdict: Verdict::NotComponent,
    },
    Rule {
        name: "helper suffix",
        shapes: &[Function, Variable],
        test: |f| HELPER_SUFFIX.is_match(f.name),
        verdict: Verdict::NotComponent,
    },
    Rule {
        name: "markup class",
        shapes: &[Class],
        test: |f| {
            f.markup_context
                && (EXTENDS_REACT_COMPONENT.is_match(f.text) || RENDER_METHOD.is_match(f.text))
        },
        verdict: Verdict::Component,
    },
    Rule {
        name: "business class name",
        shapes: &[Class],
        test: |f| BUSINESS_CLASS_NAME.is_match(f.name),
        verdict: Verdict::NotComponent,
    },
    Rule {
        name: "domain superclass",
        shapes: &[Class],
        test: |f| EXTENDS_DOMAIN_BASE.is_match(f.text),
        verdict: Verdict::NotComponent,
    },
    Rule {
        name: "ui superclass",
        shapes: &[Class],
        test: |f| EXTENDS_UI_BASE.is_match(f.text),
        verdict: Verdict::Component,
    },
    Rule {
        name: "component decorator",
        shapes: &[Class],
        test: |f| COMPONENT_MARKER.is_match(f.text),
        verdict: Verdict::Component,
    },
    Rule {
        name: "ui methods in markup module",
        shapes: &[Class],
        test: |f| f.markup_context && UI_METHOD.is_match(f.text) && starts_uppercase(f.name),
        verdict: Verdict::Component,
    },
    Rule {
        name: "returns markup in markup module",
        shapes: &[Function],
        test: |f| f.markup_context && (f.returns_markup || RETURNS_MARKUP.is_match(f.text)),
        verdict: Verdict::Component,
    },
    Rule {
        name: "arrow returns markup in markup module",
        shapes: &[Variable],
        test: |f| {
            f.markup_context && (f.returns_markup || ARROW_MARKUP.is_match(f.initializer_text()))
        },
        verdict: Verdict::Component,
    },
    Rule {
        name: "capitalized and returns markup",
        shapes: &[Function, Variable],
        test: |f| f.returns_markup && has_component_name(f),
        verdict: Verdict::Component,
    },
    Rule {
        name: "capitalized with component context",
        shapes: &[Function, Variable],
        test: |f| {
            has_component_name(f) && (f.markup_context || COMPONENT_MARKER.is_match(f.text))
        },
        verdict: Verdict::Component,
    },
];

/// First rule that fires for these facts
pub fn matching_rule(facts: &DeclarationFacts<'_>) -> Option<&'static Rule> {
    RULES
        .iter()
        .find(|rule| rule.shapes.contains(&facts.shape) && (rule.test)(facts))
}

pub fn is_component(facts: &DeclarationFacts<'_>) -> bool {
    matching_rule(facts).is_some_and(|rule| rule.verdict == Verdict::Component)
}

/// Final entity kind for a declaration
pub fn classify(facts: &DeclarationFacts<'_>) -> EntityKind {
    if is_component(facts) {
        return EntityKind::Component;
    }
    match facts.shape {
        Function => EntityKind::Function,
        Class => EntityKind::Class,
        Variable => {
            let init = facts.initializer_text();
            if is_constant(facts.name, init) {
                EntityKind::Variable
            } else if is_function_value(init) {
                EntityKind::Function
            } else {
                EntityKind::Variable
            }
        }
    }
}

/// Kind guessed from a name alone, for references whose target file cannot be read
pub fn kind_from_name(name: &str, file_kind_is_markup: bool, single_file_component: bool) -> EntityKind {
    const UI_KEYWORDS: &[&str] = &[
        "Component", "Button", "Card", "Modal", "Icon", "Form", "Input", "Dialog", "Panel",
        "Header", "Footer",
    ];

    if single_file_component {
        return EntityKind::Component;
    }
    if CONSTANT_NAME.is_match(name) {
        return EntityKind::Variable;
    }
    if PASCAL_NAME.is_match(name) {
        if file_kind_is_markup || UI_KEYWORDS.iter().any(|kw| name.contains(kw)) {
            return EntityKind::Component;
        }
        return EntityKind::Class;
    }
    EntityKind::Function
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn function(name: &'static str, text: &'static str) -> DeclarationFacts<'static> {
        DeclarationFacts::new(Function, name, text)
    }

    #[test]
    fn markup_returning_function_is_component() {
        let facts = function("Foo", "function Foo() { return <div/> }").in_markup_context(true);
        assert_eq!(classify(&facts), EntityKind::Component);

        let ast_only = function("Foo", "function Foo() { return <div/> }").returning_markup(true);
        assert_eq!(classify(&ast_only), EntityKind::Component);
    }

    #[test]
    fn verb_and_helper_names_are_never_components() {
        let facts = function("getUser", "function getUser() { return <div/> }")
            .in_markup_context(true)
            .returning_markup(true);
        assert_eq!(classify(&facts), EntityKind::Function);
        assert_eq!(matching_rule(&facts).map(|r| r.name), Some("verb-prefixed name"));

        let helper = function("DateUtils", "function DateUtils() {}").in_markup_context(true);
        assert_eq!(classify(&helper), EntityKind::Function);

        let factory = function("renderComponentTree", "function renderComponentTree() {}")
            .in_markup_context(true);
        assert!(matching_rule(&factory).map_or(true, |r| r.name != "verb-prefixed name"));
    }

    #[test]
    fn plain_typescript_capitalized_function_is_function() {
        let facts = function("Parser", "function Parser() { return 1 }");
        assert_eq!(classify(&facts), EntityKind::Function);
    }

    #[test]
    fn variables_split_into_constant_function_component() {
        let constant = DeclarationFacts::new(Variable, "bar", "bar = 1").with_initializer(Some("1"));
        assert_eq!(classify(&constant), EntityKind::Variable);

        let table = DeclarationFacts::new(Variable, "Routes", "Routes = [..]")
            .with_initializer(Some("[{ path: '/' }]"))
            .in_markup_context(true);
        assert_eq!(classify(&table), EntityKind::Variable);

        let helper = DeclarationFacts::new(Variable, "sum", "sum = (a, b) => a + b")
            .with_initializer(Some("(a, b) => a + b"));
        assert_eq!(classify(&helper), EntityKind::Function);

        let card = DeclarationFacts::new(Variable, "Card", "Card = () => <div/>")
            .with_initializer(Some("() => <div/>"))
            .in_markup_context(true);
        assert_eq!(classify(&card), EntityKind::Component);
    }

    #[test]
    fn class_rules_follow_table_order() {
        let react = DeclarationFacts::new(Class, "UserService", "class UserService extends React.Component { render() { return null } }")
            .in_markup_context(true);
        assert_eq!(classify(&react), EntityKind::Component);

        let service = DeclarationFacts::new(Class, "UserService", "class UserService {}");
        assert_eq!(classify(&service), EntityKind::Class);

        let widget = DeclarationFacts::new(Class, "Chart", "class Chart extends BaseWidget {}");
        assert_eq!(classify(&widget), EntityKind::Component);

        let domain = DeclarationFacts::new(Class, "Order", "class Order extends DomainBase {}");
        assert_eq!(classify(&domain), EntityKind::Class);

        let decorated = DeclarationFacts::new(Class, "Panel", "@Component({}) class Panel {}");
        assert_eq!(classify(&decorated), EntityKind::Component);
    }

    #[test]
    fn name_only_fallback() {
        assert_eq!(kind_from_name("MAX_SIZE", false, false), EntityKind::Variable);
        assert_eq!(kind_from_name("Layout", true, false), EntityKind::Component);
        assert_eq!(kind_from_name("SubmitButton", false, false), EntityKind::Component);
        assert_eq!(kind_from_name("Parser", false, false), EntityKind::Class);
        assert_eq!(kind_from_name("parse", false, false), EntityKind::Function);
        assert_eq!(kind_from_name("whatever", false, true), EntityKind::Component);
    }
}
