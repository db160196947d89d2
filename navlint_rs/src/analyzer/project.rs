//! Project model: the symbol-resolution layer the analyzer and generator
//! consume.
//!
//! Each source file is parsed with OXC and reduced to a [`FileModel`]:
//! imports, class declarations (decorators, heritage, properties), top-level
//! marker applications, and a scope-correct map from identifier references to
//! the class they are bound to (via `oxc_semantic`). File models merge into a
//! [`ProjectModel`], which answers the questions the classifier and the proxy
//! generator ask: which classes exist, which are marked, what do they extend,
//! which properties are relationship collections.
//!
//! Resolution failures are never fatal: a file that does not parse yields no
//! model, an unresolved name yields no answer, and analysis degrades to
//! "no diagnostic, no generation" for the affected code.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use oxc_allocator::Allocator;
use oxc_ast::AstKind;
use oxc_ast::ast::*;
use oxc_ast_visit::{Visit, walk};
use oxc_parser::Parser;
use oxc_semantic::SemanticBuilder;
use oxc_span::SourceType;

use crate::types::{COLLECTION_TYPE, MARKER_MODULE, MARKER_NAME, TextSpan};

/// A type reference as written in source: simple name plus the module its
/// local binding was imported from, when it was imported at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeRef {
    pub name: String,
    pub module: Option<String>,
}

impl TypeRef {
    pub fn matches(&self, name: &str, module: &str) -> bool {
        self.name == name && self.module.as_deref() == Some(module)
    }
}

/// A property declared on a class, with its annotated type decomposed into
/// the reference name and first type argument.
#[derive(Debug, Clone)]
pub struct PropertyModel {
    pub name: String,
    pub type_name: Option<String>,
    pub element: Option<String>,
    pub span: TextSpan,
}

impl PropertyModel {
    /// A relationship collection: declared as `Collection<E>` by name.
    pub fn is_collection(&self) -> bool {
        self.type_name.as_deref() == Some(COLLECTION_TYPE)
    }
}

/// A class declaration as the analyzer sees it.
#[derive(Debug, Clone)]
pub struct ClassModel {
    pub name: String,
    pub file: String,
    /// Marker decorator present on the declaration itself.
    pub marked: bool,
    pub extends: Option<TypeRef>,
    pub properties: Vec<PropertyModel>,
    /// Span of the whole declaration, used for incremental regeneration.
    pub span: TextSpan,
}

impl ClassModel {
    pub fn property(&self, name: &str) -> Option<&PropertyModel> {
        self.properties.iter().find(|p| p.name == name)
    }

    pub fn collection_properties(&self) -> impl Iterator<Item = &PropertyModel> {
        self.properties.iter().filter(|p| p.is_collection())
    }
}

/// Everything extracted from a single source file.
#[derive(Debug, Clone, Default)]
pub struct FileModel {
    pub path: String,
    /// Local binding name -> module specifier it was imported from.
    pub imports: HashMap<String, String>,
    pub classes: Vec<ClassModel>,
    /// Classes marked via a top-level `NavigationCollectionProxyGenerated(X)`
    /// call, the form generated artifacts use.
    pub marker_applications: Vec<String>,
    /// Reference span start -> name of the class the identifier is bound to.
    /// Built from `oxc_semantic` symbol references, so it is scope-correct.
    pub bindings: HashMap<u32, String>,
}

impl FileModel {
    pub fn import_module(&self, local: &str) -> Option<&str> {
        self.imports.get(local).map(String::as_str)
    }

    pub fn binding_class(&self, reference_start: u32) -> Option<&str> {
        self.bindings.get(&reference_start).map(String::as_str)
    }
}

/// Merged view over every analyzed file.
#[derive(Debug, Clone, Default)]
pub struct ProjectModel {
    classes: HashMap<String, ClassModel>,
    marked: HashSet<String>,
}

impl ProjectModel {
    pub fn from_files(files: &[FileModel]) -> Self {
        let mut classes = HashMap::new();
        let mut marked = HashSet::new();
        for file in files {
            for class in &file.classes {
                if class.marked {
                    marked.insert(class.name.clone());
                }
                classes.insert(class.name.clone(), class.clone());
            }
            for name in &file.marker_applications {
                marked.insert(name.clone());
            }
        }
        Self { classes, marked }
    }

    pub fn class(&self, name: &str) -> Option<&ClassModel> {
        self.classes.get(name)
    }

    pub fn is_marked(&self, name: &str) -> bool {
        self.marked.contains(name)
    }

    /// Walk the extends chain of a locally-declared class, yielding each
    /// parent reference until one resolves to an imported module (the chain
    /// leaves the project) or the chain ends. Bounded against cycles.
    pub fn heritage(&self, name: &str) -> Vec<TypeRef> {
        let mut out = Vec::new();
        let mut current = name.to_string();
        let mut seen = HashSet::new();
        while seen.insert(current.clone()) {
            let Some(class) = self.classes.get(&current) else { break };
            let Some(parent) = &class.extends else { break };
            out.push(parent.clone());
            if parent.module.is_some() {
                break;
            }
            current = parent.name.clone();
        }
        out
    }

    /// Entity declarations: classes with at least one relationship property,
    /// in stable name order so generation is deterministic.
    pub fn entities(&self) -> Vec<&ClassModel> {
        let mut out: Vec<&ClassModel> = self
            .classes
            .values()
            .filter(|c| c.collection_properties().next().is_some())
            .collect();
        out.sort_by(|a, b| a.name.cmp(&b.name));
        out
    }
}

/// Source type for a path, defaulting to TypeScript the way the rest of the
/// analyzer expects.
pub(crate) fn source_type_for(path: &Path) -> SourceType {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|s| s.to_lowercase())
        .unwrap_or_default();
    SourceType::from_path(path)
        .unwrap_or_default()
        .with_typescript(true)
        .with_jsx(ext == "tsx" || ext == "jsx")
}

struct RawProperty {
    name: String,
    type_name: Option<String>,
    element: Option<String>,
    span: TextSpan,
}

struct RawClass {
    name: String,
    decorators: Vec<String>,
    extends_ident: Option<String>,
    properties: Vec<RawProperty>,
    span: TextSpan,
}

#[derive(Default)]
struct ClassCollector {
    classes: Vec<RawClass>,
}

impl<'a> Visit<'a> for ClassCollector {
    fn visit_class(&mut self, class: &Class<'a>) {
        if let Some(id) = &class.id {
            let decorators = class
                .decorators
                .iter()
                .filter_map(|d| decorator_name(&d.expression))
                .collect();
            let extends_ident = class.super_class.as_ref().and_then(|expr| match expr {
                Expression::Identifier(ident) => Some(ident.name.to_string()),
                _ => None,
            });
            let mut properties = Vec::new();
            for element in &class.body.body {
                if let ClassElement::PropertyDefinition(def) = element
                    && let PropertyKey::StaticIdentifier(key) = &def.key
                {
                    let (type_name, element_type) = def
                        .type_annotation
                        .as_ref()
                        .map(|ann| type_reference_parts(&ann.type_annotation))
                        .unwrap_or((None, None));
                    properties.push(RawProperty {
                        name: key.name.to_string(),
                        type_name,
                        element: element_type,
                        span: def.span.into(),
                    });
                }
            }
            self.classes.push(RawClass {
                name: id.name.to_string(),
                decorators,
                extends_ident,
                properties,
                span: class.span.into(),
            });
        }
        // Nested class expressions still count as declarations.
        walk::walk_class(self, class);
    }
}

fn decorator_name(expr: &Expression) -> Option<String> {
    match expr {
        Expression::Identifier(ident) => Some(ident.name.to_string()),
        Expression::CallExpression(call) => match &call.callee {
            Expression::Identifier(ident) => Some(ident.name.to_string()),
            _ => None,
        },
        _ => None,
    }
}

fn type_reference_parts(ty: &TSType) -> (Option<String>, Option<String>) {
    let TSType::TSTypeReference(reference) = ty else {
        return (None, None);
    };
    let name = match &reference.type_name {
        TSTypeName::IdentifierReference(id) => Some(id.name.to_string()),
        _ => None,
    };
    let element = reference
        .type_arguments
        .as_ref()
        .and_then(|args| args.params.first())
        .and_then(|param| match param {
            TSType::TSTypeReference(inner) => match &inner.type_name {
                TSTypeName::IdentifierReference(id) => Some(id.name.to_string()),
                _ => None,
            },
            _ => None,
        });
    (name, element)
}

fn annotation_class(ann: Option<&TSTypeAnnotation>) -> Option<String> {
    ann.and_then(|a| type_reference_parts(&a.type_annotation).0)
}

fn declarator_class(decl: &VariableDeclarator) -> Option<String> {
    if let Some(Expression::NewExpression(new_expr)) = &decl.init
        && let Expression::Identifier(callee) = &new_expr.callee
    {
        return Some(callee.name.to_string());
    }
    annotation_class(decl.type_annotation.as_deref())
}

fn collect_imports(program: &Program) -> HashMap<String, String> {
    let mut imports = HashMap::new();
    for stmt in &program.body {
        let Statement::ImportDeclaration(decl) = stmt else {
            continue;
        };
        let source = decl.source.value.to_string();
        let Some(specifiers) = &decl.specifiers else {
            continue;
        };
        for spec in specifiers {
            let local = match spec {
                ImportDeclarationSpecifier::ImportSpecifier(s) => s.local.name.to_string(),
                ImportDeclarationSpecifier::ImportDefaultSpecifier(s) => s.local.name.to_string(),
                ImportDeclarationSpecifier::ImportNamespaceSpecifier(s) => s.local.name.to_string(),
            };
            imports.insert(local, source.clone());
        }
    }
    imports
}

fn collect_marker_applications(program: &Program, imports: &HashMap<String, String>) -> Vec<String> {
    if imports.get(MARKER_NAME).map(String::as_str) != Some(MARKER_MODULE) {
        return Vec::new();
    }
    let mut out = Vec::new();
    for stmt in &program.body {
        if let Statement::ExpressionStatement(stmt) = stmt
            && let Expression::CallExpression(call) = &stmt.expression
            && let Expression::Identifier(callee) = &call.callee
            && callee.name == MARKER_NAME
            && call.arguments.len() == 1
            && let Some(Argument::Identifier(target)) = call.arguments.first()
        {
            out.push(target.name.to_string());
        }
    }
    out
}

/// Parse one file into its model. Returns `None` when the file does not
/// parse; the caller decides whether that is worth a warning.
pub fn file_model(path: &Path, relative: &str, source: &str) -> Option<FileModel> {
    let allocator = Allocator::default();
    let ret = Parser::new(&allocator, source, source_type_for(path)).parse();
    if !ret.errors.is_empty() {
        return None;
    }

    let imports = collect_imports(&ret.program);
    let marker_applications = collect_marker_applications(&ret.program, &imports);

    let mut collector = ClassCollector::default();
    collector.visit_program(&ret.program);
    let classes = collector
        .classes
        .into_iter()
        .map(|raw| ClassModel {
            marked: raw.decorators.iter().any(|d| d == MARKER_NAME)
                && imports.get(MARKER_NAME).map(String::as_str) == Some(MARKER_MODULE),
            extends: raw.extends_ident.map(|name| TypeRef {
                module: imports.get(&name).cloned(),
                name,
            }),
            name: raw.name,
            file: relative.to_string(),
            properties: raw
                .properties
                .into_iter()
                .map(|p| PropertyModel {
                    name: p.name,
                    type_name: p.type_name,
                    element: p.element,
                    span: p.span,
                })
                .collect(),
            span: raw.span,
        })
        .collect();

    // Scope-correct identifier resolution: every reference to a local bound
    // by `new C()` or an explicit `: C` annotation maps back to `C`.
    let mut bindings = HashMap::new();
    let semantic_ret = SemanticBuilder::new().build(&ret.program);
    if semantic_ret.errors.is_empty() {
        let semantic = semantic_ret.semantic;
        for symbol_id in semantic.scoping().symbol_ids() {
            let decl = semantic.symbol_declaration(symbol_id);
            let class_name = match decl.kind() {
                AstKind::VariableDeclarator(d) => declarator_class(d),
                AstKind::FormalParameter(p) => annotation_class(p.type_annotation.as_deref()),
                _ => None,
            };
            let Some(class_name) = class_name else { continue };
            for reference in semantic.symbol_references(symbol_id) {
                let span = semantic.reference_span(reference);
                bindings.insert(span.start, class_name.clone());
            }
        }
    }

    Some(FileModel {
        path: relative.to_string(),
        imports,
        classes,
        marker_applications,
        bindings,
    })
}
