//! Navigation-collection access classifier.
//!
//! Walks every static member access in a file and decides whether it is an
//! eager-load usage of a relationship collection on a marked entity:
//!
//! ```ignore
//! // BAD: materializes every related row before counting
//! const count = instance.items.getItems().length;
//!
//! // GOOD: composes on a deferred query
//! const count = instance.itemsQuery().count();
//! ```
//!
//! Classification runs an ordered exemption pipeline, cheapest checks first.
//! The ordering is load-bearing, not cosmetic: this runs for every member
//! access in a program, and the symbol-resolution step must stay last.
//! Each check is an independent function returning continue/exempt/violation,
//! so adding an exemption is a pure extension of the table.
//!
//! The classifier has no side effects and no shared mutable state: it is a
//! pure function of (source, file model, project model) and safe to invoke
//! concurrently across files. Cancellation is checked between access sites,
//! never mid-classification.

use std::collections::HashSet;
use std::path::Path;

use oxc_allocator::Allocator;
use oxc_ast::ast::*;
use oxc_ast_visit::{Visit, walk};
use oxc_parser::Parser;
use oxc_span::GetSpan;
use oxc_syntax::scope::ScopeFlags;

use super::diagnostics::Diagnostic;
use super::project::{FileModel, ProjectModel, TypeRef, source_type_for};
use crate::types::{
    ALLOWED_PROVIDERS, CONTEXT_BASE, CancelToken, NAMEOF_HELPER, PROVIDER_MODULES, TextSpan,
};

/// Classify every access site in one file. Files that fail to parse yield no
/// diagnostics; the project model was built from the same source, so this
/// only happens when the file changed underneath us.
pub fn classify_file(
    path: &Path,
    relative: &str,
    source: &str,
    file: &FileModel,
    project: &ProjectModel,
    cancel: &CancelToken,
) -> Vec<Diagnostic> {
    let allocator = Allocator::default();
    let ret = Parser::new(&allocator, source, source_type_for(path)).parse();
    if !ret.errors.is_empty() {
        return Vec::new();
    }
    let mut visitor = NavigationVisitor {
        source_text: source,
        file_path: relative,
        file,
        project,
        cancel,
        stack: Vec::new(),
        assignment_targets: HashSet::new(),
        diagnostics: Vec::new(),
        cancelled: false,
    };
    visitor.visit_program(&ret.program);
    visitor.diagnostics
}

/// The receiver shape of a member access or call, extracted into owned data
/// so it can live on the context stack.
#[derive(Debug, Clone)]
enum Receiver {
    Ident { name: String, start: u32 },
    This,
    New(String),
    Other,
}

#[derive(Debug, Clone)]
enum Callee {
    /// `helper(...)`
    Ident(String),
    /// `obj.method(...)`
    Member { object: Receiver },
    Other,
}

#[derive(Debug, Clone)]
struct ClassFrame {
    name: Option<String>,
    extends: Option<TypeRef>,
    marked: bool,
}

/// One lexical ancestor of the access site under classification.
#[derive(Debug, Clone)]
enum Frame {
    Call(Callee),
    Arrow { params: usize },
    Function { generator: bool },
    Class(ClassFrame),
}

struct NavigationVisitor<'s, 'm> {
    source_text: &'s str,
    file_path: &'m str,
    file: &'m FileModel,
    project: &'m ProjectModel,
    cancel: &'m CancelToken,
    stack: Vec<Frame>,
    /// Exact spans of assignment left-hand sides seen so far. Targets are
    /// recorded before their subtree is walked.
    assignment_targets: HashSet<(u32, u32)>,
    diagnostics: Vec<Diagnostic>,
    cancelled: bool,
}

impl NavigationVisitor<'_, '_> {
    fn classify(&mut self, access: &StaticMemberExpression<'_>) {
        let ctx = AccessContext {
            access: AccessSite {
                object: receiver_of(&access.object),
                property: access.property.name.to_string(),
                property_span: access.property.span.into(),
                span: access.span.into(),
            },
            stack: &self.stack,
            assignment_targets: &self.assignment_targets,
            file: self.file,
            project: self.project,
        };
        for (_, check) in CHECKS {
            match check(&ctx) {
                Verdict::Continue => {}
                Verdict::Exempt => return,
                Verdict::Violation { property, span } => {
                    self.diagnostics.push(Diagnostic::navigation(
                        self.file_path,
                        self.source_text,
                        span,
                        &property,
                    ));
                    return;
                }
            }
        }
    }
}

impl<'a> Visit<'a> for NavigationVisitor<'_, '_> {
    fn visit_assignment_expression(&mut self, expr: &AssignmentExpression<'a>) {
        let span = expr.left.span();
        self.assignment_targets.insert((span.start, span.end));
        walk::walk_assignment_expression(self, expr);
    }

    fn visit_call_expression(&mut self, call: &CallExpression<'a>) {
        self.stack.push(Frame::Call(callee_of(call)));
        walk::walk_call_expression(self, call);
        self.stack.pop();
    }

    fn visit_arrow_function_expression(&mut self, arrow: &ArrowFunctionExpression<'a>) {
        self.stack.push(Frame::Arrow { params: arrow.params.items.len() });
        walk::walk_arrow_function_expression(self, arrow);
        self.stack.pop();
    }

    fn visit_function(&mut self, func: &Function<'a>, flags: ScopeFlags) {
        self.stack.push(Frame::Function { generator: func.generator });
        walk::walk_function(self, func, flags);
        self.stack.pop();
    }

    fn visit_class(&mut self, class: &Class<'a>) {
        self.stack.push(Frame::Class(class_frame(class, self.file, self.project)));
        walk::walk_class(self, class);
        self.stack.pop();
    }

    fn visit_member_expression(&mut self, member: &MemberExpression<'a>) {
        if let MemberExpression::StaticMemberExpression(access) = member {
            if self.cancelled || self.cancel.is_cancelled() {
                self.cancelled = true;
            } else {
                self.classify(access);
            }
        }
        walk::walk_member_expression(self, member);
    }
}

/// Owned view of the access site under classification.
struct AccessSite {
    object: Receiver,
    property: String,
    property_span: TextSpan,
    span: TextSpan,
}

struct AccessContext<'x> {
    access: AccessSite,
    stack: &'x [Frame],
    assignment_targets: &'x HashSet<(u32, u32)>,
    file: &'x FileModel,
    project: &'x ProjectModel,
}

enum Verdict {
    Continue,
    Exempt,
    Violation { property: String, span: TextSpan },
}

type Check = fn(&AccessContext<'_>) -> Verdict;

/// The exemption pipeline, cheap-to-expensive. Symbol resolution stays last.
const CHECKS: &[(&str, Check)] = &[
    ("assignment-target", check_assignment_target),
    ("nameof", check_nameof),
    ("deferred-body", check_deferred_body),
    ("allowed-class", check_enclosing_class),
    ("query-extension", check_query_extension),
    ("resolve", check_resolution),
];

fn nearest_call<'x>(stack: &'x [Frame]) -> Option<&'x Callee> {
    stack.iter().rev().find_map(|frame| match frame {
        Frame::Call(callee) => Some(callee),
        _ => None,
    })
}

fn nearest_class<'x>(stack: &'x [Frame]) -> Option<&'x ClassFrame> {
    stack.iter().rev().find_map(|frame| match frame {
        Frame::Class(class) => Some(class),
        _ => None,
    })
}

/// The collection reference itself is being replaced, not read.
fn check_assignment_target(ctx: &AccessContext<'_>) -> Verdict {
    let span = ctx.access.span;
    if ctx.assignment_targets.contains(&(span.start, span.end)) {
        Verdict::Exempt
    } else {
        Verdict::Continue
    }
}

/// `nameof(instance.items)` reads the symbol's name, never its value. Only
/// the nearest enclosing invocation counts; `nameof(load(instance.items))`
/// still evaluates the access.
fn check_nameof(ctx: &AccessContext<'_>) -> Verdict {
    match nearest_call(ctx.stack) {
        Some(Callee::Ident(name)) if name == NAMEOF_HELPER => Verdict::Exempt,
        _ => Verdict::Continue,
    }
}

/// Generator bodies defer evaluation until iteration; the surrounding syntax
/// is already lazy.
fn check_deferred_body(ctx: &AccessContext<'_>) -> Verdict {
    let in_generator = ctx
        .stack
        .iter()
        .any(|frame| matches!(frame, Frame::Function { generator: true }));
    if in_generator { Verdict::Exempt } else { Verdict::Continue }
}

/// Persistence-context subclasses (direct base only) and marked entities may
/// touch collections freely. Entities reading their own fields are an
/// accepted false negative for repository-style misuse.
fn check_enclosing_class(ctx: &AccessContext<'_>) -> Verdict {
    let Some(class) = nearest_class(ctx.stack) else {
        return Verdict::Continue;
    };
    if class
        .extends
        .as_ref()
        .is_some_and(|parent| parent.matches(CONTEXT_BASE.0, CONTEXT_BASE.1))
    {
        return Verdict::Exempt;
    }
    if class.marked
        || class
            .name
            .as_deref()
            .is_some_and(|name| ctx.project.is_marked(name))
    {
        return Verdict::Exempt;
    }
    Verdict::Continue
}

/// The access is handed to a query-extension provider, directly or from one
/// level inside a single-parameter lambda passed to such a call.
fn check_query_extension(ctx: &AccessContext<'_>) -> Verdict {
    if let Some(callee) = nearest_call(ctx.stack)
        && provider_allowed(callee, ctx)
    {
        return Verdict::Exempt;
    }
    if let Some(arrow_index) = ctx
        .stack
        .iter()
        .rposition(|frame| matches!(frame, Frame::Arrow { .. }))
        && matches!(ctx.stack[arrow_index], Frame::Arrow { params: 1 })
        && let Some(callee) = nearest_call(&ctx.stack[..arrow_index])
        && provider_allowed(callee, ctx)
    {
        return Verdict::Exempt;
    }
    Verdict::Continue
}

/// Resolve the accessed symbol; violation only for a `Collection`-typed
/// property on a marked entity. Everything unresolvable is exempt by design.
fn check_resolution(ctx: &AccessContext<'_>) -> Verdict {
    let class_name = match &ctx.access.object {
        Receiver::Ident { start, .. } => match ctx.file.binding_class(*start) {
            Some(class) => class.to_string(),
            None => return Verdict::Exempt,
        },
        Receiver::This => {
            let enclosing = ctx.stack.iter().rev().find_map(|frame| match frame {
                Frame::Class(class) => class.name.clone(),
                _ => None,
            });
            match enclosing {
                Some(class) => class,
                None => return Verdict::Exempt,
            }
        }
        Receiver::New(name) => name.clone(),
        Receiver::Other => return Verdict::Exempt,
    };
    let Some(class) = ctx.project.class(&class_name) else {
        return Verdict::Exempt;
    };
    let Some(property) = class.property(&ctx.access.property) else {
        return Verdict::Exempt;
    };
    if !property.is_collection() {
        return Verdict::Exempt;
    }
    if !class.marked && !ctx.project.is_marked(&class.name) {
        return Verdict::Exempt;
    }
    Verdict::Violation {
        span: violation_span(&ctx.access, &property.name),
        property: property.name.clone(),
    }
}

/// Span of the identifier token matching the resolved property name, falling
/// back to the whole access expression when no such token exists.
fn violation_span(access: &AccessSite, property: &str) -> TextSpan {
    if access.property == property {
        access.property_span
    } else {
        access.span
    }
}

fn is_allowed_provider(name: &str, module: &str) -> bool {
    ALLOWED_PROVIDERS
        .iter()
        .any(|(n, m)| *n == name && *m == module)
}

fn provider_allowed(callee: &Callee, ctx: &AccessContext<'_>) -> bool {
    match callee {
        Callee::Ident(name) => ctx
            .file
            .import_module(name)
            .is_some_and(|module| PROVIDER_MODULES.contains(&module)),
        Callee::Member { object } => receiver_provider_allowed(object, ctx),
        Callee::Other => false,
    }
}

fn receiver_provider_allowed(object: &Receiver, ctx: &AccessContext<'_>) -> bool {
    let class_name = match object {
        Receiver::Ident { name, start } => {
            // Static provider call: `Sequences.distinct(...)`.
            if ctx
                .file
                .import_module(name)
                .is_some_and(|module| is_allowed_provider(name, module))
            {
                return true;
            }
            match ctx.file.binding_class(*start) {
                Some(class) => class.to_string(),
                None => return false,
            }
        }
        Receiver::New(name) => name.clone(),
        Receiver::This | Receiver::Other => return false,
    };
    class_ref_allowed(&class_name, ctx)
}

/// An instance receiver is allowed when its class, or any class on its
/// extends chain, is a provider: `EntitySetImpl extends EntitySet`.
fn class_ref_allowed(class_name: &str, ctx: &AccessContext<'_>) -> bool {
    if ctx
        .file
        .import_module(class_name)
        .is_some_and(|module| is_allowed_provider(class_name, module))
    {
        return true;
    }
    ctx.project
        .heritage(class_name)
        .iter()
        .any(|parent| ALLOWED_PROVIDERS.iter().any(|(n, m)| parent.matches(n, m)))
}

fn receiver_of(expr: &Expression<'_>) -> Receiver {
    match expr {
        Expression::Identifier(ident) => Receiver::Ident {
            name: ident.name.to_string(),
            start: ident.span.start,
        },
        Expression::ThisExpression(_) => Receiver::This,
        Expression::NewExpression(new_expr) => match &new_expr.callee {
            Expression::Identifier(ident) => Receiver::New(ident.name.to_string()),
            _ => Receiver::Other,
        },
        _ => Receiver::Other,
    }
}

fn callee_of(call: &CallExpression<'_>) -> Callee {
    match &call.callee {
        Expression::Identifier(ident) => Callee::Ident(ident.name.to_string()),
        Expression::StaticMemberExpression(member) => Callee::Member {
            object: receiver_of(&member.object),
        },
        _ => Callee::Other,
    }
}

fn class_frame(class: &Class<'_>, file: &FileModel, project: &ProjectModel) -> ClassFrame {
    let name = class.id.as_ref().map(|id| id.name.to_string());
    if let Some(name) = &name
        && let Some(model) = project.class(name)
    {
        return ClassFrame {
            name: Some(name.clone()),
            extends: model.extends.clone(),
            marked: model.marked,
        };
    }
    // Anonymous or out-of-model class: resolve heritage from this file alone.
    let extends = class.super_class.as_ref().and_then(|expr| match expr {
        Expression::Identifier(ident) => Some(TypeRef {
            module: file.imports.get(ident.name.as_str()).cloned(),
            name: ident.name.to_string(),
        }),
        _ => None,
    });
    ClassFrame { name, extends, marked: false }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::project::file_model;

    fn run(source: &str) -> Vec<Diagnostic> {
        run_with_token(source, &CancelToken::new())
    }

    fn run_with_token(source: &str, cancel: &CancelToken) -> Vec<Diagnostic> {
        let path = Path::new("test.ts");
        let file = file_model(path, "test.ts", source).expect("fixture should parse");
        let project = ProjectModel::from_files(std::slice::from_ref(&file));
        classify_file(path, "test.ts", source, &file, &project, cancel)
    }

    const PRELUDE: &str = r#"
import { Collection, EntityContext, EntitySet, QueryExtensions } from "@lazyorm/core";
import { Sequences, distinct } from "@lazyorm/query";
import { NavigationCollectionProxyGenerated } from "navlint/runtime";

class TestItem {}

@NavigationCollectionProxyGenerated
class TestA {
  items: Collection<TestItem>;
  name: string;
}
"#;

    fn with_consumer(body: &str) -> String {
        format!(
            "{PRELUDE}\nclass Consumer {{\n  call(): void {{\n    const instance = new TestA();\n{body}\n  }}\n}}\n"
        )
    }

    #[test]
    fn file_with_only_imports_should_not_report() {
        let diags = run("import { Collection } from \"@lazyorm/core\";\n");
        assert!(diags.is_empty());
    }

    #[test]
    fn collection_property_without_usage_should_not_report() {
        assert!(run(PRELUDE).is_empty());
    }

    #[test]
    fn usage_without_marker_should_not_report() {
        let source = r#"
import { Collection } from "@lazyorm/core";

class TestItem {}

class TestA {
  items: Collection<TestItem>;
}

class Consumer {
  call(): void {
    const instance = new TestA();
    const count = instance.items.getItems().length;
  }
}
"#;
        assert!(run(source).is_empty());
    }

    #[test]
    fn assignment_to_collection_should_not_report() {
        let source = with_consumer("    instance.items = new Collection<TestItem>();");
        assert!(run(&source).is_empty());
    }

    #[test]
    fn nameof_usage_should_not_report() {
        let source = with_consumer("    const name = nameof(instance.items);");
        assert!(run(&source).is_empty());
    }

    #[test]
    fn nameof_only_exempts_nearest_invocation() {
        let source = with_consumer("    const name = nameof(load(instance.items));");
        let diags = run(&source);
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].property, "items");
    }

    #[test]
    fn usage_within_entity_context_subclass_should_not_report() {
        let source = format!(
            "{PRELUDE}\nclass Consumer extends EntityContext {{\n  call(): void {{\n    const instance = new TestA();\n    const tmp = instance.items;\n  }}\n}}\n"
        );
        assert!(run(&source).is_empty());
    }

    #[test]
    fn context_subclass_at_two_levels_still_reports() {
        let source = format!(
            "{PRELUDE}\nclass Base extends EntityContext {{}}\n\nclass Consumer extends Base {{\n  call(): void {{\n    const instance = new TestA();\n    const tmp = instance.items;\n  }}\n}}\n"
        );
        let diags = run(&source);
        assert_eq!(diags.len(), 1);
    }

    #[test]
    fn usage_within_marked_class_should_not_report() {
        let source = format!(
            "{PRELUDE}\n@NavigationCollectionProxyGenerated\nclass Repository {{\n  load(): void {{\n    const instance = new TestA();\n    const tmp = instance.items;\n  }}\n}}\n"
        );
        assert!(run(&source).is_empty());
    }

    #[test]
    fn self_access_within_marked_entity_should_not_report() {
        let source = r#"
import { Collection } from "@lazyorm/core";
import { NavigationCollectionProxyGenerated } from "navlint/runtime";

class TestItem {}

@NavigationCollectionProxyGenerated
class TestA {
  items: Collection<TestItem>;

  count(): number {
    return this.items.size;
  }
}
"#;
        assert!(run(source).is_empty());
    }

    #[test]
    fn usage_via_entity_set_subclass_should_not_report() {
        let source = format!(
            "{PRELUDE}\nclass EntitySetImpl extends EntitySet {{\n  callMe(value: object): void {{}}\n}}\n\nclass Consumer {{\n  call(): void {{\n    const instance = new TestA();\n    const set = new EntitySetImpl();\n    set.callMe(instance.items);\n  }}\n}}\n"
        );
        assert!(run(&source).is_empty());
    }

    #[test]
    fn usage_via_sequences_static_call_should_not_report() {
        let source = with_consumer("    Sequences.distinct(instance.items);");
        assert!(run(&source).is_empty());
    }

    #[test]
    fn usage_via_provider_lambda_should_not_report() {
        let source = with_consumer("    QueryExtensions.include(instance, x => x.items);");
        assert!(run(&source).is_empty());
    }

    #[test]
    fn deep_usage_inside_provider_lambda_should_not_report() {
        let source = with_consumer("    Sequences.order(instance, x => x.items.size());");
        assert!(run(&source).is_empty());
    }

    #[test]
    fn usage_via_free_function_from_query_module_should_not_report() {
        let source = with_consumer("    distinct(instance.items);");
        assert!(run(&source).is_empty());
    }

    #[test]
    fn usage_inside_generator_body_should_not_report() {
        let source = format!(
            "{PRELUDE}\nfunction* stream(): Generator<TestItem> {{\n  const instance = new TestA();\n  yield* instance.items;\n}}\n"
        );
        assert!(run(&source).is_empty());
    }

    #[test]
    fn collection_usage_should_report() {
        let source = with_consumer("    instance.items.getItems();");
        let diags = run(&source);
        assert_eq!(diags.len(), 1);
        let diag = &diags[0];
        assert_eq!(diag.id, "EFPA01");
        assert_eq!(diag.severity, "warning");
        assert_eq!(diag.property, "items");
        assert_eq!(diag.message, "Use the itemsQuery() method");
        assert_eq!(diag.span.slice(&source), "items");
    }

    #[test]
    fn chained_collection_usage_reports_at_property_only() {
        let source = with_consumer("    const count = instance.items.getItems().length;");
        let diags = run(&source);
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].span.slice(&source), "items");
        let expected = source.find("instance.items.getItems").unwrap() + "instance.".len();
        assert_eq!(diags[0].span.start as usize, expected);
    }

    #[test]
    fn delayed_collection_usage_reports_at_original_read() {
        let source = with_consumer(
            "    const collection = instance.items;\n    const count = collection.getItems().length;",
        );
        let diags = run(&source);
        assert_eq!(diags.len(), 1);
        let expected = source.find("instance.items;").unwrap() + "instance.".len();
        assert_eq!(diags[0].span.start as usize, expected);
    }

    #[test]
    fn normal_property_usage_should_not_report() {
        let source = with_consumer("    const name = instance.name;");
        assert!(run(&source).is_empty());
    }

    #[test]
    fn computed_access_is_not_an_access_site() {
        let source = with_consumer("    const tmp = instance[\"items\"];");
        assert!(run(&source).is_empty());
    }

    #[test]
    fn two_collection_properties_report_independently() {
        let source = r#"
import { Collection } from "@lazyorm/core";
import { NavigationCollectionProxyGenerated } from "navlint/runtime";

class TestItem {}
class TestTag {}

@NavigationCollectionProxyGenerated
class TestA {
  items: Collection<TestItem>;
  tags: Collection<TestTag>;
}

class Consumer {
  call(): void {
    const instance = new TestA();
    instance.items.getItems();
    instance.tags.getItems();
  }
}
"#;
        let diags = run(source);
        assert_eq!(diags.len(), 2);
        assert_eq!(diags[0].property, "items");
        assert_eq!(diags[1].property, "tags");
        assert_eq!(diags[1].message, "Use the tagsQuery() method");
    }

    #[test]
    fn cancelled_token_stops_reporting() {
        let cancel = CancelToken::new();
        cancel.cancel();
        let source = with_consumer("    instance.items.getItems();");
        assert!(run_with_token(&source, &cancel).is_empty());
    }

    #[test]
    fn violation_span_falls_back_to_whole_access() {
        let site = AccessSite {
            object: Receiver::Other,
            property: "items".to_string(),
            property_span: TextSpan::new(2, 7),
            span: TextSpan::new(0, 7),
        };
        assert_eq!(violation_span(&site, "items"), TextSpan::new(2, 7));
        assert_eq!(violation_span(&site, "renamed"), TextSpan::new(0, 7));
    }
}
