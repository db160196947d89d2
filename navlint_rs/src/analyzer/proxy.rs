//! Deferred-query proxy generator.
//!
//! For every entity declaration (a class with at least one `Collection<E>`
//! property) this emits a companion module
//! `<TypeName>.NavigationCollectionProxy.ts` next to the declaring file:
//! a module augmentation typing one `<prop>Query(): Query<E>` per
//! relationship property, an imperative application of the marker tag, a
//! WeakMap-backed context slot, a context-accepting factory reserved for the
//! persistence runtime, and the prototype-assigned query methods themselves.
//!
//! Output is deterministic: the same declaration always renders to
//! byte-identical text, and a SHA-256 of the declaration source gates
//! incremental regeneration. Failures are isolated per entity and per
//! property: an element type that cannot be resolved skips that one method
//! and surfaces a generator diagnostic instead of emitting invalid output.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::project::{ClassModel, FileModel, ProjectModel};
use crate::types::{MARKER_MODULE, MARKER_NAME};

pub const ARTIFACT_SUFFIX: &str = ".NavigationCollectionProxy.ts";

pub const GENERATED_HEADER: &str = "// <auto-generated>";

/// Stable id for generator-level diagnostics.
pub const GENERATOR_DIAGNOSTIC_ID: &str = "EFPG01";

/// One synthesized companion module.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedArtifact {
    pub entity: String,
    /// Relative path of the artifact file.
    pub path: String,
    pub text: String,
}

/// A non-fatal generation problem, reported instead of invalid output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratorDiagnostic {
    pub id: String,
    pub entity: String,
    pub property: String,
    pub message: String,
}

impl GeneratorDiagnostic {
    fn unresolved_element(entity: &str, property: &str, element: Option<&str>) -> Self {
        let element = element.unwrap_or("<missing>");
        Self {
            id: GENERATOR_DIAGNOSTIC_ID.to_string(),
            entity: entity.to_string(),
            property: property.to_string(),
            message: format!(
                "could not resolve element type '{element}' for '{entity}.{property}'; no query method generated"
            ),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeneratorOutput {
    pub artifacts: Vec<GeneratedArtifact>,
    pub diagnostics: Vec<GeneratorDiagnostic>,
    /// Entities skipped because their declaration hash matched the cache.
    pub up_to_date: usize,
}

/// Declaration-hash cache backing incremental regeneration, persisted under
/// `.navlint/proxies.json`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProxyCache {
    pub entries: HashMap<String, String>,
}

impl ProxyCache {
    pub fn load(path: &Path) -> Self {
        std::fs::read_to_string(path)
            .ok()
            .and_then(|raw| serde_json::from_str(&raw).ok())
            .unwrap_or_default()
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}

/// Source of the `navlint/runtime` module: the marker tag itself. Emitted by
/// the tool so hosts and test harnesses can inject it without a package
/// install.
pub fn runtime_module_source() -> &'static str {
    r#"// <auto-generated>
/**
 * Marker applied to every class extended by the navigation proxy generator.
 * Recognized by the analyzer by name and module. Usable as a class decorator
 * or applied directly to a class object.
 */
export function NavigationCollectionProxyGenerated(target: unknown): unknown {
  return target;
}
"#
}

fn declaration_hash(source: &str, class: &ClassModel) -> String {
    let digest = Sha256::digest(class.span.slice(source).as_bytes());
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

/// Module specifier for importing `to_file` from a module living in
/// `from_dir`, extension stripped.
fn relative_specifier(from_dir: &Path, to_file: &Path) -> String {
    let stem = to_file.with_extension("");
    let from: Vec<Component> = from_dir.components().collect();
    let to: Vec<Component> = stem.components().collect();
    let common = from.iter().zip(to.iter()).take_while(|(a, b)| a == b).count();
    let mut parts: Vec<String> = Vec::new();
    if from.len() == common {
        parts.push(".".to_string());
    } else {
        for _ in common..from.len() {
            parts.push("..".to_string());
        }
    }
    for component in &to[common..] {
        parts.push(component.as_os_str().to_string_lossy().into_owned());
    }
    parts.join("/")
}

/// Ordered import list: first-use order, one line per specifier.
#[derive(Default)]
struct ImportTable {
    entries: Vec<(String, Vec<String>)>,
}

impl ImportTable {
    fn add(&mut self, specifier: &str, name: &str) {
        if let Some((_, names)) = self.entries.iter_mut().find(|(s, _)| s == specifier) {
            if !names.iter().any(|n| n == name) {
                names.push(name.to_string());
            }
        } else {
            self.entries.push((specifier.to_string(), vec![name.to_string()]));
        }
    }

    fn render(&self) -> String {
        let mut out = String::new();
        for (specifier, names) in &self.entries {
            out.push_str(&format!("import {{ {} }} from \"{}\";\n", names.join(", "), specifier));
        }
        out
    }
}

struct QueryMethod {
    property: String,
    element: String,
    element_specifier: String,
}

/// Resolve where a relationship element type can be imported from: the
/// entity file's own imports first, then the project-wide class table.
fn resolve_element(
    element: &str,
    entity_dir: &Path,
    file: &FileModel,
    project: &ProjectModel,
) -> Option<String> {
    if let Some(module) = file.import_module(element) {
        return Some(module.to_string());
    }
    project
        .class(element)
        .map(|class| relative_specifier(entity_dir, Path::new(&class.file)))
}

/// Render one entity's companion module. Returns `None` (with diagnostics)
/// when not a single query method could be generated.
fn render_entity(
    entity: &ClassModel,
    file: &FileModel,
    project: &ProjectModel,
) -> (Option<String>, Vec<GeneratorDiagnostic>) {
    let entity_dir = Path::new(&entity.file).parent().unwrap_or(Path::new(""));
    let entity_specifier = relative_specifier(entity_dir, Path::new(&entity.file));

    let mut methods = Vec::new();
    let mut diagnostics = Vec::new();
    for property in entity.collection_properties() {
        let resolved = property
            .element
            .as_deref()
            .and_then(|element| {
                resolve_element(element, entity_dir, file, project)
                    .map(|specifier| (element.to_string(), specifier))
            });
        match resolved {
            Some((element, element_specifier)) => methods.push(QueryMethod {
                property: property.name.clone(),
                element,
                element_specifier,
            }),
            None => diagnostics.push(GeneratorDiagnostic::unresolved_element(
                &entity.name,
                &property.name,
                property.element.as_deref(),
            )),
        }
    }
    if methods.is_empty() {
        return (None, diagnostics);
    }

    let mut imports = ImportTable::default();
    imports.add("@lazyorm/core", "EntityContext");
    imports.add("@lazyorm/core", "Query");
    imports.add(MARKER_MODULE, MARKER_NAME);
    imports.add(&entity_specifier, &entity.name);
    for method in &methods {
        imports.add(&method.element_specifier, &method.element);
    }

    let name = &entity.name;
    let mut out = String::new();
    out.push_str(GENERATED_HEADER);
    out.push('\n');
    out.push_str(&imports.render());
    out.push('\n');

    out.push_str(&format!("declare module \"{entity_specifier}\" {{\n"));
    out.push_str(&format!("  interface {name} {{\n"));
    for method in &methods {
        out.push_str(&format!(
            "    {}Query(): Query<{}>;\n",
            method.property, method.element
        ));
    }
    out.push_str("  }\n}\n\n");

    out.push_str(&format!("{MARKER_NAME}({name});\n\n"));
    out.push_str(&format!(
        "const attachedContexts = new WeakMap<{name}, EntityContext>();\n\n"
    ));

    out.push_str(&format!(
        "/**\n * Factory for the persistence runtime. Don't use it! You have been warned.\n */\nexport function attach{name}(context: EntityContext): {name} {{\n  const entity = new {name}();\n  attachedContexts.set(entity, context);\n  return entity;\n}}\n"
    ));

    for method in &methods {
        let property = &method.property;
        let element = &method.element;
        out.push_str(&format!(
            "\n/**\n * Gets a Query for the {name}.{property} collection.\n * Use this to avoid eager-load of all related entities.\n */\n{name}.prototype.{property}Query = function (): Query<{element}> {{\n  const context = attachedContexts.get(this);\n  if (context == null) {{\n    return Query.from(this.{property});\n  }}\n\n  const entityEntry = context.entry(this);\n  const collectionEntry = entityEntry.collection(\"{property}\");\n  return collectionEntry.query<{element}>();\n}};\n"
        ));
    }

    (Some(out), diagnostics)
}

/// Generate companion modules for every entity in the project. Entities
/// whose declaration hash is unchanged in `cache` are skipped; everything
/// else regenerates and updates the cache. Failures never cross entity
/// boundaries.
pub fn generate(
    project: &ProjectModel,
    files: &[FileModel],
    sources: &HashMap<String, String>,
    cache: &mut ProxyCache,
) -> GeneratorOutput {
    let by_path: HashMap<&str, &FileModel> =
        files.iter().map(|f| (f.path.as_str(), f)).collect();

    let mut output = GeneratorOutput::default();
    for entity in project.entities() {
        let Some(file) = by_path.get(entity.file.as_str()) else {
            continue;
        };
        let Some(source) = sources.get(&entity.file) else {
            continue;
        };
        let hash = declaration_hash(source, entity);
        if cache.entries.get(&entity.name) == Some(&hash) {
            output.up_to_date += 1;
            continue;
        }
        let (text, mut diagnostics) = render_entity(entity, file, project);
        output.diagnostics.append(&mut diagnostics);
        if let Some(text) = text {
            let dir = Path::new(&entity.file).parent().unwrap_or(Path::new(""));
            let path: PathBuf = dir.join(format!("{}{}", entity.name, ARTIFACT_SUFFIX));
            output.artifacts.push(GeneratedArtifact {
                entity: entity.name.clone(),
                path: path.to_string_lossy().into_owned(),
                text,
            });
            cache.entries.insert(entity.name.clone(), hash);
        }
    }
    output
}
