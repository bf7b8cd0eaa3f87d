//! Component source registry.
//!
//! Maps component names to source files. Entries come from explicit
//! registration or from [`ComponentRegistry::discover`], which scans source
//! directories once at startup for files opting in with a `"use spa"`
//! directive line.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use dashmap::DashMap;
use regex::Regex;
use walkdir::{DirEntry, WalkDir};

pub const DEFAULT_COMPONENT_DIRS: [&str; 4] = ["src", "app", "pages", "components"];
pub const DEFAULT_COMPONENT_EXCLUDE: [&str; 5] = ["node_modules", "dist", "build", ".next", ".git"];

const COMPONENT_EXTENSIONS: [&str; 4] = ["ts", "tsx", "js", "jsx"];

/// Component name → absolute source path.
#[derive(Debug, Default)]
pub struct ComponentRegistry {
    components: DashMap<String, PathBuf>,
}

impl ComponentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a component. Relative paths resolve against the working
    /// directory. Re-registering a name replaces the earlier path.
    pub fn register(&self, name: impl Into<String>, path: impl AsRef<Path>) {
        let name = name.into();
        let path = absolutize(path.as_ref());
        if let Some(previous) = self.components.insert(name.clone(), path.clone()) {
            if previous != path {
                tracing::warn!(
                    component = %name,
                    previous = %previous.display(),
                    path = %path.display(),
                    "Component registered twice; keeping the latest path"
                );
            }
        }
    }

    pub fn resolve(&self, name: &str) -> Option<PathBuf> {
        self.components.get(name).map(|entry| entry.value().clone())
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Scan `dirs` under `root` for `"use spa"` components.
    ///
    /// Excluded names and dot-directories are skipped. Missing directories
    /// are ignored. Returns the number of components registered.
    pub fn discover<S: AsRef<str>>(&self, root: &Path, dirs: &[S], exclude: &[S]) -> usize {
        let mut found = 0;
        for dir in dirs {
            let dir = root.join(dir.as_ref());
            if !dir.is_dir() {
                continue;
            }

            let walker = WalkDir::new(&dir)
                .follow_links(false)
                .into_iter()
                .filter_entry(|entry| entry.depth() == 0 || !is_excluded(entry, exclude));

            for entry in walker {
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(e) => {
                        tracing::warn!(dir = %dir.display(), error = %e, "Failed to scan component directory");
                        continue;
                    }
                };
                if !entry.file_type().is_file() || !has_component_extension(entry.path()) {
                    continue;
                }

                let Ok(source) = std::fs::read_to_string(entry.path()) else {
                    continue;
                };
                if !has_spa_directive(&source) {
                    continue;
                }

                let name = exported_component_name(&source).unwrap_or_else(|| file_stem(entry.path()));
                tracing::info!(component = %name, path = %entry.path().display(), "Discovered SPA component");
                self.register(name, entry.path());
                found += 1;
            }
        }
        found
    }
}

fn absolutize(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    std::env::current_dir()
        .map(|cwd| cwd.join(path))
        .unwrap_or_else(|_| path.to_path_buf())
}

fn is_excluded<S: AsRef<str>>(entry: &DirEntry, exclude: &[S]) -> bool {
    if !entry.file_type().is_dir() {
        return false;
    }
    let name = entry.file_name().to_string_lossy();
    name.starts_with('.') || exclude.iter().any(|pattern| pattern.as_ref() == name)
}

fn has_component_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| COMPONENT_EXTENSIONS.contains(&ext))
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn regex(cell: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(pattern).expect("static regex"))
}

/// A line consisting of `"use spa"` or `'use spa'`, optionally with `;`.
pub fn has_spa_directive(source: &str) -> bool {
    static DIRECTIVE: OnceLock<Regex> = OnceLock::new();
    regex(&DIRECTIVE, r#"(?m)^['"]use spa['"];?\s*$"#).is_match(source)
}

/// Name of the component a module exports, if it can be told from source.
pub fn exported_component_name(source: &str) -> Option<String> {
    static DEFAULT_DECL: OnceLock<Regex> = OnceLock::new();
    static DEFAULT_IDENT: OnceLock<Regex> = OnceLock::new();
    static NAMED_DECL: OnceLock<Regex> = OnceLock::new();

    if let Some(caps) = regex(&DEFAULT_DECL, r"export\s+default\s+(?:function|const|class)\s+(\w+)").captures(source) {
        return Some(caps[1].to_string());
    }

    if let Some(caps) = regex(&DEFAULT_IDENT, r"export\s+default\s+(\w+)").captures(source) {
        let name = &caps[1];
        if source.contains(&format!("const {name}")) || source.contains(&format!("function {name}")) {
            return Some(name.to_string());
        }
    }

    regex(&NAMED_DECL, r"export\s+(?:function|const)\s+(\w+)")
        .captures(source)
        .map(|caps| caps[1].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_directive_detection() {
        assert!(has_spa_directive("\"use spa\";\nexport default 1"));
        assert!(has_spa_directive("// header\n'use spa'\n"));
        assert!(!has_spa_directive("const x = \"use spa\";"));
    }

    #[test]
    fn test_exported_names() {
        assert_eq!(
            exported_component_name("export default function Counter() {}").as_deref(),
            Some("Counter")
        );
        assert_eq!(
            exported_component_name("const Clock = () => null;\nexport default Clock;").as_deref(),
            Some("Clock")
        );
        assert_eq!(exported_component_name("export default Imported;"), None);
        assert_eq!(
            exported_component_name("export const Widget = () => null;").as_deref(),
            Some("Widget")
        );
    }

    #[test]
    fn test_discover_skips_excluded_dirs() {
        let root = tempfile::tempdir().unwrap();
        let src = root.path().join("src");
        fs::create_dir_all(src.join("widgets")).unwrap();
        fs::create_dir_all(src.join("node_modules/pkg")).unwrap();
        fs::create_dir_all(src.join(".cache")).unwrap();

        fs::write(src.join("widgets/Counter.tsx"), "\"use spa\";\nexport default function Counter() {}").unwrap();
        fs::write(src.join("widgets/Plain.tsx"), "export default function Plain() {}").unwrap();
        fs::write(src.join("stem.jsx"), "'use spa'\nexport default Imported;").unwrap();
        fs::write(src.join("node_modules/pkg/Hidden.tsx"), "\"use spa\";\nexport default function Hidden() {}").unwrap();
        fs::write(src.join(".cache/Dot.tsx"), "\"use spa\";\nexport default function Dot() {}").unwrap();
        fs::write(src.join("notes.md"), "\"use spa\"").unwrap();

        let registry = ComponentRegistry::new();
        let found = registry.discover(root.path(), &["src", "pages"], &["node_modules"]);

        assert_eq!(found, 2);
        assert_eq!(registry.resolve("Counter"), Some(src.join("widgets/Counter.tsx")));
        assert_eq!(registry.resolve("stem"), Some(src.join("stem.jsx")));
        assert!(registry.resolve("Hidden").is_none());
        assert!(registry.resolve("Dot").is_none());
        assert!(registry.resolve("Plain").is_none());
    }

    #[test]
    fn test_register_relative_path() {
        let registry = ComponentRegistry::new();
        registry.register("App", "web/App.tsx");
        let path = registry.resolve("App").unwrap();
        assert!(path.is_absolute());
        assert!(path.ends_with("web/App.tsx"));
    }
}
