//! Bundler collaborator.
//!
//! # Responsibilities
//! - Turn a component source file into browser-ready JavaScript
//! - Mount the component on the page root with the injected initial props
//!
//! # Design Decisions
//! - The build tool is an external program; stdout is the bundle
//! - The hydration entry is written next to the component so relative
//!   imports resolve, and is removed whether or not the build succeeds

use std::path::{Path, PathBuf};
use std::process::Stdio;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use thiserror::Error;
use tokio::process::Command;

/// Build options passed to the bundler.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BundleOptions {
    pub minify: bool,
    pub sourcemap: bool,
}

/// Errors raised while bundling a component.
#[derive(Debug, Error)]
pub enum BundleError {
    /// Component source file does not exist.
    #[error("Component file not found: {}", .0.display())]
    NotFound(PathBuf),

    /// Reading the source or writing the entry file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The build program could not be started.
    #[error("Failed to start `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The build program exited unsuccessfully.
    #[error("Bundle build failed: {0}")]
    Build(String),

    /// The build output was not valid UTF-8.
    #[error("Bundle output is not valid UTF-8")]
    Encoding,
}

/// Turns a component file into JavaScript.
pub trait Bundler: Send + Sync {
    fn bundle<'a>(
        &'a self,
        entry: &'a Path,
        options: &'a BundleOptions,
    ) -> BoxFuture<'a, Result<String, BundleError>>;
}

/// Bundler that shells out to a build program such as `esbuild`.
#[derive(Debug, Clone)]
pub struct CommandBundler {
    program: String,
    args: Vec<String>,
}

impl Default for CommandBundler {
    fn default() -> Self {
        Self::new("esbuild", ["--bundle", "--format=esm"])
    }
}

impl CommandBundler {
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    async fn build(&self, component: &Path, options: &BundleOptions) -> Result<String, BundleError> {
        if !tokio::fs::try_exists(component).await? {
            return Err(BundleError::NotFound(component.to_path_buf()));
        }

        let dir = component.parent().unwrap_or_else(|| Path::new("."));
        let entry = dir.join(format!(".entry-{}.js", uuid::Uuid::new_v4().simple()));
        tokio::fs::write(&entry, hydration_entry(component)).await?;

        let result = self.run(&entry, options).await;
        if let Err(e) = tokio::fs::remove_file(&entry).await {
            tracing::warn!(entry = %entry.display(), error = %e, "Failed to remove bundle entry file");
        }
        result
    }

    async fn run(&self, entry: &Path, options: &BundleOptions) -> Result<String, BundleError> {
        let mut command = Command::new(&self.program);
        command.args(&self.args);
        if options.minify {
            command.arg("--minify");
        }
        if options.sourcemap {
            command.arg("--sourcemap=inline");
        }
        command
            .arg(entry)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        tracing::debug!(program = %self.program, entry = %entry.display(), "Running bundler");
        let output = command.output().await.map_err(|source| BundleError::Spawn {
            program: self.program.clone(),
            source,
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(BundleError::Build(if stderr.is_empty() {
                format!("{} exited with {}", self.program, output.status)
            } else {
                stderr
            }));
        }

        String::from_utf8(output.stdout).map_err(|_| BundleError::Encoding)
    }
}

impl Bundler for CommandBundler {
    fn bundle<'a>(
        &'a self,
        entry: &'a Path,
        options: &'a BundleOptions,
    ) -> BoxFuture<'a, Result<String, BundleError>> {
        self.build(entry, options).boxed()
    }
}

/// Entry module that mounts the component's default export.
fn hydration_entry(component: &Path) -> String {
    let file = component
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    format!(
        r#"import {{ createElement }} from "react";
import {{ createRoot }} from "react-dom/client";
import Component from "./{file}";

const props = window.__INITIAL_PROPS__ || {{}};
const root = document.getElementById(window.__ROOT_ID__ || "root");
if (root) {{
  createRoot(root).render(createElement(Component, props));
}}
"#
    )
}
