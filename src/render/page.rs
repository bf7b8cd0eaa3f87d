//! Page renderer.
//!
//! # Responsibilities
//! - Resolve a page descriptor against the request
//! - Static pages: render the content on the server
//! - SPA pages: bundle the content component and reference it by hash
//!
//! # Design Decisions
//! - Content render errors become an inline error fragment
//! - Bundling problems degrade to a page without client scripts

use std::sync::Arc;

use crate::bundle::{
    BundleCache, ComponentRegistry, ComponentWatcher, PropsCache, BUNDLE_PREFIX, PROPS_PREFIX,
};
use crate::descriptor::page::{PageDescriptor, ResolvedPage, ScriptTag};
use crate::http::context::RequestContext;
use crate::http::error::DispatchError;
use crate::render::component::Component;
use crate::render::html::{document, escape_html};

/// A page ready to send.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedPage {
    pub html: String,
    pub status: u16,
    pub headers: Vec<(String, String)>,
}

/// Renders page descriptors to HTML documents.
#[derive(Debug, Clone)]
pub struct PageRenderer {
    registry: Arc<ComponentRegistry>,
    bundles: Arc<BundleCache>,
    props: Arc<PropsCache>,
    watcher: Option<Arc<ComponentWatcher>>,
}

impl PageRenderer {
    pub fn new(registry: Arc<ComponentRegistry>, bundles: Arc<BundleCache>, props: Arc<PropsCache>) -> Self {
        Self {
            registry,
            bundles,
            props,
            watcher: None,
        }
    }

    /// Watch bundled component files for changes.
    pub fn with_watcher(mut self, watcher: Arc<ComponentWatcher>) -> Self {
        self.watcher = Some(watcher);
        self
    }

    pub fn registry(&self) -> &Arc<ComponentRegistry> {
        &self.registry
    }

    pub fn bundles(&self) -> &Arc<BundleCache> {
        &self.bundles
    }

    pub fn props(&self) -> &Arc<PropsCache> {
        &self.props
    }

    pub fn watcher(&self) -> Option<&Arc<ComponentWatcher>> {
        self.watcher.as_ref()
    }

    pub async fn render(&self, page: &PageDescriptor, ctx: &RequestContext) -> Result<RenderedPage, DispatchError> {
        let resolved = page.resolve(ctx)?;

        let html = if page.is_spa() {
            let scripts = match page.component() {
                Some(component) => self.client_scripts(component.as_ref(), &resolved).await?,
                None => Vec::new(),
            };
            document(&resolved, "", &scripts)
        } else {
            let content = page.component().map(|c| server_content(c.as_ref())).unwrap_or_default();
            document(&resolved, &content, &[])
        };

        Ok(RenderedPage {
            html,
            status: resolved.status,
            headers: resolved.headers,
        })
    }

    /// Props and bundle scripts for an SPA component, or none if the
    /// component cannot be bundled.
    async fn client_scripts(
        &self,
        component: &dyn Component,
        page: &ResolvedPage,
    ) -> Result<Vec<ScriptTag>, DispatchError> {
        let Some(path) = self.registry.resolve(component.name()) else {
            tracing::warn!(
                component = %component.name(),
                "Could not locate SPA component source; register it or add a \"use spa\" directive"
            );
            return Ok(Vec::new());
        };

        let bundle = match self.bundles.get_or_build(&path).await {
            Ok(bundle) => bundle,
            Err(e) => {
                tracing::error!(component = %component.name(), path = %path.display(), error = %e, "Failed to bundle SPA component");
                return Ok(Vec::new());
            }
        };

        if let Some(watcher) = &self.watcher {
            if let Err(e) = watcher.watch(&bundle.path) {
                tracing::warn!(path = %bundle.path.display(), error = %e, "Failed to watch component file");
            }
        }

        let props_hash = self.props.insert(&component.props(), &page.root_id)?;
        Ok(vec![
            ScriptTag::src(format!("{PROPS_PREFIX}/{props_hash}.js")),
            ScriptTag::src(format!("{BUNDLE_PREFIX}/{}.js", bundle.hash)).module(),
        ])
    }
}

fn server_content(component: &dyn Component) -> String {
    match component.render_to_markup() {
        Ok(html) => html,
        Err(e) => {
            tracing::error!(component = %component.name(), error = %e, "Error rendering page content");
            format!("<div>Error rendering content: {}</div>", escape_html(&e.to_string()))
        }
    }
}
