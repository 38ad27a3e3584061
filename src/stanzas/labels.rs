use handlebars::Handlebars;
use tracing::warn;

use crate::config::DisplayConfig;

use super::SessionSnapshot;

/// Renders the user's display format strings against a [`SessionSnapshot`].
pub struct Labels {
    registry: Handlebars<'static>,
    display: DisplayConfig,
}

impl Labels {
    pub fn new(display: DisplayConfig) -> Self {
        let mut registry = Handlebars::new();
        registry.register_escape_fn(handlebars::no_escape);
        Self { registry, display }
    }

    pub fn header(&self, snapshot: &SessionSnapshot) -> Option<String> {
        self.display
            .show_header
            .then(|| self.render(&self.display.header_format, snapshot))
    }

    /// `None` while no section is active.
    pub fn section(&self, snapshot: &SessionSnapshot) -> Option<String> {
        if !self.display.show_section || snapshot.index.is_none() {
            return None;
        }
        Some(self.render(&self.display.section_format, snapshot))
    }

    pub fn progress(&self, snapshot: &SessionSnapshot) -> String {
        self.render(&self.display.progress_format, snapshot)
    }

    fn render(&self, template: &str, snapshot: &SessionSnapshot) -> String {
        match self.registry.render_template(template, snapshot) {
            Ok(rendered) => rendered,
            Err(e) => {
                warn!(template, "invalid display format: {e}");
                template.to_owned()
            }
        }
    }
}
