#![deny(missing_docs)]

//! # Test Strategy Trait
//!
//! Defines the interface required to render tests for a specific test
//! framework (e.g. pytest, Rust integration tests).

use crate::fingerprint::Fingerprint;
use crate::generator::{TestCase, TestPlan};
use crate::markers::MarkerStyle;

/// A strategy trait for decoupling framework-specific test rendering.
///
/// Implementors define file naming, comment syntax, and how a single
/// `TestCase` becomes source text. The region layout is shared.
pub trait TestStrategy: Send + Sync {
    /// Short identifier (e.g. `pytest`).
    fn name(&self) -> &'static str;

    /// Line comment prefix of the target language.
    fn comment_prefix(&self) -> &'static str;

    /// Marker syntax derived from the comment prefix.
    fn markers(&self) -> MarkerStyle {
        MarkerStyle::new(self.comment_prefix())
    }

    /// File name for an artifact stem (e.g. `test_get_pet.py`).
    fn file_name(&self, stem: &str) -> String;

    /// Whether a file name follows this framework's naming convention.
    fn matches_file_name(&self, name: &str) -> bool;

    /// Imports and shared helpers emitted once per region.
    ///
    /// # Arguments
    ///
    /// * `base_url` - Server URL the tests target.
    fn render_prelude(&self, base_url: &str) -> String;

    /// Renders one test function.
    fn render_case(&self, case: &TestCase, base_url: &str) -> String;

    /// Renders the region content (between begin and end markers):
    /// identity line, prelude, then every case in plan order.
    ///
    /// `options` is the generation-options digest recorded in the identity line.
    fn render_region(
        &self,
        plan: &TestPlan,
        fingerprint: &Fingerprint,
        options: &str,
        base_url: &str,
    ) -> String {
        let mut code = String::new();
        code.push_str(&self.markers().identity_line(
            &plan.endpoint,
            fingerprint,
            plan.test_type(),
            options,
        ));
        code.push_str("\n\n");
        code.push_str(&self.render_prelude(base_url));
        for case in &plan.cases {
            code.push('\n');
            code.push_str(&self.render_case(case, base_url));
        }
        code
    }
}
