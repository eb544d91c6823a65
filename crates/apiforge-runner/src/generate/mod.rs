//! Heuristic test generation
//!
//! Walks the resolved endpoints and emits [`TestCase`]s per category.
//! Single-endpoint categories live in [`single`], cross-endpoint flows in
//! [`flows`]. Status-code expectations here are advisory: the verdict policy
//! in `apiforge_core::verdict` decides what a rejection-seeking case accepts.

pub mod assertions;
mod flows;
pub mod mutate;
mod single;

use apiforge_core::{EndpointFilter, Fixtures, TestCase, TestCategory};

use crate::datagen::{PayloadSynthesizer, SamplePayload, value_to_param_string};
use crate::spec::{EndpointDescriptor, ResolvedSpec};

pub use assertions::{assertions_for, expected_status};

/// Schema-driven generator for every [`TestCategory`].
#[derive(Debug, Clone)]
pub struct HeuristicGenerator<'a> {
    spec: &'a ResolvedSpec,
    synth: PayloadSynthesizer,
}

impl<'a> HeuristicGenerator<'a> {
    #[must_use]
    pub fn new(spec: &'a ResolvedSpec) -> Self {
        Self {
            spec,
            synth: PayloadSynthesizer::new(),
        }
    }

    #[must_use]
    pub fn with_fixtures(mut self, fixtures: Fixtures) -> Self {
        self.synth = self.synth.with_fixtures(fixtures);
        self
    }

    #[must_use]
    pub fn synthesizer(&self) -> &PayloadSynthesizer {
        &self.synth
    }

    /// Generate cases for the selected endpoints and enabled categories.
    ///
    /// `None` or an empty slice selects everything. Per-endpoint categories
    /// come first in document order, then CRUD, integration and e2e flows.
    #[must_use]
    pub fn generate_all_tests(
        &self,
        selected: Option<&[EndpointFilter]>,
        enabled: Option<&[TestCategory]>,
    ) -> Vec<TestCase> {
        let endpoints = self.select(selected);
        let enabled: Vec<TestCategory> = match enabled {
            Some(list) if !list.is_empty() => list.to_vec(),
            _ => TestCategory::ALL.to_vec(),
        };

        let mut cases = Vec::new();
        for endpoint in &endpoints {
            let before = cases.len();
            for &category in enabled.iter().filter(|c| !c.is_cross_endpoint()) {
                cases.extend(self.cases_for(endpoint, category));
            }
            tracing::debug!(
                endpoint = %endpoint.label(),
                cases = cases.len() - before,
                "generated endpoint cases"
            );
        }

        let groups = flows::group_by_resource(&endpoints);
        if enabled.contains(&TestCategory::Crud) {
            cases.extend(flows::crud(self, &groups));
        }
        if enabled.contains(&TestCategory::Integration) {
            cases.extend(flows::integration(self, &groups));
        }
        if enabled.contains(&TestCategory::E2e) {
            cases.extend(flows::e2e(self, &groups));
        }

        tracing::info!(
            endpoints = endpoints.len(),
            cases = cases.len(),
            "heuristic generation finished"
        );
        cases
    }

    /// Cases of one single-endpoint category.
    #[must_use]
    pub fn cases_for(&self, endpoint: &EndpointDescriptor, category: TestCategory) -> Vec<TestCase> {
        match category {
            TestCategory::HappyPath => single::happy_path(self, endpoint),
            TestCategory::Negative => single::negative(self, endpoint),
            TestCategory::Boundary => single::boundary(self, endpoint),
            TestCategory::Validation => single::validation(self, endpoint),
            TestCategory::Security => single::security(self, endpoint),
            TestCategory::Performance => single::performance(self, endpoint),
            TestCategory::Crud | TestCategory::Integration | TestCategory::E2e => Vec::new(),
        }
    }

    fn select(&self, selected: Option<&[EndpointFilter]>) -> Vec<&'a EndpointDescriptor> {
        self.spec.select(selected.unwrap_or_default())
    }

    /// `POST /{resource}` in the full document, regardless of selection.
    fn create_endpoint(&self, resource: &str) -> Option<&'a EndpointDescriptor> {
        let collection = format!("/{resource}");
        self.spec
            .get_endpoints()
            .iter()
            .find(|e| e.method == "POST" && e.path.trim_end_matches('/') == collection)
    }

    fn sample(&self, endpoint: &EndpointDescriptor) -> SamplePayload {
        self.synth.sample_payload(endpoint)
    }

    /// Case pre-filled with the endpoint's identity and a valid sample.
    fn base_case(
        &self,
        endpoint: &EndpointDescriptor,
        category: TestCategory,
        name: String,
    ) -> TestCase {
        let sample = self.sample(endpoint);
        let mut case = TestCase::new(category, &endpoint.method, &endpoint.path, name)
            .with_operation_id(&endpoint.operation_id)
            .with_payload(sample.payload)
            .with_query(Some(serde_json::Value::Object(sample.query)))
            .with_encoding(sample.encoding, sample.file_fields);
        for (name, value) in &sample.headers {
            case.headers.insert(name.clone(), value_to_param_string(value));
        }
        for tag in &endpoint.tags {
            case = case.with_tag(tag);
        }
        case
    }
}
