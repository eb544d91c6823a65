//! Cross-endpoint flows grouped by resource name
//!
//! Flow steps keep their path templates (`/pets/{petId}`); the engine fills
//! placeholders from values captured by earlier steps.

use serde_json::Value;

use apiforge_core::{FlowStep, TestCase, TestCategory};

use super::HeuristicGenerator;
use crate::spec::EndpointDescriptor;

/// Endpoints considered per resource for integration flows.
const INTEGRATION_WINDOW: usize = 5;
const INTEGRATION_STEPS: usize = 3;
/// Endpoints considered per resource for e2e scenarios.
const E2E_WINDOW: usize = 6;
const E2E_STEPS: usize = 4;

/// Endpoints sharing a first path segment, in document order.
pub(super) struct ResourceGroup<'a> {
    pub name: String,
    pub endpoints: Vec<&'a EndpointDescriptor>,
}

impl ResourceGroup<'_> {
    fn collection(&self) -> String {
        format!("/{}", self.name)
    }

    fn create(&self) -> Option<&EndpointDescriptor> {
        let collection = self.collection();
        self.endpoints
            .iter()
            .copied()
            .find(|e| e.method == "POST" && e.path.trim_end_matches('/') == collection)
    }

    fn member(&self, method: &str) -> Option<&EndpointDescriptor> {
        let prefix = format!("{}/", self.collection());
        self.endpoints
            .iter()
            .copied()
            .find(|e| e.method == method && e.path.starts_with(&prefix))
    }

    fn composable(&self, window: usize) -> Vec<&EndpointDescriptor> {
        self.endpoints
            .iter()
            .take(window)
            .copied()
            .filter(|e| !e.is_upload())
            .collect()
    }
}

pub(super) fn group_by_resource<'a>(endpoints: &[&'a EndpointDescriptor]) -> Vec<ResourceGroup<'a>> {
    let mut groups: Vec<ResourceGroup<'a>> = Vec::new();
    for &endpoint in endpoints {
        let name = endpoint.resource();
        if name.is_empty() {
            continue;
        }
        match groups.iter_mut().find(|g| g.name == name) {
            Some(group) => group.endpoints.push(endpoint),
            None => groups.push(ResourceGroup {
                name: name.to_string(),
                endpoints: vec![endpoint],
            }),
        }
    }
    groups
}

fn step(g: &HeuristicGenerator<'_>, endpoint: &EndpointDescriptor, description: String) -> FlowStep {
    let sample = g.sample(endpoint);
    FlowStep::new(&endpoint.method, &endpoint.path, sample.payload)
        .with_query(Some(Value::Object(sample.query)))
        .with_encoding(sample.encoding, sample.file_fields)
        .with_description(description)
}

/// Two-step flow: create a fresh record, then mutate it by id.
pub(super) fn create_then_act(
    g: &HeuristicGenerator<'_>,
    create: &EndpointDescriptor,
    act: &EndpointDescriptor,
) -> TestCase {
    let resource = act.resource();
    let (verb, noun) = if act.method == "DELETE" {
        ("Delete", "delete")
    } else {
        ("Update", "update")
    };
    let flow = vec![
        step(g, create, format!("Create {resource} to obtain id")),
        step(g, act, format!("{verb} created {resource}")),
    ];
    TestCase::new(
        TestCategory::E2e,
        &act.method,
        &act.path,
        format!("{verb} {resource} after create"),
    )
    .with_operation_id(format!("{resource}_{noun}_flow"))
    .with_description(format!(
        "Create a {resource} then {noun} it using returned id"
    ))
    .with_expected_status(vec![200, 201, 204])
    .with_flow(flow)
    .with_tag(TestCategory::HappyPath.as_str())
}

pub(super) fn crud(g: &HeuristicGenerator<'_>, groups: &[ResourceGroup<'_>]) -> Vec<TestCase> {
    let mut cases = Vec::new();
    for group in groups {
        let (Some(create), Some(read), Some(update), Some(delete)) = (
            group.create(),
            group.member("GET"),
            group.member("PUT"),
            group.member("DELETE"),
        ) else {
            continue;
        };
        let name = &group.name;
        let flow = vec![
            step(g, create, format!("Create {name}")),
            step(g, read, format!("Read created {name}")),
            step(g, update, format!("Update created {name}")),
            step(g, delete, format!("Delete created {name}")),
        ];
        cases.push(
            TestCase::new(
                TestCategory::Crud,
                "CRUD",
                group.collection(),
                format!("CRUD: Full CRUD flow for {name}"),
            )
            .with_operation_id(format!("{name}_full_crud_flow"))
            .with_description("Complete CRUD flow: Create -> Read -> Update -> Delete")
            .with_expected_status(vec![200, 201, 204])
            .with_flow(flow),
        );
    }
    cases
}

pub(super) fn integration(
    g: &HeuristicGenerator<'_>,
    groups: &[ResourceGroup<'_>],
) -> Vec<TestCase> {
    let mut cases = Vec::new();
    for group in groups.iter().filter(|g| g.endpoints.len() > 1) {
        let members = group.composable(INTEGRATION_WINDOW);
        if members.len() < 2 {
            continue;
        }
        let name = &group.name;
        let flow = members
            .iter()
            .take(INTEGRATION_STEPS)
            .map(|e| step(g, e, format!("Step: {}", e.operation_id)))
            .collect();
        cases.push(
            TestCase::new(
                TestCategory::Integration,
                "INTEGRATION",
                group.collection(),
                format!("Integration: Multiple operations for {name}"),
            )
            .with_operation_id(format!("{name}_integration"))
            .with_description(format!(
                "Test integration between multiple {name} endpoints"
            ))
            .with_expected_status(vec![200, 201])
            .with_flow(flow),
        );
    }
    cases
}

pub(super) fn e2e(g: &HeuristicGenerator<'_>, groups: &[ResourceGroup<'_>]) -> Vec<TestCase> {
    let mut cases = Vec::new();
    for group in groups {
        let name = &group.name;

        let delete = group
            .endpoints
            .iter()
            .copied()
            .find(|e| e.method == "DELETE" && e.has_path_params());
        if let (Some(create), Some(delete)) = (group.create(), delete) {
            let flow = vec![
                step(g, create, format!("Create {name} to obtain id")),
                step(g, delete, format!("Delete created {name}")),
            ];
            cases.push(
                TestCase::new(
                    TestCategory::E2e,
                    "DELETE",
                    &delete.path,
                    format!("E2E: Create then delete {name}"),
                )
                .with_operation_id(format!("{name}_create_then_delete"))
                .with_description(format!(
                    "Creates a {name} then deletes it using the returned id"
                ))
                .with_expected_status(vec![200, 201, 204])
                .with_flow(flow),
            );
        }

        let members = group.composable(E2E_WINDOW);
        if members.len() >= 2 {
            let flow = members
                .iter()
                .take(E2E_STEPS)
                .map(|e| step(g, e, format!("Step: {}", e.operation_id)))
                .collect();
            cases.push(
                TestCase::new(
                    TestCategory::E2e,
                    "E2E",
                    group.collection(),
                    format!("E2E: Complete user flow for {name}"),
                )
                .with_operation_id(format!("{name}_e2e_scenario"))
                .with_description(format!(
                    "End-to-end test scenario for {name} operations"
                ))
                .with_expected_status(vec![200, 201])
                .with_flow(flow),
            );
        }
    }
    cases
}
