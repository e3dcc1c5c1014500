//! Checks a live database against the state the baseline plan should leave behind.

use dbinit_db::catalog::{Catalog, DefaultAcl, RoleAttributes};
use dbinit_kernel::ConnectionDescriptor;

use crate::plan::{BASELINE_ROLES, INTERNAL_SCHEMA};

/// Default-ACL object types the plan grants on: tables, functions, sequences.
const DEFAULT_ACL_TYPES: [(&str, &str); 3] = [("r", "tables"), ("f", "functions"), ("S", "sequences")];

/// Every deviation from the expected end state, empty when the database is fully bootstrapped.
pub async fn verify(descriptor: &ConnectionDescriptor) -> anyhow::Result<Vec<String>> {
    let mut catalog = Catalog::connect(descriptor).await?;
    let mut problems = Vec::new();

    for role in BASELINE_ROLES {
        let attributes = catalog.role(role).await?;
        problems.extend(check_role(role, attributes.as_ref()));

        if attributes.is_some() && !catalog.has_schema_usage(role, "public").await? {
            problems.push(format!("role '{role}' lacks usage on schema public"));
        }
    }

    let acls = catalog.default_acls("public").await?;
    problems.extend(check_default_acls(&acls));

    match catalog.schema_count(INTERNAL_SCHEMA).await? {
        1 => {}
        n => problems.push(format!("expected schema '{INTERNAL_SCHEMA}' once, found {n}")),
    }

    catalog.close().await?;
    Ok(problems)
}

fn check_role(role: &str, attributes: Option<&RoleAttributes>) -> Vec<String> {
    let Some(attributes) = attributes else {
        return vec![format!("role '{role}' is missing")];
    };

    let mut problems = Vec::new();
    if attributes.can_login {
        problems.push(format!("role '{role}' can log in"));
    }
    if attributes.inherit {
        problems.push(format!("role '{role}' inherits privileges"));
    }
    let wants_bypass = role == "service_role";
    if attributes.bypass_rls != wants_bypass {
        problems.push(format!(
            "role '{role}' has bypassrls={}, expected {wants_bypass}",
            attributes.bypass_rls
        ));
    }
    problems
}

fn check_default_acls(acls: &[DefaultAcl]) -> Vec<String> {
    let mut problems = Vec::new();
    for (object_type, label) in DEFAULT_ACL_TYPES {
        let acl = acls.iter().find(|a| a.object_type == object_type);
        for role in BASELINE_ROLES {
            if !acl.is_some_and(|a| a.grants_to(role)) {
                problems.push(format!(
                    "default privileges on {label} in public are not granted to '{role}'"
                ));
            }
        }
    }
    problems
}
