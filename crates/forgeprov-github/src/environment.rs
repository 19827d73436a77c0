//! `github_repository_environment`: a deployment environment of a repository
//!
//! The deployment branch policy is a nested block. Its two flags are
//! mutually exclusive: deployments are limited either to protected branches
//! or to custom branch policies, and setting both is rejected.

use forgeprov_core::normalize::TrimWhitespace;
use forgeprov_core::schema::{Attribute, Schema};
use forgeprov_core::validate::{
    ConflictsWith, NotEmpty, ValidationContext, Validator, Violation, Violations,
};
use forgeprov_core::{AttrPath, AttrValue, Object, ResourceKind, Value};

/// Type name of the kind
pub const TYPE_NAME: &str = "github_repository_environment";

/// Longest wait timer GitHub accepts, in minutes (30 days)
pub const MAX_WAIT_TIMER_MINUTES: i64 = 43_200;

/// Rejects integers outside an inclusive range
#[derive(Debug, Clone, Copy)]
pub struct IntRange {
    min: i64,
    max: i64,
}

impl IntRange {
    /// Create a validator for `min..=max`
    pub fn new(min: i64, max: i64) -> Self {
        Self { min, max }
    }
}

impl Validator for IntRange {
    fn description(&self) -> String {
        format!("between {} and {}", self.min, self.max)
    }

    fn validate(&self, value: &Value, ctx: &ValidationContext<'_>, out: &mut Violations) {
        let Some(n) = value.as_int() else {
            return;
        };
        if !(self.min..=self.max).contains(&n) {
            out.push(Violation::new(
                ctx.path.clone(),
                format!("must be between {} and {}, got {n}", self.min, self.max),
            ));
        }
    }
}

/// Repository environment resource kind
pub struct RepositoryEnvironment {
    schema: Schema,
}

impl RepositoryEnvironment {
    pub fn new() -> Self {
        let branch_policy = Schema::new()
            .with_attribute(
                "protected_branches",
                Attribute::optional_bool()
                    .with_validator(ConflictsWith::new(["custom_branch_policies"])),
            )
            .with_attribute(
                "custom_branch_policies",
                Attribute::optional_bool()
                    .with_validator(ConflictsWith::new(["protected_branches"])),
            );

        Self {
            schema: Schema::new()
                .with_attribute(
                    "repository",
                    Attribute::required_string()
                        .force_replace()
                        .with_validator(NotEmpty)
                        .with_normalizer(TrimWhitespace),
                )
                .with_attribute(
                    "environment",
                    Attribute::required_string()
                        .force_replace()
                        .with_validator(NotEmpty),
                )
                .with_attribute(
                    "wait_timer",
                    Attribute::optional_int()
                        .with_validator(IntRange::new(0, MAX_WAIT_TIMER_MINUTES)),
                )
                .with_attribute("can_admins_bypass", Attribute::optional_computed_bool())
                .with_attribute("prevent_self_review", Attribute::optional_bool())
                .with_attribute("reviewers", Attribute::optional_list())
                .with_attribute(
                    "deployment_branch_policy",
                    Attribute::optional_block(branch_policy),
                ),
        }
    }
}

impl Default for RepositoryEnvironment {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceKind for RepositoryEnvironment {
    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn validate(&self, config: &Object, out: &mut Violations) {
        // GitHub treats an empty policy as no policy at all.
        let AttrValue::Known(Value::Object(policy)) = config.get("deployment_branch_policy") else {
            return;
        };
        if policy.get("protected_branches").is_null()
            && policy.get("custom_branch_policies").is_null()
        {
            out.push(Violation::new(
                AttrPath::attr("deployment_branch_policy"),
                "one of protected_branches or custom_branch_policies must be set",
            ));
        }
    }

    fn import_id_parts(&self) -> &'static [&'static str] {
        &["repository", "environment"]
    }
}
