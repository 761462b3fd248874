//! Offline planning against a policy file

use std::path::PathBuf;

use clap::Args;
use iamsync_policy::{apply, is_up_to_date, validate_document};
use iamsync_types::{DesiredBindingSpec, PolicyDocument};
use serde::Serialize;

use crate::input::read_file;
use crate::output::{print_single, OutputFormat};

/// Binding to plan or check
#[derive(Debug, Args)]
pub struct BindingArgs {
    /// Policy document (JSON or YAML); an empty policy when omitted
    #[arg(short, long)]
    pub policy: Option<PathBuf>,

    /// Role to bind, e.g. roles/storage.objectViewer
    #[arg(long)]
    pub role: String,

    /// Member to bind, e.g. user:alice@example.com
    #[arg(long)]
    pub member: String,

    /// Ensure the member is NOT bound to the role
    #[arg(long)]
    pub absent: bool,
}

impl BindingArgs {
    fn spec(&self) -> anyhow::Result<DesiredBindingSpec> {
        let spec = if self.absent {
            DesiredBindingSpec::absent(&self.role, &self.member)
        } else {
            DesiredBindingSpec::present(&self.role, &self.member)
        };
        spec.validate()?;
        Ok(spec)
    }

    fn document(&self) -> anyhow::Result<PolicyDocument> {
        match &self.policy {
            Some(path) => read_file(path),
            None => Ok(PolicyDocument::new()),
        }
    }
}

#[derive(Debug, Serialize)]
struct PlanReport {
    changed: bool,
    policy: PolicyDocument,
}

#[derive(Debug, Serialize)]
struct CheckReport {
    up_to_date: bool,
}

/// Print the document `args` would produce and whether it differs
pub fn plan(args: BindingArgs, format: OutputFormat) -> anyhow::Result<()> {
    let spec = args.spec()?;
    let mut policy = args.document()?;
    validate_document(&policy)?;

    let changed = apply(&spec, &mut policy);
    tracing::debug!(changed, role = %spec.role, member = %spec.member, "Planned binding");

    print_single(&PlanReport { changed, policy }, format)
}

/// Print whether the document already satisfies `args`
pub fn check(args: BindingArgs, format: OutputFormat) -> anyhow::Result<()> {
    let spec = args.spec()?;
    let policy = args.document()?;

    let up_to_date = is_up_to_date(&spec, &policy)?;
    print_single(&CheckReport { up_to_date }, format)
}
