//! Student and admin removal

use std::process::ExitCode;

use anyhow::Result;
use ula_core::{MutationPolicy, StudentQuery};

use super::{loaded, mount, submit, Dash};

pub async fn delete_student(dash: &Dash, id: &str, policy: MutationPolicy) -> Result<ExitCode> {
    let everyone = StudentQuery::default();
    let mut view = mount(dash.students(&everyone)).await;
    loaded(&view)?;
    submit(
        "delete student",
        &mut view,
        dash.delete_student(id, policy),
        dash.students(&everyone),
    )
    .await
}

pub async fn delete_admin(dash: &Dash, id: &str, policy: MutationPolicy) -> Result<ExitCode> {
    let mut view = mount(dash.admins()).await;
    loaded(&view)?;
    submit(
        "delete admin",
        &mut view,
        dash.delete_admin(id, policy),
        dash.admins(),
    )
    .await
}
