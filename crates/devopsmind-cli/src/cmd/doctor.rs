use crate::output::{print_json, print_table};
use anyhow::Context;
use devopsmind_core::config::Config;
use devopsmind_core::doctor::{self, CheckStatus};
use devopsmind_core::paths::Layout;

pub fn run(layout: &Layout, json: bool) -> anyhow::Result<()> {
    let config = Config::load(layout).context("failed to load config")?;
    let checks = doctor::run_checks(layout, &config);

    if json {
        print_json(&serde_json::json!({ "checks": checks }))?;
    } else {
        let rows = checks
            .iter()
            .map(|c| vec![c.status.to_string(), c.name.clone(), c.detail.clone()])
            .collect();
        print_table(&["STATUS", "CHECK", "DETAIL"], rows);
    }

    if doctor::has_failures(&checks) {
        let failed = checks.iter().filter(|c| c.status == CheckStatus::Fail).count();
        anyhow::bail!("doctor found {failed} failing check(s)");
    }
    Ok(())
}
