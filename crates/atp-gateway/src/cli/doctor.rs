use atp_domain::config::{Config, ConfigSeverity};

/// Run all diagnostic checks and print a summary.
///
/// Returns `Ok(true)` when every check passes, `Ok(false)` when at least
/// one check failed.
pub async fn run(config: &Config, config_path: &str) -> anyhow::Result<bool> {
    println!("atp-gateway doctor");
    println!("==================\n");

    let mut all_passed = true;

    check_config_file(config_path, &mut all_passed);
    check_config_validation(config, &mut all_passed);
    check_secret(&config.sessions.secret_env, "Session secret", &mut all_passed);
    if config.provenance.mode != atp_domain::config::ProvenanceMode::None {
        check_secret(&config.provenance.secret_env, "Provenance secret", &mut all_passed);
    }
    check_store_backend(config, &mut all_passed);

    println!();
    if all_passed {
        println!("All checks passed.");
    } else {
        println!("Some checks failed. Review the output above.");
    }

    Ok(all_passed)
}

fn check_config_file(config_path: &str, all_passed: &mut bool) {
    let exists = std::path::Path::new(config_path).exists();
    print_check(
        "Config file exists",
        exists,
        if exists {
            config_path.to_owned()
        } else {
            format!("{config_path} not found (using defaults)")
        },
    );
    if !exists {
        *all_passed = false;
    }
}

fn check_config_validation(config: &Config, all_passed: &mut bool) {
    let issues = config.validate();
    let error_count = issues.iter().filter(|i| i.severity == ConfigSeverity::Error).count();

    if issues.is_empty() {
        print_check("Config validation", true, "no issues".into());
    } else {
        print_check(
            "Config validation",
            error_count == 0,
            format!("{} issue(s) ({error_count} error(s))", issues.len()),
        );
        for issue in &issues {
            println!("      {issue}");
        }
        if error_count > 0 {
            *all_passed = false;
        }
    }
}

fn check_secret(env_var: &str, label: &str, all_passed: &mut bool) {
    let ok = std::env::var(env_var).map(|v| v.len() >= 32).unwrap_or(false);
    print_check(
        label,
        ok,
        if ok {
            format!("{env_var} set (≥32 bytes)")
        } else {
            format!("{env_var} missing or too short")
        },
    );
    if !ok {
        *all_passed = false;
    }
}

fn check_store_backend(config: &Config, all_passed: &mut bool) {
    let url = std::env::var("STATE_STORE_URL").ok().or_else(|| config.store.url.clone());
    match url.as_deref() {
        None | Some("") | Some("memory://") => {
            print_check("Execution store", true, "in-memory (single instance)".into());
        }
        Some(url) if url.starts_with("file://") => {
            let dir = std::path::PathBuf::from(url.trim_start_matches("file://"));
            let writable = std::fs::create_dir_all(&dir).is_ok()
                && std::fs::write(dir.join(".atp_doctor_probe"), b"probe").is_ok();
            let _ = std::fs::remove_file(dir.join(".atp_doctor_probe"));
            print_check(
                "Execution store",
                writable,
                format!("{} ({})", dir.display(), if writable { "writable" } else { "not writable" }),
            );
            if !writable {
                *all_passed = false;
            }
        }
        Some(other) => {
            print_check("Execution store", false, format!("unrecognized STATE_STORE_URL scheme: {other}"));
            *all_passed = false;
        }
    }
}

fn print_check(name: &str, passed: bool, detail: String) {
    let status = if passed { "PASS" } else { "FAIL" };
    println!("  [{status}] {name}: {detail}");
}
